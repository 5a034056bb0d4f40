//! Per-timer record of firings observed by the waiting thread

use std::{
    fmt,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

type Callback = Box<dyn FnMut(u64) + Send + 'static>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Counts expirations and runs the user's fire callback.
///
/// The callback only ever runs on a thread that is inside a wait on the
/// owning timer: either from a completion routine delivered during an
/// alertable wait, or from the wait itself after it read an expiration count.
///
/// Firings are recorded by the crate only; outside code can read the count
/// but not add to it:
///
/// ```compile_fail
/// fn forge(completion: &hrtimer_native::Completion) {
///     completion.fire(1);
/// }
/// ```
pub struct Completion {
    id: u64,
    fired: AtomicU64,
    callback: Mutex<Option<Callback>>,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            fired: AtomicU64::new(0),
            callback: Mutex::new(None),
        })
    }

    /// Process-unique id, used as the completion routine argument
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Expirations recorded since the timer was created
    pub fn total(&self) -> u64 {
        self.fired.load(Ordering::Acquire)
    }

    /// Record `expirations` and hand them to the callback
    pub(crate) fn fire(&self, expirations: u64) {
        self.count(expirations);

        // Run the callback without holding the lock
        let taken = self.lock().take();
        if let Some(mut callback) = taken {
            callback(expirations);
            let mut slot = self.lock();
            if slot.is_none() {
                *slot = Some(callback);
            }
        }
    }

    /// Record `expirations` without running the callback
    pub(crate) fn count(&self, expirations: u64) {
        self.fired.fetch_add(expirations, Ordering::AcqRel);
    }

    pub(crate) fn set_callback(&self, callback: Option<Callback>) {
        *self.lock() = callback;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Callback>> {
        // A callback that panicked leaves nothing inconsistent behind
        self.callback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("id", &self.id)
            .field("fired", &self.total())
            .finish_non_exhaustive()
    }
}
