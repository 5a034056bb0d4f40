//! Platform-specific timer implementations

use {
    crate::{
        completion::Completion,
        error::Result,
        options::TimerOptions,
        spec::TimerSpec,
        symbol::SystemLoader,
        wait::{Timeout, WaitOutcome},
    },
    std::{
        fmt,
        sync::{Arc, OnceLock},
    },
};

#[cfg(target_os = "windows")]
use self::windows as platform;
#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "linux")]
use self::linux as platform;
#[cfg(target_os = "linux")]
pub mod linux;

// Fallback implementation for unsupported platforms
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
use self::fallback as platform;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub mod fallback;

#[cfg(test)]
pub(crate) mod mock;

pub use platform::Native;
pub(crate) use platform::classify_os;

/// Native timer operations a [`Timer`](crate::Timer) is built on.
///
/// Implementations are stateless with respect to individual timers: every
/// call names the native resource it acts on, and the owning
/// [`TimerHandle`](crate::TimerHandle) is the only place that resource lives.
pub trait TimerPrimitive: Send + Sync + 'static {
    /// Native resource reference, a descriptor or an OS handle
    type Raw: Copy + fmt::Debug + Send + Sync;

    /// Allocate an unarmed native timer
    fn create(&self, options: &TimerOptions) -> Result<Self::Raw>;

    /// Arm `raw` with `spec`, replacing any schedule it already had.
    ///
    /// A spec with a zero initial delay disarms the timer.
    fn arm(&self, raw: Self::Raw, spec: &TimerSpec, options: &TimerOptions, completion: &Arc<Completion>) -> Result<()>;

    /// Block until `raw` fires, `timeout` elapses or another event interrupts.
    ///
    /// Expirations the primitive can count are recorded into `completion`.
    fn wait(&self, raw: Self::Raw, timeout: Timeout, alertable: bool, completion: &Completion) -> Result<WaitOutcome>;

    /// Run completion routines already queued to the calling thread, without
    /// blocking and without consuming the timer's signaled state.
    ///
    /// Called after a wait saw the timer signaled before the routine reporting
    /// the same firing had run.
    fn run_pending_completions(&self, _completion: &Completion) -> Result<()> {
        Ok(())
    }

    /// Stop future firings and drop any pending one
    fn cancel(&self, raw: Self::Raw) -> Result<()>;

    /// Release the native resource
    fn close(&self, raw: Self::Raw) -> Result<()>;

    /// Current native setting: time until the next expiration and the period.
    ///
    /// `None` when the platform cannot report it.
    fn query(&self, _raw: Self::Raw) -> Result<Option<TimerSpec>> {
        Ok(None)
    }
}

static NATIVE: OnceLock<Native> = OnceLock::new();

/// The primitive for the running platform, bound on first use.
///
/// A failed bind is not cached, so a later call retries it.
pub fn native() -> Result<&'static Native> {
    if let Some(native) = NATIVE.get() {
        return Ok(native);
    }
    let bound = Native::bind(&SystemLoader)?;
    Ok(NATIVE.get_or_init(|| bound))
}
