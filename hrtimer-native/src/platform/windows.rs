use {
    super::TimerPrimitive,
    crate::{
        completion::Completion,
        error::{OsErrorClass, Result, TimerError},
        options::{ResetMode, TimerOptions},
        spec::TimerSpec,
        symbol::{SymbolLookup, bind_symbol},
        wait::{Timeout, WaitOutcome},
    },
    std::{
        cell::RefCell,
        collections::HashMap,
        ffi::c_void,
        io, ptr,
        sync::{Arc, Weak},
    },
    tracing::{debug, trace},
    windows::Win32::{
        Foundation::{
            BOOL, ERROR_ACCESS_DENIED, ERROR_INVALID_PARAMETER, ERROR_NO_SYSTEM_RESOURCES, ERROR_NOT_ENOUGH_MEMORY,
            ERROR_OUTOFMEMORY, ERROR_PRIVILEGE_NOT_HELD, ERROR_TOO_MANY_OPEN_FILES, WAIT_FAILED, WAIT_IO_COMPLETION,
            WAIT_OBJECT_0, WAIT_TIMEOUT,
        },
        System::Threading::INFINITE,
    },
};

const KERNEL32: &str = "kernel32.dll";

// Far enough in the future to never fire, used to reset the signaled state
const NEVER: i64 = -(i64::MAX / 2);

type RawHandle = *mut c_void;
type TimerApcRoutine = unsafe extern "system" fn(*const c_void, u32, u32);
type CreateWaitableTimerWFn = unsafe extern "system" fn(*const c_void, BOOL, *const u16) -> RawHandle;
type SetWaitableTimerFn = unsafe extern "system" fn(RawHandle, *const i64, i32, Option<TimerApcRoutine>, *const c_void, BOOL) -> BOOL;
type CancelWaitableTimerFn = unsafe extern "system" fn(RawHandle) -> BOOL;
type WaitForSingleObjectExFn = unsafe extern "system" fn(RawHandle, u32, BOOL) -> u32;
type CloseHandleFn = unsafe extern "system" fn(RawHandle) -> BOOL;
type SleepExFn = unsafe extern "system" fn(u32, BOOL) -> u32;

pub type Native = WaitableTimer;

thread_local! {
    // Completion records of timers armed on this thread, keyed by id.
    // Completion routines run on the arming thread, so this is all they see.
    static COMPLETIONS: RefCell<HashMap<u64, Weak<Completion>>> = RefCell::new(HashMap::new());
}

/// Handle of a waitable timer object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerObject(isize);

impl TimerObject {
    fn as_raw(self) -> RawHandle {
        self.0 as RawHandle
    }
}

/// Timer backed by a kernel waitable timer object.
///
/// Firings are reported two ways: the object becomes signaled, and, when the
/// timer was armed alertable, a completion routine is queued to the arming
/// thread. That routine only runs while the thread sits in an alertable wait,
/// in which case the wait returns [`WaitOutcome::Interrupted`].
#[derive(Debug, Clone, Copy)]
pub struct WaitableTimer {
    create: CreateWaitableTimerWFn,
    set: SetWaitableTimerFn,
    cancel: CancelWaitableTimerFn,
    wait: WaitForSingleObjectExFn,
    close: CloseHandleFn,
    sleep: SleepExFn,
}

impl WaitableTimer {
    /// Resolve the waitable timer entry points from `kernel32.dll`
    pub fn bind(lookup: &impl SymbolLookup) -> Result<Self> {
        // SAFETY: the aliases above match the documented Win32 prototypes
        unsafe {
            Ok(Self {
                create: bind_symbol(lookup, KERNEL32, "CreateWaitableTimerW")?,
                set: bind_symbol(lookup, KERNEL32, "SetWaitableTimer")?,
                cancel: bind_symbol(lookup, KERNEL32, "CancelWaitableTimer")?,
                wait: bind_symbol(lookup, KERNEL32, "WaitForSingleObjectEx")?,
                close: bind_symbol(lookup, KERNEL32, "CloseHandle")?,
                sleep: bind_symbol(lookup, KERNEL32, "SleepEx")?,
            })
        }
    }

    /// Deactivate the timer and return it to the non-signaled state.
    ///
    /// Setting a timer resets its signaled state, canceling it does not, so
    /// the timer is pushed out of reach first and then canceled.
    fn disarm(&self, timer: TimerObject) -> Result<()> {
        let set = unsafe { (self.set)(timer.as_raw(), &NEVER, 0, None, ptr::null(), BOOL::from(false)) };
        if !set.as_bool() {
            return Err(TimerError::last_os("SetWaitableTimer"));
        }
        if !unsafe { (self.cancel)(timer.as_raw()) }.as_bool() {
            return Err(TimerError::last_os("CancelWaitableTimer"));
        }
        Ok(())
    }
}

impl TimerPrimitive for WaitableTimer {
    type Raw = TimerObject;

    fn create(&self, options: &TimerOptions) -> Result<TimerObject> {
        if !options.clock.is_supported() {
            return Err(TimerError::UnsupportedClock(options.clock.as_raw()));
        }

        let manual_reset = BOOL::from(options.reset == ResetMode::Manual);
        let handle = unsafe { (self.create)(ptr::null(), manual_reset, ptr::null()) };
        if handle.is_null() {
            return Err(TimerError::last_os("CreateWaitableTimerW"));
        }

        let timer = TimerObject(handle as isize);
        debug!(?timer, reset = ?options.reset, "created waitable timer");
        Ok(timer)
    }

    fn arm(&self, timer: TimerObject, spec: &TimerSpec, options: &TimerOptions, completion: &Arc<Completion>) -> Result<()> {
        if spec.is_disarm() {
            self.disarm(timer)?;
            debug!(?timer, "disarmed waitable timer");
            return Ok(());
        }

        let due_time = spec.due_time_ticks()?;
        let period = spec.period_millis()?;

        let (routine, context) = if options.alertable {
            register(completion);
            (Some(on_timer_fired as TimerApcRoutine), completion.id() as usize as *const c_void)
        } else {
            (None, ptr::null())
        };

        let set = unsafe { (self.set)(timer.as_raw(), &due_time, period, routine, context, BOOL::from(false)) };
        if !set.as_bool() {
            return Err(TimerError::last_os("SetWaitableTimer"));
        }

        debug!(?timer, ?spec, due_time, period, "armed waitable timer");
        Ok(())
    }

    fn wait(&self, timer: TimerObject, timeout: Timeout, alertable: bool, _completion: &Completion) -> Result<WaitOutcome> {
        let millis = match timeout {
            Timeout::Infinite => INFINITE,
            Timeout::After(_) => timeout.as_millis_ceil(),
        };

        let code = unsafe { (self.wait)(timer.as_raw(), millis, BOOL::from(alertable)) };
        let outcome = match code {
            code if code == WAIT_OBJECT_0.0 => WaitOutcome::Signaled,
            code if code == WAIT_IO_COMPLETION.0 => WaitOutcome::Interrupted,
            code if code == WAIT_TIMEOUT.0 => WaitOutcome::TimedOut,
            code if code == WAIT_FAILED.0 => {
                let code = io::Error::last_os_error().raw_os_error().unwrap_or(-1);
                return Err(TimerError::WaitFailed { code });
            }
            other => return Err(TimerError::UnexpectedWaitResult(other)),
        };

        trace!(?timer, ?outcome, "waitable timer wait returned");
        Ok(outcome)
    }

    fn run_pending_completions(&self, completion: &Completion) -> Result<()> {
        let before = completion.total();
        // A zero alertable sleep only delivers what is already queued
        let code = unsafe { (self.sleep)(0, BOOL::from(true)) };
        trace!(
            ran = code == WAIT_IO_COMPLETION.0,
            expirations = completion.total() - before,
            "drained queued completion routines"
        );
        Ok(())
    }

    fn cancel(&self, timer: TimerObject) -> Result<()> {
        self.disarm(timer)?;
        debug!(?timer, "canceled waitable timer");
        Ok(())
    }

    fn close(&self, timer: TimerObject) -> Result<()> {
        if !unsafe { (self.close)(timer.as_raw()) }.as_bool() {
            return Err(TimerError::last_os("CloseHandle"));
        }
        debug!(?timer, "closed waitable timer");
        Ok(())
    }
}

fn register(completion: &Arc<Completion>) {
    COMPLETIONS.with(|registry| {
        let mut registry = registry.borrow_mut();
        registry.retain(|_, record| record.strong_count() > 0);
        registry.insert(completion.id(), Arc::downgrade(completion));
    });
}

unsafe extern "system" fn on_timer_fired(context: *const c_void, _low: u32, _high: u32) {
    let id = context as usize as u64;
    let completion = COMPLETIONS.with(|registry| {
        let mut registry = registry.borrow_mut();
        let completion = registry.get(&id).and_then(Weak::upgrade);
        if completion.is_none() {
            registry.remove(&id);
        }
        completion
    });

    match completion {
        Some(completion) => completion.fire(1),
        None => trace!(id, "completion routine for a released timer"),
    }
}

const NOT_ENOUGH_MEMORY: i32 = ERROR_NOT_ENOUGH_MEMORY.0 as i32;
const OUT_OF_MEMORY: i32 = ERROR_OUTOFMEMORY.0 as i32;
const NO_SYSTEM_RESOURCES: i32 = ERROR_NO_SYSTEM_RESOURCES.0 as i32;
const TOO_MANY_OPEN_FILES: i32 = ERROR_TOO_MANY_OPEN_FILES.0 as i32;
const ACCESS_DENIED: i32 = ERROR_ACCESS_DENIED.0 as i32;
const PRIVILEGE_NOT_HELD: i32 = ERROR_PRIVILEGE_NOT_HELD.0 as i32;
const INVALID_PARAMETER: i32 = ERROR_INVALID_PARAMETER.0 as i32;

pub(crate) fn classify_os(code: i32) -> OsErrorClass {
    match code {
        NOT_ENOUGH_MEMORY | OUT_OF_MEMORY | NO_SYSTEM_RESOURCES | TOO_MANY_OPEN_FILES => OsErrorClass::Exhausted,
        ACCESS_DENIED | PRIVILEGE_NOT_HELD => OsErrorClass::Denied,
        INVALID_PARAMETER => OsErrorClass::Invalid,
        _ => OsErrorClass::Other,
    }
}
