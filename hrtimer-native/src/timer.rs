//! One-shot and periodic timer with the same contract on every platform

use {
    crate::{
        completion::Completion,
        error::{Result, TimerError},
        handle::TimerHandle,
        options::{ClockKind, TimerOptions},
        platform::{self, Native, TimerPrimitive},
        spec::TimerSpec,
        wait::{Timeout, WaitOutcome},
    },
    std::{
        fmt,
        sync::Arc,
        time::{Duration, Instant},
    },
    tracing::{debug, trace},
};

/// A native high-resolution timer.
///
/// Arm it with [`set_time`](Self::set_time), block on it with
/// [`wait`](Self::wait), stop it with [`cancel`](Self::cancel). All blocking
/// happens on the calling thread; the timer never spawns threads of its own.
///
/// ```no_run
/// use hrtimer_native::{ClockKind, Timeout, Timer, WaitOutcome};
///
/// let mut timer = Timer::create(ClockKind::Monotonic)?;
/// timer.set_time(1.0, 0.5)?;
/// for _ in 0..6 {
///     assert_eq!(timer.wait(Timeout::Infinite)?, WaitOutcome::Signaled);
/// }
/// timer.cancel()?;
/// assert_eq!(timer.wait(Timeout::from_secs_f64(0.1)?)?, WaitOutcome::TimedOut);
/// # Ok::<(), hrtimer_native::TimerError>(())
/// ```
pub struct Timer<P: TimerPrimitive = Native> {
    handle: TimerHandle<P>,
    options: TimerOptions,
    completion: Arc<Completion>,
    schedule: Option<Schedule>,
    last_expirations: u64,
}

/// The active spec and when it was armed
#[derive(Debug, Clone, Copy)]
struct Schedule {
    armed_at: Instant,
    spec: TimerSpec,
}

impl Schedule {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let first = self.armed_at + self.spec.initial_delay;
        if now < first {
            return Some(first - now);
        }
        if !self.spec.is_periodic() {
            return None;
        }

        let period = self.spec.period.as_nanos();
        let into_period = now.duration_since(first).as_nanos() % period;
        Some(Duration::from_nanos(u64::try_from(period - into_period).unwrap_or(u64::MAX)))
    }
}

impl Timer {
    /// Create an unarmed timer on `clock` using the platform primitive
    pub fn create(clock: ClockKind) -> Result<Self> {
        Self::with_options(TimerOptions::default().with_clock(clock))
    }

    pub fn with_options(options: TimerOptions) -> Result<Self> {
        if !options.clock.is_supported() {
            return Err(TimerError::UnsupportedClock(options.clock.as_raw()));
        }
        Self::with_primitive(platform::native()?, options)
    }
}

impl<P: TimerPrimitive> Timer<P> {
    /// Create an unarmed timer on a specific primitive
    pub fn with_primitive(primitive: &'static P, options: TimerOptions) -> Result<Self> {
        if !options.clock.is_supported() {
            return Err(TimerError::UnsupportedClock(options.clock.as_raw()));
        }

        let handle = TimerHandle::create(primitive, &options)?;
        debug!(?handle, ?options, "created timer");

        Ok(Self {
            handle,
            options,
            completion: Completion::new(),
            schedule: None,
            last_expirations: 0,
        })
    }

    /// Arm or re-arm the timer.
    ///
    /// `initial_delay` counts from now; `period == 0.0` makes the timer
    /// one-shot and `initial_delay == 0.0` disarms it. Both must be finite and
    /// non-negative, otherwise nothing is armed.
    pub fn set_time(&mut self, initial_delay: f64, period: f64) -> Result<()> {
        self.handle.raw()?;
        let spec = TimerSpec::from_secs_f64(initial_delay, period)?;
        self.set_spec(spec)
    }

    /// Arm or re-arm the timer with an already built spec
    pub fn set_spec(&mut self, spec: TimerSpec) -> Result<()> {
        let raw = self.handle.raw()?;
        self.handle.primitive().arm(raw, &spec, &self.options, &self.completion)?;

        self.schedule = (!spec.is_disarm()).then(|| Schedule {
            armed_at: Instant::now(),
            spec,
        });
        Ok(())
    }

    /// Block until the timer fires or `timeout` elapses.
    ///
    /// Completion routines queued for this timer run here, before the call
    /// returns, and the wait carries on until the firing they report has been
    /// consumed, so one firing gives one [`WaitOutcome::Signaled`]. An
    /// interruption by anything else is returned as
    /// [`WaitOutcome::Interrupted`].
    pub fn wait(&mut self, timeout: impl Into<Timeout>) -> Result<WaitOutcome> {
        let timeout = timeout.into();
        let raw = self.handle.raw()?;
        let primitive = self.handle.primitive();
        let started = Instant::now();
        let before = self.completion.total();

        loop {
            let seen = self.completion.total();
            let outcome = primitive.wait(raw, timeout.remaining_since(started), self.options.alertable, &self.completion)?;

            match outcome {
                // Our own completion routine ran; the firing is still pending on the timer
                WaitOutcome::Interrupted if self.completion.total() > seen => continue,
                WaitOutcome::Signaled => {
                    if self.options.alertable && self.completion.total() == before {
                        // Signal seen before the routine reporting the same firing
                        primitive.run_pending_completions(&self.completion)?;
                    }

                    let mut expirations = self.completion.total() - before;
                    if expirations == 0 && !self.options.alertable {
                        self.completion.count(1);
                        expirations = 1;
                    }
                    self.last_expirations = expirations.max(1);
                    trace!(?raw, expirations = self.last_expirations, "timer fired");
                    return Ok(WaitOutcome::Signaled);
                }
                other => {
                    trace!(?raw, outcome = ?other, "timer wait returned");
                    return Ok(other);
                }
            }
        }
    }

    /// Stop pending firings.
    ///
    /// Succeeds without doing anything on a closed handle.
    pub fn cancel(&mut self) -> Result<()> {
        let Ok(raw) = self.handle.raw() else {
            return Ok(());
        };

        self.handle.primitive().cancel(raw)?;
        self.schedule = None;
        Ok(())
    }

    /// Release the native timer. Safe to call more than once.
    pub fn close(&mut self) {
        self.handle.close();
        self.schedule = None;
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.handle.is_valid()
    }

    /// Run `callback` with the number of expirations each time a firing is
    /// observed by a wait on this timer
    pub fn on_fire<F>(&mut self, callback: F)
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.completion.set_callback(Some(Box::new(callback)));
    }

    pub fn clear_on_fire(&mut self) {
        self.completion.set_callback(None);
    }

    /// Time until the next expiration, `None` while disarmed
    pub fn remaining(&self) -> Result<Option<Duration>> {
        let raw = self.handle.raw()?;
        match self.handle.primitive().query(raw)? {
            Some(current) if current.is_disarm() => Ok(None),
            Some(current) => Ok(Some(current.initial_delay)),
            None => Ok(self.schedule.and_then(|schedule| schedule.remaining(Instant::now()))),
        }
    }

    /// The spec the timer was last armed with, `None` if it is not armed
    #[must_use]
    pub fn spec(&self) -> Option<TimerSpec> {
        self.schedule.map(|schedule| schedule.spec)
    }

    #[must_use]
    pub fn options(&self) -> &TimerOptions {
        &self.options
    }

    /// Expirations consumed by the last successful wait; above one means
    /// periods were missed
    #[must_use]
    pub fn last_expirations(&self) -> u64 {
        self.last_expirations
    }

    #[must_use]
    pub fn total_expirations(&self) -> u64 {
        self.completion.total()
    }

    #[must_use]
    pub fn handle(&self) -> &TimerHandle<P> {
        &self.handle
    }
}

impl<P: TimerPrimitive> fmt::Debug for Timer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("handle", &self.handle)
            .field("options", &self.options)
            .field("schedule", &self.schedule)
            .field("completion", &self.completion)
            .finish()
    }
}
