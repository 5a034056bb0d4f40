//! Wait bounds and results

use {
    crate::{
        error::{Result, TimerError},
        spec::secs_to_duration,
    },
    std::time::{Duration, Instant},
};

/// Result of a wait that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The timer fired
    Signaled,
    /// The wait returned early because some other event needed the thread,
    /// such as a queued completion routine or a signal
    Interrupted,
    /// The timeout elapsed before the timer fired
    TimedOut,
}

/// Upper bound on how long a wait may block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    #[default]
    Infinite,
    After(Duration),
}

impl Timeout {
    /// Zero timeout, polls the timer without blocking
    pub const IMMEDIATE: Self = Self::After(Duration::ZERO);

    /// Build a timeout from fractional seconds.
    ///
    /// Negative and infinite values mean no bound, the same as the native
    /// `INFINITE`; only NaN is rejected.
    pub fn from_secs_f64(secs: f64) -> Result<Self> {
        if secs.is_nan() {
            return Err(TimerError::invalid("timeout must be a number, got NaN"));
        }
        if secs.is_infinite() || secs < 0.0 {
            return Ok(Self::Infinite);
        }
        secs_to_duration("timeout", secs).map(Self::After)
    }

    #[must_use]
    pub const fn as_duration(&self) -> Option<Duration> {
        match self {
            Self::Infinite => None,
            Self::After(duration) => Some(*duration),
        }
    }

    /// What is left of this bound once `started` lies in the past
    #[must_use]
    pub fn remaining_since(&self, started: Instant) -> Self {
        match self {
            Self::Infinite => Self::Infinite,
            Self::After(duration) => Self::After(duration.saturating_sub(started.elapsed())),
        }
    }

    /// Whole milliseconds, rounded up, with `u32::MAX` standing for infinite
    #[must_use]
    pub fn as_millis_ceil(&self) -> u32 {
        match self {
            Self::Infinite => u32::MAX,
            Self::After(duration) => {
                let millis = duration.as_nanos().div_ceil(1_000_000);
                u32::try_from(millis).unwrap_or(u32::MAX - 1).min(u32::MAX - 1)
            }
        }
    }
}

impl From<Duration> for Timeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(duration: Option<Duration>) -> Self {
        duration.map_or(Self::Infinite, Self::After)
    }
}
