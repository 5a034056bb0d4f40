//! Clock selection and per-timer configuration

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Clock source a timer is bound to.
///
/// Only the monotonic clock is supported. Other raw values can still be
/// represented so that callers passing a foreign clock id get a proper
/// [`TimerError::UnsupportedClock`](crate::TimerError::UnsupportedClock)
/// instead of a silent substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(from = "i32", into = "i32"))]
pub enum ClockKind {
    /// Non-decreasing clock that ignores wall-clock adjustments
    #[default]
    Monotonic,
    /// Any other clock id
    Other(i32),
}

impl ClockKind {
    /// Raw id of the monotonic clock (`CLOCK_MONOTONIC`)
    pub const MONOTONIC_RAW: i32 = 1;

    /// Interpret a raw clock id
    #[must_use]
    pub const fn from_raw(raw: i32) -> Self {
        match raw {
            Self::MONOTONIC_RAW => Self::Monotonic,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i32 {
        match self {
            Self::Monotonic => Self::MONOTONIC_RAW,
            Self::Other(raw) => raw,
        }
    }

    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Monotonic)
    }
}

impl From<i32> for ClockKind {
    fn from(raw: i32) -> Self {
        Self::from_raw(raw)
    }
}

impl From<ClockKind> for i32 {
    fn from(clock: ClockKind) -> Self {
        clock.as_raw()
    }
}

/// How a signaled timer returns to the non-signaled state.
///
/// Only meaningful for waitable timers; descriptor timers always consume
/// their pending expirations on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum ResetMode {
    /// A satisfied wait resets the timer, so every firing releases one wait
    #[default]
    Auto,
    /// The timer stays signaled until it is re-armed or canceled
    Manual,
}

/// Configuration applied when a timer is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct TimerOptions {
    pub clock: ClockKind,
    pub reset: ResetMode,
    /// Let waits run queued completion routines before returning
    pub alertable: bool,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            clock: ClockKind::Monotonic,
            reset: ResetMode::Auto,
            alertable: true,
        }
    }
}

impl TimerOptions {
    #[must_use]
    pub fn with_clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_reset(mut self, reset: ResetMode) -> Self {
        self.reset = reset;
        self
    }

    #[must_use]
    pub fn with_alertable(mut self, alertable: bool) -> Self {
        self.alertable = alertable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_kind_raw_values() {
        assert_eq!(ClockKind::from_raw(1), ClockKind::Monotonic);
        assert_eq!(ClockKind::from_raw(0), ClockKind::Other(0));
        assert_eq!(ClockKind::Other(7).as_raw(), 7);
        assert!(ClockKind::Monotonic.is_supported());
        assert!(!ClockKind::from(0).is_supported());
    }

    #[test]
    fn test_default_options() {
        let options = TimerOptions::default();
        assert_eq!(options.clock, ClockKind::Monotonic);
        assert_eq!(options.reset, ResetMode::Auto);
        assert!(options.alertable);

        let options = options.with_reset(ResetMode::Manual).with_alertable(false);
        assert_eq!(options.reset, ResetMode::Manual);
        assert!(!options.alertable);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_options_from_partial_config() {
        let options: TimerOptions = serde_json::from_str(r#"{ "reset": "manual" }"#).unwrap();
        assert_eq!(options, TimerOptions::default().with_reset(ResetMode::Manual));

        let options: TimerOptions = serde_json::from_str(r#"{ "clock": 0, "alertable": false }"#).unwrap();
        assert_eq!(options.clock, ClockKind::Other(0));
        assert!(!options.alertable);
    }
}
