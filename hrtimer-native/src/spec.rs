//! Timer schedule and its conversions to native units

use {
    crate::error::{Result, TimerError},
    std::time::Duration,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const NANOS_PER_TICK: u128 = 100;
const NANOS_PER_MILLI: u128 = 1_000_000;

/// When a timer first fires and how often it fires afterwards.
///
/// A zero `period` makes the timer one-shot. A zero `initial_delay` disarms
/// it, following the descriptor-timer convention on every platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimerSpec {
    pub initial_delay: Duration,
    pub period: Duration,
}

impl TimerSpec {
    #[must_use]
    pub const fn new(initial_delay: Duration, period: Duration) -> Self {
        Self { initial_delay, period }
    }

    #[must_use]
    pub const fn one_shot(delay: Duration) -> Self {
        Self::new(delay, Duration::ZERO)
    }

    #[must_use]
    pub const fn periodic(initial_delay: Duration, period: Duration) -> Self {
        Self::new(initial_delay, period)
    }

    #[must_use]
    pub const fn disarmed() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Build a schedule from fractional seconds.
    ///
    /// Both values must be finite and non-negative.
    pub fn from_secs_f64(initial_delay: f64, period: f64) -> Result<Self> {
        Ok(Self::new(
            secs_to_duration("initial_delay", initial_delay)?,
            secs_to_duration("period", period)?,
        ))
    }

    #[must_use]
    pub const fn is_disarm(&self) -> bool {
        self.initial_delay.is_zero()
    }

    #[must_use]
    pub const fn is_periodic(&self) -> bool {
        !self.period.is_zero()
    }

    /// Relative due time in 100 ns ticks, negative as waitable timers expect.
    ///
    /// Rounds up so the timer never fires before `initial_delay`.
    pub fn due_time_ticks(&self) -> Result<i64> {
        let ticks = self.initial_delay.as_nanos().div_ceil(NANOS_PER_TICK);
        i64::try_from(ticks)
            .map(|ticks| -ticks)
            .map_err(|_| TimerError::invalid(format!("initial delay {:?} does not fit in 100ns ticks", self.initial_delay)))
    }

    /// Period in whole milliseconds, rounded up, `0` for one-shot timers
    pub fn period_millis(&self) -> Result<i32> {
        let millis = self.period.as_nanos().div_ceil(NANOS_PER_MILLI);
        i32::try_from(millis)
            .map_err(|_| TimerError::invalid(format!("period {:?} does not fit in milliseconds", self.period)))
    }
}

pub(crate) fn secs_to_duration(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() {
        return Err(TimerError::invalid(format!("{name} must be finite, got {secs}")));
    }
    if secs < 0.0 {
        return Err(TimerError::invalid(format!("{name} must not be negative, got {secs}")));
    }
    let duration = Duration::try_from_secs_f64(secs).map_err(|err| TimerError::invalid(format!("{name} {secs}: {err}")))?;

    // Below a nanosecond the conversion truncates to zero, which would read as "disarm" or "one-shot"
    if duration.is_zero() && secs > 0.0 {
        return Ok(Duration::from_nanos(1));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_secs_f64() {
        let spec = TimerSpec::from_secs_f64(1.0, 0.5).unwrap();
        assert_eq!(spec.initial_delay, Duration::from_secs(1));
        assert_eq!(spec.period, Duration::from_millis(500));
        assert!(spec.is_periodic());
        assert!(!spec.is_disarm());

        let spec = TimerSpec::from_secs_f64(0.000_25, 0.0).unwrap();
        assert_eq!(spec.initial_delay, Duration::from_micros(250));
        assert!(!spec.is_periodic());
    }

    #[test]
    fn test_from_secs_f64_rejects_bad_values() {
        for (initial, period) in [(-1.0, 0.0), (0.0, -0.5), (f64::NAN, 0.0), (1.0, f64::INFINITY), (f64::NEG_INFINITY, 1.0)] {
            let err = TimerSpec::from_secs_f64(initial, period).unwrap_err();
            assert!(matches!(err, TimerError::InvalidArgument(_)), "({initial}, {period}) gave {err:?}");
        }
    }

    #[test]
    fn test_sub_nanosecond_values_stay_positive() {
        let spec = TimerSpec::from_secs_f64(1e-10, 1e-12).unwrap();
        assert_eq!(spec.initial_delay, Duration::from_nanos(1));
        assert_eq!(spec.period, Duration::from_nanos(1));
        assert!(!spec.is_disarm());
        assert!(spec.is_periodic());

        let spec = TimerSpec::from_secs_f64(0.0, 0.0).unwrap();
        assert!(spec.is_disarm());
        assert!(!spec.is_periodic());
    }

    #[test]
    fn test_zero_delay_disarms() {
        assert!(TimerSpec::disarmed().is_disarm());
        assert!(TimerSpec::periodic(Duration::ZERO, Duration::from_secs(1)).is_disarm());
    }

    #[test]
    fn test_due_time_ticks_round_up() {
        assert_eq!(TimerSpec::one_shot(Duration::from_secs(1)).due_time_ticks().unwrap(), -10_000_000);
        assert_eq!(TimerSpec::one_shot(Duration::from_nanos(150)).due_time_ticks().unwrap(), -2);
        assert_eq!(TimerSpec::one_shot(Duration::from_nanos(100)).due_time_ticks().unwrap(), -1);
        assert!(TimerSpec::one_shot(Duration::MAX).due_time_ticks().is_err());
    }

    #[test]
    fn test_period_millis() {
        let spec = TimerSpec::periodic(Duration::from_secs(1), Duration::from_millis(500));
        assert_eq!(spec.period_millis().unwrap(), 500);

        // sub-millisecond periods must not collapse into a one-shot timer
        let spec = TimerSpec::periodic(Duration::from_secs(1), Duration::from_micros(100));
        assert_eq!(spec.period_millis().unwrap(), 1);

        assert_eq!(TimerSpec::one_shot(Duration::from_secs(1)).period_millis().unwrap(), 0);

        let spec = TimerSpec::periodic(Duration::from_secs(1), Duration::from_secs(u64::from(u32::MAX)));
        assert!(matches!(spec.period_millis(), Err(TimerError::InvalidArgument(_))));
    }
}
