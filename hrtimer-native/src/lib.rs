//! Cross-platform high-resolution timers on native OS primitives
//!
//! A [`Timer`] owns exactly one kernel timer: a `timerfd` descriptor on
//! Linux, a waitable timer object on Windows. It can be armed one-shot or
//! periodic with sub-millisecond precision, waited on with an optional
//! timeout, and canceled, with identical semantics on both platforms.
//!
//! The native entry points are resolved once through a [`SymbolLookup`] the
//! first time a timer is created (see [`platform::native`]).

mod completion;
mod error;
mod handle;
mod options;
mod spec;
mod symbol;
mod timer;
mod wait;

// Platform-specific timer implementations
pub mod platform;

pub use {
    completion::Completion,
    error::{Result, TimerError},
    handle::TimerHandle,
    options::{ClockKind, ResetMode, TimerOptions},
    platform::TimerPrimitive,
    spec::TimerSpec,
    symbol::{SymbolLookup, SystemLoader, bind_any, bind_symbol},
    timer::Timer,
    wait::{Timeout, WaitOutcome},
};

/// Create an unarmed timer on `clock`
pub fn create(clock: ClockKind) -> Result<Timer> {
    Timer::create(clock)
}

/// Arm or re-arm `timer`, durations in seconds
pub fn set_time(timer: &mut Timer, initial_delay: f64, period: f64) -> Result<()> {
    timer.set_time(initial_delay, period)
}

/// Block until `timer` fires or `timeout` elapses
pub fn wait(timer: &mut Timer, timeout: impl Into<Timeout>) -> Result<WaitOutcome> {
    timer.wait(timeout)
}

/// Stop pending firings of `timer`
pub fn cancel(timer: &mut Timer) -> Result<()> {
    timer.cancel()
}
