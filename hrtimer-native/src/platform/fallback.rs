use {
    super::TimerPrimitive,
    crate::{
        completion::Completion,
        error::{OsErrorClass, Result, TimerError},
        options::TimerOptions,
        spec::TimerSpec,
        symbol::SymbolLookup,
        wait::{Timeout, WaitOutcome},
    },
    std::sync::Arc,
};

pub type Native = Unsupported;

/// Stand-in for platforms without a timerfd or waitable timer.
///
/// Binding always fails, so no timer is ever created through it.
#[derive(Debug, Clone, Copy)]
pub struct Unsupported;

impl Unsupported {
    pub fn bind(_lookup: &impl SymbolLookup) -> Result<Self> {
        Err(TimerError::UnsupportedPlatform)
    }
}

impl TimerPrimitive for Unsupported {
    type Raw = ();

    fn create(&self, _options: &TimerOptions) -> Result<()> {
        Err(TimerError::UnsupportedPlatform)
    }

    fn arm(&self, _raw: (), _spec: &TimerSpec, _options: &TimerOptions, _completion: &Arc<Completion>) -> Result<()> {
        Err(TimerError::UnsupportedPlatform)
    }

    fn wait(&self, _raw: (), _timeout: Timeout, _alertable: bool, _completion: &Completion) -> Result<WaitOutcome> {
        Err(TimerError::UnsupportedPlatform)
    }

    fn cancel(&self, _raw: ()) -> Result<()> {
        Err(TimerError::UnsupportedPlatform)
    }

    fn close(&self, _raw: ()) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn classify_os(_code: i32) -> OsErrorClass {
    OsErrorClass::Other
}
