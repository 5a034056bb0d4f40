//! Owning wrapper around one native timer resource

use {
    crate::{
        error::{Result, TimerError},
        options::TimerOptions,
        platform::{Native, TimerPrimitive},
    },
    std::fmt,
    tracing::warn,
};

/// Sole owner of a native timer.
///
/// The resource is released exactly once, by [`close`](Self::close) or on
/// drop. A closed handle is inert: [`raw`](Self::raw) reports
/// [`TimerError::HandleClosed`] instead of handing out a stale reference.
pub struct TimerHandle<P: TimerPrimitive = Native> {
    raw: Option<P::Raw>,
    primitive: &'static P,
}

impl<P: TimerPrimitive> TimerHandle<P> {
    /// Create a native timer through `primitive` and take ownership of it
    pub(crate) fn create(primitive: &'static P, options: &TimerOptions) -> Result<Self> {
        let raw = primitive.create(options)?;
        Ok(Self { raw: Some(raw), primitive })
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.raw.is_some()
    }

    /// The native reference, as long as the handle is open
    pub fn raw(&self) -> Result<P::Raw> {
        self.raw.ok_or(TimerError::HandleClosed)
    }

    pub(crate) fn primitive(&self) -> &'static P {
        self.primitive
    }

    /// Release the native timer. Later calls do nothing.
    ///
    /// Never fails: a release error is logged, and the handle is considered
    /// closed either way since retrying a failed close is not safe.
    pub fn close(&mut self) {
        let Some(raw) = self.raw.take() else {
            return;
        };

        if let Err(err) = self.primitive.close(raw) {
            warn!(?raw, error = %err, "failed to release native timer");
        }
    }
}

impl<P: TimerPrimitive> Drop for TimerHandle<P> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<P: TimerPrimitive> fmt::Debug for TimerHandle<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").field("raw", &self.raw).finish()
    }
}
