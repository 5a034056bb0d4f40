//! Error type shared by every timer operation

use {crate::platform, std::io, thiserror::Error};

/// Result alias used throughout the crate
pub type Result<T, E = TimerError> = std::result::Result<T, E>;

/// Errors produced while creating, arming, waiting on or binding a timer
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("{operation} failed: timer resources exhausted (os error {code})")]
    ResourceExhausted { operation: &'static str, code: i32 },

    #[error("{operation} failed: permission denied (os error {code})")]
    PermissionDenied { operation: &'static str, code: i32 },

    #[error("unsupported clock kind {0}, only the monotonic clock is supported")]
    UnsupportedClock(i32),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("timer handle is closed")]
    HandleClosed,

    #[error("library `{library}` not found: {reason}")]
    LibraryNotFound { library: String, reason: String },

    #[error("symbol `{symbol}` not found in `{library}`")]
    SymbolNotFound { library: String, symbol: String },

    #[error("wait failed (os error {code})")]
    WaitFailed { code: i32 },

    #[error("unexpected wait result {0:#x}")]
    UnexpectedWaitResult(u32),

    #[error("native timers are not available on this platform")]
    UnsupportedPlatform,

    #[error("{operation} failed")]
    Os {
        operation: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Coarse classification of a native error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OsErrorClass {
    Exhausted,
    Denied,
    Invalid,
    Other,
}

impl TimerError {
    /// Wrap the calling thread's last OS error.
    ///
    /// Must be called right after the failing native call, before anything
    /// else has a chance to overwrite the thread's error slot.
    pub(crate) fn last_os(operation: &'static str) -> Self {
        Self::from_os(operation, io::Error::last_os_error())
    }

    pub(crate) fn from_os(operation: &'static str, source: io::Error) -> Self {
        let Some(code) = source.raw_os_error() else {
            return Self::Os { operation, source };
        };

        match platform::classify_os(code) {
            OsErrorClass::Exhausted => Self::ResourceExhausted { operation, code },
            OsErrorClass::Denied => Self::PermissionDenied { operation, code },
            OsErrorClass::Invalid => Self::InvalidArgument(format!("{operation} rejected its arguments (os error {code})")),
            OsErrorClass::Other if source.kind() == io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied { operation, code }
            }
            OsErrorClass::Other => Self::Os { operation, source },
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidArgument(reason.into())
    }

    /// The native error code carried by this error, if any
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::ResourceExhausted { code, .. } | Self::PermissionDenied { code, .. } | Self::WaitFailed { code } => {
                Some(*code)
            }
            Self::Os { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
