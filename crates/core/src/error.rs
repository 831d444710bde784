//! Error types for Ripple list operators.

use alloc::string::String;
use core::fmt;

/// Result type alias for Ripple operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors carried through the `on_error` channel of a change stream.
///
/// Invariant violations inside a stage (an index out of range, a corrupted
/// bucket table) are bugs and panic instead of producing one of these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A host-supplied key selector, predicate or result selector failed.
    Selector {
        message: String,
    },
    /// An upstream or per-item source terminated with a failure.
    Source {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Selector { message } => {
                write!(f, "Selector failed: {}", message)
            }
            Error::Source { message } => {
                write!(f, "Source failed: {}", message)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl Error {
    /// Creates a selector failure.
    pub fn selector(message: impl Into<String>) -> Self {
        Error::Selector {
            message: message.into(),
        }
    }

    /// Creates a source failure.
    pub fn source(message: impl Into<String>) -> Self {
        Error::Source {
            message: message.into(),
        }
    }

    /// Returns true if this error came from a host-supplied callable.
    pub fn is_selector(&self) -> bool {
        matches!(self, Error::Selector { .. })
    }
}
