//! Error types for the bridge.
//!
//! ```text
//! BridgeError
//! ├── Allocation          - storage exhausted; aborts the operation
//! ├── InvalidReference    - named signal or slot does not exist
//! ├── ArityMismatch       - every narrower argument tuple was rejected
//! ├── Exception           - a receiver raised
//! ├── Binding             - managed wrapper has no native counterpart
//! └── AdapterUnavailable  - the native side refused to create an endpoint
//! ```
//!
//! A destroyed receiver is not an error: invocation reports
//! [`Invocation::ReceiverGone`](crate::Invocation::ReceiverGone) instead.

use std::collections::TryReserveError;
use std::fmt;

use signalbridge_core::{Exception, ObjectHandle};
use thiserror::Error;

/// What a failed name lookup was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    Signal,
    Slot,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::Signal => write!(f, "signal"),
            ReferenceKind::Slot => write!(f, "slot"),
        }
    }
}

/// Errors reported by bridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Storage for a name, bucket or descriptor could not be reserved.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// A named native signal or slot does not exist on the target.
    #[error("invalid {kind} {name}")]
    InvalidReference { kind: ReferenceKind, name: String },

    /// The receiver rejected the full argument tuple and every narrower one.
    /// `original` is the failure of the full-argument attempt.
    #[error("{original} (after {attempts} attempts)")]
    ArityMismatch {
        attempts: usize,
        #[source]
        original: Exception,
    },

    /// A receiver raised.
    #[error(transparent)]
    Exception(#[from] Exception),

    /// A managed object has no native counterpart of the expected type.
    #[error("{object} does not wrap a native {expected}")]
    Binding {
        object: ObjectHandle,
        expected: String,
    },

    /// The native meta-object service could not create a universal endpoint.
    #[error("no universal endpoint available for {signal}")]
    AdapterUnavailable { signal: String },
}

impl BridgeError {
    pub fn invalid_signal(name: impl Into<String>) -> Self {
        BridgeError::InvalidReference {
            kind: ReferenceKind::Signal,
            name: name.into(),
        }
    }

    pub fn invalid_slot(name: impl Into<String>) -> Self {
        BridgeError::InvalidReference {
            kind: ReferenceKind::Slot,
            name: name.into(),
        }
    }

    /// The exception a receiver raised, if this error carries one.
    pub fn exception(&self) -> Option<&Exception> {
        match self {
            BridgeError::Exception(exc) => Some(exc),
            BridgeError::ArityMismatch { original, .. } => Some(original),
            _ => None,
        }
    }

    pub fn is_allocation(&self) -> bool {
        matches!(self, BridgeError::Allocation(_))
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;

/// Copy `text` into an owned buffer, reporting exhaustion instead of aborting.
pub(crate) fn owned_name(text: &str) -> BridgeResult<String> {
    let mut name = String::new();
    name.try_reserve_exact(text.len())?;
    name.push_str(text);
    Ok(name)
}
