//! Error types for the managed object model.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Exception          - failure raised while calling into the managed object model
//! ├── from NativeError      - native method bodies
//! └── from ConversionError  - argument extraction
//! ```
//!
//! Exceptions carry a traceback. A traceback is only present once the callee's
//! body has started running, which lets callers tell an argument-binding failure
//! apart from a failure raised later by the receiver itself.

use std::fmt;

use thiserror::Error;

/// Errors that can occur when converting between Rust and managed values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// Type mismatch during conversion
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Attempted to convert a null handle to a non-nullable type
    #[error("null handle cannot be converted to {target_type}")]
    NullHandle { target_type: &'static str },

    /// Integer overflow during conversion
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i64, target_type: &'static str },
}

/// Errors that can occur during native method execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// Error converting arguments or return values
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// Invalid `this` reference for method call
    #[error("invalid 'this' reference: {message}")]
    InvalidThis { message: String },

    /// Argument index out of bounds
    #[error("argument index {index} out of bounds (function has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// Generic native error
    #[error("native error: {message}")]
    Other { message: String },
}

impl NativeError {
    /// Create an "invalid this" error with a message.
    pub fn invalid_this(message: impl Into<String>) -> Self {
        NativeError::InvalidThis {
            message: message.into(),
        }
    }

    /// Create a generic native error.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}

/// Category of a managed exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// Wrong argument count or argument type.
    TypeError,
    /// Unknown signal or slot name.
    NameError,
    /// Attribute lookup failed.
    AttributeError,
    /// A handle referred to a destroyed object.
    ReferenceError,
    /// Anything raised by a receiver that fits no other category.
    RuntimeError,
}

impl ExceptionKind {
    /// Returns the conventional name of this exception kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::NameError => "NameError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::ReferenceError => "ReferenceError",
            ExceptionKind::RuntimeError => "RuntimeError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of an exception traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Name of the function whose body was executing.
    pub function: String,
}

/// A failure raised by the managed object model.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct Exception {
    /// The category of this exception.
    pub kind: ExceptionKind,
    /// Human readable description.
    pub message: String,
    /// Frames the exception passed through, innermost first. Empty when the
    /// exception was raised before any body started executing.
    pub traceback: Vec<Frame>,
}

impl Exception {
    /// Create a new exception with an empty traceback.
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::NameError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::AttributeError, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::ReferenceError, message)
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::RuntimeError, message)
    }

    /// Append a traceback frame for `function`.
    pub fn with_frame(mut self, function: impl Into<String>) -> Self {
        self.traceback.push(Frame {
            function: function.into(),
        });
        self
    }

    /// Check whether the exception was raised after a body started running.
    pub fn has_traceback(&self) -> bool {
        !self.traceback.is_empty()
    }

    /// A type error raised while binding arguments, before any body ran.
    pub fn is_immediate_type_error(&self) -> bool {
        self.kind == ExceptionKind::TypeError && self.traceback.is_empty()
    }
}

impl From<NativeError> for Exception {
    fn from(err: NativeError) -> Self {
        let kind = match &err {
            NativeError::Conversion(_)
            | NativeError::InvalidThis { .. }
            | NativeError::ArgumentIndexOutOfBounds { .. } => ExceptionKind::TypeError,
            NativeError::Other { .. } => ExceptionKind::RuntimeError,
        };
        Exception::new(kind, err.to_string())
    }
}

impl From<ConversionError> for Exception {
    fn from(err: ConversionError) -> Self {
        Exception::type_error(err.to_string())
    }
}
