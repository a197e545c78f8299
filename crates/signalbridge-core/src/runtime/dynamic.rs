//! Runtime value type for signal arguments and return values.

use std::fmt;

use super::ObjectHandle;

/// Opaque address of an object living in the native object model.
///
/// The bridge never dereferences it; it is only compared and handed back to
/// the native meta-object service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativePtr(pub u64);

impl NativePtr {
    pub const NULL: NativePtr = NativePtr(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A dynamic value passed across the bridge.
///
/// Signal argument tuples are slices of `Dynamic`. Values are cheap to clone
/// because objects are referenced by handle, so a narrower argument tuple can
/// always be built from a wider one.
#[derive(Clone, PartialEq)]
pub enum Dynamic {
    /// Void/empty
    Void,
    /// Integer value (all integer widths stored as i64)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Boolean value
    Bool(bool),
    /// String value (owned)
    String(String),
    /// Handle to a managed object
    Object(ObjectHandle),
    /// Pointer to a native object
    Native(NativePtr),
    /// Null handle
    NullHandle,
}

impl Dynamic {
    /// Get a human-readable name for this value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Void => "void",
            Dynamic::Int(_) => "int",
            Dynamic::Float(_) => "float",
            Dynamic::Bool(_) => "bool",
            Dynamic::String(_) => "string",
            Dynamic::Object(_) => "object",
            Dynamic::Native(_) => "native",
            Dynamic::NullHandle => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::NullHandle)
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dynamic::Void => write!(f, "Void"),
            Dynamic::Int(v) => write!(f, "Int({})", v),
            Dynamic::Float(v) => write!(f, "Float({})", v),
            Dynamic::Bool(v) => write!(f, "Bool({})", v),
            Dynamic::String(s) => write!(f, "String({:?})", s),
            Dynamic::Object(h) => write!(f, "Object({})", h),
            Dynamic::Native(p) => write!(f, "Native({})", p),
            Dynamic::NullHandle => write!(f, "NullHandle"),
        }
    }
}
