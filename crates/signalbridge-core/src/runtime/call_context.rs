//! Call context handed to managed function and native method bodies.

use std::fmt;

use crate::convert::{FromDynamic, IntoDynamic};
use crate::error::NativeError;

use super::{Dynamic, NativePtr, ObjectHandle, Runtime};

/// Context for a single call.
///
/// Gives typed access to the arguments and collects the return value. The
/// runtime is reachable from the context so bodies can allocate objects or
/// call back into other callables; no heap borrow is held while a body runs.
///
/// ```ignore
/// let x: i32 = ctx.arg(0)?;
/// ctx.set_return(x * 2);
/// ```
pub struct CallContext<'rt> {
    runtime: &'rt Runtime,
    /// Argument slots; for methods slot 0 is `self`
    slots: &'rt [Dynamic],
    /// Index of first argument (0 for functions, 1 for methods)
    arg_offset: usize,
    return_value: Dynamic,
}

impl<'rt> CallContext<'rt> {
    pub fn new(runtime: &'rt Runtime, slots: &'rt [Dynamic], arg_offset: usize) -> Self {
        Self {
            runtime,
            slots,
            arg_offset,
            return_value: Dynamic::Void,
        }
    }

    /// Get the number of arguments (excluding `self` for methods).
    pub fn arg_count(&self) -> usize {
        self.slots.len().saturating_sub(self.arg_offset)
    }

    /// Get a raw reference to an argument slot.
    pub fn arg_slot(&self, index: usize) -> Result<&Dynamic, NativeError> {
        self.slots
            .get(self.arg_offset + index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.arg_count(),
            })
    }

    /// Get a typed argument value.
    pub fn arg<T: FromDynamic>(&self, index: usize) -> Result<T, NativeError> {
        let slot = self.arg_slot(index)?;
        T::from_dynamic(slot).map_err(NativeError::Conversion)
    }

    /// All arguments, excluding `self`.
    pub fn args(&self) -> &[Dynamic] {
        self.slots.get(self.arg_offset..).unwrap_or(&[])
    }

    pub fn set_return<T: IntoDynamic>(&mut self, value: T) {
        self.return_value = value.into_dynamic();
    }

    pub fn into_return(self) -> Dynamic {
        self.return_value
    }

    /// The managed `self` of a method call.
    pub fn this(&self) -> Result<ObjectHandle, NativeError> {
        match self.slots.first() {
            Some(Dynamic::Object(handle)) if self.arg_offset > 0 => Ok(*handle),
            Some(other) if self.arg_offset > 0 => Err(NativeError::invalid_this(format!(
                "expected object, got {}",
                other.type_name()
            ))),
            _ => Err(NativeError::invalid_this("not a method call")),
        }
    }

    /// The native `this` pointer of a native method call.
    pub fn this_native(&self) -> Result<NativePtr, NativeError> {
        match self.slots.first() {
            Some(Dynamic::Native(ptr)) if self.arg_offset > 0 => Ok(*ptr),
            Some(other) if self.arg_offset > 0 => Err(NativeError::invalid_this(format!(
                "expected native, got {}",
                other.type_name()
            ))),
            _ => Err(NativeError::invalid_this("not a method call")),
        }
    }

    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("arg_count", &self.arg_count())
            .field("arg_offset", &self.arg_offset)
            .finish()
    }
}
