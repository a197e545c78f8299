//! Managed object model and shared value types for the signal bridge.
//!
//! This crate provides the dynamically-typed, reference-counted side of the
//! bridge: values ([`Dynamic`]), a generational object heap with weak
//! references, managed functions, classes and native method wrappers, and the
//! [`Exception`] failure model the invocation engine inspects.

pub mod convert;
pub mod error;
pub mod name;
pub mod runtime;

pub use convert::{FromDynamic, IntoDynamic};
pub use error::{ConversionError, Exception, ExceptionKind, Frame, NativeError};
pub use name::{NameHash, normalize_name, same_name};
pub use runtime::{
    Arity, BoundMethodObject, CallContext, CallableShape, ClassBuilder, Dynamic, ManagedFn,
    ManagedObject, NativeFn, NativeMethodObject, NativePtr, ObjectFlags, ObjectHandle, Runtime,
    WeakRef,
};
