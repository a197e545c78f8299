//! Managed object kinds stored on the heap.

use rustc_hash::FxHashMap;

use super::{Arity, CallContext, ManagedFn, NativeFn, NativePtr, ObjectHandle, Runtime};
use crate::error::{Exception, NativeError};

/// An object living in the managed object model.
#[derive(Debug)]
pub enum ManagedObject {
    /// A free function or closure.
    Function(ManagedFn),
    /// A class with managed and native methods.
    Class(ClassObject),
    /// An instance of a class, optionally wrapping a native object.
    Instance(InstanceObject),
    /// A function bound to a receiver. Holds strong references to all three
    /// parts, like any bound method.
    BoundMethod(BoundMethodObject),
    /// A native method obtained through the binding layer, bound to a wrapper.
    NativeMethod(NativeMethodObject),
}

impl ManagedObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            ManagedObject::Function(_) => "function",
            ManagedObject::Class(_) => "class",
            ManagedObject::Instance(_) => "instance",
            ManagedObject::BoundMethod(_) => "method",
            ManagedObject::NativeMethod(_) => "builtin_method",
        }
    }

    /// Handles this object owns a reference to.
    pub(crate) fn owned_references(&self) -> Vec<ObjectHandle> {
        match self {
            ManagedObject::Function(_) => Vec::new(),
            ManagedObject::Class(class) => class.methods.values().copied().collect(),
            ManagedObject::Instance(instance) => vec![instance.class],
            ManagedObject::BoundMethod(method) => {
                vec![method.func, method.receiver, method.class]
            }
            ManagedObject::NativeMethod(method) => vec![method.receiver],
        }
    }
}

#[derive(Debug)]
pub struct ClassObject {
    pub name: String,
    /// Managed methods, each a `Function` object owned by the class.
    pub methods: FxHashMap<String, ObjectHandle>,
    pub native_methods: FxHashMap<String, NativeFn>,
}

#[derive(Debug)]
pub struct InstanceObject {
    pub class: ObjectHandle,
    /// Set when the instance wraps a native object.
    pub native: Option<NativePtr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundMethodObject {
    pub func: ObjectHandle,
    pub receiver: ObjectHandle,
    pub class: ObjectHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeMethodObject {
    pub receiver: ObjectHandle,
    pub name: String,
}

/// How a callable object is shaped, as far as connection bookkeeping cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallableShape {
    /// An ephemeral bound method: remember its parts, not the object.
    BoundMethod(BoundMethodObject),
    /// A wrapped native method: remember receiver and name.
    NativeMethod(NativeMethodObject),
    /// Anything else.
    Opaque,
}

/// Builder for registering a class with the runtime.
///
/// # Example
///
/// ```ignore
/// let class = runtime
///     .class("Meter")
///     .method("on_value", Arity::exact(2), |ctx: &mut CallContext| Ok(()))
///     .native_method("reset", Arity::exact(0), |ctx: &mut CallContext| Ok(()))
///     .build();
/// ```
pub struct ClassBuilder<'rt> {
    runtime: &'rt Runtime,
    name: String,
    methods: Vec<ManagedFn>,
    native_methods: Vec<NativeFn>,
}

impl<'rt> ClassBuilder<'rt> {
    pub(crate) fn new(runtime: &'rt Runtime, name: String) -> Self {
        Self {
            runtime,
            name,
            methods: Vec::new(),
            native_methods: Vec::new(),
        }
    }

    /// Add a managed method. `arity` excludes `self`.
    pub fn method<F>(mut self, name: &str, arity: Arity, body: F) -> Self
    where
        F: Fn(&mut CallContext) -> Result<(), Exception> + 'static,
    {
        self.methods.push(ManagedFn::new(name, arity, body));
        self
    }

    /// Add a native method. `arity` excludes the native `this`.
    pub fn native_method<F>(mut self, name: &str, arity: Arity, body: F) -> Self
    where
        F: Fn(&mut CallContext) -> Result<(), NativeError> + 'static,
    {
        self.native_methods.push(NativeFn::new(name, arity, body));
        self
    }

    pub fn build(self) -> ObjectHandle {
        let methods = self
            .methods
            .into_iter()
            .map(|func| {
                let name = func.name().to_string();
                (name, self.runtime.alloc(ManagedObject::Function(func)))
            })
            .collect();
        let native_methods = self
            .native_methods
            .into_iter()
            .map(|func| (func.name().to_string(), func))
            .collect();

        self.runtime.alloc(ManagedObject::Class(ClassObject {
            name: self.name,
            methods,
            native_methods,
        }))
    }
}
