//! Callable storage for managed functions and native methods.

use std::fmt;
use std::rc::Rc;

use crate::error::{Exception, NativeError};

use super::{CallContext, Dynamic, Runtime};

/// Number of positional arguments a callable accepts, excluding `self`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Arity {
    pub min: usize,
    /// `None` accepts any number of trailing arguments.
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(count: usize) -> Self {
        Self {
            min: count,
            max: Some(count),
        }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    /// Parameters with defaults: accepts `min..=max` arguments.
    pub const fn range(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    pub fn accepts(&self, given: usize) -> bool {
        given >= self.min && self.max.is_none_or(|max| given <= max)
    }

    /// The `TypeError` raised when binding `given` arguments fails.
    fn mismatch(&self, name: &str, given: usize) -> Exception {
        let expected = match self.max {
            Some(max) if max == self.min => format!("{max}"),
            Some(max) => format!("from {} to {max}", self.min),
            None => format!("at least {}", self.min),
        };
        Exception::type_error(format!(
            "{name}() takes {expected} positional arguments but {given} were given"
        ))
    }
}

/// Trait for managed function bodies.
pub trait ManagedCallable {
    fn call(&self, ctx: &mut CallContext) -> Result<(), Exception>;
}

impl<F> ManagedCallable for F
where
    F: Fn(&mut CallContext) -> Result<(), Exception>,
{
    fn call(&self, ctx: &mut CallContext) -> Result<(), Exception> {
        (self)(ctx)
    }
}

/// A function defined in the managed object model.
///
/// Arguments are bound before the body runs: a count mismatch raises a
/// `TypeError` without traceback. Anything escaping the body gets a frame
/// for this function appended.
#[derive(Clone)]
pub struct ManagedFn {
    name: String,
    arity: Arity,
    body: Rc<dyn ManagedCallable>,
}

impl ManagedFn {
    pub fn new<F>(name: impl Into<String>, arity: Arity, body: F) -> Self
    where
        F: ManagedCallable + 'static,
    {
        Self {
            name: name.into(),
            arity,
            body: Rc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Invoke with `slots`, where the first `arg_offset` slots hold `self`.
    pub fn invoke(
        &self,
        runtime: &Runtime,
        slots: &[Dynamic],
        arg_offset: usize,
    ) -> Result<Dynamic, Exception> {
        let given = slots.len().saturating_sub(arg_offset);
        if !self.arity.accepts(given) {
            return Err(self.arity.mismatch(&self.name, given));
        }

        let mut ctx = CallContext::new(runtime, slots, arg_offset);
        self.body
            .call(&mut ctx)
            .map_err(|exc| exc.with_frame(self.name.as_str()))?;
        Ok(ctx.into_return())
    }
}

impl fmt::Debug for ManagedFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedFn")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// Trait for callable native method bodies.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext) -> Result<(), NativeError> {
        (self)(ctx)
    }
}

/// Type-erased native method exposed on a wrapped class.
///
/// Native methods never produce a traceback: their failures look like
/// argument-binding failures to the managed side.
#[derive(Clone)]
pub struct NativeFn {
    name: String,
    arity: Arity,
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    pub fn new<F>(name: impl Into<String>, arity: Arity, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        Self {
            name: name.into(),
            arity,
            inner: Rc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with slot 0 holding the native `this` pointer.
    pub fn invoke(&self, runtime: &Runtime, slots: &[Dynamic]) -> Result<Dynamic, Exception> {
        let given = slots.len().saturating_sub(1);
        if !self.arity.accepts(given) {
            return Err(self.arity.mismatch(&self.name, given));
        }

        let mut ctx = CallContext::new(runtime, slots, 1);
        self.inner.call(&mut ctx)?;
        Ok(ctx.into_return())
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
