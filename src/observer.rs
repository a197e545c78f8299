//! Weak observation of managed objects.
//!
//! An [`Observer`] answers "is this object still alive?" without extending
//! its lifetime. Objects whose type cannot be weakly referenced are observed
//! on a best-effort basis: the observer remembers the handle and reports the
//! object as always alive.

use signalbridge_core::{ObjectHandle, Runtime, WeakRef};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{0} cannot be weakly referenced")]
pub struct NotObservable(pub ObjectHandle);

/// Lifetime-independent handle to a managed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Observer {
    /// Liveness is tracked through a weak reference.
    Weak(WeakRef),
    /// Weak references are unavailable for this object; assumed alive.
    Untracked(ObjectHandle),
}

impl Observer {
    /// Observe `object` weakly, failing if its type does not allow it.
    pub fn observe(runtime: &Runtime, object: ObjectHandle) -> Result<Self, NotObservable> {
        runtime
            .weak_ref(object)
            .map(Observer::Weak)
            .ok_or(NotObservable(object))
    }

    /// Observe `object`, falling back to an untracked observer.
    pub fn best_effort(runtime: &Runtime, object: ObjectHandle) -> Self {
        Self::observe(runtime, object).unwrap_or_else(|err| {
            tracing::debug!(%err, "falling back to untracked observation");
            Observer::Untracked(object)
        })
    }

    /// The observed object's identity, whether or not it is still alive.
    pub fn target(&self) -> ObjectHandle {
        match self {
            Observer::Weak(weak) => weak.handle(),
            Observer::Untracked(handle) => *handle,
        }
    }

    pub fn is_alive(&self, runtime: &Runtime) -> bool {
        self.resolve(runtime).is_some()
    }

    /// The live object, or `None` once it has been destroyed.
    pub fn resolve(&self, runtime: &Runtime) -> Option<ObjectHandle> {
        match self {
            Observer::Weak(weak) => runtime.upgrade(*weak),
            Observer::Untracked(handle) => Some(*handle),
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, Observer::Weak(_))
    }
}
