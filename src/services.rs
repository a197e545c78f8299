//! Collaborators the bridge consumes but does not implement.
//!
//! - [`MetaObjectService`]: the native meta-object system (signal tables,
//!   connect/disconnect, universal endpoints, sender tracking)
//! - [`TypeMapper`]: classification of native argument types
//! - [`BindingAccessor`]: native pointer behind a managed wrapper
//!
//! Plus [`UniversalTarget`], the callback the native side invokes on an
//! endpoint created by the adapter.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use signalbridge_core::{Dynamic, Exception, NativePtr, ObjectHandle, Runtime, same_name};

use crate::error::{BridgeError, BridgeResult};
use crate::signature::{ArgKind, SignatureDescriptor};

/// How the native side queues a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum ConnectionType {
    #[default]
    Auto = 0,
    Direct = 1,
    Queued = 2,
    BlockingQueued = 3,
}

/// A native object and the signal or slot text to use on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    pub object: NativePtr,
    pub member: String,
}

impl MemberRef {
    pub fn new(object: NativePtr, member: impl Into<String>) -> Self {
        Self {
            object,
            member: member.into(),
        }
    }
}

/// Callback target of a universal endpoint.
pub trait UniversalTarget {
    /// Called by the native side when the connected signal fires.
    fn invoke(&self, args: &[Dynamic]) -> BridgeResult<()>;
}

/// The native meta-object system.
///
/// Signal and slot text passed here never carries the `1`/`2` sentinel.
pub trait MetaObjectService {
    /// Whether the signal table of `tx`'s concrete type declares `base_name`.
    fn has_signal(&self, tx: NativePtr, base_name: &str) -> bool;

    /// Emit a table signal by base name.
    fn emit(&self, tx: NativePtr, base_name: &str, args: &[Dynamic]) -> Result<(), Exception>;

    fn connect(
        &self,
        tx: NativePtr,
        signal: &str,
        rx: NativePtr,
        member: &str,
        kind: ConnectionType,
    ) -> bool;

    fn disconnect(&self, tx: NativePtr, signal: &str, rx: NativePtr, member: &str) -> bool;

    /// An existing universal signal standing in for `signal` on `txrx`.
    fn find_universal_signal(&self, txrx: NativePtr, signal: &str) -> Option<MemberRef>;

    fn create_universal_signal(&self, txrx: NativePtr, signal: &str) -> Option<MemberRef>;

    /// Materialize a native slot that forwards to `target`.
    ///
    /// `tx` is the native transmitter, when there is one.
    fn create_universal_slot(
        &self,
        tx: Option<NativePtr>,
        descriptor: &SignatureDescriptor,
        target: Box<dyn UniversalTarget>,
    ) -> Option<MemberRef>;

    fn destroy_universal_slot(&self, slot: NativePtr);

    fn signals_blocked(&self, tx: NativePtr) -> bool;

    /// The native object whose signal is currently being delivered.
    fn last_sender(&self) -> Option<NativePtr>;

    /// Forget the native sender; a managed emission is more recent.
    fn forget_sender(&self);

    fn same_name(&self, a: &str, b: &str) -> bool {
        same_name(a, b)
    }
}

/// Classifies native argument types the descriptor parser does not know.
pub trait TypeMapper {
    fn classify(&self, raw_type: &str) -> ArgKind;
}

/// Treats every unknown type as opaque.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueTypeMapper;

impl TypeMapper for OpaqueTypeMapper {
    fn classify(&self, _raw_type: &str) -> ArgKind {
        ArgKind::Opaque
    }
}

/// Resolves the native object behind a managed wrapper.
pub trait BindingAccessor {
    fn native_pointer_of(&self, wrapper: ObjectHandle, expected_type: &str)
    -> BridgeResult<NativePtr>;
}

/// Reads the native pointer stored on wrapper instances of a [`Runtime`].
#[derive(Debug, Clone)]
pub struct WrapperBinding {
    runtime: Runtime,
}

impl WrapperBinding {
    pub fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }
}

impl BindingAccessor for WrapperBinding {
    fn native_pointer_of(
        &self,
        wrapper: ObjectHandle,
        expected_type: &str,
    ) -> BridgeResult<NativePtr> {
        self.runtime
            .native_ptr(wrapper)
            .filter(|ptr| !ptr.is_null())
            .ok_or_else(|| BridgeError::Binding {
                object: wrapper,
                expected: expected_type.to_string(),
            })
    }
}
