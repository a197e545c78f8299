//! Signal/slot bridge between a native meta-object system and a managed,
//! reference-counted object model.
//!
//! Signals raised on either side reach receivers on either side:
//!
//! - native signal to native slot or signal: handed straight to the native
//!   meta-object service
//! - native signal to managed callable: routed through a universal endpoint
//!   the adapter asks the native side to create
//! - managed signal to anything: delivered from this crate's connection
//!   registry, with arity fallback for receivers taking fewer arguments
//!
//! ## Example
//!
//! ```ignore
//! let bridge = Bridge::new(runtime.clone(), meta);
//! bridge.connect(button, "clicked", handler, None, ConnectionType::Auto)?;
//! bridge.emit(button, "clicked", &[Dynamic::Bool(true)])?;
//! ```

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod error;
pub mod invoke;
pub mod member;
pub mod observer;
pub mod registry;
pub mod services;
pub mod signature;
pub mod slot;

pub use bridge::{Bridge, BridgeBuilder, NATIVE_OBJECT_TYPE, Sender};
pub use config::{BridgeConfig, BridgeProperty};
pub use error::{BridgeError, BridgeResult, ReferenceKind};
pub use invoke::{Invocation, call_with_arity_fallback};
pub use member::{MemberKind, MemberName, SIGNAL_SENTINEL, SLOT_SENTINEL};
pub use observer::{NotObservable, Observer};
pub use registry::{Connection, ConnectionRegistry};
pub use services::{
    BindingAccessor, ConnectionType, MemberRef, MetaObjectService, OpaqueTypeMapper, TypeMapper,
    UniversalTarget, WrapperBinding,
};
pub use signature::{ArgKind, ArgType, Arguments, ScalarKind, SignatureDescriptor};
pub use slot::{Held, SlotRecord};

pub mod prelude {
    pub use crate::bridge::{Bridge, Sender};
    pub use crate::config::{BridgeConfig, BridgeProperty};
    pub use crate::error::{BridgeError, BridgeResult};
    pub use crate::invoke::Invocation;
    pub use crate::services::{ConnectionType, MemberRef, MetaObjectService, UniversalTarget};
    pub use signalbridge_core::{
        Arity, CallContext, Dynamic, Exception, ExceptionKind, NativePtr, ObjectHandle, Runtime,
    };
}
