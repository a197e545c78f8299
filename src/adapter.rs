//! Universal endpoints bridging native signals into managed receivers.
//!
//! One endpoint serves every managed receiver of a `(transmitter, signal)`
//! pair. It is created with the first receiver and destroyed with the last.

use rustc_hash::FxHashMap;
use signalbridge_core::{NameHash, NativePtr, ObjectHandle};
use tracing::debug;

use crate::error::{BridgeError, BridgeResult, owned_name};
use crate::services::{MemberRef, MetaObjectService, TypeMapper, UniversalTarget};
use crate::signature::SignatureDescriptor;

/// A live native endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Where the native connection originates (possibly a universal signal).
    pub source: MemberRef,
    /// The universal slot the native side created.
    pub slot: MemberRef,
    pub descriptor: SignatureDescriptor,
}

/// The signal to connect from: `txrx` itself if it declares `signal`, or an
/// existing universal signal standing in for it.
pub fn find_signal(
    meta: &dyn MetaObjectService,
    txrx: NativePtr,
    signal: &str,
) -> Option<MemberRef> {
    meta.find_universal_signal(txrx, signal)
}

/// Like [`find_signal`], creating a universal signal when none exists.
pub fn find_or_create_signal(
    meta: &dyn MetaObjectService,
    txrx: NativePtr,
    signal: &str,
) -> BridgeResult<MemberRef> {
    find_signal(meta, txrx, signal)
        .or_else(|| meta.create_universal_signal(txrx, signal))
        .ok_or_else(|| BridgeError::AdapterUnavailable {
            signal: signal.to_string(),
        })
}

/// Endpoints keyed by managed transmitter and normalized signal name.
#[derive(Debug, Default)]
pub struct UniversalAdapter {
    endpoints: FxHashMap<(ObjectHandle, NameHash), Endpoint>,
}

impl UniversalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, tx: ObjectHandle, signal: &str) -> Option<&Endpoint> {
        self.endpoints.get(&(tx, NameHash::of(signal)))
    }

    /// Make room for one more endpoint so a later [`insert`](Self::insert)
    /// cannot fail.
    pub fn reserve(&mut self) -> BridgeResult<()> {
        self.endpoints.try_reserve(1)?;
        Ok(())
    }

    pub fn insert(&mut self, tx: ObjectHandle, signal: &str, endpoint: Endpoint) {
        self.endpoints.insert((tx, NameHash::of(signal)), endpoint);
    }

    /// Forget the endpoint for `signal` on `tx`, handing it back for teardown.
    pub fn remove(&mut self, tx: ObjectHandle, signal: &str) -> Option<Endpoint> {
        self.endpoints.remove(&(tx, NameHash::of(signal)))
    }

    /// Forget every endpoint of `tx`.
    pub fn remove_transmitter(&mut self, tx: ObjectHandle) -> Vec<Endpoint> {
        let keys: Vec<_> = self
            .endpoints
            .keys()
            .filter(|(owner, _)| *owner == tx)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.endpoints.remove(&key))
            .collect()
    }

    /// Transmitters with at least one endpoint.
    pub fn transmitters(&self) -> impl Iterator<Item = ObjectHandle> + '_ {
        self.endpoints.keys().map(|(owner, _)| *owner)
    }

    /// Forget every endpoint.
    pub fn drain(&mut self) -> Vec<Endpoint> {
        self.endpoints.drain().map(|(_, endpoint)| endpoint).collect()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Materialize a universal slot for `source` that calls `target`.
///
/// Nothing is created unless the descriptor parses into owned storage. The
/// slot is not yet connected to `source`.
pub fn adapt_receiver(
    meta: &dyn MetaObjectService,
    mapper: &dyn TypeMapper,
    source: &MemberRef,
    target: Box<dyn UniversalTarget>,
) -> BridgeResult<Endpoint> {
    let descriptor = SignatureDescriptor::parse(&source.member, mapper)?;
    let source = MemberRef {
        object: source.object,
        member: owned_name(&source.member)?,
    };

    let slot = meta
        .create_universal_slot(Some(source.object), &descriptor, target)
        .ok_or_else(|| BridgeError::AdapterUnavailable {
            signal: descriptor.to_string(),
        })?;
    debug!(signal = %descriptor, slot = %slot.object, "universal slot created");

    Ok(Endpoint {
        source,
        slot,
        descriptor,
    })
}

/// Disconnect and destroy a removed endpoint on the native side.
pub fn tear_down(meta: &dyn MetaObjectService, endpoint: &Endpoint) -> bool {
    let disconnected = meta.disconnect(
        endpoint.source.object,
        &endpoint.source.member,
        endpoint.slot.object,
        &endpoint.slot.member,
    );
    meta.destroy_universal_slot(endpoint.slot.object);
    debug!(slot = %endpoint.slot.object, disconnected, "universal slot destroyed");
    disconnected
}
