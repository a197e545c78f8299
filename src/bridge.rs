//! The signal router.
//!
//! Signal names carrying the `2` sentinel are native: they live in the
//! transmitter's meta-object table and their connections are owned by the
//! native side. Everything else is a managed signal whose receivers live in
//! this bridge's [`ConnectionRegistry`].
//!
//! Managed receivers of a native signal share one universal endpoint per
//! `(transmitter, signal)` and are tracked in a second registry, so the
//! endpoint lives exactly as long as it has receivers.
//!
//! Connections are released when a receiver is found dead during delivery,
//! when their transmitter is destroyed (swept on the next connect or emit)
//! and when the bridge itself is dropped.
//!
//! No `RefCell` borrow is held across a call into managed code or into the
//! native services; both may re-enter the bridge.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashSet;
use signalbridge_core::{Dynamic, NativePtr, ObjectFlags, ObjectHandle, Runtime};
use tracing::{debug, trace};

use crate::adapter::{self, UniversalAdapter};
use crate::config::{BridgeConfig, BridgeProperty};
use crate::error::{BridgeError, BridgeResult};
use crate::invoke::{self, Invocation, Resolution};
use crate::member::{MemberKind, MemberName};
use crate::registry::{Connection, ConnectionRegistry};
use crate::services::{
    BindingAccessor, ConnectionType, MemberRef, MetaObjectService, OpaqueTypeMapper, TypeMapper,
    UniversalTarget, WrapperBinding,
};
use crate::slot::SlotRecord;

/// Native type every transmitter and named receiver must wrap.
pub const NATIVE_OBJECT_TYPE: &str = "QObject";

/// The object whose signal is currently being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    Native(NativePtr),
    Managed(ObjectHandle),
}

struct BridgeShared {
    runtime: Runtime,
    meta: Rc<dyn MetaObjectService>,
    mapper: Box<dyn TypeMapper>,
    binding: Box<dyn BindingAccessor>,
    config: BridgeConfig,
    registry: RefCell<ConnectionRegistry>,
    native_receivers: RefCell<ConnectionRegistry>,
    adapter: RefCell<UniversalAdapter>,
    sender: Cell<Option<ObjectHandle>>,
    /// Runtime free count at the last dead-transmitter sweep.
    swept_at: Cell<u64>,
}

impl Drop for BridgeShared {
    fn drop(&mut self) {
        let runtime = &self.runtime;
        let removed =
            self.registry.get_mut().clear(runtime) + self.native_receivers.get_mut().clear(runtime);
        let endpoints = self.adapter.get_mut().drain();
        for endpoint in &endpoints {
            adapter::tear_down(self.meta.as_ref(), endpoint);
        }
        debug!(removed, endpoints = endpoints.len(), "bridge dropped");
    }
}

/// Restores the previous managed sender when an emission ends.
struct SenderScope<'a> {
    cell: &'a Cell<Option<ObjectHandle>>,
    previous: Option<ObjectHandle>,
}

impl<'a> SenderScope<'a> {
    fn enter(cell: &'a Cell<Option<ObjectHandle>>, sender: ObjectHandle) -> Self {
        let previous = cell.replace(Some(sender));
        Self { cell, previous }
    }
}

impl Drop for SenderScope<'_> {
    fn drop(&mut self) {
        self.cell.set(self.previous);
    }
}

/// Routes signals between the native meta-object system and managed
/// receivers.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Bridge {
    shared: Rc<BridgeShared>,
}

/// Builder for a [`Bridge`] with non-default collaborators.
pub struct BridgeBuilder {
    runtime: Runtime,
    meta: Rc<dyn MetaObjectService>,
    mapper: Box<dyn TypeMapper>,
    binding: Option<Box<dyn BindingAccessor>>,
    config: BridgeConfig,
}

impl BridgeBuilder {
    pub fn type_mapper(mut self, mapper: impl TypeMapper + 'static) -> Self {
        self.mapper = Box::new(mapper);
        self
    }

    pub fn binding(mut self, binding: impl BindingAccessor + 'static) -> Self {
        self.binding = Some(Box::new(binding));
        self
    }

    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Bridge {
        let binding = self
            .binding
            .unwrap_or_else(|| Box::new(WrapperBinding::new(self.runtime.clone())));
        let swept_at = self.runtime.free_count();
        Bridge {
            shared: Rc::new(BridgeShared {
                runtime: self.runtime,
                meta: self.meta,
                mapper: self.mapper,
                binding,
                config: self.config,
                registry: RefCell::new(ConnectionRegistry::new()),
                native_receivers: RefCell::new(ConnectionRegistry::new()),
                adapter: RefCell::new(UniversalAdapter::new()),
                sender: Cell::new(None),
                swept_at: Cell::new(swept_at),
            }),
        }
    }
}

impl Bridge {
    /// A bridge with default type mapping, binding and configuration.
    pub fn new(runtime: Runtime, meta: Rc<dyn MetaObjectService>) -> Self {
        Self::builder(runtime, meta).build()
    }

    pub fn builder(runtime: Runtime, meta: Rc<dyn MetaObjectService>) -> BridgeBuilder {
        BridgeBuilder {
            runtime,
            meta,
            mapper: Box::new(OpaqueTypeMapper),
            binding: None,
            config: BridgeConfig::default(),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.shared.runtime
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    fn meta(&self) -> &dyn MetaObjectService {
        self.shared.meta.as_ref()
    }

    fn same_name(&self) -> impl Fn(&str, &str) -> bool + '_ {
        move |a: &str, b: &str| self.shared.meta.same_name(a, b)
    }

    fn native_ptr(&self, object: ObjectHandle) -> BridgeResult<NativePtr> {
        self.shared
            .binding
            .native_pointer_of(object, NATIVE_OBJECT_TYPE)
    }

    /// Connect `signal` on `tx` to a receiver.
    ///
    /// With no `member`, `rx` itself is the receiver: a bound method, a
    /// wrapped native method or any other callable. With a `member`, it names
    /// a native slot (`1`), a native signal (`2`) or a managed signal on `rx`.
    ///
    /// Returns what the native side reported for native signals, and `true`
    /// for managed ones.
    pub fn connect(
        &self,
        tx: ObjectHandle,
        signal: &str,
        rx: ObjectHandle,
        member: Option<&str>,
        kind: ConnectionType,
    ) -> BridgeResult<bool> {
        self.sweep_dead_transmitters();
        let parsed = MemberName::parse(signal);
        if parsed.kind != MemberKind::NativeSignal {
            let slot = SlotRecord::capture(&self.shared.runtime, rx, member, &self.shared.config)?;
            let registered =
                self.shared
                    .registry
                    .borrow_mut()
                    .connect(tx, signal, slot.clone(), &self.same_name());
            if let Err(err) = registered {
                slot.release(&self.shared.runtime);
                return Err(err);
            }
            debug!(%tx, signal, %rx, member, "managed signal connected");
            return Ok(true);
        }

        let tx_ptr = self.native_ptr(tx)?;
        let source = adapter::find_or_create_signal(self.meta(), tx_ptr, parsed.text)?;

        if let Some(member) = member.map(MemberName::parse).filter(MemberName::is_native) {
            let target = self.native_receiver(rx, member, true)?;
            let connected = self.meta().connect(
                source.object,
                &source.member,
                target.object,
                &target.member,
                kind,
            );
            debug!(%tx, signal, %rx, member = member.text, connected, "native signal connected");
            return Ok(connected);
        }

        self.connect_through_endpoint(tx, signal, source, rx, member, kind)
    }

    /// Register a managed receiver of a native signal, creating the shared
    /// endpoint with the first one.
    fn connect_through_endpoint(
        &self,
        tx: ObjectHandle,
        signal: &str,
        source: MemberRef,
        rx: ObjectHandle,
        member: Option<&str>,
        kind: ConnectionType,
    ) -> BridgeResult<bool> {
        let slot = SlotRecord::capture(&self.shared.runtime, rx, member, &self.shared.config)?;
        let has_endpoint = self.shared.adapter.borrow().endpoint(tx, signal).is_some();

        if !has_endpoint {
            self.shared.adapter.borrow_mut().reserve()?;
            let target = Box::new(EndpointDispatch {
                bridge: Rc::downgrade(&self.shared),
                tx,
                signal: signal.to_string(),
            });
            let endpoint = match adapter::adapt_receiver(
                self.meta(),
                self.shared.mapper.as_ref(),
                &source,
                target,
            ) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    slot.release(&self.shared.runtime);
                    return Err(err);
                }
            };

            let connected = self.meta().connect(
                endpoint.source.object,
                &endpoint.source.member,
                endpoint.slot.object,
                &endpoint.slot.member,
                kind,
            );
            if !connected {
                self.meta().destroy_universal_slot(endpoint.slot.object);
                slot.release(&self.shared.runtime);
                debug!(%tx, signal, "native side refused universal slot");
                return Ok(false);
            }
            self.shared
                .runtime
                .insert_flags(tx, ObjectFlags::POSSIBLE_PROXY);
            self.shared.adapter.borrow_mut().insert(tx, signal, endpoint);
        }

        let registered =
            self.shared
                .native_receivers
                .borrow_mut()
                .connect(tx, signal, slot.clone(), &self.same_name());
        if let Err(err) = registered {
            slot.release(&self.shared.runtime);
            if !has_endpoint {
                self.drop_endpoint_if_unused(tx, signal);
            }
            return Err(err);
        }
        debug!(%tx, signal, %rx, member, "managed receiver attached to native signal");
        Ok(true)
    }

    /// Resolve `rx` plus a `1`/`2` member to the native object and member
    /// text to connect to.
    fn native_receiver(
        &self,
        rx: ObjectHandle,
        member: MemberName<'_>,
        create: bool,
    ) -> BridgeResult<MemberRef> {
        let rx_ptr = self.native_ptr(rx)?;
        if member.kind != MemberKind::NativeSignal {
            return Ok(MemberRef::new(rx_ptr, member.text));
        }
        if create {
            adapter::find_or_create_signal(self.meta(), rx_ptr, member.text)
        } else {
            adapter::find_signal(self.meta(), rx_ptr, member.text)
                .ok_or_else(|| BridgeError::invalid_signal(member.text))
        }
    }

    /// Undo a matching [`connect`](Self::connect).
    ///
    /// Returns whether a connection was removed.
    pub fn disconnect(
        &self,
        tx: ObjectHandle,
        signal: &str,
        rx: ObjectHandle,
        member: Option<&str>,
    ) -> BridgeResult<bool> {
        let parsed = MemberName::parse(signal);
        if parsed.kind != MemberKind::NativeSignal {
            let removed = self.shared.registry.borrow_mut().disconnect(
                &self.shared.runtime,
                tx,
                signal,
                rx,
                member,
                &self.same_name(),
            );
            debug!(%tx, signal, %rx, member, removed, "managed signal disconnected");
            return Ok(removed);
        }

        if let Some(member) = member.map(MemberName::parse).filter(MemberName::is_native) {
            let tx_ptr = self.native_ptr(tx)?;
            let target = match self.native_receiver(rx, member, false) {
                Ok(target) => target,
                Err(BridgeError::InvalidReference { .. }) => return Ok(false),
                Err(err) => return Err(err),
            };
            let source = adapter::find_signal(self.meta(), tx_ptr, parsed.text)
                .unwrap_or_else(|| MemberRef::new(tx_ptr, parsed.text));
            let removed =
                self.meta()
                    .disconnect(source.object, &source.member, target.object, &target.member);
            debug!(%tx, signal, %rx, member = member.text, removed, "native signal disconnected");
            return Ok(removed);
        }

        let removed = self.shared.native_receivers.borrow_mut().disconnect(
            &self.shared.runtime,
            tx,
            signal,
            rx,
            member,
            &self.same_name(),
        );
        if removed {
            self.drop_endpoint_if_unused(tx, signal);
        }
        debug!(%tx, signal, %rx, member, removed, "managed receiver detached from native signal");
        Ok(removed)
    }

    fn drop_endpoint_if_unused(&self, tx: ObjectHandle, signal: &str) {
        let same_name = self.same_name();
        let endpoint = {
            let mut receivers = self.shared.native_receivers.borrow_mut();
            if receivers.receiver_count(tx, signal, &same_name) > 0 {
                return;
            }
            receivers.prune_signal(tx, signal, &same_name);
            self.shared.adapter.borrow_mut().remove(tx, signal)
        };
        if let Some(endpoint) = endpoint {
            adapter::tear_down(self.meta(), &endpoint);
        }
    }

    /// Emit `signal` on `tx`.
    ///
    /// Native signals are emitted through the meta-object table by base
    /// name. Managed signals are delivered to each receiver, most recently
    /// connected first, stopping at the first failure. Emitting with no
    /// receivers, or on a transmitter whose signals are blocked, succeeds
    /// without doing anything.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn emit(&self, tx: ObjectHandle, signal: &str, args: &[Dynamic]) -> BridgeResult<()> {
        self.sweep_dead_transmitters();
        let parsed = MemberName::parse(signal);
        let tx_ptr = match self.native_ptr(tx) {
            Ok(ptr) => Some(ptr),
            Err(_) if parsed.kind != MemberKind::NativeSignal => None,
            Err(err) => return Err(err),
        };

        if let Some(ptr) = tx_ptr
            && self.shared.config.flag(BridgeProperty::HonourBlockedSignals)
            && self.meta().signals_blocked(ptr)
        {
            trace!(%tx, signal, "signals blocked");
            return Ok(());
        }

        if parsed.kind == MemberKind::NativeSignal {
            let base = parsed.base_name();
            let Some(ptr) = tx_ptr.filter(|ptr| self.meta().has_signal(*ptr, base)) else {
                return Err(BridgeError::invalid_signal(parsed.text));
            };
            trace!(%tx, signal = base, "emitting native signal");
            return self.meta().emit(ptr, base, args).map_err(BridgeError::from);
        }

        let receivers =
            self.shared
                .registry
                .borrow()
                .snapshot(tx, signal, &self.same_name())?;
        if receivers.is_empty() {
            return Ok(());
        }

        self.meta().forget_sender();
        let _scope = SenderScope::enter(&self.shared.sender, tx);
        trace!(%tx, signal, receivers = receivers.len(), "emitting managed signal");
        self.deliver(&self.shared.registry, tx, signal, &receivers, args)
    }

    /// Invoke each still-connected receiver in turn. Receivers found dead are
    /// removed from `registry`.
    fn deliver(
        &self,
        registry: &RefCell<ConnectionRegistry>,
        tx: ObjectHandle,
        signal: &str,
        receivers: &[Rc<Connection>],
        args: &[Dynamic],
    ) -> BridgeResult<()> {
        for conn in receivers.iter().filter(|conn| conn.is_connected()) {
            if self.invoke_slot(conn.slot(), args)? == Invocation::ReceiverGone {
                registry.borrow_mut().remove_connection(
                    &self.shared.runtime,
                    tx,
                    signal,
                    conn,
                    &self.same_name(),
                );
                debug!(%tx, signal, receiver = %conn.slot().receiver(), "dead receiver pruned");
            }
        }
        Ok(())
    }

    /// Deliver a native signal to the managed receivers attached to its
    /// universal endpoint.
    pub fn dispatch_native_signal(
        &self,
        tx: ObjectHandle,
        signal: &str,
        args: &[Dynamic],
    ) -> BridgeResult<()> {
        let receivers =
            self.shared
                .native_receivers
                .borrow()
                .snapshot(tx, signal, &self.same_name())?;
        trace!(%tx, signal, receivers = receivers.len(), "dispatching native signal");
        let delivered = self.deliver(&self.shared.native_receivers, tx, signal, &receivers, args);
        self.drop_endpoint_if_unused(tx, signal);
        delivered
    }

    /// Invoke one slot with `args`, applying arity fallback.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn invoke_slot(&self, slot: &SlotRecord, args: &[Dynamic]) -> BridgeResult<Invocation> {
        let runtime = &self.shared.runtime;
        match invoke::resolve(runtime, slot)? {
            Resolution::Gone => {
                trace!(receiver = %slot.receiver(), "receiver gone");
                Ok(Invocation::ReceiverGone)
            }
            Resolution::Forward { receiver, signal } => {
                self.emit(receiver, &signal, args)?;
                Ok(Invocation::Forwarded)
            }
            Resolution::Call {
                callable,
                transient,
            } => {
                let result = invoke::call_with_arity_fallback(
                    runtime,
                    callable,
                    args,
                    self.shared.config.retry_limit(),
                );
                if let Some(method) = transient {
                    runtime.release(method);
                }
                let (value, dropped) = result?;
                Ok(Invocation::Delivered { value, dropped })
            }
        }
    }

    /// Invoke one slot, discarding its result.
    pub fn emit_to_slot(&self, slot: &SlotRecord, args: &[Dynamic]) -> BridgeResult<()> {
        self.invoke_slot(slot, args).map(|_| ())
    }

    /// The object whose signal is being delivered, if any.
    ///
    /// A native sender is always more recent than a managed one.
    pub fn sender(&self) -> Option<Sender> {
        self.meta()
            .last_sender()
            .map(Sender::Native)
            .or_else(|| self.shared.sender.get().map(Sender::Managed))
    }

    /// Tear down every connection of `tx`: managed buckets, managed
    /// receivers of its native signals and their endpoints.
    pub fn release_transmitter(&self, tx: ObjectHandle) -> usize {
        let runtime = &self.shared.runtime;
        let removed = self.shared.registry.borrow_mut().remove_transmitter(runtime, tx)
            + self
                .shared
                .native_receivers
                .borrow_mut()
                .remove_transmitter(runtime, tx);
        let endpoints = self.shared.adapter.borrow_mut().remove_transmitter(tx);
        for endpoint in &endpoints {
            adapter::tear_down(self.meta(), endpoint);
        }
        debug!(%tx, removed, endpoints = endpoints.len(), "transmitter released");
        removed
    }

    /// Release every transmitter destroyed since the last sweep.
    ///
    /// Skipped entirely while the runtime has freed nothing new.
    fn sweep_dead_transmitters(&self) {
        let runtime = &self.shared.runtime;
        let frees = runtime.free_count();
        if self.shared.swept_at.replace(frees) == frees {
            return;
        }
        let dead: FxHashSet<ObjectHandle> = self
            .shared
            .registry
            .borrow()
            .transmitters()
            .chain(self.shared.native_receivers.borrow().transmitters())
            .chain(self.shared.adapter.borrow().transmitters())
            .filter(|tx| !runtime.is_alive(*tx))
            .collect();
        for tx in dead {
            self.release_transmitter(tx);
        }
    }

    /// Receivers currently connected to `signal` on `tx`.
    pub fn receiver_count(&self, tx: ObjectHandle, signal: &str) -> usize {
        let registry = if MemberName::parse(signal).kind == MemberKind::NativeSignal {
            &self.shared.native_receivers
        } else {
            &self.shared.registry
        };
        registry.borrow().receiver_count(tx, signal, &self.same_name())
    }

    /// Whether a universal endpoint currently serves `signal` on `tx`.
    pub fn has_endpoint(&self, tx: ObjectHandle, signal: &str) -> bool {
        self.shared.adapter.borrow().endpoint(tx, signal).is_some()
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.shared.config)
            .field("endpoints", &self.shared.adapter.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Callback target of a universal endpoint.
///
/// Holds the bridge weakly: an endpoint outliving its bridge does nothing.
struct EndpointDispatch {
    bridge: Weak<BridgeShared>,
    tx: ObjectHandle,
    signal: String,
}

impl UniversalTarget for EndpointDispatch {
    fn invoke(&self, args: &[Dynamic]) -> BridgeResult<()> {
        let Some(shared) = self.bridge.upgrade() else {
            return Ok(());
        };
        Bridge { shared }.dispatch_native_signal(self.tx, &self.signal, args)
    }
}
