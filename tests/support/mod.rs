//! Test support: an in-memory native meta-object service and fixtures.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};
use signalbridge::member::base_name;
use signalbridge::prelude::*;
use signalbridge::{SignatureDescriptor, TypeMapper};
use signalbridge_core::same_name;

/// A native connection as recorded by [`FakeMeta`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeConnection {
    pub tx: NativePtr,
    pub signal: String,
    pub rx: NativePtr,
    pub member: String,
    pub kind: ConnectionType,
}

/// A call delivered to a native slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotCall {
    pub rx: NativePtr,
    pub slot: String,
    pub args: Vec<Dynamic>,
}

struct UniversalSlot {
    descriptor: SignatureDescriptor,
    target: Rc<dyn UniversalTarget>,
}

/// In-memory stand-in for the native meta-object system.
///
/// Objects declare signals by base name. Emitting a signal delivers to
/// universal slots through their targets, records calls to plain native
/// slots, and chains into connected signals.
#[derive(Default)]
pub struct FakeMeta {
    tables: RefCell<FxHashMap<NativePtr, Vec<String>>>,
    connections: RefCell<Vec<NativeConnection>>,
    universal_slots: RefCell<FxHashMap<NativePtr, UniversalSlot>>,
    universal_signals: RefCell<Vec<(NativePtr, String, NativePtr)>>,
    blocked: RefCell<FxHashSet<NativePtr>>,
    sender: Cell<Option<NativePtr>>,
    next_ptr: Cell<u64>,
    pub refuse_universal_slots: Cell<bool>,
    pub refuse_connections: Cell<bool>,
    pub emitted: RefCell<Vec<(NativePtr, String, Vec<Dynamic>)>>,
    pub slot_calls: RefCell<Vec<SlotCall>>,
    pub destroyed: RefCell<Vec<NativePtr>>,
    pub forgotten: Cell<usize>,
}

impl FakeMeta {
    pub fn new() -> Rc<Self> {
        let meta = Self::default();
        meta.next_ptr.set(0x1000);
        Rc::new(meta)
    }

    pub fn declare(&self, object: NativePtr, signals: &[&str]) {
        self.tables
            .borrow_mut()
            .entry(object)
            .or_default()
            .extend(signals.iter().map(|s| s.to_string()));
    }

    pub fn block(&self, object: NativePtr, blocked: bool) {
        if blocked {
            self.blocked.borrow_mut().insert(object);
        } else {
            self.blocked.borrow_mut().remove(&object);
        }
    }

    pub fn connections(&self) -> Vec<NativeConnection> {
        self.connections.borrow().clone()
    }

    pub fn universal_slot_count(&self) -> usize {
        self.universal_slots.borrow().len()
    }

    pub fn universal_descriptor(&self, slot: NativePtr) -> Option<SignatureDescriptor> {
        self.universal_slots
            .borrow()
            .get(&slot)
            .map(|s| s.descriptor.clone())
    }

    /// Simulate `tx` emitting `signal` from native code.
    pub fn fire(&self, tx: NativePtr, signal: &str, args: &[Dynamic]) -> Result<(), Exception> {
        let base = base_name(signal).to_string();
        let targets: Vec<NativeConnection> = self
            .connections
            .borrow()
            .iter()
            .filter(|c| base_name(&c.signal) == base && c.tx == tx)
            .cloned()
            .collect();

        for conn in targets {
            let universal = self
                .universal_slots
                .borrow()
                .get(&conn.rx)
                .map(|s| s.target.clone());
            if let Some(target) = universal {
                let previous = self.sender.replace(Some(tx));
                let result = target.invoke(args);
                self.sender.set(previous);
                result.map_err(|err| match err.exception() {
                    Some(exc) => exc.clone(),
                    None => Exception::runtime_error(err.to_string()),
                })?;
            } else if self.tables.borrow().contains_key(&conn.rx)
                && self.has_signal(conn.rx, base_name(&conn.member))
            {
                self.fire(conn.rx, &conn.member, args)?;
            } else {
                self.slot_calls.borrow_mut().push(SlotCall {
                    rx: conn.rx,
                    slot: conn.member.clone(),
                    args: args.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn allocate(&self) -> NativePtr {
        let ptr = self.next_ptr.get();
        self.next_ptr.set(ptr + 0x10);
        NativePtr(ptr)
    }
}

impl MetaObjectService for FakeMeta {
    fn has_signal(&self, tx: NativePtr, base: &str) -> bool {
        self.tables
            .borrow()
            .get(&tx)
            .is_some_and(|signals| signals.iter().any(|s| base_name(s) == base))
    }

    fn emit(&self, tx: NativePtr, base: &str, args: &[Dynamic]) -> Result<(), Exception> {
        self.emitted
            .borrow_mut()
            .push((tx, base.to_string(), args.to_vec()));
        self.fire(tx, base, args)
    }

    fn connect(
        &self,
        tx: NativePtr,
        signal: &str,
        rx: NativePtr,
        member: &str,
        kind: ConnectionType,
    ) -> bool {
        if self.refuse_connections.get() {
            return false;
        }
        self.connections.borrow_mut().push(NativeConnection {
            tx,
            signal: signal.to_string(),
            rx,
            member: member.to_string(),
            kind,
        });
        true
    }

    fn disconnect(&self, tx: NativePtr, signal: &str, rx: NativePtr, member: &str) -> bool {
        let mut connections = self.connections.borrow_mut();
        let found = connections.iter().position(|c| {
            c.tx == tx && c.rx == rx && same_name(&c.signal, signal) && same_name(&c.member, member)
        });
        found.map(|index| connections.remove(index)).is_some()
    }

    fn find_universal_signal(&self, txrx: NativePtr, signal: &str) -> Option<MemberRef> {
        if self.has_signal(txrx, base_name(signal)) {
            return Some(MemberRef::new(txrx, signal));
        }
        self.universal_signals
            .borrow()
            .iter()
            .find(|(owner, name, _)| *owner == txrx && same_name(name, signal))
            .map(|(_, name, proxy)| MemberRef::new(*proxy, name.clone()))
    }

    fn create_universal_signal(&self, txrx: NativePtr, signal: &str) -> Option<MemberRef> {
        let proxy = self.allocate();
        self.declare(proxy, &[signal]);
        self.universal_signals
            .borrow_mut()
            .push((txrx, signal.to_string(), proxy));
        Some(MemberRef::new(proxy, signal))
    }

    fn create_universal_slot(
        &self,
        _tx: Option<NativePtr>,
        descriptor: &SignatureDescriptor,
        target: Box<dyn UniversalTarget>,
    ) -> Option<MemberRef> {
        if self.refuse_universal_slots.get() {
            return None;
        }
        let ptr = self.allocate();
        self.universal_slots.borrow_mut().insert(
            ptr,
            UniversalSlot {
                descriptor: descriptor.clone(),
                target: Rc::from(target),
            },
        );
        Some(MemberRef::new(ptr, "unislot()"))
    }

    fn destroy_universal_slot(&self, slot: NativePtr) {
        if self.universal_slots.borrow_mut().remove(&slot).is_some() {
            self.destroyed.borrow_mut().push(slot);
        }
    }

    fn signals_blocked(&self, tx: NativePtr) -> bool {
        self.blocked.borrow().contains(&tx)
    }

    fn last_sender(&self) -> Option<NativePtr> {
        self.sender.get()
    }

    fn forget_sender(&self) {
        self.forgotten.set(self.forgotten.get() + 1);
        self.sender.set(None);
    }
}

/// Classifies `QString` as a string; everything else is opaque.
pub struct QtTypes;

impl TypeMapper for QtTypes {
    fn classify(&self, raw_type: &str) -> signalbridge::ArgKind {
        match raw_type {
            "QString" => signalbridge::ArgKind::String,
            _ => signalbridge::ArgKind::Opaque,
        }
    }
}

/// Calls recorded by fixture receivers: (receiver label, arguments).
pub type CallLog = Rc<RefCell<Vec<(String, Vec<Dynamic>)>>>;

pub struct World {
    pub runtime: Runtime,
    pub meta: Rc<FakeMeta>,
    pub bridge: Bridge,
    pub widget: ObjectHandle,
    pub log: CallLog,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::new())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let runtime = Runtime::new();
        let meta = FakeMeta::new();
        let bridge = Bridge::builder(runtime.clone(), meta.clone())
            .type_mapper(QtTypes)
            .config(config)
            .build();
        let log: CallLog = Rc::default();
        let widget = widget_class(&runtime, log.clone());
        Self {
            runtime,
            meta,
            bridge,
            widget,
            log,
        }
    }

    /// A wrapper instance around a fresh native object declaring `signals`.
    pub fn wrapper(&self, signals: &[&str]) -> (ObjectHandle, NativePtr) {
        let ptr = self.meta.allocate();
        self.meta.declare(ptr, signals);
        let handle = self.runtime.wrap_native(self.widget, ptr).unwrap();
        (handle, ptr)
    }

    /// A plain managed instance with no native counterpart.
    pub fn plain(&self) -> ObjectHandle {
        self.runtime.instantiate(self.widget).unwrap()
    }

    /// A free function with `arity` that logs its arguments under `label`.
    pub fn recorder(&self, label: &str, arity: Arity) -> ObjectHandle {
        let log = self.log.clone();
        let tag = label.to_string();
        self.runtime.function(label, arity, move |ctx| {
            log.borrow_mut().push((tag.clone(), ctx.args().to_vec()));
            Ok(())
        })
    }

    pub fn method(&self, instance: ObjectHandle, name: &str) -> ObjectHandle {
        self.runtime.get_attr(instance, name).unwrap()
    }

    pub fn calls(&self) -> Vec<(String, Vec<Dynamic>)> {
        self.log.borrow().clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.log.borrow().iter().map(|(label, _)| label.clone()).collect()
    }
}

/// `Widget`: managed methods `on_pair` (2 args), `on_any` (any args),
/// `explode` (raises inside its body) and native methods `repaint` (0 args)
/// and `resize` (2 ints).
fn widget_class(runtime: &Runtime, log: CallLog) -> ObjectHandle {
    let pair_log = log.clone();
    let any_log = log.clone();
    let repaint_log = log.clone();
    let resize_log = log;
    runtime
        .class("Widget")
        .method("on_pair", Arity::exact(2), move |ctx| {
            pair_log
                .borrow_mut()
                .push(("on_pair".to_string(), ctx.args().to_vec()));
            Ok(())
        })
        .method("on_any", Arity::at_least(0), move |ctx| {
            any_log
                .borrow_mut()
                .push(("on_any".to_string(), ctx.args().to_vec()));
            Ok(())
        })
        .method("explode", Arity::at_least(0), |_| {
            Err(Exception::type_error("unsupported operand"))
        })
        .native_method("repaint", Arity::exact(0), move |ctx| {
            let this = ctx.this_native()?;
            repaint_log
                .borrow_mut()
                .push((format!("repaint@{this}"), Vec::new()));
            Ok(())
        })
        .native_method("resize", Arity::exact(2), move |ctx| {
            let width: i32 = ctx.arg(0)?;
            let height: i32 = ctx.arg(1)?;
            resize_log.borrow_mut().push((
                "resize".to_string(),
                vec![Dynamic::Int(width.into()), Dynamic::Int(height.into())],
            ));
            Ok(())
        })
        .build()
}

pub fn ints(values: &[i64]) -> Vec<Dynamic> {
    values.iter().copied().map(Dynamic::Int).collect()
}
