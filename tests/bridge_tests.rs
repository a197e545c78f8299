//! End-to-end tests for the bridge against an in-memory native meta-object
//! service.

mod support;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use signalbridge::prelude::*;
use signalbridge::{ArgKind, ReferenceKind, ScalarKind, SlotRecord};
use signalbridge_core::{CallableShape, ObjectFlags};
use support::{World, ints};

const AUTO: ConnectionType = ConnectionType::Auto;

// =============================================================================
// Managed signals
// =============================================================================

#[test]
fn connect_then_disconnect_leaves_bucket_empty() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(1));

    assert!(world.bridge.connect(tx, "progress", handler, None, AUTO).unwrap());
    assert_eq!(world.bridge.receiver_count(tx, "progress"), 1);

    assert!(world.bridge.disconnect(tx, "progress", handler, None).unwrap());
    assert_eq!(world.bridge.receiver_count(tx, "progress"), 0);

    world.bridge.emit(tx, "progress", &ints(&[1])).unwrap();
    assert!(world.calls().is_empty());
}

#[test]
fn emit_without_receivers_is_a_no_op() {
    let world = World::new();
    let tx = world.plain();
    world.bridge.emit(tx, "nobody_listens", &ints(&[1, 2])).unwrap();
    assert_eq!(world.meta.forgotten.get(), 0);
}

#[test]
fn disconnect_unknown_receiver_reports_false() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));
    assert!(!world.bridge.disconnect(tx, "progress", handler, None).unwrap());
}

#[test]
fn bound_method_receives_leading_arguments() {
    let world = World::new();
    let tx = world.plain();
    let receiver = world.plain();
    let method = world.method(receiver, "on_pair");

    world.bridge.connect(tx, "moved", method, None, AUTO).unwrap();
    world.runtime.release(method);
    world.bridge.emit(tx, "moved", &ints(&[1, 2, 3, 4])).unwrap();

    assert_eq!(world.calls(), vec![("on_pair".to_string(), ints(&[1, 2]))]);
}

#[test]
fn arity_fallback_counts_dropped_arguments() {
    let world = World::new();
    let receiver = world.plain();
    let method = world.method(receiver, "on_pair");
    let slot =
        SlotRecord::capture(world.bridge.runtime(), method, None, world.bridge.config()).unwrap();

    let outcome = world.bridge.invoke_slot(&slot, &ints(&[1, 2, 3, 4])).unwrap();
    assert_eq!(
        outcome,
        Invocation::Delivered {
            value: Dynamic::Void,
            dropped: 2
        }
    );
    slot.release(world.bridge.runtime());
}

#[test]
fn exhausted_fallback_reports_original_failure() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("needs_three", Arity::exact(3));
    world.bridge.connect(tx, "short", handler, None, AUTO).unwrap();

    let err = world.bridge.emit(tx, "short", &ints(&[1, 2])).unwrap_err();
    match err {
        BridgeError::ArityMismatch { attempts, original } => {
            assert_eq!(attempts, 3);
            assert_eq!(
                original.message,
                "needs_three() takes 3 positional arguments but 2 were given"
            );
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn fallback_can_be_disabled() {
    let world = World::with_config(BridgeConfig::new().with(BridgeProperty::ArityFallback, 0));
    let tx = world.plain();
    let receiver = world.plain();
    let method = world.method(receiver, "on_pair");
    world.bridge.connect(tx, "moved", method, None, AUTO).unwrap();

    let err = world.bridge.emit(tx, "moved", &ints(&[1, 2, 3])).unwrap_err();
    assert!(err.exception().is_some_and(Exception::is_immediate_type_error));
    assert!(world.calls().is_empty());
}

#[test]
fn failure_inside_receiver_is_not_retried() {
    let world = World::new();
    let tx = world.plain();
    let receiver = world.plain();
    let method = world.method(receiver, "explode");
    world.bridge.connect(tx, "go", method, None, AUTO).unwrap();

    let err = world.bridge.emit(tx, "go", &ints(&[1, 2, 3])).unwrap_err();
    let BridgeError::Exception(exc) = err else {
        panic!("expected the receiver's exception");
    };
    assert_eq!(exc.kind, ExceptionKind::TypeError);
    assert_eq!(exc.message, "unsupported operand");
    assert!(exc.has_traceback());
}

#[test]
fn destroyed_receiver_is_silently_skipped() {
    let world = World::new();
    let tx = world.plain();
    let receiver = world.plain();
    let method = world.method(receiver, "on_any");
    world.bridge.connect(tx, "tick", method, None, AUTO).unwrap();
    let slot =
        SlotRecord::capture(world.bridge.runtime(), method, None, world.bridge.config()).unwrap();

    world.runtime.release(method);
    world.runtime.release(receiver);
    assert!(!world.runtime.is_alive(receiver));

    world.bridge.emit(tx, "tick", &ints(&[1])).unwrap();
    assert!(world.calls().is_empty());
    assert_eq!(world.bridge.receiver_count(tx, "tick"), 0);
    assert_eq!(
        world.bridge.invoke_slot(&slot, &[]).unwrap(),
        Invocation::ReceiverGone
    );
}

#[test]
fn dead_receivers_are_pruned_and_release_their_parts() {
    let world = World::new();
    let tx = world.plain();
    let live = world.recorder("live", Arity::at_least(0));
    world.bridge.connect(tx, "tick", live, None, AUTO).unwrap();

    let method = world.method(world.plain(), "on_any");
    let func = match world.runtime.shape(method) {
        CallableShape::BoundMethod(bound) => bound.func,
        other => panic!("unexpected {other:?}"),
    };
    let baseline = world.runtime.ref_count(func).unwrap();
    for _ in 0..3 {
        let receiver = world.plain();
        let handler = world.method(receiver, "on_any");
        world.bridge.connect(tx, "tick", handler, None, AUTO).unwrap();
        world.runtime.release(handler);
        world.runtime.release(receiver);
    }
    assert_eq!(world.bridge.receiver_count(tx, "tick"), 4);
    assert_eq!(world.runtime.ref_count(func), Some(baseline + 3));

    world.bridge.emit(tx, "tick", &[]).unwrap();
    world.bridge.emit(tx, "tick", &[]).unwrap();

    assert_eq!(world.bridge.receiver_count(tx, "tick"), 1);
    assert_eq!(world.runtime.ref_count(func), Some(baseline));
    assert_eq!(world.labels(), vec!["live", "live"]);
}

#[test]
fn receiver_disconnecting_itself_does_not_disturb_fan_out() {
    let world = World::new();
    let tx = world.plain();
    let first = world.recorder("first", Arity::exact(1));
    let second = world.recorder("second", Arity::exact(1));

    let me: Rc<Cell<Option<ObjectHandle>>> = Rc::default();
    let bridge = world.bridge.clone();
    let log = world.log.clone();
    let slot_self = me.clone();
    let quitter = world
        .runtime
        .function("quitter", Arity::exact(1), move |ctx| {
            log.borrow_mut().push(("quitter".to_string(), ctx.args().to_vec()));
            if let Some(me) = slot_self.get() {
                bridge
                    .disconnect(tx, "tick", me, None)
                    .map_err(|err| Exception::runtime_error(err.to_string()))?;
            }
            Ok(())
        });
    me.set(Some(quitter));

    world.bridge.connect(tx, "tick", first, None, AUTO).unwrap();
    world.bridge.connect(tx, "tick", second, None, AUTO).unwrap();
    world.bridge.connect(tx, "tick", quitter, None, AUTO).unwrap();

    world.bridge.emit(tx, "tick", &ints(&[7])).unwrap();
    assert_eq!(world.labels(), vec!["quitter", "second", "first"]);

    world.log.borrow_mut().clear();
    world.bridge.emit(tx, "tick", &ints(&[8])).unwrap();
    assert_eq!(world.labels(), vec!["second", "first"]);
}

#[test]
fn receiver_disconnected_mid_emission_is_not_invoked() {
    let world = World::new();
    let tx = world.plain();
    let victim = world.recorder("victim", Arity::exact(0));

    let bridge = world.bridge.clone();
    let killer = world
        .runtime
        .function("killer", Arity::exact(0), move |_| {
            bridge
                .disconnect(tx, "tick", victim, None)
                .map_err(|err| Exception::runtime_error(err.to_string()))?;
            Ok(())
        });

    world.bridge.connect(tx, "tick", victim, None, AUTO).unwrap();
    world.bridge.connect(tx, "tick", killer, None, AUTO).unwrap();
    world.bridge.emit(tx, "tick", &[]).unwrap();

    assert!(world.calls().is_empty());
    assert_eq!(world.bridge.receiver_count(tx, "tick"), 1);
}

#[test]
fn signal_names_ignore_whitespace() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::at_least(0));

    world
        .bridge
        .connect(tx, "valueChanged(int,int)", handler, None, AUTO)
        .unwrap();
    world
        .bridge
        .emit(tx, "valueChanged( int , int )", &ints(&[1, 2]))
        .unwrap();
    assert_eq!(world.calls().len(), 1);

    assert!(world
        .bridge
        .disconnect(tx, "valueChanged( int , int )", handler, None)
        .unwrap());
    assert_eq!(world.bridge.receiver_count(tx, "valueChanged(int,int)"), 0);
}

#[test]
fn duplicate_connections_fire_independently() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));

    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert_eq!(world.calls().len(), 2);

    world.bridge.disconnect(tx, "ping", handler, None).unwrap();
    world.log.borrow_mut().clear();
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert_eq!(world.calls().len(), 1);
}

#[test]
fn fan_out_stops_at_first_failure() {
    let world = World::new();
    let tx = world.plain();
    let before = world.recorder("before", Arity::exact(0));
    let receiver = world.plain();
    let explode = world.method(receiver, "explode");

    world.bridge.connect(tx, "go", before, None, AUTO).unwrap();
    world.bridge.connect(tx, "go", explode, None, AUTO).unwrap();

    assert!(world.bridge.emit(tx, "go", &[]).is_err());
    assert!(world.calls().is_empty());
}

#[test]
fn plain_callables_are_kept_alive_by_default() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();

    world.runtime.release(handler);
    assert!(world.runtime.is_alive(handler));
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert_eq!(world.labels(), vec!["handler"]);

    world.bridge.disconnect(tx, "ping", handler, None).unwrap();
    assert!(!world.runtime.is_alive(handler));
}

#[test]
fn weakly_held_callables_may_die() {
    let world =
        World::with_config(BridgeConfig::new().with(BridgeProperty::KeepPlainCallablesAlive, 0));
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();

    world.runtime.release(handler);
    assert!(!world.runtime.is_alive(handler));
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert!(world.calls().is_empty());
    assert_eq!(world.bridge.receiver_count(tx, "ping"), 0);
}

#[test]
fn managed_sender_is_scoped_to_emission() {
    let world = World::new();
    let outer = world.plain();
    let inner = world.plain();
    let seen: Rc<RefCell<Vec<Option<Sender>>>> = Rc::default();

    let bridge = world.bridge.clone();
    let record = seen.clone();
    let inner_handler = world
        .runtime
        .function("inner", Arity::exact(0), move |_| {
            record.borrow_mut().push(bridge.sender());
            Ok(())
        });
    let bridge = world.bridge.clone();
    let record = seen.clone();
    let outer_handler = world
        .runtime
        .function("outer", Arity::exact(0), move |_| {
            bridge
                .emit(inner, "nested", &[])
                .map_err(|err| Exception::runtime_error(err.to_string()))?;
            record.borrow_mut().push(bridge.sender());
            Ok(())
        });

    world.bridge.connect(inner, "nested", inner_handler, None, AUTO).unwrap();
    world.bridge.connect(outer, "start", outer_handler, None, AUTO).unwrap();
    world.bridge.emit(outer, "start", &[]).unwrap();

    assert_eq!(
        *seen.borrow(),
        vec![Some(Sender::Managed(inner)), Some(Sender::Managed(outer))]
    );
    assert_eq!(world.bridge.sender(), None);
    assert_eq!(world.meta.forgotten.get(), 2);
}

// =============================================================================
// Managed signals to named receivers
// =============================================================================

#[test]
fn legacy_slot_calls_native_method_by_name() {
    let world = World::new();
    let tx = world.plain();
    let (rx, rx_ptr) = world.wrapper(&[]);

    world
        .bridge
        .connect(tx, "changed", rx, Some("1repaint()"), AUTO)
        .unwrap();
    world.bridge.emit(tx, "changed", &ints(&[1, 2])).unwrap();

    assert_eq!(world.labels(), vec![format!("repaint@{rx_ptr}")]);
}

#[test]
fn legacy_slot_with_unknown_name_is_an_error() {
    let world = World::new();
    let tx = world.plain();
    let (rx, _) = world.wrapper(&[]);

    world
        .bridge
        .connect(tx, "changed", rx, Some("1missing()"), AUTO)
        .unwrap();
    let err = world.bridge.emit(tx, "changed", &[]).unwrap_err();
    assert!(matches!(
        err,
        BridgeError::InvalidReference { kind: ReferenceKind::Slot, ref name } if name == "missing"
    ));
}

#[test]
fn legacy_slot_must_name_a_native_method() {
    let world = World::new();
    let tx = world.plain();
    let (rx, _) = world.wrapper(&[]);

    world
        .bridge
        .connect(tx, "changed", rx, Some("1on_any()"), AUTO)
        .unwrap();
    let err = world.bridge.emit(tx, "changed", &[]).unwrap_err();
    assert!(matches!(err, BridgeError::InvalidReference { kind: ReferenceKind::Slot, .. }));
    assert!(world.calls().is_empty());
}

#[test]
fn legacy_slot_on_destroyed_receiver_is_silent() {
    let world = World::new();
    let tx = world.plain();
    let (rx, _) = world.wrapper(&[]);

    world
        .bridge
        .connect(tx, "changed", rx, Some("1missing()"), AUTO)
        .unwrap();
    world.runtime.release(rx);
    world.bridge.emit(tx, "changed", &[]).unwrap();
    assert_eq!(world.bridge.receiver_count(tx, "changed"), 0);
}

#[test]
fn wrapped_native_method_is_captured_by_name() {
    let world = World::new();
    let tx = world.plain();
    let (rx, _) = world.wrapper(&[]);
    let resize = world.method(rx, "resize");

    world.bridge.connect(tx, "sized", resize, None, AUTO).unwrap();
    world.runtime.release(resize);
    world.bridge.emit(tx, "sized", &ints(&[640, 480, 1])).unwrap();
    assert_eq!(world.calls(), vec![("resize".to_string(), ints(&[640, 480]))]);

    let again = world.method(rx, "resize");
    assert!(world.bridge.disconnect(tx, "sized", again, None).unwrap());
    assert!(world.bridge.disconnect(tx, "sized", rx, Some("1resize()")).is_ok());
}

#[test]
fn managed_signal_forwards_to_native_signal() {
    let world = World::new();
    let tx = world.plain();
    let (rx, rx_ptr) = world.wrapper(&["relayed(int)"]);

    world
        .bridge
        .connect(tx, "changed", rx, Some("2relayed(int)"), AUTO)
        .unwrap();
    world.bridge.emit(tx, "changed", &ints(&[5])).unwrap();

    assert_eq!(
        *world.meta.emitted.borrow(),
        vec![(rx_ptr, "relayed".to_string(), ints(&[5]))]
    );
}

#[test]
fn managed_signal_forwards_to_managed_signal() {
    let world = World::new();
    let tx = world.plain();
    let rx = world.plain();
    let handler = world.recorder("downstream", Arity::exact(1));

    world.bridge.connect(tx, "upstream", rx, Some("relay"), AUTO).unwrap();
    world.bridge.connect(rx, "relay", handler, None, AUTO).unwrap();
    world.bridge.emit(tx, "upstream", &ints(&[9])).unwrap();

    assert_eq!(world.calls(), vec![("downstream".to_string(), ints(&[9]))]);
    assert!(world.bridge.disconnect(tx, "upstream", rx, Some("relay")).unwrap());
}

#[test]
fn blocked_transmitter_emits_nothing() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();

    world.meta.block(tx_ptr, true);
    world.bridge.emit(tx, "ping", &[]).unwrap();
    world.bridge.emit(tx, "2clicked()", &[]).unwrap();
    assert!(world.calls().is_empty());
    assert!(world.meta.emitted.borrow().is_empty());

    world.meta.block(tx_ptr, false);
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert_eq!(world.labels(), vec!["handler"]);
}

#[test]
fn blocking_can_be_ignored() {
    let world =
        World::with_config(BridgeConfig::new().with(BridgeProperty::HonourBlockedSignals, 0));
    let (tx, tx_ptr) = world.wrapper(&[]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();

    world.meta.block(tx_ptr, true);
    world.bridge.emit(tx, "ping", &[]).unwrap();
    assert_eq!(world.labels(), vec!["handler"]);
}

// =============================================================================
// Native signals
// =============================================================================

#[test]
fn native_emit_uses_base_name() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["valueChanged(int)"]);

    world
        .bridge
        .emit(tx, "2valueChanged(int)", &ints(&[3]))
        .unwrap();
    assert_eq!(
        *world.meta.emitted.borrow(),
        vec![(tx_ptr, "valueChanged".to_string(), ints(&[3]))]
    );
}

#[test]
fn native_emit_of_unknown_signal_is_invalid() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["valueChanged(int)"]);

    let err = world.bridge.emit(tx, "2bogus()", &[]).unwrap_err();
    assert_eq!(err.to_string(), "invalid signal bogus()");
}

#[test]
fn native_signal_needs_native_transmitter() {
    let world = World::new();
    let tx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));

    let err = world
        .bridge
        .connect(tx, "2clicked()", handler, None, AUTO)
        .unwrap_err();
    assert!(matches!(err, BridgeError::Binding { object, .. } if object == tx));
}

#[test]
fn native_signal_to_native_slot() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let (rx, rx_ptr) = world.wrapper(&[]);

    assert!(world
        .bridge
        .connect(tx, "2clicked()", rx, Some("1close()"), ConnectionType::Queued)
        .unwrap());
    let connections = world.meta.connections();
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].tx, tx_ptr);
    assert_eq!(connections[0].rx, rx_ptr);
    assert_eq!(connections[0].member, "close()");
    assert_eq!(connections[0].kind, ConnectionType::Queued);

    world.bridge.emit(tx, "2clicked()", &[]).unwrap();
    assert_eq!(world.meta.slot_calls.borrow().len(), 1);

    assert!(world.bridge.disconnect(tx, "2clicked()", rx, Some("1close()")).unwrap());
    assert!(world.meta.connections().is_empty());
}

#[test]
fn native_signal_to_native_signal_creates_universal_signal() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["clicked()"]);
    let (rx, rx_ptr) = world.wrapper(&[]);

    world
        .bridge
        .connect(tx, "2clicked()", rx, Some("2activated()"), AUTO)
        .unwrap();
    let connections = world.meta.connections();
    let connection = &connections[0];
    assert_ne!(connection.rx, rx_ptr);
    assert_eq!(connection.member, "activated()");

    assert!(world
        .bridge
        .disconnect(tx, "2clicked()", rx, Some("2activated()"))
        .unwrap());
    assert!(!world
        .bridge
        .disconnect(tx, "2clicked()", rx, Some("2never()"))
        .unwrap());
}

#[test]
fn native_signal_to_managed_callable() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["valueChanged(int,const QString&)"]);
    let seen_sender: Rc<Cell<Option<Sender>>> = Rc::default();

    let bridge = world.bridge.clone();
    let log = world.log.clone();
    let sender_cell = seen_sender.clone();
    let handler = world.runtime.function("handler", Arity::exact(1), move |ctx| {
        sender_cell.set(bridge.sender());
        log.borrow_mut().push(("handler".to_string(), ctx.args().to_vec()));
        Ok(())
    });

    assert!(world
        .bridge
        .connect(tx, "2valueChanged(int,const QString&)", handler, None, AUTO)
        .unwrap());
    assert!(world.bridge.has_endpoint(tx, "2valueChanged(int,const QString&)"));
    assert!(world
        .runtime
        .flags(tx)
        .unwrap()
        .contains(ObjectFlags::POSSIBLE_PROXY));

    let args = vec![Dynamic::Int(4), Dynamic::String("four".into())];
    world.meta.fire(tx_ptr, "valueChanged", &args).unwrap();

    assert_eq!(world.calls(), vec![("handler".to_string(), ints(&[4]))]);
    assert_eq!(seen_sender.get(), Some(Sender::Native(tx_ptr)));
}

#[test]
fn endpoint_descriptor_classifies_arguments() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["valueChanged(int,const QString&)"]);
    let handler = world.recorder("handler", Arity::at_least(0));

    world
        .bridge
        .connect(tx, "2valueChanged(int, const QString &)", handler, None, AUTO)
        .unwrap();
    let slot = world.meta.connections()[0].rx;
    let descriptor = world.meta.universal_descriptor(slot).unwrap();
    assert_eq!(
        descriptor.arg_kinds().collect::<Vec<_>>(),
        vec![ArgKind::Scalar(ScalarKind::Int32), ArgKind::String]
    );
}

#[test]
fn endpoint_is_shared_and_destroyed_with_last_receiver() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let first = world.recorder("first", Arity::exact(0));
    let second = world.recorder("second", Arity::exact(0));

    world.bridge.connect(tx, "2clicked()", first, None, AUTO).unwrap();
    world.bridge.connect(tx, "2clicked()", second, None, AUTO).unwrap();
    assert_eq!(world.meta.universal_slot_count(), 1);
    assert_eq!(world.meta.connections().len(), 1);
    assert_eq!(world.bridge.receiver_count(tx, "2clicked()"), 2);

    world.meta.fire(tx_ptr, "clicked()", &[]).unwrap();
    assert_eq!(world.labels(), vec!["second", "first"]);

    assert!(world.bridge.disconnect(tx, "2clicked()", first, None).unwrap());
    assert_eq!(world.meta.universal_slot_count(), 1);

    assert!(world.bridge.disconnect(tx, "2clicked()", second, None).unwrap());
    assert_eq!(world.meta.universal_slot_count(), 0);
    assert_eq!(world.meta.destroyed.borrow().len(), 1);
    assert!(world.meta.connections().is_empty());
    assert!(!world.bridge.has_endpoint(tx, "2clicked()"));
}

#[test]
fn native_signal_to_managed_signal() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let rx = world.plain();
    let handler = world.recorder("handler", Arity::exact(0));

    world
        .bridge
        .connect(tx, "2clicked()", rx, Some("pressed"), AUTO)
        .unwrap();
    world.bridge.connect(rx, "pressed", handler, None, AUTO).unwrap();

    world.meta.fire(tx_ptr, "clicked()", &[]).unwrap();
    assert_eq!(world.labels(), vec!["handler"]);
}

#[test]
fn refused_universal_slot_registers_nothing() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.meta.refuse_universal_slots.set(true);

    let err = world
        .bridge
        .connect(tx, "2clicked()", handler, None, AUTO)
        .unwrap_err();
    assert!(matches!(err, BridgeError::AdapterUnavailable { .. }));
    assert_eq!(world.bridge.receiver_count(tx, "2clicked()"), 0);
    assert_eq!(world.runtime.ref_count(handler), Some(1));
    assert!(!world
        .runtime
        .flags(tx)
        .unwrap()
        .contains(ObjectFlags::POSSIBLE_PROXY));
}

#[test]
fn refused_native_connection_reports_false() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.meta.refuse_connections.set(true);

    assert!(!world
        .bridge
        .connect(tx, "2clicked()", handler, None, AUTO)
        .unwrap());
    assert_eq!(world.meta.universal_slot_count(), 0);
    assert_eq!(world.runtime.ref_count(handler), Some(1));
    assert!(!world
        .runtime
        .flags(tx)
        .unwrap()
        .contains(ObjectFlags::POSSIBLE_PROXY));
}

#[test]
fn dead_receiver_of_native_signal_releases_endpoint() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let receiver = world.plain();
    let handler = world.method(receiver, "on_any");
    world.bridge.connect(tx, "2clicked()", handler, None, AUTO).unwrap();
    assert_eq!(world.meta.universal_slot_count(), 1);

    world.runtime.release(handler);
    world.runtime.release(receiver);
    world.meta.fire(tx_ptr, "clicked()", &[]).unwrap();

    assert!(world.calls().is_empty());
    assert_eq!(world.bridge.receiver_count(tx, "2clicked()"), 0);
    assert!(!world.bridge.has_endpoint(tx, "2clicked()"));
    assert_eq!(world.meta.universal_slot_count(), 0);
    assert!(world.meta.connections().is_empty());
}

#[test]
fn destroyed_transmitter_is_swept() {
    let world = World::new();
    let tx = world.plain();
    let (native_tx, _) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();
    world
        .bridge
        .connect(native_tx, "2clicked()", handler, None, AUTO)
        .unwrap();
    assert_eq!(world.runtime.ref_count(handler), Some(3));

    world.runtime.release(handler);
    world.runtime.release(tx);
    world.runtime.release(native_tx);
    assert!(world.runtime.is_alive(handler));

    let other = world.plain();
    world.bridge.emit(other, "ping", &[]).unwrap();

    assert!(!world.runtime.is_alive(handler));
    assert_eq!(world.meta.universal_slot_count(), 0);
    assert!(world.meta.connections().is_empty());
}

#[test]
fn dropping_bridge_releases_connections() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();
    world.bridge.connect(tx, "2clicked()", handler, None, AUTO).unwrap();
    assert_eq!(world.runtime.ref_count(handler), Some(3));

    let World {
        runtime,
        meta,
        bridge,
        ..
    } = world;
    drop(bridge);

    assert_eq!(runtime.ref_count(handler), Some(1));
    assert_eq!(meta.universal_slot_count(), 0);
    assert_eq!(meta.destroyed.borrow().len(), 1);
    assert!(meta.connections().is_empty());
}

#[test]
fn release_transmitter_tears_everything_down() {
    let world = World::new();
    let (tx, _) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));

    world.bridge.connect(tx, "ping", handler, None, AUTO).unwrap();
    world.bridge.connect(tx, "2clicked()", handler, None, AUTO).unwrap();
    assert_eq!(world.runtime.ref_count(handler), Some(3));

    assert_eq!(world.bridge.release_transmitter(tx), 2);
    assert_eq!(world.runtime.ref_count(handler), Some(1));
    assert_eq!(world.meta.universal_slot_count(), 0);
    assert!(world.meta.connections().is_empty());
}

#[test]
fn endpoint_outliving_bridge_does_nothing() {
    let world = World::new();
    let (tx, tx_ptr) = world.wrapper(&["clicked()"]);
    let handler = world.recorder("handler", Arity::exact(0));
    world.bridge.connect(tx, "2clicked()", handler, None, AUTO).unwrap();

    let World { meta, log, bridge, .. } = world;
    drop(bridge);
    meta.fire(tx_ptr, "clicked()", &[]).unwrap();
    assert!(log.borrow().is_empty());
}
