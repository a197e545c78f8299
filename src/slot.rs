//! Slot records: the captured form of a receiver.
//!
//! Bound methods are never held as objects. They are re-synthesized from
//! their parts on every invocation so a connection does not keep the
//! receiving instance alive.

use signalbridge_core::{CallableShape, NativeMethodObject, ObjectHandle, Runtime};

use crate::config::{BridgeConfig, BridgeProperty};
use crate::error::{BridgeResult, owned_name};
use crate::member::{MemberKind, MemberName, base_name};
use crate::observer::Observer;

/// How a plain callable is held by its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Held {
    /// The slot owns a reference; released with the slot.
    Strong(ObjectHandle),
    Weak(Observer),
}

impl Held {
    pub fn target(&self) -> ObjectHandle {
        match self {
            Held::Strong(handle) => *handle,
            Held::Weak(observer) => observer.target(),
        }
    }
}

/// A receiver, captured at connect time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRecord {
    /// A signal re-emitted on `receiver` when this slot fires.
    NativeEndpoint { receiver: Observer, signal: String },
    /// The parts of a bound method.
    ///
    /// `func` and `class` are owned; the instance is only observed.
    BoundMethod {
        func: ObjectHandle,
        receiver: Observer,
        class: ObjectHandle,
    },
    PlainCallable(Held),
    /// A native method looked up by name on `receiver` at call time.
    LegacyNamedMethod { receiver: Observer, name: String },
}

impl SlotRecord {
    /// Capture `rx` (and the optional textual `member`) as a slot.
    pub fn capture(
        runtime: &Runtime,
        rx: ObjectHandle,
        member: Option<&str>,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        if let Some(member) = member {
            let parsed = MemberName::parse(member);
            let receiver = Observer::best_effort(runtime, rx);
            return Ok(match parsed.kind {
                MemberKind::NativeSlot => SlotRecord::LegacyNamedMethod {
                    receiver,
                    name: owned_name(parsed.base_name())?,
                },
                MemberKind::NativeSignal | MemberKind::Managed => SlotRecord::NativeEndpoint {
                    receiver,
                    signal: owned_name(member)?,
                },
            });
        }

        match runtime.shape(rx) {
            CallableShape::BoundMethod(method) => {
                runtime.add_ref(method.func);
                runtime.add_ref(method.class);
                Ok(SlotRecord::BoundMethod {
                    func: method.func,
                    receiver: Observer::best_effort(runtime, method.receiver),
                    class: method.class,
                })
            }
            CallableShape::NativeMethod(NativeMethodObject { receiver, name }) => {
                Ok(SlotRecord::LegacyNamedMethod {
                    receiver: Observer::best_effort(runtime, receiver),
                    name,
                })
            }
            CallableShape::Opaque => {
                let held = if config.flag(BridgeProperty::KeepPlainCallablesAlive) {
                    None
                } else {
                    Observer::observe(runtime, rx).ok().map(Held::Weak)
                };
                Ok(SlotRecord::PlainCallable(held.unwrap_or_else(|| {
                    runtime.add_ref(rx);
                    Held::Strong(rx)
                })))
            }
        }
    }

    /// Whether this slot is the one `rx`/`member` would capture.
    ///
    /// Named slots compare names with `same_name` and receivers by identity.
    /// Bound methods compare function, instance and class. Anything else must
    /// be the same object.
    pub fn matches(
        &self,
        runtime: &Runtime,
        rx: ObjectHandle,
        member: Option<&str>,
        same_name: &dyn Fn(&str, &str) -> bool,
    ) -> bool {
        if let Some(member) = member {
            return match self {
                SlotRecord::NativeEndpoint { receiver, signal } => {
                    receiver.target() == rx && same_name(signal, member)
                }
                SlotRecord::LegacyNamedMethod { receiver, name } => {
                    let parsed = MemberName::parse(member);
                    parsed.kind == MemberKind::NativeSlot
                        && receiver.target() == rx
                        && same_name(name, base_name(parsed.text))
                }
                _ => false,
            };
        }

        match (self, runtime.shape(rx)) {
            (
                SlotRecord::BoundMethod {
                    func,
                    receiver,
                    class,
                },
                CallableShape::BoundMethod(method),
            ) => {
                *func == method.func && receiver.target() == method.receiver && *class == method.class
            }
            (
                SlotRecord::LegacyNamedMethod { receiver, name },
                CallableShape::NativeMethod(method),
            ) => receiver.target() == method.receiver && *name == method.name,
            (SlotRecord::PlainCallable(held), CallableShape::Opaque) => held.target() == rx,
            _ => false,
        }
    }

    /// Drop the references this slot owns.
    pub fn release(&self, runtime: &Runtime) {
        match self {
            SlotRecord::BoundMethod { func, class, .. } => {
                runtime.release(*func);
                runtime.release(*class);
            }
            SlotRecord::PlainCallable(Held::Strong(handle)) => {
                runtime.release(*handle);
            }
            _ => {}
        }
    }

    /// The object whose destruction turns this slot into a no-op.
    pub fn receiver(&self) -> ObjectHandle {
        match self {
            SlotRecord::NativeEndpoint { receiver, .. }
            | SlotRecord::BoundMethod { receiver, .. }
            | SlotRecord::LegacyNamedMethod { receiver, .. } => receiver.target(),
            SlotRecord::PlainCallable(held) => held.target(),
        }
    }
}
