//! Slot resolution and the arity-fallback call loop.
//!
//! A slot resolves to one of three outcomes:
//!
//! - a signal to re-emit on the receiver (native handles its own fan-out)
//! - nothing, because the receiver has been destroyed
//! - a concrete callable, freshly materialized for bound and named methods
//!
//! Calls that fail with an immediate type error are retried with the last
//! argument dropped until the receiver accepts the tuple or no arguments
//! remain. An exception carrying a traceback was raised by the receiver's
//! body and is never retried.

use signalbridge_core::{CallableShape, Dynamic, Exception, ObjectHandle, Runtime};
use tracing::trace;

use crate::error::{BridgeError, BridgeResult};
use crate::slot::{Held, SlotRecord};

/// Outcome of invoking one slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// The receiver ran; `dropped` trailing arguments were not passed.
    Delivered { value: Dynamic, dropped: usize },
    /// The slot re-emitted a signal on its receiver.
    Forwarded,
    /// The receiver no longer exists. Not an error.
    ReceiverGone,
}

impl Invocation {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Invocation::Delivered { .. })
    }
}

/// A slot resolved against the current state of the runtime.
#[derive(Debug)]
pub(crate) enum Resolution {
    Forward {
        receiver: ObjectHandle,
        signal: String,
    },
    Gone,
    Call {
        callable: ObjectHandle,
        /// A method object created for this call only.
        transient: Option<ObjectHandle>,
    },
}

pub(crate) fn resolve(runtime: &Runtime, slot: &SlotRecord) -> BridgeResult<Resolution> {
    match slot {
        SlotRecord::NativeEndpoint { receiver, signal } => {
            Ok(match receiver.resolve(runtime) {
                Some(receiver) => Resolution::Forward {
                    receiver,
                    signal: signal.clone(),
                },
                None => Resolution::Gone,
            })
        }
        SlotRecord::BoundMethod {
            func,
            receiver,
            class,
        } => {
            let Some(receiver) = receiver.resolve(runtime) else {
                return Ok(Resolution::Gone);
            };
            let method = runtime.bind_method(*func, receiver, *class)?;
            Ok(Resolution::Call {
                callable: method,
                transient: Some(method),
            })
        }
        SlotRecord::PlainCallable(Held::Strong(callable)) => Ok(Resolution::Call {
            callable: *callable,
            transient: None,
        }),
        SlotRecord::PlainCallable(Held::Weak(observer)) => {
            Ok(match observer.resolve(runtime) {
                Some(callable) => Resolution::Call {
                    callable,
                    transient: None,
                },
                None => Resolution::Gone,
            })
        }
        SlotRecord::LegacyNamedMethod { receiver, name } => {
            let Some(receiver) = receiver.resolve(runtime) else {
                return Ok(Resolution::Gone);
            };
            let method = runtime
                .get_attr(receiver, name)
                .map_err(|_| BridgeError::invalid_slot(name.as_str()))?;
            if !matches!(runtime.shape(method), CallableShape::NativeMethod(_)) {
                runtime.release(method);
                return Err(BridgeError::invalid_slot(name.as_str()));
            }
            Ok(Resolution::Call {
                callable: method,
                transient: Some(method),
            })
        }
    }
}

/// Call `callable`, dropping trailing arguments while it rejects the count.
///
/// `retry_limit` bounds the number of dropped arguments; `None` allows
/// dropping all of them. Returns the result and how many were dropped.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn call_with_arity_fallback(
    runtime: &Runtime,
    callable: ObjectHandle,
    args: &[Dynamic],
    retry_limit: Option<usize>,
) -> BridgeResult<(Dynamic, usize)> {
    let mut len = args.len();
    let mut original: Option<Exception> = None;
    let mut attempts = 0;

    loop {
        attempts += 1;
        let exc = match runtime.call(callable, &args[..len]) {
            Ok(value) => {
                let dropped = args.len() - len;
                if dropped > 0 {
                    trace!(%callable, dropped, "receiver accepted narrower arguments");
                }
                return Ok((value, dropped));
            }
            Err(exc) => exc,
        };

        let dropped = args.len() - len;
        let may_retry = exc.is_immediate_type_error()
            && len > 0
            && retry_limit.is_none_or(|limit| dropped < limit);

        if !may_retry {
            if exc.has_traceback() {
                return Err(exc.into());
            }
            return Err(match original {
                Some(original) => BridgeError::ArityMismatch { attempts, original },
                None => exc.into(),
            });
        }

        trace!(%callable, attempt = attempts, args = len, error = %exc, "retrying with fewer arguments");
        original.get_or_insert(exc);
        len -= 1;
    }
}
