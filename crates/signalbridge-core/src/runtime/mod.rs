//! The managed object model.
//!
//! ## Key Types
//!
//! - [`Dynamic`]: Runtime value type for arguments and return values
//! - [`ObjectHeap`]: Generational arena for reference-counted objects
//! - [`ManagedFn`] / [`NativeFn`]: Managed function bodies and native methods
//! - [`CallContext`]: Bridge between the caller and a callable body
//! - [`Runtime`]: Shared handle tying the above together
//!
//! Dispatch is single threaded and reentrant: a callable may allocate, call
//! other callables or release objects while it runs, so the runtime never
//! holds a heap borrow across a call.

mod call_context;
mod dynamic;
mod native_fn;
mod object;
mod object_heap;

use std::cell::RefCell;
use std::rc::Rc;

pub use call_context::CallContext;
pub use dynamic::{Dynamic, NativePtr};
pub use native_fn::{Arity, ManagedCallable, ManagedFn, NativeCallable, NativeFn};
pub use object::{
    BoundMethodObject, CallableShape, ClassBuilder, ClassObject, InstanceObject, ManagedObject,
    NativeMethodObject,
};
pub use object_heap::{ObjectFlags, ObjectHandle, ObjectHeap, WeakRef};

use crate::error::Exception;

/// What a call resolves to once the heap borrow is released.
enum CallTarget {
    Function(ManagedFn),
    Method(ManagedFn, ObjectHandle),
    Native(NativeFn, NativePtr),
}

/// Shared handle to the managed object model.
///
/// Cloning is cheap; all clones see the same heap.
#[derive(Clone, Default)]
pub struct Runtime {
    heap: Rc<RefCell<ObjectHeap>>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an object that supports weak references.
    pub fn alloc(&self, object: ManagedObject) -> ObjectHandle {
        self.alloc_with_flags(object, ObjectFlags::default())
    }

    pub fn alloc_with_flags(&self, object: ManagedObject, flags: ObjectFlags) -> ObjectHandle {
        self.heap.borrow_mut().allocate(object, flags)
    }

    /// Allocate a free function.
    pub fn function<F>(&self, name: &str, arity: Arity, body: F) -> ObjectHandle
    where
        F: Fn(&mut CallContext) -> Result<(), Exception> + 'static,
    {
        self.alloc(ManagedObject::Function(ManagedFn::new(name, arity, body)))
    }

    /// Start registering a class.
    pub fn class(&self, name: &str) -> ClassBuilder<'_> {
        ClassBuilder::new(self, name.to_string())
    }

    /// Create a plain instance of `class`.
    pub fn instantiate(&self, class: ObjectHandle) -> Result<ObjectHandle, Exception> {
        self.new_instance(class, None)
    }

    /// Create an instance of `class` wrapping the native object at `native`.
    pub fn wrap_native(
        &self,
        class: ObjectHandle,
        native: NativePtr,
    ) -> Result<ObjectHandle, Exception> {
        self.new_instance(class, Some(native))
    }

    fn new_instance(
        &self,
        class: ObjectHandle,
        native: Option<NativePtr>,
    ) -> Result<ObjectHandle, Exception> {
        let mut heap = self.heap.borrow_mut();
        match heap.get(class) {
            Some(ManagedObject::Class(_)) => {}
            Some(other) => {
                return Err(Exception::type_error(format!(
                    "cannot instantiate '{}' object",
                    other.type_name()
                )));
            }
            None => return Err(Exception::reference_error("class has been destroyed")),
        }
        heap.add_ref(class);
        Ok(heap.allocate(
            ManagedObject::Instance(InstanceObject { class, native }),
            ObjectFlags::default(),
        ))
    }

    pub fn add_ref(&self, handle: ObjectHandle) -> bool {
        self.heap.borrow_mut().add_ref(handle)
    }

    /// Drop one reference. Freeing an object releases everything it owned.
    ///
    /// Returns true if `handle` itself was freed.
    pub fn release(&self, handle: ObjectHandle) -> bool {
        let mut pending = vec![handle];
        let mut freed_root = false;
        while let Some(next) = pending.pop() {
            let freed = self.heap.borrow_mut().release(next);
            if let Some(object) = freed {
                freed_root |= next == handle;
                pending.extend(object.owned_references());
            }
        }
        freed_root
    }

    pub fn is_alive(&self, handle: ObjectHandle) -> bool {
        self.heap.borrow().contains(handle)
    }

    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.heap.borrow().ref_count(handle)
    }

    pub fn flags(&self, handle: ObjectHandle) -> Option<ObjectFlags> {
        self.heap.borrow().flags(handle)
    }

    pub fn insert_flags(&self, handle: ObjectHandle, flags: ObjectFlags) -> bool {
        self.heap.borrow_mut().insert_flags(handle, flags)
    }

    pub fn weak_ref(&self, handle: ObjectHandle) -> Option<WeakRef> {
        self.heap.borrow().weak_ref(handle)
    }

    pub fn upgrade(&self, weak: WeakRef) -> Option<ObjectHandle> {
        self.heap.borrow().upgrade(weak)
    }

    pub fn live_objects(&self) -> usize {
        self.heap.borrow().live_count()
    }

    /// Monotonic count of freed objects; unchanged means no handle went stale.
    pub fn free_count(&self) -> u64 {
        self.heap.borrow().free_count()
    }

    pub fn type_name(&self, handle: ObjectHandle) -> Option<&'static str> {
        self.heap.borrow().get(handle).map(ManagedObject::type_name)
    }

    /// The native pointer wrapped by an instance, if any.
    pub fn native_ptr(&self, handle: ObjectHandle) -> Option<NativePtr> {
        match self.heap.borrow().get(handle)? {
            ManagedObject::Instance(instance) => instance.native,
            _ => None,
        }
    }

    pub fn shape(&self, handle: ObjectHandle) -> CallableShape {
        match self.heap.borrow().get(handle) {
            Some(ManagedObject::BoundMethod(method)) => CallableShape::BoundMethod(*method),
            Some(ManagedObject::NativeMethod(method)) => {
                CallableShape::NativeMethod(method.clone())
            }
            _ => CallableShape::Opaque,
        }
    }

    /// Create a fresh bound method object.
    ///
    /// The result holds references to all three parts; release it when done.
    pub fn bind_method(
        &self,
        func: ObjectHandle,
        receiver: ObjectHandle,
        class: ObjectHandle,
    ) -> Result<ObjectHandle, Exception> {
        let mut heap = self.heap.borrow_mut();
        if !matches!(heap.get(func), Some(ManagedObject::Function(_))) {
            return Err(Exception::reference_error("method function has been destroyed"));
        }
        if !heap.contains(receiver) || !heap.contains(class) {
            return Err(Exception::reference_error("method receiver has been destroyed"));
        }
        heap.add_ref(func);
        heap.add_ref(receiver);
        heap.add_ref(class);
        Ok(heap.allocate(
            ManagedObject::BoundMethod(BoundMethodObject {
                func,
                receiver,
                class,
            }),
            ObjectFlags::default(),
        ))
    }

    /// Look up a method on an instance.
    ///
    /// Managed methods come back as a fresh bound method, native methods as a
    /// fresh native method object. The caller owns the returned reference.
    pub fn get_attr(&self, object: ObjectHandle, name: &str) -> Result<ObjectHandle, Exception> {
        enum Found {
            Managed(ObjectHandle, ObjectHandle),
            Native,
        }

        let found = {
            let heap = self.heap.borrow();
            let class = match heap.get(object) {
                Some(ManagedObject::Instance(instance)) => instance.class,
                Some(other) => {
                    return Err(Exception::attribute_error(format!(
                        "'{}' object has no attribute '{name}'",
                        other.type_name()
                    )));
                }
                None => return Err(Exception::reference_error("object has been destroyed")),
            };
            match heap.get(class) {
                Some(ManagedObject::Class(def)) => {
                    if let Some(func) = def.methods.get(name) {
                        Found::Managed(*func, class)
                    } else if def.native_methods.contains_key(name) {
                        Found::Native
                    } else {
                        return Err(Exception::attribute_error(format!(
                            "'{}' object has no attribute '{name}'",
                            def.name
                        )));
                    }
                }
                _ => return Err(Exception::reference_error("class has been destroyed")),
            }
        };

        match found {
            Found::Managed(func, class) => self.bind_method(func, object, class),
            Found::Native => {
                let mut heap = self.heap.borrow_mut();
                heap.add_ref(object);
                Ok(heap.allocate(
                    ManagedObject::NativeMethod(NativeMethodObject {
                        receiver: object,
                        name: name.to_string(),
                    }),
                    ObjectFlags::empty(),
                ))
            }
        }
    }

    /// Call `callable` with `args`.
    pub fn call(&self, callable: ObjectHandle, args: &[Dynamic]) -> Result<Dynamic, Exception> {
        match self.resolve_call(callable)? {
            CallTarget::Function(func) => func.invoke(self, args, 0),
            CallTarget::Method(func, receiver) => {
                let mut slots = Vec::with_capacity(args.len() + 1);
                slots.push(Dynamic::Object(receiver));
                slots.extend_from_slice(args);
                func.invoke(self, &slots, 1)
            }
            CallTarget::Native(func, this) => {
                let mut slots = Vec::with_capacity(args.len() + 1);
                slots.push(Dynamic::Native(this));
                slots.extend_from_slice(args);
                func.invoke(self, &slots)
            }
        }
    }

    fn resolve_call(&self, callable: ObjectHandle) -> Result<CallTarget, Exception> {
        let heap = self.heap.borrow();
        let function = |handle: ObjectHandle| match heap.get(handle) {
            Some(ManagedObject::Function(func)) => Ok(func.clone()),
            _ => Err(Exception::reference_error("function has been destroyed")),
        };

        match heap.get(callable) {
            Some(ManagedObject::Function(func)) => Ok(CallTarget::Function(func.clone())),
            Some(ManagedObject::BoundMethod(method)) => {
                Ok(CallTarget::Method(function(method.func)?, method.receiver))
            }
            Some(ManagedObject::NativeMethod(method)) => {
                let Some(ManagedObject::Instance(instance)) = heap.get(method.receiver) else {
                    return Err(Exception::reference_error("method receiver has been destroyed"));
                };
                let Some(this) = instance.native else {
                    return Err(Exception::type_error(format!(
                        "{}() requires a wrapped native receiver",
                        method.name
                    )));
                };
                match heap.get(instance.class) {
                    Some(ManagedObject::Class(def)) => def
                        .native_methods
                        .get(&method.name)
                        .map(|func| CallTarget::Native(func.clone(), this))
                        .ok_or_else(|| {
                            Exception::attribute_error(format!(
                                "'{}' object has no attribute '{}'",
                                def.name, method.name
                            ))
                        }),
                    _ => Err(Exception::reference_error("class has been destroyed")),
                }
            }
            Some(other) => Err(Exception::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
            None => Err(Exception::reference_error("callable has been destroyed")),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Runtime").field(&self.heap.borrow()).finish()
    }
}
