//! Generational arena for reference-counted managed objects.

use std::fmt;

use bitflags::bitflags;

use super::ManagedObject;

/// Handle to a heap-allocated object.
///
/// Handles are copyable and carry no ownership on their own; reference counts
/// are adjusted explicitly through [`ObjectHeap::add_ref`] and
/// [`ObjectHeap::release`]. The generation detects use after free.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectHandle {
    /// Index into ObjectHeap.slots
    pub index: u32,
    /// Generation for use-after-free detection
    pub generation: u32,
}

impl ObjectHandle {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Non-owning reference to a heap object.
///
/// Upgrading fails once the object has been freed, even if its slot was reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WeakRef {
    index: u32,
    generation: u32,
}

impl WeakRef {
    /// The handle this weak reference was created from.
    pub fn handle(&self) -> ObjectHandle {
        ObjectHandle::new(self.index, self.generation)
    }
}

bitflags! {
    /// Per-object flags stored alongside the heap slot.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u8 {
        /// The object supports weak references.
        const WEAK_REFERENCEABLE = 1 << 0;
        /// Native-side connections observe this object, so the binding layer
        /// must not finalize it eagerly.
        const POSSIBLE_PROXY = 1 << 1;
    }
}

impl Default for ObjectFlags {
    fn default() -> Self {
        ObjectFlags::WEAK_REFERENCEABLE
    }
}

/// Heap storage for managed objects with generational indices.
///
/// When an object is freed its slot is reused but the generation is
/// incremented, so stale handles and weak references are detected.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    frees: u64,
}

struct HeapSlot {
    generation: u32,
    value: Option<ManagedObject>,
    ref_count: u32,
    flags: ObjectFlags,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            frees: 0,
        }
    }

    /// Allocate a new object with a reference count of one.
    pub fn allocate(&mut self, value: ManagedObject, flags: ObjectFlags) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            slot.ref_count = 1;
            slot.flags = flags;
            ObjectHandle::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                value: Some(value),
                ref_count: 1,
                flags,
            });
            ObjectHandle::new(index, 0)
        }
    }

    fn live_slot(&self, handle: ObjectHandle) -> Option<&HeapSlot> {
        let slot = self.slots.get(handle.index as usize)?;
        (slot.generation == handle.generation && slot.value.is_some()).then_some(slot)
    }

    fn live_slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut HeapSlot> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        (slot.generation == handle.generation && slot.value.is_some()).then_some(slot)
    }

    /// Returns None if the handle is stale.
    pub fn get(&self, handle: ObjectHandle) -> Option<&ManagedObject> {
        self.live_slot(handle)?.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut ManagedObject> {
        self.live_slot_mut(handle)?.value.as_mut()
    }

    pub fn contains(&self, handle: ObjectHandle) -> bool {
        self.live_slot(handle).is_some()
    }

    /// Increment reference count.
    pub fn add_ref(&mut self, handle: ObjectHandle) -> bool {
        match self.live_slot_mut(handle) {
            Some(slot) => {
                slot.ref_count = slot.ref_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Decrement reference count, freeing the object when it reaches zero.
    ///
    /// Returns the freed object so the caller can release whatever it
    /// referenced.
    pub fn release(&mut self, handle: ObjectHandle) -> Option<ManagedObject> {
        let slot = self.live_slot_mut(handle)?;
        slot.ref_count = slot.ref_count.saturating_sub(1);
        if slot.ref_count > 0 {
            return None;
        }
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index);
        self.frees += 1;
        value
    }

    /// Get the reference count for an object.
    pub fn ref_count(&self, handle: ObjectHandle) -> Option<u32> {
        self.live_slot(handle).map(|slot| slot.ref_count)
    }

    pub fn flags(&self, handle: ObjectHandle) -> Option<ObjectFlags> {
        self.live_slot(handle).map(|slot| slot.flags)
    }

    /// Add `flags` to an object. Returns false for stale handles.
    pub fn insert_flags(&mut self, handle: ObjectHandle, flags: ObjectFlags) -> bool {
        match self.live_slot_mut(handle) {
            Some(slot) => {
                slot.flags.insert(flags);
                true
            }
            None => false,
        }
    }

    /// Create a weak reference, if the object supports them.
    pub fn weak_ref(&self, handle: ObjectHandle) -> Option<WeakRef> {
        let slot = self.live_slot(handle)?;
        slot.flags
            .contains(ObjectFlags::WEAK_REFERENCEABLE)
            .then_some(WeakRef {
                index: handle.index,
                generation: handle.generation,
            })
    }

    /// Resolve a weak reference to a live handle.
    pub fn upgrade(&self, weak: WeakRef) -> Option<ObjectHandle> {
        let handle = weak.handle();
        self.contains(handle).then_some(handle)
    }

    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Number of objects freed so far. Changes whenever any handle goes stale.
    pub fn free_count(&self) -> u64 {
        self.frees
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("slot_count", &self.slots.len())
            .field("free_count", &self.free_list.len())
            .finish()
    }
}
