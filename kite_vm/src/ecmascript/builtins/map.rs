// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Map, Set, WeakMap and WeakSet.
//!
//! All four share one collection shape: a growable flat buffer whose header
//! carries the live entry count, followed by value slots (one per Set
//! entry, key/value per Map entry). Deleted entries become empty sentinels
//! in place, which keeps insertion order and outstanding iterator indices
//! stable. Lookup is a linear SameValueZero scan with negative zero
//! normalized on insertion. Weak containers additionally register
//! themselves on each key object so key finalization removes the entry.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::execution::{Agent, JsResult};
use crate::ecmascript::objects::data::{self, ClassId, ObjectType};
use crate::ecmascript::objects::property_storage::{self, PropertyRef};
use crate::ecmascript::types::{MagicStringId, Value, number, value};

/// Collection block header; `capacity`/`used` are in slot words.
#[repr(C)]
struct ContainerBuffer {
    capacity: u32,
    used: u32,
    /// Live entry count: the first slot of the collection.
    count: u32,
    _padding: u32,
}

const BUFFER_HEADER_SIZE: usize = core::mem::size_of::<ContainerBuffer>();
/// Initial slot capacity of a fresh collection.
const INITIAL_CAPACITY: u32 = 8;

#[inline]
fn entry_slots(class_id: ClassId) -> u32 {
    match class_id {
        ClassId::Map | ClassId::WeakMap => 2,
        _ => 1,
    }
}

#[inline]
fn is_weak(class_id: ClassId) -> bool {
    matches!(class_id, ClassId::WeakMap | ClassId::WeakSet)
}

/// Create an empty container class object.
pub(crate) fn new_container(heap: &mut Heap, class_id: ClassId) -> CompressedPointer {
    debug_assert!(class_id.is_container());
    data::new_class_object(
        heap,
        CompressedPointer::NULL,
        class_id,
        0,
        CompressedPointer::NULL.into_raw() as u32,
    )
}

pub(crate) fn container_class(heap: &Heap, v: Value) -> Option<ClassId> {
    if !v.is_object() {
        return None;
    }
    let cp = v.heap_pointer();
    if data::object_type(heap, cp) != ObjectType::Class {
        return None;
    }
    let class_id = data::class_id(heap, cp);
    class_id.is_container().then_some(class_id)
}

fn buffer_of(heap: &Heap, container_cp: CompressedPointer) -> CompressedPointer {
    CompressedPointer::from_raw(data::class_value(heap, container_cp) as u16)
}

#[inline]
fn buffer_ptr(heap: &Heap, buffer_cp: CompressedPointer) -> *mut ContainerBuffer {
    heap.deref::<ContainerBuffer>(buffer_cp)
}

#[inline]
fn slot_base(heap: &Heap, buffer_cp: CompressedPointer) -> *mut u32 {
    // SAFETY: the slots directly follow the live buffer header.
    unsafe { heap.decompress(buffer_cp).as_ptr().add(BUFFER_HEADER_SIZE) as *mut u32 }
}

pub(crate) fn read_slot(heap: &Heap, buffer_cp: CompressedPointer, slot: u32) -> Value {
    // SAFETY: slot < used, inside the live buffer.
    Value::from_raw(unsafe { slot_base(heap, buffer_cp).add(slot as usize).read() })
}

fn write_slot(heap: &mut Heap, buffer_cp: CompressedPointer, slot: u32, v: Value) {
    // SAFETY: slot < capacity, inside the live buffer.
    unsafe {
        slot_base(heap, buffer_cp).add(slot as usize).write(v.into_raw());
    }
}

/// Live entry count of a container object.
pub(crate) fn container_size(heap: &Heap, container_cp: CompressedPointer) -> u32 {
    let buffer_cp = buffer_of(heap, container_cp);
    if buffer_cp.is_null() {
        return 0;
    }
    // SAFETY: the buffer header is live.
    unsafe { (*buffer_ptr(heap, buffer_cp)).count }
}

/// Slot words currently in use (including empty sentinels); the iterator
/// walk bound.
pub(crate) fn container_used_slots(heap: &Heap, container_cp: CompressedPointer) -> u32 {
    let buffer_cp = buffer_of(heap, container_cp);
    if buffer_cp.is_null() {
        return 0;
    }
    // SAFETY: the buffer header is live.
    unsafe { (*buffer_ptr(heap, buffer_cp)).used }
}

/// SameValueZero with negative zero normalized away, applied to every key
/// on insertion so lookups can use the plain comparison.
fn normalize_key(heap: &Heap, key: Value) -> Value {
    if key.is_number() && number::number_value(heap, key) == 0.0 {
        return Value::from_integer(0);
    }
    key
}

/// Find the slot index of `key`'s entry.
fn find_entry(
    heap: &Heap,
    container_cp: CompressedPointer,
    key: Value,
) -> Option<u32> {
    let class_id = data::class_id(heap, container_cp);
    let step = entry_slots(class_id);
    let buffer_cp = buffer_of(heap, container_cp);
    if buffer_cp.is_null() {
        return None;
    }
    // SAFETY: the buffer header is live.
    let used = unsafe { (*buffer_ptr(heap, buffer_cp)).used };
    let mut slot = 0;
    while slot < used {
        let stored = read_slot(heap, buffer_cp, slot);
        if !stored.is_empty() && value::same_value_zero(heap, stored, key) {
            return Some(slot);
        }
        slot += step;
    }
    None
}

/// Append an entry, growing the buffer as needed. Takes stored copies of
/// the slot values.
fn append_entry(heap: &mut Heap, container_cp: CompressedPointer, entry: &[Value]) {
    let buffer_cp = buffer_of(heap, container_cp);
    let needed = entry.len() as u32;

    let buffer_cp = if buffer_cp.is_null() {
        let capacity = INITIAL_CAPACITY.max(needed);
        let ptr = heap.alloc(BUFFER_HEADER_SIZE + capacity as usize * 4);
        // SAFETY: a fresh block of header + capacity slots.
        unsafe {
            ptr.cast::<ContainerBuffer>().write(ContainerBuffer {
                capacity,
                used: 0,
                count: 0,
                _padding: 0,
            });
        }
        let new_cp = heap.compress(ptr);
        data::set_class_value(heap, container_cp, new_cp.into_raw() as u32);
        new_cp
    } else {
        // SAFETY: the buffer header is live.
        let (capacity, used) = unsafe {
            let header = buffer_ptr(heap, buffer_cp);
            ((*header).capacity, (*header).used)
        };
        if used + needed > capacity {
            let new_capacity = (capacity * 2).max(used + needed);
            let old_ptr = heap.decompress(buffer_cp);
            let new_ptr = heap.realloc(
                old_ptr,
                BUFFER_HEADER_SIZE + capacity as usize * 4,
                BUFFER_HEADER_SIZE + new_capacity as usize * 4,
            );
            let new_cp = heap.compress(new_ptr);
            // SAFETY: the grown header is live.
            unsafe {
                (*buffer_ptr(heap, new_cp)).capacity = new_capacity;
            }
            data::set_class_value(heap, container_cp, new_cp.into_raw() as u32);
            new_cp
        } else {
            buffer_cp
        }
    };

    // SAFETY: the buffer header is live.
    let used = unsafe { (*buffer_ptr(heap, buffer_cp)).used };
    for (offset, v) in entry.iter().enumerate() {
        let stored = value::copy_value_if_not_object(heap, *v);
        write_slot(heap, buffer_cp, used + offset as u32, stored);
    }
    // SAFETY: as above.
    unsafe {
        (*buffer_ptr(heap, buffer_cp)).used = used + needed;
        (*buffer_ptr(heap, buffer_cp)).count += 1;
    }
}

/// Map/WeakMap set and Set/WeakSet add.
pub(crate) fn container_set(
    agent: &mut Agent,
    container: Value,
    key: Value,
    entry_value: Option<Value>,
) -> JsResult<()> {
    let Some(class_id) = container_class(&agent.heap, container) else {
        return Err(agent.throw_type_error("Expected a container object."));
    };
    debug_assert_eq!(entry_slots(class_id) == 2, entry_value.is_some());
    let container_cp = container.heap_pointer();

    if is_weak(class_id) && !key.is_object() {
        return Err(agent.throw_type_error("Weak container keys must be objects."));
    }
    let key = normalize_key(&agent.heap, key);

    if let Some(slot) = find_entry(&agent.heap, container_cp, key) {
        if let Some(new_value) = entry_value {
            let buffer_cp = buffer_of(&agent.heap, container_cp);
            let old = read_slot(&agent.heap, buffer_cp, slot + 1);
            let stored = value::copy_value_if_not_object(&mut agent.heap, new_value);
            write_slot(&mut agent.heap, buffer_cp, slot + 1, stored);
            value::free_value_if_not_object(&mut agent.heap, old);
        }
        return Ok(());
    }

    match entry_value {
        Some(entry_value) => append_entry(&mut agent.heap, container_cp, &[key, entry_value]),
        None => append_entry(&mut agent.heap, container_cp, &[key]),
    }
    if is_weak(class_id) {
        register_weak_ref(&mut agent.heap, key.heap_pointer(), container_cp);
    }
    Ok(())
}

/// Map/WeakMap get. Returns an owned value, or undefined when absent.
pub(crate) fn container_get(agent: &mut Agent, container: Value, key: Value) -> JsResult<Value> {
    let Some(class_id) = container_class(&agent.heap, container) else {
        return Err(agent.throw_type_error("Expected a container object."));
    };
    if entry_slots(class_id) != 2 {
        return Err(agent.throw_type_error("Sets have no keyed values."));
    }
    let container_cp = container.heap_pointer();
    let key = normalize_key(&agent.heap, key);
    match find_entry(&agent.heap, container_cp, key) {
        Some(slot) => {
            let buffer_cp = buffer_of(&agent.heap, container_cp);
            let stored = read_slot(&agent.heap, buffer_cp, slot + 1);
            Ok(value::copy_value(&mut agent.heap, stored))
        }
        None => Ok(Value::UNDEFINED),
    }
}

pub(crate) fn container_has(agent: &mut Agent, container: Value, key: Value) -> JsResult<bool> {
    if container_class(&agent.heap, container).is_none() {
        return Err(agent.throw_type_error("Expected a container object."));
    }
    let key = normalize_key(&agent.heap, key);
    Ok(find_entry(&agent.heap, container.heap_pointer(), key).is_some())
}

/// Delete an entry. The slots become empty sentinels in place; the second
/// delete of the same key reports absent.
pub(crate) fn container_delete(
    agent: &mut Agent,
    container: Value,
    key: Value,
) -> JsResult<bool> {
    let Some(class_id) = container_class(&agent.heap, container) else {
        return Err(agent.throw_type_error("Expected a container object."));
    };
    let container_cp = container.heap_pointer();
    let key = normalize_key(&agent.heap, key);
    let Some(slot) = find_entry(&agent.heap, container_cp, key) else {
        return Ok(false);
    };
    let stored_key = read_slot(&agent.heap, buffer_of(&agent.heap, container_cp), slot);
    if is_weak(class_id) && stored_key.is_object() {
        unregister_weak_ref(&mut agent.heap, stored_key.heap_pointer(), container_cp);
    }
    clear_entry(&mut agent.heap, container_cp, slot);
    Ok(true)
}

fn clear_entry(heap: &mut Heap, container_cp: CompressedPointer, slot: u32) {
    let class_id = data::class_id(heap, container_cp);
    let buffer_cp = buffer_of(heap, container_cp);
    for offset in 0..entry_slots(class_id) {
        let stored = read_slot(heap, buffer_cp, slot + offset);
        value::free_value_if_not_object(heap, stored);
        write_slot(heap, buffer_cp, slot + offset, Value::EMPTY);
    }
    // SAFETY: the buffer header is live.
    unsafe {
        debug_assert!((*buffer_ptr(heap, buffer_cp)).count > 0);
        (*buffer_ptr(heap, buffer_cp)).count -= 1;
    }
}

/// Entry at a slot index for iteration: `(key, value)` for maps, the value
/// twice for sets. None marks an empty sentinel.
pub(crate) fn entry_at(
    heap: &Heap,
    container_cp: CompressedPointer,
    slot: u32,
) -> Option<(Value, Value)> {
    let class_id = data::class_id(heap, container_cp);
    let buffer_cp = buffer_of(heap, container_cp);
    let key = read_slot(heap, buffer_cp, slot);
    if key.is_empty() {
        return None;
    }
    let entry_value = if entry_slots(class_id) == 2 {
        read_slot(heap, buffer_cp, slot + 1)
    } else {
        key
    };
    Some((key, entry_value))
}

pub(crate) fn container_entry_slots(heap: &Heap, container_cp: CompressedPointer) -> u32 {
    entry_slots(data::class_id(heap, container_cp))
}

/// Unhook a dying weak container from the keys that survive this cycle.
/// Runs in the collector's first sweep pass, while every record is still
/// addressable and the marks are valid; dying keys need no unhooking since
/// their back-lists die with them.
pub(crate) fn detach_weak_container(heap: &mut Heap, container_cp: CompressedPointer) {
    let class_id = data::class_id(heap, container_cp);
    debug_assert!(is_weak(class_id));
    let buffer_cp = buffer_of(heap, container_cp);
    if buffer_cp.is_null() {
        return;
    }
    let step = entry_slots(class_id);
    // SAFETY: the buffer header is live.
    let used = unsafe { (*buffer_ptr(heap, buffer_cp)).used };
    let mut slot = 0;
    while slot < used {
        let key = read_slot(heap, buffer_cp, slot);
        if key.is_object() && data::is_visited(heap, key.heap_pointer()) {
            unregister_weak_ref(heap, key.heap_pointer(), container_cp);
        }
        slot += step;
    }
}

/// Sweep-time finalizer: release every slot and the buffer block. Weak
/// containers were already unhooked from surviving keys in the first pass.
pub(crate) fn finalize(heap: &mut Heap, container_cp: CompressedPointer) {
    let class_id = data::class_id(heap, container_cp);
    let buffer_cp = buffer_of(heap, container_cp);
    if buffer_cp.is_null() {
        return;
    }
    // SAFETY: the buffer header is live.
    let (capacity, used) = unsafe {
        let header = buffer_ptr(heap, buffer_cp);
        ((*header).capacity, (*header).used)
    };
    let step = entry_slots(class_id);
    let mut slot = 0;
    while slot < used {
        let key = read_slot(heap, buffer_cp, slot);
        if !key.is_empty() {
            for offset in 0..step {
                let stored = read_slot(heap, buffer_cp, slot + offset);
                value::free_value_if_not_object(heap, stored);
            }
        }
        slot += step;
    }
    let ptr = heap.decompress(buffer_cp);
    heap.free_block(ptr, BUFFER_HEADER_SIZE + capacity as usize * 4);
    data::set_class_value(heap, container_cp, CompressedPointer::NULL.into_raw() as u32);
}

// The weak-reference back-lists.
//
// Each object used as a weak container key carries a hidden internal
// property holding a block of container pointers. When the collector
// finalizes the key it walks this list and removes the key's entries
// through the same path as an explicit delete.

#[repr(C)]
struct WeakRefList {
    capacity: u32,
    count: u32,
    // capacity u16 container pointers follow.
}

const WEAK_LIST_HEADER_SIZE: usize = core::mem::size_of::<WeakRefList>();

fn weak_list_size(capacity: u32) -> usize {
    WEAK_LIST_HEADER_SIZE + capacity as usize * 2
}

#[inline]
unsafe fn weak_list_entry(heap: &Heap, list_cp: CompressedPointer, index: u32) -> *mut u16 {
    // SAFETY: index < capacity, inside the live list block.
    unsafe {
        (heap.decompress(list_cp).as_ptr().add(WEAK_LIST_HEADER_SIZE) as *mut u16)
            .add(index as usize)
    }
}

fn weak_list_of(heap: &Heap, key_cp: CompressedPointer) -> Option<(PropertyRef, CompressedPointer)> {
    let property =
        property_storage::find_internal_property(heap, key_cp, MagicStringId::HIDDEN_WEAK_REFS)?;
    let raw = property_storage::property_raw_value(heap, property);
    Some((property, CompressedPointer::from_raw(raw as u16)))
}

fn register_weak_ref(heap: &mut Heap, key_cp: CompressedPointer, container_cp: CompressedPointer) {
    if let Some((property, list_cp)) = weak_list_of(heap, key_cp) {
        // SAFETY: the list header is live.
        let (capacity, count) = unsafe {
            let header = heap.deref::<WeakRefList>(list_cp);
            ((*header).capacity, (*header).count)
        };
        for index in 0..count {
            // SAFETY: index < count.
            if unsafe { *weak_list_entry(heap, list_cp, index) } == container_cp.into_raw() {
                return;
            }
        }
        let list_cp = if count == capacity {
            let old_ptr = heap.decompress(list_cp);
            let new_ptr =
                heap.realloc(old_ptr, weak_list_size(capacity), weak_list_size(capacity * 2));
            let new_cp = heap.compress(new_ptr);
            // SAFETY: the grown header is live.
            unsafe {
                (*heap.deref::<WeakRefList>(new_cp)).capacity = capacity * 2;
            }
            property_storage::set_property_raw_value(heap, property, new_cp.into_raw() as u32);
            new_cp
        } else {
            list_cp
        };
        // SAFETY: count < capacity after the growth check.
        unsafe {
            *weak_list_entry(heap, list_cp, count) = container_cp.into_raw();
            (*heap.deref::<WeakRefList>(list_cp)).count = count + 1;
        }
        return;
    }

    let capacity = 4u32;
    let ptr = heap.alloc(weak_list_size(capacity));
    // SAFETY: a fresh block of list size.
    unsafe {
        ptr.cast::<WeakRefList>().write(WeakRefList { capacity, count: 1 });
    }
    let list_cp = heap.compress(ptr);
    // SAFETY: index 0 < capacity.
    unsafe {
        *weak_list_entry(heap, list_cp, 0) = container_cp.into_raw();
    }
    property_storage::create_internal_property(
        heap,
        key_cp,
        MagicStringId::HIDDEN_WEAK_REFS,
        list_cp.into_raw() as u32,
    );
}

fn unregister_weak_ref(
    heap: &mut Heap,
    key_cp: CompressedPointer,
    container_cp: CompressedPointer,
) {
    let Some((_, list_cp)) = weak_list_of(heap, key_cp) else {
        return;
    };
    // SAFETY: the list header is live.
    let count = unsafe { (*heap.deref::<WeakRefList>(list_cp)).count };
    for index in 0..count {
        // SAFETY: index < count.
        if unsafe { *weak_list_entry(heap, list_cp, index) } == container_cp.into_raw() {
            // SAFETY: both indices are < count.
            unsafe {
                let last = *weak_list_entry(heap, list_cp, count - 1);
                *weak_list_entry(heap, list_cp, index) = last;
                (*heap.deref::<WeakRefList>(list_cp)).count = count - 1;
            }
            return;
        }
    }
}

/// Free a weak-reference list block (the internal property payload
/// cleanup).
pub(crate) fn free_weak_ref_list(heap: &mut Heap, list_cp: CompressedPointer) {
    if list_cp.is_null() {
        return;
    }
    // SAFETY: the list header is live.
    let capacity = unsafe { (*heap.deref::<WeakRefList>(list_cp)).capacity };
    let ptr = heap.decompress(list_cp);
    heap.free_block(ptr, weak_list_size(capacity));
}

/// Collector hook: a weak key is about to die. Remove its entries from
/// every registered container that survives this cycle; dying containers
/// are torn down wholesale by their own finalizer.
pub(crate) fn finalize_weak_key(heap: &mut Heap, key_cp: CompressedPointer) {
    let Some((_, list_cp)) = weak_list_of(heap, key_cp) else {
        return;
    };
    // SAFETY: the list header is live.
    let count = unsafe { (*heap.deref::<WeakRefList>(list_cp)).count };
    let key_value = Value::from_object_record(key_cp);
    for index in 0..count {
        // SAFETY: index < count.
        let container_cp =
            CompressedPointer::from_raw(unsafe { *weak_list_entry(heap, list_cp, index) });
        if !data::is_visited(heap, container_cp) {
            continue;
        }
        if let Some(slot) = find_entry(heap, container_cp, key_value) {
            clear_entry(heap, container_cp, slot);
        }
    }
}

impl Agent {
    pub fn create_map(&mut self) -> Value {
        Value::from_object_record(new_container(&mut self.heap, ClassId::Map))
    }

    pub fn create_set(&mut self) -> Value {
        Value::from_object_record(new_container(&mut self.heap, ClassId::Set))
    }

    pub fn create_weak_map(&mut self) -> Value {
        Value::from_object_record(new_container(&mut self.heap, ClassId::WeakMap))
    }

    pub fn create_weak_set(&mut self) -> Value {
        Value::from_object_record(new_container(&mut self.heap, ClassId::WeakSet))
    }

    /// Map and WeakMap entry insertion/update.
    pub fn map_set(&mut self, map: Value, key: Value, v: Value) -> JsResult<()> {
        container_set(self, map, key, Some(v))
    }

    /// Map and WeakMap lookup; undefined when absent.
    pub fn map_get(&mut self, map: Value, key: Value) -> JsResult<Value> {
        container_get(self, map, key)
    }

    /// Set and WeakSet insertion.
    pub fn set_add(&mut self, set: Value, v: Value) -> JsResult<()> {
        container_set(self, set, v, None)
    }

    /// Membership test of any container kind.
    pub fn container_has(&mut self, container: Value, key: Value) -> JsResult<bool> {
        container_has(self, container, key)
    }

    /// Entry removal of any container kind. False when the key was absent.
    pub fn container_delete(&mut self, container: Value, key: Value) -> JsResult<bool> {
        container_delete(self, container, key)
    }

    /// Live entry count of any container kind.
    pub fn container_size(&mut self, container: Value) -> JsResult<u32> {
        if container_class(&self.heap, container).is_none() {
            return Err(self.throw_type_error("Expected a container object."));
        }
        Ok(container_size(&self.heap, container.heap_pointer()))
    }
}
