// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Array objects.
//!
//! Arrays start in the fast layout: the property-list slot points at a flat
//! buffer of element values and holes are explicit sentinels counted in the
//! header. The array falls back to the normal property-list layout when a
//! non-index property arrives, when an element needs non-default
//! attributes, or when a mutation would blow a hole ceiling. The `length`
//! property is virtual in both layouts and all writes to it funnel through
//! one state machine.

use crate::config::{FAST_ARRAY_MAX_HOLES, FAST_ARRAY_MAX_NEW_HOLES};
use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::execution::{Agent, JsResult};
use crate::ecmascript::objects::data::{self, ArrayRecord, ObjectType};
use crate::ecmascript::objects::internal_methods::{self, OwnProperty};
use crate::ecmascript::objects::property_storage::{
    self, PROPERTY_FLAG_CONFIGURABLE, PROPERTY_FLAG_ENUMERABLE, PROPERTY_FLAG_WRITABLE,
    PROPERTY_KIND_NAMED_DATA, PropertyName,
};
use crate::ecmascript::types::{MagicStringId, PropertyDescriptor, Value, number, value};

const LENGTH_WRITABLE: u32 = 1 << 0;
const FAST_MODE: u32 = 1 << 1;
const HOLE_COUNT_SHIFT: u32 = 2;

#[inline]
fn record_ptr(heap: &Heap, cp: CompressedPointer) -> *mut ArrayRecord {
    heap.deref::<ArrayRecord>(cp)
}

pub(crate) fn array_length(heap: &Heap, cp: CompressedPointer) -> u32 {
    // SAFETY: cp references a live array record.
    unsafe { (*record_ptr(heap, cp)).length }
}

fn set_array_length_field(heap: &mut Heap, cp: CompressedPointer, length: u32) {
    // SAFETY: cp references a live array record.
    unsafe {
        (*record_ptr(heap, cp)).length = length;
    }
}

fn packed_field(heap: &Heap, cp: CompressedPointer) -> u32 {
    // SAFETY: cp references a live array record.
    unsafe { (*record_ptr(heap, cp)).length_prop_and_hole_count }
}

fn set_packed_field(heap: &mut Heap, cp: CompressedPointer, field: u32) {
    // SAFETY: cp references a live array record.
    unsafe {
        (*record_ptr(heap, cp)).length_prop_and_hole_count = field;
    }
}

pub(crate) fn is_fast_array(heap: &Heap, cp: CompressedPointer) -> bool {
    packed_field(heap, cp) & FAST_MODE != 0
}

pub(crate) fn is_length_writable(heap: &Heap, cp: CompressedPointer) -> bool {
    packed_field(heap, cp) & LENGTH_WRITABLE != 0
}

fn hole_count(heap: &Heap, cp: CompressedPointer) -> u32 {
    packed_field(heap, cp) >> HOLE_COUNT_SHIFT
}

fn set_hole_count(heap: &mut Heap, cp: CompressedPointer, holes: u32) {
    let flags = packed_field(heap, cp) & (LENGTH_WRITABLE | FAST_MODE);
    set_packed_field(heap, cp, flags | (holes << HOLE_COUNT_SHIFT));
}

#[inline]
fn buffer_base(heap: &Heap, cp: CompressedPointer) -> *mut u32 {
    let buffer_cp = data::property_list(heap, cp);
    debug_assert!(!buffer_cp.is_null());
    heap.decompress(buffer_cp).as_ptr() as *mut u32
}

/// Create an array of the given length. Starts in the fast layout unless
/// the element buffer cannot be allocated.
pub(crate) fn new_array(heap: &mut Heap, length: u32) -> CompressedPointer {
    let ptr = heap.alloc(core::mem::size_of::<ArrayRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<ArrayRecord>() as isize);
    let record = ptr.as_ptr() as *mut ArrayRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::Array,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).length = length;
        (*record).length_prop_and_hole_count = LENGTH_WRITABLE | FAST_MODE;
    }

    if length > 0 {
        match heap.try_alloc(length as usize * 4) {
            Some(buffer) => {
                // SAFETY: a fresh buffer of length element words.
                unsafe {
                    let base = buffer.as_ptr() as *mut u32;
                    for index in 0..length as usize {
                        base.add(index).write(Value::ARRAY_HOLE.into_raw());
                    }
                }
                let buffer_cp = heap.compress(buffer);
                data::set_property_list(heap, cp, buffer_cp);
                set_hole_count(heap, cp, length);
            }
            None => {
                // Keep the requested length, but give up on the flat layout.
                let flags = packed_field(heap, cp) & !FAST_MODE;
                set_packed_field(heap, cp, flags);
            }
        }
    }
    cp
}

/// Element of a fast array. None is a hole or out of range; the value is
/// not copied.
fn fast_element(heap: &Heap, cp: CompressedPointer, index: u32) -> Option<Value> {
    if index >= array_length(heap, cp) || data::property_list(heap, cp).is_null() {
        return None;
    }
    // SAFETY: index < length and the buffer is live.
    let raw = unsafe { buffer_base(heap, cp).add(index as usize).read() };
    let element = Value::from_raw(raw);
    if element.is_array_hole() {
        None
    } else {
        Some(element)
    }
}

/// Convert a fast array to the normal property-list layout, materializing
/// one data property per non-hole element, highest index first.
pub(crate) fn convert_to_normal(heap: &mut Heap, cp: CompressedPointer) {
    debug_assert!(is_fast_array(heap, cp));
    let length = array_length(heap, cp);
    let buffer_cp = data::property_list(heap, cp);

    // Once the buffer is detached the collector no longer traces its
    // elements, and property creation below can trigger a collection. Take
    // strong references first so nothing dies mid-conversion.
    let mut elements: Vec<(u32, Value)> = Vec::new();
    if !buffer_cp.is_null() {
        for index in (0..length).rev() {
            // SAFETY: index < length of the live element buffer.
            let raw = unsafe {
                (heap.decompress(buffer_cp).as_ptr() as *const u32)
                    .add(index as usize)
                    .read()
            };
            let element = Value::from_raw(raw);
            if !element.is_array_hole() {
                elements.push((index, value::copy_value(heap, element)));
                value::free_value_if_not_object(heap, element);
            }
        }
        let ptr = heap.decompress(buffer_cp);
        heap.free_block(ptr, length as usize * 4);
    }

    data::set_property_list(heap, cp, CompressedPointer::NULL);
    let flags = packed_field(heap, cp) & LENGTH_WRITABLE;
    set_packed_field(heap, cp, flags);

    for (index, element) in elements {
        property_storage::create_named_data_property(
            heap,
            cp,
            PropertyName::Index(index),
            PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_ENUMERABLE | PROPERTY_FLAG_CONFIGURABLE,
            element,
        );
        value::free_value(heap, element);
    }
}

/// Free a fast array's buffer and the references its elements hold. The
/// sweep-time finalizer.
pub(crate) fn finalize(heap: &mut Heap, cp: CompressedPointer) {
    if !is_fast_array(heap, cp) {
        return;
    }
    let buffer_cp = data::property_list(heap, cp);
    if buffer_cp.is_null() {
        return;
    }
    let length = array_length(heap, cp);
    for index in 0..length {
        // SAFETY: the buffer is live until freed below.
        let raw = unsafe {
            (heap.decompress(buffer_cp).as_ptr() as *const u32)
                .add(index as usize)
                .read()
        };
        let element = Value::from_raw(raw);
        if !element.is_array_hole() {
            value::free_value_if_not_object(heap, element);
        }
    }
    let ptr = heap.decompress(buffer_cp);
    heap.free_block(ptr, length as usize * 4);
    data::set_property_list(heap, cp, CompressedPointer::NULL);
}

/// Virtual and fast-layout own properties of an array.
pub(crate) fn array_own_property(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> Option<OwnProperty> {
    if let PropertyName::Magic(MagicStringId::LENGTH) = name {
        let length = array_length(&agent.heap, cp);
        return Some(OwnProperty::Data {
            value: internal_methods::length_value(agent, length),
            writable: is_length_writable(&agent.heap, cp),
            enumerable: false,
            configurable: false,
        });
    }
    if is_fast_array(&agent.heap, cp) {
        if let PropertyName::Index(index) = name {
            let element = fast_element(&agent.heap, cp, index)?;
            return Some(OwnProperty::Data {
                value: value::copy_value(&mut agent.heap, element),
                writable: true,
                enumerable: true,
                configurable: true,
            });
        }
    }
    None
}

/// The array-specific arm of \[\[Set\]\]. Returns None when the generic
/// path should continue.
pub(crate) fn array_set(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    new_value: Value,
) -> JsResult<Option<bool>> {
    match name {
        PropertyName::Magic(MagicStringId::LENGTH) => {
            Ok(Some(set_length(agent, cp, new_value)?))
        }
        PropertyName::Index(index) => set_element(agent, cp, index, new_value).map(Some),
        _ => {
            if is_fast_array(&agent.heap, cp) {
                // A non-index property ends the fast layout.
                convert_to_normal(&mut agent.heap, cp);
            }
            Ok(None)
        }
    }
}

/// Store an element, growing the fast buffer within the hole ceilings and
/// falling back to the normal layout past them.
pub(crate) fn set_element(
    agent: &mut Agent,
    cp: CompressedPointer,
    index: u32,
    new_value: Value,
) -> JsResult<bool> {
    let length = array_length(&agent.heap, cp);

    if is_fast_array(&agent.heap, cp) {
        if index < length {
            // SAFETY: index < length and the buffer is live.
            let old_raw = unsafe { buffer_base(&agent.heap, cp).add(index as usize).read() };
            let old = Value::from_raw(old_raw);
            let stored = value::copy_value_if_not_object(&mut agent.heap, new_value);
            // SAFETY: as above.
            unsafe {
                buffer_base(&agent.heap, cp)
                    .add(index as usize)
                    .write(stored.into_raw());
            }
            if old.is_array_hole() {
                let holes = hole_count(&agent.heap, cp);
                set_hole_count(&mut agent.heap, cp, holes - 1);
            } else {
                value::free_value_if_not_object(&mut agent.heap, old);
            }
            return Ok(true);
        }

        if !is_length_writable(&agent.heap, cp) {
            return Ok(false);
        }
        if index == u32::MAX {
            return Err(agent.throw_range_error("Invalid array index."));
        }

        let new_holes = index - length;
        if new_holes <= FAST_ARRAY_MAX_NEW_HOLES {
            grow_fast_buffer(&mut agent.heap, cp, index + 1);
            let stored = value::copy_value_if_not_object(&mut agent.heap, new_value);
            // SAFETY: the buffer now covers index.
            unsafe {
                buffer_base(&agent.heap, cp)
                    .add(index as usize)
                    .write(stored.into_raw());
            }
            let holes = hole_count(&agent.heap, cp);
            set_hole_count(&mut agent.heap, cp, holes + new_holes);
            set_array_length_field(&mut agent.heap, cp, index + 1);
            return Ok(true);
        }
        // Too sparse: give up on the flat layout and store the element
        // through the normal path below.
        convert_to_normal(&mut agent.heap, cp);
    }

    // Normal layout.
    if let Some(property) =
        property_storage::find_property(&agent.heap, cp, PropertyName::Index(index))
    {
        if property_storage::property_kind(&agent.heap, property) == PROPERTY_KIND_NAMED_DATA {
            if property_storage::property_flags(&agent.heap, property) & PROPERTY_FLAG_WRITABLE
                == 0
            {
                return Ok(false);
            }
            property_storage::set_named_data_value(&mut agent.heap, property, new_value);
            return Ok(true);
        }
        // An accessor element: invoke its setter directly.
        return internal_methods::set_through_accessor(
            agent,
            property,
            new_value,
            Value::from_object_record(cp),
        );
    }

    if !data::is_extensible(&agent.heap, cp) {
        return Ok(false);
    }
    if index >= length && !is_length_writable(&agent.heap, cp) {
        return Ok(false);
    }
    property_storage::create_named_data_property(
        &mut agent.heap,
        cp,
        PropertyName::Index(index),
        PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_ENUMERABLE | PROPERTY_FLAG_CONFIGURABLE,
        new_value,
    );
    if index >= length {
        set_array_length_field(&mut agent.heap, cp, index + 1);
    }
    Ok(true)
}

fn grow_fast_buffer(heap: &mut Heap, cp: CompressedPointer, new_length: u32) {
    let length = array_length(heap, cp);
    debug_assert!(new_length > length);
    let buffer_cp = data::property_list(heap, cp);
    let new_buffer = if buffer_cp.is_null() {
        heap.alloc(new_length as usize * 4)
    } else {
        let old_ptr = heap.decompress(buffer_cp);
        heap.realloc(old_ptr, length as usize * 4, new_length as usize * 4)
    };
    // SAFETY: the grown buffer covers new_length element words; fill the
    // fresh tail with holes.
    unsafe {
        let base = new_buffer.as_ptr() as *mut u32;
        for index in length..new_length {
            base.add(index as usize).write(Value::ARRAY_HOLE.into_raw());
        }
    }
    let new_cp = heap.compress(new_buffer);
    data::set_property_list(heap, cp, new_cp);
}

/// The array-specific arm of \[\[Delete\]\].
pub(crate) fn array_delete(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> Option<bool> {
    if let PropertyName::Magic(MagicStringId::LENGTH) = name {
        return Some(false);
    }
    if !is_fast_array(&agent.heap, cp) {
        return None;
    }
    let PropertyName::Index(index) = name else {
        // Fast arrays have no other own properties.
        return Some(true);
    };
    if fast_element(&agent.heap, cp, index).is_none() {
        return Some(true);
    }
    // SAFETY: index < length and the buffer is live.
    let old = Value::from_raw(unsafe { buffer_base(&agent.heap, cp).add(index as usize).read() });
    // SAFETY: as above.
    unsafe {
        buffer_base(&agent.heap, cp)
            .add(index as usize)
            .write(Value::ARRAY_HOLE.into_raw());
    }
    value::free_value_if_not_object(&mut agent.heap, old);
    let holes = hole_count(&agent.heap, cp) + 1;
    set_hole_count(&mut agent.heap, cp, holes);
    if holes > FAST_ARRAY_MAX_HOLES {
        convert_to_normal(&mut agent.heap, cp);
    }
    Some(true)
}

/// The array-specific arm of \[\[DefineOwnProperty\]\]. Handles `length`
/// fully; element definitions with non-default attributes force the normal
/// layout and return None so the storage path applies them.
pub(crate) fn array_define_own(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) -> JsResult<Option<bool>> {
    if let PropertyName::Magic(MagicStringId::LENGTH) = name {
        return define_length(agent, cp, descriptor).map(Some);
    }

    let PropertyName::Index(index) = name else {
        if is_fast_array(&agent.heap, cp) {
            convert_to_normal(&mut agent.heap, cp);
        }
        return Ok(None);
    };

    let is_plain_data = descriptor.value.is_some()
        && !descriptor.is_accessor_descriptor()
        && descriptor.writable != Some(false)
        && descriptor.enumerable != Some(false)
        && descriptor.configurable != Some(false);

    if is_fast_array(&agent.heap, cp) && is_plain_data {
        let result = set_element(agent, cp, index, descriptor.value.unwrap())?;
        return Ok(Some(result));
    }
    if is_fast_array(&agent.heap, cp) {
        convert_to_normal(&mut agent.heap, cp);
    }
    // Keep length in sync when the storage define lands past it.
    let result =
        internal_methods::define_own_in_storage(agent, cp, PropertyName::Index(index), descriptor)?;
    if result && index >= array_length(&agent.heap, cp) {
        if !is_length_writable(&agent.heap, cp) {
            return Ok(Some(false));
        }
        set_array_length_field(&mut agent.heap, cp, index + 1);
    }
    Ok(Some(result))
}

/// Attribute redefinition of `length`. Only the writable bit and the value
/// may change.
fn define_length(
    agent: &mut Agent,
    cp: CompressedPointer,
    descriptor: &PropertyDescriptor,
) -> JsResult<bool> {
    if descriptor.is_accessor_descriptor()
        || descriptor.enumerable == Some(true)
        || descriptor.configurable == Some(true)
    {
        return Ok(false);
    }
    if let Some(new_value) = descriptor.value {
        if !set_length(agent, cp, new_value)? {
            return Ok(false);
        }
    }
    if descriptor.writable == Some(false) {
        let field = packed_field(&agent.heap, cp) & !LENGTH_WRITABLE;
        set_packed_field(&mut agent.heap, cp, field);
    }
    Ok(true)
}

/// ### [10.4.2.4 ArraySetLength ( A, Desc )](https://tc39.es/ecma262/#sec-arraysetlength)
/// restricted to the value transition.
pub(crate) fn set_length(
    agent: &mut Agent,
    cp: CompressedPointer,
    new_value: Value,
) -> JsResult<bool> {
    let numeric = agent.to_number(new_value)?;
    let new_length = number::number_to_uint32(numeric);
    if new_length as f64 != numeric {
        return Err(agent.throw_range_error("Invalid array length."));
    }

    let length = array_length(&agent.heap, cp);
    if new_length == length {
        return Ok(true);
    }
    if !is_length_writable(&agent.heap, cp) {
        return Ok(false);
    }

    if new_length < length {
        truncate(agent, cp, new_length);
    } else if is_fast_array(&agent.heap, cp) {
        if new_length - length > FAST_ARRAY_MAX_NEW_HOLES {
            convert_to_normal(&mut agent.heap, cp);
            set_array_length_field(&mut agent.heap, cp, new_length);
        } else {
            grow_fast_buffer(&mut agent.heap, cp, new_length);
            let holes = hole_count(&agent.heap, cp) + (new_length - length);
            set_hole_count(&mut agent.heap, cp, holes);
            set_array_length_field(&mut agent.heap, cp, new_length);
        }
    } else {
        set_array_length_field(&mut agent.heap, cp, new_length);
    }
    Ok(true)
}

fn truncate(agent: &mut Agent, cp: CompressedPointer, new_length: u32) {
    let length = array_length(&agent.heap, cp);
    if is_fast_array(&agent.heap, cp) {
        let buffer_cp = data::property_list(&agent.heap, cp);
        if !buffer_cp.is_null() {
            let mut holes = hole_count(&agent.heap, cp);
            for index in new_length..length {
                // SAFETY: index < length and the buffer is live.
                let element = Value::from_raw(unsafe {
                    buffer_base(&agent.heap, cp).add(index as usize).read()
                });
                if element.is_array_hole() {
                    holes -= 1;
                } else {
                    value::free_value_if_not_object(&mut agent.heap, element);
                }
            }
            let ptr = agent.heap.decompress(buffer_cp);
            if new_length == 0 {
                agent.heap.free_block(ptr, length as usize * 4);
                data::set_property_list(&mut agent.heap, cp, CompressedPointer::NULL);
            } else {
                let shrunk =
                    agent
                        .heap
                        .realloc(ptr, length as usize * 4, new_length as usize * 4);
                let new_cp = agent.heap.compress(shrunk);
                data::set_property_list(&mut agent.heap, cp, new_cp);
            }
            set_hole_count(&mut agent.heap, cp, holes);
        }
        set_array_length_field(&mut agent.heap, cp, new_length);
        return;
    }

    // Normal layout: release every index property at or past the new
    // length. Deletion notifies (and possibly rebuilds) the hashmap.
    let names = property_storage::own_property_names(&agent.heap, cp);
    for name in names.into_iter().rev() {
        if let PropertyName::Index(index) = name {
            if index >= new_length {
                if let Some(property) = property_storage::find_property(&agent.heap, cp, name) {
                    property_storage::delete_property(&mut agent.heap, cp, property);
                }
            }
        }
    }
    set_array_length_field(&mut agent.heap, cp, new_length);
}

/// Own keys of an array: indices ascending, then `length`, then the
/// remaining keys in insertion order.
pub(crate) fn array_own_keys(heap: &Heap, cp: CompressedPointer) -> Vec<PropertyName> {
    let mut names = if is_fast_array(heap, cp) {
        let mut names = Vec::new();
        let length = array_length(heap, cp);
        for index in 0..length {
            if fast_element(heap, cp, index).is_some() {
                names.push(PropertyName::Index(index));
            }
        }
        names
    } else {
        property_storage::own_property_names(heap, cp)
    };

    let first_non_index = names
        .iter()
        .position(|name| !matches!(name, PropertyName::Index(_)))
        .unwrap_or(names.len());
    names.insert(
        first_non_index,
        PropertyName::Magic(MagicStringId::LENGTH),
    );
    names
}
