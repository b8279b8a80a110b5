// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Array and container iterators.
//!
//! Iterators are class-tagged objects holding `(iterated, index, kind)`.
//! `next()` walks the target past empty slots and yields `{value, done}`
//! result objects. The packed index field spills into a hidden internal
//! property above the packed limit, so enormous collections stay iterable.

use crate::config::ITERATOR_PACKED_INDEX_LIMIT;
use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, map};
use crate::ecmascript::execution::{Agent, JsResult};
use crate::ecmascript::objects::data::{
    self, ClassId, IteratorKind, IteratorRecord, ObjectType,
};
use crate::ecmascript::objects::{internal_methods, property_storage};
use crate::ecmascript::objects::property_storage::PropertyName;
use crate::ecmascript::types::{MagicStringId, Value, value};

#[inline]
fn record_ptr(heap: &Heap, cp: CompressedPointer) -> *mut IteratorRecord {
    heap.deref::<IteratorRecord>(cp)
}

fn is_iterator(heap: &Heap, v: Value) -> Option<ClassId> {
    if !v.is_object() {
        return None;
    }
    let cp = v.heap_pointer();
    if data::object_type(heap, cp) != ObjectType::Class {
        return None;
    }
    let class_id = data::class_id(heap, cp);
    class_id.is_iterator().then_some(class_id)
}

pub(crate) fn iterated_value(heap: &Heap, cp: CompressedPointer) -> Value {
    // SAFETY: cp references a live iterator record.
    Value::from_raw(unsafe { (*record_ptr(heap, cp)).iterated })
}

/// Current index, reading the spill property past the packed limit.
fn iterator_index(heap: &Heap, cp: CompressedPointer) -> u32 {
    // SAFETY: cp references a live iterator record.
    let packed = unsafe { (*record_ptr(heap, cp)).index };
    if packed < ITERATOR_PACKED_INDEX_LIMIT {
        return packed;
    }
    property_storage::find_internal_property(heap, cp, MagicStringId::HIDDEN_ITERATOR_INDEX)
        .map_or(packed, |property| {
            property_storage::property_raw_value(heap, property)
        })
}

/// Advance the index, spilling into the hidden property once it leaves the
/// packed range.
fn set_iterator_index(heap: &mut Heap, cp: CompressedPointer, index: u32) {
    if index < ITERATOR_PACKED_INDEX_LIMIT {
        // SAFETY: cp references a live iterator record.
        unsafe {
            (*record_ptr(heap, cp)).index = index;
        }
        return;
    }
    // SAFETY: as above.
    unsafe {
        (*record_ptr(heap, cp)).index = ITERATOR_PACKED_INDEX_LIMIT;
    }
    match property_storage::find_internal_property(heap, cp, MagicStringId::HIDDEN_ITERATOR_INDEX)
    {
        Some(property) => property_storage::set_property_raw_value(heap, property, index),
        None => {
            property_storage::create_internal_property(
                heap,
                cp,
                MagicStringId::HIDDEN_ITERATOR_INDEX,
                index,
            );
        }
    }
}

/// ### [7.4.12 CreateIteratorResultObject ( value, done )](https://tc39.es/ecma262/#sec-createiterresultobject)
pub(crate) fn create_iter_result(agent: &mut Agent, result_value: Value, done: bool) -> Value {
    let object = agent.create_object();
    let object_cp = object.heap_pointer();
    let all = property_storage::PROPERTY_FLAGS_ALL;
    property_storage::create_named_data_property(
        &mut agent.heap,
        object_cp,
        PropertyName::Magic(MagicStringId::VALUE),
        all,
        result_value,
    );
    property_storage::create_named_data_property(
        &mut agent.heap,
        object_cp,
        PropertyName::Magic(MagicStringId::DONE),
        all,
        Value::from_boolean(done),
    );
    object
}

fn kind_of(heap: &Heap, cp: CompressedPointer) -> IteratorKind {
    // SAFETY: cp references a live iterator record.
    IteratorKind::from_bits(unsafe { (*record_ptr(heap, cp)).kind })
}

/// `next()` of any engine iterator: yields the `{value, done}` result
/// object, owned by the caller.
pub(crate) fn iterator_next(agent: &mut Agent, iterator: Value) -> JsResult<Value> {
    let Some(class_id) = is_iterator(&agent.heap, iterator) else {
        return Err(agent.throw_type_error("Expected an iterator object."));
    };
    let iterator_cp = iterator.heap_pointer();
    match class_id {
        ClassId::ArrayIterator => array_iterator_next(agent, iterator_cp),
        _ => container_iterator_next(agent, iterator_cp),
    }
}

fn array_iterator_next(agent: &mut Agent, iterator_cp: CompressedPointer) -> JsResult<Value> {
    let target = iterated_value(&agent.heap, iterator_cp);
    let index = iterator_index(&agent.heap, iterator_cp);
    debug_assert!(target.is_object());
    let target_cp = target.heap_pointer();

    let length = match data::object_type(&agent.heap, target_cp) {
        ObjectType::Array => array::array_length(&agent.heap, target_cp),
        ObjectType::PseudoArray => {
            crate::ecmascript::builtins::typed_array::length_of(&agent.heap, target_cp)
        }
        _ => 0,
    };
    if index >= length {
        return Ok(create_iter_result(agent, Value::UNDEFINED, true));
    }
    set_iterator_index(&mut agent.heap, iterator_cp, index + 1);

    let result_value = match kind_of(&agent.heap, iterator_cp) {
        IteratorKind::Keys => internal_methods::length_value(agent, index),
        IteratorKind::Values => {
            let element =
                internal_methods::internal_get(agent, target_cp, PropertyName::Index(index), target)?;
            element
        }
        IteratorKind::Entries => {
            let element =
                internal_methods::internal_get(agent, target_cp, PropertyName::Index(index), target)?;
            let key = internal_methods::length_value(agent, index);
            let pair = make_entry_pair(agent, key, element);
            agent.free_value(key);
            agent.free_value(element);
            pair
        }
    };
    let result = create_iter_result(agent, result_value, false);
    agent.free_value(result_value);
    Ok(result)
}

fn container_iterator_next(agent: &mut Agent, iterator_cp: CompressedPointer) -> JsResult<Value> {
    let target = iterated_value(&agent.heap, iterator_cp);
    debug_assert!(target.is_object());
    let container_cp = target.heap_pointer();
    let step = map::container_entry_slots(&agent.heap, container_cp);
    let used = map::container_used_slots(&agent.heap, container_cp);

    let mut slot = iterator_index(&agent.heap, iterator_cp);
    while slot < used {
        if let Some((key, entry_value)) = map::entry_at(&agent.heap, container_cp, slot) {
            set_iterator_index(&mut agent.heap, iterator_cp, slot + step);
            let result_value = match kind_of(&agent.heap, iterator_cp) {
                IteratorKind::Keys => value::copy_value(&mut agent.heap, key),
                IteratorKind::Values => value::copy_value(&mut agent.heap, entry_value),
                IteratorKind::Entries => make_entry_pair(agent, key, entry_value),
            };
            let result = create_iter_result(agent, result_value, false);
            agent.free_value(result_value);
            return Ok(result);
        }
        slot += step;
    }
    set_iterator_index(&mut agent.heap, iterator_cp, used);
    Ok(create_iter_result(agent, Value::UNDEFINED, true))
}

/// A two-element `[key, value]` array for entries iteration.
fn make_entry_pair(agent: &mut Agent, key: Value, entry_value: Value) -> Value {
    let pair_cp = array::new_array(&mut agent.heap, 2);
    let pair = Value::from_object_record(pair_cp);
    // Element stores on a fresh two-slot fast array cannot fail.
    let _ = array::set_element(agent, pair_cp, 0, key);
    let _ = array::set_element(agent, pair_cp, 1, entry_value);
    pair
}

impl Agent {
    /// Create a keys/values/entries iterator over an array or typed array.
    pub fn create_array_iterator(&mut self, target: Value, kind: IteratorKind) -> JsResult<Value> {
        let target_cp = self.expect_object(target)?;
        if !matches!(
            data::object_type(&self.heap, target_cp),
            ObjectType::Array | ObjectType::PseudoArray
        ) {
            return Err(self.throw_type_error("Expected an array."));
        }
        Ok(Value::from_object_record(data::new_iterator_object(
            &mut self.heap,
            CompressedPointer::NULL,
            ClassId::ArrayIterator,
            kind,
            target,
        )))
    }

    /// Create a keys/values/entries iterator over a Map or Set.
    pub fn create_container_iterator(
        &mut self,
        target: Value,
        kind: IteratorKind,
    ) -> JsResult<Value> {
        let Some(class_id) = map::container_class(&self.heap, target) else {
            return Err(self.throw_type_error("Expected a Map or Set."));
        };
        let iterator_class = match class_id {
            ClassId::Map => ClassId::MapIterator,
            ClassId::Set => ClassId::SetIterator,
            _ => {
                return Err(self.throw_type_error("Weak containers are not iterable."));
            }
        };
        Ok(Value::from_object_record(data::new_iterator_object(
            &mut self.heap,
            CompressedPointer::NULL,
            iterator_class,
            kind,
            target,
        )))
    }

    /// Advance an iterator: the raw `{value, done}` result object.
    pub fn iterator_next(&mut self, iterator: Value) -> JsResult<Value> {
        iterator_next(self, iterator)
    }

    /// Advance an iterator, unwrapping the result: Some(value) until done.
    pub fn iterator_step(&mut self, iterator: Value) -> JsResult<Option<Value>> {
        let result = iterator_next(self, iterator)?;
        let done = self.get_property_by_magic(result, MagicStringId::DONE)?;
        let is_done = self.to_boolean(done);
        self.free_value(done);
        if is_done {
            self.free_value(result);
            return Ok(None);
        }
        let step_value = self.get_property_by_magic(result, MagicStringId::VALUE)?;
        self.free_value(result);
        Ok(Some(step_value))
    }
}
