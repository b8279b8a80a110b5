// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The mark-and-sweep collector.
//!
//! Roots are the objects holding engine-external references (refs > 0) and
//! the global lexical environment. Marking walks a work queue over the
//! per-kind reference tables in [`visit_object_references`]; the heap
//! snapshot walker iterates the same tables so the two can never drift.
//! The sweep runs in two passes: weak-key finalizers first, against a
//! still-marked world, then unlinking and freeing. Non-object heap cells
//! (strings, floats, bigints, symbols) are purely refcounted and are
//! released by the finalizers rather than traced.

use crate::heap::{GcPressure, Heap};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, array_buffer, function, map};
use crate::ecmascript::objects::data::{
    self, ArrowFunctionRecord, BoundFunctionRecord, ClassId, ExternalFunctionRecord,
    FunctionRecord, IteratorRecord, ObjectType, ProxyRecord, TypedArrayRecord,
};
use crate::ecmascript::objects::property_storage::{
    self, PROPERTY_KIND_DELETED, PROPERTY_KIND_HASHMAP, PROPERTY_KIND_INTERNAL,
    PROPERTY_KIND_NAMED_ACCESSOR, PROPERTY_KIND_NAMED_DATA, PropertyName, PropertyRef,
};
use crate::ecmascript::types::{MagicStringId, Value, value};

/// Kinds of references between heap cells, shared between the collector
/// and the heap snapshot walker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Prototype,
    LexEnv,
    BindArgs,
    Elements,
    Property,
    PropertyName,
    AccessorGetter,
    AccessorSetter,
    PromiseResult,
    PromiseFulfill,
    PromiseReject,
    MapElement,
    Scope,
}

/// Walk every strong reference the object's record holds. The visitor
/// receives the edge kind, the referenced value, and the property name for
/// property-store edges. Weak container keys and weak-reference back-lists
/// are deliberately not reported.
pub(crate) fn visit_object_references(
    heap: &Heap,
    cp: CompressedPointer,
    visitor: &mut dyn FnMut(EdgeKind, Value, Option<PropertyName>),
) {
    let object_type = data::object_type(heap, cp);

    // Prototype, or the outer environment of a lexical environment.
    let proto = data::prototype_of(heap, cp);
    if !proto.is_null() {
        let kind = if object_type.is_lexical_environment() {
            EdgeKind::LexEnv
        } else {
            EdgeKind::Prototype
        };
        visitor(kind, Value::from_object_record(proto), None);
    }

    match object_type {
        ObjectType::LexEnvObjectBound => {
            let bound = data::property_list(heap, cp);
            if !bound.is_null() {
                visitor(EdgeKind::LexEnv, Value::from_object_record(bound), None);
            }
            // The property-list slot is the bound object; there is no
            // property chain to walk.
            return;
        }
        ObjectType::Array if array::is_fast_array(heap, cp) => {
            let buffer = data::property_list(heap, cp);
            if !buffer.is_null() {
                let length = array::array_length(heap, cp);
                for index in 0..length {
                    // SAFETY: index < length of the live element buffer.
                    let raw = unsafe {
                        (heap.decompress(buffer).as_ptr() as *const u32)
                            .add(index as usize)
                            .read()
                    };
                    let element = Value::from_raw(raw);
                    if !element.is_array_hole() {
                        visitor(EdgeKind::Elements, element, None);
                    }
                }
            }
            return;
        }
        ObjectType::Class => {
            let class_id = data::class_id(heap, cp);
            if class_id.is_container() {
                let used = map::container_used_slots(heap, cp);
                let step = map::container_entry_slots(heap, cp);
                let weak = matches!(class_id, ClassId::WeakMap | ClassId::WeakSet);
                let mut slot = 0;
                while slot < used {
                    if let Some((key, entry_value)) = map::entry_at(heap, cp, slot) {
                        if !weak {
                            visitor(EdgeKind::MapElement, key, None);
                        }
                        if step == 2 {
                            visitor(EdgeKind::MapElement, entry_value, None);
                        }
                    }
                    slot += step;
                }
            } else if class_id.is_iterator() {
                // SAFETY: cp references a live iterator record.
                let iterated =
                    Value::from_raw(unsafe { (*heap.deref::<IteratorRecord>(cp)).iterated });
                visitor(EdgeKind::Property, iterated, None);
            } else if class_id != ClassId::ArrayBuffer {
                // Wrapper payloads and error messages are values; an array
                // buffer's hidden word is its raw data-block pointer and
                // must not be read as one.
                let hidden = Value::from_raw(data::class_value(heap, cp));
                visitor(EdgeKind::Property, hidden, None);
            }
        }
        ObjectType::PseudoArray => {
            // SAFETY: cp references a live typed array record.
            let buffer = unsafe { (*heap.deref::<TypedArrayRecord>(cp)).buffer_cp };
            if buffer != 0 {
                visitor(
                    EdgeKind::Elements,
                    Value::from_object_record(CompressedPointer::from_raw(buffer)),
                    None,
                );
            }
        }
        ObjectType::Proxy => {
            // SAFETY: cp references a live proxy record.
            let (target, handler) = unsafe {
                let record = heap.deref::<ProxyRecord>(cp);
                (
                    Value::from_raw((*record).target),
                    Value::from_raw((*record).handler),
                )
            };
            visitor(EdgeKind::Property, target, None);
            visitor(EdgeKind::Property, handler, None);
        }
        ObjectType::Function => {
            // SAFETY: cp references a live function record.
            let scope = unsafe { (*heap.deref::<FunctionRecord>(cp)).scope_cp };
            if scope != 0 {
                visitor(
                    EdgeKind::Scope,
                    Value::from_object_record(CompressedPointer::from_raw(scope)),
                    None,
                );
            }
        }
        ObjectType::ArrowFunction => {
            // SAFETY: cp references a live arrow function record.
            let (scope, this_value) = unsafe {
                let record = heap.deref::<ArrowFunctionRecord>(cp);
                ((*record).scope_cp, Value::from_raw((*record).this_value))
            };
            if scope != 0 {
                visitor(
                    EdgeKind::Scope,
                    Value::from_object_record(CompressedPointer::from_raw(scope)),
                    None,
                );
            }
            visitor(EdgeKind::Property, this_value, None);
        }
        ObjectType::BoundFunction => {
            // SAFETY: cp references a live bound function record.
            let target = unsafe { (*heap.deref::<BoundFunctionRecord>(cp)).target_cp };
            if target != 0 {
                visitor(
                    EdgeKind::Property,
                    Value::from_object_record(CompressedPointer::from_raw(target)),
                    None,
                );
            }
            let (bound_this, bound_args) = function::bound_function_args(heap, cp);
            visitor(EdgeKind::BindArgs, bound_this, None);
            for arg in bound_args {
                visitor(EdgeKind::BindArgs, arg, None);
            }
        }
        _ => {}
    }

    // The ordinary property chain: data values, accessor targets. Internal
    // properties carry raw payloads (weak lists, spill indices) and are
    // not references.
    let mut pair_cp = property_storage::first_pair(heap, cp);
    while !pair_cp.is_null() {
        for slot in 0..2 {
            let property = PropertyRef { pair_cp, slot };
            match property_storage::property_kind(heap, property) {
                PROPERTY_KIND_NAMED_DATA => {
                    let name = property_storage::property_name(heap, property);
                    let stored = property_storage::property_value(heap, property);
                    visitor(EdgeKind::Property, stored, Some(name));
                }
                PROPERTY_KIND_NAMED_ACCESSOR => {
                    let name = property_storage::property_name(heap, property);
                    let (getter, setter) =
                        property_storage::property_accessors(heap, property);
                    if !getter.is_null() {
                        visitor(
                            EdgeKind::AccessorGetter,
                            Value::from_object_record(getter),
                            Some(name),
                        );
                    }
                    if !setter.is_null() {
                        visitor(
                            EdgeKind::AccessorSetter,
                            Value::from_object_record(setter),
                            Some(name),
                        );
                    }
                }
                PROPERTY_KIND_DELETED | PROPERTY_KIND_INTERNAL | PROPERTY_KIND_HASHMAP => {}
                _ => unreachable!("corrupt property kind"),
            }
        }
        // SAFETY: pair_cp references a live pair.
        pair_cp = CompressedPointer::from_raw(unsafe {
            (*property_storage::pair_ptr(heap, pair_cp)).next_cp
        });
    }
}

/// Run a full collection.
pub(crate) fn run(heap: &mut Heap, pressure: GcPressure) {
    if heap.gc_running {
        return;
    }
    heap.gc_running = true;

    // Clear marks.
    let mut cursor = heap.object_list;
    while !cursor.is_null() {
        data::set_visited(heap, cursor, false);
        cursor = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
    }

    // Mark from the roots: externally referenced objects and the global
    // environment.
    let mut queue: Vec<CompressedPointer> = Vec::new();
    let mut cursor = heap.object_list;
    while !cursor.is_null() {
        if data::refs_of(heap, cursor) > 0 && !data::is_visited(heap, cursor) {
            data::set_visited(heap, cursor, true);
            queue.push(cursor);
        }
        cursor = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
    }
    if !heap.global_env.is_null() && !data::is_visited(heap, heap.global_env) {
        data::set_visited(heap, heap.global_env, true);
        queue.push(heap.global_env);
    }

    while let Some(current) = queue.pop() {
        let mut pending: Vec<CompressedPointer> = Vec::new();
        visit_object_references(heap, current, &mut |_, target, _| {
            if target.is_object() {
                pending.push(target.heap_pointer());
            }
        });
        for target in pending {
            if !data::is_visited(heap, target) {
                data::set_visited(heap, target, true);
                queue.push(target);
            }
        }
    }

    // Sweep pass one: weak-key finalizers run against the still-marked
    // world, removing dying keys from surviving weak containers.
    let mut dying: Vec<CompressedPointer> = Vec::new();
    let mut cursor = heap.object_list;
    while !cursor.is_null() {
        if !data::is_visited(heap, cursor) {
            dying.push(cursor);
        }
        cursor = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
    }
    for &object_cp in &dying {
        if property_storage::find_internal_property(
            heap,
            object_cp,
            MagicStringId::HIDDEN_WEAK_REFS,
        )
        .is_some()
        {
            map::finalize_weak_key(heap, object_cp);
        }
        // A dying weak container unhooks from its surviving keys now, while
        // every record is still addressable.
        if data::object_type(heap, object_cp) == ObjectType::Class {
            let class_id = data::class_id(heap, object_cp);
            if matches!(class_id, ClassId::WeakMap | ClassId::WeakSet) {
                map::detach_weak_container(heap, object_cp);
            }
        }
    }

    // Sweep pass two: unlink the dying objects, then tear them down.
    if !dying.is_empty() {
        let mut list = CompressedPointer::NULL;
        let mut tail = CompressedPointer::NULL;
        let mut cursor = heap.object_list;
        while !cursor.is_null() {
            let next = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
            if data::is_visited(heap, cursor) {
                if tail.is_null() {
                    list = cursor;
                } else {
                    // SAFETY: tail references a live object record.
                    unsafe {
                        (*data::object_ptr(heap, tail)).gc_next_cp = cursor.into_raw();
                    }
                }
                tail = cursor;
            }
            cursor = next;
        }
        if !tail.is_null() {
            // SAFETY: tail references a live object record.
            unsafe {
                (*data::object_ptr(heap, tail)).gc_next_cp = 0;
            }
        }
        heap.object_list = list;

        for object_cp in dying {
            free_object(heap, object_cp);
        }
    }

    if pressure >= GcPressure::High {
        let Heap {
            allocator, pools, ..
        } = heap;
        pools.collect_empty(allocator);
    }

    heap.gc_running = false;
}

/// Tear down a dead object: kind-specific finalizer, property list, record.
fn free_object(heap: &mut Heap, cp: CompressedPointer) {
    let object_type = data::object_type(heap, cp);
    let record_size = data::object_record_size(heap, cp);

    match object_type {
        ObjectType::Array => array::finalize(heap, cp),
        ObjectType::Class => {
            let class_id = data::class_id(heap, cp);
            if class_id.is_container() {
                map::finalize(heap, cp);
            } else if class_id == ClassId::ArrayBuffer {
                array_buffer::finalize(heap, cp);
            } else if !class_id.is_iterator() {
                // Wrapper payloads and error messages hold one reference.
                let hidden = Value::from_raw(data::class_value(heap, cp));
                value::free_value_if_not_object(heap, hidden);
            }
        }
        ObjectType::Function => {
            // SAFETY: cp references a live function record.
            let bytecode = unsafe { (*heap.deref::<FunctionRecord>(cp)).bytecode_cp };
            free_bytecode(heap, bytecode);
        }
        ObjectType::ArrowFunction => {
            // SAFETY: cp references a live arrow function record.
            let (bytecode, this_value) = unsafe {
                let record = heap.deref::<ArrowFunctionRecord>(cp);
                ((*record).bytecode_cp, Value::from_raw((*record).this_value))
            };
            free_bytecode(heap, bytecode);
            value::free_value_if_not_object(heap, this_value);
        }
        ObjectType::BoundFunction => {
            let (bound_this, bound_args) = function::bound_function_args(heap, cp);
            value::free_value_if_not_object(heap, bound_this);
            for arg in &bound_args {
                value::free_value_if_not_object(heap, *arg);
            }
            // SAFETY: cp references a live bound function record.
            let args_cp = unsafe { (*heap.deref::<BoundFunctionRecord>(cp)).args_cp };
            let block = heap.decompress(CompressedPointer::from_raw(args_cp));
            heap.free_block(block, (1 + bound_args.len()) * 4);
        }
        ObjectType::ExternalFunction => {
            // SAFETY: cp references a live external function record.
            let index =
                unsafe { (*heap.deref::<ExternalFunctionRecord>(cp)).handler_index } as usize;
            if let Some(entry) = heap.external_functions[index].take() {
                if let Some(native_data) = entry.native_data {
                    if let Some(finalizer) = native_data.finalizer {
                        finalizer(native_data.data);
                    }
                }
            }
        }
        _ => {}
    }

    if object_type != ObjectType::LexEnvObjectBound {
        property_storage::free_property_list(heap, cp);
    }

    let ptr = heap.decompress(cp);
    if record_size <= crate::heap::pools::POOL_CHUNK_SIZE {
        heap.pool_free(ptr);
    } else {
        heap.free_block(ptr, record_size);
    }
    #[cfg(feature = "mem-stats")]
    heap.allocator.stat_object_bytes(-(record_size as isize));
}

fn free_bytecode(heap: &mut Heap, bytecode_cp: u16) {
    if bytecode_cp == 0 {
        return;
    }
    let cp = CompressedPointer::from_raw(bytecode_cp);
    let size = function::bytecode_record_size(heap, cp);
    let ptr = heap.decompress(cp);
    heap.free_block(ptr, size);
}
