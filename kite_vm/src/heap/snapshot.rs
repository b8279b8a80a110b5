// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The heap snapshot walker.
//!
//! Emits one node event per live cell and one edge event per reference,
//! without mutating mark bits or any other engine state. The walk iterates
//! the collector's object list and discovers string, number and code cells
//! through the same reference tables the collector marks with, so the two
//! views cannot drift. Node ids are derived from cell addresses; direct
//! -packed strings get synthetic ids from their payload bits.

use hashbrown::HashSet;

use crate::heap::Heap;
use crate::heap::gc::{self, EdgeKind};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, function};
use crate::ecmascript::execution::Agent;
use crate::ecmascript::objects::data::{self, ObjectType};
use crate::ecmascript::objects::property_storage::PropertyName;
use crate::ecmascript::types::{Value, string};

/// Classification of a snapshot node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Hidden,
    Array,
    String,
    Object,
    Code,
    Closure,
    Native,
}

/// A node event: one live cell.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotNode<'a> {
    /// Stable within one capture; derived from the cell address.
    pub id: u32,
    pub kind: NodeKind,
    /// Record size in bytes; zero for direct-packed cells.
    pub size: u32,
    /// Content preview for string-like nodes.
    pub representation: Option<&'a [u8]>,
}

/// An edge event: one reference between two nodes.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotEdge<'a> {
    pub parent_id: u32,
    pub child_id: u32,
    pub kind: EdgeKind,
    /// Property name, for property and accessor edges.
    pub name: Option<&'a [u8]>,
}

/// Synthetic id marker for direct-packed string values.
const DIRECT_ID_FLAG: u32 = 1 << 31;

fn value_id(v: Value) -> u32 {
    if v.has_heap_pointer() {
        v.heap_pointer().into_raw() as u32
    } else {
        debug_assert!(v.is_direct_string());
        v.into_raw() | DIRECT_ID_FLAG
    }
}

fn object_node_kind(heap: &Heap, cp: CompressedPointer) -> NodeKind {
    match data::object_type(heap, cp) {
        ObjectType::Array => NodeKind::Array,
        ObjectType::Function | ObjectType::ArrowFunction | ObjectType::BoundFunction => {
            NodeKind::Closure
        }
        ObjectType::ExternalFunction => NodeKind::Native,
        ObjectType::LexEnvDeclarative | ObjectType::LexEnvObjectBound => NodeKind::Hidden,
        ObjectType::PseudoArray => NodeKind::Array,
        _ => NodeKind::Object,
    }
}

/// Capture the live heap. Node events precede the edge events that
/// reference them; the callbacks must not allocate on the engine heap (and
/// have no way to: they only borrow).
pub fn capture(
    agent: &Agent,
    node_callback: &mut dyn FnMut(SnapshotNode<'_>),
    edge_callback: &mut dyn FnMut(SnapshotEdge<'_>),
) {
    let heap = &agent.heap;
    let mut emitted: HashSet<u32> = HashSet::new();

    // Every object node first.
    let mut cursor = heap.object_list;
    while !cursor.is_null() {
        let id = cursor.into_raw() as u32;
        emitted.insert(id);
        node_callback(SnapshotNode {
            id,
            kind: object_node_kind(heap, cursor),
            size: data::object_record_size(heap, cursor) as u32,
            representation: None,
        });

        // Fast-array buffers and bytecode bodies are cells of their own.
        if data::object_type(heap, cursor) == ObjectType::Array
            && array::is_fast_array(heap, cursor)
        {
            let buffer = data::property_list(heap, cursor);
            if !buffer.is_null() && emitted.insert(buffer.into_raw() as u32) {
                node_callback(SnapshotNode {
                    id: buffer.into_raw() as u32,
                    kind: NodeKind::Hidden,
                    size: array::array_length(heap, cursor) * 4,
                    representation: None,
                });
            }
        }
        let function_value = Value::from_object_record(cursor);
        if let Some(bytecode) = function::function_bytecode(heap, function_value) {
            // The body starts one record header past its cell.
            // SAFETY: function_bytecode returned the body slice, which sits
            // directly after the bytecode record's header in the arena.
            let record_start = unsafe {
                core::ptr::NonNull::new_unchecked(
                    bytecode.as_ptr().sub(function::BYTECODE_HEADER_SIZE) as *mut u8,
                )
            };
            let bytecode_id = heap.compress(record_start).into_raw() as u32;
            if emitted.insert(bytecode_id) {
                node_callback(SnapshotNode {
                    id: bytecode_id,
                    kind: NodeKind::Code,
                    size: bytecode.len() as u32,
                    representation: None,
                });
            }
        }

        cursor = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
    }

    // Edges, discovering non-object cells along the way.
    let mut cursor = heap.object_list;
    while !cursor.is_null() {
        let parent_id = cursor.into_raw() as u32;
        gc::visit_object_references(heap, cursor, &mut |kind, target, name| {
            if target.is_simple() || target.is_integer() {
                return;
            }
            let child_id = value_id(target);
            // Objects were all emitted in the first pass; other cells are
            // discovered here.
            if !target.is_object() && emitted.insert(child_id) {
                emit_value_node(heap, target, child_id, node_callback);
            }

            let mut name_scratch = string::StringScratch::default();
            let name_bytes = name.map(|name| property_name_bytes(heap, name, &mut name_scratch));
            edge_callback(SnapshotEdge {
                parent_id,
                child_id,
                kind,
                name: name_bytes,
            });

            // Property-name edges for named references, so name strings are
            // reachable nodes of their own.
            if let Some(name) = name {
                if let PropertyName::String(name_cp) = name {
                    let name_id = name_cp.into_raw() as u32;
                    if emitted.insert(name_id) {
                        emit_value_node(
                            heap,
                            Value::from_string_record(name_cp),
                            name_id,
                            node_callback,
                        );
                    }
                    edge_callback(SnapshotEdge {
                        parent_id,
                        child_id: name_id,
                        kind: EdgeKind::PropertyName,
                        name: None,
                    });
                }
            }
        });
        cursor = CompressedPointer::from_raw(data::object_header(heap, cursor).gc_next_cp);
    }
}

fn emit_value_node(
    heap: &Heap,
    target: Value,
    id: u32,
    node_callback: &mut dyn FnMut(SnapshotNode<'_>),
) {
    let mut scratch = string::StringScratch::default();
    if target.is_string() {
        let representation = string::read_string(heap, target, &mut scratch);
        node_callback(SnapshotNode {
            id,
            kind: NodeKind::String,
            size: if target.is_direct_string() {
                0
            } else {
                representation.len() as u32
            },
            representation: Some(representation),
        });
    } else if target.is_symbol() {
        node_callback(SnapshotNode {
            id,
            kind: NodeKind::String,
            size: 8,
            representation: None,
        });
    } else {
        // Float cells and bigints.
        node_callback(SnapshotNode {
            id,
            kind: NodeKind::Hidden,
            size: 8,
            representation: None,
        });
    }
}

fn property_name_bytes<'a>(
    heap: &'a Heap,
    name: PropertyName,
    scratch: &'a mut string::StringScratch,
) -> &'a [u8] {
    match name {
        PropertyName::Magic(id) => heap.magic_string_text(id).as_bytes(),
        PropertyName::Index(_) | PropertyName::String(_) => {
            let name_value = match name {
                PropertyName::Index(index) => match Value::try_from_direct_uint(index) {
                    Some(direct) => direct,
                    None => return b"<large index>",
                },
                PropertyName::String(cp) => Value::from_string_record(cp),
                _ => unreachable!(),
            };
            string::read_string(heap, name_value, scratch)
        }
        PropertyName::Symbol(_) => b"<symbol>",
    }
}

impl Agent {
    /// Capture a heap snapshot through node and edge event callbacks.
    #[cfg(feature = "heap-snapshot")]
    pub fn capture_heap_snapshot(
        &self,
        node_callback: &mut dyn FnMut(SnapshotNode<'_>),
        edge_callback: &mut dyn FnMut(SnapshotEdge<'_>),
    ) {
        capture(self, node_callback, edge_callback);
    }
}
