// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Object records.
//!
//! Every object kind shares an 8-byte header; specialized kinds extend it
//! with trailing fields in a larger record. Dispatch is always on the type
//! bits of the header, never on host-language vtables, so the collector can
//! address every record uniformly. Reference counts in the header count
//! engine-external holders only: object-to-object links are bare compressed
//! pointers that the collector traces.

use crate::heap::{FatalCode, Heap};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::types::Value;

/// The sealed object kind enumeration, stored in the low 4 bits of
/// `type_flags_refs`. Lexical environments reuse the object record shape
/// with the kinds at the top of the range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectType {
    General = 0,
    /// A specialized built-in layout selected by a [`ClassId`].
    Class = 1,
    /// A bytecode function closing over a scope.
    Function = 2,
    /// A host-native function handler.
    ExternalFunction = 3,
    /// A bytecode function with a captured `this` binding.
    ArrowFunction = 4,
    BoundFunction = 5,
    Array = 6,
    /// Typed arrays viewing an array buffer.
    PseudoArray = 7,
    Proxy = 8,
    LexEnvDeclarative = 12,
    LexEnvObjectBound = 13,
}

impl ObjectType {
    pub(crate) fn from_bits(bits: u8) -> ObjectType {
        match bits {
            0 => ObjectType::General,
            1 => ObjectType::Class,
            2 => ObjectType::Function,
            3 => ObjectType::ExternalFunction,
            4 => ObjectType::ArrowFunction,
            5 => ObjectType::BoundFunction,
            6 => ObjectType::Array,
            7 => ObjectType::PseudoArray,
            8 => ObjectType::Proxy,
            12 => ObjectType::LexEnvDeclarative,
            13 => ObjectType::LexEnvObjectBound,
            _ => unreachable!("corrupt object type bits"),
        }
    }

    #[inline]
    pub(crate) fn is_lexical_environment(self) -> bool {
        matches!(
            self,
            ObjectType::LexEnvDeclarative | ObjectType::LexEnvObjectBound
        )
    }
}

/// Class ids of the specialized [`ObjectType::Class`] layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClassId {
    String = 0,
    Number = 1,
    Boolean = 2,
    Symbol = 3,
    BigInt = 4,
    Arguments = 5,
    Error = 6,
    ArrayBuffer = 7,
    Map = 8,
    Set = 9,
    WeakMap = 10,
    WeakSet = 11,
    ArrayIterator = 12,
    MapIterator = 13,
    SetIterator = 14,
}

impl ClassId {
    pub(crate) fn from_bits(bits: u8) -> ClassId {
        match bits {
            0 => ClassId::String,
            1 => ClassId::Number,
            2 => ClassId::Boolean,
            3 => ClassId::Symbol,
            4 => ClassId::BigInt,
            5 => ClassId::Arguments,
            6 => ClassId::Error,
            7 => ClassId::ArrayBuffer,
            8 => ClassId::Map,
            9 => ClassId::Set,
            10 => ClassId::WeakMap,
            11 => ClassId::WeakSet,
            12 => ClassId::ArrayIterator,
            13 => ClassId::MapIterator,
            14 => ClassId::SetIterator,
            _ => unreachable!("corrupt class id"),
        }
    }

    /// Whether this class is an iterator layout ([`IteratorRecord`]).
    pub(crate) fn is_iterator(self) -> bool {
        matches!(
            self,
            ClassId::ArrayIterator | ClassId::MapIterator | ClassId::SetIterator
        )
    }

    /// Whether this class is a keyed container layout.
    pub(crate) fn is_container(self) -> bool {
        matches!(
            self,
            ClassId::Map | ClassId::Set | ClassId::WeakMap | ClassId::WeakSet
        )
    }
}

const TYPE_MASK: u16 = 0xF;
/// Extensible flag on objects; the provide-this flag on object-bound
/// lexical environments.
const FLAG_EXTENSIBLE: u16 = 1 << 4;
/// The collector's mark bit.
const FLAG_VISITED: u16 = 1 << 5;
const REFS_SHIFT: u16 = 6;
const REFS_ONE: u16 = 1 << REFS_SHIFT;
const REFS_MAX: u16 = u16::MAX >> REFS_SHIFT;

/// The common object header.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct ObjectRecord {
    /// Reference count (high 10 bits) + flags + object type (low 4 bits).
    pub(crate) type_flags_refs: u16,
    /// Link through the global object list. Owned by the collector.
    pub(crate) gc_next_cp: u16,
    /// Head of the property list (or property hashmap), the flat element
    /// buffer of a fast array, or the bound object of an object-bound
    /// environment.
    pub(crate) property_list_cp: u16,
    /// Prototype, or the outer environment of a lexical environment.
    pub(crate) prototype_cp: u16,
}

/// [`ObjectType::Class`] layout: a built-in object with a hidden value.
#[repr(C)]
pub(crate) struct ClassRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) class_id: u8,
    /// Class-specific bits (error kind, detached flag, ...).
    pub(crate) extra: u8,
    _padding: u16,
    /// The hidden value: a primitive payload, a container buffer pointer,
    /// or whatever the class stores.
    pub(crate) value: u32,
}

/// [`ObjectType::Array`] layout.
#[repr(C)]
pub(crate) struct ArrayRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) length: u32,
    /// Bit 0: length is writable. Bit 1: fast (flat buffer) mode.
    /// Bits 2..: hole count of the fast buffer.
    pub(crate) length_prop_and_hole_count: u32,
}

/// [`ObjectType::PseudoArray`] layout: a typed array view.
#[repr(C)]
pub(crate) struct TypedArrayRecord {
    pub(crate) object: ObjectRecord,
    /// Element kind index into the getter/setter/shift tables.
    pub(crate) kind: u8,
    /// Bit 0: the view covers a sub-range of its buffer.
    pub(crate) flags: u8,
    pub(crate) buffer_cp: u16,
    pub(crate) array_length: u32,
    pub(crate) byte_offset: u32,
}

/// [`ObjectType::Function`] layout: scope + bytecode.
#[repr(C)]
pub(crate) struct FunctionRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) scope_cp: u16,
    pub(crate) bytecode_cp: u16,
}

/// [`ObjectType::ExternalFunction`] layout: slot of the host handler.
#[repr(C)]
pub(crate) struct ExternalFunctionRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) handler_index: u32,
}

/// [`ObjectType::ArrowFunction`] layout.
#[repr(C)]
pub(crate) struct ArrowFunctionRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) scope_cp: u16,
    pub(crate) bytecode_cp: u16,
    /// The captured `this` value.
    pub(crate) this_value: u32,
}

/// [`ObjectType::BoundFunction`] layout. The argument block holds the bound
/// `this` followed by the bound arguments.
#[repr(C)]
pub(crate) struct BoundFunctionRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) target_cp: u16,
    pub(crate) args_count: u16,
    pub(crate) args_cp: u16,
    _padding: u16,
}

/// [`ObjectType::Proxy`] layout. Both fields are object values, or null
/// values after revocation.
#[repr(C)]
pub(crate) struct ProxyRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) target: u32,
    pub(crate) handler: u32,
}

/// Iterator layout of the iterator class ids. `class_id` sits at the same
/// offset as in [`ClassRecord`] so class dispatch never needs the full
/// layout.
#[repr(C)]
pub(crate) struct IteratorRecord {
    pub(crate) object: ObjectRecord,
    pub(crate) class_id: u8,
    /// 0 = keys, 1 = values, 2 = entries.
    pub(crate) kind: u8,
    _padding: u16,
    /// The iterated target value.
    pub(crate) iterated: u32,
    /// Next index, until it spills into a hidden internal property.
    pub(crate) index: u32,
}

/// Iteration kinds of container and array iterators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IteratorKind {
    Keys = 0,
    Values = 1,
    Entries = 2,
}

impl IteratorKind {
    pub(crate) fn from_bits(bits: u8) -> IteratorKind {
        match bits {
            0 => IteratorKind::Keys,
            1 => IteratorKind::Values,
            2 => IteratorKind::Entries,
            _ => unreachable!("corrupt iterator kind"),
        }
    }
}

#[inline]
pub(crate) fn object_ptr(heap: &Heap, cp: CompressedPointer) -> *mut ObjectRecord {
    heap.deref::<ObjectRecord>(cp)
}

/// Copy of the header of a live object.
#[inline]
pub(crate) fn object_header(heap: &Heap, cp: CompressedPointer) -> ObjectRecord {
    // SAFETY: cp references a live object record.
    unsafe { *object_ptr(heap, cp) }
}

#[inline]
pub(crate) fn object_type(heap: &Heap, cp: CompressedPointer) -> ObjectType {
    ObjectType::from_bits((object_header(heap, cp).type_flags_refs & TYPE_MASK) as u8)
}

#[inline]
pub(crate) fn prototype_of(heap: &Heap, cp: CompressedPointer) -> CompressedPointer {
    CompressedPointer::from_raw(object_header(heap, cp).prototype_cp)
}

#[inline]
pub(crate) fn set_prototype(heap: &mut Heap, cp: CompressedPointer, proto: CompressedPointer) {
    // SAFETY: cp references a live object record.
    unsafe {
        (*object_ptr(heap, cp)).prototype_cp = proto.into_raw();
    }
}

#[inline]
pub(crate) fn property_list(heap: &Heap, cp: CompressedPointer) -> CompressedPointer {
    CompressedPointer::from_raw(object_header(heap, cp).property_list_cp)
}

#[inline]
pub(crate) fn set_property_list(heap: &mut Heap, cp: CompressedPointer, list: CompressedPointer) {
    // SAFETY: cp references a live object record.
    unsafe {
        (*object_ptr(heap, cp)).property_list_cp = list.into_raw();
    }
}

#[inline]
pub(crate) fn is_extensible(heap: &Heap, cp: CompressedPointer) -> bool {
    object_header(heap, cp).type_flags_refs & FLAG_EXTENSIBLE != 0
}

pub(crate) fn set_extensible(heap: &mut Heap, cp: CompressedPointer, extensible: bool) {
    // SAFETY: cp references a live object record.
    unsafe {
        if extensible {
            (*object_ptr(heap, cp)).type_flags_refs |= FLAG_EXTENSIBLE;
        } else {
            (*object_ptr(heap, cp)).type_flags_refs &= !FLAG_EXTENSIBLE;
        }
    }
}

/// Provide-this flag of an object-bound lexical environment (shares the
/// extensible bit).
#[inline]
pub(crate) fn provides_this(heap: &Heap, cp: CompressedPointer) -> bool {
    debug_assert_eq!(object_type(heap, cp), ObjectType::LexEnvObjectBound);
    object_header(heap, cp).type_flags_refs & FLAG_EXTENSIBLE != 0
}

#[inline]
pub(crate) fn is_visited(heap: &Heap, cp: CompressedPointer) -> bool {
    object_header(heap, cp).type_flags_refs & FLAG_VISITED != 0
}

#[inline]
pub(crate) fn set_visited(heap: &mut Heap, cp: CompressedPointer, visited: bool) {
    // SAFETY: cp references a live object record.
    unsafe {
        if visited {
            (*object_ptr(heap, cp)).type_flags_refs |= FLAG_VISITED;
        } else {
            (*object_ptr(heap, cp)).type_flags_refs &= !FLAG_VISITED;
        }
    }
}

#[inline]
pub(crate) fn refs_of(heap: &Heap, cp: CompressedPointer) -> u16 {
    object_header(heap, cp).type_flags_refs >> REFS_SHIFT
}

/// Take an engine-external strong reference to the object.
pub(crate) fn ref_object(heap: &mut Heap, cp: CompressedPointer) {
    if refs_of(heap, cp) == REFS_MAX {
        heap.fatal(FatalCode::RefCountLimit);
    }
    // SAFETY: cp references a live object record.
    unsafe {
        (*object_ptr(heap, cp)).type_flags_refs += REFS_ONE;
    }
}

/// Release a strong reference. A zero count does not free the object; it
/// merely stops rooting it, and the collector reclaims it when it is no
/// longer reachable.
pub(crate) fn deref_object(heap: &mut Heap, cp: CompressedPointer) {
    debug_assert!(refs_of(heap, cp) > 0);
    // SAFETY: cp references a live object record.
    unsafe {
        (*object_ptr(heap, cp)).type_flags_refs -= REFS_ONE;
    }
}

/// Write a fresh header and link the record into the global object list
/// with one reference held by the caller.
pub(crate) fn init_object_record(
    heap: &mut Heap,
    ptr: *mut ObjectRecord,
    object_type: ObjectType,
    prototype: CompressedPointer,
    extensible: bool,
) -> CompressedPointer {
    // SAFETY: ptr is a fresh record allocation of at least header size.
    let cp = unsafe {
        let cp = heap.compress(core::ptr::NonNull::new_unchecked(ptr as *mut u8));
        let mut flags = object_type as u16 | REFS_ONE;
        if extensible {
            flags |= FLAG_EXTENSIBLE;
        }
        (*ptr) = ObjectRecord {
            type_flags_refs: flags,
            gc_next_cp: heap.object_list.into_raw(),
            property_list_cp: 0,
            prototype_cp: prototype.into_raw(),
        };
        cp
    };
    heap.object_list = cp;
    cp
}

/// Create an ordinary (or lexical-environment) object: a bare 8-byte
/// header from the pool.
pub(crate) fn new_plain_object(
    heap: &mut Heap,
    object_type: ObjectType,
    prototype: CompressedPointer,
    extensible: bool,
) -> CompressedPointer {
    let ptr = heap.pool_alloc();
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<ObjectRecord>() as isize);
    init_object_record(heap, ptr.as_ptr() as *mut ObjectRecord, object_type, prototype, extensible)
}

/// Create a class object with a hidden value. The value is stored raw; the
/// caller manages any reference it represents.
pub(crate) fn new_class_object(
    heap: &mut Heap,
    prototype: CompressedPointer,
    class_id: ClassId,
    extra: u8,
    value: u32,
) -> CompressedPointer {
    let ptr = heap.alloc(core::mem::size_of::<ClassRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<ClassRecord>() as isize);
    let record = ptr.as_ptr() as *mut ClassRecord;
    let cp = init_object_record(heap, record as *mut ObjectRecord, ObjectType::Class, prototype, true);
    // SAFETY: record is the fresh ClassRecord allocation.
    unsafe {
        (*record).class_id = class_id as u8;
        (*record).extra = extra;
        (*record)._padding = 0;
        (*record).value = value;
    }
    cp
}

#[inline]
pub(crate) fn class_id(heap: &Heap, cp: CompressedPointer) -> ClassId {
    debug_assert_eq!(object_type(heap, cp), ObjectType::Class);
    // SAFETY: every Class-typed record stores the class id at this offset.
    ClassId::from_bits(unsafe { (*heap.deref::<ClassRecord>(cp)).class_id })
}

#[inline]
pub(crate) fn class_value(heap: &Heap, cp: CompressedPointer) -> u32 {
    debug_assert!(!class_id(heap, cp).is_iterator());
    // SAFETY: cp references a live class record.
    unsafe { (*heap.deref::<ClassRecord>(cp)).value }
}

#[inline]
pub(crate) fn set_class_value(heap: &mut Heap, cp: CompressedPointer, value: u32) {
    debug_assert!(!class_id(heap, cp).is_iterator());
    // SAFETY: cp references a live class record.
    unsafe {
        (*heap.deref::<ClassRecord>(cp)).value = value;
    }
}

#[inline]
pub(crate) fn class_extra(heap: &Heap, cp: CompressedPointer) -> u8 {
    // SAFETY: cp references a live class record.
    unsafe { (*heap.deref::<ClassRecord>(cp)).extra }
}

#[inline]
pub(crate) fn set_class_extra(heap: &mut Heap, cp: CompressedPointer, extra: u8) {
    // SAFETY: cp references a live class record.
    unsafe {
        (*heap.deref::<ClassRecord>(cp)).extra = extra;
    }
}

/// Allocation size of an object record, derived from its type (and class)
/// tags. Sweep frees records through this.
pub(crate) fn object_record_size(heap: &Heap, cp: CompressedPointer) -> usize {
    match object_type(heap, cp) {
        ObjectType::General
        | ObjectType::LexEnvDeclarative
        | ObjectType::LexEnvObjectBound => core::mem::size_of::<ObjectRecord>(),
        ObjectType::Class => {
            if class_id(heap, cp).is_iterator() {
                core::mem::size_of::<IteratorRecord>()
            } else {
                core::mem::size_of::<ClassRecord>()
            }
        }
        ObjectType::Function => core::mem::size_of::<FunctionRecord>(),
        ObjectType::ExternalFunction => core::mem::size_of::<ExternalFunctionRecord>(),
        ObjectType::ArrowFunction => core::mem::size_of::<ArrowFunctionRecord>(),
        ObjectType::BoundFunction => core::mem::size_of::<BoundFunctionRecord>(),
        ObjectType::Array => core::mem::size_of::<ArrayRecord>(),
        ObjectType::PseudoArray => core::mem::size_of::<TypedArrayRecord>(),
        ObjectType::Proxy => core::mem::size_of::<ProxyRecord>(),
    }
}

/// Create an iterator class object over `iterated`. The iterated value is
/// stored raw; object targets are kept alive by tracing.
pub(crate) fn new_iterator_object(
    heap: &mut Heap,
    prototype: CompressedPointer,
    class_id: ClassId,
    kind: IteratorKind,
    iterated: Value,
) -> CompressedPointer {
    debug_assert!(class_id.is_iterator());
    let ptr = heap.alloc(core::mem::size_of::<IteratorRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<IteratorRecord>() as isize);
    let record = ptr.as_ptr() as *mut IteratorRecord;
    let cp = init_object_record(heap, record as *mut ObjectRecord, ObjectType::Class, prototype, true);
    // SAFETY: record is the fresh IteratorRecord allocation.
    unsafe {
        (*record).class_id = class_id as u8;
        (*record).kind = kind as u8;
        (*record)._padding = 0;
        (*record).iterated = iterated.into_raw();
        (*record).index = 0;
    }
    cp
}
