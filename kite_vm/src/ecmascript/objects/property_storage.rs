// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The property store.
//!
//! Ordinary properties live in fixed two-slot pair records on a singly
//! linked, newest-first list hanging off the object header. A slot is a
//! named data property, a named accessor, an engine-internal property, or a
//! deleted tombstone; the pair is only reclaimed when both slots are
//! tombstones, so live slots never move. An optional hashmap node at the
//! list head accelerates name lookup.

#[cfg(feature = "property-hashmap")]
use crate::config::PROPERTY_HASHMAP_MINIMUM_SIZE;
use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::objects::data;
#[cfg(feature = "property-hashmap")]
use crate::ecmascript::objects::property_hashmap::{self, PropertyHashmapStatus};
use crate::ecmascript::types::{MagicStringId, Value, string, symbol, value};

// Slot kinds, in the low three bits of the slot's type byte.
pub(crate) const PROPERTY_KIND_DELETED: u8 = 0;
pub(crate) const PROPERTY_KIND_NAMED_DATA: u8 = 1;
pub(crate) const PROPERTY_KIND_NAMED_ACCESSOR: u8 = 2;
pub(crate) const PROPERTY_KIND_INTERNAL: u8 = 3;
/// Marks the hashmap header node; only ever in `types[0]` of the list head.
pub(crate) const PROPERTY_KIND_HASHMAP: u8 = 4;

const PROPERTY_KIND_MASK: u8 = 0x7;

pub(crate) const PROPERTY_FLAG_WRITABLE: u8 = 1 << 3;
pub(crate) const PROPERTY_FLAG_ENUMERABLE: u8 = 1 << 4;
pub(crate) const PROPERTY_FLAG_CONFIGURABLE: u8 = 1 << 5;
pub(crate) const PROPERTY_FLAGS_ALL: u8 =
    PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_ENUMERABLE | PROPERTY_FLAG_CONFIGURABLE;

// Name representation selector, in the top two bits of the type byte.
const NAME_TYPE_SHIFT: u8 = 6;
const NAME_TYPE_STRING: u8 = 0;
const NAME_TYPE_MAGIC: u8 = 1;
const NAME_TYPE_UINT: u8 = 2;
const NAME_TYPE_SYMBOL: u8 = 3;

/// A fixed two-slot property record.
#[repr(C)]
pub(crate) struct PropertyPair {
    pub(crate) types: [u8; 2],
    pub(crate) next_cp: u16,
    pub(crate) names: [u16; 2],
    pub(crate) values: [u32; 2],
}

pub(crate) const PROPERTY_PAIR_SIZE: usize = core::mem::size_of::<PropertyPair>();

/// A normalized property name. Canonical uint32 strings always take the
/// `Index` form, so name comparison never mixes numeric representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropertyName {
    Magic(MagicStringId),
    Index(u32),
    String(CompressedPointer),
    Symbol(CompressedPointer),
}

impl PropertyName {
    /// Normalize a string or symbol value into a property name. Does not
    /// take references; the name borrows the value's cells.
    pub(crate) fn from_value(heap: &Heap, key: Value) -> Option<PropertyName> {
        if key.is_direct_magic_string() {
            return Some(PropertyName::Magic(key.magic_id()));
        }
        if key.is_direct_uint_string() {
            return Some(PropertyName::Index(key.direct_uint()));
        }
        if key.is_heap_string() {
            let cp = key.heap_pointer();
            if let Some(index) = string::string_to_array_index(heap, key) {
                return Some(PropertyName::Index(index));
            }
            return Some(PropertyName::String(cp));
        }
        if key.is_symbol() {
            return Some(PropertyName::Symbol(key.heap_pointer()));
        }
        None
    }

    /// Produce a value for the name, taking a reference for the caller.
    pub(crate) fn to_value(self, heap: &mut Heap) -> Value {
        match self {
            PropertyName::Magic(id) => Value::from_magic(id),
            PropertyName::Index(index) => string::new_string_from_uint32(heap, index),
            PropertyName::String(cp) => {
                string::ref_string(heap, cp);
                Value::from_string_record(cp)
            }
            PropertyName::Symbol(cp) => {
                symbol::ref_symbol(heap, cp);
                Value::from_symbol_record(cp)
            }
        }
    }

    /// Probe hash of the name. Must agree between hashmap insertion and
    /// lookup, nothing else depends on it.
    pub(crate) fn hash(self, heap: &Heap) -> u16 {
        match self {
            PropertyName::Magic(id) => {
                string::hash_bytes(heap.magic_string_text(id).as_bytes())
            }
            PropertyName::Index(index) => (index ^ (index >> 16)) as u16,
            PropertyName::String(cp) => {
                string::string_hash(heap, Value::from_string_record(cp))
            }
            PropertyName::Symbol(cp) => {
                (cp.into_raw() as u32).wrapping_mul(0x9E37) as u16
            }
        }
    }
}

/// Content equality of two normalized names.
pub(crate) fn names_match(heap: &Heap, a: PropertyName, b: PropertyName) -> bool {
    match (a, b) {
        (PropertyName::Magic(x), PropertyName::Magic(y)) => x == y,
        (PropertyName::Index(x), PropertyName::Index(y)) => x == y,
        (PropertyName::Symbol(x), PropertyName::Symbol(y)) => x == y,
        (PropertyName::String(x), PropertyName::String(y)) => {
            string::strings_equal(heap, Value::from_string_record(x), Value::from_string_record(y))
        }
        // A heap string created before an embedder magic string was
        // registered can alias its content; compare by bytes.
        (PropertyName::Magic(id), PropertyName::String(cp))
        | (PropertyName::String(cp), PropertyName::Magic(id)) => {
            let mut scratch = string::StringScratch::default();
            let bytes = string::read_string(heap, Value::from_string_record(cp), &mut scratch);
            heap.magic_string_text(id).as_bytes() == bytes
        }
        _ => false,
    }
}

/// Locator of a property slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PropertyRef {
    pub(crate) pair_cp: CompressedPointer,
    pub(crate) slot: usize,
}

#[inline]
pub(crate) fn pair_ptr(heap: &Heap, cp: CompressedPointer) -> *mut PropertyPair {
    heap.deref::<PropertyPair>(cp)
}

#[inline]
pub(crate) fn property_type_byte(heap: &Heap, property: PropertyRef) -> u8 {
    // SAFETY: property references a live pair slot.
    unsafe { (*pair_ptr(heap, property.pair_cp)).types[property.slot] }
}

#[inline]
pub(crate) fn set_property_type_byte(heap: &mut Heap, property: PropertyRef, byte: u8) {
    // SAFETY: property references a live pair slot.
    unsafe {
        (*pair_ptr(heap, property.pair_cp)).types[property.slot] = byte;
    }
}

#[inline]
pub(crate) fn property_kind(heap: &Heap, property: PropertyRef) -> u8 {
    property_type_byte(heap, property) & PROPERTY_KIND_MASK
}

#[inline]
pub(crate) fn property_flags(heap: &Heap, property: PropertyRef) -> u8 {
    property_type_byte(heap, property) & PROPERTY_FLAGS_ALL
}

#[inline]
pub(crate) fn property_raw_value(heap: &Heap, property: PropertyRef) -> u32 {
    // SAFETY: property references a live pair slot.
    unsafe { (*pair_ptr(heap, property.pair_cp)).values[property.slot] }
}

#[inline]
pub(crate) fn set_property_raw_value(heap: &mut Heap, property: PropertyRef, raw: u32) {
    // SAFETY: property references a live pair slot.
    unsafe {
        (*pair_ptr(heap, property.pair_cp)).values[property.slot] = raw;
    }
}

/// Value of a named data property.
#[inline]
pub(crate) fn property_value(heap: &Heap, property: PropertyRef) -> Value {
    debug_assert_eq!(property_kind(heap, property), PROPERTY_KIND_NAMED_DATA);
    Value::from_raw(property_raw_value(heap, property))
}

/// Getter and setter object pointers of a named accessor property. Either
/// may be null.
#[inline]
pub(crate) fn property_accessors(
    heap: &Heap,
    property: PropertyRef,
) -> (CompressedPointer, CompressedPointer) {
    debug_assert_eq!(property_kind(heap, property), PROPERTY_KIND_NAMED_ACCESSOR);
    let raw = property_raw_value(heap, property);
    (
        CompressedPointer::from_raw(raw as u16),
        CompressedPointer::from_raw((raw >> 16) as u16),
    )
}

pub(crate) fn pack_accessors(getter: CompressedPointer, setter: CompressedPointer) -> u32 {
    getter.into_raw() as u32 | ((setter.into_raw() as u32) << 16)
}

/// Rewrite a slot's kind, flags and payload in place, keeping its name
/// (and therefore its hashmap entry and enumeration position) intact.
pub(crate) fn rewrite_slot_preserving_name(
    heap: &mut Heap,
    property: PropertyRef,
    kind_and_flags: u8,
    raw: u32,
) {
    let name_bits = property_type_byte(heap, property) & (0x3 << NAME_TYPE_SHIFT);
    set_property_type_byte(heap, property, kind_and_flags | name_bits);
    set_property_raw_value(heap, property, raw);
}

/// Assign a new value to a named data property, releasing the old one.
pub(crate) fn set_named_data_value(heap: &mut Heap, property: PropertyRef, new_value: Value) {
    let old = property_value(heap, property);
    let stored = value::copy_value_if_not_object(heap, new_value);
    set_property_raw_value(heap, property, stored.into_raw());
    value::free_value_if_not_object(heap, old);
}

/// The stored name of a live slot.
pub(crate) fn property_name(heap: &Heap, property: PropertyRef) -> PropertyName {
    let type_byte = property_type_byte(heap, property);
    // SAFETY: property references a live pair slot.
    let name_raw = unsafe { (*pair_ptr(heap, property.pair_cp)).names[property.slot] };
    load_name(heap, type_byte >> NAME_TYPE_SHIFT, name_raw)
}

fn load_name(heap: &Heap, name_type: u8, raw: u16) -> PropertyName {
    match name_type {
        NAME_TYPE_MAGIC => PropertyName::Magic(MagicStringId(raw)),
        NAME_TYPE_UINT => PropertyName::Index(raw as u32),
        NAME_TYPE_SYMBOL => PropertyName::Symbol(CompressedPointer::from_raw(raw)),
        _ => {
            let cp = CompressedPointer::from_raw(raw);
            match string::string_to_array_index(heap, Value::from_string_record(cp)) {
                Some(index) => PropertyName::Index(index),
                None => PropertyName::String(cp),
            }
        }
    }
}

/// Intern a name into its stored form, taking the references the slot will
/// hold. Returns the name-type bits and the raw name field.
fn store_name(heap: &mut Heap, name: PropertyName) -> (u8, u16) {
    match name {
        PropertyName::Magic(id) => (NAME_TYPE_MAGIC, id.0),
        PropertyName::Index(index) if index <= u16::MAX as u32 => {
            (NAME_TYPE_UINT, index as u16)
        }
        PropertyName::Index(index) => {
            let cp = string::alloc_uint32_record(heap, index);
            (NAME_TYPE_STRING, cp.into_raw())
        }
        PropertyName::String(cp) => {
            string::ref_string(heap, cp);
            (NAME_TYPE_STRING, cp.into_raw())
        }
        PropertyName::Symbol(cp) => {
            symbol::ref_symbol(heap, cp);
            (NAME_TYPE_SYMBOL, cp.into_raw())
        }
    }
}

fn free_stored_name(heap: &mut Heap, name_type: u8, raw: u16) {
    match name_type {
        NAME_TYPE_STRING => string::deref_string(heap, CompressedPointer::from_raw(raw)),
        NAME_TYPE_SYMBOL => symbol::deref_symbol(heap, CompressedPointer::from_raw(raw)),
        _ => {}
    }
}

/// The hashmap header of the object's property list, if one is attached.
#[cfg(feature = "property-hashmap")]
pub(crate) fn hashmap_of(heap: &Heap, object_cp: CompressedPointer) -> Option<CompressedPointer> {
    let head = data::property_list(heap, object_cp);
    if head.is_null() {
        return None;
    }
    let head_ref = PropertyRef { pair_cp: head, slot: 0 };
    if property_kind(heap, head_ref) == PROPERTY_KIND_HASHMAP {
        Some(head)
    } else {
        None
    }
}

/// First property pair, skipping a hashmap header node.
pub(crate) fn first_pair(heap: &Heap, object_cp: CompressedPointer) -> CompressedPointer {
    let head = data::property_list(heap, object_cp);
    if head.is_null() {
        return head;
    }
    #[cfg(feature = "property-hashmap")]
    {
        let head_ref = PropertyRef { pair_cp: head, slot: 0 };
        if property_kind(heap, head_ref) == PROPERTY_KIND_HASHMAP {
            // SAFETY: head references the live hashmap node.
            return CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, head)).next_cp });
        }
    }
    head
}

/// Rewrite the first-pair link, preserving a hashmap header node.
fn set_first_pair(heap: &mut Heap, object_cp: CompressedPointer, pair: CompressedPointer) {
    #[cfg(feature = "property-hashmap")]
    if let Some(hashmap) = hashmap_of(heap, object_cp) {
        // SAFETY: the hashmap node is live.
        unsafe {
            (*pair_ptr(heap, hashmap)).next_cp = pair.into_raw();
        }
        return;
    }
    data::set_property_list(heap, object_cp, pair);
}

/// Number of live property slots (including internal properties).
pub(crate) fn property_count(heap: &Heap, object_cp: CompressedPointer) -> u32 {
    let mut count = 0;
    let mut pair_cp = first_pair(heap, object_cp);
    while !pair_cp.is_null() {
        for slot in 0..2 {
            let property = PropertyRef { pair_cp, slot };
            if property_kind(heap, property) != PROPERTY_KIND_DELETED {
                count += 1;
            }
        }
        // SAFETY: pair_cp references a live pair.
        pair_cp = CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, pair_cp)).next_cp });
    }
    count
}

/// Find a property by walking the pair chain.
pub(crate) fn find_property_in_chain(
    heap: &Heap,
    object_cp: CompressedPointer,
    name: PropertyName,
) -> Option<PropertyRef> {
    find_property_from_pair(heap, first_pair(heap, object_cp), name)
}

/// Walk a pair chain from an arbitrary pair.
pub(crate) fn find_property_from_pair(
    heap: &Heap,
    start_cp: CompressedPointer,
    name: PropertyName,
) -> Option<PropertyRef> {
    let mut pair_cp = start_cp;
    while !pair_cp.is_null() {
        for slot in 0..2 {
            let property = PropertyRef { pair_cp, slot };
            if property_kind(heap, property) != PROPERTY_KIND_DELETED
                && names_match(heap, property_name(heap, property), name)
            {
                return Some(property);
            }
        }
        // SAFETY: pair_cp references a live pair.
        pair_cp = CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, pair_cp)).next_cp });
    }
    None
}

/// Find a property, through the hashmap when the object owns one.
pub(crate) fn find_property(
    heap: &Heap,
    object_cp: CompressedPointer,
    name: PropertyName,
) -> Option<PropertyRef> {
    #[cfg(feature = "property-hashmap")]
    if let Some(hashmap) = hashmap_of(heap, object_cp) {
        return property_hashmap::find(heap, hashmap, name);
    }
    find_property_in_chain(heap, object_cp, name)
}

fn alloc_pair(heap: &mut Heap) -> CompressedPointer {
    let ptr = heap.alloc(PROPERTY_PAIR_SIZE);
    #[cfg(feature = "mem-stats")]
    heap.allocator.stat_property_bytes(PROPERTY_PAIR_SIZE as isize);
    // SAFETY: a fresh block of pair size.
    unsafe {
        ptr.cast::<PropertyPair>().write(PropertyPair {
            types: [PROPERTY_KIND_DELETED, PROPERTY_KIND_DELETED],
            next_cp: 0,
            names: [0, 0],
            values: [0, 0],
        });
    }
    heap.compress(ptr)
}

/// Create a property slot holding the given type byte and raw value. The
/// head pair's tombstones are reused before a new pair is prepended.
fn create_property(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    name: PropertyName,
    kind_and_flags: u8,
    raw_value: u32,
) -> PropertyRef {
    debug_assert!(find_property(heap, object_cp, name).is_none());

    #[cfg(feature = "property-hashmap")]
    let had_hashmap = hashmap_of(heap, object_cp).is_some();
    #[cfg(feature = "property-hashmap")]
    if !had_hashmap && property_count(heap, object_cp) + 1 >= PROPERTY_HASHMAP_MINIMUM_SIZE {
        property_hashmap::create(heap, object_cp);
    }

    let (name_type, name_raw) = store_name(heap, name);
    let type_byte = kind_and_flags | (name_type << NAME_TYPE_SHIFT);

    let head = first_pair(heap, object_cp);
    let reusable_slot = if head.is_null() {
        None
    } else {
        (0..2).find(|&slot| {
            property_kind(heap, PropertyRef { pair_cp: head, slot }) == PROPERTY_KIND_DELETED
        })
    };
    let property = if let Some(slot) = reusable_slot {
        PropertyRef { pair_cp: head, slot }
    } else {
        let pair_cp = alloc_pair(heap);
        // SAFETY: the fresh pair is live.
        unsafe {
            (*pair_ptr(heap, pair_cp)).next_cp = head.into_raw();
        }
        set_first_pair(heap, object_cp, pair_cp);
        PropertyRef { pair_cp, slot: 0 }
    };

    // SAFETY: property references a live pair slot.
    unsafe {
        let pair = pair_ptr(heap, property.pair_cp);
        (*pair).types[property.slot] = type_byte;
        (*pair).names[property.slot] = name_raw;
        (*pair).values[property.slot] = raw_value;
    }

    #[cfg(feature = "property-hashmap")]
    if let Some(hashmap) = hashmap_of(heap, object_cp) {
        property_hashmap::insert(heap, hashmap, name, property);
    }

    property
}

/// Create a writable/enumerable/configurable-flagged data property holding
/// `value`.
pub(crate) fn create_named_data_property(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    name: PropertyName,
    flags: u8,
    value_to_store: Value,
) -> PropertyRef {
    debug_assert_eq!(flags & !PROPERTY_FLAGS_ALL, 0);
    let stored = value::copy_value_if_not_object(heap, value_to_store);
    create_property(
        heap,
        object_cp,
        name,
        PROPERTY_KIND_NAMED_DATA | flags,
        stored.into_raw(),
    )
}

/// Create an accessor property over getter/setter objects (either may be
/// null). Accessor targets are traced, not refcounted.
pub(crate) fn create_named_accessor_property(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    name: PropertyName,
    flags: u8,
    getter: CompressedPointer,
    setter: CompressedPointer,
) -> PropertyRef {
    debug_assert_eq!(flags & PROPERTY_FLAG_WRITABLE, 0);
    create_property(
        heap,
        object_cp,
        name,
        PROPERTY_KIND_NAMED_ACCESSOR | flags,
        pack_accessors(getter, setter),
    )
}

/// Create an engine-internal property. The raw value's meaning (and
/// cleanup) is owned by the subsystem that owns the hidden name.
pub(crate) fn create_internal_property(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    name_id: MagicStringId,
    raw_value: u32,
) -> PropertyRef {
    debug_assert!(name_id.0 >= MagicStringId::FIRST_HIDDEN);
    create_property(
        heap,
        object_cp,
        PropertyName::Magic(name_id),
        PROPERTY_KIND_INTERNAL,
        raw_value,
    )
}

pub(crate) fn find_internal_property(
    heap: &Heap,
    object_cp: CompressedPointer,
    name_id: MagicStringId,
) -> Option<PropertyRef> {
    find_property(heap, object_cp, PropertyName::Magic(name_id))
}

/// Release whatever a slot owns: the data value's reference or an internal
/// payload. Does not touch the name.
fn free_property_payload(heap: &mut Heap, property: PropertyRef) {
    match property_kind(heap, property) {
        PROPERTY_KIND_NAMED_DATA => {
            let old = property_value(heap, property);
            value::free_value_if_not_object(heap, old);
        }
        PROPERTY_KIND_INTERNAL => {
            let PropertyName::Magic(id) = property_name(heap, property) else {
                unreachable!("internal properties are magic-named");
            };
            free_internal_payload(heap, id, property_raw_value(heap, property));
        }
        _ => {}
    }
}

/// Kind-specific cleanup of internal property payloads.
pub(crate) fn free_internal_payload(heap: &mut Heap, name_id: MagicStringId, raw: u32) {
    if name_id == MagicStringId::HIDDEN_WEAK_REFS {
        crate::ecmascript::builtins::map::free_weak_ref_list(
            heap,
            CompressedPointer::from_raw(raw as u16),
        );
    }
    // Iterator spill indices and native-data slots carry no owned memory.
}

/// Transition a slot to the deleted tombstone, releasing its name and
/// payload. Frees the pair once both slots are tombstones.
pub(crate) fn delete_property(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    property: PropertyRef,
) {
    #[cfg(feature = "property-hashmap")]
    let status = match hashmap_of(heap, object_cp) {
        Some(hashmap_cp) => property_hashmap::remove(heap, hashmap_cp, property),
        None => PropertyHashmapStatus::NoHashmap,
    };

    free_property_payload(heap, property);
    let type_byte = property_type_byte(heap, property);
    // SAFETY: property references a live pair slot.
    let name_raw = unsafe { (*pair_ptr(heap, property.pair_cp)).names[property.slot] };
    free_stored_name(heap, type_byte >> NAME_TYPE_SHIFT, name_raw);
    set_property_type_byte(heap, property, PROPERTY_KIND_DELETED);

    let other = PropertyRef {
        pair_cp: property.pair_cp,
        slot: 1 - property.slot,
    };
    if property_kind(heap, other) == PROPERTY_KIND_DELETED {
        unlink_and_free_pair(heap, object_cp, property.pair_cp);
    }

    #[cfg(feature = "property-hashmap")]
    if status == PropertyHashmapStatus::Recreate {
        property_hashmap::free(heap, object_cp);
        if property_count(heap, object_cp) >= PROPERTY_HASHMAP_MINIMUM_SIZE {
            property_hashmap::create(heap, object_cp);
        }
    }
}

fn unlink_and_free_pair(
    heap: &mut Heap,
    object_cp: CompressedPointer,
    pair_cp: CompressedPointer,
) {
    // SAFETY: pair_cp references a live pair.
    let next = CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, pair_cp)).next_cp });

    let mut current = first_pair(heap, object_cp);
    if current == pair_cp {
        set_first_pair(heap, object_cp, next);
    } else {
        while !current.is_null() {
            // SAFETY: current references a live pair.
            let current_next =
                CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, current)).next_cp });
            if current_next == pair_cp {
                // SAFETY: as above.
                unsafe {
                    (*pair_ptr(heap, current)).next_cp = next.into_raw();
                }
                break;
            }
            current = current_next;
        }
    }

    let ptr = heap.decompress(pair_cp);
    heap.free_block(ptr, PROPERTY_PAIR_SIZE);
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_property_bytes(-(PROPERTY_PAIR_SIZE as isize));
}

/// Release every property of an object without rewriting links. Used by
/// sweep and by fast-array conversion teardown.
pub(crate) fn free_property_list(heap: &mut Heap, object_cp: CompressedPointer) {
    #[cfg(feature = "property-hashmap")]
    if hashmap_of(heap, object_cp).is_some() {
        property_hashmap::free(heap, object_cp);
    }
    let mut pair_cp = data::property_list(heap, object_cp);
    data::set_property_list(heap, object_cp, CompressedPointer::NULL);
    while !pair_cp.is_null() {
        // SAFETY: pair_cp references a live pair.
        let next = CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, pair_cp)).next_cp });
        for slot in 0..2 {
            let property = PropertyRef { pair_cp, slot };
            if property_kind(heap, property) != PROPERTY_KIND_DELETED {
                free_property_payload(heap, property);
                let type_byte = property_type_byte(heap, property);
                // SAFETY: as above.
                let name_raw = unsafe { (*pair_ptr(heap, pair_cp)).names[slot] };
                free_stored_name(heap, type_byte >> NAME_TYPE_SHIFT, name_raw);
            }
        }
        let ptr = heap.decompress(pair_cp);
        heap.free_block(ptr, PROPERTY_PAIR_SIZE);
        #[cfg(feature = "mem-stats")]
        heap.allocator
            .stat_property_bytes(-(PROPERTY_PAIR_SIZE as isize));
        pair_cp = next;
    }
}

/// User-visible own property names in specification order: integer indices
/// ascending first, then string and symbol keys in insertion order.
pub(crate) fn own_property_names(
    heap: &Heap,
    object_cp: CompressedPointer,
) -> Vec<PropertyName> {
    let mut indices: Vec<u32> = Vec::new();
    let mut others: Vec<PropertyName> = Vec::new();

    let mut pair_cp = first_pair(heap, object_cp);
    while !pair_cp.is_null() {
        // Within a pair the first slot is the older one; walk the slots
        // backwards so the final reversal yields insertion order.
        for slot in (0..2).rev() {
            let property = PropertyRef { pair_cp, slot };
            match property_kind(heap, property) {
                PROPERTY_KIND_NAMED_DATA | PROPERTY_KIND_NAMED_ACCESSOR => {
                    match property_name(heap, property) {
                        PropertyName::Index(index) => indices.push(index),
                        name => others.push(name),
                    }
                }
                _ => {}
            }
        }
        // SAFETY: pair_cp references a live pair.
        pair_cp = CompressedPointer::from_raw(unsafe { (*pair_ptr(heap, pair_cp)).next_cp });
    }

    indices.sort_unstable();
    // The chain is newest-first; insertion order is its reverse.
    others.reverse();

    let mut names = Vec::with_capacity(indices.len() + others.len());
    names.extend(indices.into_iter().map(PropertyName::Index));
    names.extend(others);
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecmascript::objects::data::{new_plain_object, ObjectType};
    use crate::ecmascript::types::number;

    fn test_object(heap: &mut Heap) -> CompressedPointer {
        new_plain_object(heap, ObjectType::General, CompressedPointer::NULL, true)
    }

    #[test]
    fn head_pair_tombstones_are_reused_before_new_pairs() {
        let mut heap = Heap::new(true);
        let object = test_object(&mut heap);

        let first = create_named_data_property(
            &mut heap,
            object,
            PropertyName::Index(0),
            PROPERTY_FLAGS_ALL,
            Value::from_integer(10),
        );
        let second = create_named_data_property(
            &mut heap,
            object,
            PropertyName::Index(1),
            PROPERTY_FLAGS_ALL,
            Value::from_integer(11),
        );
        assert_eq!(first.pair_cp, second.pair_cp);

        delete_property(&mut heap, object, first);
        let third = create_named_data_property(
            &mut heap,
            object,
            PropertyName::Index(2),
            PROPERTY_FLAGS_ALL,
            Value::from_integer(12),
        );
        // The tombstone of the head pair is reclaimed in place.
        assert_eq!(third.pair_cp, second.pair_cp);
        assert_eq!(property_count(&heap, object), 2);
    }

    #[test]
    fn a_pair_is_freed_only_when_both_slots_are_tombstones() {
        let mut heap = Heap::new(true);
        let object = test_object(&mut heap);

        for index in 0..4u32 {
            create_named_data_property(
                &mut heap,
                object,
                PropertyName::Index(index),
                PROPERTY_FLAGS_ALL,
                Value::from_integer(index as i32),
            );
        }
        let allocated = heap.allocator.allocated_size();

        let a = find_property(&heap, object, PropertyName::Index(0)).unwrap();
        delete_property(&mut heap, object, a);
        assert_eq!(heap.allocator.allocated_size(), allocated);

        let b = find_property(&heap, object, PropertyName::Index(1)).unwrap();
        delete_property(&mut heap, object, b);
        // Both slots of the older pair are now tombstones; the pair block
        // goes back to the allocator.
        assert_eq!(
            heap.allocator.allocated_size(),
            allocated - PROPERTY_PAIR_SIZE
        );
        assert!(find_property(&heap, object, PropertyName::Index(2)).is_some());
    }

    #[cfg(feature = "property-hashmap")]
    #[test]
    fn hashmap_attaches_past_the_threshold_and_rebuilds_after_mass_deletion() {
        use crate::config::PROPERTY_HASHMAP_MINIMUM_SIZE;

        let mut heap = Heap::new(true);
        let object = test_object(&mut heap);

        // Below the threshold there is no hashmap.
        for index in 0..PROPERTY_HASHMAP_MINIMUM_SIZE - 2 {
            create_named_data_property(
                &mut heap,
                object,
                PropertyName::Index(index),
                PROPERTY_FLAGS_ALL,
                Value::from_integer(index as i32),
            );
        }
        assert!(hashmap_of(&heap, object).is_none());

        // Crossing it attaches one.
        for index in PROPERTY_HASHMAP_MINIMUM_SIZE - 2..PROPERTY_HASHMAP_MINIMUM_SIZE * 4 {
            create_named_data_property(
                &mut heap,
                object,
                PropertyName::Index(index),
                PROPERTY_FLAGS_ALL,
                Value::from_integer(index as i32),
            );
        }
        let hashmap = hashmap_of(&heap, object).expect("hashmap after threshold");

        // Chain lookups and hashmap lookups agree on every property.
        for index in 0..PROPERTY_HASHMAP_MINIMUM_SIZE * 4 {
            let name = PropertyName::Index(index);
            assert_eq!(
                find_property(&heap, object, name),
                find_property_in_chain(&heap, object, name),
                "index {index}"
            );
        }

        // Mass deletion drives the tombstone ratio over the rebuild limit;
        // the map is reconstructed rather than probed through the graves.
        for index in 0..PROPERTY_HASHMAP_MINIMUM_SIZE * 3 {
            let property = find_property(&heap, object, PropertyName::Index(index)).unwrap();
            delete_property(&mut heap, object, property);
        }
        let rebuilt = hashmap_of(&heap, object).expect("still past the threshold");
        assert_ne!(rebuilt, hashmap, "the node was rebuilt");

        for index in 0..PROPERTY_HASHMAP_MINIMUM_SIZE * 4 {
            let name = PropertyName::Index(index);
            let found = find_property(&heap, object, name);
            assert_eq!(found, find_property_in_chain(&heap, object, name));
            assert_eq!(found.is_some(), index >= PROPERTY_HASHMAP_MINIMUM_SIZE * 3);
            if let Some(property) = found {
                assert_eq!(
                    property_value(&heap, property),
                    Value::from_integer(index as i32)
                );
            }
        }
    }

    #[test]
    fn names_normalize_across_uint_and_string_forms() {
        let mut heap = Heap::new(true);
        let object = test_object(&mut heap);

        // A large index is stored through a heap uint32 record but is still
        // the same logical name.
        create_named_data_property(
            &mut heap,
            object,
            PropertyName::Index(70_000),
            PROPERTY_FLAGS_ALL,
            Value::from_integer(1),
        );
        let via_string = crate::ecmascript::types::string::new_string_from_cesu8(
            &mut heap, b"70000",
        );
        let name = PropertyName::from_value(&heap, via_string).unwrap();
        assert_eq!(name, PropertyName::Index(70_000));
        assert!(find_property(&heap, object, name).is_some());

        // Float cells never appear as names; the canonical form is numeric
        // only for canonical uint spellings.
        let odd = crate::ecmascript::types::string::new_string_from_cesu8(&mut heap, b"070000");
        let odd_name = PropertyName::from_value(&heap, odd).unwrap();
        assert!(matches!(odd_name, PropertyName::String(_)));
        assert!(find_property(&heap, object, odd_name).is_none());
        let _ = number::new_number(&mut heap, 1.5);
    }
}
