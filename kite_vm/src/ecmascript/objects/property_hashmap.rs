// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The property hashmap.
//!
//! Once an object's property count crosses the threshold, a hashmap node is
//! attached at the front of its property list. The node owns a power-of-two
//! table of pair pointers with one flag bit per entry: for a null entry the
//! flag distinguishes never-used from deleted (tombstone); for a live entry
//! it selects the first or second slot of the referenced pair. Probing is
//! open addressing with a linear step derived from the upper hash bits,
//! forced odd so a power-of-two table is covered completely. The map is
//! rebuilt, never resized in place.

use crate::config::{PROPERTY_HASHMAP_MINIMUM_SIZE, PROPERTY_HASHMAP_UNUSED_RATIO};
use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::objects::data;
use crate::ecmascript::objects::property_storage::{
    self, PROPERTY_KIND_DELETED, PROPERTY_KIND_HASHMAP, PropertyName, PropertyRef,
};

/// Result of a deletion notification, telling the caller whether the map
/// should be rebuilt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyHashmapStatus {
    NoHashmap,
    HasHashmap,
    Recreate,
}

/// The hashmap header node. It starts with the shape of a property pair
/// header so the list head can be recognized by its kind byte.
#[repr(C)]
struct PropertyHashmap {
    types: [u8; 2],
    /// First real property pair of the list.
    next_cp: u16,
    /// Capacity; always a power of two.
    max_property_count: u32,
    /// Entries that have never been used. Probes terminate on these, so
    /// insertion rebuilds the map before they run out.
    null_count: u32,
    /// Tombstoned entries.
    unused_count: u32,
}

const HEADER_SIZE: usize = core::mem::size_of::<PropertyHashmap>();

fn table_size(max: u32) -> usize {
    HEADER_SIZE + max as usize * 2 + (max as usize + 7) / 8
}

#[inline]
fn header_ptr(heap: &Heap, cp: CompressedPointer) -> *mut PropertyHashmap {
    heap.deref::<PropertyHashmap>(cp)
}

#[inline]
unsafe fn entry_ptr(heap: &Heap, cp: CompressedPointer, index: u32) -> *mut u16 {
    // SAFETY: index < max_property_count, inside the node's allocation.
    unsafe { (heap.decompress(cp).as_ptr().add(HEADER_SIZE) as *mut u16).add(index as usize) }
}

#[inline]
unsafe fn flag_byte_ptr(heap: &Heap, cp: CompressedPointer, max: u32, index: u32) -> *mut u8 {
    // SAFETY: as in entry_ptr; the flag bytes follow the entries.
    unsafe {
        heap.decompress(cp)
            .as_ptr()
            .add(HEADER_SIZE + max as usize * 2 + (index / 8) as usize)
    }
}

#[inline]
fn read_flag(heap: &Heap, cp: CompressedPointer, max: u32, index: u32) -> bool {
    // SAFETY: index is in range.
    unsafe { *flag_byte_ptr(heap, cp, max, index) & (1 << (index % 8)) != 0 }
}

#[inline]
fn write_flag(heap: &Heap, cp: CompressedPointer, max: u32, index: u32, value: bool) {
    // SAFETY: index is in range.
    unsafe {
        let byte = flag_byte_ptr(heap, cp, max, index);
        if value {
            *byte |= 1 << (index % 8);
        } else {
            *byte &= !(1 << (index % 8));
        }
    }
}

#[inline]
fn probe_start_and_step(hash: u16, max: u32) -> (u32, u32) {
    let mask = max - 1;
    let start = hash as u32 & mask;
    // The upper hash bits, forced odd: an odd stride walks the whole
    // power-of-two table.
    let step = ((hash as u32 >> 8) | 1) & mask | 1;
    (start, step)
}

/// Build a hashmap over the object's current property list. Quietly does
/// nothing when the node cannot be allocated; the map is an accelerator,
/// not a requirement.
pub(crate) fn create(heap: &mut Heap, object_cp: CompressedPointer) {
    debug_assert!(property_storage::hashmap_of(heap, object_cp).is_none());
    let count = property_storage::property_count(heap, object_cp);

    let mut max = PROPERTY_HASHMAP_MINIMUM_SIZE;
    while count > max / 2 {
        max *= 2;
    }

    let Some(ptr) = heap.try_alloc(table_size(max)) else {
        return;
    };
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_property_bytes(table_size(max) as isize);
    // SAFETY: a fresh block of table_size bytes.
    unsafe {
        core::ptr::write_bytes(ptr.as_ptr(), 0, table_size(max));
    }
    let hashmap_cp = heap.compress(ptr);
    let first_pair = data::property_list(heap, object_cp);
    // SAFETY: the fresh node is live.
    unsafe {
        (*header_ptr(heap, hashmap_cp)) = PropertyHashmap {
            types: [PROPERTY_KIND_HASHMAP, PROPERTY_KIND_HASHMAP],
            next_cp: first_pair.into_raw(),
            max_property_count: max,
            null_count: max,
            unused_count: 0,
        };
    }
    data::set_property_list(heap, object_cp, hashmap_cp);

    // Scan the list and register every live slot.
    let mut pair_cp = first_pair;
    while !pair_cp.is_null() {
        for slot in 0..2 {
            let property = PropertyRef { pair_cp, slot };
            let kind = property_storage::property_kind(heap, property);
            if kind != PROPERTY_KIND_DELETED {
                let name = property_storage::property_name(heap, property);
                insert_entry(heap, hashmap_cp, name, property);
            }
        }
        // SAFETY: pair_cp references a live pair.
        pair_cp = CompressedPointer::from_raw(unsafe {
            (*property_storage::pair_ptr(heap, pair_cp)).next_cp
        });
    }
}

/// Detach and free the object's hashmap node.
pub(crate) fn free(heap: &mut Heap, object_cp: CompressedPointer) {
    let Some(hashmap_cp) = property_storage::hashmap_of(heap, object_cp) else {
        return;
    };
    // SAFETY: the node is live.
    let (next, max) = unsafe {
        let header = header_ptr(heap, hashmap_cp);
        ((*header).next_cp, (*header).max_property_count)
    };
    data::set_property_list(heap, object_cp, CompressedPointer::from_raw(next));
    let ptr = heap.decompress(hashmap_cp);
    heap.free_block(ptr, table_size(max));
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_property_bytes(-(table_size(max) as isize));
}

fn insert_entry(
    heap: &mut Heap,
    hashmap_cp: CompressedPointer,
    name: PropertyName,
    property: PropertyRef,
) {
    // SAFETY: the node is live.
    let max = unsafe { (*header_ptr(heap, hashmap_cp)).max_property_count };
    let hash = name.hash(heap);
    let (mut index, step) = probe_start_and_step(hash, max);

    for _ in 0..max {
        // SAFETY: index < max.
        let entry = unsafe { *entry_ptr(heap, hashmap_cp, index) };
        if entry == 0 {
            let was_tombstone = read_flag(heap, hashmap_cp, max, index);
            // SAFETY: as above.
            unsafe {
                *entry_ptr(heap, hashmap_cp, index) = property.pair_cp.into_raw();
                let header = header_ptr(heap, hashmap_cp);
                if was_tombstone {
                    (*header).unused_count -= 1;
                } else {
                    (*header).null_count -= 1;
                }
            }
            write_flag(heap, hashmap_cp, max, index, property.slot == 1);
            return;
        }
        index = (index + step) & (max - 1);
    }
    debug_assert!(false, "hashmap insertion found no free entry");
}

/// Register a newly created property. Rebuilds the map first when the
/// never-used entries run low, since probes terminate on them.
pub(crate) fn insert(
    heap: &mut Heap,
    hashmap_cp: CompressedPointer,
    name: PropertyName,
    property: PropertyRef,
) {
    // SAFETY: the node is live.
    let (max, null_count) = unsafe {
        let header = header_ptr(heap, hashmap_cp);
        ((*header).max_property_count, (*header).null_count)
    };
    if null_count <= max / 8 {
        // SAFETY: the node is live; find the owner to rebuild over.
        let object_cp = owner_of(heap, hashmap_cp);
        free(heap, object_cp);
        // The rebuild scans the list, which already contains the new slot.
        create(heap, object_cp);
        return;
    }
    insert_entry(heap, hashmap_cp, name, property);
}

/// The object whose property list starts with this hashmap node. Walking
/// the object list is acceptable here: rebuilds are rare and the map does
/// not store a back pointer.
fn owner_of(heap: &Heap, hashmap_cp: CompressedPointer) -> CompressedPointer {
    let mut object_cp = heap.object_list;
    while !object_cp.is_null() {
        if data::property_list(heap, object_cp) == hashmap_cp {
            return object_cp;
        }
        object_cp = CompressedPointer::from_raw(data::object_header(heap, object_cp).gc_next_cp);
    }
    unreachable!("hashmap node without an owner");
}

/// Tombstone the entry of a deleted property and report whether the map
/// has degenerated enough to warrant a rebuild.
pub(crate) fn remove(
    heap: &mut Heap,
    hashmap_cp: CompressedPointer,
    property: PropertyRef,
) -> PropertyHashmapStatus {
    // SAFETY: the node is live.
    let max = unsafe { (*header_ptr(heap, hashmap_cp)).max_property_count };
    let name = property_storage::property_name(heap, property);
    let hash = name.hash(heap);
    let (mut index, step) = probe_start_and_step(hash, max);

    for _ in 0..max {
        // SAFETY: index < max.
        let entry = unsafe { *entry_ptr(heap, hashmap_cp, index) };
        let flag = read_flag(heap, hashmap_cp, max, index);
        if entry == 0 && !flag {
            break;
        }
        if entry == property.pair_cp.into_raw() && flag == (property.slot == 1) {
            // SAFETY: as above.
            unsafe {
                *entry_ptr(heap, hashmap_cp, index) = 0;
                (*header_ptr(heap, hashmap_cp)).unused_count += 1;
            }
            write_flag(heap, hashmap_cp, max, index, true);
            break;
        }
        index = (index + step) & (max - 1);
    }

    // SAFETY: the node is live.
    let unused = unsafe { (*header_ptr(heap, hashmap_cp)).unused_count };
    if unused > max / PROPERTY_HASHMAP_UNUSED_RATIO {
        PropertyHashmapStatus::Recreate
    } else {
        PropertyHashmapStatus::HasHashmap
    }
}

/// Probe for a property by name. Falls back to the chain on a saturated
/// probe sequence, which can only happen in degenerate tombstone fields.
pub(crate) fn find(
    heap: &Heap,
    hashmap_cp: CompressedPointer,
    name: PropertyName,
) -> Option<PropertyRef> {
    // SAFETY: the node is live.
    let (max, next_cp) = unsafe {
        let header = header_ptr(heap, hashmap_cp);
        ((*header).max_property_count, (*header).next_cp)
    };
    let hash = name.hash(heap);
    let (mut index, step) = probe_start_and_step(hash, max);

    for _ in 0..max {
        // SAFETY: index < max.
        let entry = unsafe { *entry_ptr(heap, hashmap_cp, index) };
        let flag = read_flag(heap, hashmap_cp, max, index);
        if entry == 0 {
            if !flag {
                return None;
            }
        } else {
            let property = PropertyRef {
                pair_cp: CompressedPointer::from_raw(entry),
                slot: flag as usize,
            };
            if property_storage::property_kind(heap, property) != PROPERTY_KIND_DELETED
                && property_storage::names_match(
                    heap,
                    property_storage::property_name(heap, property),
                    name,
                )
            {
                return Some(property);
            }
        }
        index = (index + step) & (max - 1);
    }

    property_storage::find_property_from_pair(heap, CompressedPointer::from_raw(next_cp), name)
}
