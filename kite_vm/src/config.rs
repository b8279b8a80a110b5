// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Build-time tunables of the engine core.

/// Logarithm of the allocation unit. Every heap block is aligned to
/// `1 << HEAP_ALIGNMENT_LOG` bytes, and compressed pointers address the heap
/// in these units.
pub const HEAP_ALIGNMENT_LOG: u32 = 3;

/// The allocation unit in bytes.
pub const HEAP_ALIGNMENT: usize = 1 << HEAP_ALIGNMENT_LOG;

/// Total size of the heap arena in bytes, including the free-list sentinel
/// that occupies the first allocation unit. With 16-bit compressed pointers
/// the arena must not exceed `(u16::MAX + 1) << HEAP_ALIGNMENT_LOG` bytes
/// (512 KiB).
pub const HEAP_SIZE: usize = 512 * 1024;

/// Usable arena bytes, directly after the sentinel.
pub const HEAP_AREA_SIZE: usize = HEAP_SIZE - HEAP_ALIGNMENT;

/// Step of the moving allocation limit. Crossing the limit on allocation
/// invokes the low-severity free-unused-memory hook; the limit then advances
/// (and retreats on free) in multiples of this step.
pub const HEAP_DESIRED_LIMIT: usize = HEAP_SIZE / 32;

/// Property count past which an object gets a property hashmap attached.
pub const PROPERTY_HASHMAP_MINIMUM_SIZE: u32 = 32;

/// When deleted entries fill this fraction of a property hashmap (1/n), the
/// deletion path asks the caller to rebuild the map instead of probing
/// through an ever-growing tombstone field.
pub const PROPERTY_HASHMAP_UNUSED_RATIO: u32 = 4;

/// Largest number of new holes a single fast-array element store may create
/// before the array is converted to the normal property-list layout.
pub const FAST_ARRAY_MAX_NEW_HOLES: u32 = 32;

/// Largest total hole count a fast array may accumulate.
pub const FAST_ARRAY_MAX_HOLES: u32 = 256;

/// Container iterator indices at or above this value are spilled into a
/// hidden internal property instead of the iterator record's packed field.
pub const ITERATOR_PACKED_INDEX_LIMIT: u32 = 1 << 24;

/// Nesting depth limit for the engine-internal call paths (bound-function
/// chains, proxy traps, accessor invocation).
pub const CALL_DEPTH_LIMIT: u32 = 128;
