// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Heap strings and the magic string registry.
//!
//! Strings are stored as CESU-8 and picked one of four forms for space:
//! direct-packed magic ids and small uints (no heap cell at all), records
//! with the bytes inline after the header, records whose value is a
//! canonical uint32, and long records pointing at an external byte buffer.
//! All heap forms are reference counted and die at zero; the collector
//! never traces them.

use ahash::RandomState;

use crate::heap::{FatalCode, Heap};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::types::Value;
use crate::unicode;

/// Identifier of an interned immortal string. Ids below
/// [`MagicStringId::FIRST_HIDDEN`] name the built-in registry; hidden ids are
/// engine-internal property names; ids from [`MagicStringId::EXTERNAL_BASE`]
/// upward index the embedder-registered table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MagicStringId(pub(crate) u16);

macro_rules! builtin_magic_strings {
    ($($index:literal => $name:ident = $text:literal,)*) => {
        impl MagicStringId {
            $(pub const $name: MagicStringId = MagicStringId($index);)*
        }

        /// Texts of the built-in magic strings, indexed by id.
        pub(crate) const BUILTIN_MAGIC_STRINGS: &[&str] = &[$($text),*];
    };
}

builtin_magic_strings! {
    0 => EMPTY = "",
    1 => LENGTH = "length",
    2 => PROTOTYPE = "prototype",
    3 => CONSTRUCTOR = "constructor",
    4 => UNDEFINED = "undefined",
    5 => NULL = "null",
    6 => TRUE = "true",
    7 => FALSE = "false",
    8 => BOOLEAN = "boolean",
    9 => NUMBER = "number",
    10 => STRING = "string",
    11 => OBJECT = "object",
    12 => FUNCTION = "function",
    13 => SYMBOL = "symbol",
    14 => BIGINT = "bigint",
    15 => NAN = "NaN",
    16 => INFINITY = "Infinity",
    17 => NEGATIVE_INFINITY = "-Infinity",
    18 => VALUE_OF = "valueOf",
    19 => TO_STRING = "toString",
    20 => NAME = "name",
    21 => MESSAGE = "message",
    22 => VALUE = "value",
    23 => DONE = "done",
    24 => NEXT = "next",
    25 => GET = "get",
    26 => SET = "set",
    27 => WRITABLE = "writable",
    28 => ENUMERABLE = "enumerable",
    29 => CONFIGURABLE = "configurable",
    30 => ERROR = "Error",
    31 => TYPE_ERROR = "TypeError",
    32 => RANGE_ERROR = "RangeError",
    33 => REFERENCE_ERROR = "ReferenceError",
    34 => SYNTAX_ERROR = "SyntaxError",
    35 => URI_ERROR = "URIError",
    36 => EVAL_ERROR = "EvalError",
    37 => AGGREGATE_ERROR = "AggregateError",
    38 => GET_PROTOTYPE_OF = "getPrototypeOf",
    39 => SET_PROTOTYPE_OF = "setPrototypeOf",
    40 => IS_EXTENSIBLE = "isExtensible",
    41 => PREVENT_EXTENSIONS = "preventExtensions",
    42 => GET_OWN_PROPERTY_DESCRIPTOR = "getOwnPropertyDescriptor",
    43 => DEFINE_PROPERTY = "defineProperty",
    44 => HAS = "has",
    45 => DELETE_PROPERTY = "deleteProperty",
    46 => OWN_KEYS = "ownKeys",
    47 => APPLY = "apply",
    48 => CONSTRUCT = "construct",
    // Hidden internal property names. Scripts can never observe these; the
    // leading control byte keeps them out of the lookup table.
    49 => HIDDEN_WEAK_REFS = "\u{1}weakRefs",
    50 => HIDDEN_ITERATOR_INDEX = "\u{1}iteratorIndex",
    51 => HIDDEN_NATIVE_DATA = "\u{1}nativeData",
}

impl MagicStringId {
    /// First hidden (engine-internal) id.
    pub(crate) const FIRST_HIDDEN: u16 = 49;
    /// First id of the embedder-registered table.
    pub(crate) const EXTERNAL_BASE: u16 = 0x8000;
}

/// String container kinds, stored in the low bits of `refs_and_container`.
const CONTAINER_MASK: u16 = 0x3;
const CONTAINER_INLINE: u16 = 0;
const CONTAINER_LONG: u16 = 1;
const CONTAINER_UINT32: u16 = 2;

const REFS_SHIFT: u16 = 2;
const REFS_ONE: u16 = 1 << REFS_SHIFT;
const REFS_MAX: u16 = u16::MAX >> REFS_SHIFT;

/// Inline records hold at most this many bytes; longer contents move to an
/// external buffer behind a long record.
pub(crate) const INLINE_STRING_MAX_SIZE: usize = u16::MAX as usize;

/// Common header of every heap string record.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct StringHeader {
    /// Reference count in the high bits, container kind in the low two.
    refs_and_container: u16,
    /// Content hash, computed once at allocation.
    hash: u16,
}

/// CESU-8 bytes stored directly after the header.
#[repr(C)]
pub(crate) struct InlineStringRecord {
    header: StringHeader,
    /// Content size in bytes.
    pub(crate) size: u16,
    /// Content length in UTF-16 code units.
    pub(crate) length: u16,
    // size bytes of CESU-8 follow.
}

/// A string whose content lives in a separate heap buffer.
#[repr(C)]
pub(crate) struct LongStringRecord {
    header: StringHeader,
    pub(crate) size: u32,
    pub(crate) length: u32,
    pub(crate) data_cp: u16,
    _padding: u16,
}

/// A canonical uint32 numeric string; the decimal form is materialized on
/// demand.
#[repr(C)]
pub(crate) struct Uint32StringRecord {
    header: StringHeader,
    pub(crate) value: u32,
}

const INLINE_HEADER_SIZE: usize = core::mem::size_of::<InlineStringRecord>();

/// Scratch space for materializing direct and uint32 string contents.
pub(crate) type StringScratch = [u8; 16];

const HASH_SEED: (u64, u64, u64, u64) =
    (0x4b69_7465, 0x9e37_79b9_7f4a_7c15, 0x2545_f491_4f6c_dd1d, 0x27d4_eb2f);

/// Content hash of a string, folded to the 16 bits the records store. The
/// seeds are fixed so hashes are reproducible across contexts.
pub(crate) fn hash_bytes(bytes: &[u8]) -> u16 {
    let state = RandomState::with_seeds(HASH_SEED.0, HASH_SEED.1, HASH_SEED.2, HASH_SEED.3);
    let hash = state.hash_one(bytes);
    (hash ^ (hash >> 16) ^ (hash >> 32)) as u16
}

/// Parse a canonical decimal uint32: no sign, no leading zero (except "0"
/// itself), value fits u32. These are exactly the strings that normalize to
/// the numeric name forms.
pub(crate) fn parse_canonical_uint32(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }
    if bytes[0] == b'0' && bytes.len() > 1 {
        return None;
    }
    let mut value: u64 = 0;
    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }
        value = value * 10 + (byte - b'0') as u64;
    }
    if value > u32::MAX as u64 {
        return None;
    }
    Some(value as u32)
}

/// Create a string value from CESU-8 content, normalizing to the cheapest
/// form: a registered magic string, a direct or uint32 numeric string, an
/// inline record or a long record.
pub(crate) fn new_string_from_cesu8(heap: &mut Heap, bytes: &[u8]) -> Value {
    if let Some(id) = heap.find_magic_string(bytes) {
        return Value::from_magic(id);
    }
    if let Some(value) = parse_canonical_uint32(bytes) {
        return new_string_from_uint32(heap, value);
    }

    let hash = hash_bytes(bytes);
    let length = unicode::cesu8_unit_count(bytes);

    if bytes.len() <= INLINE_STRING_MAX_SIZE {
        let size = INLINE_HEADER_SIZE + bytes.len();
        let ptr = heap.alloc(size);
        #[cfg(feature = "mem-stats")]
        heap.allocator.stat_string_bytes(size as isize);
        let record = ptr.cast::<InlineStringRecord>();
        // SAFETY: a fresh block of INLINE_HEADER_SIZE + len bytes.
        unsafe {
            record.write(InlineStringRecord {
                header: StringHeader {
                    refs_and_container: REFS_ONE | CONTAINER_INLINE,
                    hash,
                },
                size: bytes.len() as u16,
                length: length as u16,
            });
            core::ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                ptr.as_ptr().add(INLINE_HEADER_SIZE),
                bytes.len(),
            );
        }
        Value::from_string_record(heap.compress(ptr))
    } else {
        let data = heap.alloc(bytes.len());
        // SAFETY: a fresh block of len bytes.
        unsafe {
            core::ptr::copy_nonoverlapping(bytes.as_ptr(), data.as_ptr(), bytes.len());
        }
        let data_cp = heap.compress(data);
        let ptr = heap.alloc(core::mem::size_of::<LongStringRecord>());
        #[cfg(feature = "mem-stats")]
        heap.allocator
            .stat_string_bytes((core::mem::size_of::<LongStringRecord>() + bytes.len()) as isize);
        let record = ptr.cast::<LongStringRecord>();
        // SAFETY: a fresh block of record size.
        unsafe {
            record.write(LongStringRecord {
                header: StringHeader {
                    refs_and_container: REFS_ONE | CONTAINER_LONG,
                    hash,
                },
                size: bytes.len() as u32,
                length,
                data_cp: data_cp.into_raw(),
                _padding: 0,
            });
        }
        Value::from_string_record(heap.compress(ptr))
    }
}

/// Create a string value from embedder UTF-8, re-encoding supplementary
/// characters as surrogate pairs.
pub(crate) fn new_string_from_utf8(heap: &mut Heap, content: &str) -> Value {
    let cesu8 = unicode::utf8_to_cesu8(content.as_bytes());
    new_string_from_cesu8(heap, &cesu8)
}

/// Numeric string for a uint32 value.
pub(crate) fn new_string_from_uint32(heap: &mut Heap, value: u32) -> Value {
    if let Some(direct) = Value::try_from_direct_uint(value) {
        return direct;
    }
    Value::from_string_record(alloc_uint32_record(heap, value))
}

/// Heap record for a uint32 numeric string; the property store needs one
/// whenever an index cannot ride in a direct name field.
pub(crate) fn alloc_uint32_record(heap: &mut Heap, value: u32) -> CompressedPointer {
    let ptr = heap.alloc(core::mem::size_of::<Uint32StringRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_string_bytes(core::mem::size_of::<Uint32StringRecord>() as isize);
    // SAFETY: a fresh block of record size.
    unsafe {
        ptr.cast::<Uint32StringRecord>().write(Uint32StringRecord {
            header: StringHeader {
                refs_and_container: REFS_ONE | CONTAINER_UINT32,
                hash: 0,
            },
            value,
        });
    }
    heap.compress(ptr)
}

#[inline]
fn header_ptr(heap: &Heap, cp: CompressedPointer) -> *mut StringHeader {
    heap.deref::<StringHeader>(cp)
}

#[inline]
fn container(heap: &Heap, cp: CompressedPointer) -> u16 {
    // SAFETY: cp references a live string record.
    unsafe { (*header_ptr(heap, cp)).refs_and_container & CONTAINER_MASK }
}

/// Take a reference to a heap string record.
pub(crate) fn ref_string(heap: &mut Heap, cp: CompressedPointer) {
    let header = header_ptr(heap, cp);
    // SAFETY: cp references a live string record.
    unsafe {
        if (*header).refs_and_container >> REFS_SHIFT == REFS_MAX {
            heap.fatal(FatalCode::RefCountLimit);
        }
        (*header).refs_and_container += REFS_ONE;
    }
}

/// Release a reference; the record (and a long record's buffer) is freed at
/// zero.
pub(crate) fn deref_string(heap: &mut Heap, cp: CompressedPointer) {
    let header = header_ptr(heap, cp);
    // SAFETY: cp references a live string record with a positive count.
    let remaining = unsafe {
        debug_assert!((*header).refs_and_container >> REFS_SHIFT > 0);
        (*header).refs_and_container -= REFS_ONE;
        (*header).refs_and_container >> REFS_SHIFT
    };
    if remaining == 0 {
        free_string_record(heap, cp);
    }
}

fn free_string_record(heap: &mut Heap, cp: CompressedPointer) {
    let ptr = heap.decompress(cp);
    match container(heap, cp) {
        CONTAINER_INLINE => {
            // SAFETY: record layout checked by the container tag.
            let size = unsafe { (*ptr.cast::<InlineStringRecord>().as_ptr()).size } as usize;
            heap.free_block(ptr, INLINE_HEADER_SIZE + size);
            #[cfg(feature = "mem-stats")]
            heap.allocator
                .stat_string_bytes(-((INLINE_HEADER_SIZE + size) as isize));
        }
        CONTAINER_LONG => {
            // SAFETY: record layout checked by the container tag.
            let record = unsafe { ptr.cast::<LongStringRecord>().as_ptr().read() };
            let data = heap.decompress(CompressedPointer::from_raw(record.data_cp));
            heap.free_block(data, record.size as usize);
            heap.free_block(ptr, core::mem::size_of::<LongStringRecord>());
            #[cfg(feature = "mem-stats")]
            heap.allocator.stat_string_bytes(
                -((core::mem::size_of::<LongStringRecord>() + record.size as usize) as isize),
            );
        }
        _ => {
            debug_assert_eq!(container(heap, cp), CONTAINER_UINT32);
            heap.free_block(ptr, core::mem::size_of::<Uint32StringRecord>());
            #[cfg(feature = "mem-stats")]
            heap.allocator
                .stat_string_bytes(-(core::mem::size_of::<Uint32StringRecord>() as isize));
        }
    }
}

fn format_uint(value: u32, scratch: &mut StringScratch) -> &[u8] {
    let mut cursor = scratch.len();
    let mut rest = value;
    loop {
        cursor -= 1;
        scratch[cursor] = b'0' + (rest % 10) as u8;
        rest /= 10;
        if rest == 0 {
            break;
        }
    }
    &scratch[cursor..]
}

/// Materialize the CESU-8 content of any string value. Heap contents are
/// borrowed from the arena; numeric forms are rendered into `scratch`.
pub(crate) fn read_string<'a>(
    heap: &'a Heap,
    value: Value,
    scratch: &'a mut StringScratch,
) -> &'a [u8] {
    debug_assert!(value.is_string());
    if value.is_direct_magic_string() {
        return heap.magic_string_text(value.magic_id()).as_bytes();
    }
    if value.is_direct_uint_string() {
        return format_uint(value.direct_uint(), scratch);
    }
    let cp = value.heap_pointer();
    let ptr = heap.decompress(cp);
    match container(heap, cp) {
        CONTAINER_INLINE => {
            // SAFETY: the content bytes directly follow the record header
            // and stay valid while the heap is borrowed.
            unsafe {
                let record = ptr.cast::<InlineStringRecord>().as_ptr();
                core::slice::from_raw_parts(
                    ptr.as_ptr().add(INLINE_HEADER_SIZE),
                    (*record).size as usize,
                )
            }
        }
        CONTAINER_LONG => {
            // SAFETY: as above, via the external buffer.
            unsafe {
                let record = ptr.cast::<LongStringRecord>().as_ptr();
                let data = heap.decompress(CompressedPointer::from_raw((*record).data_cp));
                core::slice::from_raw_parts(data.as_ptr(), (*record).size as usize)
            }
        }
        _ => {
            // SAFETY: container tag checked.
            let number = unsafe { (*ptr.cast::<Uint32StringRecord>().as_ptr()).value };
            format_uint(number, scratch)
        }
    }
}

/// Length of the string in UTF-16 code units.
pub(crate) fn string_length(heap: &Heap, value: Value) -> u32 {
    debug_assert!(value.is_string());
    if value.is_direct_magic_string() {
        return unicode::cesu8_unit_count(
            heap.magic_string_text(value.magic_id()).as_bytes(),
        );
    }
    if value.is_direct_uint_string() {
        let mut scratch = StringScratch::default();
        return format_uint(value.direct_uint(), &mut scratch).len() as u32;
    }
    let cp = value.heap_pointer();
    let ptr = heap.decompress(cp);
    match container(heap, cp) {
        // SAFETY: container tags checked in each arm.
        CONTAINER_INLINE => unsafe { (*ptr.cast::<InlineStringRecord>().as_ptr()).length as u32 },
        CONTAINER_LONG => unsafe { (*ptr.cast::<LongStringRecord>().as_ptr()).length },
        _ => {
            let value = unsafe { (*ptr.cast::<Uint32StringRecord>().as_ptr()).value };
            let mut scratch = StringScratch::default();
            format_uint(value, &mut scratch).len() as u32
        }
    }
}

/// Stored (or computed) content hash of a string value.
pub(crate) fn string_hash(heap: &Heap, value: Value) -> u16 {
    debug_assert!(value.is_string());
    if value.is_heap_string() {
        let cp = value.heap_pointer();
        if container(heap, cp) != CONTAINER_UINT32 {
            // SAFETY: cp references a live string record.
            return unsafe { (*header_ptr(heap, cp)).hash };
        }
    }
    let mut scratch = StringScratch::default();
    hash_bytes(read_string(heap, value, &mut scratch))
}

/// If the string is a canonical uint32 numeric string, its value.
pub(crate) fn string_to_array_index(heap: &Heap, value: Value) -> Option<u32> {
    if value.is_direct_uint_string() {
        return Some(value.direct_uint());
    }
    if value.is_heap_string() {
        let cp = value.heap_pointer();
        if container(heap, cp) == CONTAINER_UINT32 {
            let ptr = heap.decompress(cp);
            // SAFETY: container tag checked.
            return Some(unsafe { (*ptr.cast::<Uint32StringRecord>().as_ptr()).value });
        }
    }
    None
}

/// Content equality of two string values.
pub(crate) fn strings_equal(heap: &Heap, a: Value, b: Value) -> bool {
    debug_assert!(a.is_string() && b.is_string());
    if a == b {
        return true;
    }
    if a.is_direct_string() && b.is_direct_string() {
        // Direct forms are canonical: distinct words are distinct strings.
        return false;
    }
    if a.is_heap_string()
        && b.is_heap_string()
        && string_hash(heap, a) != string_hash(heap, b)
    {
        return false;
    }
    let mut scratch_a = StringScratch::default();
    let mut scratch_b = StringScratch::default();
    let bytes_a: &[u8] = read_string(heap, a, &mut scratch_a);
    let bytes_b: &[u8] = read_string(heap, b, &mut scratch_b);
    bytes_a == bytes_b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_matches_the_ids() {
        assert_eq!(BUILTIN_MAGIC_STRINGS[MagicStringId::EMPTY.0 as usize], "");
        assert_eq!(
            BUILTIN_MAGIC_STRINGS[MagicStringId::LENGTH.0 as usize],
            "length"
        );
        assert_eq!(
            BUILTIN_MAGIC_STRINGS[MagicStringId::AGGREGATE_ERROR.0 as usize],
            "AggregateError"
        );
        assert_eq!(
            MagicStringId::FIRST_HIDDEN as usize,
            BUILTIN_MAGIC_STRINGS.len() - 3
        );
    }

    #[test]
    fn canonical_uint_parsing_rejects_non_canonical_forms() {
        assert_eq!(parse_canonical_uint32(b"0"), Some(0));
        assert_eq!(parse_canonical_uint32(b"4999"), Some(4999));
        assert_eq!(parse_canonical_uint32(b"4294967295"), Some(u32::MAX));
        assert_eq!(parse_canonical_uint32(b"01"), None);
        assert_eq!(parse_canonical_uint32(b""), None);
        assert_eq!(parse_canonical_uint32(b"-1"), None);
        assert_eq!(parse_canonical_uint32(b"4294967296"), None);
        assert_eq!(parse_canonical_uint32(b"12a"), None);
    }

    #[test]
    fn hashes_are_stable_and_spread() {
        assert_eq!(hash_bytes(b"length"), hash_bytes(b"length"));
        assert_ne!(hash_bytes(b"length"), hash_bytes(b"lengtg"));
    }
}
