// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The tagged value word.
//!
//! Every ECMAScript language value is one 32-bit word. The three low bits
//! select the representation; heap-allocated representations carry a
//! compressed pointer in bits 3..=18, fast integers use bits 3..=30, and
//! bit 31 is the orthogonal error flag marking a value that carries an
//! exception payload.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::objects;
use crate::ecmascript::types::{bigint, number, string, symbol, MagicStringId};

const TAG_SHIFT: u32 = 3;
const TAG_MASK: u32 = 0x7;

const TAG_SIMPLE: u32 = 0;
const TAG_INTEGER: u32 = 1;
const TAG_FLOAT: u32 = 2;
const TAG_STRING: u32 = 3;
const TAG_DIRECT_STRING: u32 = 4;
const TAG_OBJECT: u32 = 5;
const TAG_SYMBOL: u32 = 6;
const TAG_BIGINT: u32 = 7;

/// The error flag. Only set on values whose payload stays reachable while
/// the flag travels (in practice: thrown error objects).
const ERROR_FLAG: u32 = 1 << 31;

/// Direct-string sub-kind: an id into the magic string registry.
const DIRECT_STRING_MAGIC: u32 = 0;
/// Direct-string sub-kind: a small unsigned integer rendered in decimal.
const DIRECT_STRING_UINT: u32 = 1;

const DIRECT_STRING_KIND_SHIFT: u32 = 3;
const DIRECT_STRING_KIND_MASK: u32 = 0x3;
const DIRECT_STRING_PAYLOAD_SHIFT: u32 = 5;

/// Largest value representable as a direct uint string. Larger numeric
/// strings are stored as heap records with the uint32 container.
pub(crate) const DIRECT_STRING_UINT_LIMIT: u32 = 1 << 26;

/// Inclusive bounds of the fast integer representation (28-bit signed).
pub const INTEGER_MAX: i32 = (1 << 27) - 1;
pub const INTEGER_MIN: i32 = -(1 << 27);

/// An ECMAScript language value as a tagged 32-bit word.
///
/// Derived equality is bit identity: it distinguishes two heap numbers with
/// equal contents and is not any of the language's equality operations. Use
/// [`same_value`], [`same_value_zero`] or [`strict_equals`] for those.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Value(u32);

impl Value {
    pub const EMPTY: Value = Value::simple(0);
    pub const UNDEFINED: Value = Value::simple(1);
    pub const NULL: Value = Value::simple(2);
    pub const FALSE: Value = Value::simple(3);
    pub const TRUE: Value = Value::simple(4);
    /// The hole sentinel of fast arrays. A zeroed cell is *not* a hole;
    /// holes are written explicitly.
    pub const ARRAY_HOLE: Value = Value::simple(5);

    #[inline]
    const fn simple(payload: u32) -> Value {
        Value(payload << TAG_SHIFT | TAG_SIMPLE)
    }

    #[inline]
    pub(crate) fn from_raw(raw: u32) -> Value {
        Value(raw)
    }

    #[inline]
    pub(crate) fn into_raw(self) -> u32 {
        self.0
    }

    #[inline]
    fn tag(self) -> u32 {
        self.0 & TAG_MASK
    }

    #[inline]
    pub fn from_boolean(value: bool) -> Value {
        if value { Value::TRUE } else { Value::FALSE }
    }

    // Simple-value predicates.

    #[inline]
    pub fn is_simple(self) -> bool {
        self.tag() == TAG_SIMPLE
    }

    #[inline]
    pub fn is_undefined(self) -> bool {
        self == Value::UNDEFINED
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self == Value::NULL
    }

    #[inline]
    pub fn is_nullish(self) -> bool {
        self.is_undefined() || self.is_null()
    }

    #[inline]
    pub fn is_boolean(self) -> bool {
        self == Value::TRUE || self == Value::FALSE
    }

    #[inline]
    pub fn is_true(self) -> bool {
        self == Value::TRUE
    }

    #[inline]
    pub(crate) fn is_empty(self) -> bool {
        self == Value::EMPTY
    }

    #[inline]
    pub fn is_array_hole(self) -> bool {
        self == Value::ARRAY_HOLE
    }

    // Fast integers.

    #[inline]
    pub fn try_from_integer(value: i32) -> Option<Value> {
        if (INTEGER_MIN..=INTEGER_MAX).contains(&value) {
            Some(Value::from_integer(value))
        } else {
            None
        }
    }

    #[inline]
    pub fn from_integer(value: i32) -> Value {
        debug_assert!((INTEGER_MIN..=INTEGER_MAX).contains(&value));
        Value((((value << 4) as u32) >> 1) | TAG_INTEGER)
    }

    #[inline]
    pub fn is_integer(self) -> bool {
        self.tag() == TAG_INTEGER
    }

    #[inline]
    pub fn as_integer(self) -> i32 {
        debug_assert!(self.is_integer());
        ((self.0 as i32) << 1) >> 4
    }

    // Heap-pointer payloads.

    #[inline]
    pub(crate) fn heap_pointer(self) -> CompressedPointer {
        debug_assert!(self.has_heap_pointer());
        CompressedPointer::from_raw((self.0 >> TAG_SHIFT) as u16)
    }

    #[inline]
    pub(crate) fn has_heap_pointer(self) -> bool {
        matches!(
            self.tag(),
            TAG_FLOAT | TAG_STRING | TAG_OBJECT | TAG_SYMBOL | TAG_BIGINT
        )
    }

    #[inline]
    fn from_pointer(tag: u32, cp: CompressedPointer) -> Value {
        debug_assert!(!cp.is_null());
        Value(((cp.into_raw() as u32) << TAG_SHIFT) | tag)
    }

    #[inline]
    pub(crate) fn from_float_cell(cp: CompressedPointer) -> Value {
        Value::from_pointer(TAG_FLOAT, cp)
    }

    #[inline]
    pub fn is_float(self) -> bool {
        self.tag() == TAG_FLOAT
    }

    #[inline]
    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    #[inline]
    pub(crate) fn from_string_record(cp: CompressedPointer) -> Value {
        Value::from_pointer(TAG_STRING, cp)
    }

    #[inline]
    pub fn is_string(self) -> bool {
        matches!(self.tag(), TAG_STRING | TAG_DIRECT_STRING)
    }

    #[inline]
    pub(crate) fn is_heap_string(self) -> bool {
        self.tag() == TAG_STRING
    }

    #[inline]
    pub(crate) fn from_object_record(cp: CompressedPointer) -> Value {
        Value::from_pointer(TAG_OBJECT, cp)
    }

    #[inline]
    pub fn is_object(self) -> bool {
        self.tag() == TAG_OBJECT
    }

    #[inline]
    pub(crate) fn from_symbol_record(cp: CompressedPointer) -> Value {
        Value::from_pointer(TAG_SYMBOL, cp)
    }

    #[inline]
    pub fn is_symbol(self) -> bool {
        self.tag() == TAG_SYMBOL
    }

    #[inline]
    pub(crate) fn from_bigint_record(cp: CompressedPointer) -> Value {
        Value::from_pointer(TAG_BIGINT, cp)
    }

    #[inline]
    pub fn is_bigint(self) -> bool {
        self.tag() == TAG_BIGINT
    }

    // Direct strings.

    #[inline]
    pub fn from_magic(id: MagicStringId) -> Value {
        Value(
            ((id.0 as u32) << DIRECT_STRING_PAYLOAD_SHIFT)
                | (DIRECT_STRING_MAGIC << DIRECT_STRING_KIND_SHIFT)
                | TAG_DIRECT_STRING,
        )
    }

    #[inline]
    pub(crate) fn try_from_direct_uint(value: u32) -> Option<Value> {
        if value < DIRECT_STRING_UINT_LIMIT {
            Some(Value(
                (value << DIRECT_STRING_PAYLOAD_SHIFT)
                    | (DIRECT_STRING_UINT << DIRECT_STRING_KIND_SHIFT)
                    | TAG_DIRECT_STRING,
            ))
        } else {
            None
        }
    }

    #[inline]
    pub(crate) fn is_direct_string(self) -> bool {
        self.tag() == TAG_DIRECT_STRING
    }

    #[inline]
    pub(crate) fn is_direct_magic_string(self) -> bool {
        self.is_direct_string()
            && (self.0 >> DIRECT_STRING_KIND_SHIFT) & DIRECT_STRING_KIND_MASK
                == DIRECT_STRING_MAGIC
    }

    #[inline]
    pub(crate) fn is_direct_uint_string(self) -> bool {
        self.is_direct_string()
            && (self.0 >> DIRECT_STRING_KIND_SHIFT) & DIRECT_STRING_KIND_MASK
                == DIRECT_STRING_UINT
    }

    #[inline]
    pub(crate) fn magic_id(self) -> MagicStringId {
        debug_assert!(self.is_direct_magic_string());
        MagicStringId((self.0 >> DIRECT_STRING_PAYLOAD_SHIFT) as u16)
    }

    #[inline]
    pub(crate) fn direct_uint(self) -> u32 {
        debug_assert!(self.is_direct_uint_string());
        (self.0 & !ERROR_FLAG) >> DIRECT_STRING_PAYLOAD_SHIFT
    }

    // The error flag.

    #[inline]
    pub fn has_error_flag(self) -> bool {
        self.0 & ERROR_FLAG != 0
    }

    #[inline]
    pub(crate) fn with_error_flag(self) -> Value {
        debug_assert!(self.has_heap_pointer());
        Value(self.0 | ERROR_FLAG)
    }

    #[inline]
    pub fn without_error_flag(self) -> Value {
        Value(self.0 & !ERROR_FLAG)
    }
}

/// Take a reference to the value for a new strong holder. Float cells are
/// copied instead of shared, so every holder frees its own cell.
pub(crate) fn copy_value(heap: &mut Heap, value: Value) -> Value {
    if value.is_object() {
        objects::ref_object(heap, value.heap_pointer());
        value
    } else {
        copy_value_if_not_object(heap, value)
    }
}

/// [`copy_value`] for record-internal storage: object-to-object links are
/// traced by the collector and carry no reference count.
pub(crate) fn copy_value_if_not_object(heap: &mut Heap, value: Value) -> Value {
    match value.tag() {
        TAG_FLOAT => number::copy_float_cell(heap, value),
        TAG_STRING => {
            string::ref_string(heap, value.heap_pointer());
            value
        }
        TAG_SYMBOL => {
            symbol::ref_symbol(heap, value.heap_pointer());
            value
        }
        TAG_BIGINT => {
            bigint::ref_bigint(heap, value.heap_pointer());
            value
        }
        _ => value,
    }
}

/// Release one strong reference to the value.
pub(crate) fn free_value(heap: &mut Heap, value: Value) {
    if value.is_object() {
        objects::deref_object(heap, value.heap_pointer());
    } else {
        free_value_if_not_object(heap, value);
    }
}

/// [`free_value`] counterpart of [`copy_value_if_not_object`].
pub(crate) fn free_value_if_not_object(heap: &mut Heap, value: Value) {
    match value.tag() {
        TAG_FLOAT => number::free_float_cell(heap, value),
        TAG_STRING => string::deref_string(heap, value.heap_pointer()),
        TAG_SYMBOL => symbol::deref_symbol(heap, value.heap_pointer()),
        TAG_BIGINT => bigint::deref_bigint(heap, value.heap_pointer()),
        _ => {}
    }
}

/// ### [7.2.12 SameValue ( x, y )](https://tc39.es/ecma262/#sec-samevalue)
pub fn same_value(heap: &Heap, x: Value, y: Value) -> bool {
    if x.is_number() && y.is_number() {
        let a = number::number_value(heap, x);
        let b = number::number_value(heap, y);
        if a.is_nan() && b.is_nan() {
            return true;
        }
        // Distinguishes the two zeroes by bit pattern.
        return a.to_bits() == b.to_bits();
    }
    same_non_numeric_value(heap, x, y)
}

/// ### [7.2.13 SameValueZero ( x, y )](https://tc39.es/ecma262/#sec-samevaluezero)
pub fn same_value_zero(heap: &Heap, x: Value, y: Value) -> bool {
    if x.is_number() && y.is_number() {
        let a = number::number_value(heap, x);
        let b = number::number_value(heap, y);
        if a.is_nan() && b.is_nan() {
            return true;
        }
        // +0 and -0 compare equal here.
        return a == b;
    }
    same_non_numeric_value(heap, x, y)
}

/// ### [7.2.15 IsStrictlyEqual ( x, y )](https://tc39.es/ecma262/#sec-isstrictlyequal)
pub fn strict_equals(heap: &Heap, x: Value, y: Value) -> bool {
    if x.is_number() && y.is_number() {
        // NaN != NaN falls out of the float comparison.
        return number::number_value(heap, x) == number::number_value(heap, y);
    }
    same_non_numeric_value(heap, x, y)
}

fn same_non_numeric_value(heap: &Heap, x: Value, y: Value) -> bool {
    if x == y {
        // Covers simple values, identical heap cells, direct strings and
        // equal bigint/symbol identities.
        return true;
    }
    if x.is_string() && y.is_string() {
        return string::strings_equal(heap, x, y);
    }
    if x.is_bigint() && y.is_bigint() {
        return bigint::bigints_equal(heap, x, y);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_values_are_distinct() {
        let values = [
            Value::EMPTY,
            Value::UNDEFINED,
            Value::NULL,
            Value::FALSE,
            Value::TRUE,
            Value::ARRAY_HOLE,
        ];
        for (i, a) in values.iter().enumerate() {
            assert!(a.is_simple());
            assert!(!a.has_error_flag());
            for b in &values[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn integers_round_trip_across_the_whole_range() {
        for value in [0, 1, -1, 42, INTEGER_MAX, INTEGER_MIN, INTEGER_MAX - 7] {
            let encoded = Value::from_integer(value);
            assert!(encoded.is_integer());
            assert!(encoded.is_number());
            assert_eq!(encoded.as_integer(), value);
        }
        assert!(Value::try_from_integer(INTEGER_MAX + 1).is_none());
        assert!(Value::try_from_integer(INTEGER_MIN - 1).is_none());
    }

    #[test]
    fn direct_uint_strings_round_trip() {
        for value in [0, 1, 9, 4999, DIRECT_STRING_UINT_LIMIT - 1] {
            let encoded = Value::try_from_direct_uint(value).unwrap();
            assert!(encoded.is_string());
            assert!(encoded.is_direct_uint_string());
            assert_eq!(encoded.direct_uint(), value);
        }
        assert!(Value::try_from_direct_uint(DIRECT_STRING_UINT_LIMIT).is_none());
    }

    #[test]
    fn error_flag_is_orthogonal_to_the_payload() {
        let cp = CompressedPointer::from_byte_offset(0x40);
        let object = Value::from_object_record(cp);
        let error = object.with_error_flag();
        assert!(error.has_error_flag());
        assert!(error.is_object());
        assert_eq!(error.heap_pointer(), cp);
        assert_eq!(error.without_error_flag(), object);
    }
}
