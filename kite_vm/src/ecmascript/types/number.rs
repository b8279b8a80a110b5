// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Numbers and the numeric abstract operations.
//!
//! Integers in the 28-bit fast range live inside the value word; everything
//! else is an IEEE-754 double in a pool cell. Float cells are copied, never
//! shared, so each holder frees its own cell and no reference count is
//! needed.

use crate::heap::Heap;
use crate::ecmascript::types::string;
use crate::ecmascript::types::value::{INTEGER_MAX, INTEGER_MIN, Value};

/// Make a number value, preferring the fast integer representation.
pub fn new_number(heap: &mut Heap, value: f64) -> Value {
    if value.trunc() == value
        && (INTEGER_MIN as f64..=INTEGER_MAX as f64).contains(&value)
        && !(value == 0.0 && value.is_sign_negative())
    {
        return Value::from_integer(value as i32);
    }
    alloc_float_cell(heap, value)
}

fn alloc_float_cell(heap: &mut Heap, value: f64) -> Value {
    let ptr = heap.pool_alloc();
    // SAFETY: pool cells are 8 bytes and unit-aligned.
    unsafe {
        ptr.cast::<f64>().write(value);
    }
    Value::from_float_cell(heap.compress(ptr))
}

/// Numeric value of an integer or float value word.
pub fn number_value(heap: &Heap, value: Value) -> f64 {
    debug_assert!(value.is_number());
    if value.is_integer() {
        value.as_integer() as f64
    } else {
        let ptr = heap.decompress(value.heap_pointer());
        // SAFETY: float-tagged values reference a live 8-byte cell.
        unsafe { ptr.cast::<f64>().read() }
    }
}

/// Clone a float cell for a new holder.
pub(crate) fn copy_float_cell(heap: &mut Heap, value: Value) -> Value {
    debug_assert!(value.is_float());
    let content = number_value(heap, value);
    alloc_float_cell(heap, content)
}

/// Release a float cell.
pub(crate) fn free_float_cell(heap: &mut Heap, value: Value) {
    debug_assert!(value.is_float());
    let ptr = heap.decompress(value.heap_pointer());
    heap.pool_free(ptr);
}

/// ### [7.1.6 ToInt32 ( argument )](https://tc39.es/ecma262/#sec-toint32)
///
/// Truncation modulo 2^32, then sign interpretation of the top bit.
pub fn to_int32(value: f64) -> i32 {
    number_to_uint32(value) as i32
}

/// ### [7.1.7 ToUint32 ( argument )](https://tc39.es/ecma262/#sec-touint32)
pub fn to_uint32(value: f64) -> u32 {
    number_to_uint32(value)
}

/// NaN and the infinities map to zero; all other values truncate toward
/// zero and reduce modulo 2^32.
pub fn number_to_uint32(value: f64) -> u32 {
    if !value.is_finite() || value == 0.0 {
        return 0;
    }
    let truncated = value.trunc();
    let modulo = truncated.rem_euclid(4294967296.0);
    // 0 <= modulo < 2^32, and every such integer is exactly representable.
    modulo as u32
}

/// ### [7.1.20 ToLength ( argument )](https://tc39.es/ecma262/#sec-tolength)
pub fn to_length(value: f64) -> u64 {
    const MAX_SAFE_INTEGER: f64 = 9007199254740991.0;
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.trunc().min(MAX_SAFE_INTEGER) as u64
}

/// ### [6.1.6.1.20 Number::toString ( x, radix )](https://tc39.es/ecma262/#sec-numeric-types-number-tostring)
/// for radix 10, as a string value.
pub(crate) fn number_to_string_value(heap: &mut Heap, value: f64) -> Value {
    if value.is_nan() {
        return Value::from_magic(crate::ecmascript::types::MagicStringId::NAN);
    }
    if value == f64::INFINITY {
        return Value::from_magic(crate::ecmascript::types::MagicStringId::INFINITY);
    }
    if value == f64::NEG_INFINITY {
        return Value::from_magic(crate::ecmascript::types::MagicStringId::NEGATIVE_INFINITY);
    }
    if value == 0.0 {
        // Both zeroes print as "0".
        return string::new_string_from_cesu8(heap, b"0");
    }
    let mut buffer = ryu_js::Buffer::new();
    let formatted = buffer.format(value);
    string::new_string_from_cesu8(heap, formatted.as_bytes())
}

/// ### [7.1.4.1.1 StringToNumber ( str )](https://tc39.es/ecma262/#sec-stringtonumber)
///
/// The input is the string's CESU-8 content; the numeric grammar is ASCII,
/// so the encoding difference cannot be observed past the whitespace trim.
pub(crate) fn string_to_number(bytes: &[u8]) -> f64 {
    let Ok(text) = core::str::from_utf8(bytes) else {
        // Lone surrogates are not part of any numeric literal.
        return f64::NAN;
    };
    let trimmed = text.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    let (negative, unsigned) = match trimmed.as_bytes()[0] {
        b'+' => (false, &trimmed[1..]),
        b'-' => (true, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if unsigned.is_empty() {
        return f64::NAN;
    }

    let magnitude = if unsigned == "Infinity" {
        f64::INFINITY
    } else if let Some(digits) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X"))
    {
        if negative || trimmed.as_bytes()[0] == b'+' {
            // Signed non-decimal literals are not in the grammar.
            return f64::NAN;
        }
        return parse_radix(digits, 16);
    } else if let Some(digits) = unsigned.strip_prefix("0o").or_else(|| unsigned.strip_prefix("0O"))
    {
        if negative || trimmed.as_bytes()[0] == b'+' {
            return f64::NAN;
        }
        return parse_radix(digits, 8);
    } else if let Some(digits) = unsigned.strip_prefix("0b").or_else(|| unsigned.strip_prefix("0B"))
    {
        if negative || trimmed.as_bytes()[0] == b'+' {
            return f64::NAN;
        }
        return parse_radix(digits, 2);
    } else {
        if !is_decimal_literal(unsigned) {
            return f64::NAN;
        }
        match fast_float::parse::<f64, _>(unsigned) {
            Ok(value) => value,
            Err(_) => return f64::NAN,
        }
    };

    if negative { -magnitude } else { magnitude }
}

/// StrWhiteSpaceChar: WhiteSpace and LineTerminator.
fn is_js_whitespace(ch: char) -> bool {
    matches!(
        ch,
        '\u{9}' | '\u{A}' | '\u{B}' | '\u{C}' | '\u{D}' | ' ' | '\u{A0}' | '\u{1680}'
            | '\u{2000}'..='\u{200A}' | '\u{2028}' | '\u{2029}' | '\u{202F}' | '\u{205F}'
            | '\u{3000}' | '\u{FEFF}'
    )
}

/// Gate keeping [`fast_float`] to the StrDecimalLiteral grammar: it would
/// otherwise accept Rust-isms such as "inf" and "nan".
fn is_decimal_literal(text: &str) -> bool {
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exponent = false;
    let bytes = text.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot && !seen_exponent => seen_dot = true,
            b'e' | b'E' if seen_digit && !seen_exponent => {
                seen_exponent = true;
                if index + 1 < bytes.len() && matches!(bytes[index + 1], b'+' | b'-') {
                    index += 1;
                }
                if index + 1 >= bytes.len() {
                    return false;
                }
                // The exponent part must be all digits.
                for &byte in &bytes[index + 1..] {
                    if !byte.is_ascii_digit() {
                        return false;
                    }
                }
                return true;
            }
            _ => return false,
        }
        index += 1;
    }
    seen_digit
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut value: f64 = 0.0;
    for ch in digits.chars() {
        let Some(digit) = ch.to_digit(radix) else {
            return f64::NAN;
        };
        value = value * radix as f64 + digit as f64;
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint32_conversion_follows_the_spec_table() {
        assert_eq!(number_to_uint32(f64::NAN), 0);
        assert_eq!(number_to_uint32(f64::INFINITY), 0);
        assert_eq!(number_to_uint32(f64::NEG_INFINITY), 0);
        assert_eq!(number_to_uint32(0.0), 0);
        assert_eq!(number_to_uint32(-0.0), 0);
        assert_eq!(number_to_uint32(3.7), 3);
        assert_eq!(number_to_uint32(-3.7), 4294967293);
        assert_eq!(number_to_uint32(4294967296.0), 0);
        assert_eq!(number_to_uint32(4294967297.0), 1);
        assert_eq!(to_int32(2147483648.0), -2147483648);
        assert_eq!(to_int32(-1.0), -1);
    }

    #[test]
    fn to_length_clamps() {
        assert_eq!(to_length(f64::NAN), 0);
        assert_eq!(to_length(-5.0), 0);
        assert_eq!(to_length(5.9), 5);
        assert_eq!(to_length(1e300), 9007199254740991);
    }

    #[test]
    fn string_to_number_covers_the_grammar() {
        assert_eq!(string_to_number(b""), 0.0);
        assert_eq!(string_to_number(b"  42  "), 42.0);
        assert_eq!(string_to_number(b"-1.5e2"), -150.0);
        assert_eq!(string_to_number(b"+0.5"), 0.5);
        assert_eq!(string_to_number(b"0x10"), 16.0);
        assert_eq!(string_to_number(b"0b101"), 5.0);
        assert_eq!(string_to_number(b"0o17"), 15.0);
        assert_eq!(string_to_number(b"Infinity"), f64::INFINITY);
        assert_eq!(string_to_number(b"-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number(b"inf").is_nan());
        assert!(string_to_number(b"nan").is_nan());
        assert!(string_to_number(b"1x").is_nan());
        assert!(string_to_number(b"-0x10").is_nan());
        assert!(string_to_number(b"1.2.3").is_nan());
    }
}
