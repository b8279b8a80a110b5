// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! BigInt records: sign and magnitude digits in the arena, refcounted.
//! Arithmetic belongs to the builtin layer; the core stores, compares and
//! converts at the embedding boundary through `num_bigint`.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;

use crate::heap::{FatalCode, Heap};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::types::Value;

const FLAG_NEGATIVE: u8 = 1 << 0;

#[repr(C)]
pub(crate) struct BigIntRecord {
    refs: u16,
    flags: u8,
    _padding: u8,
    /// Number of 32-bit magnitude digits following the header, little
    /// endian. Zero digits encode the value zero.
    digit_count: u32,
    // digit_count u32 digits follow.
}

const HEADER_SIZE: usize = core::mem::size_of::<BigIntRecord>();

fn record_size(digit_count: u32) -> usize {
    HEADER_SIZE + digit_count as usize * 4
}

/// Create a bigint value from an embedding `BigInt`.
pub fn new_bigint(heap: &mut Heap, value: &BigInt) -> Value {
    let (sign, digits) = value.to_u32_digits();
    let ptr = heap.alloc(record_size(digits.len() as u32));
    // SAFETY: a fresh block of record_size bytes.
    unsafe {
        ptr.cast::<BigIntRecord>().write(BigIntRecord {
            refs: 1,
            flags: if sign == Sign::Minus { FLAG_NEGATIVE } else { 0 },
            _padding: 0,
            digit_count: digits.len() as u32,
        });
        let digit_base = ptr.as_ptr().add(HEADER_SIZE) as *mut u32;
        for (index, digit) in digits.iter().enumerate() {
            digit_base.add(index).write_unaligned(*digit);
        }
    }
    Value::from_bigint_record(heap.compress(ptr))
}

pub fn new_bigint_from_i64(heap: &mut Heap, value: i64) -> Value {
    new_bigint(heap, &BigInt::from(value))
}

fn read_parts(heap: &Heap, cp: CompressedPointer) -> (bool, Vec<u32>) {
    let ptr = heap.decompress(cp);
    // SAFETY: cp references a live bigint record and its trailing digits.
    unsafe {
        let record = ptr.cast::<BigIntRecord>().as_ptr();
        let count = (*record).digit_count as usize;
        let digit_base = ptr.as_ptr().add(HEADER_SIZE) as *const u32;
        let mut digits = Vec::with_capacity(count);
        for index in 0..count {
            digits.push(digit_base.add(index).read_unaligned());
        }
        ((*record).flags & FLAG_NEGATIVE != 0, digits)
    }
}

/// Convert a bigint value back to an embedding `BigInt`.
pub fn bigint_value(heap: &Heap, value: Value) -> BigInt {
    debug_assert!(value.is_bigint());
    let (negative, digits) = read_parts(heap, value.heap_pointer());
    let magnitude = num_bigint::BigUint::new(digits);
    if magnitude.is_zero() {
        BigInt::from(0)
    } else if negative {
        BigInt::from_biguint(Sign::Minus, magnitude)
    } else {
        BigInt::from_biguint(Sign::Plus, magnitude)
    }
}

pub(crate) fn bigints_equal(heap: &Heap, a: Value, b: Value) -> bool {
    debug_assert!(a.is_bigint() && b.is_bigint());
    if a == b {
        return true;
    }
    let (sign_a, digits_a) = read_parts(heap, a.heap_pointer());
    let (sign_b, digits_b) = read_parts(heap, b.heap_pointer());
    if digits_a.is_empty() && digits_b.is_empty() {
        // Both are zero; the sign flag is not observable.
        return true;
    }
    sign_a == sign_b && digits_a == digits_b
}

pub(crate) fn ref_bigint(heap: &mut Heap, cp: CompressedPointer) {
    let record = heap.deref::<BigIntRecord>(cp);
    // SAFETY: cp references a live bigint record.
    unsafe {
        if (*record).refs == u16::MAX {
            heap.fatal(FatalCode::RefCountLimit);
        }
        (*record).refs += 1;
    }
}

pub(crate) fn deref_bigint(heap: &mut Heap, cp: CompressedPointer) {
    let record = heap.deref::<BigIntRecord>(cp);
    // SAFETY: cp references a live bigint record with a positive count.
    let (remaining, digit_count) = unsafe {
        debug_assert!((*record).refs > 0);
        (*record).refs -= 1;
        ((*record).refs, (*record).digit_count)
    };
    if remaining == 0 {
        let ptr = heap.decompress(cp);
        heap.free_block(ptr, record_size(digit_count));
    }
}
