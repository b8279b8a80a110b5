// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Symbols: unique, refcounted cells carrying an optional description
//! string. Identity is the cell address; two symbols are the same symbol
//! only when their value words are bit-identical.

use crate::heap::{FatalCode, Heap};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::types::value::{self, Value};

#[repr(C)]
pub(crate) struct SymbolRecord {
    refs: u16,
    _padding: u16,
    /// Description string value, or undefined. Holds a string reference.
    pub(crate) description: u32,
}

/// Create a new unique symbol. Takes over the caller's reference to the
/// description, which must be a string or undefined.
pub fn new_symbol(heap: &mut Heap, description: Value) -> Value {
    debug_assert!(description.is_string() || description.is_undefined());
    let ptr = heap.pool_alloc();
    // SAFETY: pool cells are 8 bytes, enough for SymbolRecord.
    unsafe {
        ptr.cast::<SymbolRecord>().write(SymbolRecord {
            refs: 1,
            _padding: 0,
            description: description.into_raw(),
        });
    }
    Value::from_symbol_record(heap.compress(ptr))
}

/// Description value of a symbol. Does not take a reference.
pub(crate) fn symbol_description(heap: &Heap, cp: CompressedPointer) -> Value {
    // SAFETY: cp references a live symbol record.
    unsafe { Value::from_raw((*heap.deref::<SymbolRecord>(cp)).description) }
}

pub(crate) fn ref_symbol(heap: &mut Heap, cp: CompressedPointer) {
    let record = heap.deref::<SymbolRecord>(cp);
    // SAFETY: cp references a live symbol record.
    unsafe {
        if (*record).refs == u16::MAX {
            heap.fatal(FatalCode::RefCountLimit);
        }
        (*record).refs += 1;
    }
}

pub(crate) fn deref_symbol(heap: &mut Heap, cp: CompressedPointer) {
    let record = heap.deref::<SymbolRecord>(cp);
    // SAFETY: cp references a live symbol record with a positive count.
    let remaining = unsafe {
        debug_assert!((*record).refs > 0);
        (*record).refs -= 1;
        (*record).refs
    };
    if remaining == 0 {
        let description = symbol_description(heap, cp);
        value::free_value_if_not_object(heap, description);
        let ptr = heap.decompress(cp);
        heap.pool_free(ptr);
    }
}
