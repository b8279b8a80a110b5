// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ArrayBuffer objects: a class object whose hidden value points at a
//! zero-initialized byte block. Detaching frees the block and zeroes the
//! length while the object itself stays addressable, so outstanding views
//! observe length zero instead of dangling.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::execution::{Agent, ErrorKind, JsResult};
use crate::ecmascript::objects::data::{self, ClassId, ObjectType};
use crate::ecmascript::types::Value;

/// Detached flag in the class record's extra byte.
const EXTRA_DETACHED: u8 = 1 << 0;

/// Header of the byte block; the data follows it.
#[repr(C)]
struct BufferData {
    byte_length: u32,
    _padding: u32,
}

const DATA_HEADER_SIZE: usize = core::mem::size_of::<BufferData>();

/// Create an array buffer of `byte_length` zero bytes.
pub(crate) fn new_array_buffer(
    agent: &mut Agent,
    byte_length: u32,
) -> JsResult<CompressedPointer> {
    let data_cp = if byte_length == 0 {
        CompressedPointer::NULL
    } else {
        let Some(ptr) = agent.heap.try_alloc(DATA_HEADER_SIZE + byte_length as usize) else {
            return Err(agent.throw(ErrorKind::Range, "Array buffer allocation failed."));
        };
        // SAFETY: a fresh block of header + byte_length bytes.
        unsafe {
            core::ptr::write_bytes(ptr.as_ptr(), 0, DATA_HEADER_SIZE + byte_length as usize);
            ptr.cast::<BufferData>().write(BufferData {
                byte_length,
                _padding: 0,
            });
        }
        agent.heap.compress(ptr)
    };

    Ok(data::new_class_object(
        &mut agent.heap,
        CompressedPointer::NULL,
        ClassId::ArrayBuffer,
        0,
        data_cp.into_raw() as u32,
    ))
}

pub(crate) fn is_array_buffer(heap: &Heap, v: Value) -> bool {
    v.is_object()
        && data::object_type(heap, v.heap_pointer()) == ObjectType::Class
        && data::class_id(heap, v.heap_pointer()) == ClassId::ArrayBuffer
}

pub(crate) fn is_detached(heap: &Heap, cp: CompressedPointer) -> bool {
    data::class_extra(heap, cp) & EXTRA_DETACHED != 0
}

fn data_cp(heap: &Heap, cp: CompressedPointer) -> CompressedPointer {
    CompressedPointer::from_raw(data::class_value(heap, cp) as u16)
}

/// Byte length of the buffer; zero once detached.
pub(crate) fn byte_length(heap: &Heap, cp: CompressedPointer) -> u32 {
    let data_cp = data_cp(heap, cp);
    if is_detached(heap, cp) || data_cp.is_null() {
        return 0;
    }
    // SAFETY: the data block is live while the buffer is not detached.
    unsafe { (*heap.deref::<BufferData>(data_cp)).byte_length }
}

/// Base pointer of the buffer's bytes, unless empty or detached.
pub(crate) fn bytes_ptr(heap: &Heap, cp: CompressedPointer) -> Option<*mut u8> {
    let data_cp = data_cp(heap, cp);
    if is_detached(heap, cp) || data_cp.is_null() {
        return None;
    }
    // SAFETY: the data block is live; its bytes follow the header.
    Some(unsafe { heap.decompress(data_cp).as_ptr().add(DATA_HEADER_SIZE) })
}

/// Detach the buffer: free the block, zero the length, keep the record.
pub(crate) fn detach(heap: &mut Heap, cp: CompressedPointer) {
    if is_detached(heap, cp) {
        return;
    }
    free_data_block(heap, cp);
    data::set_class_extra(heap, cp, data::class_extra(heap, cp) | EXTRA_DETACHED);
}

/// Sweep-time finalizer.
pub(crate) fn finalize(heap: &mut Heap, cp: CompressedPointer) {
    free_data_block(heap, cp);
}

fn free_data_block(heap: &mut Heap, cp: CompressedPointer) {
    let block = data_cp(heap, cp);
    if block.is_null() {
        return;
    }
    // SAFETY: the block header is live.
    let size = unsafe { (*heap.deref::<BufferData>(block)).byte_length } as usize;
    let ptr = heap.decompress(block);
    heap.free_block(ptr, DATA_HEADER_SIZE + size);
    data::set_class_value(heap, cp, CompressedPointer::NULL.into_raw() as u32);
}

impl Agent {
    /// Create an ArrayBuffer of zeroed bytes.
    pub fn create_array_buffer(&mut self, byte_length: u32) -> JsResult<Value> {
        Ok(Value::from_object_record(new_array_buffer(self, byte_length)?))
    }

    pub fn is_array_buffer(&self, v: Value) -> bool {
        is_array_buffer(&self.heap, v)
    }

    /// Byte length; zero once detached.
    pub fn array_buffer_byte_length(&mut self, buffer: Value) -> JsResult<u32> {
        let cp = self.expect_array_buffer(buffer)?;
        Ok(byte_length(&self.heap, cp))
    }

    /// Detach the buffer: outstanding views become length zero.
    pub fn detach_array_buffer(&mut self, buffer: Value) -> JsResult<()> {
        let cp = self.expect_array_buffer(buffer)?;
        detach(&mut self.heap, cp);
        Ok(())
    }

    fn expect_array_buffer(&mut self, v: Value) -> JsResult<CompressedPointer> {
        if !is_array_buffer(&self.heap, v) {
            return Err(self.throw_type_error("Expected an ArrayBuffer."));
        }
        Ok(v.heap_pointer())
    }
}
