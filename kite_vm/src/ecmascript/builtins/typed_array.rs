// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed arrays: integer-indexed views over an array buffer.
//!
//! Element access computes `buffer + byte_offset + (index << shift[kind])`;
//! the getter, setter and shift tables are indexed by the element kind so a
//! view never branches on anything but its kind byte. Stores coerce through
//! the kind-specific conversion (truncate-to-uint32 for the integer kinds,
//! round-ties-even with saturation for uint8-clamped, precision loss only
//! for the float kinds).

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::array_buffer;
use crate::ecmascript::execution::{Agent, ErrorKind, JsResult};
use crate::ecmascript::objects::data::{self, ObjectType, TypedArrayRecord};
use crate::ecmascript::objects::internal_methods::{self, OwnProperty};
use crate::ecmascript::objects::property_storage::{self, PropertyName};
use crate::ecmascript::types::{MagicStringId, PropertyDescriptor, Value, number};

/// The element kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TypedArrayKind {
    Int8 = 0,
    Uint8 = 1,
    Uint8Clamped = 2,
    Int16 = 3,
    Uint16 = 4,
    Int32 = 5,
    Uint32 = 6,
    Float32 = 7,
    Float64 = 8,
}

impl TypedArrayKind {
    pub(crate) fn from_bits(bits: u8) -> TypedArrayKind {
        match bits {
            0 => TypedArrayKind::Int8,
            1 => TypedArrayKind::Uint8,
            2 => TypedArrayKind::Uint8Clamped,
            3 => TypedArrayKind::Int16,
            4 => TypedArrayKind::Uint16,
            5 => TypedArrayKind::Int32,
            6 => TypedArrayKind::Uint32,
            7 => TypedArrayKind::Float32,
            8 => TypedArrayKind::Float64,
            _ => unreachable!("corrupt typed array kind"),
        }
    }

    /// log2 of the element size.
    #[inline]
    pub fn shift(self) -> u32 {
        SHIFT_TABLE[self as usize] as u32
    }

    #[inline]
    pub fn element_size(self) -> u32 {
        1 << self.shift()
    }
}

/// Element size shifts, indexed by kind.
static SHIFT_TABLE: [u8; 9] = [0, 0, 0, 1, 1, 2, 2, 2, 3];

/// Native-endian element readers, indexed by kind.
static GETTER_TABLE: [fn(&[u8]) -> f64; 9] = [
    |b| b[0] as i8 as f64,
    |b| b[0] as f64,
    |b| b[0] as f64,
    |b| i16::from_ne_bytes([b[0], b[1]]) as f64,
    |b| u16::from_ne_bytes([b[0], b[1]]) as f64,
    |b| i32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
    |b| u32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
    |b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]) as f64,
    |b| f64::from_ne_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]),
];

/// Coercing element writers, indexed by kind.
static SETTER_TABLE: [fn(&mut [u8], f64); 9] = [
    |b, v| b[0] = number::number_to_uint32(v) as u8,
    |b, v| b[0] = number::number_to_uint32(v) as u8,
    |b, v| b[0] = clamp_uint8(v),
    |b, v| b[..2].copy_from_slice(&(number::number_to_uint32(v) as u16).to_ne_bytes()),
    |b, v| b[..2].copy_from_slice(&(number::number_to_uint32(v) as u16).to_ne_bytes()),
    |b, v| b[..4].copy_from_slice(&number::number_to_uint32(v).to_ne_bytes()),
    |b, v| b[..4].copy_from_slice(&number::number_to_uint32(v).to_ne_bytes()),
    |b, v| b[..4].copy_from_slice(&(v as f32).to_ne_bytes()),
    |b, v| b[..8].copy_from_slice(&v.to_ne_bytes()),
];

/// ### [7.1.11 ToUint8Clamp ( argument )](https://tc39.es/ecma262/#sec-touint8clamp)
fn clamp_uint8(v: f64) -> u8 {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    if v >= 255.0 {
        return 255;
    }
    v.round_ties_even() as u8
}

/// The view covers a sub-range of its buffer; only then are the record's
/// `(byte_offset, array_length)` extension fields consulted.
const FLAG_HAS_EXTENSION: u8 = 1 << 0;

#[inline]
fn record_ptr(heap: &Heap, cp: CompressedPointer) -> *mut TypedArrayRecord {
    heap.deref::<TypedArrayRecord>(cp)
}

pub(crate) fn kind_of(heap: &Heap, cp: CompressedPointer) -> TypedArrayKind {
    // SAFETY: cp references a live typed array record.
    TypedArrayKind::from_bits(unsafe { (*record_ptr(heap, cp)).kind })
}

pub(crate) fn buffer_of(heap: &Heap, cp: CompressedPointer) -> CompressedPointer {
    // SAFETY: cp references a live typed array record.
    CompressedPointer::from_raw(unsafe { (*record_ptr(heap, cp)).buffer_cp })
}

#[inline]
fn has_extension(heap: &Heap, cp: CompressedPointer) -> bool {
    // SAFETY: cp references a live typed array record.
    unsafe { (*record_ptr(heap, cp)).flags & FLAG_HAS_EXTENSION != 0 }
}

/// Element count. A whole-buffer view derives it from the buffer (and so
/// reads zero once the buffer is detached); a sub-range view carries it in
/// the extension fields.
pub(crate) fn length_of(heap: &Heap, cp: CompressedPointer) -> u32 {
    let buffer = buffer_of(heap, cp);
    if array_buffer::is_detached(heap, buffer) {
        return 0;
    }
    if !has_extension(heap, cp) {
        return array_buffer::byte_length(heap, buffer) >> kind_of(heap, cp).shift();
    }
    // SAFETY: cp references a live typed array record.
    unsafe { (*record_ptr(heap, cp)).array_length }
}

/// Byte offset of the view's first element; always zero without the
/// extension.
pub(crate) fn byte_offset_of(heap: &Heap, cp: CompressedPointer) -> u32 {
    if !has_extension(heap, cp) {
        return 0;
    }
    // SAFETY: cp references a live typed array record.
    unsafe { (*record_ptr(heap, cp)).byte_offset }
}

fn alloc_record(
    heap: &mut Heap,
    kind: TypedArrayKind,
    buffer: CompressedPointer,
    byte_offset: u32,
    array_length: u32,
    has_extension: bool,
) -> CompressedPointer {
    let ptr = heap.alloc(core::mem::size_of::<TypedArrayRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<TypedArrayRecord>() as isize);
    let record = ptr.as_ptr() as *mut TypedArrayRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::PseudoArray,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).kind = kind as u8;
        (*record).flags = if has_extension { FLAG_HAS_EXTENSION } else { 0 };
        (*record).buffer_cp = buffer.into_raw();
        (*record).array_length = array_length;
        (*record).byte_offset = byte_offset;
    }
    cp
}

/// Construction from a length: allocate a fresh buffer of
/// `length << shift` bytes and bind the view over all of it.
pub(crate) fn new_with_length(
    agent: &mut Agent,
    kind: TypedArrayKind,
    length: u32,
) -> JsResult<CompressedPointer> {
    let byte_length = (length as u64) << kind.shift();
    if byte_length > u32::MAX as u64 {
        return Err(agent.throw(ErrorKind::Range, "Invalid typed array length."));
    }
    let buffer = array_buffer::new_array_buffer(agent, byte_length as u32)?;
    Ok(alloc_record(&mut agent.heap, kind, buffer, 0, length, false))
}

/// Construction over an existing buffer, validating alignment, range and
/// detachment.
pub(crate) fn new_over_buffer(
    agent: &mut Agent,
    kind: TypedArrayKind,
    buffer_value: Value,
    byte_offset: u32,
    length: Option<u32>,
) -> JsResult<CompressedPointer> {
    if !array_buffer::is_array_buffer(&agent.heap, buffer_value) {
        return Err(agent.throw_type_error("Expected an ArrayBuffer."));
    }
    let buffer = buffer_value.heap_pointer();
    if array_buffer::is_detached(&agent.heap, buffer) {
        return Err(agent.throw_type_error("Cannot view a detached ArrayBuffer."));
    }
    let element_size = kind.element_size();
    if byte_offset % element_size != 0 {
        return Err(agent.throw(
            ErrorKind::Range,
            "Typed array offset is not aligned to the element size.",
        ));
    }
    let buffer_length = array_buffer::byte_length(&agent.heap, buffer);
    if byte_offset > buffer_length {
        return Err(agent.throw(ErrorKind::Range, "Typed array offset is out of range."));
    }

    let array_length = match length {
        Some(length) => {
            let byte_end = byte_offset as u64 + ((length as u64) << kind.shift());
            if byte_end > buffer_length as u64 {
                return Err(agent.throw(ErrorKind::Range, "Typed array length is out of range."));
            }
            length
        }
        None => {
            let remaining = buffer_length - byte_offset;
            if remaining % element_size != 0 {
                return Err(agent.throw(
                    ErrorKind::Range,
                    "Buffer tail does not divide into whole elements.",
                ));
            }
            remaining >> kind.shift()
        }
    };

    let has_extension = byte_offset != 0 || array_length != buffer_length >> kind.shift();
    Ok(alloc_record(
        &mut agent.heap,
        kind,
        buffer,
        byte_offset,
        array_length,
        has_extension,
    ))
}

/// Construction from another typed array: a like-length buffer, with a
/// byte copy for a same-kind source and element-wise conversion otherwise.
pub(crate) fn new_from_typed_array(
    agent: &mut Agent,
    kind: TypedArrayKind,
    source_cp: CompressedPointer,
) -> JsResult<CompressedPointer> {
    let length = length_of(&agent.heap, source_cp);
    let target_cp = new_with_length(agent, kind, length)?;
    let source_kind = kind_of(&agent.heap, source_cp);

    if source_kind == kind {
        for index in 0..length {
            let (Some(src), Some(dst)) = (
                element_ptr(&agent.heap, source_cp, index),
                element_ptr(&agent.heap, target_cp, index),
            ) else {
                break;
            };
            // SAFETY: both elements are in range of live buffers.
            unsafe {
                core::ptr::copy_nonoverlapping(src, dst, kind.element_size() as usize);
            }
        }
    } else {
        for index in 0..length {
            if let Some(element) = element_value(&agent.heap, source_cp, index) {
                store_element(&mut agent.heap, target_cp, index, element);
            }
        }
    }
    Ok(target_cp)
}

/// Construction from a list of values (the array-like / iterable path):
/// a length-N buffer filled through the coercing setter.
pub(crate) fn new_from_values(
    agent: &mut Agent,
    kind: TypedArrayKind,
    values: &[Value],
) -> JsResult<CompressedPointer> {
    let cp = new_with_length(agent, kind, values.len() as u32)?;
    for (index, element) in values.iter().enumerate() {
        let numeric = agent.to_number(*element)?;
        store_element(&mut agent.heap, cp, index as u32, numeric);
    }
    Ok(cp)
}

/// Address of an element, unless out of range or detached.
fn element_ptr(heap: &Heap, cp: CompressedPointer, index: u32) -> Option<*mut u8> {
    if index >= length_of(heap, cp) {
        return None;
    }
    let buffer = buffer_of(heap, cp);
    let base = array_buffer::bytes_ptr(heap, buffer)?;
    let kind = kind_of(heap, cp);
    let offset = byte_offset_of(heap, cp) as usize + ((index as usize) << kind.shift());
    // SAFETY: range-checked against the view length above.
    Some(unsafe { base.add(offset) })
}

/// Numeric value of an element through the kind's getter.
pub(crate) fn element_value(heap: &Heap, cp: CompressedPointer, index: u32) -> Option<f64> {
    let ptr = element_ptr(heap, cp, index)?;
    let kind = kind_of(heap, cp);
    // SAFETY: ptr covers element_size bytes inside the buffer.
    let bytes =
        unsafe { core::slice::from_raw_parts(ptr, kind.element_size() as usize) };
    Some(GETTER_TABLE[kind as usize](bytes))
}

/// Store a numeric value through the kind's coercing setter. Out-of-range
/// stores are ignored.
pub(crate) fn store_element(heap: &mut Heap, cp: CompressedPointer, index: u32, value: f64) {
    let Some(ptr) = element_ptr(heap, cp, index) else {
        return;
    };
    let kind = kind_of(heap, cp);
    // SAFETY: ptr covers element_size bytes inside the buffer.
    let bytes =
        unsafe { core::slice::from_raw_parts_mut(ptr, kind.element_size() as usize) };
    SETTER_TABLE[kind as usize](bytes, value);
}

/// Virtual own properties: in-range indices and the read-only length.
pub(crate) fn typed_array_own_property(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> Option<OwnProperty> {
    match name {
        PropertyName::Index(index) => {
            let element = element_value(&agent.heap, cp, index)?;
            Some(OwnProperty::Data {
                value: number::new_number(&mut agent.heap, element),
                writable: true,
                enumerable: true,
                configurable: false,
            })
        }
        PropertyName::Magic(MagicStringId::LENGTH) => {
            let length = length_of(&agent.heap, cp);
            Some(OwnProperty::Data {
                value: internal_methods::length_value(agent, length),
                writable: false,
                enumerable: false,
                configurable: false,
            })
        }
        _ => None,
    }
}

/// The typed-array arm of \[\[Set\]\]. Integer-indexed stores coerce and
/// never throw; out-of-range stores are absorbed.
pub(crate) fn typed_array_set(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    new_value: Value,
) -> JsResult<Option<bool>> {
    match name {
        PropertyName::Index(index) => {
            let numeric = agent.to_number(new_value)?;
            store_element(&mut agent.heap, cp, index, numeric);
            Ok(Some(true))
        }
        PropertyName::Magic(MagicStringId::LENGTH) => Ok(Some(false)),
        _ => Ok(None),
    }
}

/// ### [10.4.5.3 \[\[DefineOwnProperty\]\] ( P, Desc )](https://tc39.es/ecma262/#sec-integer-indexed-exotic-objects-defineownproperty-p-desc)
/// for the integer-indexed part.
pub(crate) fn typed_array_define_own(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) -> JsResult<Option<bool>> {
    match name {
        PropertyName::Index(index) => {
            if index >= length_of(&agent.heap, cp)
                || descriptor.is_accessor_descriptor()
                || descriptor.configurable == Some(true)
                || descriptor.writable == Some(false)
                || descriptor.enumerable == Some(false)
            {
                return Ok(Some(false));
            }
            if let Some(value) = descriptor.value {
                let numeric = agent.to_number(value)?;
                store_element(&mut agent.heap, cp, index, numeric);
            }
            Ok(Some(true))
        }
        PropertyName::Magic(MagicStringId::LENGTH) => Ok(Some(false)),
        _ => Ok(None),
    }
}

/// Own keys: the in-range indices, then length, then stored keys.
pub(crate) fn typed_array_own_keys(heap: &Heap, cp: CompressedPointer) -> Vec<PropertyName> {
    let length = length_of(heap, cp);
    let mut names: Vec<PropertyName> =
        (0..length).map(PropertyName::Index).collect();
    names.push(PropertyName::Magic(MagicStringId::LENGTH));
    names.extend(
        property_storage::own_property_names(heap, cp)
            .into_iter()
            .filter(|name| !matches!(name, PropertyName::Index(_))),
    );
    names
}

impl Agent {
    /// Construct a typed array over a fresh buffer of `length` elements.
    pub fn create_typed_array(&mut self, kind: TypedArrayKind, length: u32) -> JsResult<Value> {
        Ok(Value::from_object_record(new_with_length(self, kind, length)?))
    }

    /// Construct a typed array viewing an existing buffer.
    pub fn create_typed_array_over_buffer(
        &mut self,
        kind: TypedArrayKind,
        buffer: Value,
        byte_offset: u32,
        length: Option<u32>,
    ) -> JsResult<Value> {
        Ok(Value::from_object_record(new_over_buffer(
            self,
            kind,
            buffer,
            byte_offset,
            length,
        )?))
    }

    /// Construct a typed array converted element-wise from another.
    pub fn create_typed_array_from_typed_array(
        &mut self,
        kind: TypedArrayKind,
        source: Value,
    ) -> JsResult<Value> {
        let source_cp = self.expect_typed_array(source)?;
        Ok(Value::from_object_record(new_from_typed_array(
            self, kind, source_cp,
        )?))
    }

    /// Construct a typed array from a list of values, coercing each through
    /// the element setter.
    pub fn create_typed_array_from_values(
        &mut self,
        kind: TypedArrayKind,
        values: &[Value],
    ) -> JsResult<Value> {
        Ok(Value::from_object_record(new_from_values(self, kind, values)?))
    }

    pub fn typed_array_kind(&mut self, typed_array: Value) -> JsResult<TypedArrayKind> {
        let cp = self.expect_typed_array(typed_array)?;
        Ok(kind_of(&self.heap, cp))
    }

    pub fn typed_array_length(&mut self, typed_array: Value) -> JsResult<u32> {
        let cp = self.expect_typed_array(typed_array)?;
        Ok(length_of(&self.heap, cp))
    }

    /// The backing ArrayBuffer; owned by the caller.
    pub fn typed_array_buffer(&mut self, typed_array: Value) -> JsResult<Value> {
        let cp = self.expect_typed_array(typed_array)?;
        let buffer = buffer_of(&self.heap, cp);
        Ok(self.copy_value(Value::from_object_record(buffer)))
    }

    /// Element read through the kind getter; None when out of range or
    /// detached.
    pub fn typed_array_element(&mut self, typed_array: Value, index: u32) -> JsResult<Option<f64>> {
        let cp = self.expect_typed_array(typed_array)?;
        Ok(element_value(&self.heap, cp, index))
    }

    /// Element store through the kind's coercing setter.
    pub fn typed_array_store(
        &mut self,
        typed_array: Value,
        index: u32,
        value: f64,
    ) -> JsResult<()> {
        let cp = self.expect_typed_array(typed_array)?;
        store_element(&mut self.heap, cp, index, value);
        Ok(())
    }

    fn expect_typed_array(&mut self, v: Value) -> JsResult<CompressedPointer> {
        let cp = self.expect_object(v)?;
        if data::object_type(&self.heap, cp) != ObjectType::PseudoArray {
            return Err(self.throw_type_error("Expected a typed array."));
        }
        Ok(cp)
    }
}
