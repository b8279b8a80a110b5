// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Proxy objects.
//!
//! Each internal method looks its trap up on the handler with an ordinary
//! get, invokes it with the target prepended to the method's arguments, and
//! forwards to the target's own internal method when the trap is absent.
//! Revocation nulls both the target and the handler; every later internal
//! call raises a TypeError before touching either.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, function};
use crate::ecmascript::execution::{Agent, JsResult};
use crate::ecmascript::objects::data::{self, ObjectType, ProxyRecord};
use crate::ecmascript::objects::internal_methods;
use crate::ecmascript::objects::property_storage::PropertyName;
use crate::ecmascript::types::{MagicStringId, PropertyDescriptor, Value};

#[inline]
fn record_ptr(heap: &Heap, cp: CompressedPointer) -> *mut ProxyRecord {
    heap.deref::<ProxyRecord>(cp)
}

/// Target and handler as compressed pointers; null after revocation.
pub(crate) fn proxy_parts(
    heap: &Heap,
    cp: CompressedPointer,
) -> (CompressedPointer, CompressedPointer) {
    // SAFETY: cp references a live proxy record.
    let (target, handler) = unsafe {
        let record = record_ptr(heap, cp);
        (
            Value::from_raw((*record).target),
            Value::from_raw((*record).handler),
        )
    };
    let target_cp = if target.is_object() {
        target.heap_pointer()
    } else {
        CompressedPointer::NULL
    };
    let handler_cp = if handler.is_object() {
        handler.heap_pointer()
    } else {
        CompressedPointer::NULL
    };
    (target_cp, handler_cp)
}

/// ### [10.5.14 ProxyCreate ( target, handler )](https://tc39.es/ecma262/#sec-proxycreate)
pub(crate) fn new_proxy(agent: &mut Agent, target: Value, handler: Value) -> JsResult<Value> {
    if !target.is_object() || !handler.is_object() {
        return Err(agent.throw_type_error("Proxy target and handler must be objects."));
    }
    let ptr = agent.heap.alloc(core::mem::size_of::<ProxyRecord>());
    #[cfg(feature = "mem-stats")]
    agent
        .heap
        .allocator
        .stat_object_bytes(core::mem::size_of::<ProxyRecord>() as isize);
    let record = ptr.as_ptr() as *mut ProxyRecord;
    let cp = data::init_object_record(
        &mut agent.heap,
        record as *mut data::ObjectRecord,
        ObjectType::Proxy,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation. Target and handler are
    // object values, traced by the collector.
    unsafe {
        (*record).target = target.into_raw();
        (*record).handler = handler.into_raw();
    }
    Ok(Value::from_object_record(cp))
}

/// ### [28.2.2.1 Proxy Revocation Functions](https://tc39.es/ecma262/#sec-proxy-revocation-functions)
pub(crate) fn revoke(heap: &mut Heap, cp: CompressedPointer) {
    debug_assert_eq!(data::object_type(heap, cp), ObjectType::Proxy);
    // SAFETY: cp references a live proxy record.
    unsafe {
        let record = record_ptr(heap, cp);
        (*record).target = Value::NULL.into_raw();
        (*record).handler = Value::NULL.into_raw();
    }
}

/// The revocation guard shared by every internal method.
fn validate(agent: &mut Agent, cp: CompressedPointer) -> JsResult<(Value, Value)> {
    let (target, handler) = proxy_parts(&agent.heap, cp);
    if target.is_null() || handler.is_null() {
        return Err(agent.throw_type_error("Cannot perform an operation on a revoked Proxy."));
    }
    Ok((
        Value::from_object_record(target),
        Value::from_object_record(handler),
    ))
}

/// Look up a trap on the handler. Undefined and null mean "forward";
/// anything else must be callable.
fn get_trap(agent: &mut Agent, handler: Value, name: MagicStringId) -> JsResult<Option<Value>> {
    let trap = agent.get_property_by_magic(handler, name)?;
    if trap.is_nullish() {
        agent.free_value(trap);
        return Ok(None);
    }
    if !function::is_callable(&agent.heap, trap) {
        agent.free_value(trap);
        return Err(agent.throw_type_error("Proxy trap is not callable."));
    }
    Ok(Some(trap))
}

fn call_trap(
    agent: &mut Agent,
    trap: Value,
    handler: Value,
    args: &[Value],
) -> JsResult<Value> {
    let result = function::call(agent, trap, handler, args);
    agent.free_value(trap);
    result
}

pub(crate) fn proxy_get(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    receiver: Value,
) -> JsResult<Value> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::GET)? else {
        return internal_methods::internal_get(agent, target.heap_pointer(), name, receiver);
    };
    let key = name.to_value(&mut agent.heap);
    let result = call_trap(agent, trap, handler, &[target, key, receiver]);
    agent.free_value(key);
    result
}

pub(crate) fn proxy_set(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    new_value: Value,
    receiver: Value,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::SET)? else {
        return internal_methods::internal_set(
            agent,
            target.heap_pointer(),
            name,
            new_value,
            receiver,
            false,
        );
    };
    let key = name.to_value(&mut agent.heap);
    let result = call_trap(agent, trap, handler, &[target, key, new_value, receiver]);
    agent.free_value(key);
    let result = result?;
    let accepted = agent.to_boolean(result);
    agent.free_value(result);
    Ok(accepted)
}

pub(crate) fn proxy_has(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::HAS)? else {
        return internal_methods::internal_has(agent, target.heap_pointer(), name);
    };
    let key = name.to_value(&mut agent.heap);
    let result = call_trap(agent, trap, handler, &[target, key]);
    agent.free_value(key);
    let result = result?;
    let found = agent.to_boolean(result);
    agent.free_value(result);
    Ok(found)
}

pub(crate) fn proxy_delete(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::DELETE_PROPERTY)? else {
        return internal_methods::internal_delete(agent, target.heap_pointer(), name, false);
    };
    let key = name.to_value(&mut agent.heap);
    let result = call_trap(agent, trap, handler, &[target, key]);
    agent.free_value(key);
    let result = result?;
    let deleted = agent.to_boolean(result);
    agent.free_value(result);
    Ok(deleted)
}

pub(crate) fn proxy_define_own(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::DEFINE_PROPERTY)? else {
        return internal_methods::internal_define_own(
            agent,
            target.heap_pointer(),
            name,
            descriptor,
        );
    };
    let key = name.to_value(&mut agent.heap);
    let descriptor_object = internal_methods::descriptor_to_object(agent, descriptor);
    let result = call_trap(agent, trap, handler, &[target, key, descriptor_object]);
    agent.free_value(key);
    agent.free_value(descriptor_object);
    let result = result?;
    let accepted = agent.to_boolean(result);
    agent.free_value(result);
    Ok(accepted)
}

pub(crate) fn proxy_get_own_descriptor(
    agent: &mut Agent,
    cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<Option<PropertyDescriptor>> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::GET_OWN_PROPERTY_DESCRIPTOR)? else {
        return internal_methods::internal_get_own_descriptor(agent, target.heap_pointer(), name);
    };
    let key = name.to_value(&mut agent.heap);
    let result = call_trap(agent, trap, handler, &[target, key]);
    agent.free_value(key);
    let result = result?;
    if result.is_undefined() {
        return Ok(None);
    }
    let descriptor = internal_methods::object_to_descriptor(agent, result);
    agent.free_value(result);
    descriptor.map(Some)
}

pub(crate) fn proxy_own_keys(agent: &mut Agent, cp: CompressedPointer) -> JsResult<Vec<Value>> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::OWN_KEYS)? else {
        return internal_methods::internal_own_keys(agent, target.heap_pointer());
    };
    let result = call_trap(agent, trap, handler, &[target])?;
    if !result.is_object() {
        agent.free_value(result);
        return Err(agent.throw_type_error("Proxy ownKeys trap must return an object."));
    }
    let length_value = agent.get_property_by_magic(result, MagicStringId::LENGTH)?;
    let length = agent.to_length(length_value)? as u32;
    agent.free_value(length_value);
    let mut keys = Vec::with_capacity(length as usize);
    for index in 0..length {
        keys.push(agent.get_property_by_index(result, index)?);
    }
    agent.free_value(result);
    Ok(keys)
}

pub(crate) fn proxy_get_prototype_of(
    agent: &mut Agent,
    cp: CompressedPointer,
) -> JsResult<Value> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::GET_PROTOTYPE_OF)? else {
        return internal_methods::internal_get_prototype_of(agent, target.heap_pointer());
    };
    let result = call_trap(agent, trap, handler, &[target])?;
    if !result.is_object() && !result.is_null() {
        agent.free_value(result);
        return Err(
            agent.throw_type_error("Proxy getPrototypeOf trap must return an object or null.")
        );
    }
    Ok(result)
}

pub(crate) fn proxy_set_prototype_of(
    agent: &mut Agent,
    cp: CompressedPointer,
    prototype: Value,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::SET_PROTOTYPE_OF)? else {
        return internal_methods::internal_set_prototype_of(
            agent,
            target.heap_pointer(),
            prototype,
        );
    };
    let result = call_trap(agent, trap, handler, &[target, prototype])?;
    let accepted = agent.to_boolean(result);
    agent.free_value(result);
    Ok(accepted)
}

pub(crate) fn proxy_is_extensible(agent: &mut Agent, cp: CompressedPointer) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::IS_EXTENSIBLE)? else {
        return internal_methods::internal_is_extensible(agent, target.heap_pointer());
    };
    let result = call_trap(agent, trap, handler, &[target])?;
    let extensible = agent.to_boolean(result);
    agent.free_value(result);
    Ok(extensible)
}

pub(crate) fn proxy_prevent_extensions(
    agent: &mut Agent,
    cp: CompressedPointer,
) -> JsResult<bool> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::PREVENT_EXTENSIONS)? else {
        return internal_methods::internal_prevent_extensions(agent, target.heap_pointer());
    };
    let result = call_trap(agent, trap, handler, &[target])?;
    let accepted = agent.to_boolean(result);
    agent.free_value(result);
    Ok(accepted)
}

/// ### [10.5.12 \[\[Call\]\] ( thisArgument, argumentsList )](https://tc39.es/ecma262/#sec-proxy-object-internal-methods-and-internal-slots-call-thisargument-argumentslist)
pub(crate) fn proxy_call(
    agent: &mut Agent,
    cp: CompressedPointer,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::APPLY)? else {
        return function::call(agent, target, this, args);
    };
    let args_array = make_arguments_array(agent, args);
    let result = call_trap(agent, trap, handler, &[target, this, args_array]);
    agent.free_value(args_array);
    result
}

/// ### [10.5.13 \[\[Construct\]\] ( argumentsList, newTarget )](https://tc39.es/ecma262/#sec-proxy-object-internal-methods-and-internal-slots-construct-argumentslist-newtarget)
pub(crate) fn proxy_construct(
    agent: &mut Agent,
    cp: CompressedPointer,
    args: &[Value],
) -> JsResult<Value> {
    let (target, handler) = validate(agent, cp)?;
    let Some(trap) = get_trap(agent, handler, MagicStringId::CONSTRUCT)? else {
        return function::construct(agent, target, args);
    };
    let args_array = make_arguments_array(agent, args);
    let proxy_value = Value::from_object_record(cp);
    let result = call_trap(agent, trap, handler, &[target, args_array, proxy_value]);
    agent.free_value(args_array);
    let result = result?;
    if !result.is_object() {
        agent.free_value(result);
        return Err(agent.throw_type_error("Proxy construct trap must return an object."));
    }
    Ok(result)
}

fn make_arguments_array(agent: &mut Agent, args: &[Value]) -> Value {
    let array_cp = array::new_array(&mut agent.heap, args.len() as u32);
    for (index, arg) in args.iter().enumerate() {
        let _ = array::set_element(agent, array_cp, index as u32, *arg);
    }
    Value::from_object_record(array_cp)
}

impl Agent {
    /// Create a proxy over `(target, handler)`.
    pub fn create_proxy(&mut self, target: Value, handler: Value) -> JsResult<Value> {
        new_proxy(self, target, handler)
    }

    /// Revoke a proxy: all later internal operations raise a TypeError.
    pub fn revoke_proxy(&mut self, proxy: Value) -> JsResult<()> {
        let cp = self.expect_object(proxy)?;
        if data::object_type(&self.heap, cp) != ObjectType::Proxy {
            return Err(self.throw_type_error("Expected a Proxy."));
        }
        // The record never owned references to target or handler; they are
        // traced links, so nulling them is the whole revocation.
        revoke(&mut self.heap, cp);
        Ok(())
    }

    pub fn is_proxy(&self, v: Value) -> bool {
        v.is_object() && data::object_type(&self.heap, v.heap_pointer()) == ObjectType::Proxy
    }
}
