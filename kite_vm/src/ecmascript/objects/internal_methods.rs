// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The internal methods of objects.
//!
//! Every operation dispatches on the object's type tag first: proxies route
//! to their trap machinery, arrays and typed arrays overlay their virtual
//! properties, and everything else falls through to the ordinary property
//! store semantics of
//! [10.1 Ordinary Object Internal Methods](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots).

use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, function, proxy, typed_array};
use crate::ecmascript::execution::{Agent, JsResult};
use crate::ecmascript::objects::data::{self, ClassId, ObjectType};
use crate::ecmascript::objects::property_storage::{
    self, PROPERTY_FLAG_CONFIGURABLE, PROPERTY_FLAG_ENUMERABLE, PROPERTY_FLAG_WRITABLE,
    PROPERTY_KIND_NAMED_ACCESSOR, PROPERTY_KIND_NAMED_DATA, PropertyName,
};
use crate::ecmascript::types::{MagicStringId, PropertyDescriptor, Value, number, value};

/// A resolved own property. `Data.value` is owned by the receiver of the
/// query; accessor pointers are traced heap links and carry no reference.
pub(crate) enum OwnProperty {
    Data {
        value: Value,
        writable: bool,
        enumerable: bool,
        configurable: bool,
    },
    Accessor {
        getter: CompressedPointer,
        setter: CompressedPointer,
        enumerable: bool,
        configurable: bool,
    },
}

/// Resolve an own property, including the virtual properties of the
/// specialized layouts. Proxies are handled by the callers so that the trap
/// result can flow through untouched.
pub(crate) fn get_own_property(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<Option<OwnProperty>> {
    debug_assert_ne!(data::object_type(&agent.heap, object_cp), ObjectType::Proxy);

    match data::object_type(&agent.heap, object_cp) {
        ObjectType::Array => {
            if let Some(own) = array::array_own_property(agent, object_cp, name) {
                return Ok(Some(own));
            }
            if array::is_fast_array(&agent.heap, object_cp) {
                return Ok(None);
            }
        }
        ObjectType::PseudoArray => {
            if let Some(own) = typed_array::typed_array_own_property(agent, object_cp, name) {
                return Ok(Some(own));
            }
            if matches!(name, PropertyName::Index(_)) {
                // Out-of-range indices are absent, never stored.
                return Ok(None);
            }
        }
        _ => {}
    }

    let Some(property) = property_storage::find_property(&agent.heap, object_cp, name) else {
        return Ok(None);
    };
    Ok(Some(own_property_from_ref(agent, property)))
}

pub(crate) fn own_property_from_ref(
    agent: &mut Agent,
    property: property_storage::PropertyRef,
) -> OwnProperty {
    let flags = property_storage::property_flags(&agent.heap, property);
    match property_storage::property_kind(&agent.heap, property) {
        PROPERTY_KIND_NAMED_DATA => {
            let stored = property_storage::property_value(&agent.heap, property);
            OwnProperty::Data {
                value: value::copy_value(&mut agent.heap, stored),
                writable: flags & PROPERTY_FLAG_WRITABLE != 0,
                enumerable: flags & PROPERTY_FLAG_ENUMERABLE != 0,
                configurable: flags & PROPERTY_FLAG_CONFIGURABLE != 0,
            }
        }
        PROPERTY_KIND_NAMED_ACCESSOR => {
            let (getter, setter) = property_storage::property_accessors(&agent.heap, property);
            OwnProperty::Accessor {
                getter,
                setter,
                enumerable: flags & PROPERTY_FLAG_ENUMERABLE != 0,
                configurable: flags & PROPERTY_FLAG_CONFIGURABLE != 0,
            }
        }
        _ => unreachable!("internal properties are not own properties"),
    }
}

/// ### [10.1.8 \[\[Get\]\] ( P, Receiver )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-get-p-receiver)
pub(crate) fn internal_get(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    receiver: Value,
) -> JsResult<Value> {
    let mut current = object_cp;
    loop {
        if data::object_type(&agent.heap, current) == ObjectType::Proxy {
            return proxy::proxy_get(agent, current, name, receiver);
        }
        match get_own_property(agent, current, name)? {
            Some(OwnProperty::Data { value, .. }) => return Ok(value),
            Some(OwnProperty::Accessor { getter, .. }) => {
                if getter.is_null() {
                    return Ok(Value::UNDEFINED);
                }
                return function::call(
                    agent,
                    Value::from_object_record(getter),
                    receiver,
                    &[],
                );
            }
            None => {
                let proto = data::prototype_of(&agent.heap, current);
                if proto.is_null() {
                    return Ok(Value::UNDEFINED);
                }
                current = proto;
            }
        }
    }
}

/// ### [10.1.9 \[\[Set\]\] ( P, V, Receiver )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-set-p-v-receiver)
///
/// The receiver is the object itself; the engine core does not re-route
/// sets through foreign receivers.
pub(crate) fn internal_set(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    new_value: Value,
    receiver: Value,
    throw_on_error: bool,
) -> JsResult<bool> {
    match data::object_type(&agent.heap, object_cp) {
        ObjectType::Proxy => {
            return proxy::proxy_set(agent, object_cp, name, new_value, receiver);
        }
        ObjectType::Array => {
            if let Some(result) = array::array_set(agent, object_cp, name, new_value)? {
                return reject_or(agent, result, throw_on_error, "Cannot write array property.");
            }
        }
        ObjectType::PseudoArray => {
            if let Some(result) = typed_array::typed_array_set(agent, object_cp, name, new_value)? {
                return Ok(result);
            }
        }
        _ => {}
    }

    // Own property first.
    if let Some(property) = property_storage::find_property(&agent.heap, object_cp, name) {
        match property_storage::property_kind(&agent.heap, property) {
            PROPERTY_KIND_NAMED_DATA => {
                if property_storage::property_flags(&agent.heap, property)
                    & PROPERTY_FLAG_WRITABLE
                    == 0
                {
                    return reject_or(
                        agent,
                        false,
                        throw_on_error,
                        "Cannot assign to read-only property.",
                    );
                }
                property_storage::set_named_data_value(&mut agent.heap, property, new_value);
                return Ok(true);
            }
            PROPERTY_KIND_NAMED_ACCESSOR => {
                return call_setter(agent, property, new_value, receiver, throw_on_error);
            }
            _ => {}
        }
    }

    // Walk the prototype chain for blocking accessors and read-only data
    // properties.
    let mut current = data::prototype_of(&agent.heap, object_cp);
    while !current.is_null() {
        if data::object_type(&agent.heap, current) == ObjectType::Proxy {
            return proxy::proxy_set(agent, current, name, new_value, receiver);
        }
        if let Some(property) = property_storage::find_property(&agent.heap, current, name) {
            match property_storage::property_kind(&agent.heap, property) {
                PROPERTY_KIND_NAMED_ACCESSOR => {
                    return call_setter(agent, property, new_value, receiver, throw_on_error);
                }
                PROPERTY_KIND_NAMED_DATA => {
                    if property_storage::property_flags(&agent.heap, property)
                        & PROPERTY_FLAG_WRITABLE
                        == 0
                    {
                        return reject_or(
                            agent,
                            false,
                            throw_on_error,
                            "Cannot assign over an inherited read-only property.",
                        );
                    }
                    break;
                }
                _ => {}
            }
        }
        current = data::prototype_of(&agent.heap, current);
    }

    // CreateDataProperty on the object itself.
    if !data::is_extensible(&agent.heap, object_cp) {
        return reject_or(
            agent,
            false,
            throw_on_error,
            "Cannot add a property to a non-extensible object.",
        );
    }
    property_storage::create_named_data_property(
        &mut agent.heap,
        object_cp,
        name,
        PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_ENUMERABLE | PROPERTY_FLAG_CONFIGURABLE,
        new_value,
    );
    Ok(true)
}

/// Route a store through an accessor slot's setter. Shared with the array
/// path, which resolves its own slots.
pub(crate) fn set_through_accessor(
    agent: &mut Agent,
    property: property_storage::PropertyRef,
    new_value: Value,
    receiver: Value,
) -> JsResult<bool> {
    call_setter(agent, property, new_value, receiver, false)
}

fn call_setter(
    agent: &mut Agent,
    property: property_storage::PropertyRef,
    new_value: Value,
    receiver: Value,
    throw_on_error: bool,
) -> JsResult<bool> {
    let (_, setter) = property_storage::property_accessors(&agent.heap, property);
    if setter.is_null() {
        return reject_or(
            agent,
            false,
            throw_on_error,
            "Cannot assign to a property with no setter.",
        );
    }
    let result = function::call(
        agent,
        Value::from_object_record(setter),
        receiver,
        &[new_value],
    )?;
    agent.free_value(result);
    Ok(true)
}

fn reject_or(
    agent: &mut Agent,
    result: bool,
    throw_on_error: bool,
    message: &str,
) -> JsResult<bool> {
    if !result && throw_on_error {
        return Err(agent.throw_type_error(message));
    }
    Ok(result)
}

/// ### [10.1.7 \[\[HasProperty\]\] ( P )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-hasproperty-p)
pub(crate) fn internal_has(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<bool> {
    let mut current = object_cp;
    loop {
        if data::object_type(&agent.heap, current) == ObjectType::Proxy {
            return proxy::proxy_has(agent, current, name);
        }
        match get_own_property(agent, current, name)? {
            Some(own) => {
                free_own_property(agent, own);
                return Ok(true);
            }
            None => {
                let proto = data::prototype_of(&agent.heap, current);
                if proto.is_null() {
                    return Ok(false);
                }
                current = proto;
            }
        }
    }
}

pub(crate) fn free_own_property(agent: &mut Agent, own: OwnProperty) {
    if let OwnProperty::Data { value, .. } = own {
        agent.free_value(value);
    }
}

/// ### [10.1.10 \[\[Delete\]\] ( P )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-delete-p)
pub(crate) fn internal_delete(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    throw_on_error: bool,
) -> JsResult<bool> {
    match data::object_type(&agent.heap, object_cp) {
        ObjectType::Proxy => return proxy::proxy_delete(agent, object_cp, name),
        ObjectType::Array => {
            if let Some(result) = array::array_delete(agent, object_cp, name) {
                return reject_or(agent, result, throw_on_error, "Cannot delete array property.");
            }
        }
        ObjectType::PseudoArray => {
            if let PropertyName::Index(_) = name {
                // Integer-indexed properties of typed arrays are
                // non-configurable.
                return reject_or(
                    agent,
                    false,
                    throw_on_error,
                    "Cannot delete a typed array element.",
                );
            }
        }
        _ => {}
    }

    let Some(property) = property_storage::find_property(&agent.heap, object_cp, name) else {
        return Ok(true);
    };
    if property_storage::property_flags(&agent.heap, property) & PROPERTY_FLAG_CONFIGURABLE == 0 {
        return reject_or(
            agent,
            false,
            throw_on_error,
            "Cannot delete a non-configurable property.",
        );
    }
    property_storage::delete_property(&mut agent.heap, object_cp, property);
    Ok(true)
}

/// ### [10.1.6.3 ValidateAndApplyPropertyDescriptor](https://tc39.es/ecma262/#sec-validateandapplypropertydescriptor)
/// applied to the ordinary property store.
pub(crate) fn internal_define_own(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) -> JsResult<bool> {
    if !descriptor.is_coherent() {
        return Err(agent.throw_type_error(
            "Property descriptors cannot mix data and accessor attributes.",
        ));
    }

    match data::object_type(&agent.heap, object_cp) {
        ObjectType::Proxy => {
            return proxy::proxy_define_own(agent, object_cp, name, descriptor);
        }
        ObjectType::Array => {
            if let Some(result) = array::array_define_own(agent, object_cp, name, descriptor)? {
                return Ok(result);
            }
        }
        ObjectType::PseudoArray => {
            if let Some(result) =
                typed_array::typed_array_define_own(agent, object_cp, name, descriptor)?
            {
                return Ok(result);
            }
        }
        _ => {}
    }

    define_own_in_storage(agent, object_cp, name, descriptor)
}

pub(crate) fn define_own_in_storage(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) -> JsResult<bool> {
    let existing = property_storage::find_property(&agent.heap, object_cp, name);

    let Some(property) = existing else {
        if !data::is_extensible(&agent.heap, object_cp) {
            return Ok(false);
        }
        create_from_descriptor(agent, object_cp, name, descriptor);
        return Ok(true);
    };

    let flags = property_storage::property_flags(&agent.heap, property);
    let configurable = flags & PROPERTY_FLAG_CONFIGURABLE != 0;
    let is_data = property_storage::property_kind(&agent.heap, property)
        == PROPERTY_KIND_NAMED_DATA;

    if !configurable {
        if descriptor.configurable == Some(true) {
            return Ok(false);
        }
        if let Some(enumerable) = descriptor.enumerable {
            if enumerable != (flags & PROPERTY_FLAG_ENUMERABLE != 0) {
                return Ok(false);
            }
        }
        if descriptor.is_accessor_descriptor() != !is_data
            && (descriptor.is_accessor_descriptor() || descriptor.is_data_descriptor())
        {
            return Ok(false);
        }
        if is_data {
            let writable = flags & PROPERTY_FLAG_WRITABLE != 0;
            if !writable {
                if descriptor.writable == Some(true) {
                    return Ok(false);
                }
                if let Some(new_value) = descriptor.value {
                    let current = property_storage::property_value(&agent.heap, property);
                    if !value::same_value(&agent.heap, current, new_value) {
                        return Ok(false);
                    }
                }
            }
        } else if let Some(own) = get_own_property(agent, object_cp, name)? {
            if let OwnProperty::Accessor { getter, setter, .. } = own {
                let same_get = descriptor
                    .get
                    .map_or(true, |g| accessor_matches(g, getter));
                let same_set = descriptor
                    .set
                    .map_or(true, |s| accessor_matches(s, setter));
                if !same_get || !same_set {
                    return Ok(false);
                }
            } else {
                free_own_property(agent, own);
            }
        }
    }

    // Apply in place: the slot keeps its name, hashmap entry and
    // enumeration position.
    let merged = merge_descriptor_defaults(descriptor, flags, is_data);
    apply_to_slot(agent, property, &merged, is_data);
    Ok(true)
}

/// Rewrite an existing slot from a merged descriptor.
fn apply_to_slot(
    agent: &mut Agent,
    property: property_storage::PropertyRef,
    merged: &PropertyDescriptor,
    was_data: bool,
) {
    let mut flags = 0u8;
    if merged.enumerable == Some(true) {
        flags |= PROPERTY_FLAG_ENUMERABLE;
    }
    if merged.configurable == Some(true) {
        flags |= PROPERTY_FLAG_CONFIGURABLE;
    }

    let becomes_accessor =
        merged.is_accessor_descriptor() || (!was_data && !merged.is_data_descriptor());

    if becomes_accessor {
        let (old_getter, old_setter) = if was_data {
            let old = property_storage::property_value(&agent.heap, property);
            value::free_value_if_not_object(&mut agent.heap, old);
            (CompressedPointer::NULL, CompressedPointer::NULL)
        } else {
            property_storage::property_accessors(&agent.heap, property)
        };
        // Unspecified accessor halves keep their current target.
        let getter = match merged.get {
            Some(g) if g.is_object() => g.heap_pointer(),
            Some(_) => CompressedPointer::NULL,
            None => old_getter,
        };
        let setter = match merged.set {
            Some(s) if s.is_object() => s.heap_pointer(),
            Some(_) => CompressedPointer::NULL,
            None => old_setter,
        };
        property_storage::rewrite_slot_preserving_name(
            &mut agent.heap,
            property,
            property_storage::PROPERTY_KIND_NAMED_ACCESSOR | flags,
            property_storage::pack_accessors(getter, setter),
        );
    } else {
        if merged.writable == Some(true) {
            flags |= PROPERTY_FLAG_WRITABLE;
        }
        let raw = match merged.value {
            Some(new_value) => {
                if was_data {
                    let old = property_storage::property_value(&agent.heap, property);
                    value::free_value_if_not_object(&mut agent.heap, old);
                }
                value::copy_value_if_not_object(&mut agent.heap, new_value).into_raw()
            }
            None if was_data => property_storage::property_raw_value(&agent.heap, property),
            None => Value::UNDEFINED.into_raw(),
        };
        property_storage::rewrite_slot_preserving_name(
            &mut agent.heap,
            property,
            PROPERTY_KIND_NAMED_DATA | flags,
            raw,
        );
    }
}

fn accessor_matches(descriptor_value: Value, stored: CompressedPointer) -> bool {
    if descriptor_value.is_object() {
        descriptor_value.heap_pointer() == stored
    } else {
        stored.is_null()
    }
}

/// Fill unspecified attributes from the current property state (or the
/// defaults for a fresh property).
fn merge_descriptor_defaults(
    descriptor: &PropertyDescriptor,
    current_flags: u8,
    was_data: bool,
) -> PropertyDescriptor {
    let mut merged = *descriptor;
    if merged.enumerable.is_none() {
        merged.enumerable = Some(current_flags & PROPERTY_FLAG_ENUMERABLE != 0);
    }
    if merged.configurable.is_none() {
        merged.configurable = Some(current_flags & PROPERTY_FLAG_CONFIGURABLE != 0);
    }
    if was_data && !merged.is_accessor_descriptor() && merged.writable.is_none() {
        merged.writable = Some(current_flags & PROPERTY_FLAG_WRITABLE != 0);
    }
    merged
}

fn create_from_descriptor(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
    descriptor: &PropertyDescriptor,
) {
    let mut flags = 0u8;
    if descriptor.enumerable == Some(true) {
        flags |= PROPERTY_FLAG_ENUMERABLE;
    }
    if descriptor.configurable == Some(true) {
        flags |= PROPERTY_FLAG_CONFIGURABLE;
    }

    if descriptor.is_accessor_descriptor() {
        let getter = descriptor
            .get
            .filter(|g| g.is_object())
            .map_or(CompressedPointer::NULL, |g| g.heap_pointer());
        let setter = descriptor
            .set
            .filter(|s| s.is_object())
            .map_or(CompressedPointer::NULL, |s| s.heap_pointer());
        property_storage::create_named_accessor_property(
            &mut agent.heap,
            object_cp,
            name,
            flags,
            getter,
            setter,
        );
    } else {
        if descriptor.writable == Some(true) {
            flags |= PROPERTY_FLAG_WRITABLE;
        }
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            name,
            flags,
            descriptor.value.unwrap_or(Value::UNDEFINED),
        );
    }
}

/// ### [10.1.5 \[\[GetOwnProperty\]\] ( P )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-getownproperty-p)
/// as a descriptor record.
pub(crate) fn internal_get_own_descriptor(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    name: PropertyName,
) -> JsResult<Option<PropertyDescriptor>> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_get_own_descriptor(agent, object_cp, name);
    }
    let Some(own) = get_own_property(agent, object_cp, name)? else {
        return Ok(None);
    };
    Ok(Some(descriptor_from_own_property(agent, own)))
}

pub(crate) fn descriptor_from_own_property(
    agent: &mut Agent,
    own: OwnProperty,
) -> PropertyDescriptor {
    match own {
        OwnProperty::Data {
            value,
            writable,
            enumerable,
            configurable,
        } => PropertyDescriptor::new_data(value, writable, enumerable, configurable),
        OwnProperty::Accessor {
            getter,
            setter,
            enumerable,
            configurable,
        } => {
            let get = if getter.is_null() {
                Value::UNDEFINED
            } else {
                value::copy_value(&mut agent.heap, Value::from_object_record(getter))
            };
            let set = if setter.is_null() {
                Value::UNDEFINED
            } else {
                value::copy_value(&mut agent.heap, Value::from_object_record(setter))
            };
            PropertyDescriptor::new_accessor(get, set, enumerable, configurable)
        }
    }
}

/// ### [10.1.11 \[\[OwnPropertyKeys\]\] ( )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-ownpropertykeys)
pub(crate) fn internal_own_keys(
    agent: &mut Agent,
    object_cp: CompressedPointer,
) -> JsResult<Vec<Value>> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_own_keys(agent, object_cp);
    }

    let names = match data::object_type(&agent.heap, object_cp) {
        ObjectType::Array => array::array_own_keys(&agent.heap, object_cp),
        ObjectType::PseudoArray => typed_array::typed_array_own_keys(&agent.heap, object_cp),
        _ => property_storage::own_property_names(&agent.heap, object_cp),
    };
    Ok(names
        .into_iter()
        .map(|name| name.to_value(&mut agent.heap))
        .collect())
}

/// ### [10.1.1 \[\[GetPrototypeOf\]\] ( )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-getprototypeof)
pub(crate) fn internal_get_prototype_of(
    agent: &mut Agent,
    object_cp: CompressedPointer,
) -> JsResult<Value> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_get_prototype_of(agent, object_cp);
    }
    let proto = data::prototype_of(&agent.heap, object_cp);
    if proto.is_null() {
        Ok(Value::NULL)
    } else {
        Ok(value::copy_value(
            &mut agent.heap,
            Value::from_object_record(proto),
        ))
    }
}

/// ### [10.1.2 \[\[SetPrototypeOf\]\] ( V )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-setprototypeof-v)
pub(crate) fn internal_set_prototype_of(
    agent: &mut Agent,
    object_cp: CompressedPointer,
    prototype: Value,
) -> JsResult<bool> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_set_prototype_of(agent, object_cp, prototype);
    }
    if !prototype.is_object() && !prototype.is_null() {
        return Err(agent.throw_type_error("Prototype must be an object or null."));
    }
    let new_proto = if prototype.is_object() {
        prototype.heap_pointer()
    } else {
        CompressedPointer::NULL
    };
    if new_proto == data::prototype_of(&agent.heap, object_cp) {
        return Ok(true);
    }
    if !data::is_extensible(&agent.heap, object_cp) {
        return Ok(false);
    }
    // Reject prototype cycles.
    let mut current = new_proto;
    while !current.is_null() {
        if current == object_cp {
            return Ok(false);
        }
        if data::object_type(&agent.heap, current) == ObjectType::Proxy {
            break;
        }
        current = data::prototype_of(&agent.heap, current);
    }
    data::set_prototype(&mut agent.heap, object_cp, new_proto);
    Ok(true)
}

/// ### [10.1.3 \[\[IsExtensible\]\] ( )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-isextensible)
pub(crate) fn internal_is_extensible(
    agent: &mut Agent,
    object_cp: CompressedPointer,
) -> JsResult<bool> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_is_extensible(agent, object_cp);
    }
    Ok(data::is_extensible(&agent.heap, object_cp))
}

/// ### [10.1.4 \[\[PreventExtensions\]\] ( )](https://tc39.es/ecma262/#sec-ordinary-object-internal-methods-and-internal-slots-preventextensions)
pub(crate) fn internal_prevent_extensions(
    agent: &mut Agent,
    object_cp: CompressedPointer,
) -> JsResult<bool> {
    if data::object_type(&agent.heap, object_cp) == ObjectType::Proxy {
        return proxy::proxy_prevent_extensions(agent, object_cp);
    }
    data::set_extensible(&mut agent.heap, object_cp, false);
    Ok(true)
}

/// ### [7.1.1 ToPrimitive ( input [ , preferredType ] )](https://tc39.es/ecma262/#sec-toprimitive)
/// with the number hint.
pub(crate) fn to_primitive_number(agent: &mut Agent, input: Value) -> JsResult<Value> {
    ordinary_to_primitive(agent, input, [MagicStringId::VALUE_OF, MagicStringId::TO_STRING])
}

/// ToPrimitive with the string hint.
pub(crate) fn to_primitive_string(agent: &mut Agent, input: Value) -> JsResult<Value> {
    ordinary_to_primitive(agent, input, [MagicStringId::TO_STRING, MagicStringId::VALUE_OF])
}

/// ### [7.1.1.1 OrdinaryToPrimitive ( O, hint )](https://tc39.es/ecma262/#sec-ordinarytoprimitive)
fn ordinary_to_primitive(
    agent: &mut Agent,
    input: Value,
    method_order: [MagicStringId; 2],
) -> JsResult<Value> {
    debug_assert!(input.is_object());
    for method_name in method_order {
        let method = agent.get_property_by_magic(input, method_name)?;
        if function::is_callable(&agent.heap, method) {
            let result = function::call(agent, method, input, &[]);
            agent.free_value(method);
            let result = result?;
            if !result.is_object() {
                return Ok(result);
            }
            agent.free_value(result);
        } else {
            agent.free_value(method);
        }
    }

    // Wrapper classes fall back to their primitive payload even without
    // callable conversion methods (the builtin bodies live outside the
    // core).
    let cp = input.heap_pointer();
    if data::object_type(&agent.heap, cp) == ObjectType::Class {
        let payload = Value::from_raw(data::class_value(&agent.heap, cp));
        match data::class_id(&agent.heap, cp) {
            ClassId::String | ClassId::Number | ClassId::Boolean | ClassId::BigInt => {
                return Ok(value::copy_value(&mut agent.heap, payload));
            }
            _ => {}
        }
    }
    Err(agent.throw_type_error("Cannot convert object to a primitive value."))
}

/// Convert a descriptor record to an ordinary object, for proxy traps.
pub(crate) fn descriptor_to_object(
    agent: &mut Agent,
    descriptor: &PropertyDescriptor,
) -> Value {
    let object = agent.create_object();
    let object_cp = object.heap_pointer();
    let all = PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_ENUMERABLE | PROPERTY_FLAG_CONFIGURABLE;
    if let Some(v) = descriptor.value {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::VALUE),
            all,
            v,
        );
    }
    if let Some(writable) = descriptor.writable {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::WRITABLE),
            all,
            Value::from_boolean(writable),
        );
    }
    if let Some(get) = descriptor.get {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::GET),
            all,
            get,
        );
    }
    if let Some(set) = descriptor.set {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::SET),
            all,
            set,
        );
    }
    if let Some(enumerable) = descriptor.enumerable {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::ENUMERABLE),
            all,
            Value::from_boolean(enumerable),
        );
    }
    if let Some(configurable) = descriptor.configurable {
        property_storage::create_named_data_property(
            &mut agent.heap,
            object_cp,
            PropertyName::Magic(MagicStringId::CONFIGURABLE),
            all,
            Value::from_boolean(configurable),
        );
    }
    object
}

/// ### [6.2.6.5 ToPropertyDescriptor ( Obj )](https://tc39.es/ecma262/#sec-topropertydescriptor)
///
/// The returned descriptor's value/get/set fields are owned by the caller.
pub(crate) fn object_to_descriptor(
    agent: &mut Agent,
    object: Value,
) -> JsResult<PropertyDescriptor> {
    if !object.is_object() {
        return Err(agent.throw_type_error("Property descriptor must be an object."));
    }
    let mut descriptor = PropertyDescriptor::default();

    let fields = [
        MagicStringId::VALUE,
        MagicStringId::WRITABLE,
        MagicStringId::ENUMERABLE,
        MagicStringId::CONFIGURABLE,
        MagicStringId::GET,
        MagicStringId::SET,
    ];
    for field in fields {
        let object_cp = object.heap_pointer();
        let has = internal_has(agent, object_cp, PropertyName::Magic(field))?;
        if !has {
            continue;
        }
        let field_value = agent.get_property_by_magic(object, field)?;
        match field {
            MagicStringId::VALUE => descriptor.value = Some(field_value),
            MagicStringId::WRITABLE => {
                descriptor.writable = Some(agent.to_boolean(field_value));
                agent.free_value(field_value);
            }
            MagicStringId::ENUMERABLE => {
                descriptor.enumerable = Some(agent.to_boolean(field_value));
                agent.free_value(field_value);
            }
            MagicStringId::CONFIGURABLE => {
                descriptor.configurable = Some(agent.to_boolean(field_value));
                agent.free_value(field_value);
            }
            MagicStringId::GET | MagicStringId::SET => {
                if !field_value.is_undefined()
                    && !function::is_callable(&agent.heap, field_value)
                {
                    agent.free_value(field_value);
                    return Err(
                        agent.throw_type_error("Accessor must be callable or undefined.")
                    );
                }
                if field == MagicStringId::GET {
                    descriptor.get = Some(field_value);
                } else {
                    descriptor.set = Some(field_value);
                }
            }
            _ => unreachable!(),
        }
    }

    if !descriptor.is_coherent() {
        return Err(agent.throw_type_error(
            "Property descriptors cannot mix data and accessor attributes.",
        ));
    }
    Ok(descriptor)
}

/// Helper shared by number/array paths: the numeric value of `length`-like
/// u32 fields as a value word.
pub(crate) fn length_value(agent: &mut Agent, length: u32) -> Value {
    number::new_number(&mut agent.heap, length as f64)
}
