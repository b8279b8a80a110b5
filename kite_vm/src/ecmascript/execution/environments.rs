// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lexical environments.
//!
//! Environments reuse the object record shape. A declarative environment
//! keeps its bindings in the ordinary property store: a writable slot is a
//! mutable binding, and a cleared-writable slot holding the empty value is
//! an uninitialized immutable binding. An object-bound environment stores
//! its bound object in the property-list slot and delegates every operation
//! to the object's internal methods; the outer environment is always
//! reached through the prototype link.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::execution::{Agent, ErrorKind, JsResult};
use crate::ecmascript::objects::data::{self, ObjectType};
use crate::ecmascript::objects::{internal_methods, property_storage};
use crate::ecmascript::objects::property_storage::{
    PROPERTY_FLAG_CONFIGURABLE, PROPERTY_FLAG_WRITABLE, PropertyName,
};
use crate::ecmascript::types::{PropertyDescriptor, Value, value};

/// ### [9.1.2.2 NewDeclarativeEnvironment ( E )](https://tc39.es/ecma262/#sec-newdeclarativeenvironment)
pub(crate) fn new_declarative_environment_raw(
    heap: &mut Heap,
    outer: CompressedPointer,
) -> CompressedPointer {
    data::new_plain_object(heap, ObjectType::LexEnvDeclarative, outer, false)
}

/// ### [9.1.2.3 NewObjectEnvironment ( O, W, E )](https://tc39.es/ecma262/#sec-newobjectenvironment)
pub(crate) fn new_object_environment_raw(
    heap: &mut Heap,
    bound_object: CompressedPointer,
    provide_this: bool,
    outer: CompressedPointer,
) -> CompressedPointer {
    // The provide-this flag shares the extensible bit.
    let env = data::new_plain_object(heap, ObjectType::LexEnvObjectBound, outer, provide_this);
    data::set_property_list(heap, env, bound_object);
    env
}

pub(crate) fn bound_object(heap: &Heap, env: CompressedPointer) -> CompressedPointer {
    debug_assert_eq!(data::object_type(heap, env), ObjectType::LexEnvObjectBound);
    data::property_list(heap, env)
}

fn is_declarative(heap: &Heap, env: CompressedPointer) -> bool {
    match data::object_type(heap, env) {
        ObjectType::LexEnvDeclarative => true,
        ObjectType::LexEnvObjectBound => false,
        _ => unreachable!("environment operation on a non-environment"),
    }
}

/// Binding names are strings; symbols never name bindings.
fn binding_name(agent: &mut Agent, name: Value) -> JsResult<PropertyName> {
    if !name.is_string() {
        return Err(agent.throw_type_error("Binding names must be strings."));
    }
    Ok(PropertyName::from_value(&agent.heap, name).expect("string converts to a name"))
}

/// ### [9.1.1.1.1 HasBinding ( N )](https://tc39.es/ecma262/#sec-declarative-environment-records-hasbinding-n)
pub(crate) fn has_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
) -> JsResult<bool> {
    let name = binding_name(agent, name)?;
    if is_declarative(&agent.heap, env) {
        Ok(property_storage::find_property(&agent.heap, env, name).is_some())
    } else {
        let object = bound_object(&agent.heap, env);
        internal_methods::internal_has(agent, object, name)
    }
}

/// ### [9.1.1.1.2 CreateMutableBinding ( N, D )](https://tc39.es/ecma262/#sec-declarative-environment-records-createmutablebinding-n-d)
pub(crate) fn create_mutable_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
    is_deletable: bool,
) -> JsResult<()> {
    let name = binding_name(agent, name)?;
    if is_declarative(&agent.heap, env) {
        debug_assert!(property_storage::find_property(&agent.heap, env, name).is_none());
        let mut flags = PROPERTY_FLAG_WRITABLE;
        if is_deletable {
            flags |= PROPERTY_FLAG_CONFIGURABLE;
        }
        property_storage::create_named_data_property(
            &mut agent.heap,
            env,
            name,
            flags,
            Value::UNDEFINED,
        );
        Ok(())
    } else {
        // An enumerable, writable data property on the bound object.
        let object = bound_object(&agent.heap, env);
        let descriptor = PropertyDescriptor {
            value: Some(Value::UNDEFINED),
            writable: Some(true),
            enumerable: Some(true),
            configurable: Some(is_deletable),
            get: None,
            set: None,
        };
        internal_methods::internal_define_own(agent, object, name, &descriptor)?;
        Ok(())
    }
}

/// ### [9.1.1.1.3 CreateImmutableBinding ( N, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-createimmutablebinding-n-s)
///
/// The binding starts uninitialized: a cleared-writable slot holding the
/// empty value.
pub(crate) fn create_immutable_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
) -> JsResult<()> {
    let name = binding_name(agent, name)?;
    debug_assert!(is_declarative(&agent.heap, env));
    debug_assert!(property_storage::find_property(&agent.heap, env, name).is_none());
    property_storage::create_named_data_property(&mut agent.heap, env, name, 0, Value::EMPTY);
    Ok(())
}

/// ### [9.1.1.1.4 InitializeBinding ( N, V )](https://tc39.es/ecma262/#sec-declarative-environment-records-initializebinding-n-v)
pub(crate) fn initialize_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
    new_value: Value,
) -> JsResult<()> {
    let name = binding_name(agent, name)?;
    if is_declarative(&agent.heap, env) {
        let property = property_storage::find_property(&agent.heap, env, name)
            .expect("initialization of a missing binding");
        debug_assert!(property_storage::property_value(&agent.heap, property).is_empty());
        property_storage::set_named_data_value(&mut agent.heap, property, new_value);
        Ok(())
    } else {
        let object = bound_object(&agent.heap, env);
        let receiver = Value::from_object_record(object);
        internal_methods::internal_set(agent, object, name, new_value, receiver, false)?;
        Ok(())
    }
}

/// ### [9.1.1.1.5 SetMutableBinding ( N, V, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-setmutablebinding-n-v-s)
pub(crate) fn set_mutable_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
    new_value: Value,
    is_strict: bool,
) -> JsResult<()> {
    let name_key = binding_name(agent, name)?;
    if !is_declarative(&agent.heap, env) {
        let object = bound_object(&agent.heap, env);
        let receiver = Value::from_object_record(object);
        internal_methods::internal_set(agent, object, name_key, new_value, receiver, is_strict)?;
        return Ok(());
    }

    let Some(property) = property_storage::find_property(&agent.heap, env, name_key) else {
        if is_strict {
            return Err(agent.throw(
                ErrorKind::Reference,
                "Cannot assign to a nonexisting binding.",
            ));
        }
        // Loose mode creates and initializes the binding on the fly.
        property_storage::create_named_data_property(
            &mut agent.heap,
            env,
            name_key,
            PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_CONFIGURABLE,
            new_value,
        );
        return Ok(());
    };

    if property_storage::property_value(&agent.heap, property).is_empty() {
        return Err(agent.throw(
            ErrorKind::Reference,
            "Cannot assign to an uninitialized binding.",
        ));
    }
    if property_storage::property_flags(&agent.heap, property) & PROPERTY_FLAG_WRITABLE == 0 {
        if is_strict {
            return Err(
                agent.throw_type_error("Cannot assign to an immutable binding in strict mode.")
            );
        }
        return Ok(());
    }
    property_storage::set_named_data_value(&mut agent.heap, property, new_value);
    Ok(())
}

/// ### [9.1.1.1.6 GetBindingValue ( N, S )](https://tc39.es/ecma262/#sec-declarative-environment-records-getbindingvalue-n-s)
///
/// An uninitialized immutable binding yields undefined in loose mode and a
/// ReferenceError in strict mode.
pub(crate) fn get_binding_value(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
    is_strict: bool,
) -> JsResult<Value> {
    let name_key = binding_name(agent, name)?;
    if !is_declarative(&agent.heap, env) {
        let object = bound_object(&agent.heap, env);
        let receiver = Value::from_object_record(object);
        return internal_methods::internal_get(agent, object, name_key, receiver);
    }

    let Some(property) = property_storage::find_property(&agent.heap, env, name_key) else {
        return Err(agent.throw(ErrorKind::Reference, "Binding is not defined."));
    };
    let stored = property_storage::property_value(&agent.heap, property);
    if stored.is_empty() {
        if is_strict {
            return Err(agent.throw(ErrorKind::Reference, "Binding is uninitialized."));
        }
        return Ok(Value::UNDEFINED);
    }
    Ok(value::copy_value(&mut agent.heap, stored))
}

/// ### [9.1.1.1.7 DeleteBinding ( N )](https://tc39.es/ecma262/#sec-declarative-environment-records-deletebinding-n)
pub(crate) fn delete_binding(
    agent: &mut Agent,
    env: CompressedPointer,
    name: Value,
) -> JsResult<bool> {
    let name_key = binding_name(agent, name)?;
    if !is_declarative(&agent.heap, env) {
        let object = bound_object(&agent.heap, env);
        return internal_methods::internal_delete(agent, object, name_key, false);
    }

    let Some(property) = property_storage::find_property(&agent.heap, env, name_key) else {
        return Ok(true);
    };
    if property_storage::property_flags(&agent.heap, property) & PROPERTY_FLAG_CONFIGURABLE == 0 {
        return Ok(false);
    }
    property_storage::delete_property(&mut agent.heap, env, property);
    Ok(true)
}

/// ### [9.1.1.2.10 WithBaseObject ( )](https://tc39.es/ecma262/#sec-object-environment-records-withbaseobject)
///
/// The bound object, but only from an object environment flagged to
/// provide `this`.
pub(crate) fn implicit_this_value(agent: &mut Agent, env: CompressedPointer) -> Value {
    if data::object_type(&agent.heap, env) == ObjectType::LexEnvObjectBound
        && data::provides_this(&agent.heap, env)
    {
        let object = bound_object(&agent.heap, env);
        return value::copy_value(&mut agent.heap, Value::from_object_record(object));
    }
    Value::UNDEFINED
}
