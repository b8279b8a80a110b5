// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, JsResult, Options, PropertyDescriptor, Value};

#[test]
fn set_get_has_delete_round_trip() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let key = agent.create_string("answer");
    let stored = agent.create_number(42.0);

    assert!(agent.set_property(object, key, stored).unwrap());
    assert!(agent.has_property(object, key).unwrap());

    let read = agent.get_property(object, key).unwrap();
    assert_eq!(agent.number_value(read), 42.0);
    agent.free_value(read);

    assert!(agent.delete_property(object, key).unwrap());
    assert!(!agent.has_property(object, key).unwrap());
    let missing = agent.get_property(object, key).unwrap();
    assert!(missing.is_undefined());

    for v in [object, key, stored, missing] {
        agent.free_value(v);
    }
}

#[test]
fn own_keys_order_indices_first_then_insertion_order() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();

    for name in ["zeta", "10", "alpha", "2"] {
        let key = agent.create_string(name);
        let marker = agent.create_number(1.0);
        agent.set_property(object, key, marker).unwrap();
        agent.free_value(key);
        agent.free_value(marker);
    }

    let keys = agent.own_keys(object).unwrap();
    let names: Vec<String> = keys.iter().map(|key| agent.string_value(*key)).collect();
    assert_eq!(names, ["2", "10", "zeta", "alpha"]);

    for key in keys {
        agent.free_value(key);
    }
    agent.free_value(object);
}

#[test]
fn properties_resolve_through_the_prototype_chain() {
    let mut agent = Agent::new(Options::default());
    let proto = agent.create_object();
    let object = agent.create_object();
    agent.set_prototype(object, proto).unwrap();

    let key = agent.create_string("inherited");
    let stored = agent.create_number(5.0);
    agent.set_property(proto, key, stored).unwrap();

    let read = agent.get_property(object, key).unwrap();
    assert_eq!(agent.number_value(read), 5.0);
    assert!(agent.has_property(object, key).unwrap());

    // Own keys see only own properties.
    let keys = agent.own_keys(object).unwrap();
    assert!(keys.is_empty());

    // Shadowing creates an own property without touching the prototype.
    let shadow = agent.create_number(6.0);
    agent.set_property(object, key, shadow).unwrap();
    let proto_read = agent.get_property(proto, key).unwrap();
    assert_eq!(agent.number_value(proto_read), 5.0);

    for v in [proto, object, key, stored, read, shadow, proto_read] {
        agent.free_value(v);
    }
}

#[test]
fn non_writable_and_non_configurable_attributes_hold() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let key = agent.create_string("locked");
    let stored = agent.create_number(1.0);

    let descriptor = PropertyDescriptor::new_data(stored, false, true, false);
    assert!(agent.define_own_property(object, key, &descriptor).unwrap());

    let replacement = agent.create_number(2.0);
    assert!(!agent.set_property(object, key, replacement).unwrap());
    assert!(!agent.delete_property(object, key).unwrap());

    let read = agent.get_property(object, key).unwrap();
    assert_eq!(agent.number_value(read), 1.0);

    // Redefining with the same value is allowed; changing it is not.
    let same = PropertyDescriptor::new_data(stored, false, true, false);
    assert!(agent.define_own_property(object, key, &same).unwrap());
    let changed = PropertyDescriptor::new_data(replacement, false, true, false);
    assert!(!agent.define_own_property(object, key, &changed).unwrap());

    for v in [object, key, stored, replacement, read] {
        agent.free_value(v);
    }
}

#[test]
fn prevent_extensions_blocks_new_properties_only() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let key = agent.create_string("present");
    let stored = agent.create_number(1.0);
    agent.set_property(object, key, stored).unwrap();

    assert!(agent.is_extensible(object).unwrap());
    assert!(agent.prevent_extensions(object).unwrap());
    assert!(!agent.is_extensible(object).unwrap());

    let new_key = agent.create_string("fresh");
    let rejected = agent.create_number(2.0);
    assert!(!agent.set_property(object, new_key, rejected).unwrap());

    // Existing properties stay writable.
    let update = agent.create_number(3.0);
    assert!(agent.set_property(object, key, update).unwrap());

    for v in [object, key, stored, new_key, rejected, update] {
        agent.free_value(v);
    }
}

fn get_seven(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(agent.create_number(7.0))
}

fn store_arg(agent: &mut Agent, this: Value, args: &[Value]) -> JsResult<Value> {
    let key = agent.create_string("stored");
    agent.set_property(this, key, args[0])?;
    agent.free_value(key);
    Ok(Value::UNDEFINED)
}

#[test]
fn accessor_properties_invoke_their_getter_and_setter() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let key = agent.create_string("virtual");
    let getter = agent.create_external_function(get_seven);
    let setter = agent.create_external_function(store_arg);

    let descriptor = PropertyDescriptor::new_accessor(getter, setter, true, true);
    assert!(agent.define_own_property(object, key, &descriptor).unwrap());

    let read = agent.get_property(object, key).unwrap();
    assert_eq!(agent.number_value(read), 7.0);

    let written = agent.create_number(12.0);
    assert!(agent.set_property(object, key, written).unwrap());
    let stored_key = agent.create_string("stored");
    let observed = agent.get_property(object, stored_key).unwrap();
    assert_eq!(agent.number_value(observed), 12.0);

    let descriptor = agent.get_own_property_descriptor(object, key).unwrap().unwrap();
    assert!(descriptor.get.is_some());
    assert!(descriptor.value.is_none());
    if let Some(get) = descriptor.get {
        agent.free_value(get);
    }
    if let Some(set) = descriptor.set {
        agent.free_value(set);
    }

    for v in [object, key, getter, setter, read, written, stored_key, observed] {
        agent.free_value(v);
    }
}

#[test]
fn thousand_properties_survive_mass_deletion() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();

    // Well past the hashmap threshold.
    for index in 0..1000u32 {
        let key = agent.create_string(&format!("property_{index}"));
        let stored = agent.create_number(index as f64);
        assert!(agent.set_property(object, key, stored).unwrap());
        agent.free_value(key);
        agent.free_value(stored);
    }

    // Delete 900, driving the tombstone field far past the rebuild ratio.
    for index in 0..900u32 {
        let key = agent.create_string(&format!("property_{index}"));
        assert!(agent.delete_property(object, key).unwrap());
        agent.free_value(key);
    }

    // Every survivor is still findable with its original value, and every
    // deleted name is gone.
    for index in 0..1000u32 {
        let key = agent.create_string(&format!("property_{index}"));
        let found = agent.get_property(object, key).unwrap();
        if index < 900 {
            assert!(found.is_undefined(), "property_{index} should be deleted");
        } else {
            assert_eq!(agent.number_value(found), index as f64);
        }
        agent.free_value(key);
        agent.free_value(found);
    }

    let keys = agent.own_keys(object).unwrap();
    assert_eq!(keys.len(), 100);
    for key in keys {
        agent.free_value(key);
    }
    agent.free_value(object);
}

#[test]
fn numeric_keys_normalize_across_representations() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let stored = agent.create_number(9.0);

    // Store through a numeric key, read through its canonical string.
    agent.set_property_by_index(object, 70000, stored).unwrap();
    let string_key = agent.create_string("70000");
    let read = agent.get_property(object, string_key).unwrap();
    assert_eq!(agent.number_value(read), 9.0);

    // Non-canonical spellings are distinct keys.
    let padded = agent.create_string("070000");
    let missing = agent.get_property(object, padded).unwrap();
    assert!(missing.is_undefined());

    for v in [object, stored, string_key, read, padded, missing] {
        agent.free_value(v);
    }
}
