// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, MagicStringId, Options, PropertyDescriptor, Value};

fn array_length(agent: &mut Agent, array: Value) -> f64 {
    let length = agent.get_property_by_magic(array, MagicStringId::LENGTH).unwrap();
    let result = agent.number_value(length);
    agent.free_value(length);
    result
}

#[test]
fn construction_round_trips_element_values() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(0);

    let values = [1.5, -7.0, 0.0, 1e300];
    for (index, value) in values.iter().enumerate() {
        let element = agent.create_number(*value);
        assert!(agent.set_property_by_index(array, index as u32, element).unwrap());
        agent.free_value(element);
    }

    assert_eq!(array_length(&mut agent, array), values.len() as f64);
    for (index, expected) in values.iter().enumerate() {
        let element = agent.get_property_by_index(array, index as u32).unwrap();
        assert_eq!(agent.number_value(element), *expected);
        agent.free_value(element);
    }
    agent.free_value(array);
}

#[test]
fn sparse_store_past_the_hole_ceiling_converts_and_preserves_elements() {
    let mut agent = Agent::new(Options::default());
    // let a = new Array(5000); a[4999] = 1; a[0] = 2;
    let array = agent.create_array(5000);

    let one = agent.create_number(1.0);
    let two = agent.create_number(2.0);
    let three = agent.create_number(3.0);
    assert!(agent.set_property_by_index(array, 4999, one).unwrap());
    assert!(agent.set_property_by_index(array, 0, two).unwrap());
    assert_eq!(array_length(&mut agent, array), 5000.0);

    // a[10000000] = 3 adds ten million holes in one store: the flat layout
    // must give way, with every element preserved.
    assert!(agent.set_property_by_index(array, 10_000_000, three).unwrap());
    assert_eq!(array_length(&mut agent, array), 10_000_001.0);

    for (index, expected) in [(0u32, 2.0), (4999, 1.0), (10_000_000, 3.0)] {
        let element = agent.get_property_by_index(array, index).unwrap();
        assert_eq!(agent.number_value(element), expected, "a[{index}]");
        agent.free_value(element);
    }
    // Holes read as undefined.
    let hole = agent.get_property_by_index(array, 1234).unwrap();
    assert!(hole.is_undefined());

    for v in [array, one, two, three, hole] {
        agent.free_value(v);
    }
}

#[test]
fn deleting_elements_leaves_holes() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(3);
    for index in 0..3u32 {
        let element = agent.create_number(index as f64);
        agent.set_property_by_index(array, index, element).unwrap();
        agent.free_value(element);
    }

    let key = agent.create_string("1");
    assert!(agent.delete_property(array, key).unwrap());
    agent.free_value(key);

    assert_eq!(array_length(&mut agent, array), 3.0);
    let hole = agent.get_property_by_index(array, 1).unwrap();
    assert!(hole.is_undefined());

    let keys = agent.own_keys(array).unwrap();
    let names: Vec<String> = keys.iter().map(|key| agent.string_value(*key)).collect();
    assert_eq!(names, ["0", "2", "length"]);
    for key in keys {
        agent.free_value(key);
    }

    agent.free_value(hole);
    agent.free_value(array);
}

#[test]
fn shrinking_length_releases_the_tail() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(0);
    for index in 0..10u32 {
        let element = agent.create_string(&format!("element number {index} on the heap"));
        agent.set_property_by_index(array, index, element).unwrap();
        agent.free_value(element);
    }

    let new_length = agent.create_number(3.0);
    let length_key = agent.create_string("length");
    assert!(agent.set_property(array, length_key, new_length).unwrap());
    assert_eq!(array_length(&mut agent, array), 3.0);

    let kept = agent.get_property_by_index(array, 2).unwrap();
    assert!(kept.is_string());
    let dropped = agent.get_property_by_index(array, 5).unwrap();
    assert!(dropped.is_undefined());

    // Growing through length appends holes.
    let grown = agent.create_number(6.0);
    assert!(agent.set_property(array, length_key, grown).unwrap());
    assert_eq!(array_length(&mut agent, array), 6.0);
    let hole = agent.get_property_by_index(array, 5).unwrap();
    assert!(hole.is_undefined());

    for v in [array, new_length, length_key, kept, dropped, grown, hole] {
        agent.free_value(v);
    }
}

#[test]
fn invalid_lengths_raise_range_errors() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(0);
    let length_key = agent.create_string("length");

    let bad = agent.create_number(1.5);
    let error = agent.set_property(array, length_key, bad).unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(payload.is_object(), true);
    agent.free_value(payload);

    let negative = agent.create_number(-1.0);
    assert!(agent.set_property(array, length_key, negative).is_err());

    for v in [array, length_key, bad, negative] {
        agent.free_value(v);
    }
}

#[test]
fn length_can_be_made_read_only() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(2);
    let length_key = agent.create_string("length");

    let descriptor = PropertyDescriptor {
        writable: Some(false),
        ..PropertyDescriptor::default()
    };
    assert!(agent.define_own_property(array, length_key, &descriptor).unwrap());

    // Writes to length are rejected, and appends past it too.
    let longer = agent.create_number(10.0);
    assert!(!agent.set_property(array, length_key, longer).unwrap());
    let element = agent.create_number(1.0);
    assert!(!agent.set_property_by_index(array, 5, element).unwrap());
    assert_eq!(array_length(&mut agent, array), 2.0);

    // In-range stores still work.
    assert!(agent.set_property_by_index(array, 0, element).unwrap());

    for v in [array, length_key, longer, element] {
        agent.free_value(v);
    }
}

#[test]
fn defining_an_accessor_element_forces_the_normal_layout() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(4);
    let element = agent.create_number(11.0);
    agent.set_property_by_index(array, 0, element).unwrap();

    // A non-default attribute set cannot live in the flat buffer.
    let frozen = agent.create_number(12.0);
    let key = agent.create_string("1");
    let descriptor = PropertyDescriptor::new_data(frozen, false, true, false);
    assert!(agent.define_own_property(array, key, &descriptor).unwrap());

    let read = agent.get_property_by_index(array, 0).unwrap();
    assert_eq!(agent.number_value(read), 11.0);
    let locked = agent.get_property_by_index(array, 1).unwrap();
    assert_eq!(agent.number_value(locked), 12.0);
    let replacement = agent.create_number(13.0);
    assert!(!agent.set_property_by_index(array, 1, replacement).unwrap());

    for v in [array, element, frozen, key, read, locked, replacement] {
        agent.free_value(v);
    }
}
