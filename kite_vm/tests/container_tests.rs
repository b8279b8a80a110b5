// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, IteratorKind, Options, Value};

fn drain_keys(agent: &mut Agent, container: Value) -> Vec<String> {
    let iterator = agent
        .create_container_iterator(container, IteratorKind::Keys)
        .unwrap();
    let mut keys = Vec::new();
    while let Some(key) = agent.iterator_step(iterator).unwrap() {
        keys.push(agent.string_value(key));
        agent.free_value(key);
    }
    agent.free_value(iterator);
    keys
}

#[test]
fn map_keeps_insertion_order_across_updates_and_deletes() {
    let mut agent = Agent::new(Options::default());
    let map = agent.create_map();

    // set 'a', 'b', 'c', then 'a' again; delete 'b'.
    for name in ["a", "b", "c", "a"] {
        let key = agent.create_string(name);
        let stored = agent.create_number(name.len() as f64);
        agent.map_set(map, key, stored).unwrap();
        agent.free_value(key);
        agent.free_value(stored);
    }
    let b = agent.create_string("b");
    assert!(agent.container_delete(map, b).unwrap());
    agent.free_value(b);

    assert_eq!(drain_keys(&mut agent, map), ["a", "c"]);
    assert_eq!(agent.container_size(map).unwrap(), 2);
    agent.free_value(map);
}

#[test]
fn delete_is_idempotent_and_size_returns_to_baseline() {
    let mut agent = Agent::new(Options::default());
    let map = agent.create_map();
    let before = agent.container_size(map).unwrap();

    let key = agent.create_string("ephemeral");
    let stored = agent.create_number(1.0);
    agent.map_set(map, key, stored).unwrap();
    assert_eq!(agent.container_size(map).unwrap(), before + 1);

    assert!(agent.container_delete(map, key).unwrap());
    // The second delete reports absent.
    assert!(!agent.container_delete(map, key).unwrap());
    assert_eq!(agent.container_size(map).unwrap(), before);

    for v in [map, key, stored] {
        agent.free_value(v);
    }
}

#[test]
fn keys_compare_with_same_value_zero() {
    let mut agent = Agent::new(Options::default());
    let map = agent.create_map();

    let negative_zero = agent.create_number(-0.0);
    let positive_zero = agent.create_number(0.0);
    let marker = agent.create_number(9.0);
    agent.map_set(map, negative_zero, marker).unwrap();

    // -0 was normalized on insertion; +0 finds the same entry.
    let found = agent.map_get(map, positive_zero).unwrap();
    assert_eq!(agent.number_value(found), 9.0);
    assert!(agent.container_has(map, positive_zero).unwrap());

    // NaN is equal to itself under SameValueZero.
    let nan_a = agent.create_number(f64::NAN);
    let nan_b = agent.create_number(f64::NAN);
    let set = agent.create_set();
    agent.set_add(set, nan_a).unwrap();
    assert!(agent.container_has(set, nan_b).unwrap());
    assert_eq!(agent.container_size(set).unwrap(), 1);

    for v in [map, negative_zero, positive_zero, marker, found, nan_a, nan_b, set] {
        agent.free_value(v);
    }
}

#[test]
fn map_values_and_entries_iterators() {
    let mut agent = Agent::new(Options::default());
    let map = agent.create_map();
    for (name, number) in [("x", 1.0), ("y", 2.0)] {
        let key = agent.create_string(name);
        let stored = agent.create_number(number);
        agent.map_set(map, key, stored).unwrap();
        agent.free_value(key);
        agent.free_value(stored);
    }

    let iterator = agent
        .create_container_iterator(map, IteratorKind::Values)
        .unwrap();
    let mut values = Vec::new();
    while let Some(v) = agent.iterator_step(iterator).unwrap() {
        values.push(agent.number_value(v));
        agent.free_value(v);
    }
    assert_eq!(values, [1.0, 2.0]);
    agent.free_value(iterator);

    let iterator = agent
        .create_container_iterator(map, IteratorKind::Entries)
        .unwrap();
    let entry = agent.iterator_step(iterator).unwrap().unwrap();
    // An entry is a two-element array [key, value].
    let key = agent.get_property_by_index(entry, 0).unwrap();
    let value = agent.get_property_by_index(entry, 1).unwrap();
    assert_eq!(agent.string_value(key), "x");
    assert_eq!(agent.number_value(value), 1.0);

    for v in [map, iterator, entry, key, value] {
        agent.free_value(v);
    }
}

#[test]
fn set_iteration_skips_deleted_entries_mid_walk() {
    let mut agent = Agent::new(Options::default());
    let set = agent.create_set();
    for name in ["one", "two", "three"] {
        let element = agent.create_string(name);
        agent.set_add(set, element).unwrap();
        agent.free_value(element);
    }

    let iterator = agent
        .create_container_iterator(set, IteratorKind::Values)
        .unwrap();
    let first = agent.iterator_step(iterator).unwrap().unwrap();
    assert_eq!(agent.string_value(first), "one");

    // Delete an entry the iterator has not reached yet; the in-place empty
    // sentinel keeps the remaining order stable.
    let two = agent.create_string("two");
    agent.container_delete(set, two).unwrap();
    let next = agent.iterator_step(iterator).unwrap().unwrap();
    assert_eq!(agent.string_value(next), "three");
    assert!(agent.iterator_step(iterator).unwrap().is_none());

    for v in [set, iterator, first, two, next] {
        agent.free_value(v);
    }
}

#[test]
fn weak_containers_reject_primitive_keys() {
    let mut agent = Agent::new(Options::default());
    let weak_map = agent.create_weak_map();
    let key = agent.create_string("not an object");
    let stored = agent.create_number(1.0);
    assert!(agent.map_set(weak_map, key, stored).is_err());

    let weak_set = agent.create_weak_set();
    let number = agent.create_number(3.0);
    assert!(agent.set_add(weak_set, number).is_err());

    for v in [weak_map, key, stored, weak_set, number] {
        agent.free_value(v);
    }
}

#[test]
fn weak_map_entries_die_with_their_keys() {
    let mut agent = Agent::new(Options::default());
    let weak_map = agent.create_weak_map();

    let key = agent.create_object();
    let stored = agent.create_number(5.0);
    agent.map_set(weak_map, key, stored).unwrap();
    agent.free_value(stored);
    assert_eq!(agent.container_size(weak_map).unwrap(), 1);

    // While the key is reachable a collection changes nothing.
    agent.gc();
    assert_eq!(agent.container_size(weak_map).unwrap(), 1);
    assert!(agent.container_has(weak_map, key).unwrap());

    // Drop the last external reference; the next full collection finalizes
    // the key and removes the entry.
    agent.free_value(key);
    agent.gc();
    assert_eq!(agent.container_size(weak_map).unwrap(), 0);

    agent.free_value(weak_map);
}

#[test]
fn weak_set_membership_does_not_pin_entries() {
    let mut agent = Agent::new(Options::default());
    let weak_set = agent.create_weak_set();

    let keeper = agent.create_object();
    let transient = agent.create_object();
    agent.set_add(weak_set, keeper).unwrap();
    agent.set_add(weak_set, transient).unwrap();
    assert_eq!(agent.container_size(weak_set).unwrap(), 2);

    agent.free_value(transient);
    agent.gc();
    assert_eq!(agent.container_size(weak_set).unwrap(), 1);
    assert!(agent.container_has(weak_set, keeper).unwrap());

    agent.free_value(keeper);
    agent.free_value(weak_set);
}

#[test]
fn array_iterators_walk_indices_values_and_entries() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(0);
    for (index, value) in [10.0, 20.0].iter().enumerate() {
        let element = agent.create_number(*value);
        agent.set_property_by_index(array, index as u32, element).unwrap();
        agent.free_value(element);
    }

    let iterator = agent
        .create_array_iterator(array, IteratorKind::Values)
        .unwrap();
    let mut seen = Vec::new();
    while let Some(v) = agent.iterator_step(iterator).unwrap() {
        seen.push(agent.number_value(v));
        agent.free_value(v);
    }
    assert_eq!(seen, [10.0, 20.0]);
    agent.free_value(iterator);

    let iterator = agent
        .create_array_iterator(array, IteratorKind::Keys)
        .unwrap();
    let first = agent.iterator_step(iterator).unwrap().unwrap();
    assert_eq!(agent.number_value(first), 0.0);

    for v in [array, iterator, first] {
        agent.free_value(v);
    }
}
