// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, ErrorKind, Options};

#[test]
fn declarative_bindings_follow_the_mutable_life_cycle() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let name = agent.create_string("x");

    assert!(!agent.has_binding(env, name).unwrap());
    agent.create_mutable_binding(env, name, true).unwrap();
    assert!(agent.has_binding(env, name).unwrap());

    let stored = agent.create_number(3.0);
    agent.set_mutable_binding(env, name, stored, true).unwrap();
    let read = agent.get_binding_value(env, name, true).unwrap();
    assert_eq!(agent.number_value(read), 3.0);

    assert!(agent.delete_binding(env, name).unwrap());
    assert!(!agent.has_binding(env, name).unwrap());

    for v in [name, stored, read] {
        agent.free_value(v);
    }
    agent.free_environment(env);
}

#[test]
fn uninitialized_immutable_bindings_differ_by_strictness() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let name = agent.create_string("frozen");
    agent.create_immutable_binding(env, name).unwrap();

    // Loose read of the uninitialized binding yields undefined.
    let loose = agent.get_binding_value(env, name, false).unwrap();
    assert!(loose.is_undefined());

    // Strict read raises a ReferenceError.
    let error = agent.get_binding_value(env, name, true).unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::Reference));
    agent.free_value(payload);

    // Initialization makes the value readable in both modes.
    let stored = agent.create_number(1.0);
    agent.initialize_binding(env, name, stored).unwrap();
    let read = agent.get_binding_value(env, name, true).unwrap();
    assert_eq!(agent.number_value(read), 1.0);

    // Assignment to the immutable binding TypeErrors under strict mode and
    // is ignored in loose mode.
    let other = agent.create_number(2.0);
    let error = agent.set_mutable_binding(env, name, other, true).unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::Type));
    agent.free_value(payload);
    agent.set_mutable_binding(env, name, other, false).unwrap();
    let unchanged = agent.get_binding_value(env, name, true).unwrap();
    assert_eq!(agent.number_value(unchanged), 1.0);

    // Immutable bindings are not deletable.
    assert!(!agent.delete_binding(env, name).unwrap());

    for v in [name, loose, stored, read, other, unchanged] {
        agent.free_value(v);
    }
    agent.free_environment(env);
}

#[test]
fn strict_assignment_to_a_missing_binding_reference_errors() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let name = agent.create_string("ghost");
    let stored = agent.create_number(1.0);

    let error = agent.set_mutable_binding(env, name, stored, true).unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::Reference));
    agent.free_value(payload);

    // Loose mode creates the binding on the fly.
    agent.set_mutable_binding(env, name, stored, false).unwrap();
    let read = agent.get_binding_value(env, name, false).unwrap();
    assert_eq!(agent.number_value(read), 1.0);

    for v in [name, stored, read] {
        agent.free_value(v);
    }
    agent.free_environment(env);
}

#[test]
fn object_environments_delegate_to_their_bound_object() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let env = agent.new_object_environment(object, false, None).unwrap();
    let name = agent.create_string("shared");

    // Properties of the object are visible as bindings...
    let stored = agent.create_number(4.0);
    agent.set_property(object, name, stored).unwrap();
    assert!(agent.has_binding(env, name).unwrap());
    let read = agent.get_binding_value(env, name, false).unwrap();
    assert_eq!(agent.number_value(read), 4.0);

    // ...and bindings write back as properties.
    let replaced = agent.create_number(5.0);
    agent.set_mutable_binding(env, name, replaced, false).unwrap();
    let observed = agent.get_property(object, name).unwrap();
    assert_eq!(agent.number_value(observed), 5.0);

    // CreateMutableBinding defines an enumerable property on the object.
    let fresh = agent.create_string("fresh");
    agent.create_mutable_binding(env, fresh, true).unwrap();
    assert!(agent.has_property(object, fresh).unwrap());

    assert!(agent.delete_binding(env, fresh).unwrap());
    assert!(!agent.has_property(object, fresh).unwrap());

    for v in [object, name, stored, read, replaced, observed, fresh] {
        agent.free_value(v);
    }
    agent.free_environment(env);
}

#[test]
fn implicit_this_needs_the_provide_this_flag() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();

    let plain = agent.new_object_environment(object, false, None).unwrap();
    let this_value = agent.implicit_this_value(plain);
    assert!(this_value.is_undefined());

    let with_this = agent.new_object_environment(object, true, None).unwrap();
    let this_value = agent.implicit_this_value(with_this);
    assert!(agent.same_value(this_value, object));
    agent.free_value(this_value);

    let declarative = agent.new_declarative_environment(None);
    let this_value = agent.implicit_this_value(declarative);
    assert!(this_value.is_undefined());

    agent.free_environment(plain);
    agent.free_environment(with_this);
    agent.free_environment(declarative);
    agent.free_value(object);
}

#[test]
fn the_global_environment_is_object_bound_to_the_global_object() {
    let mut agent = Agent::new(Options::default());
    let global_env = agent.global_environment();
    let global = agent.global_object();

    let name = agent.create_string("globalBinding");
    let stored = agent.create_number(8.0);
    agent.set_mutable_binding(global_env, name, stored, false).unwrap();

    let observed = agent.get_property(global, name).unwrap();
    assert_eq!(agent.number_value(observed), 8.0);

    let implicit = agent.implicit_this_value(global_env);
    assert!(agent.same_value(implicit, global));

    for v in [global, name, stored, observed, implicit] {
        agent.free_value(v);
    }
}

#[test]
fn missing_binding_reads_reference_error() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let name = agent.create_string("nothing");

    let error = agent.get_binding_value(env, name, false).unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::Reference));

    agent.free_value(payload);
    agent.free_value(name);
    agent.free_environment(env);
}

#[test]
fn binding_names_must_be_strings() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let bad_name = agent.create_number(5.0);
    assert!(agent.has_binding(env, bad_name).is_err());
    agent.free_value(bad_name);
    agent.free_environment(env);

    // Environments chain through their outer link.
    let outer = agent.new_declarative_environment(None);
    let inner = agent.new_declarative_environment(Some(outer));
    agent.free_environment(inner);
    agent.free_environment(outer);
}
