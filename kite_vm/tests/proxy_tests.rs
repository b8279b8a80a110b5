// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, ErrorKind, JsResult, Options, Value};

#[test]
fn a_trapless_proxy_is_transparent() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_object();
    let handler = agent.create_object();
    let proxy = agent.create_proxy(target, handler).unwrap();

    let key = agent.create_string("field");
    let stored = agent.create_number(21.0);

    // Every internal method forwards to the target.
    assert!(agent.set_property(proxy, key, stored).unwrap());
    let direct = agent.get_property(target, key).unwrap();
    assert_eq!(agent.number_value(direct), 21.0);
    let through = agent.get_property(proxy, key).unwrap();
    assert_eq!(agent.number_value(through), 21.0);
    assert!(agent.has_property(proxy, key).unwrap());

    let keys = agent.own_keys(proxy).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(agent.string_value(keys[0]), "field");
    for k in keys {
        agent.free_value(k);
    }

    assert!(agent.is_extensible(proxy).unwrap());
    assert!(agent.prevent_extensions(proxy).unwrap());
    assert!(!agent.is_extensible(target).unwrap());

    assert!(agent.delete_property(proxy, key).unwrap());
    assert!(!agent.has_property(target, key).unwrap());

    for v in [target, handler, proxy, key, stored, direct, through] {
        agent.free_value(v);
    }
}

fn always_fifty(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(agent.create_number(50.0))
}

#[test]
fn a_get_trap_intercepts_reads() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_object();
    let handler = agent.create_object();
    let trap = agent.create_external_function(always_fifty);
    let trap_key = agent.create_string("get");
    agent.set_property(handler, trap_key, trap).unwrap();

    let proxy = agent.create_proxy(target, handler).unwrap();
    let key = agent.create_string("anything");
    let read = agent.get_property(proxy, key).unwrap();
    assert_eq!(agent.number_value(read), 50.0);

    // The target itself is untouched.
    let direct = agent.get_property(target, key).unwrap();
    assert!(direct.is_undefined());

    for v in [target, handler, trap, trap_key, proxy, key, read, direct] {
        agent.free_value(v);
    }
}

fn veto(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    let _ = agent;
    Ok(Value::FALSE)
}

#[test]
fn a_set_trap_can_veto_writes() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_object();
    let handler = agent.create_object();
    let trap = agent.create_external_function(veto);
    let trap_key = agent.create_string("set");
    agent.set_property(handler, trap_key, trap).unwrap();

    let proxy = agent.create_proxy(target, handler).unwrap();
    let key = agent.create_string("blocked");
    let stored = agent.create_number(1.0);
    assert!(!agent.set_property(proxy, key, stored).unwrap());
    assert!(!agent.has_property(target, key).unwrap());

    for v in [target, handler, trap, trap_key, proxy, key, stored] {
        agent.free_value(v);
    }
}

fn proxied_sum(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let mut total = 0.0;
    for arg in args {
        total += agent.to_number(*arg)?;
    }
    Ok(agent.create_number(total))
}

#[test]
fn calls_forward_through_a_trapless_proxy() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_external_function(proxied_sum);
    let handler = agent.create_object();
    let proxy = agent.create_proxy(target, handler).unwrap();

    assert!(agent.is_callable(proxy));
    let args = [agent.create_number(20.0), agent.create_number(22.0)];
    let result = agent.call_function(proxy, Value::UNDEFINED, &args).unwrap();
    assert_eq!(agent.number_value(result), 42.0);

    agent.free_value(result);
    for arg in args {
        agent.free_value(arg);
    }
    for v in [target, handler, proxy] {
        agent.free_value(v);
    }
}

#[test]
fn every_operation_on_a_revoked_proxy_type_errors() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_object();
    let handler = agent.create_object();
    let proxy = agent.create_proxy(target, handler).unwrap();
    let key = agent.create_string("k");
    let stored = agent.create_number(1.0);

    agent.revoke_proxy(proxy).unwrap();

    let expect_type_error = |agent: &mut Agent, error: kite_vm::JsError| {
        let payload = agent.take_error_value(error);
        assert_eq!(agent.error_kind(payload), Some(ErrorKind::Type));
        agent.free_value(payload);
    };

    let error = agent.get_property(proxy, key).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.set_property(proxy, key, stored).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.has_property(proxy, key).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.delete_property(proxy, key).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.own_keys(proxy).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.get_prototype(proxy).unwrap_err();
    expect_type_error(&mut agent, error);
    let error = agent.prevent_extensions(proxy).unwrap_err();
    expect_type_error(&mut agent, error);

    // Revocation is permanent but harmless to repeat.
    agent.revoke_proxy(proxy).unwrap();

    for v in [target, handler, proxy, key, stored] {
        agent.free_value(v);
    }
}

#[test]
fn own_keys_trap_supplies_the_key_list() {
    let mut agent = Agent::new(Options::default());

    fn keys_trap(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
        let array = agent.create_array(0);
        let key = agent.create_string("synthetic");
        agent.set_property_by_index(array, 0, key)?;
        agent.free_value(key);
        Ok(array)
    }

    let target = agent.create_object();
    let handler = agent.create_object();
    let trap = agent.create_external_function(keys_trap);
    let trap_key = agent.create_string("ownKeys");
    agent.set_property(handler, trap_key, trap).unwrap();

    let proxy = agent.create_proxy(target, handler).unwrap();
    let keys = agent.own_keys(proxy).unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(agent.string_value(keys[0]), "synthetic");

    for k in keys {
        agent.free_value(k);
    }
    for v in [target, handler, trap, trap_key, proxy] {
        agent.free_value(v);
    }
}

#[test]
fn prototype_operations_forward_to_the_target() {
    let mut agent = Agent::new(Options::default());
    let proto = agent.create_object();
    let target = agent.create_object();
    let handler = agent.create_object();
    let proxy = agent.create_proxy(target, handler).unwrap();

    assert!(agent.set_prototype(proxy, proto).unwrap());
    let observed = agent.get_prototype(target).unwrap();
    assert!(agent.same_value(observed, proto));
    let through = agent.get_prototype(proxy).unwrap();
    assert!(agent.same_value(through, proto));

    for v in [proto, target, handler, proxy, observed, through] {
        agent.free_value(v);
    }
}
