// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use kite_vm::{Agent, ErrorKind, JsResult, Options, Value};

#[test]
fn primitive_conversions() {
    let mut agent = Agent::new(Options::default());

    assert!(agent.to_number(Value::UNDEFINED).unwrap().is_nan());
    assert_eq!(agent.to_number(Value::NULL).unwrap(), 0.0);
    assert_eq!(agent.to_number(Value::TRUE).unwrap(), 1.0);

    let text = agent.create_string("  0x20 ");
    assert_eq!(agent.to_number(text).unwrap(), 32.0);
    agent.free_value(text);

    let text = agent.create_string("not a number");
    assert!(agent.to_number(text).unwrap().is_nan());
    agent.free_value(text);

    assert!(!agent.to_boolean(Value::UNDEFINED));
    assert!(!agent.to_boolean(Value::NULL));
    let empty = agent.create_string("");
    assert!(!agent.to_boolean(empty));
    agent.free_value(empty);
    let zero = agent.create_number(0.0);
    assert!(!agent.to_boolean(zero));
    agent.free_value(zero);
    let object = agent.create_object();
    assert!(agent.to_boolean(object));
    agent.free_value(object);
}

#[test]
fn to_string_of_numbers_is_js_formatted() {
    let mut agent = Agent::new(Options::default());
    for (input, expected) in [
        (0.0, "0"),
        (-0.0, "0"),
        (3.0, "3"),
        (-1.5, "-1.5"),
        (f64::NAN, "NaN"),
        (f64::INFINITY, "Infinity"),
        (f64::NEG_INFINITY, "-Infinity"),
        (1e21, "1e+21"),
    ] {
        let number = agent.create_number(input);
        let text = agent.to_string_value(number).unwrap();
        assert_eq!(agent.string_value(text), expected, "formatting {input}");
        agent.free_value(number);
        agent.free_value(text);
    }
}

#[test]
fn same_value_distinguishes_zeroes_and_same_value_zero_does_not() {
    let mut agent = Agent::new(Options::default());
    let positive = agent.create_number(0.0);
    let negative = agent.create_number(-0.0);
    let nan_a = agent.create_number(f64::NAN);
    let nan_b = agent.create_number(f64::NAN);

    assert!(!agent.same_value(positive, negative));
    assert!(agent.same_value_zero(positive, negative));
    assert!(!agent.strict_equals(nan_a, nan_b));
    assert!(agent.same_value(nan_a, nan_b));
    assert!(agent.same_value_zero(nan_a, nan_b));

    for v in [positive, negative, nan_a, nan_b] {
        agent.free_value(v);
    }
}

#[test]
fn string_contents_compare_by_value() {
    let mut agent = Agent::new(Options::default());
    let a = agent.create_string("length");
    let b = agent.create_string("length");
    // "length" interns to the same magic string, so even identity matches.
    assert_eq!(a, b);

    let c = agent.create_string("a much longer string that goes to the heap");
    let d = agent.create_string("a much longer string that goes to the heap");
    assert!(agent.strict_equals(c, d));
    assert!(agent.same_value(c, d));

    let numeric = agent.create_string("4999");
    let other = agent.create_string("5000");
    assert!(!agent.strict_equals(numeric, other));

    for v in [a, b, c, d, numeric, other] {
        agent.free_value(v);
    }
}

#[test]
fn supplementary_characters_survive_the_utf8_boundary() {
    let mut agent = Agent::new(Options::default());
    let text = agent.create_string("a😀b");
    assert_eq!(agent.string_value(text), "a😀b");

    let mut small = [0u8; 4];
    // Truncation cannot split the surrogate pair's UTF-8 form.
    let written = agent.string_to_utf8(text, &mut small);
    assert_eq!(written, 1);
    assert_eq!(&small[..1], b"a");
    agent.free_value(text);
}

fn forty_two(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(agent.create_number(42.0))
}

fn sum(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    let mut total = 0.0;
    for arg in args {
        total += agent.to_number(*arg)?;
    }
    Ok(agent.create_number(total))
}

#[test]
fn external_functions_are_callable() {
    let mut agent = Agent::new(Options::default());
    let func = agent.create_external_function(sum);
    assert!(agent.is_callable(func));
    assert!(agent.is_constructor(func));

    let args = [agent.create_number(1.0), agent.create_number(2.5)];
    let result = agent
        .call_function(func, Value::UNDEFINED, &args)
        .unwrap();
    assert_eq!(agent.number_value(result), 3.5);

    agent.free_value(result);
    for arg in args {
        agent.free_value(arg);
    }
    agent.free_value(func);
}

#[test]
fn bound_functions_prepend_their_arguments() {
    let mut agent = Agent::new(Options::default());
    let target = agent.create_external_function(sum);
    let bound_args = [agent.create_number(10.0)];
    let bound = agent
        .create_bound_function(target, Value::UNDEFINED, &bound_args)
        .unwrap();

    let call_args = [agent.create_number(5.0)];
    let result = agent.call_function(bound, Value::UNDEFINED, &call_args).unwrap();
    assert_eq!(agent.number_value(result), 15.0);

    agent.free_value(result);
    for v in call_args.into_iter().chain(bound_args) {
        agent.free_value(v);
    }
    agent.free_value(bound);
    agent.free_value(target);
}

#[test]
fn construct_builds_an_instance_with_the_prototype_chain() {
    let mut agent = Agent::new(Options::default());
    let ctor = agent.create_external_function(forty_two);
    let proto = agent.create_object();
    let key = agent.create_string("prototype");
    agent.set_property(ctor, key, proto).unwrap();

    let instance = agent.construct_object(ctor, &[]).unwrap();
    assert!(instance.is_object());
    assert!(agent.instance_of(instance, ctor).unwrap());

    agent.free_value(instance);
    agent.free_value(key);
    agent.free_value(proto);
    agent.free_value(ctor);
}

static FINALIZED: AtomicBool = AtomicBool::new(false);

fn finalize_native(data: Box<dyn core::any::Any>) {
    let value = data.downcast::<i32>().expect("attached an i32");
    assert_eq!(*value, 7);
    FINALIZED.store(true, Ordering::SeqCst);
}

#[test]
fn native_data_finalizer_runs_at_collection() {
    let mut agent = Agent::new(Options::default());
    let func = agent.create_external_function(forty_two);
    assert!(agent.set_native_data(func, Box::new(7i32), Some(finalize_native)));
    assert_eq!(
        agent.native_data(func).unwrap().downcast_ref::<i32>(),
        Some(&7)
    );

    agent.free_value(func);
    assert!(!FINALIZED.load(Ordering::SeqCst));
    agent.gc();
    assert!(FINALIZED.load(Ordering::SeqCst));
}

static STACK_PROBE_DEPTH: AtomicI32 = AtomicI32::new(0);

fn recurse_forever(agent: &mut Agent, _this: Value, args: &[Value]) -> JsResult<Value> {
    STACK_PROBE_DEPTH.fetch_add(1, Ordering::SeqCst);
    let me = args[0];
    agent.call_function(me, Value::UNDEFINED, args)
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let mut agent = Agent::new(Options::default());
    let func = agent.create_external_function(recurse_forever);
    let error = agent
        .call_function(func, Value::UNDEFINED, &[func])
        .unwrap_err();
    let payload = agent.take_error_value(error);
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::StackOverflow));
    assert!(STACK_PROBE_DEPTH.load(Ordering::SeqCst) > 16);
    agent.free_value(payload);
    agent.free_value(func);
}

#[test]
fn thrown_errors_carry_their_kind_and_message() {
    let mut agent = Agent::new(Options::default());
    let key = agent.create_string("whatever");
    let error = agent
        .get_property(Value::NULL, key)
        .expect_err("getting on null must throw");
    assert!(error.value().has_error_flag());

    let payload = agent.take_error_value(error);
    assert!(!payload.has_error_flag());
    assert_eq!(agent.error_kind(payload), Some(ErrorKind::Type));

    let message_key = agent.create_string("message");
    let message = agent.get_property(payload, message_key).unwrap();
    assert!(message.is_string());
    assert!(!agent.string_value(message).is_empty());

    for v in [key, payload, message_key, message] {
        agent.free_value(v);
    }
}

#[test]
fn bigints_round_trip_through_the_embedding_boundary() {
    let mut agent = Agent::new(Options::default());
    let huge = num_bigint::BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
    let value = agent.create_bigint(&huge);
    assert!(value.is_bigint());
    assert_eq!(agent.bigint_value(value), huge);

    let other = agent.create_bigint(&huge);
    assert!(agent.same_value(value, other));
    let text = agent.to_string_value(value).unwrap();
    assert_eq!(agent.string_value(text), "123456789012345678901234567890");

    for v in [value, other, text] {
        agent.free_value(v);
    }
}

#[test]
fn symbols_are_unique_and_carry_descriptions() {
    let mut agent = Agent::new(Options::default());
    let description = agent.create_string("marker");
    let a = agent.create_symbol(description);
    let b = agent.create_symbol(description);
    assert!(a.is_symbol());
    assert!(!agent.same_value(a, b));
    assert!(agent.same_value(a, a));

    // Symbols work as property keys.
    let object = agent.create_object();
    let stored = agent.create_number(1.0);
    agent.set_property(object, a, stored).unwrap();
    let read = agent.get_property(object, a).unwrap();
    assert_eq!(agent.number_value(read), 1.0);
    let via_b = agent.get_property(object, b).unwrap();
    assert!(via_b.is_undefined());

    for v in [description, a, b, object, stored, read, via_b] {
        agent.free_value(v);
    }
}

#[test]
fn wrapper_objects_convert_through_their_payload() {
    let mut agent = Agent::new(Options::default());
    let number_object = agent.create_number_object(6.5);
    assert!(number_object.is_object());
    assert_eq!(agent.to_number(number_object).unwrap(), 6.5);

    let text = agent.create_string("12");
    let string_object = agent.create_string_object(text).unwrap();
    assert_eq!(agent.to_number(string_object).unwrap(), 12.0);

    let boolean_object = agent.create_boolean_object(true);
    assert_eq!(agent.to_number(boolean_object).unwrap(), 1.0);

    for v in [number_object, text, string_object, boolean_object] {
        agent.free_value(v);
    }
}

fn value_of_nine(agent: &mut Agent, _this: Value, _args: &[Value]) -> JsResult<Value> {
    Ok(agent.create_number(9.0))
}

#[test]
fn to_primitive_prefers_a_callable_value_of() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let value_of = agent.create_external_function(value_of_nine);
    let key = agent.create_string("valueOf");
    agent.set_property(object, key, value_of).unwrap();

    assert_eq!(agent.to_number(object).unwrap(), 9.0);

    // A plain object without conversion methods cannot become a number.
    let plain = agent.create_object();
    assert!(agent.to_number(plain).is_err());

    for v in [object, value_of, key, plain] {
        agent.free_value(v);
    }
}
