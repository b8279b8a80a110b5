// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, Options, TypedArrayKind, Value};

#[test]
fn int8_construction_truncates_like_the_spec_table() {
    let mut agent = Agent::new(Options::default());
    // Int8Array.from([127, 128, -129, 3.7]) stores [127, -128, 127, 3].
    let values: Vec<Value> = [127.0, 128.0, -129.0, 3.7]
        .iter()
        .map(|v| agent.create_number(*v))
        .collect();
    let array = agent
        .create_typed_array_from_values(TypedArrayKind::Int8, &values)
        .unwrap();

    let expected = [127.0, -128.0, 127.0, 3.0];
    for (index, expected) in expected.iter().enumerate() {
        assert_eq!(
            agent.typed_array_element(array, index as u32).unwrap(),
            Some(*expected)
        );
    }
    assert_eq!(agent.typed_array_element(array, 4).unwrap(), None);

    for v in values {
        agent.free_value(v);
    }
    agent.free_value(array);
}

#[test]
fn store_and_read_agree_with_the_kind_conversion() {
    let mut agent = Agent::new(Options::default());
    let cases: &[(TypedArrayKind, f64, f64)] = &[
        (TypedArrayKind::Uint8, 256.0, 0.0),
        (TypedArrayKind::Uint8, -1.0, 255.0),
        (TypedArrayKind::Uint8Clamped, -1.0, 0.0),
        (TypedArrayKind::Uint8Clamped, 255.5, 255.0),
        (TypedArrayKind::Uint8Clamped, 0.5, 0.0),
        (TypedArrayKind::Uint8Clamped, 1.5, 2.0),
        (TypedArrayKind::Int16, 40000.0, -25536.0),
        (TypedArrayKind::Uint16, -2.0, 65534.0),
        (TypedArrayKind::Int32, 4294967295.0, -1.0),
        (TypedArrayKind::Uint32, -1.0, 4294967295.0),
        (TypedArrayKind::Float32, 0.1, 0.1f32 as f64),
        (TypedArrayKind::Float64, 0.1, 0.1),
        (TypedArrayKind::Int8, f64::NAN, 0.0),
        (TypedArrayKind::Int8, f64::INFINITY, 0.0),
    ];

    for (kind, input, expected) in cases {
        let array = agent.create_typed_array(*kind, 1).unwrap();
        agent.typed_array_store(array, 0, *input).unwrap();
        assert_eq!(
            agent.typed_array_element(array, 0).unwrap(),
            Some(*expected),
            "{kind:?} <- {input}"
        );
        agent.free_value(array);
    }
}

#[test]
fn views_share_their_backing_buffer() {
    let mut agent = Agent::new(Options::default());
    let buffer = agent.create_array_buffer(8).unwrap();

    let bytes = agent
        .create_typed_array_over_buffer(TypedArrayKind::Uint8, buffer, 0, None)
        .unwrap();
    let words = agent
        .create_typed_array_over_buffer(TypedArrayKind::Uint32, buffer, 4, Some(1))
        .unwrap();
    assert_eq!(agent.typed_array_length(bytes).unwrap(), 8);
    assert_eq!(agent.typed_array_length(words).unwrap(), 1);

    agent.typed_array_store(words, 0, 0x01020304u32 as f64).unwrap();
    let mut observed = [0.0f64; 4];
    for index in 0..4u32 {
        observed[index as usize] = agent
            .typed_array_element(bytes, 4 + index)
            .unwrap()
            .unwrap();
    }
    let reassembled = if cfg!(target_endian = "little") {
        observed[0] as u32
            | (observed[1] as u32) << 8
            | (observed[2] as u32) << 16
            | (observed[3] as u32) << 24
    } else {
        observed[3] as u32
            | (observed[2] as u32) << 8
            | (observed[1] as u32) << 16
            | (observed[0] as u32) << 24
    };
    assert_eq!(reassembled, 0x01020304);

    for v in [buffer, bytes, words] {
        agent.free_value(v);
    }
}

#[test]
fn view_construction_validates_alignment_and_range() {
    let mut agent = Agent::new(Options::default());
    let buffer = agent.create_array_buffer(10).unwrap();

    // Misaligned offset.
    assert!(
        agent
            .create_typed_array_over_buffer(TypedArrayKind::Uint32, buffer, 2, None)
            .is_err()
    );
    // Out-of-range explicit length.
    assert!(
        agent
            .create_typed_array_over_buffer(TypedArrayKind::Uint32, buffer, 4, Some(2))
            .is_err()
    );
    // Tail does not divide into whole elements.
    assert!(
        agent
            .create_typed_array_over_buffer(TypedArrayKind::Uint32, buffer, 4, None)
            .is_err()
    );
    // A valid sub-view.
    let view = agent
        .create_typed_array_over_buffer(TypedArrayKind::Uint16, buffer, 2, Some(3))
        .unwrap();
    assert_eq!(agent.typed_array_length(view).unwrap(), 3);

    agent.free_value(view);
    agent.free_value(buffer);
}

#[test]
fn conversion_between_kinds_goes_element_wise() {
    let mut agent = Agent::new(Options::default());
    let values: Vec<Value> = [1.5, -2.5, 1000.0]
        .iter()
        .map(|v| agent.create_number(*v))
        .collect();
    let floats = agent
        .create_typed_array_from_values(TypedArrayKind::Float64, &values)
        .unwrap();

    let ints = agent
        .create_typed_array_from_typed_array(TypedArrayKind::Int16, floats)
        .unwrap();
    assert_eq!(agent.typed_array_element(ints, 0).unwrap(), Some(1.0));
    assert_eq!(agent.typed_array_element(ints, 1).unwrap(), Some(-2.0));
    assert_eq!(agent.typed_array_element(ints, 2).unwrap(), Some(1000.0));

    // Same-kind construction is a byte copy.
    let copy = agent
        .create_typed_array_from_typed_array(TypedArrayKind::Float64, floats)
        .unwrap();
    assert_eq!(agent.typed_array_element(copy, 1).unwrap(), Some(-2.5));

    for v in values {
        agent.free_value(v);
    }
    for v in [floats, ints, copy] {
        agent.free_value(v);
    }
}

#[test]
fn detaching_the_buffer_zeroes_outstanding_views() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_typed_array(TypedArrayKind::Uint8, 16).unwrap();
    let buffer = agent.typed_array_buffer(array).unwrap();
    agent.typed_array_store(array, 3, 7.0).unwrap();

    agent.detach_array_buffer(buffer).unwrap();
    assert_eq!(agent.array_buffer_byte_length(buffer).unwrap(), 0);
    assert_eq!(agent.typed_array_length(array).unwrap(), 0);
    assert_eq!(agent.typed_array_element(array, 3).unwrap(), None);
    // Stores into a detached view are absorbed, not crashes.
    agent.typed_array_store(array, 3, 9.0).unwrap();

    agent.free_value(buffer);
    agent.free_value(array);
}

#[test]
fn integer_indexed_properties_follow_the_exotic_contract() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_typed_array(TypedArrayKind::Int32, 3).unwrap();

    let stored = agent.create_number(100.0);
    assert!(agent.set_property_by_index(array, 0, stored).unwrap());
    let read = agent.get_property_by_index(array, 0).unwrap();
    assert_eq!(agent.number_value(read), 100.0);

    // Elements cannot be deleted or reconfigured.
    let key = agent.create_string("0");
    assert!(!agent.delete_property(array, key).unwrap());
    let descriptor = agent.get_own_property_descriptor(array, key).unwrap().unwrap();
    assert_eq!(descriptor.writable, Some(true));
    assert_eq!(descriptor.enumerable, Some(true));
    assert_eq!(descriptor.configurable, Some(false));
    if let Some(value) = descriptor.value {
        agent.free_value(value);
    }

    // Out-of-range stores are silently absorbed.
    let oob = agent.create_number(5.0);
    assert!(agent.set_property_by_index(array, 99, oob).unwrap());
    let missing = agent.get_property_by_index(array, 99).unwrap();
    assert!(missing.is_undefined());

    for v in [array, stored, read, key, oob, missing] {
        agent.free_value(v);
    }
}
