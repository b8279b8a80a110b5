// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use kite_vm::{Agent, NodeKind, Options, SnapshotEdge, SnapshotNode};

#[test]
fn unreachable_cycles_are_collected() {
    let mut agent = Agent::new(Options::default());
    let baseline = agent.heap_stats().object_bytes;

    let first = agent.create_object();
    let second = agent.create_object();
    let key = agent.create_string("other");
    // A two-object cycle through properties.
    agent.set_property(first, key, second).unwrap();
    agent.set_property(second, key, first).unwrap();
    agent.free_value(key);

    // Still reachable through the external references.
    agent.gc();
    assert!(agent.heap_stats().object_bytes > baseline);

    // Reference counting alone can never reclaim the cycle; the collector
    // must.
    agent.free_value(first);
    agent.free_value(second);
    agent.gc();
    assert_eq!(agent.heap_stats().object_bytes, baseline);
}

#[test]
fn reachability_through_nested_structures_survives_collection() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(0);
    let map = agent.create_map();
    let object = agent.create_object();

    let key = agent.create_string("payload");
    let payload = agent.create_string("a string only the object keeps alive");
    agent.set_property(object, key, payload).unwrap();
    agent.map_set(map, key, object).unwrap();
    agent.set_property_by_index(array, 0, map).unwrap();

    // Drop every direct reference except the array.
    agent.free_value(payload);
    agent.free_value(object);
    agent.free_value(map);
    agent.gc();

    let map_again = agent.get_property_by_index(array, 0).unwrap();
    let object_again = agent.map_get(map_again, key).unwrap();
    let payload_again = agent.get_property(object_again, key).unwrap();
    assert_eq!(
        agent.string_value(payload_again),
        "a string only the object keeps alive"
    );

    for v in [array, key, map_again, object_again, payload_again] {
        agent.free_value(v);
    }
    agent.gc();
}

#[test]
fn memory_stats_balance_after_teardown() {
    let mut agent = Agent::new(Options::default());
    agent.gc();
    let baseline = agent.heap_stats();

    let mut values = Vec::new();
    for index in 0..100 {
        values.push(agent.create_array(index));
        values.push(agent.create_string(&format!("string number {index} with some length")));
        values.push(agent.create_number(index as f64 + 0.5));
    }
    let mid = agent.heap_stats();
    assert!(mid.allocated_bytes > baseline.allocated_bytes);
    assert!(mid.string_bytes > baseline.string_bytes);
    assert!(mid.object_bytes > baseline.object_bytes);

    for v in values {
        agent.free_value(v);
    }
    agent.gc();
    let end = agent.heap_stats();
    assert_eq!(end.allocated_bytes, baseline.allocated_bytes);
    assert_eq!(end.string_bytes, baseline.string_bytes);
    assert_eq!(end.object_bytes, baseline.object_bytes);
    assert!(end.peak_allocated_bytes >= mid.allocated_bytes);
}

#[test]
fn allocation_recovers_under_pressure_then_fails_cleanly_when_all_is_live() {
    let mut agent = Agent::new(Options::default());

    // Fill most of the arena with garbage buffers, dropping the references
    // immediately: the soft-limit hooks must reclaim them on the way.
    for _ in 0..64 {
        let buffer = agent.create_array_buffer(64 * 1024).unwrap();
        agent.free_value(buffer);
    }

    // Now keep everything alive until allocation genuinely fails.
    let mut live = Vec::new();
    loop {
        match agent.create_array_buffer(32 * 1024) {
            Ok(buffer) => live.push(buffer),
            Err(error) => {
                agent.free_error(error);
                break;
            }
        }
        assert!(live.len() < 64, "the arena cannot hold this many buffers");
    }
    assert!(!live.is_empty());

    // Releasing one buffer makes the next allocation succeed again.
    agent.free_value(live.pop().unwrap());
    let recovered = agent.create_array_buffer(16 * 1024).unwrap();

    agent.free_value(recovered);
    for v in live {
        agent.free_value(v);
    }
}

type NodeSummary = (u32, u32, Option<Vec<u8>>);

fn capture_summary(agent: &Agent) -> (Vec<NodeSummary>, usize) {
    let mut nodes: Vec<NodeSummary> = Vec::new();
    let mut edge_count = 0usize;
    agent.capture_heap_snapshot(
        &mut |node: SnapshotNode<'_>| {
            nodes.push((
                node.kind as u32,
                node.size,
                node.representation.map(<[u8]>::to_vec),
            ));
        },
        &mut |_edge: SnapshotEdge<'_>| {
            edge_count += 1;
        },
    );
    nodes.sort();
    (nodes, edge_count)
}

#[test]
fn snapshot_capture_is_stable_without_mutation() {
    let mut agent = Agent::new(Options::default());
    let object = agent.create_object();
    let key = agent.create_string("name");
    let name = agent.create_string("a heap string for the snapshot");
    agent.set_property(object, key, name).unwrap();
    let array = agent.create_array(3);
    let element = agent.create_number(0.5);
    agent.set_property_by_index(array, 0, element).unwrap();

    let (first_nodes, first_edges) = capture_summary(&agent);
    let (second_nodes, second_edges) = capture_summary(&agent);
    assert_eq!(first_nodes, second_nodes);
    assert_eq!(first_edges, second_edges);
    assert!(!first_nodes.is_empty());
    assert!(first_edges > 0);

    for v in [object, key, name, array, element] {
        agent.free_value(v);
    }
}

#[test]
fn snapshot_sees_string_and_array_nodes() {
    let mut agent = Agent::new(Options::default());
    let array = agent.create_array(2);
    let key = agent.create_string("label");
    let label = agent.create_string("snapshot label content");
    agent.set_property(array, key, label).unwrap();

    let mut saw_array = false;
    let mut saw_string = false;
    agent.capture_heap_snapshot(
        &mut |node: SnapshotNode<'_>| {
            match node.kind {
                NodeKind::Array => saw_array = true,
                NodeKind::String => {
                    if node.representation == Some(b"snapshot label content") {
                        saw_string = true;
                    }
                }
                _ => {}
            }
        },
        &mut |_| {},
    );
    assert!(saw_array);
    assert!(saw_string);

    for v in [array, key, label] {
        agent.free_value(v);
    }
}

#[test]
fn disabling_gc_defers_implicit_collection() {
    let mut agent = Agent::new(Options {
        disable_gc: true,
    });
    let baseline = agent.heap_stats().object_bytes;
    let object = agent.create_object();
    agent.free_value(object);

    // Implicit collection is off; the garbage object lingers through
    // further allocation...
    let other = agent.create_object();
    assert!(agent.heap_stats().object_bytes > baseline);
    // ...until an explicit request.
    agent.gc();
    let after = agent.heap_stats().object_bytes;
    agent.free_value(other);
    agent.gc();
    assert!(agent.heap_stats().object_bytes < after);
    assert_eq!(agent.heap_stats().object_bytes, baseline);
}

#[test]
fn revoked_proxy_references_do_not_pin_their_targets() {
    let mut agent = Agent::new(Options::default());
    let baseline = agent.heap_stats().object_bytes;

    let target = agent.create_object();
    let handler = agent.create_object();
    let proxy = agent.create_proxy(target, handler).unwrap();
    agent.free_value(target);
    agent.free_value(handler);

    agent.gc();
    // The proxy's traced links keep both alive.
    assert!(agent.heap_stats().object_bytes > baseline);

    agent.revoke_proxy(proxy).unwrap();
    agent.gc();
    let after_revoke = agent.heap_stats().object_bytes;

    agent.free_value(proxy);
    agent.gc();
    assert_eq!(agent.heap_stats().object_bytes, baseline);
    assert!(after_revoke < baseline + 100);
}

#[test]
fn environments_root_their_bindings() {
    let mut agent = Agent::new(Options::default());
    let env = agent.new_declarative_environment(None);
    let name = agent.create_string("binding");
    let object = agent.create_object();
    let key = agent.create_string("kept");
    let kept = agent.create_string("kept through the environment");
    agent.set_property(object, key, kept).unwrap();

    agent.create_mutable_binding(env, name, false).unwrap();
    agent.set_mutable_binding(env, name, object, false).unwrap();
    agent.free_value(object);
    agent.free_value(kept);

    agent.gc();
    let read = agent.get_binding_value(env, name, true).unwrap();
    let payload = agent.get_property(read, key).unwrap();
    assert_eq!(agent.string_value(payload), "kept through the environment");

    for v in [name, key, read, payload] {
        agent.free_value(v);
    }
    agent.free_environment(env);
}
