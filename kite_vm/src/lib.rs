// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Kite: an embeddable ECMAScript engine core for constrained devices.
//!
//! Everything lives in one fixed heap arena addressed by 16-bit compressed
//! pointers: a sorted free-list allocator with pool layers underneath, a
//! tagged 32-bit value word on top, the linked property store with its
//! hashmap accelerator, specialized array/typed array/container/proxy
//! layouts, and a refcount-rooted mark-and-sweep collector with a heap
//! snapshot walker. Parsing and bytecode execution are supplied by the
//! embedding through hooks; the core is the memory and object model they
//! run against.
//!
//! Every operation threads through a per-context [`Agent`]; the crate has
//! no global state, so an embedding may run independent engines on
//! independent threads.

pub mod config;
pub mod ecmascript;
pub mod heap;
pub mod snapshot;
pub mod unicode;

pub use ecmascript::builtins::TypedArrayKind;
pub use ecmascript::execution::{
    Agent, BytecodeExecHook, ContextSlotId, ContextSlotRegistry, Environment, ErrorKind, JsError,
    JsResult, NativeFunction, Options,
};
pub use ecmascript::objects::IteratorKind;
pub use ecmascript::types::{MagicStringId, PropertyDescriptor, Value};
pub use heap::FatalCode;
pub use heap::gc::EdgeKind;
#[cfg(feature = "mem-stats")]
pub use heap::HeapStats;
#[cfg(feature = "heap-snapshot")]
pub use heap::snapshot::{NodeKind, SnapshotEdge, SnapshotNode};
pub use snapshot::{Snapshot, SnapshotError};
