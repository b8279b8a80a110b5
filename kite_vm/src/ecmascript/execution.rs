// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod agent;
pub(crate) mod environments;

pub use agent::{
    Agent, BytecodeExecHook, ContextSlotId, ContextSlotRegistry, Environment, ErrorKind, JsError,
    JsResult, NativeFunction, Options,
};
pub(crate) use agent::ExternalFunctionEntry;
