// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod data;
pub(crate) mod internal_methods;
#[cfg(feature = "property-hashmap")]
pub(crate) mod property_hashmap;
pub(crate) mod property_storage;

pub(crate) use data::{deref_object, ref_object};
pub use data::{IteratorKind, ObjectType};
