// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

pub mod bigint;
pub mod number;
pub mod property_descriptor;
pub mod string;
pub mod symbol;
pub mod value;

pub use property_descriptor::PropertyDescriptor;
pub use string::MagicStringId;
pub use value::Value;
