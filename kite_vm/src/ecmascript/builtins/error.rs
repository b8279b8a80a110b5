// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error objects: class objects carrying their kind and, when error
//! messages are compiled in, a formatted message string.

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::execution::{Agent, ErrorKind};
use crate::ecmascript::objects::data::{self, ClassId, ObjectType};
use crate::ecmascript::objects::property_storage::{
    self, PROPERTY_FLAG_CONFIGURABLE, PROPERTY_FLAG_WRITABLE, PropertyName,
};
#[cfg(feature = "error-messages")]
use crate::ecmascript::types::string;
use crate::ecmascript::types::{MagicStringId, Value};

impl ErrorKind {
    pub(crate) fn from_bits(bits: u8) -> ErrorKind {
        match bits {
            0 => ErrorKind::Common,
            1 => ErrorKind::Type,
            2 => ErrorKind::Range,
            3 => ErrorKind::Reference,
            4 => ErrorKind::Syntax,
            5 => ErrorKind::Uri,
            6 => ErrorKind::Eval,
            7 => ErrorKind::Aggregate,
            8 => ErrorKind::StackOverflow,
            _ => unreachable!("corrupt error kind"),
        }
    }

    fn name_magic(self) -> MagicStringId {
        match self {
            ErrorKind::Common => MagicStringId::ERROR,
            ErrorKind::Type => MagicStringId::TYPE_ERROR,
            // The stack limit surfaces as a RangeError, like every major
            // engine reports it.
            ErrorKind::Range | ErrorKind::StackOverflow => MagicStringId::RANGE_ERROR,
            ErrorKind::Reference => MagicStringId::REFERENCE_ERROR,
            ErrorKind::Syntax => MagicStringId::SYNTAX_ERROR,
            ErrorKind::Uri => MagicStringId::URI_ERROR,
            ErrorKind::Eval => MagicStringId::EVAL_ERROR,
            ErrorKind::Aggregate => MagicStringId::AGGREGATE_ERROR,
        }
    }
}

/// Create an error object of the given kind. Without the `error-messages`
/// feature only the kind is preserved.
pub(crate) fn new_error(heap: &mut Heap, kind: ErrorKind, message: &str) -> CompressedPointer {
    let cp = data::new_class_object(
        heap,
        CompressedPointer::NULL,
        ClassId::Error,
        kind as u8,
        Value::EMPTY.into_raw(),
    );

    property_storage::create_named_data_property(
        heap,
        cp,
        PropertyName::Magic(MagicStringId::NAME),
        PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_CONFIGURABLE,
        Value::from_magic(kind.name_magic()),
    );

    #[cfg(feature = "error-messages")]
    if !message.is_empty() {
        let message_value = string::new_string_from_cesu8(heap, message.as_bytes());
        // The hidden class value keeps the message addressable for
        // diagnostics even if the property is deleted.
        data::set_class_value(heap, cp, message_value.into_raw());
        property_storage::create_named_data_property(
            heap,
            cp,
            PropertyName::Magic(MagicStringId::MESSAGE),
            PROPERTY_FLAG_WRITABLE | PROPERTY_FLAG_CONFIGURABLE,
            message_value,
        );
    }
    #[cfg(not(feature = "error-messages"))]
    let _ = message;

    cp
}

/// Kind of an error object, if the value is one.
pub(crate) fn error_kind(heap: &Heap, v: Value) -> Option<ErrorKind> {
    if !v.is_object() {
        return None;
    }
    let cp = v.heap_pointer();
    if data::object_type(heap, cp) != ObjectType::Class
        || data::class_id(heap, cp) != ClassId::Error
    {
        return None;
    }
    Some(ErrorKind::from_bits(data::class_extra(heap, cp)))
}

/// Diagnostic message of an error object, when messages are compiled in.
pub(crate) fn error_message(heap: &Heap, v: Value) -> Option<Value> {
    error_kind(heap, v)?;
    let raw = data::class_value(heap, v.heap_pointer());
    let value = Value::from_raw(raw);
    if value.is_string() { Some(value) } else { None }
}

impl Agent {
    /// Diagnostic message of an error object, if one was attached.
    pub fn error_message(&self, v: Value) -> Option<String> {
        let message = error_message(&self.heap, v.without_error_flag())?;
        Some(self.string_value(message))
    }
}
