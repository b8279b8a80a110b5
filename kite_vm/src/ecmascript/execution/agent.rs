// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The agent: the per-context struct that owns the heap and every other
//! piece of engine state. No engine operation touches globals or
//! thread-locals; everything threads through `&mut Agent`, and an embedding
//! may run one engine per thread by giving each its own agent.

use core::any::Any;

use crate::config::CALL_DEPTH_LIMIT;
use crate::heap::{FatalCode, GcPressure, Heap, gc};
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::{array, error, function};
use crate::ecmascript::execution::environments;
use crate::ecmascript::objects::{self, data, internal_methods};
use crate::ecmascript::objects::data::{ClassId, ObjectType};
use crate::ecmascript::objects::property_storage::PropertyName;
use crate::ecmascript::types::{
    MagicStringId, PropertyDescriptor, Value, bigint, number, string, symbol, value,
};

#[cfg(feature = "mem-stats")]
use crate::heap::HeapStats;

/// The error taxonomy. All kinds surface as error objects; `StackOverflow`
/// is raised by the engine itself when the configured call-depth limit is
/// exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    Common = 0,
    Type = 1,
    Range = 2,
    Reference = 3,
    Syntax = 4,
    Uri = 5,
    Eval = 6,
    Aggregate = 7,
    StackOverflow = 8,
}

/// A thrown value: the payload with the error flag set. The holder owns one
/// reference to the payload; recover it with [`Agent::take_error_value`] or
/// release it with [`Agent::free_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsError(pub(crate) Value);

impl JsError {
    /// The flagged value as it travels along return paths.
    pub fn value(self) -> Value {
        self.0
    }
}

/// Every fallible engine operation returns this; the `Err` arm is the
/// error-bit discipline expressed as a `Result`.
pub type JsResult<T> = Result<T, JsError>;

/// A host function: `(agent, this, arguments) -> result`.
pub type NativeFunction = fn(&mut Agent, Value, &[Value]) -> JsResult<Value>;

/// The interpreter hook through which bytecode function objects are run:
/// `(agent, function, this, arguments) -> result`. The core has no
/// interpreter of its own.
pub type BytecodeExecHook = fn(&mut Agent, Value, Value, &[Value]) -> JsResult<Value>;

/// A registered handler slot referenced by external function records.
pub(crate) struct ExternalFunctionEntry {
    pub(crate) function: NativeFunction,
    pub(crate) native_data: Option<NativeDataEntry>,
}

pub(crate) struct NativeDataEntry {
    pub(crate) data: Box<dyn Any>,
    pub(crate) finalizer: Option<fn(Box<dyn Any>)>,
}

/// Engine start-up options.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// Disables implicit collections; explicit [`Agent::gc`] still runs.
    pub disable_gc: bool,
}

/// Identifier of a registered context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextSlotId(usize);

/// Host-side registry of typed context slots. All slots must be registered
/// before the first agent is created from the registry; each agent then
/// carries one initialized value per slot and deinitializes them in reverse
/// order when it is dropped.
#[derive(Default)]
pub struct ContextSlotRegistry {
    entries: Vec<(fn() -> Box<dyn Any>, Option<fn(Box<dyn Any>)>)>,
}

impl ContextSlotRegistry {
    pub fn new() -> ContextSlotRegistry {
        ContextSlotRegistry::default()
    }

    pub fn register(
        &mut self,
        init: fn() -> Box<dyn Any>,
        deinit: Option<fn(Box<dyn Any>)>,
    ) -> ContextSlotId {
        self.entries.push((init, deinit));
        ContextSlotId(self.entries.len() - 1)
    }
}

pub struct Agent {
    pub(crate) heap: Heap,
    pub(crate) call_depth: u32,
    pub(crate) bytecode_exec: Option<BytecodeExecHook>,
    slots: Vec<Option<Box<dyn Any>>>,
    slot_deinits: Vec<Option<fn(Box<dyn Any>)>>,
}

impl Agent {
    pub fn new(options: Options) -> Agent {
        Agent::new_with_slots(options, &ContextSlotRegistry::default())
    }

    /// Create an agent whose context slots come from `registry`.
    pub fn new_with_slots(options: Options, registry: &ContextSlotRegistry) -> Agent {
        let mut heap = Heap::new(options.disable_gc);

        // The global object and the object-bound global environment. The
        // environment's creation reference roots it (and, through tracing,
        // the global object) for the lifetime of the agent.
        let global_object = data::new_plain_object(
            &mut heap,
            ObjectType::General,
            CompressedPointer::NULL,
            true,
        );
        let global_env = environments::new_object_environment_raw(
            &mut heap,
            global_object,
            true,
            CompressedPointer::NULL,
        );
        heap.global_env = global_env;

        let mut slots = Vec::with_capacity(registry.entries.len());
        let mut slot_deinits = Vec::with_capacity(registry.entries.len());
        for (init, deinit) in &registry.entries {
            slots.push(Some(init()));
            slot_deinits.push(*deinit);
        }

        Agent {
            heap,
            call_depth: 0,
            bytecode_exec: None,
            slots,
            slot_deinits,
        }
    }

    /// Run a full collection at high pressure.
    pub fn gc(&mut self) {
        if !self.heap.gc_running {
            gc::run(&mut self.heap, GcPressure::High);
        }
    }

    /// Install the fatal handler invoked on terminal failures.
    pub fn set_fatal_handler(&mut self, handler: fn(FatalCode)) {
        self.heap.fatal_handler = Some(handler);
    }

    /// Install the interpreter hook for bytecode function objects.
    pub fn set_bytecode_exec_hook(&mut self, hook: BytecodeExecHook) {
        self.bytecode_exec = Some(hook);
    }

    /// Register embedder magic strings. Must happen before content equal to
    /// them is interned, which in practice means right after start-up.
    pub fn register_magic_strings(&mut self, strings: &[&'static str]) {
        self.heap.register_magic_strings(strings);
    }

    // Context slots.

    pub fn slot(&self, id: ContextSlotId) -> &dyn Any {
        self.slots[id.0].as_deref().expect("slot taken")
    }

    pub fn slot_mut(&mut self, id: ContextSlotId) -> &mut dyn Any {
        self.slots[id.0].as_deref_mut().expect("slot taken")
    }

    // Value lifecycle.

    /// Take an additional reference for a value the embedding stores.
    pub fn copy_value(&mut self, v: Value) -> Value {
        value::copy_value(&mut self.heap, v)
    }

    /// Release a value reference received from any API call.
    pub fn free_value(&mut self, v: Value) {
        value::free_value(&mut self.heap, v.without_error_flag());
    }

    /// Recover the payload of a thrown error, clearing the error bit. The
    /// caller now owns the payload reference.
    pub fn take_error_value(&mut self, error: JsError) -> Value {
        error.0.without_error_flag()
    }

    /// Release a thrown error without inspecting it.
    pub fn free_error(&mut self, error: JsError) {
        self.free_value(error.0.without_error_flag());
    }

    // Value construction.

    pub fn create_number(&mut self, v: f64) -> Value {
        number::new_number(&mut self.heap, v)
    }

    pub fn create_string(&mut self, content: &str) -> Value {
        string::new_string_from_utf8(&mut self.heap, content)
    }

    /// Create a string from raw CESU-8 content.
    pub fn create_string_cesu8(&mut self, content: &[u8]) -> Value {
        string::new_string_from_cesu8(&mut self.heap, content)
    }

    pub fn create_symbol(&mut self, description: Value) -> Value {
        let description = value::copy_value_if_not_object(&mut self.heap, description);
        symbol::new_symbol(&mut self.heap, description)
    }

    pub fn create_bigint(&mut self, v: &num_bigint::BigInt) -> Value {
        bigint::new_bigint(&mut self.heap, v)
    }

    /// Create an ordinary, extensible object with no prototype.
    pub fn create_object(&mut self) -> Value {
        let cp = data::new_plain_object(
            &mut self.heap,
            ObjectType::General,
            CompressedPointer::NULL,
            true,
        );
        Value::from_object_record(cp)
    }

    /// Create an array. Lengths below the fast-array ceiling start in the
    /// flat-buffer layout.
    pub fn create_array(&mut self, length: u32) -> Value {
        let cp = array::new_array(&mut self.heap, length);
        Value::from_object_record(cp)
    }

    pub fn create_error(&mut self, kind: ErrorKind, message: &str) -> Value {
        let cp = error::new_error(&mut self.heap, kind, message);
        Value::from_object_record(cp)
    }

    /// Create a Number wrapper object holding the numeric payload.
    pub fn create_number_object(&mut self, v: f64) -> Value {
        let payload = self.create_number(v);
        let cp = data::new_class_object(
            &mut self.heap,
            CompressedPointer::NULL,
            ClassId::Number,
            0,
            payload.into_raw(),
        );
        Value::from_object_record(cp)
    }

    /// Create a String wrapper object over a string value.
    pub fn create_string_object(&mut self, s: Value) -> JsResult<Value> {
        if !s.is_string() {
            return Err(self.throw_type_error("Expected a string."));
        }
        let payload = value::copy_value(&mut self.heap, s);
        let cp = data::new_class_object(
            &mut self.heap,
            CompressedPointer::NULL,
            ClassId::String,
            0,
            payload.into_raw(),
        );
        Ok(Value::from_object_record(cp))
    }

    /// Create a Boolean wrapper object.
    pub fn create_boolean_object(&mut self, v: bool) -> Value {
        let cp = data::new_class_object(
            &mut self.heap,
            CompressedPointer::NULL,
            ClassId::Boolean,
            0,
            Value::from_boolean(v).into_raw(),
        );
        Value::from_object_record(cp)
    }

    /// Register a host handler as a callable function object.
    pub fn create_external_function(&mut self, handler: NativeFunction) -> Value {
        let cp = function::new_external_function(&mut self.heap, handler);
        Value::from_object_record(cp)
    }

    /// Attach native data (with an optional finalizer run at collection) to
    /// an external function.
    pub fn set_native_data(
        &mut self,
        function: Value,
        data: Box<dyn Any>,
        finalizer: Option<fn(Box<dyn Any>)>,
    ) -> bool {
        function::set_native_data(&mut self.heap, function, data, finalizer)
    }

    pub fn native_data(&self, function: Value) -> Option<&dyn Any> {
        function::native_data(&self.heap, function)
    }

    /// Throw: build an error object of `kind` and return it as a flagged
    /// error value.
    pub fn throw(&mut self, kind: ErrorKind, message: &str) -> JsError {
        let cp = error::new_error(&mut self.heap, kind, message);
        JsError(Value::from_object_record(cp).with_error_flag())
    }

    pub(crate) fn throw_type_error(&mut self, message: &str) -> JsError {
        self.throw(ErrorKind::Type, message)
    }

    pub(crate) fn throw_range_error(&mut self, message: &str) -> JsError {
        self.throw(ErrorKind::Range, message)
    }

    /// Kind of an error object created by this engine, if it is one.
    pub fn error_kind(&self, v: Value) -> Option<ErrorKind> {
        error::error_kind(&self.heap, v.without_error_flag())
    }

    // Conversions and predicates.

    /// ### [7.1.2 ToBoolean ( argument )](https://tc39.es/ecma262/#sec-toboolean)
    pub fn to_boolean(&self, v: Value) -> bool {
        if v.is_boolean() {
            return v.is_true();
        }
        if v.is_nullish() || v.is_simple() {
            return false;
        }
        if v.is_number() {
            let n = number::number_value(&self.heap, v);
            return !(n == 0.0 || n.is_nan());
        }
        if v.is_string() {
            return string::string_length(&self.heap, v) != 0;
        }
        if v.is_bigint() {
            return bigint::bigint_value(&self.heap, v) != num_bigint::BigInt::from(0);
        }
        // Objects and symbols.
        true
    }

    /// ### [7.1.4 ToNumber ( argument )](https://tc39.es/ecma262/#sec-tonumber)
    pub fn to_number(&mut self, v: Value) -> JsResult<f64> {
        if v.is_number() {
            return Ok(number::number_value(&self.heap, v));
        }
        if v.is_undefined() {
            return Ok(f64::NAN);
        }
        if v.is_null() {
            return Ok(0.0);
        }
        if v.is_boolean() {
            return Ok(if v.is_true() { 1.0 } else { 0.0 });
        }
        if v.is_string() {
            let mut scratch = string::StringScratch::default();
            let bytes = string::read_string(&self.heap, v, &mut scratch);
            return Ok(number::string_to_number(bytes));
        }
        if v.is_symbol() {
            return Err(self.throw_type_error("Cannot convert a Symbol to a number."));
        }
        if v.is_bigint() {
            return Err(self.throw_type_error("Cannot convert a BigInt to a number."));
        }
        debug_assert!(v.is_object());
        let primitive = internal_methods::to_primitive_number(self, v)?;
        let result = self.to_number(primitive);
        self.free_value(primitive);
        result
    }

    /// ### [7.1.6 ToInt32 ( argument )](https://tc39.es/ecma262/#sec-toint32)
    pub fn to_int32(&mut self, v: Value) -> JsResult<i32> {
        Ok(number::to_int32(self.to_number(v)?))
    }

    /// ### [7.1.7 ToUint32 ( argument )](https://tc39.es/ecma262/#sec-touint32)
    pub fn to_uint32(&mut self, v: Value) -> JsResult<u32> {
        Ok(number::to_uint32(self.to_number(v)?))
    }

    /// ### [7.1.20 ToLength ( argument )](https://tc39.es/ecma262/#sec-tolength)
    pub fn to_length(&mut self, v: Value) -> JsResult<u64> {
        Ok(number::to_length(self.to_number(v)?))
    }

    /// ### [7.1.17 ToString ( argument )](https://tc39.es/ecma262/#sec-tostring)
    ///
    /// Returns a string value owned by the caller.
    pub fn to_string_value(&mut self, v: Value) -> JsResult<Value> {
        if v.is_string() {
            return Ok(value::copy_value(&mut self.heap, v));
        }
        if v.is_undefined() {
            return Ok(Value::from_magic(MagicStringId::UNDEFINED));
        }
        if v.is_null() {
            return Ok(Value::from_magic(MagicStringId::NULL));
        }
        if v.is_boolean() {
            return Ok(Value::from_magic(if v.is_true() {
                MagicStringId::TRUE
            } else {
                MagicStringId::FALSE
            }));
        }
        if v.is_number() {
            let n = number::number_value(&self.heap, v);
            return Ok(number::number_to_string_value(&mut self.heap, n));
        }
        if v.is_symbol() {
            return Err(self.throw_type_error("Cannot convert a Symbol to a string."));
        }
        if v.is_bigint() {
            let text = bigint::bigint_value(&self.heap, v).to_string();
            return Ok(string::new_string_from_cesu8(&mut self.heap, text.as_bytes()));
        }
        debug_assert!(v.is_object());
        let primitive = internal_methods::to_primitive_string(self, v)?;
        let result = self.to_string_value(primitive);
        self.free_value(primitive);
        result
    }

    /// Copy a string value into a UTF-8 buffer, truncating on code point
    /// boundaries. Returns the number of bytes written.
    pub fn string_to_utf8(&self, v: Value, buffer: &mut [u8]) -> usize {
        debug_assert!(v.is_string());
        let mut scratch = string::StringScratch::default();
        let bytes = string::read_string(&self.heap, v, &mut scratch);
        crate::unicode::substring_to_utf8(bytes, buffer)
    }

    /// String content as an owned UTF-8 string.
    pub fn string_value(&self, v: Value) -> String {
        debug_assert!(v.is_string());
        let mut scratch = string::StringScratch::default();
        let bytes = string::read_string(&self.heap, v, &mut scratch);
        String::from_utf8(crate::unicode::cesu8_to_utf8(bytes).into_owned())
            .expect("CESU-8 content converts to valid UTF-8")
    }

    /// Numeric value of a number value word.
    pub fn number_value(&self, v: Value) -> f64 {
        number::number_value(&self.heap, v)
    }

    pub fn bigint_value(&self, v: Value) -> num_bigint::BigInt {
        bigint::bigint_value(&self.heap, v)
    }

    pub fn same_value(&self, a: Value, b: Value) -> bool {
        value::same_value(&self.heap, a, b)
    }

    pub fn same_value_zero(&self, a: Value, b: Value) -> bool {
        value::same_value_zero(&self.heap, a, b)
    }

    pub fn strict_equals(&self, a: Value, b: Value) -> bool {
        value::strict_equals(&self.heap, a, b)
    }

    pub fn is_callable(&self, v: Value) -> bool {
        function::is_callable(&self.heap, v)
    }

    pub fn is_constructor(&self, v: Value) -> bool {
        function::is_constructor(&self.heap, v)
    }

    /// ### [7.3.22 OrdinaryHasInstance ( C, O )](https://tc39.es/ecma262/#sec-ordinaryhasinstance)
    pub fn instance_of(&mut self, object: Value, constructor: Value) -> JsResult<bool> {
        function::ordinary_has_instance(self, constructor, object)
    }

    // Property access.

    /// Get a property by key value (string, symbol, or canonical numeric
    /// string). The result is owned by the caller.
    pub fn get_property(&mut self, object: Value, key: Value) -> JsResult<Value> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_get(self, object_cp, name, object);
        self.release_temp_key(temp);
        result
    }

    pub fn get_property_by_magic(&mut self, object: Value, id: MagicStringId) -> JsResult<Value> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_get(self, object_cp, PropertyName::Magic(id), object)
    }

    pub fn get_property_by_index(&mut self, object: Value, index: u32) -> JsResult<Value> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_get(self, object_cp, PropertyName::Index(index), object)
    }

    /// Set a property. Returns false when the set is rejected.
    pub fn set_property(&mut self, object: Value, key: Value, v: Value) -> JsResult<bool> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_set(self, object_cp, name, v, object, false);
        self.release_temp_key(temp);
        result
    }

    pub fn set_property_by_index(&mut self, object: Value, index: u32, v: Value) -> JsResult<bool> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_set(self, object_cp, PropertyName::Index(index), v, object, false)
    }

    pub fn set_property_by_magic(
        &mut self,
        object: Value,
        id: MagicStringId,
        v: Value,
    ) -> JsResult<bool> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_set(self, object_cp, PropertyName::Magic(id), v, object, false)
    }

    pub fn has_property(&mut self, object: Value, key: Value) -> JsResult<bool> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_has(self, object_cp, name);
        self.release_temp_key(temp);
        result
    }

    pub fn delete_property(&mut self, object: Value, key: Value) -> JsResult<bool> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_delete(self, object_cp, name, false);
        self.release_temp_key(temp);
        result
    }

    pub fn define_own_property(
        &mut self,
        object: Value,
        key: Value,
        descriptor: &PropertyDescriptor,
    ) -> JsResult<bool> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_define_own(self, object_cp, name, descriptor);
        self.release_temp_key(temp);
        result
    }

    /// Returns the own property descriptor; value/getter/setter fields are
    /// owned by the caller.
    pub fn get_own_property_descriptor(
        &mut self,
        object: Value,
        key: Value,
    ) -> JsResult<Option<PropertyDescriptor>> {
        let (object_cp, name, temp) = self.to_object_and_name(object, key)?;
        let result = internal_methods::internal_get_own_descriptor(self, object_cp, name);
        self.release_temp_key(temp);
        result
    }

    /// Own property keys in specification order. Each key value is owned by
    /// the caller.
    pub fn own_keys(&mut self, object: Value) -> JsResult<Vec<Value>> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_own_keys(self, object_cp)
    }

    pub fn get_prototype(&mut self, object: Value) -> JsResult<Value> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_get_prototype_of(self, object_cp)
    }

    pub fn set_prototype(&mut self, object: Value, prototype: Value) -> JsResult<bool> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_set_prototype_of(self, object_cp, prototype)
    }

    pub fn is_extensible(&mut self, object: Value) -> JsResult<bool> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_is_extensible(self, object_cp)
    }

    pub fn prevent_extensions(&mut self, object: Value) -> JsResult<bool> {
        let object_cp = self.expect_object(object)?;
        internal_methods::internal_prevent_extensions(self, object_cp)
    }

    // Callables.

    pub fn call_function(&mut self, func: Value, this: Value, args: &[Value]) -> JsResult<Value> {
        function::call(self, func, this, args)
    }

    pub fn construct_object(&mut self, constructor: Value, args: &[Value]) -> JsResult<Value> {
        function::construct(self, constructor, args)
    }

    /// Enter an engine-internal call frame, guarding the depth limit.
    pub(crate) fn enter_call(&mut self) -> JsResult<()> {
        if self.call_depth >= CALL_DEPTH_LIMIT {
            return Err(self.throw(
                ErrorKind::StackOverflow,
                "Maximum call stack size exceeded.",
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    pub(crate) fn leave_call(&mut self) {
        debug_assert!(self.call_depth > 0);
        self.call_depth -= 1;
    }

    // Environments.

    /// The global object. The returned value is owned by the caller.
    pub fn global_object(&mut self) -> Value {
        let env = self.heap.global_env;
        let object_cp = data::property_list(&self.heap, env);
        objects::ref_object(&mut self.heap, object_cp);
        Value::from_object_record(object_cp)
    }

    pub fn global_environment(&self) -> Environment {
        Environment(self.heap.global_env)
    }

    #[cfg(feature = "mem-stats")]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // Internal helpers.

    pub(crate) fn expect_object(&mut self, v: Value) -> JsResult<CompressedPointer> {
        if !v.is_object() {
            return Err(self.throw_type_error("Expected an object."));
        }
        Ok(v.heap_pointer())
    }

    /// Split an API (object, key) pair into internals, converting numeric
    /// keys through their canonical string form. The third element is a
    /// temporary string the name borrows; the caller releases it with
    /// [`Agent::release_temp_key`] after the operation.
    fn to_object_and_name(
        &mut self,
        object: Value,
        key: Value,
    ) -> JsResult<(CompressedPointer, PropertyName, Option<Value>)> {
        let object_cp = self.expect_object(object)?;
        if let Some(name) = PropertyName::from_value(&self.heap, key) {
            return Ok((object_cp, name, None));
        }
        if key.is_number() {
            let n = number::number_value(&self.heap, key);
            if n.trunc() == n && (0.0..4294967295.0).contains(&n) {
                return Ok((object_cp, PropertyName::Index(n as u32), None));
            }
            let as_string = self.to_string_value(key)?;
            let name = PropertyName::from_value(&self.heap, as_string)
                .expect("number converts to a string name");
            return Ok((object_cp, name, Some(as_string)));
        }
        Err(self.throw_type_error("Property key must be a string, symbol or number."))
    }

    fn release_temp_key(&mut self, temp: Option<Value>) {
        if let Some(temp) = temp {
            self.free_value(temp);
        }
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        // Context slots deinitialize in reverse registration order.
        for index in (0..self.slots.len()).rev() {
            if let (Some(data), Some(deinit)) = (self.slots[index].take(), self.slot_deinits[index])
            {
                deinit(data);
            }
        }
        // Return cached pool chunks; the arena itself drops with the heap.
        let Heap {
            allocator, pools, ..
        } = &mut self.heap;
        pools.finalize(allocator);
    }
}

/// An opaque lexical environment handle. Environments are engine objects;
/// the handle owns one reference, released with
/// [`Agent::free_environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment(pub(crate) CompressedPointer);

impl Agent {
    /// ### [9.1.2.2 NewDeclarativeEnvironment ( E )](https://tc39.es/ecma262/#sec-newdeclarativeenvironment)
    pub fn new_declarative_environment(&mut self, outer: Option<Environment>) -> Environment {
        let outer_cp = outer.map_or(CompressedPointer::NULL, |env| env.0);
        Environment(environments::new_declarative_environment_raw(
            &mut self.heap,
            outer_cp,
        ))
    }

    /// ### [9.1.2.3 NewObjectEnvironment ( O, W, E )](https://tc39.es/ecma262/#sec-newobjectenvironment)
    pub fn new_object_environment(
        &mut self,
        object: Value,
        provide_this: bool,
        outer: Option<Environment>,
    ) -> JsResult<Environment> {
        let object_cp = self.expect_object(object)?;
        let outer_cp = outer.map_or(CompressedPointer::NULL, |env| env.0);
        Ok(Environment(environments::new_object_environment_raw(
            &mut self.heap,
            object_cp,
            provide_this,
            outer_cp,
        )))
    }

    /// Release an environment handle created by this agent.
    pub fn free_environment(&mut self, env: Environment) {
        debug_assert_ne!(env.0, self.heap.global_env);
        objects::deref_object(&mut self.heap, env.0);
    }

    pub fn has_binding(&mut self, env: Environment, name: Value) -> JsResult<bool> {
        environments::has_binding(self, env.0, name)
    }

    pub fn create_mutable_binding(
        &mut self,
        env: Environment,
        name: Value,
        is_deletable: bool,
    ) -> JsResult<()> {
        environments::create_mutable_binding(self, env.0, name, is_deletable)
    }

    pub fn create_immutable_binding(&mut self, env: Environment, name: Value) -> JsResult<()> {
        environments::create_immutable_binding(self, env.0, name)
    }

    pub fn initialize_binding(&mut self, env: Environment, name: Value, v: Value) -> JsResult<()> {
        environments::initialize_binding(self, env.0, name, v)
    }

    pub fn set_mutable_binding(
        &mut self,
        env: Environment,
        name: Value,
        v: Value,
        is_strict: bool,
    ) -> JsResult<()> {
        environments::set_mutable_binding(self, env.0, name, v, is_strict)
    }

    /// The bound value, owned by the caller.
    pub fn get_binding_value(
        &mut self,
        env: Environment,
        name: Value,
        is_strict: bool,
    ) -> JsResult<Value> {
        environments::get_binding_value(self, env.0, name, is_strict)
    }

    pub fn delete_binding(&mut self, env: Environment, name: Value) -> JsResult<bool> {
        environments::delete_binding(self, env.0, name)
    }

    /// The implicit `this` of a call resolved through the environment:
    /// the bound object of a provide-this object environment, undefined
    /// otherwise. Owned by the caller.
    pub fn implicit_this_value(&mut self, env: Environment) -> Value {
        environments::implicit_this_value(self, env.0)
    }
}
