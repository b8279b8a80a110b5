// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callables: external (host) functions, bytecode functions and arrow
//! functions dispatched through the embedding interpreter hook, and bound
//! functions. Proxy call/construct forwards from here into the proxy
//! module.

use core::any::Any;

use crate::heap::Heap;
use crate::heap::pointer::CompressedPointer;
use crate::ecmascript::builtins::proxy;
use crate::ecmascript::execution::{Agent, Environment, JsResult, NativeFunction};
use crate::ecmascript::execution::agent::{ExternalFunctionEntry, NativeDataEntry};
use crate::ecmascript::objects::data::{
    self, ArrowFunctionRecord, BoundFunctionRecord, ExternalFunctionRecord, FunctionRecord,
    ObjectType,
};
use crate::ecmascript::types::{MagicStringId, Value, value};

/// Opaque bytecode container referenced by function records.
#[repr(C)]
pub(crate) struct BytecodeRecord {
    pub(crate) size: u32,
    _padding: u32,
    // size bytes follow.
}

pub(crate) const BYTECODE_HEADER_SIZE: usize = core::mem::size_of::<BytecodeRecord>();

pub(crate) fn bytecode_record_size(heap: &Heap, cp: CompressedPointer) -> usize {
    // SAFETY: cp references a live bytecode record.
    BYTECODE_HEADER_SIZE + unsafe { (*heap.deref::<BytecodeRecord>(cp)).size } as usize
}

fn alloc_bytecode(heap: &mut Heap, bytecode: &[u8]) -> CompressedPointer {
    let ptr = heap.alloc(BYTECODE_HEADER_SIZE + bytecode.len());
    // SAFETY: a fresh block large enough for the header and the body.
    unsafe {
        ptr.cast::<BytecodeRecord>().write(BytecodeRecord {
            size: bytecode.len() as u32,
            _padding: 0,
        });
        core::ptr::copy_nonoverlapping(
            bytecode.as_ptr(),
            ptr.as_ptr().add(BYTECODE_HEADER_SIZE),
            bytecode.len(),
        );
    }
    heap.compress(ptr)
}

/// Register a host handler as a callable function object.
pub(crate) fn new_external_function(heap: &mut Heap, handler: NativeFunction) -> CompressedPointer {
    let handler_index = heap.external_functions.len() as u32;
    heap.external_functions.push(Some(ExternalFunctionEntry {
        function: handler,
        native_data: None,
    }));

    let ptr = heap.alloc(core::mem::size_of::<ExternalFunctionRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<ExternalFunctionRecord>() as isize);
    let record = ptr.as_ptr() as *mut ExternalFunctionRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::ExternalFunction,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).handler_index = handler_index;
    }
    cp
}

/// Create a bytecode function closing over `scope`. Calls route to the
/// embedding interpreter hook.
pub(crate) fn new_bytecode_function(
    heap: &mut Heap,
    scope: CompressedPointer,
    bytecode: &[u8],
) -> CompressedPointer {
    let bytecode_cp = alloc_bytecode(heap, bytecode);
    let ptr = heap.alloc(core::mem::size_of::<FunctionRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<FunctionRecord>() as isize);
    let record = ptr.as_ptr() as *mut FunctionRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::Function,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).scope_cp = scope.into_raw();
        (*record).bytecode_cp = bytecode_cp.into_raw();
    }
    cp
}

/// Create an arrow function capturing `this`.
pub(crate) fn new_arrow_function(
    heap: &mut Heap,
    scope: CompressedPointer,
    bytecode: &[u8],
    this_value: Value,
) -> CompressedPointer {
    let bytecode_cp = alloc_bytecode(heap, bytecode);
    let stored_this = value::copy_value_if_not_object(heap, this_value);
    let ptr = heap.alloc(core::mem::size_of::<ArrowFunctionRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<ArrowFunctionRecord>() as isize);
    let record = ptr.as_ptr() as *mut ArrowFunctionRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::ArrowFunction,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).scope_cp = scope.into_raw();
        (*record).bytecode_cp = bytecode_cp.into_raw();
        (*record).this_value = stored_this.into_raw();
    }
    cp
}

/// ### [10.4.1.3 BoundFunctionCreate ( targetFunction, boundThis, boundArgs )](https://tc39.es/ecma262/#sec-boundfunctioncreate)
pub(crate) fn new_bound_function(
    heap: &mut Heap,
    target: CompressedPointer,
    bound_this: Value,
    bound_args: &[Value],
) -> CompressedPointer {
    // The argument block holds the bound this followed by the arguments.
    let block_len = 1 + bound_args.len();
    let block = heap.alloc(block_len * 4);
    let args_cp = heap.compress(block);
    // SAFETY: a fresh block of block_len values.
    unsafe {
        let base = block.as_ptr() as *mut u32;
        let stored_this = value::copy_value_if_not_object(heap, bound_this);
        base.write(stored_this.into_raw());
        for (index, arg) in bound_args.iter().enumerate() {
            let stored = value::copy_value_if_not_object(heap, *arg);
            base.add(1 + index).write(stored.into_raw());
        }
    }

    let ptr = heap.alloc(core::mem::size_of::<BoundFunctionRecord>());
    #[cfg(feature = "mem-stats")]
    heap.allocator
        .stat_object_bytes(core::mem::size_of::<BoundFunctionRecord>() as isize);
    let record = ptr.as_ptr() as *mut BoundFunctionRecord;
    let cp = data::init_object_record(
        heap,
        record as *mut data::ObjectRecord,
        ObjectType::BoundFunction,
        CompressedPointer::NULL,
        true,
    );
    // SAFETY: record is the fresh allocation.
    unsafe {
        (*record).target_cp = target.into_raw();
        (*record).args_count = bound_args.len() as u16;
        (*record).args_cp = args_cp.into_raw();
    }
    cp
}

/// Values of a bound function's argument block: `(bound_this, bound_args)`.
pub(crate) fn bound_function_args(heap: &Heap, cp: CompressedPointer) -> (Value, Vec<Value>) {
    // SAFETY: cp references a live bound function record and its block.
    unsafe {
        let record = heap.deref::<BoundFunctionRecord>(cp);
        let count = (*record).args_count as usize;
        let base = heap
            .decompress(CompressedPointer::from_raw((*record).args_cp))
            .as_ptr() as *const u32;
        let bound_this = Value::from_raw(base.read());
        let mut args = Vec::with_capacity(count);
        for index in 0..count {
            args.push(Value::from_raw(base.add(1 + index).read()));
        }
        (bound_this, args)
    }
}

/// ### [7.2.3 IsCallable ( argument )](https://tc39.es/ecma262/#sec-iscallable)
pub(crate) fn is_callable(heap: &Heap, v: Value) -> bool {
    if !v.is_object() {
        return false;
    }
    let cp = v.heap_pointer();
    match data::object_type(heap, cp) {
        ObjectType::Function
        | ObjectType::ExternalFunction
        | ObjectType::ArrowFunction
        | ObjectType::BoundFunction => true,
        ObjectType::Proxy => {
            let (target, _) = proxy::proxy_parts(heap, cp);
            !target.is_null() && is_callable(heap, Value::from_object_record(target))
        }
        _ => false,
    }
}

/// ### [7.2.4 IsConstructor ( argument )](https://tc39.es/ecma262/#sec-isconstructor)
pub(crate) fn is_constructor(heap: &Heap, v: Value) -> bool {
    if !v.is_object() {
        return false;
    }
    let cp = v.heap_pointer();
    match data::object_type(heap, cp) {
        // Arrow functions are callable but never constructors.
        ObjectType::Function | ObjectType::ExternalFunction => true,
        ObjectType::BoundFunction => {
            // SAFETY: cp references a live bound function record.
            let target = unsafe { (*heap.deref::<BoundFunctionRecord>(cp)).target_cp };
            is_constructor(
                heap,
                Value::from_object_record(CompressedPointer::from_raw(target)),
            )
        }
        ObjectType::Proxy => {
            let (target, _) = proxy::proxy_parts(heap, cp);
            !target.is_null() && is_constructor(heap, Value::from_object_record(target))
        }
        _ => false,
    }
}

/// ### [7.3.14 Call ( F, V [ , argumentsList ] )](https://tc39.es/ecma262/#sec-call)
pub(crate) fn call(agent: &mut Agent, func: Value, this: Value, args: &[Value]) -> JsResult<Value> {
    if !is_callable(&agent.heap, func) {
        return Err(agent.throw_type_error("Value is not callable."));
    }
    agent.enter_call()?;
    let result = dispatch_call(agent, func.heap_pointer(), this, args);
    agent.leave_call();
    result
}

fn dispatch_call(
    agent: &mut Agent,
    func_cp: CompressedPointer,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    match data::object_type(&agent.heap, func_cp) {
        ObjectType::ExternalFunction => {
            // SAFETY: func_cp references a live external function record.
            let index =
                unsafe { (*agent.heap.deref::<ExternalFunctionRecord>(func_cp)).handler_index };
            let handler = agent.heap.external_functions[index as usize]
                .as_ref()
                .expect("live function record with a freed handler slot")
                .function;
            handler(agent, this, args)
        }
        ObjectType::BoundFunction => {
            // SAFETY: func_cp references a live bound function record.
            let target =
                unsafe { (*agent.heap.deref::<BoundFunctionRecord>(func_cp)).target_cp };
            let (bound_this, bound_args) = bound_function_args(&agent.heap, func_cp);
            let mut combined = bound_args;
            combined.extend_from_slice(args);
            call(
                agent,
                Value::from_object_record(CompressedPointer::from_raw(target)),
                bound_this,
                &combined,
            )
        }
        ObjectType::ArrowFunction => {
            // SAFETY: func_cp references a live arrow function record.
            let captured_this =
                Value::from_raw(unsafe {
                    (*agent.heap.deref::<ArrowFunctionRecord>(func_cp)).this_value
                });
            run_bytecode(agent, func_cp, captured_this, args)
        }
        ObjectType::Function => run_bytecode(agent, func_cp, this, args),
        ObjectType::Proxy => proxy::proxy_call(agent, func_cp, this, args),
        _ => unreachable!("dispatch_call on a non-callable"),
    }
}

fn run_bytecode(
    agent: &mut Agent,
    func_cp: CompressedPointer,
    this: Value,
    args: &[Value],
) -> JsResult<Value> {
    let Some(hook) = agent.bytecode_exec else {
        return Err(
            agent.throw_type_error("No interpreter is attached to this context.")
        );
    };
    hook(agent, Value::from_object_record(func_cp), this, args)
}

/// ### [7.3.15 Construct ( F [ , argumentsList ] )](https://tc39.es/ecma262/#sec-construct)
pub(crate) fn construct(agent: &mut Agent, constructor: Value, args: &[Value]) -> JsResult<Value> {
    if !is_constructor(&agent.heap, constructor) {
        return Err(agent.throw_type_error("Value is not a constructor."));
    }
    let ctor_cp = constructor.heap_pointer();
    if data::object_type(&agent.heap, ctor_cp) == ObjectType::Proxy {
        agent.enter_call()?;
        let result = proxy::proxy_construct(agent, ctor_cp, args);
        agent.leave_call();
        return result;
    }

    // OrdinaryCreateFromConstructor: the new object's prototype is the
    // constructor's "prototype" property when it is an object.
    let proto_value = agent.get_property_by_magic(constructor, MagicStringId::PROTOTYPE)?;
    let proto_cp = if proto_value.is_object() {
        proto_value.heap_pointer()
    } else {
        CompressedPointer::NULL
    };
    let this_cp = data::new_plain_object(&mut agent.heap, ObjectType::General, proto_cp, true);
    let this = Value::from_object_record(this_cp);
    agent.free_value(proto_value);

    let result = call(agent, constructor, this, args);
    match result {
        Ok(value) if value.is_object() => {
            agent.free_value(this);
            Ok(value)
        }
        Ok(value) => {
            agent.free_value(value);
            Ok(this)
        }
        Err(error) => {
            agent.free_value(this);
            Err(error)
        }
    }
}

/// ### [7.3.22 OrdinaryHasInstance ( C, O )](https://tc39.es/ecma262/#sec-ordinaryhasinstance)
pub(crate) fn ordinary_has_instance(
    agent: &mut Agent,
    constructor: Value,
    object: Value,
) -> JsResult<bool> {
    if !is_callable(&agent.heap, constructor) {
        return Err(agent.throw_type_error("Right-hand side of instanceof is not callable."));
    }
    let ctor_cp = constructor.heap_pointer();
    if data::object_type(&agent.heap, ctor_cp) == ObjectType::BoundFunction {
        // SAFETY: ctor_cp references a live bound function record.
        let target = unsafe { (*agent.heap.deref::<BoundFunctionRecord>(ctor_cp)).target_cp };
        return ordinary_has_instance(
            agent,
            Value::from_object_record(CompressedPointer::from_raw(target)),
            object,
        );
    }
    if !object.is_object() {
        return Ok(false);
    }
    let proto_value = agent.get_property_by_magic(constructor, MagicStringId::PROTOTYPE)?;
    if !proto_value.is_object() {
        agent.free_value(proto_value);
        return Err(agent.throw_type_error("Constructor prototype is not an object."));
    }
    let target_proto = proto_value.heap_pointer();

    let mut current = data::prototype_of(&agent.heap, object.heap_pointer());
    let mut found = false;
    while !current.is_null() {
        if current == target_proto {
            found = true;
            break;
        }
        current = data::prototype_of(&agent.heap, current);
    }
    agent.free_value(proto_value);
    Ok(found)
}

/// Attach native data to an external function object.
pub(crate) fn set_native_data(
    heap: &mut Heap,
    func: Value,
    payload: Box<dyn Any>,
    finalizer: Option<fn(Box<dyn Any>)>,
) -> bool {
    if !func.is_object() {
        return false;
    }
    let cp = func.heap_pointer();
    if data::object_type(heap, cp) != ObjectType::ExternalFunction {
        return false;
    }
    // SAFETY: cp references a live external function record.
    let index = unsafe { (*heap.deref::<ExternalFunctionRecord>(cp)).handler_index };
    let entry = heap.external_functions[index as usize]
        .as_mut()
        .expect("live function record with a freed handler slot");
    entry.native_data = Some(NativeDataEntry {
        data: payload,
        finalizer,
    });
    true
}

pub(crate) fn native_data<'a>(heap: &'a Heap, func: Value) -> Option<&'a dyn Any> {
    if !func.is_object() {
        return None;
    }
    let cp = func.heap_pointer();
    if data::object_type(heap, cp) != ObjectType::ExternalFunction {
        return None;
    }
    // SAFETY: cp references a live external function record.
    let index = unsafe { (*heap.deref::<ExternalFunctionRecord>(cp)).handler_index };
    heap.external_functions[index as usize]
        .as_ref()?
        .native_data
        .as_ref()
        .map(|entry| &*entry.data)
}

/// Bytecode body of a function object, for the interpreter hook.
pub(crate) fn function_bytecode<'a>(heap: &'a Heap, func: Value) -> Option<&'a [u8]> {
    if !func.is_object() {
        return None;
    }
    let cp = func.heap_pointer();
    let bytecode_cp = match data::object_type(heap, cp) {
        // SAFETY: cp references the matching live record in both arms.
        ObjectType::Function => unsafe { (*heap.deref::<FunctionRecord>(cp)).bytecode_cp },
        ObjectType::ArrowFunction => unsafe {
            (*heap.deref::<ArrowFunctionRecord>(cp)).bytecode_cp
        },
        _ => return None,
    };
    if bytecode_cp == 0 {
        return None;
    }
    let record_cp = CompressedPointer::from_raw(bytecode_cp);
    // SAFETY: the bytecode record is live while its function is.
    unsafe {
        let size = (*heap.deref::<BytecodeRecord>(record_cp)).size as usize;
        let base = heap.decompress(record_cp).as_ptr().add(BYTECODE_HEADER_SIZE);
        Some(core::slice::from_raw_parts(base, size))
    }
}

/// The scope environment a function closes over.
pub(crate) fn function_scope(heap: &Heap, func: Value) -> Option<Environment> {
    if !func.is_object() {
        return None;
    }
    let cp = func.heap_pointer();
    let scope = match data::object_type(heap, cp) {
        // SAFETY: cp references the matching live record in both arms.
        ObjectType::Function => unsafe { (*heap.deref::<FunctionRecord>(cp)).scope_cp },
        ObjectType::ArrowFunction => unsafe { (*heap.deref::<ArrowFunctionRecord>(cp)).scope_cp },
        _ => return None,
    };
    if scope == 0 {
        return None;
    }
    Some(Environment(CompressedPointer::from_raw(scope)))
}

impl Agent {
    /// ### [20.2.3.2 Function.prototype.bind ( thisArg, ...args )](https://tc39.es/ecma262/#sec-function.prototype.bind)
    /// as an engine operation.
    pub fn create_bound_function(
        &mut self,
        target: Value,
        bound_this: Value,
        bound_args: &[Value],
    ) -> JsResult<Value> {
        if !is_callable(&self.heap, target) {
            return Err(self.throw_type_error("Bind target is not callable."));
        }
        Ok(Value::from_object_record(new_bound_function(
            &mut self.heap,
            target.heap_pointer(),
            bound_this,
            bound_args,
        )))
    }

    /// Create a bytecode function for the embedding interpreter, closing
    /// over `scope` (the global environment by default).
    pub fn create_function(&mut self, bytecode: &[u8], scope: Option<Environment>) -> Value {
        let scope_cp = scope.map_or(self.heap.global_env, |env| env.0);
        Value::from_object_record(new_bytecode_function(&mut self.heap, scope_cp, bytecode))
    }

    /// Create an arrow function capturing `this`.
    pub fn create_arrow_function(
        &mut self,
        bytecode: &[u8],
        scope: Option<Environment>,
        this_value: Value,
    ) -> Value {
        let scope_cp = scope.map_or(self.heap.global_env, |env| env.0);
        Value::from_object_record(new_arrow_function(
            &mut self.heap,
            scope_cp,
            bytecode,
            this_value,
        ))
    }

    /// Bytecode body of a function object, for the interpreter hook.
    pub fn function_bytecode(&self, func: Value) -> Option<Vec<u8>> {
        function_bytecode(&self.heap, func).map(<[u8]>::to_vec)
    }

    /// Scope environment of a bytecode function, for the interpreter hook.
    pub fn function_scope(&self, func: Value) -> Option<Environment> {
        function_scope(&self.heap, func)
    }
}
