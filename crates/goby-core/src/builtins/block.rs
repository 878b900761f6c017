//! Block and Method builtins

use super::{BuiltinResult, Call};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::object::BlockObject;
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::sync::Arc;

const BLOCK_METHODS: &[Builtin] = &[Builtin::new("call", call_block)];

const BLOCK_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_block)];

const METHOD_METHODS: &[Builtin] = &[
    Builtin::new("arity", |c| match &c.receiver {
        Value::Method(m) => Ok(Value::int(m.argc as i64)),
        other => Err(c.wrong_type("Method", other)),
    }),
    Builtin::new("name", |c| match &c.receiver {
        Value::Method(m) => Ok(Value::string(m.name.as_str())),
        other => Err(c.wrong_type("Method", other)),
    }),
    Builtin::new("to_s", |c| Ok(Value::string(c.to_s(&c.receiver)))),
];

const METHOD_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::BLOCK, BLOCK_METHODS, false);
    classes.install_builtin(ClassId::BLOCK, BLOCK_CLASS_METHODS, true);
    classes.install_builtin(ClassId::METHOD, METHOD_METHODS, false);
    classes.install_builtin(ClassId::METHOD, METHOD_CLASS_METHODS, true);
}

/// `Block.new { }` reifies the attached block
fn new_block(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    match call.block.clone() {
        Some(frame) => Ok(Value::Block(Arc::new(BlockObject::new(frame)))),
        None => Err(call.error(
            ErrorKind::InternalError,
            "Can't initialize block object without block argument",
        )),
    }
}

/// Run the block with the call's arguments
fn call_block(call: &mut Call<'_>) -> BuiltinResult {
    let frame = match &call.receiver {
        Value::Block(b) => b.frame.clone(),
        other => return Err(call.wrong_type("Block", other)),
    };
    let args = std::mem::take(&mut call.args);
    call.call_block(&frame, args)
}
