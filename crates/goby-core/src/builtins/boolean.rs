//! Boolean builtins
//!
//! `&&` and `||` here receive an already evaluated operand; short-circuit
//! forms compile to branches instead.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::value::Value;
use crate::vm::ClassRegistry;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("!", |c| {
        c.expect_argc(0)?;
        Ok(boolean(!this(c)?))
    }),
    Builtin::new("==", |c| equality(c, true)),
    Builtin::new("!=", |c| equality(c, false)),
    Builtin::new("&&", |c| logic(c, |a, b| a && b)),
    Builtin::new("||", |c| logic(c, |a, b| a || b)),
    Builtin::new("to_s", |c| {
        c.expect_argc(0)?;
        Ok(Value::string(this(c)?.to_string()))
    }),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::BOOLEAN, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::BOOLEAN, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<bool, Interrupt> {
    call.receiver
        .as_bool()
        .ok_or_else(|| call.wrong_type("Boolean", &call.receiver))
}

fn equality(call: &mut Call<'_>, expected: bool) -> BuiltinResult {
    call.expect_argc(1)?;
    let equal = call.receiver.equals(&call.args[0]);
    Ok(boolean(equal == expected))
}

fn logic(call: &mut Call<'_>, op: fn(bool, bool) -> bool) -> BuiltinResult {
    call.expect_argc(1)?;
    let left = this(call)?;
    let right = call.arg(0);
    match right.as_bool() {
        Some(right) => Ok(boolean(op(left, right))),
        None => Err(call.wrong_type("Boolean", &right)),
    }
}
