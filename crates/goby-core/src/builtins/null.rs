//! Null builtins

use super::{boolean, Call};
use crate::class::{Builtin, ClassId};
use crate::value::Value;
use crate::vm::ClassRegistry;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("!", |c| {
        c.expect_argc(0)?;
        Ok(boolean(true))
    }),
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.args[0].is_null()))
    }),
    Builtin::new("!=", |c| {
        c.expect_argc(1)?;
        Ok(boolean(!c.args[0].is_null()))
    }),
    Builtin::new("inspect", |c| {
        c.expect_argc(0)?;
        Ok(Value::string("nil"))
    }),
    Builtin::new("nil?", |c| {
        c.expect_argc(0)?;
        Ok(boolean(true))
    }),
    Builtin::new("to_a", |c| {
        c.expect_argc(0)?;
        Ok(Value::array(Vec::new()))
    }),
    Builtin::new("to_i", |c| {
        c.expect_argc(0)?;
        Ok(Value::int(0))
    }),
    Builtin::new("to_s", to_s),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::NULL, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::NULL, CLASS_METHODS, true);
}

/// Null prints as the empty string through `to_s`
fn to_s(call: &mut Call<'_>) -> super::BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::string(""))
}
