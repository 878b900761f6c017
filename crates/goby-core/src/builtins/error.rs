//! Error builtins
//!
//! Error values are produced by failing operations and by `raise`; they
//! cannot be built with `new`, since an error on the stack top unwinds.

use super::{BuiltinResult, Call};
use crate::class::{Builtin, ClassId};
use crate::value::Value;
use crate::vm::ClassRegistry;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("line", |c| this(c, |e| Value::int(e.line() as i64))),
    Builtin::new("message", |c| this(c, |e| Value::string(e.message()))),
    Builtin::new("to_s", |c| this(c, |e| Value::string(e.to_string()))),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::ERROR, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::ERROR, CLASS_METHODS, true);
}

fn this(call: &mut Call<'_>, f: fn(&crate::error::ErrorObject) -> Value) -> BuiltinResult {
    call.expect_argc(0)?;
    match &call.receiver {
        Value::Error(e) => Ok(f(e)),
        other => Err(call.wrong_type("Error", other)),
    }
}
