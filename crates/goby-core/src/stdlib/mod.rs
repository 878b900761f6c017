//! Standard library loader
//!
//! `require "name"` looks the name up in a fixed registry and runs the
//! library's initializer once per VM. Libraries that depend on services the
//! core runtime does not embed are registered without an initializer.

mod concurrent;
mod json;
mod rw_lock;

use crate::builtins::{BuiltinResult, Call};
use crate::class::ClassId;
use crate::error::ErrorKind;
use crate::value::Value;
use crate::vm::ClassRegistry;

/// Initializer of a native library
type Initializer = fn(&ClassRegistry);

const LIBRARIES: &[(&str, Option<Initializer>)] = &[
    ("concurrent/array", Some(concurrent::install_array)),
    ("concurrent/hash", Some(concurrent::install_hash)),
    ("concurrent/rw_lock", Some(rw_lock::install)),
    ("db", None),
    ("json", Some(json::install)),
    ("net/http", None),
    ("net/simple_server", None),
    ("plugin", None),
    ("spec", None),
    ("uri", None),
];

/// Names of every registered library
pub fn library_names() -> impl Iterator<Item = &'static str> {
    LIBRARIES.iter().map(|(name, _)| *name)
}

/// `require(name)`: true when the library was loaded by this call
pub(crate) fn require(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let name = call.str_arg(0)?;
    let Some((_, initializer)) = LIBRARIES.iter().find(|(n, _)| **n == *name) else {
        return Err(call.error(
            ErrorKind::NameError,
            format!("Can't require \"{}\"", name),
        ));
    };
    let Some(initializer) = initializer else {
        return Err(call.error(
            ErrorKind::InternalError,
            format!("Library {} is not available in this runtime", name),
        ));
    };

    let context = call.context();
    if !context.mark_library_loaded(&name) {
        return Ok(Value::Boolean(false));
    }
    initializer(&context.classes);
    log::debug!("loaded library {}", name);
    Ok(Value::Boolean(true))
}

/// Module bound as constant `name` of Object, created on first use
fn namespace(classes: &ClassRegistry, name: &str) -> ClassId {
    match classes.constant(ClassId::OBJECT, name) {
        Some(Value::Class(id)) => id,
        _ => classes.define_class(name, true, ClassId::OBJECT),
    }
}
