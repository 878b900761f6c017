//! Class builtins
//!
//! Installed as instance methods of `Class`, so every class and module
//! reaches them through the class-method fallback.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId, MethodRef};
use crate::error::ErrorKind;
use crate::object::InstanceObject;
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("ancestors", ancestors),
    Builtin::new("attr_accessor", |c| define_accessors(c, true, true)),
    Builtin::new("attr_reader", |c| define_accessors(c, true, false)),
    Builtin::new("attr_writer", |c| define_accessors(c, false, true)),
    Builtin::new("extend", extend),
    Builtin::new("include", include),
    Builtin::new("instance_methods", instance_methods),
    Builtin::new("method_defined?", method_defined),
    Builtin::new("name", |c| {
        c.expect_argc(0)?;
        let class = this(c)?;
        Ok(Value::string(c.classes().name(class)))
    }),
    Builtin::new("new", new_instance),
    Builtin::new("superclass", superclass),
];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::CLASS, INSTANCE_METHODS, false);
}

fn this(call: &Call<'_>) -> Result<ClassId, Interrupt> {
    call.receiver
        .as_class()
        .ok_or_else(|| call.wrong_type("Class", &call.receiver))
}

fn module_arg(call: &Call<'_>, index: usize) -> Result<ClassId, Interrupt> {
    let module = call.class_arg(index)?;
    if !call.classes().is_module(module) {
        let name = call.classes().name(module);
        return Err(call.error(
            ErrorKind::TypeError,
            format!("Expect argument to be a module. got: {}", name),
        ));
    }
    Ok(module)
}

/// Allocate an instance and run its `initialize`, if any
fn new_instance(call: &mut Call<'_>) -> BuiltinResult {
    let class = this(call)?;
    if call.classes().is_module(class) {
        return Err(call.unsupported());
    }

    let instance = Value::Instance(Arc::new(InstanceObject::new(class)));
    if call
        .classes()
        .lookup_instance_method(class, "initialize")
        .is_some()
    {
        let args = std::mem::take(&mut call.args);
        let block = call.block.clone();
        call.call_method(instance.clone(), "initialize", args, block)?;
    }
    Ok(instance)
}

fn superclass(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let class = this(call)?;
    let classes = call.classes();
    Ok(classes
        .superclass(classes.real_class(class))
        .map(Value::Class)
        .unwrap_or_default())
}

fn ancestors(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let class = this(call)?;
    let chain = call
        .classes()
        .ancestors(class)
        .into_iter()
        .map(Value::Class)
        .collect();
    Ok(Value::array(chain))
}

fn include(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let class = this(call)?;
    let module = module_arg(call, 0)?;
    call.classes().include_module(class, module);
    Ok(call.receiver.clone())
}

fn extend(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let class = this(call)?;
    let module = module_arg(call, 0)?;
    call.classes().extend_module(class, module);
    Ok(call.receiver.clone())
}

/// `instance_methods([inherited])`; `false` lists only the class's own methods
fn instance_methods(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let class = this(call)?;
    let inherited = !matches!(call.arg(0), Value::Boolean(false));
    let names = if inherited {
        call.classes().method_names(class)
    } else {
        call.classes().own_method_names(class)
    };
    let names = names
        .into_iter()
        .map(Value::string)
        .collect();
    Ok(Value::array(names))
}

fn method_defined(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let class = this(call)?;
    let name = call.str_arg(0)?;
    let found = call.classes().lookup_instance_method(class, &name).is_some();
    Ok(boolean(found))
}

// ============================================================================
// Accessors
// ============================================================================

/// Define `name` and/or `name=` for each argument
fn define_accessors(call: &mut Call<'_>, reader: bool, writer: bool) -> BuiltinResult {
    let class = this(call)?;
    for i in 0..call.args.len() {
        let name = call.str_arg(i)?;
        if reader {
            call.classes().define_method(
                class,
                &name,
                MethodRef::Builtin(Builtin::new("attr_reader", read_attr)),
            );
        }
        if writer {
            call.classes().define_method(
                class,
                &format!("{}=", name),
                MethodRef::Builtin(Builtin::new("attr_writer", write_attr)),
            );
        }
    }
    Ok(Value::Null)
}

/// Instance variable backing the accessor the call was made through
fn attr_ivar(call: &Call<'_>) -> String {
    format!("@{}", call.name.trim_end_matches('='))
}

fn read_attr(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let ivar = attr_ivar(call);
    match &call.receiver {
        Value::Instance(i) => Ok(i.ivar(&ivar).unwrap_or_default()),
        Value::Class(c) => Ok(call.classes().ivar(*c, &ivar).unwrap_or_default()),
        other => Err(call.wrong_type("Object", other)),
    }
}

fn write_attr(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let ivar = attr_ivar(call);
    let value = call.args[0].copy();
    match &call.receiver {
        Value::Instance(i) => i.set_ivar(ivar, value.clone()),
        Value::Class(c) => call.classes().set_ivar(*c, &ivar, value.clone()),
        other => return Err(call.wrong_type("Object", other)),
    }
    Ok(value)
}
