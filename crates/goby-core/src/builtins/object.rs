//! Object builtins
//!
//! Methods every value answers to: introspection, output, `send`,
//! `require`, `raise` and `thread`.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::stdlib;
use crate::value::Value;
use crate::vm::{BlockOutcome, ClassRegistry, Mode, Thread};
use crate::VmError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("!", |c| {
        c.expect_argc(0)?;
        Ok(boolean(!c.receiver.truthy()))
    }),
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("!=", |c| {
        c.expect_argc(1)?;
        Ok(boolean(!c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("block_given?", block_given),
    Builtin::new("class", |c| {
        c.expect_argc(0)?;
        Ok(Value::Class(c.classes().class_of(&c.receiver)))
    }),
    Builtin::new("freeze", freeze),
    Builtin::new("frozen?", frozen),
    Builtin::new("inspect", inspect),
    Builtin::new("instance_variable_get", instance_variable_get),
    Builtin::new("instance_variable_set", instance_variable_set),
    Builtin::new("instance_variables", instance_variables),
    Builtin::new("is_a?", is_a),
    Builtin::new("methods", methods),
    Builtin::new("nil?", |c| {
        c.expect_argc(0)?;
        Ok(boolean(c.receiver.is_null()))
    }),
    Builtin::new("object_id", |c| {
        c.expect_argc(0)?;
        Ok(Value::int(c.receiver.object_id() as i64))
    }),
    Builtin::new("print", print),
    Builtin::new("puts", puts),
    Builtin::new("raise", raise),
    Builtin::new("require", stdlib::require),
    Builtin::new("require_relative", stdlib::require),
    Builtin::new("respond_to?", respond_to),
    Builtin::new("send", send),
    Builtin::new("singleton_class", singleton_class),
    Builtin::new("sleep", sleep),
    Builtin::new("thread", thread),
    Builtin::new("to_json", |c| {
        c.expect_argc(0)?;
        Ok(Value::string(c.receiver.to_json(c.classes())))
    }),
    Builtin::new("to_s", to_s),
];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::OBJECT, INSTANCE_METHODS, false);
}

// ============================================================================
// Rendering and output
// ============================================================================

fn to_s(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    if call.context().is_main_object(&call.receiver) {
        return Ok(Value::string("main"));
    }
    Ok(Value::string(call.to_s(&call.receiver)))
}

fn inspect(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    if call.context().is_main_object(&call.receiver) {
        return Ok(Value::string("main"));
    }
    Ok(Value::string(call.inspect(&call.receiver)))
}

/// Each argument on its own line
fn puts(call: &mut Call<'_>) -> BuiltinResult {
    let mut text = String::new();
    for arg in &call.args {
        text.push_str(&call.to_s(arg));
        text.push('\n');
    }
    if call.args.is_empty() {
        text.push('\n');
    }
    call.context().write_output(&text);
    Ok(Value::Null)
}

fn print(call: &mut Call<'_>) -> BuiltinResult {
    let text: String = call.args.iter().map(|a| call.to_s(a)).collect();
    call.context().write_output(&text);
    Ok(Value::Null)
}

// ============================================================================
// Introspection
// ============================================================================

fn is_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let target = call.class_arg(0)?;
    let classes = call.classes();
    Ok(boolean(classes.is_a(call.receiver.class_id(), target)))
}

fn methods(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let classes = call.classes();
    let names = match &call.receiver {
        Value::Class(c) => classes.class_method_names(*c),
        other => classes.method_names(other.class_id()),
    };
    Ok(Value::array(names.into_iter().map(Value::string).collect()))
}

fn respond_to(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let name = call.str_arg(0)?;
    let found = call.classes().lookup_method(&call.receiver, &name).is_some();
    Ok(boolean(found))
}

/// Instances get a singleton class on first request
fn singleton_class(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let classes = call.classes();
    let class = match &call.receiver {
        Value::Instance(i) => classes.create_singleton_class(i),
        Value::Class(_) => ClassId::CLASS,
        other => classes.class_of(other),
    };
    Ok(Value::Class(class))
}

fn instance_variable_get(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let name = call.str_arg(0)?;
    let value = match &call.receiver {
        Value::Instance(i) => i.ivar(&name),
        Value::Class(c) => call.classes().ivar(*c, &name),
        _ => None,
    };
    Ok(value.unwrap_or_default())
}

fn instance_variable_set(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let name = call.str_arg(0)?;
    let value = call.args[1].copy();
    match &call.receiver {
        Value::Instance(i) => i.set_ivar(&*name, value.clone()),
        Value::Class(c) => call.classes().set_ivar(*c, &name, value.clone()),
        other => {
            let class = call.class_name(other);
            return Err(call.error(
                ErrorKind::TypeError,
                format!("Can't set instance variable {} on {}", name, class),
            ));
        }
    }
    Ok(value)
}

fn instance_variables(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let names = match &call.receiver {
        Value::Instance(i) => i.ivar_names(),
        Value::Class(c) => call.classes().ivar_names(*c),
        _ => Vec::new(),
    };
    Ok(Value::array(names.into_iter().map(Value::string).collect()))
}

fn freeze(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    if let Value::Instance(i) = &call.receiver {
        i.freeze();
    }
    Ok(call.receiver.clone())
}

/// Scalars are always frozen; instances once `freeze` was called
fn frozen(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let frozen = match &call.receiver {
        Value::Instance(i) => i.is_frozen(),
        Value::Array(_) | Value::Hash(_) | Value::Channel(_) | Value::Native(_) => false,
        _ => true,
    };
    Ok(boolean(frozen))
}

fn block_given(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let caller = call.caller.clone();
    Ok(boolean(call.thread.yield_target(&caller).is_some()))
}

// ============================================================================
// Control
// ============================================================================

/// `send(name, *args)` forwards the block
fn send(call: &mut Call<'_>) -> BuiltinResult {
    if call.args.is_empty() {
        return Err(call.error(
            ErrorKind::ArgumentError,
            "Expect 1 or more argument(s). got: 0",
        ));
    }
    let name = call.str_arg(0)?;
    let args = call.args.split_off(1);
    let block = call.block.clone();
    let receiver = call.receiver.clone();
    call.call_method(receiver, &name, args, block)
}

/// `raise(message)`, `raise(ErrorClass)` or `raise(ErrorClass, message)`
fn raise(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(1, 2)?;
    let class = match call.arg(0) {
        Value::String(message) => {
            return Err(call.error(ErrorKind::InternalError, &*message));
        }
        Value::Class(c) if call.classes().is_a(c, ClassId::ERROR) => c,
        other => return Err(call.wrong_type("Error class or String", &other)),
    };
    let name = call.classes().name(class);
    let message = if call.args.len() == 2 {
        call.str_arg(1)?.to_string()
    } else {
        name.clone()
    };
    Err(Interrupt::Error(
        call.thread.error_of_class(class, &name, message),
    ))
}

/// `sleep(ms)` blocks the current thread
fn sleep(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let ms = call.int_arg(0)?;
    if ms < 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Expect argument to be positive value. got: {}", ms),
        ));
    }
    std::thread::sleep(Duration::from_millis(ms as u64));
    Ok(Value::int(ms))
}

/// Run the block on a new host thread with its own stacks
///
/// The new thread shares the class registry and every object reachable
/// from the block. It is detached; callers synchronize through channels.
fn thread(call: &mut Call<'_>) -> BuiltinResult {
    let block = call.require_block()?;
    let args = std::mem::take(&mut call.args);
    let context = call.context();
    if !context.can_create_thread() {
        let active = context.counters.active_threads();
        return Err(call.error(
            ErrorKind::InternalError,
            format!("Thread limit reached. active: {}", active),
        ));
    }

    let id = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
    context.counters.increment_threads();
    let shared = context.clone();
    let spawned = std::thread::Builder::new()
        .name(format!("goby-thread-{}", id))
        .stack_size(context.options.thread_stack_size)
        .spawn(move || {
            let mut thread = Thread::new(shared.clone());
            match thread.yield_frame(&block, args) {
                Ok(BlockOutcome::Value(value)) if value.is_error() => {
                    let message = value.to_s(&shared.classes);
                    log::warn!("thread {} finished with error: {}", id, message);
                    if shared.options.mode != Mode::Test {
                        eprintln!("{}", message);
                    }
                }
                Ok(_) => log::trace!("thread {} finished", id),
                Err(e) => log::error!("thread {} failed: {}", id, e),
            }
            shared.counters.decrement_threads();
        });

    if let Err(e) = spawned {
        context.counters.decrement_threads();
        return Err(Interrupt::Host(VmError::ThreadSpawn(e.to_string())));
    }
    log::debug!("spawned thread {}", id);
    Ok(Value::Null)
}
