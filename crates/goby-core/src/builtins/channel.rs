//! Channel builtins
//!
//! `deliver` and `receive` block the host thread running the call; the
//! channel's own locks are released while waiting.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::channel::{ChannelError, ChannelObject};
use crate::class::{Builtin, ClassId};
use crate::error::{messages, ErrorKind};
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("close", close),
    Builtin::new("closed?", |c| {
        c.expect_argc(0)?;
        Ok(boolean(this(c)?.is_closed()))
    }),
    Builtin::new("deliver", deliver),
    Builtin::new("receive", receive),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_channel)];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::CHANNEL, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::CHANNEL, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<ChannelObject>, Interrupt> {
    match &call.receiver {
        Value::Channel(c) => Ok(c.clone()),
        other => Err(call.wrong_type("Channel", other)),
    }
}

fn closed(call: &Call<'_>, error: ChannelError) -> Interrupt {
    match error {
        ChannelError::Closed => call.error(ErrorKind::ChannelCloseError, messages::CHANNEL_CLOSED),
    }
}

/// `Channel.new` is unbuffered; `Channel.new(n)` buffers `n` values
fn new_channel(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let capacity = if call.args.is_empty() {
        0
    } else {
        call.int_arg(0)?
    };
    if capacity < 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Expect channel capacity to be positive. got: {}", capacity),
        ));
    }
    Ok(Value::Channel(Arc::new(ChannelObject::new(capacity as usize))))
}

/// Send a value, returning it
fn deliver(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let channel = this(call)?;
    let value = call.arg(0);
    channel
        .deliver(value.clone())
        .map_err(|e| closed(call, e))?;
    Ok(value)
}

fn receive(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let channel = this(call)?;
    channel.receive().map_err(|e| closed(call, e))
}

fn close(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let channel = this(call)?;
    channel.close().map_err(|e| closed(call, e))?;
    Ok(Value::Null)
}
