//! Builtin classes and their native methods
//!
//! Every builtin method is a plain function taking a [`Call`], the view of
//! one invocation: receiver, argument window, attached block and the
//! running thread. Bodies return `Ok(value)` or an [`Interrupt`]; the
//! dispatcher turns both into the single value left in the receiver slot.
//!
//! Method tables are static `&[Builtin]` slices per class, installed into
//! the class registry when a context is created.

mod array;
mod block;
mod boolean;
mod channel;
mod class;
mod decimal;
mod error;
mod float;
mod hash;
mod integer;
mod null;
mod numeric;
mod object;
mod range;
mod regexp;
mod string;
mod time;

use crate::error::{messages, ErrorKind};
use crate::frame::NormalFrame;
use crate::value::Value;
use crate::vm::{BlockOutcome, ClassRegistry, Thread, VmContext};
use crate::VmError;
use std::sync::Arc;

/// Largest array or string a builtin will build in one step
pub const MAX_BUILD_LENGTH: usize = 1 << 26;

/// Native body of a builtin method
pub type BuiltinFn = fn(&mut Call<'_>) -> Result<Value, Interrupt>;

/// Non-value exit of a builtin body
#[derive(Debug)]
pub enum Interrupt {
    /// A language error; becomes the call's result
    Error(Value),
    /// A yielded block executed `break`
    Break,
    /// Host-level failure
    Host(VmError),
}

impl From<VmError> for Interrupt {
    fn from(error: VmError) -> Self {
        Interrupt::Host(error)
    }
}

/// Result type of builtin bodies
pub type BuiltinResult = Result<Value, Interrupt>;

/// One invocation of a builtin method
pub struct Call<'a> {
    /// Thread running the call
    pub thread: &'a mut Thread,
    /// Receiver
    pub receiver: Value,
    /// Arguments
    pub args: Vec<Value>,
    /// Source frame of the attached block
    pub block: Option<Arc<NormalFrame>>,
    /// Frame that executed the `send`
    pub caller: Arc<NormalFrame>,
    /// Name the method was called by
    pub name: &'a str,
}

impl<'a> Call<'a> {
    /// Create a call view
    pub fn new(
        thread: &'a mut Thread,
        receiver: Value,
        args: Vec<Value>,
        block: Option<Arc<NormalFrame>>,
        caller: Arc<NormalFrame>,
        name: &'a str,
    ) -> Self {
        Self {
            thread,
            receiver,
            args,
            block,
            caller,
            name,
        }
    }

    /// Shared VM state
    pub fn context(&self) -> Arc<VmContext> {
        self.thread.context().clone()
    }

    /// Class registry
    pub fn classes(&self) -> &ClassRegistry {
        &self.thread.context().classes
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Error value located at the caller
    pub fn error_value(&self, kind: ErrorKind, message: impl Into<String>) -> Value {
        self.thread.error(kind, message)
    }

    /// Error interrupt located at the caller
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> Interrupt {
        Interrupt::Error(self.error_value(kind, message))
    }

    /// `TypeError` for an argument of the wrong class
    pub fn wrong_type(&self, expected: &str, got: &Value) -> Interrupt {
        let got = self.class_name(got);
        self.error(ErrorKind::TypeError, messages::wrong_type(expected, &got))
    }

    /// `UnsupportedMethodError` for the called method on the receiver
    pub fn unsupported(&self) -> Interrupt {
        let receiver = self.to_s(&self.receiver);
        self.error(
            ErrorKind::UnsupportedMethodError,
            messages::unsupported_method(self.name, &receiver),
        )
    }

    // ========================================================================
    // Arguments
    // ========================================================================

    /// Require exactly `n` arguments
    ///
    /// # Errors
    ///
    /// `ArgumentError` on any other count.
    pub fn expect_argc(&self, n: usize) -> Result<(), Interrupt> {
        if self.args.len() != n {
            return Err(self.error(
                ErrorKind::ArgumentError,
                messages::wrong_arity(n, self.args.len()),
            ));
        }
        Ok(())
    }

    /// Require between `min` and `max` arguments
    ///
    /// # Errors
    ///
    /// `ArgumentError` on any other count.
    pub fn expect_argc_range(&self, min: usize, max: usize) -> Result<(), Interrupt> {
        let got = self.args.len();
        if got < min || got > max {
            return Err(self.error(
                ErrorKind::ArgumentError,
                messages::wrong_arity_range(min, max, got),
            ));
        }
        Ok(())
    }

    /// Length of `count` repetitions of `unit` items, capped at
    /// [`MAX_BUILD_LENGTH`]
    ///
    /// # Errors
    ///
    /// `ArgumentError` when the length is negative or too large.
    pub fn build_length(&self, unit: usize, count: i64) -> Result<usize, Interrupt> {
        usize::try_from(count)
            .ok()
            .and_then(|count| count.checked_mul(unit))
            .filter(|len| *len <= MAX_BUILD_LENGTH)
            .ok_or_else(|| {
                self.error(
                    ErrorKind::ArgumentError,
                    format!("Result length exceeds the maximum of {}", MAX_BUILD_LENGTH),
                )
            })
    }

    /// Argument `index`, or null when absent
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Integer argument
    ///
    /// # Errors
    ///
    /// `TypeError` if the argument is not an Integer.
    pub fn int_arg(&self, index: usize) -> Result<i64, Interrupt> {
        let arg = self.arg(index);
        arg.as_int().ok_or_else(|| self.wrong_type("Integer", &arg))
    }

    /// String argument
    ///
    /// # Errors
    ///
    /// `TypeError` if the argument is not a String.
    pub fn str_arg(&self, index: usize) -> Result<Arc<str>, Interrupt> {
        match self.arg(index) {
            Value::String(s) => Ok(s),
            other => Err(self.wrong_type("String", &other)),
        }
    }

    /// Class argument
    ///
    /// # Errors
    ///
    /// `TypeError` if the argument is not a class or module.
    pub fn class_arg(&self, index: usize) -> Result<crate::class::ClassId, Interrupt> {
        let arg = self.arg(index);
        arg.as_class().ok_or_else(|| self.wrong_type("Class", &arg))
    }

    // ========================================================================
    // Blocks and calls
    // ========================================================================

    /// The attached block
    ///
    /// # Errors
    ///
    /// `InternalError` when the call has no block.
    pub fn require_block(&self) -> Result<Arc<NormalFrame>, Interrupt> {
        self.block
            .clone()
            .ok_or_else(|| self.error(ErrorKind::InternalError, messages::CANT_YIELD_WITHOUT_BLOCK))
    }

    /// Yield `args` to the attached block
    ///
    /// # Errors
    ///
    /// Propagates a missing block, an error raised by the block, or `break`.
    pub fn yield_block(&mut self, args: Vec<Value>) -> BuiltinResult {
        let block = self.require_block()?;
        self.call_block(&block, args)
    }

    /// Run the block whose source frame is `block`
    ///
    /// # Errors
    ///
    /// Propagates an error raised by the block, or `break`.
    pub fn call_block(&mut self, block: &Arc<NormalFrame>, args: Vec<Value>) -> BuiltinResult {
        match self.thread.yield_frame(block, args)? {
            BlockOutcome::Value(value) if value.is_error() => Err(Interrupt::Error(value)),
            BlockOutcome::Value(value) => Ok(value),
            BlockOutcome::Break => Err(Interrupt::Break),
        }
    }

    /// Call a method on `receiver`
    ///
    /// # Errors
    ///
    /// Propagates an error raised by the callee.
    pub fn call_method(
        &mut self,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Arc<NormalFrame>>,
    ) -> BuiltinResult {
        let caller = self.caller.clone();
        let value = self.thread.call_method(&caller, receiver, name, args, block)?;
        if value.is_error() {
            return Err(Interrupt::Error(value));
        }
        Ok(value)
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// `to_s` form of a value
    pub fn to_s(&self, value: &Value) -> String {
        value.to_s(self.classes())
    }

    /// `inspect` form of a value
    pub fn inspect(&self, value: &Value) -> String {
        value.inspect(self.classes())
    }

    /// Name of the class of a value
    pub fn class_name(&self, value: &Value) -> String {
        self.classes().class_name_of(value)
    }
}

// ============================================================================
// Installation
// ============================================================================

/// Populate the builtin classes of a fresh registry
pub fn install_all(classes: &ClassRegistry) {
    object::install(classes);
    class::install(classes);
    integer::install(classes);
    float::install(classes);
    decimal::install(classes);
    string::install(classes);
    array::install(classes);
    hash::install(classes);
    range::install(classes);
    block::install(classes);
    regexp::install(classes);
    time::install(classes);
    null::install(classes);
    boolean::install(classes);
    channel::install(classes);
    error::install(classes);
}

/// `Boolean` value of a Rust bool
#[inline]
pub(crate) fn boolean(b: bool) -> Value {
    Value::Boolean(b)
}
