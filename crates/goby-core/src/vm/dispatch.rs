//! Method dispatch
//!
//! `send` assembles a call: it expands splat arguments, locates the receiver
//! slot, attaches the block, and hands off to [`Thread::dispatch`], which
//! runs either a builtin body or a user method frame. Every path ends with
//! [`Stack::finalize_call`](crate::stack::Stack::finalize_call), so a call
//! always leaves exactly one value where its receiver was.

use super::Thread;
use crate::builtins::{Call, Interrupt};
use crate::class::MethodRef;
use crate::error::{messages, ErrorKind};
use crate::frame::{BuiltinFrame, Frame, NormalFrame};
use crate::object::MethodObject;
use crate::value::Value;
use crate::{VmError, VmResult};
use goby_bytecode::{ArgKind, ArgSet};
use std::sync::Arc;

/// How a yielded block finished
#[derive(Debug, Clone)]
pub enum BlockOutcome {
    /// The block left normally with this value (possibly an error value)
    Value(Value),
    /// The block executed `break`
    Break,
}

impl Thread {
    // ========================================================================
    // send
    // ========================================================================

    pub(crate) fn send(
        &mut self,
        cf: &Arc<NormalFrame>,
        name: &str,
        argc: usize,
        block: Option<&str>,
        arg_set: Option<&ArgSet>,
    ) -> VmResult<()> {
        let (argc, keywords) = self.expand_splats(argc, arg_set)?;

        let receiver_ptr = self
            .stack
            .sp()
            .checked_sub(argc + 1)
            .ok_or(VmError::StackUnderflow)?;

        let block = match block {
            Some(id) => {
                let set = self
                    .context()
                    .tables
                    .lock()
                    .block(cf.file(), id)
                    .ok_or_else(|| VmError::MissingInstructionSet {
                        kind: "block",
                        name: id.to_string(),
                    })?;
                let source = Arc::new(NormalFrame::block_source(set, cf));
                self.frames.push(Frame::Normal(source.clone()));
                Some(source)
            }
            None => None,
        };

        self.dispatch(cf, receiver_ptr, name, argc, &keywords, block.clone())?;

        if let Some(source) = block {
            self.unwind_to(&source);
        }
        Ok(())
    }

    /// Expand every splat-marked array among the `argc` call arguments in
    /// place, clearing its marker, and map the call's keyword positions onto
    /// the expanded window
    fn expand_splats(
        &mut self,
        argc: usize,
        arg_set: Option<&ArgSet>,
    ) -> VmResult<(usize, Vec<(String, usize)>)> {
        let start = self
            .stack
            .sp()
            .checked_sub(argc)
            .ok_or(VmError::StackUnderflow)?;
        let args = self.stack.window(start)?;

        let mut expanded = Vec::with_capacity(args.len());
        let mut positions = Vec::with_capacity(args.len());
        let mut found = false;
        for arg in args {
            positions.push(expanded.len());
            match &arg {
                Value::Array(array) if array.is_splat() => {
                    array.set_splat(false);
                    expanded.extend(array.snapshot());
                    found = true;
                }
                _ => expanded.push(arg),
            }
        }

        let keywords = arg_set
            .map(|set| {
                set.iter()
                    .enumerate()
                    .filter(|(_, (_, kind))| kind.is_keyword())
                    .filter_map(|(position, (name, _))| {
                        positions.get(position).map(|&p| (name.to_string(), p))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if !found {
            return Ok((argc, keywords));
        }
        let argc = expanded.len();
        self.stack.replace_window(start, expanded)?;
        Ok((argc, keywords))
    }

    /// Run method `name` on the value in `receiver_ptr` with the `argc`
    /// values above it, leaving the result in the receiver slot
    pub(crate) fn dispatch(
        &mut self,
        cf: &Arc<NormalFrame>,
        receiver_ptr: usize,
        name: &str,
        argc: usize,
        keywords: &[(String, usize)],
        block: Option<Arc<NormalFrame>>,
    ) -> VmResult<()> {
        let receiver = self.stack.peek_at(receiver_ptr)?;
        let method = self.context().classes.lookup_method(&receiver, name);

        let result = match method {
            None => {
                let inspected = receiver.inspect(&self.context().classes);
                self.error(
                    ErrorKind::NoMethodError,
                    messages::undefined_method(name, &inspected),
                )
            }
            Some(MethodRef::Builtin(builtin)) => {
                self.call_builtin(cf, builtin.func, receiver, receiver_ptr, name, block)?
            }
            Some(MethodRef::User(method)) => {
                self.call_user(&method, receiver, receiver_ptr, argc, keywords, block)?
            }
        };

        self.stack.finalize_call(receiver_ptr, result)
    }

    fn call_builtin(
        &mut self,
        cf: &Arc<NormalFrame>,
        func: crate::builtins::BuiltinFn,
        receiver: Value,
        receiver_ptr: usize,
        name: &str,
        block: Option<Arc<NormalFrame>>,
    ) -> VmResult<Value> {
        if self.call_depth_exceeded() {
            return Ok(self.call_depth_error());
        }
        let args = self.stack.window(receiver_ptr + 1)?;
        let frame = Arc::new(BuiltinFrame::new(name, cf.file(), cf.line()));
        self.frames.push(Frame::Builtin(frame.clone()));

        let outcome = {
            let mut call = Call::new(self, receiver, args, block, cf.clone(), name);
            func(&mut call)
        };

        while !frame.is_removed() {
            if self.frames.pop().is_none() {
                break;
            }
        }

        match outcome {
            Ok(value) | Err(Interrupt::Error(value)) => Ok(value),
            Err(Interrupt::Break) => Ok(Value::Null),
            Err(Interrupt::Host(error)) => Err(error),
        }
    }

    fn call_user(
        &mut self,
        method: &Arc<MethodObject>,
        receiver: Value,
        receiver_ptr: usize,
        argc: usize,
        keywords: &[(String, usize)],
        block: Option<Arc<NormalFrame>>,
    ) -> VmResult<Value> {
        let args = self.stack.window(receiver_ptr + 1)?;
        let locals = match bind_arguments(method, args, keywords) {
            Ok(locals) => locals,
            Err(message) => return Ok(self.error(ErrorKind::ArgumentError, message)),
        };
        if self.call_depth_exceeded() {
            return Ok(self.call_depth_error());
        }

        let frame = Arc::new(NormalFrame::new(method.set.clone(), receiver, locals, block));
        self.frames.push(Frame::Normal(frame.clone()));
        self.eval_frame(&frame)?;

        if frame.is_stopped() {
            return Ok(Value::Null);
        }
        if self.stack.sp() > receiver_ptr + argc + 1 {
            self.stack.peek()
        } else {
            Ok(Value::Null)
        }
    }

    // ========================================================================
    // Host-initiated calls
    // ========================================================================

    /// Call method `name` on `receiver` from a builtin body
    ///
    /// An error raised by the callee is returned as an error value.
    ///
    /// # Errors
    ///
    /// Returns host-level failures only.
    pub fn call_method(
        &mut self,
        caller: &Arc<NormalFrame>,
        receiver: Value,
        name: &str,
        args: Vec<Value>,
        block: Option<Arc<NormalFrame>>,
    ) -> VmResult<Value> {
        let receiver_ptr = self.stack.sp();
        let argc = args.len();
        self.stack.push(receiver)?;
        for arg in args {
            self.stack.push(arg)?;
        }
        self.dispatch(caller, receiver_ptr, name, argc, &[], block)?;
        let result = self.stack.peek_at(receiver_ptr)?;
        self.stack.truncate(receiver_ptr);
        Ok(result)
    }

    /// Run one invocation of the block whose source frame is `source`
    ///
    /// `args` become the block's first locals. The operand stack is restored
    /// to its height on entry.
    ///
    /// # Errors
    ///
    /// Returns host-level failures only.
    pub fn yield_frame(
        &mut self,
        source: &Arc<NormalFrame>,
        args: Vec<Value>,
    ) -> VmResult<BlockOutcome> {
        let sp = self.stack.sp();
        if self.call_depth_exceeded() {
            return Ok(BlockOutcome::Value(self.call_depth_error()));
        }

        let frame = Arc::new(NormalFrame::block_execution(source, args));
        self.frames.push(Frame::Normal(frame.clone()));
        self.eval_frame(&frame)?;

        let outcome = if frame.is_stopped() {
            BlockOutcome::Break
        } else if self.stack.sp() > sp {
            BlockOutcome::Value(self.stack.peek()?)
        } else {
            BlockOutcome::Value(Value::Null)
        };
        self.stack.truncate(sp);
        Ok(outcome)
    }

    // ========================================================================
    // yield
    // ========================================================================

    /// Block a `yield` in `cf` refers to
    ///
    /// Block frames are skipped along the EP chain until the enclosing
    /// method frame is reached; its attached block is the target.
    pub(crate) fn yield_target(&self, cf: &NormalFrame) -> Option<Arc<NormalFrame>> {
        if !cf.is_block() {
            return cf.block_frame().cloned();
        }
        let mut frame = cf.ep()?.clone();
        while frame.is_block() {
            frame = frame.ep()?.clone();
        }
        frame.block_frame().cloned()
    }

    pub(crate) fn invoke_block(&mut self, cf: &Arc<NormalFrame>, argc: usize) -> VmResult<()> {
        let receiver_ptr = self
            .stack
            .sp()
            .checked_sub(argc + 1)
            .ok_or(VmError::StackUnderflow)?;

        let Some(source) = self.yield_target(cf) else {
            let error = self.error(ErrorKind::InternalError, messages::CANT_YIELD_WITHOUT_BLOCK);
            return self.stack.finalize_call(receiver_ptr, error);
        };
        if self.call_depth_exceeded() {
            let error = self.call_depth_error();
            return self.stack.finalize_call(receiver_ptr, error);
        }

        let args = self.stack.window(receiver_ptr + 1)?;
        let frame = Arc::new(NormalFrame::block_execution(&source, args));
        self.frames.push(Frame::Normal(frame.clone()));
        self.eval_frame(&frame)?;

        if frame.is_stopped() {
            return Ok(());
        }
        let result = if self.stack.sp() > receiver_ptr + argc + 1 {
            self.stack.peek()?
        } else {
            Value::Null
        };
        self.stack.finalize_call(receiver_ptr, result)
    }
}

// ============================================================================
// Argument binding
// ============================================================================

/// Arrange call arguments into the callee's local slots
///
/// `keywords` maps call-site positions to keyword names; every other
/// argument is positional. Unbound optioned and optional-keyword slots stay
/// empty so the method body's guarded default assignment fills them.
pub(crate) fn bind_arguments(
    method: &MethodObject,
    args: Vec<Value>,
    keywords: &[(String, usize)],
) -> Result<Vec<Option<Value>>, String> {
    let params = &method.set.params;

    let mut keyword_args: Vec<(String, Value)> = Vec::with_capacity(keywords.len());
    let mut positional = Vec::with_capacity(args.len());
    for (position, arg) in args.into_iter().enumerate() {
        match keywords.iter().find(|(_, p)| *p == position) {
            Some((name, _)) => keyword_args.push((name.clone(), arg)),
            None => positional.push(arg),
        }
    }

    let normal = params.count(ArgKind::Normal);
    let optioned = params.count(ArgKind::Optioned);
    let has_splat = params.count(ArgKind::Splat) > 0;

    if positional.len() < normal {
        return Err(format!(
            "Expect at least {} args for method '{}'. got: {}",
            normal,
            method.name,
            positional.len()
        ));
    }
    if !has_splat && positional.len() > normal + optioned {
        return Err(format!(
            "Expect at most {} args for method '{}'. got: {}",
            normal + optioned,
            method.name,
            positional.len()
        ));
    }

    let mut locals = vec![None; params.len()];
    let mut optional_budget = positional.len() - normal;
    let mut positional = positional.into_iter();

    for (index, (name, kind)) in params.iter().enumerate() {
        match kind {
            ArgKind::Normal => locals[index] = positional.next(),
            ArgKind::Optioned => {
                if optional_budget > 0 {
                    optional_budget -= 1;
                    locals[index] = positional.next();
                }
            }
            ArgKind::Splat => {
                let trailing = params.kinds[index + 1..]
                    .iter()
                    .filter(|k| **k == ArgKind::Normal)
                    .count();
                let take = positional.len().saturating_sub(trailing);
                let rest: Vec<Value> = positional.by_ref().take(take).collect();
                locals[index] = Some(Value::array(rest));
            }
            ArgKind::RequiredKeyword | ArgKind::OptionalKeyword => {
                match keyword_args.iter().position(|(key, _)| key == name) {
                    Some(found) => locals[index] = Some(keyword_args.remove(found).1),
                    None if kind == ArgKind::RequiredKeyword => {
                        return Err(format!(
                            "Method {} requires key argument {}",
                            method.name, name
                        ));
                    }
                    None => {}
                }
            }
        }
    }

    if let Some((key, _)) = keyword_args.first() {
        return Err(format!("unknown key {} for method {}", key, method.name));
    }
    Ok(locals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use goby_bytecode::{InstructionSet, SetKind};

    fn method(params: &[(&str, ArgKind)]) -> MethodObject {
        let mut set = InstructionSet::new(SetKind::MethodDef, "foo", "test.gb");
        for (name, kind) in params {
            set.params.push(*name, *kind);
        }
        MethodObject::new("foo", Arc::new(set), params.len())
    }

    fn ints(locals: &[Option<Value>]) -> Vec<Option<i64>> {
        locals
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_int))
            .collect()
    }

    #[test]
    fn test_bind_normal_and_optioned() {
        let m = method(&[("a", ArgKind::Normal), ("b", ArgKind::Optioned)]);
        let locals = bind_arguments(&m, vec![Value::int(1)], &[]).unwrap();
        assert_eq!(ints(&locals), vec![Some(1), None]);

        let locals = bind_arguments(&m, vec![Value::int(1), Value::int(2)], &[]).unwrap();
        assert_eq!(ints(&locals), vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_bind_arity_errors() {
        let m = method(&[("a", ArgKind::Normal), ("b", ArgKind::Normal)]);
        let err = bind_arguments(&m, vec![Value::int(1)], &[]).unwrap_err();
        assert_eq!(err, "Expect at least 2 args for method 'foo'. got: 1");

        let err = bind_arguments(&m, vec![Value::int(1); 3], &[]).unwrap_err();
        assert_eq!(err, "Expect at most 2 args for method 'foo'. got: 3");
    }

    #[test]
    fn test_bind_splat_leaves_trailing_normals() {
        let m = method(&[
            ("a", ArgKind::Normal),
            ("rest", ArgKind::Splat),
            ("z", ArgKind::Normal),
        ]);
        let args = (1..=5).map(Value::int).collect();
        let locals = bind_arguments(&m, args, &[]).unwrap();

        assert_eq!(locals[0].as_ref().and_then(Value::as_int), Some(1));
        let rest = locals[1].as_ref().and_then(Value::as_array).unwrap().snapshot();
        let rest: Vec<i64> = rest.iter().filter_map(Value::as_int).collect();
        assert_eq!(rest, vec![2, 3, 4]);
        assert_eq!(locals[2].as_ref().and_then(Value::as_int), Some(5));
    }

    #[test]
    fn test_bind_keywords() {
        let m = method(&[
            ("a", ArgKind::Normal),
            ("b", ArgKind::RequiredKeyword),
            ("c", ArgKind::OptionalKeyword),
        ]);
        let keywords = vec![("b".to_string(), 1)];
        let locals = bind_arguments(&m, vec![Value::int(1), Value::int(2)], &keywords).unwrap();
        assert_eq!(ints(&locals), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn test_bind_keyword_errors() {
        let m = method(&[("b", ArgKind::RequiredKeyword)]);
        let err = bind_arguments(&m, vec![], &[]).unwrap_err();
        assert_eq!(err, "Method foo requires key argument b");

        let keywords = vec![("b".to_string(), 0), ("x".to_string(), 1)];
        let err = bind_arguments(&m, vec![Value::int(1), Value::int(2)], &keywords).unwrap_err();
        assert_eq!(err, "unknown key x for method foo");
    }
}
