//! Virtual machine interpreter
//!
//! A [`Thread`] owns an operand stack and a call-frame stack and runs frames
//! against the shared [`VmContext`]. Each frame is evaluated by a recursive
//! call to [`Thread::eval_frame`]: a `send` to a user method evaluates the
//! callee frame to completion before the caller continues.
//!
//! Errors are values. After every instruction the loop checks whether the
//! top of the operand stack is an error; if so it abandons the frame, pops
//! it, and returns to the caller, whose own loop observes the same error.

use super::VmContext;
use crate::class::{ClassId, MethodRef};
use crate::error::{messages, ErrorKind, ErrorObject};
use crate::frame::{CallFrameStack, Frame, NormalFrame};
use crate::object::MethodObject;
use crate::stack::Stack;
use crate::value::Value;
use crate::{VmError, VmResult};
use goby_bytecode::{Literal, Op};
use std::sync::Arc;

/// One language thread
#[derive(Debug)]
pub struct Thread {
    /// Shared VM state
    context: Arc<VmContext>,
    /// Operand stack
    pub(crate) stack: Stack,
    /// Call frames
    pub(crate) frames: CallFrameStack,
}

impl Thread {
    /// Create a thread with empty stacks
    pub fn new(context: Arc<VmContext>) -> Self {
        let stack = Stack::with_capacity(context.options.limits.max_stack_slots);
        Self {
            context,
            stack,
            frames: CallFrameStack::new(),
        }
    }

    /// Shared VM state
    pub fn context(&self) -> &Arc<VmContext> {
        &self.context
    }

    /// Operand stack
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    /// Call-frame stack
    pub fn frames(&self) -> &CallFrameStack {
        &self.frames
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Build an error value located at the current frame
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>) -> Value {
        self.error_of_class(kind.class_id(), kind.name(), message)
    }

    /// Build an error value of any error class located at the current frame
    pub fn error_of_class(&self, class: ClassId, name: &str, message: impl Into<String>) -> Value {
        let (file, line) = match self.frames.top() {
            Some(frame) => (frame.file().to_string(), frame.line()),
            None => (self.context.options.file.clone().unwrap_or_default(), 0),
        };
        Value::error(ErrorObject::with_class(class, name, message, &file, line))
    }

    /// Push an error value located at the current frame
    pub(crate) fn push_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> VmResult<()> {
        let error = self.error(kind, message);
        self.stack.push(error)
    }

    /// Whether pushing one more frame would exceed the call depth limit
    pub(crate) fn call_depth_exceeded(&self) -> bool {
        self.frames.depth() >= self.context.options.limits.max_call_depth
    }

    /// Error value for an exceeded call depth
    pub(crate) fn call_depth_error(&self) -> Value {
        self.error(ErrorKind::InternalError, "Call depth exceeded")
    }

    fn top_is_error(&self) -> bool {
        matches!(self.stack.top(), Some(p) if p.target.is_error())
    }

    /// Pop frames until `frame` has been removed
    pub(crate) fn unwind_to(&mut self, frame: &Arc<NormalFrame>) {
        while !frame.is_removed() {
            if self.frames.pop().is_none() {
                break;
            }
        }
    }

    // ========================================================================
    // Evaluation loop
    // ========================================================================

    /// Run `cf` until it leaves, breaks, or an error reaches the stack top
    ///
    /// The frame must already be on the call-frame stack.
    ///
    /// # Errors
    ///
    /// Returns host-level failures such as operand stack overflow.
    pub fn eval_frame(&mut self, cf: &Arc<NormalFrame>) -> VmResult<()> {
        let mut executed = 0u64;
        let result = self.run_loop(cf, &mut executed);
        self.context.counters.increment_instructions(executed);
        result
    }

    fn run_loop(&mut self, cf: &Arc<NormalFrame>, executed: &mut u64) -> VmResult<()> {
        while !cf.is_stopped() {
            let Some(instruction) = cf.fetch() else {
                break;
            };
            *executed += 1;
            log::trace!(
                "{} {}:{} pc={} sp={} cfp={}",
                instruction.op.name(),
                cf.instruction_set().label(),
                instruction.line,
                cf.pc() - 1,
                self.stack.sp(),
                self.frames.depth()
            );

            self.exec(cf, &instruction.op)?;

            if self.top_is_error() {
                self.unwind_to(cf);
                break;
            }
        }
        Ok(())
    }

    fn exec(&mut self, cf: &Arc<NormalFrame>, op: &Op) -> VmResult<()> {
        match op {
            // Stack primitives
            Op::Pop => self.op_pop(),
            Op::Dup => self.op_dup(),
            Op::PutBoolean(b) => self.stack.push(Value::Boolean(*b)),
            Op::PutObject(literal) => self.stack.push(literal_value(literal)),
            Op::PutString(s) => self.stack.push(Value::string(s.as_str())),
            Op::PutFloat(f) => self.stack.push(Value::Float(*f)),
            Op::PutNull => self.stack.push(Value::Null),
            Op::PutSelf => self.stack.push(cf.self_value().clone()),

            // Constants, locals, instance variables
            Op::GetConstant { name, is_namespace } => {
                self.op_get_constant(cf, name, *is_namespace)
            }
            Op::SetConstant { name } => self.op_set_constant(cf, name),
            Op::GetLocal { depth, index } => self.op_get_local(cf, *depth, *index),
            Op::SetLocal {
                depth,
                index,
                optional,
            } => self.op_set_local(cf, *depth, *index, *optional),
            Op::GetInstanceVariable { name } => self.op_get_ivar(cf, name),
            Op::SetInstanceVariable { name } => self.op_set_ivar(cf, name),

            // Containers
            Op::NewRange => self.op_new_range(),
            Op::NewArray { count } => self.op_new_array(*count),
            Op::NewHash { count } => self.op_new_hash(*count),
            Op::ExpandArray { count } => self.op_expand_array(*count),
            Op::SplatArray => self.op_splat_array(),

            // Control flow
            Op::BranchUnless { target } => {
                if !self.stack.pop()?.truthy() {
                    cf.set_pc(*target);
                }
                Ok(())
            }
            Op::BranchIf { target } => {
                if self.stack.pop()?.truthy() {
                    cf.set_pc(*target);
                }
                Ok(())
            }
            Op::Jump { target } => {
                cf.set_pc(*target);
                Ok(())
            }
            Op::Break => {
                self.op_break(cf);
                Ok(())
            }

            // Definitions
            Op::DefMethod { argc } => self.op_def_method(cf, *argc, false),
            Op::DefSingletonMethod { argc } => self.op_def_method(cf, *argc, true),
            Op::DefClass {
                is_module,
                name,
                has_super,
            } => self.op_def_class(cf, *is_module, name, *has_super),

            // Calls and blocks
            Op::Send {
                name,
                argc,
                block,
                arg_set,
            } => self.send(cf, name, *argc, block.as_deref(), arg_set.as_ref()),
            Op::InvokeBlock { argc } => self.invoke_block(cf, *argc),
            Op::GetBlock => self.op_get_block(cf),
            Op::Leave => {
                cf.finish();
                self.unwind_to(cf);
                Ok(())
            }
        }
    }

    // ========================================================================
    // Stack primitives
    // ========================================================================

    fn op_pop(&mut self) -> VmResult<()> {
        self.stack.pop()?;
        Ok(())
    }

    fn op_dup(&mut self) -> VmResult<()> {
        let value = self.stack.peek()?;
        self.stack.push(value)
    }

    // ========================================================================
    // Constants, locals, instance variables
    // ========================================================================

    /// Class whose constant table a frame reads and writes
    fn scope_class(&self, cf: &NormalFrame) -> ClassId {
        match cf.self_value() {
            Value::Class(class) => *class,
            other => self.context.classes.class_of(other),
        }
    }

    fn op_get_constant(&mut self, cf: &NormalFrame, name: &str, is_namespace: bool) -> VmResult<()> {
        let namespace = match self.stack.top() {
            Some(p) if p.is_namespace => Some(p.target.clone()),
            _ => None,
        };

        let found = match namespace {
            Some(ns) => {
                self.stack.pop()?;
                match ns {
                    Value::Class(class) => {
                        self.context.classes.lookup_constant_in_namespace(class, name)
                    }
                    _ => None,
                }
            }
            None => self
                .context
                .classes
                .lookup_constant(self.scope_class(cf), name),
        };

        match found {
            Some(value) if is_namespace => self.stack.push_namespace(value),
            Some(value) => self.stack.push(value),
            None => self.push_error(ErrorKind::NameError, messages::uninitialized_constant(name)),
        }
    }

    fn op_set_constant(&mut self, cf: &NormalFrame, name: &str) -> VmResult<()> {
        let value = self.stack.pop()?;
        let scope = self.scope_class(cf);
        if !self.context.classes.set_constant(scope, name, value) {
            return self.push_error(
                ErrorKind::ConstantAlreadyInitializedError,
                messages::constant_already_initialized(name),
            );
        }
        Ok(())
    }

    fn op_get_local(&mut self, cf: &NormalFrame, depth: usize, index: usize) -> VmResult<()> {
        let value = cf.get_lcl(index, depth).unwrap_or_default();
        self.stack.push(value)
    }

    fn op_set_local(
        &mut self,
        cf: &NormalFrame,
        depth: usize,
        index: usize,
        optional: bool,
    ) -> VmResult<()> {
        let value = self.stack.pop()?;
        if !cf.set_lcl(index, depth, value.copy(), optional) {
            return self.push_error(
                ErrorKind::InternalError,
                format!("Can't find local variable at depth {}", depth),
            );
        }
        Ok(())
    }

    fn op_get_ivar(&mut self, cf: &NormalFrame, name: &str) -> VmResult<()> {
        let value = match cf.self_value() {
            Value::Instance(instance) => instance.ivar(name),
            Value::Class(class) => self.context.classes.ivar(*class, name),
            _ => None,
        };
        self.stack.push(value.unwrap_or_default())
    }

    fn op_set_ivar(&mut self, cf: &NormalFrame, name: &str) -> VmResult<()> {
        let value = self.stack.pop()?.copy();
        match cf.self_value() {
            Value::Instance(instance) => instance.set_ivar(name, value),
            Value::Class(class) => self.context.classes.set_ivar(*class, name, value),
            other => {
                let class = self.context.classes.class_name_of(other);
                return self.push_error(
                    ErrorKind::TypeError,
                    format!("Can't set instance variable {} on {}", name, class),
                );
            }
        }
        Ok(())
    }

    // ========================================================================
    // Containers
    // ========================================================================

    fn op_new_range(&mut self) -> VmResult<()> {
        let end = self.stack.pop()?;
        let start = self.stack.pop()?;
        match (start.as_int(), end.as_int()) {
            (Some(start), Some(end)) => self.stack.push(Value::range(start, end)),
            _ => {
                let got = self.context.classes.class_name_of(&start);
                self.push_error(ErrorKind::TypeError, messages::wrong_type("Integer", &got))
            }
        }
    }

    fn op_new_array(&mut self, count: usize) -> VmResult<()> {
        let elements = self.stack.pop_n(count)?;
        self.stack.push(Value::array(elements))
    }

    fn op_new_hash(&mut self, count: usize) -> VmResult<()> {
        let values = self.stack.pop_n(count)?;
        let mut pairs = rustc_hash::FxHashMap::default();
        for pair in values.chunks(2) {
            let key = match &pair[0] {
                Value::String(s) => s.to_string(),
                other => other.to_s(&self.context.classes),
            };
            pairs.insert(key, pair.get(1).cloned().unwrap_or_default());
        }
        self.stack.push(Value::hash(pairs))
    }

    /// Pushes the elements last first, so that the first element ends on top
    /// for the `setlocal` sequence that follows.
    fn op_expand_array(&mut self, count: usize) -> VmResult<()> {
        let value = self.stack.pop()?;
        let elements = match &value {
            Value::Array(array) => array.snapshot(),
            other => vec![other.clone()],
        };
        for i in (0..count).rev() {
            self.stack.push(elements.get(i).cloned().unwrap_or_default())?;
        }
        Ok(())
    }

    fn op_splat_array(&mut self) -> VmResult<()> {
        let value = self.stack.pop()?;
        let array = match value {
            Value::Array(array) => array,
            Value::Null => Arc::new(crate::object::ArrayObject::new(Vec::new())),
            other => Arc::new(crate::object::ArrayObject::new(vec![other])),
        };
        array.set_splat(true);
        self.stack.push(Value::Array(array))
    }

    // ========================================================================
    // Definitions
    // ========================================================================

    fn op_def_method(&mut self, cf: &NormalFrame, argc: usize, singleton: bool) -> VmResult<()> {
        let name = self.stack.pop()?;
        let receiver = self.stack.pop()?;
        let name = match name {
            Value::String(name) => name,
            other => {
                let got = self.context.classes.class_name_of(&other);
                return self.push_error(ErrorKind::TypeError, messages::wrong_type("String", &got));
            }
        };

        let set = self
            .context
            .tables
            .lock()
            .next_method(cf.file(), &name)
            .ok_or_else(|| VmError::MissingInstructionSet {
                kind: "method",
                name: name.to_string(),
            })?;
        let method = MethodRef::User(Arc::new(MethodObject::new(name.as_ref(), set, argc)));
        let classes = &self.context.classes;

        match (&receiver, singleton) {
            (Value::Class(class), false) => classes.define_method(*class, &name, method),
            (Value::Class(class), true) => classes.define_class_method(*class, &name, method),
            (value, false) if self.context.is_main_object(value) => {
                classes.define_method(ClassId::OBJECT, &name, method)
            }
            (Value::Instance(instance), _) => {
                let singleton_class = classes.create_singleton_class(instance);
                classes.define_method(singleton_class, &name, method);
            }
            (other, _) => {
                let got = classes.class_name_of(other);
                return self.push_error(
                    ErrorKind::TypeError,
                    format!("Can't define method {} on {}", name, got),
                );
            }
        }
        Ok(())
    }

    fn op_def_class(
        &mut self,
        cf: &NormalFrame,
        is_module: bool,
        name: &str,
        has_super: bool,
    ) -> VmResult<()> {
        let superclass = if has_super {
            Some(self.stack.pop()?)
        } else {
            None
        };
        let outer = self.stack.pop()?;
        let scope = match outer {
            Value::Class(class) => class,
            _ => ClassId::OBJECT,
        };

        let classes = &self.context.classes;
        let class = match classes.constant(scope, name) {
            Some(Value::Class(class)) => class,
            Some(other) => {
                let got = classes.class_name_of(&other);
                return self.push_error(ErrorKind::TypeError, messages::wrong_type("Class", &got));
            }
            None => classes.define_class(name, is_module, scope),
        };

        match superclass {
            Some(Value::Class(sup)) => {
                if let Err(message) = classes.set_superclass(class, sup) {
                    return self.push_error(ErrorKind::InternalError, message);
                }
            }
            Some(other) => {
                let got = classes.class_name_of(&other);
                return self.push_error(ErrorKind::TypeError, messages::wrong_type("Class", &got));
            }
            None => {}
        }

        let body = self
            .context
            .tables
            .lock()
            .next_class(cf.file(), name)
            .ok_or_else(|| VmError::MissingInstructionSet {
                kind: "class",
                name: name.to_string(),
            })?;

        if self.call_depth_exceeded() {
            let error = self.call_depth_error();
            return self.stack.push(error);
        }
        let sp = self.stack.sp();
        let frame = Arc::new(NormalFrame::new(body, Value::Class(class), Vec::new(), None));
        self.frames.push(Frame::Normal(frame.clone()));
        self.eval_frame(&frame)?;

        if self.top_is_error() {
            return Ok(());
        }
        self.stack.truncate(sp);
        self.stack.push(Value::Class(class))
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    fn op_get_block(&mut self, cf: &NormalFrame) -> VmResult<()> {
        match self.yield_target(cf) {
            Some(block) => self
                .stack
                .push(Value::Block(Arc::new(crate::object::BlockObject::new(block)))),
            None => self.push_error(ErrorKind::InternalError, messages::CANT_YIELD_WITHOUT_BLOCK),
        }
    }

    /// Leave the innermost yielded block together with its yielder
    ///
    /// Pops the block's executing frame, then the frame that yielded to it
    /// (a builtin frame or a method frame), then the block's source frame,
    /// marking each stopped. Frames not present are skipped.
    fn op_break(&mut self, cf: &Arc<NormalFrame>) {
        cf.stop();
        self.unwind_to(cf);

        let Some(source) = cf.block_frame().filter(|_| cf.is_block()).cloned() else {
            return;
        };
        if let Some(top) = self.frames.top() {
            if !top.is(&source) {
                top.stop();
                self.frames.pop();
            }
        }
        if let Some(top) = self.frames.top() {
            if top.is(&source) {
                top.stop();
                self.frames.pop();
            }
        }
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Integer(i) => Value::int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::string(s.as_str()),
        Literal::Boolean(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    }
}
