//! Call frames and the call-frame stack
//!
//! A [`NormalFrame`] runs one instruction set. Block frames reach the locals
//! of the frame that created them through the environment pointer (`ep`), so
//! closures need no captured environment object: `getlocal depth index`
//! simply follows `depth` EP links.
//!
//! Frames are reference counted because a block source frame outlives the
//! `send` that created it when it is reified as a Block object or handed to a
//! spawned thread. Mutable frame state is atomic or lock-protected for the
//! same reason.

use crate::value::Value;
use goby_bytecode::{Instruction, InstructionSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Frame running an instruction set
#[derive(Debug)]
pub struct NormalFrame {
    set: Arc<InstructionSet>,
    pc: AtomicUsize,
    locals: RwLock<Vec<Option<Value>>>,
    self_value: Value,
    ep: Option<Arc<NormalFrame>>,
    block_frame: Option<Arc<NormalFrame>>,
    is_block: bool,
    stopped: AtomicBool,
    removed: AtomicBool,
    line: AtomicU32,
}

impl NormalFrame {
    /// Create a frame for a method, class body or program
    pub fn new(
        set: Arc<InstructionSet>,
        self_value: Value,
        locals: Vec<Option<Value>>,
        block_frame: Option<Arc<NormalFrame>>,
    ) -> Self {
        Self {
            set,
            pc: AtomicUsize::new(0),
            locals: RwLock::new(locals),
            self_value,
            ep: None,
            block_frame,
            is_block: false,
            stopped: AtomicBool::new(false),
            removed: AtomicBool::new(false),
            line: AtomicU32::new(0),
        }
    }

    /// Create the source frame of a block attached by `send`
    ///
    /// The source frame is never run itself; each yield runs a fresh
    /// [`NormalFrame::block_execution`] frame derived from it.
    pub fn block_source(set: Arc<InstructionSet>, creator: &Arc<NormalFrame>) -> Self {
        Self {
            ep: Some(creator.clone()),
            is_block: true,
            line: AtomicU32::new(creator.line()),
            ..Self::new(set, creator.self_value.clone(), Vec::new(), None)
        }
    }

    /// Create the frame that runs one invocation of a block
    pub fn block_execution(source: &Arc<NormalFrame>, args: Vec<Value>) -> Self {
        Self {
            ep: source.ep.clone(),
            is_block: true,
            line: AtomicU32::new(source.line()),
            ..Self::new(
                source.set.clone(),
                source.self_value.clone(),
                args.into_iter().map(Some).collect(),
                Some(source.clone()),
            )
        }
    }

    /// Instruction set
    pub fn instruction_set(&self) -> &Arc<InstructionSet> {
        &self.set
    }

    /// Source file
    pub fn file(&self) -> &str {
        &self.set.filename
    }

    /// Line of the instruction executed last
    pub fn line(&self) -> u32 {
        self.line.load(Ordering::Relaxed)
    }

    /// Self of the frame
    pub fn self_value(&self) -> &Value {
        &self.self_value
    }

    /// Environment pointer
    pub fn ep(&self) -> Option<&Arc<NormalFrame>> {
        self.ep.as_ref()
    }

    /// Block attached to this frame (for block frames, their source frame)
    pub fn block_frame(&self) -> Option<&Arc<NormalFrame>> {
        self.block_frame.as_ref()
    }

    /// Whether the frame runs a block body
    pub fn is_block(&self) -> bool {
        self.is_block
    }

    /// Program counter
    pub fn pc(&self) -> usize {
        self.pc.load(Ordering::Relaxed)
    }

    /// Set the program counter
    pub fn set_pc(&self, pc: usize) {
        self.pc.store(pc, Ordering::Relaxed);
    }

    /// Fetch the next instruction and advance the program counter
    pub fn fetch(&self) -> Option<&Instruction> {
        let pc = self.pc();
        let instruction = self.set.instructions.get(pc)?;
        self.pc.store(pc + 1, Ordering::Relaxed);
        self.line.store(instruction.line, Ordering::Relaxed);
        Some(instruction)
    }

    /// Move the program counter past the last instruction
    pub fn finish(&self) {
        self.set_pc(self.set.instructions.len());
    }

    /// Whether `break` stopped this frame
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop executing this frame
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether the frame has been popped
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Read local `index`, `depth` environments outward
    pub fn get_lcl(&self, index: usize, depth: usize) -> Option<Value> {
        if depth == 0 {
            return self.locals.read().get(index).cloned().flatten();
        }
        self.ep.as_ref()?.get_lcl(index, depth - 1)
    }

    /// Write local `index`, `depth` environments outward
    ///
    /// With `optional`, an already bound slot is left untouched. Returns
    /// false when the EP chain is shorter than `depth`.
    pub fn set_lcl(&self, index: usize, depth: usize, value: Value, optional: bool) -> bool {
        if depth > 0 {
            return match &self.ep {
                Some(ep) => ep.set_lcl(index, depth - 1, value, optional),
                None => false,
            };
        }

        let mut locals = self.locals.write();
        if locals.len() <= index {
            locals.resize(index + 1, None);
        }
        if !(optional && locals[index].is_some()) {
            locals[index] = Some(value);
        }
        true
    }

    /// Number of local slots in use
    pub fn locals_len(&self) -> usize {
        self.locals.read().len()
    }

    /// Copy of the local slots
    pub fn locals_snapshot(&self) -> Vec<Option<Value>> {
        self.locals.read().clone()
    }
}

/// Lightweight frame recording a builtin invocation
#[derive(Debug)]
pub struct BuiltinFrame {
    name: String,
    file: String,
    line: u32,
    stopped: AtomicBool,
    removed: AtomicBool,
}

impl BuiltinFrame {
    /// Create a builtin frame
    pub fn new(name: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            line,
            stopped: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        }
    }

    /// Builtin method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File of the calling instruction
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line of the calling instruction
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Whether `break` stopped this frame
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Whether the frame has been popped
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

/// Entry of the call-frame stack
#[derive(Debug, Clone)]
pub enum Frame {
    /// Instruction-set frame
    Normal(Arc<NormalFrame>),
    /// Builtin method frame
    Builtin(Arc<BuiltinFrame>),
}

impl Frame {
    /// Stop executing the frame
    pub fn stop(&self) {
        match self {
            Frame::Normal(f) => f.stop(),
            Frame::Builtin(f) => f.stopped.store(true, Ordering::Release),
        }
    }

    /// Whether the frame has been popped
    pub fn is_removed(&self) -> bool {
        match self {
            Frame::Normal(f) => f.is_removed(),
            Frame::Builtin(f) => f.is_removed(),
        }
    }

    fn mark_removed(&self) {
        match self {
            Frame::Normal(f) => f.mark_removed(),
            Frame::Builtin(f) => f.removed.store(true, Ordering::Release),
        }
    }

    /// Check if this entry is the given normal frame
    pub fn is(&self, frame: &Arc<NormalFrame>) -> bool {
        matches!(self, Frame::Normal(f) if Arc::ptr_eq(f, frame))
    }

    /// File for error locations
    pub fn file(&self) -> &str {
        match self {
            Frame::Normal(f) => f.file(),
            Frame::Builtin(f) => f.file(),
        }
    }

    /// Line for error locations
    pub fn line(&self) -> u32 {
        match self {
            Frame::Normal(f) => f.line(),
            Frame::Builtin(f) => f.line(),
        }
    }
}

/// Per-thread stack of call frames
#[derive(Debug, Default)]
pub struct CallFrameStack {
    frames: Vec<Option<Frame>>,
    cfp: usize,
}

impl CallFrameStack {
    /// Create an empty call-frame stack
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a frame, reusing the trailing slot when possible
    pub fn push(&mut self, frame: Frame) {
        if self.cfp < self.frames.len() {
            self.frames[self.cfp] = Some(frame);
        } else {
            self.frames.push(Some(frame));
        }
        self.cfp += 1;
    }

    /// Pop the top frame and mark it removed
    pub fn pop(&mut self) -> Option<Frame> {
        if self.cfp == 0 {
            return None;
        }
        self.cfp -= 1;
        let frame = self.frames[self.cfp].take();
        if let Some(frame) = &frame {
            frame.mark_removed();
        }
        frame
    }

    /// Top frame
    pub fn top(&self) -> Option<&Frame> {
        if self.cfp == 0 {
            return None;
        }
        self.frames[self.cfp - 1].as_ref()
    }

    /// Number of live frames
    pub fn depth(&self) -> usize {
        self.cfp
    }

    /// Check if no frame is live
    pub fn is_empty(&self) -> bool {
        self.cfp == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goby_bytecode::SetKind;

    fn set() -> Arc<InstructionSet> {
        Arc::new(InstructionSet::new(SetKind::Block, "0", "test.gb"))
    }

    #[test]
    fn test_locals_grow_on_store() {
        let frame = NormalFrame::new(set(), Value::Null, Vec::new(), None);
        assert!(frame.get_lcl(3, 0).is_none());
        assert!(frame.set_lcl(3, 0, Value::int(7), false));
        assert_eq!(frame.locals_len(), 4);
        assert!(frame.get_lcl(3, 0).unwrap().equals(&Value::int(7)));
    }

    #[test]
    fn test_optional_store_keeps_value() {
        let frame = NormalFrame::new(set(), Value::Null, vec![Some(Value::int(1))], None);
        frame.set_lcl(0, 0, Value::int(2), true);
        assert!(frame.get_lcl(0, 0).unwrap().equals(&Value::int(1)));
        frame.set_lcl(1, 0, Value::int(2), true);
        assert!(frame.get_lcl(1, 0).unwrap().equals(&Value::int(2)));
    }

    #[test]
    fn test_ep_chain_lookup() {
        let method = Arc::new(NormalFrame::new(
            set(),
            Value::Null,
            vec![Some(Value::int(10))],
            None,
        ));
        let outer_source = Arc::new(NormalFrame::block_source(set(), &method));
        let outer = Arc::new(NormalFrame::block_execution(&outer_source, vec![Value::int(20)]));
        let inner_source = Arc::new(NormalFrame::block_source(set(), &outer));
        let inner = NormalFrame::block_execution(&inner_source, vec![Value::int(30)]);

        assert!(inner.get_lcl(0, 0).unwrap().equals(&Value::int(30)));
        assert!(inner.get_lcl(0, 1).unwrap().equals(&Value::int(20)));
        assert!(inner.get_lcl(0, 2).unwrap().equals(&Value::int(10)));
        assert!(inner.get_lcl(0, 3).is_none());

        assert!(inner.set_lcl(0, 2, Value::int(11), false));
        assert!(method.get_lcl(0, 0).unwrap().equals(&Value::int(11)));
        assert!(!inner.set_lcl(0, 3, Value::Null, false));
    }

    #[test]
    fn test_call_frame_stack_reuses_slots() {
        let mut stack = CallFrameStack::new();
        let a = Arc::new(NormalFrame::new(set(), Value::Null, Vec::new(), None));
        let b = Arc::new(NormalFrame::new(set(), Value::Null, Vec::new(), None));

        stack.push(Frame::Normal(a.clone()));
        stack.push(Frame::Builtin(Arc::new(BuiltinFrame::new("times", "test.gb", 1))));
        assert_eq!(stack.depth(), 2);

        let popped = stack.pop().unwrap();
        assert!(popped.is_removed());
        stack.push(Frame::Normal(b.clone()));
        assert_eq!(stack.depth(), 2);
        assert!(stack.top().unwrap().is(&b));

        stack.pop();
        stack.pop();
        assert!(a.is_removed());
        assert!(stack.is_empty());
        assert!(stack.pop().is_none());
    }
}
