//! VM lifecycle and entry points
//!
//! A [`Vm`] owns a [`VmContext`] and the main [`Thread`]. Programs are
//! loaded as instruction sets and their `ProgramStart` set runs on a host
//! thread with a large stack, since every Goby call recurses on the host
//! stack.

use super::{Mode, ResourceCounters, Thread, VmContext, VmOptions};
use crate::frame::{CallFrameStack, Frame, NormalFrame};
use crate::value::Value;
use crate::{VmError, VmResult};
use goby_bytecode::{InstructionSet, Program};
use std::sync::Arc;

/// High-level VM handle
///
/// ```no_run
/// use goby_core::{Vm, VmOptions};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let program = goby_bytecode::assemble("main.gb", "<ProgramStart>\nputobject 1\nleave\n")?;
/// let mut vm = Vm::with_options(VmOptions::default());
/// vm.exec_instructions(program.sets, "main.gb")?;
/// assert_eq!(vm.get_exec_result().and_then(|v| v.as_int()), Some(1));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Vm {
    context: Arc<VmContext>,
    main: Thread,
    /// Frame of the previous REPL chunk, whose locals the next chunk inherits
    repl_frame: Option<Arc<NormalFrame>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    /// Create a VM with default options
    pub fn new() -> Self {
        Self::with_options(VmOptions::default())
    }

    /// Create a VM
    pub fn with_options(options: VmOptions) -> Self {
        let context = VmContext::new(options);
        let main = Thread::new(context.clone());
        Self {
            context,
            main,
            repl_frame: None,
        }
    }

    /// Shared VM state
    pub fn context(&self) -> &Arc<VmContext> {
        &self.context
    }

    /// Resource counters
    pub fn counters(&self) -> &ResourceCounters {
        &self.context.counters
    }

    /// Take output captured by `puts` and `print`
    pub fn take_output(&self) -> String {
        self.context.take_output()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Load `sets` and run their program set
    ///
    /// # Errors
    ///
    /// Returns [`VmError::MissingInstructionSet`] when the batch has no
    /// program set, [`VmError::Program`] in normal mode when an error
    /// reaches the top frame, and host-level failures.
    pub fn exec_instructions(&mut self, sets: Vec<InstructionSet>, filename: &str) -> VmResult<()> {
        let program = self.load(sets, filename)?;
        log::debug!("executing {} ({} instructions)", filename, program.len());

        self.main.stack.truncate(0);
        let frame = Arc::new(NormalFrame::new(
            program,
            self.context.main_object().clone(),
            Vec::new(),
            None,
        ));
        self.run_main(frame)?;
        self.check_top_error()
    }

    /// Run every set of an assembled or decoded program
    ///
    /// # Errors
    ///
    /// See [`Vm::exec_instructions`].
    pub fn exec_program(&mut self, program: Program) -> VmResult<()> {
        let filename = program.filename.clone();
        self.exec_instructions(program.sets, &filename)
    }

    /// Value left on top of the main operand stack
    pub fn get_exec_result(&self) -> Option<Value> {
        self.main.stack.top().map(|p| p.target.clone())
    }

    // ========================================================================
    // REPL
    // ========================================================================

    /// Reset the main thread for a REPL session
    pub fn init_for_repl(&mut self) {
        self.main.stack.truncate(0);
        self.main.frames = CallFrameStack::new();
        self.repl_frame = None;
    }

    /// Run one REPL chunk
    ///
    /// Locals bound by earlier chunks stay visible; the operand stack is
    /// cleared first, so [`Vm::get_exec_result`] reports this chunk only.
    ///
    /// # Errors
    ///
    /// See [`Vm::exec_instructions`].
    pub fn repl_exec(&mut self, sets: Vec<InstructionSet>) -> VmResult<()> {
        let filename = self
            .context
            .options
            .file
            .clone()
            .unwrap_or_else(|| "repl".to_string());
        let program = self.load(sets, &filename)?;

        let locals = self
            .repl_frame
            .as_ref()
            .map(|f| f.locals_snapshot())
            .unwrap_or_default();
        self.main.stack.truncate(0);
        let frame = Arc::new(NormalFrame::new(
            program,
            self.context.main_object().clone(),
            locals,
            None,
        ));
        self.repl_frame = Some(frame.clone());
        self.run_main(frame)?;
        self.check_top_error()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn load(&self, sets: Vec<InstructionSet>, filename: &str) -> VmResult<Arc<InstructionSet>> {
        self.context
            .tables
            .lock()
            .load(sets, filename)
            .ok_or_else(|| VmError::MissingInstructionSet {
                kind: "program",
                name: filename.to_string(),
            })
    }

    /// Evaluate `frame` on the main thread's stacks, on a host thread
    /// sized by `main_stack_size`
    fn run_main(&mut self, frame: Arc<NormalFrame>) -> VmResult<()> {
        let stack_size = self.context.options.main_stack_size;
        let thread = &mut self.main;
        std::thread::scope(|scope| {
            let handle = std::thread::Builder::new()
                .name("goby-main".to_string())
                .stack_size(stack_size)
                .spawn_scoped(scope, move || {
                    thread.frames.push(Frame::Normal(frame.clone()));
                    thread.eval_frame(&frame)
                })
                .map_err(|e| VmError::ThreadSpawn(e.to_string()))?;
            handle.join().unwrap_or(Err(VmError::ThreadPanicked))
        })
    }

    /// Report an error value left by the program according to the mode
    fn check_top_error(&self) -> VmResult<()> {
        let Some(error) = self.get_exec_result().filter(Value::is_error) else {
            return Ok(());
        };
        let message = error.to_s(&self.context.classes);
        match self.context.options.mode {
            Mode::Normal => {
                eprintln!("{}", message);
                Err(VmError::Program(message))
            }
            Mode::Repl => {
                self.context.write_output(&format!("{}\n", message));
                Ok(())
            }
            Mode::Test => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goby_bytecode::assemble;

    fn vm() -> Vm {
        Vm::with_options(VmOptions::test())
    }

    #[test]
    fn test_exec_leaves_result() {
        let program = assemble("main.gb", "<ProgramStart>\nputobject 40\nputobject 2\nsend + 1\nleave\n").unwrap();
        let mut vm = vm();
        vm.exec_program(program).unwrap();
        assert_eq!(vm.get_exec_result().and_then(|v| v.as_int()), Some(42));
    }

    #[test]
    fn test_missing_program_set() {
        let program = assemble("lib.gb", "<Def:foo>\nputnil\nleave\n").unwrap();
        let err = vm().exec_program(program).unwrap_err();
        assert!(matches!(err, VmError::MissingInstructionSet { kind: "program", .. }));
    }

    #[test]
    fn test_normal_mode_reports_error() {
        let program = assemble("main.gb", "<ProgramStart>\nputobject 1\nputobject 0\nsend / 1\nleave\n").unwrap();
        let mut vm = Vm::with_options(VmOptions::default().with_mode(Mode::Normal));
        let err = vm.exec_program(program).unwrap_err();
        assert!(err.to_string().starts_with("ZeroDivisionError: Divided by 0"));
    }

    #[test]
    fn test_repl_keeps_locals() {
        let mut vm = Vm::with_options(VmOptions::repl());
        vm.init_for_repl();

        let first = assemble("repl", "<ProgramStart>\nputobject 5\nsetlocal 0 0\nleave\n").unwrap();
        vm.repl_exec(first.sets).unwrap();

        let second = assemble("repl", "<ProgramStart>\ngetlocal 0 0\nputobject 1\nsend + 1\nleave\n").unwrap();
        vm.repl_exec(second.sets).unwrap();
        assert_eq!(vm.get_exec_result().and_then(|v| v.as_int()), Some(6));
    }
}
