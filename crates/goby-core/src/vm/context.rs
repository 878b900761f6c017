//! VM Execution Context
//!
//! A [`VmContext`] is the state shared by every language thread of one VM:
//! - The class registry (classes, method tables, constants)
//! - The instruction-set tables
//! - Resource limits and accounting
//! - The set of loaded standard libraries
//!
//! Operand stacks and call-frame stacks are per thread and never live here.

use crate::builtins;
use crate::class::ClassId;
use crate::object::InstanceObject;
use crate::value::Value;
use crate::vm::{ClassRegistry, InstructionTables};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Unique identifier for a VmContext
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VmContextId(u64);

impl VmContextId {
    /// Create a new unique context ID
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        VmContextId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for VmContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// What happens when an error reaches the top frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Print the error and fail the run
    #[default]
    Normal,
    /// Print the error and leave it on the stack
    Repl,
    /// Leave the error on the stack
    Test,
}

/// Resource limits for a VM
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    /// Operand stack slots per thread
    pub max_stack_slots: usize,

    /// Call frames per thread
    pub max_call_depth: usize,

    /// Maximum number of concurrently running spawned threads (None = unlimited)
    pub max_threads: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_stack_slots: crate::stack::DEFAULT_MAX_STACK_SIZE,
            max_call_depth: 10_000,
            max_threads: None,
        }
    }
}

impl ResourceLimits {
    /// Create resource limits with a thread limit
    pub fn with_thread_limit(max_threads: usize) -> Self {
        Self {
            max_threads: Some(max_threads),
            ..Default::default()
        }
    }

    /// Create resource limits with a call depth limit
    pub fn with_call_depth(max_call_depth: usize) -> Self {
        Self {
            max_call_depth,
            ..Default::default()
        }
    }
}

/// Resource usage counters
#[derive(Debug, Default)]
pub struct ResourceCounters {
    /// Current number of spawned threads still running
    active_threads: AtomicUsize,

    /// Peak number of spawned threads
    peak_threads: AtomicUsize,

    /// Total instructions dispatched
    total_instructions: AtomicU64,
}

impl ResourceCounters {
    /// Create new resource counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment active thread count
    pub fn increment_threads(&self) -> usize {
        let count = self.active_threads.fetch_add(1, Ordering::Relaxed) + 1;

        let mut peak = self.peak_threads.load(Ordering::Relaxed);
        while count > peak {
            match self.peak_threads.compare_exchange_weak(
                peak,
                count,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }

        count
    }

    /// Decrement active thread count
    pub fn decrement_threads(&self) -> usize {
        self.active_threads.fetch_sub(1, Ordering::Relaxed) - 1
    }

    /// Get current active thread count
    pub fn active_threads(&self) -> usize {
        self.active_threads.load(Ordering::Relaxed)
    }

    /// Get peak thread count
    pub fn peak_threads(&self) -> usize {
        self.peak_threads.load(Ordering::Relaxed)
    }

    /// Add to the instruction counter
    pub fn increment_instructions(&self, count: u64) {
        self.total_instructions.fetch_add(count, Ordering::Relaxed);
    }

    /// Get total instructions dispatched
    pub fn total_instructions(&self) -> u64 {
        self.total_instructions.load(Ordering::Relaxed)
    }
}

/// Options for creating a VM
#[derive(Debug, Clone)]
pub struct VmOptions {
    /// Error-at-top behaviour
    pub mode: Mode,

    /// Resource limits
    pub limits: ResourceLimits,

    /// Host stack size of spawned language threads, in bytes
    pub thread_stack_size: usize,

    /// Host stack size of the thread running top-level code, in bytes
    pub main_stack_size: usize,

    /// File name used in error locations (defaults to the executed file)
    pub file: Option<String>,

    /// Collect `puts`/`print` output in memory instead of writing to stdout
    pub capture_output: bool,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Normal,
            limits: ResourceLimits::default(),
            thread_stack_size: 8 * 1024 * 1024,  // 8 MB
            main_stack_size: 256 * 1024 * 1024, // 256 MB
            file: None,
            capture_output: false,
        }
    }
}

impl VmOptions {
    /// Options for test harnesses: errors stay on the stack, output is captured
    pub fn test() -> Self {
        Self {
            mode: Mode::Test,
            capture_output: true,
            ..Default::default()
        }
    }

    /// Options for an interactive session
    pub fn repl() -> Self {
        Self {
            mode: Mode::Repl,
            ..Default::default()
        }
    }

    /// Set the mode
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the resource limits
    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }
}

/// State shared by every thread of a VM
#[derive(Debug)]
pub struct VmContext {
    /// Unique context ID
    id: VmContextId,

    /// Classes, methods and constants
    pub classes: ClassRegistry,

    /// Loaded instruction sets
    pub tables: Mutex<InstructionTables>,

    /// Options the VM was created with
    pub options: VmOptions,

    /// Resource usage counters
    pub counters: ResourceCounters,

    /// Self of top-level code
    main_object: Value,

    /// Libraries already initialized by `require`
    libraries: Mutex<FxHashSet<String>>,

    /// Captured `puts`/`print` output
    output: Mutex<Vec<String>>,
}

impl VmContext {
    /// Create a context with every builtin class populated
    pub fn new(options: VmOptions) -> Arc<Self> {
        let classes = ClassRegistry::new();
        builtins::install_all(&classes);

        let context = Arc::new(Self {
            id: VmContextId::new(),
            classes,
            tables: Mutex::new(InstructionTables::new()),
            options,
            counters: ResourceCounters::new(),
            main_object: Value::Instance(Arc::new(InstanceObject::new(ClassId::OBJECT))),
            libraries: Mutex::new(FxHashSet::default()),
            output: Mutex::new(Vec::new()),
        });
        log::debug!(
            "vm context {} initialized with {} classes",
            context.id.as_u64(),
            context.classes.len()
        );
        context
    }

    /// Get the context ID
    pub fn id(&self) -> VmContextId {
        self.id
    }

    /// Self of top-level code
    pub fn main_object(&self) -> &Value {
        &self.main_object
    }

    /// Check if `value` is the main object
    pub fn is_main_object(&self, value: &Value) -> bool {
        match (value, &self.main_object) {
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Mark a library as loaded; returns false if it already was
    pub fn mark_library_loaded(&self, name: &str) -> bool {
        self.libraries.lock().insert(name.to_string())
    }

    /// Check if thread creation is allowed
    pub fn can_create_thread(&self) -> bool {
        match self.options.limits.max_threads {
            Some(max) => self.counters.active_threads() < max,
            None => true,
        }
    }

    /// Write program output
    pub fn write_output(&self, text: &str) {
        if self.options.capture_output {
            self.output.lock().push(text.to_string());
        } else {
            use std::io::Write;
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            let _ = lock.write_all(text.as_bytes());
            let _ = lock.flush();
        }
    }

    /// Take the captured output
    pub fn take_output(&self) -> String {
        self.output.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_track_peak() {
        let counters = ResourceCounters::new();
        counters.increment_threads();
        counters.increment_threads();
        counters.decrement_threads();
        assert_eq!(counters.active_threads(), 1);
        assert_eq!(counters.peak_threads(), 2);
    }

    #[test]
    fn test_thread_limit() {
        let context = VmContext::new(
            VmOptions::test().with_limits(ResourceLimits::with_thread_limit(1)),
        );
        assert!(context.can_create_thread());
        context.counters.increment_threads();
        assert!(!context.can_create_thread());
    }

    #[test]
    fn test_library_loaded_once() {
        let context = VmContext::new(VmOptions::test());
        assert!(context.mark_library_loaded("json"));
        assert!(!context.mark_library_loaded("json"));
    }

    #[test]
    fn test_captured_output() {
        let context = VmContext::new(VmOptions::test());
        context.write_output("a\n");
        context.write_output("b\n");
        assert_eq!(context.take_output(), "a\nb\n");
        assert_eq!(context.take_output(), "");
    }

    #[test]
    fn test_main_object_identity() {
        let context = VmContext::new(VmOptions::default());
        assert!(context.is_main_object(&context.main_object().clone()));
        assert!(!context.is_main_object(&Value::Null));
    }
}
