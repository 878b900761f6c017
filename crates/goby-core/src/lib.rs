//! Goby VM Core Runtime
//!
//! This crate provides the virtual machine runtime including:
//! - Bytecode interpreter (operand stack, call frames, EP chain)
//! - Object model and class registry
//! - Builtin classes and their methods
//! - Language threads and channels
//! - Error values and the error taxonomy

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod builtins;
pub mod channel;
pub mod class;
pub mod error;
pub mod frame;
pub mod object;
pub mod stack;
pub mod stdlib;
pub mod value;
pub mod vm;

pub use channel::{ChannelError, ChannelObject};
pub use class::{ClassId, MethodRef};
pub use error::{ErrorKind, ErrorObject};
pub use stack::{Pointer, Stack};
pub use value::Value;
pub use vm::{
    ClassRegistry, Mode, ResourceCounters, ResourceLimits, Thread, Vm, VmContext, VmContextId,
    VmOptions,
};

/// VM execution errors
///
/// These are host-level failures. Errors raised by Goby code are values
/// ([`Value::Error`]) and never take this path.
#[derive(Debug, thiserror::Error)]
pub enum VmError {
    /// Stack overflow
    #[error("Stack overflow")]
    StackOverflow,

    /// Stack underflow
    #[error("Stack underflow")]
    StackUnderflow,

    /// A definition instruction referenced a set that was never loaded
    #[error("Can't find {kind} instruction set for {name}")]
    MissingInstructionSet {
        /// `method`, `class`, `block` or `program`
        kind: &'static str,
        /// Name of the missing set
        name: String,
    },

    /// An error value reached the top frame
    #[error("{0}")]
    Program(String),

    /// The host refused to spawn a thread
    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    /// A host thread running Goby code panicked
    #[error("VM thread panicked")]
    ThreadPanicked,
}

/// VM execution result
pub type VmResult<T> = Result<T, VmError>;
