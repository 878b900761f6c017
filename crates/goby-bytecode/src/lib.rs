//! Goby VM Bytecode Definitions
//!
//! This crate provides the instruction sets consumed by the Goby virtual
//! machine: typed opcodes, parameter tables, the labelled listing format and
//! a structural verifier.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod args;
pub mod assembler;
pub mod instruction;
pub mod op;
pub mod verify;

pub use args::{ArgKind, ArgSet};
pub use assembler::assemble;
pub use instruction::{BytecodeError, Instruction, InstructionSet, Program, SetKind};
pub use op::{Literal, Op};
pub use verify::{verify_program, VerifyError};
