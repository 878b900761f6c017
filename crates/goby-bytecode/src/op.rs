//! Instruction opcodes for the Goby VM
//!
//! Every opcode carries its operands as typed fields, so the interpreter never
//! re-parses parameter strings at dispatch time. The textual mnemonic of each
//! opcode (see [`Op::name`]) is the one used by the listing format accepted by
//! [`crate::assemble`].

use crate::args::ArgSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal operand of `putobject`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    /// Integer literal
    Integer(i64),
    /// Float literal
    Float(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// `nil`
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::String(s) => write!(f, "{:?}", s),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "nil"),
        }
    }
}

/// Bytecode opcode with operands
///
/// Opcodes are organized into groups:
/// - stack primitives (`pop` .. `putself`)
/// - constants, locals and instance variables
/// - container construction
/// - control flow
/// - definitions
/// - calls and blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    // ===== Stack primitives =====
    /// Discard the top of stack
    Pop,
    /// Duplicate the top of stack
    Dup,
    /// Push a boolean
    PutBoolean(bool),
    /// Push a literal object
    PutObject(Literal),
    /// Push a string
    PutString(String),
    /// Push a float
    PutFloat(f64),
    /// Push `nil`
    PutNull,
    /// Push the current frame's self
    PutSelf,

    // ===== Constants, locals, instance variables =====
    /// Resolve a constant; `is_namespace` marks the result as a namespace prefix (`A::B`)
    GetConstant {
        /// Constant name
        name: String,
        /// Whether the result is used as a namespace prefix
        is_namespace: bool,
    },
    /// Bind the top of stack to a constant in the current scope
    SetConstant {
        /// Constant name
        name: String,
    },
    /// Push local `index` found `depth` environments outward
    GetLocal {
        /// Number of EP hops
        depth: usize,
        /// Local slot
        index: usize,
    },
    /// Pop into local `index` found `depth` environments outward
    SetLocal {
        /// Number of EP hops
        depth: usize,
        /// Local slot
        index: usize,
        /// Skip the store when the slot already holds a value (default arguments)
        optional: bool,
    },
    /// Push an instance variable of self
    GetInstanceVariable {
        /// Variable name including the `@`
        name: String,
    },
    /// Pop into an instance variable of self
    SetInstanceVariable {
        /// Variable name including the `@`
        name: String,
    },

    // ===== Containers =====
    /// Pop end and start, push a range
    NewRange,
    /// Pop `count` values into a new array
    NewArray {
        /// Number of elements
        count: usize,
    },
    /// Pop `count` values (key/value pairs) into a new hash
    NewHash {
        /// Number of stack slots (twice the number of pairs)
        count: usize,
    },
    /// Pop an array and push its first `count` elements, padding with nil
    ExpandArray {
        /// Number of values to push
        count: usize,
    },
    /// Mark the array on top of the stack as a splat argument
    SplatArray,

    // ===== Control flow =====
    /// Pop and jump when falsy
    BranchUnless {
        /// Target instruction index
        target: usize,
    },
    /// Pop and jump when truthy
    BranchIf {
        /// Target instruction index
        target: usize,
    },
    /// Unconditional jump
    Jump {
        /// Target instruction index
        target: usize,
    },
    /// Leave the innermost yielded block together with its yielder
    Break,

    // ===== Definitions =====
    /// Pop a name and a receiver, define a method on the receiver
    DefMethod {
        /// Declared argument count
        argc: usize,
    },
    /// Pop a name and a receiver, define a singleton method on the receiver
    DefSingletonMethod {
        /// Declared argument count
        argc: usize,
    },
    /// Look up or create a class, run its body and push it
    DefClass {
        /// `module:` rather than `class:`
        is_module: bool,
        /// Class name
        name: String,
        /// Whether the superclass value is on the stack
        has_super: bool,
    },

    // ===== Calls and blocks =====
    /// Dispatch a method call
    Send {
        /// Method name
        name: String,
        /// Argument count
        argc: usize,
        /// Name of the block instruction set to attach
        block: Option<String>,
        /// Kind of each argument position (keyword arguments carry names)
        arg_set: Option<ArgSet>,
    },
    /// Yield to the current method's block
    InvokeBlock {
        /// Argument count
        argc: usize,
    },
    /// Push the current method's block as an object
    GetBlock,
    /// Finish the current frame
    Leave,
}

impl Op {
    /// Get the mnemonic used in bytecode listings
    pub fn name(&self) -> &'static str {
        match self {
            Op::Pop => "pop",
            Op::Dup => "dup",
            Op::PutBoolean(_) => "putboolean",
            Op::PutObject(_) => "putobject",
            Op::PutString(_) => "putstring",
            Op::PutFloat(_) => "putfloat",
            Op::PutNull => "putnil",
            Op::PutSelf => "putself",
            Op::GetConstant { .. } => "getconstant",
            Op::SetConstant { .. } => "setconstant",
            Op::GetLocal { .. } => "getlocal",
            Op::SetLocal { .. } => "setlocal",
            Op::GetInstanceVariable { .. } => "getinstancevariable",
            Op::SetInstanceVariable { .. } => "setinstancevariable",
            Op::NewRange => "newrange",
            Op::NewArray { .. } => "newarray",
            Op::NewHash { .. } => "newhash",
            Op::ExpandArray { .. } => "expandarray",
            Op::SplatArray => "splatarray",
            Op::BranchUnless { .. } => "branchunless",
            Op::BranchIf { .. } => "branchif",
            Op::Jump { .. } => "jump",
            Op::Break => "break",
            Op::DefMethod { .. } => "def_method",
            Op::DefSingletonMethod { .. } => "def_singleton_method",
            Op::DefClass { .. } => "def_class",
            Op::Send { .. } => "send",
            Op::InvokeBlock { .. } => "invokeblock",
            Op::GetBlock => "getblock",
            Op::Leave => "leave",
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Op::BranchUnless { .. } | Op::BranchIf { .. } | Op::Jump { .. }
        )
    }

    /// Get the target of a jump instruction
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::BranchUnless { target } | Op::BranchIf { target } | Op::Jump { target } => {
                Some(*target)
            }
            _ => None,
        }
    }

    /// Check if this opcode may end a frame's execution
    pub fn is_terminator(&self) -> bool {
        matches!(self, Op::Leave | Op::Break | Op::Jump { .. })
    }

    /// Check if this opcode is a call instruction
    pub fn is_call(&self) -> bool {
        matches!(self, Op::Send { .. } | Op::InvokeBlock { .. })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        match self {
            Op::PutBoolean(b) => write!(f, " {}", b),
            Op::PutObject(lit) => write!(f, " {}", lit),
            Op::PutString(s) => write!(f, " {:?}", s),
            Op::PutFloat(x) => write!(f, " {:?}", x),
            Op::GetConstant { name, is_namespace } => write!(f, " {} {}", name, is_namespace),
            Op::SetConstant { name }
            | Op::GetInstanceVariable { name }
            | Op::SetInstanceVariable { name } => write!(f, " {}", name),
            Op::GetLocal { depth, index } => write!(f, " {} {}", depth, index),
            Op::SetLocal {
                depth,
                index,
                optional,
            } => {
                write!(f, " {} {}", depth, index)?;
                if *optional {
                    write!(f, " optional")?;
                }
                Ok(())
            }
            Op::NewArray { count } | Op::NewHash { count } | Op::ExpandArray { count } => {
                write!(f, " {}", count)
            }
            Op::BranchUnless { target } | Op::BranchIf { target } | Op::Jump { target } => {
                write!(f, " {}", target)
            }
            Op::DefMethod { argc } | Op::DefSingletonMethod { argc } | Op::InvokeBlock { argc } => {
                write!(f, " {}", argc)
            }
            Op::DefClass {
                is_module,
                name,
                has_super,
            } => {
                let kind = if *is_module { "module" } else { "class" };
                write!(f, " {}:{}", kind, name)?;
                if *has_super {
                    write!(f, " super")?;
                }
                Ok(())
            }
            Op::Send {
                name,
                argc,
                block,
                arg_set,
            } => {
                write!(f, " {} {}", name, argc)?;
                if let Some(block) = block {
                    write!(f, " block:{}", block)?;
                }
                if let Some(arg_set) = arg_set {
                    write!(f, " args:{}", arg_set.to_call_site())?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names() {
        assert_eq!(Op::Pop.name(), "pop");
        assert_eq!(Op::PutNull.name(), "putnil");
        assert_eq!(Op::InvokeBlock { argc: 1 }.name(), "invokeblock");
        assert_eq!(
            Op::DefSingletonMethod { argc: 0 }.name(),
            "def_singleton_method"
        );
    }

    #[test]
    fn test_jump_detection() {
        assert!(Op::Jump { target: 3 }.is_jump());
        assert!(Op::BranchIf { target: 3 }.is_jump());
        assert!(Op::BranchUnless { target: 3 }.is_jump());
        assert!(!Op::Leave.is_jump());
        assert_eq!(Op::BranchIf { target: 7 }.jump_target(), Some(7));
        assert_eq!(Op::Dup.jump_target(), None);
    }

    #[test]
    fn test_terminator_detection() {
        assert!(Op::Leave.is_terminator());
        assert!(Op::Break.is_terminator());
        assert!(!Op::BranchIf { target: 0 }.is_terminator());
        assert!(!Op::PutSelf.is_terminator());
    }

    #[test]
    fn test_display() {
        let send = Op::Send {
            name: "+".to_string(),
            argc: 1,
            block: Some("0".to_string()),
            arg_set: None,
        };
        assert_eq!(send.to_string(), "send + 1 block:0");
        assert_eq!(
            Op::SetLocal {
                depth: 1,
                index: 2,
                optional: true
            }
            .to_string(),
            "setlocal 1 2 optional"
        );
        assert_eq!(
            Op::DefClass {
                is_module: true,
                name: "Foo".to_string(),
                has_super: false
            }
            .to_string(),
            "def_class module:Foo"
        );
        assert_eq!(Op::PutString("a b".to_string()).to_string(), "putstring \"a b\"");
    }
}
