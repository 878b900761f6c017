//! Bytecode verification

use crate::instruction::{InstructionSet, Program, SetKind};
use crate::op::{Literal, Op};
use std::collections::HashSet;

/// Bytecode verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// No `<ProgramStart>` set
    #[error("Program has no ProgramStart instruction set")]
    MissingProgram,

    /// More than one `<ProgramStart>` set
    #[error("Program has {0} ProgramStart instruction sets")]
    DuplicateProgram(usize),

    /// Invalid jump target
    #[error("Invalid jump target {target} at {set}:{offset}")]
    InvalidJumpTarget {
        /// Set label
        set: String,
        /// Instruction index
        offset: usize,
        /// Jump target
        target: usize,
    },

    /// `send` refers to a block set that does not exist
    #[error("Unknown block '{block}' at {set}:{offset}")]
    UnknownBlock {
        /// Set label
        set: String,
        /// Instruction index
        offset: usize,
        /// Block name
        block: String,
    },

    /// `def_class` without a class body set
    #[error("Missing class body for '{name}' at {set}:{offset}")]
    MissingClassBody {
        /// Set label
        set: String,
        /// Instruction index
        offset: usize,
        /// Class name
        name: String,
    },

    /// `def_method` without a method body set
    #[error("Missing method body for '{name}' at {set}:{offset}")]
    MissingMethodBody {
        /// Set label
        set: String,
        /// Instruction index
        offset: usize,
        /// Method name
        name: String,
    },

    /// Execution falls off the end of a set
    #[error("Execution falls off end of {0}")]
    FallOffEnd(String),
}

/// Verify a program's instruction sets
pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    let entries = program.sets_of(SetKind::Program).count();
    match entries {
        0 => return Err(VerifyError::MissingProgram),
        1 => {}
        n => return Err(VerifyError::DuplicateProgram(n)),
    }

    let blocks: HashSet<&str> = program
        .sets_of(SetKind::Block)
        .map(|s| s.name.as_str())
        .collect();
    let classes: HashSet<&str> = program
        .sets_of(SetKind::ClassDef)
        .map(|s| s.name.as_str())
        .collect();
    let methods: HashSet<&str> = program
        .sets_of(SetKind::MethodDef)
        .map(|s| s.name.as_str())
        .collect();

    for set in &program.sets {
        verify_set(set, &blocks, &classes, &methods)?;
    }

    Ok(())
}

/// Verify a single instruction set
fn verify_set(
    set: &InstructionSet,
    blocks: &HashSet<&str>,
    classes: &HashSet<&str>,
    methods: &HashSet<&str>,
) -> Result<(), VerifyError> {
    // Empty sets are allowed
    if set.is_empty() {
        return Ok(());
    }

    for (offset, instruction) in set.instructions.iter().enumerate() {
        if let Some(target) = instruction.op.jump_target() {
            // A target equal to the length exits the frame
            if target > set.len() {
                return Err(VerifyError::InvalidJumpTarget {
                    set: set.label(),
                    offset,
                    target,
                });
            }
        }

        match &instruction.op {
            Op::Send {
                block: Some(block), ..
            } if !blocks.contains(block.as_str()) => {
                return Err(VerifyError::UnknownBlock {
                    set: set.label(),
                    offset,
                    block: block.clone(),
                });
            }
            Op::DefClass { name, .. } if !classes.contains(name.as_str()) => {
                return Err(VerifyError::MissingClassBody {
                    set: set.label(),
                    offset,
                    name: name.clone(),
                });
            }
            Op::DefMethod { .. } | Op::DefSingletonMethod { .. } => {
                // Names computed at runtime are checked when executed
                let name = match offset.checked_sub(1).map(|i| &set.instructions[i].op) {
                    Some(Op::PutString(name)) | Some(Op::PutObject(Literal::String(name))) => name,
                    _ => continue,
                };
                if !methods.contains(name.as_str()) {
                    return Err(VerifyError::MissingMethodBody {
                        set: set.label(),
                        offset,
                        name: name.clone(),
                    });
                }
            }
            _ => {}
        }
    }

    // Ensure the set ends with a terminator
    if let Some(last) = set.instructions.last() {
        if !last.op.is_terminator() {
            return Err(VerifyError::FallOffEnd(set.label()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble;

    #[test]
    fn test_valid_program() {
        let program = assemble(
            "t.gb",
            "<Block:0>\nputobject 1\nleave\n<ProgramStart>\nputobject 3\nsend times 0 block:0\nleave\n",
        )
        .unwrap();
        assert!(verify_program(&program).is_ok());
    }

    #[test]
    fn test_missing_program() {
        let program = assemble("t.gb", "<Def:foo>\nleave\n").unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::MissingProgram)
        ));
    }

    #[test]
    fn test_invalid_jump() {
        let program = assemble("t.gb", "<ProgramStart>\njump 5\nleave\n").unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::InvalidJumpTarget { target: 5, .. })
        ));
    }

    #[test]
    fn test_unknown_block() {
        let program =
            assemble("t.gb", "<ProgramStart>\nputobject 1\nsend times 0 block:9\nleave\n").unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::UnknownBlock { .. })
        ));
    }

    #[test]
    fn test_missing_class_body() {
        let program = assemble("t.gb", "<ProgramStart>\nputself\ndef_class class:Foo\nleave\n").unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::MissingClassBody { .. })
        ));
    }

    #[test]
    fn test_missing_method_body() {
        let program = assemble(
            "t.gb",
            "<ProgramStart>\nputself\nputstring foo\ndef_method 0\nputnil\nleave\n",
        )
        .unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::MissingMethodBody { ref name, offset: 2, .. }) if name == "foo"
        ));

        let program = assemble(
            "t.gb",
            "<Def:foo>\nputnil\nleave\n<ProgramStart>\nputself\nputstring foo\ndef_method 0\nputnil\nleave\n",
        )
        .unwrap();
        assert!(verify_program(&program).is_ok());
    }

    #[test]
    fn test_fall_off_end() {
        let program = assemble("t.gb", "<ProgramStart>\nputobject 1\n").unwrap();
        assert!(matches!(
            verify_program(&program),
            Err(VerifyError::FallOffEnd(_))
        ));
    }
}
