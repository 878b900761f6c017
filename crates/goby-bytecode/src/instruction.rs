//! Instruction sets and compiled programs

use crate::args::ArgSet;
use crate::op::Op;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Bytecode loading errors
#[derive(Debug, Error)]
pub enum BytecodeError {
    /// Malformed listing line
    #[error("Syntax error at line {line}: {message}")]
    Syntax {
        /// Listing line (1-based)
        line: usize,
        /// Description
        message: String,
    },

    /// Unknown mnemonic
    #[error("Unknown instruction '{name}' at line {line}")]
    UnknownInstruction {
        /// Listing line (1-based)
        line: usize,
        /// Mnemonic found
        name: String,
    },

    /// Instruction outside of any labelled set
    #[error("Instruction before any label at line {0}")]
    MissingLabel(usize),

    /// Invalid JSON program
    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Kind of an instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetKind {
    /// Top-level program (`<ProgramStart>`)
    Program,
    /// Method body (`<Def:name>`)
    MethodDef,
    /// Class body (`<DefClass:name>`)
    ClassDef,
    /// Block body (`<Block:id>`)
    Block,
}

impl SetKind {
    /// Label prefix in listings
    pub fn label_prefix(self) -> &'static str {
        match self {
            SetKind::Program => "ProgramStart",
            SetKind::MethodDef => "Def",
            SetKind::ClassDef => "DefClass",
            SetKind::Block => "Block",
        }
    }
}

/// One instruction with its source line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Opcode and operands
    pub op: Op,
    /// Source line for error reporting
    #[serde(default)]
    pub line: u32,
}

impl Instruction {
    /// Create an instruction
    pub fn new(op: Op, line: u32) -> Self {
        Self { op, line }
    }
}

/// A named, filename-tagged sequence of instructions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionSet {
    /// Method, class or block name (`ProgramStart` for programs)
    pub name: String,
    /// Set kind
    pub kind: SetKind,
    /// Source file
    #[serde(default)]
    pub filename: String,
    /// Instructions
    pub instructions: Vec<Instruction>,
    /// Parameter table (method definitions and blocks)
    #[serde(default)]
    pub params: ArgSet,
}

impl InstructionSet {
    /// Create an empty set
    pub fn new(kind: SetKind, name: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            filename: filename.into(),
            instructions: Vec::new(),
            params: ArgSet::new(),
        }
    }

    /// Append an instruction
    pub fn define(&mut self, op: Op, line: u32) -> &mut Self {
        self.instructions.push(Instruction::new(op, line));
        self
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Check if the set has no instructions
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Label used in listings
    pub fn label(&self) -> String {
        match self.kind {
            SetKind::Program => format!("<{}>", SetKind::Program.label_prefix()),
            kind => format!("<{}:{}>", kind.label_prefix(), self.name),
        }
    }
}

impl fmt::Display for InstructionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.label())?;
        if !self.params.is_empty() {
            writeln!(f, "params: {}", self.params.to_params())?;
        }
        for (index, instruction) in self.instructions.iter().enumerate() {
            write!(f, "{} {}", index, instruction.op)?;
            if instruction.line != 0 {
                write!(f, " @{}", instruction.line)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// All instruction sets of one compilation unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Source file of the unit
    pub filename: String,
    /// Instruction sets in definition order
    pub sets: Vec<InstructionSet>,
}

impl Program {
    /// Create an empty program
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            sets: Vec::new(),
        }
    }

    /// The `ProgramStart` set, if present
    pub fn entry(&self) -> Option<&InstructionSet> {
        self.sets.iter().find(|s| s.kind == SetKind::Program)
    }

    /// Iterate over sets of a kind
    pub fn sets_of(&self, kind: SetKind) -> impl Iterator<Item = &InstructionSet> {
        self.sets.iter().filter(move |s| s.kind == kind)
    }

    /// Decode a program from JSON
    pub fn from_json(json: &str) -> Result<Self, BytecodeError> {
        let mut program: Program = serde_json::from_str(json)?;
        for set in &mut program.sets {
            if set.filename.is_empty() {
                set.filename = program.filename.clone();
            }
        }
        Ok(program)
    }

    /// Encode the program as JSON
    pub fn to_json(&self) -> Result<String, BytecodeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for set in &self.sets {
            write!(f, "{}", set)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Literal;

    #[test]
    fn test_labels() {
        let program = InstructionSet::new(SetKind::Program, "ProgramStart", "a.gb");
        let method = InstructionSet::new(SetKind::MethodDef, "foo", "a.gb");
        let class = InstructionSet::new(SetKind::ClassDef, "Foo", "a.gb");
        let block = InstructionSet::new(SetKind::Block, "0", "a.gb");

        assert_eq!(program.label(), "<ProgramStart>");
        assert_eq!(method.label(), "<Def:foo>");
        assert_eq!(class.label(), "<DefClass:Foo>");
        assert_eq!(block.label(), "<Block:0>");
    }

    #[test]
    fn test_json_fills_filename() {
        let mut program = Program::new("main.gb");
        let mut set = InstructionSet::new(SetKind::Program, "ProgramStart", "");
        set.define(Op::PutObject(Literal::Integer(1)), 1)
            .define(Op::Leave, 1);
        program.sets.push(set);

        let json = program.to_json().unwrap();
        let decoded = Program::from_json(&json).unwrap();
        assert_eq!(decoded.sets[0].filename, "main.gb");
        assert_eq!(decoded.entry().unwrap().len(), 2);
    }

    #[test]
    fn test_display_listing() {
        let mut set = InstructionSet::new(SetKind::MethodDef, "foo", "a.gb");
        set.params.push("x", crate::ArgKind::Normal);
        set.define(Op::GetLocal { depth: 0, index: 0 }, 2)
            .define(Op::Leave, 0);

        assert_eq!(
            set.to_string(),
            "<Def:foo>\nparams: x\n0 getlocal 0 0 @2\n1 leave\n"
        );
    }
}
