//! Instruction-set tables
//!
//! Loaded sets are keyed by `(file, name)`. Method and class definition sets
//! are consumed in order: the n-th `def_method foo` executed in a file picks
//! the n-th `<Def:foo>` set of that file, and the last set is reused once the
//! list is exhausted (definitions inside loops or re-entered bodies).

use goby_bytecode::{InstructionSet, SetKind};
use rustc_hash::FxHashMap;
use std::sync::Arc;

type Key = (String, String);

#[derive(Debug, Default)]
struct Sequence {
    sets: Vec<Arc<InstructionSet>>,
    cursor: usize,
}

impl Sequence {
    fn next(&mut self) -> Option<Arc<InstructionSet>> {
        let set = self
            .sets
            .get(self.cursor)
            .or_else(|| self.sets.last())
            .cloned()?;
        if self.cursor < self.sets.len() {
            self.cursor += 1;
        }
        Some(set)
    }
}

/// Method-definition, class-definition, block and program tables
#[derive(Debug, Default)]
pub struct InstructionTables {
    methods: FxHashMap<Key, Sequence>,
    classes: FxHashMap<Key, Sequence>,
    blocks: FxHashMap<Key, Arc<InstructionSet>>,
    programs: FxHashMap<String, Arc<InstructionSet>>,
}

impl InstructionTables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Register sets; sets without a filename are tagged with `filename`
    ///
    /// Returns the program set of the batch, if any.
    pub fn load(&mut self, sets: Vec<InstructionSet>, filename: &str) -> Option<Arc<InstructionSet>> {
        let mut program = None;
        for mut set in sets {
            if set.filename.is_empty() {
                set.filename = filename.to_string();
            }
            let key = (set.filename.clone(), set.name.clone());
            let set = Arc::new(set);
            match set.kind {
                SetKind::MethodDef => self.methods.entry(key).or_default().sets.push(set),
                SetKind::ClassDef => self.classes.entry(key).or_default().sets.push(set),
                SetKind::Block => {
                    self.blocks.insert(key, set);
                }
                SetKind::Program => {
                    self.programs.insert(key.0, set.clone());
                    program = Some(set);
                }
            }
        }
        program
    }

    /// Next method-definition set named `name` in `file`
    pub fn next_method(&mut self, file: &str, name: &str) -> Option<Arc<InstructionSet>> {
        self.methods
            .get_mut(&(file.to_string(), name.to_string()))?
            .next()
    }

    /// Next class-definition set named `name` in `file`
    pub fn next_class(&mut self, file: &str, name: &str) -> Option<Arc<InstructionSet>> {
        self.classes
            .get_mut(&(file.to_string(), name.to_string()))?
            .next()
    }

    /// Block set `id` of `file`
    pub fn block(&self, file: &str, id: &str) -> Option<Arc<InstructionSet>> {
        self.blocks.get(&(file.to_string(), id.to_string())).cloned()
    }

    /// Program set of `file`
    pub fn program(&self, file: &str) -> Option<Arc<InstructionSet>> {
        self.programs.get(file).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(kind: SetKind, name: &str, marker: usize) -> InstructionSet {
        let mut set = InstructionSet::new(kind, name, "");
        for _ in 0..marker {
            set.define(goby_bytecode::Op::PutNull, 0);
        }
        set
    }

    #[test]
    fn test_definition_sets_consumed_in_order() {
        let mut tables = InstructionTables::new();
        tables.load(
            vec![
                set(SetKind::MethodDef, "foo", 1),
                set(SetKind::MethodDef, "foo", 2),
                set(SetKind::Program, "ProgramStart", 0),
            ],
            "a.gb",
        );

        assert_eq!(tables.next_method("a.gb", "foo").unwrap().len(), 1);
        assert_eq!(tables.next_method("a.gb", "foo").unwrap().len(), 2);
        assert_eq!(tables.next_method("a.gb", "foo").unwrap().len(), 2);
        assert!(tables.next_method("b.gb", "foo").is_none());
    }

    #[test]
    fn test_load_returns_program() {
        let mut tables = InstructionTables::new();
        let program = tables.load(
            vec![set(SetKind::Block, "0", 1), set(SetKind::Program, "ProgramStart", 3)],
            "main.gb",
        );
        assert_eq!(program.unwrap().filename, "main.gb");
        assert!(tables.block("main.gb", "0").is_some());
        assert!(tables.program("main.gb").is_some());
    }
}
