//! Class records and method references
//!
//! Classes live in an arena owned by the [`ClassRegistry`](crate::vm::ClassRegistry)
//! and refer to each other through [`ClassId`] handles, so superclass,
//! enclosing-scope and singleton links never form reference cycles.

use crate::builtins::BuiltinFn;
use crate::object::MethodObject;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Handle of a class record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    /// Root of every inheritance chain
    pub const OBJECT: ClassId = ClassId(0);
    /// Class of every class
    pub const CLASS: ClassId = ClassId(1);
    /// Integer
    pub const INTEGER: ClassId = ClassId(2);
    /// Float
    pub const FLOAT: ClassId = ClassId(3);
    /// Decimal
    pub const DECIMAL: ClassId = ClassId(4);
    /// Boolean
    pub const BOOLEAN: ClassId = ClassId(5);
    /// Null
    pub const NULL: ClassId = ClassId(6);
    /// String
    pub const STRING: ClassId = ClassId(7);
    /// Array
    pub const ARRAY: ClassId = ClassId(8);
    /// Hash
    pub const HASH: ClassId = ClassId(9);
    /// Range
    pub const RANGE: ClassId = ClassId(10);
    /// Block
    pub const BLOCK: ClassId = ClassId(11);
    /// Method
    pub const METHOD: ClassId = ClassId(12);
    /// Regexp
    pub const REGEXP: ClassId = ClassId(13);
    /// MatchData
    pub const MATCH_DATA: ClassId = ClassId(14);
    /// Time
    pub const TIME: ClassId = ClassId(15);
    /// Channel
    pub const CHANNEL: ClassId = ClassId(16);
    /// Native handle
    pub const GO_OBJECT: ClassId = ClassId(17);
    /// Superclass of every error class
    pub const ERROR: ClassId = ClassId(18);
    /// First canonical error kind class
    pub const FIRST_ERROR_KIND: ClassId = ClassId(19);

    /// Arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Native builtin method entry
#[derive(Clone, Copy)]
pub struct Builtin {
    /// Method name
    pub name: &'static str,
    /// Native body
    pub func: BuiltinFn,
}

impl Builtin {
    /// Create a builtin entry
    pub const fn new(name: &'static str, func: BuiltinFn) -> Self {
        Self { name, func }
    }
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// Entry of a method table
#[derive(Debug, Clone)]
pub enum MethodRef {
    /// Native body
    Builtin(Builtin),
    /// Method defined by `def_method`
    User(Arc<MethodObject>),
}

/// A class or module
#[derive(Debug, Clone)]
pub struct ClassRecord {
    /// Class name
    pub name: String,
    /// Superclass (None only for Object and modules)
    pub superclass: Option<ClassId>,
    /// Enclosing class for namespaced constants
    pub scope: Option<ClassId>,
    /// Modules cannot be instantiated or inherited
    pub is_module: bool,
    /// Per-object class holding singleton methods
    pub is_singleton: bool,
    /// Instance methods
    pub methods: FxHashMap<String, MethodRef>,
    /// Class methods
    pub class_methods: FxHashMap<String, MethodRef>,
    /// Constants
    pub constants: FxHashMap<String, Value>,
    /// Class-level instance variables
    pub ivars: FxHashMap<String, Value>,
    /// Included modules, in inclusion order
    pub includes: Vec<ClassId>,
}

impl ClassRecord {
    /// Create an empty record
    pub fn new(name: impl Into<String>, superclass: Option<ClassId>, is_module: bool) -> Self {
        Self {
            name: name.into(),
            superclass,
            scope: None,
            is_module,
            is_singleton: false,
            methods: FxHashMap::default(),
            class_methods: FxHashMap::default(),
            constants: FxHashMap::default(),
            ivars: FxHashMap::default(),
            includes: Vec::new(),
        }
    }
}
