//! Heap object layouts
//!
//! Every mutable object kind is shared between threads behind an `Arc`, with
//! interior state guarded by `parking_lot` locks. Builtins take a snapshot of
//! container contents before yielding to a block so that no lock is held
//! while user code runs.

use crate::class::ClassId;
use crate::frame::NormalFrame;
use crate::value::Value;
use goby_bytecode::InstructionSet;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique object id
pub fn next_object_id() -> u64 {
    NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed)
}

// ============================================================================
// Integer
// ============================================================================

/// Native width of an integer, kept for host bridging only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IntWidth {
    /// 8-bit signed
    I8,
    /// 16-bit signed
    I16,
    /// 32-bit signed
    I32,
    /// 64-bit signed
    #[default]
    I64,
    /// 8-bit unsigned
    U8,
    /// 16-bit unsigned
    U16,
    /// 32-bit unsigned
    U32,
    /// 64-bit unsigned
    U64,
}

/// Integer value with its width flag
///
/// Arithmetic always happens on the `i64` form; the width only survives
/// until the next operation produces a fresh integer.
#[derive(Debug, Clone, Copy)]
pub struct Integer {
    /// Value
    pub value: i64,
    /// Width flag
    pub width: IntWidth,
}

impl Integer {
    /// Create a default-width integer
    pub const fn new(value: i64) -> Self {
        Self {
            value,
            width: IntWidth::I64,
        }
    }

    /// Create an integer with an explicit width
    pub const fn with_width(value: i64, width: IntWidth) -> Self {
        Self { value, width }
    }
}

impl PartialEq for Integer {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

// ============================================================================
// Containers
// ============================================================================

/// Mutable ordered sequence
#[derive(Debug, Default)]
pub struct ArrayObject {
    elements: RwLock<Vec<Value>>,
    splat: AtomicBool,
}

impl ArrayObject {
    /// Create an array
    pub fn new(elements: Vec<Value>) -> Self {
        Self {
            elements: RwLock::new(elements),
            splat: AtomicBool::new(false),
        }
    }

    /// Borrow the elements for reading
    pub fn elements(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.elements.read()
    }

    /// Borrow the elements for writing
    pub fn elements_mut(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.elements.write()
    }

    /// Clone the current elements
    pub fn snapshot(&self) -> Vec<Value> {
        self.elements.read().clone()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    /// Check if the array is empty
    pub fn is_empty(&self) -> bool {
        self.elements.read().is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<Value> {
        self.elements.read().get(index).cloned()
    }

    /// Append an element
    pub fn push(&self, value: Value) {
        self.elements.write().push(value);
    }

    /// Whether the array is marked for argument expansion
    pub fn is_splat(&self) -> bool {
        self.splat.load(Ordering::Acquire)
    }

    /// Set or clear the splat marker
    pub fn set_splat(&self, splat: bool) {
        self.splat.store(splat, Ordering::Release);
    }
}

/// Mutable string-keyed map
#[derive(Debug, Default)]
pub struct HashObject {
    pairs: RwLock<FxHashMap<String, Value>>,
}

impl HashObject {
    /// Create a hash
    pub fn new(pairs: FxHashMap<String, Value>) -> Self {
        Self {
            pairs: RwLock::new(pairs),
        }
    }

    /// Borrow the pairs for reading
    pub fn pairs(&self) -> RwLockReadGuard<'_, FxHashMap<String, Value>> {
        self.pairs.read()
    }

    /// Borrow the pairs for writing
    pub fn pairs_mut(&self) -> RwLockWriteGuard<'_, FxHashMap<String, Value>> {
        self.pairs.write()
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.pairs.read().get(key).cloned()
    }

    /// Insert or replace a pair
    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.pairs.write().insert(key.into(), value);
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.read().len()
    }

    /// Check if the hash is empty
    pub fn is_empty(&self) -> bool {
        self.pairs.read().is_empty()
    }

    /// Keys in sorted order
    pub fn sorted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.pairs.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Pairs in key order
    pub fn sorted_pairs(&self) -> Vec<(String, Value)> {
        let mut pairs: Vec<(String, Value)> = self
            .pairs
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        pairs
    }

    /// Clone the current pairs
    pub fn snapshot(&self) -> FxHashMap<String, Value> {
        self.pairs.read().clone()
    }
}

// ============================================================================
// Instances
// ============================================================================

/// Instance of a user-defined class
#[derive(Debug)]
pub struct InstanceObject {
    class: RwLock<ClassId>,
    ivars: RwLock<FxHashMap<String, Value>>,
    frozen: AtomicBool,
    id: u64,
}

impl InstanceObject {
    /// Create an instance with no instance variables
    pub fn new(class: ClassId) -> Self {
        Self {
            class: RwLock::new(class),
            ivars: RwLock::new(FxHashMap::default()),
            frozen: AtomicBool::new(false),
            id: next_object_id(),
        }
    }

    /// Current class (the singleton class once one exists)
    pub fn class(&self) -> ClassId {
        *self.class.read()
    }

    /// Replace the class pointer
    pub fn set_class(&self, class: ClassId) {
        *self.class.write() = class;
    }

    /// Object id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Read an instance variable
    pub fn ivar(&self, name: &str) -> Option<Value> {
        self.ivars.read().get(name).cloned()
    }

    /// Write an instance variable
    pub fn set_ivar(&self, name: impl Into<String>, value: Value) {
        self.ivars.write().insert(name.into(), value);
    }

    /// Instance variable names in sorted order
    pub fn ivar_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.ivars.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Clone the instance variables
    pub fn ivars(&self) -> FxHashMap<String, Value> {
        self.ivars.read().clone()
    }

    /// Set the frozen flag; it is not enforced by assignment
    pub fn freeze(&self) {
        self.frozen.store(true, Ordering::Relaxed);
    }

    /// Check the frozen flag
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Relaxed)
    }
}

// ============================================================================
// Callables
// ============================================================================

/// Block reified as an object (by `getblock` or `Block.new`)
#[derive(Debug)]
pub struct BlockObject {
    /// Source frame of the block
    pub frame: Arc<NormalFrame>,
}

impl BlockObject {
    /// Wrap a block source frame
    pub fn new(frame: Arc<NormalFrame>) -> Self {
        Self { frame }
    }
}

/// User-defined method
#[derive(Debug)]
pub struct MethodObject {
    /// Method name
    pub name: String,
    /// Body
    pub set: Arc<InstructionSet>,
    /// Declared argument count
    pub argc: usize,
}

impl MethodObject {
    /// Create a method
    pub fn new(name: impl Into<String>, set: Arc<InstructionSet>, argc: usize) -> Self {
        Self {
            name: name.into(),
            set,
            argc,
        }
    }
}

// ============================================================================
// Regular expressions
// ============================================================================

/// Compiled regular expression
#[derive(Debug)]
pub struct RegexpObject {
    /// Compiled pattern
    pub regex: regex::Regex,
}

impl RegexpObject {
    /// Compile a pattern
    ///
    /// # Errors
    ///
    /// Returns the compile error of an invalid pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: regex::Regex::new(pattern)?,
        })
    }

    /// Pattern source
    pub fn source(&self) -> &str {
        self.regex.as_str()
    }
}

/// Result of a successful match
#[derive(Debug, Clone)]
pub struct MatchDataObject {
    /// Pattern that matched
    pub pattern: String,
    /// Group 0 is the whole match; unmatched groups are None
    pub captures: Vec<Option<String>>,
    /// Name of each group, index-aligned with `captures`
    pub names: Vec<Option<String>>,
}

impl MatchDataObject {
    /// Build from a regex match
    pub fn from_captures(regex: &regex::Regex, captures: &regex::Captures<'_>) -> Self {
        Self {
            pattern: regex.as_str().to_string(),
            captures: captures
                .iter()
                .map(|m| m.map(|m| m.as_str().to_string()))
                .collect(),
            names: regex.capture_names().map(|n| n.map(str::to_string)).collect(),
        }
    }

    /// Capture by group name
    pub fn named(&self, name: &str) -> Option<&Option<String>> {
        let index = self
            .names
            .iter()
            .position(|n| n.as_deref() == Some(name))?;
        self.captures.get(index)
    }
}

impl fmt::Display for MatchDataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#<MatchData")?;
        for (i, capture) in self.captures.iter().enumerate() {
            let capture = capture.as_deref().unwrap_or("");
            if i == 0 {
                write!(f, " \"{}\"", capture)?;
            } else {
                write!(f, " {}:\"{}\"", i, capture)?;
            }
        }
        f.write_str(">")
    }
}

// ============================================================================
// Native handles
// ============================================================================

/// Opaque host value
#[derive(Clone)]
pub struct NativeHandle {
    /// Class of the handle
    pub class: ClassId,
    /// Host type name, for rendering
    pub type_name: &'static str,
    /// Host value
    pub inner: Arc<dyn Any + Send + Sync>,
}

impl NativeHandle {
    /// Wrap a host value
    pub fn new<T: Any + Send + Sync>(class: ClassId, type_name: &'static str, inner: T) -> Self {
        Self {
            class,
            type_name,
            inner: Arc::new(inner),
        }
    }

    /// Borrow the host value as `T`
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Address used as identity
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as *const () as usize
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({})", self.type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splat_flag() {
        let array = ArrayObject::new(vec![Value::int(1)]);
        assert!(!array.is_splat());
        array.set_splat(true);
        assert!(array.is_splat());
        array.set_splat(false);
        assert!(!array.is_splat());
    }

    #[test]
    fn test_hash_sorted_keys() {
        let hash = HashObject::default();
        hash.insert("b", Value::int(2));
        hash.insert("a", Value::int(1));
        assert_eq!(hash.sorted_keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_match_data_format() {
        let regex = regex::Regex::new(r"(?P<word>\w+) (\d+)").unwrap();
        let caps = regex.captures("abc 123").unwrap();
        let data = MatchDataObject::from_captures(&regex, &caps);

        assert_eq!(data.to_string(), "#<MatchData \"abc 123\" 1:\"abc\" 2:\"123\">");
        assert_eq!(data.named("word"), Some(&Some("abc".to_string())));
    }

    #[test]
    fn test_native_downcast() {
        let handle = NativeHandle::new(ClassId::GO_OBJECT, "u32", 7u32);
        assert_eq!(handle.downcast::<u32>(), Some(&7));
        assert!(handle.downcast::<String>().is_none());
    }
}
