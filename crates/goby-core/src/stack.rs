//! Operand stack
//!
//! Every language thread owns one operand stack. Slots are [`Pointer`]s: a
//! value plus a flag recording that it was pushed by
//! `getconstant name true`, i.e. that it is the namespace prefix of a
//! following constant lookup (`A::B`).
//!
//! # Memory Layout
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │ value₂                              │  ← sp - 1 (top)
//! │ value₁                              │
//! ├─────────────────────────────────────┤
//! │ arg₁                                │
//! │ arg₀                                │
//! │ receiver                            │  ← receiver_ptr of a send
//! │ ...                                 │
//! └─────────────────────────────────────┘
//! ```
//!
//! A method call leaves exactly one value in its receiver slot:
//! [`Stack::finalize_call`] writes the result there and drops everything
//! above it.

use crate::{value::Value, VmError, VmResult};

/// Default maximum stack size (in slots)
pub const DEFAULT_MAX_STACK_SIZE: usize = 1024 * 64;

/// Stack slot
#[derive(Debug, Clone, Default)]
pub struct Pointer {
    /// Value held by the slot
    pub target: Value,
    /// Pushed as a namespace prefix
    pub is_namespace: bool,
}

impl Pointer {
    /// Create a plain slot
    pub fn new(target: Value) -> Self {
        Self {
            target,
            is_namespace: false,
        }
    }
}

/// Operand stack of one thread
#[derive(Debug)]
pub struct Stack {
    /// Live slots; the length is the stack pointer
    slots: Vec<Pointer>,

    /// Maximum stack size (in slots)
    max_size: usize,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// Create a new stack with default size
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_STACK_SIZE)
    }

    /// Create a stack with specific capacity
    pub fn with_capacity(max_size: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_size.min(1024)),
            max_size,
        }
    }

    // ========================================================================
    // Push / Pop
    // ========================================================================

    /// Push a value onto the stack
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push(&mut self, value: Value) -> VmResult<()> {
        self.push_pointer(Pointer::new(value))
    }

    /// Push a value flagged as a namespace prefix
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push_namespace(&mut self, value: Value) -> VmResult<()> {
        self.push_pointer(Pointer {
            target: value,
            is_namespace: true,
        })
    }

    /// Push a slot
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the stack is full.
    #[inline]
    pub fn push_pointer(&mut self, pointer: Pointer) -> VmResult<()> {
        if self.slots.len() >= self.max_size {
            return Err(VmError::StackOverflow);
        }
        self.slots.push(pointer);
        Ok(())
    }

    /// Pop a value from the stack
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn pop(&mut self) -> VmResult<Value> {
        Ok(self.pop_pointer()?.target)
    }

    /// Pop a slot
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn pop_pointer(&mut self) -> VmResult<Pointer> {
        self.slots.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pop `n` values, returned bottom first
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if fewer than `n` values are live.
    pub fn pop_n(&mut self, n: usize) -> VmResult<Vec<Value>> {
        if n > self.slots.len() {
            return Err(VmError::StackUnderflow);
        }
        let start = self.slots.len() - n;
        Ok(self.slots.drain(start..).map(|p| p.target).collect())
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Top slot
    #[inline]
    pub fn top(&self) -> Option<&Pointer> {
        self.slots.last()
    }

    /// Peek at the top value without popping
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the stack is empty.
    #[inline]
    pub fn peek(&self) -> VmResult<Value> {
        self.top()
            .map(|p| p.target.clone())
            .ok_or(VmError::StackUnderflow)
    }

    /// Peek at value at absolute stack position
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if position is out of bounds.
    #[inline]
    pub fn peek_at(&self, pos: usize) -> VmResult<Value> {
        self.slots
            .get(pos)
            .map(|p| p.target.clone())
            .ok_or(VmError::StackUnderflow)
    }

    /// Values in `[start, sp)`
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if `start` is past the top.
    pub fn window(&self, start: usize) -> VmResult<Vec<Value>> {
        if start > self.slots.len() {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.slots[start..].iter().map(|p| p.target.clone()).collect())
    }

    /// Set value at absolute stack position
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if position is out of bounds.
    #[inline]
    pub fn set_at(&mut self, pos: usize, value: Value) -> VmResult<()> {
        let slot = self.slots.get_mut(pos).ok_or(VmError::StackUnderflow)?;
        *slot = Pointer::new(value);
        Ok(())
    }

    /// Replace the values in `[start, sp)`
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackOverflow` if the new values don't fit.
    pub fn replace_window(&mut self, start: usize, values: Vec<Value>) -> VmResult<()> {
        self.truncate(start);
        for value in values {
            self.push(value)?;
        }
        Ok(())
    }

    // ========================================================================
    // Stack pointer
    // ========================================================================

    /// Stack pointer (index of the next free slot)
    #[inline]
    pub fn sp(&self) -> usize {
        self.slots.len()
    }

    /// Drop every slot at or above `sp`
    #[inline]
    pub fn truncate(&mut self, sp: usize) {
        self.slots.truncate(sp);
    }

    /// Store a call result in the receiver slot and drop everything above it
    ///
    /// # Errors
    ///
    /// Returns `VmError::StackUnderflow` if the receiver slot is not live.
    pub fn finalize_call(&mut self, receiver_ptr: usize, result: Value) -> VmResult<()> {
        self.set_at(receiver_ptr, result)?;
        self.truncate(receiver_ptr + 1);
        Ok(())
    }

    /// Check if stack is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Get maximum stack size
    #[inline]
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_creation() {
        let stack = Stack::new();
        assert_eq!(stack.sp(), 0);
        assert!(stack.is_empty());
        assert_eq!(stack.max_size(), DEFAULT_MAX_STACK_SIZE);
    }

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(Value::int(42)).unwrap();
        stack.push(Value::Boolean(true)).unwrap();
        assert_eq!(stack.sp(), 2);

        assert!(stack.pop().unwrap().equals(&Value::Boolean(true)));
        assert!(stack.pop().unwrap().equals(&Value::int(42)));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_stack_overflow() {
        let mut stack = Stack::with_capacity(2);
        stack.push(Value::Null).unwrap();
        stack.push(Value::Null).unwrap();
        assert!(matches!(stack.push(Value::Null), Err(VmError::StackOverflow)));
    }

    #[test]
    fn test_stack_underflow() {
        let mut stack = Stack::new();
        assert!(matches!(stack.pop(), Err(VmError::StackUnderflow)));
        assert!(matches!(stack.peek(), Err(VmError::StackUnderflow)));
        assert!(matches!(stack.pop_n(1), Err(VmError::StackUnderflow)));
    }

    #[test]
    fn test_namespace_flag() {
        let mut stack = Stack::new();
        stack.push(Value::Null).unwrap();
        stack.push_namespace(Value::int(1)).unwrap();
        assert!(stack.top().unwrap().is_namespace);
        stack.pop().unwrap();
        assert!(!stack.top().unwrap().is_namespace);
    }

    #[test]
    fn test_finalize_call() {
        let mut stack = Stack::new();
        stack.push(Value::string("receiver")).unwrap();
        stack.push(Value::int(1)).unwrap();
        stack.push(Value::int(2)).unwrap();
        stack.push(Value::int(3)).unwrap();

        stack.finalize_call(0, Value::int(6)).unwrap();
        assert_eq!(stack.sp(), 1);
        assert!(stack.peek().unwrap().equals(&Value::int(6)));
    }

    #[test]
    fn test_pop_n_order() {
        let mut stack = Stack::new();
        for i in 0..4 {
            stack.push(Value::int(i)).unwrap();
        }
        let values = stack.pop_n(3).unwrap();
        let ints: Vec<i64> = values.iter().filter_map(Value::as_int).collect();
        assert_eq!(ints, vec![1, 2, 3]);
        assert_eq!(stack.sp(), 1);
    }
}
