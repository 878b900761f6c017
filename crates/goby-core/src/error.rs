//! Runtime error taxonomy
//!
//! Language-level errors are ordinary values: a builtin or an opcode that
//! fails pushes an [`ErrorObject`] and the interpreter unwinds frames until
//! the error reaches the top. Every error renders as
//! `"<Kind>: <message>. At <file>:<line>"`.

use crate::class::ClassId;
use std::fmt;

/// Canonical error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Wrong arity, wrong keyword, out-of-range index
    ArgumentError,
    /// Wrong object kind for an operation
    TypeError,
    /// Unresolved constant
    NameError,
    /// Method not defined on the receiver
    NoMethodError,
    /// Method explicitly unsupported by a builtin kind
    UnsupportedMethodError,
    /// Constant rebinding
    ConstantAlreadyInitializedError,
    /// Integer, float or decimal division by zero
    ZeroDivisionError,
    /// Unreachable conditions such as yielding without a block
    InternalError,
    /// Operation on a closed channel
    ChannelCloseError,
    /// Enumerator exhaustion
    StopIteration,
}

impl ErrorKind {
    /// All kinds, in class registration order
    pub const ALL: [ErrorKind; 10] = [
        ErrorKind::ArgumentError,
        ErrorKind::TypeError,
        ErrorKind::NameError,
        ErrorKind::NoMethodError,
        ErrorKind::UnsupportedMethodError,
        ErrorKind::ConstantAlreadyInitializedError,
        ErrorKind::ZeroDivisionError,
        ErrorKind::InternalError,
        ErrorKind::ChannelCloseError,
        ErrorKind::StopIteration,
    ];

    /// Class name of the kind
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::NameError => "NameError",
            ErrorKind::NoMethodError => "NoMethodError",
            ErrorKind::UnsupportedMethodError => "UnsupportedMethodError",
            ErrorKind::ConstantAlreadyInitializedError => "ConstantAlreadyInitializedError",
            ErrorKind::ZeroDivisionError => "ZeroDivisionError",
            ErrorKind::InternalError => "InternalError",
            ErrorKind::ChannelCloseError => "ChannelCloseError",
            ErrorKind::StopIteration => "StopIteration",
        }
    }

    /// Builtin class of the kind
    pub fn class_id(self) -> ClassId {
        let index = Self::ALL.iter().position(|k| *k == self).unwrap_or(0);
        ClassId(ClassId::FIRST_ERROR_KIND.0 + index as u32)
    }

    /// Kind whose builtin class is `class`
    pub fn from_class(class: ClassId) -> Option<ErrorKind> {
        let offset = class.0.checked_sub(ClassId::FIRST_ERROR_KIND.0)?;
        Self::ALL.get(offset as usize).copied()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message formats shared across builtins
pub mod messages {
    /// Yield without block
    pub const CANT_YIELD_WITHOUT_BLOCK: &str = "Can't yield without a block";
    /// Closed channel
    pub const CHANNEL_CLOSED: &str = "The channel is already closed.";
    /// Division by zero
    pub const DIVIDED_BY_ZERO: &str = "Divided by 0";

    /// `Expect argument to be <expected>. got: <got>`
    pub fn wrong_type(expected: &str, got: &str) -> String {
        format!("Expect argument to be {}. got: {}", expected, got)
    }

    /// `Expect <n> argument(s). got: <m>`
    pub fn wrong_arity(expected: usize, got: usize) -> String {
        format!("Expect {} argument(s). got: {}", expected, got)
    }

    /// `Expect <min> to <max> argument(s). got: <m>`
    pub fn wrong_arity_range(min: usize, max: usize, got: usize) -> String {
        format!("Expect {} to {} argument(s). got: {}", min, max, got)
    }

    /// `Undefined Method '<name>' for <receiver>`
    pub fn undefined_method(name: &str, receiver: &str) -> String {
        format!("Undefined Method '{}' for {}", name, receiver)
    }

    /// `Unsupported Method #<name> for <receiver>`
    pub fn unsupported_method(name: &str, receiver: &str) -> String {
        format!("Unsupported Method #{} for {}", name, receiver)
    }

    /// `Uninitialized constant <name>`
    pub fn uninitialized_constant(name: &str) -> String {
        format!("Uninitialized constant {}", name)
    }

    /// Constant rebinding
    pub fn constant_already_initialized(name: &str) -> String {
        format!(
            "Constant {} already been initialized. Can't assign value to a constant twice.",
            name
        )
    }
}

/// An error value
#[derive(Debug, Clone)]
pub struct ErrorObject {
    class: ClassId,
    kind_name: String,
    message: String,
    file: String,
    line: u32,
}

impl ErrorObject {
    /// Create an error of a builtin kind
    pub fn new(kind: ErrorKind, message: impl Into<String>, file: &str, line: u32) -> Self {
        Self::with_class(kind.class_id(), kind.name(), message, file, line)
    }

    /// Create an error of an arbitrary error class
    pub fn with_class(
        class: ClassId,
        kind_name: impl Into<String>,
        message: impl Into<String>,
        file: &str,
        line: u32,
    ) -> Self {
        Self {
            class,
            kind_name: kind_name.into(),
            message: message.into(),
            file: file.to_string(),
            line,
        }
    }

    /// Class of the error
    pub fn class(&self) -> ClassId {
        self.class
    }

    /// Builtin kind, if the class is one of the canonical error classes
    pub fn kind(&self) -> Option<ErrorKind> {
        ErrorKind::from_class(self.class)
    }

    /// Kind name (class name)
    pub fn kind_name(&self) -> &str {
        &self.kind_name
    }

    /// Message without kind or location
    pub fn message(&self) -> &str {
        &self.message
    }

    /// File where the error was raised
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Line where the error was raised
    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for ErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}. At {}:{}",
            self.kind_name, self.message, self.file, self.line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_format() {
        let err = ErrorObject::new(ErrorKind::ZeroDivisionError, messages::DIVIDED_BY_ZERO, "main.gb", 3);
        assert_eq!(err.to_string(), "ZeroDivisionError: Divided by 0. At main.gb:3");
        assert_eq!(err.kind(), Some(ErrorKind::ZeroDivisionError));
    }

    #[test]
    fn test_kind_class_mapping() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_class(kind.class_id()), Some(kind));
        }
        assert_eq!(ErrorKind::from_class(ClassId::OBJECT), None);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            messages::wrong_type("Integer", "String"),
            "Expect argument to be Integer. got: String"
        );
        assert_eq!(messages::wrong_arity(1, 0), "Expect 1 argument(s). got: 0");
        assert_eq!(
            messages::constant_already_initialized("Foo"),
            "Constant Foo already been initialized. Can't assign value to a constant twice."
        );
    }
}
