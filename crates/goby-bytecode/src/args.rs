//! Parameter and argument kind tables

use serde::{Deserialize, Serialize};

/// Kind of a parameter slot (method definitions) or argument position (call sites)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// Plain positional
    Normal,
    /// Positional with a default value
    Optioned,
    /// Keyword that must be given
    RequiredKeyword,
    /// Keyword with a default value
    OptionalKeyword,
    /// Collects the remaining positional arguments
    Splat,
}

impl ArgKind {
    /// Check if this kind is matched by name rather than position
    pub fn is_keyword(self) -> bool {
        matches!(self, ArgKind::RequiredKeyword | ArgKind::OptionalKeyword)
    }
}

/// Names and kinds of a method's parameters or of a call's arguments
///
/// Entry `i` of `names` and `kinds` describes local slot `i` of a method
/// definition, or argument position `i` of a `send`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgSet {
    /// Parameter names (empty for anonymous positional arguments)
    pub names: Vec<String>,
    /// Parameter kinds
    pub kinds: Vec<ArgKind>,
}

impl ArgSet {
    /// Create an empty argument set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn push(&mut self, name: impl Into<String>, kind: ArgKind) {
        self.names.push(name.into());
        self.kinds.push(kind);
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if there are no entries
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Index of the entry with the given name
    pub fn find_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Kind of entry `index`
    pub fn kind(&self, index: usize) -> Option<ArgKind> {
        self.kinds.get(index).copied()
    }

    /// Iterate over `(name, kind)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, ArgKind)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.kinds.iter().copied())
    }

    /// Count entries of a kind
    pub fn count(&self, kind: ArgKind) -> usize {
        self.kinds.iter().filter(|k| **k == kind).count()
    }

    /// Parse one entry in listing notation
    ///
    /// `a` normal, `a=` optioned, `a:` required keyword, `a:=` optional
    /// keyword, `*a` splat. `_` stands for an anonymous positional entry.
    pub fn parse_entry(token: &str) -> Option<(String, ArgKind)> {
        if token.is_empty() {
            return None;
        }
        let (name, kind) = if let Some(name) = token.strip_prefix('*') {
            (name, ArgKind::Splat)
        } else if let Some(name) = token.strip_suffix(":=") {
            (name, ArgKind::OptionalKeyword)
        } else if let Some(name) = token.strip_suffix(':') {
            (name, ArgKind::RequiredKeyword)
        } else if let Some(name) = token.strip_suffix('=') {
            (name, ArgKind::Optioned)
        } else {
            (token, ArgKind::Normal)
        };
        let name = if name == "_" { "" } else { name };
        if name.is_empty() && kind != ArgKind::Normal {
            return None;
        }
        Some((name.to_string(), kind))
    }

    /// Render one entry in listing notation
    pub fn render_entry(name: &str, kind: ArgKind) -> String {
        let name = if name.is_empty() { "_" } else { name };
        match kind {
            ArgKind::Normal => name.to_string(),
            ArgKind::Optioned => format!("{}=", name),
            ArgKind::RequiredKeyword => format!("{}:", name),
            ArgKind::OptionalKeyword => format!("{}:=", name),
            ArgKind::Splat => format!("*{}", name),
        }
    }

    /// Render as a comma-separated call-site operand
    pub fn to_call_site(&self) -> String {
        self.iter()
            .map(|(name, kind)| Self::render_entry(name, kind))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Render as a space-separated parameter list
    pub fn to_params(&self) -> String {
        self.iter()
            .map(|(name, kind)| Self::render_entry(name, kind))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
