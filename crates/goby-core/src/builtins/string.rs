//! String builtins
//!
//! Strings are immutable: methods that would modify the receiver
//! (`[]=`, `concat`, `insert`, `replace`) return a new string. Indices
//! count characters, not bytes.

use super::numeric;
use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::object::{MatchDataObject, RegexpObject};
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::cmp::Ordering;
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("+", concat),
    Builtin::new("*", repeat),
    Builtin::new(">", |c| compare(c, |o| o == Ordering::Greater)),
    Builtin::new("<", |c| compare(c, |o| o == Ordering::Less)),
    Builtin::new("<=>", spaceship),
    Builtin::new("==", |c| equal(c, true)),
    Builtin::new("!=", |c| equal(c, false)),
    Builtin::new("=~", match_index),
    Builtin::new("[]", index),
    Builtin::new("[]=", assign_index),
    Builtin::new("ascii_only?", |c| Ok(boolean(this(c)?.is_ascii()))),
    Builtin::new("bytes", bytes),
    Builtin::new("capitalize", |c| map(c, capitalize)),
    Builtin::new("chars", to_a),
    Builtin::new("chop", |c| map(c, chop)),
    Builtin::new("concat", concat),
    Builtin::new("count", count),
    Builtin::new("delete", delete),
    Builtin::new("downcase", |c| map(c, str::to_lowercase)),
    Builtin::new("each_byte", each_byte),
    Builtin::new("each_char", each_char),
    Builtin::new("each_line", each_line),
    Builtin::new("empty?", |c| Ok(boolean(this(c)?.is_empty()))),
    Builtin::new("end_with?", |c| affix(c, |s, a| s.ends_with(a))),
    Builtin::new("eql?", |c| equal(c, true)),
    Builtin::new("include?", |c| affix(c, |s, a| s.contains(a))),
    Builtin::new("insert", insert),
    Builtin::new("length", length),
    Builtin::new("lines", lines),
    Builtin::new("ljust", |c| justify(c, false)),
    Builtin::new("match", match_regexp),
    Builtin::new("replace", |c| replace(c, usize::MAX)),
    Builtin::new("replace_once", |c| replace(c, 1)),
    Builtin::new("reverse", |c| map(c, |s| s.chars().rev().collect())),
    Builtin::new("rjust", |c| justify(c, true)),
    Builtin::new("size", length),
    Builtin::new("slice", index),
    Builtin::new("split", split),
    Builtin::new("start_with", |c| affix(c, |s, a| s.starts_with(a))),
    Builtin::new("start_with?", |c| affix(c, |s, a| s.starts_with(a))),
    Builtin::new("strip", |c| map(c, |s| s.trim().to_string())),
    Builtin::new("to_a", to_a),
    Builtin::new("to_d", to_d),
    Builtin::new("to_f", to_f),
    Builtin::new("to_i", to_i),
    Builtin::new("to_s", |c| Ok(Value::String(this(c)?))),
    Builtin::new("upcase", |c| map(c, str::to_uppercase)),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::STRING, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::STRING, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<str>, Interrupt> {
    match &call.receiver {
        Value::String(s) => Ok(s.clone()),
        other => Err(call.wrong_type("String", other)),
    }
}

fn map(call: &mut Call<'_>, f: fn(&str) -> String) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::string(f(&this(call)?)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn chop(s: &str) -> String {
    let mut chars = s.chars();
    chars.next_back();
    chars.as_str().to_string()
}

/// Resolve a possibly negative character index
fn resolve(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Characters `start..=end` with Ruby-style bounds
///
/// A start just past the end yields an empty string; a start beyond that
/// yields nothing.
fn char_range(chars: &[char], start: i64, end: i64) -> Option<String> {
    let len = chars.len() as i64;
    let start = if start < 0 { start + len } else { start };
    let end = if end < 0 { end + len } else { end };
    if start < 0 || start > len {
        return None;
    }
    let end = end.min(len - 1);
    if end < start {
        return Some(String::new());
    }
    Some(chars[start as usize..=end as usize].iter().collect())
}

// ============================================================================
// Operators
// ============================================================================

fn concat(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (left, right) = (this(call)?, call.str_arg(0)?);
    Ok(Value::string(format!("{}{}", left, right)))
}

fn repeat(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let n = call.int_arg(0)?;
    if n < 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Second argument must be greater than or equal to 0. got: {}", n),
        ));
    }
    let text = this(call)?;
    call.build_length(text.len(), n)?;
    Ok(Value::string(text.repeat(n as usize)))
}

fn compare(call: &mut Call<'_>, test: fn(Ordering) -> bool) -> BuiltinResult {
    call.expect_argc(1)?;
    let (left, right) = (this(call)?, call.str_arg(0)?);
    Ok(boolean(test(left.cmp(&right))))
}

fn spaceship(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (left, right) = (this(call)?, call.str_arg(0)?);
    Ok(Value::int(match left.cmp(&right) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

fn equal(call: &mut Call<'_>, expected: bool) -> BuiltinResult {
    call.expect_argc(1)?;
    let same = match (&call.receiver, &call.args[0]) {
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    };
    Ok(boolean(same == expected))
}

// ============================================================================
// Indexing
// ============================================================================

fn index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let chars: Vec<char> = this(call)?.chars().collect();
    match call.arg(0) {
        Value::Integer(i) => Ok(resolve(i.value, chars.len())
            .map(|i| Value::string(chars[i].to_string()))
            .unwrap_or_default()),
        Value::Range(r) => Ok(char_range(&chars, r.start, r.end)
            .map(Value::string)
            .unwrap_or_default()),
        other => Err(call.wrong_type("Integer or Range", &other)),
    }
}

/// `s[i] = t` replaces one character; an index equal to the length appends
fn assign_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let mut chars: Vec<char> = this(call)?.chars().collect();
    let index = call.int_arg(0)?;
    let replacement = call.str_arg(1)?;
    let len = chars.len();

    let position = if index == len as i64 {
        len
    } else {
        match resolve(index, len) {
            Some(i) => i,
            None => {
                return Err(call.error(
                    ErrorKind::ArgumentError,
                    format!("Index value out of range. got: {}", index),
                ))
            }
        }
    };
    let end = (position + 1).min(len);
    chars.splice(position..end, replacement.chars());
    Ok(Value::string(chars.into_iter().collect::<String>()))
}

fn insert(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let mut chars: Vec<char> = this(call)?.chars().collect();
    let index = call.int_arg(0)?;
    let text = call.str_arg(1)?;
    let len = chars.len() as i64;
    let position = if index < 0 { index + len + 1 } else { index };
    if position < 0 || position > len {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Index value out of range. got: {}", index),
        ));
    }
    let position = position as usize;
    chars.splice(position..position, text.chars());
    Ok(Value::string(chars.into_iter().collect::<String>()))
}

// ============================================================================
// Queries
// ============================================================================

fn length(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(this(call)?.chars().count() as i64))
}

fn affix(call: &mut Call<'_>, test: fn(&str, &str) -> bool) -> BuiltinResult {
    call.expect_argc(1)?;
    let (s, arg) = (this(call)?, call.str_arg(0)?);
    Ok(boolean(test(&s, &arg)))
}

/// No argument: character count; otherwise the number of characters that
/// occur in the argument
fn count(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let s = this(call)?;
    if call.args.is_empty() {
        return Ok(Value::int(s.chars().count() as i64));
    }
    let set = call.str_arg(0)?;
    Ok(Value::int(s.chars().filter(|c| set.contains(*c)).count() as i64))
}

fn delete(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (s, pattern) = (this(call)?, call.str_arg(0)?);
    if pattern.is_empty() {
        return Ok(Value::String(s));
    }
    Ok(Value::string(s.replace(&*pattern, "")))
}

fn justify(call: &mut Call<'_>, right: bool) -> BuiltinResult {
    call.expect_argc_range(1, 2)?;
    let s = this(call)?;
    let width = call.build_length(1, call.int_arg(0)?.max(0))?;
    let pad = if call.args.len() == 2 {
        call.str_arg(1)?
    } else {
        Arc::from(" ")
    };
    let len = s.chars().count();
    if width <= len || pad.is_empty() {
        return Ok(Value::String(s));
    }
    let padding: String = pad.chars().cycle().take(width - len).collect();
    Ok(Value::string(if right {
        format!("{}{}", padding, s)
    } else {
        format!("{}{}", s, padding)
    }))
}

fn replace(call: &mut Call<'_>, limit: usize) -> BuiltinResult {
    call.expect_argc(2)?;
    let s = this(call)?;
    let replacement = call.str_arg(1)?;
    match call.arg(0) {
        Value::String(pattern) => Ok(Value::string(s.replacen(
            &*pattern,
            &replacement,
            limit,
        ))),
        Value::Regexp(re) => Ok(Value::string(
            re.regex.replacen(&s, limit, &*replacement).into_owned(),
        )),
        other => Err(call.wrong_type("String", &other)),
    }
}

// ============================================================================
// Conversion and splitting
// ============================================================================

fn to_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let chars = this(call)?
        .chars()
        .map(|c| Value::string(c.to_string()))
        .collect();
    Ok(Value::array(chars))
}

fn bytes(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let bytes = this(call)?.bytes().map(|b| Value::int(i64::from(b))).collect();
    Ok(Value::array(bytes))
}

fn lines(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let lines = this(call)?.lines().map(Value::string).collect();
    Ok(Value::array(lines))
}

fn split(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (s, separator) = (this(call)?, call.str_arg(0)?);
    let parts = if separator.is_empty() {
        s.chars().map(|c| Value::string(c.to_string())).collect()
    } else {
        s.split(&*separator).map(Value::string).collect()
    };
    Ok(Value::array(parts))
}

/// Leading integer; anything unparsable is 0
fn to_i(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let s = this(call)?;
    let trimmed = s.trim();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map_or(trimmed.len(), |(i, _)| i);
    Ok(Value::int(trimmed[..end].parse().unwrap_or(0)))
}

fn to_f(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let s = this(call)?;
    match s.trim().parse::<f64>() {
        Ok(f) => Ok(Value::Float(f)),
        Err(_) => Err(call.error(
            ErrorKind::ArgumentError,
            format!("Invalid numeric string. got: {}", s),
        )),
    }
}

fn to_d(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let s = this(call)?;
    match numeric::parse_decimal(&s) {
        Some(d) => Ok(Value::decimal(d)),
        None => Err(call.error(
            ErrorKind::ArgumentError,
            format!("Invalid numeric string. got: {}", s),
        )),
    }
}

// ============================================================================
// Iteration
// ============================================================================

fn each_char(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for c in this(call)?.chars() {
        call.call_block(&block, vec![Value::string(c.to_string())])?;
    }
    Ok(call.receiver.clone())
}

fn each_byte(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for b in this(call)?.bytes() {
        call.call_block(&block, vec![Value::int(i64::from(b))])?;
    }
    Ok(call.receiver.clone())
}

fn each_line(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let s = this(call)?;
    for line in s.lines() {
        call.call_block(&block, vec![Value::string(line)])?;
    }
    Ok(call.receiver.clone())
}

// ============================================================================
// Regular expressions
// ============================================================================

fn regexp_arg(call: &Call<'_>) -> Result<Arc<RegexpObject>, Interrupt> {
    match call.arg(0) {
        Value::Regexp(re) => Ok(re),
        other => Err(call.wrong_type("Regexp", &other)),
    }
}

/// MatchData for the first match, or null
fn match_regexp(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (s, re) = (this(call)?, regexp_arg(call)?);
    Ok(match re.regex.captures(&s) {
        Some(caps) => Value::MatchData(Arc::new(MatchDataObject::from_captures(&re.regex, &caps))),
        None => Value::Null,
    })
}

/// Character index of the first match, or null
fn match_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (s, re) = (this(call)?, regexp_arg(call)?);
    Ok(match re.regex.find(&s) {
        Some(m) => Value::int(s[..m.start()].chars().count() as i64),
        None => Value::Null,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_resolve_index() {
        assert_eq!(resolve(0, 5), Some(0));
        assert_eq!(resolve(-1, 5), Some(4));
        assert_eq!(resolve(5, 5), None);
        assert_eq!(resolve(-6, 5), None);
    }

    #[test]
    fn test_char_range_bounds() {
        let hello = chars("Hello");
        assert_eq!(char_range(&hello, 1, 3).as_deref(), Some("ell"));
        assert_eq!(char_range(&hello, 1, 100).as_deref(), Some("ello"));
        assert_eq!(char_range(&hello, -3, -1).as_deref(), Some("llo"));
        assert_eq!(char_range(&hello, 5, 8).as_deref(), Some(""));
        assert_eq!(char_range(&hello, 6, 8), None);
        assert_eq!(char_range(&hello, 3, 1).as_deref(), Some(""));
    }

    #[test]
    fn test_capitalize_and_chop() {
        assert_eq!(capitalize("hELLO"), "Hello");
        assert_eq!(capitalize(""), "");
        assert_eq!(chop("Hello"), "Hell");
        assert_eq!(chop(""), "");
    }
}
