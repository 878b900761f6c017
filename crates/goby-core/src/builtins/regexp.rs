//! Regexp and MatchData builtins

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::object::{MatchDataObject, RegexpObject};
use crate::value::Value;
use crate::vm::ClassRegistry;
use rustc_hash::FxHashMap;
use std::sync::Arc;

const REGEXP_METHODS: &[Builtin] = &[
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("match?", is_match),
    Builtin::new("to_s", |c| Ok(Value::string(regexp(c)?.source()))),
];

const REGEXP_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_regexp)];

const MATCH_DATA_METHODS: &[Builtin] = &[
    Builtin::new("[]", index),
    Builtin::new("captures", captures),
    Builtin::new("inspect", |c| Ok(Value::string(match_data(c)?.to_string()))),
    Builtin::new("length", |c| Ok(Value::int(match_data(c)?.captures.len() as i64))),
    Builtin::new("to_a", to_a),
    Builtin::new("to_h", to_h),
    Builtin::new("to_s", |c| Ok(Value::string(match_data(c)?.to_string()))),
];

const MATCH_DATA_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::REGEXP, REGEXP_METHODS, false);
    classes.install_builtin(ClassId::REGEXP, REGEXP_CLASS_METHODS, true);
    classes.install_builtin(ClassId::MATCH_DATA, MATCH_DATA_METHODS, false);
    classes.install_builtin(ClassId::MATCH_DATA, MATCH_DATA_CLASS_METHODS, true);
}

fn regexp(call: &Call<'_>) -> Result<Arc<RegexpObject>, Interrupt> {
    match &call.receiver {
        Value::Regexp(re) => Ok(re.clone()),
        other => Err(call.wrong_type("Regexp", other)),
    }
}

fn match_data(call: &Call<'_>) -> Result<Arc<MatchDataObject>, Interrupt> {
    match &call.receiver {
        Value::MatchData(m) => Ok(m.clone()),
        other => Err(call.wrong_type("MatchData", other)),
    }
}

fn capture_value(capture: &Option<String>) -> Value {
    capture
        .as_deref()
        .map(Value::string)
        .unwrap_or_default()
}

// ============================================================================
// Regexp
// ============================================================================

fn new_regexp(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let pattern = call.str_arg(0)?;
    match RegexpObject::new(&pattern) {
        Ok(re) => Ok(Value::Regexp(Arc::new(re))),
        Err(e) => Err(call.error(
            ErrorKind::ArgumentError,
            format!("Invalid regexp /{}/: {}", pattern, e),
        )),
    }
}

fn is_match(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let re = regexp(call)?;
    let target = call.str_arg(0)?;
    Ok(boolean(re.regex.is_match(&target)))
}

// ============================================================================
// MatchData
// ============================================================================

/// Groups after the whole match
fn captures(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let m = match_data(call)?;
    Ok(Value::array(
        m.captures.iter().skip(1).map(capture_value).collect(),
    ))
}

/// Whole match followed by every group
fn to_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let m = match_data(call)?;
    Ok(Value::array(m.captures.iter().map(capture_value).collect()))
}

/// Named groups keyed by name; unnamed groups keyed by index
fn to_h(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let m = match_data(call)?;
    let mut pairs = FxHashMap::default();
    for (i, (name, capture)) in m.names.iter().zip(m.captures.iter()).enumerate() {
        let key = name.clone().unwrap_or_else(|| i.to_string());
        pairs.insert(key, capture_value(capture));
    }
    Ok(Value::hash(pairs))
}

/// `m[0]`, `m[-1]` or `m["name"]`
fn index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let m = match_data(call)?;
    match call.arg(0) {
        Value::Integer(i) => {
            let len = m.captures.len() as i64;
            let index = if i.value < 0 { i.value + len } else { i.value };
            if !(0..len).contains(&index) {
                return Ok(Value::Null);
            }
            Ok(capture_value(&m.captures[index as usize]))
        }
        Value::String(name) => Ok(m.named(&name).map(capture_value).unwrap_or_default()),
        other => Err(call.wrong_type("Integer or String", &other)),
    }
}
