//! Hash builtins
//!
//! Keys are always strings. Iteration visits pairs in sorted key order.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::object::HashObject;
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("[]", index),
    Builtin::new("[]=", assign_index),
    Builtin::new("clear", clear),
    Builtin::new("delete", delete),
    Builtin::new("dig", dig),
    Builtin::new("each", each),
    Builtin::new("each_key", each_key),
    Builtin::new("each_value", each_value),
    Builtin::new("empty?", |c| Ok(boolean(this(c)?.is_empty()))),
    Builtin::new("has_key?", has_key),
    Builtin::new("has_value?", has_value),
    Builtin::new("keys", keys),
    Builtin::new("length", length),
    Builtin::new("map_values", map_values),
    Builtin::new("merge", merge),
    Builtin::new("select", select),
    Builtin::new("size", length),
    Builtin::new("sorted_keys", keys),
    Builtin::new("to_a", to_a),
    Builtin::new("values", values),
    Builtin::new("values_at", values_at),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::HASH, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::HASH, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<HashObject>, Interrupt> {
    match &call.receiver {
        Value::Hash(h) => Ok(h.clone()),
        other => Err(call.wrong_type("Hash", other)),
    }
}

fn key(pair_key: &str) -> Value {
    Value::string(pair_key)
}

// ============================================================================
// Access
// ============================================================================

fn index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let hash = this(call)?;
    let key = call.str_arg(0)?;
    Ok(hash.get(&key).unwrap_or_default())
}

fn assign_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let hash = this(call)?;
    let key = call.str_arg(0)?;
    let value = call.arg(1);
    hash.insert(&*key, value.clone());
    Ok(value)
}

/// Remove a pair, returning the receiver
fn delete(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let hash = this(call)?;
    let key = call.str_arg(0)?;
    hash.pairs_mut().remove(&*key);
    Ok(call.receiver.clone())
}

fn clear(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    this(call)?.pairs_mut().clear();
    Ok(call.receiver.clone())
}

fn has_key(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let hash = this(call)?;
    let key = call.str_arg(0)?;
    let found = hash.pairs().contains_key(&*key);
    Ok(boolean(found))
}

fn has_value(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let target = call.arg(0);
    let found = this(call)?.snapshot().values().any(|v| v.equals(&target));
    Ok(boolean(found))
}

fn keys(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let keys = this(call)?.sorted_keys().into_iter().map(Value::string).collect();
    Ok(Value::array(keys))
}

fn values(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let values = this(call)?
        .sorted_pairs()
        .into_iter()
        .map(|(_, v)| v)
        .collect();
    Ok(Value::array(values))
}

fn values_at(call: &mut Call<'_>) -> BuiltinResult {
    let hash = this(call)?;
    let mut picked = Vec::with_capacity(call.args.len());
    for i in 0..call.args.len() {
        let key = call.str_arg(i)?;
        picked.push(hash.get(&key).unwrap_or_default());
    }
    Ok(Value::array(picked))
}

fn length(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(this(call)?.len() as i64))
}

/// `[[key, value], ...]` in key order
fn to_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let pairs = this(call)?
        .sorted_pairs()
        .into_iter()
        .map(|(k, v)| Value::array(vec![key(&k), v]))
        .collect();
    Ok(Value::array(pairs))
}

/// Fresh hash with the pairs of every argument laid over the receiver
fn merge(call: &mut Call<'_>) -> BuiltinResult {
    let mut pairs = this(call)?.snapshot();
    for arg in call.args.clone() {
        match arg {
            Value::Hash(other) => pairs.extend(other.snapshot()),
            other => return Err(call.wrong_type("Hash", &other)),
        }
    }
    Ok(Value::hash(pairs))
}

fn dig(call: &mut Call<'_>) -> BuiltinResult {
    if call.args.is_empty() {
        return Err(call.error(
            ErrorKind::ArgumentError,
            "Expect 1 or more argument(s). got: 0",
        ));
    }
    let mut current = call.receiver.clone();
    for step in call.args.clone() {
        current = match (&current, &step) {
            (Value::Hash(h), Value::String(k)) => h.get(k).unwrap_or_default(),
            (Value::Array(a), Value::Integer(i)) => {
                let len = a.len() as i64;
                let index = if i.value < 0 { i.value + len } else { i.value };
                if (0..len).contains(&index) {
                    a.get(index as usize).unwrap_or_default()
                } else {
                    Value::Null
                }
            }
            (Value::Null, _) => return Ok(Value::Null),
            (other, _) => {
                let class = call.class_name(other);
                return Err(call.error(
                    ErrorKind::TypeError,
                    format!("Expect target to be Diggable, got {}", class),
                ));
            }
        };
    }
    Ok(current)
}

// ============================================================================
// Iteration
// ============================================================================

fn each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for (k, v) in this(call)?.sorted_pairs() {
        call.call_block(&block, vec![key(&k), v])?;
    }
    Ok(call.receiver.clone())
}

fn each_key(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for k in this(call)?.sorted_keys() {
        call.call_block(&block, vec![key(&k)])?;
    }
    Ok(call.receiver.clone())
}

fn each_value(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for (_, v) in this(call)?.sorted_pairs() {
        call.call_block(&block, vec![v])?;
    }
    Ok(call.receiver.clone())
}

fn map_values(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut mapped = rustc_hash::FxHashMap::default();
    for (k, v) in this(call)?.sorted_pairs() {
        let value = call.call_block(&block, vec![v])?;
        mapped.insert(k, value);
    }
    Ok(Value::hash(mapped))
}

/// Pairs for which the block returns a truthy value
fn select(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut selected = rustc_hash::FxHashMap::default();
    for (k, v) in this(call)?.sorted_pairs() {
        if call.call_block(&block, vec![key(&k), v.clone()])?.truthy() {
            selected.insert(k, v);
        }
    }
    Ok(Value::hash(selected))
}
