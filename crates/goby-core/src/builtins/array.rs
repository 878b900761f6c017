//! Array builtins
//!
//! Iterating methods walk a snapshot of the elements, so a block may freely
//! modify the array it is iterating without holding its lock.

use super::numeric;
use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::object::ArrayObject;
use crate::value::Value;
use crate::vm::ClassRegistry;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("+", plus),
    Builtin::new("*", times),
    Builtin::new("==", equal),
    Builtin::new("[]", index),
    Builtin::new("[]=", assign_index),
    Builtin::new("any?", any),
    Builtin::new("clear", clear),
    Builtin::new("compact", compact),
    Builtin::new("concat", concat),
    Builtin::new("count", count),
    Builtin::new("delete_at", delete_at),
    Builtin::new("dig", dig),
    Builtin::new("each", each),
    Builtin::new("each_index", each_index),
    Builtin::new("empty?", |c| Ok(boolean(this(c)?.is_empty()))),
    Builtin::new("first", |c| edge(c, true)),
    Builtin::new("flatten", flatten),
    Builtin::new("include?", include),
    Builtin::new("index_with", index_with),
    Builtin::new("join", join),
    Builtin::new("last", |c| edge(c, false)),
    Builtin::new("length", length),
    Builtin::new("map", map),
    Builtin::new("max", |c| extreme(c, Ordering::Greater)),
    Builtin::new("min", |c| extreme(c, Ordering::Less)),
    Builtin::new("pop", pop),
    Builtin::new("push", push),
    Builtin::new("reduce", reduce),
    Builtin::new("reverse", reverse),
    Builtin::new("reverse_each", reverse_each),
    Builtin::new("rotate", rotate),
    Builtin::new("select", select),
    Builtin::new("shift", shift),
    Builtin::new("size", length),
    Builtin::new("sort", sort),
    Builtin::new("sum", sum),
    Builtin::new("uniq", uniq),
    Builtin::new("unshift", unshift),
    Builtin::new("values_at", values_at),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::ARRAY, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::ARRAY, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<ArrayObject>, Interrupt> {
    match &call.receiver {
        Value::Array(a) => Ok(a.clone()),
        other => Err(call.wrong_type("Array", other)),
    }
}

fn array_arg(call: &Call<'_>, index: usize) -> Result<Arc<ArrayObject>, Interrupt> {
    match call.arg(index) {
        Value::Array(a) => Ok(a),
        other => Err(call.wrong_type("Array", &other)),
    }
}

/// Resolve a possibly negative index against `len`
fn resolve(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

/// Elements `start..start+count` with Ruby-style bounds
fn slice(elements: &[Value], start: i64, count: i64) -> Option<Vec<Value>> {
    let len = elements.len() as i64;
    let start = if start < 0 { start.saturating_add(len) } else { start };
    if start < 0 || start > len || count < 0 {
        return None;
    }
    let end = start.saturating_add(count).min(len);
    Some(elements[start as usize..end as usize].to_vec())
}

// ============================================================================
// Indexing
// ============================================================================

/// `a[i]`, `a[start, count]` or `a[range]`
fn index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(1, 2)?;
    let elements = this(call)?.snapshot();

    if call.args.len() == 2 {
        let (start, count) = (call.int_arg(0)?, call.int_arg(1)?);
        return Ok(slice(&elements, start, count)
            .map(Value::array)
            .unwrap_or_default());
    }

    match call.arg(0) {
        Value::Integer(i) => Ok(resolve(i.value, elements.len())
            .map(|i| elements[i].clone())
            .unwrap_or_default()),
        Value::Range(r) => {
            let len = elements.len() as i64;
            let start = if r.start < 0 { r.start.saturating_add(len) } else { r.start };
            let end = if r.end < 0 { r.end.saturating_add(len) } else { r.end };
            let count = end.saturating_sub(start).saturating_add(1).max(0);
            Ok(slice(&elements, start, count)
                .map(Value::array)
                .unwrap_or_default())
        }
        other => Err(call.wrong_type("Integer", &other)),
    }
}

/// `a[i] = v`; indices past the end grow the array with nulls
fn assign_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let array = this(call)?;
    let index = call.int_arg(0)?;
    let value = call.arg(1);

    let mut elements = array.elements_mut();
    let len = elements.len() as i64;
    let position = if index < 0 { index + len } else { index };
    if position < 0 {
        drop(elements);
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Index value {} too small for array. minimum: -{}", index, len),
        ));
    }
    if position >= len {
        let grown = match call.build_length(1, position.saturating_add(1)) {
            Ok(grown) => grown,
            Err(e) => {
                drop(elements);
                return Err(e);
            }
        };
        elements.resize(grown, Value::Null);
    }
    let position = position as usize;
    elements[position] = value.clone();
    Ok(value)
}

fn values_at(call: &mut Call<'_>) -> BuiltinResult {
    let elements = this(call)?.snapshot();
    let mut picked = Vec::with_capacity(call.args.len());
    for i in 0..call.args.len() {
        let index = call.int_arg(i)?;
        picked.push(
            resolve(index, elements.len())
                .map(|i| elements[i].clone())
                .unwrap_or_default(),
        );
    }
    Ok(Value::array(picked))
}

/// Follow a path of indices and keys through nested arrays and hashes
fn dig(call: &mut Call<'_>) -> BuiltinResult {
    if call.args.is_empty() {
        return Err(call.error(
            ErrorKind::ArgumentError,
            "Expect 1 or more argument(s). got: 0",
        ));
    }
    let mut current = call.receiver.clone();
    for key in call.args.clone() {
        current = match (&current, &key) {
            (Value::Array(a), Value::Integer(i)) => resolve(i.value, a.len())
                .and_then(|i| a.get(i))
                .unwrap_or_default(),
            (Value::Hash(h), Value::String(k)) => h.get(k).unwrap_or_default(),
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

fn edge(call: &mut Call<'_>, front: bool) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let elements = this(call)?.snapshot();
    if call.args.is_empty() {
        let element = if front {
            elements.first()
        } else {
            elements.last()
        };
        return Ok(element.cloned().unwrap_or_default());
    }
    let n = call.int_arg(0)?;
    if n < 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Expect argument to be positive value. got: {}", n),
        ));
    }
    let n = (n as usize).min(elements.len());
    let taken = if front {
        elements[..n].to_vec()
    } else {
        elements[elements.len() - n..].to_vec()
    };
    Ok(Value::array(taken))
}

// ============================================================================
// Mutation
// ============================================================================

fn push(call: &mut Call<'_>) -> BuiltinResult {
    let array = this(call)?;
    array.elements_mut().extend(call.args.iter().cloned());
    Ok(call.receiver.clone())
}

fn pop(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(this(call)?.elements_mut().pop().unwrap_or_default())
}

fn shift(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let array = this(call)?;
    let mut elements = array.elements_mut();
    if elements.is_empty() {
        return Ok(Value::Null);
    }
    Ok(elements.remove(0))
}

fn unshift(call: &mut Call<'_>) -> BuiltinResult {
    let array = this(call)?;
    let mut elements = array.elements_mut();
    elements.splice(0..0, call.args.iter().cloned());
    drop(elements);
    Ok(call.receiver.clone())
}

fn concat(call: &mut Call<'_>) -> BuiltinResult {
    let array = this(call)?;
    let mut appended = Vec::new();
    for i in 0..call.args.len() {
        appended.extend(array_arg(call, i)?.snapshot());
    }
    array.elements_mut().extend(appended);
    Ok(call.receiver.clone())
}

fn clear(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    this(call)?.elements_mut().clear();
    Ok(call.receiver.clone())
}

fn delete_at(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let array = this(call)?;
    let index = call.int_arg(0)?;
    let mut elements = array.elements_mut();
    Ok(match resolve(index, elements.len()) {
        Some(i) => elements.remove(i),
        None => Value::Null,
    })
}

// ============================================================================
// Derived arrays
// ============================================================================

fn plus(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let mut elements = this(call)?.snapshot();
    elements.extend(array_arg(call, 0)?.snapshot());
    Ok(Value::array(elements))
}

fn times(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let elements = this(call)?.snapshot();
    let n = call.int_arg(0)?;
    if n < 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Expect argument to be positive value. got: {}", n),
        ));
    }
    let len = call.build_length(elements.len(), n)?;
    let repeated: Vec<Value> = elements.iter().cloned().cycle().take(len).collect();
    Ok(Value::array(repeated))
}

fn reverse(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut elements = this(call)?.snapshot();
    elements.reverse();
    Ok(Value::array(elements))
}

/// Rotate left by `n` (default 1); negative `n` rotates right
fn rotate(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let mut elements = this(call)?.snapshot();
    let n = if call.args.is_empty() {
        1
    } else {
        call.int_arg(0)?
    };
    if !elements.is_empty() {
        let len = elements.len() as i64;
        elements.rotate_left(n.rem_euclid(len) as usize);
    }
    Ok(Value::array(elements))
}

fn compact(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let elements = this(call)?
        .snapshot()
        .into_iter()
        .filter(|v| !v.is_null())
        .collect();
    Ok(Value::array(elements))
}

fn flatten_into(elements: Vec<Value>, out: &mut Vec<Value>) {
    for element in elements {
        match element {
            Value::Array(inner) => flatten_into(inner.snapshot(), out),
            other => out.push(other),
        }
    }
}

fn flatten(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut flat = Vec::new();
    flatten_into(this(call)?.snapshot(), &mut flat);
    Ok(Value::array(flat))
}

fn uniq(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut unique: Vec<Value> = Vec::new();
    for element in this(call)?.snapshot() {
        if !unique.iter().any(|u| u.equals(&element)) {
            unique.push(element);
        }
    }
    Ok(Value::array(unique))
}

/// Order of two elements: numerics by value, strings lexically
fn order(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => numeric::compare(a, b),
    }
}

fn sort(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut elements = this(call)?.snapshot();
    let mut incomparable = None;
    elements.sort_by(|a, b| {
        order(a, b).unwrap_or_else(|| {
            incomparable.get_or_insert_with(|| b.clone());
            Ordering::Equal
        })
    });
    if let Some(value) = incomparable {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Can't compare elements of the array. got: {}", call.inspect(&value)),
        ));
    }
    Ok(Value::array(elements))
}

fn extreme(call: &mut Call<'_>, wanted: Ordering) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut best: Option<Value> = None;
    for element in this(call)?.snapshot() {
        best = match best {
            None => Some(element),
            Some(current) => match order(&element, &current) {
                Some(o) if o == wanted => Some(element),
                Some(_) => Some(current),
                None => {
                    return Err(call.error(
                        ErrorKind::ArgumentError,
                        format!(
                            "Can't compare elements of the array. got: {}",
                            call.inspect(&element)
                        ),
                    ))
                }
            },
        };
    }
    Ok(best.unwrap_or_default())
}

/// Sum through each element's `+`, starting from 0
fn sum(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let mut total = Value::int(0);
    for element in this(call)?.snapshot() {
        total = call.call_method(total, "+", vec![element], None)?;
    }
    Ok(total)
}

// ============================================================================
// Queries
// ============================================================================

fn length(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(this(call)?.len() as i64))
}

fn include(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let target = call.arg(0);
    Ok(boolean(
        this(call)?.snapshot().iter().any(|e| e.equals(&target)),
    ))
}

fn equal(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    Ok(boolean(call.receiver.equals(&call.args[0])))
}

/// Elements rendered with `to_s`, nested arrays flattened
fn join(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let separator = if call.args.is_empty() {
        Arc::from("")
    } else {
        call.str_arg(0)?
    };
    let mut flat = Vec::new();
    flatten_into(this(call)?.snapshot(), &mut flat);
    let parts: Vec<String> = flat.iter().map(|v| call.to_s(v)).collect();
    Ok(Value::string(parts.join(&separator)))
}

// ============================================================================
// Iteration
// ============================================================================

fn each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for element in this(call)?.snapshot() {
        call.call_block(&block, vec![element])?;
    }
    Ok(call.receiver.clone())
}

fn each_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for i in 0..this(call)?.len() {
        call.call_block(&block, vec![Value::int(i as i64)])?;
    }
    Ok(call.receiver.clone())
}

fn reverse_each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for element in this(call)?.snapshot().into_iter().rev() {
        call.call_block(&block, vec![element])?;
    }
    Ok(call.receiver.clone())
}

fn map(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut mapped = Vec::new();
    for element in this(call)?.snapshot() {
        mapped.push(call.call_block(&block, vec![element])?);
    }
    Ok(Value::array(mapped))
}

fn select(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut selected = Vec::new();
    for element in this(call)?.snapshot() {
        if call.call_block(&block, vec![element.clone()])?.truthy() {
            selected.push(element);
        }
    }
    Ok(Value::array(selected))
}

fn any(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let elements = this(call)?.snapshot();
    let Some(block) = call.block.clone() else {
        return Ok(boolean(elements.iter().any(Value::truthy)));
    };
    for element in elements {
        if call.call_block(&block, vec![element])?.truthy() {
            return Ok(boolean(true));
        }
    }
    Ok(boolean(false))
}

/// No argument: length; one argument: equal elements; block: truthy yields
fn count(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let elements = this(call)?.snapshot();
    if let Some(target) = call.args.first().cloned() {
        return Ok(Value::int(
            elements.iter().filter(|e| e.equals(&target)).count() as i64,
        ));
    }
    let Some(block) = call.block.clone() else {
        return Ok(Value::int(elements.len() as i64));
    };
    let mut n = 0;
    for element in elements {
        if call.call_block(&block, vec![element])?.truthy() {
            n += 1;
        }
    }
    Ok(Value::int(n))
}

/// `reduce(init) { |acc, e| }`; without `init` the first element seeds
fn reduce(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let block = call.require_block()?;
    let mut elements = this(call)?.snapshot().into_iter();
    let mut acc = match call.args.first() {
        Some(init) => init.clone(),
        None => match elements.next() {
            Some(first) => first,
            None => return Ok(Value::Null),
        },
    };
    for element in elements {
        acc = call.call_block(&block, vec![acc, element])?;
    }
    Ok(acc)
}

/// Hash keyed by each element's `to_s`, valued by the block's result
fn index_with(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut pairs = FxHashMap::default();
    for element in this(call)?.snapshot() {
        let value = call.call_block(&block, vec![element.clone()])?;
        pairs.insert(call.to_s(&element), value);
    }
    Ok(Value::hash(pairs))
}
