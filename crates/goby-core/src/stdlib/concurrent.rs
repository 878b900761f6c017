//! `concurrent/array` and `concurrent/hash`
//!
//! Thread-safe containers. Each operation runs under the container's own
//! read/write lock; iteration yields from a snapshot taken under the read
//! lock.

use super::namespace;
use crate::builtins::{BuiltinResult, Call, Interrupt};
use crate::class::Builtin;
use crate::object::{ArrayObject, HashObject, NativeHandle};
use crate::value::Value;
use crate::vm::ClassRegistry;
use rustc_hash::FxHashMap;
use std::sync::Arc;

// ============================================================================
// Concurrent::Array
// ============================================================================

const ARRAY_METHODS: &[Builtin] = &[
    Builtin::new("[]", array_index),
    Builtin::new("[]=", array_assign),
    Builtin::new("each", array_each),
    Builtin::new("length", |c| {
        c.expect_argc(0)?;
        Ok(Value::int(array(c)?.len() as i64))
    }),
    Builtin::new("pop", |c| {
        c.expect_argc(0)?;
        Ok(array(c)?.elements_mut().pop().unwrap_or_default())
    }),
    Builtin::new("push", |c| {
        let target = array(c)?;
        target.elements_mut().extend(c.args.iter().cloned());
        Ok(c.receiver.clone())
    }),
    Builtin::new("to_a", |c| {
        c.expect_argc(0)?;
        Ok(Value::array(array(c)?.snapshot()))
    }),
];

const ARRAY_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_array)];

pub(super) fn install_array(classes: &ClassRegistry) {
    let concurrent = namespace(classes, "Concurrent");
    let class = classes.define_class("Array", false, concurrent);
    classes.install_builtin(class, ARRAY_METHODS, false);
    classes.install_builtin(class, ARRAY_CLASS_METHODS, true);
}

fn array(call: &Call<'_>) -> Result<Arc<ArrayObject>, Interrupt> {
    match &call.receiver {
        Value::Native(handle) => handle
            .downcast::<Arc<ArrayObject>>()
            .cloned()
            .ok_or_else(|| call.wrong_type("Concurrent::Array", &call.receiver)),
        other => Err(call.wrong_type("Concurrent::Array", other)),
    }
}

/// `Concurrent::Array.new` or `Concurrent::Array.new(array)`
fn new_array(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let class = call
        .receiver
        .as_class()
        .ok_or_else(|| call.wrong_type("Class", &call.receiver))?;
    let elements = match call.args.first() {
        None => Vec::new(),
        Some(Value::Array(a)) => a.snapshot(),
        Some(other) => return Err(call.wrong_type("Array", other)),
    };
    let inner = Arc::new(ArrayObject::new(elements));
    Ok(Value::Native(NativeHandle::new(class, "ConcurrentArray", inner)))
}

fn array_index(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let target = array(call)?;
    let index = call.int_arg(0)?;
    let elements = target.elements();
    let len = elements.len() as i64;
    let index = if index < 0 { index + len } else { index };
    if !(0..len).contains(&index) {
        return Ok(Value::Null);
    }
    Ok(elements[index as usize].clone())
}

fn array_assign(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let target = array(call)?;
    let index = call.int_arg(0)?;
    let value = call.arg(1);
    let mut elements = target.elements_mut();
    let len = elements.len() as i64;
    let position = if index < 0 { index + len } else { index };
    if position < 0 {
        drop(elements);
        return Err(call.error(
            crate::error::ErrorKind::ArgumentError,
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

fn array_each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for element in array(call)?.snapshot() {
        call.call_block(&block, vec![element])?;
    }
    Ok(call.receiver.clone())
}

// ============================================================================
// Concurrent::Hash
// ============================================================================

const HASH_METHODS: &[Builtin] = &[
    Builtin::new("[]", |c| {
        c.expect_argc(1)?;
        let target = hash(c)?;
        let key = c.str_arg(0)?;
        Ok(target.get(&key).unwrap_or_default())
    }),
    Builtin::new("[]=", |c| {
        c.expect_argc(2)?;
        let target = hash(c)?;
        let key = c.str_arg(0)?;
        let value = c.arg(1);
        target.insert(&*key, value.clone());
        Ok(value)
    }),
    Builtin::new("delete", |c| {
        c.expect_argc(1)?;
        let target = hash(c)?;
        let key = c.str_arg(0)?;
        let removed = target.pairs_mut().remove(&*key);
        Ok(removed.unwrap_or_default())
    }),
    Builtin::new("each", hash_each),
    Builtin::new("keys", |c| {
        c.expect_argc(0)?;
        let keys = hash(c)?.sorted_keys().into_iter().map(Value::string).collect();
        Ok(Value::array(keys))
    }),
    Builtin::new("length", |c| {
        c.expect_argc(0)?;
        Ok(Value::int(hash(c)?.len() as i64))
    }),
    Builtin::new("to_h", |c| {
        c.expect_argc(0)?;
        Ok(Value::hash(hash(c)?.snapshot()))
    }),
];

const HASH_CLASS_METHODS: &[Builtin] = &[Builtin::new("new", new_hash)];

pub(super) fn install_hash(classes: &ClassRegistry) {
    let concurrent = namespace(classes, "Concurrent");
    let class = classes.define_class("Hash", false, concurrent);
    classes.install_builtin(class, HASH_METHODS, false);
    classes.install_builtin(class, HASH_CLASS_METHODS, true);
}

fn hash(call: &Call<'_>) -> Result<Arc<HashObject>, Interrupt> {
    match &call.receiver {
        Value::Native(handle) => handle
            .downcast::<Arc<HashObject>>()
            .cloned()
            .ok_or_else(|| call.wrong_type("Concurrent::Hash", &call.receiver)),
        other => Err(call.wrong_type("Concurrent::Hash", other)),
    }
}

/// `Concurrent::Hash.new` or `Concurrent::Hash.new(hash)`
fn new_hash(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let class = call
        .receiver
        .as_class()
        .ok_or_else(|| call.wrong_type("Class", &call.receiver))?;
    let pairs = match call.args.first() {
        None => FxHashMap::default(),
        Some(Value::Hash(h)) => h.snapshot(),
        Some(other) => return Err(call.wrong_type("Hash", other)),
    };
    let inner = Arc::new(HashObject::new(pairs));
    Ok(Value::Native(NativeHandle::new(class, "ConcurrentHash", inner)))
}

fn hash_each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for (key, value) in hash(call)?.sorted_pairs() {
        call.call_block(&block, vec![Value::string(key), value])?;
    }
    Ok(call.receiver.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassId;

    #[test]
    fn test_install_binds_under_namespace() {
        let classes = ClassRegistry::new();
        install_array(&classes);
        install_hash(&classes);

        let Some(Value::Class(concurrent)) = classes.constant(ClassId::OBJECT, "Concurrent") else {
            panic!("Concurrent module missing");
        };
        assert!(classes.is_module(concurrent));
        let Some(Value::Class(array)) = classes.constant(concurrent, "Array") else {
            panic!("Concurrent::Array missing");
        };
        assert_ne!(array, ClassId::ARRAY);
        assert!(classes.lookup_instance_method(array, "push").is_some());
        assert!(classes.lookup_class_method(array, "new").is_some());
    }
}
