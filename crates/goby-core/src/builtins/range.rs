//! Range builtins
//!
//! Ranges are inclusive integer intervals and may run downward.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::value::{RangeValue, Value};
use crate::vm::ClassRegistry;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("bsearch", bsearch),
    Builtin::new("each", each),
    Builtin::new("end", |c| Ok(Value::int(this(c)?.end))),
    Builtin::new("first", |c| Ok(Value::int(this(c)?.start))),
    Builtin::new("include?", include),
    Builtin::new("last", |c| Ok(Value::int(this(c)?.end))),
    Builtin::new("map", map),
    Builtin::new("reverse_each", reverse_each),
    Builtin::new("size", |c| Ok(Value::int(this(c)?.size()))),
    Builtin::new("start", |c| Ok(Value::int(this(c)?.start))),
    Builtin::new("step", step),
    Builtin::new("to_a", to_a),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::RANGE, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::RANGE, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<RangeValue, Interrupt> {
    match call.receiver {
        Value::Range(r) => Ok(r),
        _ => Err(call.wrong_type("Range", &call.receiver)),
    }
}

fn to_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::array(this(call)?.iter().map(Value::int).collect()))
}

fn include(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let range = this(call)?;
    let n = call.int_arg(0)?;
    let (low, high) = (range.start.min(range.end), range.start.max(range.end));
    Ok(boolean((low..=high).contains(&n)))
}

fn each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    for i in this(call)?.iter() {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

fn reverse_each(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let range = this(call)?;
    let reversed = RangeValue {
        start: range.end,
        end: range.start,
    };
    for i in reversed.iter() {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

fn map(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let block = call.require_block()?;
    let mut mapped = Vec::new();
    for i in this(call)?.iter() {
        mapped.push(call.call_block(&block, vec![Value::int(i)])?);
    }
    Ok(Value::array(mapped))
}

/// Yield every `by`-th element, starting from the first
fn step(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let by = call.int_arg(0)?;
    if by <= 0 {
        return Err(call.error(
            ErrorKind::ArgumentError,
            format!("Step can't be negative or 0. got: {}", by),
        ));
    }
    let block = call.require_block()?;
    for i in this(call)?.iter().step_by(by as usize) {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

// ============================================================================
// Binary search
// ============================================================================

/// Verdict of the search block for one candidate
enum Probe {
    /// Find-minimum mode: candidate satisfies the condition or not
    Satisfied(bool),
    /// Find-any mode: sign of the comparison against the target
    Sign(i64),
}

/// `(s..e).bsearch { |i| }`
///
/// A boolean block finds the smallest element for which it returns true;
/// an integer block finds an element for which it returns zero, moving
/// right on positive and left on negative results.
fn bsearch(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let range = this(call)?;
    let block = call.require_block()?;
    if range.start > range.end || range.start < 0 {
        return Ok(Value::Null);
    }

    let (mut low, mut high) = (range.start, range.end);
    let mut pivot = None;
    loop {
        if low > high {
            return Ok(pivot.map(Value::int).unwrap_or_default());
        }
        let mid = low + (high - low) / 2 + (high - low) % 2;

        let probe = match call.call_block(&block, vec![Value::int(mid)])? {
            Value::Boolean(b) => Probe::Satisfied(b),
            Value::Integer(i) => Probe::Sign(i.value),
            other => {
                let class = call.class_name(&other);
                return Err(call.error(
                    ErrorKind::TypeError,
                    format!("Expect block to return Boolean or Integer. got: {}", class),
                ));
            }
        };

        match probe {
            Probe::Satisfied(found) => {
                if found {
                    pivot = Some(mid);
                }
                if low >= high {
                    return Ok(pivot.map(Value::int).unwrap_or_default());
                }
                if found {
                    high = mid - 1;
                } else if mid + 1 > range.end {
                    return Ok(Value::Null);
                } else {
                    low = mid + 1;
                }
            }
            Probe::Sign(0) => return Ok(Value::int(mid)),
            Probe::Sign(_) if low >= high => return Ok(Value::Null),
            Probe::Sign(sign) if sign > 0 => low = mid + 1,
            Probe::Sign(_) => high = mid - 1,
        }
    }
}
