//! Integer builtins

use super::numeric::{self, Arith, Cmp};
use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::value::Value;
use crate::vm::ClassRegistry;
use std::cmp::Ordering;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("+", |c| numeric::arith(c, Arith::Add)),
    Builtin::new("-", |c| numeric::arith(c, Arith::Sub)),
    Builtin::new("*", |c| numeric::arith(c, Arith::Mul)),
    Builtin::new("/", |c| numeric::arith(c, Arith::Div)),
    Builtin::new("%", |c| numeric::arith(c, Arith::Rem)),
    Builtin::new("**", |c| numeric::arith(c, Arith::Pow)),
    Builtin::new(">", |c| numeric::comparison(c, Cmp::Gt)),
    Builtin::new(">=", |c| numeric::comparison(c, Cmp::Ge)),
    Builtin::new("<", |c| numeric::comparison(c, Cmp::Lt)),
    Builtin::new("<=", |c| numeric::comparison(c, Cmp::Le)),
    Builtin::new("<=>", numeric::spaceship),
    Builtin::new("==", numeric::numeric_eq),
    Builtin::new("!=", numeric::numeric_ne),
    Builtin::new("++", |c| offset(c, 1)),
    Builtin::new("--", |c| offset(c, -1)),
    Builtin::new("next", |c| offset(c, 1)),
    Builtin::new("pred", |c| offset(c, -1)),
    Builtin::new("abs", abs),
    Builtin::new("between?", between),
    Builtin::new("downto", downto),
    Builtin::new("even?", |c| Ok(boolean(this(c)? % 2 == 0))),
    Builtin::new("odd?", |c| Ok(boolean(this(c)? % 2 != 0))),
    Builtin::new("zero?", |c| Ok(boolean(this(c)? == 0))),
    Builtin::new("positive?", |c| Ok(boolean(this(c)? > 0))),
    Builtin::new("negative?", |c| Ok(boolean(this(c)? < 0))),
    Builtin::new("step", step),
    Builtin::new("times", times),
    Builtin::new("to_d", to_d),
    Builtin::new("to_f", |c| Ok(Value::Float(this(c)? as f64))),
    Builtin::new("to_i", |c| Ok(Value::int(this(c)?))),
    Builtin::new("to_s", |c| Ok(Value::string(this(c)?.to_string()))),
    Builtin::new("upto", upto),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::INTEGER, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::INTEGER, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<i64, Interrupt> {
    call.receiver
        .as_int()
        .ok_or_else(|| call.wrong_type("Integer", &call.receiver))
}

fn offset(call: &mut Call<'_>, delta: i64) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(this(call)?.wrapping_add(delta)))
}

fn abs(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(this(call)?.wrapping_abs()))
}

fn between(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let value = call.receiver.clone();
    let (low, high) = (call.arg(0), call.arg(1));
    let above = numeric::compare(&value, &low).ok_or_else(|| call.wrong_type("Numeric", &low))?;
    let below = numeric::compare(&value, &high).ok_or_else(|| call.wrong_type("Numeric", &high))?;
    Ok(boolean(above != Ordering::Less && below != Ordering::Greater))
}

fn to_d(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    match numeric::to_decimal(&call.receiver) {
        Some(d) => Ok(Value::decimal(d)),
        None => Err(call.wrong_type("Integer", &call.receiver)),
    }
}

// ============================================================================
// Iteration
// ============================================================================

/// `n.times { |i| }` yields 0 through n-1 and returns n
fn times(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let n = this(call)?;
    if n < 0 {
        return Err(call.error(
            ErrorKind::InternalError,
            format!("Expect receiver to be positive. got: {}", n),
        ));
    }
    let block = call.require_block()?;
    for i in 0..n {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

fn upto(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (from, to) = (this(call)?, call.int_arg(0)?);
    let block = call.require_block()?;
    for i in from..=to {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

fn downto(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let (from, to) = (this(call)?, call.int_arg(0)?);
    let block = call.require_block()?;
    for i in (to..=from).rev() {
        call.call_block(&block, vec![Value::int(i)])?;
    }
    Ok(call.receiver.clone())
}

/// `from.step(limit, by) { |i| }`
fn step(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(2)?;
    let (from, limit, by) = (this(call)?, call.int_arg(0)?, call.int_arg(1)?);
    if by == 0 {
        return Err(call.error(ErrorKind::ArgumentError, "Step can't be 0"));
    }
    let block = call.require_block()?;
    let mut i = from;
    while (by > 0 && i <= limit) || (by < 0 && i >= limit) {
        call.call_block(&block, vec![Value::int(i)])?;
        i = match i.checked_add(by) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(call.receiver.clone())
}
