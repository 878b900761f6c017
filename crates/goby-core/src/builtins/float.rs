//! Float builtins

use super::numeric::{self, Arith, Cmp};
use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::value::{format_float, Value};
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
    Builtin::new("abs", |c| unary(c, f64::abs)),
    Builtin::new("ceil", |c| rounded(c, f64::ceil)),
    Builtin::new("floor", |c| rounded(c, f64::floor)),
    Builtin::new("round", round),
    Builtin::new("to_d", to_d),
    Builtin::new("to_f", |c| unary(c, |f| f)),
    Builtin::new("to_i", |c| rounded(c, f64::trunc)),
    Builtin::new("to_s", |c| Ok(Value::string(format_float(this(c)?)))),
    Builtin::new("zero?", |c| signed(c, Ordering::Equal)),
    Builtin::new("positive?", |c| signed(c, Ordering::Greater)),
    Builtin::new("negative?", |c| signed(c, Ordering::Less)),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::FLOAT, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::FLOAT, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<f64, Interrupt> {
    match call.receiver {
        Value::Float(f) => Ok(f),
        _ => Err(call.wrong_type("Float", &call.receiver)),
    }
}

fn unary(call: &mut Call<'_>, f: fn(f64) -> f64) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::Float(f(this(call)?)))
}

/// Round with `f` and return an Integer
fn rounded(call: &mut Call<'_>, f: fn(f64) -> f64) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(Value::int(f(this(call)?) as i64))
}

/// `round` to an Integer, or `round(digits)` to a Float
fn round(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    let value = this(call)?;
    if call.args.is_empty() {
        return Ok(Value::int(value.round() as i64));
    }
    let digits = call.int_arg(0)?.clamp(-308, 308) as i32;
    let scale = 10f64.powi(digits);
    Ok(Value::Float((value * scale).round() / scale))
}

fn signed(call: &mut Call<'_>, expected: Ordering) -> BuiltinResult {
    call.expect_argc(0)?;
    Ok(boolean(numeric::sign(&call.receiver) == Some(expected)))
}

fn to_d(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    match numeric::to_decimal(&call.receiver) {
        Some(d) => Ok(Value::decimal(d)),
        None => {
            let text = format_float(this(call)?);
            Err(call.error(
                crate::error::ErrorKind::ArgumentError,
                format!("Can't convert {} to Decimal", text),
            ))
        }
    }
}
