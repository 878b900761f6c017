//! Decimal builtins
//!
//! Decimals are exact rationals. They are produced by `to_d` on the other
//! numerics and on strings; `Decimal.new` is unsupported.

use super::numeric::{self, Arith, Cmp};
use super::{BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::{messages, ErrorKind};
use crate::value::{format_decimal, Value};
use crate::vm::ClassRegistry;
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use std::sync::Arc;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("+", |c| numeric::arith(c, Arith::Add)),
    Builtin::new("-", |c| numeric::arith(c, Arith::Sub)),
    Builtin::new("*", |c| numeric::arith(c, Arith::Mul)),
    Builtin::new("/", |c| numeric::arith(c, Arith::Div)),
    Builtin::new("**", |c| numeric::arith(c, Arith::Pow)),
    Builtin::new(">", |c| numeric::comparison(c, Cmp::Gt)),
    Builtin::new(">=", |c| numeric::comparison(c, Cmp::Ge)),
    Builtin::new("<", |c| numeric::comparison(c, Cmp::Lt)),
    Builtin::new("<=", |c| numeric::comparison(c, Cmp::Le)),
    Builtin::new("<=>", numeric::spaceship),
    Builtin::new("==", numeric::numeric_eq),
    Builtin::new("!=", numeric::numeric_ne),
    Builtin::new("denominator", |c| Ok(integer(this(c)?.denom()))),
    Builtin::new("fraction", fraction),
    Builtin::new("inverse", inverse),
    Builtin::new("numerator", |c| Ok(integer(this(c)?.numer()))),
    Builtin::new("reduction", |c| Ok(Value::Decimal(this(c)?))),
    Builtin::new("to_a", to_a),
    Builtin::new("to_d", |c| Ok(Value::Decimal(this(c)?))),
    Builtin::new("to_f", |c| Ok(Value::Float(this(c)?.to_f64().unwrap_or(f64::NAN)))),
    Builtin::new("to_i", to_i),
    Builtin::new("to_s", |c| Ok(Value::string(format_decimal(&*this(c)?)))),
];

const CLASS_METHODS: &[Builtin] = &[Builtin::new("new", |c| Err(c.unsupported()))];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::DECIMAL, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::DECIMAL, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<Arc<BigRational>, Interrupt> {
    match &call.receiver {
        Value::Decimal(d) => Ok(d.clone()),
        other => Err(call.error(
            ErrorKind::TypeError,
            messages::wrong_type("Decimal", &call.class_name(other)),
        )),
    }
}

/// Integer when it fits in 64 bits, otherwise a whole Decimal
fn integer(value: &BigInt) -> Value {
    match value.to_i64() {
        Some(i) => Value::int(i),
        None => Value::decimal(BigRational::from_integer(value.clone())),
    }
}

/// `"n/d"`, or just `"n"` for whole numbers
fn fraction(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let d = this(call)?;
    if d.is_integer() {
        return Ok(Value::string(d.numer().to_string()));
    }
    Ok(Value::string(format!("{}/{}", d.numer(), d.denom())))
}

fn inverse(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let d = this(call)?;
    if d.is_zero() {
        return Err(call.error(ErrorKind::ZeroDivisionError, messages::DIVIDED_BY_ZERO));
    }
    Ok(Value::decimal(d.recip()))
}

fn to_a(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let d = this(call)?;
    Ok(Value::array(vec![integer(d.numer()), integer(d.denom())]))
}

/// Truncates toward zero
fn to_i(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(0)?;
    let d = this(call)?;
    Ok(integer(&d.to_integer()))
}
