//! Arithmetic shared by Integer, Float and Decimal
//!
//! Mixed operands are promoted along Integer → Float → Decimal: any Decimal
//! operand makes the result a Decimal, otherwise any Float operand makes it
//! a Float.

use super::{boolean, BuiltinResult, Call};
use crate::error::{messages, ErrorKind};
use crate::value::{format_float, Value};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;

/// Size bound on the numerator or denominator of a Decimal power
const MAX_DECIMAL_BITS: u64 = 1 << 24;

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

enum Operands {
    Int(i64, i64),
    Float(f64, f64),
    Decimal(BigRational, BigRational),
}

fn promote(left: &Value, right: &Value) -> Option<Operands> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Some(Operands::Int(a.value, b.value)),
        (Value::Decimal(_), _) | (_, Value::Decimal(_)) => {
            Some(Operands::Decimal(to_decimal(left)?, to_decimal(right)?))
        }
        _ => Some(Operands::Float(to_float(left)?, to_float(right)?)),
    }
}

/// Float value of a numeric
pub(crate) fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(i.value as f64),
        Value::Float(f) => Some(*f),
        Value::Decimal(d) => d.to_f64(),
        _ => None,
    }
}

/// Decimal value of a numeric
///
/// Floats convert through their printed form, so `0.1.to_d` is exactly
/// one tenth.
pub(crate) fn to_decimal(value: &Value) -> Option<BigRational> {
    match value {
        Value::Integer(i) => Some(BigRational::from_integer(BigInt::from(i.value))),
        Value::Float(f) if f.is_finite() => parse_decimal(&format_float(*f)),
        Value::Decimal(d) => Some((**d).clone()),
        _ => None,
    }
}

/// Parse `"12"`, `"-1.25"` or `"1/3"` into a rational
pub(crate) fn parse_decimal(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Some((numer, denom)) = text.split_once('/') {
        let numer: BigInt = numer.trim().parse().ok()?;
        let denom: BigInt = denom.trim().parse().ok()?;
        if denom.is_zero() {
            return None;
        }
        return Some(BigRational::new(numer, denom));
    }

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (integral, fraction) = digits.split_once('.').unwrap_or((digits, ""));
    if integral.is_empty() && fraction.is_empty() {
        return None;
    }
    if !integral.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut numer: BigInt = format!("{}{}", integral, fraction).parse().ok()?;
    if negative {
        numer = -numer;
    }
    let denom = num_traits::pow(BigInt::from(10), fraction.len());
    Some(BigRational::new(numer, denom))
}

fn zero_division(call: &Call<'_>) -> super::Interrupt {
    call.error(ErrorKind::ZeroDivisionError, messages::DIVIDED_BY_ZERO)
}

/// Apply `op` to the receiver and the single argument
pub(crate) fn arith(call: &mut Call<'_>, op: Arith) -> BuiltinResult {
    call.expect_argc(1)?;
    let right = call.arg(0);
    let Some(operands) = promote(&call.receiver, &right) else {
        return Err(call.wrong_type("Numeric", &right));
    };

    let result = match operands {
        Operands::Int(a, b) => match op {
            Arith::Add => Value::int(a.wrapping_add(b)),
            Arith::Sub => Value::int(a.wrapping_sub(b)),
            Arith::Mul => Value::int(a.wrapping_mul(b)),
            Arith::Div => match a.checked_div(b) {
                Some(q) => Value::int(q),
                None if b == 0 => return Err(zero_division(call)),
                None => Value::int(a.wrapping_div(b)),
            },
            Arith::Rem => match a.checked_rem(b) {
                Some(r) => Value::int(r),
                None if b == 0 => return Err(zero_division(call)),
                None => Value::int(0),
            },
            Arith::Pow => {
                if b < 0 {
                    Value::Float((a as f64).powf(b as f64))
                } else {
                    Value::int(a.wrapping_pow(u32::try_from(b).unwrap_or(u32::MAX)))
                }
            }
        },
        Operands::Float(a, b) => match op {
            Arith::Add => Value::Float(a + b),
            Arith::Sub => Value::Float(a - b),
            Arith::Mul => Value::Float(a * b),
            Arith::Div if b == 0.0 => return Err(zero_division(call)),
            Arith::Div => Value::Float(a / b),
            Arith::Rem if b == 0.0 => return Err(zero_division(call)),
            Arith::Rem => Value::Float(a % b),
            Arith::Pow => Value::Float(a.powf(b)),
        },
        Operands::Decimal(a, b) => match op {
            Arith::Add => Value::decimal(a + b),
            Arith::Sub => Value::decimal(a - b),
            Arith::Mul => Value::decimal(a * b),
            Arith::Div | Arith::Rem if b.is_zero() => return Err(zero_division(call)),
            Arith::Div => Value::decimal(a / b),
            Arith::Rem => Value::decimal(a % b),
            Arith::Pow => decimal_pow(call, a, &b)?,
        },
    };
    Ok(result)
}

fn decimal_pow(call: &Call<'_>, base: BigRational, exponent: &BigRational) -> BuiltinResult {
    if !exponent.is_integer() {
        let (Some(b), Some(e)) = (base.to_f64(), exponent.to_f64()) else {
            return Err(call.error(ErrorKind::ArgumentError, "Exponent out of range"));
        };
        return Ok(Value::Float(b.powf(e)));
    }
    let Some(e) = exponent.to_integer().to_i32() else {
        return Err(call.error(ErrorKind::ArgumentError, "Exponent out of range"));
    };
    if e < 0 && base.is_zero() {
        return Err(zero_division(call));
    }
    let bits = base.numer().bits().max(base.denom().bits());
    if bits.saturating_mul(u64::from(e.unsigned_abs())) > MAX_DECIMAL_BITS {
        return Err(call.error(ErrorKind::ArgumentError, "Exponent out of range"));
    }
    let mut result = num_traits::pow(base, e.unsigned_abs() as usize);
    if e < 0 {
        result = result.recip();
    }
    Ok(Value::decimal(result))
}

/// Order of two numerics, None when either is not numeric or NaN
pub(crate) fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match promote(left, right)? {
        Operands::Int(a, b) => Some(a.cmp(&b)),
        Operands::Float(a, b) => a.partial_cmp(&b),
        Operands::Decimal(a, b) => Some(a.cmp(&b)),
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy)]
pub(crate) enum Cmp {
    Gt,
    Ge,
    Lt,
    Le,
}

/// Apply a comparison to the receiver and the single argument
pub(crate) fn comparison(call: &mut Call<'_>, cmp: Cmp) -> BuiltinResult {
    call.expect_argc(1)?;
    let right = call.arg(0);
    if to_float(&right).is_none() {
        return Err(call.wrong_type("Numeric", &right));
    }
    let Some(ordering) = compare(&call.receiver, &right) else {
        return Ok(boolean(false));
    };
    Ok(boolean(match cmp {
        Cmp::Gt => ordering == Ordering::Greater,
        Cmp::Ge => ordering != Ordering::Less,
        Cmp::Lt => ordering == Ordering::Less,
        Cmp::Le => ordering != Ordering::Greater,
    }))
}

/// `<=>`: -1, 0 or 1
pub(crate) fn spaceship(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let right = call.arg(0);
    if to_float(&right).is_none() {
        return Err(call.wrong_type("Numeric", &right));
    }
    Ok(match compare(&call.receiver, &right) {
        Some(Ordering::Less) => Value::int(-1),
        Some(Ordering::Equal) => Value::int(0),
        Some(Ordering::Greater) => Value::int(1),
        None => Value::Null,
    })
}

/// Numeric-aware equality; non-numerics are never equal
pub(crate) fn numeric_eq(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    Ok(boolean(
        compare(&call.receiver, &call.arg(0)) == Some(Ordering::Equal),
    ))
}

/// Negation of [`numeric_eq`]
pub(crate) fn numeric_ne(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    Ok(boolean(
        compare(&call.receiver, &call.arg(0)) != Some(Ordering::Equal),
    ))
}

/// Sign test shared by `zero?`, `positive?` and `negative?`
pub(crate) fn sign(value: &Value) -> Option<Ordering> {
    compare(value, &Value::int(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_forms() {
        let half = BigRational::new(BigInt::from(1), BigInt::from(2));
        assert_eq!(parse_decimal("0.5"), Some(half.clone()));
        assert_eq!(parse_decimal("1/2"), Some(half));
        assert_eq!(
            parse_decimal("-1.25"),
            Some(BigRational::new(BigInt::from(-5), BigInt::from(4)))
        );
        assert_eq!(parse_decimal("abc"), None);
        assert_eq!(parse_decimal("1/0"), None);
        assert_eq!(parse_decimal(""), None);
    }

    #[test]
    fn test_float_to_decimal_is_exact_tenth() {
        let tenth = to_decimal(&Value::Float(0.1)).unwrap();
        assert_eq!(tenth, BigRational::new(BigInt::from(1), BigInt::from(10)));
    }

    #[test]
    fn test_compare_mixed() {
        assert_eq!(compare(&Value::int(1), &Value::Float(1.5)), Some(Ordering::Less));
        assert_eq!(compare(&Value::Float(2.0), &Value::int(2)), Some(Ordering::Equal));
        assert_eq!(compare(&Value::int(1), &Value::string("1")), None);
    }
}
