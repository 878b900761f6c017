//! Time builtins
//!
//! Times are instants with a fixed UTC offset. `Time.new` parses one of a
//! few accepted layouts; naive layouts are taken as UTC.

use super::{boolean, BuiltinResult, Call, Interrupt};
use crate::class::{Builtin, ClassId};
use crate::error::ErrorKind;
use crate::value::Value;
use crate::vm::ClassRegistry;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone,
    Timelike, Utc,
};
use std::cmp::Ordering;

const INSTANCE_METHODS: &[Builtin] = &[
    Builtin::new("+", |c| shift(c, 1)),
    Builtin::new("-", minus),
    Builtin::new("<=>", spaceship),
    Builtin::new("==", |c| {
        c.expect_argc(1)?;
        Ok(boolean(c.receiver.equals(&c.args[0])))
    }),
    Builtin::new("day", |c| Ok(Value::int(this(c)?.day() as i64))),
    Builtin::new("hour", |c| Ok(Value::int(this(c)?.hour() as i64))),
    Builtin::new("minute", |c| Ok(Value::int(this(c)?.minute() as i64))),
    Builtin::new("month", |c| Ok(Value::int(this(c)?.month() as i64))),
    Builtin::new("second", |c| Ok(Value::int(this(c)?.second() as i64))),
    Builtin::new("to_i", |c| Ok(Value::int(this(c)?.timestamp()))),
    Builtin::new("to_s", |c| Ok(Value::string(this(c)?.to_rfc3339()))),
    Builtin::new("year", |c| Ok(Value::int(this(c)?.year() as i64))),
];

const CLASS_METHODS: &[Builtin] = &[
    Builtin::new("new", new_time),
    Builtin::new("now", |c| {
        c.expect_argc(0)?;
        Ok(Value::Time(now()))
    }),
];

pub(super) fn install(classes: &ClassRegistry) {
    classes.install_builtin(ClassId::TIME, INSTANCE_METHODS, false);
    classes.install_builtin(ClassId::TIME, CLASS_METHODS, true);
}

fn this(call: &Call<'_>) -> Result<DateTime<FixedOffset>, Interrupt> {
    match call.receiver {
        Value::Time(t) => Ok(t),
        _ => Err(call.wrong_type("Time", &call.receiver)),
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().into()
}

/// Parse the accepted textual layouts
pub(crate) fn parse_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t);
    }
    if let Ok(t) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S %z") {
        return Some(t);
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()?
                .and_hms_opt(0, 0, 0)
        })?;
    Some(Utc.from_utc_datetime(&naive).into())
}

/// `Time.new` is the current instant; `Time.new(text)` parses
fn new_time(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc_range(0, 1)?;
    if call.args.is_empty() {
        return Ok(Value::Time(now()));
    }
    let text = call.str_arg(0)?;
    parse_time(&text).map(Value::Time).ok_or_else(|| {
        call.error(
            ErrorKind::ArgumentError,
            format!("Can't parse time string: {}", text),
        )
    })
}

/// Move the receiver by `sign * seconds`
fn shift(call: &mut Call<'_>, sign: i64) -> BuiltinResult {
    call.expect_argc(1)?;
    let time = this(call)?;
    let seconds = call.int_arg(0)?;
    seconds
        .checked_mul(sign)
        .and_then(Duration::try_seconds)
        .and_then(|d| time.checked_add_signed(d))
        .map(Value::Time)
        .ok_or_else(|| {
            call.error(
                ErrorKind::ArgumentError,
                format!("Time offset out of range. got: {}", seconds),
            )
        })
}

/// `t - seconds` is a Time, `t - other_time` the difference in seconds
fn minus(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    if let Value::Time(other) = call.arg(0) {
        let time = this(call)?;
        return Ok(Value::int((time - other).num_seconds()));
    }
    shift(call, -1)
}

fn spaceship(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let time = this(call)?;
    let other = match call.arg(0) {
        Value::Time(t) => t,
        other => return Err(call.wrong_type("Time", &other)),
    };
    Ok(Value::int(match time.cmp(&other) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepted_layouts() {
        let rfc = parse_time("2024-03-01T10:20:30+09:00").unwrap();
        assert_eq!(rfc.hour(), 10);
        assert_eq!(rfc.offset().local_minus_utc(), 9 * 3600);

        let zoned = parse_time("2024-03-01 10:20:30 -0500").unwrap();
        assert_eq!(zoned.offset().local_minus_utc(), -5 * 3600);

        let naive = parse_time("2024-03-01 10:20:30").unwrap();
        assert_eq!(naive.to_rfc3339(), "2024-03-01T10:20:30+00:00");

        let date = parse_time("2024-03-01").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 1));
        assert_eq!(date.hour(), 0);
    }

    #[test]
    fn test_parse_rejects_other_layouts() {
        assert!(parse_time("03/01/2024").is_none());
        assert!(parse_time("yesterday").is_none());
    }
}
