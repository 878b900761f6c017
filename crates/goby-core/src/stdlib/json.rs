//! `json`: the `JSON` module

use super::namespace;
use crate::builtins::{BuiltinResult, Call};
use crate::class::Builtin;
use crate::error::ErrorKind;
use crate::value::Value;
use crate::vm::ClassRegistry;
use serde_json::Value as Json;

const CLASS_METHODS: &[Builtin] = &[
    Builtin::new("parse", parse),
    Builtin::new("validate", |c| {
        c.expect_argc(1)?;
        let text = c.str_arg(0)?;
        Ok(Value::Boolean(
            serde_json::from_str::<Json>(&text).is_ok(),
        ))
    }),
];

pub(super) fn install(classes: &ClassRegistry) {
    let json = namespace(classes, "JSON");
    classes.install_builtin(json, CLASS_METHODS, true);
}

fn parse(call: &mut Call<'_>) -> BuiltinResult {
    call.expect_argc(1)?;
    let text = call.str_arg(0)?;
    match serde_json::from_str::<Json>(&text) {
        Ok(json) => Ok(from_json(json)),
        Err(e) => Err(call.error(
            ErrorKind::ArgumentError,
            format!("Invalid JSON string: {}", e),
        )),
    }
}

/// Integers that fit in 64 bits stay Integers; other numbers become Floats
fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Boolean(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::array(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::hash(
            map.into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_shapes() {
        let json: Json = serde_json::from_str(r#"{"a": [1, 2.5, "x"], "b": null, "c": true}"#).unwrap();
        let Value::Hash(h) = from_json(json) else {
            panic!("expected a hash");
        };
        let Some(Value::Array(a)) = h.get("a") else {
            panic!("expected an array");
        };
        let items = a.snapshot();
        assert_eq!(items[0].as_int(), Some(1));
        assert!(matches!(items[1], Value::Float(f) if f == 2.5));
        assert_eq!(items[2].as_str(), Some("x"));
        assert!(h.get("b").unwrap().is_null());
        assert_eq!(h.get("c").unwrap().as_bool(), Some(true));
    }
}
