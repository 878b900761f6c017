//! Value representation for the Goby VM
//!
//! Scalars (integers, floats, booleans, null, ranges, times) are stored
//! inline; strings and decimals are immutable and shared through `Arc`;
//! mutable objects live behind an `Arc` with interior locking so that values
//! can move freely between language threads.

use crate::channel::ChannelObject;
use crate::class::ClassId;
use crate::error::ErrorObject;
use crate::object::{
    ArrayObject, BlockObject, HashObject, InstanceObject, Integer, MatchDataObject, MethodObject,
    NativeHandle, RegexpObject,
};
use crate::vm::ClassRegistry;
use chrono::{DateTime, FixedOffset};
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Fractional digits rendered for decimals
const DECIMAL_DIGITS: usize = 60;

/// Inclusive integer interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeValue {
    /// First element
    pub start: i64,
    /// Last element (may be below `start`)
    pub end: i64,
}

impl RangeValue {
    /// Number of elements
    pub fn size(&self) -> i64 {
        (self.end - self.start).abs() + 1
    }

    /// Elements from start to end, ascending or descending
    pub fn iter(&self) -> Box<dyn Iterator<Item = i64>> {
        if self.start <= self.end {
            Box::new(self.start..=self.end)
        } else {
            Box::new((self.end..=self.start).rev())
        }
    }
}

/// A Goby value
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `nil`
    #[default]
    Null,
    /// `true` / `false`
    Boolean(bool),
    /// Integer
    Integer(Integer),
    /// Float
    Float(f64),
    /// Arbitrary-precision rational
    Decimal(Arc<BigRational>),
    /// Immutable string
    String(Arc<str>),
    /// Inclusive integer range
    Range(RangeValue),
    /// Absolute instant
    Time(DateTime<FixedOffset>),
    /// Array
    Array(Arc<ArrayObject>),
    /// Hash
    Hash(Arc<HashObject>),
    /// Reified block
    Block(Arc<BlockObject>),
    /// User-defined method
    Method(Arc<MethodObject>),
    /// Regular expression
    Regexp(Arc<RegexpObject>),
    /// Match result
    MatchData(Arc<MatchDataObject>),
    /// Instance of a user-defined class
    Instance(Arc<InstanceObject>),
    /// Class or module
    Class(ClassId),
    /// Error value
    Error(Arc<ErrorObject>),
    /// Channel
    Channel(Arc<ChannelObject>),
    /// Opaque host value
    Native(NativeHandle),
}

impl Value {
    // ===== Constructors =====

    /// Integer value
    #[inline]
    pub fn int(value: i64) -> Self {
        Value::Integer(Integer::new(value))
    }

    /// String value
    #[inline]
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        Value::String(value.into())
    }

    /// Decimal value
    pub fn decimal(value: BigRational) -> Self {
        Value::Decimal(Arc::new(value))
    }

    /// Array value
    pub fn array(elements: Vec<Value>) -> Self {
        Value::Array(Arc::new(ArrayObject::new(elements)))
    }

    /// Hash value
    pub fn hash(pairs: FxHashMap<String, Value>) -> Self {
        Value::Hash(Arc::new(HashObject::new(pairs)))
    }

    /// Range value
    pub fn range(start: i64, end: i64) -> Self {
        Value::Range(RangeValue { start, end })
    }

    /// Error value
    pub fn error(error: ErrorObject) -> Self {
        Value::Error(Arc::new(error))
    }

    // ===== Accessors =====

    /// Integer payload
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i.value),
            _ => None,
        }
    }

    /// String payload
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Array payload
    pub fn as_array(&self) -> Option<&Arc<ArrayObject>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Hash payload
    pub fn as_hash(&self) -> Option<&Arc<HashObject>> {
        match self {
            Value::Hash(h) => Some(h),
            _ => None,
        }
    }

    /// Class payload
    pub fn as_class(&self) -> Option<ClassId> {
        match self {
            Value::Class(c) => Some(*c),
            _ => None,
        }
    }

    /// Error payload
    pub fn as_error(&self) -> Option<&Arc<ErrorObject>> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this is an error value
    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Check if this is `nil`
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Only `false` and `nil` are falsy
    #[inline]
    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    /// Class of the value
    ///
    /// For instances this is the singleton class once one has been created;
    /// use [`ClassRegistry::real_class`] to skip it.
    pub fn class_id(&self) -> ClassId {
        match self {
            Value::Null => ClassId::NULL,
            Value::Boolean(_) => ClassId::BOOLEAN,
            Value::Integer(_) => ClassId::INTEGER,
            Value::Float(_) => ClassId::FLOAT,
            Value::Decimal(_) => ClassId::DECIMAL,
            Value::String(_) => ClassId::STRING,
            Value::Range(_) => ClassId::RANGE,
            Value::Time(_) => ClassId::TIME,
            Value::Array(_) => ClassId::ARRAY,
            Value::Hash(_) => ClassId::HASH,
            Value::Block(_) => ClassId::BLOCK,
            Value::Method(_) => ClassId::METHOD,
            Value::Regexp(_) => ClassId::REGEXP,
            Value::MatchData(_) => ClassId::MATCH_DATA,
            Value::Instance(i) => i.class(),
            Value::Class(_) => ClassId::CLASS,
            Value::Error(e) => e.class(),
            Value::Channel(_) => ClassId::CHANNEL,
            Value::Native(n) => n.class,
        }
    }

    /// Identity of the value: pointer for heap objects, payload for scalars
    pub fn object_id(&self) -> u64 {
        fn addr<T>(arc: &Arc<T>) -> u64 {
            Arc::as_ptr(arc) as usize as u64
        }
        match self {
            Value::Null => 8,
            Value::Boolean(false) => 0,
            Value::Boolean(true) => 20,
            Value::Integer(i) => (i.value as u64).wrapping_mul(2).wrapping_add(1),
            Value::Float(f) => f.to_bits(),
            Value::Range(r) => (r.start as u64) ^ (r.end as u64).rotate_left(32),
            Value::Time(t) => t.timestamp_nanos_opt().unwrap_or_default() as u64,
            Value::Class(c) => u64::from(c.0).wrapping_mul(8).wrapping_add(4),
            Value::Instance(i) => i.id(),
            Value::String(s) => s.as_ptr() as usize as u64,
            Value::Decimal(d) => addr(d),
            Value::Array(a) => addr(a),
            Value::Hash(h) => addr(h),
            Value::Block(b) => addr(b),
            Value::Method(m) => addr(m),
            Value::Regexp(r) => addr(r),
            Value::MatchData(m) => addr(m),
            Value::Error(e) => addr(e),
            Value::Channel(c) => addr(c),
            Value::Native(n) => n.addr() as u64,
        }
    }

    // ===== Equality and copy =====

    /// Structural equality; values of different kinds are never equal
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Range(a), Value::Range(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Class(a), Value::Class(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y))
            }
            (Value::Hash(a), Value::Hash(b)) => {
                if Arc::ptr_eq(a, b) {
                    return true;
                }
                let (a, b) = (a.snapshot(), b.snapshot());
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|(k, v)| b.get(k).map_or(false, |w| v.equals(w)))
            }
            (Value::Regexp(a), Value::Regexp(b)) => a.source() == b.source(),
            (Value::MatchData(a), Value::MatchData(b)) => {
                a.pattern == b.pattern && a.captures == b.captures
            }
            (Value::Error(a), Value::Error(b)) => {
                a.class() == b.class() && a.message() == b.message()
            }
            (Value::Instance(a), Value::Instance(b)) => Arc::ptr_eq(a, b),
            (Value::Block(a), Value::Block(b)) => Arc::ptr_eq(a, b),
            (Value::Method(a), Value::Method(b)) => Arc::ptr_eq(a, b),
            (Value::Channel(a), Value::Channel(b)) => Arc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => a.addr() == b.addr(),
            _ => false,
        }
    }

    /// Copy stored by local and instance-variable assignment
    ///
    /// Arrays and hashes get a fresh container holding the same elements,
    /// a channel becomes a fresh empty channel of the same capacity, every
    /// other kind is shared.
    ///
    /// A stored channel is therefore disconnected from the one it was copied
    /// from: after `@c = c` in `initialize`, values delivered to `@c` never
    /// reach receivers of `c`. Closures over the original local and channels
    /// passed inside an array element or hash value keep the same channel.
    pub fn copy(&self) -> Value {
        match self {
            Value::Array(a) => Value::array(a.snapshot()),
            Value::Hash(h) => Value::hash(h.snapshot()),
            Value::Channel(c) => Value::Channel(Arc::new(ChannelObject::new(c.capacity()))),
            other => other.clone(),
        }
    }

    // ===== Rendering =====

    /// Human-readable form used by `puts` and `to_s`
    pub fn to_s(&self, classes: &ClassRegistry) -> String {
        match self {
            Value::Null => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.value.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Decimal(d) => format_decimal(d),
            Value::String(s) => s.to_string(),
            Value::Range(r) => format!("({}..{})", r.start, r.end),
            Value::Time(t) => t.to_rfc3339(),
            Value::Array(_) | Value::Hash(_) => self.inspect(classes),
            Value::Block(b) => format!("<Block: {}>", b.frame.file()),
            Value::Method(m) => format!("<Method: {} ({} params)>", m.name, m.argc),
            Value::Regexp(r) => format!("/{}/", r.source()),
            Value::MatchData(m) => m.to_string(),
            Value::Instance(i) => format!(
                "<Instance of: {}>",
                classes.name(classes.real_class(i.class()))
            ),
            Value::Class(c) => classes.name(*c),
            Value::Error(e) => e.to_string(),
            Value::Channel(c) => format!("<Channel: {}>", c.id()),
            Value::Native(n) => format!("<GoObject: {} {:#x}>", n.type_name, n.addr()),
        }
    }

    /// Developer form: strings quoted, containers with inspected elements
    pub fn inspect(&self, classes: &ClassRegistry) -> String {
        match self {
            Value::String(s) => format!("\"{}\"", s),
            Value::Array(a) => {
                let parts: Vec<String> = a.snapshot().iter().map(|v| v.inspect(classes)).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Hash(h) => {
                let pairs = h.sorted_pairs();
                if pairs.is_empty() {
                    return "{}".to_string();
                }
                let parts: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.inspect(classes)))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            other => other.to_s(classes),
        }
    }

    /// JSON form
    pub fn to_json(&self, classes: &ClassRegistry) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Boolean(_) | Value::Integer(_) | Value::Float(_) | Value::Decimal(_) => {
                self.to_s(classes)
            }
            Value::String(s) => json_string(s),
            Value::Array(a) => {
                let parts: Vec<String> = a.snapshot().iter().map(|v| v.to_json(classes)).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Hash(h) => {
                let parts: Vec<String> = h
                    .sorted_pairs()
                    .iter()
                    .map(|(k, v)| format!("{}:{}", json_string(k), v.to_json(classes)))
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
            Value::Instance(i) => {
                let mut ivars: Vec<(String, Value)> = i.ivars().into_iter().collect();
                ivars.sort_by(|a, b| a.0.cmp(&b.0));
                let parts: Vec<String> = ivars
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}:{}",
                            json_string(k.trim_start_matches('@')),
                            v.to_json(classes)
                        )
                    })
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
            other => json_string(&other.to_s(classes)),
        }
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Shortest non-exponential rendering of a float
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}

/// Decimal expansion to 60 fractional digits with trailing zeros trimmed
pub fn format_decimal(value: &BigRational) -> String {
    let negative = value.is_negative();
    let numer = value.numer().abs();
    let denom = value.denom().abs();
    let ten = BigInt::from(10);

    let integral = &numer / &denom;
    let mut remainder = &numer % &denom;
    let mut digits = String::with_capacity(DECIMAL_DIGITS);
    for _ in 0..DECIMAL_DIGITS {
        if remainder.is_zero() {
            break;
        }
        remainder *= &ten;
        digits.push_str(&(&remainder / &denom).to_string());
        remainder %= &denom;
    }
    let digits = digits.trim_end_matches('0');

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&integral.to_string());
    if !digits.is_empty() {
        out.push('.');
        out.push_str(digits);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Boolean(false).truthy());
        assert!(Value::Boolean(true).truthy());
        assert!(Value::int(0).truthy());
        assert!(Value::string("").truthy());
    }

    #[test]
    fn test_kind_strict_equality() {
        assert!(!Value::int(1).equals(&Value::Float(1.0)));
        assert!(Value::string("a").equals(&Value::string("a")));
        assert!(!Value::Null.equals(&Value::Boolean(false)));
    }

    #[test]
    fn test_container_equality() {
        let a = Value::array(vec![Value::int(1), Value::string("x")]);
        let b = Value::array(vec![Value::int(1), Value::string("x")]);
        let c = Value::array(vec![Value::string("x"), Value::int(1)]);
        assert!(a.equals(&b));
        assert!(!a.equals(&c));

        let mut p = FxHashMap::default();
        p.insert("a".to_string(), Value::int(1));
        p.insert("b".to_string(), Value::int(2));
        let mut q = FxHashMap::default();
        q.insert("b".to_string(), Value::int(2));
        q.insert("a".to_string(), Value::int(1));
        assert!(Value::hash(p).equals(&Value::hash(q)));
    }

    #[test]
    fn test_copy_detaches_containers() {
        let original = Value::array(vec![Value::int(1)]);
        let copy = original.copy();
        copy.as_array().unwrap().push(Value::int(2));
        assert_eq!(original.as_array().unwrap().len(), 1);

        let s = Value::string("shared");
        match (&s, &s.copy()) {
            (Value::String(a), Value::String(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_range_iteration() {
        let up = RangeValue { start: 1, end: 3 };
        let down = RangeValue { start: 3, end: 1 };
        assert_eq!(up.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(down.iter().collect::<Vec<_>>(), vec![3, 2, 1]);
        assert_eq!(down.size(), 3);
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(2.5), "2.5");
        assert_eq!(format_float(-0.125), "-0.125");
    }

    #[test]
    fn test_format_decimal() {
        let third = BigRational::new(BigInt::from(1), BigInt::from(3));
        assert_eq!(format_decimal(&third), format!("0.{}", "3".repeat(60)));

        let half = BigRational::from_f64(-2.5).unwrap();
        assert_eq!(format_decimal(&half), "-2.5");
        assert_eq!(format_decimal(&BigRational::from_integer(BigInt::from(4))), "4");
    }

    #[test]
    fn test_rendering() {
        let classes = ClassRegistry::new();
        let mut pairs = FxHashMap::default();
        pairs.insert("b".to_string(), Value::string("x"));
        pairs.insert("a".to_string(), Value::int(1));

        assert_eq!(Value::hash(pairs.clone()).to_s(&classes), "{ a: 1, b: \"x\" }");
        assert_eq!(Value::hash(pairs).to_json(&classes), "{\"a\":1,\"b\":\"x\"}");
        assert_eq!(
            Value::array(vec![Value::int(1), Value::string("a"), Value::Null]).to_s(&classes),
            "[1, \"a\", nil]"
        );
        assert_eq!(Value::range(1, 5).to_s(&classes), "(1..5)");
        assert_eq!(Value::Class(ClassId::STRING).to_s(&classes), "String");
        assert_eq!(Value::string("a\"b").to_json(&classes), "\"a\\\"b\"");
    }
}
