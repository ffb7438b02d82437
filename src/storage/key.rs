//! Ordered keys shared by stores and secondary indexes
//!
//! Keys have a total order so that ordered maps can range-scan them.
//! Ordering across kinds is fixed: Bool < numbers < String < Array.
//! Integers and floats share one numeric order, so `Int(3)` sorts after
//! `Float(2.5)` and equals `Float(3.0)`. Arrays compare element-wise, which
//! gives compound index keys.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A store or index key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Key {
    /// Boolean value (false < true)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Float value, stored as order-preserving bits
    Float(u64),
    /// String value
    String(String),
    /// Compound key
    Array(Vec<Key>),
}

const SIGN_BIT: u64 = 1 << 63;

/// 2^63 as a float; the first value past `i64::MAX`
const I64_EDGE: f64 = 9_223_372_036_854_775_808.0;

fn encode_float(v: f64) -> u64 {
    // -0.0 and 0.0 are one key
    let v = if v == 0.0 { 0.0 } else { v };
    let bits = v.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    }
}

fn decode_float(ordered: u64) -> f64 {
    let bits = if ordered & SIGN_BIT != 0 {
        ordered ^ SIGN_BIT
    } else {
        !ordered
    };
    f64::from_bits(bits)
}

fn cmp_floats(a: f64, b: f64) -> Ordering {
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Exact comparison of an integer against a float
fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return if f.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if f >= I64_EDGE {
        return Ordering::Less;
    }
    if f < -I64_EDGE {
        return Ordering::Greater;
    }
    let whole = f.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(f - whole)).unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Integral float that an `Int` key would equal
fn integral(f: f64) -> Option<i64> {
    if f.fract() == 0.0 && f >= -I64_EDGE && f < I64_EDGE {
        Some(f as i64)
    } else {
        None
    }
}

impl Key {
    pub fn from_bool(v: bool) -> Self {
        Key::Bool(v)
    }

    pub fn from_int(v: i64) -> Self {
        Key::Int(v)
    }

    /// Create a key from a float.
    ///
    /// Negative floats have every bit flipped, positive floats only the sign
    /// bit, so the unsigned bit patterns sort like the floats they encode.
    /// `-0.0` is stored as `0.0`.
    pub fn from_float(v: f64) -> Self {
        Key::Float(encode_float(v))
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        Key::String(v.into())
    }

    pub fn from_array(parts: impl IntoIterator<Item = Key>) -> Self {
        Key::Array(parts.into_iter().collect())
    }

    /// Convert a JSON value into a key.
    ///
    /// Null and objects are not keys. An array is a key only if every element is.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Key::from_bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Key::from_int(i))
                } else {
                    n.as_f64().map(Key::from_float)
                }
            }
            Value::String(s) => Some(Key::from_string(s.as_str())),
            Value::Array(items) => items
                .iter()
                .map(Key::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Key::Array),
            Value::Null | Value::Object(_) => None,
        }
    }

    /// Numeric value of an `Int` or `Float` key.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Int(i) => Some(*i as f64),
            Key::Float(ordered) => Some(decode_float(*ordered)),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert back into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            Key::Bool(b) => Value::Bool(*b),
            Key::Int(i) => Value::from(*i),
            Key::Float(_) => self
                .as_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Key::String(s) => Value::String(s.clone()),
            Key::Array(items) => Value::Array(items.iter().map(Key::to_json).collect()),
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            Key::Bool(_) => 0,
            Key::Int(_) | Key::Float(_) => 1,
            Key::String(_) => 2,
            Key::Array(_) => 3,
        }
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Bool(a), Key::Bool(b)) => a.cmp(b),
            (Key::Int(a), Key::Int(b)) => a.cmp(b),
            (Key::Int(a), Key::Float(b)) => cmp_int_float(*a, decode_float(*b)),
            (Key::Float(a), Key::Int(b)) => cmp_int_float(*b, decode_float(*a)).reverse(),
            (Key::Float(a), Key::Float(b)) => cmp_floats(decode_float(*a), decode_float(*b)),
            (Key::String(a), Key::String(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind_rank().hash(state);
        match self {
            Key::Bool(b) => b.hash(state),
            Key::Int(i) => i.hash(state),
            Key::Float(ordered) => {
                let v = decode_float(*ordered);
                match integral(v) {
                    Some(i) => i.hash(state),
                    None => {
                        true.hash(state);
                        ordered.hash(state);
                    }
                }
            }
            Key::String(s) => s.hash(state),
            Key::Array(items) => items.hash(state),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Bool(b) => write!(f, "{}", b),
            Key::Int(i) => write!(f, "{}", i),
            Key::Float(_) => match self.as_f64() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "NaN"),
            },
            Key::String(s) => write!(f, "{:?}", s),
            Key::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_ordering_across_kinds() {
        let keys = vec![
            Key::from_bool(false),
            Key::from_bool(true),
            Key::from_int(-100),
            Key::from_float(-1.5),
            Key::from_int(0),
            Key::from_float(2.25),
            Key::from_int(100),
            Key::from_string("aaa"),
            Key::from_string("zzz"),
            Key::from_array([Key::from_int(1)]),
        ];

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "{} should sort before {}", keys[i - 1], keys[i]);
        }
    }

    #[test]
    fn test_float_ordering_and_decode() {
        let values = [-10.0, -0.5, 0.0, 0.5, 3.75, 1e9];
        let keys: Vec<Key> = values.iter().map(|v| Key::from_float(*v)).collect();

        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i]);
        }
        for (key, value) in keys.iter().zip(values) {
            assert_eq!(key.as_f64(), Some(value));
        }
    }

    #[test]
    fn test_ints_and_floats_share_one_order() {
        let mut keys = vec![Key::from_int(3), Key::from_float(2.5), Key::from_int(10)];
        keys.sort();
        assert_eq!(keys, vec![Key::from_float(2.5), Key::from_int(3), Key::from_int(10)]);

        assert!(Key::from_int(-3) < Key::from_float(-2.5));
        assert!(Key::from_float(-3.5) < Key::from_int(-3));
        assert!(Key::from_int(i64::MAX) < Key::from_float(1e19));
        assert!(Key::from_int(i64::MIN) > Key::from_float(-1e19));
        assert!(Key::from_int(7) < Key::from_string("7"));
    }

    #[test]
    fn test_equal_numbers_are_one_key() {
        use std::collections::hash_map::DefaultHasher;

        fn hash_of(key: &Key) -> u64 {
            let mut hasher = DefaultHasher::new();
            key.hash(&mut hasher);
            hasher.finish()
        }

        let pairs = [
            (Key::from_int(2), Key::from_float(2.0)),
            (Key::from_int(0), Key::from_float(-0.0)),
            (Key::from_float(0.0), Key::from_float(-0.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(a, b);
            assert_eq!(a.cmp(&b), Ordering::Equal);
            assert_eq!(hash_of(&a), hash_of(&b));
        }
        assert_ne!(Key::from_float(2.5), Key::from_int(2));
    }

    #[test]
    fn test_negative_zero_normalized() {
        let key = Key::from_float(-0.0);
        assert_eq!(key.as_f64().map(f64::is_sign_positive), Some(true));
        assert_eq!(Key::from_json(&json!(-0.0)), Some(Key::from_int(0)));
    }

    #[test]
    fn test_compound_keys_compare_elementwise() {
        let a = Key::from_array([Key::from_string("x"), Key::from_int(1)]);
        let b = Key::from_array([Key::from_string("x"), Key::from_int(2)]);
        let c = Key::from_array([Key::from_string("y")]);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_from_json() {
        assert_eq!(Key::from_json(&json!(true)), Some(Key::Bool(true)));
        assert_eq!(Key::from_json(&json!(42)), Some(Key::Int(42)));
        assert_eq!(Key::from_json(&json!("hello")), Some(Key::from_string("hello")));
        assert_eq!(
            Key::from_json(&json!([1, "a"])),
            Some(Key::from_array([Key::from_int(1), Key::from_string("a")]))
        );
        assert_eq!(Key::from_json(&json!(null)), None);
        assert_eq!(Key::from_json(&json!({"a": 1})), None);
        assert_eq!(Key::from_json(&json!([1, null])), None);
    }

    #[test]
    fn test_to_json_inverts_from_json() {
        for value in [json!(false), json!(-7), json!(1.5), json!("s"), json!([1, ["a"]])] {
            let key = Key::from_json(&value).unwrap();
            assert_eq!(key.to_json(), value);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::from_int(5).to_string(), "5");
        assert_eq!(Key::from_string("a").to_string(), "\"a\"");
        assert_eq!(
            Key::from_array([Key::from_int(1), Key::from_bool(true)]).to_string(),
            "[1, true]"
        );
    }
}
