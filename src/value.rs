//! The value tree that paths are evaluated against.
//!
//! Numbers are arbitrary-precision decimals. Documents enter and leave the
//! tree through `serde_json`, whose number text is carried over unchanged.

use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ValueError;
use crate::path::PathStep;

/// Padding zeros a number may need before it is written with an exponent.
const PLAIN_ZEROS: usize = 20;

/// A node of the generic value tree.
///
/// `List` and `Tuple` are the indexed containers, `Map` and `Object` the keyed
/// ones. Everything else is a primitive and cannot be iterated.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Number(BigDecimal),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Map(IndexMap<String, Value>),
    Object(IndexMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => match (self.as_indexed(), other.as_indexed()) {
                (Some(a), Some(b)) => a == b,
                (None, None) => match (self.as_keyed(), other.as_keyed()) {
                    (Some(a), Some(b)) => {
                        a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
                    }
                    _ => false,
                },
                _ => false,
            },
        }
    }
}

/// Primitives print bare, containers as compact JSON.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(n)),
            Value::String(s) => f.write_str(s),
            _ => f.write_str(&self.to_json().map_err(|_| fmt::Error)?),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(BigDecimal::from(n))
    }
}

impl From<BigDecimal> for Value {
    fn from(n: BigDecimal) -> Self {
        Value::Number(n)
    }
}

/// Takes the shortest decimal text that round-trips the float, so `0.1`
/// becomes exactly `0.1`. NaN and the infinities are rejected.
impl TryFrom<f64> for Value {
    type Error = ValueError;

    fn try_from(n: f64) -> Result<Self, Self::Error> {
        if !n.is_finite() {
            return Err(ValueError::NonFinite(n.to_string()));
        }
        let text = n.to_string();
        BigDecimal::from_str(&text)
            .map(Value::Number)
            .map_err(|_| ValueError::InvalidNumber(text))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(m: IndexMap<String, Value>) -> Self {
        Value::Object(m)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// List or Tuple.
    pub fn is_indexed(&self) -> bool {
        matches!(self, Value::List(_) | Value::Tuple(_))
    }

    /// Map or Object.
    pub fn is_keyed(&self) -> bool {
        matches!(self, Value::Map(_) | Value::Object(_))
    }

    pub fn is_container(&self) -> bool {
        self.is_indexed() || self.is_keyed()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&BigDecimal> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_indexed(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Map(fields) | Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Number of immediate children, `None` for primitives.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::List(items) | Value::Tuple(items) => Some(items.len()),
            Value::Map(fields) | Value::Object(fields) => Some(fields.len()),
            _ => None,
        }
    }

    pub fn get_attr(&self, name: &str) -> Option<&Value> {
        self.as_keyed().and_then(|fields| fields.get(name))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.as_indexed().and_then(|items| items.get(index))
    }

    pub fn get_step(&self, step: &PathStep) -> Option<&Value> {
        match step {
            PathStep::Attr(name) => self.get_attr(name),
            PathStep::Index(index) => self.get_index(*index),
        }
    }

    pub fn get_step_mut(&mut self, step: &PathStep) -> Option<&mut Value> {
        match (self, step) {
            (Value::Map(fields) | Value::Object(fields), PathStep::Attr(name)) => fields.get_mut(name),
            (Value::List(items) | Value::Tuple(items), PathStep::Index(index)) => items.get_mut(*index),
            _ => None,
        }
    }

    /// Immediate children in natural order: ascending index for indexed
    /// containers, insertion order for keyed ones.
    pub fn entries(&self) -> Vec<(PathStep, &Value)> {
        match self {
            Value::List(items) | Value::Tuple(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (PathStep::Index(i), item))
                .collect(),
            Value::Map(fields) | Value::Object(fields) => fields
                .iter()
                .map(|(key, value)| (PathStep::Attr(key.clone()), value))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Compact JSON text.
    pub fn to_json(&self) -> Result<String, ValueError> {
        serde_json::to_string(&self.to_serde_json()?).map_err(|e| ValueError::Render(e.to_string()))
    }

    /// JSON text indented by two spaces.
    pub fn to_json_pretty(&self) -> Result<String, ValueError> {
        serde_json::to_string_pretty(&self.to_serde_json()?).map_err(|e| ValueError::Render(e.to_string()))
    }

    /// Arrays become tuples and objects become objects, since JSON carries no
    /// element-type information. Keys keep document order.
    pub fn from_serde_json(v: serde_json::Value) -> Result<Value, ValueError> {
        Ok(match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                let text = n.to_string();
                let parsed = BigDecimal::from_str(&text).map_err(|_| ValueError::InvalidNumber(text))?;
                Value::Number(parsed)
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::Tuple(
                items
                    .into_iter()
                    .map(Value::from_serde_json)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| Ok((k, Value::from_serde_json(v)?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
        })
    }

    pub fn to_serde_json(&self) -> Result<serde_json::Value, ValueError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => {
                let text = format_number(n);
                let number = serde_json::Number::from_str(&text).map_err(|_| ValueError::InvalidNumber(text))?;
                serde_json::Value::Number(number)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) | Value::Tuple(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_serde_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(fields) | Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.to_serde_json()?)))
                    .collect::<Result<_, ValueError>>()?,
            ),
        })
    }
}

/// Shortest decimal text for `n`, valid as a JSON number. Magnitudes that
/// would need more than `PLAIN_ZEROS` padding zeros use an exponent instead.
pub(crate) fn format_number(n: &BigDecimal) -> String {
    let (mantissa, scale) = n.normalized().as_bigint_and_exponent();
    let text = mantissa.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    if digits == "0" {
        return "0".to_string();
    }
    if scale <= 0 {
        let zeros = scale.unsigned_abs() as usize;
        if zeros > PLAIN_ZEROS {
            return format!("{}{}e{}", sign, digits, zeros);
        }
        return format!("{}{}{}", sign, digits, "0".repeat(zeros));
    }
    let scale = scale as usize;
    if scale < digits.len() {
        let (int, frac) = digits.split_at(digits.len() - scale);
        return format!("{}{}.{}", sign, int, frac);
    }
    let lead = scale - digits.len();
    if lead > PLAIN_ZEROS {
        return format!("{}{}e-{}", sign, digits, scale);
    }
    format!("{}0.{}{}", sign, "0".repeat(lead), digits)
}
