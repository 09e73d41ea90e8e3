//! Host values and JSON coercion
//!
//! Host applications hand back a zoo of value types: math vectors, Euler
//! triples, quaternions, matrices, enum sets, ID references and objects that
//! only know how to print themselves. [`HostValue`] closes that set, and
//! [`coerce`] turns any of them into a JSON-safe value without ever failing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value as JsonValue};

/// Number of decimal places every float in the output is rounded to
pub const FLOAT_PRECISION: usize = 6;

/// A value read from the host scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum HostValue {
    /// Absent value
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Fixed-length math vector
    Vector(Vec<f64>),
    /// Euler rotation triple (radians)
    Euler([f64; 3]),
    /// Quaternion in w, x, y, z order
    Quaternion([f64; 4]),
    /// RGB or RGBA color
    Color(Vec<f64>),
    /// Row-major matrix
    Matrix(Vec<Vec<f64>>),
    /// Any other ordered collection
    Sequence(Vec<HostValue>),
    /// Nested string-keyed property group
    Group(IndexMap<String, HostValue>),
    /// Reference to a named datablock
    IdRef { name: String, id_type: Option<String> },
    /// Set of enum identifiers
    EnumSet(Vec<String>),
    /// A value only known by its type and (optionally) its printed form
    Opaque {
        type_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        repr: Option<String>,
    },
}

impl HostValue {
    /// Host type name, used for sentinel strings and diagnostics
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::String(_) => "str",
            HostValue::Vector(_) => "Vector",
            HostValue::Euler(_) => "Euler",
            HostValue::Quaternion(_) => "Quaternion",
            HostValue::Color(_) => "Color",
            HostValue::Matrix(_) => "Matrix",
            HostValue::Sequence(_) => "Sequence",
            HostValue::Group(_) => "IDPropertyGroup",
            HostValue::IdRef { id_type, .. } => id_type.as_deref().unwrap_or("ID"),
            HostValue::EnumSet(_) => "set",
            HostValue::Opaque { type_name, .. } => type_name,
        }
    }

    /// Convenience constructor for 3-component vectors
    pub fn vec3(v: [f64; 3]) -> Self {
        HostValue::Vector(v.to_vec())
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i64> for HostValue {
    fn from(v: i64) -> Self {
        HostValue::Int(v)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Float(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::String(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::String(v)
    }
}

/// Round to [`FLOAT_PRECISION`] decimal places.
///
/// Rounds the exact decimal expansion of `x`, so a value stored just above a
/// half-step rounds up. Idempotent: rounding an already-rounded value
/// returns it unchanged.
pub fn round6(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let rounded = format!("{:.*}", FLOAT_PRECISION, x)
        .parse::<f64>()
        .unwrap_or(x);
    // Avoid emitting -0.0
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Rounded JSON number, or `null` when the float has no JSON form
pub fn float_json(x: f64) -> JsonValue {
    Number::from_f64(round6(x))
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

/// Rounded JSON array of floats
pub fn floats_json(values: &[f64]) -> JsonValue {
    JsonValue::Array(values.iter().copied().map(float_json).collect())
}

/// Convert a host value to JSON. Total: never fails, never panics.
pub fn coerce(value: &HostValue) -> JsonValue {
    match value {
        HostValue::None => JsonValue::Null,
        HostValue::Bool(b) => JsonValue::Bool(*b),
        HostValue::Int(i) => JsonValue::from(*i),
        HostValue::Float(f) => float_json(*f),
        HostValue::String(s) => JsonValue::String(s.clone()),
        HostValue::Vector(v) | HostValue::Color(v) => floats_json(v),
        HostValue::Euler(v) => floats_json(v),
        HostValue::Quaternion(v) => floats_json(v),
        HostValue::Matrix(rows) => JsonValue::Array(rows.iter().map(|row| floats_json(row)).collect()),
        HostValue::Sequence(items) => JsonValue::Array(items.iter().map(coerce).collect()),
        HostValue::Group(entries) => {
            let map: Map<String, JsonValue> = entries
                .iter()
                .map(|(key, value)| (key.clone(), coerce(value)))
                .collect();
            JsonValue::Object(map)
        }
        HostValue::IdRef { name, .. } => JsonValue::String(name.clone()),
        HostValue::EnumSet(items) => {
            JsonValue::Array(items.iter().cloned().map(JsonValue::String).collect())
        }
        HostValue::Opaque { type_name, repr } => match repr {
            Some(repr) => JsonValue::String(repr.clone()),
            None => JsonValue::String(unserializable(type_name)),
        },
    }
}

/// Sentinel for values with no representation at all
pub fn unserializable(type_name: &str) -> String {
    format!("Unserializable: {}", type_name)
}
