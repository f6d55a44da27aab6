//! Attribute values and argument bags

use crate::schema::ValueKind;
use serde::ser::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Largest integer magnitude an `f64` holds exactly (2^53)
const MAX_EXACT_INTEGER: u64 = 1 << 53;

/// Pointer to an output attribute of another resource, written `${resource.attribute}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputReference {
    pub resource: String,
    pub attribute: String,
}

impl OutputReference {
    pub fn new(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.resource, self.attribute)
    }
}

impl FromStr for OutputReference {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .strip_prefix("${")
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or(())?;
        // Resource names may contain dots, attribute keys may not
        let (resource, attribute) = inner.rsplit_once('.').ok_or(())?;
        if resource.is_empty() || attribute.is_empty() || attribute.contains(['{', '}']) {
            return Err(());
        }
        Ok(Self::new(resource, attribute))
    }
}

/// A value supplied for one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
    StringMap(BTreeMap<String, String>),
    Reference(OutputReference),
}

impl AttributeValue {
    /// The kind this value satisfies
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Number(_) => ValueKind::Number,
            Self::Bool(_) => ValueKind::Boolean,
            Self::StringMap(_) => ValueKind::StringMap,
            Self::Reference(_) => ValueKind::OpaqueReference,
        }
    }

    /// False for NaN and infinite numbers, which have no stable equality or JSON form
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Number(n) => n.is_finite(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&OutputReference> {
        match self {
            Self::Reference(r) => Some(r),
            _ => None,
        }
    }

    /// Convert a JSON value, returning the JSON type name when it has no counterpart
    pub fn from_json(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::String(s) => Ok(match s.parse::<OutputReference>() {
                Ok(reference) => Self::Reference(reference),
                Err(()) => Self::String(s.clone()),
            }),
            Value::Number(n) => {
                let inexact = match (n.as_u64(), n.as_i64()) {
                    (Some(u), _) => u > MAX_EXACT_INTEGER,
                    (None, Some(i)) => i.unsigned_abs() > MAX_EXACT_INTEGER,
                    (None, None) => false,
                };
                if inexact {
                    return Err("integer too large for a number");
                }
                n.as_f64().map(Self::Number).ok_or("number")
            }
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => Ok((k.clone(), s.clone())),
                    _ => Err("object with non-string values"),
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::StringMap),
            Value::Null => Err("null"),
            Value::Array(_) => Err("array"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for AttributeValue {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<BTreeMap<String, String>> for AttributeValue {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::StringMap(map)
    }
}

impl From<OutputReference> for AttributeValue {
    fn from(reference: OutputReference) -> Self {
        Self::Reference(reference)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::String(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::StringMap(map) => map.serialize(serializer),
            Self::Reference(r) => serializer.collect_str(r),
        }
    }
}

/// Attribute of a bound resource: either a supplied value or explicitly unset
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSlot {
    Set(AttributeValue),
    Unset,
}

impl AttributeSlot {
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn value(&self) -> Option<&AttributeValue> {
        match self {
            Self::Set(v) => Some(v),
            Self::Unset => None,
        }
    }
}

impl Serialize for AttributeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => v.serialize(serializer),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

/// Errors converting loosely typed input into an [`ArgumentBag`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    #[error("Arguments must be an object, found {0}")]
    NotAnObject(&'static str),

    #[error("Argument '{key}' has unsupported value: {found}")]
    Unsupported { key: String, found: &'static str },
}

/// Caller-supplied values for a subset of a schema's attributes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentBag {
    values: BTreeMap<String, AttributeValue>,
}

impl ArgumentBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert a JSON object into an argument bag
    pub fn from_json(value: &Value) -> Result<Self, ArgumentError> {
        let Value::Object(map) = value else {
            return Err(ArgumentError::NotAnObject(json_type_name(value)));
        };

        let mut bag = Self::new();
        for (key, v) in map {
            let value = AttributeValue::from_json(v).map_err(|found| ArgumentError::Unsupported {
                key: key.clone(),
                found,
            })?;
            bag.insert(key.clone(), value);
        }
        Ok(bag)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
