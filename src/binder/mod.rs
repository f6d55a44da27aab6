//! Resource binder
//!
//! Turns a schema, a name and an argument bag into a validated, immutable
//! [`NamedResourceDescriptor`]. Binding is a pure function: it performs no
//! I/O and touches no shared state, so it can run from any thread.
//!
//! # Example
//!
//! ```
//! use resbind::binder::{bind, ArgumentBag};
//! use resbind::schema::SchemaRegistry;
//!
//! let schema = SchemaRegistry::builtin().get("azure:search:Service").unwrap();
//! let args = ArgumentBag::new()
//!     .with("location", "westus")
//!     .with("resourceGroupName", "search-rg")
//!     .with("sku", "standard");
//!
//! let descriptor = bind(schema, "search", &args).unwrap();
//! assert!(!descriptor.get("tags").unwrap().is_set());
//! ```

mod value;

pub use value::{ArgumentBag, ArgumentError, AttributeSlot, AttributeValue, OutputReference};

use crate::schema::{ResourceTypeSchema, ValueKind};
use serde::ser::{SerializeMap, SerializeStruct, Serializer};
use serde::Serialize;

/// Reasons a bind call can fail. All of them are caller mistakes and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("Resource name must not be empty")]
    EmptyName,

    #[error("Property argument '{key}' is required by {type_id}, but was missing")]
    MissingRequiredAttribute { type_id: String, key: String },

    #[error("Property argument '{key}' must be {expected}, but was {}", found(.expected, .actual))]
    SchemaViolation {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    #[error("Property argument '{key}' is not defined by {type_id}")]
    UnknownAttribute { type_id: String, key: String },
}

impl BindError {
    /// The offending attribute key, if the error concerns one
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::EmptyName => None,
            Self::MissingRequiredAttribute { key, .. }
            | Self::SchemaViolation { key, .. }
            | Self::UnknownAttribute { key, .. } => Some(key),
        }
    }
}

fn found(expected: &ValueKind, actual: &ValueKind) -> String {
    // Same kind means the value itself was malformed (a non-finite number)
    if expected == actual {
        format!("a non-finite {}", actual)
    } else {
        actual.to_string()
    }
}

/// Validated output of a bind call
///
/// Holds exactly the schema's keys, in declaration order. Optional
/// attributes the caller left out are [`AttributeSlot::Unset`].
#[derive(Debug, Clone, PartialEq)]
pub struct NamedResourceDescriptor {
    name: String,
    type_id: String,
    attributes: Vec<(String, AttributeSlot)>,
}

impl NamedResourceDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Slot for `key`, or `None` if the schema has no such attribute
    pub fn get(&self, key: &str) -> Option<&AttributeSlot> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, slot)| slot)
    }

    /// Attributes in schema declaration order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeSlot)> {
        self.attributes.iter().map(|(k, slot)| (k.as_str(), slot))
    }

    /// Opaque references carried by this descriptor, with the attribute holding each
    pub fn references(&self) -> impl Iterator<Item = (&str, &OutputReference)> {
        self.attributes.iter().filter_map(|(k, slot)| {
            slot.value()
                .and_then(AttributeValue::as_reference)
                .map(|r| (k.as_str(), r))
        })
    }
}

struct OrderedAttributes<'a>(&'a [(String, AttributeSlot)]);

impl Serialize for OrderedAttributes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, slot) in self.0 {
            map.serialize_entry(key, slot)?;
        }
        map.end()
    }
}

impl Serialize for NamedResourceDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("NamedResourceDescriptor", 3)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("type", &self.type_id)?;
        state.serialize_field("attributes", &OrderedAttributes(&self.attributes))?;
        state.end()
    }
}

/// Walk the schema and the arguments, handing each failure to `fail`.
///
/// Failures are produced in a fixed order: empty name, then schema
/// attributes in declaration order, then unknown argument keys in sorted
/// order. Returning `false` from `fail` stops the walk. The returned
/// attributes are only complete when `fail` was never called.
fn validate(
    schema: &ResourceTypeSchema,
    name: &str,
    args: &ArgumentBag,
    mut fail: impl FnMut(BindError) -> bool,
) -> Vec<(String, AttributeSlot)> {
    if name.is_empty() && !fail(BindError::EmptyName) {
        return Vec::new();
    }

    let mut attributes = Vec::with_capacity(schema.attributes().len());
    for attr in schema.attributes() {
        let slot = match args.get(&attr.key) {
            Some(value) if value.kind() == attr.kind && value.is_finite() => {
                AttributeSlot::Set(value.clone())
            }
            Some(value) => {
                let err = BindError::SchemaViolation {
                    key: attr.key.clone(),
                    expected: attr.kind,
                    actual: value.kind(),
                };
                if !fail(err) {
                    return attributes;
                }
                continue;
            }
            None if attr.required => {
                let err = BindError::MissingRequiredAttribute {
                    type_id: schema.type_id().to_string(),
                    key: attr.key.clone(),
                };
                if !fail(err) {
                    return attributes;
                }
                continue;
            }
            None => AttributeSlot::Unset,
        };
        attributes.push((attr.key.clone(), slot));
    }

    for key in args.keys().filter(|k| !schema.contains_key(k)) {
        let err = BindError::UnknownAttribute {
            type_id: schema.type_id().to_string(),
            key: key.to_string(),
        };
        if !fail(err) {
            break;
        }
    }

    attributes
}

/// Validate `args` against `schema` and build a descriptor named `name`.
///
/// All-or-nothing: on failure no descriptor is produced and the first
/// problem found is returned.
pub fn bind(
    schema: &ResourceTypeSchema,
    name: &str,
    args: &ArgumentBag,
) -> Result<NamedResourceDescriptor, BindError> {
    let mut first = None;
    let attributes = validate(schema, name, args, |err| {
        first = Some(err);
        false
    });

    if let Some(err) = first {
        tracing::debug!("Bind of {} '{}' failed: {}", schema.type_id(), name, err);
        return Err(err);
    }

    tracing::debug!("Bound {} '{}'", schema.type_id(), name);
    Ok(NamedResourceDescriptor {
        name: name.to_string(),
        type_id: schema.type_id().to_string(),
        attributes,
    })
}

/// Report every problem `bind` would hit, in the order it would hit them.
///
/// Empty exactly when `bind` succeeds.
pub fn check(schema: &ResourceTypeSchema, name: &str, args: &ArgumentBag) -> Vec<BindError> {
    let mut failures = Vec::new();
    validate(schema, name, args, |err| {
        failures.push(err);
        true
    });
    failures
}
