//! Resource type schemas
//!
//! A resource type is described as data rather than code: an ordered list
//! of attributes, each with a key, a value kind and a required flag.
//! Schemas are validated once when they are built (or deserialized) and are
//! read-only afterwards, so the binder can trust them.
//!
//! # Module Structure
//!
//! - [`registry`] - Loads provider definitions from embedded or on-disk JSON
//!
//! # Example
//!
//! ```
//! use resbind::schema::{AttributeSchema, ResourceTypeSchema, ValueKind};
//!
//! let schema = ResourceTypeSchema::new(
//!     "azure:search:Service",
//!     vec![
//!         AttributeSchema::required("location", ValueKind::String),
//!         AttributeSchema::optional("tags", ValueKind::StringMap),
//!     ],
//! )
//! .unwrap();
//! assert_eq!(schema.required_keys().collect::<Vec<_>>(), vec!["location"]);
//! ```

pub mod registry;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub use registry::SchemaRegistry;

/// Shape a supplied attribute value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    String,
    Number,
    Boolean,
    StringMap,
    /// Pointer to another resource's output, resolved by the orchestration engine
    OpaqueReference,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::StringMap => "string-map",
            Self::OpaqueReference => "opaque-reference",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One field of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub key: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn required(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn optional(key: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            key: key.into(),
            kind,
            required: false,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Errors raised while building or loading schemas
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Resource type id must not be empty")]
    EmptyTypeId,

    #[error("Resource type '{0}' declares no attributes")]
    NoAttributes(String),

    #[error("Resource type '{0}' declares an attribute with an empty key")]
    EmptyKey(String),

    #[error("Resource type '{type_id}' declares attribute '{key}' more than once")]
    DuplicateKey { type_id: String, key: String },

    #[error("Failed to parse provider definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read provider definition: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered, immutable set of attributes defining one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceTypeSchema {
    type_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    attributes: Vec<AttributeSchema>,
}

impl ResourceTypeSchema {
    /// Build a schema, rejecting empty or ambiguous definitions
    pub fn new(
        type_id: impl Into<String>,
        attributes: Vec<AttributeSchema>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            type_id: type_id.into(),
            display_name: None,
            attributes,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.type_id.is_empty() {
            return Err(SchemaError::EmptyTypeId);
        }
        if self.attributes.is_empty() {
            return Err(SchemaError::NoAttributes(self.type_id.clone()));
        }

        let mut seen = HashSet::new();
        for attr in &self.attributes {
            if attr.key.is_empty() {
                return Err(SchemaError::EmptyKey(self.type_id.clone()));
            }
            if !seen.insert(attr.key.as_str()) {
                return Err(SchemaError::DuplicateKey {
                    type_id: self.type_id.clone(),
                    key: attr.key.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// Human readable name, falling back to the type id
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.type_id)
    }

    /// Attributes in declaration order
    pub fn attributes(&self) -> &[AttributeSchema] {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&AttributeSchema> {
        self.attributes.iter().find(|a| a.key == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.attribute(key).is_some()
    }

    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .filter(|a| a.required)
            .map(|a| a.key.as_str())
    }
}

/// Wire form of a schema inside a provider definition file
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResourceTypeDef {
    #[serde(default)]
    pub display_name: Option<String>,
    pub attributes: Vec<AttributeSchema>,
}

impl ResourceTypeDef {
    pub(crate) fn into_schema(self, type_id: String) -> Result<ResourceTypeSchema, SchemaError> {
        let schema = ResourceTypeSchema::new(type_id, self.attributes)?;
        Ok(match self.display_name {
            Some(name) => schema.with_display_name(name),
            None => schema,
        })
    }
}
