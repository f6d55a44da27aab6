//! Schema Registry - Load provider definitions from JSON
//!
//! Built-in provider definitions are embedded in the binary and parsed once.
//! Extra definitions can be layered on top from files on disk.

use super::{ResourceTypeDef, ResourceTypeSchema, SchemaError};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

/// Embedded provider definition files (compiled into the binary)
const PROVIDER_FILES: &[&str] = &[
    include_str!("../resources/azure.json"),
    include_str!("../resources/gcp.json"),
];

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
struct ProviderDef {
    provider: String,
    #[serde(default)]
    resources: HashMap<String, ResourceTypeDef>,
}

/// Lookup table from type id to schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ResourceTypeSchema>,
}

/// Built-in registry, parsed from the embedded JSON on first access
static BUILTIN: OnceLock<SchemaRegistry> = OnceLock::new();

impl SchemaRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get the built-in registry
    pub fn builtin() -> &'static SchemaRegistry {
        BUILTIN.get_or_init(|| {
            let mut registry = SchemaRegistry::empty();
            for content in PROVIDER_FILES {
                registry
                    .load_str(content)
                    .unwrap_or_else(|e| panic!("Failed to parse embedded provider JSON: {}", e));
            }
            registry
        })
    }

    /// Parse a provider definition and add its schemas.
    ///
    /// Nothing is added if any schema in the document is invalid. Returns the
    /// number of schemas loaded.
    pub fn load_str(&mut self, content: &str) -> Result<usize, SchemaError> {
        let def: ProviderDef = serde_json::from_str(content)?;

        let mut loaded = Vec::with_capacity(def.resources.len());
        for (type_id, resource) in def.resources {
            loaded.push(resource.into_schema(type_id)?);
        }

        tracing::debug!("Loaded {} schemas for provider {}", loaded.len(), def.provider);
        let count = loaded.len();
        for schema in loaded {
            self.insert(schema);
        }
        Ok(count)
    }

    /// Load a provider definition file from disk
    pub fn load_file(&mut self, path: &Path) -> Result<usize, SchemaError> {
        tracing::info!("Loading provider definition: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        self.load_str(&content)
    }

    /// Add a schema, replacing any previous definition with the same type id
    pub fn insert(&mut self, schema: ResourceTypeSchema) {
        if self.schemas.contains_key(schema.type_id()) {
            tracing::warn!("Overriding schema for {}", schema.type_id());
        }
        self.schemas.insert(schema.type_id().to_string(), schema);
    }

    /// Copy every schema of `other` into this registry
    pub fn extend(&mut self, other: &SchemaRegistry) {
        for schema in other.schemas.values() {
            self.insert(schema.clone());
        }
    }

    /// Get a schema by type id
    pub fn get(&self, type_id: &str) -> Option<&ResourceTypeSchema> {
        self.schemas.get(type_id)
    }

    /// All type ids, sorted (for listing)
    pub fn type_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.schemas.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValueKind;

    #[test]
    fn test_builtin_loads_successfully() {
        let registry = SchemaRegistry::builtin();
        assert!(!registry.is_empty(), "Registry should have schemas");
    }

    #[test]
    fn test_search_service_schema() {
        let schema = SchemaRegistry::builtin()
            .get("azure:search:Service")
            .expect("Search service schema should exist");

        assert_eq!(schema.display_name(), "Search Service");
        let required: Vec<_> = schema.required_keys().collect();
        assert_eq!(required, vec!["location", "resourceGroupName", "sku"]);
        assert_eq!(schema.attribute("tags").unwrap().kind, ValueKind::StringMap);
        assert_eq!(schema.attribute("replicaCount").unwrap().kind, ValueKind::Number);
    }

    #[test]
    fn test_forwarding_rule_schema() {
        let schema = SchemaRegistry::builtin()
            .get("gcp:compute:GlobalForwardingRule")
            .expect("Forwarding rule schema should exist");

        let required: Vec<_> = schema.required_keys().collect();
        assert_eq!(required, vec!["selfLink", "target"]);
        assert_eq!(schema.attributes().len(), 8);
        assert!(!schema.attribute("region").unwrap().required);
    }

    #[test]
    fn test_type_ids_sorted() {
        let ids = SchemaRegistry::builtin().type_ids();
        assert_eq!(
            ids,
            vec!["azure:search:Service", "gcp:compute:GlobalForwardingRule"]
        );
    }

    #[test]
    fn test_invalid_document_adds_nothing() {
        let mut registry = SchemaRegistry::empty();
        let content = r#"{
            "provider": "test",
            "resources": {
                "test:Ok": { "attributes": [ { "key": "a", "kind": "string" } ] },
                "test:Bad": { "attributes": [] }
            }
        }"#;

        assert!(matches!(
            registry.load_str(content),
            Err(SchemaError::NoAttributes(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_later_definition_overrides() {
        let mut registry = SchemaRegistry::empty();
        registry.extend(SchemaRegistry::builtin());

        let content = r#"{
            "provider": "azure",
            "resources": {
                "azure:search:Service": {
                    "attributes": [ { "key": "location", "kind": "string", "required": true } ]
                }
            }
        }"#;
        assert_eq!(registry.load_str(content).unwrap(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("azure:search:Service").unwrap().attributes().len(),
            1
        );
    }
}
