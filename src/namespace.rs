//! Resource namespace
//!
//! Caller-owned registry of bound descriptors, keyed by name. The namespace
//! is passed around explicitly; there is no process-wide instance. Share it
//! behind `Arc<Mutex<Namespace>>` when several threads register.

use crate::binder::{NamedResourceDescriptor, OutputReference};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceError {
    #[error("Resource name '{name}' is already registered as {existing_type}")]
    DuplicateName { name: String, existing_type: String },
}

/// Reference whose target resource is not registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingReference {
    pub resource: String,
    pub attribute: String,
    pub target: OutputReference,
}

/// Descriptors registered under unique names, in registration order
#[derive(Debug, Default)]
pub struct Namespace {
    descriptors: Vec<NamedResourceDescriptor>,
    index: HashMap<String, usize>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor under its name
    pub fn register(
        &mut self,
        descriptor: NamedResourceDescriptor,
    ) -> Result<&NamedResourceDescriptor, NamespaceError> {
        if let Some(&idx) = self.index.get(descriptor.name()) {
            return Err(NamespaceError::DuplicateName {
                name: descriptor.name().to_string(),
                existing_type: self.descriptors[idx].type_id().to_string(),
            });
        }

        tracing::debug!("Registered {} '{}'", descriptor.type_id(), descriptor.name());
        let idx = self.descriptors.len();
        self.index.insert(descriptor.name().to_string(), idx);
        self.descriptors.push(descriptor);
        Ok(&self.descriptors[idx])
    }

    pub fn get(&self, name: &str) -> Option<&NamedResourceDescriptor> {
        self.index.get(name).map(|&idx| &self.descriptors[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedResourceDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// References pointing at resources that are not registered.
    ///
    /// Only the target resource name is checked; whether it exposes the
    /// attribute is left to the orchestration engine.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        self.descriptors
            .iter()
            .flat_map(move |d| {
                d.references()
                    .filter(move |(_, target)| !self.contains(&target.resource))
                    .map(move |(attribute, target)| DanglingReference {
                        resource: d.name().to_string(),
                        attribute: attribute.to_string(),
                        target: target.clone(),
                    })
            })
            .collect()
    }

    /// Hand the descriptors over, in registration order
    pub fn into_descriptors(self) -> Vec<NamedResourceDescriptor> {
        self.descriptors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::{bind, ArgumentBag};
    use crate::schema::{AttributeSchema, ResourceTypeSchema, ValueKind};
    use std::sync::{Arc, Mutex};

    fn link_schema() -> ResourceTypeSchema {
        ResourceTypeSchema::new(
            "test:Link",
            vec![AttributeSchema::optional("to", ValueKind::OpaqueReference)],
        )
        .unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let schema = link_schema();
        let mut ns = Namespace::new();

        ns.register(bind(&schema, "a", &ArgumentBag::new()).unwrap()).unwrap();
        ns.register(bind(&schema, "b", &ArgumentBag::new()).unwrap()).unwrap();

        assert_eq!(ns.len(), 2);
        assert!(ns.contains("a"));
        assert_eq!(ns.get("b").unwrap().type_id(), "test:Link");
        let names: Vec<_> = ns.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let schema = link_schema();
        let mut ns = Namespace::new();
        ns.register(bind(&schema, "a", &ArgumentBag::new()).unwrap()).unwrap();

        let err = ns
            .register(bind(&schema, "a", &ArgumentBag::new()).unwrap())
            .unwrap_err();

        assert_eq!(
            err,
            NamespaceError::DuplicateName {
                name: "a".to_string(),
                existing_type: "test:Link".to_string(),
            }
        );
        assert_eq!(ns.len(), 1);
    }

    #[test]
    fn test_dangling_references() {
        let schema = link_schema();
        let mut ns = Namespace::new();
        let to_b = ArgumentBag::new().with("to", OutputReference::new("b", "id"));
        let to_missing = ArgumentBag::new().with("to", OutputReference::new("ghost", "id"));

        ns.register(bind(&schema, "a", &to_b).unwrap()).unwrap();
        ns.register(bind(&schema, "b", &to_missing).unwrap()).unwrap();

        assert_eq!(
            ns.dangling_references(),
            vec![DanglingReference {
                resource: "b".to_string(),
                attribute: "to".to_string(),
                target: OutputReference::new("ghost", "id"),
            }]
        );
    }

    #[test]
    fn test_shared_across_threads() {
        let schema = Arc::new(link_schema());
        let ns = Arc::new(Mutex::new(Namespace::new()));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let schema = Arc::clone(&schema);
                let ns = Arc::clone(&ns);
                std::thread::spawn(move || {
                    let desc = bind(&schema, &format!("link-{}", i), &ArgumentBag::new()).unwrap();
                    let registered = ns.lock().unwrap().register(desc).map(|_| ());
                    registered
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap().unwrap();
        }
        assert_eq!(ns.lock().unwrap().len(), 8);
    }
}
