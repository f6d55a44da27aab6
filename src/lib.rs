//! Declarative resource binder
//!
//! Validates caller-supplied arguments against data-described resource
//! schemas and produces immutable, named resource descriptors for an
//! orchestration engine to consume.
//!
//! # Architecture
//!
//! - [`schema`] - Resource type schemas and the provider definition registry
//! - [`binder`] - Argument bags, `bind`/`check`, and the descriptors they produce
//! - [`namespace`] - Caller-owned registry enforcing unique resource names
//! - [`program`] - YAML/JSON manifests declaring many resources at once
//! - [`config`] - Persistent user configuration

pub mod binder;
pub mod config;
pub mod namespace;
pub mod program;
pub mod schema;

pub use binder::{
    bind, check, ArgumentBag, AttributeSlot, AttributeValue, BindError, NamedResourceDescriptor,
    OutputReference,
};
pub use namespace::{Namespace, NamespaceError};
pub use schema::{AttributeSchema, ResourceTypeSchema, SchemaRegistry, ValueKind};
