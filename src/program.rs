//! Resource programs
//!
//! A program is a manifest declaring named resources and their arguments.
//! YAML is the default format; files ending in `.json` are read as JSON.
//!
//! # Example
//!
//! ```
//! use resbind::program::Program;
//! use resbind::{Namespace, SchemaRegistry};
//!
//! let program = Program::from_yaml_str(r#"
//! resources:
//!   - name: web-rule
//!     type: gcp:compute:GlobalForwardingRule
//!     args:
//!       target: projects/demo/global/targetHttpProxies/web-proxy
//!       selfLink: projects/demo/global/forwardingRules/web-rule
//! "#).unwrap();
//!
//! let mut namespace = Namespace::new();
//! program.bind(SchemaRegistry::builtin(), &mut namespace).unwrap();
//! assert!(namespace.contains("web-rule"));
//! ```
//!
//! A string written exactly as `${resource.attribute}` is an opaque
//! reference and only satisfies `opaque-reference` attributes.

use crate::binder::{self, ArgumentBag, AttributeValue, NamedResourceDescriptor};
use crate::namespace::Namespace;
use crate::schema::SchemaRegistry;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// One resource declared in a program
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    #[serde(default)]
    pub args: Value,
}

impl ResourceDecl {
    fn argument_bag(&self) -> Result<ArgumentBag, binder::ArgumentError> {
        // `args:` with no body parses as null
        if self.args.is_null() {
            return Ok(ArgumentBag::new());
        }
        ArgumentBag::from_json(&self.args)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Problem found while checking a program, attributed to one resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDiagnostic {
    pub resource: String,
    pub severity: Severity,
    pub message: String,
}

impl ResourceDiagnostic {
    fn error(resource: &str, message: impl fmt::Display) -> Self {
        Self {
            resource: resource.to_string(),
            severity: Severity::Error,
            message: message.to_string(),
        }
    }

    fn warning(resource: &str, message: impl fmt::Display) -> Self {
        Self {
            resource: resource.to_string(),
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ResourceDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}: {}", label, self.resource, self.message)
    }
}

/// Parsed manifest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub resources: Vec<ResourceDecl>,
}

impl Program {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse program YAML")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse program JSON")
    }

    /// Load a program file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read program {:?}", path))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let program = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("Invalid program {:?}", path))?;

        tracing::info!("Loaded {} resources from {:?}", program.resources.len(), path);
        Ok(program)
    }

    /// Collect every problem in the program without stopping at the first
    pub fn check(&self, registry: &SchemaRegistry) -> Vec<ResourceDiagnostic> {
        let declared: HashSet<&str> = self.resources.iter().map(|r| r.name.as_str()).collect();
        let mut seen = HashSet::new();
        let mut diagnostics = Vec::new();

        for decl in &self.resources {
            if !seen.insert(decl.name.as_str()) {
                diagnostics.push(ResourceDiagnostic::error(
                    &decl.name,
                    "resource name is declared more than once",
                ));
            }

            let Some(schema) = registry.get(&decl.type_id) else {
                diagnostics.push(ResourceDiagnostic::error(
                    &decl.name,
                    format!("unknown resource type '{}'", decl.type_id),
                ));
                continue;
            };

            let args = match decl.argument_bag() {
                Ok(args) => args,
                Err(e) => {
                    diagnostics.push(ResourceDiagnostic::error(&decl.name, e));
                    continue;
                }
            };

            for failure in binder::check(schema, &decl.name, &args) {
                diagnostics.push(ResourceDiagnostic::error(&decl.name, failure));
            }

            for key in args.keys() {
                if let Some(AttributeValue::Reference(target)) = args.get(key) {
                    if !declared.contains(target.resource.as_str()) {
                        diagnostics.push(ResourceDiagnostic::warning(
                            &decl.name,
                            format!("'{}' refers to undeclared resource {}", key, target),
                        ));
                    }
                }
            }
        }

        diagnostics
    }

    /// Bind every resource in declaration order and register it in `namespace`.
    ///
    /// Stops at the first failure. Descriptors registered before the failure
    /// stay in the namespace.
    pub fn bind(&self, registry: &SchemaRegistry, namespace: &mut Namespace) -> Result<()> {
        for decl in &self.resources {
            let descriptor = bind_decl(registry, decl)?;
            namespace
                .register(descriptor)
                .with_context(|| format!("Failed to register resource '{}'", decl.name))?;
        }

        for dangling in namespace.dangling_references() {
            tracing::warn!(
                "{}.{} refers to unregistered resource {}",
                dangling.resource,
                dangling.attribute,
                dangling.target
            );
        }
        Ok(())
    }
}

fn bind_decl(registry: &SchemaRegistry, decl: &ResourceDecl) -> Result<NamedResourceDescriptor> {
    let schema = registry.get(&decl.type_id).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown resource type '{}' for resource '{}'",
            decl.type_id,
            decl.name
        )
    })?;

    let args = decl
        .argument_bag()
        .with_context(|| format!("Invalid arguments for resource '{}'", decl.name))?;

    binder::bind(schema, &decl.name, &args)
        .with_context(|| format!("Failed to bind {} '{}'", decl.type_id, decl.name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = r#"
resources:
  - name: search
    type: azure:search:Service
    args:
      location: westus
      resourceGroupName: search-rg
      sku: standard
      replicaCount: 2
      tags:
        env: prod
  - name: web-rule
    type: gcp:compute:GlobalForwardingRule
    args:
      target: https://www.googleapis.com/compute/v1/projects/demo/global/targetHttpProxies/web
      selfLink: projects/demo/global/forwardingRules/web-rule
      region: us-central1
"#;

    #[test]
    fn test_forwarding_rule_manifest_binds() {
        let program = Program::from_yaml_str(
            r#"
resources:
  - name: web-rule
    type: gcp:compute:GlobalForwardingRule
    args:
      target: projects/demo/global/targetHttpProxies/web-proxy
      selfLink: projects/demo/global/forwardingRules/web-rule
"#,
        )
        .unwrap();
        let mut ns = Namespace::new();

        program.bind(SchemaRegistry::builtin(), &mut ns).unwrap();

        assert_eq!(
            ns.get("web-rule").unwrap().get("target").unwrap().value(),
            Some(&AttributeValue::from(
                "projects/demo/global/targetHttpProxies/web-proxy"
            ))
        );
    }

    #[test]
    fn test_reference_rejected_for_string_attribute() {
        let program = Program::from_yaml_str(
            r#"
resources:
  - name: web-rule
    type: gcp:compute:GlobalForwardingRule
    args:
      target: ${web-proxy.selfLink}
      selfLink: projects/demo/global/forwardingRules/web-rule
"#,
        )
        .unwrap();

        let err = program
            .bind(SchemaRegistry::builtin(), &mut Namespace::new())
            .unwrap_err();
        assert!(format!("{:#}", err).contains("must be string, but was opaque-reference"));
    }

    #[test]
    fn test_parse_yaml() {
        let program = Program::from_yaml_str(PROGRAM).unwrap();
        assert_eq!(program.resources.len(), 2);
        assert_eq!(program.resources[1].type_id, "gcp:compute:GlobalForwardingRule");
    }

    #[test]
    fn test_check_clean_program() {
        let program = Program::from_yaml_str(PROGRAM).unwrap();
        assert!(program.check(SchemaRegistry::builtin()).is_empty());
    }

    #[test]
    fn test_bind_registers_in_order() {
        let program = Program::from_yaml_str(PROGRAM).unwrap();
        let mut ns = Namespace::new();

        program.bind(SchemaRegistry::builtin(), &mut ns).unwrap();

        let names: Vec<_> = ns.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["search", "web-rule"]);
        assert_eq!(
            ns.get("search").unwrap().get("replicaCount").unwrap().value(),
            Some(&AttributeValue::Number(2.0))
        );
        assert!(!ns.get("search").unwrap().get("partitionCount").unwrap().is_set());
    }

    #[test]
    fn test_check_collects_all_problems() {
        let program = Program::from_yaml_str(
            r#"
resources:
  - name: rule
    type: gcp:compute:GlobalForwardingRule
    args:
      target: ${proxy.selfLink}
      unsupported: z
  - name: rule
    type: gcp:compute:Missing
  - name: broken
    type: azure:search:Service
    args:
      location: [westus]
"#,
        )
        .unwrap();

        let diagnostics = program.check(SchemaRegistry::builtin());
        let messages: Vec<_> = diagnostics.iter().map(|d| d.to_string()).collect();

        assert_eq!(
            messages,
            vec![
                "error: rule: Property argument 'selfLink' is required by gcp:compute:GlobalForwardingRule, but was missing",
                "error: rule: Property argument 'target' must be string, but was opaque-reference",
                "error: rule: Property argument 'unsupported' is not defined by gcp:compute:GlobalForwardingRule",
                "warning: rule: 'target' refers to undeclared resource ${proxy.selfLink}",
                "error: rule: resource name is declared more than once",
                "error: rule: unknown resource type 'gcp:compute:Missing'",
                "error: broken: Argument 'location' has unsupported value: array",
            ]
        );
        assert_eq!(diagnostics.iter().filter(|d| !d.is_error()).count(), 1);
    }

    #[test]
    fn test_bind_stops_at_first_failure() {
        let program = Program::from_yaml_str(
            r#"
resources:
  - name: ok
    type: gcp:compute:GlobalForwardingRule
    args: { target: a, selfLink: b }
  - name: bad
    type: gcp:compute:GlobalForwardingRule
    args: { target: a }
  - name: never
    type: gcp:compute:GlobalForwardingRule
    args: { target: a, selfLink: b }
"#,
        )
        .unwrap();
        let mut ns = Namespace::new();

        let err = program.bind(SchemaRegistry::builtin(), &mut ns).unwrap_err();

        assert!(err.to_string().contains("'bad'"));
        assert!(ns.contains("ok"));
        assert!(!ns.contains("never"));
    }

    #[test]
    fn test_empty_args_treated_as_empty_bag() {
        let program = Program::from_yaml_str(
            "resources:\n  - name: r\n    type: gcp:compute:GlobalForwardingRule\n    args:\n",
        )
        .unwrap();

        let diagnostics = program.check(SchemaRegistry::builtin());
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(ResourceDiagnostic::is_error));
    }
}
