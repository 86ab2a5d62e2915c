//! Ignore-key reconciliation
//!
//! Provider APIs report attributes the IaC schema marks as computed-only.
//! Emitting them produces invalid configuration or perpetual diffs, so every
//! resource is annotated with anchored patterns of attribute paths the writer
//! must leave out. Lookups are batched: one request carries every distinct
//! resource type of a service.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::error::{ImportError, ImportResult};
use super::service::Service;
use crate::traits::FileSystem;

/// Resolves the attribute patterns to omit for resource types
pub trait IgnoreKeyReconciler {
    /// Ignore-key patterns for each of the given distinct resource types
    ///
    /// Types without ignore keys may be absent from the result.
    fn ignore_keys(&self, resource_types: &[String]) -> ImportResult<HashMap<String, Vec<String>>>;
}

/// Append the ignore keys of every distinct resource type to its resources
///
/// The reconciler is asked once, with each distinct type listed once in
/// first-seen order. Keys are appended, so repeated calls accumulate.
pub fn populate_ignore_keys(
    service: &mut Service,
    reconciler: &dyn IgnoreKeyReconciler,
) -> ImportResult<()> {
    let mut resource_types: Vec<String> = Vec::new();
    for resource in &service.resources {
        if !resource_types.contains(&resource.resource_type) {
            resource_types.push(resource.resource_type.clone());
        }
    }

    if resource_types.is_empty() {
        return Ok(());
    }

    let keys = reconciler.ignore_keys(&resource_types)?;

    for resource in &mut service.resources {
        if let Some(patterns) = keys.get(&resource.resource_type) {
            resource.ignore_keys.extend(patterns.iter().cloned());
        }
    }

    Ok(())
}

/// Reconciler used when no schema is available: nothing is ignored
#[derive(Debug, Default)]
pub struct NoIgnoreKeys;

impl IgnoreKeyReconciler for NoIgnoreKeys {
    fn ignore_keys(&self, _resource_types: &[String]) -> ImportResult<HashMap<String, Vec<String>>> {
        Ok(HashMap::new())
    }
}

/// Document produced by `terraform providers schema -json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSchemas {
    #[serde(default)]
    pub format_version: Option<String>,
    #[serde(default)]
    pub provider_schemas: BTreeMap<String, ProviderSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderSchema {
    #[serde(default)]
    pub resource_schemas: BTreeMap<String, ResourceSchema>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceSchema {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub block: SchemaBlock,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaBlock {
    #[serde(default)]
    pub attributes: BTreeMap<String, SchemaAttribute>,
    #[serde(default)]
    pub block_types: BTreeMap<String, NestedBlock>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchemaAttribute {
    #[serde(default)]
    pub computed: bool,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub required: bool,
}

impl SchemaAttribute {
    /// Set by the provider only, never by configuration
    pub fn is_read_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NestedBlock {
    #[serde(default)]
    pub nesting_mode: String,
    #[serde(default)]
    pub block: SchemaBlock,
}

/// Reconciler deriving ignore keys from provider schemas
///
/// Resource types are unique across providers, so the resource schemas of
/// every provider in the document are looked up together.
pub struct SchemaReconciler {
    resource_schemas: BTreeMap<String, ResourceSchema>,
}

impl SchemaReconciler {
    pub fn new(document: ProviderSchemas) -> ImportResult<Self> {
        if document.provider_schemas.is_empty() {
            return Err(ImportError::Lookup(
                "schema document contains no provider schemas".to_string(),
            ));
        }

        let resource_schemas = document
            .provider_schemas
            .into_values()
            .flat_map(|provider| provider.resource_schemas)
            .collect();

        Ok(Self { resource_schemas })
    }

    /// Load a schema document from disk
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> ImportResult<Self> {
        let content = fs
            .read_to_string(path)
            .map_err(|e| ImportError::Lookup(format!("{:#}", e)))?;
        let document: ProviderSchemas = serde_json::from_str(&content)
            .map_err(|e| ImportError::Lookup(format!("{}: {}", path.display(), e)))?;
        Self::new(document)
    }

    /// Number of resource types the schema knows about
    pub fn resource_type_count(&self) -> usize {
        self.resource_schemas.len()
    }
}

impl IgnoreKeyReconciler for SchemaReconciler {
    fn ignore_keys(&self, resource_types: &[String]) -> ImportResult<HashMap<String, Vec<String>>> {
        let mut keys = HashMap::new();
        for resource_type in resource_types {
            if let Some(schema) = self.resource_schemas.get(resource_type) {
                let mut patterns = Vec::new();
                collect_read_only(&schema.block, "", &mut patterns);
                keys.insert(resource_type.clone(), patterns);
            }
        }
        Ok(keys)
    }
}

fn collect_read_only(block: &SchemaBlock, prefix: &str, patterns: &mut Vec<String>) {
    for (name, attribute) in &block.attributes {
        if prefix.is_empty() && name == "id" {
            continue;
        }
        if attribute.is_read_only() {
            patterns.push(format!("^{}{}$", prefix, regex::escape(name)));
        }
    }

    for (name, nested) in &block.block_types {
        let element = match nested.nesting_mode.as_str() {
            "map" => r"[^.]+",
            _ => r"[0-9]+",
        };
        let nested_prefix = format!(r"{}{}\.{}\.", prefix, regex::escape(name), element);
        collect_read_only(&nested.block, &nested_prefix, patterns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::resource::Resource;
    use crate::test_helpers::RecordingReconciler;
    use crate::traits::MockFileSystem;
    use std::path::PathBuf;

    const SCHEMA: &str = r#"{
        "format_version": "1.0",
        "provider_schemas": {
            "registry.terraform.io/hashicorp/aws": {
                "resource_schemas": {
                    "aws_instance": {
                        "version": 1,
                        "block": {
                            "attributes": {
                                "id": { "type": "string", "computed": true },
                                "arn": { "type": "string", "computed": true },
                                "ami": { "type": "string", "optional": true, "computed": true },
                                "instance_type": { "type": "string", "optional": true },
                                "private_dns": { "type": "string", "computed": true }
                            },
                            "block_types": {
                                "ebs_block_device": {
                                    "nesting_mode": "set",
                                    "block": {
                                        "attributes": {
                                            "volume_id": { "type": "string", "computed": true },
                                            "device_name": { "type": "string", "required": true }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    fn mixed_service() -> Service {
        let mut service = Service::new("mixed", "aws");
        service.resources = vec![
            Resource::new("aws", "aws_instance", "i-1"),
            Resource::new("aws", "aws_vpc", "vpc-1"),
            Resource::new("aws", "aws_instance", "i-2"),
            Resource::new("aws", "aws_vpc", "vpc-2"),
            Resource::new("aws", "aws_instance", "i-3"),
        ];
        service
    }

    #[test]
    fn test_one_lookup_per_distinct_type() {
        let mut service = mixed_service();
        let reconciler = RecordingReconciler::with_keys(&[
            ("aws_instance", &["^arn$"]),
            ("aws_vpc", &["^owner_id$"]),
        ]);

        populate_ignore_keys(&mut service, &reconciler).unwrap();

        assert_eq!(
            reconciler.calls(),
            vec![vec!["aws_instance".to_string(), "aws_vpc".to_string()]]
        );
        assert_eq!(service.resources[0].ignore_keys, vec!["^arn$"]);
        assert_eq!(service.resources[1].ignore_keys, vec!["^owner_id$"]);
        assert_eq!(service.resources[4].ignore_keys, vec!["^arn$"]);
    }

    #[test]
    fn test_empty_service_skips_lookup() {
        let mut service = Service::new("empty", "aws");
        let reconciler = RecordingReconciler::default();

        populate_ignore_keys(&mut service, &reconciler).unwrap();

        assert!(reconciler.calls().is_empty());
    }

    #[test]
    fn test_lookup_failure_propagates() {
        let mut service = mixed_service();
        let reconciler = RecordingReconciler::failing("plugin crashed");

        let err = populate_ignore_keys(&mut service, &reconciler).unwrap_err();

        assert!(matches!(err, ImportError::Lookup(_)));
        assert!(service.resources.iter().all(|r| r.ignore_keys.is_empty()));
    }

    #[test]
    fn test_schema_reconciler_read_only_attributes() {
        let document: ProviderSchemas = serde_json::from_str(SCHEMA).unwrap();
        let reconciler = SchemaReconciler::new(document).unwrap();

        let keys = reconciler
            .ignore_keys(&["aws_instance".to_string(), "aws_vpc".to_string()])
            .unwrap();

        assert_eq!(
            keys.get("aws_instance").unwrap(),
            &vec![
                "^arn$".to_string(),
                "^private_dns$".to_string(),
                r"^ebs_block_device\.[0-9]+\.volume_id$".to_string(),
            ]
        );
        assert!(!keys.contains_key("aws_vpc"));
    }

    #[test]
    fn test_schema_reconciler_rejects_empty_document() {
        let document: ProviderSchemas =
            serde_json::from_str(r#"{ "format_version": "1.0" }"#).unwrap();
        let result = SchemaReconciler::new(document);

        assert!(matches!(result, Err(ImportError::Lookup(_))));
    }

    #[test]
    fn test_schema_reconciler_from_file() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/schemas/aws.json");
        fs.write(&path, SCHEMA).unwrap();

        let reconciler = SchemaReconciler::from_file(&fs, &path).unwrap();
        assert_eq!(reconciler.resource_type_count(), 1);

        let missing = SchemaReconciler::from_file(&fs, Path::new("/nope.json"));
        assert!(matches!(missing, Err(ImportError::Lookup(_))));
    }
}
