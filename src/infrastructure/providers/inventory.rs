//! Inventory provider
//!
//! Imports resources listed in an inventory export instead of calling a cloud
//! API. An inventory is a YAML or JSON document (or a directory of them):
//!
//! ```yaml
//! schema_version: "1.0"
//! resources:
//!   - type: aws_instance
//!     id: i-0abc123
//!     name: web
//!     region: us-east-1
//!     tags:
//!       env: prod
//!     attributes:
//!       instance_type: t3.micro
//! ```
//!
//! Every distinct resource type is one service. Entries without a region are
//! global and imported in every region.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::infrastructure::error::{ImportError, ImportResult};
use crate::infrastructure::filter::{parse_filter_expression, ResourceFilter};
use crate::infrastructure::provider::ProviderGenerator;
use crate::infrastructure::resource::Resource;
use crate::infrastructure::service::{Service, ServiceGenerator};
use crate::traits::FileSystem;

pub const PROVIDER_NAME: &str = "inventory";

/// Major schema version this reader understands
const SUPPORTED_SCHEMA_MAJOR: u32 = 1;

/// Root of an inventory export
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryDocument {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub resources: Vec<InventoryEntry>,
}

/// One resource listed in an inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    /// IaC resource type (e.g., aws_instance)
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Attribute path patterns whose empty values are kept
    #[serde(default)]
    pub allow_empty_values: Vec<String>,
    /// Extra top-level values for the generated block (e.g., lifecycle)
    #[serde(default)]
    pub additional_fields: Map<String, Value>,
}

impl InventoryEntry {
    /// Provider prefix of the resource type (aws_instance -> aws)
    pub fn provider(&self) -> &str {
        self.resource_type
            .split_once('_')
            .map(|(provider, _)| provider)
            .unwrap_or(&self.resource_type)
    }

    /// Whether the entry belongs to `region` (global entries belong everywhere)
    pub fn in_region(&self, region: &str) -> bool {
        self.region.as_deref().is_none_or(|r| r == region)
    }

    pub fn to_resource(&self) -> Resource {
        let mut resource = Resource::new(self.provider(), &self.resource_type, &self.id)
            .with_attributes(Value::Object(self.attributes.clone()));

        if !self.tags.is_empty() && !self.attributes.contains_key("tags") {
            let tags = self
                .tags
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            resource = resource.with_attribute("tags", Value::Object(tags));
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            resource = resource.with_name(name);
        }
        for pattern in &self.allow_empty_values {
            resource = resource.with_allow_empty_value(pattern.clone());
        }
        for (key, value) in &self.additional_fields {
            resource = resource.with_additional_field(key.clone(), value.clone());
        }
        resource
    }
}

fn parse_major(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.parse().ok()
}

/// Parse one inventory document, choosing the format from the extension
pub fn parse_inventory(path: &Path, content: &str) -> ImportResult<InventoryDocument> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let document: InventoryDocument = if is_json {
        serde_json::from_str(content)
            .map_err(|e| ImportError::InvalidInput(format!("{}: {}", path.display(), e)))?
    } else {
        serde_yaml::from_str(content)
            .map_err(|e| ImportError::InvalidInput(format!("{}: {}", path.display(), e)))?
    };

    if let Some(version) = document.schema_version.as_deref() {
        match parse_major(version) {
            Some(SUPPORTED_SCHEMA_MAJOR) => {}
            _ => {
                return Err(ImportError::InvalidInput(format!(
                    "{}: unsupported inventory schema version '{}'",
                    path.display(),
                    version
                )));
            }
        }
    }

    Ok(document)
}

fn is_inventory_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml") | Some("json")
    )
}

/// Load an inventory file, or every inventory file directly inside a directory
pub fn load_inventory(fs: &dyn FileSystem, path: &Path) -> ImportResult<InventoryDocument> {
    let files: Vec<PathBuf> = if fs.is_dir(path) {
        let mut files: Vec<PathBuf> = fs
            .walk_dir(path, 1)
            .map_err(|e| ImportError::InvalidInput(format!("{:#}", e)))?
            .into_iter()
            .filter(|p| fs.is_file(p) && is_inventory_file(p))
            .collect();
        files.sort();
        files
    } else if fs.exists(path) {
        vec![path.to_path_buf()]
    } else {
        return Err(ImportError::InvalidInput(format!(
            "inventory not found: {}",
            path.display()
        )));
    };

    let mut merged = InventoryDocument::default();
    for file in files {
        let content = fs
            .read_to_string(&file)
            .map_err(|e| ImportError::InvalidInput(format!("{:#}", e)))?;
        let document = parse_inventory(&file, &content)?;
        if merged.schema_version.is_none() {
            merged.schema_version = document.schema_version;
        }
        merged.resources.extend(document.resources);
    }

    Ok(merged)
}

/// Provider backed by an inventory export
pub struct InventoryProvider {
    fs: Arc<dyn FileSystem>,
    region: String,
    inventory: Option<PathBuf>,
    entries: Vec<InventoryEntry>,
}

impl InventoryProvider {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            region: String::new(),
            inventory: None,
            entries: Vec::new(),
        }
    }
}

impl ProviderGenerator for InventoryProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn init(&mut self, region: &str, args: &HashMap<String, Value>) -> ImportResult<()> {
        let inventory = args
            .get("inventory")
            .and_then(|v| v.as_str())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                ImportError::InvalidInput(
                    "the inventory provider requires --inventory <file-or-dir>".to_string(),
                )
            })?;

        let document = load_inventory(self.fs.as_ref(), &inventory)?;

        self.region = region.to_string();
        self.entries = document
            .resources
            .into_iter()
            .filter(|entry| entry.in_region(region))
            .collect();
        self.inventory = Some(inventory);
        Ok(())
    }

    fn supported_services(&self) -> Vec<String> {
        let mut services: Vec<String> = self
            .entries
            .iter()
            .map(|entry| entry.resource_type.clone())
            .collect();
        services.sort();
        services.dedup();
        services
    }

    fn new_service(&self, service_name: &str) -> Option<Box<dyn ServiceGenerator>> {
        let entries: Vec<InventoryEntry> = self
            .entries
            .iter()
            .filter(|entry| entry.resource_type == service_name)
            .cloned()
            .collect();
        if entries.is_empty() {
            return None;
        }
        Some(Box::new(InventoryService::new(entries)))
    }

    fn service_args(&self) -> HashMap<String, Value> {
        let mut args = HashMap::new();
        args.insert("region".to_string(), Value::String(self.region.clone()));
        if let Some(inventory) = &self.inventory {
            args.insert(
                "inventory".to_string(),
                Value::String(inventory.display().to_string()),
            );
        }
        args
    }
}

/// Service generator for one resource type of an inventory
pub struct InventoryService {
    service: Service,
    entries: Vec<InventoryEntry>,
}

impl InventoryService {
    pub fn new(entries: Vec<InventoryEntry>) -> Self {
        Self {
            service: Service::default(),
            entries,
        }
    }
}

impl ServiceGenerator for InventoryService {
    fn service(&self) -> &Service {
        &self.service
    }

    fn service_mut(&mut self) -> &mut Service {
        &mut self.service
    }

    fn init_resources(&mut self) -> ImportResult<()> {
        let region = self.service.arg_str("region").unwrap_or_default().to_string();
        self.service.resources = self
            .entries
            .iter()
            .filter(|entry| region.is_empty() || entry.in_region(&region))
            .map(InventoryEntry::to_resource)
            .collect();
        Ok(())
    }

    fn parse_filter(&self, raw_filter: &str) -> ImportResult<Vec<ResourceFilter>> {
        parse_filter_expression(raw_filter)
    }

    /// Reject entries without an ID and make resource names unique
    fn post_convert_hook(&mut self) -> ImportResult<()> {
        let mut used: HashSet<String> = HashSet::new();

        for resource in &mut self.service.resources {
            if resource.id.trim().is_empty() {
                return Err(ImportError::Conversion {
                    service: self.service.name.clone(),
                    message: format!("{} entry has an empty id", resource.resource_type),
                });
            }

            let mut name = resource.resource_name.clone();
            let mut suffix = 2;
            while used.contains(&name) {
                name = format!("{}_{}", resource.resource_name, suffix);
                suffix += 1;
            }
            used.insert(name.clone());
            resource.resource_name = name;
        }

        Ok(())
    }
}
