//! Emission of generated configuration and state
//!
//! Every service is written to its own directory as Terraform JSON syntax:
//!
//! - `resources.tf.json` with one resource block per imported resource
//! - `provider.tf.json` with one provider block per provider of the resources and,
//!   for bucket state, the backend
//! - `terraform.tfstate` (format version 4) holding the full attributes
//!
//! Configuration leaves out the attribute paths matched by a resource's ignore
//! keys, empty values that no `allow_empty_values` pattern keeps, and the
//! top-level `id`. State keeps everything.

use regex::Regex;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

use super::attribute::{is_empty_value, retain_paths};
use super::error::{ImportError, ImportResult};
use super::resource::Resource;
use crate::traits::FileSystem;

pub const RESOURCES_FILE: &str = "resources.tf.json";
pub const PROVIDER_FILE: &str = "provider.tf.json";
pub const STATE_FILE: &str = "terraform.tfstate";

const STATE_FORMAT_VERSION: u64 = 4;
const TERRAFORM_VERSION: &str = "1.5.7";

/// Where one service's output goes
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTarget {
    pub provider: String,
    pub service: String,
    pub region: String,
    pub directory: PathBuf,
}

/// Persists the resources of one service
pub trait ResourceWriter {
    /// Write the resources and return the paths of the files produced
    fn write(&self, target: &OutputTarget, resources: &[Resource]) -> ImportResult<Vec<PathBuf>>;
}

/// Writer producing Terraform JSON configuration and a local state file
pub struct TerraformJsonWriter<'a> {
    fs: &'a dyn FileSystem,
    bucket: Option<url::Url>,
}

impl<'a> TerraformJsonWriter<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs, bucket: None }
    }

    /// Point the generated backend block at a remote bucket
    pub fn with_bucket(mut self, bucket: url::Url) -> Self {
        self.bucket = Some(bucket);
        self
    }

    fn write_json(&self, path: &Path, document: &Value) -> ImportResult<()> {
        let content = serde_json::to_string_pretty(document)?;
        self.fs
            .write(path, &format!("{}\n", content))
            .map_err(|e| ImportError::Write(format!("{:#}", e)))
    }

    fn provider_document(&self, target: &OutputTarget, resources: &[Resource]) -> Value {
        let mut document = Map::new();
        document.insert(
            "//".to_string(),
            Value::String(format!(
                "Generated by iacgen on {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            )),
        );

        let mut providers = Map::new();
        for resource in resources {
            if !resource.provider.is_empty() {
                providers.insert(resource.provider.clone(), json!({ "region": target.region }));
            }
        }
        if !providers.is_empty() {
            document.insert("provider".to_string(), Value::Object(providers));
        }

        if let Some(backend) = self.backend_block(target) {
            document.insert("terraform".to_string(), json!({ "backend": backend }));
        }

        Value::Object(document)
    }

    fn backend_block(&self, target: &OutputTarget) -> Option<Value> {
        let bucket = self.bucket.as_ref()?;
        let name = bucket.host_str()?;

        let mut prefix: Vec<&str> = bucket
            .path()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        prefix.extend([
            target.provider.as_str(),
            target.service.as_str(),
            target.region.as_str(),
        ]);
        let prefix = prefix.join("/");

        match bucket.scheme() {
            "gs" => Some(json!({ "gcs": { "bucket": name, "prefix": prefix } })),
            "s3" => Some(json!({
                "s3": {
                    "bucket": name,
                    "key": format!("{}/{}", prefix, STATE_FILE),
                    "region": target.region,
                }
            })),
            _ => None,
        }
    }
}

impl ResourceWriter for TerraformJsonWriter<'_> {
    fn write(&self, target: &OutputTarget, resources: &[Resource]) -> ImportResult<Vec<PathBuf>> {
        self.fs
            .create_dir_all(&target.directory)
            .map_err(|e| ImportError::Write(format!("{:#}", e)))?;

        let resources_path = target.directory.join(RESOURCES_FILE);
        self.write_json(&resources_path, &configuration_document(resources)?)?;

        let provider_path = target.directory.join(PROVIDER_FILE);
        self.write_json(&provider_path, &self.provider_document(target, resources))?;

        let state_path = target.directory.join(STATE_FILE);
        self.write_json(&state_path, &state_document(resources))?;

        Ok(vec![resources_path, provider_path, state_path])
    }
}

/// Build the `resource` document for a set of resources
///
/// Every resource must have its own `type.name` address.
pub fn configuration_document(resources: &[Resource]) -> ImportResult<Value> {
    let mut by_type: Map<String, Value> = Map::new();

    for resource in resources {
        let config = resource_configuration(resource)?;
        let blocks = by_type
            .entry(resource.resource_type.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(blocks) = blocks {
            if blocks.contains_key(&resource.resource_name) {
                return Err(ImportError::Write(format!(
                    "duplicate resource address {}",
                    resource.address()
                )));
            }
            blocks.insert(resource.resource_name.clone(), config);
        }
    }

    Ok(json!({ "resource": by_type }))
}

/// Configuration body of one resource
pub fn resource_configuration(resource: &Resource) -> ImportResult<Value> {
    let ignored = compile_patterns(&resource.ignore_keys)?;
    let allowed_empty = compile_patterns(&resource.allow_empty_values)?;

    let mut config = match &resource.attributes {
        Value::Object(map) => Value::Object(map.clone()),
        _ => Value::Object(Map::new()),
    };

    if let Value::Object(map) = &mut config {
        map.remove("id");
    }

    retain_paths(&mut config, &|path: &str, value: &Value| {
        if ignored.iter().any(|re| re.is_match(path)) {
            return false;
        }
        !is_empty_value(value) || allowed_empty.iter().any(|re| re.is_match(path))
    });

    if let Value::Object(map) = &mut config {
        for (key, value) in &resource.additional_fields {
            map.insert(key.clone(), value.clone());
        }
    }

    Ok(config)
}

/// Build a version 4 state document holding the full attributes
pub fn state_document(resources: &[Resource]) -> Value {
    let entries: Vec<Value> = resources
        .iter()
        .map(|resource| {
            let mut attributes = match &resource.attributes {
                Value::Object(map) => map.clone(),
                _ => Map::new(),
            };
            attributes
                .entry("id".to_string())
                .or_insert_with(|| Value::String(resource.id.clone()));

            json!({
                "mode": "managed",
                "type": resource.resource_type,
                "name": resource.resource_name,
                "provider": format!(
                    "provider[\"registry.terraform.io/hashicorp/{}\"]",
                    resource.provider
                ),
                "instances": [{
                    "schema_version": 0,
                    "attributes": attributes,
                }],
            })
        })
        .collect();

    json!({
        "version": STATE_FORMAT_VERSION,
        "terraform_version": TERRAFORM_VERSION,
        "serial": 1,
        "lineage": uuid::Uuid::new_v4().to_string(),
        "outputs": {},
        "resources": entries,
    })
}

fn compile_patterns(patterns: &[String]) -> ImportResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                ImportError::InvalidInput(format!("invalid attribute pattern '{}': {}", pattern, e))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    fn instance() -> Resource {
        Resource::new("aws", "aws_instance", "i-1")
            .with_name("web")
            .with_attributes(json!({
                "id": "i-1",
                "arn": "arn:aws:ec2:us-east-1:1:instance/i-1",
                "instance_type": "t3.micro",
                "user_data": "",
                "tags": {},
                "ebs_block_device": [
                    { "device_name": "/dev/sdb", "volume_id": "vol-1" }
                ]
            }))
    }

    fn target() -> OutputTarget {
        OutputTarget {
            provider: "aws".to_string(),
            service: "instance".to_string(),
            region: "us-east-1".to_string(),
            directory: PathBuf::from("/out/aws/instance/us-east-1"),
        }
    }

    #[test]
    fn test_configuration_omits_ignored_and_empty() {
        let mut resource = instance();
        resource.ignore_keys = vec![
            "^arn$".to_string(),
            r"^ebs_block_device\.[0-9]+\.volume_id$".to_string(),
        ];

        let config = resource_configuration(&resource).unwrap();

        assert_eq!(
            config,
            json!({
                "instance_type": "t3.micro",
                "ebs_block_device": [{ "device_name": "/dev/sdb" }]
            })
        );
    }

    #[test]
    fn test_allow_empty_values_keeps_matches() {
        let resource = instance().with_allow_empty_value("^user_data$");

        let config = resource_configuration(&resource).unwrap();

        assert_eq!(config["user_data"], json!(""));
        assert!(config.get("tags").is_none());
    }

    #[test]
    fn test_additional_fields_are_merged() {
        let resource = instance().with_additional_field("lifecycle", json!({ "prevent_destroy": true }));

        let config = resource_configuration(&resource).unwrap();

        assert_eq!(config["lifecycle"]["prevent_destroy"], json!(true));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut resource = instance();
        resource.ignore_keys = vec!["^(unclosed$".to_string()];

        assert!(matches!(
            resource_configuration(&resource),
            Err(ImportError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_duplicate_address_is_rejected() {
        let other = Resource::new("aws", "aws_instance", "i-2").with_name("web");

        let err = configuration_document(&[instance(), other]).unwrap_err();

        match err {
            ImportError::Write(message) => assert!(message.contains("aws_instance.web")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_state_keeps_full_attributes() {
        let mut resource = instance();
        resource.ignore_keys = vec!["^arn$".to_string()];

        let state = state_document(&[resource]);

        assert_eq!(state["version"], json!(4));
        assert!(uuid::Uuid::parse_str(state["lineage"].as_str().unwrap()).is_ok());
        let entry = &state["resources"][0];
        assert_eq!(entry["type"], json!("aws_instance"));
        assert_eq!(entry["name"], json!("web"));
        assert_eq!(
            entry["provider"],
            json!("provider[\"registry.terraform.io/hashicorp/aws\"]")
        );
        let attributes = &entry["instances"][0]["attributes"];
        assert_eq!(attributes["arn"], json!("arn:aws:ec2:us-east-1:1:instance/i-1"));
        assert_eq!(attributes["id"], json!("i-1"));
    }

    #[test]
    fn test_write_produces_three_files() {
        let fs = MockFileSystem::new();
        let writer = TerraformJsonWriter::new(&fs);

        let written = writer.write(&target(), &[instance()]).unwrap();

        assert_eq!(written.len(), 3);
        let config = fs
            .get_file_contents(&PathBuf::from("/out/aws/instance/us-east-1/resources.tf.json"))
            .unwrap();
        let config: Value = serde_json::from_str(&config).unwrap();
        assert_eq!(
            config["resource"]["aws_instance"]["web"]["instance_type"],
            json!("t3.micro")
        );

        let provider = fs
            .get_file_contents(&PathBuf::from("/out/aws/instance/us-east-1/provider.tf.json"))
            .unwrap();
        let provider: Value = serde_json::from_str(&provider).unwrap();
        assert_eq!(provider["provider"]["aws"]["region"], json!("us-east-1"));
        assert!(provider.get("terraform").is_none());
        assert!(fs.has_file(&PathBuf::from("/out/aws/instance/us-east-1/terraform.tfstate")));
    }

    #[test]
    fn test_bucket_backend_block() {
        let fs = MockFileSystem::new();
        let bucket = url::Url::parse("gs://tf-state/imports").unwrap();
        let writer = TerraformJsonWriter::new(&fs).with_bucket(bucket);

        writer.write(&target(), &[]).unwrap();

        let provider = fs
            .get_file_contents(&PathBuf::from("/out/aws/instance/us-east-1/provider.tf.json"))
            .unwrap();
        let provider: Value = serde_json::from_str(&provider).unwrap();
        assert_eq!(
            provider["terraform"]["backend"]["gcs"],
            json!({ "bucket": "tf-state", "prefix": "imports/aws/instance/us-east-1" })
        );
    }
}
