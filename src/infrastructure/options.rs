use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::error::{ImportError, ImportResult};
use crate::traits::FileSystem;

/// Default output layout, relative to the output root
pub const DEFAULT_PATH_PATTERN: &str = "{output}/{provider}/{service}/";

/// Default output root
pub const DEFAULT_PATH_OUTPUT: &str = "generated";

/// Bucket URI schemes the state writer knows a backend for
const BUCKET_SCHEMES: &[&str] = &["gs", "s3"];

/// Where generated state is meant to live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    #[default]
    Local,
    Bucket,
}

/// Options driving one import command
///
/// Loaded from an optional YAML config file and overridden by command line
/// flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImportOptions {
    /// Regions to import, in order
    pub regions: Vec<String>,
    /// Services to import (empty = all supported)
    pub resources: Vec<String>,
    /// Raw filter expressions
    pub filters: Vec<String>,
    /// Output path template with {output}, {provider} and {service} tokens
    pub path_pattern: String,
    /// Output root substituted for {output}
    pub path_output: String,
    pub state: StateBackend,
    /// Destination URI when state is kept in a bucket (e.g., gs://tf-state)
    pub bucket: Option<String>,
    /// Whether resources are refreshed against the provider
    pub connect: bool,
    pub verbose: bool,
    /// Provider schema document used to compute ignore keys
    pub schema_file: Option<PathBuf>,
    /// Inventory file or directory read by the inventory provider
    pub inventory: Option<PathBuf>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            resources: Vec::new(),
            filters: Vec::new(),
            path_pattern: DEFAULT_PATH_PATTERN.to_string(),
            path_output: DEFAULT_PATH_OUTPUT.to_string(),
            state: StateBackend::Local,
            bucket: None,
            connect: true,
            verbose: false,
            schema_file: None,
            inventory: None,
        }
    }
}

impl ImportOptions {
    /// Load options from a YAML config file
    pub fn from_file(fs: &dyn FileSystem, path: &Path) -> ImportResult<Self> {
        let content = fs
            .read_to_string(path)
            .map_err(|e| ImportError::ConfigParse(format!("{:#}", e)))?;
        let options: ImportOptions = serde_yaml::from_str(&content)?;
        Ok(options)
    }

    /// Check the options are complete and consistent
    pub fn validate(&self) -> ImportResult<()> {
        if self.regions.is_empty() {
            return Err(ImportError::InvalidInput(
                "at least one region is required (--regions)".to_string(),
            ));
        }

        if let Some(region) = self.regions.iter().find(|r| r.trim().is_empty()) {
            return Err(ImportError::InvalidInput(format!(
                "invalid region name '{}'",
                region
            )));
        }

        if self.state == StateBackend::Bucket {
            let bucket = self.bucket.as_deref().unwrap_or_default();
            bucket_url(bucket)?;
        }

        Ok(())
    }

    /// Options for one region: the path template gains a `<region>/` suffix
    pub fn for_region(&self, region: &str) -> Self {
        let mut options = self.clone();
        options.path_pattern = format!("{}{}/", self.path_pattern, region);
        options
    }

    /// Resolve the path template for one provider service
    pub fn output_dir(&self, provider: &str, service: &str) -> PathBuf {
        PathBuf::from(
            self.path_pattern
                .replace("{output}", &self.path_output)
                .replace("{provider}", provider)
                .replace("{service}", service),
        )
    }

    /// Arguments handed to a provider for one region
    pub fn provider_args(&self, region: &str) -> HashMap<String, Value> {
        let mut args = HashMap::new();
        args.insert("region".to_string(), Value::String(region.to_string()));
        if let Some(inventory) = &self.inventory {
            args.insert(
                "inventory".to_string(),
                Value::String(inventory.display().to_string()),
            );
        }
        args
    }
}

/// Parse and check a state bucket URI
pub fn bucket_url(bucket: &str) -> ImportResult<url::Url> {
    if bucket.is_empty() {
        return Err(ImportError::InvalidInput(
            "--bucket is required when --state is bucket".to_string(),
        ));
    }

    let url = url::Url::parse(bucket)
        .map_err(|e| ImportError::InvalidInput(format!("invalid bucket '{}': {}", bucket, e)))?;

    if !BUCKET_SCHEMES.contains(&url.scheme()) || url.host_str().is_none() {
        return Err(ImportError::InvalidInput(format!(
            "invalid bucket '{}', expected gs://<bucket> or s3://<bucket>",
            bucket
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockFileSystem;

    fn options(regions: &[&str]) -> ImportOptions {
        ImportOptions {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            ..ImportOptions::default()
        }
    }

    #[test]
    fn test_defaults() {
        let options = ImportOptions::default();
        assert!(options.connect);
        assert_eq!(options.state, StateBackend::Local);
        assert_eq!(options.path_pattern, DEFAULT_PATH_PATTERN);
        assert_eq!(options.path_output, DEFAULT_PATH_OUTPUT);
    }

    #[test]
    fn test_validate_requires_regions() {
        assert!(options(&[]).validate().is_err());
        assert!(options(&[" "]).validate().is_err());
        assert!(options(&["us-east-1"]).validate().is_ok());
    }

    #[test]
    fn test_validate_bucket_backend() {
        let mut opts = options(&["us-east-1"]);
        opts.state = StateBackend::Bucket;
        assert!(opts.validate().is_err());

        opts.bucket = Some("not a url".to_string());
        assert!(opts.validate().is_err());

        opts.bucket = Some("ftp://host/state".to_string());
        assert!(opts.validate().is_err());

        opts.bucket = Some("gs://terraform-state".to_string());
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_for_region_appends_to_template() {
        let mut opts = options(&["us-east-1"]);
        opts.path_pattern = "out/".to_string();

        let regional = opts.for_region("eu-west-1");

        assert_eq!(regional.path_pattern, "out/eu-west-1/");
        assert_eq!(opts.path_pattern, "out/");
    }

    #[test]
    fn test_output_dir_substitutes_tokens() {
        let opts = options(&["us-east-1"]).for_region("us-east-1");

        assert_eq!(
            opts.output_dir("aws", "vpc"),
            PathBuf::from("generated/aws/vpc/us-east-1/")
        );
    }

    #[test]
    fn test_provider_args() {
        let mut opts = options(&["us-east-1"]);
        opts.inventory = Some(PathBuf::from("inventory.yaml"));

        let args = opts.provider_args("us-east-1");

        assert_eq!(args["region"], Value::String("us-east-1".to_string()));
        assert_eq!(args["inventory"], Value::String("inventory.yaml".to_string()));
    }

    #[test]
    fn test_from_file() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/home/user/.iacgen/config.yaml");
        fs.write(
            &path,
            "regions: [us-east-1, eu-west-1]\nstate: bucket\nbucket: gs://tf-state\nconnect: false\npath-output: out\n",
        )
        .unwrap();

        let opts = ImportOptions::from_file(&fs, &path).unwrap();

        assert_eq!(opts.regions, vec!["us-east-1", "eu-west-1"]);
        assert_eq!(opts.state, StateBackend::Bucket);
        assert_eq!(opts.bucket.as_deref(), Some("gs://tf-state"));
        assert!(!opts.connect);
        assert_eq!(opts.path_output, "out");
        assert_eq!(opts.path_pattern, DEFAULT_PATH_PATTERN);
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let fs = MockFileSystem::new();
        let path = PathBuf::from("/config.yaml");
        fs.write(&path, "regions: {unclosed").unwrap();

        let result = ImportOptions::from_file(&fs, &path);

        assert!(matches!(result, Err(ImportError::ConfigParse(_))));
    }
}
