use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::attribute;

/// A discovered infrastructure resource on its way to IaC configuration
///
/// Created once by a service's `init_resources`, mutated by the filtering
/// and annotation steps, then handed read-only to a writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// The IaC resource type (e.g., aws_instance)
    #[serde(rename = "type")]
    pub resource_type: String,
    /// The provider-specific resource ID (e.g., i-0abc123)
    pub id: String,
    /// Name of the provider the resource was discovered through (e.g., aws)
    pub provider: String,
    /// Sanitized identifier used as the resource name in generated config
    pub resource_name: String,
    /// Attribute tree as reported by the provider
    #[serde(default)]
    pub attributes: Value,
    /// Anchored patterns of attribute paths to omit when emitting
    #[serde(default)]
    pub ignore_keys: Vec<String>,
    /// Patterns of attribute paths whose empty values are still emitted
    #[serde(default)]
    pub allow_empty_values: Vec<String>,
    /// Extra top-level values merged into the emitted resource block
    #[serde(default)]
    pub additional_fields: Map<String, Value>,
}

impl Resource {
    /// Create a new resource with an empty attribute tree
    pub fn new(
        provider: impl Into<String>,
        resource_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            resource_type: resource_type.into(),
            resource_name: sanitize_resource_name(&id),
            provider: provider.into(),
            id,
            attributes: Value::Object(Map::new()),
            ignore_keys: Vec::new(),
            allow_empty_values: Vec::new(),
            additional_fields: Map::new(),
        }
    }

    /// Set the human readable name, used to derive the resource name
    pub fn with_name(mut self, name: &str) -> Self {
        self.resource_name = sanitize_resource_name(name);
        self
    }

    /// Replace the attribute tree
    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set a single top-level attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        if !self.attributes.is_object() {
            self.attributes = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.attributes {
            map.insert(key.into(), value);
        }
        self
    }

    /// Allow empty values for attribute paths matching the pattern
    pub fn with_allow_empty_value(mut self, pattern: impl Into<String>) -> Self {
        self.allow_empty_values.push(pattern.into());
        self
    }

    /// Add a top-level field to the emitted block
    pub fn with_additional_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.additional_fields.insert(key.into(), value);
        self
    }

    /// Resource type without the provider prefix (aws_instance -> instance)
    pub fn service_name(&self) -> &str {
        self.resource_type
            .strip_prefix(&self.provider)
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(&self.resource_type)
    }

    /// Values reachable through a dotted attribute path
    ///
    /// The `id` path falls back to the resource ID when the provider did not
    /// report an `id` attribute.
    pub fn values_at(&self, path: &str) -> Vec<String> {
        let values = attribute::walk_and_get(path, &self.attributes);
        if values.is_empty() && path == "id" {
            return vec![self.id.clone()];
        }
        values
    }

    /// IaC address of the resource (type.name)
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.resource_name)
    }
}

/// Sanitize a string to be a valid IaC resource name
pub fn sanitize_resource_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();

    let sanitized = sanitized.trim_matches('_').to_string();

    match sanitized.chars().next() {
        None => "resource".to_string(),
        Some(first) if first.is_ascii_digit() => format!("r_{}", sanitized),
        Some(_) => sanitized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_builder() {
        let resource = Resource::new("aws", "aws_instance", "i-0abc")
            .with_name("web server")
            .with_attribute("instance_type", json!("t3.micro"))
            .with_additional_field("lifecycle", json!({ "prevent_destroy": true }));

        assert_eq!(resource.resource_type, "aws_instance");
        assert_eq!(resource.id, "i-0abc");
        assert_eq!(resource.resource_name, "web_server");
        assert_eq!(resource.attributes["instance_type"], json!("t3.micro"));
        assert_eq!(resource.address(), "aws_instance.web_server");
        assert!(resource.ignore_keys.is_empty());
    }

    #[test]
    fn test_service_name_strips_provider_prefix() {
        let resource = Resource::new("aws", "aws_security_group", "sg-1");
        assert_eq!(resource.service_name(), "security_group");

        let foreign = Resource::new("aws", "google_compute_instance", "x");
        assert_eq!(foreign.service_name(), "google_compute_instance");
    }

    #[test]
    fn test_id_path_falls_back_to_resource_id() {
        let resource = Resource::new("aws", "aws_instance", "i-1");
        assert_eq!(resource.values_at("id"), vec!["i-1"]);

        let reported = resource.with_attribute("id", json!("i-override"));
        assert_eq!(reported.values_at("id"), vec!["i-override"]);
    }

    #[test]
    fn test_sanitize_resource_name() {
        assert_eq!(sanitize_resource_name("my-vpc"), "my_vpc");
        assert_eq!(sanitize_resource_name("My VPC"), "my_vpc");
        assert_eq!(sanitize_resource_name("123-vpc"), "r_123_vpc");
        assert_eq!(sanitize_resource_name("___test___"), "test");
        assert_eq!(sanitize_resource_name("---"), "resource");
    }
}
