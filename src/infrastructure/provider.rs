use serde_json::Value;
use std::collections::HashMap;

use super::error::{ImportError, ImportResult};
use super::service::ServiceGenerator;

/// A cloud platform adapter composed of many service generators
///
/// A provider handle is scoped to a single region: the orchestrator builds a
/// fresh one for every region it imports.
pub trait ProviderGenerator {
    /// Get the name of this provider (e.g., "aws")
    fn name(&self) -> &str;

    /// Prepare the provider for one region
    fn init(&mut self, region: &str, args: &HashMap<String, Value>) -> ImportResult<()>;

    /// Names of the services this provider can generate, sorted
    fn supported_services(&self) -> Vec<String>;

    /// Construct the generator for a supported service
    ///
    /// Returns `None` when the service has no generator.
    fn new_service(&self, service_name: &str) -> Option<Box<dyn ServiceGenerator>>;

    /// Arguments handed to every service of this provider
    fn service_args(&self) -> HashMap<String, Value> {
        HashMap::new()
    }

    /// Build a ready-to-run generator for `service_name`
    ///
    /// Unknown names are a user error; a supported service without a
    /// generator is a defect in the provider.
    fn init_service(
        &self,
        service_name: &str,
        verbose: bool,
    ) -> ImportResult<Box<dyn ServiceGenerator>> {
        if !self.supported_services().iter().any(|s| s == service_name) {
            return Err(ImportError::UnsupportedService {
                provider: self.name().to_string(),
                service: service_name.to_string(),
            });
        }

        let mut service = self
            .new_service(service_name)
            .ok_or_else(|| ImportError::NotImplemented {
                provider: self.name().to_string(),
                service: service_name.to_string(),
            })?;

        service.set_name(service_name);
        service.set_provider_name(self.name());
        service.set_verbose(verbose);
        service.set_args(self.service_args());

        Ok(service)
    }
}

/// Resolve the `--resources` selection against a provider
///
/// An empty selection means every supported service.
pub fn select_services(
    provider: &dyn ProviderGenerator,
    requested: &[String],
) -> ImportResult<Vec<String>> {
    let supported = provider.supported_services();
    if requested.is_empty() {
        return Ok(supported);
    }

    requested
        .iter()
        .map(|name| {
            if supported.contains(name) {
                Ok(name.clone())
            } else {
                Err(ImportError::UnsupportedService {
                    provider: provider.name().to_string(),
                    service: name.clone(),
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubProvider;

    #[test]
    fn test_init_service_configures_generator() {
        let provider = StubProvider::new("aws").with_service("instance", Vec::new());

        let service = provider.init_service("instance", true).unwrap();

        assert_eq!(service.name(), "instance");
        assert_eq!(service.provider_name(), "aws");
        assert!(service.verbose());
        assert_eq!(
            service.args().get("region"),
            Some(&Value::String("us-east-1".to_string()))
        );
    }

    #[test]
    fn test_init_service_unknown_name() {
        let provider = StubProvider::new("aws");

        let err = provider.init_service("vpn", false).err().unwrap();

        assert!(matches!(err, ImportError::UnsupportedService { .. }));
    }

    #[test]
    fn test_init_service_missing_generator_is_defect() {
        let provider = StubProvider::new("aws").advertising("route53");

        let err = provider.init_service("route53", false).err().unwrap();

        assert!(err.is_defect());
    }

    #[test]
    fn test_select_services() {
        let provider = StubProvider::new("aws")
            .with_service("instance", Vec::new())
            .with_service("vpc", Vec::new());

        assert_eq!(
            select_services(&provider, &[]).unwrap(),
            vec!["instance", "vpc"]
        );
        assert_eq!(
            select_services(&provider, &["vpc".to_string()]).unwrap(),
            vec!["vpc"]
        );
        assert!(select_services(&provider, &["s3".to_string()]).is_err());
    }
}
