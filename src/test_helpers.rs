//! Test doubles for the import pipeline
//!
//! Recording collaborators (reconciler, refresher, writer) plus a fixture
//! service and a stub provider that serve canned resources.

#![cfg(test)]

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::infrastructure::error::{ImportError, ImportResult};
use crate::infrastructure::filter::{parse_filter_expression, ResourceFilter};
use crate::infrastructure::ignore_keys::IgnoreKeyReconciler;
use crate::infrastructure::lifecycle::StateRefresher;
use crate::infrastructure::provider::ProviderGenerator;
use crate::infrastructure::resource::Resource;
use crate::infrastructure::service::{Service, ServiceGenerator};
use crate::infrastructure::writer::{OutputTarget, ResourceWriter};

/// Reconciler answering from a fixed table and recording every request
#[derive(Default)]
pub struct RecordingReconciler {
    keys: HashMap<String, Vec<String>>,
    failure: Option<String>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingReconciler {
    pub fn with_keys(keys: &[(&str, &[&str])]) -> Self {
        Self {
            keys: keys
                .iter()
                .map(|(resource_type, patterns)| {
                    (
                        resource_type.to_string(),
                        patterns.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    /// The resource type lists of every lookup, in call order
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl IgnoreKeyReconciler for RecordingReconciler {
    fn ignore_keys(&self, resource_types: &[String]) -> ImportResult<HashMap<String, Vec<String>>> {
        self.calls.lock().unwrap().push(resource_types.to_vec());

        if let Some(message) = &self.failure {
            return Err(ImportError::Lookup(message.clone()));
        }

        Ok(resource_types
            .iter()
            .filter_map(|t| self.keys.get(t).map(|keys| (t.clone(), keys.clone())))
            .collect())
    }
}

/// Refresher passing resources through while counting them
#[derive(Default)]
pub struct RecordingRefresher {
    refreshed: Mutex<usize>,
}

impl RecordingRefresher {
    /// Total number of resources handed to `refresh`
    pub fn refreshed(&self) -> usize {
        *self.refreshed.lock().unwrap()
    }
}

impl StateRefresher for RecordingRefresher {
    fn refresh(&self, _provider: &str, resources: Vec<Resource>) -> ImportResult<Vec<Resource>> {
        *self.refreshed.lock().unwrap() += resources.len();
        Ok(resources)
    }
}

/// Writer keeping what it was asked to write in memory
#[derive(Default)]
pub struct RecordingWriter {
    written: Mutex<Vec<(OutputTarget, Vec<Resource>)>>,
}

impl RecordingWriter {
    pub fn targets(&self) -> Vec<OutputTarget> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }

    /// IDs of every written resource, in write order
    pub fn resource_ids(&self) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, resources)| resources.iter().map(|r| r.id.clone()))
            .collect()
    }
}

impl ResourceWriter for RecordingWriter {
    fn write(&self, target: &OutputTarget, resources: &[Resource]) -> ImportResult<Vec<PathBuf>> {
        self.written
            .lock()
            .unwrap()
            .push((target.clone(), resources.to_vec()));
        Ok(vec![target.directory.join("resources.tf.json")])
    }
}

/// Service generator serving fixed resources
pub struct FixtureService {
    service: Service,
    fixtures: Vec<Resource>,
    hook_failure: Option<String>,
}

impl FixtureService {
    pub fn new(name: &str, provider: &str) -> Self {
        Self {
            service: Service::new(name, provider),
            fixtures: Vec::new(),
            hook_failure: None,
        }
    }

    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.fixtures = resources;
        self
    }

    /// Make `post_convert_hook` fail with the given message
    pub fn failing_hook(mut self, message: &str) -> Self {
        self.hook_failure = Some(message.to_string());
        self
    }
}

impl ServiceGenerator for FixtureService {
    fn service(&self) -> &Service {
        &self.service
    }

    fn service_mut(&mut self) -> &mut Service {
        &mut self.service
    }

    fn init_resources(&mut self) -> ImportResult<()> {
        self.service.resources = self.fixtures.clone();
        Ok(())
    }

    fn parse_filter(&self, raw_filter: &str) -> ImportResult<Vec<ResourceFilter>> {
        parse_filter_expression(raw_filter)
    }

    fn post_convert_hook(&mut self) -> ImportResult<()> {
        match &self.hook_failure {
            Some(message) => Err(ImportError::InvalidInput(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone)]
struct StubService {
    resources: Vec<Resource>,
    hook_failure: Option<String>,
}

/// Provider serving fixture services
///
/// Services registered with [`StubProvider::advertising`] are listed as
/// supported but have no generator.
pub struct StubProvider {
    name: String,
    region: String,
    services: BTreeMap<String, StubService>,
    advertised: Vec<String>,
    init_failure: Option<String>,
}

impl StubProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            region: "us-east-1".to_string(),
            services: BTreeMap::new(),
            advertised: Vec::new(),
            init_failure: None,
        }
    }

    pub fn with_service(mut self, name: &str, resources: Vec<Resource>) -> Self {
        self.services.insert(
            name.to_string(),
            StubService {
                resources,
                hook_failure: None,
            },
        );
        self
    }

    /// Add a service whose post conversion step fails
    pub fn with_failing_service(mut self, name: &str, message: &str) -> Self {
        self.services.insert(
            name.to_string(),
            StubService {
                resources: Vec::new(),
                hook_failure: Some(message.to_string()),
            },
        );
        self
    }

    pub fn advertising(mut self, name: &str) -> Self {
        self.advertised.push(name.to_string());
        self
    }

    /// Make `init` fail with a discovery error
    pub fn failing_init(mut self, message: &str) -> Self {
        self.init_failure = Some(message.to_string());
        self
    }
}

impl ProviderGenerator for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&mut self, region: &str, _args: &HashMap<String, Value>) -> ImportResult<()> {
        if let Some(message) = &self.init_failure {
            return Err(ImportError::Discovery {
                service: self.name.clone(),
                message: message.clone(),
            });
        }
        self.region = region.to_string();
        Ok(())
    }

    fn supported_services(&self) -> Vec<String> {
        let mut services: Vec<String> = self
            .services
            .keys()
            .chain(self.advertised.iter())
            .cloned()
            .collect();
        services.sort();
        services
    }

    fn new_service(&self, service_name: &str) -> Option<Box<dyn ServiceGenerator>> {
        let stub = self.services.get(service_name)?;
        let mut service = FixtureService::new(service_name, &self.name)
            .with_resources(stub.resources.clone());
        if let Some(message) = &stub.hook_failure {
            service = service.failing_hook(message);
        }
        Some(Box::new(service))
    }

    fn service_args(&self) -> HashMap<String, Value> {
        let mut args = HashMap::new();
        args.insert("region".to_string(), Value::String(self.region.clone()));
        args
    }
}
