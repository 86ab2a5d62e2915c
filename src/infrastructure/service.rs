use serde_json::Value;
use std::collections::HashMap;

use super::error::{ImportError, ImportResult};
use super::filter::{filter_cleanup, CleanupReport, FilterPhase, ResourceFilter};
use super::ignore_keys::{populate_ignore_keys, IgnoreKeyReconciler};
use super::resource::Resource;

/// Stages a service moves through during one import run
///
/// Stages only move forward; a service that reached `Converted` is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleStage {
    #[default]
    Uninitialized,
    Initialized,
    Filtered,
    Cleaned,
    IgnoreKeysPopulated,
    Converted,
}

/// State every service generator owns
///
/// A `Service` exclusively owns its resources for one lifecycle run; nothing
/// is shared between services or regions.
#[derive(Debug, Clone, Default)]
pub struct Service {
    pub name: String,
    pub provider_name: String,
    pub resources: Vec<Resource>,
    pub args: HashMap<String, Value>,
    pub filter: Vec<ResourceFilter>,
    pub verbose: bool,
    stage: LifecycleStage,
}

impl Service {
    pub fn new(name: impl Into<String>, provider_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider_name: provider_name.into(),
            ..Self::default()
        }
    }

    pub fn stage(&self) -> LifecycleStage {
        self.stage
    }

    /// Record that the lifecycle reached `stage`
    pub fn advance_to(&mut self, stage: LifecycleStage) -> ImportResult<()> {
        if stage <= self.stage {
            return Err(ImportError::Lifecycle {
                service: self.name.clone(),
                message: format!("cannot move from {:?} to {:?}", self.stage, stage),
            });
        }
        self.stage = stage;
        Ok(())
    }

    /// String argument by key, if present
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(|v| v.as_str())
    }
}

/// Contract every resource-type generator implements
///
/// Concrete generators provide access to their [`Service`] state, resource
/// enumeration and filter grammar. The remaining lifecycle steps have shared
/// default implementations that generators may override.
pub trait ServiceGenerator {
    fn service(&self) -> &Service;

    fn service_mut(&mut self) -> &mut Service;

    /// Populate the resources from the provider
    fn init_resources(&mut self) -> ImportResult<()>;

    /// Parse one raw filter expression into filters for this service
    fn parse_filter(&self, raw_filter: &str) -> ImportResult<Vec<ResourceFilter>>;

    /// Replace the filter set with the parsed form of every raw expression
    fn parse_filters(&mut self, raw_filters: &[String]) -> ImportResult<()> {
        let mut filters = Vec::new();
        for raw_filter in raw_filters {
            filters.extend(self.parse_filter(raw_filter)?);
        }
        self.service_mut().filter = filters;
        Ok(())
    }

    /// Drop filtered-out resources before the expensive refresh
    fn initial_cleanup(&mut self) -> CleanupReport {
        filter_cleanup(self.service_mut(), FilterPhase::Initial)
    }

    /// Drop filtered-out resources after refresh; no-op without filters
    fn post_refresh_cleanup(&mut self) -> Option<CleanupReport> {
        if self.service().filter.is_empty() {
            return None;
        }
        Some(filter_cleanup(self.service_mut(), FilterPhase::PostRefresh))
    }

    /// Append the ignore keys of every distinct resource type
    fn populate_ignore_keys(&mut self, reconciler: &dyn IgnoreKeyReconciler) -> ImportResult<()> {
        populate_ignore_keys(self.service_mut(), reconciler)
    }

    /// Service specific finishing step run on the final resources
    fn post_convert_hook(&mut self) -> ImportResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        &self.service().name
    }

    fn set_name(&mut self, name: &str) {
        self.service_mut().name = name.to_string();
    }

    fn provider_name(&self) -> &str {
        &self.service().provider_name
    }

    fn set_provider_name(&mut self, provider_name: &str) {
        self.service_mut().provider_name = provider_name.to_string();
    }

    fn args(&self) -> &HashMap<String, Value> {
        &self.service().args
    }

    fn set_args(&mut self, args: HashMap<String, Value>) {
        self.service_mut().args = args;
    }

    fn resources(&self) -> &[Resource] {
        &self.service().resources
    }

    fn set_resources(&mut self, resources: Vec<Resource>) {
        self.service_mut().resources = resources;
    }

    /// Hand the resources over, leaving the service empty
    fn take_resources(&mut self) -> Vec<Resource> {
        std::mem::take(&mut self.service_mut().resources)
    }

    fn verbose(&self) -> bool {
        self.service().verbose
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.service_mut().verbose = verbose;
    }
}
