use std::path::PathBuf;

use crate::infrastructure::error::{ImportError, ImportResult};
use crate::infrastructure::ignore_keys::IgnoreKeyReconciler;
use crate::infrastructure::lifecycle::{ServiceLifecycle, StateRefresher};
use crate::infrastructure::options::ImportOptions;
use crate::infrastructure::provider::{select_services, ProviderGenerator};
use crate::infrastructure::writer::{OutputTarget, ResourceWriter};
use crate::traits::Output;

/// Outcome of one written service
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReport {
    pub service: String,
    pub resources: usize,
    pub files: Vec<PathBuf>,
}

/// Outcome of one region
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionReport {
    pub region: String,
    pub services: Vec<ServiceReport>,
    /// Services whose post conversion step failed and were not written
    pub skipped: Vec<String>,
}

impl RegionReport {
    fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Self::default()
        }
    }

    /// Total number of resources written in this region
    pub fn resource_count(&self) -> usize {
        self.services.iter().map(|s| s.resources).sum()
    }
}

/// Orchestrates the import of every configured region
///
/// Regions run one after the other, each with a fresh provider handle. The
/// first failing region stops the run and its error is returned unchanged;
/// output already written for earlier regions is left in place.
pub struct ImportWorkflow<'a> {
    options: &'a ImportOptions,
    reconciler: &'a dyn IgnoreKeyReconciler,
    refresher: &'a dyn StateRefresher,
    writer: &'a dyn ResourceWriter,
    output: &'a dyn Output,
}

impl<'a> ImportWorkflow<'a> {
    /// Create a new import workflow
    pub fn new(
        options: &'a ImportOptions,
        reconciler: &'a dyn IgnoreKeyReconciler,
        refresher: &'a dyn StateRefresher,
        writer: &'a dyn ResourceWriter,
        output: &'a dyn Output,
    ) -> Self {
        Self {
            options,
            reconciler,
            refresher,
            writer,
            output,
        }
    }

    /// Import every region in order, building a provider per region
    pub fn import_regions(
        &self,
        factory: &dyn Fn() -> Box<dyn ProviderGenerator>,
    ) -> ImportResult<Vec<RegionReport>> {
        let mut reports = Vec::new();

        for region in &self.options.regions {
            let mut provider = factory();
            self.output
                .info(&format!("{} importing region {}", provider.name(), region));

            let regional = self.options.for_region(region);
            let report = self.import_region(provider.as_mut(), region, &regional)?;
            reports.push(report);
        }

        Ok(reports)
    }

    /// Run the full import for one region with region-scoped options
    pub fn import_region(
        &self,
        provider: &mut dyn ProviderGenerator,
        region: &str,
        options: &ImportOptions,
    ) -> ImportResult<RegionReport> {
        provider.init(region, &options.provider_args(region))?;

        let provider: &dyn ProviderGenerator = provider;
        let services = select_services(provider, &options.resources)?;
        let lifecycle = ServiceLifecycle::new(
            &options.filters,
            options.connect,
            self.reconciler,
            self.refresher,
            self.output,
        );

        let mut report = RegionReport::new(region);

        for service_name in services {
            let mut generator = provider.init_service(&service_name, options.verbose)?;

            let resources = match lifecycle.run(generator.as_mut()) {
                Ok(resources) => resources,
                Err(ImportError::Conversion { service, message }) => {
                    self.output
                        .warning(&format!("Skipping {}: {}", service, message));
                    report.skipped.push(service);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if resources.is_empty() {
                if options.verbose {
                    self.output
                        .dimmed(&format!("{}: nothing to write", service_name));
                }
                continue;
            }

            let target = OutputTarget {
                provider: provider.name().to_string(),
                service: service_name.clone(),
                region: region.to_string(),
                directory: options.output_dir(provider.name(), &service_name),
            };
            let files = self.writer.write(&target, &resources)?;

            report.services.push(ServiceReport {
                service: service_name,
                resources: resources.len(),
                files,
            });
        }

        Ok(report)
    }
}
