use super::error::{ImportError, ImportResult};
use super::filter::CleanupReport;
use super::ignore_keys::IgnoreKeyReconciler;
use super::resource::Resource;
use super::service::{LifecycleStage, ServiceGenerator};
use crate::traits::Output;

/// Re-reads resources from the provider so their attributes are complete
pub trait StateRefresher {
    fn refresh(&self, provider: &str, resources: Vec<Resource>) -> ImportResult<Vec<Resource>>;
}

/// Refresher for providers whose enumeration already returns live attributes
#[derive(Debug, Default)]
pub struct PassthroughRefresher;

impl StateRefresher for PassthroughRefresher {
    fn refresh(&self, _provider: &str, resources: Vec<Resource>) -> ImportResult<Vec<Resource>> {
        Ok(resources)
    }
}

/// Drives one service generator through the import lifecycle
///
/// Steps run strictly in order:
/// `init_resources`, `parse_filters`, `initial_cleanup`, refresh (when
/// connected), `post_refresh_cleanup`, `populate_ignore_keys`,
/// `post_convert_hook`.
pub struct ServiceLifecycle<'a> {
    filters: &'a [String],
    connect: bool,
    reconciler: &'a dyn IgnoreKeyReconciler,
    refresher: &'a dyn StateRefresher,
    output: &'a dyn Output,
}

impl<'a> ServiceLifecycle<'a> {
    pub fn new(
        filters: &'a [String],
        connect: bool,
        reconciler: &'a dyn IgnoreKeyReconciler,
        refresher: &'a dyn StateRefresher,
        output: &'a dyn Output,
    ) -> Self {
        Self {
            filters,
            connect,
            reconciler,
            refresher,
            output,
        }
    }

    /// Run every step and return the final resources
    ///
    /// A failing `post_convert_hook` is reported as [`ImportError::Conversion`]
    /// so callers can skip just this service. Refresh failures surface as
    /// [`ImportError::Refresh`]. A generator can run once; running it again
    /// is an [`ImportError::Lifecycle`] error.
    pub fn run(&self, generator: &mut dyn ServiceGenerator) -> ImportResult<Vec<Resource>> {
        let name = generator.name().to_string();
        let stage = generator.service().stage();
        if stage != LifecycleStage::Uninitialized {
            return Err(ImportError::Lifecycle {
                service: name,
                message: format!("already at {:?}", stage),
            });
        }

        generator.init_resources()?;
        generator
            .service_mut()
            .advance_to(LifecycleStage::Initialized)?;
        let discovered = format!("{}: discovered {} resources", name, generator.resources().len());
        self.trace(generator, &discovered);

        generator.parse_filters(self.filters)?;
        generator.service_mut().advance_to(LifecycleStage::Filtered)?;

        let report = generator.initial_cleanup();
        self.trace_cleanup(generator, &name, &report);

        if self.connect {
            let resources = generator.take_resources();
            let refreshed = self
                .refresher
                .refresh(generator.provider_name(), resources)
                .map_err(|e| match e {
                    ImportError::Refresh { .. } => e,
                    other => ImportError::Refresh {
                        service: name.clone(),
                        message: other.to_string(),
                    },
                })?;
            generator.set_resources(refreshed);
            self.trace(generator, &format!("{}: refreshed resources", name));
        }

        if let Some(report) = generator.post_refresh_cleanup() {
            self.trace_cleanup(generator, &name, &report);
        }
        generator.service_mut().advance_to(LifecycleStage::Cleaned)?;

        generator.populate_ignore_keys(self.reconciler)?;
        generator
            .service_mut()
            .advance_to(LifecycleStage::IgnoreKeysPopulated)?;

        generator
            .post_convert_hook()
            .map_err(|e| match e {
                ImportError::Conversion { .. } => e,
                other => ImportError::Conversion {
                    service: name.clone(),
                    message: other.to_string(),
                },
            })?;
        generator.service_mut().advance_to(LifecycleStage::Converted)?;

        Ok(generator.take_resources())
    }

    fn trace(&self, generator: &dyn ServiceGenerator, message: &str) {
        if generator.verbose() {
            self.output.dimmed(message);
        }
    }

    fn trace_cleanup(&self, generator: &dyn ServiceGenerator, name: &str, report: &CleanupReport) {
        let message = format!(
            "{}: {} cleanup kept {} of {} resources, dropped {}",
            name,
            report.phase,
            report.after,
            report.before,
            report.removed()
        );
        self.trace(generator, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ignore_keys::NoIgnoreKeys;
    use crate::test_helpers::{FixtureService, RecordingReconciler, RecordingRefresher};
    use crate::traits::MockOutput;

    fn fixture() -> FixtureService {
        FixtureService::new("instance", "aws").with_resources(vec![
            Resource::new("aws", "aws_instance", "i-1"),
            Resource::new("aws", "aws_instance", "i-2"),
        ])
    }

    #[test]
    fn test_run_returns_filtered_annotated_resources() {
        let mut generator = fixture();
        let filters = vec!["aws_instance=i-2".to_string()];
        let reconciler = RecordingReconciler::with_keys(&[("aws_instance", &["^arn$"])]);
        let output = MockOutput::new();
        let lifecycle = ServiceLifecycle::new(
            &filters,
            false,
            &reconciler,
            &PassthroughRefresher,
            &output,
        );

        let resources = lifecycle.run(&mut generator).unwrap();

        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].id, "i-2");
        assert_eq!(resources[0].ignore_keys, vec!["^arn$"]);
        assert_eq!(generator.service().stage(), LifecycleStage::Converted);
        assert!(generator.resources().is_empty());
    }

    #[test]
    fn test_refresh_runs_only_when_connected() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let refresher = RecordingRefresher::default();

        let mut generator = fixture();
        ServiceLifecycle::new(&filters, false, &NoIgnoreKeys, &refresher, &output)
            .run(&mut generator)
            .unwrap();
        assert_eq!(refresher.refreshed(), 0);

        let mut generator = fixture();
        ServiceLifecycle::new(&filters, true, &NoIgnoreKeys, &refresher, &output)
            .run(&mut generator)
            .unwrap();
        assert_eq!(refresher.refreshed(), 2);
    }

    #[test]
    fn test_initial_cleanup_runs_before_refresh() {
        let filters = vec!["aws_instance=i-1".to_string()];
        let output = MockOutput::new();
        let refresher = RecordingRefresher::default();
        let mut generator = fixture();

        ServiceLifecycle::new(&filters, true, &NoIgnoreKeys, &refresher, &output)
            .run(&mut generator)
            .unwrap();

        assert_eq!(refresher.refreshed(), 1);
    }

    #[test]
    fn test_attribute_filter_applies_before_refresh() {
        let filters = vec!["Name=state;Value=running".to_string()];
        let output = MockOutput::new();
        let refresher = RecordingRefresher::default();
        let mut generator = fixture();

        let resources = ServiceLifecycle::new(&filters, true, &NoIgnoreKeys, &refresher, &output)
            .run(&mut generator)
            .unwrap();

        assert!(resources.is_empty());
        assert_eq!(refresher.refreshed(), 0);
    }

    #[test]
    fn test_hook_failure_becomes_conversion_error() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let mut generator = fixture().failing_hook("bad template");

        let err = ServiceLifecycle::new(&filters, false, &NoIgnoreKeys, &PassthroughRefresher, &output)
            .run(&mut generator)
            .unwrap_err();

        match err {
            ImportError::Conversion { service, message } => {
                assert_eq!(service, "instance");
                assert!(message.contains("bad template"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(
            generator.service().stage(),
            LifecycleStage::IgnoreKeysPopulated
        );
    }

    #[test]
    fn test_lookup_failure_is_not_isolated() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let reconciler = RecordingReconciler::failing("schema unavailable");
        let mut generator = fixture();

        let err = ServiceLifecycle::new(&filters, false, &reconciler, &PassthroughRefresher, &output)
            .run(&mut generator)
            .unwrap_err();

        assert!(matches!(err, ImportError::Lookup(_)));
    }

    struct FailingRefresher;

    impl StateRefresher for FailingRefresher {
        fn refresh(&self, _provider: &str, _resources: Vec<Resource>) -> ImportResult<Vec<Resource>> {
            Err(ImportError::InvalidInput("plugin exited".to_string()))
        }
    }

    #[test]
    fn test_refresh_failure_is_tagged_with_service() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let mut generator = fixture();

        let err = ServiceLifecycle::new(&filters, true, &NoIgnoreKeys, &FailingRefresher, &output)
            .run(&mut generator)
            .unwrap_err();

        match err {
            ImportError::Refresh { service, message } => {
                assert_eq!(service, "instance");
                assert!(message.contains("plugin exited"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_converted_generator_cannot_run_again() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let refresher = RecordingRefresher::default();
        let lifecycle = ServiceLifecycle::new(&filters, true, &NoIgnoreKeys, &refresher, &output);
        let mut generator = fixture();
        lifecycle.run(&mut generator).unwrap();

        let err = lifecycle.run(&mut generator).unwrap_err();

        assert!(matches!(err, ImportError::Lifecycle { .. }));
        assert!(err.is_defect());
        assert_eq!(refresher.refreshed(), 2);
        assert!(generator.resources().is_empty());
    }

    #[test]
    fn test_verbose_traces_steps() {
        let filters: Vec<String> = Vec::new();
        let output = MockOutput::new();
        let mut generator = fixture();
        generator.set_verbose(true);

        ServiceLifecycle::new(&filters, false, &NoIgnoreKeys, &PassthroughRefresher, &output)
            .run(&mut generator)
            .unwrap();

        let text = output.to_text();
        assert!(text.contains("instance: discovered 2 resources"));
        assert!(text.contains("instance: initial cleanup kept 2 of 2 resources"));
    }
}
