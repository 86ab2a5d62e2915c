use anyhow::{Context as AnyhowContext, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::Context;
use crate::infrastructure::ignore_keys::{IgnoreKeyReconciler, NoIgnoreKeys, SchemaReconciler};
use crate::infrastructure::lifecycle::PassthroughRefresher;
use crate::infrastructure::options::{bucket_url, ImportOptions, StateBackend};
use crate::infrastructure::registry::ProviderRegistry;
use crate::infrastructure::workflow::{ImportWorkflow, RegionReport};
use crate::infrastructure::writer::TerraformJsonWriter;

/// Directory under the home directory holding the default config file
const CONFIG_DIR: &str = ".iacgen";
const CONFIG_FILE: &str = "config.yaml";

/// Import existing infrastructure as configuration and state
#[derive(Debug, Args)]
pub struct ImportCommand {
    /// Provider to import from (e.g., inventory)
    provider: String,

    /// Refresh resources against the provider before writing
    #[arg(short = 'c', long, num_args = 0..=1, default_missing_value = "true")]
    connect: Option<bool>,

    /// Services to import, comma separated (default: all supported)
    #[arg(short = 'r', long, value_delimiter = ',')]
    resources: Vec<String>,

    /// Output path template with {output}, {provider} and {service} tokens
    #[arg(short = 'p', long = "path-patter", visible_alias = "path-pattern")]
    path_pattern: Option<String>,

    /// Output root directory
    #[arg(short = 'o', long, env = "IACGEN_PATH_OUTPUT")]
    path_output: Option<String>,

    /// Where state lives: local or bucket
    #[arg(short = 's', long, value_enum)]
    state: Option<StateBackend>,

    /// Bucket URI used when --state is bucket (e.g., gs://tf-state)
    #[arg(short = 'b', long)]
    bucket: Option<String>,

    /// Regions to import, comma separated
    #[arg(long, value_delimiter = ',', env = "IACGEN_REGIONS")]
    regions: Vec<String>,

    /// Filter expression, repeatable (e.g., aws_instance=i-1:i-2)
    #[arg(short = 'f', long = "filter")]
    filters: Vec<String>,

    /// Print per-step diagnostics
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Provider schema JSON (terraform providers schema -json) for ignore keys
    #[arg(long)]
    schema_file: Option<PathBuf>,

    /// Inventory file or directory read by the inventory provider
    #[arg(long)]
    inventory: Option<PathBuf>,

    /// YAML config file with default options
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ImportCommand {
    pub fn execute(self, ctx: &Context) -> Result<()> {
        let options = self.resolve_options(ctx)?;
        options.validate()?;

        let registry = ProviderRegistry::with_defaults(Arc::clone(&ctx.fs));
        if !registry.has_provider(&self.provider) {
            ctx.output.info(&format!(
                "Available providers: {}",
                registry.registered_providers().join(", ")
            ));
        }
        let factory = registry.factory(&self.provider)?;

        let reconciler: Box<dyn IgnoreKeyReconciler> = match &options.schema_file {
            Some(path) => {
                let schema = SchemaReconciler::from_file(ctx.fs.as_ref(), path)
                    .with_context(|| format!("Failed to load schema {}", path.display()))?;
                if options.verbose {
                    ctx.output.dimmed(&format!(
                        "schema covers {} resource types",
                        schema.resource_type_count()
                    ));
                }
                Box::new(schema)
            }
            None => Box::new(NoIgnoreKeys),
        };

        let mut writer = TerraformJsonWriter::new(ctx.fs.as_ref());
        if options.state == StateBackend::Bucket {
            if let Some(bucket) = &options.bucket {
                writer = writer.with_bucket(bucket_url(bucket)?);
            }
        }

        ctx.output.section(&format!("Importing from {}", self.provider));

        let workflow = ImportWorkflow::new(
            &options,
            reconciler.as_ref(),
            &PassthroughRefresher,
            &writer,
            ctx.output.as_ref(),
        );
        let reports = workflow.import_regions(factory)?;

        Self::display_summary(ctx, &options, &reports);
        Ok(())
    }

    /// Config file values overridden by command line flags
    fn resolve_options(&self, ctx: &Context) -> Result<ImportOptions> {
        let mut options = match self.config_path(ctx) {
            Some(path) => ImportOptions::from_file(ctx.fs.as_ref(), &path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ImportOptions::default(),
        };

        if let Some(connect) = self.connect {
            options.connect = connect;
        }
        if !self.resources.is_empty() {
            options.resources = self.resources.clone();
        }
        if let Some(path_pattern) = &self.path_pattern {
            options.path_pattern = path_pattern.clone();
        }
        if let Some(path_output) = &self.path_output {
            options.path_output = path_output.clone();
        }
        if let Some(state) = self.state {
            options.state = state;
        }
        if self.bucket.is_some() {
            options.bucket = self.bucket.clone();
        }
        if !self.regions.is_empty() {
            options.regions = self.regions.clone();
        }
        if !self.filters.is_empty() {
            options.filters = self.filters.clone();
        }
        if self.verbose {
            options.verbose = true;
        }
        if self.schema_file.is_some() {
            options.schema_file = self.schema_file.clone();
        }
        if self.inventory.is_some() {
            options.inventory = self.inventory.clone();
        }

        Ok(options)
    }

    /// The explicit --config path, or the default one when it exists
    fn config_path(&self, ctx: &Context) -> Option<PathBuf> {
        if let Some(path) = &self.config {
            return Some(path.clone());
        }

        let default = dirs::home_dir()?.join(CONFIG_DIR).join(CONFIG_FILE);
        ctx.fs.exists(&default).then_some(default)
    }

    fn display_summary(ctx: &Context, options: &ImportOptions, reports: &[RegionReport]) {
        ctx.output.section("Import summary");

        for report in reports {
            ctx.output.key_value(
                &report.region,
                &format!(
                    "{} resources in {} services",
                    report.resource_count(),
                    report.services.len()
                ),
            );

            for skipped in &report.skipped {
                ctx.output
                    .warning(&format!("{} ({}) was skipped", skipped, report.region));
            }

            if options.verbose {
                for service in &report.services {
                    for file in &service.files {
                        ctx.output.path(&file.display().to_string());
                    }
                }
            }
        }

        let total: usize = reports.iter().map(RegionReport::resource_count).sum();
        ctx.output.blank();
        ctx.output.success(&format!(
            "Imported {} resources across {} regions into {}",
            total,
            reports.len(),
            options.path_output
        ));
    }
}
