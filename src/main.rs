mod commands;
mod context;
mod infrastructure;
mod output;
mod test_helpers;
mod traits;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::ImportCommand;
use context::Context;
use infrastructure::error::ImportError;

/// Exit status for internal defects (EX_SOFTWARE)
const EXIT_DEFECT: i32 = 70;

#[derive(Parser)]
#[command(name = "iacgen")]
#[command(about = "Generate IaC configuration and state from existing infrastructure", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import the resources of a provider, region by region
    Import(ImportCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ctx = Context::new();

    let result = match cli.command {
        Commands::Import(command) => command.execute(&ctx),
    };

    if let Err(err) = &result {
        if err
            .downcast_ref::<ImportError>()
            .is_some_and(ImportError::is_defect)
        {
            ctx.output.error(&format!("internal error: {:#}", err));
            std::process::exit(EXIT_DEFECT);
        }
    }

    result
}
