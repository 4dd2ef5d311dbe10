use anyhow::Result;
use clap::Parser;

mod aggregate;
mod cli;
mod config;
mod error;
mod lm_client;
mod manuscript;
mod notebook;
mod observability;
mod pipeline;
mod review;
mod summary;
mod util;
mod workflow;

use cli::{Command, RootArgs};
use config::{load_config, LoggingConfig, PipelineConfig};
use observability::Observability;
use std::path::Path;

fn main() -> Result<()> {
    let args = RootArgs::parse();

    match &args.command {
        Command::Aggregate(aggregate) => {
            let _obs = Observability::install(&LoggingConfig::default(), aggregate.debug)?;
            workflow::aggregate_step(aggregate)?;
        }
        Command::RunNotebooks(run) => {
            let (config, _obs) = load_with_logging(&args.config, run.verbose)?;
            let report = workflow::run_notebooks_step(&config, run)?;
            println!(
                "\nNotebook processing complete. Summary at {}",
                report.summary_path.display()
            );
        }
        Command::WriteManuscript(write) => {
            let (config, _obs) = load_with_logging(&args.config, write.verbose)?;
            let path = workflow::write_manuscript_step(&config, write)?;
            println!("Manuscript written to {}", path.display());
        }
        Command::ReviewFigures(review) => {
            let (config, _obs) = load_with_logging(&args.config, review.verbose)?;
            let (path, reviews) = workflow::review_figures_step(&config, review)?;
            println!("Reviewed {} figure(s); report at {}", reviews.len(), path.display());
        }
        Command::Flow(flow) => {
            let (config, _obs) = load_with_logging(&args.config, flow.verbose)?;
            workflow::run_flow(&config, flow)?;
        }
    }
    Ok(())
}

/// Load the config, then install logging as it describes.
fn load_with_logging(path: &Path, verbose: bool) -> Result<(PipelineConfig, Observability)> {
    let config = load_config(path)?;
    let obs = Observability::install(&config.logging, verbose)?;
    if !path.is_file() {
        tracing::warn!(path = %path.display(), "config not found; using defaults");
    }
    Ok((config, obs))
}
