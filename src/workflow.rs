//! Workflow steps and the end-to-end flow.
//!
//! Steps run in a fixed order: notebooks, aggregation, manuscript. A step
//! that returns an error stops the flow, so the manuscript never sees a
//! partial aggregate.
use crate::aggregate::{aggregate_summary, load_document, AggregatedDocument};
use crate::cli::{
    AggregateArgs, FlowArgs, ReviewFiguresArgs, RunNotebooksArgs, WriteManuscriptArgs,
};
use crate::config::PipelineConfig;
use crate::manuscript::{LmManuscriptWriter, ManuscriptWriter};
use crate::notebook::CommandExecutor;
use crate::pipeline::{run_notebooks, RunOptions, RunReport};
use crate::review::{FigureReview, LmFigureReviewer};
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub fn run_notebooks_step(config: &PipelineConfig, args: &RunNotebooksArgs) -> Result<RunReport> {
    notebooks_step(config, args.rerun_all)
}

pub fn aggregate_step(args: &AggregateArgs) -> Result<AggregatedDocument> {
    aggregate_files(&args.summary, &args.output)
}

pub fn write_manuscript_step(config: &PipelineConfig, args: &WriteManuscriptArgs) -> Result<PathBuf> {
    let command = config
        .resolve_lm_command(args.lm.as_deref())
        .ok_or_else(|| anyhow!("no LM command configured (use --lm, manuscript.lm_command, or AUTOPAPER_LM_COMMAND)"))?;
    let aggregated = args
        .aggregated
        .clone()
        .unwrap_or_else(|| config.aggregated_path());
    manuscript_step(config, &command, &aggregated)
}

/// Review the figures of an existing manuscript; not part of `run_flow`.
pub fn review_figures_step(
    config: &PipelineConfig,
    args: &ReviewFiguresArgs,
) -> Result<(PathBuf, Vec<FigureReview>)> {
    let _span = tracing::info_span!("step", name = "review_figures").entered();
    let command = config.resolve_review_command(args.lm.as_deref()).ok_or_else(|| {
        anyhow!("no LM command configured (use --lm, review.lm_command, manuscript.lm_command, or AUTOPAPER_LM_COMMAND)")
    })?;
    let manuscript = args
        .manuscript
        .clone()
        .unwrap_or_else(|| config.manuscript_path());
    let out = args
        .output
        .clone()
        .unwrap_or_else(|| config.figure_review_path());
    let reviews = LmFigureReviewer::new(command)
        .review_manuscript(&manuscript, &out)
        .context("review figures")?;
    Ok((out, reviews))
}

pub fn run_flow(config: &PipelineConfig, args: &FlowArgs) -> Result<()> {
    let report = notebooks_step(config, args.rerun_all)?;
    aggregate_files(&report.summary_path, &config.aggregated_path())?;
    match config.resolve_lm_command(args.lm.as_deref()) {
        Some(command) => {
            manuscript_step(config, &command, &config.aggregated_path())?;
        }
        None => tracing::warn!(
            step = "write_manuscript",
            "skipped: no LM command configured"
        ),
    }
    tracing::info!("flow complete");
    Ok(())
}

fn notebooks_step(config: &PipelineConfig, rerun_all: bool) -> Result<RunReport> {
    let _span = tracing::info_span!("step", name = "run_notebooks").entered();
    let executor = CommandExecutor::new(config.execution.command.clone());
    let stdout = std::io::stdout();
    let mut transcript = stdout.lock();
    let report = run_notebooks(config, &executor, RunOptions { rerun_all }, &mut transcript)
        .context("run notebooks")?;
    if !report.failed.is_empty() {
        tracing::warn!(failed = ?report.failed, "some notebooks failed; continuing without them");
    }
    Ok(report)
}

fn aggregate_files(summary: &Path, output: &Path) -> Result<AggregatedDocument> {
    let _span = tracing::info_span!("step", name = "aggregate_results").entered();
    aggregate_summary(summary, output).context("aggregate results")
}

fn manuscript_step(config: &PipelineConfig, command: &str, aggregated: &Path) -> Result<PathBuf> {
    let _span = tracing::info_span!("step", name = "write_manuscript").entered();
    let document = load_document(aggregated)?;
    let writer = LmManuscriptWriter::new(command, config.manuscript.title.clone());
    writer
        .write(&document, &config.manuscript_path())
        .context("write manuscript")
}
