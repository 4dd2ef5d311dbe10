//! Notebook orchestration: gate, normalize, and collect a run summary.
//!
//! Notebooks are processed strictly in configuration order; the summary keeps
//! that order because manuscript sections follow it.
use super::gate::{ExecutionGate, Obtained};
use crate::config::PipelineConfig;
use crate::notebook::{ensure_notebook_exists, render_notebook, NotebookExecutor};
use crate::summary::{normalize_notebook, write_summary, RunSummary};
use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

const BANNER_WIDTH: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Execute every notebook even when an artifact exists.
    pub rerun_all: bool,
}

/// What happened to each configured notebook during one run.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RunReport {
    pub summary_path: PathBuf,
    pub reused: Vec<String>,
    pub executed: Vec<String>,
    pub failed: Vec<String>,
    pub skipped: Vec<String>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.reused.len() + self.executed.len()
    }
}

/// Execute (or reuse) every configured notebook and write the run summary.
///
/// Per-notebook failures are logged and recorded in the report; only a
/// failure to persist the summary is returned as an error.
pub fn run_notebooks(
    config: &PipelineConfig,
    executor: &dyn NotebookExecutor,
    options: RunOptions,
    transcript: &mut dyn Write,
) -> Result<RunReport> {
    let notebooks_dir = config.notebooks_dir();
    let mut gate = ExecutionGate::new(executor, config.execution.timeout(), options.rerun_all);
    let mut summary = RunSummary::new();
    let mut report = RunReport {
        summary_path: config.summary_path(),
        ..RunReport::default()
    };
    let mut seen = HashSet::new();

    for source in &config.notebooks {
        let name = match basename(source) {
            Ok(name) => name,
            Err(err) => {
                tracing::error!(source = %source.display(), error = %err, "skipping notebook");
                report.skipped.push(source.display().to_string());
                continue;
            }
        };
        if !seen.insert(name.clone()) {
            tracing::warn!(
                notebook = %name,
                source = %source.display(),
                "basename already processed in this run; skipping duplicate"
            );
            report.skipped.push(name);
            continue;
        }

        let banner = "*".repeat(BANNER_WIDTH);
        transcript_line(
            transcript,
            &name,
            format_args!("\n\n{banner}\nProcessing {}\n{banner}\n", source.display()),
        );

        match ensure_notebook_exists(source) {
            Ok(true) => {
                tracing::warn!(source = %source.display(), "notebook not found; created empty notebook")
            }
            Ok(false) => {}
            Err(err) => {
                tracing::error!(notebook = %name, error = %format!("{err:#}"), "failed to process notebook");
                report.failed.push(name);
                continue;
            }
        }

        let artifact = notebooks_dir.join(&name);
        let obtained = match gate.obtain(&name, source, &artifact) {
            Ok(obtained) => obtained,
            Err(err) => {
                tracing::error!(notebook = %name, error = %format!("{err:#}"), "failed to process notebook");
                report.failed.push(name);
                continue;
            }
        };

        let notebook = obtained.notebook();
        transcript_line(transcript, &name, format_args!("\nDisplaying content of {name}:\n"));
        if let Err(err) = render_notebook(notebook, transcript) {
            tracing::warn!(notebook = %name, error = %err, "failed to write transcript");
        }

        let records = normalize_notebook(notebook);
        tracing::info!(
            notebook = %name,
            cells = notebook.cells.len(),
            cells_with_output = records.len(),
            "normalized notebook outputs"
        );
        summary.insert(name.clone(), records);
        match obtained {
            Obtained::Reused(_) => report.reused.push(name),
            Obtained::Executed(_) => report.executed.push(name),
        }
    }

    write_summary(&report.summary_path, &summary)?;
    tracing::info!(
        processed = report.processed(),
        failed = report.failed.len(),
        skipped = report.skipped.len(),
        summary = %report.summary_path.display(),
        "notebook processing complete"
    );
    Ok(report)
}

/// The transcript is for the operator only; a failed write never stops the run.
fn transcript_line(transcript: &mut dyn Write, notebook: &str, line: fmt::Arguments<'_>) {
    if let Err(err) = transcript.write_fmt(line) {
        tracing::warn!(notebook, error = %err, "failed to write transcript");
    }
}

fn basename(source: &Path) -> Result<String> {
    source
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("notebook path has no UTF-8 file name: {}", source.display()))
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
