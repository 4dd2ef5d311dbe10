//! Execution cache gate.
//!
//! Presence of an executed artifact is the only cache key: a notebook with
//! an artifact is reused, never re-run, even if its source has changed since.
use crate::error::{ExecutionFailureKind, PipelineError};
use crate::notebook::{load_notebook, Notebook, NotebookExecutor};
use crate::util::write_atomic;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Reuse(PathBuf),
    Execute,
}

/// How a notebook was obtained for this run.
#[derive(Debug)]
pub enum Obtained {
    Reused(Notebook),
    Executed(Notebook),
}

impl Obtained {
    pub fn notebook(&self) -> &Notebook {
        match self {
            Self::Reused(notebook) | Self::Executed(notebook) => notebook,
        }
    }
}

pub struct ExecutionGate<'a> {
    executor: &'a dyn NotebookExecutor,
    timeout: Duration,
    rerun_all: bool,
    executed: HashSet<PathBuf>,
}

impl<'a> ExecutionGate<'a> {
    pub fn new(executor: &'a dyn NotebookExecutor, timeout: Duration, rerun_all: bool) -> Self {
        Self {
            executor,
            timeout,
            rerun_all,
            executed: HashSet::new(),
        }
    }

    /// Decide between reusing `artifact` and executing afresh.
    ///
    /// `rerun_all` forces execution once per artifact per run.
    pub fn decide(&self, artifact: &Path) -> GateDecision {
        let forced = self.rerun_all && !self.executed.contains(artifact);
        if artifact.is_file() && !forced {
            GateDecision::Reuse(artifact.to_path_buf())
        } else {
            GateDecision::Execute
        }
    }

    /// Load or execute `source`, persisting a fresh artifact only on success.
    pub fn obtain(&mut self, name: &str, source: &Path, artifact: &Path) -> Result<Obtained> {
        match self.decide(artifact) {
            GateDecision::Reuse(path) => {
                tracing::info!(notebook = name, artifact = %path.display(), "reusing executed notebook");
                let notebook = load_notebook(&path)?;
                Ok(Obtained::Reused(notebook))
            }
            GateDecision::Execute => {
                tracing::info!(notebook = name, source = %source.display(), "executing notebook");
                self.executed.insert(artifact.to_path_buf());
                let start = Instant::now();
                let bytes = self
                    .executor
                    .execute(source, self.timeout)
                    .map_err(|kind| failure(name, kind))?;
                let notebook = Notebook::from_slice(&bytes).map_err(|err| {
                    failure(name, ExecutionFailureKind::InvalidOutput(err.to_string()))
                })?;
                write_atomic(artifact, &bytes)
                    .with_context(|| format!("persist executed notebook for {name}"))?;
                tracing::info!(
                    notebook = name,
                    artifact = %artifact.display(),
                    elapsed_ms = start.elapsed().as_millis(),
                    "executed and saved"
                );
                Ok(Obtained::Executed(notebook))
            }
        }
    }
}

fn failure(notebook: &str, kind: ExecutionFailureKind) -> anyhow::Error {
    PipelineError::ExecutionFailure {
        notebook: notebook.to_string(),
        kind,
    }
    .into()
}
