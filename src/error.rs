//! Failure taxonomy for the pipeline.
//!
//! Unit-of-work failures (one notebook, one image, one output) are caught and
//! logged by their callers; the remaining variants propagate through `anyhow`
//! and are recovered with `downcast_ref` where the exit behavior depends on them.
use std::path::PathBuf;
use thiserror::Error;

/// Why a single notebook could not be executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionFailureKind {
    #[error("a cell raised during execution: {0}")]
    CellRaised(String),
    #[error("source notebook not found")]
    SourceMissing,
    #[error("execution exceeded {0}s timeout")]
    TimedOut(u64),
    #[error("execution engine unavailable: {0}")]
    EngineUnavailable(String),
    #[error("execution engine failed: {0}")]
    EngineFailed(String),
    #[error("engine produced an unreadable notebook: {0}")]
    InvalidOutput(String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to execute {notebook}: {kind}")]
    ExecutionFailure {
        notebook: String,
        kind: ExecutionFailureKind,
    },
    #[error("missing input {}", .0.display())]
    MissingInput(PathBuf),
    #[error("malformed artifact {}: {detail}", path.display())]
    MalformedArtifact { path: PathBuf, detail: String },
    #[error("failed to decode image for {notebook}, cell {cell_index}: {detail}")]
    ImageDecodeFailure {
        notebook: String,
        cell_index: usize,
        detail: String,
    },
    #[error("unrecognized output kind {0:?}")]
    UnrecognizedOutputKind(String),
}

impl PipelineError {
    pub fn malformed(path: impl Into<PathBuf>, detail: impl ToString) -> Self {
        Self::MalformedArtifact {
            path: path.into(),
            detail: detail.to_string(),
        }
    }
}
