//! The run summary: normalized outputs per notebook, in execution order.
//!
//! This is the durable handoff between notebook execution and aggregation.
mod normalize;

pub use normalize::normalize_notebook;

use crate::error::PipelineError;
use crate::util::write_atomic;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

/// One normalized cell output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellOutput {
    Text {
        text: String,
    },
    /// Base64-encoded PNG payload, exactly as the engine produced it.
    Image {
        data: String,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellRecord {
    pub cell_index: usize,
    #[serde(default, deserialize_with = "recognized_outputs")]
    pub outputs: Vec<CellOutput>,
}

/// Keep the output entries we understand; log and drop the rest.
fn recognized_outputs<'de, D>(deserializer: D) -> Result<Vec<CellOutput>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<serde_yaml::Value>::deserialize(deserializer)?;
    let mut outputs = Vec::with_capacity(raw.len());
    for value in raw {
        let kind = value
            .get("type")
            .and_then(serde_yaml::Value::as_str)
            .unwrap_or("<untyped>")
            .to_string();
        match serde_yaml::from_value::<CellOutput>(value) {
            Ok(output) => outputs.push(output),
            Err(err) => {
                tracing::warn!(error = %err, "{}; skipped", PipelineError::UnrecognizedOutputKind(kind));
            }
        }
    }
    Ok(outputs)
}

/// Notebook basename -> cell records, in configuration order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct RunSummary {
    notebooks: IndexMap<String, Vec<CellRecord>>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, notebook: impl Into<String>, cells: Vec<CellRecord>) {
        self.notebooks.insert(notebook.into(), cells);
    }

    pub fn len(&self) -> usize {
        self.notebooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[CellRecord])> {
        self.notebooks
            .iter()
            .map(|(name, cells)| (name.as_str(), cells.as_slice()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("serialize run summary")
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

#[cfg(test)]
impl RunSummary {
    pub fn get(&self, notebook: &str) -> Option<&[CellRecord]> {
        self.notebooks.get(notebook).map(Vec::as_slice)
    }

    pub fn contains(&self, notebook: &str) -> bool {
        self.notebooks.contains_key(notebook)
    }
}

/// Persist the summary, replacing any previous one atomically.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<()> {
    let text = summary.to_yaml()?;
    write_atomic(path, text.as_bytes())
        .with_context(|| format!("write run summary {}", path.display()))
}

/// Load a summary written by [`write_summary`].
pub fn load_summary(path: &Path) -> Result<RunSummary> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(path.to_path_buf()).into());
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let summary = RunSummary::from_yaml(&text).map_err(|err| PipelineError::malformed(path, err))?;
    Ok(summary)
}
