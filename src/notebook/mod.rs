//! Notebook documents as produced by the execution engine (nbformat v4).
//!
//! Only the fields the pipeline reads are typed; everything else rides along
//! in flattened maps. Raw outputs are a closed tagged union so that loosely
//! shaped engine output is classified once, at ingestion.
mod execute;
mod render;

pub use execute::{CommandExecutor, NotebookExecutor};
pub use render::render_notebook;

use crate::error::PipelineError;
use crate::util::write_atomic;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

pub const IMAGE_PNG_MIME: &str = "image/png";
pub const TEXT_PLAIN_MIME: &str = "text/plain";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notebook {
    #[serde(default)]
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
    #[serde(default)]
    pub nbformat_minor: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cell {
    pub cell_type: String,
    #[serde(default)]
    pub source: MultilineText,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<RawOutput>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Cell {
    pub fn outputs(&self) -> &[RawOutput] {
        self.outputs.as_deref().unwrap_or_default()
    }
}

/// nbformat stores text either as one string or as a list of line fragments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MultilineText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineText {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl MultilineText {
    /// Fragments are concatenated verbatim; they already carry their newlines.
    pub fn joined(&self) -> String {
        match self {
            Self::Single(text) => text.clone(),
            Self::Lines(lines) => lines.concat(),
        }
    }
}

/// One raw output record, keyed on `output_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum RawOutput {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(default)]
        text: MultilineText,
    },
    ExecuteResult {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    DisplayData {
        #[serde(default)]
        data: Map<String, Value>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
    #[serde(other)]
    Other,
}

impl RawOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stream { .. } => "stream",
            Self::ExecuteResult { .. } => "execute_result",
            Self::DisplayData { .. } => "display_data",
            Self::Error { .. } => "error",
            Self::Other => "other",
        }
    }
}

/// Read a string-or-lines mime value, the way nbformat stores text payloads.
pub fn mime_text(bundle: &Map<String, Value>, mime: &str) -> Option<String> {
    match bundle.get(mime)? {
        Value::String(text) => Some(text.clone()),
        Value::Array(parts) => Some(
            parts
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .concat(),
        ),
        _ => None,
    }
}

fn default_nbformat() -> u32 {
    4
}

impl Notebook {
    /// A fresh v4 notebook with no cells.
    pub fn empty() -> Self {
        Self {
            cells: Vec::new(),
            metadata: Map::new(),
            nbformat: 4,
            nbformat_minor: 5,
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self).context("serialize notebook")?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Load a previously executed notebook artifact.
pub fn load_notebook(path: &Path) -> Result<Notebook> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(path.to_path_buf()).into());
    }
    let bytes = fs::read(path).with_context(|| format!("read notebook {}", path.display()))?;
    let notebook = Notebook::from_slice(&bytes).map_err(|err| PipelineError::malformed(path, err))?;
    Ok(notebook)
}

/// Create an empty notebook at `path` if nothing is there yet.
///
/// Returns true when a notebook was synthesized.
pub fn ensure_notebook_exists(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    let bytes = Notebook::empty().to_bytes()?;
    write_atomic(path, &bytes).with_context(|| format!("create empty notebook {}", path.display()))?;
    Ok(true)
}
