//! Aggregation: turn the run summary into a file-referencing document.
//!
//! Images are decoded to `figures/` under the aggregate's directory and
//! referenced by path; a bad image is dropped without aborting the document.
mod figures;

use crate::error::PipelineError;
use crate::summary::{load_summary, CellOutput, RunSummary};
use crate::util::write_atomic_json;
use anyhow::{anyhow, Context, Result};
use figures::{figure_path, save_image, FigureDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregatedDocument {
    pub notebooks: Vec<NotebookEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotebookEntry {
    pub name: String,
    pub cells: Vec<CellEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CellEntry {
    pub cell_index: usize,
    pub outputs: Vec<AggregatedOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AggregatedOutput {
    Text {
        text: String,
    },
    Image {
        path: String,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
}

impl AggregatedDocument {
    /// Image paths in notebook, cell, and output order.
    pub fn figure_paths(&self) -> impl Iterator<Item = (&str, usize, &str)> {
        self.notebooks.iter().flat_map(|notebook| {
            notebook.cells.iter().flat_map(move |cell| {
                cell.outputs.iter().filter_map(move |output| match output {
                    AggregatedOutput::Image { path } => {
                        Some((notebook.name.as_str(), cell.cell_index, path.as_str()))
                    }
                    _ => None,
                })
            })
        })
    }
}

/// Build the aggregate for `summary`, saving figures under `output_root`.
pub fn build_document(summary: &RunSummary, output_root: &Path) -> AggregatedDocument {
    if summary.is_empty() {
        tracing::warn!("run summary lists no notebooks");
    }
    let mut notebooks = Vec::with_capacity(summary.len());
    let mut figure_dirs = FigureDirs::default();
    for (name, cells) in summary.iter() {
        tracing::info!(notebook = name, cells = cells.len(), "aggregating notebook");
        let figure_dir = figure_dirs.assign(name);
        let mut entry = NotebookEntry {
            name: name.to_string(),
            cells: Vec::with_capacity(cells.len()),
        };
        for cell in cells {
            let mut outputs = Vec::with_capacity(cell.outputs.len());
            let mut image_ordinal = 0;
            for output in &cell.outputs {
                match output {
                    CellOutput::Text { text } => {
                        outputs.push(AggregatedOutput::Text { text: text.clone() })
                    }
                    CellOutput::Image { data } => {
                        let ordinal = image_ordinal;
                        image_ordinal += 1;
                        let saved = match &figure_dir {
                            Ok(dir) => {
                                let path = figure_path(output_root, dir, cell.cell_index, ordinal);
                                save_image(&path, name, cell.cell_index, data).map(|()| path)
                            }
                            Err(err) => Err(anyhow!("{err:#}")),
                        };
                        match saved {
                            Ok(path) => {
                                tracing::info!(
                                    notebook = name,
                                    cell_index = cell.cell_index,
                                    path = %path.display(),
                                    "saved figure"
                                );
                                outputs.push(AggregatedOutput::Image {
                                    path: path.display().to_string(),
                                });
                            }
                            Err(err) => tracing::error!(
                                notebook = name,
                                cell_index = cell.cell_index,
                                error = %format!("{err:#}"),
                                "skipping image"
                            ),
                        }
                    }
                    CellOutput::Error {
                        ename,
                        evalue,
                        traceback,
                    } => outputs.push(AggregatedOutput::Error {
                        ename: ename.clone(),
                        evalue: evalue.clone(),
                        traceback: traceback.clone(),
                    }),
                }
            }
            entry.cells.push(CellEntry {
                cell_index: cell.cell_index,
                outputs,
            });
        }
        notebooks.push(entry);
    }
    AggregatedDocument { notebooks }
}

/// Load the summary at `summary_path`, write figures and the aggregate JSON.
///
/// Figures land under the aggregate's parent directory. A missing or
/// malformed summary and an unwritable aggregate are fatal.
pub fn aggregate_summary(summary_path: &Path, out_path: &Path) -> Result<AggregatedDocument> {
    tracing::info!(summary = %summary_path.display(), "aggregating notebook summary");
    let summary = load_summary(summary_path)?;
    let output_root = out_path.parent().unwrap_or_else(|| Path::new(""));
    let document = build_document(&summary, output_root);
    write_atomic_json(out_path, &document)
        .with_context(|| format!("write aggregated results {}", out_path.display()))?;
    tracing::info!(
        notebooks = document.notebooks.len(),
        figures = document.figure_paths().count(),
        output = %out_path.display(),
        "aggregated results written"
    );
    Ok(document)
}

/// Read an aggregate written by [`aggregate_summary`].
pub fn load_document(path: &Path) -> Result<AggregatedDocument> {
    if !path.is_file() {
        return Err(PipelineError::MissingInput(path.to_path_buf()).into());
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    let document = serde_json::from_slice(&bytes)
        .map_err(|err| PipelineError::malformed(path, err))?;
    Ok(document)
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
