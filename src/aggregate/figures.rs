use crate::error::PipelineError;
use crate::util::write_atomic;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const NOTEBOOK_EXTENSION: &str = ".ipynb";

/// Hands each notebook of one aggregation its own directory under `figures/`.
///
/// The directory is the notebook name without `.ipynb`. Names that reduce to
/// the same stem (`a.ipynb` and `a`) get `a`, then `a_2`, `a_3`, and so on.
#[derive(Debug, Default)]
pub struct FigureDirs {
    used: HashSet<String>,
}

impl FigureDirs {
    pub fn assign(&mut self, notebook: &str) -> Result<String> {
        let stem = notebook_stem(notebook)?;
        let mut dir = stem.to_string();
        let mut suffix = 2;
        while !self.used.insert(dir.clone()) {
            dir = format!("{stem}_{suffix}");
            suffix += 1;
        }
        if dir != stem {
            tracing::warn!(
                notebook,
                dir = %dir,
                "figure directory already taken by another notebook"
            );
        }
        Ok(dir)
    }
}

/// Figure location for the `ordinal`-th image of a cell.
///
/// The first image keeps the plain `cell_<index>.png` name; later ones get a
/// suffix so no two images of a run share a path.
pub fn figure_path(output_root: &Path, dir: &str, cell_index: usize, ordinal: usize) -> PathBuf {
    let file_name = if ordinal == 0 {
        format!("cell_{cell_index}.png")
    } else {
        format!("cell_{cell_index}_{ordinal}.png")
    };
    output_root.join("figures").join(dir).join(file_name)
}

/// Decode a base64 PNG payload and write it to `path`.
pub fn save_image(path: &Path, notebook: &str, cell_index: usize, payload: &str) -> Result<()> {
    let bytes = decode_payload(payload).map_err(|detail| PipelineError::ImageDecodeFailure {
        notebook: notebook.to_string(),
        cell_index,
        detail,
    })?;
    write_atomic(path, &bytes).with_context(|| format!("save figure {}", path.display()))
}

fn decode_payload(payload: &str) -> Result<Vec<u8>, String> {
    // nbformat writers may wrap base64 across lines.
    let compact: String = payload
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err("empty image payload".to_string());
    }
    STANDARD.decode(compact.as_bytes()).map_err(|err| err.to_string())
}

fn notebook_stem(notebook: &str) -> Result<&str> {
    let stem = notebook.strip_suffix(NOTEBOOK_EXTENSION).unwrap_or(notebook);
    let unsafe_name = stem.is_empty()
        || stem == "."
        || stem == ".."
        || stem.contains('/')
        || stem.contains('\\');
    if unsafe_name {
        return Err(anyhow!("notebook name {notebook:?} cannot name a figure directory"));
    }
    Ok(stem)
}
