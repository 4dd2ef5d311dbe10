//! Output normalization: raw engine records to [`CellOutput`]s.
use super::{CellOutput, CellRecord};
use crate::error::PipelineError;
use crate::notebook::{mime_text, Notebook, RawOutput, IMAGE_PNG_MIME, TEXT_PLAIN_MIME};

/// Normalize one cell's raw outputs, preserving their order.
///
/// Result/display records contribute their plain text before their image.
/// Unsupported kinds are dropped with a warning.
pub fn normalize_cell(raw: &[RawOutput]) -> Vec<CellOutput> {
    let mut outputs = Vec::new();
    for record in raw {
        match record {
            RawOutput::Stream { text, .. } => outputs.push(CellOutput::Text {
                text: text.joined(),
            }),
            RawOutput::ExecuteResult { data, .. } | RawOutput::DisplayData { data, .. } => {
                let text = mime_text(data, TEXT_PLAIN_MIME);
                let image = mime_text(data, IMAGE_PNG_MIME);
                if text.is_none() && image.is_none() {
                    tracing::debug!(
                        kind = record.kind(),
                        mimes = ?data.keys().collect::<Vec<_>>(),
                        "no text or png representation"
                    );
                }
                if let Some(text) = text {
                    outputs.push(CellOutput::Text { text });
                }
                if let Some(data) = image {
                    outputs.push(CellOutput::Image { data });
                }
            }
            RawOutput::Error {
                ename,
                evalue,
                traceback,
            } => outputs.push(CellOutput::Error {
                ename: ename.clone(),
                evalue: evalue.clone(),
                traceback: traceback.clone(),
            }),
            RawOutput::Other => {
                tracing::warn!(
                    "{}; dropped",
                    PipelineError::UnrecognizedOutputKind(record.kind().to_string())
                );
            }
        }
    }
    outputs
}

/// Normalize every cell; cells without recognized outputs are omitted.
pub fn normalize_notebook(notebook: &Notebook) -> Vec<CellRecord> {
    notebook
        .cells
        .iter()
        .enumerate()
        .filter_map(|(cell_index, cell)| {
            let outputs = normalize_cell(cell.outputs());
            (!outputs.is_empty()).then_some(CellRecord {
                cell_index,
                outputs,
            })
        })
        .collect()
}
