use super::{mime_text, Notebook, RawOutput, IMAGE_PNG_MIME, TEXT_PLAIN_MIME};
use std::io::{self, Write};

const CELL_RULE_WIDTH: usize = 80;
const OUTPUT_RULE_WIDTH: usize = 40;

/// Write every cell and output of `notebook` to an operator transcript.
///
/// Images are announced, not dumped.
pub fn render_notebook(notebook: &Notebook, out: &mut dyn Write) -> io::Result<()> {
    let cell_rule = "=".repeat(CELL_RULE_WIDTH);
    let output_rule = "-".repeat(OUTPUT_RULE_WIDTH);
    for (idx, cell) in notebook.cells.iter().enumerate() {
        writeln!(out, "\n{cell_rule}")?;
        writeln!(out, "CELL {idx} [{}]", cell.cell_type.to_ascii_uppercase())?;
        writeln!(out, "{cell_rule}")?;
        writeln!(out, "{}", cell.source.joined())?;

        let outputs = cell.outputs();
        if outputs.is_empty() {
            continue;
        }
        writeln!(out, "\n{output_rule} OUTPUTS {output_rule}")?;
        for output in outputs {
            match output {
                RawOutput::Stream { text, .. } => {
                    writeln!(out, "[STREAM]:\n{}", text.joined())?;
                }
                RawOutput::ExecuteResult { data, .. } | RawOutput::DisplayData { data, .. } => {
                    if let Some(text) = mime_text(data, TEXT_PLAIN_MIME) {
                        writeln!(out, "[TEXT]:\n{text}")?;
                    }
                    if data.contains_key(IMAGE_PNG_MIME) {
                        writeln!(out, "[IMAGE]: png payload (not displayed)")?;
                    }
                }
                RawOutput::Error {
                    ename,
                    evalue,
                    traceback,
                } => {
                    writeln!(out, "[ERROR]: {ename}: {evalue}")?;
                    for line in traceback {
                        writeln!(out, "{line}")?;
                    }
                }
                RawOutput::Other => writeln!(out, "[UNSUPPORTED OUTPUT]")?,
            }
        }
    }
    Ok(())
}
