//! Manuscript drafting from the aggregated results.
//!
//! Each section is a separate LM call so prompts stay focused and within
//! token limits. The LM is any command that reads a prompt on stdin and
//! writes the section body to stdout.
use crate::aggregate::{AggregatedDocument, AggregatedOutput};
use crate::lm_client::invoke_lm_command;
use crate::util::{truncate_string, write_atomic, write_atomic_json};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

const SECTION_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/manuscript_section.md"
));
const DEFAULT_TITLE: &str = "Untitled Manuscript";
const MAX_DIGEST_TEXT_BYTES: usize = 4_000;

/// Section heading and what the LM should cover in it.
const SECTIONS: [(&str, &str); 4] = [
    (
        "Introduction",
        "Motivate the study and state its aims. Keep claims general; the analysis details belong in later sections.",
    ),
    (
        "Methods",
        "Describe the processing and analysis steps that produced the results, inferred from the notebook outputs.",
    ),
    (
        "Results",
        "Report the quantitative findings and describe each figure in order.",
    ),
    (
        "Discussion",
        "Interpret the findings, note limitations visible in the outputs, and suggest follow-up work.",
    ),
];
const FIGURE_SECTION: &str = "Results";

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Manuscript {
    pub title: String,
    pub sections: Vec<ManuscriptSection>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ManuscriptSection {
    pub heading: String,
    pub body: String,
    pub figures: Vec<String>,
}

impl Manuscript {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n", self.title);
        for section in &self.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body.trim()));
            for (idx, figure) in section.figures.iter().enumerate() {
                out.push_str(&format!("\n![Figure {}]({figure})\n", idx + 1));
            }
        }
        out
    }
}

pub trait ManuscriptWriter {
    /// Draft a manuscript for `document` and write it to `out`.
    fn write(&self, document: &AggregatedDocument, out: &Path) -> Result<PathBuf>;
}

/// Drafts sections by invoking a local LM command once per section.
#[derive(Debug, Clone)]
pub struct LmManuscriptWriter {
    command: String,
    title: String,
}

impl LmManuscriptWriter {
    pub fn new(command: impl Into<String>, title: Option<String>) -> Self {
        Self {
            command: command.into(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        }
    }

    pub fn draft(&self, document: &AggregatedDocument) -> Result<Manuscript> {
        let digest = results_digest(document);
        let figures: Vec<String> = document
            .figure_paths()
            .map(|(_, _, path)| path.to_string())
            .collect();
        let mut sections = Vec::with_capacity(SECTIONS.len());
        for (heading, guidance) in SECTIONS {
            tracing::info!(section = heading, "drafting manuscript section");
            let prompt = build_section_prompt(&self.title, heading, guidance, &digest);
            let body = invoke_lm_command(&self.command, &prompt, &[])
                .with_context(|| format!("draft {heading} section"))?;
            sections.push(ManuscriptSection {
                heading: heading.to_string(),
                body,
                figures: if heading == FIGURE_SECTION {
                    figures.clone()
                } else {
                    Vec::new()
                },
            });
        }
        Ok(Manuscript {
            title: self.title.clone(),
            sections,
        })
    }
}

impl ManuscriptWriter for LmManuscriptWriter {
    fn write(&self, document: &AggregatedDocument, out: &Path) -> Result<PathBuf> {
        let manuscript = self.draft(document)?;
        // A published manuscript always has its JSON sidecar.
        write_atomic_json(&out.with_extension("json"), &manuscript)?;
        write_atomic(out, manuscript.to_markdown().as_bytes())
            .with_context(|| format!("write manuscript {}", out.display()))?;
        tracing::info!(path = %out.display(), "manuscript written");
        Ok(out.to_path_buf())
    }
}

fn build_section_prompt(title: &str, section: &str, guidance: &str, digest: &str) -> String {
    SECTION_TEMPLATE
        .replace("{title}", title)
        .replace("{section}", section)
        .replace("{guidance}", guidance)
        .replace("{digest}", digest)
}

/// Plain-text rendering of the aggregate for prompts.
fn results_digest(document: &AggregatedDocument) -> String {
    let mut out = String::new();
    for notebook in &document.notebooks {
        out.push_str(&format!("## Notebook: {}\n", notebook.name));
        for cell in &notebook.cells {
            out.push_str(&format!("### Cell {}\n", cell.cell_index));
            for output in &cell.outputs {
                match output {
                    AggregatedOutput::Text { text } => {
                        out.push_str(&truncate_string(text.trim_end(), MAX_DIGEST_TEXT_BYTES));
                        out.push('\n');
                    }
                    AggregatedOutput::Image { path } => {
                        out.push_str(&format!("[figure: {path}]\n"));
                    }
                    AggregatedOutput::Error { ename, evalue, .. } => {
                        out.push_str(&format!("[error: {ename}: {evalue}]\n"));
                    }
                }
            }
        }
        out.push('\n');
    }
    out
}
