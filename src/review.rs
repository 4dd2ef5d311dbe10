//! Figure review for a drafted manuscript.
//!
//! Every `![caption](path)` link in the manuscript is sent to an LM command,
//! one call per figure. The command sees the prompt on stdin; an `{image}`
//! argument in the command is replaced with the figure's path so a
//! vision-capable tool can attach the file itself.
use crate::error::PipelineError;
use crate::lm_client::{extract_json, invoke_lm_command};
use crate::util::write_atomic_json;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const REVIEW_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/figure_review.md"
));
const IMAGE_PLACEHOLDER: &str = "{image}";

/// A figure link found in the manuscript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureLink {
    pub caption: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Assessment {
    pub description: String,
    pub caption_ok: bool,
    pub suggested_caption: String,
    pub legend_issues: String,
    pub clarity: String,
}

impl Assessment {
    /// Stand-in used when the LM answer is not a JSON object.
    fn unparsed(caption: &str) -> Self {
        Self {
            description: "Error: could not parse review response".to_string(),
            caption_ok: false,
            suggested_caption: caption.to_string(),
            legend_issues: "Unable to analyze".to_string(),
            clarity: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FigureReview {
    pub image: String,
    #[serde(flatten)]
    pub assessment: Assessment,
}

/// Image links in document order. Only lines that are a link by themselves count.
pub fn parse_figure_links(markdown: &str) -> Vec<FigureLink> {
    markdown
        .lines()
        .filter_map(|line| {
            let inner = line.trim().strip_prefix("![")?.strip_suffix(')')?;
            let (caption, path) = inner.split_once("](")?;
            let path = path.trim();
            (!path.is_empty()).then(|| FigureLink {
                caption: caption.trim().to_string(),
                path: PathBuf::from(path),
            })
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct LmFigureReviewer {
    command: String,
}

impl LmFigureReviewer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn review_figure(&self, link: &FigureLink) -> Result<Assessment> {
        let image = link.path.display().to_string();
        let prompt = REVIEW_TEMPLATE
            .replace(IMAGE_PLACEHOLDER, &image)
            .replace("{caption}", &link.caption);
        let response =
            invoke_lm_command(&self.command, &prompt, &[(IMAGE_PLACEHOLDER, image.as_str())])?;
        match serde_json::from_str::<Assessment>(extract_json(&response)) {
            Ok(assessment) => Ok(assessment),
            Err(err) => {
                tracing::warn!(
                    image = %image,
                    error = %err,
                    "review response is not JSON; using fallback"
                );
                Ok(Assessment::unparsed(&link.caption))
            }
        }
    }

    /// Review every figure linked from `manuscript` and write the report to `out`.
    ///
    /// Missing images and failed LM calls are logged and left out of the report.
    pub fn review_manuscript(&self, manuscript: &Path, out: &Path) -> Result<Vec<FigureReview>> {
        if !manuscript.is_file() {
            return Err(PipelineError::MissingInput(manuscript.to_path_buf()).into());
        }
        let markdown = fs::read_to_string(manuscript)
            .with_context(|| format!("read manuscript {}", manuscript.display()))?;
        let links = parse_figure_links(&markdown);
        tracing::info!(figures = links.len(), manuscript = %manuscript.display(), "reviewing figures");

        let mut reviews = Vec::with_capacity(links.len());
        for link in &links {
            if !link.path.is_file() {
                tracing::warn!(image = %link.path.display(), "image not found; skipping review");
                continue;
            }
            match self.review_figure(link) {
                Ok(assessment) => reviews.push(FigureReview {
                    image: link.path.display().to_string(),
                    assessment,
                }),
                Err(err) => tracing::error!(
                    image = %link.path.display(),
                    error = %format!("{err:#}"),
                    "figure review failed"
                ),
            }
        }

        write_atomic_json(out, &reviews)
            .with_context(|| format!("write figure review {}", out.display()))?;
        tracing::info!(reviewed = reviews.len(), path = %out.display(), "figure review written");
        Ok(reviews)
    }
}
