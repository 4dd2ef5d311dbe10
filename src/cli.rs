//! CLI argument parsing for the notebook-to-manuscript pipeline.
//!
//! The CLI only routes to workflow steps; defaults for paths that depend on
//! the results directory come from the pipeline config.
use crate::config::{default_aggregated_path, default_summary_path, DEFAULT_CONFIG_PATH};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "autopaper",
    version,
    about = "Execute analysis notebooks, aggregate their outputs, and draft a manuscript",
    after_help = "Commands:\n  run-notebooks     Execute (or reuse) configured notebooks and write the run summary\n  aggregate         Turn a run summary into aggregated_results.json plus figure files\n  write-manuscript  Draft the manuscript section by section from aggregated results\n  flow              Run all three steps in order, stopping at the first fatal failure\n  review-figures    Ask an LM to review every figure linked from the manuscript\n\nExamples:\n  autopaper flow --config configs/pipeline_config.yaml\n  autopaper run-notebooks --rerun-all\n  autopaper aggregate --summary results/notebook_summary.yaml --output results/aggregated_results.json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Pipeline config (YAML); missing keys take defaults
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    RunNotebooks(RunNotebooksArgs),
    Aggregate(AggregateArgs),
    WriteManuscript(WriteManuscriptArgs),
    Flow(FlowArgs),
    ReviewFigures(ReviewFiguresArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Execute or reuse each configured notebook and write the run summary")]
pub struct RunNotebooksArgs {
    /// Execute every notebook even when an executed artifact already exists
    #[arg(long)]
    pub rerun_all: bool,

    /// Emit debug-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Aggregate notebook outputs into a structured document")]
pub struct AggregateArgs {
    /// Path to the YAML run summary
    #[arg(long, value_name = "PATH", default_value_os_t = default_summary_path())]
    pub summary: PathBuf,

    /// Path for the aggregated JSON; figures are written beside it
    #[arg(long, value_name = "PATH", default_value_os_t = default_aggregated_path())]
    pub output: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Draft the manuscript from aggregated results")]
pub struct WriteManuscriptArgs {
    /// Aggregated results JSON (defaults to the configured path)
    #[arg(long, value_name = "PATH")]
    pub aggregated: Option<PathBuf>,

    /// LM command (overrides config and AUTOPAPER_LM_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Emit debug-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run notebooks, aggregate results, and write the manuscript")]
pub struct FlowArgs {
    /// Execute every notebook even when an executed artifact already exists
    #[arg(long)]
    pub rerun_all: bool,

    /// LM command (overrides config and AUTOPAPER_LM_COMMAND)
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Emit debug-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Review the manuscript's figures with an LM and write a JSON report")]
pub struct ReviewFiguresArgs {
    /// Manuscript Markdown (defaults to the configured path)
    #[arg(long, value_name = "PATH")]
    pub manuscript: Option<PathBuf>,

    /// Report path (defaults to <results_dir>/figure_review.json)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// LM command; `{image}` in it is replaced with the figure path
    #[arg(long, value_name = "CMD")]
    pub lm: Option<String>,

    /// Emit debug-level logs
    #[arg(long)]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        RootArgs::command().debug_assert();
    }

    #[test]
    fn aggregate_defaults_match_results_layout() {
        let args = RootArgs::parse_from(["autopaper", "aggregate"]);
        let Command::Aggregate(aggregate) = args.command else {
            panic!("expected aggregate command");
        };
        assert_eq!(aggregate.summary, PathBuf::from("results/notebook_summary.yaml"));
        assert_eq!(aggregate.output, PathBuf::from("results/aggregated_results.json"));
        assert!(!aggregate.debug);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn global_config_is_accepted_after_subcommand() {
        let args = RootArgs::parse_from(["autopaper", "flow", "--config", "c.yaml", "--rerun-all"]);
        assert_eq!(args.config, PathBuf::from("c.yaml"));
        assert!(matches!(args.command, Command::Flow(FlowArgs { rerun_all: true, .. })));
    }

    #[test]
    fn review_figures_accepts_overrides() {
        let args = RootArgs::parse_from([
            "autopaper",
            "review-figures",
            "--manuscript",
            "draft.md",
            "--lm",
            "vision {image}",
        ]);
        let Command::ReviewFigures(review) = args.command else {
            panic!("expected review-figures command");
        };
        assert_eq!(review.manuscript, Some(PathBuf::from("draft.md")));
        assert_eq!(review.lm.as_deref(), Some("vision {image}"));
        assert_eq!(review.output, None);
    }
}
