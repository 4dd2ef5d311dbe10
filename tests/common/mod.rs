//! Shared test infrastructure for integration tests.
// Each test binary uses a different subset of these helpers.
#![allow(dead_code)]

use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

/// 1x1 PNG, base64-encoded as notebooks store it.
pub const TINY_PNG_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// Mock engine invocation in the form `execution.command` expects.
pub fn mock_engine_command() -> String {
    format!(
        "sh {} {{input}}",
        manifest_dir().join("tests/mock-engine.sh").display()
    )
}

pub fn mock_lm_command() -> String {
    format!("sh {}", manifest_dir().join("tests/mock-lm.sh").display())
}

/// Skip when the mock scripts cannot run on this host.
pub fn skip_if_no_shell() -> bool {
    let missing = Command::new("sh")
        .arg("-c")
        .arg("true")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_err();
    if missing {
        eprintln!("Skipping: sh not available");
    }
    missing
}

/// A scratch project: notebooks, a config, and a results directory.
pub struct Workspace {
    pub dir: TempDir,
    notebooks: Vec<PathBuf>,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
            notebooks: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn results(&self) -> PathBuf {
        self.root().join("results")
    }

    /// Add a source notebook; `executed` cells become the mock engine's output.
    pub fn add_notebook(&mut self, name: &str, executed: Option<Vec<Value>>) -> PathBuf {
        let dir = self.root().join("notebooks");
        fs::create_dir_all(&dir).expect("notebooks dir");
        let path = dir.join(name);
        fs::write(&path, notebook_json(vec![code_cell(Vec::new())])).expect("write notebook");
        if let Some(cells) = executed {
            let stem = name.trim_end_matches(".ipynb");
            fs::write(dir.join(format!("{stem}.executed.json")), notebook_json(cells))
                .expect("write executed");
        }
        self.notebooks.push(path.clone());
        path
    }

    /// Add a notebook the mock engine fails on.
    pub fn add_failing_notebook(&mut self, name: &str) -> PathBuf {
        let dir = self.root().join("notebooks");
        fs::create_dir_all(&dir).expect("notebooks dir");
        let path = dir.join(name);
        let cells = vec![json!({
            "cell_type": "code",
            "source": "1 / 0  # RAISE",
            "metadata": {},
            "outputs": [],
            "execution_count": null
        })];
        fs::write(&path, notebook_json(cells)).expect("write notebook");
        self.notebooks.push(path.clone());
        path
    }

    /// List a notebook in the config without creating it.
    pub fn add_missing_notebook(&mut self, name: &str) -> PathBuf {
        let path = self.root().join("notebooks").join(name);
        self.notebooks.push(path.clone());
        path
    }

    pub fn write_config(&self, extra: &str) -> PathBuf {
        let mut yaml = String::from(if self.notebooks.is_empty() {
            "notebooks: []\n"
        } else {
            "notebooks:\n"
        });
        for notebook in &self.notebooks {
            yaml.push_str(&format!("  - {}\n", notebook.display()));
        }
        yaml.push_str(&format!(
            "output:\n  results_dir: {}\nexecution:\n  command: \"{}\"\n  timeout_seconds: 30\n",
            self.results().display(),
            mock_engine_command()
        ));
        yaml.push_str(extra);
        let path = self.root().join("pipeline_config.yaml");
        fs::write(&path, yaml).expect("write config");
        path
    }

    /// Run the binary from the workspace root with a clean LM environment.
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_autopaper"))
            .args(args)
            .current_dir(self.root())
            .env_remove("AUTOPAPER_LM_COMMAND")
            .env_remove("RUST_LOG")
            .output()
            .expect("spawn autopaper")
    }

    pub fn read_summary(&self) -> serde_yaml::Value {
        let text = fs::read_to_string(self.results().join("notebook_summary.yaml"))
            .expect("read summary");
        serde_yaml::from_str(&text).expect("parse summary")
    }

    pub fn read_aggregate(&self) -> Value {
        let text = fs::read_to_string(self.results().join("aggregated_results.json"))
            .expect("read aggregate");
        serde_json::from_str(&text).expect("parse aggregate")
    }
}

pub fn notebook_json(cells: Vec<Value>) -> String {
    json!({
        "cells": cells,
        "metadata": {},
        "nbformat": 4,
        "nbformat_minor": 5
    })
    .to_string()
}

pub fn code_cell(outputs: Vec<Value>) -> Value {
    json!({
        "cell_type": "code",
        "source": "",
        "metadata": {},
        "outputs": outputs,
        "execution_count": 1
    })
}

pub fn stream(text: &str) -> Value {
    json!({"output_type": "stream", "name": "stdout", "text": text})
}

pub fn execute_result(text: &str) -> Value {
    json!({
        "output_type": "execute_result",
        "execution_count": 1,
        "data": {"text/plain": text},
        "metadata": {}
    })
}

pub fn png_display() -> Value {
    json!({
        "output_type": "display_data",
        "data": {"image/png": TINY_PNG_B64},
        "metadata": {}
    })
}

pub fn assert_success(output: &Output) {
    assert!(
        output.status.success(),
        "autopaper failed ({}):\n{}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );
}
