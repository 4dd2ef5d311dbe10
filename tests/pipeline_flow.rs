//! End-to-end runs of the notebook step and the full flow against a mock engine.

mod common;

use common::{
    assert_success, code_cell, execute_result, mock_lm_command, png_display, skip_if_no_shell,
    stream, Workspace,
};
use std::fs;

#[test]
fn hello_notebook_produces_summary_and_aggregate() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    ws.add_notebook(
        "hello.ipynb",
        Some(vec![code_cell(vec![stream("hello\n"), execute_result("42")])]),
    );
    let config = ws.write_config("");

    let output = ws.run(&["flow", "--config", config.to_str().expect("utf-8 path")]);
    assert_success(&output);

    let summary = ws.read_summary();
    let expected: serde_yaml::Value = serde_yaml::from_str(
        "hello.ipynb:\n  - cell_index: 0\n    outputs:\n      - type: text\n        text: \"hello\\n\"\n      - type: text\n        text: \"42\"\n",
    )
    .expect("expected yaml");
    assert_eq!(summary, expected);

    assert!(ws.results().join("notebooks/hello.ipynb").is_file());
    let aggregate = ws.read_aggregate();
    assert_eq!(aggregate["notebooks"][0]["name"], "hello.ipynb");
    assert_eq!(
        aggregate["notebooks"][0]["cells"][0]["outputs"][1]["text"],
        "42"
    );
    assert!(!ws.results().join("figures").exists());
    // No LM configured: the manuscript step is skipped, not failed.
    assert!(!ws.results().join("manuscript.md").exists());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Processing"), "transcript missing: {stdout}");
    assert!(stdout.contains("[STREAM]"), "transcript missing: {stdout}");
}

#[test]
fn failing_notebook_is_isolated() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    ws.add_notebook("good.ipynb", Some(vec![code_cell(vec![stream("ok\n")])]));
    ws.add_failing_notebook("bad.ipynb");
    let config = ws.write_config("");

    let output = ws.run(&["run-notebooks", "--config", config.to_str().expect("utf-8 path")]);
    assert_success(&output);

    let summary = ws.read_summary();
    let map = summary.as_mapping().expect("summary mapping");
    assert_eq!(map.len(), 1);
    assert!(summary.get("good.ipynb").is_some());
    assert!(summary.get("bad.ipynb").is_none());
    assert!(!ws.results().join("notebooks/bad.ipynb").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bad.ipynb"), "failure not logged: {stderr}");
}

#[test]
fn cached_artifact_is_reused_until_rerun_all() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    let source = ws.add_notebook("cached.ipynb", Some(vec![code_cell(vec![stream("v1\n")])]));
    let config = ws.write_config("");
    let config = config.to_str().expect("utf-8 path");

    assert_success(&ws.run(&["run-notebooks", "--config", config]));

    // Make the source unrunnable: only a fresh execution would notice.
    fs::write(
        &source,
        common::notebook_json(vec![serde_json::json!({
            "cell_type": "code",
            "source": "# RAISE",
            "metadata": {},
            "outputs": [],
            "execution_count": null
        })]),
    )
    .expect("rewrite source");

    assert_success(&ws.run(&["run-notebooks", "--config", config]));
    assert!(ws.read_summary().get("cached.ipynb").is_some());

    assert_success(&ws.run(&["run-notebooks", "--config", config, "--rerun-all"]));
    assert!(ws.read_summary().get("cached.ipynb").is_none());
    // The failed rerun leaves the previous artifact in place.
    assert!(ws.results().join("notebooks/cached.ipynb").is_file());
}

#[test]
fn missing_notebook_is_created_and_yields_no_outputs() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    let missing = ws.add_missing_notebook("fresh.ipynb");
    let config = ws.write_config("");

    let output = ws.run(&["run-notebooks", "--config", config.to_str().expect("utf-8 path")]);
    assert_success(&output);

    assert!(missing.is_file(), "empty notebook should be synthesized");
    let summary = ws.read_summary();
    let records = summary.get("fresh.ipynb").expect("fresh entry");
    assert!(records.as_sequence().expect("record list").is_empty());
}

#[test]
fn flow_with_lm_writes_manuscript_with_figures() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    ws.add_notebook(
        "plots.ipynb",
        Some(vec![
            code_cell(vec![stream("mean = 3.2\n")]),
            code_cell(vec![png_display()]),
        ]),
    );
    let config = ws.write_config("manuscript:\n  title: Mock Study\n");

    let output = ws.run(&[
        "flow",
        "--config",
        config.to_str().expect("utf-8 path"),
        "--lm",
        &mock_lm_command(),
    ]);
    assert_success(&output);

    let figure = ws.results().join("figures/plots/cell_1.png");
    assert!(figure.is_file(), "figure not written");
    assert_eq!(&fs::read(&figure).expect("figure")[..4], b"\x89PNG");

    let manuscript =
        fs::read_to_string(ws.results().join("manuscript.md")).expect("read manuscript");
    assert!(manuscript.starts_with("# Mock Study\n"));
    for section in ["Introduction", "Methods", "Results", "Discussion"] {
        assert!(
            manuscript.contains(&format!("## {section}\n\nMock {section} text.")),
            "{section} missing:\n{manuscript}"
        );
    }
    assert!(manuscript.contains(&format!("![Figure 1]({})", figure.display())));
    assert!(ws.results().join("manuscript.json").is_file());
}

#[test]
fn write_manuscript_without_lm_fails() {
    if skip_if_no_shell() {
        return;
    }
    let ws = Workspace::new();
    let config = ws.write_config("");

    let output = ws.run(&["write-manuscript", "--config", config.to_str().expect("utf-8 path")]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no LM command configured"), "{stderr}");
}

#[test]
fn review_figures_reports_each_manuscript_figure() {
    if skip_if_no_shell() {
        return;
    }
    let mut ws = Workspace::new();
    ws.add_notebook("plots.ipynb", Some(vec![code_cell(vec![png_display()])]));
    let config = ws.write_config("");
    let config = config.to_str().expect("utf-8 path");
    let lm = mock_lm_command();

    assert_success(&ws.run(&["flow", "--config", config, "--lm", &lm]));
    let output = ws.run(&["review-figures", "--config", config, "--lm", &lm]);
    assert_success(&output);

    let text = fs::read_to_string(ws.results().join("figure_review.json")).expect("read review");
    let report: serde_json::Value = serde_json::from_str(&text).expect("parse review");
    let entries = report.as_array().expect("review list");
    assert_eq!(entries.len(), 1);
    let figure = ws.results().join("figures/plots/cell_0.png");
    assert_eq!(entries[0]["image"], figure.display().to_string());
    assert_eq!(entries[0]["caption_ok"], true);
    assert_eq!(entries[0]["suggested_caption"], "Figure 1");
}

#[test]
fn review_figures_without_manuscript_fails() {
    let ws = Workspace::new();
    let config = ws.write_config("");
    let output = ws.run(&[
        "review-figures",
        "--config",
        config.to_str().expect("utf-8 path"),
        "--lm",
        "sh -c 'cat'",
    ]);
    assert!(!output.status.success());
    assert!(!ws.results().join("figure_review.json").exists());
}
