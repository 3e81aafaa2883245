//! Error handling tests.
//!
//! Setup failures must exit non-zero with a clear message; with `--json` the
//! message is a JSON object on stderr.

use serde_json::Value;
use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

fn hret(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hret"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute hret CLI")
}

fn index_sample(dir: &TempDir) -> String {
    let corpus = dir.path().join("corpus.jsonl");
    fs::write(
        &corpus,
        "{\"id\": \"a\", \"chunk_text\": \"existential philosophy\"}\n",
    )
    .unwrap();
    let artifacts = dir.path().join("artifacts").display().to_string();
    let output = hret(&[
        "index",
        "--corpus",
        corpus.to_str().unwrap(),
        "--artifacts",
        &artifacts,
    ]);
    assert!(output.status.success());
    artifacts
}

#[test]
fn corrupt_artifact_is_fatal() {
    let dir = TempDir::new().unwrap();
    let artifacts = index_sample(&dir);
    fs::write(format!("{artifacts}/vocab.json"), "{\"existential\": 0}").unwrap();

    let output = hret(&["search", "existential", "--artifacts", &artifacts, "--json"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    let json: Value = serde_json::from_str(&stderr).unwrap_or(Value::Null);
    let message = json["error"].as_str().unwrap_or_default();
    assert!(message.contains("corrupt artifact"), "{}", stderr);
    assert!(message.contains("vocab.json"), "{}", stderr);
}

#[test]
fn partial_artifacts_are_fatal() {
    let dir = TempDir::new().unwrap();
    let artifacts = index_sample(&dir);
    fs::remove_file(format!("{artifacts}/chunks.bin")).unwrap();

    let output = hret(&["search", "existential", "--artifacts", &artifacts]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("chunks.bin"), "{}", stderr);
}

#[test]
fn malformed_corpus_reports_line() {
    let dir = TempDir::new().unwrap();
    let corpus = dir.path().join("corpus.jsonl");
    fs::write(
        &corpus,
        "{\"id\": \"a\", \"chunk_text\": \"fine\"}\n{\"id\": \"b\"}\n",
    )
    .unwrap();

    let output = hret(&[
        "index",
        "--corpus",
        corpus.to_str().unwrap(),
        "--artifacts",
        dir.path().join("artifacts").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed corpus"), "{}", stderr);
    assert!(stderr.contains("line 2"), "{}", stderr);
    assert!(!dir.path().join("artifacts").join("manifest.json").exists());
}

#[test]
fn unsupported_dataset_format() {
    let dir = TempDir::new().unwrap();
    let dataset = dir.path().join("eval.yaml");
    fs::write(&dataset, "- query: q\n  relevant_substrings: [x]\n").unwrap();

    let output = hret(&[
        "eval",
        "--dataset",
        dataset.to_str().unwrap(),
        "--offline",
        "--output-dir",
        dir.path().join("out").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unsupported format"), "{}", stderr);
}
