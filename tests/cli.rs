//! End-to-end tests driving the `kindred` binary.
//!
//! Only the offline commands run here (init, train, moderate, stats);
//! matching and chat need live external services and are covered by the
//! library tests with in-test providers instead.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn kindred_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("kindred");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[index]
path = "{root}/data/kindred.sqlite"

[risk]
model_path = "{root}/models/risk.json"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("kindred.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_kindred(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = kindred_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run kindred binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn write_training_data(dir: &Path) -> PathBuf {
    let path = dir.join("labeled.jsonl");
    let mut lines = String::new();
    for i in 0..25 {
        lines.push_str(&format!(
            "{{\"content\": \"Today I wrote about {} small wins and took a calm walk.\", \"label\": \"benign\"}}\n",
            i
        ));
        lines.push_str(&format!(
            "{{\"content\": \"I CANNOT TAKE THIS ANYMORE!!! WHY {}?! EVERYTHING IS WRONG!!!\", \"label\": \"harmful\"}}\n",
            i
        ));
    }
    fs::write(&path, lines).unwrap();
    path
}

#[test]
fn test_init_creates_snapshot() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_kindred(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_kindred(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_kindred(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_train_writes_model_and_reports_metrics() {
    let (tmp, config_path) = setup_test_env();
    let data = write_training_data(tmp.path());

    let (stdout, stderr, success) =
        run_kindred(&config_path, &["train", data.to_str().unwrap()]);
    assert!(success, "train failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("25 safe / 25 risky"));
    assert!(stdout.contains("validation accuracy"));
    assert!(stdout.contains("model saved to"));
    assert!(stdout.contains("ok"));

    assert!(tmp.path().join("models/risk.json").exists());
}

#[test]
fn test_train_single_class_stays_untrained() {
    let (tmp, config_path) = setup_test_env();
    let data = tmp.path().join("one_class.jsonl");
    let mut lines = String::new();
    for i in 0..10 {
        lines.push_str(&format!(
            "{{\"content\": \"ordinary message number {}\", \"label\": \"benign\"}}\n",
            i
        ));
    }
    fs::write(&data, lines).unwrap();

    let (stdout, _, success) = run_kindred(&config_path, &["train", data.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("model left untrained"));
    assert!(!tmp.path().join("models/risk.json").exists());
}

#[test]
fn test_moderate_without_model_is_safe_default() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) =
        run_kindred(&config_path, &["moderate", "anything at all"]);
    assert!(success, "moderate failed: {}", stderr);
    assert!(stdout.contains("is_risky:   false"));
    assert!(stdout.contains("risk_score: 0.000"));
    assert!(stdout.contains("confidence: 0.500"));
    assert!(stderr.contains("risk model not found"));
}

#[test]
fn test_moderate_trained_model_flags_shouting() {
    let (tmp, config_path) = setup_test_env();
    let data = write_training_data(tmp.path());
    let (_, _, trained) = run_kindred(&config_path, &["train", data.to_str().unwrap()]);
    assert!(trained);

    let (stdout, _, success) = run_kindred(
        &config_path,
        &["moderate", "I CANNOT DO THIS!!! NOTHING WORKS!!! WHY?!"],
    );
    assert!(success);
    assert!(stdout.contains("is_risky:   true"), "stdout: {}", stdout);

    let (stdout, _, success) = run_kindred(
        &config_path,
        &["moderate", "I spent the afternoon reading quietly in the garden."],
    );
    assert!(success);
    assert!(stdout.contains("is_risky:   false"), "stdout: {}", stdout);
}

#[test]
fn test_match_without_snapshot_fails_clearly() {
    let (_tmp, config_path) = setup_test_env();

    let (_, stderr, success) = run_kindred(&config_path, &["match", "I feel lonely"]);
    assert!(!success);
    assert!(stderr.contains("No index snapshot"), "stderr: {}", stderr);
}

#[test]
fn test_stats_surfaces_degraded_moderation() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_kindred(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("matcher_ready:   false"));
    assert!(stdout.contains("moderator_ready: false"));
    assert!(stdout.contains("all content passes as safe"));
}

#[test]
fn test_stats_after_train_shows_moderator_ready() {
    let (tmp, config_path) = setup_test_env();
    let data = write_training_data(tmp.path());
    run_kindred(&config_path, &["train", data.to_str().unwrap()]);

    let (stdout, _, success) = run_kindred(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("moderator_ready: true"));
}
