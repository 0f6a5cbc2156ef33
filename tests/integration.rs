use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn stx_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("stx");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("sections.json"),
        r#"[
            {"Section": "378", "section_title": "Theft", "section_desc": "Whoever, intending to take dishonestly any movable property out of the possession of any person...", "chapter": "17", "chapter_title": "Of Offences Against Property"},
            {"Section": "379", "section_title": "Punishment for theft", "section_desc": "Whoever commits theft shall be punished with imprisonment...", "chapter": "17", "chapter_title": "Of Offences Against Property"},
            {"Section": "390", "section_title": "Robbery", "section_desc": "In all robbery there is either theft or extortion..."}
        ]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[corpus]
path = "{root}/data/sections.json"

[db]
path = "{root}/data/stx.sqlite"

[index]
collection = "test_statutes"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("stx.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_stx(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = stx_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("GROQ_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run stx binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_stx(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_stx(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_stx(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_ingest_dry_run_counts_documents() {
    let (_tmp, config_path) = setup_test_env();

    run_stx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_stx(&config_path, &["ingest", "--dry-run"]);
    assert!(success, "dry-run failed: stderr={}", stderr);
    assert!(stdout.contains("corpus records: 3"));
    assert!(stdout.contains("documents: 3"));
}

#[test]
fn test_ingest_missing_corpus_reports_not_found() {
    let (tmp, config_path) = setup_test_env();
    fs::remove_file(tmp.path().join("data/sections.json")).unwrap();

    run_stx(&config_path, &["init"]);
    let (_, stderr, success) = run_stx(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("corpus file not found"), "stderr={}", stderr);
}

#[test]
fn test_ingest_malformed_corpus_reported() {
    let (tmp, config_path) = setup_test_env();
    fs::write(
        tmp.path().join("data/sections.json"),
        "{\"not\": \"an array\"}",
    )
    .unwrap();

    run_stx(&config_path, &["init"]);
    let (_, stderr, success) = run_stx(&config_path, &["ingest"]);
    assert!(!success);
    assert!(
        stderr.contains("not a JSON array of section records"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_ingest_with_disabled_embeddings_fails() {
    let (_tmp, config_path) = setup_test_env();

    run_stx(&config_path, &["init"]);
    let (_, stderr, success) = run_stx(&config_path, &["ingest"]);
    assert!(!success);
    assert!(stderr.contains("disabled"), "stderr={}", stderr);
}

#[test]
fn test_search_requires_embeddings() {
    let (_tmp, config_path) = setup_test_env();

    run_stx(&config_path, &["init"]);
    let (_, stderr, success) = run_stx(&config_path, &["search", "theft"]);
    assert!(!success);
    assert!(stderr.contains("requires embeddings"), "stderr={}", stderr);
}

#[test]
fn test_stats_on_empty_collection() {
    let (_tmp, config_path) = setup_test_env();

    run_stx(&config_path, &["init"]);
    let (stdout, stderr, success) = run_stx(&config_path, &["stats"]);
    assert!(success, "stats failed: stderr={}", stderr);
    assert!(stdout.contains("Sections:     0"));
    assert!(stdout.contains("never"));
}

#[test]
fn test_ask_without_api_key_reports_missing_configuration() {
    let (_tmp, config_path) = setup_test_env();

    run_stx(&config_path, &["init"]);
    // A missing provider key is a terminal, reported outcome — not a crash
    // and not a retry loop.
    let (_, stderr, success) = run_stx(&config_path, &["ask", "what is theft?"]);
    assert!(success, "ask should report, not fail: stderr={}", stderr);
    assert!(
        stderr.contains("Missing configuration: GROQ_API_KEY"),
        "stderr={}",
        stderr
    );
}
