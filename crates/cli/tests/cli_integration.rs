//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `elvtrace` binary and verify exit codes,
//! stdout and stderr. Every test runs in its own temporary directory with
//! its own data file, so no test sees another's table.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper: an `elvtrace` command rooted in `dir` with a private data file.
fn elvtrace(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("elvtrace");
    cmd.current_dir(dir)
        .env_remove("ELVTRACE_CONFIG")
        .env_remove("ELVTRACE_USER")
        .env_remove("ELVTRACE_PASSWORD")
        .env_remove("ELVTRACE_REMOTE_CREDENTIALS")
        .env_remove("ELVTRACE_PUBLIC_BASE_URL")
        .env("ELVTRACE_DATA_FILE", dir.join("trace.csv"));
    cmd
}

fn as_admin(dir: &Path) -> Command {
    let mut cmd = elvtrace(dir);
    cmd.args(["--user", "admin", "--password", "admin123"]);
    cmd
}

fn as_operator(dir: &Path) -> Command {
    let mut cmd = elvtrace(dir);
    cmd.args(["--user", "operator", "--password", "op2024"]);
    cmd
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().expect("run elvtrace");
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

/// Create a batch as operator and return its code.
fn create_batch(dir: &Path, name: &str) -> String {
    let json = json_stdout(
        as_operator(dir)
            .args(["--output", "json", "batch", "create", name])
            .arg("--out")
            .arg(dir.join("label.png")),
    );
    json["record"]["batch_code"]
        .as_str()
        .expect("batch_code")
        .to_string()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Recycled-plastic batch traceability"));
}

#[test]
fn version_exits_0() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("elvtrace"));
}

// ──────────────────────────────────────────────
// 2. Batches and stage entry
// ──────────────────────────────────────────────

#[test]
fn create_batch_writes_label_and_opening_record() {
    let tmp = TempDir::new().unwrap();
    let code = create_batch(tmp.path(), "PP plastic batch 001");
    assert_eq!(code.len(), 8);

    let png = fs::read(tmp.path().join("label.png")).unwrap();
    assert!(png.starts_with(b"\x89PNG"));

    let history = json_stdout(as_admin(tmp.path()).args(["--output", "json", "history", &code]));
    let rows = history.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["stage"], "Created");
    assert_eq!(rows[0]["operator"], "operator (label generator)");
}

#[test]
fn guest_records_stage_by_scanning() {
    let tmp = TempDir::new().unwrap();
    let code = create_batch(tmp.path(), "PE batch");

    elvtrace(tmp.path())
        .args(["record", &code.to_lowercase(), "Shipped"])
        .args(["--operator", "Alice", "--weight", "500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded Shipped"));

    let rows = json_stdout(as_admin(tmp.path()).args([
        "--output", "json", "query", "--batch", &code,
    ]));
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["stage"], "Shipped");
    assert_eq!(rows[0]["batch_name"], "PE batch");
    assert_eq!(rows[0]["weight_kg"], "500");
}

#[test]
fn record_for_unknown_batch_fails() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .args(["record", "NOPE0000", "Shipped", "--operator", "Alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    assert!(!tmp.path().join("trace.csv").exists());
}

#[test]
fn created_stage_cannot_be_submitted() {
    let tmp = TempDir::new().unwrap();
    let code = create_batch(tmp.path(), "ABS");
    elvtrace(tmp.path())
        .args(["record", &code, "Created", "--operator", "Alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("recorded by the system"));
}

// ──────────────────────────────────────────────
// 3. Access control
// ──────────────────────────────────────────────

#[test]
fn viewer_cannot_create_batch() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .args(["--user", "viewer", "--password", "view2024"])
        .args(["batch", "create", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not permitted"));
}

#[test]
fn guest_cannot_query() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .arg("query")
        .assert()
        .failure()
        .stderr(predicate::str::contains("authentication required"));
}

#[test]
fn wrong_password_fails() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .args(["--user", "admin", "--password", "nope", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid username or password"));
}

#[test]
fn json_errors_go_to_stderr() {
    let tmp = TempDir::new().unwrap();
    elvtrace(tmp.path())
        .args(["--output", "json", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("{\"error\":"));
}

// ──────────────────────────────────────────────
// 4. Query, stats, export
// ──────────────────────────────────────────────

#[test]
fn seed_demo_then_stats() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path())
        .args(["admin", "seed-demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seeded 14"));
    as_admin(tmp.path())
        .args(["admin", "seed-demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing seeded"));

    let stats = json_stdout(as_admin(tmp.path()).args(["--output", "json", "stats"]));
    assert_eq!(stats["summary"]["total_records"], 14);
    assert_eq!(stats["summary"]["distinct_batches"], 3);
}

#[test]
fn query_by_stage() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path()).args(["admin", "seed-demo"]).assert().success();
    let rows = json_stdout(as_admin(tmp.path()).args([
        "--output", "json", "query", "--stage", "Sold", "--stage", "received",
    ]));
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows
        .iter()
        .all(|r| r["stage"] == "Sold" || r["stage"] == "Received"));
}

#[test]
fn export_selected_codes_as_csv() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path()).args(["admin", "seed-demo"]).assert().success();
    let out = tmp.path().join("export.csv");
    as_operator(tmp.path())
        .args(["export", "--format", "csv", "--code", "DEMO0002", "--out"])
        .arg(&out)
        .assert()
        .success();
    let bytes = fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"\xEF\xBB\xBF"));
    let text = String::from_utf8_lossy(&bytes);
    assert_eq!(text.lines().count(), 4);
    assert!(!text.contains("DEMO0001"));
}

#[test]
fn export_xlsx_is_a_zip() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path()).args(["admin", "seed-demo"]).assert().success();
    let out = tmp.path().join("export.xlsx");
    as_admin(tmp.path())
        .args(["export", "--format", "xlsx", "--out"])
        .arg(&out)
        .assert()
        .success();
    assert!(fs::read(&out).unwrap().starts_with(b"PK"));
}

// ──────────────────────────────────────────────
// 5. Admin
// ──────────────────────────────────────────────

#[test]
fn clear_requires_yes() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path()).args(["admin", "seed-demo"]).assert().success();
    as_admin(tmp.path())
        .args(["admin", "clear"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
    as_admin(tmp.path())
        .args(["admin", "clear", "--yes"])
        .assert()
        .success();
    let rows = json_stdout(as_admin(tmp.path()).args(["--output", "json", "query"]));
    assert_eq!(rows.as_array().unwrap().len(), 0);
}

#[test]
fn backup_then_import_restores() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path()).args(["admin", "seed-demo"]).assert().success();
    let backup = tmp.path().join("backup.csv");
    as_admin(tmp.path())
        .args(["admin", "backup", "--out"])
        .arg(&backup)
        .assert()
        .success();
    as_admin(tmp.path())
        .args(["admin", "clear", "--yes"])
        .assert()
        .success();
    as_admin(tmp.path())
        .args(["admin", "import"])
        .arg(&backup)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 14"));
}

#[test]
fn storage_reports_local_when_remote_unconfigured() {
    let tmp = TempDir::new().unwrap();
    let info = json_stdout(as_admin(tmp.path()).args(["--output", "json", "admin", "storage"]));
    assert_eq!(info["backend"], "local");
    assert_eq!(info["remote_available"], false);
}

#[test]
fn unreadable_remote_credentials_fall_back_with_warning() {
    let tmp = TempDir::new().unwrap();
    as_admin(tmp.path())
        .env("ELVTRACE_REMOTE_CREDENTIALS", tmp.path().join("missing.json"))
        .args(["admin", "seed-demo"])
        .assert()
        .success()
        .stderr(predicate::str::contains("remote table disabled"));
    assert!(tmp.path().join("trace.csv").exists());
}

#[test]
fn config_file_with_unknown_key_fails() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("elvtrace.toml");
    fs::write(&config, "data_fil = \"x.csv\"\n").unwrap();
    elvtrace(tmp.path())
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
