use assert_cmd::Command;
use chrono::Utc;

use studytime::session::SessionKind;
use studytime::store::{storage_timestamp, SessionStore, SqliteStore};

fn studytime(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("studytime").unwrap();
    // Keep the user's real config and state directories out of the run.
    cmd.env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("RUST_LOG", "warn")
        .arg("--config")
        .arg(dir.path().join("config.json"));
    cmd
}

fn seed(path: &std::path::Path, time: u64, blocks: u32, kind: SessionKind) {
    let mut store = SqliteStore::open(path).unwrap();
    store
        .insert(time, blocks, &storage_timestamp(&Utc::now()), kind)
        .unwrap();
    store.close().unwrap();
}

#[test]
fn summary_json_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sessions.db");

    let output = studytime(&dir)
        .args(["summary", "--json", "--data-path"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["days"].as_array().unwrap().len(), 7);
    assert_eq!(summary["total_time"], 0);
    assert_eq!(summary["avg_time_per_block_secs"], 0.0);
}

#[test]
fn summary_reports_seeded_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sessions.db");
    seed(&db, 3000, 2, SessionKind::Pomodoro);
    seed(&db, 600, 0, SessionKind::Timer);

    let output = studytime(&dir)
        .args(["summary", "--json", "--data-path"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["total_time"], 3600);
    assert_eq!(summary["total_blocks"], 2);
    assert_eq!(summary["avg_time_per_block_secs"], 1800.0);

    let text = studytime(&dir)
        .args(["summary", "--data-path"])
        .arg(&db)
        .output()
        .unwrap();
    assert!(text.status.success());
    let text = String::from_utf8(text.stdout).unwrap();
    assert!(text.contains("Total:          1h 00m"));
    assert!(text.contains("Blocks:         2"));
}

#[test]
fn export_writes_csv_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("sessions.db");
    let out = dir.path().join("export.csv");
    seed(&db, 1500, 1, SessionKind::Pomodoro);

    studytime(&dir)
        .args(["export", "--days", "3", "--data-path"])
        .arg(&db)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,time,blocks,timestamp,type");
    assert!(lines[1].starts_with("1,1500,1,"));
    assert!(lines[1].ends_with(",pomodoro"));
}

#[test]
fn tui_refuses_to_start_without_a_tty() {
    let dir = tempfile::tempdir().unwrap();
    studytime(&dir).write_stdin("").assert().failure();
}
