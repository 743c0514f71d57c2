use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskbuddy-{nanos}-{file_name}"))
}

fn buddy_with_env(store_path: &Path, args: &[&str]) -> Output {
    let exe = env!("CARGO_BIN_EXE_buddy");
    Command::new(exe)
        .args(args)
        .env("BUDDY_STORE_PATH", store_path)
        .env("BUDDY_CONFIG_PATH", temp_path("no-config.json"))
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run buddy")
}

#[test]
fn add_and_list_plain_renders_table() {
    let store_path = temp_path("cli-list-plain.json");

    let added = buddy_with_env(&store_path, &["add", "Buy milk"]);
    assert!(added.status.success());
    assert_eq!(
        String::from_utf8_lossy(&added.stdout).trim(),
        "Added task: Buy milk (1)"
    );

    let recurring = buddy_with_env(
        &store_path,
        &[
            "add",
            "Standup",
            "--every",
            "weekly",
            "--on",
            "mon,wed",
            "--start",
            "2024-01-01",
        ],
    );
    assert!(recurring.status.success());

    let listed = buddy_with_env(&store_path, &["list"]);
    std::fs::remove_file(&store_path).ok();

    assert!(listed.status.success());
    let stdout = String::from_utf8_lossy(&listed.stdout);
    assert!(stdout.contains("Title"));
    assert!(stdout.contains("Buy milk"));
    assert!(stdout.contains("weekly on Monday, Wednesday"));
    assert!(stdout.contains("2024-01-01"));
}

#[test]
fn list_on_empty_store_says_so() {
    let store_path = temp_path("cli-list-empty.json");
    let output = buddy_with_env(&store_path, &["list"]);

    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "No tasks.");
}

#[test]
fn done_and_reopen_track_completed_at() {
    let store_path = temp_path("cli-done.json");
    assert!(buddy_with_env(&store_path, &["add", "Ship release"]).status.success());

    let done = buddy_with_env(&store_path, &["done", "1", "--json"]);
    assert!(done.status.success());
    let done: serde_json::Value = serde_json::from_slice(&done.stdout).unwrap();
    assert_eq!(done["completed"], true);
    OffsetDateTime::parse(done["completed_at"].as_str().unwrap(), &Rfc3339)
        .expect("completed_at rfc3339");

    let repeat = buddy_with_env(&store_path, &["done", "1"]);
    assert_eq!(repeat.status.code(), Some(1));
    assert!(
        String::from_utf8_lossy(&repeat.stderr)
            .contains("ERROR: invalid_input - task already completed")
    );

    let reopened = buddy_with_env(&store_path, &["reopen", "1", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert!(reopened.status.success());
    let reopened: serde_json::Value = serde_json::from_slice(&reopened.stdout).unwrap();
    assert_eq!(reopened["completed"], false);
    assert!(reopened["completed_at"].is_null());
}

#[test]
fn edit_show_and_delete() {
    let store_path = temp_path("cli-edit-delete.json");
    assert!(buddy_with_env(&store_path, &["add", "Draft"]).status.success());

    let edited = buddy_with_env(&store_path, &["edit", "1", "Final draft"]);
    assert!(edited.status.success());
    assert_eq!(
        String::from_utf8_lossy(&edited.stdout).trim(),
        "Updated task: Final draft (1)"
    );

    let shown = buddy_with_env(&store_path, &["show", "1"]);
    assert!(shown.status.success());
    assert!(String::from_utf8_lossy(&shown.stdout).contains("Title:     Final draft"));

    let deleted = buddy_with_env(&store_path, &["delete", "1"]);
    assert!(deleted.status.success());

    let missing = buddy_with_env(&store_path, &["show", "1"]);
    std::fs::remove_file(&store_path).ok();

    assert_eq!(missing.status.code(), Some(1));
    assert_eq!(
        String::from_utf8_lossy(&missing.stderr).trim(),
        "ERROR: invalid_input - task not found"
    );
}

#[test]
fn corrupt_store_reports_invalid_data() {
    let store_path = temp_path("cli-corrupt.json");
    std::fs::write(&store_path, "{ not json").unwrap();

    let output = buddy_with_env(&store_path, &["generate"]);
    std::fs::remove_file(&store_path).ok();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("ERROR: invalid_data - "));
}
