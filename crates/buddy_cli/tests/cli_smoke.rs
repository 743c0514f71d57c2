use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn missing_config() -> std::path::PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("taskbuddy-{nanos}-no-config.json"))
}

#[test]
fn cli_smoke_help() {
    let exe = env!("CARGO_BIN_EXE_buddy");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("failed to run buddy --help");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("serve"));
}

#[test]
fn unknown_command_reports_invalid_input() {
    let exe = env!("CARGO_BIN_EXE_buddy");
    let output = Command::new(exe)
        .arg("frobnicate")
        .env("BUDDY_CONFIG_PATH", missing_config())
        .output()
        .expect("failed to run buddy");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: invalid_input - "));
}

#[test]
fn unknown_config_override_is_rejected() {
    let exe = env!("CARGO_BIN_EXE_buddy");
    let output = Command::new(exe)
        .args(["list", "--config-override", "theme=dark"])
        .env("BUDDY_CONFIG_PATH", missing_config())
        .output()
        .expect("failed to run buddy list");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - --config-override: unknown config field 'theme'"));
}
