use repovault::Config;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Integration tests for repovault CLI commands
/// These tests run the built binary and verify its behavior offline

fn repovault(temp_dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_repovault"))
        .args(args)
        .env("XDG_CONFIG_HOME", temp_dir.path())
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute repovault")
}

#[test]
fn test_cli_help() {
    let temp_dir = TempDir::new().unwrap();
    let output = repovault(&temp_dir, &["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["init", "auth", "list", "sync"] {
        assert!(stdout.contains(command), "help is missing {}", command);
    }
}

#[test]
fn test_cli_version() {
    let temp_dir = TempDir::new().unwrap();
    let output = repovault(&temp_dir, &["--version"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("repovault"));
}

#[test]
fn test_sync_help_lists_overrides() {
    let temp_dir = TempDir::new().unwrap();
    let output = repovault(&temp_dir, &["sync", "--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--timeout",
        "--max-retries",
        "--no-branches",
        "--gists",
        "--no-repos",
        "--json",
    ] {
        assert!(stdout.contains(flag), "sync help is missing {}", flag);
    }
}

#[test]
fn test_init_writes_config_and_mirror_root() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("custom").join("config.yml");
    let mirror_root = temp_dir.path().join("mirrors");

    let output = repovault(
        &temp_dir,
        &[
            "--config",
            config_path.to_str().unwrap(),
            "init",
            "--mirror-root",
            mirror_root.to_str().unwrap(),
        ],
    );

    assert!(
        output.status.success(),
        "init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("initialized"));
    assert!(mirror_root.is_dir());

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.mirror_root, mirror_root.to_str().unwrap());
    assert_eq!(config.sync.max_retries, 5);
}

#[test]
fn test_invalid_command() {
    let temp_dir = TempDir::new().unwrap();
    let output = repovault(&temp_dir, &["nonexistent-command"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error") || stderr.contains("unrecognized"));
}

#[test]
fn test_error_handling_invalid_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("invalid-config.yml");
    std::fs::write(&config_path, "invalid: yaml: content: [").unwrap();

    let output = repovault(
        &temp_dir,
        &["--config", config_path.to_str().unwrap(), "list"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to parse config file"), "{}", stderr);
}

#[test]
fn test_auth_status_reports_unknown_method() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    std::fs::write(
        &config_path,
        "mirror_root: \"/tmp/repovault-test\"\ngithub:\n  auth_method: \"password\"\n",
    )
    .unwrap();

    let output = repovault(
        &temp_dir,
        &["--config", config_path.to_str().unwrap(), "auth", "status"],
    );

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Authentication failed"), "{}", stdout);
    assert!(stdout.contains("Unknown auth method"), "{}", stdout);
}
