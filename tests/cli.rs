//! The `stitch` binary end to end, without contacting any host.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const CONFIG: &str = r"
hosts:
  h1:
    hostname: h1.example.com
sites:
  base:
    on_hosts: h1
    project_name: base
    original_settings: base.settings
roles: {}
";

fn stitch(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stitch"))
        .args(args)
        .current_dir(dir)
        .env_remove("STITCH_HOST")
        .env_remove("STITCH_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn dotenv_next_to_config_selects_host() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("stitch.yml"), CONFIG).unwrap();
    std::fs::write(dir.path().join(".env"), "STITCH_HOST=h1\n").unwrap();

    let output = stitch(dir.path(), &["--output", "json", "show", "base"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["host"], "h1");
    assert_eq!(shown["site"], "base");
}

#[test]
fn dotenv_follows_explicit_config_path() {
    let dir = TempDir::new().unwrap();
    let fleet = dir.path().join("fleet");
    std::fs::create_dir(&fleet).unwrap();
    std::fs::write(fleet.join("fleet.yml"), CONFIG).unwrap();
    std::fs::write(fleet.join(".env"), "STITCH_HOST=h1.example.com\n").unwrap();

    let output = stitch(
        dir.path(),
        &["--config=fleet/fleet.yml", "--output", "json", "show", "base"],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["host"], "h1");
}

#[test]
fn missing_config_exits_with_configuration_status() {
    let dir = TempDir::new().unwrap();

    let output = stitch(dir.path(), &["--config", "missing.yml", "validate"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn unknown_site_exits_with_configuration_status() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("stitch.yml"), CONFIG).unwrap();

    let output = stitch(dir.path(), &["--host", "h1", "show", "nope"]);
    assert_eq!(output.status.code(), Some(2));
}
