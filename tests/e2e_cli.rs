//! CLI end-to-end tests
//!
//! Tests for the mediascout command-line interface. Discovery runs use a
//! shell script in place of ffprobe, configured through `tools.ffprobe_path`.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the mediascout binary
#[allow(deprecated)]
fn mediascout_cmd() -> Command {
    Command::cargo_bin("mediascout").unwrap()
}

const CLIP: &str = r#"{
  "streams": [
    {"index": 0, "codec_type": "video", "codec_name": "h264",
     "width": 1280, "height": 720, "r_frame_rate": "25/1", "duration": "12.000000"},
    {"index": 1, "codec_type": "audio", "codec_name": "vorbis",
     "sample_fmt": "fltp", "sample_rate": "44100", "channels": 2, "duration": "11.500000"}
  ],
  "format": {"format_name": "matroska,webm", "duration": "12.000000",
             "tags": {"title": "Clip"}}
}"#;

/// Write a stand-in ffprobe that answers `-version` and otherwise runs `body`,
/// plus a config file pointing at it. Returns the config path.
#[cfg(unix)]
fn fake_ffprobe_config(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = dir.join("ffprobe");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo 'ffprobe version 6.1-test'\n  exit 0\nfi\n{body}\n"
        ),
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let config = dir.join("mediascout.toml");
    fs::write(
        &config,
        format!("[tools]\nffprobe_path = \"{}\"\n", script.display()),
    )
    .unwrap();
    config
}

#[cfg(unix)]
fn printing(json: &str) -> String {
    format!("cat <<'JSON'\n{json}\nJSON")
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = mediascout_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = mediascout_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("mediascout"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = mediascout_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("mediascout "));
}

#[test]
fn test_cli_discover_help() {
    let mut cmd = mediascout_cmd();
    cmd.args(["discover", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Discover the streams"))
        .stdout(predicate::str::contains("--timeout-ms"));
}

#[test]
fn test_cli_discover_requires_locator() {
    let mut cmd = mediascout_cmd();
    cmd.arg("discover")
        .assert()
        .failure()
        .stderr(predicate::str::contains("LOCATORS"));
}

#[test]
fn test_cli_discover_invalid_locator() {
    let mut cmd = mediascout_cmd();
    cmd.args(["discover", "dvd:///dev/sr0@first"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot discover"));
}

#[test]
fn test_cli_missing_config_file() {
    let temp = tempdir().unwrap();
    let mut cmd = mediascout_cmd();
    cmd.arg("--config")
        .arg(temp.path().join("absent.toml"))
        .args(["discover", "movie.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

#[test]
fn test_cli_rejects_zero_timeout() {
    let temp = tempdir().unwrap();
    let config = temp.path().join("mediascout.toml");
    fs::write(&config, "").unwrap();

    let mut cmd = mediascout_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["discover", "--timeout-ms", "0", "movie.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid discovery settings"));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = mediascout_cmd();
    cmd.arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("ffprobe"));
}

#[cfg(unix)]
#[test]
fn test_cli_check_tools_reports_configured_ffprobe() {
    let temp = tempdir().unwrap();
    let config = fake_ffprobe_config(temp.path(), "exit 1");

    let mut cmd = mediascout_cmd();
    cmd.arg("--config")
        .arg(&config)
        .arg("check-tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ ffprobe (ffprobe version 6.1-test)"))
        .stdout(predicate::str::contains("All required tools are available!"));
}

#[cfg(unix)]
#[test]
fn test_cli_discover_prints_report() {
    let temp = tempdir().unwrap();
    let config = fake_ffprobe_config(temp.path(), &printing(CLIP));

    let mut cmd = mediascout_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["discover", "/media/clip.mkv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/media/clip.mkv"))
        .stdout(predicate::str::contains("Mime Type :\tvideo/x-matroska"))
        .stdout(predicate::str::contains("1280 x 720 @ 25/1 fps"))
        .stdout(predicate::str::contains("Codec : h264"))
        .stdout(predicate::str::contains("title :\tClip"));
}

#[cfg(unix)]
#[test]
fn test_cli_discover_json_keeps_input_order() {
    let temp = tempdir().unwrap();
    let config = fake_ffprobe_config(temp.path(), &printing(CLIP));

    let output = mediascout_cmd()
        .arg("--config")
        .arg(&config)
        .args(["discover", "--json", "/media/a.mkv", "/media/b.mkv"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = json.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["locator"], "/media/a.mkv");
    assert_eq!(results[1]["locator"], "/media/b.mkv");
    assert_eq!(results[1]["success"], true);
    assert_eq!(results[1]["duration"], 12_000_000_000i64);
}

#[cfg(unix)]
#[test]
fn test_cli_discover_failure_exits_nonzero() {
    let temp = tempdir().unwrap();
    let config = fake_ffprobe_config(
        temp.path(),
        "echo 'clip.mkv: Invalid data found when processing input' >&2\nexit 1",
    );

    let mut cmd = mediascout_cmd();
    cmd.arg("--config")
        .arg(&config)
        .args(["discover", "/media/clip.mkv"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No audio or video found"))
        .stderr(predicate::str::contains("1 of 1 resources could not be discovered"));
}
