//! Smoke tests for the tweetstudio CLI
//!
//! These tests run the built binary end to end against temporary design files.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a command for the tweetstudio binary
fn tweetstudio() -> Command {
    Command::cargo_bin("tweetstudio").expect("tweetstudio binary should exist")
}

fn design(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("card.yaml");
    fs::write(
        &path,
        format!(
            "design:\n  export_width: 240\n  export_height: 160\n  animation:\n    speed: 40\n\
             tweet:\n  profile:\n    display_name: Ada Lovelace\n    username: ada\n    verified: true\n\
             \x20 content:\n    text: \"{text}\"\n"
        ),
    )
    .unwrap();
    path
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    tweetstudio()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    tweetstudio()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("png"))
        .stdout(predicate::str::contains("gif"))
        .stdout(predicate::str::contains("estimate"));
}

#[test]
fn test_unknown_subcommand_fails() {
    tweetstudio().arg("mp4").assert().failure();
}

#[test]
fn test_presets_lists_sizes() {
    tweetstudio()
        .arg("presets")
        .assert()
        .success()
        .stdout(predicate::str::contains("story"))
        .stdout(predicate::str::contains("1080 x 1920"))
        .stdout(predicate::str::contains("LinkedIn Post"));
}

// ============================================================================
// Estimate
// ============================================================================

#[test]
fn test_estimate_png() {
    tweetstudio()
        .args(["estimate", "--width", "1080", "--height", "1080"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.7 MB"));
}

#[test]
fn test_estimate_gif_json() {
    tweetstudio()
        .args([
            "estimate", "--format", "gif", "--text-length", "0", "--fps", "20", "--json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"format\":\"gif\""))
        .stdout(predicate::str::contains("\"bytes\":8388608"));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_png_export() {
    let dir = TempDir::new().unwrap();
    let design = design(dir.path(), "Shipping the export pipeline today");
    let out = dir.path().join("out");

    tweetstudio()
        .args(["--color", "never", "png", "--watermark", "--design"])
        .arg(&design)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let files = files_in(&out);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("tweet-studio_ada_"));
    assert!(files[0].ends_with(".png"));
    let bytes = fs::read(out.join(&files[0])).unwrap();
    assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
}

#[test]
fn test_gif_export_with_custom_size() {
    let dir = TempDir::new().unwrap();
    let design = design(dir.path(), "Hello there");
    let out = dir.path().join("gifs");

    tweetstudio()
        .args(["-q", "gif", "--width", "120", "--height", "80", "--loop", "--steps", "4"])
        .args(["--name", "@custom!"])
        .arg("--design")
        .arg(&design)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let files = files_in(&out);
    assert_eq!(files.len(), 1);
    assert!(files[0].starts_with("tweet-studio_custom_"));
    let bytes = fs::read(out.join(&files[0])).unwrap();
    assert!(bytes.starts_with(b"GIF89a"));
    assert!(bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));
}

#[test]
fn test_gif_no_loop_overrides_design() {
    let dir = TempDir::new().unwrap();
    let design = dir.path().join("looping.yaml");
    fs::write(
        &design,
        "design:\n  export_width: 120\n  export_height: 80\n  animation:\n    speed: 40\n    loop: true\n\
         tweet:\n  profile:\n    username: ada\n  content:\n    text: \"Once\"\n",
    )
    .unwrap();
    let out = dir.path().join("gifs");

    tweetstudio()
        .args(["-q", "gif", "--no-loop", "--steps", "2", "--design"])
        .arg(&design)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let files = files_in(&out);
    assert_eq!(files.len(), 1);
    let bytes = fs::read(out.join(&files[0])).unwrap();
    assert!(bytes.starts_with(b"GIF89a"));
    assert!(!bytes.windows(11).any(|w| w == b"NETSCAPE2.0"));
}

#[test]
fn test_gif_with_empty_text_fails() {
    let dir = TempDir::new().unwrap();
    let design = design(dir.path(), "");
    let out = dir.path().join("out");

    tweetstudio()
        .args(["gif", "--design"])
        .arg(&design)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-empty text"));

    assert!(!out.exists());
}

#[test]
fn test_missing_design_file_fails() {
    tweetstudio()
        .args(["png", "--design", "does-not-exist.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_unknown_preset_fails() {
    let dir = TempDir::new().unwrap();
    let design = design(dir.path(), "x");
    tweetstudio()
        .args(["png", "--preset", "tiktok", "--design"])
        .arg(&design)
        .assert()
        .failure()
        .stderr(predicate::str::contains("tiktok"));
}
