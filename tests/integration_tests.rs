mod common;

use assert_cmd::Command;
use assert_fs::prelude::*;
use common::{create_nested_directory_structure, write_test_jpeg};
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn img_compact() -> Command {
    let mut cmd = Command::cargo_bin("img-compact").unwrap();
    cmd.env_remove("TINIFY_API_KEYS").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    img_compact().arg("--help").assert().success();
}

#[test]
fn test_local_help() {
    img_compact()
        .args(["local", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--min-quality"));
}

#[test]
fn test_remote_help() {
    img_compact()
        .args(["remote", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--key"));
}

#[test]
fn test_local_missing_args() {
    img_compact().arg("local").assert().failure();
}

#[test]
fn test_local_empty_directory() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("output");

    img_compact()
        .args(["local", &temp_dir.path().to_string_lossy(), &output_dir.to_string_lossy()])
        .assert()
        .success()
        .stdout(predicate::str::contains("No image files found"));
}

#[test]
fn test_local_compresses_directory() {
    let input = assert_fs::TempDir::new().unwrap();
    let output = assert_fs::TempDir::new().unwrap();
    write_test_jpeg(input.path(), "one.jpg");
    write_test_jpeg(input.path(), "two.jpg");

    img_compact()
        .args(["--quiet", "local"])
        .arg(input.path())
        .arg(output.path().join("compressed"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Files compressed: 2"));

    output
        .child("compressed/one.jpg")
        .assert(predicate::path::exists());
    output
        .child("compressed/two.jpg")
        .assert(predicate::path::exists());
}

#[test]
fn test_local_recursive() {
    let temp_dir = TempDir::new().unwrap();
    create_nested_directory_structure(temp_dir.path());
    let output_dir = temp_dir.path().join("output");

    img_compact()
        .args(["--quiet", "local", "-r", "-q", "70"])
        .arg(temp_dir.path())
        .arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Files compressed: 1"));

    assert!(output_dir.join("nested.jpg").exists());
}

#[test]
fn test_local_reports_broken_files() {
    let temp_dir = TempDir::new().unwrap();
    File::create(temp_dir.path().join("broken.jpg"))
        .unwrap()
        .write_all(b"fake image data")
        .unwrap();

    img_compact()
        .args(["--quiet", "local"])
        .arg(temp_dir.path())
        .arg(temp_dir.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Failed files: 1"));
}

#[test]
fn test_local_invalid_quality() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_test_jpeg(temp_dir.path(), "test.jpg");

    img_compact()
        .args(["local", &file.to_string_lossy(), "out", "--quality", "0"])
        .assert()
        .failure();
}

#[test]
fn test_local_invalid_bounds() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_test_jpeg(temp_dir.path(), "test.jpg");

    img_compact()
        .args(["local", &file.to_string_lossy(), "out"])
        .args(["--min-quality", "90", "--max-quality", "80"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("quality bounds"));
}

#[test]
fn test_local_unknown_optimizer() {
    let temp_dir = TempDir::new().unwrap();
    let file = write_test_jpeg(temp_dir.path(), "test.jpg");

    img_compact()
        .args(["local", &file.to_string_lossy(), "out", "--optimizer", "mozjpeg"])
        .assert()
        .failure();
}

#[test]
fn test_local_writes_log_file() {
    let temp_dir = TempDir::new().unwrap();
    write_test_jpeg(temp_dir.path(), "photo.jpg");
    let log = temp_dir.path().join("log.txt");

    img_compact()
        .arg("--quiet")
        .arg("--log")
        .arg(&log)
        .arg("local")
        .arg(temp_dir.path())
        .arg(temp_dir.path().join("out"))
        .assert()
        .success();

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Start compressing 1 images"));
    assert!(text.contains("photo.jpg"));
    assert!(text.contains("Compressing complete"));
}

#[test]
fn test_remote_requires_keys() {
    let temp_dir = TempDir::new().unwrap();
    write_test_jpeg(temp_dir.path(), "photo.jpg");

    img_compact()
        .args(["remote", &temp_dir.path().to_string_lossy()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no API keys"));
}

#[test]
fn test_remote_unreachable_service_aborts() {
    let temp_dir = TempDir::new().unwrap();
    write_test_jpeg(temp_dir.path(), "photo.jpg");

    img_compact()
        .args(["--quiet", "remote"])
        .arg(temp_dir.path())
        .arg(temp_dir.path().join("out"))
        .args(["--key", "test-key", "--endpoint", "http://127.0.0.1:9"])
        .args(["--retries", "0", "--retry-delay-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("remote compression aborted"));
}

#[test]
fn test_remote_keys_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    write_test_jpeg(temp_dir.path(), "photo.jpg");

    img_compact()
        .env("TINIFY_API_KEYS", "k1,k2")
        .args(["--quiet", "remote"])
        .arg(temp_dir.path())
        .args(["--endpoint", "http://127.0.0.1:9", "--retries", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("(2 keys)"));
}
