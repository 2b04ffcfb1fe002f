//! CLI integration tests for u2f-cli.
//!
//! These tests run the actual binary and check outputs and exit codes. The
//! simulated key is given a short latency so ceremonies finish quickly.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command for the u2f-demo binary with a clean U2F environment.
fn u2f_demo() -> Command {
    let mut cmd = Command::cargo_bin("u2f-demo").unwrap();
    for var in [
        "U2F_ORIGIN",
        "U2F_TIMEOUT_SECS",
        "U2F_TICK_MS",
        "U2F_REGISTER_CHALLENGE",
        "U2F_SIGN_CHALLENGE",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    u2f_demo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("FIDO U2F ceremony demo client"))
        .stdout(predicate::str::contains("register"))
        .stdout(predicate::str::contains("sign"))
        .stdout(predicate::str::contains("demo"))
        .stdout(predicate::str::contains("parse"))
        .stdout(predicate::str::contains("route"));
}

#[test]
fn test_version_displays_version() {
    u2f_demo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("u2f-demo"));
}

#[test]
fn test_help_shows_exit_codes() {
    u2f_demo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("65"))
        .stdout(predicate::str::contains("69"));
}

#[test]
fn test_register_help_shows_options() {
    u2f_demo()
        .args(["register", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--challenge"))
        .stdout(predicate::str::contains("--origin"))
        .stdout(predicate::str::contains("--fail"))
        .stdout(predicate::str::contains("--latency-ms"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_sign_requires_key_handle() {
    u2f_demo()
        .arg("sign")
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("--key-handle"));
}

#[test]
fn test_conflicting_verbose_quiet_rejected() {
    u2f_demo()
        .args(["--verbose", "--quiet", "route", "#reg"])
        .assert()
        .failure()
        .code(64);
}

// ============================================================================
// Route Tests
// ============================================================================

#[test]
fn test_route_known_fragments() {
    u2f_demo()
        .args(["route", "#reg"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registration"))
        .stdout(predicate::str::contains("#reg"));

    u2f_demo()
        .args(["route", "sig"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signing"))
        .stdout(predicate::str::contains("SigningForm"));
}

#[test]
fn test_route_unknown_fragment_is_cleared() {
    u2f_demo()
        .args(["route", "#settings"])
        .assert()
        .success()
        .stdout(predicate::str::contains("About"))
        .stdout(predicate::str::contains("RegistrationForm"))
        .stdout(predicate::str::contains("was cleared"));
}

#[test]
fn test_route_json_output() {
    let output = u2f_demo()
        .args(["route", "--json", "#about"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["route"], "about");
    assert_eq!(json["fragment"], "");
    assert_eq!(json["rewritten"], true);
    assert_eq!(json["view"], "registration_form");
    assert_eq!(json["nav"][0]["href"], "#reg");
    assert_eq!(json["nav"][0]["active"], false);
    assert_eq!(json["nav"][1]["active"], false);
}

#[test]
fn test_route_json_marks_active_nav_item() {
    let output = u2f_demo()
        .args(["route", "--json", "#sig"])
        .output()
        .unwrap();
    let json = stdout_json(&output);
    assert_eq!(json["rewritten"], false);
    assert_eq!(json["nav"][1]["label"], "Signing");
    assert_eq!(json["nav"][1]["active"], true);
}

// ============================================================================
// Register Tests
// ============================================================================

#[test]
fn test_register_success() {
    u2f_demo()
        .args(["register", "--latency-ms", "20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Registration complete!"))
        .stdout(predicate::str::contains("Key handle:"))
        .stdout(predicate::str::contains("LoooooooongRegisterChallenge"));
}

#[test]
fn test_register_json_output() {
    let output = u2f_demo()
        .args(["register", "--latency-ms", "20", "--challenge", "abc123", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["relyingPartyId"], "http://localhost:8080");
    assert_eq!(json["challenge"], "abc123");
    assert_eq!(json["response"]["version"], "U2F_V2");
    assert_eq!(json["parsedResponse"]["clientData"]["challenge"], "abc123");
    assert_eq!(
        json["parsedResponse"]["clientData"]["typ"],
        "navigator.id.finishEnrollment"
    );
    assert!(json["parsedResponse"]["keyHandle"].as_str().unwrap().len() > 10);
    assert!(json["parsedResponse"]["publicKey"]
        .as_str()
        .unwrap()
        .starts_with("04"));
}

#[test]
fn test_register_quiet_prints_key_handle_only() {
    let output = u2f_demo()
        .args(["--quiet", "register", "--latency-ms", "20"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    assert!(!stdout.contains("Registration complete"));
}

#[test]
fn test_register_origin_from_env() {
    let output = u2f_demo()
        .env("U2F_ORIGIN", "https://demo.example.com/app/page.html")
        .args(["register", "--latency-ms", "20", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["relyingPartyId"], "https://demo.example.com");
    assert_eq!(
        json["parsedResponse"]["clientData"]["origin"],
        "https://demo.example.com"
    );
}

#[test]
fn test_register_invalid_origin_is_usage_error() {
    u2f_demo()
        .args(["register", "--origin", "not a url"])
        .assert()
        .failure()
        .code(64)
        .stderr(predicate::str::contains("Invalid origin"));
}

#[test]
fn test_register_device_error_exit_code() {
    u2f_demo()
        .args(["register", "--latency-ms", "20", "--fail", "4"])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("DEVICE_INELIGIBLE"));
}

#[test]
fn test_register_device_error_json_keeps_error_code() {
    let output = u2f_demo()
        .args(["register", "--latency-ms", "20", "--fail", "5", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(69));

    let json = stdout_json(&output);
    assert_eq!(json["response"], serde_json::json!({ "errorCode": 5 }));
    assert!(json["parsedResponse"].is_null());
}

#[test]
fn test_register_hanging_device_times_out() {
    u2f_demo()
        .args(["register", "--hang", "--timeout-secs", "1"])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("TIMEOUT"));
}

// ============================================================================
// Sign Tests
// ============================================================================

#[test]
fn test_sign_undecodable_key_handle_is_bad_request() {
    u2f_demo()
        .args(["sign", "--latency-ms", "20", "--key-handle", "bogus"])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("BAD_REQUEST"));
}

#[test]
fn test_sign_unknown_key_is_ineligible() {
    // Decodable, but not a handle this key issued
    u2f_demo()
        .args(["sign", "--latency-ms", "20", "--key-handle", "AAAAAAAAAAAAAAAA"])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("DEVICE_INELIGIBLE"));
}

// ============================================================================
// Parse Tests
// ============================================================================

#[test]
fn test_parse_missing_file() {
    u2f_demo()
        .args(["parse", "registration", "/nonexistent/response.json"])
        .assert()
        .failure()
        .code(66)
        .stderr(predicate::str::contains("Failed to read response file"));
}

#[test]
fn test_parse_device_error_response() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("error.json");
    fs::write(&path, r#"{"errorCode": 5}"#).unwrap();

    u2f_demo()
        .args(["parse", "signature", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(69)
        .stderr(predicate::str::contains("TIMEOUT"));
}

#[test]
fn test_parse_invalid_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    fs::write(&path, "{ not json").unwrap();

    u2f_demo()
        .args(["parse", "registration", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(65);
}

#[test]
fn test_parse_truncated_registration() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("short.json");
    fs::write(
        &path,
        r#"{"registrationData": "BQQ", "clientData": "e30", "errorCode": 0}"#,
    )
    .unwrap();

    u2f_demo()
        .args(["parse", "registration", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(65)
        .stderr(predicate::str::contains("Failed to parse registration response"));
}

#[test]
fn test_parse_requires_kind() {
    u2f_demo()
        .args(["parse", "attestation", "-"])
        .assert()
        .failure()
        .code(64);
}
