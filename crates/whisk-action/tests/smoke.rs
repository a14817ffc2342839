//! Smoke tests for the `whisk-action` binary.
//!
//! Pipes invocation records into the binary and reads the result channel
//! back from a temp file, so no platform descriptor is needed.

use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::{Value, json};

fn whisk_action() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_whisk-action"));
    cmd.env_remove("WHISK_CONFIG")
        .env_remove("__OW_API_HOST")
        .env_remove("__OW_API_KEY");
    cmd
}

/// Run the binary with `stdin` piped in and results sent to a temp file.
fn run(args: &[&str], stdin: &str) -> (Output, Vec<Value>) {
    let results = tempfile::NamedTempFile::new().expect("temp result file");
    let mut child = whisk_action()
        .args(args)
        .arg("--result-file")
        .arg(results.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to spawn whisk-action");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("failed to write invocations");
    let output = child.wait_with_output().expect("failed to wait on whisk-action");

    let text = std::fs::read_to_string(results.path()).expect("result file readable");
    let lines = text
        .lines()
        .map(|l| serde_json::from_str(l).expect("result line is JSON"))
        .collect();
    (output, lines)
}

// ── Help / basic CLI ──────────────────────────────────────────────────────────

#[test]
fn binary_responds_to_help() {
    let output = whisk_action()
        .arg("--help")
        .output()
        .expect("failed to execute whisk-action");
    assert!(output.status.success(), "whisk-action --help should exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--result-fd"));
    assert!(stdout.contains("--result-file"));
    assert!(stdout.contains("--single-shot"));
}

#[test]
fn unknown_flag_exits_nonzero() {
    let output = whisk_action()
        .arg("--no-such-flag")
        .output()
        .expect("failed to execute whisk-action");
    assert!(!output.status.success());
}

// ── Serving invocations ──────────────────────────────────────────────────────

#[test]
fn greets_each_invocation_in_order() {
    let input = "{\"value\":{\"name\":\"Lua\"}}\n{\"value\":{}}\n";
    let (output, results) = run(&[], input);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        results,
        vec![
            json!({"greeting": "Hello, Lua!"}),
            json!({"greeting": "Hello stranger!"}),
        ]
    );
}

#[test]
fn malformed_line_gets_an_error_result() {
    let (output, results) = run(&[], "this is not json\n{\"value\":{\"name\":\"ok\"}}\n");
    assert!(output.status.success());
    assert_eq!(results.len(), 2);
    assert!(results[0]["error"].is_string());
    assert_eq!(results[1], json!({"greeting": "Hello, ok!"}));
}

#[test]
fn decode_failure_is_reported_and_serving_continues() {
    let (output, results) = run(&[], "{\"value\":{\"name\":7}}\n{\"value\":{\"name\":\"x\"}}\n");
    assert!(output.status.success());
    let msg = results[0]["error"].as_str().expect("error text");
    assert!(msg.starts_with("failed to decode JSON string"), "{msg}");
    assert_eq!(results[1], json!({"greeting": "Hello, x!"}));
}

#[test]
fn single_shot_with_empty_input_uses_empty_object() {
    let (output, results) = run(&["--single-shot"], "");
    assert!(output.status.success());
    assert_eq!(results, vec![json!({"greeting": "Hello stranger!"})]);
}

#[test]
fn echo_action_returns_value() {
    let (_, results) = run(&["--action", "echo"], "{\"value\":{\"a\":[1,2]}}\n");
    assert_eq!(results, vec![json!({"a": [1, 2]})]);
}

#[test]
fn invoke_without_control_plane_reports_config_error() {
    let (output, results) = run(
        &["--action", "invoke"],
        "{\"value\":{\"action\":\"/whisk.system/utils/date\"}}\n",
    );
    assert!(output.status.success());
    assert_eq!(
        results,
        vec![json!({"response": {"error": "missing __OW_API_HOST"}})]
    );
}

#[test]
fn closed_result_descriptor_fails_cleanly() {
    let output = whisk_action()
        .args(["--result-fd", "97"])
        .stdin(Stdio::null())
        .output()
        .expect("failed to execute whisk-action");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("result descriptor 97"), "{stderr}");
}
