use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const CLEAN_RUN: &str = r#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}
{"type":"TEXT_MESSAGE_START","messageId":"m1","role":"assistant"}
{"type":"TEXT_MESSAGE_CONTENT","messageId":"m1","delta":"Hel"}
{"type":"TEXT_MESSAGE_CONTENT","messageId":"m1","delta":"lo"}
{"type":"TEXT_MESSAGE_END","messageId":"m1"}
{"type":"RUN_FINISHED","threadId":"t1","runId":"r1"}
"#;

const GHOST_CONTENT: &str = r#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}
{"type":"TEXT_MESSAGE_CONTENT","messageId":"ghost","delta":"boo"}
{"type":"RUN_FINISHED","threadId":"t1","runId":"r1"}
"#;

fn agui_ctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("agui-ctl").unwrap();
    cmd.current_dir(dir.path()).env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn validate_clean_stream_succeeds() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", CLEAN_RUN);

    agui_ctl(&dir)
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Accepted:   6 event(s)"))
        .stdout(predicate::str::contains("Outcome:    finished (success)"))
        .stdout(predicate::str::contains("Violations: none"));
}

#[test]
fn validate_reports_out_of_sequence_event() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", GHOST_CONTENT);

    agui_ctl(&dir)
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("OUT_OF_SEQUENCE_EVENT"))
        .stderr(predicate::str::contains("protocol violation(s)"));
}

#[test]
fn validate_json_output_under_reject_policy() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", GHOST_CONTENT);

    let output = agui_ctl(&dir)
        .args(["--json", "validate"])
        .arg(&file)
        .args(["--policy", "reject"])
        .output()
        .unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["policy"], "reject");
    assert_eq!(report["accepted"], 2);
    assert_eq!(report["violations"][0]["index"], 1);
    assert_eq!(report["violations"][0]["code"], "OUT_OF_SEQUENCE_EVENT");
}

#[test]
fn validate_reads_sse_captures() {
    let dir = TempDir::new().unwrap();
    let file = write(
        &dir,
        "capture.sse",
        ": connected\n\n\
         data: {\"type\":\"RUN_STARTED\",\"threadId\":\"t1\",\"runId\":\"r1\"}\n\n\
         data: {\"type\":\"RUN_FINISHED\",\"threadId\":\"t1\",\"runId\":\"r1\"}\n\n",
    );

    agui_ctl(&dir)
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("Accepted:   2 event(s)"));
}

#[test]
fn config_file_sets_default_policy() {
    let dir = TempDir::new().unwrap();
    write(&dir, ".agui.toml", "[sequencer]\npolicy = \"reject\"\n");
    let file = write(&dir, "run.jsonl", GHOST_CONTENT);

    agui_ctl(&dir)
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stdout(predicate::str::contains("Policy:     reject"))
        .stdout(predicate::str::contains("Accepted:   2 event(s)"));
}

#[test]
fn encode_sse_to_stdout() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", GHOST_CONTENT);

    agui_ctl(&dir)
        .arg("encode")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "data: {\"type\":\"RUN_STARTED\",\"threadId\":\"t1\",\"runId\":\"r1\"}\n\n",
        ))
        .stdout(predicate::str::contains("\"type\":\"RUN_ERROR\""))
        .stdout(predicate::str::contains("RUN_FINISHED").not());
}

#[test]
fn encode_ws_binary_to_file() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", CLEAN_RUN);
    let out = dir.path().join("frames.bin");

    agui_ctl(&dir)
        .arg("encode")
        .arg(&file)
        .args(["--transport", "ws", "--binary", "--output"])
        .arg(&out)
        .assert()
        .success();

    let bytes = fs::read(&out).unwrap();
    let first = r#"{"type":"RUN_STARTED","threadId":"t1","runId":"r1"}"#;
    assert_eq!(&bytes[..4], &(first.len() as u32).to_be_bytes());
    assert_eq!(&bytes[4..4 + first.len()], first.as_bytes());
}

#[test]
fn encode_binary_requires_output() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", CLEAN_RUN);

    agui_ctl(&dir)
        .arg("encode")
        .arg(&file)
        .args(["--transport", "ws", "--binary"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output"));
}

#[test]
fn missing_input_file_fails() {
    let dir = TempDir::new().unwrap();

    agui_ctl(&dir)
        .args(["validate", "does-not-exist.jsonl"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn serve_requires_certificates_unless_insecure() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "run.jsonl", CLEAN_RUN);

    agui_ctl(&dir)
        .arg("serve")
        .arg(&file)
        .args(["--port", "0"])
        .env_remove("AGUI_CERT")
        .env_remove("AGUI_KEY")
        .env_remove("AGUI_INSECURE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("without TLS certificates"))
        .stderr(predicate::str::contains("--insecure"));
}
