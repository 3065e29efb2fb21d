#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradematrixd");
    let mut child = Command::new(exe)
        .env_remove("GRADEMATRIX_CONFIG")
        .env_remove("GRADEMATRIX_API_BASE")
        .env_remove("GRADEMATRIX_API_TOKEN")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradematrixd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or(serde_json::Value::Null)
}

/// Returns the error object, asserting its code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    code: &str,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    let error = value.get("error").cloned().unwrap_or(serde_json::Value::Null);
    assert_eq!(
        error.get("code").and_then(|v| v.as_str()),
        Some(code),
        "{} error: {}",
        method,
        error
    );
    error
}

/// Workspace with catalog `[A+, A, B, C]` and session 10 holding two
/// students: Ada (reading ungraded, writing B) and Ben (fully graded).
pub fn seed_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "seed-1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-2",
        "store.importCatalog",
        json!({
            "tenantId": 1,
            "grades": [
                { "id": 11, "name": "A+" },
                { "id": 12, "name": "A" },
                { "id": 13, "name": "B" },
                { "id": 14, "name": "C" }
            ]
        }),
    );
    let _ = request_ok(
        stdin,
        reader,
        "seed-3",
        "store.importSession",
        json!({
            "sessionId": 10, "tenantId": 1, "branchId": 2, "courseId": 3,
            "currentStatusId": 1, "currentStatusName": "In Progress",
            "assessmentIdMap": { "reading": 501, "writing": 502 },
            "students": [
                { "studentId": 7, "studentName": "Ada", "assessmentGrades": {
                    "reading": { "gradeId": 0, "gradeName": "Not Graded" },
                    "writing": { "gradeId": 13, "gradeName": "B" } } },
                { "studentId": 8, "studentName": "Ben", "assessmentGrades": {
                    "reading": { "gradeId": 11, "gradeName": "A+" },
                    "writing": { "gradeId": 12, "gradeName": "A" } } }
            ]
        }),
    );
}

pub fn session_key() -> serde_json::Value {
    json!({ "sessionId": 10, "tenantId": 1, "branchId": 2, "courseId": 3, "conductedById": 77 })
}
