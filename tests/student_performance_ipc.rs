use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
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
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn seed_workspace(workspace: &Path) {
    let conn = rusqlite::Connection::open(workspace.join("campus.sqlite3")).expect("open seed db");
    conn.execute_batch(include_str!("fixtures/academics_seed.sql"))
        .expect("seed");
}

fn open_seeded() -> (tempfile::TempDir, Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    seed_workspace(workspace.path());
    (workspace, child, stdin, reader)
}
#[test]
fn performance_aggregates_grades_attendance_and_credits() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.performance",
        json!({ "student_id": 1 }),
    );
    assert_eq!(report["student_id"], json!(1));
    assert_eq!(report["student"]["full_name"], json!("Alice Adams"));
    assert_eq!(report["student"]["department"], json!("Computer Science"));
    assert_eq!(report["average_grade"], json!(83.75));
    assert_eq!(report["attendance_rate"], json!(75.0));
    assert_eq!(report["weighted_average"], json!(82.0));

    let courses = report["courses"].as_array().expect("courses");
    let codes: Vec<&str> = courses
        .iter()
        .map(|c| c["course_code"].as_str().expect("code"))
        .collect();
    assert_eq!(codes, vec!["CS101", "CS301", "MATH201"]);
    assert_eq!(courses[0]["average_grade"], json!(85.0));
    assert_eq!(courses[0]["attendance_rate"], json!(80.0));
    assert_eq!(courses[1]["final_grade"], json!("A"));
    assert!(courses[1]["attendance_rate"].is_null());
    assert_eq!(courses[2]["attendance_rate"], json!(50.0));

    assert_eq!(report["totals"]["total_courses"], json!(3));
    assert_eq!(report["totals"]["completed_courses"], json!(1));
    assert_eq!(report["totals"]["active_enrollments"], json!(2));
    assert_eq!(report["totals"]["total_credits"], json!(10));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn missing_data_is_null_not_zero() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.performance",
        json!({ "student_id": 2 }),
    );
    assert_eq!(report["average_grade"], json!(85.0));
    assert!(report["attendance_rate"].is_null());

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.performance",
        json!({ "student_id": 6 }),
    );
    assert!(report["average_grade"].is_null());
    assert!(report["attendance_rate"].is_null());
    assert!(report["weighted_average"].is_null());
    assert_eq!(report["courses"].as_array().map(|c| c.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn unknown_student_is_not_found() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "students.performance",
        json!({ "student_id": 999 }),
    );
    assert_eq!(resp["ok"], json!(false));
    assert_eq!(resp["error"]["code"], json!("not_found"));
    assert_eq!(resp["error"]["status"], json!(404));
    assert_eq!(resp["error"]["details"]["entity"], json!("student"));
    assert_eq!(resp["error"]["details"]["id"], json!(999));

    let resp = request(&mut stdin, &mut reader, "2", "students.performance", json!({}));
    assert_eq!(resp["error"]["code"], json!("bad_params"));

    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.performance",
        json!({ "student_id": 1, "studentId": 2 }),
    );
    assert_eq!(resp["error"]["code"], json!("bad_params"));
    assert_eq!(resp["error"]["status"], json!(400));

    drop(stdin);
    let _ = child.wait();
}
