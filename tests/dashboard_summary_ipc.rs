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

fn ids(list: &serde_json::Value, key: &str) -> Vec<i64> {
    list.as_array()
        .expect("array")
        .iter()
        .map(|row| row[key].as_i64().expect("id"))
        .collect()
}

#[test]
fn summary_counts_active_records_and_groups_departments() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    let summary = request_ok(&mut stdin, &mut reader, "1", "dashboard.summary", json!({}));
    assert_eq!(summary["students"], json!(5));
    assert_eq!(summary["courses"], json!(2));
    assert_eq!(summary["teachers"], json!(2));
    assert_eq!(summary["departments"], json!(3));

    let by_department: Vec<(String, i64)> = summary["by_department"]
        .as_array()
        .expect("by_department")
        .iter()
        .map(|d| {
            (
                d["department"].as_str().expect("name").to_string(),
                d["count"].as_i64().expect("count"),
            )
        })
        .collect();
    assert_eq!(
        by_department,
        vec![
            ("Computer Science".to_string(), 2),
            ("History".to_string(), 0),
            ("Mathematics".to_string(), 3),
        ]
    );

    assert_eq!(
        ids(&summary["recent_enrollments"], "enrollment_id"),
        vec![2, 4, 3, 8, 7, 1, 6, 5]
    );
    assert_eq!(summary["recent_enrollments"][0]["student_name"], json!("Alice Adams"));
    assert_eq!(summary["recent_enrollments"][0]["course_code"], json!("MATH201"));

    let courses = summary["course_enrollment"].as_array().expect("courses");
    assert_eq!(courses.len(), 2);
    assert_eq!(courses[0]["course_code"], json!("CS101"));
    assert_eq!(courses[0]["enrolled"], json!(4));
    assert_eq!(courses[0]["available_slots"], json!(26));
    assert_eq!(courses[1]["course_code"], json!("MATH201"));
    assert_eq!(courses[1]["available_slots"], json!(0));

    let letters: Vec<(String, u64)> = summary["grade_distribution"]
        .as_array()
        .expect("distribution")
        .iter()
        .map(|l| {
            (
                l["letter"].as_str().expect("letter").to_string(),
                l["count"].as_u64().expect("count"),
            )
        })
        .collect();
    assert_eq!(
        letters,
        vec![
            ("A".to_string(), 3),
            ("B".to_string(), 2),
            ("C".to_string(), 1),
            ("D".to_string(), 0),
            ("F".to_string(), 0),
        ]
    );
    assert_eq!(summary["average_attendance"], json!(69.23));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn since_and_limit_shape_the_recent_list() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dashboard.summary",
        json!({ "since": "2024-01-01" }),
    );
    assert_eq!(
        ids(&summary["recent_enrollments"], "enrollment_id"),
        vec![2, 4, 3, 8, 7, 1]
    );
    assert_eq!(summary["recent_enrollment_count"], json!(6));
    assert_eq!(summary["window_start"], json!("2024-01-01"));

    let summary = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dashboard.summary",
        json!({ "since": "2024-01-01", "limit": 2 }),
    );
    assert_eq!(ids(&summary["recent_enrollments"], "enrollment_id"), vec![2, 4]);
    assert_eq!(summary["recent_enrollment_count"], json!(6));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn invalid_dashboard_params_are_rejected() {
    let (_ws, mut child, mut stdin, mut reader) = open_seeded();

    for (id, params) in [
        ("1", json!({ "limit": 0 })),
        ("2", json!({ "limit": 501 })),
        ("3", json!({ "since": "last tuesday" })),
        ("4", json!({ "limt": 5 })),
    ] {
        let resp = request(&mut stdin, &mut reader, id, "dashboard.summary", params);
        assert_eq!(resp["ok"], json!(false));
        assert_eq!(resp["error"]["code"], json!("bad_params"));
        assert_eq!(resp["error"]["status"], json!(400));
    }

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn empty_workspace_reports_zeroes_and_nulls() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let summary = request_ok(&mut stdin, &mut reader, "1", "dashboard.summary", json!({}));
    assert_eq!(summary["students"], json!(0));
    assert_eq!(summary["by_department"], json!([]));
    assert_eq!(summary["recent_enrollments"], json!([]));
    assert!(summary["average_attendance"].is_null());
    assert_eq!(summary["grade_distribution"].as_array().map(|a| a.len()), Some(5));

    drop(stdin);
    let _ = child.wait();
}
