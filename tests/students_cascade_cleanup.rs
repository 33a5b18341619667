use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_educrmd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn educrmd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
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
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn enroll(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    first: &str,
    last: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({
            "firstName": first,
            "lastName": last,
            "group": "A-1",
            "paymentAmount": 500000,
            "joinDate": "2024-06-01"
        }),
    );
    created
        .pointer("/student/id")
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string()
}

fn list_payments(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
) -> Vec<serde_json::Value> {
    request_ok(
        stdin,
        reader,
        id,
        "payments.list",
        json!({ "view": "all", "today": "2024-06-15" }),
    )
    .get("payments")
    .and_then(|v| v.as_array())
    .cloned()
    .expect("payments array")
}

#[test]
fn deletion_removes_unpaid_and_keeps_paid_history() {
    let workspace = temp_dir("educrm-cascade");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student_id = enroll(&mut stdin, &mut reader, "s1", "Ali", "Valiyev");

    // Settle the issued debt, then issue a second obligation via edit.
    let payments = list_payments(&mut stdin, &mut reader, "p1");
    assert_eq!(payments.len(), 1);
    let first_debt = payments[0].get("id").and_then(|v| v.as_str()).expect("id").to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "pay",
        "payments.markPaid",
        json!({ "paymentId": first_debt, "paidOn": "2024-06-15" }),
    );

    let second = request_ok(
        &mut stdin,
        &mut reader,
        "inc",
        "payments.create",
        json!({ "amount": 500000, "date": "2024-07-01", "studentId": student_id }),
    );
    let second_id = second
        .pointer("/payment/id")
        .and_then(|v| v.as_str())
        .expect("payment id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "edit",
        "payments.update",
        json!({ "paymentId": second_id, "patch": { "status": "unpaid", "dueDate": "2024-07-01" } }),
    );

    // One paid + one unpaid on record.
    let before = list_payments(&mut stdin, &mut reader, "p2");
    assert_eq!(before.len(), 2);

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        deleted.get("removedUnpaidPayments").and_then(|v| v.as_u64()),
        Some(1)
    );

    let after = list_payments(&mut stdin, &mut reader, "p3");
    assert_eq!(after.len(), 1, "paid payment survives as history");
    assert_eq!(after[0].get("status").and_then(|v| v.as_str()), Some("paid"));
    assert_eq!(
        after[0].get("studentName").and_then(|v| v.as_str()),
        Some("Ali Valiyev")
    );
}

#[test]
fn same_name_students_do_not_collide() {
    let workspace = temp_dir("educrm-cascade-namesake");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let first = enroll(&mut stdin, &mut reader, "s1", "Ali", "Valiyev");
    let second = enroll(&mut stdin, &mut reader, "s2", "Ali", "Valiyev");
    assert_ne!(first, second);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": first }),
    );

    // Cleanup matches the identity link, so the namesake keeps their debt.
    let remaining = list_payments(&mut stdin, &mut reader, "p1");
    assert_eq!(remaining.len(), 1);
    assert_eq!(
        remaining[0].get("studentId").and_then(|v| v.as_str()),
        Some(second.as_str())
    );
}

#[test]
fn renaming_a_student_leaves_ledger_snapshots_alone() {
    let workspace = temp_dir("educrm-cascade-rename");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student_id = enroll(&mut stdin, &mut reader, "s1", "Ali", "Valiyev");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ren",
        "students.update",
        json!({ "studentId": student_id, "patch": { "lastName": "Aliyev" } }),
    );

    let payments = list_payments(&mut stdin, &mut reader, "p1");
    assert_eq!(
        payments[0].get("studentName").and_then(|v| v.as_str()),
        Some("Ali Valiyev"),
        "display snapshot is taken at creation time"
    );

    // The identity link still holds, so deletion cleans up regardless of the
    // stale snapshot.
    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": student_id }),
    );
    assert_eq!(
        deleted.get("removedUnpaidPayments").and_then(|v| v.as_u64()),
        Some(1)
    );
}
