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

fn payment_count(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
) -> usize {
    request_ok(
        stdin,
        reader,
        id,
        "payments.list",
        json!({ "view": "all", "today": "2024-06-20" }),
    )
    .get("payments")
    .and_then(|v| v.as_array())
    .map(|a| a.len())
    .expect("payments array")
}

#[test]
fn reconcile_drops_orphans_and_spares_free_form_income() {
    let workspace = temp_dir("educrm-reconcile");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.create",
        json!({
            "firstName": "Ali",
            "lastName": "Valiyev",
            "paymentAmount": 500000,
            "joinDate": "2024-06-01"
        }),
    );
    let student_id = created
        .pointer("/student/id")
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();
    let issued_id = created
        .pointer("/payment/id")
        .and_then(|v| v.as_str())
        .expect("payment id")
        .to_string();

    // Settle the debt so the cascade on delete leaves it behind, then add a
    // free-form income with no student link.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "pay",
        "payments.markPaid",
        json!({ "paymentId": issued_id, "paidOn": "2024-06-15" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "inc",
        "payments.create",
        json!({ "amount": 120000, "date": "2024-06-16", "studentName": "Walk In" }),
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": student_id }),
    );

    // The paid payment survived the cascade but its student link now dangles.
    assert_eq!(payment_count(&mut stdin, &mut reader, "c1"), 2);

    let reconciled = request_ok(&mut stdin, &mut reader, "r1", "payments.reconcile", json!({}));
    assert_eq!(reconciled.get("removed").and_then(|v| v.as_u64()), Some(1));

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "c2",
        "payments.list",
        json!({ "view": "all", "today": "2024-06-20" }),
    );
    let payments = listed.get("payments").and_then(|v| v.as_array()).cloned().expect("payments");
    assert_eq!(payments.len(), 1);
    assert_eq!(
        payments[0].get("studentName").and_then(|v| v.as_str()),
        Some("Walk In"),
        "entries without a student link are never pruned"
    );

    // A second sweep finds nothing.
    let reconciled = request_ok(&mut stdin, &mut reader, "r2", "payments.reconcile", json!({}));
    assert_eq!(reconciled.get("removed").and_then(|v| v.as_u64()), Some(0));
}

#[test]
fn listing_never_prunes_orphans() {
    let workspace = temp_dir("educrm-reconcile-readonly");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "s1",
        "students.create",
        json!({
            "firstName": "Gone",
            "lastName": "Soon",
            "paymentAmount": 300000,
            "joinDate": "2024-06-01"
        }),
    );
    let student_id = created
        .pointer("/student/id")
        .and_then(|v| v.as_str())
        .expect("student id")
        .to_string();
    let issued_id = created
        .pointer("/payment/id")
        .and_then(|v| v.as_str())
        .expect("payment id")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "pay",
        "payments.markPaid",
        json!({ "paymentId": issued_id, "paidOn": "2024-06-10" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del",
        "students.delete",
        json!({ "studentId": student_id }),
    );

    // Repeated reads keep returning the orphan until reconcile is invoked
    // explicitly.
    assert_eq!(payment_count(&mut stdin, &mut reader, "c1"), 1);
    assert_eq!(payment_count(&mut stdin, &mut reader, "c2"), 1);
    assert_eq!(payment_count(&mut stdin, &mut reader, "c3"), 1);

    let reconciled = request_ok(&mut stdin, &mut reader, "r1", "payments.reconcile", json!({}));
    assert_eq!(reconciled.get("removed").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(payment_count(&mut stdin, &mut reader, "c4"), 0);
}
