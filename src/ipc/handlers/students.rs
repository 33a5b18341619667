use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{coerced_i64, opt_date, opt_str, required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::model::{Payment, PaymentStatus, Student};
use crate::store::RecordStore;

/// Course label used when the student's group name does not resolve.
const UNKNOWN_COURSE: &str = "unknown";

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    match store.list_students() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub(super) fn resolve_course(store: &dyn RecordStore, group_name: &str) -> String {
    if group_name.is_empty() {
        return UNKNOWN_COURSE.to_string();
    }
    match store.list_groups() {
        Ok(groups) => groups
            .into_iter()
            .find(|g| g.name == group_name)
            .map(|g| g.course)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNKNOWN_COURSE.to_string()),
        Err(e) => {
            tracing::warn!(error = %e, group = group_name, "course lookup failed");
            UNKNOWN_COURSE.to_string()
        }
    }
}

/// One unpaid payment per enrollment, due on the join date. A one-shot: the
/// following months' dues are never generated automatically.
fn issue_initial_debt(store: &dyn RecordStore, student: &Student) -> Option<Payment> {
    let debt = Payment {
        id: String::new(),
        student_id: Some(student.id.clone()),
        student_name: student.display_name(),
        course: resolve_course(store, &student.group),
        group: student.group.clone(),
        amount: student.payment_amount,
        due_date: student.join_date,
        paid_on: None,
        status: PaymentStatus::Unpaid,
        comment: None,
        next_due_date: None,
    };

    match store.insert_payment(debt) {
        Ok(created) => Some(created),
        Err(e) => {
            // The student is already persisted; there is no compensating
            // delete. The enrollment survives without its opening debt.
            tracing::warn!(student = %student.id, error = %e, "debt issuance failed");
            None
        }
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(first_name) = required_str(&req.params, "firstName") else {
        return err(&req.id, "bad_params", "missing firstName", None);
    };
    let Some(last_name) = required_str(&req.params, "lastName") else {
        return err(&req.id, "bad_params", "missing lastName", None);
    };

    let join_date = match opt_date(&req.params, "joinDate") {
        Ok(v) => v.unwrap_or_else(|| chrono::Local::now().date_naive()),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let student = Student {
        id: String::new(),
        first_name,
        last_name,
        phone: str_or_empty(&req.params, "phone"),
        age: coerced_i64(&req.params, "age"),
        source: str_or_empty(&req.params, "source"),
        gender: str_or_empty(&req.params, "gender"),
        join_date,
        parent_name: str_or_empty(&req.params, "parentName"),
        parent_phone: str_or_empty(&req.params, "parentPhone"),
        group: str_or_empty(&req.params, "group"),
        payment_amount: coerced_i64(&req.params, "paymentAmount"),
        comment: opt_str(&req.params, "comment"),
    };

    let created = match store.insert_student(student) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "db_insert_failed",
                e.to_string(),
                Some(json!({ "collection": "students" })),
            )
        }
    };

    let debt = if created.payment_amount > 0 {
        issue_initial_debt(store, &created)
    } else {
        None
    };

    ok(
        &req.id,
        json!({
            "student": created,
            "debtIssued": debt.is_some(),
            "payment": debt,
        }),
    )
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(student_id) = required_str(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let students = match store.list_students() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut student) = students.into_iter().find(|s| s.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    if let Some(v) = patch.get("firstName").and_then(|v| v.as_str()) {
        let name = v.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "firstName must not be empty", None);
        }
        student.first_name = name.to_string();
    }
    if let Some(v) = patch.get("lastName").and_then(|v| v.as_str()) {
        let name = v.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "lastName must not be empty", None);
        }
        student.last_name = name.to_string();
    }
    if let Some(v) = patch.get("phone").and_then(|v| v.as_str()) {
        student.phone = v.trim().to_string();
    }
    if patch.contains_key("age") {
        student.age = coerced_i64(&req.params["patch"], "age");
    }
    if let Some(v) = patch.get("source").and_then(|v| v.as_str()) {
        student.source = v.trim().to_string();
    }
    if let Some(v) = patch.get("gender").and_then(|v| v.as_str()) {
        student.gender = v.trim().to_string();
    }
    if patch.contains_key("joinDate") {
        match opt_date(&req.params["patch"], "joinDate") {
            Ok(Some(d)) => student.join_date = d,
            Ok(None) => return err(&req.id, "bad_params", "joinDate must not be null", None),
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    if let Some(v) = patch.get("parentName").and_then(|v| v.as_str()) {
        student.parent_name = v.trim().to_string();
    }
    if let Some(v) = patch.get("parentPhone").and_then(|v| v.as_str()) {
        student.parent_phone = v.trim().to_string();
    }
    if let Some(v) = patch.get("group").and_then(|v| v.as_str()) {
        student.group = v.trim().to_string();
    }
    if patch.contains_key("paymentAmount") {
        student.payment_amount = coerced_i64(&req.params["patch"], "paymentAmount");
    }
    if let Some(v) = patch.get("comment") {
        student.comment = v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }

    // Existing payments keep their name snapshot; a rename never rewrites
    // ledger history.
    match store.update_student(&student) {
        Ok(true) => ok(&req.id, json!({ "student": student })),
        Ok(false) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "students" })),
        ),
    }
}

/// Removes the student's still-unpaid payments. Paid payments stay as
/// history.
fn cascade_cleanup(store: &dyn RecordStore, student_id: &str) -> usize {
    let payments = match store.list_payments() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(student = student_id, error = %e, "cascade cleanup list failed");
            return 0;
        }
    };

    let mut removed = 0;
    for p in payments {
        if p.status != PaymentStatus::Unpaid {
            continue;
        }
        if p.student_id.as_deref() != Some(student_id) {
            continue;
        }
        match store.delete_payment(&p.id) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(payment = %p.id, error = %e, "cascade cleanup delete failed");
            }
        }
    }
    removed
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(student_id) = required_str(&req.params, "studentId") else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };

    match store.delete_student(&student_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => {
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "collection": "students" })),
            )
        }
    }

    let removed = cascade_cleanup(store, &student_id);
    ok(&req.id, json!({ "ok": true, "removedUnpaidPayments": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
