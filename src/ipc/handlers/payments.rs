use std::collections::HashSet;

use serde_json::json;

use crate::finance::{
    add_one_month, days_until_due, ledger_stats, matches_view, PaymentView,
};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{coerced_i64, opt_date, opt_str, required_str, today_param};
use crate::ipc::types::{AppState, Request};
use crate::model::{Payment, PaymentStatus};
use crate::store::RecordStore;

fn payment_row(p: &Payment, today: chrono::NaiveDate) -> serde_json::Value {
    let mut row = serde_json::to_value(p).unwrap_or_else(|_| json!({}));
    if p.status == PaymentStatus::Unpaid {
        row["daysUntilDue"] = json!(days_until_due(p.due_date, today));
    }
    row
}

fn handle_payments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let today = match today_param(&req.params) {
        Ok(d) => d,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let view = match req.params.get("view").and_then(|v| v.as_str()) {
        None => PaymentView::All,
        Some(raw) => match PaymentView::parse(raw) {
            Some(v) => v,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("view must be all|overdue|upcoming|paid, got: {raw}"),
                    None,
                )
            }
        },
    };

    let Some(store) = state.store.as_deref() else {
        return ok(
            &req.id,
            json!({ "payments": [], "stats": ledger_stats(&[], today) }),
        );
    };

    let payments = match store.list_payments() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Header cards always summarize the whole ledger, whichever view the
    // table shows.
    let stats = ledger_stats(&payments, today);
    let rows: Vec<_> = payments
        .iter()
        .filter(|p| matches_view(p, view, today))
        .map(|p| payment_row(p, today))
        .collect();

    ok(&req.id, json!({ "payments": rows, "stats": stats }))
}

/// Direct income entry: recorded already settled, outside the issued-debt
/// flow.
fn handle_payments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let paid_on = match opt_date(&req.params, "date") {
        Ok(v) => v.unwrap_or_else(|| chrono::Local::now().date_naive()),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    // Resolve the student when an id is given; an id that no longer exists
    // degrades to a free-form entry instead of minting an instant orphan.
    let mut student_id = None;
    let mut student_name = opt_str(&req.params, "studentName");
    let mut group_fallback = None;
    if let Some(sid) = opt_str(&req.params, "studentId") {
        let students = match store.list_students() {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
        if let Some(student) = students.into_iter().find(|s| s.id == sid) {
            student_name = Some(student.display_name());
            group_fallback = Some(student.group);
            student_id = Some(sid);
        }
    }

    let group = opt_str(&req.params, "group")
        .or(group_fallback)
        .unwrap_or_default();
    let course = match opt_str(&req.params, "course") {
        Some(c) => c,
        None => super::students::resolve_course(store, &group),
    };

    let payment = Payment {
        id: String::new(),
        student_id,
        student_name: student_name.unwrap_or_else(|| "unknown".to_string()),
        course,
        group,
        amount: coerced_i64(&req.params, "amount"),
        due_date: paid_on,
        paid_on: Some(paid_on),
        status: PaymentStatus::Paid,
        comment: opt_str(&req.params, "comment"),
        next_due_date: None,
    };

    match store.insert_payment(payment) {
        Ok(created) => ok(&req.id, json!({ "payment": created })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "collection": "payments" })),
        ),
    }
}

/// Settles a payment: stamps `paid_on`, keeps the due date, and schedules the
/// next monthly anniversary.
fn handle_payments_mark_paid(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(payment_id) = required_str(&req.params, "paymentId") else {
        return err(&req.id, "bad_params", "missing paymentId", None);
    };
    let paid_on = match opt_date(&req.params, "paidOn") {
        Ok(v) => v.unwrap_or_else(|| chrono::Local::now().date_naive()),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let payments = match store.list_payments() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut payment) = payments.into_iter().find(|p| p.id == payment_id) else {
        return err(&req.id, "not_found", "payment not found", None);
    };

    if req.params.get("amount").is_some() {
        payment.amount = coerced_i64(&req.params, "amount");
    }
    if let Some(comment) = opt_str(&req.params, "comment") {
        payment.comment = Some(comment);
    }
    payment.status = PaymentStatus::Paid;
    payment.paid_on = Some(paid_on);
    payment.next_due_date = Some(add_one_month(payment.due_date));

    match store.update_payment(&payment) {
        Ok(true) => ok(&req.id, json!({ "payment": payment })),
        Ok(false) => err(&req.id, "not_found", "payment not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "payments" })),
        ),
    }
}

/// Generic field edit. Sets whatever the patch names, including `status` —
/// the ledger rules are not re-checked here.
fn handle_payments_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(payment_id) = required_str(&req.params, "paymentId") else {
        return err(&req.id, "bad_params", "missing paymentId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let payments = match store.list_payments() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut payment) = payments.into_iter().find(|p| p.id == payment_id) else {
        return err(&req.id, "not_found", "payment not found", None);
    };

    if let Some(v) = patch.get("studentId") {
        payment.student_id = v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }
    if let Some(v) = patch.get("studentName").and_then(|v| v.as_str()) {
        payment.student_name = v.trim().to_string();
    }
    if let Some(v) = patch.get("course").and_then(|v| v.as_str()) {
        payment.course = v.trim().to_string();
    }
    if let Some(v) = patch.get("group").and_then(|v| v.as_str()) {
        payment.group = v.trim().to_string();
    }
    if patch.contains_key("amount") {
        payment.amount = coerced_i64(&req.params["patch"], "amount");
    }
    if patch.contains_key("dueDate") {
        match opt_date(&req.params["patch"], "dueDate") {
            Ok(Some(d)) => payment.due_date = d,
            Ok(None) => return err(&req.id, "bad_params", "dueDate must not be null", None),
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    if patch.contains_key("paidOn") {
        match opt_date(&req.params["patch"], "paidOn") {
            Ok(v) => payment.paid_on = v,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    if patch.contains_key("nextDueDate") {
        match opt_date(&req.params["patch"], "nextDueDate") {
            Ok(v) => payment.next_due_date = v,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    if let Some(v) = patch.get("status") {
        let Some(status) = v.as_str().and_then(PaymentStatus::parse) else {
            return err(
                &req.id,
                "bad_params",
                format!("status must be \"unpaid\" or \"paid\", got: {v}"),
                None,
            );
        };
        payment.status = status;
    }
    if let Some(v) = patch.get("comment") {
        payment.comment = v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }

    match store.update_payment(&payment) {
        Ok(true) => ok(&req.id, json!({ "payment": payment })),
        Ok(false) => err(&req.id, "not_found", "payment not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "payments" })),
        ),
    }
}

fn handle_payments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(payment_id) = required_str(&req.params, "paymentId") else {
        return err(&req.id, "bad_params", "missing paymentId", None);
    };

    match store.delete_payment(&payment_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "payment not found", None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "collection": "payments" })),
        ),
    }
}

/// Explicitly invoked orphan sweep: drops payments whose student link no
/// longer resolves. Free-form entries (no link) are never touched. This is
/// the only place the ledger is pruned; listing never writes.
fn reconcile_orphans(store: &dyn RecordStore) -> Result<usize, crate::store::StoreError> {
    let known: HashSet<String> = store
        .list_students()?
        .into_iter()
        .map(|s| s.id)
        .collect();

    let mut removed = 0;
    for p in store.list_payments()? {
        let Some(sid) = p.student_id.as_deref() else {
            continue;
        };
        if known.contains(sid) {
            continue;
        }
        match store.delete_payment(&p.id) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(payment = %p.id, error = %e, "reconcile delete failed");
            }
        }
    }
    Ok(removed)
}

fn handle_payments_reconcile(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match reconcile_orphans(store) {
        Ok(removed) => ok(&req.id, json!({ "removed": removed })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "payments.list" => Some(handle_payments_list(state, req)),
        "payments.create" => Some(handle_payments_create(state, req)),
        "payments.markPaid" => Some(handle_payments_mark_paid(state, req)),
        "payments.update" => Some(handle_payments_update(state, req)),
        "payments.delete" => Some(handle_payments_delete(state, req)),
        "payments.reconcile" => Some(handle_payments_reconcile(state, req)),
        _ => None,
    }
}
