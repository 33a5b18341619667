use serde_json::json;

use crate::finance::{summarize, FinanceSummary, YearMonth};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::today_param;
use crate::ipc::types::{AppState, Request};
use crate::model::GroupStatus;
use crate::store::RecordStore;

fn reference_month(req: &Request) -> Result<YearMonth, String> {
    match req.params.get("month").and_then(|v| v.as_str()) {
        Some(raw) => {
            YearMonth::parse(raw).ok_or_else(|| format!("month must be YYYY-MM, got: {raw}"))
        }
        None => Ok(YearMonth::of(today_param(&req.params)?)),
    }
}

fn compute_summary(
    store: &dyn RecordStore,
    month: YearMonth,
) -> Result<FinanceSummary, crate::store::StoreError> {
    let payments = store.list_payments()?;
    let expenses = store.list_expenses()?;
    Ok(summarize(&payments, &expenses, month))
}

fn handle_finance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let month = match reference_month(req) {
        Ok(m) => m,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let Some(store) = state.store.as_deref() else {
        return ok(
            &req.id,
            json!({ "month": month.to_string(), "summary": FinanceSummary::default() }),
        );
    };

    match compute_summary(store, month) {
        Ok(summary) => ok(
            &req.id,
            json!({ "month": month.to_string(), "summary": summary }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let month = match reference_month(req) {
        Ok(m) => m,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let Some(store) = state.store.as_deref() else {
        return ok(
            &req.id,
            json!({
                "month": month.to_string(),
                "studentsCount": 0,
                "teachersCount": 0,
                "activeGroupsCount": 0,
                "summary": FinanceSummary::default(),
            }),
        );
    };

    let students = match store.list_students() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let teachers = match store.list_teachers() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let groups = match store.list_groups() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let summary = match compute_summary(store, month) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let active_groups = groups
        .iter()
        .filter(|g| g.status == GroupStatus::Active)
        .count();

    ok(
        &req.id,
        json!({
            "month": month.to_string(),
            "studentsCount": students.len(),
            "teachersCount": teachers.len(),
            "activeGroupsCount": active_groups,
            "summary": summary,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "finance.summary" => Some(handle_finance_summary(state, req)),
        "dashboard.stats" => Some(handle_dashboard_stats(state, req)),
        _ => None,
    }
}
