use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{coerced_i64, opt_date, opt_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{Expense, ExpenseCategory};

fn handle_expenses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return ok(&req.id, json!({ "expenses": [] }));
    };

    match store.list_expenses() {
        Ok(expenses) => ok(&req.id, json!({ "expenses": expenses })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_expenses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(title) = required_str(&req.params, "title") else {
        return err(&req.id, "bad_params", "missing title", None);
    };
    // The category set is closed; unknown labels are rejected before they
    // reach the store.
    let Some(raw_category) = req.params.get("category").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing category", None);
    };
    let Some(category) = ExpenseCategory::parse(raw_category) else {
        return err(
            &req.id,
            "bad_params",
            format!("category must be rent|salary|utility|office|other, got: {raw_category}"),
            None,
        );
    };
    let date = match opt_date(&req.params, "date") {
        Ok(v) => v.unwrap_or_else(|| chrono::Local::now().date_naive()),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let expense = Expense {
        id: String::new(),
        title,
        amount: coerced_i64(&req.params, "amount"),
        date,
        category,
        comment: opt_str(&req.params, "comment"),
    };

    match store.insert_expense(expense) {
        Ok(created) => ok(&req.id, json!({ "expense": created })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "collection": "expenses" })),
        ),
    }
}

fn handle_expenses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(expense_id) = required_str(&req.params, "expenseId") else {
        return err(&req.id, "bad_params", "missing expenseId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let expenses = match store.list_expenses() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut expense) = expenses.into_iter().find(|e| e.id == expense_id) else {
        return err(&req.id, "not_found", "expense not found", None);
    };

    if let Some(v) = patch.get("title").and_then(|v| v.as_str()) {
        let title = v.trim();
        if title.is_empty() {
            return err(&req.id, "bad_params", "title must not be empty", None);
        }
        expense.title = title.to_string();
    }
    if patch.contains_key("amount") {
        expense.amount = coerced_i64(&req.params["patch"], "amount");
    }
    if patch.contains_key("date") {
        match opt_date(&req.params["patch"], "date") {
            Ok(Some(d)) => expense.date = d,
            Ok(None) => return err(&req.id, "bad_params", "date must not be null", None),
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    if let Some(v) = patch.get("category") {
        let Some(category) = v.as_str().and_then(ExpenseCategory::parse) else {
            return err(
                &req.id,
                "bad_params",
                format!("category must be rent|salary|utility|office|other, got: {v}"),
                None,
            );
        };
        expense.category = category;
    }
    if let Some(v) = patch.get("comment") {
        expense.comment = v.as_str().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    }

    match store.update_expense(&expense) {
        Ok(true) => ok(&req.id, json!({ "expense": expense })),
        Ok(false) => err(&req.id, "not_found", "expense not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "expenses" })),
        ),
    }
}

fn handle_expenses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(expense_id) = required_str(&req.params, "expenseId") else {
        return err(&req.id, "bad_params", "missing expenseId", None);
    };

    match store.delete_expense(&expense_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "expense not found", None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "collection": "expenses" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "expenses.list" => Some(handle_expenses_list(state, req)),
        "expenses.create" => Some(handle_expenses_create(state, req)),
        "expenses.update" => Some(handle_expenses_update(state, req)),
        "expenses.delete" => Some(handle_expenses_delete(state, req)),
        _ => None,
    }
}
