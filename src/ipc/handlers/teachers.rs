use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{coerced_i64, opt_date, required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::model::Teacher;

fn handle_teachers_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return ok(&req.id, json!({ "teachers": [] }));
    };

    match store.list_teachers() {
        Ok(teachers) => ok(&req.id, json!({ "teachers": teachers })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(first_name) = required_str(&req.params, "firstName") else {
        return err(&req.id, "bad_params", "missing firstName", None);
    };
    let Some(last_name) = required_str(&req.params, "lastName") else {
        return err(&req.id, "bad_params", "missing lastName", None);
    };
    let start_date = match opt_date(&req.params, "startDate") {
        Ok(v) => v.unwrap_or_else(|| chrono::Local::now().date_naive()),
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let teacher = Teacher {
        id: String::new(),
        first_name,
        last_name,
        phone: str_or_empty(&req.params, "phone"),
        age: coerced_i64(&req.params, "age"),
        start_date,
    };

    match store.insert_teacher(teacher) {
        Ok(created) => ok(&req.id, json!({ "teacher": created })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "collection": "teachers" })),
        ),
    }
}

fn handle_teachers_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(teacher_id) = required_str(&req.params, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let teachers = match store.list_teachers() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut teacher) = teachers.into_iter().find(|t| t.id == teacher_id) else {
        return err(&req.id, "not_found", "teacher not found", None);
    };

    if let Some(v) = patch.get("firstName").and_then(|v| v.as_str()) {
        let name = v.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "firstName must not be empty", None);
        }
        teacher.first_name = name.to_string();
    }
    if let Some(v) = patch.get("lastName").and_then(|v| v.as_str()) {
        let name = v.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "lastName must not be empty", None);
        }
        teacher.last_name = name.to_string();
    }
    if let Some(v) = patch.get("phone").and_then(|v| v.as_str()) {
        teacher.phone = v.trim().to_string();
    }
    if patch.contains_key("age") {
        teacher.age = coerced_i64(&req.params["patch"], "age");
    }
    if patch.contains_key("startDate") {
        match opt_date(&req.params["patch"], "startDate") {
            Ok(Some(d)) => teacher.start_date = d,
            Ok(None) => return err(&req.id, "bad_params", "startDate must not be null", None),
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }

    match store.update_teacher(&teacher) {
        Ok(true) => ok(&req.id, json!({ "teacher": teacher })),
        Ok(false) => err(&req.id, "not_found", "teacher not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "teachers" })),
        ),
    }
}

fn handle_teachers_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(teacher_id) = required_str(&req.params, "teacherId") else {
        return err(&req.id, "bad_params", "missing teacherId", None);
    };

    match store.delete_teacher(&teacher_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "teacher not found", None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "collection": "teachers" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.list" => Some(handle_teachers_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "teachers.update" => Some(handle_teachers_update(state, req)),
        "teachers.delete" => Some(handle_teachers_delete(state, req)),
        _ => None,
    }
}
