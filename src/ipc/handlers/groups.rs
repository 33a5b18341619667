use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{coerced_i64, required_str, str_or_empty};
use crate::ipc::types::{AppState, Request};
use crate::model::{Group, GroupStatus};

fn handle_groups_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return ok(&req.id, json!({ "groups": [] }));
    };

    match store.list_groups() {
        Ok(groups) => ok(&req.id, json!({ "groups": groups })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_groups_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(name) = required_str(&req.params, "name") else {
        return err(&req.id, "bad_params", "missing name", None);
    };

    let group = Group {
        id: String::new(),
        name,
        course: str_or_empty(&req.params, "course"),
        days: str_or_empty(&req.params, "days"),
        time: str_or_empty(&req.params, "time"),
        student_count: 0,
        status: GroupStatus::Active,
    };

    match store.insert_group(group) {
        Ok(created) => ok(&req.id, json!({ "group": created })),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "collection": "groups" })),
        ),
    }
}

fn handle_groups_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(group_id) = required_str(&req.params, "groupId") else {
        return err(&req.id, "bad_params", "missing groupId", None);
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let groups = match store.list_groups() {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(mut group) = groups.into_iter().find(|g| g.id == group_id) else {
        return err(&req.id, "not_found", "group not found", None);
    };

    if let Some(v) = patch.get("name").and_then(|v| v.as_str()) {
        let name = v.trim();
        if name.is_empty() {
            return err(&req.id, "bad_params", "name must not be empty", None);
        }
        group.name = name.to_string();
    }
    if let Some(v) = patch.get("course").and_then(|v| v.as_str()) {
        group.course = v.trim().to_string();
    }
    if let Some(v) = patch.get("days").and_then(|v| v.as_str()) {
        group.days = v.trim().to_string();
    }
    if let Some(v) = patch.get("time").and_then(|v| v.as_str()) {
        group.time = v.trim().to_string();
    }
    if patch.contains_key("studentCount") {
        group.student_count = coerced_i64(&req.params["patch"], "studentCount");
    }
    if let Some(v) = patch.get("status") {
        let Some(status) = v.as_str().and_then(GroupStatus::parse) else {
            return err(
                &req.id,
                "bad_params",
                format!("status must be \"active\" or \"archived\", got: {v}"),
                None,
            );
        };
        group.status = status;
    }

    match store.update_group(&group) {
        Ok(true) => ok(&req.id, json!({ "group": group })),
        Ok(false) => err(&req.id, "not_found", "group not found", None),
        Err(e) => err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "collection": "groups" })),
        ),
    }
}

fn handle_groups_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(store) = state.store.as_deref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(group_id) = required_str(&req.params, "groupId") else {
        return err(&req.id, "bad_params", "missing groupId", None);
    };

    match store.delete_group(&group_id) {
        Ok(true) => ok(&req.id, json!({ "ok": true })),
        Ok(false) => err(&req.id, "not_found", "group not found", None),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "collection": "groups" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "groups.list" => Some(handle_groups_list(state, req)),
        "groups.create" => Some(handle_groups_create(state, req)),
        "groups.update" => Some(handle_groups_update(state, req)),
        "groups.delete" => Some(handle_groups_delete(state, req)),
        _ => None,
    }
}
