use std::path::PathBuf;

use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{open_store, BackendKind};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.backend.map(|b| b.as_str()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let backend = match req.params.get("backend").and_then(|v| v.as_str()) {
        None => BackendKind::Sqlite,
        Some(raw) => match BackendKind::parse(raw) {
            Some(b) => b,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("backend must be \"sqlite\" or \"json\", got: {raw}"),
                    None,
                )
            }
        },
    };

    match open_store(&path, backend) {
        Ok(store) => {
            tracing::info!(path = %path.display(), backend = backend.as_str(), "workspace selected");
            state.workspace = Some(path.clone());
            state.backend = Some(backend);
            state.store = Some(store);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "backend": backend.as_str(),
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
