use std::path::PathBuf;

use serde::Deserialize;

use crate::store::{BackendKind, RecordStore};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub backend: Option<BackendKind>,
    pub store: Option<Box<dyn RecordStore>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            backend: None,
            store: None,
        }
    }
}
