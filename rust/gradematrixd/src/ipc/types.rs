use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;

use crate::backend::{Backend, LocalStore};
use crate::config::AppConfig;
use crate::matrix::MatrixSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub config: AppConfig,
    pub store: Option<Arc<LocalStore>>,
    pub backend: Option<Arc<dyn Backend>>,
    // At most one opened matrix per sidecar.
    pub session: Option<MatrixSession>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            workspace: None,
            config,
            store: None,
            backend: None,
            session: None,
        }
    }
}
