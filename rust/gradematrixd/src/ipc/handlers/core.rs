use crate::backend::{Backend, HttpBackend, LocalStore};
use crate::config::AppConfig;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backend": state.backend.as_ref().map(|b| b.kind()),
            "sessionOpen": state.session.is_some(),
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

    let config = match AppConfig::load(Some(&path)) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "config_invalid", format!("{e:#}"), None),
    };
    let store = match LocalStore::open(&path, config.status.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };

    // A new workspace invalidates whatever matrix was open.
    state.session = None;
    state.config = config;
    state.backend = Some(store.clone() as Arc<dyn Backend>);
    state.store = Some(store);
    state.workspace = Some(path.clone());
    info!(workspace = %path.to_string_lossy(), "workspace selected");
    ok(
        &req.id,
        json!({ "workspacePath": path.to_string_lossy(), "backend": "local" }),
    )
}

fn connect_http(state: &AppState, params: &serde_json::Value) -> Result<HttpBackend, HandlerErr> {
    let mut cfg = state.config.http.clone();
    if let Some(url) = params.get("baseUrl").and_then(|v| v.as_str()) {
        cfg.base_url = Some(url.to_string());
    }
    if let Some(token) = params.get("bearerToken").and_then(|v| v.as_str()) {
        cfg.bearer_token = Some(token.to_string());
    }
    if let Some(secs) = params.get("timeoutSecs").and_then(|v| v.as_u64()) {
        cfg.timeout_secs = secs;
    }
    HttpBackend::new(&cfg).map_err(|e| HandlerErr::bad_params(format!("{e:#}")))
}

fn handle_backend_connect(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kind = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .unwrap_or("http");
    let backend: Arc<dyn Backend> = match kind {
        "local" => {
            let Some(store) = state.store.clone() else {
                return err(&req.id, "no_workspace", "select a workspace first", None);
            };
            store as Arc<dyn Backend>
        }
        "http" => match connect_http(state, &req.params) {
            Ok(b) => {
                info!(base_url = b.base_url(), "http backend configured");
                Arc::new(b) as Arc<dyn Backend>
            }
            Err(e) => return e.response(&req.id),
        },
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown backend kind: {other}"),
                None,
            )
        }
    };

    state.session = None;
    info!(backend = backend.kind(), "backend connected");
    let kind = backend.kind();
    state.backend = Some(backend);
    ok(&req.id, json!({ "backend": kind }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "backend.connect" => Some(handle_backend_connect(state, req)),
        _ => None,
    }
}
