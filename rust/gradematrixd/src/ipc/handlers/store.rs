use crate::backend::local::{OptionSetImport, SessionImport};
use crate::backend::LocalStore;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::handlers::{get_required_i64, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::matrix::model::GradeOption;
use serde_json::json;
use std::sync::Arc;

fn require_store(state: &AppState) -> Result<Arc<LocalStore>, HandlerErr> {
    state
        .store
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

fn db_err(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", format!("{e:#}"))
}

fn import_catalog(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let tenant_id = get_required_i64(params, "tenantId")?;
    let grades: Vec<GradeOption> = parse_params(params, Some("grades"))?;
    let imported = store.import_catalog(tenant_id, &grades).map_err(db_err)?;
    Ok(json!({ "tenantId": tenant_id, "imported": imported }))
}

fn import_session(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let import: SessionImport = parse_params(params, None)?;
    store.import_session(&import).map_err(db_err)?;
    Ok(json!({
        "sessionId": import.session_id,
        "students": import.matrix.students.len(),
        "skills": import.matrix.assessment_id_map.len(),
    }))
}

fn import_options(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let sets: Vec<OptionSetImport> = parse_params(params, Some("sets"))?;
    let imported = store.import_selector_options(&sets).map_err(db_err)?;
    Ok(json!({ "imported": imported }))
}

fn save_log(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let store = require_store(state)?;
    let session_id = get_required_i64(params, "sessionId")?;
    let entries = store.save_log(session_id).map_err(db_err)?;
    Ok(json!({ "entries": entries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "store.importCatalog" => import_catalog(state, &req.params),
        "store.importSession" => import_session(state, &req.params),
        "store.importOptions" => import_options(state, &req.params),
        "store.saveLog" => save_log(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
