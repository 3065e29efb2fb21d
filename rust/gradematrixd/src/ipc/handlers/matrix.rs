use crate::ipc::error::{matrix_err, ok, HandlerErr};
use crate::ipc::handlers::{get_required_i64, get_required_str, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::matrix::editor::GradeInput;
use crate::matrix::model::{SessionKey, WorkflowStatus};
use crate::matrix::{load_matrix, MatrixSession};
use serde_json::json;
use tracing::warn;

fn no_session() -> HandlerErr {
    HandlerErr::new("no_session", "no matrix is open")
}

fn session_mut(state: &mut AppState) -> Result<&mut MatrixSession, HandlerErr> {
    state.session.as_mut().ok_or_else(no_session)
}

fn session_view(s: &MatrixSession) -> serde_json::Value {
    let dirty_cells = s.dirty_cells();
    json!({
        "sessionKey": s.key(),
        "status": s.status(),
        "phase": s.phase(),
        "columns": s.columns(),
        "catalog": s.catalog(),
        "students": s.working(),
        "dirty": s.is_dirty(),
        "changeCount": dirty_cells.len(),
        "dirtyCells": dirty_cells,
    })
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key: SessionKey = match parse_params(&req.params, None) {
        Ok(k) => k,
        Err(e) => return e.response(&req.id),
    };
    let Some(backend) = state.backend.clone() else {
        return HandlerErr::new("no_backend", "select a workspace or connect a backend first")
            .response(&req.id);
    };

    // Nothing from a previous matrix survives a reopen, even a failed one.
    state.session = None;
    match load_matrix(backend.as_ref(), &key, &state.config.status) {
        Ok(loaded) => {
            let session = MatrixSession::new(key, loaded, state.config.status.clone());
            let view = session_view(&session);
            state.session = Some(session);
            ok(&req.id, view)
        }
        Err(e) => {
            warn!(session_id = key.session_id, error = %e, "matrix open failed");
            matrix_err(&req.id, &e)
        }
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(s) => ok(&req.id, session_view(s)),
        None => no_session().response(&req.id),
    }
}

fn apply_cell(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let skill_key = get_required_str(params, "skillKey")?;
    let input: GradeInput = parse_params(params, Some("grade"))?;
    let session = session_mut(state)?;
    let applied = session.apply_cell(student_id, skill_key, &input)?;
    Ok(json!(applied))
}

fn diff(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    let changes = session.change_set();
    let cells: usize = changes.iter().map(|c| c.grades.len()).sum();
    Ok(json!({
        "changes": changes,
        "students": changes.len(),
        "cells": cells,
    }))
}

fn validate(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    Ok(json!(session.validate()))
}

fn save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let raw = get_required_str(params, "targetStatus")?;
    let target = WorkflowStatus::parse(raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown targetStatus: {raw}")))?;
    let backend = state
        .backend
        .clone()
        .ok_or_else(|| HandlerErr::new("no_backend", "no backend connected"))?;
    let session = session_mut(state)?;
    let outcome = session.save(target, backend.as_ref())?;
    Ok(json!({
        "outcome": outcome,
        "matrix": session_view(session),
    }))
}

fn cancel(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let session = session_mut(state)?;
    session.cancel()?;
    Ok(session_view(session))
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let closed = state.session.take().is_some();
    ok(&req.id, json!({ "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "matrix.open" => return Some(handle_open(state, req)),
        "matrix.get" => return Some(handle_get(state, req)),
        "matrix.close" => return Some(handle_close(state, req)),
        "matrix.applyCell" => apply_cell(state, &req.params),
        "matrix.diff" => diff(state),
        "matrix.validate" => validate(state),
        "matrix.save" => save(state, &req.params),
        "matrix.cancel" => cancel(state),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
