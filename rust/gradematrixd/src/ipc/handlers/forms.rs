use crate::dashboard::cascade::{SelectorError, SelectorGraph, SelectorNode};
use crate::dashboard::menu::{derive_menu, MenuContext};
use crate::dashboard::mirror::MirrorRule;
use crate::ipc::error::{ok, HandlerErr};
use crate::ipc::handlers::parse_params;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

impl From<SelectorError> for HandlerErr {
    fn from(e: SelectorError) -> Self {
        let code = match &e {
            SelectorError::Resolver(_) => "db_query_failed",
            _ => "bad_params",
        };
        HandlerErr::new(code, e.to_string())
    }
}

fn menu(params: &Value) -> Result<Value, HandlerErr> {
    let ctx: MenuContext = parse_params(params, None)?;
    Ok(json!({ "items": derive_menu(&ctx) }))
}

fn select(state: &AppState, params: &Value) -> Result<Value, HandlerErr> {
    let store = state
        .store
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let graph = match params.get("graph") {
        Some(_) => SelectorGraph::new(parse_params::<Vec<SelectorNode>>(params, Some("graph"))?)?,
        None => SelectorGraph::course_chain(),
    };
    let selected: BTreeMap<String, String> = match params.get("selected") {
        Some(_) => parse_params(params, Some("selected"))?,
        None => BTreeMap::new(),
    };

    // Without a node this only re-derives the option sets.
    let derived = match params.get("node").and_then(|v| v.as_str()) {
        Some(node) => {
            let value = params
                .get("value")
                .and_then(|v| v.as_str())
                .ok_or_else(|| HandlerErr::bad_params("missing params.value"))?;
            graph.select(&selected, node, value, store.as_ref())?
        }
        None => graph.resolve(&selected, store.as_ref())?,
    };
    Ok(json!(derived))
}

fn mirror(params: &Value) -> Result<Value, HandlerErr> {
    let rule: MirrorRule = parse_params(params, Some("rule"))?;
    rule.check().map_err(HandlerErr::bad_params)?;
    let before: Map<String, Value> = match params.get("before") {
        Some(_) => parse_params(params, Some("before"))?,
        None => Map::new(),
    };
    let mut after: Map<String, Value> = parse_params(params, Some("after"))?;
    let changed = rule.apply(&before, &mut after);
    Ok(json!({ "values": after, "changed": changed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let result = match req.method.as_str() {
        "menu.derive" => menu(&req.params),
        "selectors.select" => select(state, &req.params),
        "forms.mirror" => mirror(&req.params),
        _ => return None,
    };
    Some(match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    })
}
