pub mod core;
pub mod forms;
pub mod matrix;
pub mod store;

use crate::ipc::error::HandlerErr;
use serde::de::DeserializeOwned;

/// Deserialize `params` (or one field of it) into a typed request body.
pub(crate) fn parse_params<T: DeserializeOwned>(
    params: &serde_json::Value,
    field: Option<&str>,
) -> Result<T, HandlerErr> {
    let value = match field {
        Some(f) => params
            .get(f)
            .cloned()
            .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{f}")))?,
        None => params.clone(),
    };
    serde_json::from_value(value).map_err(|e| match field {
        Some(f) => HandlerErr::bad_params(format!("invalid params.{f}: {e}")),
        None => HandlerErr::bad_params(format!("invalid params: {e}")),
    })
}

pub(crate) fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{key}")))
}

pub(crate) fn get_required_str<'a>(
    params: &'a serde_json::Value,
    key: &str,
) -> Result<&'a str, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing params.{key}")))
}
