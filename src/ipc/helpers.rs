use crate::config::MAX_PREVIEW_LIMIT;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, StatsError};
use crate::store::DeleteOutcome;
use rusqlite::Connection;
use serde_json::json;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn optional_id(req: &Request, key: &str) -> Result<Option<i64>, serde_json::Value> {
    stats::parse_optional_id(req.params.get(key), key)
        .map_err(|msg| err(&req.id, "bad_params", msg, None))
}

pub fn required_id(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    optional_id(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Reads a non-negative number.
pub fn optional_amount(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) if n.is_finite() && n >= 0.0 => Ok(Some(n)),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a non-negative number", key),
                Some(json!({ "field": key, "value": v })),
            )),
        },
    }
}

pub fn preview_limit(state: &AppState, req: &Request) -> Result<usize, serde_json::Value> {
    match req.params.get("limit") {
        None => Ok(state.preview_limit),
        Some(v) if v.is_null() => Ok(state.preview_limit),
        Some(v) => match v.as_u64() {
            Some(n) if (n as usize) <= MAX_PREVIEW_LIMIT => Ok(n as usize),
            _ => Err(err(
                &req.id,
                "bad_params",
                format!("limit must be an integer between 0 and {}", MAX_PREVIEW_LIMIT),
                None,
            )),
        },
    }
}

pub fn stats_err(req: &Request, e: StatsError) -> serde_json::Value {
    let details = match &e {
        StatsError::InvalidDimension(name) => Some(json!({ "dimension": name })),
        StatsError::InvalidMetric(name) => Some(json!({ "metric": name })),
        StatsError::BadFilter(_) => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

pub fn store_err(req: &Request, code: &str, e: anyhow::Error) -> serde_json::Value {
    err(&req.id, code, format!("{e:#}"), None)
}

pub fn delete_reply(req: &Request, outcome: DeleteOutcome, what: &str, id: i64) -> serde_json::Value {
    match outcome {
        DeleteOutcome::Deleted => ok(&req.id, json!({ "deleted": id })),
        DeleteOutcome::NotFound => err(&req.id, "not_found", format!("{} not found", what), None),
        DeleteOutcome::InUse(refs) => err(
            &req.id,
            "in_use",
            format!("{} is still referenced", what),
            Some(json!({ "references": refs })),
        ),
    }
}
