use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, preview_limit, stats_err, store_err};
use crate::ipc::types::{AppState, Request};
use crate::reports::{self, CatalogLabels};
use crate::stats::{self, PersonKind};
use crate::store;
use serde_json::json;

fn handle_reports_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match stats::parse_filters(Some(&req.params)) {
        Ok(v) => v,
        Err(e) => return stats_err(req, e),
    };
    let limit = match preview_limit(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let records = match store::load_people(conn, PersonKind::Student) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    tracing::debug!(
        records = records.len(),
        ?filters,
        "building student report"
    );
    ok(&req.id, json!(reports::student_report(&records, &filters, limit)))
}

fn handle_reports_faculty(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match stats::parse_filters(Some(&req.params)) {
        Ok(v) => v,
        Err(e) => return stats_err(req, e),
    };
    let limit = match preview_limit(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let records = match store::load_people(conn, PersonKind::Faculty) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    tracing::debug!(
        records = records.len(),
        ?filters,
        "building faculty report"
    );
    ok(&req.id, json!(reports::faculty_report(&records, &filters, limit)))
}

fn string_list(req: &Request, key: &str, required: bool) -> Result<Vec<String>, serde_json::Value> {
    let bad = || {
        err(
            &req.id,
            "bad_params",
            format!("{} must be an array of strings", key),
            None,
        )
    };
    match req.params.get(key) {
        None if required => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
        None => Ok(Vec::new()),
        Some(v) if v.is_null() && !required => Ok(Vec::new()),
        Some(v) => {
            let Some(items) = v.as_array() else {
                return Err(bad());
            };
            items
                .iter()
                .map(|item| item.as_str().map(|s| s.to_string()).ok_or_else(bad))
                .collect()
        }
    }
}

fn handle_stats_aggregate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(PersonKind::parse)
    {
        Some(k) => k,
        None => {
            return err(
                &req.id,
                "bad_params",
                "kind must be one of: students, faculty",
                Some(json!({ "kind": req.params.get("kind") })),
            )
        }
    };
    let dimensions = match string_list(req, "dimensions", true) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let metrics = match string_list(req, "metrics", false) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match stats::parse_filters(req.params.get("filters")) {
        Ok(v) => v,
        Err(e) => return stats_err(req, e),
    };

    let records = match store::load_people(conn, kind) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    let aggregation = match stats::aggregate(&records, &dimensions, &metrics, &filters) {
        Ok(v) => v,
        Err(e) => return stats_err(req, e),
    };

    ok(
        &req.id,
        json!({
            "kind": kind.as_str(),
            "total": aggregation.total,
            "derivedMetrics": aggregation.derived_metrics,
            "results": aggregation.results,
            "filters": filters
        }),
    )
}

fn handle_dashboard_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let loaded = (|| -> anyhow::Result<_> {
        let students = store::load_people(conn, PersonKind::Student)?;
        let faculty = store::load_people(conn, PersonKind::Faculty)?;
        let catalog = CatalogLabels {
            departments: store::list_departments(conn)?
                .into_iter()
                .map(|d| d.name)
                .collect(),
            courses: store::list_courses(conn)?
                .into_iter()
                .map(|c| c.name)
                .collect(),
        };
        Ok((students, faculty, catalog))
    })();
    let (students, faculty, catalog) = match loaded {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };

    ok(
        &req.id,
        json!(reports::dashboard(&students, &faculty, &catalog)),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.students" => Some(handle_reports_students(state, req)),
        "reports.faculty" => Some(handle_reports_faculty(state, req)),
        "stats.aggregate" => Some(handle_stats_aggregate(state, req)),
        "dashboard.stats" => Some(handle_dashboard_stats(state, req)),
        _ => None,
    }
}
