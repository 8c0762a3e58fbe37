use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, delete_reply, optional_id, required_id, required_str, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

/// Department and course groups are labelled by name, so both the code and the
/// name must be unused.
fn ensure_new_catalog_row(
    conn: &Connection,
    req: &Request,
    table: &str,
    code: &str,
    name: &str,
) -> Result<(), serde_json::Value> {
    match store::catalog_conflict(conn, table, code, name) {
        Ok(None) => Ok(()),
        Ok(Some(field)) => {
            let value = if field == "code" { code } else { name };
            Err(err(
                &req.id,
                "duplicate",
                format!("{} is already in use", field),
                Some(json!({ "field": field, "value": value })),
            ))
        }
        Err(e) => Err(store_err(req, "db_query_failed", e)),
    }
}

fn handle_departments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "departments": [] }));
    };
    match store::list_departments(conn) {
        Ok(departments) => ok(&req.id, json!({ "departments": departments })),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_departments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Err(e) = ensure_new_catalog_row(conn, req, "departments", &code, &name) {
        return e;
    }

    match store::create_department(conn, &code, &name) {
        Ok(id) => ok(
            &req.id,
            json!({ "departmentId": id, "code": code, "name": name }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "departments" })),
        ),
    }
}

fn handle_departments_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_id(req, "departmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_department(conn, id) {
        Ok(outcome) => delete_reply(req, outcome, "department", id),
        Err(e) => store_err(req, "db_delete_failed", e),
    }
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "courses": [] }));
    };
    match store::list_courses(conn) {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let department_id = match optional_id(req, "departmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    if let Some(dept) = department_id {
        match store::catalog_exists(conn, "departments", dept) {
            Ok(true) => {}
            Ok(false) => return err(&req.id, "not_found", "department not found", None),
            Err(e) => return store_err(req, "db_query_failed", e),
        }
    }

    if let Err(e) = ensure_new_catalog_row(conn, req, "courses", &code, &name) {
        return e;
    }

    match store::create_course(conn, &code, &name, department_id) {
        Ok(id) => ok(
            &req.id,
            json!({
                "courseId": id,
                "code": code,
                "name": name,
                "departmentId": department_id
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "courses" })),
        ),
    }
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_id(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_course(conn, id) {
        Ok(outcome) => delete_reply(req, outcome, "course", id),
        Err(e) => store_err(req, "db_delete_failed", e),
    }
}

fn handle_academic_years_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "academicYears": [] }));
    };
    match store::list_academic_years(conn) {
        Ok(years) => ok(&req.id, json!({ "academicYears": years })),
        Err(e) => store_err(req, "db_query_failed", e),
    }
}

fn handle_academic_years_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let label = match required_str(req, "label") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let is_current = req
        .params
        .get("isCurrent")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    match store::create_academic_year(conn, &label, is_current) {
        Ok(id) => ok(
            &req.id,
            json!({ "academicYearId": id, "label": label, "isCurrent": is_current }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "academic_years" })),
        ),
    }
}

fn handle_academic_years_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_id(req, "academicYearId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_academic_year(conn, id) {
        Ok(outcome) => delete_reply(req, outcome, "academic year", id),
        Err(e) => store_err(req, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "departments.list" => Some(handle_departments_list(state, req)),
        "departments.create" => Some(handle_departments_create(state, req)),
        "departments.delete" => Some(handle_departments_delete(state, req)),
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        "academicYears.list" => Some(handle_academic_years_list(state, req)),
        "academicYears.create" => Some(handle_academic_years_create(state, req)),
        "academicYears.delete" => Some(handle_academic_years_delete(state, req)),
        _ => None,
    }
}
