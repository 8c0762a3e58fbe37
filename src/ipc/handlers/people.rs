use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    db_conn, delete_reply, optional_amount, optional_id, optional_str, preview_limit,
    required_id, required_str, stats_err, store_err,
};
use crate::ipc::types::{AppState, Request};
use crate::stats::{self, PersonKind};
use crate::store::{self, NewFaculty, NewStudent};
use rusqlite::Connection;
use serde_json::json;

fn ensure_catalog_row(
    conn: &Connection,
    req: &Request,
    table: &str,
    id: Option<i64>,
    what: &str,
) -> Result<(), serde_json::Value> {
    let Some(id) = id else {
        return Ok(());
    };
    match store::catalog_exists(conn, table, id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(
            &req.id,
            "not_found",
            format!("{} not found", what),
            Some(json!({ "id": id })),
        )),
        Err(e) => Err(store_err(req, "db_query_failed", e)),
    }
}

/// Filtered, paged listing. `total` counts every match, not just the page.
fn handle_people_list(state: &mut AppState, req: &Request, kind: PersonKind) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "rows": [], "total": 0 }));
    };
    let filters = match stats::parse_filters(Some(&req.params)) {
        Ok(v) => v,
        Err(e) => return stats_err(req, e),
    };
    let limit = match preview_limit(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let offset = match req.params.get("offset") {
        None => 0,
        Some(v) if v.is_null() => 0,
        Some(v) => match v.as_u64() {
            Some(n) => n as usize,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "offset must be a non-negative integer",
                    None,
                )
            }
        },
    };

    let records = match store::load_people(conn, kind) {
        Ok(v) => v,
        Err(e) => return store_err(req, "db_query_failed", e),
    };
    let filtered = stats::apply_filters(&records, &filters);
    let rows: Vec<_> = filtered.iter().skip(offset).take(limit).collect();

    ok(
        &req.id,
        json!({
            "rows": rows,
            "total": filtered.len(),
            "offset": offset,
            "limit": limit
        }),
    )
}

/// Reads `key` when the request carries it, otherwise keeps `current`.
fn patched<T>(
    req: &Request,
    key: &str,
    current: T,
    read: impl FnOnce(&Request, &str) -> Result<T, serde_json::Value>,
) -> Result<T, serde_json::Value> {
    if req.params.get(key).is_some() {
        read(req, key)
    } else {
        Ok(current)
    }
}

fn text(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    Ok(optional_str(req, key))
}

/// Applies request params over `base`. On create the number and name are required.
fn read_student(
    req: &Request,
    base: NewStudent,
    creating: bool,
) -> Result<NewStudent, serde_json::Value> {
    let (student_no, name) = if creating {
        (required_str(req, "studentNo")?, required_str(req, "name")?)
    } else {
        (
            patched(req, "studentNo", base.student_no, required_str)?,
            patched(req, "name", base.name, required_str)?,
        )
    };
    Ok(NewStudent {
        student_no,
        name,
        email: patched(req, "email", base.email, text)?,
        course_id: patched(req, "courseId", base.course_id, optional_id)?,
        department_id: patched(req, "departmentId", base.department_id, optional_id)?,
        academic_year: patched(req, "academicYear", base.academic_year, text)?,
        gpa: patched(req, "gpa", base.gpa, optional_amount)?,
        phone: patched(req, "phone", base.phone, text)?,
        address: patched(req, "address", base.address, text)?,
    })
}

fn read_faculty(
    req: &Request,
    base: NewFaculty,
    creating: bool,
) -> Result<NewFaculty, serde_json::Value> {
    let (employee_no, name) = if creating {
        (required_str(req, "employeeNo")?, required_str(req, "name")?)
    } else {
        (
            patched(req, "employeeNo", base.employee_no, required_str)?,
            patched(req, "name", base.name, required_str)?,
        )
    };
    Ok(NewFaculty {
        employee_no,
        name,
        email: patched(req, "email", base.email, text)?,
        department_id: patched(req, "departmentId", base.department_id, optional_id)?,
        position: patched(req, "position", base.position, text)?,
        employment_type: patched(req, "employmentType", base.employment_type, text)?,
        salary: patched(req, "salary", base.salary, optional_amount)?,
        phone: patched(req, "phone", base.phone, text)?,
    })
}

fn ensure_unique(
    conn: &Connection,
    req: &Request,
    kind: PersonKind,
    code: &str,
    email: Option<&str>,
    exclude_id: Option<i64>,
) -> Result<(), serde_json::Value> {
    let taken = store::person_conflict(conn, kind, code, email, exclude_id)
        .map_err(|e| store_err(req, "db_query_failed", e))?;
    let (field, value) = match taken {
        None => return Ok(()),
        Some("email") => ("email", email.unwrap_or_default()),
        Some(_) => match kind {
            PersonKind::Student => ("studentNo", code),
            PersonKind::Faculty => ("employeeNo", code),
        },
    };
    Err(err(
        &req.id,
        "duplicate",
        format!("{} is already in use", field),
        Some(json!({ "field": field, "value": value })),
    ))
}

fn check_student(
    conn: &Connection,
    req: &Request,
    student: &NewStudent,
    exclude_id: Option<i64>,
) -> Result<(), serde_json::Value> {
    ensure_catalog_row(conn, req, "courses", student.course_id, "course")?;
    ensure_catalog_row(conn, req, "departments", student.department_id, "department")?;
    ensure_unique(
        conn,
        req,
        PersonKind::Student,
        &student.student_no,
        student.email.as_deref(),
        exclude_id,
    )
}

fn check_faculty(
    conn: &Connection,
    req: &Request,
    member: &NewFaculty,
    exclude_id: Option<i64>,
) -> Result<(), serde_json::Value> {
    ensure_catalog_row(conn, req, "departments", member.department_id, "department")?;
    ensure_unique(
        conn,
        req,
        PersonKind::Faculty,
        &member.employee_no,
        member.email.as_deref(),
        exclude_id,
    )
}

fn id_key(kind: PersonKind) -> (&'static str, &'static str) {
    match kind {
        PersonKind::Student => ("studentId", "student"),
        PersonKind::Faculty => ("facultyId", "faculty member"),
    }
}

fn handle_students_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let student = read_student(req, NewStudent::default(), true)?;
    check_student(conn, req, &student, None)?;

    match store::insert_student(conn, &student) {
        Ok(id) => {
            tracing::debug!(student_id = id, "student created");
            Ok(ok(
                &req.id,
                json!({ "studentId": id, "studentNo": student.student_no }),
            ))
        }
        Err(e) => Err(err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "students" })),
        )),
    }
}

fn handle_faculty_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let member = read_faculty(req, NewFaculty::default(), true)?;
    check_faculty(conn, req, &member, None)?;

    match store::insert_faculty(conn, &member) {
        Ok(id) => {
            tracing::debug!(faculty_id = id, "faculty member created");
            Ok(ok(
                &req.id,
                json!({ "facultyId": id, "employeeNo": member.employee_no }),
            ))
        }
        Err(e) => Err(err(
            &req.id,
            "db_insert_failed",
            format!("{e:#}"),
            Some(json!({ "table": "faculty" })),
        )),
    }
}

/// One person plus the raw editable fields an edit form needs.
fn handle_people_get(
    state: &mut AppState,
    req: &Request,
    kind: PersonKind,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let (key, what) = id_key(kind);
    let id = required_id(req, key)?;

    let not_found = || err(&req.id, "not_found", format!("{} not found", what), None);
    let record = store::find_person(conn, kind, id)
        .map_err(|e| store_err(req, "db_query_failed", e))?
        .ok_or_else(not_found)?;
    let fields = match kind {
        PersonKind::Student => store::student_fields(conn, id).map(|f| json!(f)),
        PersonKind::Faculty => store::faculty_fields(conn, id).map(|f| json!(f)),
    }
    .map_err(|e| store_err(req, "db_query_failed", e))?;

    Ok(ok(&req.id, json!({ "record": record, "fields": fields })))
}

/// Partial update: params that are absent keep their stored value, `null`
/// clears an optional field.
fn handle_students_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let id = required_id(req, "studentId")?;
    let current = store::student_fields(conn, id)
        .map_err(|e| store_err(req, "db_query_failed", e))?
        .ok_or_else(|| err(&req.id, "not_found", "student not found", None))?;

    let student = read_student(req, current, false)?;
    check_student(conn, req, &student, Some(id))?;
    store::update_student(conn, id, &student)
        .map_err(|e| store_err(req, "db_update_failed", e))?;
    tracing::debug!(student_id = id, "student updated");
    Ok(ok(&req.id, json!({ "studentId": id, "student": student })))
}

fn handle_faculty_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let id = required_id(req, "facultyId")?;
    let current = store::faculty_fields(conn, id)
        .map_err(|e| store_err(req, "db_query_failed", e))?
        .ok_or_else(|| err(&req.id, "not_found", "faculty member not found", None))?;

    let member = read_faculty(req, current, false)?;
    check_faculty(conn, req, &member, Some(id))?;
    store::update_faculty(conn, id, &member)
        .map_err(|e| store_err(req, "db_update_failed", e))?;
    tracing::debug!(faculty_id = id, "faculty member updated");
    Ok(ok(&req.id, json!({ "facultyId": id, "faculty": member })))
}

fn handle_people_delete(state: &mut AppState, req: &Request, kind: PersonKind) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let (key, what) = id_key(kind);
    let id = match required_id(req, key) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::delete_person(conn, kind, id) {
        Ok(outcome) => delete_reply(req, outcome, what, id),
        Err(e) => store_err(req, "db_delete_failed", e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let reply = match req.method.as_str() {
        "students.list" => return Some(handle_people_list(state, req, PersonKind::Student)),
        "students.get" => handle_people_get(state, req, PersonKind::Student),
        "students.create" => handle_students_create(state, req),
        "students.update" => handle_students_update(state, req),
        "students.delete" => return Some(handle_people_delete(state, req, PersonKind::Student)),
        "faculty.list" => return Some(handle_people_list(state, req, PersonKind::Faculty)),
        "faculty.get" => handle_people_get(state, req, PersonKind::Faculty),
        "faculty.create" => handle_faculty_create(state, req),
        "faculty.update" => handle_faculty_update(state, req),
        "faculty.delete" => return Some(handle_people_delete(state, req, PersonKind::Faculty)),
        _ => return None,
    };
    Some(reply.unwrap_or_else(|e| e))
}
