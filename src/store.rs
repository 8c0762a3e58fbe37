use crate::stats::{CategoryRef, CategoryRefs, NumericAttrs, PersonKind, PersonRecord};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Department {
    pub id: i64,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcademicYear {
    pub id: i64,
    pub label: String,
    pub is_current: bool,
}

/// Editable student columns, used for both insert and update.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub student_no: String,
    pub name: String,
    pub email: Option<String>,
    pub course_id: Option<i64>,
    pub department_id: Option<i64>,
    pub academic_year: Option<String>,
    pub gpa: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFaculty {
    pub employee_no: String,
    pub name: String,
    pub email: Option<String>,
    pub department_id: Option<i64>,
    pub position: Option<String>,
    pub employment_type: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    /// Still referenced by this many rows.
    InUse(i64),
}

fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

fn row_exists(conn: &Connection, table: &str, id: i64) -> anyhow::Result<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?", table);
    let found: Option<i64> = conn.query_row(&sql, [id], |r| r.get(0)).optional()?;
    Ok(found.is_some())
}

fn reference_count(conn: &Connection, sql: &str, id: i64) -> anyhow::Result<i64> {
    Ok(conn.query_row(sql, [id], |r| r.get(0))?)
}

/// Deletes a catalog row unless another table still points at it.
fn delete_referenced(
    conn: &Connection,
    table: &str,
    id: i64,
    reference_queries: &[&str],
) -> anyhow::Result<DeleteOutcome> {
    if !row_exists(conn, table, id)? {
        return Ok(DeleteOutcome::NotFound);
    }
    let mut refs = 0;
    for sql in reference_queries {
        refs += reference_count(conn, sql, id)?;
    }
    if refs > 0 {
        return Ok(DeleteOutcome::InUse(refs));
    }
    conn.execute(&format!("DELETE FROM {} WHERE id = ?", table), [id])?;
    Ok(DeleteOutcome::Deleted)
}

pub fn list_departments(conn: &Connection) -> anyhow::Result<Vec<Department>> {
    let mut stmt = conn.prepare("SELECT id, code, name FROM departments ORDER BY name, id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Department {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_department(conn: &Connection, code: &str, name: &str) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO departments(code, name) VALUES(?, ?)",
        (code, name),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_department(conn: &Connection, id: i64) -> anyhow::Result<DeleteOutcome> {
    delete_referenced(
        conn,
        "departments",
        id,
        &[
            "SELECT COUNT(*) FROM courses WHERE department_id = ?",
            "SELECT COUNT(*) FROM students WHERE department_id = ?",
            "SELECT COUNT(*) FROM faculty WHERE department_id = ?",
        ],
    )
}

pub fn list_courses(conn: &Connection) -> anyhow::Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.code, c.name, c.department_id, d.name
         FROM courses c
         LEFT JOIN departments d ON d.id = c.department_id
         ORDER BY c.name, c.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Course {
                id: r.get(0)?,
                code: r.get(1)?,
                name: r.get(2)?,
                department_id: r.get(3)?,
                department_name: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_course(
    conn: &Connection,
    code: &str,
    name: &str,
    department_id: Option<i64>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO courses(code, name, department_id) VALUES(?, ?, ?)",
        (code, name, department_id),
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn delete_course(conn: &Connection, id: i64) -> anyhow::Result<DeleteOutcome> {
    delete_referenced(
        conn,
        "courses",
        id,
        &["SELECT COUNT(*) FROM students WHERE course_id = ?"],
    )
}

pub fn list_academic_years(conn: &Connection) -> anyhow::Result<Vec<AcademicYear>> {
    let mut stmt =
        conn.prepare("SELECT id, label, is_current FROM academic_years ORDER BY label DESC")?;
    let rows = stmt
        .query_map([], |r| {
            let is_current: i64 = r.get(2)?;
            Ok(AcademicYear {
                id: r.get(0)?,
                label: r.get(1)?,
                is_current: is_current != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Inserts an academic year. Marking it current clears the flag on every other year.
pub fn create_academic_year(conn: &Connection, label: &str, is_current: bool) -> anyhow::Result<i64> {
    let tx = conn.unchecked_transaction()?;
    if is_current {
        tx.execute("UPDATE academic_years SET is_current = 0", [])?;
    }
    tx.execute(
        "INSERT INTO academic_years(label, is_current) VALUES(?, ?)",
        (label, if is_current { 1 } else { 0 }),
    )?;
    let id = tx.last_insert_rowid();
    tx.commit()?;
    Ok(id)
}

pub fn delete_academic_year(conn: &Connection, id: i64) -> anyhow::Result<DeleteOutcome> {
    if !row_exists(conn, "academic_years", id)? {
        return Ok(DeleteOutcome::NotFound);
    }
    conn.execute("DELETE FROM academic_years WHERE id = ?", [id])?;
    Ok(DeleteOutcome::Deleted)
}

fn category_ref(id: Option<i64>, name: Option<String>) -> Option<CategoryRef> {
    match (id, name) {
        (Some(id), Some(name)) => Some(CategoryRef { id, name }),
        _ => None,
    }
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<PersonRecord> {
    Ok(PersonRecord {
        id: r.get(0)?,
        kind: PersonKind::Student,
        code: r.get(1)?,
        name: r.get(2)?,
        email: r.get(3)?,
        category_refs: CategoryRefs {
            course: category_ref(r.get(4)?, r.get(5)?),
            department: category_ref(r.get(6)?, r.get(7)?),
            employment_type: None,
            position: None,
            academic_year: r.get(8)?,
        },
        numeric_attrs: NumericAttrs {
            salary: None,
            gpa: r.get(9)?,
        },
        joined_at: r.get(10)?,
    })
}

fn faculty_from_row(r: &Row<'_>) -> rusqlite::Result<PersonRecord> {
    Ok(PersonRecord {
        id: r.get(0)?,
        kind: PersonKind::Faculty,
        code: r.get(1)?,
        name: r.get(2)?,
        email: r.get(3)?,
        category_refs: CategoryRefs {
            course: None,
            department: category_ref(r.get(4)?, r.get(5)?),
            employment_type: r.get(6)?,
            position: r.get(7)?,
            academic_year: None,
        },
        numeric_attrs: NumericAttrs {
            salary: r.get(8)?,
            gpa: None,
        },
        joined_at: r.get(9)?,
    })
}

const STUDENT_SELECT: &str = "SELECT s.id, s.student_no, s.name, s.email,
        c.id, c.name, d.id, d.name,
        s.academic_year, s.gpa, s.created_at
 FROM students s
 LEFT JOIN courses c ON c.id = s.course_id
 LEFT JOIN departments d ON d.id = s.department_id";

const FACULTY_SELECT: &str = "SELECT f.id, f.employee_no, f.name, f.email,
        d.id, d.name,
        f.employment_type, f.position, f.salary, f.created_at
 FROM faculty f
 LEFT JOIN departments d ON d.id = f.department_id";

fn person_table(kind: PersonKind) -> &'static str {
    match kind {
        PersonKind::Student => "students",
        PersonKind::Faculty => "faculty",
    }
}

/// Loads every student or faculty member, newest first.
///
/// Course and department references whose target row is gone come back as
/// unset rather than failing the load.
pub fn load_people(conn: &Connection, kind: PersonKind) -> anyhow::Result<Vec<PersonRecord>> {
    let rows = match kind {
        PersonKind::Student => {
            let sql = format!("{} ORDER BY s.created_at DESC, s.id DESC", STUDENT_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        PersonKind::Faculty => {
            let sql = format!("{} ORDER BY f.created_at DESC, f.id DESC", FACULTY_SELECT);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], faculty_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn find_person(conn: &Connection, kind: PersonKind, id: i64) -> anyhow::Result<Option<PersonRecord>> {
    let found = match kind {
        PersonKind::Student => conn
            .query_row(&format!("{} WHERE s.id = ?", STUDENT_SELECT), [id], student_from_row)
            .optional()?,
        PersonKind::Faculty => conn
            .query_row(&format!("{} WHERE f.id = ?", FACULTY_SELECT), [id], faculty_from_row)
            .optional()?,
    };
    Ok(found)
}

pub fn student_fields(conn: &Connection, id: i64) -> anyhow::Result<Option<NewStudent>> {
    let found = conn
        .query_row(
            "SELECT student_no, name, email, course_id, department_id,
                    academic_year, gpa, phone, address
             FROM students WHERE id = ?",
            [id],
            |r| {
                Ok(NewStudent {
                    student_no: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                    course_id: r.get(3)?,
                    department_id: r.get(4)?,
                    academic_year: r.get(5)?,
                    gpa: r.get(6)?,
                    phone: r.get(7)?,
                    address: r.get(8)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

pub fn faculty_fields(conn: &Connection, id: i64) -> anyhow::Result<Option<NewFaculty>> {
    let found = conn
        .query_row(
            "SELECT employee_no, name, email, department_id, position,
                    employment_type, salary, phone
             FROM faculty WHERE id = ?",
            [id],
            |r| {
                Ok(NewFaculty {
                    employee_no: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                    department_id: r.get(3)?,
                    position: r.get(4)?,
                    employment_type: r.get(5)?,
                    salary: r.get(6)?,
                    phone: r.get(7)?,
                })
            },
        )
        .optional()?;
    Ok(found)
}

/// Returns the first identifying field (`"code"` or `"email"`) already taken by
/// another row of the same kind. Emails compare case-insensitively.
pub fn person_conflict(
    conn: &Connection,
    kind: PersonKind,
    code: &str,
    email: Option<&str>,
    exclude_id: Option<i64>,
) -> anyhow::Result<Option<&'static str>> {
    let table = person_table(kind);
    let code_column = match kind {
        PersonKind::Student => "student_no",
        PersonKind::Faculty => "employee_no",
    };
    let exclude = exclude_id.unwrap_or(-1);

    let sql = format!("SELECT 1 FROM {} WHERE {} = ? AND id <> ?", table, code_column);
    let taken: Option<i64> = conn
        .query_row(&sql, rusqlite::params![code, exclude], |r| r.get(0))
        .optional()?;
    if taken.is_some() {
        return Ok(Some("code"));
    }

    if let Some(email) = email {
        let sql = format!(
            "SELECT 1 FROM {} WHERE lower(email) = lower(?) AND id <> ?",
            table
        );
        let taken: Option<i64> = conn
            .query_row(&sql, rusqlite::params![email, exclude], |r| r.get(0))
            .optional()?;
        if taken.is_some() {
            return Ok(Some("email"));
        }
    }
    Ok(None)
}

pub fn insert_student(conn: &Connection, s: &NewStudent) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO students(
            student_no, name, email, course_id, department_id,
            academic_year, gpa, phone, address, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            s.student_no,
            s.name,
            s.email,
            s.course_id,
            s.department_id,
            s.academic_year,
            s.gpa,
            s.phone,
            s.address,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_faculty(conn: &Connection, f: &NewFaculty) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO faculty(
            employee_no, name, email, department_id, position,
            employment_type, salary, phone, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        rusqlite::params![
            f.employee_no,
            f.name,
            f.email,
            f.department_id,
            f.position,
            f.employment_type,
            f.salary,
            f.phone,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Overwrites every editable column. Returns `false` when the row does not exist.
pub fn update_student(conn: &Connection, id: i64, s: &NewStudent) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE students SET
            student_no = ?, name = ?, email = ?, course_id = ?, department_id = ?,
            academic_year = ?, gpa = ?, phone = ?, address = ?
         WHERE id = ?",
        rusqlite::params![
            s.student_no,
            s.name,
            s.email,
            s.course_id,
            s.department_id,
            s.academic_year,
            s.gpa,
            s.phone,
            s.address,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn update_faculty(conn: &Connection, id: i64, f: &NewFaculty) -> anyhow::Result<bool> {
    let changed = conn.execute(
        "UPDATE faculty SET
            employee_no = ?, name = ?, email = ?, department_id = ?, position = ?,
            employment_type = ?, salary = ?, phone = ?
         WHERE id = ?",
        rusqlite::params![
            f.employee_no,
            f.name,
            f.email,
            f.department_id,
            f.position,
            f.employment_type,
            f.salary,
            f.phone,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_person(conn: &Connection, kind: PersonKind, id: i64) -> anyhow::Result<DeleteOutcome> {
    let table = person_table(kind);
    if !row_exists(conn, table, id)? {
        return Ok(DeleteOutcome::NotFound);
    }
    conn.execute(&format!("DELETE FROM {} WHERE id = ?", table), [id])?;
    Ok(DeleteOutcome::Deleted)
}

pub fn catalog_exists(conn: &Connection, table: &str, id: i64) -> anyhow::Result<bool> {
    row_exists(conn, table, id)
}

/// Returns `"code"` or `"name"` when a department or course row already uses
/// it. Names compare case-insensitively since groups are labelled by name.
pub fn catalog_conflict(
    conn: &Connection,
    table: &str,
    code: &str,
    name: &str,
) -> anyhow::Result<Option<&'static str>> {
    let sql = format!("SELECT 1 FROM {} WHERE code = ?", table);
    let found: Option<i64> = conn.query_row(&sql, [code], |r| r.get(0)).optional()?;
    if found.is_some() {
        return Ok(Some("code"));
    }
    let sql = format!("SELECT 1 FROM {} WHERE lower(name) = lower(?)", table);
    let found: Option<i64> = conn.query_row(&sql, [name], |r| r.get(0)).optional()?;
    Ok(found.map(|_| "name"))
}
