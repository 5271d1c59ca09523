//! Student, leader and admin accounts.

use crate::auth::credentials::{hash_password, verify_password};
use crate::auth::identity::OAuthUser;
use crate::catalog::Leader;
use crate::error::{BookingError, BookingResult};
use crate::validation::TextPolicy;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_id: Option<i64>,
    pub chosen_activity: Option<i64>,
    pub attendance: i64,
}

impl Student {
    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: r.get(0)?,
            email: r.get(1)?,
            first_name: r.get(2)?,
            last_name: r.get(3)?,
            class_id: r.get(4)?,
            chosen_activity: r.get(5)?,
            attendance: r.get(6)?,
        })
    }
}

/// A student row joined with the names an admin listing shows.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    #[serde(flatten)]
    pub student: Student,
    pub activity_name: Option<String>,
    pub class_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: i64,
    pub name: String,
    pub email: String,
}

const STUDENT_COLUMNS: &str =
    "s.id, s.email, s.first_name, s.last_name, s.class_id, s.chosen_activity, s.attendance";

pub fn get_student(conn: &Connection, student_id: i64) -> BookingResult<Student> {
    conn.query_row(
        &format!("SELECT {} FROM students s WHERE s.id = ?", STUDENT_COLUMNS),
        [student_id],
        Student::from_row,
    )
    .optional()?
    .ok_or_else(|| BookingError::not_found("student does not exist"))
}

/// Returns the student for a verified identity, creating the row on first login.
pub fn upsert_student(conn: &Connection, user: &OAuthUser) -> BookingResult<Student> {
    let email = user.email.to_lowercase();
    let existing = conn
        .query_row(
            &format!("SELECT {} FROM students s WHERE s.email = ?", STUDENT_COLUMNS),
            [&email],
            Student::from_row,
        )
        .optional()?;
    if let Some(student) = existing {
        return Ok(student);
    }
    conn.execute(
        "INSERT INTO students(email, last_name, first_name) VALUES(?, ?, ?)",
        (&email, &user.family_name, &user.given_name),
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(student_id = id, "student created on first login");
    get_student(conn, id)
}

pub fn class_name(conn: &Connection, class_id: Option<i64>) -> BookingResult<Option<String>> {
    let Some(class_id) = class_id else {
        return Ok(None);
    };
    Ok(conn
        .query_row(
            "SELECT class_name FROM school_classes WHERE id = ?",
            [class_id],
            |r| r.get(0),
        )
        .optional()?)
}

fn list_overviews(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> BookingResult<Vec<StudentOverview>> {
    let sql = format!(
        "SELECT {}, a.name, c.class_name
         FROM students s
         LEFT JOIN activities a ON a.id = s.chosen_activity
         LEFT JOIN school_classes c ON c.id = s.class_id
         {}
         ORDER BY s.last_name, s.first_name, s.id",
        STUDENT_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, |r| {
            Ok(StudentOverview {
                student: Student::from_row(r)?,
                activity_name: r.get(7)?,
                class_name: r.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn list_students(conn: &Connection) -> BookingResult<Vec<StudentOverview>> {
    list_overviews(conn, "", [])
}

pub fn class_students(conn: &Connection, class_id: i64) -> BookingResult<Vec<StudentOverview>> {
    list_overviews(conn, "WHERE s.class_id = ?", [class_id])
}

pub fn find_leader(conn: &Connection, email: &str) -> BookingResult<Option<Leader>> {
    Ok(conn
        .query_row(
            "SELECT id, email, activity_id FROM leaders WHERE email = ? ORDER BY id LIMIT 1",
            [email.to_lowercase()],
            |r| {
                Ok(Leader {
                    id: r.get(0)?,
                    email: r.get(1)?,
                    activity_id: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn find_admin(conn: &Connection, email: &str) -> BookingResult<Option<Admin>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email FROM admins WHERE email = ?",
            [email.to_lowercase()],
            |r| {
                Ok(Admin {
                    id: r.get(0)?,
                    name: r.get(1)?,
                    email: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn admin_exists(conn: &Connection, admin_id: i64) -> BookingResult<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM admins WHERE id = ?", [admin_id], |_| Ok(()))
        .optional()?
        .is_some())
}

pub fn list_admins(conn: &Connection) -> BookingResult<Vec<Admin>> {
    let mut stmt = conn.prepare("SELECT id, name, email FROM admins ORDER BY id")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Admin {
                id: r.get(0)?,
                name: r.get(1)?,
                email: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn password_policy() -> TextPolicy {
    TextPolicy::max(100).length(8, 100)
}

pub fn create_admin(
    conn: &Connection,
    name: &str,
    email: &str,
    password: &str,
) -> BookingResult<Admin> {
    let name_policy = TextPolicy::max(255)
        .length(4, 255)
        .single_line()
        .no_punctuation();
    if !name_policy.accepts(name) {
        return Err(BookingError::validation(
            "name",
            "name contains illegal characters or has the wrong length (4-255)",
        ));
    }
    let email = email.trim().to_lowercase();
    let email_len = email.chars().count();
    if !(4..255).contains(&email_len) || !email.contains('@') {
        return Err(BookingError::validation("email", "email is not valid (4-255)"));
    }
    if !password_policy().accepts(password) {
        return Err(BookingError::validation(
            "password",
            "password must be 8-100 characters",
        ));
    }
    if find_admin(conn, &email)?.is_some() {
        return Err(BookingError::validation("email", "an admin with this email already exists"));
    }
    conn.execute(
        "INSERT INTO admins(name, email, password) VALUES(?, ?, ?)",
        (name, &email, hash_password(password)),
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(admin_id = id, "admin created");
    Ok(Admin {
        id,
        name: name.to_string(),
        email,
    })
}

pub fn delete_admin(conn: &Connection, requester_id: i64, admin_id: i64) -> BookingResult<()> {
    if requester_id == admin_id {
        return Err(BookingError::validation("adminId", "you cannot delete yourself"));
    }
    let removed = conn.execute("DELETE FROM admins WHERE id = ?", [admin_id])?;
    if removed == 0 {
        return Err(BookingError::not_found("admin does not exist"));
    }
    tracing::info!(admin_id, deleted_by = requester_id, "admin deleted");
    Ok(())
}

pub fn authenticate_admin(conn: &Connection, email: &str, password: &str) -> BookingResult<Admin> {
    let rejected = || BookingError::Identity("wrong email or password".to_string());
    let row: Option<(i64, String, String, Option<String>)> = conn
        .query_row(
            "SELECT id, name, email, password FROM admins WHERE email = ?",
            [email.trim().to_lowercase()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .optional()?;
    let Some((id, name, email, Some(stored))) = row else {
        return Err(rejected());
    };
    if !verify_password(&stored, password) {
        tracing::warn!(admin_id = id, "admin password rejected");
        return Err(rejected());
    }
    Ok(Admin { id, name, email })
}

pub fn change_password(
    conn: &Connection,
    admin_id: i64,
    current: &str,
    new_password: &str,
    new_password_verify: &str,
) -> BookingResult<()> {
    let stored: Option<Option<String>> = conn
        .query_row("SELECT password FROM admins WHERE id = ?", [admin_id], |r| r.get(0))
        .optional()?;
    let Some(stored) = stored else {
        return Err(BookingError::not_found("admin does not exist"));
    };
    if !stored.is_some_and(|s| verify_password(&s, current)) {
        return Err(BookingError::validation("currentPassword", "wrong current password"));
    }
    if new_password != new_password_verify {
        return Err(BookingError::validation(
            "newPasswordVerify",
            "the new passwords do not match",
        ));
    }
    if !password_policy().accepts(new_password) {
        return Err(BookingError::validation(
            "newPassword",
            "password must be 8-100 characters",
        ));
    }
    conn.execute(
        "UPDATE admins SET password = ? WHERE id = ?",
        (hash_password(new_password), admin_id),
    )?;
    tracing::info!(admin_id, "admin password changed");
    Ok(())
}
