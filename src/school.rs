//! School classes and the join codes students use to attach themselves to one.

use crate::error::{BookingError, BookingResult};
use crate::validation::TextPolicy;
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

const JOIN_CODE_LEN: usize = 8;
const JOIN_CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: i64,
    pub class_name: String,
    pub join_code: String,
}

pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_CHARSET[rng.gen_range(0..JOIN_CODE_CHARSET.len())] as char)
        .collect()
}

pub fn list_classes(conn: &Connection) -> BookingResult<Vec<SchoolClass>> {
    let mut stmt =
        conn.prepare("SELECT id, class_name, join_code FROM school_classes ORDER BY class_name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(SchoolClass {
                id: r.get(0)?,
                class_name: r.get(1)?,
                join_code: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_class(conn: &Connection, class_id: i64) -> BookingResult<SchoolClass> {
    conn.query_row(
        "SELECT id, class_name, join_code FROM school_classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(SchoolClass {
                id: r.get(0)?,
                class_name: r.get(1)?,
                join_code: r.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| BookingError::not_found("class does not exist"))
}

pub fn create_class(conn: &Connection, class_name: &str) -> BookingResult<SchoolClass> {
    let policy = TextPolicy::max(10)
        .length(3, 10)
        .single_line()
        .no_space()
        .no_punctuation()
        .ascii_only();
    if !policy.accepts(class_name) {
        return Err(BookingError::validation(
            "className",
            "class name must be 3-10 letters or digits",
        ));
    }
    let class_name = class_name.to_uppercase();
    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM school_classes WHERE class_name = ?",
            [&class_name],
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(BookingError::validation("className", "class already exists"));
    }

    // Codes are unique; draw again on the rare collision.
    let join_code = loop {
        let candidate = generate_join_code();
        let used: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM school_classes WHERE join_code = ?",
                [&candidate],
                |r| r.get(0),
            )
            .optional()?;
        if used.is_none() {
            break candidate;
        }
    };

    conn.execute(
        "INSERT INTO school_classes(class_name, join_code) VALUES(?, ?)",
        (&class_name, &join_code),
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(class_id = id, class_name = %class_name, "class created");
    Ok(SchoolClass {
        id,
        class_name,
        join_code,
    })
}

/// Deletes the class and detaches its students. Returns how many were detached.
pub fn delete_class(conn: &Connection, class_id: i64) -> BookingResult<usize> {
    get_class(conn, class_id)?;
    let tx = conn.unchecked_transaction()?;
    let detached = tx.execute(
        "UPDATE students SET class_id = NULL WHERE class_id = ?",
        [class_id],
    )?;
    tx.execute("DELETE FROM school_classes WHERE id = ?", [class_id])?;
    tx.commit()?;
    tracing::info!(class_id, detached, "class deleted");
    Ok(detached)
}

/// Attaches a student to the class owning `join_code` and returns that class.
pub fn join_class(
    conn: &Connection,
    student_id: i64,
    join_code: &str,
) -> BookingResult<SchoolClass> {
    if join_code.chars().count() != JOIN_CODE_LEN {
        return Err(BookingError::validation("joinCode", "wrong code length"));
    }
    let policy = TextPolicy::max(JOIN_CODE_LEN)
        .single_line()
        .no_space()
        .no_punctuation()
        .ascii_only();
    if !policy.accepts(join_code) {
        return Err(BookingError::validation("joinCode", "illegal characters"));
    }
    let class = conn
        .query_row(
            "SELECT id, class_name, join_code FROM school_classes WHERE join_code = ?",
            [join_code],
            |r| {
                Ok(SchoolClass {
                    id: r.get(0)?,
                    class_name: r.get(1)?,
                    join_code: r.get(2)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| BookingError::validation("joinCode", "incorrect code"))?;

    let updated = conn.execute(
        "UPDATE students SET class_id = ? WHERE id = ?",
        (class.id, student_id),
    )?;
    if updated == 0 {
        return Err(BookingError::not_found("student does not exist"));
    }
    tracing::info!(student_id, class_id = class.id, "student joined class");
    Ok(class)
}
