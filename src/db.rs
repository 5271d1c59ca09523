use anyhow::Context;
use rusqlite::Connection;
use std::path::Path;

pub const BOOKING_LOCKED: &str = "booking_locked";

pub fn open_db(path: &Path) -> anyhow::Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database directory {}", parent.display()))?;
        }
    }
    let conn = Connection::open(path)
        .with_context(|| format!("open database {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS activities(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            spaces INTEGER NOT NULL DEFAULT 0,
            info TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            activity_id INTEGER NOT NULL,
            question TEXT NOT NULL,
            written_answer INTEGER NOT NULL DEFAULT 0,
            obligatory INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(activity_id) REFERENCES activities(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_activity ON questions(activity_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS options(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL,
            text TEXT NOT NULL,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_options_question ON options(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            class_name TEXT NOT NULL UNIQUE,
            join_code TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            last_name TEXT,
            first_name TEXT,
            class_id INTEGER,
            chosen_activity INTEGER,
            attendance INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(class_id) REFERENCES school_classes(id),
            FOREIGN KEY(chosen_activity) REFERENCES activities(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_activity ON students(chosen_activity)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    // An answer carries an option reference or free text, never both.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS answers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            question_id INTEGER NOT NULL,
            option_id INTEGER,
            written_answer TEXT,
            CHECK (option_id IS NULL OR written_answer IS NULL),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(question_id) REFERENCES questions(id),
            FOREIGN KEY(option_id) REFERENCES options(id)
        )",
        [],
    )?;
    // One answer per (student, question).
    ensure_answers_unique(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    // Older databases created admins without a password column.
    ensure_admins_password(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS leaders(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            activity_id INTEGER,
            FOREIGN KEY(activity_id) REFERENCES activities(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_leaders_email ON leaders(email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_leaders_activity ON leaders(activity_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identifier TEXT NOT NULL UNIQUE,
            value TEXT
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO settings(identifier, value) VALUES(?, '0')",
        [BOOKING_LOCKED],
    )?;

    Ok(())
}

fn ensure_admins_password(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "admins", "password")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE admins ADD COLUMN password TEXT", [])?;
    Ok(())
}

fn ensure_answers_unique(conn: &Connection) -> anyhow::Result<()> {
    // Older databases may already hold duplicates; the newest row wins.
    conn.execute(
        "DELETE FROM answers
         WHERE id NOT IN (SELECT MAX(id) FROM answers GROUP BY student_id, question_id)",
        [],
    )?;
    conn.execute("DROP INDEX IF EXISTS idx_answers_student", [])?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_answers_student_question
         ON answers(student_id, question_id)",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|n| n == column))
}

#[cfg(test)]
pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}
