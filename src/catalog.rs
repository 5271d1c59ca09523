//! Activities, their questions and answer options, and the leaders assigned to them.

use crate::error::{BookingError, BookingResult};
use crate::validation::TextPolicy;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub name: String,
    pub spaces: i64,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub activity_id: i64,
    pub question: String,
    pub written_answer: bool,
    pub obligatory: bool,
}

impl Question {
    /// Choice questions are always required; the flag only matters for written ones.
    pub fn is_required(&self) -> bool {
        !self.written_answer || self.obligatory
    }

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Question {
            id: r.get(0)?,
            activity_id: r.get(1)?,
            question: r.get(2)?,
            written_answer: r.get::<_, i64>(3)? != 0,
            obligatory: r.get::<_, i64>(4)? != 0,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionWithOptions {
    #[serde(flatten)]
    pub question: Question,
    pub options: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Leader {
    pub id: i64,
    pub email: String,
    pub activity_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ActivityInput {
    pub name: String,
    pub spaces: i64,
    pub info: String,
}

impl ActivityInput {
    fn validate(&self) -> BookingResult<()> {
        if self.spaces < 0 {
            return Err(BookingError::validation(
                "spaces",
                "spaces must be a non-negative integer",
            ));
        }
        if !TextPolicy::max(50).single_line().accepts(&self.name) {
            return Err(BookingError::validation(
                "name",
                "name contains illegal characters or has the wrong length (1-50)",
            ));
        }
        if !TextPolicy::max(511).accepts(&self.info) {
            return Err(BookingError::validation(
                "info",
                "info contains illegal characters or has the wrong length (1-511)",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDeletion {
    pub unassigned_students: usize,
    pub removed_leaders: usize,
    pub removed_answers: usize,
}

pub fn get_activity(conn: &Connection, activity_id: i64) -> BookingResult<Activity> {
    conn.query_row(
        "SELECT id, name, spaces, info FROM activities WHERE id = ?",
        [activity_id],
        |r| {
            Ok(Activity {
                id: r.get(0)?,
                name: r.get(1)?,
                spaces: r.get(2)?,
                info: r.get(3)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| BookingError::not_found("activity does not exist"))
}

pub fn create_activity(conn: &Connection, input: &ActivityInput) -> BookingResult<Activity> {
    input.validate()?;
    conn.execute(
        "INSERT INTO activities(name, spaces, info) VALUES(?, ?, ?)",
        (&input.name, input.spaces, &input.info),
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(activity_id = id, name = %input.name, spaces = input.spaces, "activity created");
    get_activity(conn, id)
}

/// Lowering `spaces` below the current bookings is allowed; existing bookings stay.
pub fn update_activity(
    conn: &Connection,
    activity_id: i64,
    input: &ActivityInput,
) -> BookingResult<Activity> {
    get_activity(conn, activity_id)?;
    input.validate()?;
    conn.execute(
        "UPDATE activities SET name = ?, spaces = ?, info = ? WHERE id = ?",
        (&input.name, input.spaces, &input.info, activity_id),
    )?;
    tracing::info!(activity_id, spaces = input.spaces, "activity updated");
    get_activity(conn, activity_id)
}

pub fn delete_activity(conn: &Connection, activity_id: i64) -> BookingResult<ActivityDeletion> {
    get_activity(conn, activity_id)?;

    let tx = conn.unchecked_transaction()?;
    // Explicitly delete in dependency order (no ON DELETE CASCADE).
    let removed_answers = tx.execute(
        "DELETE FROM answers
         WHERE question_id IN (SELECT id FROM questions WHERE activity_id = ?)",
        [activity_id],
    )?;
    tx.execute(
        "DELETE FROM options
         WHERE question_id IN (SELECT id FROM questions WHERE activity_id = ?)",
        [activity_id],
    )?;
    tx.execute("DELETE FROM questions WHERE activity_id = ?", [activity_id])?;
    let unassigned_students = tx.execute(
        "UPDATE students SET chosen_activity = NULL WHERE chosen_activity = ?",
        [activity_id],
    )?;
    let removed_leaders = tx.execute("DELETE FROM leaders WHERE activity_id = ?", [activity_id])?;
    tx.execute("DELETE FROM activities WHERE id = ?", [activity_id])?;
    tx.commit()?;

    tracing::info!(
        activity_id,
        unassigned_students,
        removed_leaders,
        "activity deleted"
    );
    Ok(ActivityDeletion {
        unassigned_students,
        removed_leaders,
        removed_answers,
    })
}

pub fn list_questions(conn: &Connection, activity_id: i64) -> BookingResult<Vec<Question>> {
    let mut stmt = conn.prepare(
        "SELECT id, activity_id, question, written_answer, obligatory
         FROM questions
         WHERE activity_id = ?
         ORDER BY id",
    )?;
    let rows = stmt
        .query_map([activity_id], Question::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_question(conn: &Connection, question_id: i64) -> BookingResult<Question> {
    conn.query_row(
        "SELECT id, activity_id, question, written_answer, obligatory
         FROM questions WHERE id = ?",
        [question_id],
        Question::from_row,
    )
    .optional()?
    .ok_or_else(|| BookingError::not_found("question does not exist"))
}

pub fn questions_with_options(
    conn: &Connection,
    activity_id: i64,
) -> BookingResult<Vec<QuestionWithOptions>> {
    list_questions(conn, activity_id)?
        .into_iter()
        .map(|question| {
            let options = if question.written_answer {
                Vec::new()
            } else {
                list_options(conn, question.id)?
            };
            Ok(QuestionWithOptions { question, options })
        })
        .collect()
}

pub fn create_question(
    conn: &Connection,
    activity_id: i64,
    text: &str,
    written_answer: bool,
    voluntary: bool,
) -> BookingResult<Question> {
    get_activity(conn, activity_id)?;
    if !TextPolicy::max(255).single_line().accepts(text) {
        return Err(BookingError::validation(
            "question",
            "question contains illegal characters or has the wrong length (1-255)",
        ));
    }
    let obligatory = !(written_answer && voluntary);
    conn.execute(
        "INSERT INTO questions(activity_id, question, written_answer, obligatory)
         VALUES(?, ?, ?, ?)",
        (activity_id, text, written_answer as i64, obligatory as i64),
    )?;
    get_question(conn, conn.last_insert_rowid())
}

/// Removes the question together with its options and every answer given to it.
pub fn delete_question(conn: &Connection, question_id: i64) -> BookingResult<Question> {
    let question = get_question(conn, question_id)?;
    let tx = conn.unchecked_transaction()?;
    let removed_answers = tx.execute("DELETE FROM answers WHERE question_id = ?", [question_id])?;
    tx.execute("DELETE FROM options WHERE question_id = ?", [question_id])?;
    tx.execute("DELETE FROM questions WHERE id = ?", [question_id])?;
    tx.commit()?;
    tracing::info!(question_id, removed_answers, "question deleted");
    Ok(question)
}

pub fn list_options(conn: &Connection, question_id: i64) -> BookingResult<Vec<AnswerOption>> {
    let mut stmt = conn.prepare(
        "SELECT id, question_id, text FROM options WHERE question_id = ? ORDER BY id",
    )?;
    let rows = stmt
        .query_map([question_id], |r| {
            Ok(AnswerOption {
                id: r.get(0)?,
                question_id: r.get(1)?,
                text: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Options can only be attached to choice questions.
pub fn choice_question(conn: &Connection, question_id: i64) -> BookingResult<Question> {
    let question = get_question(conn, question_id)?;
    if question.written_answer {
        return Err(BookingError::validation(
            "questionId",
            "question is not a choice question",
        ));
    }
    Ok(question)
}

pub fn create_option(
    conn: &Connection,
    question_id: i64,
    text: &str,
) -> BookingResult<AnswerOption> {
    choice_question(conn, question_id)?;
    if !TextPolicy::max(255).single_line().accepts(text) {
        return Err(BookingError::validation(
            "text",
            "option contains illegal characters or has the wrong length (1-255)",
        ));
    }
    conn.execute(
        "INSERT INTO options(question_id, text) VALUES(?, ?)",
        (question_id, text),
    )?;
    Ok(AnswerOption {
        id: conn.last_insert_rowid(),
        question_id,
        text: text.to_string(),
    })
}

pub fn list_leaders(conn: &Connection, activity_id: i64) -> BookingResult<Vec<Leader>> {
    let mut stmt = conn.prepare(
        "SELECT id, email, activity_id FROM leaders WHERE activity_id = ? ORDER BY id",
    )?;
    let rows = stmt
        .query_map([activity_id], |r| {
            Ok(Leader {
                id: r.get(0)?,
                email: r.get(1)?,
                activity_id: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_leader(conn: &Connection, activity_id: i64, email: &str) -> BookingResult<Leader> {
    get_activity(conn, activity_id)?;
    let email = email.trim().to_lowercase();
    let len = email.chars().count();
    if !(5..=255).contains(&len) {
        return Err(BookingError::validation("email", "email must be 5-255 characters"));
    }
    if !email.contains('@') || !email.contains('.') {
        return Err(BookingError::validation("email", "email is not valid"));
    }
    conn.execute(
        "INSERT INTO leaders(email, activity_id) VALUES(?, ?)",
        (&email, activity_id),
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(leader_id = id, activity_id, "leader added");
    Ok(Leader {
        id,
        email,
        activity_id: Some(activity_id),
    })
}

pub fn delete_leader(conn: &Connection, activity_id: i64, leader_id: i64) -> BookingResult<()> {
    let removed = conn.execute(
        "DELETE FROM leaders WHERE id = ? AND activity_id = ?",
        (leader_id, activity_id),
    )?;
    if removed == 0 {
        return Err(BookingError::not_found("leader does not exist"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    fn chess(conn: &Connection) -> Activity {
        create_activity(
            conn,
            &ActivityInput {
                name: "Chess Club".to_string(),
                spaces: 2,
                info: "Bring a board.".to_string(),
            },
        )
        .expect("create activity")
    }

    #[test]
    fn activity_input_is_validated() {
        let conn = test_conn();
        let bad_spaces = ActivityInput {
            name: "Chess".to_string(),
            spaces: -1,
            info: "x".to_string(),
        };
        assert!(matches!(
            create_activity(&conn, &bad_spaces),
            Err(BookingError::Validation { ref field, .. }) if field == "spaces"
        ));
        let long_name = ActivityInput {
            name: "x".repeat(51),
            spaces: 1,
            info: "x".to_string(),
        };
        assert!(create_activity(&conn, &long_name).is_err());
        let newline_name = ActivityInput {
            name: "Chess\nClub".to_string(),
            spaces: 1,
            info: "multi\nline info is fine".to_string(),
        };
        assert!(create_activity(&conn, &newline_name).is_err());
    }

    #[test]
    fn written_questions_may_be_voluntary_choice_questions_may_not() {
        let conn = test_conn();
        let a = chess(&conn);
        let written = create_question(&conn, a.id, "Allergies?", true, true).expect("written");
        assert!(!written.obligatory);
        assert!(!written.is_required());
        let choice = create_question(&conn, a.id, "Level?", false, true).expect("choice");
        assert!(choice.obligatory);
        assert!(choice.is_required());
    }

    #[test]
    fn options_only_attach_to_choice_questions() {
        let conn = test_conn();
        let a = chess(&conn);
        let written = create_question(&conn, a.id, "Allergies?", true, false).expect("q");
        assert!(matches!(
            create_option(&conn, written.id, "None"),
            Err(BookingError::Validation { .. })
        ));
        let choice = create_question(&conn, a.id, "Level?", false, false).expect("q");
        create_option(&conn, choice.id, "Beginner").expect("option");
        let listed = questions_with_options(&conn, a.id).expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].options.is_empty());
        assert_eq!(listed[1].options.len(), 1);
    }

    #[test]
    fn deleting_activity_cascades_and_unassigns() {
        let conn = test_conn();
        let a = chess(&conn);
        let q = create_question(&conn, a.id, "Level?", false, false).expect("q");
        let o = create_option(&conn, q.id, "Beginner").expect("o");
        create_leader(&conn, a.id, "Leader@School.se").expect("leader");
        conn.execute(
            "INSERT INTO students(email, chosen_activity) VALUES('a@school.se', ?)",
            [a.id],
        )
        .expect("student");
        conn.execute(
            "INSERT INTO answers(student_id, question_id, option_id) VALUES(1, ?, ?)",
            (q.id, o.id),
        )
        .expect("answer");

        let summary = delete_activity(&conn, a.id).expect("delete");
        assert_eq!(summary.unassigned_students, 1);
        assert_eq!(summary.removed_leaders, 1);
        assert_eq!(summary.removed_answers, 1);

        assert!(matches!(get_activity(&conn, a.id), Err(BookingError::NotFound(_))));
        let chosen: Option<i64> = conn
            .query_row("SELECT chosen_activity FROM students WHERE id = 1", [], |r| r.get(0))
            .expect("student");
        assert_eq!(chosen, None);
        let leaders: i64 = conn
            .query_row("SELECT COUNT(*) FROM leaders", [], |r| r.get(0))
            .expect("count");
        assert_eq!(leaders, 0);
        let options: i64 = conn
            .query_row("SELECT COUNT(*) FROM options", [], |r| r.get(0))
            .expect("count");
        assert_eq!(options, 0);
    }

    #[test]
    fn deleting_question_removes_its_answers_only() {
        let conn = test_conn();
        let a = chess(&conn);
        let q1 = create_question(&conn, a.id, "Allergies?", true, false).expect("q1");
        let q2 = create_question(&conn, a.id, "Shirt size?", true, false).expect("q2");
        conn.execute("INSERT INTO students(email) VALUES('a@school.se')", [])
            .expect("student");
        conn.execute(
            "INSERT INTO answers(student_id, question_id, written_answer)
             VALUES(1, ?, 'none'), (1, ?, 'M')",
            (q1.id, q2.id),
        )
        .expect("answers");
        delete_question(&conn, q1.id).expect("delete");
        let remaining: Vec<i64> = conn
            .prepare("SELECT question_id FROM answers")
            .expect("prepare")
            .query_map([], |r| r.get(0))
            .expect("query")
            .collect::<Result<_, _>>()
            .expect("rows");
        assert_eq!(remaining, vec![q2.id]);
        assert!(matches!(delete_question(&conn, q1.id), Err(BookingError::NotFound(_))));
    }

    #[test]
    fn leader_email_is_normalized_and_checked() {
        let conn = test_conn();
        let a = chess(&conn);
        let l = create_leader(&conn, a.id, " Coach@School.SE ").expect("leader");
        assert_eq!(l.email, "coach@school.se");
        assert!(create_leader(&conn, a.id, "a@b").is_err());
        assert!(create_leader(&conn, a.id, "nodomain.se").is_err());
        assert!(matches!(delete_leader(&conn, a.id + 1, l.id), Err(BookingError::NotFound(_))));
        delete_leader(&conn, a.id, l.id).expect("delete");
        assert!(list_leaders(&conn, a.id).expect("list").is_empty());
    }
}
