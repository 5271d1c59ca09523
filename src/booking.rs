//! The booking write path: validate answers, check seats, then replace the student's
//! answers and assignment in one immediate transaction.

use crate::capacity;
use crate::catalog::{self, Activity, Question};
use crate::error::{BookingError, BookingResult};
use crate::validation::{parse_id, TextPolicy};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::BTreeMap;

const ANSWER_MAX_CHARS: usize = 50;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub student_id: i64,
    pub activity_id: i64,
    /// Question id (as submitted) to raw answer value.
    pub answers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum AnswerValue {
    Choice(i64),
    Written(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub activity_id: i64,
    pub answers_recorded: usize,
    pub available_spaces: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAnswer {
    pub question_id: i64,
    pub option_id: Option<i64>,
    pub option_text: Option<String>,
    pub written_answer: Option<String>,
}

impl StoredAnswer {
    pub fn display_text(&self) -> String {
        self.option_text
            .clone()
            .or_else(|| self.written_answer.clone())
            .unwrap_or_default()
    }
}

pub fn book(conn: &Connection, req: &BookingRequest) -> BookingResult<BookingReceipt> {
    let activity = catalog::get_activity(conn, req.activity_id)?;
    ensure_student(conn, req.student_id)?;

    let questions = catalog::list_questions(conn, activity.id)?;
    let validated = validate_answers(conn, &activity, &questions, &req.answers)?;

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    if capacity::available_seats(&tx, activity.id)? < 1 {
        tracing::info!(
            student_id = req.student_id,
            activity_id = activity.id,
            "booking rejected, no spaces left"
        );
        return Err(BookingError::Capacity);
    }

    tx.execute("DELETE FROM answers WHERE student_id = ?", [req.student_id])?;
    for (question_id, value) in &validated {
        match value {
            AnswerValue::Choice(option_id) => tx.execute(
                "INSERT INTO answers(student_id, question_id, option_id) VALUES(?, ?, ?)",
                (req.student_id, question_id, option_id),
            )?,
            AnswerValue::Written(text) => tx.execute(
                "INSERT INTO answers(student_id, question_id, written_answer) VALUES(?, ?, ?)",
                (req.student_id, question_id, text),
            )?,
        };
    }

    // Re-checks occupancy in the same statement that claims the seat.
    let assigned = tx.execute(
        "UPDATE students SET chosen_activity = ?1, attendance = 0
         WHERE id = ?2
           AND (SELECT spaces FROM activities WHERE id = ?1)
               > (SELECT COUNT(*) FROM students WHERE chosen_activity = ?1)",
        (activity.id, req.student_id),
    )?;
    if assigned == 0 {
        return Err(BookingError::Capacity);
    }
    tx.commit()?;

    let available_spaces = capacity::available_seats(conn, activity.id)?;
    tracing::info!(
        student_id = req.student_id,
        activity_id = activity.id,
        available_spaces,
        "student booked"
    );
    Ok(BookingReceipt {
        activity_id: activity.id,
        answers_recorded: validated.len(),
        available_spaces,
    })
}

fn ensure_student(conn: &Connection, student_id: i64) -> BookingResult<()> {
    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Err(BookingError::not_found("student does not exist"));
    }
    Ok(())
}

fn validate_answers(
    conn: &Connection,
    activity: &Activity,
    questions: &[Question],
    answers: &BTreeMap<String, String>,
) -> BookingResult<Vec<(i64, AnswerValue)>> {
    let policy = TextPolicy::max(ANSWER_MAX_CHARS).single_line().optional();
    let mut validated = Vec::with_capacity(answers.len());

    for (key, raw) in answers {
        let field = format!("answers.{}", key);
        let Some(question_id) = parse_id(key) else {
            return Err(BookingError::validation(&field, "question ids must be integers"));
        };
        // "7", "07" and " 7" all name question 7.
        if validated.iter().any(|(seen, _)| *seen == question_id) {
            return Err(BookingError::validation(
                &field,
                "question answered more than once",
            ));
        }
        let question = catalog::get_question(conn, question_id)?;
        if question.activity_id != activity.id {
            return Err(BookingError::validation(
                &field,
                "question does not belong to this activity",
            ));
        }
        if !policy.accepts(raw) {
            return Err(BookingError::validation(
                &field,
                format!(
                    "answer contains illegal characters or is longer than {} characters",
                    ANSWER_MAX_CHARS
                ),
            ));
        }
        if raw.is_empty() && question.is_required() {
            return Err(BookingError::validation(&field, "missing answer"));
        }

        let value = if question.written_answer {
            AnswerValue::Written(raw.clone())
        } else {
            let option_id = parse_id(raw).ok_or_else(|| {
                BookingError::validation(&field, "choice answers must name an option")
            })?;
            if !option_belongs(conn, question.id, option_id)? {
                return Err(BookingError::validation(
                    &field,
                    "option does not belong to this question",
                ));
            }
            AnswerValue::Choice(option_id)
        };
        validated.push((question.id, value));
    }

    for question in questions {
        let answered = validated.iter().any(|(id, _)| *id == question.id);
        if !answered && question.is_required() {
            return Err(BookingError::validation(
                &format!("answers.{}", question.id),
                "missing answer",
            ));
        }
    }

    // Guards against partial submissions, including optional questions.
    if validated.len() < questions.len() {
        return Err(BookingError::validation(
            "answers",
            "missing answers to questions",
        ));
    }

    Ok(validated)
}

fn option_belongs(conn: &Connection, question_id: i64, option_id: i64) -> BookingResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM options WHERE id = ? AND question_id = ?",
            (option_id, question_id),
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn chosen_activity(conn: &Connection, student_id: i64) -> BookingResult<Option<Activity>> {
    let chosen: Option<Option<i64>> = conn
        .query_row(
            "SELECT chosen_activity FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    match chosen.flatten() {
        Some(activity_id) => Ok(Some(catalog::get_activity(conn, activity_id)?)),
        None => Ok(None),
    }
}

pub fn student_answers(conn: &Connection, student_id: i64) -> BookingResult<Vec<StoredAnswer>> {
    let mut stmt = conn.prepare(
        "SELECT a.question_id, a.option_id, o.text, a.written_answer
         FROM answers a
         LEFT JOIN options o ON o.id = a.option_id
         WHERE a.student_id = ?
         ORDER BY a.question_id",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok(StoredAnswer {
                question_id: r.get(0)?,
                option_id: r.get(1)?,
                option_text: r.get(2)?,
                written_answer: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{create_activity, create_option, create_question, ActivityInput};
    use crate::db::test_conn;

    fn activity(conn: &Connection, name: &str, spaces: i64) -> Activity {
        create_activity(
            conn,
            &ActivityInput {
                name: name.to_string(),
                spaces,
                info: "info".to_string(),
            },
        )
        .expect("activity")
    }

    fn student(conn: &Connection, email: &str) -> i64 {
        conn.execute("INSERT INTO students(email) VALUES(?)", [email])
            .expect("student");
        conn.last_insert_rowid()
    }

    fn answers(pairs: &[(i64, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn answer_count(conn: &Connection, student_id: i64) -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM answers WHERE student_id = ?",
            [student_id],
            |r| r.get(0),
        )
        .expect("count")
    }

    #[test]
    fn last_seat_goes_to_first_student() {
        let conn = test_conn();
        let chess = activity(&conn, "Chess Club", 1);
        let first = student(&conn, "a@school.se");
        let second = student(&conn, "b@school.se");

        let receipt = book(
            &conn,
            &BookingRequest {
                student_id: first,
                activity_id: chess.id,
                answers: BTreeMap::new(),
            },
        )
        .expect("first booking");
        assert_eq!(receipt.available_spaces, 0);

        let err = book(
            &conn,
            &BookingRequest {
                student_id: second,
                activity_id: chess.id,
                answers: BTreeMap::new(),
            },
        )
        .expect_err("second booking");
        assert!(matches!(err, BookingError::Capacity));
        assert_eq!(chosen_activity(&conn, first).expect("first").map(|a| a.id), Some(chess.id));
        assert_eq!(chosen_activity(&conn, second).expect("second"), None);
    }

    #[test]
    fn capacity_rejection_leaves_prior_answers_untouched() {
        let conn = test_conn();
        let open = activity(&conn, "Film", 5);
        let full = activity(&conn, "Chess", 0);
        let q = create_question(&conn, open.id, "Snacks?", true, false).expect("q");
        let s = student(&conn, "a@school.se");
        book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: open.id,
                answers: answers(&[(q.id, "Popcorn")]),
            },
        )
        .expect("book film");

        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: full.id,
                answers: BTreeMap::new(),
            },
        )
        .expect_err("full");
        assert!(matches!(err, BookingError::Capacity));
        assert_eq!(answer_count(&conn, s), 1);
        assert_eq!(chosen_activity(&conn, s).expect("chosen").map(|a| a.id), Some(open.id));
    }

    #[test]
    fn rebooking_replaces_answers_and_moves_the_seat() {
        let conn = test_conn();
        let x = activity(&conn, "Chess", 3);
        let y = activity(&conn, "Film", 3);
        let xq1 = create_question(&conn, x.id, "Level?", false, false).expect("q");
        let xo = create_option(&conn, xq1.id, "Beginner").expect("o");
        let xq2 = create_question(&conn, x.id, "Notes?", true, true).expect("q");
        let yq = create_question(&conn, y.id, "Genre?", true, false).expect("q");
        let s = student(&conn, "a@school.se");

        book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: x.id,
                answers: answers(&[(xq1.id, xo.id.to_string().as_str()), (xq2.id, "")]),
            },
        )
        .expect("book x");
        assert_eq!(answer_count(&conn, s), 2);
        conn.execute("UPDATE students SET attendance = 1 WHERE id = ?", [s])
            .expect("mark present");
        let x_before = capacity::available_seats(&conn, x.id).expect("x");
        let y_before = capacity::available_seats(&conn, y.id).expect("y");

        book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: y.id,
                answers: answers(&[(yq.id, "Comedy")]),
            },
        )
        .expect("book y");

        let stored = student_answers(&conn, s).expect("answers");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].question_id, yq.id);
        assert_eq!(stored[0].display_text(), "Comedy");
        assert_eq!(capacity::available_seats(&conn, x.id).expect("x"), x_before + 1);
        assert_eq!(capacity::available_seats(&conn, y.id).expect("y"), y_before - 1);
        let attendance: i64 = conn
            .query_row("SELECT attendance FROM students WHERE id = ?", [s], |r| r.get(0))
            .expect("attendance");
        assert_eq!(attendance, 0);
    }

    #[test]
    fn choice_answers_store_option_reference_only() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let q = create_question(&conn, a.id, "Level?", false, false).expect("q");
        let o = create_option(&conn, q.id, "Expert").expect("o");
        let s = student(&conn, "a@school.se");
        book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: a.id,
                answers: answers(&[(q.id, o.id.to_string().as_str())]),
            },
        )
        .expect("book");
        let stored = student_answers(&conn, s).expect("answers");
        assert_eq!(
            stored,
            vec![StoredAnswer {
                question_id: q.id,
                option_id: Some(o.id),
                option_text: Some("Expert".to_string()),
                written_answer: None,
            }]
        );
    }

    #[test]
    fn missing_or_bad_answers_are_rejected_before_any_write() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let other = activity(&conn, "Film", 3);
        let choice = create_question(&conn, a.id, "Level?", false, false).expect("q");
        let opt = create_option(&conn, choice.id, "Beginner").expect("o");
        let written = create_question(&conn, a.id, "Allergies?", true, false).expect("q");
        let optional = create_question(&conn, a.id, "Notes?", true, true).expect("q");
        let foreign = create_question(&conn, other.id, "Genre?", true, false).expect("q");
        let s = student(&conn, "a@school.se");
        let o = opt.id.to_string();
        let o = o.as_str();

        let attempt = |pairs: &[(i64, &str)]| {
            book(
                &conn,
                &BookingRequest {
                    student_id: s,
                    activity_id: a.id,
                    answers: answers(pairs),
                },
            )
        };

        // required written answer left empty
        let err = attempt(&[(choice.id, o), (written.id, ""), (optional.id, "")])
            .expect_err("empty");
        let written_field = format!("answers.{}", written.id);
        assert!(
            matches!(err, BookingError::Validation { ref field, .. } if *field == written_field)
        );
        // optional question omitted entirely
        assert!(attempt(&[(choice.id, o), (written.id, "None")]).is_err());
        // answer too long
        let long = "x".repeat(51);
        assert!(attempt(&[(choice.id, o), (written.id, &long[..]), (optional.id, "")]).is_err());
        // newline is not allowed
        assert!(attempt(&[(choice.id, o), (written.id, "a\nb"), (optional.id, "")]).is_err());
        // option id that is not one of the question's options
        assert!(attempt(&[(choice.id, "9999"), (written.id, "None"), (optional.id, "")]).is_err());
        // question from a different activity
        assert!(attempt(&[(choice.id, o), (written.id, "None"), (foreign.id, "Drama")]).is_err());

        assert_eq!(answer_count(&conn, s), 0);
        assert_eq!(chosen_activity(&conn, s).expect("chosen"), None);

        attempt(&[(choice.id, o), (written.id, "None"), (optional.id, "")])
            .expect("valid booking");
        assert_eq!(answer_count(&conn, s), 3);
    }

    #[test]
    fn aliased_question_keys_cannot_stand_in_for_missing_answers() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let choice = create_question(&conn, a.id, "Level?", false, false).expect("q");
        let opt = create_option(&conn, choice.id, "Beginner").expect("o");
        let optional = create_question(&conn, a.id, "Notes?", true, true).expect("q");
        let s = student(&conn, "a@school.se");
        let o = opt.id.to_string();

        let mut aliased = BTreeMap::new();
        aliased.insert(choice.id.to_string(), o.clone());
        aliased.insert(format!("0{}", choice.id), o.clone());
        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: a.id,
                answers: aliased,
            },
        )
        .expect_err("aliased keys");
        assert!(matches!(err, BookingError::Validation { .. }));

        let mut padded = BTreeMap::new();
        padded.insert(choice.id.to_string(), o.clone());
        padded.insert(format!(" {}", choice.id), o.clone());
        padded.insert(optional.id.to_string(), String::new());
        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: a.id,
                answers: padded,
            },
        )
        .expect_err("padded key");
        assert!(matches!(err, BookingError::Validation { .. }));

        assert_eq!(answer_count(&conn, s), 0);
        assert_eq!(chosen_activity(&conn, s).expect("chosen"), None);
    }

    #[test]
    fn one_answer_row_per_student_and_question() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let q = create_question(&conn, a.id, "Notes?", true, false).expect("q");
        let s = student(&conn, "a@school.se");
        conn.execute(
            "INSERT INTO answers(student_id, question_id, written_answer) VALUES(?, ?, 'a')",
            (s, q.id),
        )
        .expect("first answer");
        assert!(conn
            .execute(
                "INSERT INTO answers(student_id, question_id, written_answer) VALUES(?, ?, 'b')",
                (s, q.id),
            )
            .is_err());
    }

    #[test]
    fn unknown_ids_are_not_found() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let s = student(&conn, "a@school.se");
        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: 42,
                answers: BTreeMap::new(),
            },
        )
        .expect_err("no activity");
        assert!(matches!(err, BookingError::NotFound(_)));

        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: a.id,
                answers: answers(&[(777, "x")]),
            },
        )
        .expect_err("no question");
        assert!(matches!(err, BookingError::NotFound(_)));

        let mut bad_key = BTreeMap::new();
        bad_key.insert("abc".to_string(), "x".to_string());
        let err = book(
            &conn,
            &BookingRequest {
                student_id: s,
                activity_id: a.id,
                answers: bad_key,
            },
        )
        .expect_err("bad key");
        assert!(matches!(err, BookingError::Validation { .. }));
    }

    #[test]
    fn serialized_bookings_never_overfill() {
        let conn = test_conn();
        let a = activity(&conn, "Chess", 3);
        let mut booked = 0;
        for i in 0..6 {
            let s = student(&conn, &format!("s{}@school.se", i));
            if book(
                &conn,
                &BookingRequest {
                    student_id: s,
                    activity_id: a.id,
                    answers: BTreeMap::new(),
                },
            )
            .is_ok()
            {
                booked += 1;
            }
            assert!(capacity::available_seats(&conn, a.id).expect("seats") >= 0);
        }
        assert_eq!(booked, 3);
    }
}
