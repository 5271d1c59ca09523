//! Who booked an activity, with their class, attendance and answers.

use crate::auth::gate::leader_activity_ids;
use crate::booking::{student_answers, StoredAnswer};
use crate::catalog::{self, Activity, Question};
use crate::error::BookingResult;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub class_name: Option<String>,
    pub attendance: i64,
    /// One entry per activity question, in question order; empty when unanswered.
    pub answers: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRoster {
    pub activity: Activity,
    pub questions: Vec<Question>,
    pub students: Vec<RosterEntry>,
}

pub fn activity_roster(conn: &Connection, activity_id: i64) -> BookingResult<ActivityRoster> {
    let activity = catalog::get_activity(conn, activity_id)?;
    let questions = catalog::list_questions(conn, activity_id)?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.first_name, s.last_name, c.class_name, s.attendance
         FROM students s
         LEFT JOIN school_classes c ON c.id = s.class_id
         WHERE s.chosen_activity = ?
         ORDER BY s.last_name, s.first_name, s.id",
    )?;
    let rows = stmt
        .query_map([activity_id], |r| {
            Ok(RosterEntry {
                student_id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                class_name: r.get(3)?,
                attendance: r.get(4)?,
                answers: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut students = Vec::with_capacity(rows.len());
    for mut entry in rows {
        let stored = student_answers(conn, entry.student_id)?;
        entry.answers = questions
            .iter()
            .map(|q| answer_text(&stored, q.id))
            .collect();
        students.push(entry);
    }

    Ok(ActivityRoster {
        activity,
        questions,
        students,
    })
}

fn answer_text(stored: &[StoredAnswer], question_id: i64) -> String {
    stored
        .iter()
        .find(|a| a.question_id == question_id)
        .map(StoredAnswer::display_text)
        .unwrap_or_default()
}

/// Rosters for every activity the leader email is authorized for.
pub fn leader_overview(conn: &Connection, email: &str) -> BookingResult<Vec<ActivityRoster>> {
    leader_activity_ids(conn, email)?
        .into_iter()
        .map(|activity_id| activity_roster(conn, activity_id))
        .collect()
}
