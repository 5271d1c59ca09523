use crate::auth::gate::leader_activity_ids;
use crate::error::{BookingError, BookingResult};
use rusqlite::{Connection, OptionalExtension};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attendance {
    Unmarked = 0,
    Present = 1,
    Absent = 2,
}

impl TryFrom<i64> for Attendance {
    type Error = BookingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Attendance::Unmarked),
            1 => Ok(Attendance::Present),
            2 => Ok(Attendance::Absent),
            _ => Err(BookingError::validation(
                "state",
                "new state must be 0, 1 or 2",
            )),
        }
    }
}

/// Who is asking. Admins skip the activity ownership check.
#[derive(Debug, Clone)]
pub enum Requester<'a> {
    Leader { email: &'a str },
    Admin,
}

pub fn set_attendance(
    conn: &Connection,
    student_id: i64,
    state: Attendance,
    requester: &Requester<'_>,
) -> BookingResult<()> {
    let chosen: Option<Option<i64>> = conn
        .query_row(
            "SELECT chosen_activity FROM students WHERE id = ?",
            [student_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(chosen) = chosen else {
        return Err(BookingError::not_found("student does not exist"));
    };

    if let Requester::Leader { email } = requester {
        let authorized = leader_activity_ids(conn, email)?;
        let owns = chosen.is_some_and(|a| authorized.contains(&a));
        if !owns {
            tracing::warn!(
                student_id,
                leader = %email,
                "attendance change outside leader's activities"
            );
            return Err(BookingError::Forbidden(
                "leader does not have access to this activity".to_string(),
            ));
        }
    }

    conn.execute(
        "UPDATE students SET attendance = ? WHERE id = ?",
        (state as i64, student_id),
    )?;
    tracing::info!(student_id, state = state as i64, "attendance set");
    Ok(())
}
