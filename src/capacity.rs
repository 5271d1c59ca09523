//! Seat accounting. Occupancy is always derived from `students.chosen_activity`,
//! never cached, so every booking and unbooking is reflected immediately.

use crate::error::{BookingError, BookingResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySeats {
    pub id: i64,
    pub name: String,
    pub spaces: i64,
    pub info: String,
    pub available_spaces: i64,
}

pub fn available_seats(conn: &Connection, activity_id: i64) -> BookingResult<i64> {
    let spaces: Option<i64> = conn
        .query_row(
            "SELECT spaces FROM activities WHERE id = ?",
            [activity_id],
            |r| r.get(0),
        )
        .optional()?;
    let Some(spaces) = spaces else {
        return Err(BookingError::not_found("activity does not exist"));
    };
    Ok(spaces - booked_count(conn, activity_id)?)
}

pub fn booked_count(conn: &Connection, activity_id: i64) -> BookingResult<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM students WHERE chosen_activity = ?",
        [activity_id],
        |r| r.get(0),
    )?)
}

pub fn activities_with_seats(conn: &Connection) -> BookingResult<Vec<ActivitySeats>> {
    // Correlated subquery keeps one row per activity.
    let mut stmt = conn.prepare(
        "SELECT
           a.id,
           a.name,
           a.spaces,
           a.info,
           a.spaces - (SELECT COUNT(*) FROM students s WHERE s.chosen_activity = a.id)
         FROM activities a
         ORDER BY a.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ActivitySeats {
                id: r.get(0)?,
                name: r.get(1)?,
                spaces: r.get(2)?,
                info: r.get(3)?,
                available_spaces: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_conn;

    #[test]
    fn seats_are_capacity_minus_bookings() {
        let conn = test_conn();
        conn.execute("INSERT INTO activities(name, spaces) VALUES('Chess Club', 3)", [])
            .expect("activity");
        assert_eq!(available_seats(&conn, 1).expect("seats"), 3);
        conn.execute(
            "INSERT INTO students(email, chosen_activity)
             VALUES('a@school.se', 1), ('b@school.se', 1), ('c@school.se', NULL)",
            [],
        )
        .expect("students");
        assert_eq!(available_seats(&conn, 1).expect("seats"), 1);

        let listed = activities_with_seats(&conn).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].available_spaces, 1);
    }

    #[test]
    fn lowered_capacity_can_go_negative() {
        let conn = test_conn();
        conn.execute("INSERT INTO activities(name, spaces) VALUES('Film', 2)", [])
            .expect("activity");
        conn.execute(
            "INSERT INTO students(email, chosen_activity)
             VALUES('a@school.se', 1), ('b@school.se', 1)",
            [],
        )
        .expect("students");
        conn.execute("UPDATE activities SET spaces = 1 WHERE id = 1", [])
            .expect("shrink");
        assert_eq!(available_seats(&conn, 1).expect("seats"), -1);
    }

    #[test]
    fn unknown_activity_is_not_found() {
        let conn = test_conn();
        assert!(matches!(available_seats(&conn, 99), Err(BookingError::NotFound(_))));
    }
}
