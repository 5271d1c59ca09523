use crate::db::BOOKING_LOCKED;
use crate::error::BookingResult;
use rusqlite::{Connection, OptionalExtension};

pub fn booking_locked(conn: &Connection) -> BookingResult<bool> {
    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM settings WHERE identifier = ?",
            [BOOKING_LOCKED],
            |r| r.get(0),
        )
        .optional()?;
    Ok(value.flatten().as_deref() == Some("1"))
}

pub fn set_booking_locked(conn: &Connection, locked: bool) -> BookingResult<()> {
    let value = if locked { "1" } else { "0" };
    conn.execute(
        "INSERT INTO settings(identifier, value) VALUES(?, ?)
         ON CONFLICT(identifier) DO UPDATE SET value = excluded.value",
        (BOOKING_LOCKED, value),
    )?;
    tracing::info!(locked, "booking lock updated");
    Ok(())
}
