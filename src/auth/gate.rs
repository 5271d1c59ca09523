//! Role predicates checked before every protected operation.

use super::session::{AdminSession, LeaderSession, SessionRecord, SessionStore, StudentSession};
use crate::accounts;
use crate::error::{BookingError, BookingResult};
use crate::settings;
use chrono::{DateTime, Utc};
use rusqlite::Connection;

pub const STUDENT_LOGIN: &str = "/login";
pub const LEADER_LOGIN: &str = "/leader/login";
pub const ADMIN_LOGIN: &str = "/admin/login";

pub struct AuthorizationGate<'a> {
    conn: &'a Connection,
    sessions: &'a mut SessionStore,
    now: DateTime<Utc>,
}

impl<'a> AuthorizationGate<'a> {
    pub fn new(conn: &'a Connection, sessions: &'a mut SessionStore, now: DateTime<Utc>) -> Self {
        Self {
            conn,
            sessions,
            now,
        }
    }

    /// Short-circuits every student booking/setup operation while the global lock is set.
    pub fn ensure_booking_open(&self) -> BookingResult<()> {
        if settings::booking_locked(self.conn)? {
            return Err(BookingError::BookingLocked);
        }
        Ok(())
    }

    pub fn student(&mut self, token: Option<&str>) -> BookingResult<StudentSession> {
        self.sessions
            .get(token, self.now)
            .and_then(|r| r.student.clone())
            .ok_or(BookingError::LoginRequired {
                redirect: STUDENT_LOGIN,
            })
    }

    /// Lock, login and completed class setup, in that order.
    pub fn booking_student(&mut self, token: Option<&str>) -> BookingResult<StudentSession> {
        self.ensure_booking_open()?;
        let student = self.student(token)?;
        if !student.setup_completed() {
            return Err(BookingError::SetupRequired);
        }
        Ok(student)
    }

    /// Lock, login and a class that has not been joined yet.
    pub fn setup_student(&mut self, token: Option<&str>) -> BookingResult<StudentSession> {
        self.ensure_booking_open()?;
        let student = self.student(token)?;
        if student.setup_completed() {
            return Err(BookingError::AlreadySetup);
        }
        Ok(student)
    }

    /// A leader session stays valid only while the email still has a leader row.
    pub fn leader(&mut self, token: Option<&str>) -> BookingResult<LeaderSession> {
        let missing = BookingError::LoginRequired {
            redirect: LEADER_LOGIN,
        };
        let Some(leader) = self.sessions.get(token, self.now).and_then(|r| r.leader.clone())
        else {
            return Err(missing);
        };
        if accounts::find_leader(self.conn, &leader.email)?.is_none() {
            tracing::info!(leader_id = leader.leader_id, "dropping session of removed leader");
            self.drop_role(token, |r| r.leader = None);
            return Err(missing);
        }
        Ok(leader)
    }

    /// An admin session stays valid only while its admin row exists.
    pub fn admin(&mut self, token: Option<&str>) -> BookingResult<AdminSession> {
        let missing = BookingError::LoginRequired {
            redirect: ADMIN_LOGIN,
        };
        let Some(admin) = self.sessions.get(token, self.now).and_then(|r| r.admin.clone()) else {
            return Err(missing);
        };
        if !accounts::admin_exists(self.conn, admin.admin_id)? {
            tracing::info!(admin_id = admin.admin_id, "dropping session of removed admin");
            self.drop_role(token, |r| r.admin = None);
            return Err(missing);
        }
        Ok(admin)
    }

    fn drop_role(&mut self, token: Option<&str>, clear: impl FnOnce(&mut SessionRecord)) {
        if let Some(token) = token {
            self.sessions.logout(token, clear);
        }
    }
}

/// Activities a leader email is authorized for.
pub fn leader_activity_ids(conn: &Connection, email: &str) -> BookingResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT activity_id FROM leaders
         WHERE email = ? AND activity_id IS NOT NULL
         ORDER BY activity_id",
    )?;
    let ids = stmt
        .query_map([email], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}
