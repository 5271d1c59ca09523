use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct StudentSession {
    pub student_id: i64,
    pub fullname: String,
    pub picture_url: Option<String>,
    pub school_class: Option<String>,
}

impl StudentSession {
    pub fn setup_completed(&self) -> bool {
        self.school_class.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderSession {
    pub leader_id: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminSession {
    pub admin_id: i64,
}

/// One client's server-side session. Each role is set independently on login.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub student: Option<StudentSession>,
    pub leader: Option<LeaderSession>,
    pub admin: Option<AdminSession>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn is_empty(&self) -> bool {
        self.student.is_none() && self.leader.is_none() && self.admin.is_none()
    }
}

pub struct SessionStore {
    lifetime: Duration,
    records: HashMap<String, SessionRecord>,
}

impl SessionStore {
    pub fn new(lifetime_hours: i64) -> Self {
        Self {
            lifetime: Duration::hours(lifetime_hours),
            records: HashMap::new(),
        }
    }

    pub fn get(&mut self, token: Option<&str>, now: DateTime<Utc>) -> Option<&SessionRecord> {
        let token = token?;
        let expired = self.records.get(token)?.expires_at <= now;
        if expired {
            self.records.remove(token);
            return None;
        }
        self.records.get(token)
    }

    /// Reuses the caller's live session when there is one, otherwise starts a new
    /// record. Returns the token that now owns the record.
    pub fn login(
        &mut self,
        token: Option<&str>,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut SessionRecord),
    ) -> String {
        self.purge_expired(now);
        let token = match token {
            Some(t) if self.records.contains_key(t) => t.to_string(),
            _ => {
                let t = Uuid::new_v4().to_string();
                self.records.insert(
                    t.clone(),
                    SessionRecord {
                        student: None,
                        leader: None,
                        admin: None,
                        expires_at: now + self.lifetime,
                    },
                );
                t
            }
        };
        if let Some(record) = self.records.get_mut(&token) {
            apply(record);
        }
        token
    }

    pub fn update(&mut self, token: &str, apply: impl FnOnce(&mut SessionRecord)) {
        if let Some(record) = self.records.get_mut(token) {
            apply(record);
        }
    }

    /// Clears one role; the record is dropped once no role remains.
    pub fn logout(&mut self, token: &str, clear: impl FnOnce(&mut SessionRecord)) {
        let Some(record) = self.records.get_mut(token) else {
            return;
        };
        clear(record);
        if record.is_empty() {
            self.records.remove(token);
        }
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        self.records.retain(|_, r| r.expires_at > now);
    }
}
