use crate::auth::identity::IdentityProvider;
use crate::auth::{AuthorizationGate, SessionStore};
use crate::config::Config;
use crate::ratelimit::RateLimiter;
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Token returned by a login method.
    #[serde(default)]
    pub session: Option<String>,
    /// Client address, used for rate limiting.
    #[serde(default)]
    pub client: Option<String>,
}

impl Request {
    pub fn session(&self) -> Option<&str> {
        self.session.as_deref()
    }

    pub fn client(&self) -> &str {
        self.client.as_deref().unwrap_or("local")
    }
}

pub struct AppState {
    pub config: Config,
    pub db: Connection,
    pub sessions: SessionStore,
    pub identity: Box<dyn IdentityProvider>,
    pub limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: Config, db: Connection, identity: Box<dyn IdentityProvider>) -> Self {
        let sessions = SessionStore::new(config.session_lifetime_hours);
        Self {
            config,
            db,
            sessions,
            identity,
            limiter: RateLimiter::default(),
        }
    }

    pub fn gate(&mut self) -> AuthorizationGate<'_> {
        AuthorizationGate::new(&self.db, &mut self.sessions, Utc::now())
    }
}
