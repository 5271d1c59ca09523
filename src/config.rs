use std::env;
use std::path::PathBuf;

/// Process-lifetime settings, built once in `main` and handed to the parts that need them.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub app_url: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    /// Hosted domain required of students (and accepted for leaders).
    pub student_domain: Option<String>,
    /// Extra hosted domain accepted for activity leaders.
    pub leader_domain: Option<String>,
    pub identity_fixtures: Option<PathBuf>,
    pub session_lifetime_hours: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let non_empty = |key: &str| env::var(key).ok().filter(|v| !v.trim().is_empty());

        Config {
            db_path: non_empty("BOOKING_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("booking.sqlite3")),
            app_url: non_empty("APP_URL").unwrap_or_else(|| "http://localhost:5000".into()),
            google_client_id: non_empty("GOOGLE_CLIENT_ID"),
            google_client_secret: non_empty("GOOGLE_CLIENT_SECRET"),
            student_domain: non_empty("GSUITE_DOMAIN_NAME"),
            leader_domain: non_empty("MENTOR_GSUITE_DOMAIN_NAME"),
            identity_fixtures: non_empty("BOOKING_IDP_FIXTURES").map(PathBuf::from),
            session_lifetime_hours: non_empty("SESSION_LIFETIME_HOURS")
                .and_then(|v| v.parse().ok())
                .filter(|h: &i64| *h > 0)
                .unwrap_or(24),
        }
    }
}
