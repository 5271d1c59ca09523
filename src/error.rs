use thiserror::Error;

pub type BookingResult<T> = Result<T, BookingError>;

/// Every business-rule failure the core can report.
#[derive(Debug, Error)]
pub enum BookingError {
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("this activity has no available spaces")]
    Capacity,

    #[error("{0}")]
    Forbidden(String),

    #[error("login required")]
    LoginRequired { redirect: &'static str },

    #[error("student has not joined a class yet")]
    SetupRequired,

    #[error("student has already joined a class")]
    AlreadySetup,

    #[error("booking is locked")]
    BookingLocked,

    #[error("too many requests")]
    RateLimited,

    #[error("{0}")]
    Identity(String),

    #[error("identity provider request failed: {0}")]
    Provider(String),

    #[error("database error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BookingError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        BookingError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BookingError::NotFound(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "validation_failed",
            BookingError::NotFound(_) => "not_found",
            BookingError::Capacity => "capacity_exhausted",
            BookingError::Forbidden(_) => "forbidden",
            BookingError::LoginRequired { .. } => "login_required",
            BookingError::SetupRequired => "setup_required",
            BookingError::AlreadySetup => "setup_completed",
            BookingError::BookingLocked => "booking_locked",
            BookingError::RateLimited => "rate_limited",
            BookingError::Identity(_) => "identity_rejected",
            BookingError::Provider(_) => "provider_failed",
            BookingError::Storage(_) => "db_query_failed",
        }
    }
}

impl From<reqwest::Error> for BookingError {
    fn from(e: reqwest::Error) -> Self {
        BookingError::Provider(e.to_string())
    }
}
