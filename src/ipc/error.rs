use crate::error::{BookingError, BookingResult};
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

fn details(error: &BookingError) -> Option<serde_json::Value> {
    match error {
        BookingError::Validation { field, .. } => Some(json!({ "field": field })),
        BookingError::LoginRequired { redirect } => Some(json!({ "redirect": redirect })),
        BookingError::SetupRequired => Some(json!({ "redirect": "/setup" })),
        BookingError::AlreadySetup => Some(json!({ "redirect": "/" })),
        _ => None,
    }
}

pub fn respond(id: &str, result: BookingResult<serde_json::Value>) -> serde_json::Value {
    match result {
        Ok(value) => ok(id, value),
        Err(error) => {
            if let BookingError::Storage(e) = &error {
                tracing::error!(request_id = id, error = %e, "storage failure");
            }
            err(id, error.code(), error.to_string(), details(&error))
        }
    }
}
