use crate::error::BookingResult;
use crate::ipc::error::respond;
use crate::ipc::types::{AppState, Request};
use crate::settings;
use serde_json::json;

fn handle_health(state: &mut AppState) -> BookingResult<serde_json::Value> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "dbPath": state.config.db_path.to_string_lossy(),
        "bookingLocked": settings::booking_locked(&state.db)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(respond(&req.id, handle_health(state))),
        _ => None,
    }
}
