use super::handlers;
use super::types::{AppState, Request};
use crate::error::BookingError;
use crate::ipc::error::{err, respond};
use chrono::Utc;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if !state.limiter.allow(&req.method, req.client(), Utc::now()) {
        tracing::warn!(method = %req.method, client = req.client(), "rate limit exceeded");
        return respond(&req.id, Err(BookingError::RateLimited));
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::auth::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::student::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::activities::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::classes::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::admin::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
