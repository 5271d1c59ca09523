use crate::accounts;
use crate::capacity;
use crate::error::{BookingError, BookingResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{required_int, required_str};
use crate::ipc::types::{AppState, Request};
use crate::settings;
use serde_json::json;

fn handle_dashboard(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let admin = state.gate().admin(req.session())?;
    let students_total: i64 = state
        .db
        .query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?;
    let students_booked: i64 = state.db.query_row(
        "SELECT COUNT(*) FROM students WHERE chosen_activity IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let activities = capacity::activities_with_seats(&state.db)?;
    Ok(json!({
        "adminId": admin.admin_id,
        "bookingLocked": settings::booking_locked(&state.db)?,
        "studentsTotal": students_total,
        "studentsBooked": students_booked,
        "studentsUnbooked": students_total - students_booked,
        "activities": activities,
    }))
}

fn handle_booking_lock(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let Some(locked) = req.params.get("bookingLocked").and_then(|v| v.as_bool()) else {
        return Err(BookingError::validation(
            "bookingLocked",
            "bookingLocked must be true or false",
        ));
    };
    settings::set_booking_locked(&state.db, locked)?;
    Ok(json!({ "bookingLocked": locked }))
}

fn handle_students_list(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let students = accounts::list_students(&state.db)?;
    Ok(json!({ "students": students }))
}

fn handle_admins_list(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let admins = accounts::list_admins(&state.db)?;
    Ok(json!({ "admins": admins }))
}

fn handle_admins_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let name = required_str(&req.params, "name")?;
    let email = required_str(&req.params, "email")?;
    let password = required_str(&req.params, "password")?;
    let admin = accounts::create_admin(&state.db, name.trim(), &email, &password)?;
    Ok(json!({ "admin": admin }))
}

fn handle_admins_delete(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let requester = state.gate().admin(req.session())?;
    let admin_id = required_int(&req.params, "adminId")?;
    accounts::delete_admin(&state.db, requester.admin_id, admin_id)?;
    Ok(json!({ "deleted": admin_id }))
}

fn handle_change_password(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let admin = state.gate().admin(req.session())?;
    let current = required_str(&req.params, "currentPassword")?;
    let new_password = required_str(&req.params, "newPassword")?;
    let verify = required_str(&req.params, "newPasswordVerify")?;
    accounts::change_password(&state.db, admin.admin_id, &current, &new_password, &verify)?;
    Ok(json!({ "changed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "admin.dashboard" => handle_dashboard(state, req),
        "admin.bookingLock.set" => handle_booking_lock(state, req),
        "admin.students.list" => handle_students_list(state, req),
        "admin.admins.list" => handle_admins_list(state, req),
        "admin.admins.create" => handle_admins_create(state, req),
        "admin.admins.delete" => handle_admins_delete(state, req),
        "admin.changePassword" => handle_change_password(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
