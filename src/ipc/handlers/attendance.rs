use crate::attendance::{set_attendance, Attendance, Requester};
use crate::error::BookingResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::required_int;
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn requested_change(req: &Request) -> BookingResult<(i64, Attendance)> {
    let student_id = required_int(&req.params, "studentId")?;
    let state = Attendance::try_from(required_int(&req.params, "state")?)?;
    Ok((student_id, state))
}

fn handle_leader_overview(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let leader = state.gate().leader(req.session())?;
    let activities = roster::leader_overview(&state.db, &leader.email)?;
    Ok(json!({ "email": leader.email, "activities": activities }))
}

fn handle_leader_set(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let leader = state.gate().leader(req.session())?;
    let (student_id, attendance) = requested_change(req)?;
    set_attendance(
        &state.db,
        student_id,
        attendance,
        &Requester::Leader {
            email: &leader.email,
        },
    )?;
    Ok(json!({ "studentId": student_id, "state": attendance as i64 }))
}

fn handle_admin_set(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let (student_id, attendance) = requested_change(req)?;
    set_attendance(&state.db, student_id, attendance, &Requester::Admin)?;
    Ok(json!({ "studentId": student_id, "state": attendance as i64 }))
}

fn handle_activity_students(
    state: &mut AppState,
    req: &Request,
) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let roster = roster::activity_roster(&state.db, activity_id)?;
    Ok(json!(roster))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "leader.overview" => handle_leader_overview(state, req),
        "leader.attendance.set" => handle_leader_set(state, req),
        "admin.attendance.set" => handle_admin_set(state, req),
        "admin.activity.students" => handle_activity_students(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
