use crate::capacity;
use crate::catalog::{self, ActivityInput};
use crate::error::BookingResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{flag, optional_str, required_int, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn activity_input(params: &serde_json::Value) -> BookingResult<ActivityInput> {
    Ok(ActivityInput {
        name: required_str(params, "name")?.trim().to_string(),
        spaces: required_int(params, "spaces")?,
        info: optional_str(params, "info").trim().to_string(),
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activities = capacity::activities_with_seats(&state.db)?;
    Ok(json!({ "activities": activities }))
}

fn handle_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let input = activity_input(&req.params)?;
    let activity = catalog::create_activity(&state.db, &input)?;
    Ok(json!({ "activity": activity }))
}

fn handle_update(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let input = activity_input(&req.params)?;
    let activity = catalog::update_activity(&state.db, activity_id, &input)?;
    let available_spaces = capacity::available_seats(&state.db, activity_id)?;
    Ok(json!({ "activity": activity, "availableSpaces": available_spaces }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let deletion = catalog::delete_activity(&state.db, activity_id)?;
    Ok(json!({ "deleted": activity_id, "cascade": deletion }))
}

fn handle_get(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let activity = catalog::get_activity(&state.db, activity_id)?;
    Ok(json!({
        "activity": activity,
        "availableSpaces": capacity::available_seats(&state.db, activity_id)?,
        "questions": catalog::questions_with_options(&state.db, activity_id)?,
        "leaders": catalog::list_leaders(&state.db, activity_id)?,
    }))
}

fn handle_question_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let text = required_str(&req.params, "question")?;
    let question = catalog::create_question(
        &state.db,
        activity_id,
        text.trim(),
        flag(&req.params, "writtenAnswer"),
        flag(&req.params, "voluntary"),
    )?;
    tracing::info!(question_id = question.id, activity_id, "question created");
    Ok(json!({ "question": question }))
}

fn handle_question_delete(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let question_id = required_int(&req.params, "questionId")?;
    let question = catalog::delete_question(&state.db, question_id)?;
    Ok(json!({ "deleted": question.id, "activityId": question.activity_id }))
}

fn handle_question_get(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let question_id = required_int(&req.params, "questionId")?;
    let question = catalog::get_question(&state.db, question_id)?;
    let options = catalog::list_options(&state.db, question_id)?;
    Ok(json!({ "question": question, "options": options }))
}

fn handle_option_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let question_id = required_int(&req.params, "questionId")?;
    let text = required_str(&req.params, "text")?;
    let option = catalog::create_option(&state.db, question_id, text.trim())?;
    Ok(json!({ "option": option }))
}

fn handle_leaders_list(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    catalog::get_activity(&state.db, activity_id)?;
    let leaders = catalog::list_leaders(&state.db, activity_id)?;
    Ok(json!({ "leaders": leaders }))
}

fn handle_leader_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let email = required_str(&req.params, "email")?;
    let leader = catalog::create_leader(&state.db, activity_id, &email)?;
    Ok(json!({ "leader": leader }))
}

fn handle_leader_delete(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let leader_id = required_int(&req.params, "leaderId")?;
    catalog::delete_leader(&state.db, activity_id, leader_id)?;
    Ok(json!({ "deleted": leader_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "admin.activities.list" => handle_list(state, req),
        "admin.activities.create" => handle_create(state, req),
        "admin.activities.update" => handle_update(state, req),
        "admin.activities.delete" => handle_delete(state, req),
        "admin.activity.get" => handle_get(state, req),
        "admin.questions.create" => handle_question_create(state, req),
        "admin.questions.delete" => handle_question_delete(state, req),
        "admin.question.get" => handle_question_get(state, req),
        "admin.options.create" => handle_option_create(state, req),
        "admin.leaders.list" => handle_leaders_list(state, req),
        "admin.leaders.create" => handle_leader_create(state, req),
        "admin.leaders.delete" => handle_leader_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
