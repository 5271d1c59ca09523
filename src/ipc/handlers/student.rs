use crate::booking::{self, BookingRequest};
use crate::capacity;
use crate::catalog;
use crate::error::{BookingError, BookingResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::{required_int, required_str};
use crate::ipc::types::{AppState, Request};
use crate::school;
use serde_json::json;
use std::collections::BTreeMap;

fn handle_setup(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let student = state.gate().setup_student(req.session())?;
    let join_code = required_str(&req.params, "joinCode")?;
    let class = school::join_class(&state.db, student.student_id, join_code.trim())?;
    if let Some(token) = req.session() {
        let class_name = class.class_name.clone();
        state.sessions.update(token, |r| {
            if let Some(s) = r.student.as_mut() {
                s.school_class = Some(class_name);
            }
        });
    }
    Ok(json!({ "schoolClass": class.class_name, "redirect": "/" }))
}

fn handle_index(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let student = state.gate().booking_student(req.session())?;
    let activities = capacity::activities_with_seats(&state.db)?;
    let chosen = booking::chosen_activity(&state.db, student.student_id)?;
    Ok(json!({
        "fullname": student.fullname,
        "pictureUrl": student.picture_url,
        "schoolClass": student.school_class,
        "activities": activities,
        "chosenActivity": chosen,
    }))
}

fn handle_activity_get(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().booking_student(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let activity = catalog::get_activity(&state.db, activity_id)?;
    let questions = catalog::questions_with_options(&state.db, activity_id)?;
    let available_spaces = capacity::available_seats(&state.db, activity_id)?;
    Ok(json!({
        "activity": activity,
        "availableSpaces": available_spaces,
        "questions": questions,
    }))
}

/// Form-style answers: every value is kept as text, blanks included.
fn parse_answers(params: &serde_json::Value) -> BookingResult<BTreeMap<String, String>> {
    let mut answers = BTreeMap::new();
    let Some(raw) = params.get("answers") else {
        return Ok(answers);
    };
    let Some(map) = raw.as_object() else {
        return Err(BookingError::validation(
            "answers",
            "answers must be an object keyed by question id",
        ));
    };
    for (question_id, value) in map {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Null => String::new(),
            _ => {
                return Err(BookingError::validation(
                    question_id,
                    "answer must be text or an option id",
                ))
            }
        };
        answers.insert(question_id.clone(), text);
    }
    Ok(answers)
}

fn handle_activity_book(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let student = state.gate().booking_student(req.session())?;
    let activity_id = required_int(&req.params, "activityId")?;
    let answers = parse_answers(&req.params)?;
    let receipt = booking::book(
        &state.db,
        &BookingRequest {
            student_id: student.student_id,
            activity_id,
            answers,
        },
    )?;
    Ok(json!({ "receipt": receipt, "redirect": "/confirmation" }))
}

fn handle_confirmation(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let student = state.gate().booking_student(req.session())?;
    let Some(activity) = booking::chosen_activity(&state.db, student.student_id)? else {
        return Err(BookingError::not_found("no activity has been booked"));
    };
    let questions = catalog::questions_with_options(&state.db, activity.id)?;
    let answers = booking::student_answers(&state.db, student.student_id)?;
    Ok(json!({
        "fullname": student.fullname,
        "schoolClass": student.school_class,
        "activity": activity,
        "questions": questions,
        "answers": answers,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "student.setup" => handle_setup(state, req),
        "student.index" => handle_index(state, req),
        "student.activity.get" => handle_activity_get(state, req),
        "student.activity.book" => handle_activity_book(state, req),
        "student.confirmation" => handle_confirmation(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
