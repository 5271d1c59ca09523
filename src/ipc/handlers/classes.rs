use crate::accounts;
use crate::error::BookingResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{required_int, required_str};
use crate::ipc::types::{AppState, Request};
use crate::school;
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let classes = school::list_classes(&state.db)?;
    Ok(json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let class_name = required_str(&req.params, "className")?;
    let class = school::create_class(&state.db, class_name.trim())?;
    Ok(json!({ "class": class }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let class_id = required_int(&req.params, "classId")?;
    let detached = school::delete_class(&state.db, class_id)?;
    Ok(json!({ "deleted": class_id, "detachedStudents": detached }))
}

fn handle_classes_students(
    state: &mut AppState,
    req: &Request,
) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    let class_id = required_int(&req.params, "classId")?;
    let class = school::get_class(&state.db, class_id)?;
    let students = accounts::class_students(&state.db, class_id)?;
    Ok(json!({ "class": class, "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "admin.classes.list" => handle_classes_list(state, req),
        "admin.classes.create" => handle_classes_create(state, req),
        "admin.classes.delete" => handle_classes_delete(state, req),
        "admin.classes.students" => handle_classes_students(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
