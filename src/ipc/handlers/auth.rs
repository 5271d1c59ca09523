use crate::accounts;
use crate::auth::gate::{ADMIN_LOGIN, LEADER_LOGIN, STUDENT_LOGIN};
use crate::auth::identity::{verify_identity, HostedDomainPolicy};
use crate::auth::{AdminSession, LeaderSession, StudentSession};
use crate::error::{BookingError, BookingResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use serde_json::json;

const STUDENT_CALLBACK: &str = "/callback";
const LEADER_CALLBACK: &str = "/leader/callback";
const ADMIN_CALLBACK: &str = "/admin/callback";

fn login_url(state: &mut AppState, callback: &str) -> BookingResult<serde_json::Value> {
    let url = state.identity.authorization_url(callback)?;
    Ok(json!({ "url": url }))
}

fn handle_student_callback(
    state: &mut AppState,
    req: &Request,
) -> BookingResult<serde_json::Value> {
    state.gate().ensure_booking_open()?;
    let code = required_str(&req.params, "code")?;
    let policy = HostedDomainPolicy::require([state.config.student_domain.clone()]);
    let user = verify_identity(state.identity.as_ref(), &code, STUDENT_CALLBACK, &policy)?;

    let student = accounts::upsert_student(&state.db, &user)?;
    let school_class = accounts::class_name(&state.db, student.class_id)?;
    let session = StudentSession {
        student_id: student.id,
        fullname: user.fullname(),
        picture_url: user.picture.clone(),
        school_class,
    };
    let token = state.sessions.login(req.session(), Utc::now(), |r| {
        r.student = Some(session.clone())
    });
    tracing::info!(student_id = student.id, "student logged in");

    let redirect = if session.setup_completed() { "/" } else { "/setup" };
    Ok(json!({
        "session": token,
        "fullname": session.fullname,
        "pictureUrl": session.picture_url,
        "schoolClass": session.school_class,
        "setupCompleted": session.setup_completed(),
        "redirect": redirect,
    }))
}

fn handle_leader_callback(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let code = required_str(&req.params, "code")?;
    let policy = HostedDomainPolicy::require([
        state.config.student_domain.clone(),
        state.config.leader_domain.clone(),
    ]);
    let user = verify_identity(state.identity.as_ref(), &code, LEADER_CALLBACK, &policy)?;

    let Some(leader) = accounts::find_leader(&state.db, &user.email)? else {
        tracing::warn!(email = %user.email, "leader login without leader record");
        return Err(BookingError::Identity("user is not a leader".to_string()));
    };
    let session = LeaderSession {
        leader_id: leader.id,
        email: leader.email.clone(),
    };
    let token = state
        .sessions
        .login(req.session(), Utc::now(), |r| r.leader = Some(session));
    tracing::info!(leader_id = leader.id, "leader logged in");
    Ok(json!({ "session": token, "email": leader.email, "redirect": "/leader" }))
}

fn admin_session(state: &mut AppState, req: &Request, admin: accounts::Admin) -> serde_json::Value {
    let token = state.sessions.login(req.session(), Utc::now(), |r| {
        r.admin = Some(AdminSession { admin_id: admin.id })
    });
    tracing::info!(admin_id = admin.id, "admin logged in");
    json!({ "session": token, "admin": admin, "redirect": "/admin" })
}

fn handle_admin_callback(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let code = required_str(&req.params, "code")?;
    // Admins may sign in with accounts outside the school domain.
    let user = verify_identity(
        state.identity.as_ref(),
        &code,
        ADMIN_CALLBACK,
        &HostedDomainPolicy::Ignore,
    )?;
    let Some(admin) = accounts::find_admin(&state.db, &user.email)? else {
        tracing::warn!(email = %user.email, "admin login without admin record");
        return Err(BookingError::Identity("user is not an admin".to_string()));
    };
    Ok(admin_session(state, req, admin))
}

fn handle_admin_login(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    let email = required_str(&req.params, "email")?;
    let password = required_str(&req.params, "password")?;
    let admin = accounts::authenticate_admin(&state.db, &email, &password)?;
    Ok(admin_session(state, req, admin))
}

fn handle_student_logout(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().student(req.session())?;
    if let Some(token) = req.session() {
        state.sessions.logout(token, |r| r.student = None);
    }
    Ok(json!({ "redirect": STUDENT_LOGIN }))
}

fn handle_leader_logout(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().leader(req.session())?;
    if let Some(token) = req.session() {
        state.sessions.logout(token, |r| r.leader = None);
    }
    Ok(json!({ "redirect": LEADER_LOGIN }))
}

fn handle_admin_logout(state: &mut AppState, req: &Request) -> BookingResult<serde_json::Value> {
    state.gate().admin(req.session())?;
    if let Some(token) = req.session() {
        state.sessions.logout(token, |r| r.admin = None);
    }
    Ok(json!({ "redirect": ADMIN_LOGIN }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "auth.student.loginUrl" => login_url(state, STUDENT_CALLBACK),
        "auth.student.callback" => handle_student_callback(state, req),
        "auth.student.logout" => handle_student_logout(state, req),
        "auth.leader.loginUrl" => login_url(state, LEADER_CALLBACK),
        "auth.leader.callback" => handle_leader_callback(state, req),
        "auth.leader.logout" => handle_leader_logout(state, req),
        "auth.admin.loginUrl" => login_url(state, ADMIN_CALLBACK),
        "auth.admin.callback" => handle_admin_callback(state, req),
        "auth.admin.login" => handle_admin_login(state, req),
        "auth.admin.logout" => handle_admin_logout(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
