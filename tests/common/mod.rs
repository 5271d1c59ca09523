#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub const SCHOOL_DOMAIN: &str = "school.se";
pub const MENTOR_DOMAIN: &str = "mentor.se";
pub const ADMIN_EMAIL: &str = "admin@school.se";
pub const ADMIN_PASSWORD: &str = "correct horse";

fn profile(
    email: &str,
    given: &str,
    family: &str,
    hd: Option<&str>,
    verified: bool,
) -> serde_json::Value {
    json!({
        "email": email,
        "given_name": given,
        "family_name": family,
        "picture": format!("https://img.example/{}.png", given.to_lowercase()),
        "hd": hd,
        "email_verified": verified,
    })
}

/// Authorization codes the fixture identity provider accepts.
pub fn fixture_profiles() -> serde_json::Value {
    json!({
        "ada": profile("ada@school.se", "Ada", "Lovelace", Some(SCHOOL_DOMAIN), true),
        "bob": profile("bob@school.se", "Bob", "Builder", Some(SCHOOL_DOMAIN), true),
        "cy": profile("cy@school.se", "Cy", "Young", Some(SCHOOL_DOMAIN), true),
        "outsider": profile("eve@gmail.com", "Eve", "Outside", None, true),
        "wrong-domain": profile("mallory@other.se", "Mallory", "Other", Some("other.se"), true),
        "unverified": profile("ghost@school.se", "Ghost", "Unverified", Some(SCHOOL_DOMAIN), false),
        "coach": profile("coach@mentor.se", "Carla", "Coach", Some(MENTOR_DOMAIN), true),
        "staff": profile("staff@school.se", "Sam", "Staff", Some(SCHOOL_DOMAIN), true),
        "admin": profile(ADMIN_EMAIL, "Site", "Admin", Some(SCHOOL_DOMAIN), true),
    })
}

fn command(db: &Path, fixtures: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_bookingd"));
    cmd.arg("--db")
        .arg(db)
        .env("BOOKING_IDP_FIXTURES", fixtures)
        .env("GSUITE_DOMAIN_NAME", SCHOOL_DOMAIN)
        .env("MENTOR_GSUITE_DOMAIN_NAME", MENTOR_DOMAIN)
        .env("BOOKING_LOG", "off")
        .env_remove("BOOKING_DB_PATH");
    cmd
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    db_path: PathBuf,
    _dir: TempDir,
}

impl Sidecar {
    /// Fresh database with one password admin, served by a new process.
    pub fn start() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("booking.sqlite3");
        let fixtures = dir.path().join("fixtures.json");
        std::fs::write(&fixtures, fixture_profiles().to_string()).expect("write fixtures");

        let out = command(&db_path, &fixtures)
            .args([
                "create-admin",
                "--name",
                "Site Admin",
                "--email",
                ADMIN_EMAIL,
                "--password",
                ADMIN_PASSWORD,
            ])
            .output()
            .expect("run create-admin");
        assert!(out.status.success(), "create-admin failed: {:?}", out);

        let mut child = command(&db_path, &fixtures)
            .arg("serve")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn bookingd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            db_path,
            _dir: dir,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut response = String::new();
        self.reader
            .read_line(&mut response)
            .expect("read response line");
        assert!(!response.trim().is_empty(), "empty response");
        serde_json::from_str(response.trim()).expect("parse response json")
    }

    pub fn call(
        &mut self,
        method: &str,
        session: Option<&str>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
            "session": session,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn call_ok(
        &mut self,
        method: &str,
        session: Option<&str>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let value = self.call(method, session, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_default()
    }

    /// Returns the whole error object of a failed call.
    pub fn call_err(
        &mut self,
        method: &str,
        session: Option<&str>,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let value = self.call(method, session, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value.get("error").cloned().unwrap_or_default()
    }

    pub fn error_code(
        &mut self,
        method: &str,
        session: Option<&str>,
        params: serde_json::Value,
    ) -> String {
        let error = self.call_err(method, session, params);
        error
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    }

    pub fn admin_login(&mut self) -> String {
        let result = self.call_ok(
            "auth.admin.login",
            None,
            json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD }),
        );
        session_of(&result)
    }

    pub fn student_login(&mut self, code: &str) -> String {
        let result = self.call_ok("auth.student.callback", None, json!({ "code": code }));
        session_of(&result)
    }

    pub fn create_class(&mut self, admin: &str, name: &str) -> serde_json::Value {
        let result = self.call_ok(
            "admin.classes.create",
            Some(admin),
            json!({ "className": name }),
        );
        result["class"].clone()
    }

    pub fn create_activity(&mut self, admin: &str, name: &str, spaces: i64) -> i64 {
        let result = self.call_ok(
            "admin.activities.create",
            Some(admin),
            json!({ "name": name, "spaces": spaces, "info": format!("All about {}", name) }),
        );
        result["activity"]["id"].as_i64().expect("activity id")
    }

    /// Logs a student in and joins them to the class with `join_code`.
    pub fn ready_student(&mut self, code: &str, join_code: &str) -> String {
        let session = self.student_login(code);
        self.call_ok("student.setup", Some(&session), json!({ "joinCode": join_code }));
        session
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn session_of(result: &serde_json::Value) -> String {
    result
        .get("session")
        .and_then(|v| v.as_str())
        .expect("session token")
        .to_string()
}
