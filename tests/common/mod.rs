#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Sidecar {
    pub fn spawn() -> Self {
        Self::spawn_with_env(&[])
    }

    pub fn spawn_with_env(env: &[(&str, &str)]) -> Self {
        let exe = env!("CARGO_BIN_EXE_sfmsd");
        let mut cmd = Command::new(exe);
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .env_remove("SFMS_WORKSPACE")
            .env_remove("SFMS_PREVIEW_LIMIT");
        for (k, v) in env {
            cmd.env(k, v);
        }
        let mut child = cmd.spawn().expect("spawn sfmsd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
        }
    }

    /// Spawns the daemon with a fresh workspace already selected.
    pub fn with_workspace(prefix: &str) -> Self {
        let mut sc = Self::spawn();
        let workspace = temp_dir(prefix);
        sc.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        sc
    }

    pub fn send_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");

        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("success").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("data").cloned().unwrap_or_else(|| json!({}))
    }

    /// Sends a request expected to fail and returns its error code.
    pub fn err_code(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("success").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|c| c.as_str())
            .expect("error code")
            .to_string()
    }

    pub fn create_department(&mut self, code: &str, name: &str) -> i64 {
        self.ok("departments.create", json!({ "code": code, "name": name }))
            .get("departmentId")
            .and_then(|v| v.as_i64())
            .expect("departmentId")
    }

    pub fn create_course(&mut self, code: &str, name: &str, department_id: Option<i64>) -> i64 {
        self.ok(
            "courses.create",
            json!({ "code": code, "name": name, "departmentId": department_id }),
        )
        .get("courseId")
        .and_then(|v| v.as_i64())
        .expect("courseId")
    }

    pub fn create_student(&mut self, params: serde_json::Value) -> i64 {
        self.ok("students.create", params)
            .get("studentId")
            .and_then(|v| v.as_i64())
            .expect("studentId")
    }

    pub fn create_faculty(&mut self, params: serde_json::Value) -> i64 {
        self.ok("faculty.create", params)
            .get("facultyId")
            .and_then(|v| v.as_i64())
            .expect("facultyId")
    }
}

pub fn group_count(groups: &serde_json::Value, key: &str, label: &str) -> Option<i64> {
    groups.as_array()?.iter().find_map(|g| {
        if g.get(key).and_then(|v| v.as_str()) == Some(label) {
            g.get("count").and_then(|v| v.as_i64())
        } else {
            None
        }
    })
}

pub fn group_sum(groups: &serde_json::Value) -> i64 {
    groups
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|g| g.get("count").and_then(|v| v.as_i64()))
                .sum()
        })
        .unwrap_or(0)
}
