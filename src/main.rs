mod config;
mod db;
mod ipc;
mod reports;
mod stats;
mod store;

use std::io::{self, BufRead, Write};

use config::DaemonConfig;
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .with_target(false)
        .init();
}

fn initial_state(cfg: &DaemonConfig) -> ipc::AppState {
    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        preview_limit: cfg.preview_limit,
    };

    if let Some(path) = cfg.workspace.as_ref() {
        match db::open_db(path) {
            Ok(conn) => {
                tracing::info!(workspace = %path.display(), "workspace opened from environment");
                state.workspace = Some(path.clone());
                state.db = Some(conn);
            }
            Err(e) => {
                tracing::error!(workspace = %path.display(), error = %format!("{e:#}"), "failed to open workspace");
            }
        }
    }
    state
}

fn main() {
    let (cfg, problems) = DaemonConfig::from_env();
    init_tracing(&cfg.log_filter);
    for p in &problems {
        tracing::warn!("{}", p);
    }
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        preview_limit = cfg.preview_limit,
        "sfmsd starting"
    );

    let mut state = initial_state(&cfg);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!(error = %e, "stdin read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable request line");
                ipc::bad_json(e.to_string())
            }
        };

        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"success\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed; shutting down");
}
