use crate::stats::DEFAULT_PREVIEW_LIMIT;
use std::path::PathBuf;

pub const ENV_WORKSPACE: &str = "SFMS_WORKSPACE";
pub const ENV_PREVIEW_LIMIT: &str = "SFMS_PREVIEW_LIMIT";
pub const ENV_LOG: &str = "SFMS_LOG";

pub const MAX_PREVIEW_LIMIT: usize = 1000;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq)]
pub struct DaemonConfig {
    /// Workspace opened at startup, before any `workspace.select`.
    pub workspace: Option<PathBuf>,
    pub preview_limit: usize,
    pub log_filter: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workspace: None,
            preview_limit: DEFAULT_PREVIEW_LIMIT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl DaemonConfig {
    pub fn from_env() -> (Self, Vec<String>) {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from `lookup`. Returns the problems found alongside the
    /// config; each bad value falls back to its default. Logging is not up yet
    /// when this runs, so the caller reports them.
    pub fn from_lookup<F>(lookup: F) -> (Self, Vec<String>)
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let mut problems = Vec::new();

        if let Some(raw) = lookup(ENV_WORKSPACE) {
            let t = raw.trim();
            if !t.is_empty() {
                cfg.workspace = Some(PathBuf::from(t));
            }
        }

        if let Some(raw) = lookup(ENV_PREVIEW_LIMIT) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => cfg.preview_limit = n.min(MAX_PREVIEW_LIMIT),
                _ => problems.push(format!(
                    "{} must be a positive integer, got {:?}; using {}",
                    ENV_PREVIEW_LIMIT, raw, DEFAULT_PREVIEW_LIMIT
                )),
            }
        }

        if let Some(raw) = lookup(ENV_LOG) {
            let t = raw.trim();
            if !t.is_empty() {
                cfg.log_filter = t.to_string();
            }
        }

        (cfg, problems)
    }
}
