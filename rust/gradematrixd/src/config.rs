use crate::matrix::model::WorkflowStatus;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "gradematrix.toml";
pub const CONFIG_PATH_ENV: &str = "GRADEMATRIX_CONFIG";
pub const API_BASE_ENV: &str = "GRADEMATRIX_API_BASE";
pub const API_TOKEN_ENV: &str = "GRADEMATRIX_API_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub status: StatusCodes,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusCode {
    pub id: i64,
    pub code: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatusCodes {
    pub in_progress: StatusCode,
    pub completed: StatusCode,
}

impl Default for StatusCodes {
    fn default() -> Self {
        Self {
            in_progress: StatusCode {
                id: 1,
                code: "IN_PROGRESS".to_string(),
                label: "In Progress".to_string(),
            },
            completed: StatusCode {
                id: 2,
                code: "COMPLETED".to_string(),
                label: "Completed".to_string(),
            },
        }
    }
}

impl StatusCodes {
    pub fn for_status(&self, status: WorkflowStatus) -> &StatusCode {
        match status {
            WorkflowStatus::InProgress => &self.in_progress,
            WorkflowStatus::Completed => &self.completed,
        }
    }

    /// Remote status -> workflow status. Anything that is not recognisably
    /// "completed" is treated as still in progress.
    pub fn classify(&self, status_id: i64, status_name: &str) -> WorkflowStatus {
        let name = status_name.trim();
        let done = &self.completed;
        if status_id == done.id
            || name.eq_ignore_ascii_case(&done.code)
            || name.eq_ignore_ascii_case(&done.label)
        {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::InProgress
        }
    }

    /// Outbound code -> workflow status, for sinks that receive a payload.
    pub fn from_code(&self, code: &str) -> Option<WorkflowStatus> {
        let code = code.trim();
        if code.eq_ignore_ascii_case(&self.completed.code) {
            Some(WorkflowStatus::Completed)
        } else if code.eq_ignore_ascii_case(&self.in_progress.code) {
            Some(WorkflowStatus::InProgress)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
    pub matrix_path: String,
    pub catalog_path: String,
    pub save_path: String,
    pub retry: RetryPolicy,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bearer_token: None,
            timeout_secs: 15,
            matrix_path: "/assessment/matrix".to_string(),
            catalog_path: "/assessment/grades".to_string(),
            save_path: "/assessment/matrix/save".to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 100,
        }
    }
}

impl AppConfig {
    /// `GRADEMATRIX_CONFIG`, else `<workspace>/gradematrix.toml`, else
    /// defaults; then environment overrides.
    pub fn load(workspace: Option<&Path>) -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(|| workspace.map(|w| w.join(CONFIG_FILE)));
        let mut cfg = match path {
            Some(p) if p.is_file() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.to_string_lossy()))?;
        Self::parse(&text)
            .with_context(|| format!("invalid config {}", path.to_string_lossy()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var(API_BASE_ENV) {
            if !v.trim().is_empty() {
                self.http.base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var(API_TOKEN_ENV) {
            if !v.trim().is_empty() {
                self.http.bearer_token = Some(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = AppConfig::parse("").expect("parse");
        assert_eq!(cfg.status.in_progress.code, "IN_PROGRESS");
        assert_eq!(cfg.status.completed.id, 2);
        assert_eq!(cfg.http.timeout_secs, 15);
        assert_eq!(cfg.http.retry.max_attempts, 3);
    }

    #[test]
    fn partial_sections_override_only_named_fields() {
        let cfg = AppConfig::parse(
            r#"
            [status.completed]
            id = 7
            code = "ASMT_DONE"
            label = "Done"

            [http]
            base_url = "https://api.school.test"
            timeout_secs = 5
            "#,
        )
        .expect("parse");
        assert_eq!(cfg.status.completed.code, "ASMT_DONE");
        assert_eq!(cfg.status.in_progress.code, "IN_PROGRESS");
        assert_eq!(cfg.http.base_url.as_deref(), Some("https://api.school.test"));
        assert_eq!(cfg.http.matrix_path, "/assessment/matrix");
    }

    #[test]
    fn bad_toml_is_an_error() {
        assert!(AppConfig::parse("[status").is_err());
    }

    #[test]
    fn classify_accepts_id_code_or_label() {
        let codes = StatusCodes::default();
        assert_eq!(codes.classify(2, ""), WorkflowStatus::Completed);
        assert_eq!(codes.classify(0, " completed "), WorkflowStatus::Completed);
        assert_eq!(codes.classify(0, "In Progress"), WorkflowStatus::InProgress);
        assert_eq!(codes.classify(0, "Draft"), WorkflowStatus::InProgress);
    }

    #[test]
    fn codes_round_trip_through_status() {
        let codes = StatusCodes::default();
        for status in [WorkflowStatus::InProgress, WorkflowStatus::Completed] {
            let code = &codes.for_status(status).code;
            assert_eq!(codes.from_code(code), Some(status));
        }
        assert_eq!(codes.from_code("ARCHIVED"), None);
    }
}
