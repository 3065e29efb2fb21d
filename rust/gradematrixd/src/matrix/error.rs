use crate::matrix::gate::CompletionReport;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("failed to load assessment matrix: {0}")]
    Fetch(String),

    #[error("matrix cannot be completed: {} student(s) have ungraded cells", report.offending_students.len())]
    Validation { report: CompletionReport },

    #[error("nothing to save: no grades changed since the last save")]
    EmptyChangeSet,

    #[error("failed to save assessment matrix: {0}")]
    Save(String),

    #[error("matrix is completed and read-only")]
    ReadOnly,

    #[error("a save is in flight; edits are disabled until it finishes")]
    SaveInFlight,

    #[error("no cell for student {student_id} / skill {skill_key:?}")]
    UnknownCell { student_id: i64, skill_key: String },
}

impl MatrixError {
    /// Render an `anyhow` chain for the Fetch/Save variants.
    pub fn fetch(e: &anyhow::Error) -> Self {
        Self::Fetch(format!("{e:#}"))
    }

    pub fn save(e: &anyhow::Error) -> Self {
        Self::Save(format!("{e:#}"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch_failed",
            Self::Validation { .. } => "validation_failed",
            Self::EmptyChangeSet => "empty_change_set",
            Self::Save(_) => "save_failed",
            Self::ReadOnly => "read_only",
            Self::SaveInFlight => "save_in_flight",
            Self::UnknownCell { .. } => "not_found",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation { report } => serde_json::to_value(report).ok(),
            Self::UnknownCell {
                student_id,
                skill_key,
            } => Some(json!({ "studentId": student_id, "skillKey": skill_key })),
            _ => None,
        }
    }
}
