use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const NOT_GRADED: &str = "Not Graded";
pub const MARKS_NOT_ADDED: &str = "Marks Not Added";
pub const UNGRADED_ID: i64 = 0;

/// Skill key -> externally numbered assessment id. Only consulted when a
/// payload is built, so column labels can change freely.
pub type AssessmentIdMap = BTreeMap<String, i64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCell {
    pub grade_id: i64,
    pub grade_name: String,
}

impl GradeCell {
    pub fn ungraded() -> Self {
        Self {
            grade_id: UNGRADED_ID,
            grade_name: NOT_GRADED.to_string(),
        }
    }

    pub fn sentinel(&self) -> Option<Sentinel> {
        Sentinel::parse(&self.grade_name)
    }
}

/// Reserved display values that mean "no real grade yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Sentinel {
    NotGraded,
    MarksNotAdded,
}

impl Sentinel {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            NOT_GRADED => Some(Self::NotGraded),
            MARKS_NOT_ADDED => Some(Self::MarksNotAdded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub student_id: i64,
    pub student_name: String,
    #[serde(default)]
    pub assessment_grades: BTreeMap<String, GradeCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOption {
    pub id: i64,
    pub name: String,
}

/// Ordered grade catalog for a tenant. Sentinels are never members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GradeCatalog(pub Vec<GradeOption>);

impl GradeCatalog {
    pub fn by_name(&self, name: &str) -> Option<&GradeOption> {
        let wanted = name.trim();
        self.0.iter().find(|g| g.name.trim() == wanted)
    }

    pub fn by_id(&self, id: i64) -> Option<&GradeOption> {
        self.0.iter().find(|g| g.id == id)
    }

    pub fn options(&self) -> &[GradeOption] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    InProgress,
    Completed,
}

impl WorkflowStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Request-scoped identity of an opened matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKey {
    #[serde(alias = "timeTableId")]
    pub session_id: i64,
    pub tenant_id: i64,
    pub branch_id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub conducted_by_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillColumn {
    pub skill_key: String,
    pub assessment_id: i64,
}

/// Matrix as returned by a `MatrixSource`, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatrix {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub assessment_id_map: AssessmentIdMap,
    #[serde(default)]
    pub current_status_id: i64,
    #[serde(default)]
    pub current_status_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeChange {
    pub assessment_id: i64,
    pub grade_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentChanges {
    pub student_id: i64,
    pub grades: Vec<GradeChange>,
}

pub type ChangeSet = Vec<StudentChanges>;

/// Body of the save-matrix call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub session_id: i64,
    pub tenant_id: i64,
    pub branch_id: i64,
    pub conducted_by_id: i64,
    pub course_id: i64,
    pub override_status_code: String,
    pub assessment_code: String,
    pub students: ChangeSet,
}
