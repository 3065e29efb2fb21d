use crate::matrix::model::{Sentinel, Student};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffendingStudent {
    pub student_id: i64,
    pub student_name: String,
    pub not_graded: Vec<String>,
    pub marks_not_added: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReport {
    pub valid: bool,
    /// Distinct names, working-copy order.
    pub offending_students: Vec<String>,
    pub details: Vec<OffendingStudent>,
}

/// Completeness check run before a COMPLETED transition.
///
/// A cell blocks completion when its trimmed grade name is a sentinel; both
/// sentinels block alike and are only told apart in the details.
pub fn validate(working: &[Student]) -> CompletionReport {
    let mut details: Vec<OffendingStudent> = Vec::new();
    for student in working {
        let mut not_graded = Vec::new();
        let mut marks_not_added = Vec::new();
        for (key, cell) in &student.assessment_grades {
            match cell.sentinel() {
                Some(Sentinel::NotGraded) => not_graded.push(key.clone()),
                Some(Sentinel::MarksNotAdded) => marks_not_added.push(key.clone()),
                None => {}
            }
        }
        if not_graded.is_empty() && marks_not_added.is_empty() {
            continue;
        }
        details.push(OffendingStudent {
            student_id: student.student_id,
            student_name: student.student_name.clone(),
            not_graded,
            marks_not_added,
        });
    }

    let mut offending_students: Vec<String> = Vec::new();
    for d in &details {
        if !offending_students.contains(&d.student_name) {
            offending_students.push(d.student_name.clone());
        }
    }

    CompletionReport {
        valid: details.is_empty(),
        offending_students,
        details,
    }
}
