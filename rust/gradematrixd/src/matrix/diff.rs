use crate::matrix::model::{
    AssessmentIdMap, ChangeSet, GradeChange, Student, StudentChanges, UNGRADED_ID,
};
use std::collections::HashMap;
use tracing::warn;

/// Minimal change set between the baseline and the working copy.
///
/// Cells are matched by (student id, skill key), never by grid position. A
/// baseline cell that is missing counts as ungraded. Only `gradeId` is
/// compared. Students with nothing to send are left out, so an empty result
/// means "nothing to submit".
pub fn compute_change_set(
    snapshot: &[Student],
    working: &[Student],
    assessment_ids: &AssessmentIdMap,
) -> ChangeSet {
    let baseline: HashMap<i64, &Student> = snapshot.iter().map(|s| (s.student_id, s)).collect();

    let mut out = ChangeSet::new();
    for student in working {
        let before = baseline.get(&student.student_id);
        let mut grades = Vec::new();
        for (skill_key, cell) in &student.assessment_grades {
            let old = before
                .and_then(|b| b.assessment_grades.get(skill_key))
                .map(|c| c.grade_id)
                .unwrap_or(UNGRADED_ID);
            if old == cell.grade_id {
                continue;
            }
            let Some(&assessment_id) = assessment_ids.get(skill_key) else {
                warn!(
                    student_id = student.student_id,
                    skill_key = skill_key.as_str(),
                    "changed cell has no assessment id; left out of change set"
                );
                continue;
            };
            grades.push(GradeChange {
                assessment_id,
                grade_id: cell.grade_id,
            });
        }
        if !grades.is_empty() {
            out.push(StudentChanges {
                student_id: student.student_id,
                grades,
            });
        }
    }
    out
}
