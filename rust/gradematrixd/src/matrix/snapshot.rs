use crate::matrix::model::Student;
use serde::Serialize;

/// Baseline and editable copies of the same student list.
///
/// Both are created together from one load and always carry the same
/// students and skill keys; only cell values may diverge. The snapshot is
/// replaced wholesale on a successful save and never edited in place.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    snapshot: Vec<Student>,
    working: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CellRef {
    pub student_id: i64,
    pub skill_key: String,
}

impl SnapshotStore {
    pub fn new(students: Vec<Student>) -> Self {
        Self {
            working: students.clone(),
            snapshot: students,
        }
    }

    pub fn snapshot(&self) -> &[Student] {
        &self.snapshot
    }

    pub fn working(&self) -> &[Student] {
        &self.working
    }

    pub(crate) fn working_mut(&mut self) -> &mut [Student] {
        &mut self.working
    }

    /// Make `students` the new baseline. The working copy is left alone.
    pub(crate) fn promote(&mut self, students: Vec<Student>) {
        debug_assert!(same_shape(&students, &self.working));
        self.snapshot = students;
    }

    /// Discard every unsaved edit.
    pub(crate) fn restore(&mut self) {
        self.working = self.snapshot.clone();
    }

    pub fn baseline_cell(&self, student_id: i64, skill_key: &str) -> Option<i64> {
        self.snapshot
            .iter()
            .find(|s| s.student_id == student_id)
            .and_then(|s| s.assessment_grades.get(skill_key))
            .map(|c| c.grade_id)
    }

    /// Same grade-id comparison as `dirty_cells`; names never count.
    pub fn is_dirty(&self) -> bool {
        self.snapshot
            .iter()
            .zip(self.working.iter())
            .any(|(base, live)| {
                live.assessment_grades.iter().any(|(key, cell)| {
                    base.assessment_grades.get(key).map(|c| c.grade_id) != Some(cell.grade_id)
                })
            })
    }

    /// Cells whose grade id differs from the baseline, in working-copy order.
    pub fn dirty_cells(&self) -> Vec<CellRef> {
        let mut out = Vec::new();
        for (base, live) in self.snapshot.iter().zip(self.working.iter()) {
            for (key, cell) in &live.assessment_grades {
                let before = base.assessment_grades.get(key).map(|c| c.grade_id);
                if before != Some(cell.grade_id) {
                    out.push(CellRef {
                        student_id: live.student_id,
                        skill_key: key.clone(),
                    });
                }
            }
        }
        out
    }
}

/// Same students in the same order, each with the same skill keys.
pub fn same_shape(a: &[Student], b: &[Student]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b.iter()).all(|(x, y)| {
            x.student_id == y.student_id
                && x.assessment_grades.len() == y.assessment_grades.len()
                && x
                    .assessment_grades
                    .keys()
                    .zip(y.assessment_grades.keys())
                    .all(|(k1, k2)| k1 == k2)
        })
}
