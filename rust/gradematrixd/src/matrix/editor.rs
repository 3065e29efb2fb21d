use crate::matrix::error::MatrixError;
use crate::matrix::model::{GradeCatalog, GradeCell, Student, UNGRADED_ID};
use serde::Deserialize;
use tracing::warn;

/// What a cell selector hands back: a catalog name or a catalog id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GradeInput {
    Id(i64),
    Name(String),
}

/// Map a selector value to the cell it produces.
///
/// Unmatched input falls back to the ungraded sentinel instead of failing.
/// That can silently erase a grade when catalog names drift (stray
/// whitespace upstream), so every fallback is logged.
pub fn resolve_cell(catalog: &GradeCatalog, input: &GradeInput) -> GradeCell {
    let hit = match input {
        GradeInput::Id(UNGRADED_ID) => return GradeCell::ungraded(),
        GradeInput::Id(id) => catalog.by_id(*id),
        GradeInput::Name(name) => catalog.by_name(name),
    };
    match hit {
        Some(g) => GradeCell {
            grade_id: g.id,
            grade_name: g.name.clone(),
        },
        None => {
            warn!(?input, "grade not in catalog; falling back to ungraded");
            GradeCell::ungraded()
        }
    }
}

/// Set one working-copy cell by (student, skill) identity.
///
/// Unaware of workflow status or in-flight saves; callers gate it.
/// Never adds a student or a skill key.
pub fn apply(
    working: &mut [Student],
    catalog: &GradeCatalog,
    student_id: i64,
    skill_key: &str,
    input: &GradeInput,
) -> Result<GradeCell, MatrixError> {
    let unknown = || MatrixError::UnknownCell {
        student_id,
        skill_key: skill_key.to_string(),
    };
    let student = working
        .iter_mut()
        .find(|s| s.student_id == student_id)
        .ok_or_else(unknown)?;
    let cell = student
        .assessment_grades
        .get_mut(skill_key)
        .ok_or_else(unknown)?;

    let next = resolve_cell(catalog, input);
    // Clearing an already ungraded cell keeps its sentinel; the id is all
    // that is ever sent, so a renamed sentinel could not be saved.
    if !(next.grade_id == UNGRADED_ID && cell.grade_id == UNGRADED_ID) {
        *cell = next;
    }
    Ok(cell.clone())
}
