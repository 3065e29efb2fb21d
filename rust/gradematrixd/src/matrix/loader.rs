use crate::backend::MatrixSource;
use crate::config::StatusCodes;
use crate::matrix::error::MatrixError;
use crate::matrix::model::{
    AssessmentIdMap, GradeCatalog, GradeCell, RawMatrix, SessionKey, SkillColumn, Student,
    WorkflowStatus,
};
use anyhow::anyhow;
use std::collections::HashSet;
use tracing::{debug, info};

/// Normalized result of one load. Nothing here exists unless both fetches
/// succeeded.
#[derive(Debug, Clone)]
pub struct LoadedMatrix {
    pub students: Vec<Student>,
    pub assessment_ids: AssessmentIdMap,
    pub columns: Vec<SkillColumn>,
    pub status: WorkflowStatus,
    pub catalog: GradeCatalog,
}

/// Fetch matrix and catalog side by side and join them.
pub fn load_matrix<S>(
    source: &S,
    key: &SessionKey,
    codes: &StatusCodes,
) -> Result<LoadedMatrix, MatrixError>
where
    S: MatrixSource + ?Sized,
{
    let (matrix, catalog) = std::thread::scope(|scope| {
        let catalog = scope.spawn(|| source.fetch_grade_catalog(key.tenant_id));
        let matrix = source.fetch_matrix(key);
        let catalog = catalog
            .join()
            .unwrap_or_else(|_| Err(anyhow!("grade catalog fetch panicked")));
        (matrix, catalog)
    });
    let matrix = matrix.map_err(|e| MatrixError::fetch(&e.context("matrix fetch failed")))?;
    let catalog =
        catalog.map_err(|e| MatrixError::fetch(&e.context("grade catalog fetch failed")))?;

    let loaded = normalize(matrix, GradeCatalog(catalog), codes)?;
    info!(
        session_id = key.session_id,
        students = loaded.students.len(),
        skills = loaded.columns.len(),
        status = ?loaded.status,
        "matrix loaded"
    );
    Ok(loaded)
}

fn normalize(
    raw: RawMatrix,
    catalog: GradeCatalog,
    codes: &StatusCodes,
) -> Result<LoadedMatrix, MatrixError> {
    let RawMatrix {
        mut students,
        assessment_id_map,
        current_status_id,
        current_status_name,
    } = raw;

    let mut seen = HashSet::new();
    for student in &mut students {
        if !seen.insert(student.student_id) {
            return Err(MatrixError::Fetch(format!(
                "duplicate student id {} in matrix",
                student.student_id
            )));
        }
        if let Some(key) = student
            .assessment_grades
            .keys()
            .find(|k| !assessment_id_map.contains_key(*k))
        {
            return Err(MatrixError::Fetch(format!(
                "skill {key:?} of student {} has no assessment id",
                student.student_id
            )));
        }
        for key in assessment_id_map.keys() {
            if !student.assessment_grades.contains_key(key) {
                debug!(
                    student_id = student.student_id,
                    skill_key = key.as_str(),
                    "filling missing cell"
                );
                student
                    .assessment_grades
                    .insert(key.clone(), GradeCell::ungraded());
            }
        }
    }

    let mut columns: Vec<SkillColumn> = assessment_id_map
        .iter()
        .map(|(k, id)| SkillColumn {
            skill_key: k.clone(),
            assessment_id: *id,
        })
        .collect();
    columns.sort_by(|a, b| {
        a.assessment_id
            .cmp(&b.assessment_id)
            .then_with(|| a.skill_key.cmp(&b.skill_key))
    });

    Ok(LoadedMatrix {
        students,
        assessment_ids: assessment_id_map,
        columns,
        status: codes.classify(current_status_id, &current_status_name),
        catalog,
    })
}
