use crate::backend::PersistenceSink;
use crate::config::StatusCodes;
use crate::matrix::diff::compute_change_set;
use crate::matrix::editor::{self, GradeInput};
use crate::matrix::error::MatrixError;
use crate::matrix::gate::{self, CompletionReport};
use crate::matrix::loader::LoadedMatrix;
use crate::matrix::model::{
    AssessmentIdMap, ChangeSet, GradeCatalog, GradeCell, SavePayload, SessionKey, SkillColumn,
    Student, WorkflowStatus,
};
use crate::matrix::snapshot::{CellRef, SnapshotStore};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Editing,
    Saving,
    ReadOnly,
}

/// A save that has left the coordinator and awaits its outcome.
#[derive(Debug, Clone)]
pub struct PendingSave {
    pub attempt: u64,
    pub target: WorkflowStatus,
    pub payload: SavePayload,
}

#[derive(Debug, Clone)]
struct InFlight {
    attempt: u64,
    target: WorkflowStatus,
    // Exactly what the payload was computed from.
    sent: Vec<Student>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub status: WorkflowStatus,
    pub students_saved: usize,
    pub cells_saved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCell {
    pub student_id: i64,
    pub skill_key: String,
    pub cell: GradeCell,
    pub dirty: bool,
}

/// One opened matrix: both data states plus the save/cancel state machine.
///
/// `EDITING -> SAVING -> EDITING` on failure, `-> READ_ONLY` once a
/// COMPLETED save lands. Never back to in-progress.
#[derive(Debug)]
pub struct MatrixSession {
    key: SessionKey,
    codes: StatusCodes,
    catalog: GradeCatalog,
    assessment_ids: AssessmentIdMap,
    columns: Vec<SkillColumn>,
    store: SnapshotStore,
    status: WorkflowStatus,
    in_flight: Option<InFlight>,
    attempts: u64,
}

impl MatrixSession {
    pub fn new(key: SessionKey, loaded: LoadedMatrix, codes: StatusCodes) -> Self {
        Self {
            key,
            codes,
            catalog: loaded.catalog,
            assessment_ids: loaded.assessment_ids,
            columns: loaded.columns,
            store: SnapshotStore::new(loaded.students),
            status: loaded.status,
            in_flight: None,
            attempts: 0,
        }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status
    }

    pub fn phase(&self) -> Phase {
        if self.in_flight.is_some() {
            Phase::Saving
        } else if self.status == WorkflowStatus::Completed {
            Phase::ReadOnly
        } else {
            Phase::Editing
        }
    }

    pub fn catalog(&self) -> &GradeCatalog {
        &self.catalog
    }

    pub fn columns(&self) -> &[SkillColumn] {
        &self.columns
    }

    pub fn snapshot(&self) -> &[Student] {
        self.store.snapshot()
    }

    pub fn working(&self) -> &[Student] {
        self.store.working()
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    pub fn dirty_cells(&self) -> Vec<CellRef> {
        self.store.dirty_cells()
    }

    fn ensure_editable(&self) -> Result<(), MatrixError> {
        match self.phase() {
            Phase::Editing => Ok(()),
            Phase::Saving => Err(MatrixError::SaveInFlight),
            Phase::ReadOnly => Err(MatrixError::ReadOnly),
        }
    }

    /// Gated entry point to the cell editor.
    pub fn apply_cell(
        &mut self,
        student_id: i64,
        skill_key: &str,
        input: &GradeInput,
    ) -> Result<AppliedCell, MatrixError> {
        self.ensure_editable()?;
        let cell = editor::apply(
            self.store.working_mut(),
            &self.catalog,
            student_id,
            skill_key,
            input,
        )?;
        let dirty = self.store.baseline_cell(student_id, skill_key) != Some(cell.grade_id);
        Ok(AppliedCell {
            student_id,
            skill_key: skill_key.to_string(),
            cell,
            dirty,
        })
    }

    pub fn change_set(&self) -> ChangeSet {
        compute_change_set(
            self.store.snapshot(),
            self.store.working(),
            &self.assessment_ids,
        )
    }

    pub fn validate(&self) -> CompletionReport {
        gate::validate(self.store.working())
    }

    fn build_payload(&self, target: WorkflowStatus, students: ChangeSet) -> SavePayload {
        let code = &self.codes.for_status(target).code;
        SavePayload {
            session_id: self.key.session_id,
            tenant_id: self.key.tenant_id,
            branch_id: self.key.branch_id,
            conducted_by_id: self.key.conducted_by_id,
            course_id: self.key.course_id,
            override_status_code: code.clone(),
            assessment_code: code.clone(),
            students,
        }
    }

    /// Gate, diff and payload, all before anything goes on the wire.
    ///
    /// A newer `begin_save` supersedes an older one still in flight.
    pub fn begin_save(&mut self, target: WorkflowStatus) -> Result<PendingSave, MatrixError> {
        if self.status == WorkflowStatus::Completed {
            return Err(MatrixError::ReadOnly);
        }
        if target == WorkflowStatus::Completed {
            let report = self.validate();
            if !report.valid {
                return Err(MatrixError::Validation { report });
            }
        }
        // An empty diff blocks COMPLETED too, even on a fully graded matrix.
        let changes = self.change_set();
        if changes.is_empty() {
            return Err(MatrixError::EmptyChangeSet);
        }

        self.attempts += 1;
        let attempt = self.attempts;
        if let Some(prev) = &self.in_flight {
            warn!(superseded = prev.attempt, attempt, "save superseded");
        }
        let payload = self.build_payload(target, changes);
        self.in_flight = Some(InFlight {
            attempt,
            target,
            sent: self.store.working().to_vec(),
        });
        info!(
            session_id = self.key.session_id,
            attempt,
            target = ?target,
            students = payload.students.len(),
            "save started"
        );
        Ok(PendingSave {
            attempt,
            target,
            payload,
        })
    }

    /// Apply a sink's verdict. Outcomes for superseded attempts are dropped.
    pub fn finish_save(
        &mut self,
        attempt: u64,
        outcome: anyhow::Result<()>,
    ) -> Result<Option<SaveOutcome>, MatrixError> {
        match &self.in_flight {
            Some(f) if f.attempt == attempt => {}
            _ => {
                warn!(attempt, "ignoring outcome of superseded save");
                return Ok(None);
            }
        }
        let Some(flight) = self.in_flight.take() else {
            return Ok(None);
        };

        if let Err(e) = outcome {
            let err = MatrixError::save(&e);
            warn!(session_id = self.key.session_id, attempt, error = %err, "save failed");
            return Err(err);
        }

        let saved = compute_change_set(self.store.snapshot(), &flight.sent, &self.assessment_ids);
        let students_saved = saved.len();
        let cells_saved = saved.iter().map(|c| c.grades.len()).sum();
        self.store.promote(flight.sent);
        self.status = flight.target;
        info!(
            session_id = self.key.session_id,
            attempt,
            status = ?self.status,
            "save finished"
        );
        Ok(Some(SaveOutcome {
            status: self.status,
            students_saved,
            cells_saved,
        }))
    }

    /// begin + sink call + finish, for callers without their own async.
    pub fn save<P>(&mut self, target: WorkflowStatus, sink: &P) -> Result<SaveOutcome, MatrixError>
    where
        P: PersistenceSink + ?Sized,
    {
        let pending = self.begin_save(target)?;
        let result = sink.save_matrix(&pending.payload);
        self.finish_save(pending.attempt, result)?
            .ok_or_else(|| MatrixError::Save("save was superseded".to_string()))
    }

    /// Throw away unsaved edits. Status is untouched.
    pub fn cancel(&mut self) -> Result<(), MatrixError> {
        if self.in_flight.is_some() {
            return Err(MatrixError::SaveInFlight);
        }
        self.store.restore();
        Ok(())
    }
}
