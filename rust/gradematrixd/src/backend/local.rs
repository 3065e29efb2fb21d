use crate::backend::{Backend, MatrixSource, PersistenceSink};
use crate::config::StatusCodes;
use crate::dashboard::cascade::{OptionResolver, SelectOption};
use crate::db;
use crate::matrix::model::{
    GradeCell, GradeOption, RawMatrix, SavePayload, Sentinel, SessionKey, Student, NOT_GRADED,
    UNGRADED_ID,
};
use anyhow::{anyhow, Context};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// SQLite-backed stand-in for the school API, one database per workspace.
///
/// Each call opens its own connection so the store can be shared across the
/// loader's fetch threads.
pub struct LocalStore {
    workspace: PathBuf,
    codes: StatusCodes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionImport {
    pub session_id: i64,
    pub tenant_id: i64,
    pub branch_id: i64,
    pub course_id: i64,
    #[serde(flatten)]
    pub matrix: RawMatrix,
}

/// Options of one selector under one parent (`parentId` empty for roots).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionSetImport {
    pub node: String,
    #[serde(default)]
    pub parent_id: String,
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLogEntry {
    pub id: String,
    pub session_id: i64,
    pub status_code: String,
    pub payload: serde_json::Value,
    pub saved_at: String,
}

impl LocalStore {
    pub fn open(workspace: &Path, codes: StatusCodes) -> anyhow::Result<Self> {
        db::open_db(workspace)?;
        Ok(Self {
            workspace: workspace.to_path_buf(),
            codes,
        })
    }

    pub(crate) fn connect(&self) -> anyhow::Result<Connection> {
        let path = db::db_path(&self.workspace);
        let conn = Connection::open(&path)
            .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Replace a tenant's catalog. Sentinel names are refused.
    pub fn import_catalog(&self, tenant_id: i64, options: &[GradeOption]) -> anyhow::Result<usize> {
        if let Some(bad) = options
            .iter()
            .find(|g| g.id == UNGRADED_ID || Sentinel::parse(&g.name).is_some())
        {
            return Err(anyhow!(
                "catalog entry {} {:?} collides with the ungraded sentinel",
                bad.id,
                bad.name
            ));
        }
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM grade_catalog WHERE tenant_id = ?", [tenant_id])?;
        for (i, g) in options.iter().enumerate() {
            tx.execute(
                "INSERT INTO grade_catalog(tenant_id, id, name, sort_order) VALUES(?, ?, ?, ?)",
                (tenant_id, g.id, &g.name, i as i64),
            )
            .with_context(|| format!("failed to insert grade {}", g.id))?;
        }
        tx.commit()?;
        Ok(options.len())
    }

    /// Replace one session's skills, students and grades.
    pub fn import_session(&self, import: &SessionImport) -> anyhow::Result<()> {
        let m = &import.matrix;
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sessions WHERE id = ?", [import.session_id])?;
        tx.execute(
            "INSERT INTO sessions(id, tenant_id, branch_id, course_id, status_id, status_name)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                import.session_id,
                import.tenant_id,
                import.branch_id,
                import.course_id,
                m.current_status_id,
                &m.current_status_name,
            ),
        )?;
        for (key, assessment_id) in &m.assessment_id_map {
            tx.execute(
                "INSERT INTO session_skills(session_id, skill_key, assessment_id) VALUES(?, ?, ?)",
                (import.session_id, key, assessment_id),
            )
            .with_context(|| format!("failed to insert skill {key}"))?;
        }
        for (i, s) in m.students.iter().enumerate() {
            tx.execute(
                "INSERT INTO session_students(session_id, student_id, student_name, sort_order)
                 VALUES(?, ?, ?, ?)",
                (import.session_id, s.student_id, &s.student_name, i as i64),
            )
            .with_context(|| format!("failed to insert student {}", s.student_id))?;
            for (key, cell) in &s.assessment_grades {
                tx.execute(
                    "INSERT INTO session_grades(session_id, student_id, skill_key, grade_id, grade_name)
                     VALUES(?, ?, ?, ?, ?)",
                    (import.session_id, s.student_id, key, cell.grade_id, &cell.grade_name),
                )
                .with_context(|| {
                    format!("failed to insert grade for student {} skill {key}", s.student_id)
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace each listed option set; sets not listed are left alone.
    pub fn import_selector_options(&self, sets: &[OptionSetImport]) -> anyhow::Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut n = 0;
        for set in sets {
            tx.execute(
                "DELETE FROM selector_options WHERE node = ? AND parent_id = ?",
                (&set.node, &set.parent_id),
            )?;
            for (i, o) in set.options.iter().enumerate() {
                tx.execute(
                    "INSERT INTO selector_options(node, parent_id, id, label, sort_order)
                     VALUES(?, ?, ?, ?, ?)",
                    (&set.node, &set.parent_id, &o.id, &o.label, i as i64),
                )
                .with_context(|| format!("duplicate option {:?} under {}", o.id, set.node))?;
                n += 1;
            }
        }
        tx.commit()?;
        Ok(n)
    }

    pub fn save_log(&self, session_id: i64) -> anyhow::Result<Vec<SaveLogEntry>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, session_id, status_code, payload, saved_at FROM save_log
             WHERE session_id = ? ORDER BY saved_at, rowid",
        )?;
        let rows = stmt
            .query_map([session_id], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                    r.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, session_id, status_code, payload, saved_at)| {
                Ok(SaveLogEntry {
                    id,
                    session_id,
                    status_code,
                    payload: serde_json::from_str(&payload)
                        .context("corrupt payload in save_log")?,
                    saved_at,
                })
            })
            .collect()
    }
}

fn catalog_names(conn: &Connection, tenant_id: i64) -> anyhow::Result<HashMap<i64, String>> {
    let mut stmt = conn.prepare("SELECT id, name FROM grade_catalog WHERE tenant_id = ?")?;
    let rows = stmt
        .query_map([tenant_id], |r| Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?)))?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(rows)
}

impl MatrixSource for LocalStore {
    fn fetch_matrix(&self, key: &SessionKey) -> anyhow::Result<RawMatrix> {
        let conn = self.connect()?;
        let (status_id, status_name): (i64, String) = conn
            .query_row(
                "SELECT status_id, status_name FROM sessions
                 WHERE id = ? AND tenant_id = ? AND branch_id = ? AND course_id = ?",
                (key.session_id, key.tenant_id, key.branch_id, key.course_id),
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| anyhow!("session {} not found", key.session_id))?;

        let mut skill_stmt =
            conn.prepare("SELECT skill_key, assessment_id FROM session_skills WHERE session_id = ?")?;
        let assessment_id_map = skill_stmt
            .query_map([key.session_id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        let mut student_stmt = conn.prepare(
            "SELECT student_id, student_name FROM session_students
             WHERE session_id = ? ORDER BY sort_order",
        )?;
        let mut students = student_stmt
            .query_map([key.session_id], |r| {
                Ok(Student {
                    student_id: r.get(0)?,
                    student_name: r.get(1)?,
                    assessment_grades: BTreeMap::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let index: HashMap<i64, usize> = students
            .iter()
            .enumerate()
            .map(|(i, s)| (s.student_id, i))
            .collect();
        let mut grade_stmt = conn.prepare(
            "SELECT student_id, skill_key, grade_id, grade_name FROM session_grades
             WHERE session_id = ?",
        )?;
        let grades = grade_stmt.query_map([key.session_id], |r| {
            Ok((
                r.get::<_, i64>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?;
        for g in grades {
            let (student_id, skill_key, grade_id, grade_name) = g?;
            let Some(&i) = index.get(&student_id) else {
                continue;
            };
            students[i].assessment_grades.insert(
                skill_key,
                GradeCell {
                    grade_id,
                    grade_name,
                },
            );
        }

        Ok(RawMatrix {
            students,
            assessment_id_map,
            current_status_id: status_id,
            current_status_name: status_name,
        })
    }

    fn fetch_grade_catalog(&self, tenant_id: i64) -> anyhow::Result<Vec<GradeOption>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, name FROM grade_catalog WHERE tenant_id = ? ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map([tenant_id], |r| {
                Ok(GradeOption {
                    id: r.get(0)?,
                    name: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl PersistenceSink for LocalStore {
    /// All-or-nothing: any unknown student, assessment or grade id rolls the
    /// whole payload back.
    fn save_matrix(&self, payload: &SavePayload) -> anyhow::Result<()> {
        let status = self
            .codes
            .from_code(&payload.override_status_code)
            .ok_or_else(|| anyhow!("unknown status code {:?}", payload.override_status_code))?;
        let status = self.codes.for_status(status);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let tenant_id: i64 = tx
            .query_row(
                "SELECT tenant_id FROM sessions WHERE id = ?",
                [payload.session_id],
                |r| r.get(0),
            )
            .optional()?
            .ok_or_else(|| anyhow!("session {} not found", payload.session_id))?;
        if tenant_id != payload.tenant_id {
            return Err(anyhow!(
                "session {} belongs to another tenant",
                payload.session_id
            ));
        }

        let names = catalog_names(&tx, tenant_id)?;
        let skills: HashMap<i64, String> = {
            let mut stmt = tx.prepare(
                "SELECT assessment_id, skill_key FROM session_skills WHERE session_id = ?",
            )?;
            let rows = stmt
                .query_map([payload.session_id], |r| {
                    Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
                })?
                .collect::<Result<HashMap<_, _>, _>>()?;
            rows
        };
        let now = chrono::Utc::now().to_rfc3339();

        for sc in &payload.students {
            for g in &sc.grades {
                let skill_key = skills
                    .get(&g.assessment_id)
                    .ok_or_else(|| anyhow!("unknown assessment id {}", g.assessment_id))?;
                let grade_name = if g.grade_id == UNGRADED_ID {
                    NOT_GRADED.to_string()
                } else {
                    names
                        .get(&g.grade_id)
                        .cloned()
                        .ok_or_else(|| anyhow!("unknown grade id {}", g.grade_id))?
                };
                let changed = tx.execute(
                    "UPDATE session_grades SET grade_id = ?, grade_name = ?, updated_at = ?
                     WHERE session_id = ? AND student_id = ? AND skill_key = ?",
                    (
                        g.grade_id,
                        &grade_name,
                        &now,
                        payload.session_id,
                        sc.student_id,
                        skill_key,
                    ),
                )?;
                if changed == 0 {
                    // Student enrolled but never had a cell for this skill.
                    tx.execute(
                        "INSERT INTO session_grades(session_id, student_id, skill_key, grade_id, grade_name, updated_at)
                         VALUES(?, ?, ?, ?, ?, ?)",
                        (
                            payload.session_id,
                            sc.student_id,
                            skill_key,
                            g.grade_id,
                            &grade_name,
                            &now,
                        ),
                    )
                    .with_context(|| format!("unknown student {}", sc.student_id))?;
                }
            }
        }

        tx.execute(
            "UPDATE sessions SET status_id = ?, status_name = ? WHERE id = ?",
            (status.id, &status.label, payload.session_id),
        )?;
        tx.execute(
            "INSERT INTO save_log(id, session_id, status_code, payload, saved_at) VALUES(?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                payload.session_id,
                &payload.override_status_code,
                serde_json::to_string(payload)?,
                &now,
            ),
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl OptionResolver for LocalStore {
    fn options(&self, node: &str, parent_id: Option<&str>) -> anyhow::Result<Vec<SelectOption>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, label FROM selector_options
             WHERE node = ? AND parent_id = ? ORDER BY sort_order",
        )?;
        let rows = stmt
            .query_map((node, parent_id.unwrap_or("")), |r| {
                Ok(SelectOption {
                    id: r.get(0)?,
                    label: r.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

impl Backend for LocalStore {
    fn kind(&self) -> &'static str {
        "local"
    }
}
