use rusqlite::Connection;
use std::path::{Path, PathBuf};

pub const DB_FILE: &str = "gradematrix.sqlite3";

pub fn db_path(workspace: &Path) -> PathBuf {
    workspace.join(DB_FILE)
}

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(db_path(workspace))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_catalog(
            tenant_id INTEGER NOT NULL,
            id INTEGER NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(tenant_id, id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id INTEGER PRIMARY KEY,
            tenant_id INTEGER NOT NULL,
            branch_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            status_id INTEGER NOT NULL,
            status_name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_skills(
            session_id INTEGER NOT NULL,
            skill_key TEXT NOT NULL,
            assessment_id INTEGER NOT NULL,
            PRIMARY KEY(session_id, skill_key),
            UNIQUE(session_id, assessment_id),
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_students(
            session_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            student_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(session_id, student_id),
            FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_session_students_sort ON session_students(session_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS session_grades(
            session_id INTEGER NOT NULL,
            student_id INTEGER NOT NULL,
            skill_key TEXT NOT NULL,
            grade_id INTEGER NOT NULL,
            grade_name TEXT NOT NULL,
            updated_at TEXT,
            PRIMARY KEY(session_id, student_id, skill_key),
            FOREIGN KEY(session_id, student_id) REFERENCES session_students(session_id, student_id) ON DELETE CASCADE,
            FOREIGN KEY(session_id, skill_key) REFERENCES session_skills(session_id, skill_key) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS save_log(
            id TEXT PRIMARY KEY,
            session_id INTEGER NOT NULL,
            status_code TEXT NOT NULL,
            payload TEXT NOT NULL,
            saved_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_save_log_session ON save_log(session_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS selector_options(
            node TEXT NOT NULL,
            parent_id TEXT NOT NULL DEFAULT '',
            id TEXT NOT NULL,
            label TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(node, parent_id, id)
        )",
        [],
    )?;

    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ))
    }

    #[test]
    fn open_is_idempotent() {
        let ws = temp_dir("gradematrix-db-open");
        {
            open_db(&ws).expect("first open");
        }
        let conn = open_db(&ws).expect("second open");
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('grade_catalog', 'sessions', 'session_skills', 'session_students',
                  'session_grades', 'save_log', 'selector_options')",
                [],
                |r| r.get(0),
            )
            .expect("count tables");
        assert_eq!(tables, 7);
    }
}
