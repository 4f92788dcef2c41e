//! SQLite schema definitions and versioned migrations.
//!
//! Each step only adds tables, columns, or indexes. Opening an older database
//! applies the missing steps in order and leaves existing rows alone.

use rusqlite::{params, Connection, OptionalExtension};

use super::error::DbError;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

/// Version tracking table, created before any step runs.
const VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);
"#;

/// v1: entity stores, mutation queue, settings.
const V1: &str = r#"
-- Cached lessons
CREATE TABLE IF NOT EXISTS lessons (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0
);

-- Cached quizzes (questions stored as JSON)
CREATE TABLE IF NOT EXISTS quizzes (
    id TEXT PRIMARY KEY,
    lesson_id TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    questions TEXT NOT NULL
);

-- Quiz submissions
CREATE TABLE IF NOT EXISTS quiz_results (
    id TEXT PRIMARY KEY,
    student_id TEXT NOT NULL,
    lesson_id TEXT NOT NULL,
    score INTEGER NOT NULL,
    answers TEXT NOT NULL,
    completed_at TEXT NOT NULL,
    time_taken_minutes INTEGER,
    synced INTEGER NOT NULL DEFAULT 0
);

-- One aggregate row per student
CREATE TABLE IF NOT EXISTS student_progress (
    student_id TEXT PRIMARY KEY,
    completed_lessons INTEGER NOT NULL DEFAULT 0,
    total_score REAL NOT NULL DEFAULT 0,
    badges_earned INTEGER NOT NULL DEFAULT 0,
    last_updated TEXT NOT NULL
);

-- Mutations waiting for remote acknowledgement
CREATE TABLE IF NOT EXISTS sync_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    ref_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    retries INTEGER NOT NULL DEFAULT 0
);

-- Key/value preferences
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_lessons_subject ON lessons(subject);
CREATE INDEX IF NOT EXISTS idx_quizzes_lesson ON quizzes(lesson_id);
CREATE INDEX IF NOT EXISTS idx_quiz_results_student ON quiz_results(student_id);
CREATE INDEX IF NOT EXISTS idx_quiz_results_lesson ON quiz_results(lesson_id);
CREATE INDEX IF NOT EXISTS idx_quiz_results_synced ON quiz_results(synced);
CREATE INDEX IF NOT EXISTS idx_student_progress_updated ON student_progress(last_updated);
"#;

/// v2: retry scheduling for queued mutations.
const V2: &str = r#"
ALTER TABLE sync_queue ADD COLUMN next_attempt_at TEXT;
ALTER TABLE sync_queue ADD COLUMN dead_lettered INTEGER NOT NULL DEFAULT 0;
CREATE INDEX IF NOT EXISTS idx_sync_queue_ref ON sync_queue(ref_id);
"#;

/// Ordered migration steps.
const MIGRATIONS: &[(i32, &str)] = &[(1, V1), (2, V2)];

/// Version recorded in the database, 0 for a fresh file.
pub fn current_version(conn: &Connection) -> Result<i32, DbError> {
    conn.execute_batch(VERSION_TABLE)?;
    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get::<_, Option<i32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Apply every step above the recorded version up to `target`.
///
/// Returns the version the database ends at. A database already newer than
/// `target` is left untouched.
pub fn migrate(conn: &Connection, target: i32) -> Result<i32, DbError> {
    let mut version = current_version(conn)?;

    for (step, sql) in MIGRATIONS {
        if *step <= version || *step > target {
            continue;
        }
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            params![step],
        )?;
        tx.commit()?;
        tracing::info!(version = step, "applied schema migration");
        version = *step;
    }

    Ok(version)
}
