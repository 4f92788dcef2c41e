//! Repository pattern for database access.

use crate::db::error::DbError;
use crate::db::schema;
use chrono::{DateTime, SecondsFormat, Utc};
use edurural_core::types::{
    Lesson, QueueEntryKind, Question, Quiz, QuizResult, StudentProgress, SyncQueueEntry,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

type Result<T> = std::result::Result<T, DbError>;

/// Repository for lesson operations.
pub trait LessonRepository {
    fn put_lesson(&self, lesson: &Lesson) -> Result<()>;
    fn get_lesson(&self, id: &str) -> Result<Option<Lesson>>;
    fn get_lessons_by_subject(&self, subject: &str) -> Result<Vec<Lesson>>;
    fn get_all_lessons(&self) -> Result<Vec<Lesson>>;
    fn delete_lesson(&self, id: &str) -> Result<()>;
}

/// Repository for quiz operations.
pub trait QuizRepository {
    fn put_quiz(&self, quiz: &Quiz) -> Result<()>;
    fn get_quiz(&self, id: &str) -> Result<Option<Quiz>>;
    fn get_quizzes_by_lesson(&self, lesson_id: &str) -> Result<Vec<Quiz>>;
    fn delete_quiz(&self, id: &str) -> Result<()>;
}

/// A quiz result read back for syncing.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingResult {
    Ready(QuizResult),
    /// Row that failed shape validation. Skipped, never sent.
    Malformed { id: String, reason: String },
}

/// Repository for quiz result operations.
pub trait ResultRepository {
    fn put_result(&self, result: &QuizResult) -> Result<()>;
    fn get_result(&self, id: &str) -> Result<Option<QuizResult>>;
    fn get_results_by_student(&self, student_id: &str) -> Result<Vec<QuizResult>>;
    fn get_results_by_lesson(&self, lesson_id: &str) -> Result<Vec<QuizResult>>;
    /// Unsynced results whose queue entry is neither parked nor backing off.
    fn get_unsynced_results(&self, now: DateTime<Utc>) -> Result<Vec<PendingResult>>;
    fn count_unsynced_results(&self) -> Result<usize>;
    /// Flip `synced` to true and drop the queue entries for the result.
    fn mark_result_synced(&self, id: &str) -> Result<()>;
    fn delete_result(&self, id: &str) -> Result<()>;
}

/// Repository for student progress operations.
pub trait ProgressRepository {
    fn put_progress(&self, progress: &StudentProgress) -> Result<()>;
    fn get_progress(&self, student_id: &str) -> Result<Option<StudentProgress>>;
    fn get_progress_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<StudentProgress>>;
    fn delete_progress(&self, student_id: &str) -> Result<()>;
}

/// Repository for mutation queue operations.
pub trait QueueRepository {
    fn enqueue(
        &self,
        kind: QueueEntryKind,
        ref_id: &str,
        payload: &serde_json::Value,
    ) -> Result<i64>;
    fn get_queue_entries(&self) -> Result<Vec<SyncQueueEntry>>;
    fn get_queue_entries_for(&self, ref_id: &str) -> Result<Vec<SyncQueueEntry>>;
    /// Bump the retry counter for a referenced entity. `None` if nothing is queued.
    fn increment_retries(&self, ref_id: &str) -> Result<Option<u32>>;
    fn schedule_retry(
        &self,
        ref_id: &str,
        next_attempt_at: Option<DateTime<Utc>>,
        dead_lettered: bool,
    ) -> Result<()>;
}

/// Repository for key/value settings.
pub trait SettingsRepository {
    fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>>;
    fn delete_setting(&self, key: &str) -> Result<()>;
}

/// How the store ended up being opened.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StorageMode {
    Durable { path: PathBuf },
    /// Durable storage was refused; data lives only for this session.
    InMemory { reason: String },
}

impl StorageMode {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::InMemory { .. })
    }
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, migrating it to the current schema.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open the durable store, or fall back to memory when storage is refused.
    ///
    /// Only `StorageUnavailable` triggers the fallback; any other error is
    /// returned as is.
    pub fn open_or_degrade<P: AsRef<Path>>(path: P) -> Result<(Self, StorageMode)> {
        let path = path.as_ref();
        match Self::open(path) {
            Ok(repo) => Ok((
                repo,
                StorageMode::Durable {
                    path: path.to_path_buf(),
                },
            )),
            Err(DbError::StorageUnavailable(reason)) => {
                tracing::warn!(
                    path = %path.display(),
                    %reason,
                    "durable storage unavailable, data will not survive this session"
                );
                let repo = Self::open_in_memory()?;
                Ok((repo, StorageMode::InMemory { reason }))
            }
            Err(e) => Err(e),
        }
    }

    fn initialize(&self) -> Result<()> {
        schema::migrate(&self.conn, schema::SCHEMA_VERSION)?;
        Ok(())
    }

    /// Schema version recorded in the database.
    pub fn schema_version(&self) -> Result<i32> {
        schema::current_version(&self.conn)
    }

    /// Store a fresh submission and queue it for sync in one transaction.
    ///
    /// Unlike `put_result` this never overwrites: a submission whose id is
    /// already stored fails with `DbError::Conflict` and changes nothing.
    pub fn record_submission(&self, result: &QuizResult) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        self.insert_result(result).map_err(|e| {
            if e.is_constraint_violation() {
                DbError::Conflict(format!("quiz result {}", result.id))
            } else {
                e
            }
        })?;
        let payload = serde_json::json!({ "resultId": result.id });
        let queue_id = self.enqueue(QueueEntryKind::QuizResult, &result.id, &payload)?;
        tx.commit()?;
        Ok(queue_id)
    }

    /// Empty every entity store except settings.
    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
             DELETE FROM lessons;
             DELETE FROM quizzes;
             DELETE FROM quiz_results;
             DELETE FROM student_progress;
             DELETE FROM sync_queue;
             COMMIT;",
        )?;
        Ok(())
    }
}

/// Fixed-width UTC timestamps so string comparison in SQL orders correctly.
fn to_db_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn from_db_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("bad timestamp {value:?}: {e}")))
}

impl LessonRepository for SqliteRepository {
    fn put_lesson(&self, lesson: &Lesson) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO lessons (id, subject, title, content, position) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![lesson.id, lesson.subject, lesson.title, lesson.content, lesson.position],
        )?;
        Ok(())
    }

    fn get_lesson(&self, id: &str) -> Result<Option<Lesson>> {
        self.conn
            .query_row(
                "SELECT id, subject, title, content, position FROM lessons WHERE id = ?1",
                params![id],
                Self::row_to_lesson,
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_lessons_by_subject(&self, subject: &str) -> Result<Vec<Lesson>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, title, content, position FROM lessons WHERE subject = ?1 ORDER BY position, id",
        )?;
        let lessons = stmt
            .query_map(params![subject], Self::row_to_lesson)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lessons)
    }

    fn get_all_lessons(&self) -> Result<Vec<Lesson>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject, title, content, position FROM lessons ORDER BY subject, position, id",
        )?;
        let lessons = stmt
            .query_map([], Self::row_to_lesson)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(lessons)
    }

    fn delete_lesson(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM lessons WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl QuizRepository for SqliteRepository {
    fn put_quiz(&self, quiz: &Quiz) -> Result<()> {
        let questions = serde_json::to_string(&quiz.questions)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO quizzes (id, lesson_id, title, questions) VALUES (?1, ?2, ?3, ?4)",
            params![quiz.id, quiz.lesson_id, quiz.title, questions],
        )?;
        Ok(())
    }

    fn get_quiz(&self, id: &str) -> Result<Option<Quiz>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, lesson_id, title, questions FROM quizzes WHERE id = ?1",
                params![id],
                Self::row_to_quiz_columns,
            )
            .optional()?;
        row.map(Self::quiz_from_columns).transpose()
    }

    fn get_quizzes_by_lesson(&self, lesson_id: &str) -> Result<Vec<Quiz>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lesson_id, title, questions FROM quizzes WHERE lesson_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![lesson_id], Self::row_to_quiz_columns)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::quiz_from_columns).collect()
    }

    fn delete_quiz(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM quizzes WHERE id = ?1", params![id])?;
        Ok(())
    }
}

/// Raw quiz_results columns before validation.
struct ResultRow {
    id: String,
    student_id: String,
    lesson_id: String,
    score: i64,
    answers: String,
    completed_at: String,
    time_taken_minutes: Option<u32>,
    synced: bool,
}

const RESULT_COLUMNS: &str =
    "r.id, r.student_id, r.lesson_id, r.score, r.answers, r.completed_at, r.time_taken_minutes, r.synced";

const RESULT_INSERT: &str =
    "INSERT INTO quiz_results (id, student_id, lesson_id, score, answers, completed_at, time_taken_minutes, synced)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

impl SqliteRepository {
    fn row_to_lesson(row: &rusqlite::Row) -> rusqlite::Result<Lesson> {
        Ok(Lesson {
            id: row.get(0)?,
            subject: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            position: row.get(4)?,
        })
    }

    fn row_to_quiz_columns(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<(String, String, String, String)> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn quiz_from_columns(
        (id, lesson_id, title, questions): (String, String, String, String),
    ) -> Result<Quiz> {
        let questions: Vec<Question> = serde_json::from_str(&questions)
            .map_err(|e| DbError::InvalidData(format!("quiz {id}: {e}")))?;
        Ok(Quiz {
            id,
            lesson_id,
            title,
            questions,
        })
    }

    fn row_to_result(row: &rusqlite::Row) -> rusqlite::Result<ResultRow> {
        Ok(ResultRow {
            id: row.get(0)?,
            student_id: row.get(1)?,
            lesson_id: row.get(2)?,
            score: row.get(3)?,
            answers: row.get(4)?,
            completed_at: row.get(5)?,
            time_taken_minutes: row.get(6)?,
            synced: row.get::<_, i64>(7)? != 0,
        })
    }

    fn result_from_row(row: ResultRow) -> Result<QuizResult> {
        let score = u8::try_from(row.score)
            .map_err(|_| DbError::InvalidData(format!("score {} out of range", row.score)))?;
        let answers: Vec<i32> = serde_json::from_str(&row.answers)
            .map_err(|e| DbError::InvalidData(format!("answers: {e}")))?;
        let result = QuizResult {
            id: row.id,
            student_id: row.student_id,
            lesson_id: row.lesson_id,
            score,
            answers,
            completed_at: from_db_time(&row.completed_at)?,
            time_taken_minutes: row.time_taken_minutes,
            synced: row.synced,
        };
        result
            .validate()
            .map_err(|e| DbError::InvalidData(e.to_string()))?;
        Ok(result)
    }

    fn query_results(&self, sql: &str, key: &str) -> Result<Vec<QuizResult>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params![key], Self::row_to_result)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::result_from_row).collect()
    }

    fn row_to_progress(row: &rusqlite::Row) -> rusqlite::Result<(StudentProgress, String)> {
        Ok((
            StudentProgress {
                student_id: row.get(0)?,
                completed_lessons: row.get(1)?,
                total_score: row.get(2)?,
                badges_earned: row.get(3)?,
                last_updated: DateTime::<Utc>::MIN_UTC,
            },
            row.get(4)?,
        ))
    }

    fn progress_from_row((mut progress, updated): (StudentProgress, String)) -> Result<StudentProgress> {
        progress.last_updated = from_db_time(&updated)?;
        Ok(progress)
    }

    fn row_to_queue_entry(
        row: &rusqlite::Row,
    ) -> rusqlite::Result<(i64, String, String, String, String, u32, Option<String>, bool)> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get::<_, i64>(7)? != 0,
        ))
    }

    fn queue_entry_from_row(
        (id, kind, ref_id, payload, enqueued_at, retries, next_attempt_at, dead_lettered): (
            i64,
            String,
            String,
            String,
            String,
            u32,
            Option<String>,
            bool,
        ),
    ) -> Result<SyncQueueEntry> {
        let kind = QueueEntryKind::parse(&kind)
            .ok_or_else(|| DbError::InvalidData(format!("unknown queue kind {kind:?}")))?;
        Ok(SyncQueueEntry {
            id,
            kind,
            ref_id,
            payload: serde_json::from_str(&payload)?,
            enqueued_at: from_db_time(&enqueued_at)?,
            retries,
            next_attempt_at: next_attempt_at.as_deref().map(from_db_time).transpose()?,
            dead_lettered,
        })
    }

    fn query_queue(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<SyncQueueEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, Self::row_to_queue_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::queue_entry_from_row).collect()
    }

    fn write_result(&self, sql: &str, result: &QuizResult) -> Result<()> {
        let answers = serde_json::to_string(&result.answers)?;
        self.conn.execute(
            sql,
            params![
                result.id,
                result.student_id,
                result.lesson_id,
                result.score,
                answers,
                to_db_time(result.completed_at),
                result.time_taken_minutes,
                result.synced as i64,
            ],
        )?;
        Ok(())
    }

    fn insert_result(&self, result: &QuizResult) -> Result<()> {
        self.write_result(RESULT_INSERT, result)
    }
}

impl ResultRepository for SqliteRepository {
    fn put_result(&self, result: &QuizResult) -> Result<()> {
        // synced never goes back to false, even when a stale copy is re-put.
        let sql = format!(
            "{RESULT_INSERT}
             ON CONFLICT(id) DO UPDATE SET
                student_id = excluded.student_id,
                lesson_id = excluded.lesson_id,
                score = excluded.score,
                answers = excluded.answers,
                completed_at = excluded.completed_at,
                time_taken_minutes = excluded.time_taken_minutes,
                synced = MAX(quiz_results.synced, excluded.synced)"
        );
        self.write_result(&sql, result)
    }

    fn get_result(&self, id: &str) -> Result<Option<QuizResult>> {
        let sql = format!("SELECT {RESULT_COLUMNS} FROM quiz_results r WHERE r.id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], Self::row_to_result)
            .optional()?;
        row.map(Self::result_from_row).transpose()
    }

    fn get_results_by_student(&self, student_id: &str) -> Result<Vec<QuizResult>> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM quiz_results r WHERE r.student_id = ?1 ORDER BY r.completed_at, r.id"
        );
        self.query_results(&sql, student_id)
    }

    fn get_results_by_lesson(&self, lesson_id: &str) -> Result<Vec<QuizResult>> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS} FROM quiz_results r WHERE r.lesson_id = ?1 ORDER BY r.completed_at, r.id"
        );
        self.query_results(&sql, lesson_id)
    }

    fn get_unsynced_results(&self, now: DateTime<Utc>) -> Result<Vec<PendingResult>> {
        let sql = format!(
            "SELECT {RESULT_COLUMNS}
             FROM quiz_results r
             WHERE r.synced = 0
               AND NOT EXISTS (
                   SELECT 1 FROM sync_queue q
                   WHERE q.ref_id = r.id
                     AND (q.dead_lettered = 1
                          OR (q.next_attempt_at IS NOT NULL AND q.next_attempt_at > ?1)))
             ORDER BY r.completed_at, r.id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![to_db_time(now)], Self::row_to_result)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id = row.id.clone();
                match Self::result_from_row(row) {
                    Ok(result) => PendingResult::Ready(result),
                    Err(e) => PendingResult::Malformed {
                        id,
                        reason: e.to_string(),
                    },
                }
            })
            .collect())
    }

    fn count_unsynced_results(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM quiz_results WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn mark_result_synced(&self, id: &str) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        let updated = tx.execute(
            "UPDATE quiz_results SET synced = 1 WHERE id = ?1",
            params![id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound(format!("quiz result {id}")));
        }
        tx.execute("DELETE FROM sync_queue WHERE ref_id = ?1", params![id])?;
        tx.commit()?;
        Ok(())
    }

    fn delete_result(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM quiz_results WHERE id = ?1", params![id])?;
        Ok(())
    }
}

impl ProgressRepository for SqliteRepository {
    fn put_progress(&self, progress: &StudentProgress) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO student_progress (student_id, completed_lessons, total_score, badges_earned, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                progress.student_id,
                progress.completed_lessons,
                progress.total_score,
                progress.badges_earned,
                to_db_time(progress.last_updated),
            ],
        )?;
        Ok(())
    }

    fn get_progress(&self, student_id: &str) -> Result<Option<StudentProgress>> {
        let row = self
            .conn
            .query_row(
                "SELECT student_id, completed_lessons, total_score, badges_earned, last_updated
                 FROM student_progress WHERE student_id = ?1",
                params![student_id],
                Self::row_to_progress,
            )
            .optional()?;
        row.map(Self::progress_from_row).transpose()
    }

    fn get_progress_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<StudentProgress>> {
        let mut stmt = self.conn.prepare(
            "SELECT student_id, completed_lessons, total_score, badges_earned, last_updated
             FROM student_progress WHERE last_updated >= ?1 ORDER BY last_updated",
        )?;
        let rows = stmt
            .query_map(params![to_db_time(since)], Self::row_to_progress)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(Self::progress_from_row).collect()
    }

    fn delete_progress(&self, student_id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM student_progress WHERE student_id = ?1",
            params![student_id],
        )?;
        Ok(())
    }
}

const QUEUE_COLUMNS: &str =
    "id, kind, ref_id, payload, enqueued_at, retries, next_attempt_at, dead_lettered";

impl QueueRepository for SqliteRepository {
    fn enqueue(
        &self,
        kind: QueueEntryKind,
        ref_id: &str,
        payload: &serde_json::Value,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_queue (kind, ref_id, payload, enqueued_at, retries) VALUES (?1, ?2, ?3, ?4, 0)",
            params![
                kind.as_str(),
                ref_id,
                serde_json::to_string(payload)?,
                to_db_time(Utc::now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_queue_entries(&self) -> Result<Vec<SyncQueueEntry>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue ORDER BY id");
        self.query_queue(&sql, &[])
    }

    fn get_queue_entries_for(&self, ref_id: &str) -> Result<Vec<SyncQueueEntry>> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE ref_id = ?1 ORDER BY id");
        self.query_queue(&sql, &[&ref_id])
    }

    fn increment_retries(&self, ref_id: &str) -> Result<Option<u32>> {
        let updated = self.conn.execute(
            "UPDATE sync_queue SET retries = retries + 1 WHERE ref_id = ?1",
            params![ref_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        let retries: u32 = self.conn.query_row(
            "SELECT MAX(retries) FROM sync_queue WHERE ref_id = ?1",
            params![ref_id],
            |row| row.get(0),
        )?;
        Ok(Some(retries))
    }

    fn schedule_retry(
        &self,
        ref_id: &str,
        next_attempt_at: Option<DateTime<Utc>>,
        dead_lettered: bool,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_queue SET next_attempt_at = ?1, dead_lettered = ?2 WHERE ref_id = ?3",
            params![
                next_attempt_at.map(to_db_time),
                dead_lettered as i64,
                ref_id
            ],
        )?;
        Ok(())
    }
}

impl SettingsRepository for SqliteRepository {
    fn put_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    fn get_setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|v| serde_json::from_str(&v).map_err(Into::into))
            .transpose()
    }

    fn delete_setting(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }
}
