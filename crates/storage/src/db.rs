use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use savor_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Shared SQLite handle for all stores.
///
/// Every store method takes the lock for one short read-modify-write and
/// releases it before returning, so no lock is ever held across an
/// external model call.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl Database {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create db directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        // WAL gives readers a consistent snapshot while a version is appended
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let db = Self::from_connection(conn, Some(db_path.to_path_buf()))?;
        info!(path = %db_path.display(), "Database opened");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {}", e)))?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Storage(format!("Failed to enable foreign keys: {}", e)))?;
        init_schema(&conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("Lock error: {}", e)))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS skill (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            name            TEXT NOT NULL,
            category        TEXT NOT NULL DEFAULT 'General',
            description     TEXT NOT NULL DEFAULT '',
            current_version INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS skill_version (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            skill_id         INTEGER NOT NULL,
            version_number   INTEGER NOT NULL,
            content_markdown TEXT NOT NULL DEFAULT '',
            content_json     TEXT NOT NULL DEFAULT '{}',
            change_summary   TEXT NOT NULL DEFAULT '',
            created_at       TEXT NOT NULL,
            FOREIGN KEY (skill_id) REFERENCES skill(id) ON DELETE CASCADE,
            UNIQUE (skill_id, version_number)
        );

        CREATE TABLE IF NOT EXISTS article (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            title                TEXT NOT NULL DEFAULT 'Untitled',
            original_content     TEXT NOT NULL DEFAULT '',
            ai_generated_content TEXT NOT NULL DEFAULT '',
            user_refined_content TEXT NOT NULL DEFAULT '',
            skill_id             INTEGER,
            skill_version_used   INTEGER,
            status               TEXT NOT NULL DEFAULT 'draft',
            created_at           TEXT NOT NULL,
            updated_at           TEXT NOT NULL,
            FOREIGN KEY (skill_id) REFERENCES skill(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS diff_record (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            article_id       INTEGER NOT NULL,
            diff_data        TEXT NOT NULL DEFAULT '[]',
            llm_analysis     TEXT NOT NULL DEFAULT '',
            extracted_rules  TEXT NOT NULL DEFAULT '',
            applied_to_skill INTEGER NOT NULL DEFAULT 0,
            applied_version  INTEGER,
            created_at       TEXT NOT NULL,
            FOREIGN KEY (article_id) REFERENCES article(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS original_sample (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL DEFAULT 'Untitled sample',
            content     TEXT NOT NULL DEFAULT '',
            skill_id    INTEGER NOT NULL,
            created_at  TEXT NOT NULL,
            FOREIGN KEY (skill_id) REFERENCES skill(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_article_skill ON article(skill_id);
        CREATE INDEX IF NOT EXISTS idx_diff_article ON diff_record(article_id);
        CREATE INDEX IF NOT EXISTS idx_sample_skill ON original_sample(skill_id);

        -- History is append-only
        CREATE TRIGGER IF NOT EXISTS skill_version_immutable
        BEFORE UPDATE ON skill_version BEGIN
            SELECT RAISE(ABORT, 'skill versions are immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS skill_counter_monotonic
        BEFORE UPDATE OF current_version ON skill
        WHEN NEW.current_version < OLD.current_version BEGIN
            SELECT RAISE(ABORT, 'current_version may not decrease');
        END;

        CREATE TRIGGER IF NOT EXISTS article_draft_frozen
        BEFORE UPDATE OF ai_generated_content, skill_version_used ON article
        WHEN NEW.ai_generated_content IS NOT OLD.ai_generated_content
          OR NEW.skill_version_used IS NOT OLD.skill_version_used BEGIN
            SELECT RAISE(ABORT, 'generated draft and pinned version are frozen');
        END;

        CREATE TRIGGER IF NOT EXISTS diff_applied_one_way
        BEFORE UPDATE OF applied_to_skill ON diff_record
        WHEN OLD.applied_to_skill = 1 AND NEW.applied_to_skill = 0 BEGIN
            SELECT RAISE(ABORT, 'applied_to_skill cannot be reset');
        END;
        ",
    )
    .map_err(|e| Error::Storage(format!("Failed to init schema: {}", e)))?;

    debug!("Database schema initialized");
    Ok(())
}

/// Fixed-width UTC timestamp so lexical order matches chronological order.
pub(crate) fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Lock contention from another connection surfaces as a retryable conflict.
pub(crate) fn sql_err(context: &'static str) -> impl Fn(rusqlite::Error) -> Error {
    move |e| {
        if is_busy(&e) {
            Error::ConcurrencyConflict(format!("{}: {}", context, e))
        } else {
            Error::Storage(format!("{}: {}", context, e))
        }
    }
}

pub(crate) fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}

pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
