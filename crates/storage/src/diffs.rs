use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use savor_core::{DiffChunk, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::articles::load_article;
use crate::db::{now_ts, sql_err, Database};
use crate::skills::{append_version_tx, NewVersion, SkillVersion};

/// One analyzed comparison between a draft and its refinement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiffRecord {
    pub id: i64,
    pub article_id: i64,
    pub chunks: Vec<DiffChunk>,
    pub llm_analysis: String,
    pub extracted_rules: String,
    pub applied_to_skill: bool,
    /// Version created from this record, once applied.
    pub applied_version: Option<i64>,
    pub created_at: String,
}

impl DiffRecord {
    pub fn has_analysis(&self) -> bool {
        !self.llm_analysis.trim().is_empty() || !self.extracted_rules.trim().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct NewDiffRecord {
    pub article_id: i64,
    pub chunks: Vec<DiffChunk>,
    pub llm_analysis: String,
    pub extracted_rules: String,
}

const DIFF_COLUMNS: &str =
    "id, article_id, diff_data, llm_analysis, extracted_rules, applied_to_skill, applied_version, created_at";

fn row_to_record(row: &Row) -> rusqlite::Result<DiffRecord> {
    let data: String = row.get(2)?;
    let chunks: Vec<DiffChunk> = serde_json::from_str(&data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    let applied: i64 = row.get(5)?;
    Ok(DiffRecord {
        id: row.get(0)?,
        article_id: row.get(1)?,
        chunks,
        llm_analysis: row.get(3)?,
        extracted_rules: row.get(4)?,
        applied_to_skill: applied != 0,
        applied_version: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn load_record(conn: &Connection, record_id: i64) -> Result<DiffRecord> {
    conn.query_row(
        &format!("SELECT {} FROM diff_record WHERE id = ?1", DIFF_COLUMNS),
        params![record_id],
        row_to_record,
    )
    .optional()
    .map_err(sql_err("Failed to load diff record"))?
    .ok_or_else(|| Error::NotFound(format!("diff record {}", record_id)))
}

#[derive(Clone)]
pub struct DiffStore {
    db: Database,
}

impl DiffStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, new: NewDiffRecord) -> Result<DiffRecord> {
        let data = serde_json::to_string(&new.chunks)?;

        let conn = self.db.lock()?;
        load_article(&conn, new.article_id)?;
        conn.execute(
            "INSERT INTO diff_record (article_id, diff_data, llm_analysis, extracted_rules, applied_to_skill, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![new.article_id, data, new.llm_analysis, new.extracted_rules, now_ts()],
        )
        .map_err(sql_err("Failed to insert diff record"))?;
        let id = conn.last_insert_rowid();

        debug!(diff_record_id = id, article_id = new.article_id, chunks = new.chunks.len(), "Diff record stored");
        load_record(&conn, id)
    }

    pub fn get(&self, record_id: i64) -> Result<DiffRecord> {
        let conn = self.db.lock()?;
        load_record(&conn, record_id)
    }

    /// Newest first.
    pub fn list_for_article(&self, article_id: i64) -> Result<Vec<DiffRecord>> {
        let conn = self.db.lock()?;
        load_article(&conn, article_id)?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM diff_record WHERE article_id = ?1 ORDER BY id DESC",
                DIFF_COLUMNS
            ))
            .map_err(sql_err("Failed to prepare diff list"))?;
        let records = stmt
            .query_map(params![article_id], row_to_record)
            .map_err(sql_err("Failed to list diff records"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("Failed to read diff record row"))?;
        Ok(records)
    }

    pub fn latest_for_article(&self, article_id: i64) -> Result<Option<DiffRecord>> {
        Ok(self.list_for_article(article_id)?.into_iter().next())
    }

    /// Fill in analysis results after a retry. Applied records are final.
    pub fn record_analysis(&self, record_id: i64, llm_analysis: &str, extracted_rules: &str) -> Result<DiffRecord> {
        let conn = self.db.lock()?;
        let updated = conn
            .execute(
                "UPDATE diff_record SET llm_analysis = ?1, extracted_rules = ?2
                 WHERE id = ?3 AND applied_to_skill = 0",
                params![llm_analysis, extracted_rules, record_id],
            )
            .map_err(sql_err("Failed to store analysis"))?;
        if updated == 0 {
            // Either missing or already applied
            let record = load_record(&conn, record_id)?;
            return Err(Error::AlreadyApplied(record.id));
        }
        load_record(&conn, record_id)
    }

    /// Append the evolved version and mark the record applied in one
    /// transaction. A record that is already applied, or a skill that moved
    /// past `expected_version`, leaves the store unchanged.
    pub fn apply_to_skill(
        &self,
        record_id: i64,
        skill_id: i64,
        expected_version: i64,
        new: NewVersion,
    ) -> Result<(DiffRecord, SkillVersion)> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err("Failed to begin transaction"))?;

        let record = load_record(&tx, record_id)?;
        if record.applied_to_skill {
            return Err(Error::AlreadyApplied(record_id));
        }

        let version = append_version_tx(&tx, skill_id, Some(expected_version), &new)?;

        let flipped = tx
            .execute(
                "UPDATE diff_record SET applied_to_skill = 1, applied_version = ?1
                 WHERE id = ?2 AND applied_to_skill = 0",
                params![version.version_number, record_id],
            )
            .map_err(sql_err("Failed to mark diff record applied"))?;
        if flipped == 0 {
            return Err(Error::AlreadyApplied(record_id));
        }

        let record = load_record(&tx, record_id)?;
        tx.commit().map_err(sql_err("Failed to commit evolution"))?;

        info!(
            diff_record_id = record_id,
            skill_id,
            version = version.version_number,
            "Diff record applied to skill"
        );
        Ok((record, version))
    }
}
