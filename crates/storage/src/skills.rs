use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use savor_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::{is_constraint_violation, now_ts, sql_err, Database};

pub const DEFAULT_CATEGORY: &str = "General";
pub const INITIAL_SUMMARY: &str = "Initial version";
pub const SEEDED_SUMMARY: &str = "Initial style extracted from original samples";

/// A named writing style whose content lives in its versions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Skill {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub description: String,
    pub current_version: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Immutable snapshot of a skill's content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillVersion {
    pub id: i64,
    pub skill_id: i64,
    pub version_number: i64,
    pub content_markdown: String,
    pub content_json: String,
    pub change_summary: String,
    pub created_at: String,
}

/// Sample text a skill was bootstrapped from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OriginalSample {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub skill_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewSkill {
    pub name: String,
    pub category: Option<String>,
    pub description: Option<String>,
    pub content_markdown: Option<String>,
    pub content_json: Option<String>,
}

impl NewSkill {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SkillUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewVersion {
    pub content_markdown: String,
    pub content_json: String,
    pub change_summary: String,
}

#[derive(Debug, Clone)]
pub struct NewSample {
    pub title: String,
    pub content: String,
}

const SKILL_COLUMNS: &str =
    "id, name, category, description, current_version, created_at, updated_at";
const VERSION_COLUMNS: &str =
    "id, skill_id, version_number, content_markdown, content_json, change_summary, created_at";

fn row_to_skill(row: &Row) -> rusqlite::Result<Skill> {
    Ok(Skill {
        id: row.get(0)?,
        name: row.get(1)?,
        category: row.get(2)?,
        description: row.get(3)?,
        current_version: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_version(row: &Row) -> rusqlite::Result<SkillVersion> {
    Ok(SkillVersion {
        id: row.get(0)?,
        skill_id: row.get(1)?,
        version_number: row.get(2)?,
        content_markdown: row.get(3)?,
        content_json: row.get(4)?,
        change_summary: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("skill name must not be blank".to_string()));
    }
    Ok(trimmed.to_string())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub(crate) fn load_skill(conn: &Connection, skill_id: i64) -> Result<Skill> {
    conn.query_row(
        &format!("SELECT {} FROM skill WHERE id = ?1", SKILL_COLUMNS),
        params![skill_id],
        row_to_skill,
    )
    .optional()
    .map_err(sql_err("Failed to load skill"))?
    .ok_or_else(|| Error::NotFound(format!("skill {}", skill_id)))
}

fn load_version(conn: &Connection, skill_id: i64, version_number: i64) -> Result<Option<SkillVersion>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM skill_version WHERE skill_id = ?1 AND version_number = ?2",
            VERSION_COLUMNS
        ),
        params![skill_id, version_number],
        row_to_version,
    )
    .optional()
    .map_err(sql_err("Failed to load skill version"))
}

/// Append the next version inside an already-open transaction.
///
/// `expected` pins the version the caller based its content on; a mismatch
/// with the stored counter is a conflict. The counter is advanced with a
/// compare-and-increment so a racing writer can never reuse a number.
pub(crate) fn append_version_tx(
    conn: &Connection,
    skill_id: i64,
    expected: Option<i64>,
    new: &NewVersion,
) -> Result<SkillVersion> {
    let skill = load_skill(conn, skill_id)?;
    let current = skill.current_version;

    if let Some(expected) = expected {
        if expected != current {
            return Err(Error::ConcurrencyConflict(format!(
                "skill {} is at v{}, expected v{}",
                skill_id, current, expected
            )));
        }
    }

    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(version_number) FROM skill_version WHERE skill_id = ?1",
            params![skill_id],
            |row| row.get(0),
        )
        .map_err(sql_err("Failed to read version counter"))?;
    if max != Some(current) {
        return Err(Error::VersionIntegrity {
            skill_id,
            detail: format!("current_version is {} but latest stored version is {:?}", current, max),
        });
    }

    let next = current + 1;
    let now = now_ts();

    conn.execute(
        "INSERT INTO skill_version (skill_id, version_number, content_markdown, content_json, change_summary, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![skill_id, next, new.content_markdown, new.content_json, new.change_summary, now],
    )
    .map_err(|e| {
        if is_constraint_violation(&e) {
            Error::ConcurrencyConflict(format!("version {} of skill {} already exists", next, skill_id))
        } else {
            sql_err("Failed to insert skill version")(e)
        }
    })?;
    let version_id = conn.last_insert_rowid();

    let updated = conn
        .execute(
            "UPDATE skill SET current_version = ?1, updated_at = ?2 WHERE id = ?3 AND current_version = ?4",
            params![next, now, skill_id, current],
        )
        .map_err(sql_err("Failed to advance version counter"))?;
    if updated == 0 {
        return Err(Error::ConcurrencyConflict(format!(
            "skill {} moved past v{} during append",
            skill_id, current
        )));
    }

    Ok(SkillVersion {
        id: version_id,
        skill_id,
        version_number: next,
        content_markdown: new.content_markdown.clone(),
        content_json: new.content_json.clone(),
        change_summary: new.change_summary.clone(),
        created_at: now,
    })
}

/// Skills, their version history and their bootstrap samples.
#[derive(Clone)]
pub struct SkillStore {
    db: Database,
}

impl SkillStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn create_skill(&self, new: NewSkill) -> Result<Skill> {
        self.insert_skill(new, INITIAL_SUMMARY, &[])
    }

    /// Skill, version 1 and the samples it was extracted from, atomically.
    pub fn create_skill_seeded(&self, new: NewSkill, samples: &[NewSample]) -> Result<Skill> {
        self.insert_skill(new, SEEDED_SUMMARY, samples)
    }

    fn insert_skill(&self, new: NewSkill, summary: &str, samples: &[NewSample]) -> Result<Skill> {
        let name = validate_name(&new.name)?;
        let category = non_blank(new.category.as_deref()).unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let description = new.description.map(|d| d.trim().to_string()).unwrap_or_default();
        let markdown = new.content_markdown.unwrap_or_default();
        let json = non_blank(new.content_json.as_deref()).unwrap_or_else(|| "{}".to_string());
        let now = now_ts();

        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err("Failed to begin transaction"))?;

        tx.execute(
            "INSERT INTO skill (name, category, description, current_version, created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?4)",
            params![name, category, description, now],
        )
        .map_err(sql_err("Failed to insert skill"))?;
        let skill_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO skill_version (skill_id, version_number, content_markdown, content_json, change_summary, created_at)
             VALUES (?1, 1, ?2, ?3, ?4, ?5)",
            params![skill_id, markdown, json, summary, now],
        )
        .map_err(sql_err("Failed to insert initial version"))?;

        for sample in samples {
            let title = non_blank(Some(sample.title.as_str())).unwrap_or_else(|| "Untitled sample".to_string());
            tx.execute(
                "INSERT INTO original_sample (title, content, skill_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![title, sample.content, skill_id, now],
            )
            .map_err(sql_err("Failed to insert sample"))?;
        }

        let skill = load_skill(&tx, skill_id)?;
        tx.commit().map_err(sql_err("Failed to commit skill"))?;

        info!(skill_id, name = %skill.name, samples = samples.len(), "Skill created");
        Ok(skill)
    }

    pub fn get_skill(&self, skill_id: i64) -> Result<Skill> {
        let conn = self.db.lock()?;
        load_skill(&conn, skill_id)
    }

    /// Most recently touched first.
    pub fn list_skills(&self) -> Result<Vec<Skill>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM skill ORDER BY updated_at DESC, id DESC",
                SKILL_COLUMNS
            ))
            .map_err(sql_err("Failed to prepare skill list"))?;
        let skills = stmt
            .query_map([], row_to_skill)
            .map_err(sql_err("Failed to list skills"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("Failed to read skill row"))?;
        Ok(skills)
    }

    /// Metadata only; versions and the counter are untouched.
    pub fn update_skill_meta(&self, skill_id: i64, update: SkillUpdate) -> Result<Skill> {
        let name = match update.name.as_deref() {
            Some(n) => Some(validate_name(n)?),
            None => None,
        };

        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err("Failed to begin transaction"))?;
        let existing = load_skill(&tx, skill_id)?;

        let name = name.unwrap_or(existing.name);
        let category = match update.category {
            Some(c) => non_blank(Some(c.as_str())).unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            None => existing.category,
        };
        let description = update
            .description
            .map(|d| d.trim().to_string())
            .unwrap_or(existing.description);

        tx.execute(
            "UPDATE skill SET name = ?1, category = ?2, description = ?3, updated_at = ?4 WHERE id = ?5",
            params![name, category, description, now_ts(), skill_id],
        )
        .map_err(sql_err("Failed to update skill"))?;

        let skill = load_skill(&tx, skill_id)?;
        tx.commit().map_err(sql_err("Failed to commit skill update"))?;
        debug!(skill_id, "Skill metadata updated");
        Ok(skill)
    }

    /// Removes the skill with its versions and samples. Articles keep their
    /// frozen content and lose only the reference.
    pub fn delete_skill(&self, skill_id: i64) -> Result<()> {
        let conn = self.db.lock()?;
        let deleted = conn
            .execute("DELETE FROM skill WHERE id = ?1", params![skill_id])
            .map_err(sql_err("Failed to delete skill"))?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("skill {}", skill_id)));
        }
        info!(skill_id, "Skill deleted");
        Ok(())
    }

    pub fn append_version(&self, skill_id: i64, new: NewVersion) -> Result<SkillVersion> {
        self.append_version_if_current(skill_id, None, new)
    }

    /// Append only if the skill is still at `expected` (when given).
    pub fn append_version_if_current(
        &self,
        skill_id: i64,
        expected: Option<i64>,
        new: NewVersion,
    ) -> Result<SkillVersion> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql_err("Failed to begin transaction"))?;
        let version = append_version_tx(&tx, skill_id, expected, &new)?;
        tx.commit().map_err(sql_err("Failed to commit version"))?;

        info!(skill_id, version = version.version_number, "Skill version appended");
        Ok(version)
    }

    /// Full history, oldest first. Gaps or a counter mismatch are fatal for
    /// this skill.
    pub fn list_versions(&self, skill_id: i64) -> Result<Vec<SkillVersion>> {
        let conn = self.db.lock()?;
        let skill = load_skill(&conn, skill_id)?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM skill_version WHERE skill_id = ?1 ORDER BY version_number ASC",
                VERSION_COLUMNS
            ))
            .map_err(sql_err("Failed to prepare version list"))?;
        let versions = stmt
            .query_map(params![skill_id], row_to_version)
            .map_err(sql_err("Failed to list versions"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("Failed to read version row"))?;

        for (idx, v) in versions.iter().enumerate() {
            let expected = idx as i64 + 1;
            if v.version_number != expected {
                warn!(skill_id, expected, found = v.version_number, "Version history has a gap");
                return Err(Error::VersionIntegrity {
                    skill_id,
                    detail: format!("expected v{} but found v{}", expected, v.version_number),
                });
            }
        }
        if versions.len() as i64 != skill.current_version {
            return Err(Error::VersionIntegrity {
                skill_id,
                detail: format!(
                    "current_version is {} but {} versions are stored",
                    skill.current_version,
                    versions.len()
                ),
            });
        }
        Ok(versions)
    }

    pub fn get_version(&self, skill_id: i64, version_number: i64) -> Result<SkillVersion> {
        let conn = self.db.lock()?;
        load_skill(&conn, skill_id)?;
        load_version(&conn, skill_id, version_number)?.ok_or_else(|| {
            Error::NotFound(format!("version {} of skill {}", version_number, skill_id))
        })
    }

    /// The version the skill's counter points at.
    pub fn current_version(&self, skill_id: i64) -> Result<SkillVersion> {
        let conn = self.db.lock()?;
        current_version_of(&conn, skill_id)
    }

    /// Skill metadata and its current version, read under one lock.
    pub fn current_with_skill(&self, skill_id: i64) -> Result<(Skill, SkillVersion)> {
        let conn = self.db.lock()?;
        let skill = load_skill(&conn, skill_id)?;
        let version = load_version(&conn, skill_id, skill.current_version)?.ok_or_else(|| {
            Error::VersionIntegrity {
                skill_id,
                detail: format!("current version v{} is missing", skill.current_version),
            }
        })?;
        Ok((skill, version))
    }

    pub fn list_samples(&self, skill_id: i64) -> Result<Vec<OriginalSample>> {
        let conn = self.db.lock()?;
        load_skill(&conn, skill_id)?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, content, skill_id, created_at FROM original_sample
                 WHERE skill_id = ?1 ORDER BY id ASC",
            )
            .map_err(sql_err("Failed to prepare sample list"))?;
        let samples = stmt
            .query_map(params![skill_id], |row| {
                Ok(OriginalSample {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    content: row.get(2)?,
                    skill_id: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .map_err(sql_err("Failed to list samples"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("Failed to read sample row"))?;
        Ok(samples)
    }
}

pub(crate) fn current_version_of(conn: &Connection, skill_id: i64) -> Result<SkillVersion> {
    let skill = load_skill(conn, skill_id)?;
    load_version(conn, skill_id, skill.current_version)?.ok_or_else(|| Error::VersionIntegrity {
        skill_id,
        detail: format!("current version v{} is missing", skill.current_version),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn store() -> SkillStore {
        SkillStore::new(Database::open_in_memory().unwrap())
    }

    fn version(markdown: &str) -> NewVersion {
        NewVersion {
            content_markdown: markdown.to_string(),
            content_json: "{}".to_string(),
            change_summary: format!("set {}", markdown),
        }
    }

    #[test]
    fn test_create_skill_starts_at_v1() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("  Tech Blog ")).unwrap();
        assert_eq!(skill.name, "Tech Blog");
        assert_eq!(skill.category, "General");
        assert_eq!(skill.current_version, 1);

        let versions = store.list_versions(skill.id).unwrap();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].version_number, 1);
        assert_eq!(versions[0].content_json, "{}");
        assert_eq!(versions[0].change_summary, "Initial version");
    }

    #[test]
    fn test_blank_name_rejected() {
        let store = store();
        let err = store.create_skill(NewSkill::named("   ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(store.list_skills().unwrap().is_empty());
    }

    #[test]
    fn test_versions_are_contiguous_and_monotonic() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        for i in 0..4 {
            let v = store.append_version(skill.id, version(&format!("c{}", i))).unwrap();
            assert_eq!(v.version_number, i + 2);
        }
        let numbers: Vec<i64> = store
            .list_versions(skill.id)
            .unwrap()
            .iter()
            .map(|v| v.version_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.get_skill(skill.id).unwrap().current_version, 5);
        assert_eq!(store.current_version(skill.id).unwrap().content_markdown, "c3");
    }

    #[test]
    fn test_stale_expected_version_conflicts() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        store.append_version_if_current(skill.id, Some(1), version("a")).unwrap();

        let err = store
            .append_version_if_current(skill.id, Some(1), version("b"))
            .unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict(_)));
        // Nothing was written by the losing append
        assert_eq!(store.list_versions(skill.id).unwrap().len(), 2);
    }

    #[test]
    fn test_old_versions_unchanged_after_append() {
        let store = store();
        let skill = store
            .create_skill(NewSkill {
                content_markdown: Some("original".into()),
                ..NewSkill::named("s")
            })
            .unwrap();
        let before = store.get_version(skill.id, 1).unwrap();
        store.append_version(skill.id, version("newer")).unwrap();
        assert_eq!(store.get_version(skill.id, 1).unwrap(), before);
    }

    #[test]
    fn test_versions_cannot_be_rewritten() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        let conn = store.db.lock().unwrap();
        let res = conn.execute(
            "UPDATE skill_version SET content_markdown = 'x' WHERE skill_id = ?1",
            params![skill.id],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_gap_in_history_is_integrity_error() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        {
            let conn = store.db.lock().unwrap();
            conn.execute(
                "INSERT INTO skill_version (skill_id, version_number, created_at) VALUES (?1, 3, 'x')",
                params![skill.id],
            )
            .unwrap();
        }
        let err = store.list_versions(skill.id).unwrap_err();
        assert!(matches!(err, Error::VersionIntegrity { .. }));
        let err = store.append_version(skill.id, version("x")).unwrap_err();
        assert!(matches!(err, Error::VersionIntegrity { .. }));

        // Other skills are unaffected
        let other = store.create_skill(NewSkill::named("other")).unwrap();
        assert_eq!(store.list_versions(other.id).unwrap().len(), 1);
    }

    #[test]
    fn test_update_meta_leaves_versions_alone() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        store.append_version(skill.id, version("a")).unwrap();

        let updated = store
            .update_skill_meta(
                skill.id,
                SkillUpdate {
                    name: Some("renamed".into()),
                    description: Some("desc".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(updated.description, "desc");
        assert_eq!(updated.current_version, 2);
        assert_eq!(store.list_versions(skill.id).unwrap().len(), 2);

        let err = store
            .update_skill_meta(skill.id, SkillUpdate { name: Some(" ".into()), ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_delete_cascades_versions_and_samples() {
        let store = store();
        let skill = store
            .create_skill_seeded(
                NewSkill::named("seeded"),
                &[NewSample { title: "one".into(), content: "text".into() }],
            )
            .unwrap();
        assert_eq!(store.list_samples(skill.id).unwrap().len(), 1);
        assert_eq!(store.get_version(skill.id, 1).unwrap().change_summary, SEEDED_SUMMARY);

        store.delete_skill(skill.id).unwrap();
        assert!(matches!(store.get_skill(skill.id), Err(Error::NotFound(_))));

        let conn = store.db.lock().unwrap();
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM skill_version", [], |r| r.get(0))
            .unwrap();
        let samples: i64 = conn
            .query_row("SELECT COUNT(*) FROM original_sample", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
        assert_eq!(samples, 0);
    }

    #[test]
    fn test_missing_lookups_are_not_found() {
        let store = store();
        assert!(matches!(store.delete_skill(42), Err(Error::NotFound(_))));
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        assert!(matches!(store.get_version(skill.id, 2), Err(Error::NotFound(_))));
        assert!(matches!(store.get_version(skill.id, 0), Err(Error::NotFound(_))));
        assert!(matches!(store.list_versions(99), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_list_orders_by_recent_update() {
        let store = store();
        let a = store.create_skill(NewSkill::named("a")).unwrap();
        let b = store.create_skill(NewSkill::named("b")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.append_version(a.id, version("bump")).unwrap();

        let ids: Vec<i64> = store.list_skills().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);
    }
    #[test]
    fn test_parallel_appends_leave_no_gaps() {
        let store = store();
        let skill_id = store.create_skill(NewSkill::named("shared")).unwrap().id;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.append_version(skill_id, version(&format!("t{}", i))).unwrap())
            })
            .collect();
        let mut numbers: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap().version_number).collect();
        numbers.sort();
        assert_eq!(numbers, (2..=17).collect::<Vec<_>>());

        let listed: Vec<i64> = store
            .list_versions(skill_id)
            .unwrap()
            .iter()
            .map(|v| v.version_number)
            .collect();
        assert_eq!(listed, (1..=17).collect::<Vec<_>>());
        assert_eq!(store.get_skill(skill_id).unwrap().current_version, 17);
    }

    #[test]
    fn test_locked_database_is_a_conflict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("savor.db");
        let db = Database::open(&path).unwrap();
        let store = SkillStore::new(db.clone());
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        db.lock().unwrap().busy_timeout(Duration::from_millis(50)).unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE;").unwrap();
        let err = store.append_version(skill.id, version("blocked")).unwrap_err();
        assert!(matches!(err, Error::ConcurrencyConflict(_)), "{:?}", err);

        other.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(store.append_version(skill.id, version("free")).unwrap().version_number, 2);
    }

    #[test]
    fn test_current_with_skill_matches_counter() {
        let store = store();
        let skill = store.create_skill(NewSkill::named("s")).unwrap();
        store.append_version(skill.id, version("v2")).unwrap();
        let (skill, current) = store.current_with_skill(skill.id).unwrap();
        assert_eq!(skill.current_version, 2);
        assert_eq!(current.version_number, 2);
        assert_eq!(current.content_markdown, "v2");
        assert!(matches!(store.current_with_skill(999), Err(Error::NotFound(_))));
    }
}
