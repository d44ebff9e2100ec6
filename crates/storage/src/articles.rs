use rusqlite::{params, Connection, OptionalExtension, Row};
use savor_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::{now_ts, sql_err, Database};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Draft,
    Editing,
    Published,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::Editing => "editing",
            ArticleStatus::Published => "published",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(ArticleStatus::Draft),
            "editing" => Some(ArticleStatus::Editing),
            "published" => Some(ArticleStatus::Published),
            _ => None,
        }
    }
}

/// A drafted article. `ai_generated_content` and `skill_version_used` are
/// frozen at creation; only the refined text and status change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub original_content: String,
    pub ai_generated_content: String,
    pub user_refined_content: String,
    pub skill_id: Option<i64>,
    pub skill_version_used: Option<i64>,
    pub status: ArticleStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Article {
    pub fn is_edited(&self) -> bool {
        self.user_refined_content != self.ai_generated_content
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewDraft {
    pub title: String,
    pub original_content: String,
    pub ai_generated_content: String,
    pub skill_id: Option<i64>,
    pub skill_version_used: Option<i64>,
}

const ARTICLE_COLUMNS: &str = "id, title, original_content, ai_generated_content, user_refined_content, \
     skill_id, skill_version_used, status, created_at, updated_at";

fn row_to_article(row: &Row) -> rusqlite::Result<Article> {
    let status: String = row.get(7)?;
    Ok(Article {
        id: row.get(0)?,
        title: row.get(1)?,
        original_content: row.get(2)?,
        ai_generated_content: row.get(3)?,
        user_refined_content: row.get(4)?,
        skill_id: row.get(5)?,
        skill_version_used: row.get(6)?,
        status: ArticleStatus::from_str(&status).unwrap_or(ArticleStatus::Draft),
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) fn load_article(conn: &Connection, article_id: i64) -> Result<Article> {
    conn.query_row(
        &format!("SELECT {} FROM article WHERE id = ?1", ARTICLE_COLUMNS),
        params![article_id],
        row_to_article,
    )
    .optional()
    .map_err(sql_err("Failed to load article"))?
    .ok_or_else(|| Error::NotFound(format!("article {}", article_id)))
}

#[derive(Clone)]
pub struct ArticleStore {
    db: Database,
}

impl ArticleStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store model output as both the frozen baseline and the first refined text.
    pub fn insert_draft(&self, draft: NewDraft) -> Result<Article> {
        let title = match draft.title.trim() {
            "" => "Untitled".to_string(),
            t => t.to_string(),
        };
        let now = now_ts();

        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO article (title, original_content, ai_generated_content, user_refined_content,
                                  skill_id, skill_version_used, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![
                title,
                draft.original_content,
                draft.ai_generated_content,
                draft.skill_id,
                draft.skill_version_used,
                ArticleStatus::Draft.as_str(),
                now
            ],
        )
        .map_err(sql_err("Failed to insert article"))?;
        let id = conn.last_insert_rowid();

        info!(
            article_id = id,
            skill_id = ?draft.skill_id,
            version = ?draft.skill_version_used,
            "Draft stored"
        );
        load_article(&conn, id)
    }

    /// Overwrite the refined text. The frozen baseline is never touched.
    pub fn save_edit(&self, article_id: i64, content: &str) -> Result<Article> {
        let conn = self.db.lock()?;
        let existing = load_article(&conn, article_id)?;

        let status = match existing.status {
            ArticleStatus::Published => ArticleStatus::Published,
            _ if content != existing.ai_generated_content => ArticleStatus::Editing,
            other => other,
        };

        conn.execute(
            "UPDATE article SET user_refined_content = ?1, status = ?2, updated_at = ?3 WHERE id = ?4",
            params![content, status.as_str(), now_ts(), article_id],
        )
        .map_err(sql_err("Failed to save article edit"))?;

        debug!(article_id, status = status.as_str(), "Article edit saved");
        load_article(&conn, article_id)
    }

    pub fn get_article(&self, article_id: i64) -> Result<Article> {
        let conn = self.db.lock()?;
        load_article(&conn, article_id)
    }

    /// Newest first, optionally restricted to one skill.
    pub fn list_articles(&self, skill_id: Option<i64>) -> Result<Vec<Article>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM article WHERE (?1 IS NULL OR skill_id = ?1)
                 ORDER BY created_at DESC, id DESC",
                ARTICLE_COLUMNS
            ))
            .map_err(sql_err("Failed to prepare article list"))?;
        let articles = stmt
            .query_map(params![skill_id], row_to_article)
            .map_err(sql_err("Failed to list articles"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(sql_err("Failed to read article row"))?;
        Ok(articles)
    }

    pub fn publish(&self, article_id: i64) -> Result<Article> {
        let conn = self.db.lock()?;
        load_article(&conn, article_id)?;
        conn.execute(
            "UPDATE article SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![ArticleStatus::Published.as_str(), now_ts(), article_id],
        )
        .map_err(sql_err("Failed to publish article"))?;
        info!(article_id, "Article published");
        load_article(&conn, article_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::{NewSkill, SkillStore};

    fn setup() -> (SkillStore, ArticleStore) {
        let db = Database::open_in_memory().unwrap();
        (SkillStore::new(db.clone()), ArticleStore::new(db))
    }

    fn draft(skill_id: Option<i64>, text: &str) -> NewDraft {
        NewDraft {
            title: "Post".into(),
            original_content: "topic".into(),
            ai_generated_content: text.into(),
            skill_id,
            skill_version_used: skill_id.map(|_| 1),
        }
    }

    #[test]
    fn test_insert_draft_mirrors_generated_text() {
        let (_, articles) = setup();
        let a = articles.insert_draft(draft(None, "Hello world.")).unwrap();
        assert_eq!(a.status, ArticleStatus::Draft);
        assert_eq!(a.ai_generated_content, "Hello world.");
        assert_eq!(a.user_refined_content, "Hello world.");
        assert!(!a.is_edited());
    }

    #[test]
    fn test_save_edit_keeps_baseline_frozen() {
        let (_, articles) = setup();
        let a = articles.insert_draft(draft(None, "Hello world.")).unwrap();

        let edited = articles.save_edit(a.id, "Hi world.").unwrap();
        assert_eq!(edited.status, ArticleStatus::Editing);
        assert_eq!(edited.user_refined_content, "Hi world.");
        assert_eq!(edited.ai_generated_content, "Hello world.");

        let again = articles.save_edit(a.id, "Hey world.").unwrap();
        assert_eq!(again.ai_generated_content, "Hello world.");
        assert_eq!(again.skill_version_used, None);
    }

    #[test]
    fn test_frozen_columns_rejected_at_storage_level() {
        let (_, articles) = setup();
        let a = articles.insert_draft(draft(None, "x")).unwrap();
        let conn = articles.db.lock().unwrap();
        let res = conn.execute(
            "UPDATE article SET ai_generated_content = 'y' WHERE id = ?1",
            params![a.id],
        );
        assert!(res.is_err());
    }

    #[test]
    fn test_published_stays_published() {
        let (_, articles) = setup();
        let a = articles.insert_draft(draft(None, "x")).unwrap();
        articles.publish(a.id).unwrap();
        let after = articles.save_edit(a.id, "changed").unwrap();
        assert_eq!(after.status, ArticleStatus::Published);
    }

    #[test]
    fn test_article_survives_skill_delete() {
        let (skills, articles) = setup();
        let skill = skills.create_skill(NewSkill::named("s")).unwrap();
        let a = articles.insert_draft(draft(Some(skill.id), "frozen")).unwrap();

        skills.delete_skill(skill.id).unwrap();
        let after = articles.get_article(a.id).unwrap();
        assert_eq!(after.skill_id, None);
        assert_eq!(after.skill_version_used, Some(1));
        assert_eq!(after.ai_generated_content, "frozen");
    }

    #[test]
    fn test_list_filters_by_skill() {
        let (skills, articles) = setup();
        let skill = skills.create_skill(NewSkill::named("s")).unwrap();
        let first = articles.insert_draft(draft(Some(skill.id), "a")).unwrap();
        articles.insert_draft(draft(None, "b")).unwrap();
        let third = articles.insert_draft(draft(Some(skill.id), "c")).unwrap();

        assert_eq!(articles.list_articles(None).unwrap().len(), 3);
        let ids: Vec<i64> = articles
            .list_articles(Some(skill.id))
            .unwrap()
            .iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec![third.id, first.id]);
    }

    #[test]
    fn test_missing_article() {
        let (_, articles) = setup();
        assert!(matches!(articles.get_article(5), Err(Error::NotFound(_))));
        assert!(matches!(articles.save_edit(5, "x"), Err(Error::NotFound(_))));
    }
}
