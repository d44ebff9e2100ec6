pub mod articles;
pub mod db;
pub mod diffs;
pub mod skills;

pub use articles::{Article, ArticleStatus, ArticleStore, NewDraft};
pub use db::Database;
pub use diffs::{DiffRecord, DiffStore, NewDiffRecord};
pub use skills::{NewSample, NewSkill, NewVersion, OriginalSample, Skill, SkillStore, SkillUpdate, SkillVersion};
