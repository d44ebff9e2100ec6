use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Diff requested on identical texts.
    #[error("No changes: original and modified text are identical")]
    NoChanges,

    /// Evolution retried on a diff record that already produced a version.
    #[error("Diff record {0} has already been applied to its skill")]
    AlreadyApplied(i64),

    #[error("Generation failed: {0}")]
    Generation(String),

    /// The diff record (if any) was persisted with empty analysis fields and
    /// can be re-analyzed later.
    #[error("Analysis failed: {message}")]
    AnalysisFailed {
        message: String,
        diff_record_id: Option<i64>,
    },

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// Persisted version history of a skill is inconsistent. Operations on
    /// that skill must stop; other skills are unaffected.
    #[error("Version integrity violated for skill {skill_id}: {detail}")]
    VersionIntegrity { skill_id: i64, detail: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Stable discriminant for status lines and machine-readable output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation_failed",
            Error::NoChanges => "no_changes",
            Error::AlreadyApplied(_) => "already_applied",
            Error::Generation(_) => "generation_failed",
            Error::AnalysisFailed { .. } => "analysis_failed",
            Error::ConcurrencyConflict(_) => "concurrency_conflict",
            Error::VersionIntegrity { .. } => "version_integrity",
            Error::Provider(_) => "provider",
            Error::Storage(_) => "storage",
            Error::Other(_) => "other",
        }
    }

    pub fn analysis_failed(message: impl Into<String>) -> Self {
        Error::AnalysisFailed {
            message: message.into(),
            diff_record_id: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
