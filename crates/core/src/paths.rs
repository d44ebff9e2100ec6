use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".savor"))
            .unwrap_or_else(|| PathBuf::from(".savor"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.base.join("data")
    }

    pub fn db_file(&self) -> PathBuf {
        self.data_dir().join("savor.db")
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.base.join("exports")
    }

    /// Safe file name for an exported skill, e.g. `tech-reviews-v3.md`.
    pub fn export_file(&self, skill_name: &str, version: i64, extension: &str) -> PathBuf {
        let slug: String = skill_name
            .trim()
            .chars()
            .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        let slug = slug.trim_matches('-');
        let slug = if slug.is_empty() { "skill" } else { slug };
        self.exports_dir()
            .join(format!("{}-v{}.{}", slug, version, extension))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_base() {
        let paths = Paths::with_base(PathBuf::from("/tmp/savor-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/savor-test/config.json"));
        assert_eq!(paths.db_file(), PathBuf::from("/tmp/savor-test/data/savor.db"));
    }

    #[test]
    fn test_export_file_slug() {
        let paths = Paths::with_base(PathBuf::from("/x"));
        assert_eq!(
            paths.export_file("Tech Reviews", 3, "md"),
            PathBuf::from("/x/exports/tech-reviews-v3.md")
        );
        assert_eq!(
            paths.export_file("  ", 1, "json"),
            PathBuf::from("/x/exports/skill-v1.json")
        );
    }
}
