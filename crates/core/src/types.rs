use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: Option<String>,
    pub finish_reason: String,
    pub usage: serde_json::Value,
}

impl Default for LLMResponse {
    fn default() -> Self {
        Self {
            content: None,
            finish_reason: String::new(),
            usage: serde_json::Value::Null,
        }
    }
}

/// Tag of one diff chunk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeTag {
    Equal,
    Delete,
    Insert,
}

impl ChangeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeTag::Equal => "equal",
            ChangeTag::Delete => "delete",
            ChangeTag::Insert => "insert",
        }
    }

    /// Prefix used in unified-style summaries.
    pub fn sign(&self) -> char {
        match self {
            ChangeTag::Equal => ' ',
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
        }
    }
}

/// One tagged segment of an edit script.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiffChunk {
    pub tag: ChangeTag,
    pub value: String,
}

impl DiffChunk {
    pub fn new(tag: ChangeTag, value: impl Into<String>) -> Self {
        Self {
            tag,
            value: value.into(),
        }
    }

    pub fn equal(value: impl Into<String>) -> Self {
        Self::new(ChangeTag::Equal, value)
    }

    pub fn delete(value: impl Into<String>) -> Self {
        Self::new(ChangeTag::Delete, value)
    }

    pub fn insert(value: impl Into<String>) -> Self {
        Self::new(ChangeTag::Insert, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_serializes_with_lowercase_tag() {
        let chunk = DiffChunk::delete("old\n");
        let json = serde_json::to_string(&chunk).unwrap();
        assert_eq!(json, r#"{"tag":"delete","value":"old\n"}"#);
        let back: DiffChunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
