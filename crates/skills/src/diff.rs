use savor_core::config::DiffGranularity;
use savor_core::{ChangeTag, DiffChunk};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, TextDiff};

/// Computes ordered edit scripts between two texts.
///
/// Chunking is deterministic: same-tag tokens are coalesced, and inside
/// every run of changes all deleted text comes first as one `delete`
/// chunk, followed by all inserted text as one `insert` chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffEngine {
    granularity: DiffGranularity,
}

impl DiffEngine {
    pub fn new(granularity: DiffGranularity) -> Self {
        Self { granularity }
    }

    pub fn granularity(&self) -> DiffGranularity {
        self.granularity
    }

    pub fn diff(&self, original: &str, modified: &str) -> Vec<DiffChunk> {
        let mut config = TextDiff::configure();
        config.algorithm(Algorithm::Myers);
        let diff = match self.granularity {
            DiffGranularity::Line => config.diff_lines(original, modified),
            DiffGranularity::Word => config.diff_words(original, modified),
            DiffGranularity::Char => config.diff_chars(original, modified),
        };

        let mut builder = ChunkBuilder::default();
        for change in diff.iter_all_changes() {
            let tag = match change.tag() {
                similar::ChangeTag::Equal => ChangeTag::Equal,
                similar::ChangeTag::Delete => ChangeTag::Delete,
                similar::ChangeTag::Insert => ChangeTag::Insert,
            };
            builder.push(tag, change.value());
        }
        builder.finish()
    }
}

#[derive(Default)]
struct ChunkBuilder {
    chunks: Vec<DiffChunk>,
    equal: String,
    deleted: String,
    inserted: String,
}

impl ChunkBuilder {
    fn push(&mut self, tag: ChangeTag, value: &str) {
        match tag {
            ChangeTag::Equal => {
                self.flush_changes();
                self.equal.push_str(value);
            }
            ChangeTag::Delete => {
                self.flush_equal();
                self.deleted.push_str(value);
            }
            ChangeTag::Insert => {
                self.flush_equal();
                self.inserted.push_str(value);
            }
        }
    }

    fn flush_equal(&mut self) {
        if !self.equal.is_empty() {
            self.chunks.push(DiffChunk::equal(std::mem::take(&mut self.equal)));
        }
    }

    fn flush_changes(&mut self) {
        if !self.deleted.is_empty() {
            self.chunks.push(DiffChunk::delete(std::mem::take(&mut self.deleted)));
        }
        if !self.inserted.is_empty() {
            self.chunks.push(DiffChunk::insert(std::mem::take(&mut self.inserted)));
        }
    }

    fn finish(mut self) -> Vec<DiffChunk> {
        self.flush_equal();
        self.flush_changes();
        self.chunks
    }
}

/// Concatenation of `equal` and `delete` chunks.
pub fn reconstruct_original(chunks: &[DiffChunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.tag != ChangeTag::Insert)
        .map(|c| c.value.as_str())
        .collect()
}

/// Concatenation of `equal` and `insert` chunks.
pub fn reconstruct_modified(chunks: &[DiffChunk]) -> String {
    chunks
        .iter()
        .filter(|c| c.tag != ChangeTag::Delete)
        .map(|c| c.value.as_str())
        .collect()
}

/// Unified-style rendering: every line prefixed with ` `, `-` or `+`.
pub fn render_summary(chunks: &[DiffChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        for line in chunk.value.lines() {
            out.push(chunk.tag.sign());
            out.push(' ');
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub unchanged: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl DiffStats {
    /// Character counts per tag.
    pub fn from_chunks(chunks: &[DiffChunk]) -> Self {
        let mut stats = Self::default();
        for chunk in chunks {
            let n = chunk.value.chars().count();
            match chunk.tag {
                ChangeTag::Equal => stats.unchanged += n,
                ChangeTag::Delete => stats.deleted += n,
                ChangeTag::Insert => stats.inserted += n,
            }
        }
        stats
    }

    pub fn is_unchanged(&self) -> bool {
        self.deleted == 0 && self.inserted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engines() -> [DiffEngine; 3] {
        [
            DiffEngine::new(DiffGranularity::Line),
            DiffEngine::new(DiffGranularity::Word),
            DiffEngine::new(DiffGranularity::Char),
        ]
    }

    fn assert_round_trip(original: &str, modified: &str) {
        for engine in engines() {
            let chunks = engine.diff(original, modified);
            assert_eq!(reconstruct_original(&chunks), original, "{:?}", engine.granularity());
            assert_eq!(reconstruct_modified(&chunks), modified, "{:?}", engine.granularity());
            assert!(chunks.iter().all(|c| !c.value.is_empty()));
        }
    }

    #[test]
    fn test_round_trip_reconstructs_both_sides() {
        assert_round_trip("Hello world.", "Hi world.");
        assert_round_trip("line one\nline two\n", "line one\nline 2\nline three\n");
        assert_round_trip("", "brand new text");
        assert_round_trip("all gone", "");
        assert_round_trip("标题\n正文内容\n", "标题\n修改后的正文\n");
        assert_round_trip("no trailing newline", "no trailing newline\n");
    }

    #[test]
    fn test_empty_and_identical_inputs() {
        for engine in engines() {
            assert!(engine.diff("", "").is_empty());
            assert_eq!(engine.diff("same\ntext", "same\ntext"), vec![DiffChunk::equal("same\ntext")]);
        }
    }

    #[test]
    fn test_char_diff_of_greeting_edit() {
        let engine = DiffEngine::new(DiffGranularity::Char);
        let chunks = engine.diff("Hello world.", "Hi world.");
        assert!(chunks.iter().any(|c| c.tag == ChangeTag::Delete));
        assert!(chunks.iter().any(|c| c.tag == ChangeTag::Insert));
        assert_eq!(chunks.first().map(|c| c.value.as_str()), Some("H"));
        assert_eq!(chunks.last(), Some(&DiffChunk::equal(" world.")));
    }

    #[test]
    fn test_delete_precedes_insert_and_tags_alternate() {
        let engine = DiffEngine::new(DiffGranularity::Word);
        let chunks = engine.diff("the quick brown fox jumps", "the slow red fox leaps");
        for pair in chunks.windows(2) {
            assert_ne!(pair[0].tag, pair[1].tag, "adjacent chunks must differ: {:?}", chunks);
            assert!(
                !(pair[0].tag == ChangeTag::Insert && pair[1].tag == ChangeTag::Delete),
                "insert before delete: {:?}",
                chunks
            );
        }
    }

    #[test]
    fn test_line_diff_is_deterministic() {
        let engine = DiffEngine::default();
        let a = "a\nb\nc\nd\n";
        let b = "a\nx\nc\ny\nd\n";
        assert_eq!(engine.diff(a, b), engine.diff(a, b));
        assert_eq!(
            engine.diff(a, b),
            vec![
                DiffChunk::equal("a\n"),
                DiffChunk::delete("b\n"),
                DiffChunk::insert("x\n"),
                DiffChunk::equal("c\n"),
                DiffChunk::insert("y\n"),
                DiffChunk::equal("d\n"),
            ]
        );
    }

    #[test]
    fn test_render_summary_and_stats() {
        let chunks = vec![
            DiffChunk::equal("keep\n"),
            DiffChunk::delete("old\n"),
            DiffChunk::insert("new\n"),
        ];
        assert_eq!(render_summary(&chunks), "  keep\n- old\n+ new\n");

        let stats = DiffStats::from_chunks(&chunks);
        assert_eq!(stats, DiffStats { unchanged: 5, deleted: 4, inserted: 4 });
        assert!(!stats.is_unchanged());
    }
}
