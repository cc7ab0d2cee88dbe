//! Text chunking into overlapping paragraph windows.
//!
//! Lines are grouped into line-groups of at most `lines_per_split` lines,
//! line-groups are packed into paragraphs of at most `tokens_per_paragraph`
//! whitespace tokens, and paragraphs form sliding windows of 3 with stride 2.
//! Each window is ingested independently; the single-paragraph overlap keeps
//! entities that straddle a boundary extractable from both sides.

use std::collections::HashSet;

use graphloom_core::config::ChunkerConfig;

/// Splits input text into overlapping paragraph windows.
pub struct TextChunker {
    lines_per_split: usize,
    tokens_per_paragraph: usize,
}

const WINDOW_SIZE: usize = 3;
const WINDOW_STRIDE: usize = 2;

impl TextChunker {
    pub fn new(config: &ChunkerConfig) -> Self {
        Self {
            lines_per_split: config.lines_per_split.max(1),
            tokens_per_paragraph: config.tokens_per_paragraph.max(1),
        }
    }

    /// Produce the ordered list of window texts. Duplicate windows are
    /// suppressed, first occurrence wins.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let paragraphs = self.paragraphs(text);
        if paragraphs.is_empty() {
            return Vec::new();
        }

        if paragraphs.len() <= WINDOW_SIZE {
            return vec![paragraphs.join("\n")];
        }

        let mut windows = Vec::new();
        let mut seen = HashSet::new();
        let mut start = 0;
        loop {
            let end = (start + WINDOW_SIZE).min(paragraphs.len());
            let window = paragraphs[start..end].join("\n");
            if seen.insert(window.clone()) {
                windows.push(window);
            }
            if end == paragraphs.len() {
                break;
            }
            start += WINDOW_STRIDE;
        }
        windows
    }

    /// Group lines, then pack line-groups into token-bounded paragraphs.
    fn paragraphs(&self, text: &str) -> Vec<String> {
        let lines: Vec<&str> = text.lines().collect();
        let groups: Vec<String> = lines
            .chunks(self.lines_per_split)
            .map(|chunk| chunk.join("\n"))
            .filter(|g| !g.trim().is_empty())
            .collect();

        let mut paragraphs = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_tokens = 0usize;

        for group in groups {
            let group_tokens = group.split_whitespace().count();
            if !current.is_empty() && current_tokens + group_tokens > self.tokens_per_paragraph {
                paragraphs.push(current.join("\n"));
                current.clear();
                current_tokens = 0;
            }
            current.push(group);
            current_tokens += group_tokens;
        }
        if !current.is_empty() {
            paragraphs.push(current.join("\n"));
        }

        paragraphs
    }
}
