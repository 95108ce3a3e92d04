//! Overlapping text chunking

use serde::{Deserialize, Serialize};

use rnr_core::{Error, Result};

/// Separators tried in order before falling back to a hard cut
pub const DEFAULT_SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A window of the source text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub text: String,
    /// Offset of the first character, counted in chars
    pub start_index: usize,
}

/// Splits text into windows of at most `chunk_size` chars.
///
/// Adjacent windows share exactly `chunk_overlap` chars and together cover the whole
/// text. A window is shortened to end right after a separator when that keeps it at
/// least half full.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be positive".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap, chunk_size
            )));
        }

        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators.into_iter().filter(|s| !s.is_empty()).collect();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    pub fn split(&self, text: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            let mut end = (start + self.chunk_size).min(chars.len());
            if end < chars.len() {
                if let Some(snapped) = self.snap_to_separator(&chars, start, end) {
                    end = snapped;
                }
            }

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                start_index: start,
            });

            if end >= chars.len() {
                break;
            }

            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Latest end position in `(start, end]` that sits right after a separator
    fn snap_to_separator(&self, chars: &[char], start: usize, end: usize) -> Option<usize> {
        let lowest = (start + self.chunk_size / 2).max(start + self.chunk_overlap + 1);

        for separator in &self.separators {
            let sep: Vec<char> = separator.chars().collect();
            if sep.len() > end - start {
                continue;
            }

            let mut candidate = end;
            while candidate >= lowest && candidate >= start + sep.len() {
                if chars[candidate - sep.len()..candidate] == sep[..] {
                    return Some(candidate);
                }
                candidate -= 1;
            }
        }

        None
    }
}
