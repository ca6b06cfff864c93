
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ChatError, Result};

/// A passage produced by the word-window splitter, the unit of embedding
/// and retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of this chunk within its document.
    pub seq: usize,
    /// The passage text, window words joined by single spaces.
    pub text: String,
    /// Number of words in the window.
    pub word_count: usize,
}

/// Configuration for document chunking, in whitespace-delimited words.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in words.
    pub chunk_size: usize,
    /// Words shared between consecutive windows. Must be strictly smaller
    /// than `chunk_size` or the window never advances.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

impl ChunkingConfig {
    /// Window advance per step.
    #[inline]
    pub fn stride(&self) -> Result<usize> {
        if self.chunk_size == 0 {
            return Err(ChatError::Config(
                "Chunk size must be greater than zero".to_string(),
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(ChatError::Config(format!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.overlap, self.chunk_size
            )));
        }

        Ok(self.chunk_size - self.overlap)
    }
}

/// Split text into overlapping word windows.
///
/// Slides a `chunk_size`-word window forward by `chunk_size - overlap` words
/// per step until the window start passes the end of the text. Text shorter
/// than one window yields a single chunk; empty text yields none.
/// Deterministic and side-effect free.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let stride = config.stride()?;
    let words: Vec<&str> = text.split_whitespace().collect();

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < words.len() {
        let end = (start + config.chunk_size).min(words.len());
        let window = &words[start..end];

        chunks.push(Chunk {
            seq: chunks.len(),
            text: window.join(" "),
            word_count: window.len(),
        });

        start += stride;
    }

    debug!(
        "Split {} words into {} chunks (window {}, overlap {})",
        words.len(),
        chunks.len(),
        config.chunk_size,
        config.overlap
    );

    Ok(chunks)
}
