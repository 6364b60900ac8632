//! Fixed-size overlapping word windows.
//!
//! With `step = chunk_size - overlap`, a window starts at every
//! `0, step, 2 * step, ...` below the word count and covers
//! `[start, start + chunk_size)`, clipped to the end. That gives
//! `ceil(n / step)` windows for `n > 0` words; trailing windows that start
//! inside the last `overlap` words are still emitted. Empty input yields a
//! single empty window.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in words.
    pub chunk_size: usize,
    /// Words shared by consecutive windows.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.overlap >= self.chunk_size {
            return Err(Error::ChunkingConfig { chunk_size: self.chunk_size, overlap: self.overlap });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Rejects `overlap >= chunk_size`, which would never advance.
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            words: text.split_whitespace().collect(),
            size: self.config.chunk_size,
            step: self.config.chunk_size - self.config.overlap,
            start: 0,
            done: false,
        }
    }
}

/// Convenience wrapper collecting all windows of `text`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let chunker = Chunker::new(ChunkingConfig { chunk_size, overlap })?;
    Ok(chunker.chunks(text).collect())
}

/// Lazy window iterator. Cloning yields an independent iterator from the
/// same position.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    words: Vec<&'a str>,
    size: usize,
    step: usize,
    start: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        if self.words.is_empty() {
            self.done = true;
            return Some(String::new());
        }
        let end = (self.start + self.size).min(self.words.len());
        let chunk = self.words[self.start..end].join(" ");
        self.start += self.step;
        self.done = self.start >= self.words.len();
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match (self.done, self.words.len()) {
            (true, _) => 0,
            (false, 0) => 1,
            (false, n) => (n - self.start).div_ceil(self.step),
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}
