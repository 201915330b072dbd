//! Recursive character text splitter.
//!
//! Splits document content into overlapping chunks of at most
//! `chunk_size` characters. Boundaries are chosen from a priority-ordered
//! separator list (paragraph break, line break, space, and finally the
//! empty string, which splits between characters).
//!
//! # Algorithm
//!
//! 1. Pick the first separator that occurs in the text (or `""`).
//! 2. Split on it, keeping each separator at the start of the piece that
//!    follows it.
//! 3. Pieces shorter than `chunk_size` are buffered; longer pieces flush
//!    the buffer and are split again with the remaining separators.
//! 4. Buffered pieces are merged greedily into chunks. When a chunk is
//!    emitted, pieces are dropped from the front of the window until at
//!    most `chunk_overlap` characters remain, so neighbouring chunks share
//!    that tail.
//! 5. Every emitted chunk is whitespace-trimmed; empty chunks are dropped.
//!
//! Lengths are counted in `char`s, never bytes.
//!
//! # Example
//!
//! ```rust
//! use jql_analyzer::chunk::TextSplitter;
//!
//! let splitter = TextSplitter::new(10, 5).unwrap();
//! let chunks = splitter.split_text("aaaa bbbb cccc");
//! assert_eq!(chunks, vec!["aaaa bbbb", "bbbb cccc"]);
//! ```

use anyhow::{bail, Result};
use std::collections::VecDeque;

use crate::models::Document;

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between neighbouring chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators in priority order.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text into bounded, overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter {
    /// Create a splitter with the default separator list.
    ///
    /// # Errors
    ///
    /// Fails when `chunk_size` is zero or `chunk_overlap` exceeds it.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if chunk_overlap > chunk_size {
            bail!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                chunk_overlap,
                chunk_size
            );
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split a single text into chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document, copying the parent's metadata onto each chunk.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.content)
                    .into_iter()
                    .map(move |chunk| Document::new(chunk, doc.metadata.clone()))
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }
                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }

        merged
    }
}

/// Split `text` on `separator`, attaching each separator to the piece
/// after it. An empty separator splits between characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
