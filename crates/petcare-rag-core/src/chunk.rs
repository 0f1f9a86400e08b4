//! Recursive boundary-aware text chunker.
//!
//! Splits a [`Document`] into [`Chunk`]s of at most `chunk_size` characters,
//! preferring the largest semantic boundary available, with consecutive
//! chunks sharing up to `overlap` characters of context.
//!
//! Each chunk receives a deterministic UUIDv5 derived from its source and
//! index, plus a SHA-256 hash of its text.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `"\n\n"`, `"\n"`, `". "`, `" "`, `""`
//!    (paragraph, line, sentence, word, character) that occurs in the text.
//! 2. Split on it, keeping the separator at the start of the following piece.
//! 3. Pieces shorter than `chunk_size` are merged greedily into a window. When
//!    the next piece would overflow the window, the window is emitted as a
//!    chunk and pieces are dropped from its front until at most `overlap`
//!    characters remain; those carry over into the next chunk.
//! 4. Pieces of `chunk_size` or more are split recursively with the
//!    remaining, finer separators.
//! 5. Chunks are whitespace-trimmed; empty chunks are dropped.
//!
//! Lengths are counted in `char`s, so multi-byte scripts are measured the
//! same way as ASCII.
//!
//! # Example
//!
//! ```rust
//! use petcare_rag_core::chunk::{chunk_document, ChunkParams};
//! use petcare_rag_core::models::Document;
//!
//! let doc = Document::new("dogs.txt", "Dogs need daily walks.\n\nAnd fresh water.");
//! let chunks = chunk_document(&doc, ChunkParams::default());
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use std::collections::VecDeque;

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Boundaries tried in order, coarsest first.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// Namespace for record identifiers.
const RECORD_NAMESPACE: Uuid = Uuid::from_u128(0x6a1f_3c52_9e7d_4b0a_8f21_5d3e_c4b7_a901);

/// Chunking parameters, both measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split a document into ordered chunks.
///
/// Indices are contiguous from 0. An empty or whitespace-only document
/// yields no chunks.
pub fn chunk_document(doc: &Document, params: ChunkParams) -> Vec<Chunk> {
    split_text(&doc.content, params)
        .into_iter()
        .enumerate()
        .map(|(i, text)| make_chunk(&doc.source, i as i64, text))
        .collect()
}

/// Split raw text into chunk strings without building [`Chunk`]s.
pub fn split_text(text: &str, params: ChunkParams) -> Vec<String> {
    let chunk_size = params.chunk_size.max(1);
    let splitter = Splitter {
        chunk_size,
        overlap: params.overlap.min(chunk_size - 1),
    };
    splitter.split(text, SEPARATORS)
}

/// Deterministic record identifier for the `index`-th chunk of `source`.
pub fn record_id(source: &str, index: i64) -> String {
    let name = format!("{}#{}", source, index);
    Uuid::new_v5(&RECORD_NAMESPACE, name.as_bytes()).to_string()
}

/// Hex-encoded SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

struct Splitter {
    chunk_size: usize,
    overlap: usize,
}

impl Splitter {
    fn split(&self, text: &str, separators: &[&'static str]) -> Vec<String> {
        let (separator, finer) = pick_separator(text, separators);
        let mut out = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                out.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut out, piece);
            } else {
                out.extend(self.split(piece, finer));
            }
        }

        if !small.is_empty() {
            out.extend(self.merge(&small));
        }
        out
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
        chunks
    }
}

fn pick_separator<'s>(
    text: &str,
    separators: &'s [&'static str],
) -> (&'static str, &'s [&'static str]) {
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            return (sep, &[]);
        }
        if text.contains(sep) {
            return (sep, &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, attaching each separator to the piece after it.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
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

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(source: &str, index: i64, text: String) -> Chunk {
    Chunk {
        id: record_id(source, index),
        source: source.to_string(),
        chunk_index: index,
        hash: content_hash(&text),
        content: text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize) -> ChunkParams {
        ChunkParams {
            chunk_size,
            overlap,
        }
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let doc = Document::new("dogs.txt", "Dogs need daily walks and fresh water.");
        let chunks = chunk_document(&doc, ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].content, "Dogs need daily walks and fresh water.");
        assert_eq!(chunks[0].source, "dogs.txt");
    }

    #[test]
    fn test_empty_and_blank_text() {
        assert!(chunk_document(&Document::new("a.txt", ""), ChunkParams::default()).is_empty());
        assert!(
            chunk_document(&Document::new("a.txt", "  \n\n \t"), ChunkParams::default())
                .is_empty()
        );
    }

    #[test]
    fn test_chunks_respect_size_and_indices_contiguous() {
        let doc = Document::new("long.txt", numbered_words(300));
        let chunks = chunk_document(&doc, params(100, 30));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64, "Index mismatch at position {}", i);
            assert!(c.content.chars().count() <= 100);
        }
    }

    #[test]
    fn test_adjacent_chunks_overlap() {
        let overlap = 30;
        let doc = Document::new("long.txt", numbered_words(200));
        let chunks = chunk_document(&doc, params(100, overlap));
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let (prev, next) = (&pair[0].content, &pair[1].content);
            let shared = (1..=prev.len().min(next.len()))
                .rev()
                .find(|&n| next.starts_with(&prev[prev.len() - n..]))
                .expect("adjacent chunks should share an overlap");
            assert!(shared <= overlap, "overlap {} exceeds {}", shared, overlap);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "a".repeat(60);
        let second = "b".repeat(60);
        let doc = Document::new("p.txt", format!("{}\n\n{}", first, second));
        let chunks = chunk_document(&doc, params(100, 10));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content, first);
        assert_eq!(chunks[1].content, second);
    }

    #[test]
    fn test_unbroken_text_falls_back_to_characters() {
        let doc = Document::new("x.txt", "x".repeat(250));
        let chunks = chunk_document(&doc, params(100, 20));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].content.len(), 100);
        assert_eq!(chunks[1].content.len(), 100);
        assert_eq!(chunks[2].content.len(), 90);
    }

    #[test]
    fn test_multibyte_text_measured_in_chars() {
        let text = "สุนัขต้องการการเดินทุกวัน ".repeat(40);
        let doc = Document::new("th.txt", text);
        let chunks = chunk_document(&doc, params(120, 20));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.content.chars().count() <= 120);
        }
    }

    #[test]
    fn test_deterministic() {
        let doc = Document::new("d.txt", format!("Alpha.\n\nBeta. {}", numbered_words(80)));
        let c1 = chunk_document(&doc, params(90, 25));
        let c2 = chunk_document(&doc, params(90, 25));
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_record_id_depends_on_source_and_index() {
        assert_eq!(record_id("dogs.txt", 0), record_id("dogs.txt", 0));
        assert_ne!(record_id("dogs.txt", 0), record_id("dogs.txt", 1));
        assert_ne!(record_id("dogs.txt", 0), record_id("cats.txt", 0));
    }

    #[test]
    fn test_hash_matches_content() {
        let doc = Document::new("h.txt", "Fresh water every day.");
        let chunks = chunk_document(&doc, ChunkParams::default());
        assert_eq!(chunks[0].hash, content_hash("Fresh water every day."));
        assert_eq!(chunks[0].hash.len(), 64);
    }
}
