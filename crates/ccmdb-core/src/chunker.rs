//! Paragraph-boundary chunker.
//!
//! Splits a document on blank lines, keeps short paragraphs whole, and
//! slides a word window with overlap across long ones. Offsets are byte
//! ranges into the parent text, so `doc.text[start..end] == chunk.text`.

use crate::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Approximate token budget per chunk. Tokens are estimated from
    /// whitespace-separated words at ~0.75 words per token.
    pub max_tokens: usize,
    /// Fraction of the word window repeated between adjacent chunks of
    /// a long paragraph.
    pub overlap_percent: f32,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 500, overlap_percent: 0.1 }
    }
}

#[derive(Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut chunk_index = 0usize;
        for (para_start, paragraph) in paragraphs(&doc.text) {
            if estimate_tokens(paragraph) <= self.config.max_tokens {
                chunks.push(self.make_chunk(
                    doc,
                    chunk_index,
                    para_start,
                    para_start + paragraph.len(),
                    paragraph,
                ));
                chunk_index += 1;
            } else {
                for (sub_start, sub_end) in self.window_spans(paragraph) {
                    chunks.push(self.make_chunk(
                        doc,
                        chunk_index,
                        para_start + sub_start,
                        para_start + sub_end,
                        &paragraph[sub_start..sub_end],
                    ));
                    chunk_index += 1;
                }
            }
        }
        let total = chunks.len();
        for c in &mut chunks {
            c.total_chunks = total;
        }
        chunks
    }

    fn make_chunk(
        &self,
        doc: &Document,
        chunk_index: usize,
        start: usize,
        end: usize,
        text: &str,
    ) -> Chunk {
        Chunk {
            id: format!("{}:{}", doc.id, chunk_index),
            doc_id: doc.id.clone(),
            start,
            end,
            text: text.to_string(),
            embedding: None,
            chunk_index,
            total_chunks: 0,
            meta: doc.meta.clone(),
        }
    }

    /// Byte spans of overlapping word windows within one long paragraph.
    fn window_spans(&self, paragraph: &str) -> Vec<(usize, usize)> {
        let words = word_spans(paragraph);
        let words_per_chunk = ((self.config.max_tokens as f32) * 0.75).max(1.0) as usize;
        let overlap = ((words_per_chunk as f32) * self.config.overlap_percent) as usize;
        let step = words_per_chunk.saturating_sub(overlap).max(1);

        let mut spans = Vec::new();
        let mut start = 0usize;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            spans.push((words[start].0, words[end - 1].1));
            if end >= words.len() {
                break;
            }
            start += step;
        }
        spans
    }
}

fn estimate_tokens(text: &str) -> usize {
    let word_count = text.split_whitespace().count();
    (word_count as f32 / 0.75) as usize
}

/// Trimmed paragraphs with their byte offsets into `text`.
fn paragraphs(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    for raw in text.split("\n\n") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let lead = raw.len() - raw.trim_start().len();
            out.push((offset + lead, trimmed));
        }
        offset += raw.len() + 2;
    }
    out
}

/// Byte spans of whitespace-separated words.
fn word_spans(s: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in s.char_indices() {
        if c.is_whitespace() {
            if let Some(b) = start.take() {
                spans.push((b, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(b) = start {
        spans.push((b, s.len()));
    }
    spans
}
