use std::collections::VecDeque;

use super::types::{Chunk, Document};

#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Maximum chunk length, in characters.
    pub chunk_size: usize,
    /// Characters of trailing context carried into the next chunk.
    pub chunk_overlap: usize,
    /// Tried in order; the first one present in the text is used, coarser pieces recurse.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 20,
            separators: ["\n\n", "\n", " ", ""].map(str::to_owned).to_vec(),
        }
    }
}

/// Recursive character splitter: paragraphs first, then lines, words and finally characters.
pub struct TextSplitter {
    config: SplitterConfig,
}

impl TextSplitter {
    #[must_use]
    pub fn new(mut config: SplitterConfig) -> Self {
        config.chunk_size = config.chunk_size.max(1);
        if config.chunk_overlap >= config.chunk_size {
            tracing::warn!(
                chunk_size = config.chunk_size,
                chunk_overlap = config.chunk_overlap,
                "chunk overlap must be smaller than chunk size, clamping"
            );
            config.chunk_overlap = config.chunk_size - 1;
        }
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SplitterConfig {
        &self.config
    }

    #[must_use]
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.content)
            .into_iter()
            .enumerate()
            .map(|(i, content)| Chunk {
                content,
                metadata: document.metadata.clone(),
                chunk_index: i,
            })
            .collect()
    }

    /// Split every document, preserving document order.
    #[must_use]
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|doc| self.split(doc)).collect()
    }

    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.config.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut finer: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = "";
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_keep_start(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_owned());
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily pack pieces shorter than `chunk_size` into chunks, keeping up to
    /// `chunk_overlap` characters of the previous chunk's tail.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;
        for &piece in pieces {
            let len = char_len(piece);
            if total + len > size && !window.is_empty() {
                push_joined(&mut chunks, &window);
                while total > overlap || (total + len > size && total > 0) {
                    let Some((_, front)) = window.pop_front() else {
                        break;
                    };
                    total -= front;
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        push_joined(&mut chunks, &window);
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_owned());
    }
}

/// Split on `separator`, keeping each separator at the start of the piece that follows it.
/// An empty separator splits into single characters.
fn split_keep_start<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (at, _) in text.match_indices(separator) {
        if at > start {
            pieces.push(&text[start..at]);
        }
        start = at;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
