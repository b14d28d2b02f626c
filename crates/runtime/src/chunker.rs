//! Splitting text into token-bounded chunks.

use crate::TextChunk;
use tcore::Tokenizer;

/// Separators tried in order: paragraphs, lines, sentences, words.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

/// Splits text into chunks of at most `max_tokens` tokens.
///
/// Text is cut at the coarsest separator that fits. Words longer than the
/// budget are split mid-word.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    /// Token budget of each chunk.
    pub max_tokens: usize,
    /// Token counter.
    pub tokenizer: Tokenizer,
}

impl TextChunker {
    /// Create a chunker. A zero budget is raised to one token.
    pub fn new(tokenizer: Tokenizer, max_tokens: usize) -> Self {
        Self {
            max_tokens: max_tokens.max(1),
            tokenizer,
        }
    }

    /// Chunk `text`, skipping chunks that are only whitespace.
    pub fn chunk(&self, text: &str) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        self.split(text, SEPARATORS, &mut chunks);
        chunks
            .into_iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .map(TextChunk::new)
            .collect()
    }

    fn fits(&self, text: &str) -> bool {
        self.tokenizer.count_tokens(text) <= self.max_tokens
    }

    fn split(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        if self.fits(text) {
            out.push(text.to_owned());
            return;
        }

        let Some(pos) = separators.iter().position(|s| text.contains(s)) else {
            self.hard_split(text, out);
            return;
        };
        let separator = separators[pos];
        let finer = &separators[pos + 1..];

        let mut current = String::new();
        for piece in text.split_inclusive(separator) {
            if self.fits(&format!("{current}{piece}")) {
                current.push_str(piece);
                continue;
            }
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            if self.fits(piece) {
                current.push_str(piece);
            } else {
                self.split(piece, finer, out);
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }

    fn hard_split(&self, text: &str, out: &mut Vec<String>) {
        let mut current = String::new();
        for c in text.chars() {
            current.push(c);
            if !self.fits(&current) {
                current.pop();
                out.push(std::mem::replace(&mut current, c.to_string()));
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
}
