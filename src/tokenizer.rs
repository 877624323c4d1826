//! Token counting, truncation and token-window chunking.
//!
//! Every length the pipeline reasons about (summary threshold, batch token
//! budget, chunk size) is measured with one [`Tokenizer`] passed in at
//! construction time.

use text_splitter::{ChunkConfig, ChunkSizer, TextSplitter};

use crate::error::AppError;

/// Splits text into tokens and joins them back.
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Vec<String>;

    fn decode(&self, tokens: &[String]) -> String {
        tokens.concat()
    }

    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }

    /// First `max_tokens` tokens of `text`, decoded.
    fn truncate(&self, text: &str, max_tokens: usize) -> String {
        let tokens = self.encode(text);
        if tokens.len() <= max_tokens {
            return text.to_string();
        }
        self.decode(&tokens[..max_tokens])
    }
}

/// Word/punctuation tokenizer.
///
/// A token is a run of alphanumeric characters or a single punctuation
/// character, carrying the whitespace that precedes it. Trailing whitespace
/// becomes a token of its own, so `decode(encode(t)) == t` for every input.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordPieceTokenizer;

impl Tokenizer for WordPieceTokenizer {
    fn encode(&self, text: &str) -> Vec<String> {
        let mut pieces = Vec::new();
        let mut current = String::new();
        let mut has_body = false;
        let mut in_word = false;

        for ch in text.chars() {
            if ch.is_whitespace() {
                if has_body {
                    pieces.push(std::mem::take(&mut current));
                }
                current.push(ch);
                has_body = false;
                in_word = false;
            } else if ch.is_alphanumeric() {
                if has_body && !in_word {
                    pieces.push(std::mem::take(&mut current));
                }
                current.push(ch);
                has_body = true;
                in_word = true;
            } else {
                if has_body {
                    pieces.push(std::mem::take(&mut current));
                }
                current.push(ch);
                pieces.push(std::mem::take(&mut current));
                has_body = false;
                in_word = false;
            }
        }
        if !current.is_empty() {
            pieces.push(current);
        }
        pieces
    }
}

/// Measures `text-splitter` chunks with a [`Tokenizer`], so chunk capacity
/// and overlap are counted in the same tokens as every other budget.
struct TokenSizer<'a>(&'a dyn Tokenizer);

impl ChunkSizer for TokenSizer<'_> {
    fn size(&self, chunk: &str) -> usize {
        self.0.count(chunk)
    }
}

/// One chunk of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenChunk {
    /// Token count of the chunk.
    pub tokens: usize,
    /// Chunk text, whitespace-trimmed.
    pub content: String,
    pub chunk_order_index: usize,
}

/// Split `text` into chunks of at most `max_token_size` tokens, each sharing
/// up to `overlap_token_size` tokens with the one before it.
///
/// Chunks break at the coarsest boundary that fits (paragraph, sentence,
/// word) rather than at a fixed token offset.
pub fn chunk_by_token_size(
    tokenizer: &dyn Tokenizer,
    text: &str,
    overlap_token_size: usize,
    max_token_size: usize,
) -> Result<Vec<TokenChunk>, AppError> {
    let config = ChunkConfig::new(max_token_size)
        .with_sizer(TokenSizer(tokenizer))
        .with_overlap(overlap_token_size)
        .map_err(|e| AppError::Config(format!("chunking: {e}")))?;
    let splitter = TextSplitter::new(config);

    Ok(splitter
        .chunks(text)
        .filter(|chunk| !chunk.trim().is_empty())
        .enumerate()
        .map(|(index, chunk)| TokenChunk {
            tokens: tokenizer.count(chunk),
            content: chunk.trim().to_string(),
            chunk_order_index: index,
        })
        .collect())
}
