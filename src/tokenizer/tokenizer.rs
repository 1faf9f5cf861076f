use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

use crate::config::TokenizerConfig;
use crate::error::{QuarryError, Result};
use crate::models::WeightClass;

/// A normalized term occurrence
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub term: String,
    pub position: u32,
    pub class: WeightClass,
}

/// Text tokenizer with case folding, stemming and stopword removal
///
/// Positions count every word the segmenter produces, including words that
/// are filtered out, so they are strictly increasing but may have gaps.
pub struct Tokenizer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl Tokenizer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stemming {
            Some(Stemmer::create(Algorithm::English))
        } else {
            None
        };

        let mut stopwords: HashSet<String> = if config.use_default_stop_words {
            get(LANGUAGE::English)
                .into_iter()
                .map(|s| s.to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };
        stopwords.extend(config.stop_words.iter().map(|s| s.to_lowercase()));

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    /// Tokenize one field, numbering positions from 0
    pub fn tokenize(&self, text: &str, class: WeightClass) -> Vec<Token> {
        self.tokenize_from(text, class, 0).0
    }

    /// Tokenize one field, numbering positions from `start`
    ///
    /// Returns the tokens and the next free position, so that the fields of a
    /// document share one continuous position counter.
    pub fn tokenize_from(&self, text: &str, class: WeightClass, start: u32) -> (Vec<Token>, u32) {
        let mut tokens = Vec::new();
        let mut pos = start;

        for word in text.unicode_words() {
            if let Some(term) = self.normalize(word) {
                tokens.push(Token {
                    term,
                    position: pos,
                    class,
                });
            }
            pos += 1;
        }

        (tokens, pos)
    }

    /// Tokenize raw field content
    ///
    /// Fails on content that is not valid UTF-8 or contains NUL bytes. No
    /// positions are consumed on failure.
    pub fn tokenize_raw(
        &self,
        raw: &[u8],
        class: WeightClass,
        start: u32,
    ) -> Result<(Vec<Token>, u32)> {
        let text = std::str::from_utf8(raw).map_err(|e| QuarryError::TokenizationFailure {
            class,
            reason: format!("invalid utf-8 at byte {}", e.valid_up_to()),
        })?;

        if let Some(offset) = text.find('\0') {
            return Err(QuarryError::TokenizationFailure {
                class,
                reason: format!("NUL byte at offset {}", offset),
            });
        }

        Ok(self.tokenize_from(text, class, start))
    }

    /// Normalize a single query word the same way document text is
    ///
    /// Returns `None` if the word is filtered out (length or stopword).
    pub fn normalize_term(&self, word: &str) -> Option<String> {
        // Query terms arrive already split, but may carry punctuation
        let mut words = word.unicode_words();
        let first = words.next()?;
        self.normalize(first)
    }

    fn normalize(&self, word: &str) -> Option<String> {
        let token = if self.config.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        };

        // Length is measured in chars so non-ASCII words are not penalized
        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return None;
        }

        if self.stopwords.contains(&token) {
            return None;
        }

        match &self.stemmer {
            Some(stemmer) => Some(stemmer.stem(&token).into_owned()),
            None => Some(token),
        }
    }
}
