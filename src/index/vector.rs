//! Per-document term vector

use std::collections::BTreeMap;

use super::types::{ClassCounts, Occurrence, PostingsEntry};
use crate::error::QuarryError;
use crate::models::{DocumentId, Field, WeightClass};
use crate::tokenizer::{Token, Tokenizer};

/// Term -> ordered occurrences for a single document
///
/// Built once per document version and replaced wholesale on update.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentVector {
    terms: BTreeMap<String, Vec<Occurrence>>,
    lengths: ClassCounts,
}

impl DocumentVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from tokens in position order
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut vector = Self::new();
        for token in tokens {
            vector.push(token);
        }
        vector
    }

    /// Tokenize every field of a document with one continuous position counter
    ///
    /// Fields are processed in weight class order (title, heading, body),
    /// keeping the caller's order within a class. A field that fails to
    /// tokenize is treated as empty and its error returned alongside.
    pub fn build(tokenizer: &Tokenizer, fields: &[Field]) -> (Self, Vec<QuarryError>) {
        let mut ordered: Vec<&Field> = fields.iter().collect();
        ordered.sort_by_key(|f| f.class);

        let mut vector = Self::new();
        let mut failures = Vec::new();
        let mut next = 0u32;

        for field in ordered {
            match tokenizer.tokenize_raw(&field.content, field.class, next) {
                Ok((tokens, end)) => {
                    next = end;
                    for token in tokens {
                        vector.push(token);
                    }
                }
                Err(e) => failures.push(e),
            }
        }

        (vector, failures)
    }

    /// Append a token; tokens must arrive in ascending position order
    pub fn push(&mut self, token: Token) {
        self.lengths.increment(token.class);
        self.terms.entry(token.term).or_default().push(Occurrence {
            position: token.position,
            class: token.class,
        });
    }

    pub fn occurrences(&self, term: &str) -> Option<&[Occurrence]> {
        self.terms.get(term).map(|v| v.as_slice())
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Term frequency in this document
    pub fn frequency(&self, term: &str) -> u32 {
        self.terms.get(term).map(|v| v.len() as u32).unwrap_or(0)
    }

    /// Occurrences of a term per weight class
    pub fn class_counts(&self, term: &str) -> ClassCounts {
        let mut counts = ClassCounts::new();
        if let Some(occurrences) = self.terms.get(term) {
            for occ in occurrences {
                counts.increment(occ.class);
            }
        }
        counts
    }

    pub fn terms(&self) -> impl Iterator<Item = &String> {
        self.terms.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &[Occurrence])> {
        self.terms.iter().map(|(t, v)| (t, v.as_slice()))
    }

    /// Number of distinct terms
    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Total occurrence count across all fields
    pub fn len(&self) -> u32 {
        self.lengths.total()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Document length per weight class
    pub fn lengths(&self) -> ClassCounts {
        self.lengths
    }

    /// Occurrence count for one class
    pub fn field_length(&self, class: WeightClass) -> u32 {
        self.lengths.get(class)
    }

    /// Postings entries this vector contributes, one per term
    pub fn postings(&self, doc_id: DocumentId) -> impl Iterator<Item = (&String, PostingsEntry)> {
        let lengths = self.lengths;
        self.terms
            .iter()
            .map(move |(term, occ)| (term, PostingsEntry::from_occurrences(doc_id, occ, lengths)))
    }

    /// Reconstruct the token stream in position order
    pub fn to_tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = self
            .terms
            .iter()
            .flat_map(|(term, occurrences)| {
                occurrences.iter().map(move |occ| Token {
                    term: term.clone(),
                    position: occ.position,
                    class: occ.class,
                })
            })
            .collect();
        tokens.sort_by_key(|t| t.position);
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;
    use crate::models::Document;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(&TokenizerConfig {
            stemming: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_build_uses_continuous_positions() {
        let doc = Document::new(1)
            .with_body("postgres internals")
            .with_title("postgres tuning");
        let (vector, failures) = DocumentVector::build(&tokenizer(), &doc.fields);

        assert!(failures.is_empty());
        // Title comes first even though it was added second
        let occ = vector.occurrences("postgres").unwrap();
        assert_eq!(
            occ,
            &[
                Occurrence {
                    position: 0,
                    class: WeightClass::Title
                },
                Occurrence {
                    position: 2,
                    class: WeightClass::Body
                },
            ]
        );
        assert_eq!(vector.len(), 4);
        assert_eq!(vector.field_length(WeightClass::Title), 2);
        assert_eq!(vector.frequency("postgres"), 2);
        assert_eq!(vector.class_counts("postgres").get(WeightClass::Body), 1);
    }

    #[test]
    fn test_build_treats_malformed_field_as_empty() {
        let doc = Document::new(1)
            .with_title("valid title")
            .with_raw_field(WeightClass::Body, vec![0xc3, 0x28]);
        let (vector, failures) = DocumentVector::build(&tokenizer(), &doc.fields);

        assert_eq!(failures.len(), 1);
        assert!(failures[0].is_warning());
        assert_eq!(vector.field_length(WeightClass::Body), 0);
        assert!(vector.contains_term("valid"));
    }

    #[test]
    fn test_to_tokens_recovers_token_stream() {
        let tok = tokenizer();
        let tokens = tok.tokenize("one two one three two one", WeightClass::Body);
        let vector = DocumentVector::from_tokens(tokens.clone());

        assert_eq!(vector.to_tokens(), tokens);
        assert_eq!(vector.term_count(), 3);
    }

    #[test]
    fn test_postings_carry_document_lengths() {
        let doc = Document::new(9).with_title("alpha beta").with_body("alpha");
        let (vector, _) = DocumentVector::build(&tokenizer(), &doc.fields);

        let postings: Vec<_> = vector.postings(9).collect();
        assert_eq!(postings.len(), 2);
        let (term, entry) = &postings[0];
        assert_eq!(term.as_str(), "alpha");
        assert_eq!(entry.doc_id, 9);
        assert_eq!(entry.term_frequency, 2);
        assert_eq!(entry.doc_lengths.total(), 3);
    }
}
