//! Normalized query representation

use std::collections::HashSet;

use crate::models::SearchRequest;
use crate::tokenizer::Tokenizer;

/// How a term participates in matching
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Clause {
    /// Document must contain the term
    Required,
    /// Adds to the score of matching documents only
    Optional,
}

impl Clause {
    pub fn is_required(&self) -> bool {
        matches!(self, Clause::Required)
    }
}

/// A query term with its clause
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTerm {
    pub term: String,
    pub clause: Clause,
}

/// Deduplicated required and optional terms
///
/// A term given both as required and optional is required.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
    terms: Vec<QueryTerm>,
}

impl Query {
    pub fn new<R, O>(required: R, optional: O) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut terms = Vec::new();

        for term in required.into_iter().map(Into::into) {
            if seen.insert(term.clone()) {
                terms.push(QueryTerm {
                    term,
                    clause: Clause::Required,
                });
            }
        }
        for term in optional.into_iter().map(Into::into) {
            if seen.insert(term.clone()) {
                terms.push(QueryTerm {
                    term,
                    clause: Clause::Optional,
                });
            }
        }

        Self { terms }
    }

    /// Normalize request terms with the tokenizer; terms that normalize to
    /// nothing (stop words, too short) are dropped
    pub fn from_request(request: &SearchRequest, tokenizer: &Tokenizer) -> Self {
        Self::new(
            request
                .required
                .iter()
                .filter_map(|t| tokenizer.normalize_term(t)),
            request
                .optional
                .iter()
                .filter_map(|t| tokenizer.normalize_term(t)),
        )
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    /// Term strings in query order
    pub fn term_strings(&self) -> Vec<String> {
        self.terms.iter().map(|t| t.term.clone()).collect()
    }

    pub fn required(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|t| t.clause.is_required())
            .map(|t| t.term.as_str())
    }

    pub fn optional(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .filter(|t| !t.clause.is_required())
            .map(|t| t.term.as_str())
    }

    pub fn has_required(&self) -> bool {
        self.terms.iter().any(|t| t.clause.is_required())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerConfig;

    #[test]
    fn test_required_wins_over_optional() {
        let query = Query::new(["postgres", "postgres"], ["tuning", "postgres"]);
        assert_eq!(query.len(), 2);
        assert_eq!(query.required().collect::<Vec<_>>(), vec!["postgres"]);
        assert_eq!(query.optional().collect::<Vec<_>>(), vec!["tuning"]);
    }

    #[test]
    fn test_from_request_normalizes_terms() {
        let mut config = TokenizerConfig::default();
        config.stemming = false;
        config.stop_words.insert("the".to_string());
        let tokenizer = Tokenizer::new(&config);

        let request = SearchRequest::new(10)
            .require("Postgres")
            .require("the")
            .optional("Running");
        let query = Query::from_request(&request, &tokenizer);

        assert_eq!(query.required().collect::<Vec<_>>(), vec!["postgres"]);
        assert_eq!(query.optional().collect::<Vec<_>>(), vec!["running"]);
    }

    #[test]
    fn test_empty_query() {
        let query = Query::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(query.is_empty());
        assert!(!query.has_required());
    }
}
