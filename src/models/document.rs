use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique document identifier, assigned by the storage layer
pub type DocumentId = u64;

/// Normalized index key
pub type Term = String;

/// Field tag attached to every term occurrence, used to bias ranking
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightClass {
    Title,
    Heading,
    Body,
}

impl WeightClass {
    /// Number of weight classes
    pub const COUNT: usize = 3;

    /// All classes in field order (the order positions are assigned in)
    pub const ALL: [WeightClass; WeightClass::COUNT] =
        [WeightClass::Title, WeightClass::Heading, WeightClass::Body];

    /// Dense index of this class, usable as an array offset
    pub fn index(self) -> usize {
        match self {
            WeightClass::Title => 0,
            WeightClass::Heading => 1,
            WeightClass::Body => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeightClass::Title => "title",
            WeightClass::Heading => "heading",
            WeightClass::Body => "body",
        }
    }
}

impl fmt::Display for WeightClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single document field as handed over by the storage layer
///
/// Content is kept as raw bytes: the tokenizer is the one that decides
/// whether a field is well-formed text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub class: WeightClass,
    pub content: Vec<u8>,
}

impl Field {
    pub fn text(class: WeightClass, text: impl Into<String>) -> Self {
        Self {
            class,
            content: text.into().into_bytes(),
        }
    }

    pub fn raw(class: WeightClass, content: Vec<u8>) -> Self {
        Self { class, content }
    }
}

/// Document written by the storage layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new(id: DocumentId) -> Self {
        Self {
            id,
            fields: Vec::new(),
        }
    }

    /// Add a text field
    pub fn with_field(mut self, class: WeightClass, text: impl Into<String>) -> Self {
        self.fields.push(Field::text(class, text));
        self
    }

    pub fn with_title(self, text: impl Into<String>) -> Self {
        self.with_field(WeightClass::Title, text)
    }

    pub fn with_heading(self, text: impl Into<String>) -> Self {
        self.with_field(WeightClass::Heading, text)
    }

    pub fn with_body(self, text: impl Into<String>) -> Self {
        self.with_field(WeightClass::Body, text)
    }

    /// Add a field with raw, possibly malformed content
    pub fn with_raw_field(mut self, class: WeightClass, content: Vec<u8>) -> Self {
        self.fields.push(Field::raw(class, content));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_class_indices_are_dense() {
        for (i, class) in WeightClass::ALL.iter().enumerate() {
            assert_eq!(class.index(), i);
        }
    }

    #[test]
    fn test_document_builder() {
        let doc = Document::new(7)
            .with_title("postgres fts tuning")
            .with_body("some body text");

        assert_eq!(doc.id, 7);
        assert_eq!(doc.fields.len(), 2);
        assert_eq!(doc.fields[0].class, WeightClass::Title);
        assert_eq!(doc.fields[1].content, b"some body text".to_vec());
    }

    #[test]
    fn test_weight_class_display() {
        assert_eq!(WeightClass::Heading.to_string(), "heading");
    }
}
