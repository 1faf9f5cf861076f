//! Corpus statistics for length normalization
//!
//! Tracks committed documents only; staged records join the statistics when
//! they are merged.

use serde::{Deserialize, Serialize};

use super::types::ClassCounts;
use crate::config::{LengthNormalization, WeightBiases};
use crate::models::WeightClass;

/// Document count and summed lengths per weight class
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorpusStatistics {
    pub doc_count: u64,
    total_by_class: [u64; WeightClass::COUNT],
}

impl CorpusStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, lengths: &ClassCounts) {
        self.doc_count += 1;
        for (class, n) in lengths.iter() {
            self.total_by_class[class.index()] += n as u64;
        }
    }

    pub fn remove_document(&mut self, lengths: &ClassCounts) {
        self.doc_count = self.doc_count.saturating_sub(1);
        for (class, n) in lengths.iter() {
            let total = &mut self.total_by_class[class.index()];
            *total = total.saturating_sub(n as u64);
        }
    }

    /// Summed occurrences across all documents and classes
    pub fn total_length(&self) -> u64 {
        self.total_by_class.iter().sum()
    }

    pub fn class_total(&self, class: WeightClass) -> u64 {
        self.total_by_class[class.index()]
    }

    /// Average document length under the given normalization policy
    pub fn avg_length(&self, mode: LengthNormalization, biases: &WeightBiases) -> f64 {
        if self.doc_count == 0 {
            return 0.0;
        }
        let total = match mode {
            LengthNormalization::Uniform => self.total_length() as f64,
            LengthNormalization::Weighted => WeightClass::ALL
                .iter()
                .map(|&class| self.class_total(class) as f64 * biases.get(class) as f64)
                .sum(),
        };
        total / self.doc_count as f64
    }
}
