use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{QuarryError, Result};
use crate::models::WeightClass;

/// Engine configuration
///
/// One value per engine instance; independent engines (e.g. one per tenant)
/// each carry their own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub tokenizer: TokenizerConfig,
    pub biases: WeightBiases,
    pub indexing_mode: IndexingMode,
    pub pending: PendingConfig,
    pub ranking: RankingConfig,
    /// Number of lock shards the postings lists are spread over
    pub shard_count: usize,
    /// Number of lock stripes used to serialize per-document writes
    pub doc_lock_stripes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerConfig::default(),
            biases: WeightBiases::default(),
            indexing_mode: IndexingMode::Buffered,
            pending: PendingConfig::default(),
            ranking: RankingConfig::default(),
            shard_count: (num_cpus::get() * 4).max(16),
            doc_lock_stripes: 64,
        }
    }
}

/// Tokenizer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub lowercase: bool,
    pub stemming: bool,
    /// Include the built-in English stop-word list
    pub use_default_stop_words: bool,
    /// Extra stop words, matched after case folding
    pub stop_words: BTreeSet<String>,
    pub min_token_length: usize,
    pub max_token_length: usize,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            stemming: true,
            use_default_stop_words: false,
            stop_words: BTreeSet::new(),
            min_token_length: 2,
            max_token_length: 50,
        }
    }
}

/// Ranking bias per weight class; classes without an entry weigh 1.0
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightBiases(BTreeMap<WeightClass, f32>);

impl Default for WeightBiases {
    fn default() -> Self {
        let mut biases = BTreeMap::new();
        biases.insert(WeightClass::Title, 3.0);
        biases.insert(WeightClass::Heading, 2.0);
        biases.insert(WeightClass::Body, 1.0);
        Self(biases)
    }
}

impl WeightBiases {
    /// Every class weighs 1.0
    pub fn uniform() -> Self {
        Self(WeightClass::ALL.iter().map(|&class| (class, 1.0)).collect())
    }

    pub fn get(&self, class: WeightClass) -> f32 {
        self.0.get(&class).copied().unwrap_or(1.0)
    }

    pub fn set(&mut self, class: WeightClass, bias: f32) {
        self.0.insert(class, bias);
    }

    pub fn with(mut self, class: WeightClass, bias: f32) -> Self {
        self.set(class, bias);
        self
    }
}

/// Insertion path for new and updated documents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexingMode {
    /// Synchronous upsert into the inverted index; no read-side overhead
    Direct,
    /// Stage into the pending buffer and merge later; cheap writes
    #[default]
    Buffered,
}

/// Pending buffer and merge policy
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingConfig {
    /// Backlog size past which queries touching staged terms force a merge
    pub high_water_mark: usize,
    /// Absolute backlog limit; ingestion is rejected past it
    pub hard_cap: usize,
    /// Maximum records merged by a single forced merge
    pub merge_batch_size: usize,
    /// Per-term staged count past which a query merges before running
    pub term_merge_threshold: usize,
    /// Background merge interval; 0 disables the background merger
    pub merge_interval_ms: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 10_000,
            hard_cap: 100_000,
            merge_batch_size: 1_000,
            term_merge_threshold: 2_000,
            merge_interval_ms: 0,
        }
    }
}

/// How document length is measured for normalization
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthNormalization {
    /// Every occurrence counts once, whatever its field
    #[default]
    Uniform,
    /// Occurrences count by their weight class bias
    Weighted,
}

/// Ranking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Estimated candidate count past which `Auto` switches to sampling
    pub sampled_mode_threshold: usize,
    pub default_sample_size: usize,
    /// Score multiplier for optional-term matches (required terms weigh 1.0)
    pub optional_term_weight: f32,
    pub length_normalization: LengthNormalization,
    /// Pivot `b` in `1 - b + b * len / avg_len`
    pub length_pivot: f32,
    /// Fixed seed for reproducible sampling
    pub sample_seed: Option<u64>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            sampled_mode_threshold: 50_000,
            default_sample_size: 10_000,
            optional_term_weight: 0.5,
            length_normalization: LengthNormalization::Uniform,
            length_pivot: 0.75,
            sample_seed: None,
        }
    }
}

/// Configuration presets for different workloads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkloadProfile {
    /// Ingestion-dominated: buffer aggressively, merge in large batches
    WriteHeavy,
    Balanced,
    /// Query-dominated, low churn: write straight into the index
    ReadHeavy,
}

impl WorkloadProfile {
    pub fn indexing_mode(&self) -> IndexingMode {
        match self {
            WorkloadProfile::WriteHeavy | WorkloadProfile::Balanced => IndexingMode::Buffered,
            WorkloadProfile::ReadHeavy => IndexingMode::Direct,
        }
    }

    pub fn merge_batch_size(&self) -> usize {
        match self {
            WorkloadProfile::WriteHeavy => 5_000,
            WorkloadProfile::Balanced => 1_000,
            WorkloadProfile::ReadHeavy => 100,
        }
    }

    pub fn merge_interval_ms(&self) -> u64 {
        match self {
            WorkloadProfile::WriteHeavy => 500,
            WorkloadProfile::Balanced => 100,
            WorkloadProfile::ReadHeavy => 0,
        }
    }

    /// Apply this profile to an EngineConfig
    pub fn apply_to(&self, config: &mut EngineConfig) {
        config.indexing_mode = self.indexing_mode();
        config.pending.merge_batch_size = self.merge_batch_size();
        config.pending.merge_interval_ms = self.merge_interval_ms();
    }
}

impl EngineConfig {
    /// Apply a workload profile to this configuration
    pub fn with_profile(mut self, profile: WorkloadProfile) -> Self {
        profile.apply_to(&mut self);
        self
    }

    pub fn with_indexing_mode(mut self, mode: IndexingMode) -> Self {
        self.indexing_mode = mode;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: TokenizerConfig) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn with_biases(mut self, biases: WeightBiases) -> Self {
        self.biases = biases;
        self
    }

    pub fn with_pending(mut self, pending: PendingConfig) -> Self {
        self.pending = pending;
        self
    }

    pub fn with_ranking(mut self, ranking: RankingConfig) -> Self {
        self.ranking = ranking;
        self
    }

    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| QuarryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check option ranges and cross-option constraints
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(QuarryError::InvalidConfig(msg.to_string()));

        if self.shard_count == 0 || self.doc_lock_stripes == 0 {
            return invalid("shard_count and doc_lock_stripes must be positive");
        }
        if self.tokenizer.min_token_length > self.tokenizer.max_token_length {
            return invalid("min_token_length exceeds max_token_length");
        }
        if self.pending.merge_batch_size == 0 {
            return invalid("merge_batch_size must be positive");
        }
        if self.pending.high_water_mark == 0
            || self.pending.high_water_mark > self.pending.hard_cap
        {
            return invalid("high_water_mark must be positive and not exceed hard_cap");
        }
        if self.ranking.default_sample_size == 0 {
            return invalid("default_sample_size must be positive");
        }
        if !(0.0..=1.0).contains(&self.ranking.length_pivot) {
            return invalid("length_pivot must be within [0, 1]");
        }
        if !self.ranking.optional_term_weight.is_finite() || self.ranking.optional_term_weight < 0.0
        {
            return invalid("optional_term_weight must be finite and non-negative");
        }
        for class in WeightClass::ALL {
            let bias = self.biases.get(class);
            if !bias.is_finite() || bias < 0.0 {
                return Err(QuarryError::InvalidConfig(format!(
                    "bias for {} must be finite and non-negative",
                    class
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = EngineConfig::default();
        assert_eq!(config.indexing_mode, IndexingMode::Buffered);
        assert!(config.validate().is_ok());

        let tokenizer_config = TokenizerConfig::default();
        assert!(tokenizer_config.lowercase);
        assert!(tokenizer_config.stemming);

        assert_eq!(config.biases.get(WeightClass::Title), 3.0);
        assert_eq!(config.biases.get(WeightClass::Body), 1.0);
    }

    #[test]
    fn test_workload_profiles() {
        assert_eq!(
            WorkloadProfile::ReadHeavy.indexing_mode(),
            IndexingMode::Direct
        );
        assert_eq!(WorkloadProfile::WriteHeavy.merge_batch_size(), 5_000);

        let config = EngineConfig::default().with_profile(WorkloadProfile::ReadHeavy);
        assert_eq!(config.indexing_mode, IndexingMode::Direct);
        assert_eq!(config.pending.merge_batch_size, 100);
        assert_eq!(config.pending.merge_interval_ms, 0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.pending.high_water_mark = config.pending.hard_cap + 1;
        assert!(matches!(
            config.validate(),
            Err(QuarryError::InvalidConfig(_))
        ));

        let mut config = EngineConfig::default();
        config.ranking.length_pivot = 1.5;
        assert!(config.validate().is_err());

        let config =
            EngineConfig::default().with_biases(WeightBiases::default().with(WeightClass::Body, -1.0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_roundtrip() {
        let config = EngineConfig::default().with_profile(WorkloadProfile::WriteHeavy);
        let json = serde_json::to_string(&config).unwrap();
        let parsed = EngineConfig::from_json(&json).unwrap();

        assert_eq!(parsed.pending.merge_batch_size, 5_000);
        assert_eq!(parsed.biases, config.biases);
        assert!(EngineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_missing_bias_defaults_to_one() {
        let biases = WeightBiases(BTreeMap::new());
        assert_eq!(biases.get(WeightClass::Heading), 1.0);
        assert_eq!(WeightBiases::uniform().get(WeightClass::Title), 1.0);
    }
}
