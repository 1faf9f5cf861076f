//! Top-k ranking in exact and sampled modes
//!
//! Exact mode scores every candidate into a bounded min-heap. Sampled mode
//! draws a uniform reservoir of probe positions with geometric skips
//! (Algorithm L), so the work depends on the sample size rather than on the
//! number of candidates, then scores only the reservoir.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::scoring::ScoringContext;
use crate::config::{RankingConfig, WeightBiases};
use crate::index::CorpusStatistics;
use crate::models::{DocumentId, ModeUsed, RankingMode, SearchHit};
use crate::query::{Candidate, CandidateStream};

/// Ranked hits and the mode that produced them
#[derive(Clone, Debug, PartialEq)]
pub struct RankedResults {
    pub hits: Vec<SearchHit>,
    pub mode: ModeUsed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Ranked {
    score: OrderedFloat<f32>,
    doc_id: DocumentId,
}

impl Ord for Ranked {
    /// Greater is better: higher score, then smaller document id
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| other.doc_id.cmp(&self.doc_id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Bounded min-heap keeping the best `k` documents
struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.min(1024) + 1),
        }
    }

    fn push(&mut self, doc_id: DocumentId, score: f32) {
        let ranked = Ranked {
            score: OrderedFloat(score),
            doc_id,
        };
        if self.heap.len() < self.k {
            self.heap.push(Reverse(ranked));
        } else if let Some(Reverse(worst)) = self.heap.peek() {
            if ranked > *worst {
                self.heap.pop();
                self.heap.push(Reverse(ranked));
            }
        }
    }

    /// Best first
    fn into_hits(self) -> Vec<SearchHit> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(r)| SearchHit::new(r.doc_id, r.score.into_inner()))
            .collect()
    }
}

pub struct Ranker<'a> {
    config: &'a RankingConfig,
    scoring: ScoringContext,
}

impl<'a> Ranker<'a> {
    pub fn new(
        config: &'a RankingConfig,
        biases: &WeightBiases,
        statistics: &CorpusStatistics,
    ) -> Self {
        Self {
            config,
            scoring: ScoringContext::new(config, biases, statistics),
        }
    }

    pub fn scoring(&self) -> &ScoringContext {
        &self.scoring
    }

    pub fn score(&self, candidate: &Candidate) -> f32 {
        self.scoring.score(candidate)
    }

    /// Rank a candidate stream, choosing exact or sampled scoring
    ///
    /// `Exact` never samples. `Auto` samples when the estimated candidate
    /// count exceeds the configured threshold. A sample that would cover the
    /// whole stream is scored exactly and reported as such.
    pub fn rank(
        &self,
        stream: CandidateStream,
        k: usize,
        mode: RankingMode,
        sample_size: Option<usize>,
    ) -> RankedResults {
        let sample_size = sample_size
            .unwrap_or(self.config.default_sample_size)
            .max(1);
        let estimated = stream.estimated_len();

        let wants_sample = match mode {
            RankingMode::Exact => false,
            RankingMode::Sampled => true,
            RankingMode::Auto => estimated > self.config.sampled_mode_threshold,
        };

        if wants_sample && stream.probe_len() > sample_size {
            debug!(estimated, sample_size, "ranking sampled");
            self.rank_sampled(stream, k, sample_size)
        } else {
            debug!(estimated, "ranking exact");
            self.rank_exact(stream, k)
        }
    }

    /// Score every candidate
    pub fn rank_exact(&self, stream: CandidateStream, k: usize) -> RankedResults {
        let mut top = TopK::new(k);
        for candidate in stream {
            top.push(candidate.doc_id, self.score(&candidate));
        }

        RankedResults {
            hits: top.into_hits(),
            mode: ModeUsed::Exact,
        }
    }

    /// Score a uniform sample of `sample_size` probe positions
    pub fn rank_sampled(
        &self,
        mut stream: CandidateStream,
        k: usize,
        sample_size: usize,
    ) -> RankedResults {
        let mut rng = match self.config.sample_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let positions = reservoir_positions(&mut stream, sample_size, &mut rng);

        let mut top = TopK::new(k);
        let mut scored = 0;
        for &pos in &positions {
            if let Some(candidate) = stream.probe(pos) {
                scored += 1;
                top.push(candidate.doc_id, self.score(&candidate));
            }
        }

        RankedResults {
            hits: top.into_hits(),
            mode: ModeUsed::Sampled {
                sample_size,
                probed: stream.probe_len(),
                scored,
            },
        }
    }
}

/// Uniform in (0, 1]
fn open_unit(rng: &mut impl Rng) -> f64 {
    1.0 - rng.gen::<f64>()
}

/// Reservoir-sample up to `n` probe positions from the rest of the stream,
/// returned in ascending order
///
/// Uses geometric skips, so positions that are never selected are never
/// touched.
fn reservoir_positions(stream: &mut CandidateStream, n: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut reservoir = Vec::with_capacity(n.min(stream.remaining_positions()));
    while reservoir.len() < n && stream.remaining_positions() > 0 {
        reservoir.push(stream.cursor());
        stream.skip_positions(1);
    }
    if reservoir.len() < n {
        return reservoir;
    }

    let inv_n = 1.0 / n as f64;
    let mut w = (open_unit(rng).ln() * inv_n).exp();
    loop {
        let skip = (open_unit(rng).ln() / (1.0 - w).ln()).floor();
        stream.skip_positions(skip as usize);
        if stream.remaining_positions() == 0 {
            break;
        }

        reservoir[rng.gen_range(0..n)] = stream.cursor();
        stream.skip_positions(1);
        w *= (open_unit(rng).ln() * inv_n).exp();
    }

    reservoir.sort_unstable();
    reservoir
}
