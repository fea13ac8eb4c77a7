//! Full forward-algorithm classifier: scores every candidate dye sequence
//! against a radiometry with the HMM and returns the best match.
//!
//! Grounded in
//! `original_source/cc_code/src/classifiers/hmm-classifier.{h,cc}`:
//! `classify_helper`'s generic-over-index-range template becomes
//! `classify_subset`, the full-candidate-set path taking `0..len` as its
//! index range.

use rayon::prelude::*;

use crate::hmm::Hmm;
use crate::model::{DyeSeq, Radiometry, ScoredClassification, SequencingModel, SequencingSettings, SourceCount, Sourced};
use crate::precompute::{DyeSeqPrecomputations, RadiometryPrecomputations, UniversalPrecomputations};

pub struct HmmClassifier<'a> {
    seq_model: &'a SequencingModel,
    seq_settings: &'a SequencingSettings,
    universal: UniversalPrecomputations,
    dye_seq_pre: Vec<DyeSeqPrecomputations>,
    dye_seqs: &'a [Sourced<DyeSeq, SourceCount>],
    num_timesteps: usize,
    max_num_dyes: usize,
}

impl<'a> HmmClassifier<'a> {
    /// Builds precomputations for every candidate and reserves the shared
    /// binomial tables to the largest dye count seen across all of them,
    /// before any worker thread starts reading `universal`.
    pub fn new(
        num_timesteps: usize,
        num_channels: usize,
        seq_model: &'a SequencingModel,
        seq_settings: &'a SequencingSettings,
        dye_seqs: &'a [Sourced<DyeSeq, SourceCount>],
    ) -> Self {
        let dye_seq_pre: Vec<DyeSeqPrecomputations> = dye_seqs
            .iter()
            .map(|s| DyeSeqPrecomputations::new(&s.value, seq_model, num_timesteps, num_channels))
            .collect();
        let max_num_dyes = dye_seq_pre.iter().map(|p| p.max_num_dyes()).max().unwrap_or(0);
        let mut universal = UniversalPrecomputations::new(seq_model, num_channels);
        universal.reserve(max_num_dyes);
        HmmClassifier {
            seq_model,
            seq_settings,
            universal,
            dye_seq_pre,
            dye_seqs,
            num_timesteps,
            max_num_dyes,
        }
    }

    pub fn max_num_dyes(&self) -> usize {
        self.max_num_dyes
    }

    fn classify_helper(&self, radiometry: &Radiometry, candidate_indices: &[usize]) -> ScoredClassification {
        let radiometry_pre =
            RadiometryPrecomputations::new(radiometry, self.seq_model, self.seq_settings, self.max_num_dyes);
        let mut best_i: Option<usize> = None;
        let mut best_score = -1.0;
        let mut total_score = 0.0;
        for &i in candidate_indices {
            let dye_seq = &self.dye_seqs[i].value;
            let hmm = Hmm::new(
                dye_seq,
                &self.dye_seq_pre[i],
                radiometry,
                &radiometry_pre,
                &self.universal,
                self.num_timesteps,
            );
            let score = hmm.probability();
            total_score += score * self.dye_seqs[i].source.count as f64;
            if score > best_score {
                best_score = score;
                best_i = Some(i);
            }
        }
        match best_i {
            Some(i) => ScoredClassification::new(self.dye_seqs[i].source.id, best_score, total_score),
            None => ScoredClassification::none(),
        }
    }

    /// Scores against the full candidate set.
    pub fn classify(&self, radiometry: &Radiometry) -> ScoredClassification {
        let all: Vec<usize> = (0..self.dye_seqs.len()).collect();
        self.classify_helper(radiometry, &all)
    }

    /// Scores against a restricted candidate shortlist, as the hybrid
    /// classifier's HMM rescoring stage does.
    pub fn classify_subset(&self, radiometry: &Radiometry, candidate_indices: &[usize]) -> ScoredClassification {
        self.classify_helper(radiometry, candidate_indices)
    }

    /// Classifies every radiometry in parallel, preserving input order.
    pub fn classify_all(&self, radiometries: &[Radiometry]) -> Vec<ScoredClassification> {
        radiometries.par_iter().map(|r| self.classify(r)).collect()
    }

    /// Per-candidate raw probabilities for one radiometry (the `score`
    /// entrypoint used by model-fitting diagnostics and the `fit` CLI).
    pub fn score(&self, radiometry: &Radiometry) -> Vec<f64> {
        let radiometry_pre =
            RadiometryPrecomputations::new(radiometry, self.seq_model, self.seq_settings, self.max_num_dyes);
        (0..self.dye_seqs.len())
            .map(|i| {
                let hmm = Hmm::new(
                    &self.dye_seqs[i].value,
                    &self.dye_seq_pre[i],
                    radiometry,
                    &radiometry_pre,
                    &self.universal,
                    self.num_timesteps,
                );
                hmm.probability()
            })
            .collect()
    }
}
