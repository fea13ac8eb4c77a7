//! Hybrid classifier: NN shortlist, HMM rescoring, subfraction weighting.
//!
//! Grounded in
//! `original_source/cc_code/src/classifiers/hybrid-classifier.{h,cc}`. The
//! original's top-h NN shortlist comes out of a min-heap popped in ascending
//! order, so its `candidates.back()` is the *highest*-scoring NN candidate;
//! [`crate::classify::nn::NnClassifier::classify_top_h`] instead returns its
//! shortlist already sorted descending, so the equivalent fallback here is
//! `candidates.first()`.

use fnv::FnvHashMap;
use rayon::prelude::*;

use crate::classify::hmm::HmmClassifier;
use crate::classify::nn::NnClassifier;
use crate::model::{DyeSeq, Radiometry, ScoredClassification, SourceCount, Sourced};

pub struct HybridClassifier<'a> {
    hmm_classifier: HmmClassifier<'a>,
    nn_classifier: NnClassifier,
    id_index_map: FnvHashMap<i32, usize>,
    id_count_map: FnvHashMap<i32, u32>,
    h: usize,
}

impl<'a> HybridClassifier<'a> {
    pub fn new(
        hmm_classifier: HmmClassifier<'a>,
        nn_classifier: NnClassifier,
        h: usize,
        dye_seqs: &'a [Sourced<DyeSeq, SourceCount>],
    ) -> Self {
        let mut id_index_map = FnvHashMap::default();
        let mut id_count_map = FnvHashMap::default();
        for (i, entry) in dye_seqs.iter().enumerate() {
            id_index_map.insert(entry.source.id, i);
            id_count_map.insert(entry.source.id, entry.source.count);
        }
        HybridClassifier {
            hmm_classifier,
            nn_classifier,
            id_index_map,
            id_count_map,
            h,
        }
    }

    pub fn classify(&self, radiometry: &Radiometry) -> ScoredClassification {
        let candidates = self.nn_classifier.classify_top_h(radiometry, self.h);
        let mut subfraction = 0.0;
        let mut candidate_indices = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            subfraction += candidate.adjusted_score() * self.id_count_map[&candidate.id] as f64;
            candidate_indices.push(self.id_index_map[&candidate.id]);
        }
        let mut result = self.hmm_classifier.classify_subset(radiometry, &candidate_indices);
        if result.id == -1 {
            result = *candidates.first().unwrap_or(&ScoredClassification::none());
        } else {
            result.score *= subfraction;
        }
        result.fix_nan()
    }

    /// Classifies every radiometry in parallel, preserving input order.
    pub fn classify_all(&self, radiometries: &[Radiometry]) -> Vec<ScoredClassification> {
        radiometries.par_iter().map(|r| self.classify(r)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ChannelModel, DyeTrack, SequencingModel, SequencingSettings, SourceCountHits, SourceCountHitsList};

    #[test]
    fn falls_back_to_best_nn_candidate_when_no_shortlist_matches_hmm() {
        let seq_model = SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.03,
            channels: vec![ChannelModel {
                p_bleach: 0.05,
                p_dud: 0.07,
                mu: 1000.0,
                sig: 0.15,
                bg_sig: 50.0,
            }],
        };
        let settings = SequencingSettings::default();
        let dye_seqs = vec![Sourced::new(DyeSeq::parse(1, "0"), SourceCount { id: 1, count: 1 })];
        let hmm_classifier = HmmClassifier::new(2, 1, &seq_model, &settings, &dye_seqs);

        let mut track0 = DyeTrack::new(2, 1);
        track0.set(0, 0, 1);
        let dye_tracks = vec![Sourced::new(
            track0,
            SourceCountHitsList(vec![SourceCountHits { id: 1, count: 1, hits: 1 }]),
        )];
        let nn_classifier = NnClassifier::new(2, 1, &seq_model, 1, 500.0, dye_tracks);

        let hybrid = HybridClassifier::new(hmm_classifier, nn_classifier, 1, &dye_seqs);
        let mut radiometry = Radiometry::new(2, 1);
        radiometry.set(0, 0, 1000.0);
        let result = hybrid.classify(&radiometry);
        assert_eq!(result.id, 1);
    }
}
