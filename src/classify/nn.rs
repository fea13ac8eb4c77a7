//! Weighted-approximate-k-NN pre-classifier.
//!
//! Grounded in
//! `original_source/cc_code/src/classifiers/nn-classifier.{h,cc}`: `KDTEntry`
//! indexes dye-track points by their expected intensity per `(t, c)`
//! (`channel.mu * dye_count`) rather than raw dye counts, so the metric space
//! matches the radiometry intensities `KDTQuery` queries against; scoring
//! is a Gaussian-kernel-weighted vote over each neighbor's source peptides,
//! normalized by how many distinct dye-tracks that peptide could have
//! produced.

use fnv::FnvHashMap;
use rayon::prelude::*;

use crate::kdtree::KdTree;
use crate::model::{DyeTrack, Radiometry, ScoredClassification, SequencingModel, SourceCountHitsList, Sourced};

pub struct NnClassifier {
    dye_tracks: Vec<Sourced<DyeTrack, SourceCountHitsList>>,
    kd_tree: KdTree,
    k: usize,
    two_sig_sq: f64,
}

impl NnClassifier {
    pub fn new(
        num_timesteps: usize,
        num_channels: usize,
        seq_model: &SequencingModel,
        k: usize,
        sig: f64,
        dye_tracks: Vec<Sourced<DyeTrack, SourceCountHitsList>>,
    ) -> Self {
        let points: Vec<Vec<f64>> = dye_tracks
            .iter()
            .map(|entry| {
                (0..num_timesteps * num_channels)
                    .map(|i| {
                        let c = i % num_channels;
                        let t = i / num_channels;
                        seq_model.channels[c].mu * entry.value.get(t, c) as f64
                    })
                    .collect()
            })
            .collect();
        let kd_tree = KdTree::build(points);
        NnClassifier {
            dye_tracks,
            kd_tree,
            k,
            two_sig_sq: 2.0 * sig * sig,
        }
    }

    fn classify_helper(&self, radiometry: &Radiometry) -> (FnvHashMap<i32, f64>, f64) {
        let mut id_score_map: FnvHashMap<i32, f64> = FnvHashMap::default();
        let mut total_score = 0.0;
        let query = radiometry.as_point();
        for (idx, dist_sq) in self.kd_tree.nearest(query, self.k) {
            let weight = (-dist_sq / self.two_sig_sq).exp();
            for hit in &self.dye_tracks[idx].source.0 {
                let count = hit.count as f64;
                let hits = hit.hits as f64;
                total_score += weight * hits;
                *id_score_map.entry(hit.id).or_insert(0.0) += weight * hits / count;
            }
        }
        (id_score_map, total_score)
    }

    pub fn classify(&self, radiometry: &Radiometry) -> ScoredClassification {
        let (id_score_map, total_score) = self.classify_helper(radiometry);
        let best = id_score_map
            .iter()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap());
        let result = match best {
            Some((&id, &score)) => ScoredClassification::new(id, score, total_score),
            None => ScoredClassification::none(),
        };
        result.fix_nan()
    }

    /// Keeps the `h` highest-scoring candidates, all sharing `total_score`
    /// as their normalizer — the shortlist the hybrid classifier rescores
    /// with the full HMM.
    pub fn classify_top_h(&self, radiometry: &Radiometry, h: usize) -> Vec<ScoredClassification> {
        let (id_score_map, total_score) = self.classify_helper(radiometry);
        let mut scored: Vec<ScoredClassification> = id_score_map
            .into_iter()
            .map(|(id, score)| ScoredClassification::new(id, score, total_score))
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(h);
        scored
    }

    /// Classifies every radiometry in parallel, preserving input order.
    pub fn classify_all(&self, radiometries: &[Radiometry]) -> Vec<ScoredClassification> {
        radiometries.par_iter().map(|r| self.classify(r)).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::{ChannelModel, SourceCountHits};

    fn model() -> SequencingModel {
        SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.03,
            channels: vec![ChannelModel {
                p_bleach: 0.05,
                p_dud: 0.07,
                mu: 1000.0,
                sig: 0.15,
                bg_sig: 50.0,
            }],
        }
    }

    fn track(counts: &[u16]) -> DyeTrack {
        let mut dt = DyeTrack::new(counts.len(), 1);
        for (t, &c) in counts.iter().enumerate() {
            dt.set(t, 0, c);
        }
        dt
    }

    #[test]
    fn nearest_dye_track_wins_the_vote() {
        let seq_model = model();
        let dye_tracks = vec![
            Sourced::new(
                track(&[2, 1]),
                SourceCountHitsList(vec![SourceCountHits { id: 1, count: 1, hits: 5 }]),
            ),
            Sourced::new(
                track(&[0, 0]),
                SourceCountHitsList(vec![SourceCountHits { id: 2, count: 1, hits: 5 }]),
            ),
        ];
        let classifier = NnClassifier::new(2, 1, &seq_model, 1, 200.0, dye_tracks);

        let mut radiometry = Radiometry::new(2, 1);
        radiometry.set(0, 0, 2000.0);
        radiometry.set(1, 0, 1000.0);

        let result = classifier.classify(&radiometry);
        assert_eq!(result.id, 1);
    }

    #[test]
    fn single_neighbor_score_and_total_follow_the_weighted_vote_formula() {
        // one dye-track, one source {id: 42, count: 2, hits: 3}; querying
        // exactly at that track's point gives kernel weight w = 1, so the
        // classifier should report score = w*hits/count = 1.5 and
        // total = w*hits = 3.0.
        let seq_model = model();
        let dye_tracks = vec![Sourced::new(
            track(&[4]),
            SourceCountHitsList(vec![SourceCountHits { id: 42, count: 2, hits: 3 }]),
        )];
        let classifier = NnClassifier::new(1, 1, &seq_model, 1, 200.0, dye_tracks);

        let mut radiometry = Radiometry::new(1, 1);
        radiometry.set(0, 0, seq_model.channels[0].mu * 4.0);

        let result = classifier.classify(&radiometry);
        assert_eq!(result.id, 42);
        assert!((result.score - 1.5).abs() < 1e-9);
        assert!((result.total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn top_h_returns_at_most_h_candidates_sorted_descending() {
        let seq_model = model();
        let dye_tracks = (0..5)
            .map(|i| {
                Sourced::new(
                    track(&[i as u16, 0]),
                    SourceCountHitsList(vec![SourceCountHits { id: i, count: 1, hits: 1 }]),
                )
            })
            .collect();
        let classifier = NnClassifier::new(2, 1, &seq_model, 5, 500.0, dye_tracks);
        let mut radiometry = Radiometry::new(2, 1);
        radiometry.set(0, 0, 3000.0);
        let top = classifier.classify_top_h(&radiometry, 2);
        assert!(top.len() <= 2);
        for w in top.windows(2) {
            assert!(w[0].score >= w[1].score);
        }
    }
}
