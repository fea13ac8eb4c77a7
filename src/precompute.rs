//! Per-dye-seq, per-radiometry, and universal precomputations.
//!
//! Grounded in `original_source/cc_code/src/hmm/precomputations/dye-seq-
//! precomputations.{h,cc}`, `hmm/radiometry-precomputations.h`, and
//! `hmm/universal-precomputations.h`: these are plain owning structs that an
//! [`crate::hmm::Hmm`] borrows references into for the span of one
//! `classify` call, kept shared but not owned.

use crate::model::{DyeSeq, DyeTrack, Radiometry, SequencingModel, SequencingSettings};
use crate::ops::{Binomial, Detach, DistributionKind, Edman, Emission};

/// Tensor shape, dye track, and Edman transition for one candidate dye
/// sequence, shared across every radiometry scored against it.
#[derive(Debug, Clone)]
pub struct DyeSeqPrecomputations {
    pub tensor_shape: Vec<usize>,
    pub dye_track: DyeTrack,
    pub edman: Edman,
}

impl DyeSeqPrecomputations {
    pub fn new(
        dye_seq: &DyeSeq,
        seq_model: &SequencingModel,
        num_timesteps: usize,
        num_channels: usize,
    ) -> Self {
        let dye_track = DyeTrack::from_dye_seq(num_timesteps, num_channels, dye_seq);
        let mut tensor_shape = Vec::with_capacity(1 + num_channels);
        tensor_shape.push(num_timesteps + 1);
        for c in 0..num_channels {
            tensor_shape.push(1 + dye_track.max_in_channel(c) as usize);
        }
        DyeSeqPrecomputations {
            tensor_shape,
            dye_track,
            edman: Edman::new(seq_model.p_edman_failure),
        }
    }

    /// The largest per-channel dye count this dye sequence ever carries,
    /// i.e. `tensor_shape[1..] - 1` maxed over channels. Callers combine
    /// this across every candidate dye sequence to size the shared
    /// binomial tables before any worker thread starts.
    pub fn max_num_dyes(&self) -> usize {
        self.tensor_shape[1..].iter().map(|&s| s - 1).max().unwrap_or(0)
    }
}

/// The emission table for one radiometry, shared across every candidate dye
/// sequence scored against it.
#[derive(Debug, Clone)]
pub struct RadiometryPrecomputations {
    pub emission: Emission,
}

impl RadiometryPrecomputations {
    pub fn new(
        radiometry: &Radiometry,
        seq_model: &SequencingModel,
        settings: &SequencingSettings,
        max_num_dyes: usize,
    ) -> Self {
        RadiometryPrecomputations {
            emission: Emission::new(radiometry, seq_model, max_num_dyes, settings.distribution),
        }
    }
}

/// Sequencing-model-derived operators shared by every (dye-seq, radiometry)
/// pair: detach, and per-channel dud/bleach binomial transitions. Built once
/// per sequencing model; `reserve` must be called to the final
/// `max_num_dyes` across all candidates before classification workers start
/// reading it.
#[derive(Debug, Clone)]
pub struct UniversalPrecomputations {
    pub detach: Detach,
    pub dud: Vec<Binomial>,
    pub bleach: Vec<Binomial>,
    pub num_channels: usize,
}

impl UniversalPrecomputations {
    pub fn new(seq_model: &SequencingModel, num_channels: usize) -> Self {
        let dud = (0..num_channels)
            .map(|c| Binomial::new(c, seq_model.channels[c].p_dud))
            .collect();
        let bleach = (0..num_channels)
            .map(|c| Binomial::new(c, seq_model.channels[c].p_bleach))
            .collect();
        UniversalPrecomputations {
            detach: Detach::new(seq_model.p_detach),
            dud,
            bleach,
            num_channels,
        }
    }

    /// Grows every per-channel binomial table to `max_num_dyes`. Must be
    /// called from the single thread that owns this struct before it is
    /// shared (read-only) with worker threads.
    pub fn reserve(&mut self, max_num_dyes: usize) {
        for b in self.dud.iter_mut().chain(self.bleach.iter_mut()) {
            b.reserve(max_num_dyes);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dye_seq_precomputations_shape_matches_max_dye_counts() {
        let ds = DyeSeq::parse(2, "0011111");
        let model = SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.05,
            channels: vec![
                crate::model::ChannelModel {
                    p_bleach: 0.1,
                    p_dud: 0.1,
                    mu: 1.0,
                    sig: 0.1,
                    bg_sig: 0.0,
                };
                2
            ],
        };
        let pre = DyeSeqPrecomputations::new(&ds, &model, 3, 2);
        // 2 ch0 dyes, 5 ch1 dyes -> shape [4, 3, 6].
        assert_eq!(pre.tensor_shape, vec![4, 3, 6]);
        assert_eq!(pre.max_num_dyes(), 5);
    }

    #[test]
    fn universal_precomputations_reserve_grows_all_tables() {
        let model = SequencingModel {
            p_edman_failure: 0.1,
            p_detach: 0.1,
            channels: vec![crate::model::ChannelModel {
                p_bleach: 0.2,
                p_dud: 0.3,
                mu: 1.0,
                sig: 0.1,
                bg_sig: 0.0,
            }],
        };
        let mut universal = UniversalPrecomputations::new(&model, 1);
        universal.reserve(4);
        assert!((universal.dud[0].prob(4, 4) - 0.7f64.powi(4)).abs() < 1e-9);
    }
}
