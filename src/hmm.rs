//! Assembles one candidate-dye-sequence/radiometry pair into a `Step`
//! pipeline and runs the forward/backward recursions over it.
//!
//! Pipeline order is grounded in `original_source/cc_code/src/hmm/hmm.cc`:
//! `Start`; one `Dud` per channel; `Emission` at `t=0`; then for each
//! remaining timestep, `Detach`, one `Bleach` per channel, `Edman`,
//! `Emission`.

use crate::fit::{LogNormalDistributionFitter, NormalDistributionFitter, SequencingModelFitter};
use crate::model::{DyeSeq, Radiometry};
use crate::ops::Step;
use crate::precompute::{DyeSeqPrecomputations, RadiometryPrecomputations, UniversalPrecomputations};
use crate::tensor::Tensor;

pub struct Hmm<'a> {
    dye_seq: &'a DyeSeq,
    dye_seq_pre: &'a DyeSeqPrecomputations,
    radiometry: &'a Radiometry,
    radiometry_pre: &'a RadiometryPrecomputations,
    universal: &'a UniversalPrecomputations,
    num_timesteps: usize,
}

impl<'a> Hmm<'a> {
    pub fn new(
        dye_seq: &'a DyeSeq,
        dye_seq_pre: &'a DyeSeqPrecomputations,
        radiometry: &'a Radiometry,
        radiometry_pre: &'a RadiometryPrecomputations,
        universal: &'a UniversalPrecomputations,
        num_timesteps: usize,
    ) -> Self {
        Hmm {
            dye_seq,
            dye_seq_pre,
            radiometry,
            radiometry_pre,
            universal,
            num_timesteps,
        }
    }

    fn steps(&self) -> Vec<Step<'a>> {
        let num_channels = self.universal.num_channels;
        let mut steps = Vec::new();
        steps.push(Step::Start);
        for c in 0..num_channels {
            steps.push(Step::Dud(&self.universal.dud[c]));
        }
        steps.push(Step::Emission {
            emission: &self.radiometry_pre.emission,
            t: 0,
            radiometry: self.radiometry,
        });
        for t in 1..self.num_timesteps {
            steps.push(Step::Detach(&self.universal.detach));
            for c in 0..num_channels {
                steps.push(Step::Bleach(&self.universal.bleach[c]));
            }
            steps.push(Step::Edman {
                edman: &self.dye_seq_pre.edman,
                dye_seq: self.dye_seq,
                dye_track: &self.dye_seq_pre.dye_track,
            });
            steps.push(Step::Emission {
                emission: &self.radiometry_pre.emission,
                t,
                radiometry: self.radiometry,
            });
        }
        steps.push(Step::Finish);
        steps
    }

    /// Total probability mass of the observed radiometry under this
    /// candidate, i.e. the forward algorithm's terminal sum.
    pub fn probability(&self) -> f64 {
        let steps = self.steps();
        let shape = self.dye_seq_pre.tensor_shape.clone();
        let mut cur = Tensor::new(shape.clone());
        let mut next = Tensor::new(shape);
        let mut edmans = 0usize;
        for step in &steps {
            step.forward(edmans, &cur, &mut next);
            std::mem::swap(&mut cur, &mut next);
            if matches!(step, Step::Edman { .. }) {
                edmans += 1;
            }
        }
        cur.sum()
    }

    /// Runs the full forward/backward recursion, accumulating every
    /// transition and emission operator's sufficient statistics into
    /// `fitter`, and returns this pair's probability (the EM E-step).
    pub fn improve_fit(&self, fitter: &mut SequencingModelFitter) -> f64 {
        let steps = self.steps();
        let shape = self.dye_seq_pre.tensor_shape.clone();

        let mut forward = Vec::with_capacity(steps.len() + 1);
        let mut edmans_at = Vec::with_capacity(steps.len());
        forward.push(Tensor::new(shape.clone()));
        let mut edmans = 0usize;
        for step in &steps {
            edmans_at.push(edmans);
            let mut next = Tensor::new(shape.clone());
            step.forward(edmans, forward.last().unwrap(), &mut next);
            if matches!(step, Step::Edman { .. }) {
                edmans += 1;
            }
            forward.push(next);
        }
        let probability = forward.last().unwrap().sum();

        let mut backward = vec![Tensor::new(shape.clone()); steps.len() + 1];
        for i in (0..steps.len()).rev() {
            let (head, tail) = backward.split_at_mut(i + 1);
            steps[i].backward(edmans_at[i], &tail[0], &mut head[i]);
        }

        let mut normal_fits: Vec<NormalDistributionFitter> =
            fitter.channels.iter().map(|c| c.normal_fit).collect();
        let mut log_normal_fits: Vec<LogNormalDistributionFitter> =
            fitter.channels.iter().map(|c| c.log_normal_fit).collect();

        for (i, step) in steps.iter().enumerate() {
            let e = edmans_at[i];
            match step {
                Step::Start | Step::Finish => {}
                Step::Dud(b) => b.improve_fit(
                    e,
                    &forward[i],
                    &backward[i + 1],
                    probability,
                    &mut fitter.channels[b.channel].p_dud_fit,
                ),
                Step::Bleach(b) => b.improve_fit(
                    e,
                    &forward[i],
                    &backward[i + 1],
                    probability,
                    &mut fitter.channels[b.channel].p_bleach_fit,
                ),
                Step::Detach(d) => {
                    d.improve_fit(e, &forward[i], &backward[i + 1], probability, &mut fitter.p_detach_fit)
                }
                Step::Edman { edman, .. } => edman.improve_fit(
                    e,
                    &forward[i],
                    &backward[i + 1],
                    probability,
                    &mut fitter.p_edman_failure_fit,
                ),
                Step::Emission { emission, t, radiometry } => emission.improve_fit(
                    *t,
                    e,
                    &forward[i + 1],
                    &backward[i + 1],
                    probability,
                    radiometry,
                    &mut normal_fits,
                    &mut log_normal_fits,
                ),
            }
        }

        for (c, chan) in fitter.channels.iter_mut().enumerate() {
            chan.normal_fit = normal_fits[c];
            chan.log_normal_fit = log_normal_fits[c];
        }

        probability
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fit::SequencingModelFitter;
    use crate::model::{ChannelModel, SequencingModel, SequencingSettings};
    use crate::ops::DistributionKind;

    fn uniform_model(num_channels: usize) -> SequencingModel {
        SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.02,
            channels: (0..num_channels)
                .map(|_| ChannelModel {
                    p_bleach: 0.05,
                    p_dud: 0.07,
                    mu: 1.0,
                    sig: 0.1,
                    bg_sig: 0.05,
                })
                .collect(),
        }
    }

    #[test]
    fn probability_is_one_under_uniform_emission_with_no_loss() {
        // zero detach/bleach/dud/edman-failure and a
        // uniform emission density collapse the HMM to "mass is
        // conserved", so probability is exactly 1 regardless of the
        // observed radiometry.
        let model = SequencingModel {
            p_edman_failure: 0.0,
            p_detach: 0.0,
            channels: vec![ChannelModel {
                p_bleach: 0.0,
                p_dud: 0.0,
                mu: 1.0,
                sig: 1.0,
                bg_sig: 1.0,
            }],
        };
        let dye_seq = DyeSeq::parse(1, "00");
        let dye_seq_pre = DyeSeqPrecomputations::new(&dye_seq, &model, 3, 1);
        let max_num_dyes = dye_seq_pre.max_num_dyes();
        let mut universal = UniversalPrecomputations::new(&model, 1);
        universal.reserve(max_num_dyes);
        let radiometry = Radiometry::new(3, 1);
        let settings = SequencingSettings {
            dist_cutoff: 5.0,
            distribution: DistributionKind::Uniform,
        };
        let radiometry_pre = RadiometryPrecomputations::new(&radiometry, &model, &settings, max_num_dyes);
        let hmm = Hmm::new(&dye_seq, &dye_seq_pre, &radiometry, &radiometry_pre, &universal, 3);
        assert!((hmm.probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn probability_is_one_under_uniform_emission_regardless_of_loss_rates() {
        // a uniform emission density makes every forward step
        // probability-conserving on its own, so nonzero detach/bleach/dud/
        // edman-failure rates still leave total probability at 1.
        let model = SequencingModel {
            p_edman_failure: 0.45,
            p_detach: 0.15,
            channels: (0..2)
                .map(|_| ChannelModel {
                    p_bleach: 0.35,
                    p_dud: 0.25,
                    mu: 1.0,
                    sig: 1.0,
                    bg_sig: 1.0,
                })
                .collect(),
        };
        let dye_seq = DyeSeq::parse(2, "10.01111");
        let dye_seq_pre = DyeSeqPrecomputations::new(&dye_seq, &model, 3, 2);
        let max_num_dyes = dye_seq_pre.max_num_dyes();
        let mut universal = UniversalPrecomputations::new(&model, 2);
        universal.reserve(max_num_dyes);
        let radiometry = Radiometry::new(3, 2);
        let settings = SequencingSettings {
            dist_cutoff: 5.0,
            distribution: DistributionKind::Uniform,
        };
        let radiometry_pre = RadiometryPrecomputations::new(&radiometry, &model, &settings, max_num_dyes);
        let hmm = Hmm::new(&dye_seq, &dye_seq_pre, &radiometry, &radiometry_pre, &universal, 3);
        assert!((hmm.probability() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn improve_fit_accumulates_positive_opportunities() {
        let model = uniform_model(1);
        let dye_seq = DyeSeq::parse(1, "000");
        let dye_seq_pre = DyeSeqPrecomputations::new(&dye_seq, &model, 4, 1);
        let max_num_dyes = dye_seq_pre.max_num_dyes();
        let mut universal = UniversalPrecomputations::new(&model, 1);
        universal.reserve(max_num_dyes);
        let mut radiometry = Radiometry::new(4, 1);
        for t in 0..4 {
            radiometry.set(t, 0, 3.0 - t as f64 * 0.5);
        }
        let settings = SequencingSettings::default();
        let radiometry_pre = RadiometryPrecomputations::new(&radiometry, &model, &settings, max_num_dyes);
        let hmm = Hmm::new(&dye_seq, &dye_seq_pre, &radiometry, &radiometry_pre, &universal, 4);

        let mut fitter = SequencingModelFitter::new(1);
        let probability = hmm.improve_fit(&mut fitter);
        assert!(probability > 0.0);
        assert!(fitter.p_edman_failure_fit.get() >= 0.0);
        assert!(fitter.p_detach_fit.get() >= 0.0);
        assert!(fitter.channels[0].p_dud_fit.get() >= 0.0);
    }
}
