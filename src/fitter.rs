//! Iterative EM parameter fitting and its bootstrap confidence-interval
//! variant.
//!
//! Grounded in `original_source/cc_code/src/fitters/hmm-fitter.{h,cc}` for
//! the outer iteration (rebuild precomputations under the current model,
//! accumulate a [`crate::fit::SequencingModelFitter`] over every radiometry,
//! pin emission parameters to the prior, check `distance`) and
//! `fitters/bootstrap-fit.cc` for resampling with replacement and taking
//! per-parameter order statistics across refits.

use rand::Rng;
use rayon::prelude::*;

use crate::fit::SequencingModelFitter;
use crate::hmm::Hmm;
use crate::model::{DyeSeq, Radiometry, SequencingModel};
use crate::precompute::{DyeSeqPrecomputations, RadiometryPrecomputations, UniversalPrecomputations};
use crate::rng::stream_rng;

/// Fits a [`SequencingModel`] by Baum-Welch-style EM on a single dye
/// sequence and a fixed set of observed radiometries presumed to all arise
/// from it.
pub struct HmmFitter<'a> {
    pub dye_seq: &'a DyeSeq,
    pub num_timesteps: usize,
    pub num_channels: usize,
    pub max_iters: usize,
    pub stopping_threshold: f64,
}

impl<'a> HmmFitter<'a> {
    pub fn new(
        dye_seq: &'a DyeSeq,
        num_timesteps: usize,
        num_channels: usize,
        max_iters: usize,
        stopping_threshold: f64,
    ) -> Self {
        HmmFitter {
            dye_seq,
            num_timesteps,
            num_channels,
            max_iters,
            stopping_threshold,
        }
    }

    /// One E-step + M-step: accumulates sufficient statistics over every
    /// radiometry in `radiometries` under `model`, then produces the next
    /// iterate with emission parameters pinned to `model`.
    fn iterate(&self, model: &SequencingModel, radiometries: &[Radiometry]) -> SequencingModel {
        let dye_seq_pre = DyeSeqPrecomputations::new(self.dye_seq, model, self.num_timesteps, self.num_channels);
        let max_num_dyes = dye_seq_pre.max_num_dyes();
        let mut universal = UniversalPrecomputations::new(model, self.num_channels);
        universal.reserve(max_num_dyes);
        let settings = crate::model::SequencingSettings::default();

        let fitter = radiometries
            .par_iter()
            .map(|radiometry| {
                let radiometry_pre = RadiometryPrecomputations::new(radiometry, model, &settings, max_num_dyes);
                let hmm = Hmm::new(
                    self.dye_seq,
                    &dye_seq_pre,
                    radiometry,
                    &radiometry_pre,
                    &universal,
                    self.num_timesteps,
                );
                let mut local = SequencingModelFitter::new(self.num_channels);
                hmm.improve_fit(&mut local);
                local
            })
            .reduce(|| SequencingModelFitter::new(self.num_channels), |a, b| a + b);

        fitter.sequencing_model(model)
    }

    /// Runs EM to convergence, or until `max_iters` is exhausted, starting
    /// from `initial`.
    pub fn fit(&self, initial: &SequencingModel, radiometries: &[Radiometry]) -> SequencingModel {
        let mut model = initial.clone();
        for _ in 0..self.max_iters {
            let next = self.iterate(&model, radiometries);
            let distance = model.distance(&next);
            model = next;
            if distance < self.stopping_threshold {
                break;
            }
        }
        model
    }
}

/// One parameter bound per bootstrap confidence interval: `(lower, upper)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Per-parameter confidence bounds for a whole [`SequencingModel`], laid out
/// the same shape as the model itself.
#[derive(Debug, Clone)]
pub struct SequencingModelInterval {
    pub p_edman_failure: ParamInterval,
    pub p_detach: ParamInterval,
    pub channels: Vec<ChannelModelInterval>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelModelInterval {
    pub p_bleach: ParamInterval,
    pub p_dud: ParamInterval,
}

/// Resamples `radiometries` with replacement `num_rounds` times, refits each
/// resample independently, and reports per-parameter confidence bounds by
/// sorting the refit models. `confidence` is the interval width as a
/// fraction, e.g. `0.95`.
pub fn bootstrap_fit(
    fitter: &HmmFitter,
    initial: &SequencingModel,
    radiometries: &[Radiometry],
    num_rounds: usize,
    confidence: f64,
    seed: u64,
) -> (SequencingModel, SequencingModelInterval) {
    let point_estimate = fitter.fit(initial, radiometries);

    let refits: Vec<SequencingModel> = (0..num_rounds)
        .into_par_iter()
        .map(|round| {
            let mut rng = stream_rng(seed, round as u64);
            let resample: Vec<Radiometry> = (0..radiometries.len())
                .map(|_| radiometries[rng.gen_range(0..radiometries.len())].clone())
                .collect();
            fitter.fit(initial, &resample)
        })
        .collect();

    let interval = sequencing_model_interval(&refits, confidence);
    (point_estimate, interval)
}

fn param_interval(mut values: Vec<f64>, confidence: f64) -> ParamInterval {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let b = values.len();
    if b == 0 {
        return ParamInterval { lower: 0.0, upper: 0.0 };
    }
    let tail = (1.0 - confidence) / 2.0;
    let lo_idx = ((tail * b as f64) as usize).min(b - 1);
    let hi_idx = (((1.0 - tail) * b as f64) as usize).min(b - 1);
    ParamInterval {
        lower: values[lo_idx],
        upper: values[hi_idx],
    }
}

fn sequencing_model_interval(models: &[SequencingModel], confidence: f64) -> SequencingModelInterval {
    let num_channels = models.first().map_or(0, SequencingModel::num_channels);
    let p_edman_failure = param_interval(models.iter().map(|m| m.p_edman_failure).collect(), confidence);
    let p_detach = param_interval(models.iter().map(|m| m.p_detach).collect(), confidence);
    let channels = (0..num_channels)
        .map(|c| ChannelModelInterval {
            p_bleach: param_interval(models.iter().map(|m| m.channels[c].p_bleach).collect(), confidence),
            p_dud: param_interval(models.iter().map(|m| m.channels[c].p_dud).collect(), confidence),
        })
        .collect();
    SequencingModelInterval {
        p_edman_failure,
        p_detach,
        channels,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::model::ChannelModel;

    fn truth() -> SequencingModel {
        SequencingModel {
            p_edman_failure: 0.05,
            p_detach: 0.03,
            channels: vec![ChannelModel {
                p_bleach: 0.08,
                p_dud: 0.06,
                mu: 1000.0,
                sig: 0.15,
                bg_sig: 50.0,
            }],
        }
    }

    fn simulate_radiometries(model: &SequencingModel, dye_seq: &DyeSeq, num: usize, seed: u64) -> Vec<Radiometry> {
        (0..num)
            .map(|i| {
                let mut rng = stream_rng(seed, i as u64);
                crate::simulate::generate_radiometry(model, dye_seq, 4, 1, &mut rng)
            })
            .collect()
    }

    #[test]
    fn em_moves_toward_truth_from_a_perturbed_start() {
        let model = truth();
        let dye_seq = DyeSeq::parse(1, "0000");
        let radiometries = simulate_radiometries(&model, &dye_seq, 200, 11);

        let mut start = model.clone();
        start.p_edman_failure = 0.2;
        start.p_detach = 0.2;
        start.channels[0].p_bleach = 0.3;
        start.channels[0].p_dud = 0.3;

        let fitter = HmmFitter::new(&dye_seq, 4, 1, 8, 1e-6);
        let fit = fitter.fit(&start, &radiometries);

        let start_distance = start.distance(&model);
        let fit_distance = fit.distance(&model);
        assert!(fit_distance < start_distance);
    }

    #[test]
    fn bootstrap_interval_is_well_ordered() {
        let model = truth();
        let dye_seq = DyeSeq::parse(1, "0000");
        let radiometries = simulate_radiometries(&model, &dye_seq, 60, 22);
        let fitter = HmmFitter::new(&dye_seq, 4, 1, 4, 1e-6);
        let (point, interval) = bootstrap_fit(&fitter, &model, &radiometries, 20, 0.9, 5);
        assert!(interval.p_edman_failure.lower <= interval.p_edman_failure.upper);
        assert!(interval.channels[0].p_bleach.lower <= interval.channels[0].p_bleach.upper);
        assert!(point.p_edman_failure >= 0.0 && point.p_edman_failure <= 1.0);
    }
}
