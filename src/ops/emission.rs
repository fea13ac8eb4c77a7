//! Emission operator: per-channel intensity likelihood.
//!
//! No `pdf`-evaluation body for the original emission class was retrieved
//! (`fwd-alg/emission.h` declares `std::function<double(double,int)> pdf`
//! supplied by the caller but its construction site was not in the pack),
//! so the density formulas here are derived directly from spec text and
//! checked by hand against worked examples in the unit tests.

use crate::fit::{LogNormalDistributionFitter, NormalDistributionFitter};
use crate::model::{Radiometry, SequencingModel};
use crate::tensor::Tensor;

use std::f64::consts::PI;

/// Which emission density the precomputed table was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    /// `N(d·mu, sqrt(bg_sig^2 + d·sig^2))` — used for classification, where
    /// callers typically pass a model already rescaled via
    /// [`SequencingModel::with_mu_as_one`].
    Gaussian,
    /// A normal density over `log(x/d)` with the standard `1/x` Jacobian
    /// (zero dyes fall back to a pure-background Gaussian) — used when
    /// fitting or scoring under a log-normal intensity model.
    LogNormal,
    /// PDF identically 1 regardless of observation or dye count. Used by
    /// normalization test fixtures, where the emission factor is dropped out
    /// entirely so `Hmm::probability()` reduces to a pure transition-mass
    /// check.
    Uniform,
}

fn gaussian_pdf(x: f64, mean: f64, sigma: f64) -> f64 {
    if sigma <= 0.0 {
        return if x == mean { 1.0 } else { 0.0 };
    }
    let z = (x - mean) / sigma;
    (-0.5 * z * z).exp() / (sigma * (2.0 * PI).sqrt())
}

fn channel_pdf(kind: DistributionKind, x: f64, d: u32, mu: f64, sig: f64, bg_sig: f64) -> f64 {
    if kind == DistributionKind::Uniform {
        return 1.0;
    }
    if d == 0 {
        return gaussian_pdf(x, 0.0, bg_sig);
    }
    match kind {
        DistributionKind::Gaussian => gaussian_pdf(x, d as f64 * mu, (bg_sig * bg_sig + d as f64 * sig * sig).sqrt()),
        DistributionKind::LogNormal => {
            if x <= 0.0 {
                0.0
            } else {
                gaussian_pdf((x / d as f64).ln(), mu, sig) / x
            }
        }
        DistributionKind::Uniform => unreachable!(),
    }
}

/// A precomputed `pdf[t][c][d]` table for one radiometry, shared across
/// every candidate dye sequence evaluated against it.
#[derive(Debug, Clone)]
pub struct Emission {
    table: Vec<f64>,
    num_timesteps: usize,
    num_channels: usize,
    max_num_dyes: usize,
    kind: DistributionKind,
}

impl Emission {
    pub fn new(
        radiometry: &Radiometry,
        model: &SequencingModel,
        max_num_dyes: usize,
        kind: DistributionKind,
    ) -> Self {
        let num_timesteps = radiometry.num_timesteps;
        let num_channels = radiometry.num_channels;
        let mut table = vec![0.0; num_timesteps * num_channels * (max_num_dyes + 1)];
        for t in 0..num_timesteps {
            for c in 0..num_channels {
                let ch = &model.channels[c];
                let x = radiometry.get(t, c);
                for d in 0..=max_num_dyes {
                    let idx = (t * num_channels + c) * (max_num_dyes + 1) + d;
                    table[idx] = channel_pdf(kind, x, d as u32, ch.mu, ch.sig, ch.bg_sig);
                }
            }
        }
        Emission {
            table,
            num_timesteps,
            num_channels,
            max_num_dyes,
            kind,
        }
    }

    #[inline]
    fn pdf(&self, t: usize, c: usize, d: usize) -> f64 {
        self.table[(t * self.num_channels + c) * (self.max_num_dyes + 1) + d]
    }

    /// Multiplies every live cell by `Π_c pdf[t][c][k_c]`.
    pub fn forward(&self, t: usize, edmans: usize, input: &Tensor, output: &mut Tensor) {
        let bound = input.edman_bound(edmans);
        for flat in 0..bound {
            let coords = input.coords(flat);
            let mut factor = 1.0;
            for c in 0..self.num_channels {
                factor *= self.pdf(t, c, coords[1 + c]);
            }
            output.values[flat] = input.values[flat] * factor;
        }
    }

    /// Symmetric in forward/backward.
    pub fn backward(&self, t: usize, edmans: usize, input: &Tensor, output: &mut Tensor) {
        self.forward(t, edmans, input, output);
    }

    /// Emits weighted `(intensity, dye count, posterior)` samples into
    /// per-channel distribution accumulators.
    pub fn improve_fit(
        &self,
        t: usize,
        edmans: usize,
        forward: &Tensor,
        backward: &Tensor,
        probability: f64,
        radiometry: &Radiometry,
        normal_fits: &mut [NormalDistributionFitter],
        log_normal_fits: &mut [LogNormalDistributionFitter],
    ) {
        let bound = forward.edman_bound(edmans);
        for flat in 0..bound {
            let posterior = forward.values[flat] * backward.values[flat] / probability;
            if posterior == 0.0 {
                continue;
            }
            let coords = forward.coords(flat);
            for c in 0..self.num_channels {
                let d = coords[1 + c] as u32;
                let x = radiometry.get(t, c);
                match self.kind {
                    DistributionKind::Gaussian => normal_fits[c].add_sample(x, d, posterior),
                    DistributionKind::LogNormal => log_normal_fits[c].add_sample(x, d, posterior),
                    DistributionKind::Uniform => {}
                }
            }
        }
    }
}
