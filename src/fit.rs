//! Expectation-maximization sufficient-statistic accumulators.
//!
//! Grounded in `original_source/cc_code/src/hmm/fit/{normal-distribution-
//! fitter,log-normal-distribution-fitter}.{h,cc}` for the moment-accumulator
//! shape, and `parameterization/fit/channel-model-fitter.{h,cc}` for the
//! per-channel bundle. `hmm/fit/error-model-fitter.{h,cc}` is the model for
//! the commutative `+`/`+=` merge used to combine per-radiometry fitters.

use std::ops::{Add, AddAssign, Mul};

use crate::model::{ChannelModel, SequencingModel};

/// Sufficient statistics for a single Bernoulli-at-each-opportunity
/// parameter (detach, Edman failure, per-channel bleach, per-channel dud):
/// an expected event count over an expected opportunity count.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParameterFitter {
    events: f64,
    opportunities: f64,
}

impl ParameterFitter {
    pub fn new() -> Self {
        ParameterFitter::default()
    }

    pub fn add(&mut self, events: f64, opportunities: f64) {
        self.events += events;
        self.opportunities += opportunities;
    }

    /// Maximum-likelihood estimate; 0 when no opportunities were observed.
    pub fn get(&self) -> f64 {
        if self.opportunities > 0.0 {
            self.events / self.opportunities
        } else {
            0.0
        }
    }
}

impl Add for ParameterFitter {
    type Output = ParameterFitter;
    fn add(self, other: ParameterFitter) -> ParameterFitter {
        ParameterFitter {
            events: self.events + other.events,
            opportunities: self.opportunities + other.opportunities,
        }
    }
}

impl AddAssign for ParameterFitter {
    fn add_assign(&mut self, other: ParameterFitter) {
        self.events += other.events;
        self.opportunities += other.opportunities;
    }
}

impl Mul<f64> for ParameterFitter {
    type Output = ParameterFitter;
    fn mul(self, weight: f64) -> ParameterFitter {
        ParameterFitter {
            events: self.events * weight,
            opportunities: self.opportunities * weight,
        }
    }
}

/// Weighted moment accumulator for a normal distribution over samples `x`
/// each carrying a dye count `n` (variance scales with `1/n`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalDistributionFitter {
    w_sum_x: f64,
    w_sum_x_sq_over_n: f64,
    w_sum_n: f64,
    total_weight: f64,
}

impl NormalDistributionFitter {
    pub fn new() -> Self {
        NormalDistributionFitter::default()
    }

    pub fn add_sample(&mut self, x: f64, n: u32, weight: f64) {
        if n == 0 {
            return;
        }
        let n = n as f64;
        self.w_sum_x += x * weight;
        self.w_sum_x_sq_over_n += x * (x * weight) / n;
        self.w_sum_n += n * weight;
        self.total_weight += weight;
    }

    pub fn mu(&self) -> f64 {
        self.w_sum_x / self.w_sum_n
    }

    pub fn sigma(&self) -> f64 {
        let mu = self.mu();
        ((self.w_sum_x_sq_over_n - mu * mu * self.w_sum_n) / self.total_weight).sqrt()
    }
}

impl Add for NormalDistributionFitter {
    type Output = NormalDistributionFitter;
    fn add(self, other: NormalDistributionFitter) -> NormalDistributionFitter {
        NormalDistributionFitter {
            w_sum_x: self.w_sum_x + other.w_sum_x,
            w_sum_x_sq_over_n: self.w_sum_x_sq_over_n + other.w_sum_x_sq_over_n,
            w_sum_n: self.w_sum_n + other.w_sum_n,
            total_weight: self.total_weight + other.total_weight,
        }
    }
}

impl AddAssign for NormalDistributionFitter {
    fn add_assign(&mut self, other: NormalDistributionFitter) {
        *self = *self + other;
    }
}

/// As [`NormalDistributionFitter`], but accumulating moments of
/// `log(x / n)` — the sufficient statistic for a log-normal emission model.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormalDistributionFitter {
    w_sum_log_x_over_n: f64,
    w_sum_log_x_over_n_sq: f64,
    total_weight: f64,
}

impl LogNormalDistributionFitter {
    pub fn new() -> Self {
        LogNormalDistributionFitter::default()
    }

    pub fn add_sample(&mut self, x: f64, n: u32, weight: f64) {
        if n == 0 || x <= 0.0 {
            return;
        }
        let log_x_over_n = (x / n as f64).ln();
        self.w_sum_log_x_over_n += weight * log_x_over_n;
        self.w_sum_log_x_over_n_sq += weight * log_x_over_n * log_x_over_n;
        self.total_weight += weight;
    }

    pub fn mu(&self) -> f64 {
        self.w_sum_log_x_over_n / self.total_weight
    }

    pub fn sigma(&self) -> f64 {
        let mu = self.mu();
        (self.w_sum_log_x_over_n_sq / self.total_weight - mu * mu).sqrt()
    }
}

impl Add for LogNormalDistributionFitter {
    type Output = LogNormalDistributionFitter;
    fn add(self, other: LogNormalDistributionFitter) -> LogNormalDistributionFitter {
        LogNormalDistributionFitter {
            w_sum_log_x_over_n: self.w_sum_log_x_over_n + other.w_sum_log_x_over_n,
            w_sum_log_x_over_n_sq: self.w_sum_log_x_over_n_sq + other.w_sum_log_x_over_n_sq,
            total_weight: self.total_weight + other.total_weight,
        }
    }
}

impl AddAssign for LogNormalDistributionFitter {
    fn add_assign(&mut self, other: LogNormalDistributionFitter) {
        *self = *self + other;
    }
}

/// Per-channel sufficient statistics: bleach/dud Bernoulli stats plus an
/// emission-distribution accumulator (whichever kind the caller is fitting).
#[derive(Debug, Clone, Default)]
pub struct ChannelModelFitter {
    pub p_bleach_fit: ParameterFitter,
    pub p_dud_fit: ParameterFitter,
    pub normal_fit: NormalDistributionFitter,
    pub log_normal_fit: LogNormalDistributionFitter,
}

impl ChannelModelFitter {
    pub fn new() -> Self {
        ChannelModelFitter::default()
    }

    /// Produces an updated channel model, keeping `prior`'s emission
    /// parameters (mu, sig, bg_sig) since classification pins them; callers
    /// fitting emission parameters overwrite them from `normal_fit`/
    /// `log_normal_fit` afterward.
    pub fn channel_model(&self, prior: &ChannelModel) -> ChannelModel {
        ChannelModel {
            p_bleach: self.p_bleach_fit.get(),
            p_dud: self.p_dud_fit.get(),
            mu: prior.mu,
            sig: prior.sig,
            bg_sig: prior.bg_sig,
        }
    }
}

impl Add for ChannelModelFitter {
    type Output = ChannelModelFitter;
    fn add(self, other: ChannelModelFitter) -> ChannelModelFitter {
        ChannelModelFitter {
            p_bleach_fit: self.p_bleach_fit + other.p_bleach_fit,
            p_dud_fit: self.p_dud_fit + other.p_dud_fit,
            normal_fit: self.normal_fit + other.normal_fit,
            log_normal_fit: self.log_normal_fit + other.log_normal_fit,
        }
    }
}

impl AddAssign for ChannelModelFitter {
    fn add_assign(&mut self, other: ChannelModelFitter) {
        self.p_bleach_fit += other.p_bleach_fit;
        self.p_dud_fit += other.p_dud_fit;
        self.normal_fit += other.normal_fit;
        self.log_normal_fit += other.log_normal_fit;
    }
}

/// Whole-model sufficient statistics accumulated by one `improve_fit` call
/// (or merged from many, one per radiometry).
#[derive(Debug, Clone)]
pub struct SequencingModelFitter {
    pub p_edman_failure_fit: ParameterFitter,
    pub p_detach_fit: ParameterFitter,
    pub channels: Vec<ChannelModelFitter>,
}

impl SequencingModelFitter {
    pub fn new(num_channels: usize) -> Self {
        SequencingModelFitter {
            p_edman_failure_fit: ParameterFitter::new(),
            p_detach_fit: ParameterFitter::new(),
            channels: vec![ChannelModelFitter::new(); num_channels],
        }
    }

    /// Produces the next EM iterate from `prior`. Emission parameters are
    /// carried over from `prior` unchanged (in the classification
    /// use-case the emission parameters are typically pinned").
    pub fn sequencing_model(&self, prior: &SequencingModel) -> SequencingModel {
        SequencingModel {
            p_edman_failure: self.p_edman_failure_fit.get(),
            p_detach: self.p_detach_fit.get(),
            channels: self
                .channels
                .iter()
                .zip(&prior.channels)
                .map(|(fit, prior)| fit.channel_model(prior))
                .collect(),
        }
    }
}

impl Add for SequencingModelFitter {
    type Output = SequencingModelFitter;
    fn add(mut self, other: SequencingModelFitter) -> SequencingModelFitter {
        self += other;
        self
    }
}

impl AddAssign for SequencingModelFitter {
    fn add_assign(&mut self, other: SequencingModelFitter) {
        self.p_edman_failure_fit += other.p_edman_failure_fit;
        self.p_detach_fit += other.p_detach_fit;
        for (a, b) in self.channels.iter_mut().zip(other.channels) {
            *a += b;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parameter_fitter_estimates_ratio() {
        let mut f = ParameterFitter::new();
        f.add(3.0, 10.0);
        f.add(1.0, 10.0);
        assert!((f.get() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn parameter_fitter_merge_is_commutative() {
        let mut a = ParameterFitter::new();
        a.add(2.0, 5.0);
        let mut b = ParameterFitter::new();
        b.add(1.0, 5.0);
        assert_eq!((a + b).get(), (b + a).get());
    }

    #[test]
    fn log_normal_fitter_recovers_known_parameters() {
        // log(x/n) samples centered at mu=1.0 with no spread.
        let mut f = LogNormalDistributionFitter::new();
        for n in [1u32, 2, 3] {
            let x = (n as f64) * std::f64::consts::E;
            f.add_sample(x, n, 1.0);
        }
        assert!((f.mu() - 1.0).abs() < 1e-9);
        assert!(f.sigma().abs() < 1e-9);
    }

    #[test]
    fn sequencing_model_fitter_pins_emission_params() {
        let prior = SequencingModel {
            p_edman_failure: 0.1,
            p_detach: 0.05,
            channels: vec![ChannelModel {
                p_bleach: 0.2,
                p_dud: 0.1,
                mu: 5000.0,
                sig: 0.16,
                bg_sig: 100.0,
            }],
        };
        let mut fitter = SequencingModelFitter::new(1);
        fitter.p_edman_failure_fit.add(1.0, 10.0);
        fitter.p_detach_fit.add(1.0, 20.0);
        fitter.channels[0].p_bleach_fit.add(3.0, 10.0);
        fitter.channels[0].p_dud_fit.add(2.0, 10.0);
        let next = fitter.sequencing_model(&prior);
        assert!((next.p_edman_failure - 0.1).abs() < 1e-12);
        assert!((next.p_detach - 0.05).abs() < 1e-12);
        assert_eq!(next.channels[0].mu, prior.channels[0].mu);
        assert_eq!(next.channels[0].bg_sig, prior.channels[0].bg_sig);
        assert!((next.channels[0].p_bleach - 0.3).abs() < 1e-12);
    }
}
