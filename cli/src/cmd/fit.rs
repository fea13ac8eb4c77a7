use std::path::PathBuf;

use clap::Parser;
use dyetrace::{
    fitter::{self, HmmFitter, SequencingModelInterval},
    io,
    model::{ChannelModel, DyeSeq, SequencingModel},
};

use crate::cmd::wall_time_seed;
use crate::file::ValidPathBuf;

fn single_model(path: &std::path::Path) -> eyre::Result<SequencingModel> {
    io::read_sequencing_models(path)?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("sequencing-model file {path:?} has no rows"))
}

fn interval_bound(model: &SequencingModel, interval: &SequencingModelInterval, pick: fn(f64, f64) -> f64) -> SequencingModel {
    SequencingModel {
        p_edman_failure: pick(interval.p_edman_failure.lower, interval.p_edman_failure.upper),
        p_detach: pick(interval.p_detach.lower, interval.p_detach.upper),
        channels: model
            .channels
            .iter()
            .zip(&interval.channels)
            .map(|(ch, bound)| ChannelModel {
                p_bleach: pick(bound.p_bleach.lower, bound.p_bleach.upper),
                p_dud: pick(bound.p_dud.lower, bound.p_dud.upper),
                mu: ch.mu,
                sig: ch.sig,
                bg_sig: ch.bg_sig,
            })
            .collect(),
    }
}

/// Fit a sequencing model's error parameters to observed radiometries of a
/// single known peptide by Baum-Welch-style expectation maximization
/// optionally with a bootstrap confidence interval.
#[derive(Debug, Parser)]
pub struct FitCmd {
    /// The known peptide's dye sequence, e.g. `0011.`
    #[clap(long)]
    pub dye_seq: String,

    /// Number of dye channels in `dye_seq`
    #[clap(long)]
    pub num_channels: u8,

    /// Observed radiometries file, presumed all drawn from `dye_seq`
    #[clap(long)]
    pub radiometries: ValidPathBuf,

    /// Initial sequencing-model CSV to iterate from; the first row is used
    #[clap(long)]
    pub initial_model: ValidPathBuf,

    /// Sequencing-model CSV output: the point estimate, or the point
    /// estimate plus bootstrap lower/upper bound rows if `--bootstrap` is
    /// given
    #[clap(short, long)]
    pub output: PathBuf,

    /// Maximum EM iterations per fit
    #[clap(long, default_value_t = 100)]
    pub max_iters: usize,

    /// EM stops early once consecutive iterates' `distance` drops below this
    #[clap(long, default_value_t = 1e-6)]
    pub stopping_threshold: f64,

    /// Number of bootstrap resampling rounds; omit to skip bootstrapping
    #[clap(long)]
    pub bootstrap: Option<usize>,

    /// Bootstrap confidence interval width, as a fraction
    #[clap(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// PRNG seed for bootstrap resampling; defaults to one derived from
    /// wall time
    #[clap(long)]
    pub seed: Option<u64>,
}

impl FitCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("fit");
        let dye_seq = DyeSeq::parse(self.num_channels, &self.dye_seq);
        let (num_timesteps, rad_channels, radiometries) = io::read_radiometries(&self.radiometries)?;
        eyre::ensure!(
            rad_channels == self.num_channels as usize,
            "radiometries file has {rad_channels} channels, --num-channels is {}",
            self.num_channels
        );
        let initial = single_model(&self.initial_model.0)?;

        let hmm_fitter = HmmFitter::new(
            &dye_seq,
            num_timesteps,
            self.num_channels as usize,
            self.max_iters,
            self.stopping_threshold,
        );

        let models = if let Some(num_rounds) = self.bootstrap {
            let seed = self.seed.unwrap_or_else(wall_time_seed);
            log::info!("bootstrapping {num_rounds} rounds with seed {seed}");
            let (point, interval) =
                fitter::bootstrap_fit(&hmm_fitter, &initial, &radiometries, num_rounds, self.confidence, seed);
            vec![
                point.clone(),
                interval_bound(&point, &interval, f64::min),
                interval_bound(&point, &interval, f64::max),
            ]
        } else {
            log::info!("fitting {} radiometries", radiometries.len());
            vec![hmm_fitter.fit(&initial, &radiometries)]
        };

        io::write_sequencing_models(&self.output, &models)?;
        Ok(())
    }
}
