use std::path::PathBuf;

use clap::Parser;
use dyetrace::{
    classify::{HmmClassifier, HybridClassifier, NnClassifier},
    io,
    model::SequencingSettings,
};

use crate::file::ValidPathBuf;

fn single_model(path: &std::path::Path) -> eyre::Result<dyetrace::model::SequencingModel> {
    io::read_sequencing_models(path)?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("sequencing-model file {path:?} has no rows"))
}

/// Score every candidate dye sequence against each radiometry with the full
/// forward-algorithm HMM and report the best match.
#[derive(Debug, Parser)]
pub struct HmmCmd {
    /// Candidate dye-sequence file
    #[clap(long)]
    pub dye_seqs: ValidPathBuf,

    /// Sequencing-model CSV; the first row is used
    #[clap(long)]
    pub model: ValidPathBuf,

    /// Observed radiometries file
    #[clap(long)]
    pub radiometries: ValidPathBuf,

    /// Predictions CSV output
    #[clap(short, long)]
    pub output: PathBuf,

    /// Truncation radius for emission evaluation, in standard deviations
    #[clap(long, default_value_t = 5.0)]
    pub dist_cutoff: f64,
}

impl HmmCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("classify hmm");
        let (num_channels, dye_seqs) = io::read_dye_seqs(&self.dye_seqs)?;
        let seq_model = single_model(&self.model.0)?;
        let (num_timesteps, rad_channels, radiometries) = io::read_radiometries(&self.radiometries)?;
        eyre::ensure!(
            rad_channels == num_channels as usize,
            "radiometries file has {rad_channels} channels, dye-seqs file has {num_channels}"
        );
        let settings = SequencingSettings {
            dist_cutoff: self.dist_cutoff,
            ..SequencingSettings::default()
        };
        let classifier = HmmClassifier::new(num_timesteps, num_channels as usize, &seq_model, &settings, &dye_seqs);
        log::info!(
            "scoring {} radiometries against {} candidates",
            radiometries.len(),
            dye_seqs.len()
        );
        let classifications = classifier.classify_all(&radiometries);
        io::write_predictions(&self.output, &classifications)?;
        Ok(())
    }
}

/// Shortlist candidates for each radiometry with a weighted-approximate
/// k-NN vote over precomputed dye-tracks.
#[derive(Debug, Parser)]
pub struct NnCmd {
    /// Sequencing-model CSV; the first row is used (its per-channel `mu`
    /// scales the k-NN metric space)
    #[clap(long)]
    pub model: ValidPathBuf,

    /// Precomputed dye-tracks file, e.g. from `simulate dt`
    #[clap(long)]
    pub dye_tracks: ValidPathBuf,

    /// Observed radiometries file
    #[clap(long)]
    pub radiometries: ValidPathBuf,

    /// Predictions CSV output
    #[clap(short, long)]
    pub output: PathBuf,

    /// Number of approximate nearest neighbors to consider per radiometry
    #[clap(long, default_value_t = 10)]
    pub k: usize,

    /// Gaussian kernel bandwidth for neighbor weighting
    #[clap(long, default_value_t = 0.5)]
    pub sigma: f64,
}

impl NnCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("classify nn");
        let seq_model = single_model(&self.model.0)?;
        let (num_timesteps, num_channels, dye_tracks) = io::read_dye_tracks(&self.dye_tracks)?;
        let (rad_t, rad_c, radiometries) = io::read_radiometries(&self.radiometries)?;
        eyre::ensure!(
            (rad_t, rad_c) == (num_timesteps, num_channels),
            "radiometries file is {rad_t}x{rad_c}, dye-tracks file is {num_timesteps}x{num_channels}"
        );
        let classifier = NnClassifier::new(num_timesteps, num_channels, &seq_model, self.k, self.sigma, dye_tracks);
        log::info!("scoring {} radiometries", radiometries.len());
        let classifications = classifier.classify_all(&radiometries);
        io::write_predictions(&self.output, &classifications)?;
        Ok(())
    }
}

/// Shortlist with the k-NN classifier, then rescore the shortlist with the
/// full HMM.
#[derive(Debug, Parser)]
pub struct HybridCmd {
    /// Candidate dye-sequence file
    #[clap(long)]
    pub dye_seqs: ValidPathBuf,

    /// Sequencing-model CSV; the first row is used
    #[clap(long)]
    pub model: ValidPathBuf,

    /// Precomputed dye-tracks file, e.g. from `simulate dt`
    #[clap(long)]
    pub dye_tracks: ValidPathBuf,

    /// Observed radiometries file
    #[clap(long)]
    pub radiometries: ValidPathBuf,

    /// Predictions CSV output
    #[clap(short, long)]
    pub output: PathBuf,

    /// Number of approximate nearest neighbors to consider per radiometry
    #[clap(long, default_value_t = 10)]
    pub k: usize,

    /// Gaussian kernel bandwidth for neighbor weighting
    #[clap(long, default_value_t = 0.5)]
    pub sigma: f64,

    /// Size of the k-NN shortlist handed to the HMM rescoring stage
    #[clap(long, default_value_t = 5)]
    pub h: usize,

    /// Truncation radius for emission evaluation, in standard deviations
    #[clap(long, default_value_t = 5.0)]
    pub dist_cutoff: f64,
}

impl HybridCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("classify hybrid");
        let (num_channels, dye_seqs) = io::read_dye_seqs(&self.dye_seqs)?;
        let seq_model = single_model(&self.model.0)?;
        let (dt_t, dt_c, dye_tracks) = io::read_dye_tracks(&self.dye_tracks)?;
        eyre::ensure!(
            dt_c == num_channels as usize,
            "dye-tracks file has {dt_c} channels, dye-seqs file has {num_channels}"
        );
        let (rad_t, rad_c, radiometries) = io::read_radiometries(&self.radiometries)?;
        eyre::ensure!(
            (rad_t, rad_c) == (dt_t, dt_c),
            "radiometries file is {rad_t}x{rad_c}, dye-tracks file is {dt_t}x{dt_c}"
        );

        let settings = SequencingSettings {
            dist_cutoff: self.dist_cutoff,
            ..SequencingSettings::default()
        };
        let hmm_classifier = HmmClassifier::new(dt_t, num_channels as usize, &seq_model, &settings, &dye_seqs);
        let nn_classifier = NnClassifier::new(dt_t, dt_c, &seq_model, self.k, self.sigma, dye_tracks);
        let hybrid = HybridClassifier::new(hmm_classifier, nn_classifier, self.h, &dye_seqs);

        log::info!(
            "scoring {} radiometries against {} candidates (shortlist {})",
            radiometries.len(),
            dye_seqs.len(),
            self.h
        );
        let classifications = hybrid.classify_all(&radiometries);
        io::write_predictions(&self.output, &classifications)?;
        Ok(())
    }
}
