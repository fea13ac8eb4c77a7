use std::path::PathBuf;

use clap::Parser;
use dyetrace::{io, simulate};

use crate::cmd::wall_time_seed;
use crate::file::ValidPathBuf;

fn single_model(path: &std::path::Path) -> eyre::Result<dyetrace::model::SequencingModel> {
    io::read_sequencing_models(path)?
        .into_iter()
        .next()
        .ok_or_else(|| eyre::eyre!("sequencing-model file {path:?} has no rows"))
}

/// Sample radiometries (and their ground-truth peptide IDs) from a
/// peptide set and sequencing model.
#[derive(Debug, Parser)]
pub struct RadCmd {
    /// Peptide dye-sequence file, drawn from weighted by multiplicity
    #[clap(long)]
    pub dye_seqs: ValidPathBuf,

    /// Sequencing-model CSV; the first row is used
    #[clap(long)]
    pub model: ValidPathBuf,

    /// Number of Edman cycles to simulate
    #[clap(long)]
    pub num_timesteps: usize,

    /// Radiometries file output
    #[clap(long)]
    pub output_radiometries: PathBuf,

    /// Ground-truth peptide ID file output, aligned with the radiometries
    #[clap(long)]
    pub output_y: PathBuf,

    /// Number of draws per peptide (before multiplicity weighting)
    #[clap(long, default_value_t = 1)]
    pub n_per_peptide: usize,

    /// PRNG seed; defaults to one derived from wall time
    #[clap(long)]
    pub seed: Option<u64>,
}

impl RadCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("simulate rad");
        let (num_channels, dye_seqs) = io::read_dye_seqs(&self.dye_seqs)?;
        let seq_model = single_model(&self.model.0)?;
        let seed = self.seed.unwrap_or_else(wall_time_seed);
        log::info!("sampling {} draws/peptide with seed {seed}", self.n_per_peptide);

        let draws = simulate::generate_radiometries(
            &seq_model,
            &dye_seqs,
            self.num_timesteps,
            num_channels as usize,
            self.n_per_peptide,
            seed,
        );
        log::info!("{} of the draws were detectable", draws.len());
        let (ids, radiometries): (Vec<i32>, Vec<_>) = draws.into_iter().unzip();

        io::write_radiometries(&self.output_radiometries, self.num_timesteps, num_channels as usize, &radiometries)?;
        io::write_y(&self.output_y, &ids)?;
        Ok(())
    }
}

/// Sample and deduplicate dye-tracks from a peptide set and sequencing
/// model, for use as a k-NN classifier's index.
#[derive(Debug, Parser)]
pub struct DtCmd {
    /// Peptide dye-sequence file, drawn from weighted by multiplicity
    #[clap(long)]
    pub dye_seqs: ValidPathBuf,

    /// Sequencing-model CSV; the first row is used
    #[clap(long)]
    pub model: ValidPathBuf,

    /// Number of Edman cycles to simulate
    #[clap(long)]
    pub num_timesteps: usize,

    /// Deduplicated dye-tracks file output
    #[clap(short, long)]
    pub output: PathBuf,

    /// Number of draws per peptide (before multiplicity weighting)
    #[clap(long, default_value_t = 100)]
    pub n_per_peptide: usize,

    /// PRNG seed; defaults to one derived from wall time
    #[clap(long)]
    pub seed: Option<u64>,
}

impl DtCmd {
    pub fn run(self) -> eyre::Result<()> {
        log::info!("simulate dt");
        let (num_channels, dye_seqs) = io::read_dye_seqs(&self.dye_seqs)?;
        let seq_model = single_model(&self.model.0)?;
        let seed = self.seed.unwrap_or_else(wall_time_seed);
        log::info!("sampling {} draws/peptide with seed {seed}", self.n_per_peptide);

        let draws = simulate::generate_dye_tracks(
            &seq_model,
            &dye_seqs,
            self.num_timesteps,
            num_channels as usize,
            self.n_per_peptide,
            seed,
        );
        let total_draws = draws.len();
        let deduped = simulate::dedup_dye_tracks(draws);
        log::info!("deduped {total_draws} draws down to {} distinct dye-tracks", deduped.len());

        io::write_dye_tracks(&self.output, self.num_timesteps, num_channels as usize, &deduped)?;
        Ok(())
    }
}
