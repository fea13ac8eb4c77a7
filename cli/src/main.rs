mod cmd;
mod file;

use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use eyre::Result;
use human_panic::setup_panic;
#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

use cmd::{
    classify::{HmmCmd, HybridCmd, NnCmd},
    fit::FitCmd,
    simulate::{DtCmd, RadCmd},
};

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
/// Probabilistic peptide identification for fluorosequencing.
struct Args {
    #[clap(flatten)]
    verbose: Verbosity,

    /// Number of threads for the global rayon pool, by default num cpus
    #[clap(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Identify the peptide behind a radiometry
    #[clap(subcommand)]
    Classify(ClassifyCmd),

    /// Generate synthetic radiometries or dye-tracks
    #[clap(subcommand)]
    Simulate(SimulateCmd),

    /// Fit a sequencing model's error parameters by expectation maximization
    Fit(FitCmd),
}

#[derive(Subcommand, Debug)]
enum ClassifyCmd {
    /// Classify with the full forward-algorithm HMM against every candidate
    Hmm(HmmCmd),

    /// Classify with a weighted-approximate k-NN vote over dye-tracks
    Nn(NnCmd),

    /// Classify with a k-NN shortlist rescored by the HMM
    Hybrid(HybridCmd),
}

#[derive(Subcommand, Debug)]
enum SimulateCmd {
    /// Sample radiometries from a peptide set
    Rad(RadCmd),

    /// Sample and deduplicate dye-tracks from a peptide set
    Dt(DtCmd),
}

fn main() -> Result<()> {
    setup_panic!();
    jane_eyre::install()?;

    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbose.log_level_filter())
        .init();

    let n_logical_cores = args.threads.unwrap_or_else(num_cpus::get);
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_logical_cores)
        .build_global()?;
    log::info!("using {n_logical_cores} logical cores");

    match args.command {
        Commands::Classify(ClassifyCmd::Hmm(cmd)) => cmd.run()?,
        Commands::Classify(ClassifyCmd::Nn(cmd)) => cmd.run()?,
        Commands::Classify(ClassifyCmd::Hybrid(cmd)) => cmd.run()?,
        Commands::Simulate(SimulateCmd::Rad(cmd)) => cmd.run()?,
        Commands::Simulate(SimulateCmd::Dt(cmd)) => cmd.run()?,
        Commands::Fit(cmd) => cmd.run()?,
    }
    Ok(())
}
