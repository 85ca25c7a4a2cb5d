use std::path::PathBuf;

use anyhow::Context;
use bmdca_core::BmConfig;
use bmdca_models::{read_alignment, read_weights, TargetStats};
use bmdca_samplers::PottsGibbsSampler;
use bmdca_train::{RunOutcome, TrainingController};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// bmdca: fit a Potts model to an alignment by Boltzmann-machine learning.
#[derive(Parser)]
#[command(name = "bmdca", version, about)]
struct Cli {
    /// Alignment of category indices, one sequence per line.
    #[arg(long, env = "BMDCA_ALIGNMENT")]
    alignment: PathBuf,
    /// Per-sequence weights, one per line.
    #[arg(long, env = "BMDCA_WEIGHTS")]
    weights: Option<PathBuf>,
    /// Config file: TOML with a [bmDCA] table, or the older `key=value` lines.
    /// Defaults are used without one.
    #[arg(long, env = "BMDCA_CONFIG")]
    config: Option<PathBuf>,
    /// Directory for parameters, statistics and the run log.
    #[arg(long, env = "BMDCA_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
    /// Alphabet size. Defaults to the largest category in the alignment plus one.
    #[arg(long)]
    num_categories: Option<usize>,
    /// Override `random_seed`.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BmConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => BmConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.random_seed = seed;
    }

    let alignment = read_alignment(&cli.alignment)
        .with_context(|| format!("reading alignment {}", cli.alignment.display()))?;
    let q = match cli.num_categories {
        Some(q) => q,
        None => alignment.iter().max().map_or(1, |&a| a + 1),
    };
    let weights = cli
        .weights
        .as_deref()
        .map(read_weights)
        .transpose()
        .context("reading sequence weights")?;
    let target = TargetStats::from_alignment(alignment.view(), q, weights.as_deref())
        .context("computing target statistics")?;

    let sampler = PottsGibbsSampler::new(target.dims());
    let mut controller = TrainingController::new(config, target, sampler, &cli.output_dir)
        .context("setting up training")?;

    match controller.run().context("training")? {
        RunOutcome::Converged { step, report } => {
            tracing::info!(step, error_tot = report.error_tot, "training converged")
        }
        RunOutcome::Exhausted { step, report } => {
            tracing::info!(step, error_tot = report.error_tot, "training stopped at step budget")
        }
    }
    Ok(())
}
