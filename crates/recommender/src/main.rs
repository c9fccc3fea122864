//! metarec CLI
//!
//! Trains the score model on historical outcomes once and prints the top
//! recommendations for one dataset as JSON.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use metarec_recommender::{
    Candidate, DescriptorRow, DescriptorTable, MetaRecommender, OutcomeRecord, RecommenderConfig,
    VERSION,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "metarec")]
#[command(author = "metarec Contributors")]
#[command(version = VERSION)]
#[command(
    about = "Recommend ML algorithm and hyperparameter combinations for a dataset",
    long_about = None
)]
struct Args {
    /// Candidate catalog (JSON array of {algorithm, parameters})
    #[arg(long)]
    catalog: PathBuf,

    /// Outcome records (JSON array of {dataset, algorithm, parameters, <metric>...})
    #[arg(long)]
    results: PathBuf,

    /// Dataset descriptors (JSON array of {dataset, <feature>...})
    #[arg(long)]
    metafeatures: PathBuf,

    /// Dataset to recommend for; must be present in --metafeatures
    #[arg(long)]
    dataset_id: String,

    /// Number of recommendations
    #[arg(long, default_value = "1")]
    n_recs: usize,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sampling seed, overrides the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for active.json and active.hash of the trained model
    #[arg(long)]
    model_out: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the recommendations
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("metarec v{}", VERSION);

    let mut config = match &args.config {
        Some(path) => RecommenderConfig::load_from_file(path).context("Failed to load config")?,
        None => RecommenderConfig::default(),
    };
    config.apply_env_overrides()?;
    if args.seed.is_some() {
        config.seed = args.seed;
    }

    let candidates: Vec<Candidate> = read_json(&args.catalog)?;
    let records: Vec<OutcomeRecord> = read_json(&args.results)?;
    let descriptor_rows: Vec<DescriptorRow> = read_json(&args.metafeatures)?;
    let descriptors = DescriptorTable::from_rows(descriptor_rows)?;

    let mut recommender = MetaRecommender::new(&config, &candidates)?;
    recommender.update(&records, &descriptors)?;

    if let Some(out) = &args.model_out {
        std::fs::create_dir_all(out).context("Failed to create output directory")?;

        let model_path = out.join("active.json");
        info!("Saving model to: {}", model_path.display());
        std::fs::write(&model_path, recommender.model_json()?)
            .context("Failed to write model file")?;

        let hash_path = out.join("active.hash");
        let hash = recommender.model_hash()?;
        info!("Saving hash to: {} ({})", hash_path.display(), hash);
        std::fs::write(&hash_path, &hash).context("Failed to write hash file")?;
    }

    let descriptor = descriptors
        .get(&args.dataset_id)
        .ok_or_else(|| anyhow!("No metafeatures for dataset {:?}", args.dataset_id))?
        .to_vec();
    let recs = recommender.recommend(&args.dataset_id, args.n_recs, &descriptor)?;

    println!("{}", serde_json::to_string_pretty(&recs)?);
    Ok(())
}
