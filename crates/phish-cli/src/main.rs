//! URL phishing detector CLI.
//!
//! Usage:
//!   phish-detector train
//!   phish-detector train --data data/urls.csv --model model/model.bin --features compact
//!   phish-detector check https://github.com/openai http://secure-login123.net/account
//!   phish-detector check --model model/model.bin --format json https://example.com

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use phish_core::config::{TrainConfig, DEFAULT_MODEL_PATH};
use phish_core::report::{print_results, ReportFormat};
use phish_core::score::check_urls;
use phish_core::{train, FeatureSet, PhishingModel};

#[derive(Parser)]
#[command(name = "phish-detector")]
#[command(about = "Lexical URL phishing classifier")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a model from a CSV of url,label rows
    Train {
        /// JSON training config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input CSV (default: data/urls.csv)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Where the cleaned CSV is written (default: data/urls_clean.csv)
        #[arg(long)]
        clean: Option<PathBuf>,

        /// Output model path (default: model/model.bin)
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Feature set: lexical or compact
        #[arg(short, long)]
        features: Option<FeatureSet>,

        /// Seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Number of trees
        #[arg(long)]
        trees: Option<usize>,
    },

    /// Check one or more URLs against a trained model
    Check {
        /// URLs to check
        #[arg(required = true)]
        urls: Vec<String>,

        /// Path to the trained model
        #[arg(short, long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: ReportFormat,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Train {
            config,
            data,
            clean,
            model,
            features,
            seed,
            trees,
        } => {
            let mut train_config = match &config {
                Some(path) => TrainConfig::load(path)
                    .with_context(|| format!("Cannot load config {}", path.display()))?,
                None => TrainConfig::default(),
            };
            if let Some(data) = data {
                train_config.data_path = data;
            }
            if let Some(clean) = clean {
                train_config.clean_path = clean;
            }
            if let Some(model) = model {
                train_config.model_path = model;
            }
            if let Some(features) = features {
                train_config.feature_set = features;
            }
            if let Some(seed) = seed {
                train_config.split_seed = seed;
                train_config.forest.seed = seed;
            }
            if let Some(trees) = trees {
                train_config.forest.n_trees = trees;
            }

            let report = train::run(&train_config).context("Training failed")?;
            info!(
                accuracy = %format!("{:.4}", report.test_accuracy),
                "held-out accuracy on {} rows",
                report.test_rows
            );
            println!("Model trained and saved to {}", report.model_path.display());
        }

        Command::Check {
            urls,
            model,
            format,
        } => {
            let model = PhishingModel::load(&model)
                .with_context(|| format!("Cannot load model {}", model.display()))?;
            let results = check_urls(&model, &urls);
            print_results(&results, format);
        }
    }

    Ok(())
}
