use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{error, info};
use serde_json::json;
use spendcat::dataset::{load_rows, load_transactions};
use spendcat::{mock_transactions, ArtifactStore, Predictor, TrainingConfig, TrainingPipeline, Transaction};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding published artifact sets
    #[arg(long, global = true)]
    artifacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train a new artifact set and make it current
    Train {
        /// Labeled rows as CSV (description,amount,category), a JSON array or JSON Lines
        #[arg(long, conflicts_with = "mock")]
        data: Option<PathBuf>,
        /// Train on the built-in eight-row dataset
        #[arg(long)]
        mock: bool,
        /// JSON training config
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_features: Option<usize>,
        #[arg(long)]
        trees: Option<u32>,
        #[arg(long)]
        depth: Option<u32>,
        #[arg(long)]
        learning_rate: Option<f32>,
        /// Train on every row without a hold-out
        #[arg(long)]
        no_validation: bool,
    },
    /// Categorize one transaction
    Predict {
        #[arg(long)]
        description: String,
        #[arg(long, allow_negative_numbers = true)]
        amount: f64,
    },
    /// Categorize every transaction in a CSV, JSON array or JSON Lines file
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Transactions per blocking task
        #[arg(long, default_value_t = 256)]
        chunk_size: usize,
    },
    /// Describe the current artifact set
    Info,
}

fn open_store(artifacts: Option<PathBuf>) -> anyhow::Result<ArtifactStore> {
    let root = artifacts.unwrap_or_else(ArtifactStore::default_root);
    ArtifactStore::new(&root).with_context(|| format!("cannot open artifact store at {:?}", root))
}

fn load_predictor(store: &ArtifactStore) -> anyhow::Result<Predictor> {
    store
        .load_predictor()
        .with_context(|| format!("no usable artifact set in {:?}; run `spendcat train` first", store.root()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    spendcat::init_logger();
    let args = Args::parse();
    let store = open_store(args.artifacts)?;

    match args.command {
        Command::Train {
            data,
            mock,
            config,
            max_features,
            trees,
            depth,
            learning_rate,
            no_validation,
        } => {
            let mut config = match config {
                Some(path) => TrainingConfig::from_file(&path)
                    .with_context(|| format!("cannot read training config {:?}", path))?,
                None if mock => TrainingConfig::small(),
                None => TrainingConfig::default(),
            };
            if let Some(max_features) = max_features {
                config.encoder.max_features = max_features;
            }
            if let Some(trees) = trees {
                config.booster.n_trees = trees;
            }
            if let Some(depth) = depth {
                config.booster.max_depth = depth;
            }
            if let Some(learning_rate) = learning_rate {
                config.booster.learning_rate = learning_rate;
            }
            if no_validation {
                config.validation_fraction = None;
            }

            let rows = match data {
                Some(path) => load_rows(&path).with_context(|| format!("cannot read training data {:?}", path))?,
                None if mock => mock_transactions(),
                None => bail!("pass --data FILE or --mock"),
            };

            let outcome = TrainingPipeline::new(config)?.fit(&rows).context("training failed")?;
            let blobs = outcome.artifacts.to_blobs()?;
            let run_dir = store.publish(&blobs).await?;
            info!("Artifacts written to {:?}", run_dir);
            println!("{}", serde_json::to_string_pretty(&outcome.report)?);
        }
        Command::Predict { description, amount } => {
            let predictor = load_predictor(&store)?;
            let result = predictor.predict(&description, amount)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Batch { input, chunk_size } => {
            let predictor = Arc::new(load_predictor(&store)?);
            let transactions =
                load_transactions(&input).with_context(|| format!("cannot read transactions {:?}", input))?;
            let start = Instant::now();

            let mut tasks = Vec::new();
            for chunk in transactions.chunks(chunk_size.max(1)) {
                let predictor = Arc::clone(&predictor);
                let chunk: Vec<Transaction> = chunk.to_vec();
                tasks.push(tokio::task::spawn_blocking(move || predictor.predict_batch(&chunk)));
            }

            let mut failures = 0usize;
            for task in tasks {
                for result in task.await? {
                    let line = match result {
                        Ok(prediction) => serde_json::to_value(&prediction)?,
                        Err(e) => {
                            failures += 1;
                            error!("{}", e);
                            json!({ "error": e.to_string() })
                        }
                    };
                    println!("{}", line);
                }
            }
            info!(
                "Categorized {} transactions ({} failed) in {:.2?}",
                transactions.len(),
                failures,
                start.elapsed()
            );
        }
        Command::Info => {
            let predictor = load_predictor(&store)?;
            println!("{}", serde_json::to_string_pretty(&predictor.info())?);
        }
    }

    Ok(())
}
