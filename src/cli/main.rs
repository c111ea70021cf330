use anyhow::Context;
use clap::{Parser, Subcommand};
use fake_news_detector::{config::Config, ml::DetectorService};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fnd-cli")]
#[command(about = "Fake news detector CLI", long_about = None)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/local.toml")]
    config: String,

    /// Directory holding the model artifact
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the ensemble and save the artifact
    Train {
        /// CSV dataset with `text` and `label` columns; the built-in sample when omitted
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Classify one article
    Predict {
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Show the saved model's metadata
    Info,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fake_news_detector=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load_from(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config))?;
    if let Some(dir) = cli.model_dir {
        config.ml = config.ml.with_model_dir(dir);
    }

    let detector = DetectorService::new(config.ml.clone());

    match cli.command {
        Commands::Train { data } => {
            let report = detector
                .train(data.as_deref())
                .context("training failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }

        Commands::Predict { text } => {
            detector.initialize().context("initializing detector")?;
            let result = detector.predict(&text).context("prediction failed")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Info => {
            detector.initialize().context("initializing detector")?;
            match detector.model_info() {
                Some(metadata) => println!("{}", serde_json::to_string_pretty(&metadata)?),
                None => {
                    eprintln!(
                        "No saved model in {}; run `fnd-cli train` first",
                        config.ml.model_dir.display()
                    );
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
