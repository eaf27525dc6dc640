use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use handpose_lib::core::config::Config;
use handpose_lib::core::dataset::DatasetSource;
use handpose_lib::core::session::SessionController;
use handpose_lib::{create_classifier, run_session, SessionOptions};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "handpose", version, about = "Capture, train and classify hand poses")]
struct Cli {
    /// Settings file (default: ~/.handpose/config/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive session reading commands from stdin
    Run {
        /// Directory of frames used as the camera
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Restart the frame directory when it runs out
        #[arg(long = "loop")]
        loop_frames: bool,

        /// Recorded detector output (one JSON line per frame) instead of MediaPipe
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Start from a persisted model instead of training at startup
        #[arg(long)]
        model: Option<PathBuf>,

        /// Training set override (path or URL)
        #[arg(long)]
        train_data: Option<String>,

        /// Test set override (path or URL)
        #[arg(long)]
        test_data: Option<String>,
    },

    /// Train on a pose set, evaluate, and persist the model
    Train {
        /// Training set (path or URL)
        #[arg(long)]
        data: Option<String>,

        /// Test set (path or URL)
        #[arg(long)]
        test: Option<String>,

        #[arg(long)]
        epochs: Option<u32>,

        /// Where to write the model
        #[arg(long)]
        model_out: Option<PathBuf>,
    },

    /// Score a persisted model against a test set
    Evaluate {
        #[arg(long)]
        model: Option<PathBuf>,

        /// Test set (path or URL)
        #[arg(long)]
        test: Option<String>,
    },

    /// Print the active configuration
    Config {
        /// Restore and save the defaults first
        #[arg(long)]
        reset: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.map_err(|e| anyhow!("Failed to load configuration: {}", e))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handpose=info,handpose_lib=info".into()),
        )
        .init();

    match cli.command {
        Command::Run {
            frames,
            loop_frames,
            replay,
            model,
            train_data,
            test_data,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(source) = train_data {
                config.training_data = source;
            }
            if let Some(source) = test_data {
                config.test_data = source;
            }

            info!("handpose v{} starting", env!("CARGO_PKG_VERSION"));
            let options = SessionOptions {
                frames,
                loop_frames,
                replay,
                model,
            };
            run_session(config, options).await?;
        }

        Command::Train {
            data,
            test,
            epochs,
            model_out,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(epochs) = epochs {
                config.training_epochs = epochs;
            }
            config
                .validate()
                .map_err(|e| anyhow!("Invalid configuration: {}", e))?;

            let training = DatasetSource::from_string(data.as_deref().unwrap_or(&config.training_data));
            let test = DatasetSource::from_string(test.as_deref().unwrap_or(&config.test_data));
            let model_out = model_out.unwrap_or_else(|| config.model_path.clone());

            let classifier = create_classifier(&config, None).await?;
            let mut session = SessionController::new(config, classifier);

            let report = session
                .train_from_source(&training)
                .await
                .with_context(|| format!("Failed to train on {}", training))?;
            println!(
                "Trained on {} samples for {} epochs (loss {:.4})",
                report.samples, report.epochs, report.final_loss
            );

            let evaluation = session
                .evaluate_source(&test)
                .await
                .with_context(|| format!("Failed to evaluate on {}", test))?;
            println!(
                "Accuracy on test data: {:.2}% ({}/{})",
                evaluation.accuracy, evaluation.correct, evaluation.total
            );

            session
                .persist_model(&model_out)
                .await
                .with_context(|| format!("Failed to save model to {}", model_out.display()))?;
            println!("Model saved to {}", model_out.display());
        }

        Command::Evaluate { model, test } => {
            let config = load_config(cli.config.as_ref())?;
            let model = model.unwrap_or_else(|| config.model_path.clone());
            let test = DatasetSource::from_string(test.as_deref().unwrap_or(&config.test_data));

            let classifier = create_classifier(&config, Some(&model))
                .await
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let session = SessionController::new(config, classifier);

            let evaluation = session
                .evaluate_source(&test)
                .await
                .with_context(|| format!("Failed to evaluate on {}", test))?;
            for outcome in &evaluation.outcomes {
                println!(
                    "Expected: {} - Predicted: {} ({:.1}%)",
                    outcome.expected,
                    outcome.predicted,
                    outcome.confidence * 100.0
                );
            }
            println!(
                "Accuracy on test data: {:.2}% ({}/{})",
                evaluation.accuracy, evaluation.correct, evaluation.total
            );
        }

        Command::Config { reset } => {
            let config = if reset {
                match cli.config.as_ref() {
                    Some(path) => Config::reset_at(path),
                    None => Config::reset(),
                }
                .map_err(|e| anyhow!("Failed to reset configuration: {}", e))?
            } else {
                load_config(cli.config.as_ref())?
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
