pub mod commands;
pub mod core;
pub mod models;
pub mod platform;

use crate::commands::{CameraFactory, SessionCommand, HELP};
use crate::core::classifier::ClassifierService;
use crate::core::config::{Config, DetectorConfig};
use crate::core::dataset::DatasetSource;
use crate::core::session::SessionController;
use crate::core::session_runner;
use crate::core::softmax::SoftmaxClassifier;
use crate::models::pose::PoseResult;
use crate::platform::capture::{BlankFrames, FrameDirectory, VideoCapture};
use crate::platform::landmarks::{LandmarkSource, MediaPipeProcess, ReplayLandmarker};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn, Instrument};

/// Options for an interactive session
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Directory of frames served as the camera
    pub frames: Option<PathBuf>,
    /// Restart the frame directory when it runs out
    pub loop_frames: bool,
    /// Recorded detector output used instead of the MediaPipe helper
    pub replay: Option<PathBuf>,
    /// Previously persisted model; skips startup training when set
    pub model: Option<PathBuf>,
}

/// Built-in classifier, restored from `model` when given
pub async fn create_classifier(
    config: &Config,
    model: Option<&Path>,
) -> anyhow::Result<Box<dyn ClassifierService>> {
    let classifier = match model {
        Some(path) => SoftmaxClassifier::load(path, config.learning_rate).await?,
        None => SoftmaxClassifier::new(config.learning_rate),
    };
    Ok(Box::new(classifier))
}

/// Start the landmark backend: a replay file when given, the MediaPipe helper otherwise
pub async fn create_landmark_source(
    config: &DetectorConfig,
    replay: Option<&Path>,
) -> PoseResult<Box<dyn LandmarkSource>> {
    match replay {
        Some(path) => Ok(Box::new(ReplayLandmarker::open(path, config).await?.looping(true))),
        None => Ok(Box::new(MediaPipeProcess::spawn(config).await?)),
    }
}

/// Camera factory for the session options
pub fn camera_factory(options: &SessionOptions) -> CameraFactory {
    match (&options.frames, &options.replay) {
        (Some(dir), _) => {
            let dir = dir.clone();
            let looping = options.loop_frames;
            Box::new(move || Box::new(FrameDirectory::new(dir.clone()).looping(looping)) as Box<dyn VideoCapture>)
        }
        // Replayed detections don't look at pixels
        (None, Some(_)) => Box::new(|| Box::new(BlankFrames::new()) as Box<dyn VideoCapture>),
        (None, None) => {
            let looping = options.loop_frames;
            Box::new(move || Box::new(FrameDirectory::new("frames").looping(looping)) as Box<dyn VideoCapture>)
        }
    }
}

/// Train on the configured training set, then score the configured test set.
/// Failures are logged and leave the session usable.
pub async fn train_and_evaluate(session: &mut SessionController) {
    let training = DatasetSource::from_string(&session.config().training_data);
    match session.train_from_source(&training).await {
        Ok(report) => info!(
            "Training complete: {} samples, {} epochs, labels {:?}",
            report.samples, report.epochs, report.labels
        ),
        Err(e) => {
            warn!("Could not train on {}: {}", training, e);
            return;
        }
    }

    let test = DatasetSource::from_string(&session.config().test_data);
    match session.evaluate_source(&test).await {
        Ok(evaluation) => info!(
            "Accuracy on test data: {:.2}% ({}/{})",
            evaluation.accuracy, evaluation.correct, evaluation.total
        ),
        Err(e) => warn!("Could not evaluate on {}: {}", test, e),
    }
}

/// Run an interactive session reading commands from stdin
pub async fn run_session(config: Config, options: SessionOptions) -> anyhow::Result<()> {
    let classifier = create_classifier(&config, options.model.as_deref()).await?;
    let mut session = SessionController::new(config, classifier);
    let span = tracing::info_span!("session", id = %session.id());

    async {
        let detector_config = session.config().detector.clone();
        match create_landmark_source(&detector_config, options.replay.as_deref()).await {
            Ok(detector) => session.attach_detector(detector),
            Err(e) => {
                warn!("Failed to start landmark detector: {}", e);
                warn!("Camera features will be unavailable");
            }
        }

        // Dataset downloads are bounded by timeouts
        if options.model.is_none() {
            train_and_evaluate(&mut session).await;
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(read_commands(tx));

        println!("{}", HELP);
        session_runner::run(&mut session, camera_factory(&options), rx).await?;
        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}

/// Forward parsed stdin lines to the session until EOF or `quit`
async fn read_commands(tx: mpsc::Sender<SessionCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read command: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<SessionCommand>() {
            Ok(command) => {
                let quit = command == SessionCommand::Quit;
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Err(e) => println!("{}", e),
        }
    }

    info!("Command input closed");
}
