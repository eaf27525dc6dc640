// User-facing session commands
// Each handler returns a human readable reply, or an error string for the user

use crate::core::dataset::DatasetSource;
use crate::core::session::{CaptureOutcome, SessionController};
use crate::platform::capture::VideoCapture;
use std::path::PathBuf;
use std::str::FromStr;

/// Builds a fresh capture device each time the camera is enabled
pub type CameraFactory = Box<dyn FnMut() -> Box<dyn VideoCapture> + Send>;

pub const HELP: &str = "\
Commands:
  camera               enable the camera
  stop                 stop the camera
  capture <label>      save the current pose under <label>
  classify             classify the current pose
  hands                print the coordinates of every visible hand
  export [path]        export captured poses (default: configured export path)
  save-model [path]    persist the trained model (default: configured model path)
  train <source>       train on a pose file or URL
  evaluate <source>    evaluate the model on a pose file or URL
  status               show session state
  help                 show this message
  quit                 end the session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    EnableCamera,
    StopCamera,
    Capture(String),
    Classify,
    LogHands,
    ExportPoses(Option<PathBuf>),
    SaveModel(Option<PathBuf>),
    Train(String),
    Evaluate(String),
    Status,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, Some(rest.trim()).filter(|r| !r.is_empty())),
            None => (line, None),
        };

        match (name.to_lowercase().as_str(), arg) {
            ("camera", None) => Ok(SessionCommand::EnableCamera),
            ("stop", None) => Ok(SessionCommand::StopCamera),
            ("capture", Some(label)) => Ok(SessionCommand::Capture(label.to_string())),
            ("capture", None) => Err("Usage: capture <label>".to_string()),
            ("classify", None) => Ok(SessionCommand::Classify),
            ("hands", None) => Ok(SessionCommand::LogHands),
            ("export", path) => Ok(SessionCommand::ExportPoses(path.map(PathBuf::from))),
            ("save-model", path) => Ok(SessionCommand::SaveModel(path.map(PathBuf::from))),
            ("train", Some(source)) => Ok(SessionCommand::Train(source.to_string())),
            ("train", None) => Err("Usage: train <source>".to_string()),
            ("evaluate", Some(source)) => Ok(SessionCommand::Evaluate(source.to_string())),
            ("evaluate", None) => Err("Usage: evaluate <source>".to_string()),
            ("status", None) => Ok(SessionCommand::Status),
            ("help", _) => Ok(SessionCommand::Help),
            ("quit", None) | ("exit", None) => Ok(SessionCommand::Quit),
            ("", _) => Err("Empty command".to_string()),
            _ => Err(format!("Unknown command: {}", line)),
        }
    }
}

/// Run one command against the session
pub async fn execute(
    session: &mut SessionController,
    open_camera: &mut CameraFactory,
    command: SessionCommand,
) -> Result<String, String> {
    match command {
        SessionCommand::EnableCamera => enable_camera(session, open_camera).await,
        SessionCommand::StopCamera => stop_camera(session).await,
        SessionCommand::Capture(label) => capture_pose(session, &label),
        SessionCommand::Classify => classify_pose(session).await,
        SessionCommand::LogHands => Ok(log_hands(session)),
        SessionCommand::ExportPoses(path) => export_poses(session, path).await,
        SessionCommand::SaveModel(path) => save_model(session, path).await,
        SessionCommand::Train(source) => train(session, &source).await,
        SessionCommand::Evaluate(source) => evaluate(session, &source).await,
        SessionCommand::Status => Ok(status(session)),
        SessionCommand::Help => Ok(HELP.to_string()),
        SessionCommand::Quit => Ok("Bye".to_string()),
    }
}

async fn enable_camera(
    session: &mut SessionController,
    open_camera: &mut CameraFactory,
) -> Result<String, String> {
    session
        .enable_camera(open_camera())
        .await
        .map_err(|e| format!("Failed to enable camera: {}", e))?;
    Ok("Camera enabled".to_string())
}

async fn stop_camera(session: &mut SessionController) -> Result<String, String> {
    session
        .stop_camera()
        .await
        .map_err(|e| format!("Failed to stop camera: {}", e))?;
    Ok("Camera stopped".to_string())
}

fn capture_pose(session: &mut SessionController, label: &str) -> Result<String, String> {
    let outcome = session
        .capture(label)
        .map_err(|e| format!("Failed to capture pose: {}", e))?;

    Ok(match outcome {
        CaptureOutcome::Captured { index } => {
            format!("Pose saved as \"{}\" (#{})", label, index + 1)
        }
        CaptureOutcome::NoHand => "No hand found".to_string(),
    })
}

async fn classify_pose(session: &SessionController) -> Result<String, String> {
    let prediction = session
        .classify()
        .await
        .map_err(|e| format!("Failed to classify pose: {}", e))?;

    Ok(match prediction {
        Some(p) => format!("I think this is: \"{}\" ({:.1}%)", p.label, p.confidence * 100.0),
        None => "No hand found".to_string(),
    })
}

fn log_hands(session: &SessionController) -> String {
    let hands = session.log_all_hands();
    if hands.is_empty() {
        return "No hand found".to_string();
    }
    hands
        .iter()
        .enumerate()
        .map(|(i, flat)| format!("hand {}: {:?}", i, flat))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn export_poses(session: &SessionController, path: Option<PathBuf>) -> Result<String, String> {
    let path = path.unwrap_or_else(|| session.config().export_path.clone());
    session
        .export_poses_to(&path)
        .await
        .map_err(|e| format!("Failed to export poses: {}", e))?;
    Ok(format!("Exported {} poses to {}", session.store().len(), path.display()))
}

async fn save_model(session: &SessionController, path: Option<PathBuf>) -> Result<String, String> {
    let path = path.unwrap_or_else(|| session.config().model_path.clone());
    session
        .persist_model(&path)
        .await
        .map_err(|e| format!("Failed to save model: {}", e))?;
    Ok(format!("Model saved to {}", path.display()))
}

async fn train(session: &mut SessionController, source: &str) -> Result<String, String> {
    let source = DatasetSource::from_string(source);
    let report = session
        .train_from_source(&source)
        .await
        .map_err(|e| format!("Failed to train on {}: {}", source, e))?;
    Ok(format!(
        "Training complete: {} samples, {} epochs, labels {:?}",
        report.samples, report.epochs, report.labels
    ))
}

async fn evaluate(session: &SessionController, source: &str) -> Result<String, String> {
    let source = DatasetSource::from_string(source);
    let evaluation = session
        .evaluate_source(&source)
        .await
        .map_err(|e| format!("Failed to evaluate on {}: {}", source, e))?;
    Ok(format!(
        "Accuracy on test data: {:.2}% ({}/{})",
        evaluation.accuracy, evaluation.correct, evaluation.total
    ))
}

fn status(session: &SessionController) -> String {
    format!(
        "Session {}: {}, {} hand(s) visible, {} pose(s) captured, {}",
        session.id(),
        session.state().to_string(),
        session.latest_hands().len(),
        session.store().len(),
        session.classifier().get_model_info()
    )
}
