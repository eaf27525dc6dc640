// Session controller - single orchestration point between the landmark
// detector, the capture device, the classifier and user actions

use crate::core::classifier::{ClassifierError, ClassifierService, TrainingOptions, TrainingReport};
use crate::core::config::Config;
use crate::core::dataset::{self, DatasetError, DatasetSource};
use crate::core::pose_store::PoseStore;
use crate::models::capture::{CaptureError, RawFrame};
use crate::models::hand::Hand;
use crate::models::pose::{
    Evaluation, EvaluationOutcome, PoseError, PoseSample, Prediction,
};
use crate::platform::capture::VideoCapture;
use crate::platform::landmarks::LandmarkSource;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ==============================================================================
// Errors
// ==============================================================================

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Landmark detector is not loaded yet")]
    DetectorNotReady,

    #[error("Camera is not running")]
    NotStreaming,

    #[error("Camera is already running")]
    AlreadyStreaming,

    #[error("Test set is empty")]
    EmptyTestSet,

    #[error(transparent)]
    Pose(#[from] PoseError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("Export failed: {0}")]
    Export(#[from] serde_json::Error),
}

pub type SessionResult<T> = Result<T, SessionError>;

// ==============================================================================
// Session State
// ==============================================================================

/// Idle -> (detector loaded) -> Ready -> (camera enabled) -> Streaming.
/// Stopping the camera, or the end of the frame stream, returns to Ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Ready,
    Streaming,
}

impl SessionState {
    pub fn to_string(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Ready => "ready",
            SessionState::Streaming => "streaming",
        }
    }
}

/// Result of a capture request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Pose appended to the store at this position
    Captured { index: usize },
    /// No hand in the latest frame; the store is unchanged
    NoHand,
}

// ==============================================================================
// Session Controller
// ==============================================================================

pub struct SessionController {
    id: Uuid,
    config: Config,
    state: SessionState,
    detector: Option<Box<dyn LandmarkSource>>,
    camera: Option<Box<dyn VideoCapture>>,
    classifier: Box<dyn ClassifierService>,
    store: PoseStore,
    latest_hands: Vec<Hand>,
    last_timestamp: i64,
}

impl SessionController {
    pub fn new(config: Config, classifier: Box<dyn ClassifierService>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            state: SessionState::Idle,
            detector: None,
            camera: None,
            classifier,
            store: PoseStore::new(),
            latest_hands: Vec::new(),
            last_timestamp: i64::MIN,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_streaming(&self) -> bool {
        self.state == SessionState::Streaming
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PoseStore {
        &self.store
    }

    pub fn classifier(&self) -> &dyn ClassifierService {
        self.classifier.as_ref()
    }

    /// Hands found in the most recent frame
    pub fn latest_hands(&self) -> &[Hand] {
        &self.latest_hands
    }

    /// Install the landmark detector once its model has loaded
    pub fn attach_detector(&mut self, detector: Box<dyn LandmarkSource>) {
        info!("Model loaded: {}", detector.get_model_info());
        self.detector = Some(detector);
        if self.state == SessionState::Idle {
            self.state = SessionState::Ready;
        }
    }

    /// Open the capture device and start streaming
    pub async fn enable_camera(&mut self, mut camera: Box<dyn VideoCapture>) -> SessionResult<()> {
        match self.state {
            SessionState::Idle => return Err(SessionError::DetectorNotReady),
            SessionState::Streaming => return Err(SessionError::AlreadyStreaming),
            SessionState::Ready => {}
        }

        camera.open().await?;
        debug!("Camera enabled: {}", camera.describe());

        self.camera = Some(camera);
        self.state = SessionState::Streaming;
        Ok(())
    }

    /// Stop streaming and release the capture device
    pub async fn stop_camera(&mut self) -> SessionResult<()> {
        if self.state != SessionState::Streaming {
            return Ok(());
        }

        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.close().await {
                warn!("Failed to close camera: {}", e);
            }
        }
        self.latest_hands.clear();
        self.state = SessionState::Ready;

        debug!("Camera stopped");
        Ok(())
    }

    /// Run landmark detection on a frame and keep the result as the latest detection.
    ///
    /// A detector failure clears the latest detection so a stale hand is never
    /// captured or classified; the caller decides whether to keep going.
    pub async fn on_frame(&mut self, frame: &RawFrame) -> SessionResult<&[Hand]> {
        let detector = self.detector.as_mut().ok_or(SessionError::DetectorNotReady)?;

        // Video mode needs strictly increasing timestamps
        let timestamp = frame.timestamp.max(self.last_timestamp.saturating_add(1));
        self.last_timestamp = timestamp;

        match detector.detect(frame, timestamp).await {
            Ok(hands) => {
                if let Some(hand) = hands.first() {
                    let thumb = hand.landmark(crate::models::hand::HandLandmark::ThumbTip);
                    debug!("{} hand(s), thumb tip at ({:.3}, {:.3})", hands.len(), thumb.x, thumb.y);
                }
                self.latest_hands = hands;
                Ok(&self.latest_hands)
            }
            Err(e) => {
                self.latest_hands.clear();
                Err(e.into())
            }
        }
    }

    /// Pull the next frame from the camera and run detection on it.
    ///
    /// Returns the number of hands found, or None when the stream has ended
    /// (the session then drops back to Ready).
    pub async fn poll_frame(&mut self) -> SessionResult<Option<usize>> {
        if self.state != SessionState::Streaming {
            return Err(SessionError::NotStreaming);
        }
        let camera = self.camera.as_mut().ok_or(SessionError::NotStreaming)?;

        match camera.next_frame().await? {
            Some(frame) => {
                let hands = self.on_frame(&frame).await?;
                Ok(Some(hands.len()))
            }
            None => {
                info!("Frame stream ended");
                self.stop_camera().await?;
                Ok(None)
            }
        }
    }

    /// Flatten the first hand of the latest frame and store it under `label`
    pub fn capture(&mut self, label: &str) -> SessionResult<CaptureOutcome> {
        if label.trim().is_empty() {
            return Err(PoseError::EmptyLabel.into());
        }

        let Some(hand) = self.latest_hands.first() else {
            debug!("No hand found");
            return Ok(CaptureOutcome::NoHand);
        };

        let sample = PoseSample::from_hand(hand, label)?;
        debug!("{:?}", sample.points());
        let index = self.store.append(sample);
        debug!("Pose saved as \"{}\" ({} captured)", label, self.store.len());

        Ok(CaptureOutcome::Captured { index })
    }

    /// Classify the first hand of the latest frame; None when no hand is present
    pub async fn classify(&self) -> SessionResult<Option<Prediction>> {
        let Some(hand) = self.latest_hands.first() else {
            debug!("No hand found");
            return Ok(None);
        };

        let prediction = self.top_prediction(&hand.flatten()).await?;
        debug!(
            "I think this is: \"{}\" ({:.1}%)",
            prediction.label,
            prediction.confidence * 100.0
        );
        Ok(Some(prediction))
    }

    /// Flattened coordinates of every hand in the latest frame. The session
    /// runner reports them; nothing is logged here.
    pub fn log_all_hands(&self) -> Vec<Vec<f32>> {
        self.latest_hands.iter().map(Hand::flatten).collect()
    }

    /// Feed every sample to the classifier, normalize, then train once
    pub async fn train_from_dataset(&mut self, samples: &[PoseSample]) -> SessionResult<TrainingReport> {
        info!("Training started on {} samples", samples.len());

        for sample in samples {
            self.classifier
                .add_training_sample(sample.points(), sample.label())?;
        }
        self.classifier.normalize()?;

        let options = TrainingOptions {
            epochs: self.config.training_epochs,
        };
        let report = self.classifier.train(options).await?;

        debug!(
            "Training complete: {} epochs, labels {:?}, loss {:.4}",
            report.epochs, report.labels, report.final_loss
        );
        Ok(report)
    }

    /// Score the classifier against a labeled test set
    pub async fn evaluate(&self, test_samples: &[PoseSample]) -> SessionResult<Evaluation> {
        if test_samples.is_empty() {
            return Err(SessionError::EmptyTestSet);
        }

        let mut outcomes = Vec::with_capacity(test_samples.len());
        for sample in test_samples {
            let prediction = self.top_prediction(sample.points()).await?;
            info!("Expected: {} - Predicted: {}", sample.label(), prediction.label);
            outcomes.push(EvaluationOutcome {
                expected: sample.label().to_string(),
                predicted: prediction.label,
                confidence: prediction.confidence,
            });
        }

        let evaluation = Evaluation::from_outcomes(outcomes);
        debug!("Accuracy on test data: {:.2}%", evaluation.accuracy);
        Ok(evaluation)
    }

    /// Load a dataset and train on it
    pub async fn train_from_source(&mut self, source: &DatasetSource) -> SessionResult<TrainingReport> {
        let samples = dataset::load(source).await?;
        self.train_from_dataset(&samples).await
    }

    /// Load a test set and evaluate against it
    pub async fn evaluate_source(&self, source: &DatasetSource) -> SessionResult<Evaluation> {
        let samples = dataset::load(source).await?;
        self.evaluate(&samples).await
    }

    /// Captured poses as a JSON list
    pub fn export_poses(&self) -> SessionResult<Vec<u8>> {
        Ok(self.store.export_all()?)
    }

    /// Write captured poses to `path`
    pub async fn export_poses_to(&self, path: &Path) -> SessionResult<()> {
        let bytes = self.export_poses()?;
        dataset::write_export(path, &bytes).await?;
        debug!("Exported {} poses to {}", self.store.len(), path.display());
        Ok(())
    }

    /// Persist the trained classifier
    pub async fn persist_model(&self, path: &Path) -> SessionResult<()> {
        self.classifier.persist_model(path).await?;
        Ok(())
    }

    async fn top_prediction(&self, features: &[f32]) -> SessionResult<Prediction> {
        let predictions = self.classifier.predict(features).await?;
        predictions.into_iter().next().ok_or_else(|| {
            ClassifierError::InferenceFailed("Classifier returned no predictions".to_string()).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier::ClassifierResult;
    use crate::models::capture::CaptureResult;
    use crate::models::hand::{Landmark, HAND_LANDMARK_COUNT};
    use crate::models::pose::PoseResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;

    /// Returns scripted detections, then no hands
    struct ScriptedDetector {
        frames: VecDeque<PoseResult<Vec<Hand>>>,
        timestamps: Vec<i64>,
    }

    impl ScriptedDetector {
        fn new(frames: Vec<PoseResult<Vec<Hand>>>) -> Self {
            Self {
                frames: frames.into(),
                timestamps: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl LandmarkSource for ScriptedDetector {
        async fn detect(&mut self, _frame: &RawFrame, timestamp: i64) -> PoseResult<Vec<Hand>> {
            self.timestamps.push(timestamp);
            self.frames.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn get_model_info(&self) -> String {
            "scripted".to_string()
        }
    }

    struct CountedCamera {
        remaining: usize,
        open: bool,
    }

    #[async_trait]
    impl VideoCapture for CountedCamera {
        async fn open(&mut self) -> CaptureResult<()> {
            self.open = true;
            Ok(())
        }

        async fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(RawFrame::empty()))
        }

        async fn close(&mut self) -> CaptureResult<()> {
            self.open = false;
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            self.open
        }

        fn describe(&self) -> String {
            "counted".to_string()
        }
    }

    struct UnavailableCamera;

    #[async_trait]
    impl VideoCapture for UnavailableCamera {
        async fn open(&mut self) -> CaptureResult<()> {
            Err(CaptureError::DeviceUnavailable("permission denied".to_string()))
        }

        async fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
            Err(CaptureError::NotCapturing)
        }

        async fn close(&mut self) -> CaptureResult<()> {
            Ok(())
        }

        fn is_capturing(&self) -> bool {
            false
        }

        fn describe(&self) -> String {
            "unavailable".to_string()
        }
    }

    /// Predicts the label stored for the first coordinate value
    struct LookupClassifier {
        answers: Vec<(f32, &'static str)>,
    }

    #[async_trait]
    impl ClassifierService for LookupClassifier {
        fn add_training_sample(&mut self, _features: &[f32], _label: &str) -> ClassifierResult<()> {
            Ok(())
        }

        fn normalize(&mut self) -> ClassifierResult<()> {
            Ok(())
        }

        async fn train(&mut self, options: TrainingOptions) -> ClassifierResult<TrainingReport> {
            Ok(TrainingReport {
                epochs: options.epochs,
                samples: 0,
                labels: Vec::new(),
                final_loss: 0.0,
            })
        }

        async fn predict(&self, features: &[f32]) -> ClassifierResult<Vec<Prediction>> {
            let label = self
                .answers
                .iter()
                .find(|(value, _)| *value == features[0])
                .map(|(_, label)| *label)
                .unwrap_or("unknown");
            Ok(vec![Prediction {
                label: label.to_string(),
                confidence: 0.9,
            }])
        }

        async fn persist_model(&self, _path: &Path) -> ClassifierResult<()> {
            Ok(())
        }

        fn get_model_info(&self) -> String {
            "lookup".to_string()
        }
    }

    fn hand(value: f32) -> Hand {
        Hand::new([Landmark::new(value, value, 0.0); HAND_LANDMARK_COUNT])
    }

    fn controller() -> SessionController {
        let classifier = LookupClassifier {
            answers: vec![(0.1, "open"), (0.2, "fist")],
        };
        SessionController::new(Config::default(), Box::new(classifier))
    }

    fn sample(value: f32, label: &str) -> PoseSample {
        PoseSample::new(vec![value; 63], label).unwrap()
    }

    #[tokio::test]
    async fn test_state_machine() {
        let mut session = controller();
        assert_eq!(session.state(), SessionState::Idle);

        let camera = Box::new(CountedCamera { remaining: 1, open: false });
        assert!(matches!(
            session.enable_camera(camera).await,
            Err(SessionError::DetectorNotReady)
        ));

        session.attach_detector(Box::new(ScriptedDetector::new(vec![])));
        assert_eq!(session.state(), SessionState::Ready);

        let camera = Box::new(CountedCamera { remaining: 1, open: false });
        session.enable_camera(camera).await.unwrap();
        assert!(session.is_streaming());

        let again = Box::new(CountedCamera { remaining: 1, open: false });
        assert!(matches!(
            session.enable_camera(again).await,
            Err(SessionError::AlreadyStreaming)
        ));

        session.stop_camera().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_camera_failure_keeps_session_ready() {
        let mut session = controller();
        session.attach_detector(Box::new(ScriptedDetector::new(vec![])));

        assert!(matches!(
            session.enable_camera(Box::new(UnavailableCamera)).await,
            Err(SessionError::Capture(CaptureError::DeviceUnavailable(_)))
        ));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_poll_until_stream_ends() {
        let mut session = controller();
        session.attach_detector(Box::new(ScriptedDetector::new(vec![
            Ok(vec![hand(0.1), hand(0.2)]),
            Ok(vec![]),
        ])));
        session
            .enable_camera(Box::new(CountedCamera { remaining: 2, open: false }))
            .await
            .unwrap();

        assert_eq!(session.poll_frame().await.unwrap(), Some(2));
        assert_eq!(session.poll_frame().await.unwrap(), Some(0));
        assert_eq!(session.poll_frame().await.unwrap(), None);
        assert_eq!(session.state(), SessionState::Ready);
        assert!(matches!(session.poll_frame().await, Err(SessionError::NotStreaming)));
    }

    #[tokio::test]
    async fn test_capture_without_hand_is_noop() {
        let mut session = controller();
        assert_eq!(session.capture("open").unwrap(), CaptureOutcome::NoHand);
        assert!(session.store().is_empty());
    }

    #[tokio::test]
    async fn test_capture_uses_first_hand_in_order() {
        let mut session = controller();
        session.attach_detector(Box::new(ScriptedDetector::new(vec![
            Ok(vec![hand(0.1), hand(0.9)]),
            Ok(vec![hand(0.2)]),
        ])));
        let frame = RawFrame::empty();

        session.on_frame(&frame).await.unwrap();
        assert_eq!(
            session.capture("open").unwrap(),
            CaptureOutcome::Captured { index: 0 }
        );
        session.on_frame(&frame).await.unwrap();
        session.capture("fist").unwrap();

        let samples = session.store().samples();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].label(), "open");
        assert_eq!(samples[0].points()[0], 0.1);
        assert_eq!(samples[1].label(), "fist");
        assert!(samples.iter().all(|s| s.points().len() == 63));
    }

    #[tokio::test]
    async fn test_capture_rejects_empty_label() {
        let mut session = controller();
        assert!(matches!(
            session.capture(""),
            Err(SessionError::Pose(PoseError::EmptyLabel))
        ));
    }

    #[tokio::test]
    async fn test_detector_failure_clears_latest_hands() {
        let mut session = controller();
        session.attach_detector(Box::new(ScriptedDetector::new(vec![
            Ok(vec![hand(0.1)]),
            Err(PoseError::DetectionFailed("boom".to_string())),
        ])));
        let frame = RawFrame::empty();

        session.on_frame(&frame).await.unwrap();
        assert_eq!(session.latest_hands().len(), 1);

        assert!(session.on_frame(&frame).await.is_err());
        assert!(session.latest_hands().is_empty());
        assert_eq!(session.capture("open").unwrap(), CaptureOutcome::NoHand);
    }

    #[tokio::test]
    async fn test_classify() {
        let mut session = controller();
        assert_eq!(session.classify().await.unwrap(), None);

        session.attach_detector(Box::new(ScriptedDetector::new(vec![Ok(vec![hand(0.2)])])));
        session.on_frame(&RawFrame::empty()).await.unwrap();

        let prediction = session.classify().await.unwrap().unwrap();
        assert_eq!(prediction.label, "fist");
    }

    #[tokio::test]
    async fn test_log_all_hands() {
        let mut session = controller();
        session.attach_detector(Box::new(ScriptedDetector::new(vec![Ok(vec![
            hand(0.1),
            hand(0.2),
        ])])));
        session.on_frame(&RawFrame::empty()).await.unwrap();

        let flat = session.log_all_hands();
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[1][0], 0.2);
    }

    #[tokio::test]
    async fn test_evaluate_accuracy() {
        let session = controller();

        let all_right = vec![sample(0.1, "open"), sample(0.2, "fist")];
        assert_eq!(session.evaluate(&all_right).await.unwrap().accuracy, 100.0);

        let all_wrong = vec![sample(0.1, "fist"), sample(0.2, "open")];
        assert_eq!(session.evaluate(&all_wrong).await.unwrap().accuracy, 0.0);

        let mut mixed: Vec<PoseSample> = (0..7).map(|_| sample(0.1, "open")).collect();
        mixed.extend((0..3).map(|_| sample(0.2, "open")));
        let evaluation = session.evaluate(&mixed).await.unwrap();
        assert_eq!(evaluation.correct, 7);
        assert_eq!(evaluation.total, 10);
        assert_eq!(evaluation.accuracy, 70.0);
    }

    #[tokio::test]
    async fn test_evaluate_empty_set() {
        let session = controller();
        assert!(matches!(
            session.evaluate(&[]).await,
            Err(SessionError::EmptyTestSet)
        ));
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let mut session = controller();
        let detector = ScriptedDetector::new(vec![]);
        session.attach_detector(Box::new(detector));

        let mut frame = RawFrame::empty();
        frame.timestamp = 1_000;
        session.on_frame(&frame).await.unwrap();
        session.on_frame(&frame).await.unwrap();
        frame.timestamp = 500;
        session.on_frame(&frame).await.unwrap();

        assert_eq!(session.last_timestamp, 1_002);
    }
}
