// MediaPipe integration bridge
// Runs the MediaPipe hand landmarker in a helper process and talks to it over
// stdin/stdout:
//   startup:   one JSON options line -> helper answers "READY"
//   per frame: width, height, channels (u32 LE), timestamp (i64 LE), raw pixels
//              -> helper answers one JSON line {"hands": [...], "error": null}

use super::LandmarkSource;
use crate::core::config::DetectorConfig;
use crate::models::capture::RawFrame;
use crate::models::hand::{Hand, Handedness, Landmark, HAND_LANDMARK_COUNT};
use crate::models::pose::{PoseError, PoseResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

// ==============================================================================
// Wire format
// ==============================================================================

#[derive(Serialize)]
struct HelperOptions<'a> {
    model_asset_path: &'a str,
    max_hands: u32,
    running_mode: &'static str,
    delegate: &'static str,
    min_detection_confidence: f32,
}

#[derive(Deserialize, Debug)]
struct LandmarkJson {
    x: f32,
    y: f32,
    #[serde(default)]
    z: f32,
}

fn default_score() -> f32 {
    1.0
}

#[derive(Deserialize, Debug)]
struct HandJson {
    #[serde(default)]
    handedness: Option<String>,
    #[serde(default = "default_score")]
    score: f32,
    landmarks: Vec<LandmarkJson>,
}

#[derive(Deserialize, Debug)]
struct DetectionJson {
    #[serde(default)]
    hands: Vec<HandJson>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one detection line into at most `max_hands` hands. Detection
/// confidence is already applied by the landmarker; `score` is the
/// handedness confidence and is kept as reported.
pub fn parse_detection(line: &str, max_hands: usize) -> PoseResult<Vec<Hand>> {
    let result: DetectionJson = serde_json::from_str(line.trim())
        .map_err(|e| PoseError::DetectionFailed(format!("Failed to parse detector output: {}", e)))?;

    if let Some(error) = result.error {
        return Err(PoseError::DetectionFailed(error));
    }

    let mut hands = Vec::with_capacity(result.hands.len().min(max_hands));
    for hand in result.hands {
        if hand.landmarks.len() != HAND_LANDMARK_COUNT {
            warn!(
                "Expected {} landmarks, got {}",
                HAND_LANDMARK_COUNT,
                hand.landmarks.len()
            );
            continue;
        }

        let points: Vec<Landmark> = hand
            .landmarks
            .iter()
            .map(|lm| Landmark::new(lm.x, lm.y, lm.z))
            .collect();
        let Some(parsed) = Hand::from_slice(&points) else {
            continue;
        };
        hands.push(
            parsed
                .with_handedness(hand.handedness.as_deref().and_then(Handedness::from_string))
                .with_score(hand.score),
        );

        if hands.len() == max_hands {
            break;
        }
    }

    Ok(hands)
}

// ==============================================================================
// Helper process backend
// ==============================================================================

pub struct MediaPipeProcess {
    // Killed on drop
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    config: DetectorConfig,
}

impl MediaPipeProcess {
    /// Start the helper process and wait for it to load the model
    pub async fn spawn(config: &DetectorConfig) -> PoseResult<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| PoseError::DetectorUnavailable("Detector command is empty".to_string()))?;

        info!("Starting MediaPipe hand landmarker: {}", config.command.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PoseError::DetectorUnavailable(format!("Failed to start {}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PoseError::DetectorUnavailable("Failed to get stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PoseError::DetectorUnavailable("Failed to get stdout".to_string()))?;

        let mut bridge = Self {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
            config: config.clone(),
        };
        bridge.handshake().await?;

        info!("MediaPipe hand landmarker ready");
        Ok(bridge)
    }

    async fn handshake(&mut self) -> PoseResult<()> {
        let options = HelperOptions {
            model_asset_path: &self.config.model_asset_path,
            max_hands: self.config.max_hands,
            running_mode: self.config.running_mode.to_string(),
            delegate: self.config.delegate.to_string(),
            min_detection_confidence: self.config.min_detection_confidence,
        };
        let mut line = serde_json::to_string(&options)
            .map_err(|e| PoseError::DetectorUnavailable(e.to_string()))?;
        line.push('\n');

        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| PoseError::DetectorUnavailable(format!("Failed to send options: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| PoseError::DetectorUnavailable(e.to_string()))?;

        let reply = self.read_line().await?;
        if reply.trim() != "READY" {
            return Err(PoseError::DetectorUnavailable(format!(
                "Detector did not signal ready, got: {}",
                reply.trim()
            )));
        }
        Ok(())
    }

    async fn read_line(&mut self) -> PoseResult<String> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| PoseError::DetectionFailed(format!("Failed to read detector output: {}", e)))?;
        if read == 0 {
            return Err(PoseError::DetectorUnavailable("Detector process exited".to_string()));
        }
        Ok(line)
    }

    async fn send_frame(&mut self, frame: &RawFrame, timestamp: i64) -> std::io::Result<()> {
        let mut header = Vec::with_capacity(20);
        header.extend_from_slice(&frame.width.to_le_bytes());
        header.extend_from_slice(&frame.height.to_le_bytes());
        header.extend_from_slice(&frame.format.channels().to_le_bytes());
        header.extend_from_slice(&timestamp.to_le_bytes());

        self.stdin.write_all(&header).await?;
        self.stdin.write_all(&frame.data).await?;
        self.stdin.flush().await
    }
}

#[async_trait]
impl LandmarkSource for MediaPipeProcess {
    async fn detect(&mut self, frame: &RawFrame, timestamp: i64) -> PoseResult<Vec<Hand>> {
        self.send_frame(frame, timestamp)
            .await
            .map_err(|e| PoseError::DetectionFailed(format!("Failed to send frame: {}", e)))?;

        let line = self.read_line().await?;
        parse_detection(&line, self.config.max_hands as usize)
    }

    fn get_model_info(&self) -> String {
        format!(
            "MediaPipe hand landmarker (max hands: {}, mode: {}, delegate: {})",
            self.config.max_hands,
            self.config.running_mode.to_string(),
            self.config.delegate.to_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_json(handedness: &str, score: f32, count: usize) -> String {
        let landmarks: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"x": {}, "y": 0.5, "z": 0.0}}"#, i as f32 / 100.0))
            .collect();
        format!(
            r#"{{"handedness": "{}", "score": {}, "landmarks": [{}]}}"#,
            handedness,
            score,
            landmarks.join(",")
        )
    }

    #[test]
    fn test_parse_no_hands() {
        let hands = parse_detection(r#"{"hands": []}"#, 2).unwrap();
        assert!(hands.is_empty());
    }

    #[test]
    fn test_parse_two_hands() {
        let line = format!(
            r#"{{"hands": [{}, {}]}}"#,
            hand_json("Left", 0.9, 21),
            hand_json("Right", 0.8, 21)
        );
        let hands = parse_detection(&line, 2).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].handedness, Some(Handedness::Left));
        assert_eq!(hands[1].handedness, Some(Handedness::Right));
        assert_eq!(hands[0].landmarks[4].x, 0.04);
    }

    #[test]
    fn test_parse_truncates_to_max_hands() {
        let line = format!(
            r#"{{"hands": [{}, {}]}}"#,
            hand_json("Left", 0.9, 21),
            hand_json("Right", 0.9, 21)
        );
        assert_eq!(parse_detection(&line, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_drops_incomplete_hands_and_keeps_handedness_score() {
        let line = format!(
            r#"{{"hands": [{}, {}, {}]}}"#,
            hand_json("Left", 0.9, 20),
            hand_json("Right", 0.2, 21),
            hand_json("Right", 0.7, 21)
        );
        let hands = parse_detection(&line, 2).unwrap();
        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].score, 0.2);
        assert_eq!(hands[1].score, 0.7);
    }

    #[test]
    fn test_parse_reports_detector_error() {
        let result = parse_detection(r#"{"hands": [], "error": "model crashed"}"#, 2);
        assert!(matches!(result, Err(PoseError::DetectionFailed(msg)) if msg == "model crashed"));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_detection("not json", 2).is_err());
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let mut config = DetectorConfig::default();
        config.command = vec!["handpose-no-such-detector-binary".to_string()];
        assert!(matches!(
            MediaPipeProcess::spawn(&config).await,
            Err(PoseError::DetectorUnavailable(_))
        ));
    }

    #[cfg(unix)]
    fn fake_helper(script: &str) -> DetectorConfig {
        let mut config = DetectorConfig::default();
        config.command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        config
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_handshake_and_detect() {
        // Checks the options line, then answers each 20-byte header plus 2x1 RGBA pixels
        let config = fake_helper(
            r#"read -r opts
case "$opts" in *'"running_mode":"VIDEO"'*) echo READY ;; *) echo "bad options: $opts"; exit 1 ;; esac
while true; do
  n=$(head -c 28 | wc -c)
  [ "$n" -eq 28 ] || exit 0
  echo '{"hands": []}'
done"#,
        );
        let mut detector = MediaPipeProcess::spawn(&config).await.unwrap();
        assert!(detector.get_model_info().contains("VIDEO"));

        let frame = RawFrame::now(2, 1, vec![0u8; 8], crate::models::capture::PixelFormat::RGBA8);
        for timestamp in 1..=2 {
            assert!(detector.detect(&frame, timestamp).await.unwrap().is_empty());
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_without_ready_is_unavailable() {
        let config = fake_helper("read -r opts; echo 'model not found'");
        assert!(matches!(
            MediaPipeProcess::spawn(&config).await,
            Err(PoseError::DetectorUnavailable(msg)) if msg.contains("model not found")
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_exiting_after_ready_fails_detection() {
        let config = fake_helper("read -r opts; echo READY");
        let mut detector = MediaPipeProcess::spawn(&config).await.unwrap();

        let result = detector.detect(&RawFrame::empty(), 1).await;
        assert!(matches!(
            result,
            Err(PoseError::DetectorUnavailable(_)) | Err(PoseError::DetectionFailed(_))
        ));
    }
}
