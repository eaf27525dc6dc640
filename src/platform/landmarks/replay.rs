// Landmark source that replays recorded detector output, one JSON line per frame

use super::mediapipe_bridge::parse_detection;
use super::LandmarkSource;
use crate::core::config::DetectorConfig;
use crate::models::capture::RawFrame;
use crate::models::hand::Hand;
use crate::models::pose::{PoseError, PoseResult};
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

/// Replays a JSON-lines recording in the helper's output format. Frame pixels
/// are ignored; each `detect` call consumes the next line.
pub struct ReplayLandmarker {
    lines: Vec<String>,
    position: usize,
    looping: bool,
    max_hands: usize,
}

impl ReplayLandmarker {
    pub fn from_lines(lines: Vec<String>, config: &DetectorConfig) -> Self {
        let lines = lines
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect();
        Self {
            lines,
            position: 0,
            looping: false,
            max_hands: config.max_hands as usize,
        }
    }

    pub async fn open(path: &Path, config: &DetectorConfig) -> PoseResult<Self> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            PoseError::DetectorUnavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let replay = Self::from_lines(contents.lines().map(str::to_string).collect(), config);
        info!("Replaying {} recorded detections from {}", replay.lines.len(), path.display());
        Ok(replay)
    }

    /// Start over from the first line once the recording runs out
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn remaining(&self) -> usize {
        self.lines.len().saturating_sub(self.position)
    }
}

#[async_trait]
impl LandmarkSource for ReplayLandmarker {
    async fn detect(&mut self, _frame: &RawFrame, _timestamp: i64) -> PoseResult<Vec<Hand>> {
        if self.position >= self.lines.len() {
            if !self.looping || self.lines.is_empty() {
                return Ok(Vec::new());
            }
            self.position = 0;
        }

        let line = &self.lines[self.position];
        self.position += 1;
        parse_detection(line, self.max_hands)
    }

    fn get_model_info(&self) -> String {
        format!("Recorded detections ({} frames)", self.lines.len())
    }
}
