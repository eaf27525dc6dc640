// Hand landmark detection backends
// Detection itself is delegated to MediaPipe; these modules only move frames
// in and hands out

pub mod mediapipe_bridge;
pub mod replay;

pub use mediapipe_bridge::{parse_detection, MediaPipeProcess};
pub use replay::ReplayLandmarker;

use crate::models::capture::RawFrame;
use crate::models::hand::Hand;
use crate::models::pose::PoseResult;
use async_trait::async_trait;

/// Produces the hands visible in a frame
#[async_trait]
pub trait LandmarkSource: Send {
    /// Detect hands in `frame`. `timestamp` must increase monotonically in video mode.
    /// An empty list is a normal result.
    async fn detect(&mut self, frame: &RawFrame, timestamp: i64) -> PoseResult<Vec<Hand>>;

    /// Get model info
    fn get_model_info(&self) -> String;
}
