// Video capture devices
// Every backend yields RawFrames through the same pull-based interface

pub mod blank;
pub mod frame_directory;

pub use blank::BlankFrames;
pub use frame_directory::FrameDirectory;

use crate::models::capture::{CaptureResult, RawFrame};
use async_trait::async_trait;

/// Pull-based video source. Frames are requested, never pushed, so a slow
/// consumer simply skips frames instead of queueing them.
#[async_trait]
pub trait VideoCapture: Send {
    /// Acquire the device
    async fn open(&mut self) -> CaptureResult<()>;

    /// Latest available frame, or None once the stream has ended
    async fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>>;

    /// Release the device
    async fn close(&mut self) -> CaptureResult<()>;

    /// Check if the device is open
    fn is_capturing(&self) -> bool;

    /// Short description for logs
    fn describe(&self) -> String;
}
