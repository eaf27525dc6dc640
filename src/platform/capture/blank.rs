// Capture backend producing empty frames, for landmark sources that don't read pixels

use super::VideoCapture;
use crate::models::capture::{CaptureError, CaptureResult, RawFrame};
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct BlankFrames {
    open: bool,
}

impl BlankFrames {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoCapture for BlankFrames {
    async fn open(&mut self) -> CaptureResult<()> {
        if self.open {
            return Err(CaptureError::AlreadyCapturing);
        }
        self.open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
        if !self.open {
            return Err(CaptureError::NotCapturing);
        }
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
        "blank frames".to_string()
    }
}
