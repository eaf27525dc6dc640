// Capture backend that replays the image files of a directory as a video stream

use super::VideoCapture;
use crate::models::capture::{CaptureError, CaptureResult, PixelFormat, RawFrame};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Plays back `*.png` / `*.jpg` / `*.bmp` files in file name order
pub struct FrameDirectory {
    dir: PathBuf,
    frames: Vec<PathBuf>,
    position: usize,
    looping: bool,
    open: bool,
}

impl FrameDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            frames: Vec::new(),
            position: 0,
            looping: false,
            open: false,
        }
    }

    /// Restart from the first frame instead of ending the stream
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn is_frame_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Images with an alpha channel become RGBA8 frames, everything else RGB8
    async fn decode(path: PathBuf) -> CaptureResult<RawFrame> {
        let decoded = tokio::task::spawn_blocking(move || image::open(&path))
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("Decoder task failed: {}", e)))?
            .map_err(|e| CaptureError::CaptureFailed(format!("Failed to decode frame: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        if decoded.color().has_alpha() {
            Ok(RawFrame::now(width, height, decoded.to_rgba8().into_raw(), PixelFormat::RGBA8))
        } else {
            Ok(RawFrame::now(width, height, decoded.to_rgb8().into_raw(), PixelFormat::RGB8))
        }
    }
}

#[async_trait]
impl VideoCapture for FrameDirectory {
    async fn open(&mut self) -> CaptureResult<()> {
        if self.open {
            return Err(CaptureError::AlreadyCapturing);
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            CaptureError::DeviceUnavailable(format!("{}: {}", self.dir.display(), e))
        })?;

        let mut frames = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?
        {
            let path = entry.path();
            if Self::is_frame_file(&path) {
                frames.push(path);
            }
        }
        frames.sort();

        if frames.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "No frames found in {}",
                self.dir.display()
            )));
        }

        info!("Opened frame directory {} ({} frames)", self.dir.display(), frames.len());
        self.frames = frames;
        self.position = 0;
        self.open = true;
        Ok(())
    }

    async fn next_frame(&mut self) -> CaptureResult<Option<RawFrame>> {
        if !self.open {
            return Err(CaptureError::NotCapturing);
        }

        if self.position >= self.frames.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = self.frames[self.position].clone();
        self.position += 1;
        debug!("Reading frame {}", path.display());

        Self::decode(path).await.map(Some)
    }

    async fn close(&mut self) -> CaptureResult<()> {
        self.open = false;
        self.frames.clear();
        self.position = 0;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.open
    }

    fn describe(&self) -> String {
        format!("frame directory {}", self.dir.display())
    }
}
