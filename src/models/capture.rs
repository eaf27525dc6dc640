// Data structures for video frame capture

/// A single frame pulled from a video capture device
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64, // Milliseconds since the Unix epoch
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl RawFrame {
    /// Frame stamped with the current wall clock time
    pub fn now(width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data,
            format,
        }
    }

    /// Frame with no pixel data, for landmark sources that ignore frame contents
    pub fn empty() -> Self {
        Self::now(0, 0, Vec::new(), PixelFormat::RGBA8)
    }
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    RGBA8,
    RGB8,
}

impl PixelFormat {
    pub fn channels(&self) -> u32 {
        match self {
            PixelFormat::RGBA8 => 4,
            PixelFormat::RGB8 => 3,
        }
    }
}

/// Error types for video capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Already capturing")]
    AlreadyCapturing,

    #[error("Not currently capturing")]
    NotCapturing,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
