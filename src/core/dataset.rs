// Training-data loader and pose export writer
// Reads and writes the `[{points, label}, ...]` format produced by PoseStore::export_all

use crate::models::pose::PoseSample;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid dataset {source_name}: {error}")]
    Parse {
        source_name: String,
        error: serde_json::Error,
    },
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// Connect timeout for dataset downloads
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request timeout for dataset downloads
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where a dataset lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Local file path
    File(PathBuf),
    /// http:// or https:// URL
    Url(String),
}

impl DatasetSource {
    /// Parse a user-supplied location; anything that isn't an http(s) URL is a path
    pub fn from_string(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            DatasetSource::Url(trimmed.to_string())
        } else {
            DatasetSource::File(PathBuf::from(trimmed))
        }
    }
}

impl fmt::Display for DatasetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetSource::File(path) => write!(f, "{}", path.display()),
            DatasetSource::Url(url) => write!(f, "{}", url),
        }
    }
}

/// Fetch and parse a pose dataset
pub async fn load(source: &DatasetSource) -> DatasetResult<Vec<PoseSample>> {
    load_with_timeouts(source, CONNECT_TIMEOUT, REQUEST_TIMEOUT).await
}

/// Fetch and parse a pose dataset; downloads give up after `connect` / `request`
pub async fn load_with_timeouts(
    source: &DatasetSource,
    connect: Duration,
    request: Duration,
) -> DatasetResult<Vec<PoseSample>> {
    let bytes = match source {
        DatasetSource::File(path) => tokio::fs::read(path).await?,
        DatasetSource::Url(url) => {
            debug!("Downloading dataset from {}", url);
            let client = reqwest::Client::builder()
                .connect_timeout(connect)
                .timeout(request)
                .build()?;
            client
                .get(url)
                .send()
                .await?
                .error_for_status()?
                .bytes()
                .await?
                .to_vec()
        }
    };

    let samples = parse(&bytes).map_err(|error| DatasetError::Parse {
        source_name: source.to_string(),
        error,
    })?;

    info!("Loaded {} pose samples from {}", samples.len(), source);
    Ok(samples)
}

/// Parse an exported pose list; every record is checked for 63 points and a label
pub fn parse(bytes: &[u8]) -> Result<Vec<PoseSample>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Write already-serialized export bytes to disk, creating parent directories
pub async fn write_export(path: &Path, bytes: &[u8]) -> DatasetResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
