use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the landmark detector treats successive frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningMode {
    Image,
    Video,
}

impl RunningMode {
    pub fn to_string(&self) -> &'static str {
        match self {
            RunningMode::Image => "IMAGE",
            RunningMode::Video => "VIDEO",
        }
    }
}

/// Compute backend requested from the landmark detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delegate {
    Cpu,
    Gpu,
}

impl Delegate {
    pub fn to_string(&self) -> &'static str {
        match self {
            Delegate::Cpu => "CPU",
            Delegate::Gpu => "GPU",
        }
    }
}

/// Landmark detector settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    /// Maximum number of hands reported per frame
    pub max_hands: u32,
    pub running_mode: RunningMode,
    pub delegate: Delegate,
    /// Hands scored below this are discarded (0.0-1.0)
    pub min_detection_confidence: f32,
    /// Helper process started by the MediaPipe backend (program followed by arguments)
    pub command: Vec<String>,
    /// Hand landmarker model passed to the helper process
    pub model_asset_path: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            running_mode: RunningMode::Video,
            delegate: Delegate::Gpu,
            min_detection_confidence: 0.5,
            command: vec!["python3".to_string(), "python/hand_landmarker.py".to_string()],
            model_asset_path: "https://storage.googleapis.com/mediapipe-models/hand_landmarker/hand_landmarker/float16/1/hand_landmarker.task".to_string(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub detector: DetectorConfig,
    /// Frames per second pulled from the capture device
    pub target_fps: u32,
    /// Training iterations for one training run
    pub training_epochs: u32,
    /// Gradient descent step size for the built-in classifier
    pub learning_rate: f32,
    /// Training set, as a file path or http(s) URL
    pub training_data: String,
    /// Test set, as a file path or http(s) URL
    pub test_data: String,
    /// Where captured poses are exported
    pub export_path: PathBuf,
    /// Where the trained model is persisted
    pub model_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            target_fps: 30,
            training_epochs: 100,
            learning_rate: 0.5,
            training_data: "handposes.json".to_string(),
            test_data: "handposes_test.json".to_string(),
            export_path: PathBuf::from("handposes.json"),
            model_path: PathBuf::from("model.json"),
        }
    }
}

impl Config {
    /// Load configuration from file, creating with defaults if it doesn't exist
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load and validate configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        let config_path = Self::get_config_path()?;
        self.save_to(&config_path)
    }

    /// Validate and write configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.detector.max_hands == 0 || self.detector.max_hands > 4 {
            return Err(format!(
                "Invalid max hands: {}. Must be between 1 and 4",
                self.detector.max_hands
            )
            .into());
        }

        if !(0.0..=1.0).contains(&self.detector.min_detection_confidence) {
            return Err(format!(
                "Invalid detection confidence: {}. Must be between 0.0 and 1.0",
                self.detector.min_detection_confidence
            )
            .into());
        }

        if self.detector.command.is_empty() {
            return Err("Detector command cannot be empty".into());
        }

        if self.target_fps == 0 || self.target_fps > 120 {
            return Err(format!(
                "Invalid target FPS: {}. Must be between 1 and 120",
                self.target_fps
            )
            .into());
        }

        if self.training_epochs == 0 || self.training_epochs > 100_000 {
            return Err(format!(
                "Invalid training epochs: {}. Must be between 1 and 100000",
                self.training_epochs
            )
            .into());
        }

        if !(self.learning_rate > 0.0 && self.learning_rate <= 10.0) {
            return Err(format!(
                "Invalid learning rate: {}. Must be in (0.0, 10.0]",
                self.learning_rate
            )
            .into());
        }

        Ok(())
    }

    /// Reset to default configuration
    pub fn reset() -> Result<Self, Box<dyn std::error::Error>> {
        Self::reset_at(&Self::get_config_path()?)
    }

    /// Overwrite the settings file at `path` with the defaults
    pub fn reset_at(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    /// Get the configuration file path
    pub fn get_config_path() -> Result<PathBuf, Box<dyn std::error::Error>> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| "Could not determine home directory")?;

        let mut path = PathBuf::from(home);
        path.push(".handpose");
        path.push("config");
        path.push("settings.json");

        Ok(path)
    }
}
