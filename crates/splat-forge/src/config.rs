//! Configuration for the conversion service

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Shortest sweep period the janitor accepts
pub const MIN_JANITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SplatForgeConfig {
    /// Input and output folders, stored as top-level `input_folder` and
    /// `output_folder` keys (the persisted settings record)
    #[serde(flatten)]
    pub storage: StorageConfig,
    /// External reconstruction tool
    pub converter: ConverterConfig,
    /// Finished-job retention
    pub janitor: JanitorConfig,
}

impl SplatForgeConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults. An unreadable, malformed or invalid
    /// file is logged and also yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strictly read and validate a JSON config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent folders
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage.input_folder.as_os_str().is_empty()
            || self.storage.output_folder.as_os_str().is_empty()
        {
            return Err(Error::Config("input_folder and output_folder must be set".into()));
        }
        if self.converter.program.trim().is_empty() {
            return Err(Error::Config("converter.program is empty".into()));
        }
        let ext = &self.converter.ply_extension;
        if ext.is_empty() || ext.contains(['/', '\\', '.']) {
            return Err(Error::Config(format!("invalid converter.ply_extension '{}'", ext)));
        }
        Ok(())
    }

    /// Create the input and output folders if they do not exist
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.storage.input_folder)?;
        fs::create_dir_all(&self.storage.output_folder)?;
        Ok(())
    }
}

/// Folder roots for uploaded images and generated models
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory uploaded images are saved to
    pub input_folder: PathBuf,
    /// Directory the tool writes `.ply` models to
    pub output_folder: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
            .join("splat-forge");

        Self {
            input_folder: base.join("inputs"),
            output_folder: base.join("outputs"),
        }
    }
}

/// External reconstruction tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Executable to run
    pub program: String,
    /// Arguments placed before `-i <input> -o <output>`
    pub args: Vec<String>,
    /// Extension of the model file the tool writes
    pub ply_extension: String,
    /// Kill the tool after this many seconds (None = wait forever)
    pub timeout_secs: Option<u64>,
}

impl ConverterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            program: "sharp".to_string(),
            args: vec!["predict".to_string()],
            ply_extension: "ply".to_string(),
            timeout_secs: None,
        }
    }
}

/// Cleanup of finished jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JanitorConfig {
    /// How long completed/failed jobs stay listed (default: 1 hour)
    pub retention_secs: u64,
    /// Sweep period (default: 5 minutes)
    pub interval_secs: u64,
}

impl JanitorConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep period, never shorter than [`MIN_JANITOR_INTERVAL`]
    pub fn interval(&self) -> Duration {
        let interval = Duration::from_secs(self.interval_secs);
        if interval < MIN_JANITOR_INTERVAL {
            tracing::warn!(
                "janitor.interval_secs = {} is too short, using {}s",
                self.interval_secs,
                MIN_JANITOR_INTERVAL.as_secs()
            );
            return MIN_JANITOR_INTERVAL;
        }
        interval
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            retention_secs: 3600,
            interval_secs: 300,
        }
    }
}
