//! Application configuration for the recorder.
//!
//! Provides TOML load/save for the recording defaults the surrounding
//! application persists between runs. A session never reads this live;
//! `EncoderSettings::from_config` snapshots it at start time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RecorderError;
use crate::settings::{AudioSettings, EncoderSettings, VideoSettings, DEFAULT_QUEUE_CAPACITY};

/// Persistent recording configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Directory recordings are written to.
    pub output_directory: PathBuf,
    /// Output filename pattern; `{date}` and `{time}` are expanded at
    /// session start. The container extension is appended.
    pub filename_pattern: String,
    /// Container identifier; only "mp4" is supported.
    pub container: String,
    /// Frame queue bound before the drop-oldest policy applies.
    pub queue_capacity: usize,
    pub video: VideoSettings,
    pub audio: AudioSettings,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./recordings"),
            filename_pattern: "visualizer_{date}_{time}".to_string(),
            container: "mp4".to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
        }
    }
}

impl RecorderConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, RecorderError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| RecorderError::Io(format!("Failed to read config file: {}", e)))?;

        let config: RecorderConfig = toml::from_str(&contents)
            .map_err(|e| RecorderError::Validation(format!("Failed to parse config file: {}", e)))?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), RecorderError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                RecorderError::Io(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| RecorderError::Io(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| RecorderError::Io(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Default config file path.
    pub fn default_path() -> PathBuf {
        PathBuf::from("vizrec.toml")
    }

    /// Load from the default location, falling back to defaults.
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Resolve the output path for a session starting now.
    pub fn output_path_now(&self) -> PathBuf {
        let now = chrono::Local::now();
        let name = self
            .filename_pattern
            .replace("{date}", &now.format("%Y-%m-%d").to_string())
            .replace("{time}", &now.format("%H-%M-%S").to_string());
        self.output_directory
            .join(format!("{}.{}", name, self.container))
    }

    /// Validate the configured defaults by building a session snapshot.
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.filename_pattern.trim().is_empty() {
            return Err(RecorderError::Validation(
                "filename pattern is empty".to_string(),
            ));
        }
        EncoderSettings::from_config(self).validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = RecorderConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_path_expands_placeholders() {
        let config = RecorderConfig::default();
        let path = config.output_path_now();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("visualizer_"));
        assert!(name.ends_with(".mp4"));
        assert!(!name.contains("{date}"));
        assert!(!name.contains("{time}"));
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("vizrec.toml");

        let mut config = RecorderConfig::default();
        config.video.fps = 30;
        config.save_to_file(&config_path).unwrap();

        let loaded = RecorderConfig::load_from_file(&config_path).unwrap();
        assert_eq!(loaded.video.fps, 30);
        assert_eq!(loaded.container, config.container);
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let result = RecorderConfig::load_from_file("nonexistent_vizrec.toml");
        assert!(result.is_ok());
        assert_eq!(result.unwrap().container, "mp4");
    }

    #[test]
    fn test_config_toml_format() {
        let config = RecorderConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();
        assert!(toml_string.contains("[video]"));
        assert!(toml_string.contains("[audio]"));
        assert!(toml_string.contains("filename_pattern"));
    }
}
