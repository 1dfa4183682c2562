//! Immutable per-session encoder settings.
//!
//! An `EncoderSettings` value is a validated snapshot taken once at
//! `Recorder::start` and never re-read from live configuration during a
//! session, so a config change mid-recording cannot race the encoder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::RecorderConfig;
use crate::error::RecorderError;

/// Default bound on the frame queue (frames resident before drop-oldest).
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Known speed/quality preset names, fastest first.
const PRESET_NAMES: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
];

/// Interchange pixel format for captured frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Packed RGBA, 4 bytes per pixel.
    Rgba,
}

/// Video encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSettings {
    /// Codec identifier, e.g. "h264". Resolved at pipeline init.
    pub codec: String,
    /// Constant-quality knob, 0 (lossless-ish) to 51 (worst).
    pub crf: u32,
    /// Speed/quality preset name ("ultrafast" .. "veryslow").
    pub preset: String,
    /// Capture interchange format producers submit frames in.
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Key-frame interval in frames; 0 means 2 * fps.
    pub gop: u32,
    /// Maximum consecutive non-key frames between references.
    pub max_b_frames: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            codec: "h264".to_string(),
            crf: 18,
            preset: "medium".to_string(),
            pixel_format: PixelFormat::Rgba,
            width: 1920,
            height: 1080,
            fps: 60,
            gop: 0,
            max_b_frames: 0,
        }
    }
}

/// Audio encoding settings. An empty codec identifier disables audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioSettings {
    /// Codec identifier, e.g. "opus". Empty string disables the audio track.
    pub codec: String,
    /// Target bitrate in bits per second.
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            codec: "opus".to_string(),
            bitrate: 192_000,
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

/// Complete, immutable configuration for one recording session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    pub video: VideoSettings,
    pub audio: AudioSettings,
    /// Container identifier; only "mp4" is supported.
    pub container: String,
    pub output_path: PathBuf,
    /// Bound on the frame queue before the drop-oldest policy applies.
    pub queue_capacity: usize,
}

impl EncoderSettings {
    /// Settings with library defaults writing to `output_path`.
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            video: VideoSettings::default(),
            audio: AudioSettings::default(),
            container: "mp4".to_string(),
            output_path: output_path.into(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Snapshot the application configuration into session settings.
    ///
    /// The output path is resolved from the configured directory and
    /// filename pattern at the moment of the call.
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self {
            video: config.video.clone(),
            audio: config.audio.clone(),
            container: config.container.clone(),
            output_path: config.output_path_now(),
            queue_capacity: config.queue_capacity,
        }
    }

    /// Whether an audio track is requested for this session.
    pub fn audio_enabled(&self) -> bool {
        !self.audio.codec.is_empty()
    }

    /// Effective key-frame interval in frames.
    pub fn gop_size(&self) -> u32 {
        if self.video.gop > 0 {
            self.video.gop
        } else {
            self.video.fps * 2
        }
    }

    /// Reject malformed settings before any resource is opened.
    pub fn validate(&self) -> Result<(), RecorderError> {
        let v = &self.video;

        if v.codec.trim().is_empty() {
            return Err(RecorderError::Validation(
                "video codec identifier is empty".to_string(),
            ));
        }
        if v.width == 0 || v.height == 0 {
            return Err(RecorderError::Validation(format!(
                "invalid dimensions {}x{}",
                v.width, v.height
            )));
        }
        // YUV 4:2:0 chroma subsampling needs even dimensions.
        if v.width % 2 != 0 || v.height % 2 != 0 {
            return Err(RecorderError::Validation(format!(
                "dimensions must be even, got {}x{}",
                v.width, v.height
            )));
        }
        if v.fps == 0 || v.fps > 240 {
            return Err(RecorderError::Validation(format!(
                "fps must be 1-240, got {}",
                v.fps
            )));
        }
        if v.crf > 51 {
            return Err(RecorderError::Validation(format!(
                "crf must be 0-51, got {}",
                v.crf
            )));
        }
        if !PRESET_NAMES.contains(&v.preset.as_str()) {
            return Err(RecorderError::Validation(format!(
                "unknown preset: {}",
                v.preset
            )));
        }
        if v.max_b_frames > 2 {
            return Err(RecorderError::Validation(format!(
                "max_b_frames must be 0-2, got {}",
                v.max_b_frames
            )));
        }

        if self.container != "mp4" {
            return Err(RecorderError::Validation(format!(
                "unsupported container: {}",
                self.container
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(RecorderError::Validation(
                "output path is empty".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(RecorderError::Validation(
                "frame queue capacity must be at least 1".to_string(),
            ));
        }

        if self.audio_enabled() {
            let a = &self.audio;
            if a.channels != 1 && a.channels != 2 {
                return Err(RecorderError::Validation(format!(
                    "audio channels must be 1 or 2, got {}",
                    a.channels
                )));
            }
            if a.sample_rate == 0 {
                return Err(RecorderError::Validation(
                    "audio sample rate must be positive".to_string(),
                ));
            }
            if a.bitrate == 0 {
                return Err(RecorderError::Validation(
                    "audio bitrate must be positive".to_string(),
                ));
            }
        }

        Ok(())
    }
}
