//! vizrec: real-time capture-to-MP4 recording for audio visualizers
//!
//! This crate records a live visualizer to an MP4 file while it runs: the
//! render thread submits RGBA frames, the audio thread submits f32 PCM,
//! and a dedicated worker thread encodes (H.264 + Opus) and muxes in the
//! background without stalling either producer.
//!
//! # Usage
//! ```rust,ignore
//! use vizrec::{EncoderSettings, Recorder};
//!
//! let recorder = Recorder::new();
//! recorder.start(EncoderSettings::new("session.mp4"))?;
//!
//! // per rendered frame, from the render thread:
//! recorder.submit_video_frame(rgba_pixels, 1920, 1080, timestamp_us);
//! // per audio callback, from the audio thread:
//! recorder.submit_audio_samples(&samples, 2, 48_000);
//!
//! recorder.stop()?;
//! ```
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod queue;
pub mod recorder;
pub mod settings;
pub mod types;
pub mod video;
pub mod worker;

// Testing utilities - synthetic media for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::RecorderConfig;
pub use error::RecorderError;
pub use recorder::Recorder;
pub use settings::{AudioSettings, EncoderSettings, PixelFormat, VideoSettings};
pub use types::{GrabbedFrame, RecorderEvent, RecordingState, RecordingStats};

/// Initialize logging for the recording pipeline
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "vizrec=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
