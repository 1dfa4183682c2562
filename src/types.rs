//! Core data types shared across the recording pipeline.

use serde::{Deserialize, Serialize};

/// A single captured video frame handed off by the render thread.
///
/// Pixels are packed RGBA, 4 bytes per pixel, row-major, no padding.
/// Ownership moves producer -> frame queue -> encoder; the buffer is
/// released after encoding.
#[derive(Debug, Clone)]
pub struct GrabbedFrame {
    pub width: u32,
    pub height: u32,
    /// Monotonic capture timestamp in microseconds. Diagnostic only: the
    /// output stream timestamps come from the frame counter, not from here.
    pub timestamp_us: i64,
    /// Packed RGBA pixel data, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

impl GrabbedFrame {
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32, timestamp_us: i64) -> Self {
        Self {
            width,
            height,
            timestamp_us,
            data,
        }
    }

    /// Expected buffer length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Lifecycle of a recording session. Transitions are strictly sequential
/// and performed only by the `Recorder`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Stopped,
    Starting,
    Recording,
    Stopping,
    Error,
}

/// Statistics for the current (or last) recording session.
///
/// Updated continuously by the worker and read opportunistically by
/// callers; values are eventually consistent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingStats {
    /// Wall-clock seconds since the session started.
    pub elapsed_secs: f64,
    /// Video frames written to the container.
    pub frames_written: u64,
    /// Frames lost to queue overflow or per-frame encode failures.
    pub frames_dropped: u64,
    /// Encoded payload bytes written so far.
    pub bytes_written: u64,
    /// Audio packets written to the container.
    pub audio_packets: u64,
    /// Frames written divided by elapsed wall time.
    pub avg_fps: f64,
    /// Frames encoded over the most recent stats interval.
    pub encoding_fps: f64,
    /// Output file for this session.
    pub output_path: std::path::PathBuf,
}

/// Observable notifications delivered on the `Recorder` event channel.
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    StateChanged(RecordingState),
    StatsUpdated(RecordingStats),
    Error(String),
}
