//! Error taxonomy for the recording pipeline.

use thiserror::Error;

/// Errors produced by the recording subsystem.
///
/// `Validation` and `AlreadyRecording` are surfaced synchronously from
/// `Recorder::start` with no side effects. `Init` aborts a start after the
/// state machine has entered `Starting`; the state returns to `Stopped` and
/// the error is also delivered on the event channel. `Encode`, `Mux` and
/// `Audio` errors for a single unit of work are logged and counted, never
/// fatal on their own.
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("invalid settings: {0}")]
    Validation(String),

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("initialization failed: {0}")]
    Init(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("muxing failed: {0}")]
    Mux(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("io error: {0}")]
    Io(String),
}
