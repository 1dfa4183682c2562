//! Recorder facade and session state machine.
//!
//! `Recorder` is the one type applications hold. Every method takes
//! `&self` so the render thread, the audio thread, and a UI thread can
//! share one instance behind an `Arc` without wrapping it in their own
//! lock. State transitions follow
//! Stopped -> Starting -> Recording -> Stopping -> Stopped, with Error as
//! a terminal-until-stopped side state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::RecorderError;
use crate::settings::EncoderSettings;
use crate::types::{GrabbedFrame, RecorderEvent, RecordingState, RecordingStats};
use crate::worker::RecordingWorker;

/// State shared between the facade and the worker thread.
pub struct RecorderShared {
    state: Mutex<RecordingState>,
    stats: Mutex<RecordingStats>,
    events: Sender<RecorderEvent>,
}

impl RecorderShared {
    fn new(events: Sender<RecorderEvent>) -> Self {
        Self {
            state: Mutex::new(RecordingState::Stopped),
            stats: Mutex::new(RecordingStats::default()),
            events,
        }
    }

    pub(crate) fn state(&self) -> RecordingState {
        *self.state.lock().expect("lock poisoned")
    }

    pub(crate) fn set_state(&self, state: RecordingState) {
        let mut guard = self.state.lock().expect("lock poisoned");
        if *guard == state {
            return;
        }
        log::debug!("Recorder state: {:?} -> {:?}", *guard, state);
        *guard = state;
        drop(guard);
        // A full event channel must never block media threads.
        let _ = self.events.try_send(RecorderEvent::StateChanged(state));
    }

    /// Compare-and-set used by `start` to win the Stopped -> Starting race.
    fn try_begin_start(&self) -> Result<(), RecorderError> {
        let mut guard = self.state.lock().expect("lock poisoned");
        match *guard {
            RecordingState::Stopped => {
                *guard = RecordingState::Starting;
                drop(guard);
                let _ = self
                    .events
                    .try_send(RecorderEvent::StateChanged(RecordingState::Starting));
                Ok(())
            }
            _ => Err(RecorderError::AlreadyRecording),
        }
    }

    pub(crate) fn publish_stats(&self, stats: RecordingStats) {
        *self.stats.lock().expect("lock poisoned") = stats.clone();
        let _ = self.events.try_send(RecorderEvent::StatsUpdated(stats));
    }

    pub(crate) fn report_error(&self, message: String) {
        log::error!("{}", message);
        let _ = self.events.try_send(RecorderEvent::Error(message));
    }
}

/// Thread-safe recording facade.
pub struct Recorder {
    shared: Arc<RecorderShared>,
    worker: Mutex<Option<RecordingWorker>>,
    events_rx: Receiver<RecorderEvent>,
}

impl Recorder {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            shared: Arc::new(RecorderShared::new(tx)),
            worker: Mutex::new(None),
            events_rx: rx,
        }
    }

    /// Receiver for state, stats, and error events. Clone freely; every
    /// receiver observes the full event stream from this point on.
    pub fn events(&self) -> Receiver<RecorderEvent> {
        self.events_rx.clone()
    }

    pub fn state(&self) -> RecordingState {
        self.shared.state()
    }

    pub fn is_recording(&self) -> bool {
        matches!(
            self.state(),
            RecordingState::Starting | RecordingState::Recording
        )
    }

    /// Latest published session stats.
    pub fn stats(&self) -> RecordingStats {
        self.shared.stats.lock().expect("lock poisoned").clone()
    }

    /// Begin a recording session.
    ///
    /// Validation and output-directory creation happen before any state
    /// change, so a rejected call leaves the recorder exactly as it was.
    /// Pipeline initialization failures roll the state back to Stopped
    /// and are also published as an error event.
    pub fn start(&self, settings: EncoderSettings) -> Result<(), RecorderError> {
        if self.is_recording() {
            return Err(RecorderError::AlreadyRecording);
        }

        settings.validate()?;

        if let Some(parent) = settings.output_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    RecorderError::Validation(format!(
                        "cannot create output directory {:?}: {}",
                        parent, e
                    ))
                })?;
            }
        }

        self.shared.try_begin_start()?;

        self.shared.publish_stats(RecordingStats {
            output_path: settings.output_path.clone(),
            ..RecordingStats::default()
        });

        match RecordingWorker::start(&settings, Arc::clone(&self.shared)) {
            Ok(worker) => {
                *self.worker.lock().expect("lock poisoned") = Some(worker);
                self.shared.set_state(RecordingState::Recording);
                log::info!("Recording started: {:?}", settings.output_path);
                Ok(())
            }
            Err(e) => {
                self.shared.report_error(format!("Failed to start recording: {}", e));
                self.shared.set_state(RecordingState::Stopped);
                Err(e)
            }
        }
    }

    /// Stop the current session and wait for the file to be finalized.
    ///
    /// Idempotent: calling with no session in progress is a no-op. Also
    /// clears a session stuck in the Error state.
    pub fn stop(&self) -> Result<(), RecorderError> {
        // Take the worker out under the lock, join outside it, so a
        // producer calling submit_* never blocks on the drain.
        let worker = self.worker.lock().expect("lock poisoned").take();

        let Some(worker) = worker else {
            if self.state() == RecordingState::Error {
                self.shared.set_state(RecordingState::Stopped);
            }
            return Ok(());
        };

        self.shared.set_state(RecordingState::Stopping);
        let summary = worker.stop();
        self.shared.set_state(RecordingState::Stopped);

        match summary {
            Some(summary) => {
                log::info!(
                    "Recording stopped: {} frames, {:.2}s",
                    summary.video_frames,
                    summary.duration_secs
                );
                Ok(())
            }
            None => Err(RecorderError::Mux(
                "recording ended without a finalized file".to_string(),
            )),
        }
    }

    /// Submit one rendered frame. Cheap no-op when not recording; frames
    /// dropped by a full queue are counted in the session stats.
    pub fn submit_video_frame(&self, data: Vec<u8>, width: u32, height: u32, timestamp_us: i64) {
        let guard = self.worker.lock().expect("lock poisoned");
        if let Some(ref worker) = *guard {
            worker.push_frame(GrabbedFrame::from_rgba(data, width, height, timestamp_us));
        }
    }

    /// Submit interleaved f32 PCM. Cheap no-op when not recording.
    pub fn submit_audio_samples(&self, samples: &[f32], channels: u16, sample_rate: u32) {
        let guard = self.worker.lock().expect("lock poisoned");
        if let Some(ref worker) = *guard {
            worker.push_samples(samples, channels, sample_rate);
        }
    }

    /// Output path of the current or most recent session.
    pub fn output_path(&self) -> PathBuf {
        self.stats().output_path
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Finalize any session still running so the file stays playable.
        if let Err(e) = self.stop() {
            log::error!("Failed to stop recording on drop: {}", e);
        }
    }
}
