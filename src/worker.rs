//! Recording worker thread.
//!
//! A single background thread exclusively owns the encode pipeline for the
//! lifetime of a session. Producers hand media over through the frame
//! queue and a locked PCM buffer; nothing else ever touches the encoders
//! or the muxer, so no codec state needs locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::RecorderError;
use crate::pipeline::{EncodePipeline, PipelineSummary};
use crate::queue::FrameQueue;
use crate::recorder::RecorderShared;
use crate::settings::EncoderSettings;
use crate::types::{GrabbedFrame, RecordingState, RecordingStats};

/// How long one consumer poll waits before re-checking the stop flag.
const POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// How often progress stats are published while recording.
const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// Consecutive per-frame failures tolerated before the session is
/// declared unrecoverable.
const MAX_CONSECUTIVE_ENCODE_FAILURES: u32 = 30;

/// PCM accumulated by the audio producer between worker drains.
#[derive(Default)]
struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Append samples, tagging the buffer with this submission's format.
    /// The tag always reflects the most recent push; the encoder rejects
    /// the drained chunk if a mid-buffer reconfiguration made it mixed.
    fn append(&mut self, samples: &[f32], channels: u16, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.samples.extend_from_slice(samples);
    }
}

/// Handle to a live recording session's background thread.
pub struct RecordingWorker {
    queue: Arc<FrameQueue>,
    audio: Arc<Mutex<AudioBuffer>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Option<PipelineSummary>>>,
}

impl RecordingWorker {
    /// Initialize the pipeline and spawn the worker thread.
    ///
    /// Pipeline initialization runs on the calling thread so failures
    /// surface synchronously; a returned error means no thread was
    /// spawned and no partial session exists.
    pub fn start(
        settings: &EncoderSettings,
        shared: Arc<RecorderShared>,
    ) -> Result<Self, RecorderError> {
        let pipeline = EncodePipeline::new(settings)?;

        let queue = Arc::new(FrameQueue::new(settings.queue_capacity));
        queue.start();

        let audio = Arc::new(Mutex::new(AudioBuffer::default()));
        let stop = Arc::new(AtomicBool::new(false));

        let output_path = settings.output_path.clone();
        let handle = {
            let queue = Arc::clone(&queue);
            let audio = Arc::clone(&audio);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("vizrec-recording".to_string())
                .spawn(move || run_loop(pipeline, queue, audio, stop, shared, output_path))
                .map_err(|e| {
                    RecorderError::Init(format!("Failed to spawn recording thread: {}", e))
                })?
        };

        Ok(Self {
            queue,
            audio,
            stop,
            handle: Some(handle),
        })
    }

    /// Submit one captured frame. Returns false once the session is
    /// shutting down and no longer accepting frames.
    pub fn push_frame(&self, frame: GrabbedFrame) -> bool {
        self.queue.push(frame)
    }

    /// Append interleaved PCM for the worker's next audio drain.
    pub fn push_samples(&self, samples: &[f32], channels: u16, sample_rate: u32) {
        let mut buffer = self.audio.lock().expect("lock poisoned");
        buffer.append(samples, channels, sample_rate);
    }

    /// Frames lost to queue overflow so far.
    pub fn frames_dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// Signal shutdown, wait for the drain and the container trailer.
    pub fn stop(mut self) -> Option<PipelineSummary> {
        self.stop.store(true, Ordering::SeqCst);
        self.queue.stop();

        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                log::error!("Recording thread panicked");
                None
            }),
            None => None,
        }
    }
}

impl Drop for RecordingWorker {
    fn drop(&mut self) {
        // Dropped without an explicit stop; still finalize the file.
        if let Some(handle) = self.handle.take() {
            self.stop.store(true, Ordering::SeqCst);
            self.queue.stop();
            let _ = handle.join();
        }
    }
}

fn run_loop(
    mut pipeline: EncodePipeline,
    queue: Arc<FrameQueue>,
    audio: Arc<Mutex<AudioBuffer>>,
    stop: Arc<AtomicBool>,
    shared: Arc<RecorderShared>,
    output_path: std::path::PathBuf,
) -> Option<PipelineSummary> {
    let started = Instant::now();
    let mut last_stats = started;
    let mut frames_at_last_stats = 0u64;
    let mut frames_dropped_encode = 0u64;
    let mut consecutive_failures = 0u32;
    let mut fatal = false;

    loop {
        let popped = queue.next_frame(POLL_TIMEOUT);
        let had_frame = popped.is_some();

        if let Some(frame) = popped {
            match pipeline.encode_video(&frame) {
                Ok(true) => consecutive_failures = 0,
                Ok(false) => {
                    // Accepted without output; not a failure.
                    consecutive_failures = 0;
                }
                Err(e) => {
                    frames_dropped_encode += 1;
                    consecutive_failures += 1;
                    log::error!("Frame encode failed: {}", e);
                    if consecutive_failures >= MAX_CONSECUTIVE_ENCODE_FAILURES {
                        shared.report_error(format!(
                            "{} consecutive encode failures, aborting session: {}",
                            consecutive_failures, e
                        ));
                        fatal = true;
                        break;
                    }
                }
            }
        }

        // Drain pending PCM; the swap keeps the producer-facing lock
        // narrow while encoding happens outside it.
        let pending = {
            let mut buffer = audio.lock().expect("lock poisoned");
            if buffer.samples.is_empty() {
                None
            } else {
                Some((
                    std::mem::take(&mut buffer.samples),
                    buffer.channels,
                    buffer.sample_rate,
                ))
            }
        };
        if let Some((samples, channels, sample_rate)) = pending {
            if let Err(e) = pipeline.encode_audio(&samples, channels, sample_rate) {
                log::error!("Audio encode failed, dropping chunk: {}", e);
            }
        }

        if stop.load(Ordering::SeqCst) && !had_frame && !queue.has_frames() {
            break;
        }

        let now = Instant::now();
        if now.duration_since(last_stats) >= STATS_INTERVAL {
            let stats = current_stats(
                &pipeline,
                &queue,
                frames_dropped_encode,
                started,
                last_stats,
                frames_at_last_stats,
                &output_path,
            );
            frames_at_last_stats = pipeline.frames_written();
            last_stats = now;
            shared.publish_stats(stats);
        }
    }

    let queue_dropped = queue.dropped();
    let summary = match pipeline.finish() {
        Ok(summary) => Some(summary),
        Err(e) => {
            shared.report_error(format!("Failed to finalize recording: {}", e));
            fatal = true;
            None
        }
    };

    if let Some(ref summary) = summary {
        let elapsed = started.elapsed().as_secs_f64();
        let mut stats = RecordingStats {
            elapsed_secs: elapsed,
            frames_written: summary.video_frames,
            frames_dropped: queue_dropped + frames_dropped_encode,
            bytes_written: summary.bytes_written,
            audio_packets: summary.audio_packets,
            avg_fps: if elapsed > 0.0 {
                summary.video_frames as f64 / elapsed
            } else {
                0.0
            },
            encoding_fps: 0.0,
            output_path: output_path.clone(),
        };
        stats.encoding_fps = stats.avg_fps;
        shared.publish_stats(stats);
    }

    if fatal {
        shared.set_state(RecordingState::Error);
    }

    summary
}

fn current_stats(
    pipeline: &EncodePipeline,
    queue: &FrameQueue,
    frames_dropped_encode: u64,
    started: Instant,
    last_stats: Instant,
    frames_at_last_stats: u64,
    output_path: &std::path::Path,
) -> RecordingStats {
    let elapsed = started.elapsed().as_secs_f64();
    let window = last_stats.elapsed().as_secs_f64();
    let frames = pipeline.frames_written();

    RecordingStats {
        elapsed_secs: elapsed,
        frames_written: frames,
        frames_dropped: queue.dropped() + frames_dropped_encode,
        bytes_written: pipeline.bytes_written(),
        audio_packets: pipeline.audio_packets(),
        avg_fps: if elapsed > 0.0 { frames as f64 / elapsed } else { 0.0 },
        encoding_fps: if window > 0.0 {
            (frames - frames_at_last_stats) as f64 / window
        } else {
            0.0
        },
        output_path: output_path.to_path_buf(),
    }
}
