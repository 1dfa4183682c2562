//! Record a synthetic session to MP4 without a renderer attached.
//!
//! Usage: record-synthetic [OUTPUT.mp4] [SECONDS]
//!
//! Generates a moving gradient at the configured frame rate plus a 440 Hz
//! tone, and drives the full recording pipeline the way a visualizer
//! would. Ctrl-C stops early and still finalizes the file.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;

use vizrec::testing::{synthetic_pcm_tone, synthetic_rgba_frame};
use vizrec::{EncoderSettings, Recorder, RecorderEvent};

fn main() -> anyhow::Result<()> {
    vizrec::init_logging();

    let mut args = std::env::args().skip(1);
    let output = args.next().unwrap_or_else(|| "synthetic.mp4".to_string());
    let seconds: u64 = args
        .next()
        .map(|s| s.parse())
        .transpose()
        .context("SECONDS must be a whole number")?
        .unwrap_or(5);

    let mut settings = EncoderSettings::new(&output);
    settings.video.width = 1280;
    settings.video.height = 720;
    settings.video.fps = 30;

    let width = settings.video.width;
    let height = settings.video.height;
    let fps = settings.video.fps;
    let sample_rate = settings.audio.sample_rate;
    let channels = settings.audio.channels;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .context("failed to install Ctrl-C handler")?;
    }

    let recorder = Recorder::new();
    let events = recorder.events();
    recorder.start(settings).context("failed to start recording")?;

    println!("Recording {}s of synthetic media to {}...", seconds, output);

    let frame_interval = Duration::from_secs_f64(1.0 / fps as f64);
    let samples_per_frame = (sample_rate as usize) / (fps as usize);
    let total_frames = seconds * fps as u64;
    let started = Instant::now();

    for n in 0..total_frames {
        if interrupted.load(Ordering::SeqCst) {
            println!("Interrupted, finalizing...");
            break;
        }

        let timestamp_us = started.elapsed().as_micros() as i64;
        let frame = synthetic_rgba_frame(n as u32, width, height, timestamp_us);
        recorder.submit_video_frame(frame.data, width, height, timestamp_us);
        recorder.submit_audio_samples(
            &synthetic_pcm_tone(440.0, samples_per_frame, channels, sample_rate),
            channels,
            sample_rate,
        );

        while let Ok(event) = events.try_recv() {
            if let RecorderEvent::StatsUpdated(stats) = event {
                println!(
                    "  {:.1}s  {} frames written, {} dropped, {:.1} fps",
                    stats.elapsed_secs, stats.frames_written, stats.frames_dropped, stats.avg_fps
                );
            }
        }

        // Pace submission like a real render loop.
        let next_deadline = frame_interval * (n as u32 + 1);
        let elapsed = started.elapsed();
        if next_deadline > elapsed {
            std::thread::sleep(next_deadline - elapsed);
        }
    }

    recorder.stop().context("failed to finalize recording")?;

    let stats = recorder.stats();
    println!("Done:\n{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
