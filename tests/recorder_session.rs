//! End-to-end recording session tests.
//!
//! These drive the public `Recorder` API the way a visualizer would and
//! check the file on disk afterwards. No capture hardware involved; all
//! media is synthetic.

use std::time::Duration;

use vizrec::testing::{silent_pcm, synthetic_rgba_frame};
use vizrec::{EncoderSettings, Recorder, RecorderError, RecorderEvent, RecordingState};

fn session_settings(dir: &std::path::Path, name: &str) -> EncoderSettings {
    let mut settings = EncoderSettings::new(dir.join(name));
    settings.video.width = 320;
    settings.video.height = 240;
    settings.video.fps = 30;
    settings
}

fn assert_mp4_header(path: &std::path::Path) {
    let bytes = std::fs::read(path).expect("output file should exist");
    assert!(bytes.len() > 8, "output file too small: {} bytes", bytes.len());
    assert_eq!(&bytes[4..8], b"ftyp", "output should be an MP4 container");
}

#[test]
fn test_zero_frame_session_yields_valid_container() {
    let dir = tempfile::tempdir().unwrap();
    let settings = session_settings(dir.path(), "empty.mp4");
    let output = settings.output_path.clone();

    let recorder = Recorder::new();
    recorder.start(settings).unwrap();
    assert_eq!(recorder.state(), RecordingState::Recording);

    recorder.stop().unwrap();
    assert_eq!(recorder.state(), RecordingState::Stopped);
    assert_mp4_header(&output);
}

#[test]
fn test_full_session_writes_all_submitted_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = session_settings(dir.path(), "full.mp4");
    settings.video.width = 1280;
    settings.video.height = 720;
    let output = settings.output_path.clone();

    let recorder = Recorder::new();
    let events = recorder.events();
    recorder.start(settings).unwrap();

    // 3 seconds at 30 fps with matching silent audio, paced like a real
    // render loop so periodic stats snapshots fire mid-session.
    let started = std::time::Instant::now();
    let frame_interval = Duration::from_secs_f64(1.0 / 30.0);
    let samples_per_frame = 48_000 / 30;
    for n in 0..90u32 {
        let frame = synthetic_rgba_frame(n, 1280, 720, n as i64 * 33_333);
        recorder.submit_video_frame(frame.data, 1280, 720, frame.timestamp_us);
        recorder.submit_audio_samples(&silent_pcm(samples_per_frame, 2), 2, 48_000);

        let deadline = frame_interval * (n + 1);
        let elapsed = started.elapsed();
        if deadline > elapsed {
            std::thread::sleep(deadline - elapsed);
        }
    }

    // Snapshots received before stop are necessarily mid-session; they
    // must already carry live byte counts.
    let mut saw_live_bytes = false;
    while let Ok(event) = events.try_recv() {
        if let RecorderEvent::StatsUpdated(snapshot) = event {
            if snapshot.bytes_written > 0 && snapshot.frames_written < 90 {
                saw_live_bytes = true;
            }
        }
    }
    assert!(saw_live_bytes, "mid-session stats should report bytes written");

    recorder.stop().unwrap();

    let stats = recorder.stats();
    assert_eq!(stats.frames_written, 90, "every queued frame should land");
    assert_eq!(stats.frames_dropped, 0);
    assert!(stats.bytes_written > 0);
    assert!(stats.audio_packets > 0, "session should carry an audio track");
    // 90 frames at 30 fps of paced submission: about three seconds.
    assert!(
        (stats.elapsed_secs - 3.0).abs() < 0.5,
        "unexpected session duration: {:.2}s",
        stats.elapsed_secs
    );
    assert_mp4_header(&output);
}

#[test]
fn test_stop_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();

    let recorder = Recorder::new();
    recorder
        .start(session_settings(dir.path(), "idem.mp4"))
        .unwrap();

    recorder.stop().unwrap();
    recorder.stop().unwrap();
    recorder.stop().unwrap();
    assert_eq!(recorder.state(), RecordingState::Stopped);
}

#[test]
fn test_second_start_while_recording_is_rejected() {
    let dir = tempfile::tempdir().unwrap();

    let recorder = Recorder::new();
    recorder
        .start(session_settings(dir.path(), "first.mp4"))
        .unwrap();

    let result = recorder.start(session_settings(dir.path(), "second.mp4"));
    assert!(matches!(result, Err(RecorderError::AlreadyRecording)));
    assert_eq!(recorder.state(), RecordingState::Recording);

    recorder.stop().unwrap();
}

#[test]
fn test_uncreatable_output_directory_fails_before_state_change() {
    let dir = tempfile::tempdir().unwrap();

    // A plain file where the output directory should go.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let settings = session_settings(&blocker.join("sub"), "out.mp4");
    let recorder = Recorder::new();

    let result = recorder.start(settings);
    assert!(matches!(result, Err(RecorderError::Validation(_))));
    assert_eq!(recorder.state(), RecordingState::Stopped);
    // A rejected start publishes no events at all.
    assert!(recorder.events().try_recv().is_err());
}

#[test]
fn test_restart_after_stop_records_again() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Recorder::new();

    for name in ["a.mp4", "b.mp4"] {
        let settings = session_settings(dir.path(), name);
        let output = settings.output_path.clone();
        recorder.start(settings).unwrap();
        for n in 0..10u32 {
            let frame = synthetic_rgba_frame(n, 320, 240, n as i64 * 33_333);
            recorder.submit_video_frame(frame.data, 320, 240, frame.timestamp_us);
        }
        recorder.stop().unwrap();
        assert_mp4_header(&output);
    }
}

#[test]
fn test_event_sequence_for_clean_session() {
    let dir = tempfile::tempdir().unwrap();

    let recorder = Recorder::new();
    let events = recorder.events();

    recorder
        .start(session_settings(dir.path(), "events.mp4"))
        .unwrap();
    recorder.stop().unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RecorderEvent::StateChanged(state) = event {
            states.push(state);
        }
    }

    assert_eq!(
        states,
        vec![
            RecordingState::Starting,
            RecordingState::Recording,
            RecordingState::Stopping,
            RecordingState::Stopped,
        ]
    );
}

#[test]
fn test_video_only_session_when_audio_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = session_settings(dir.path(), "video_only.mp4");
    settings.audio.codec = String::new();
    let output = settings.output_path.clone();

    let recorder = Recorder::new();
    recorder.start(settings).unwrap();

    for n in 0..15u32 {
        let frame = synthetic_rgba_frame(n, 320, 240, n as i64 * 33_333);
        recorder.submit_video_frame(frame.data, 320, 240, frame.timestamp_us);
    }
    // Submitted PCM is discarded without error when no track exists.
    recorder.submit_audio_samples(&silent_pcm(4800, 2), 2, 48_000);

    recorder.stop().unwrap();
    assert_eq!(recorder.stats().frames_written, 15);
    assert_mp4_header(&output);
}

#[test]
fn test_submissions_after_stop_are_ignored() {
    let dir = tempfile::tempdir().unwrap();

    let recorder = Recorder::new();
    recorder
        .start(session_settings(dir.path(), "late.mp4"))
        .unwrap();
    recorder.stop().unwrap();

    let frame = synthetic_rgba_frame(0, 320, 240, 0);
    recorder.submit_video_frame(frame.data, 320, 240, 0);
    recorder.submit_audio_samples(&silent_pcm(480, 2), 2, 48_000);

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.state(), RecordingState::Stopped);
}
