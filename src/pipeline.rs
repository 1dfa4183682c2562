//! Encode-and-mux pipeline for one recording session.
//!
//! Owns the H.264 encoder, the optional Opus encoder, and the MP4 muxer,
//! and is used exclusively from the recording worker thread. Media enters
//! as raw frames and PCM, leaves as a finalized MP4 on `finish`.

use std::fs::File;
use std::io::BufWriter;

use muxide::api::{AudioCodec, Metadata, Muxer, MuxerBuilder, VideoCodec};

use crate::audio::{self, OpusEncoder};
use crate::error::RecorderError;
use crate::settings::EncoderSettings;
use crate::types::GrabbedFrame;
use crate::video::H264Encoder;

/// Totals reported once the container is finalized.
#[derive(Debug, Clone, Default)]
pub struct PipelineSummary {
    pub video_frames: u64,
    pub audio_packets: u64,
    pub duration_secs: f64,
    pub bytes_written: u64,
}

pub struct EncodePipeline {
    muxer: Muxer<BufWriter<File>>,
    video: H264Encoder,
    audio: Option<OpusEncoder>,
    frames_written: u64,
    audio_packets: u64,
    bytes_written: u64,
}

impl EncodePipeline {
    /// Open the output file and initialize encoders and muxer.
    ///
    /// An unresolvable or failing video codec aborts initialization. An
    /// unusable audio configuration does not: the session degrades to
    /// video-only with a warning.
    pub fn new(settings: &EncoderSettings) -> Result<Self, RecorderError> {
        let video = H264Encoder::new(settings)?;

        let audio = if settings.audio_enabled() {
            match Self::open_audio(settings) {
                Ok(encoder) => Some(encoder),
                Err(e) => {
                    log::warn!("Audio track disabled for this session: {}", e);
                    None
                }
            }
        } else {
            None
        };

        let file = File::create(&settings.output_path).map_err(|e| {
            RecorderError::Io(format!(
                "Failed to create output file {:?}: {}",
                settings.output_path, e
            ))
        })?;

        let mut builder = MuxerBuilder::new(BufWriter::new(file))
            .video(
                VideoCodec::H264,
                settings.video.width,
                settings.video.height,
                settings.video.fps as f64,
            )
            .with_fast_start(true)
            .with_metadata(Metadata::new().with_current_time());

        if let Some(ref enc) = audio {
            builder = builder.audio(AudioCodec::Opus, enc.sample_rate(), enc.channels());
        }

        let muxer = builder
            .build()
            .map_err(|e| RecorderError::Mux(format!("Failed to initialize muxer: {}", e)))?;

        log::info!(
            "Recording pipeline ready: {}x{}@{}fps h264{} -> {:?}",
            settings.video.width,
            settings.video.height,
            settings.video.fps,
            if audio.is_some() { " + opus" } else { "" },
            settings.output_path
        );

        Ok(Self {
            muxer,
            video,
            audio,
            frames_written: 0,
            audio_packets: 0,
            bytes_written: 0,
        })
    }

    fn open_audio(settings: &EncoderSettings) -> Result<OpusEncoder, RecorderError> {
        let a = &settings.audio;
        if !audio::codec_resolves(&a.codec) {
            return Err(RecorderError::Audio(format!(
                "audio codec not found: {}",
                a.codec
            )));
        }
        OpusEncoder::new(a.sample_rate, a.channels, a.bitrate)
    }

    /// Encode and mux one captured frame. Returns whether the codec
    /// emitted output for it.
    pub fn encode_video(&mut self, frame: &GrabbedFrame) -> Result<bool, RecorderError> {
        let Some(encoded) = self.video.encode_rgba(frame)? else {
            return Ok(false);
        };

        self.muxer
            .write_video(encoded.pts_secs, &encoded.data, encoded.is_keyframe)
            .map_err(|e| RecorderError::Mux(format!("Failed to write video frame: {}", e)))?;

        self.frames_written += 1;
        self.bytes_written += encoded.data.len() as u64;
        Ok(true)
    }

    /// Encode and mux a chunk of interleaved PCM. Returns the number of
    /// packets produced; zero when samples are still accumulating or the
    /// session has no audio track.
    pub fn encode_audio(
        &mut self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<usize, RecorderError> {
        let Some(ref mut encoder) = self.audio else {
            return Ok(0);
        };

        let packets = encoder.encode(samples, channels, sample_rate)?;
        let produced = packets.len();
        for packet in packets {
            self.muxer
                .write_audio(packet.pts_secs, &packet.data)
                .map_err(|e| RecorderError::Mux(format!("Failed to write audio packet: {}", e)))?;
            self.audio_packets += 1;
            self.bytes_written += packet.data.len() as u64;
        }
        Ok(produced)
    }

    /// Flush encoders and finalize the container.
    ///
    /// Consumes the pipeline; the file is not playable until this runs.
    pub fn finish(mut self) -> Result<PipelineSummary, RecorderError> {
        if let Some(ref mut encoder) = self.audio {
            for packet in encoder.flush()? {
                self.muxer
                    .write_audio(packet.pts_secs, &packet.data)
                    .map_err(|e| {
                        RecorderError::Mux(format!("Failed to write audio packet: {}", e))
                    })?;
                self.audio_packets += 1;
                self.bytes_written += packet.data.len() as u64;
            }
        }

        let stats = self
            .muxer
            .finish_with_stats()
            .map_err(|e| RecorderError::Mux(format!("Failed to finalize container: {}", e)))?;

        log::info!(
            "Finalized recording: {} video frames, {} audio packets, {:.2}s, {} bytes",
            stats.video_frames,
            stats.audio_frames,
            stats.duration_secs,
            stats.bytes_written
        );

        Ok(PipelineSummary {
            video_frames: stats.video_frames,
            audio_packets: stats.audio_frames,
            duration_secs: stats.duration_secs,
            bytes_written: stats.bytes_written,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn audio_packets(&self) -> u64 {
        self.audio_packets
    }

    /// Encoded payload bytes handed to the muxer so far. Tracked live so
    /// progress stats can report it before the container is finalized.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether this session carries an audio track.
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::synthetic_rgba_frame;

    fn test_settings(dir: &std::path::Path) -> EncoderSettings {
        let mut settings = EncoderSettings::new(dir.join("out.mp4"));
        settings.video.width = 320;
        settings.video.height = 240;
        settings.video.fps = 30;
        settings
    }

    #[test]
    fn test_pipeline_creation() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = EncodePipeline::new(&test_settings(dir.path())).unwrap();
        assert!(pipeline.has_audio());
        assert_eq!(pipeline.frames_written(), 0);
        assert_eq!(pipeline.bytes_written(), 0);
    }

    #[test]
    fn test_bytes_written_tracked_during_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EncodePipeline::new(&test_settings(dir.path())).unwrap();

        pipeline
            .encode_video(&synthetic_rgba_frame(0, 320, 240, 0))
            .unwrap();
        let after_video = pipeline.bytes_written();
        assert!(after_video > 0, "video payload bytes should be counted live");

        pipeline
            .encode_audio(&vec![0.0f32; 48_000 * 2], 2, 48_000)
            .unwrap();
        assert!(pipeline.bytes_written() > after_video);
    }

    #[test]
    fn test_unresolvable_audio_codec_degrades_to_video_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.audio.codec = "aac".to_string();

        let pipeline = EncodePipeline::new(&settings).unwrap();
        assert!(!pipeline.has_audio());
    }

    #[test]
    fn test_unresolvable_video_codec_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.video.codec = "av1".to_string();

        assert!(matches!(
            EncodePipeline::new(&settings),
            Err(RecorderError::Init(_))
        ));
    }

    #[test]
    fn test_unwritable_output_path_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings(dir.path());
        settings.output_path = dir.path().join("missing_dir").join("out.mp4");

        assert!(matches!(
            EncodePipeline::new(&settings),
            Err(RecorderError::Io(_))
        ));
    }

    #[test]
    fn test_encode_and_finish_produces_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = test_settings(dir.path());
        let output_path = settings.output_path.clone();

        let mut pipeline = EncodePipeline::new(&settings).unwrap();
        for n in 0..30 {
            let frame = synthetic_rgba_frame(n, 320, 240, n as i64 * 33_333);
            pipeline.encode_video(&frame).unwrap();
        }
        pipeline.encode_audio(&vec![0.0f32; 48_000 * 2], 2, 48_000).unwrap();

        let summary = pipeline.finish().unwrap();
        assert_eq!(summary.video_frames, 30);
        assert!(summary.audio_packets > 0);
        assert!(summary.bytes_written > 0);

        let bytes = std::fs::read(&output_path).unwrap();
        // 'ftyp' box near the start of any valid MP4.
        assert!(bytes.len() > 8);
        assert_eq!(&bytes[4..8], b"ftyp");
    }

    #[test]
    fn test_mismatched_audio_tags_error_without_killing_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let mut pipeline = EncodePipeline::new(&test_settings(dir.path())).unwrap();

        assert!(pipeline.encode_audio(&[0.0; 8], 2, 44_100).is_err());

        // The pipeline stays usable for further work.
        let frame = synthetic_rgba_frame(0, 320, 240, 0);
        assert!(pipeline.encode_video(&frame).is_ok());
    }
}
