//! Opus audio encoding via libopus.
//!
//! The encoder accumulates interleaved f32 PCM internally and consumes it
//! in whole codec-frame-sized chunks; a partial trailing chunk persists
//! across calls and is only emitted (zero-padded) by `flush`. Timestamps
//! come from a running sample counter rescaled by the sample rate, so
//! arbitrary submission sizes cannot skew the audio track.

use crate::error::RecorderError;

/// Opus frame size in samples per channel at 48 kHz (20 ms frames).
pub const OPUS_FRAME_SAMPLES: usize = 960;

/// OPUS_APPLICATION_AUDIO: optimized for music/mixed content.
const OPUS_APPLICATION_AUDIO: i32 = 2049;

/// Sample rate Opus operates at.
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// One encoded Opus packet ready for muxing.
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    /// Raw Opus packet data.
    pub data: Vec<u8>,
    /// Presentation timestamp in seconds (sample count rescaled).
    pub pts_secs: f64,
    /// Duration of this packet in seconds.
    pub duration_secs: f64,
}

/// Opus encoder for interleaved f32 PCM.
///
/// The underlying libopus encoder is not thread-safe for concurrent
/// access but is safe to use from the single thread it is moved to. The
/// recording worker is the only caller; do not implement `Clone` or
/// `Sync` for this type.
pub struct OpusEncoder {
    encoder: *mut libopus_sys::OpusEncoder,
    channels: u16,
    sample_rate: u32,
    /// Interleaved samples awaiting a full codec frame.
    sample_buffer: Vec<f32>,
    /// Samples per channel encoded so far, for pts assignment.
    samples_encoded: u64,
}

// SAFETY: the raw pointer is owned exclusively by this value, libopus
// encoders are safe to use from any single thread, and the type is not
// Sync, so moving it to the worker thread cannot introduce concurrent
// access.
unsafe impl Send for OpusEncoder {}

impl OpusEncoder {
    /// Create a new Opus encoder.
    ///
    /// `sample_rate` must be 48000 and `channels` 1 or 2; anything else is
    /// unencodable and reported as an audio error (non-fatal to a session,
    /// which then proceeds video-only).
    pub fn new(sample_rate: u32, channels: u16, bitrate: u32) -> Result<Self, RecorderError> {
        if sample_rate != OPUS_SAMPLE_RATE {
            return Err(RecorderError::Audio(
                "Opus requires 48000 Hz sample rate".to_string(),
            ));
        }
        if channels != 1 && channels != 2 {
            return Err(RecorderError::Audio(
                "Opus supports only mono (1) or stereo (2) channels".to_string(),
            ));
        }

        let mut error: i32 = 0;
        let encoder = unsafe {
            libopus_sys::opus_encoder_create(
                sample_rate as i32,
                channels as i32,
                OPUS_APPLICATION_AUDIO,
                &mut error,
            )
        };

        if encoder.is_null() || error != 0 {
            return Err(RecorderError::Audio(format!(
                "Failed to create Opus encoder: error code {}",
                error
            )));
        }

        let result = unsafe {
            libopus_sys::opus_encoder_ctl(
                encoder,
                libopus_sys::OPUS_SET_BITRATE_REQUEST as i32,
                bitrate as i32,
            )
        };

        if result != 0 {
            unsafe { libopus_sys::opus_encoder_destroy(encoder) };
            return Err(RecorderError::Audio(format!(
                "Failed to set bitrate: error code {}",
                result
            )));
        }

        Ok(Self {
            encoder,
            channels,
            sample_rate,
            sample_buffer: Vec::with_capacity(OPUS_FRAME_SAMPLES * channels as usize * 2),
            samples_encoded: 0,
        })
    }

    /// Append interleaved samples and encode every complete codec frame.
    ///
    /// The submitted tags must match the encoder configuration; a mismatch
    /// is an error for this unit of work, not for the session. May return
    /// an empty vec (not enough samples yet) or several packets.
    pub fn encode(
        &mut self,
        samples: &[f32],
        channels: u16,
        sample_rate: u32,
    ) -> Result<Vec<EncodedAudio>, RecorderError> {
        if sample_rate != self.sample_rate {
            return Err(RecorderError::Audio(format!(
                "Sample rate mismatch: expected {}, got {}",
                self.sample_rate, sample_rate
            )));
        }
        if channels != self.channels {
            return Err(RecorderError::Audio(format!(
                "Channel count mismatch: expected {}, got {}",
                self.channels, channels
            )));
        }

        self.sample_buffer.extend_from_slice(samples);
        self.encode_buffered()
    }

    /// Encode any remaining buffered samples, zero-padding the final
    /// partial chunk. Call once at stream end; trailing audio is lost
    /// otherwise.
    pub fn flush(&mut self) -> Result<Vec<EncodedAudio>, RecorderError> {
        if self.sample_buffer.is_empty() {
            return Ok(Vec::new());
        }

        let samples_per_frame = OPUS_FRAME_SAMPLES * self.channels as usize;
        let padding_needed = samples_per_frame - (self.sample_buffer.len() % samples_per_frame);
        if padding_needed < samples_per_frame {
            self.sample_buffer.extend(std::iter::repeat(0.0f32).take(padding_needed));
        }

        self.encode_buffered()
    }

    fn encode_buffered(&mut self) -> Result<Vec<EncodedAudio>, RecorderError> {
        let samples_per_frame = OPUS_FRAME_SAMPLES * self.channels as usize;
        let frame_duration = OPUS_FRAME_SAMPLES as f64 / self.sample_rate as f64;
        let mut packets = Vec::new();

        while self.sample_buffer.len() >= samples_per_frame {
            let frame_samples: Vec<f32> = self.sample_buffer.drain(..samples_per_frame).collect();

            let pts_secs = self.samples_encoded as f64 / self.sample_rate as f64;

            let mut output = vec![0u8; 4000]; // Max Opus packet size
            let len = unsafe {
                libopus_sys::opus_encode_float(
                    self.encoder,
                    frame_samples.as_ptr(),
                    OPUS_FRAME_SAMPLES as i32,
                    output.as_mut_ptr(),
                    output.len() as i32,
                )
            };

            if len < 0 {
                return Err(RecorderError::Audio(format!(
                    "Opus encoding failed: error code {}",
                    len
                )));
            }

            output.truncate(len as usize);

            packets.push(EncodedAudio {
                data: output,
                pts_secs,
                duration_secs: frame_duration,
            });

            self.samples_encoded += OPUS_FRAME_SAMPLES as u64;
        }

        Ok(packets)
    }

    /// Interleaved samples still buffered (the partial remainder).
    pub fn buffered_samples(&self) -> usize {
        self.sample_buffer.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for OpusEncoder {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            unsafe {
                libopus_sys::opus_encoder_destroy(self.encoder);
            }
        }
    }
}

/// Whether an audio codec identifier resolves to the Opus encoder.
pub fn codec_resolves(codec: &str) -> bool {
    codec.eq_ignore_ascii_case("opus")
}

/// Codec-frame chunks expected from `total_samples` interleaved samples
/// after a final flush (the last partial chunk is zero-padded).
pub fn expected_chunks(total_samples: usize, channels: u16) -> usize {
    let samples_per_frame = OPUS_FRAME_SAMPLES * channels as usize;
    total_samples.div_ceil(samples_per_frame)
}
