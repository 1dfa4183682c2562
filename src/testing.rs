//! Synthetic media generation for tests and demos.
//!
//! Deterministic frames and PCM that exercise the full pipeline without
//! a renderer or a sound card attached.

use crate::types::GrabbedFrame;

/// Generate one RGBA frame of a moving gradient pattern.
///
/// The pattern varies with `frame_number` so consecutive frames differ,
/// which keeps the video encoder from collapsing a session into a single
/// repeated frame.
pub fn synthetic_rgba_frame(
    frame_number: u32,
    width: u32,
    height: u32,
    timestamp_us: i64,
) -> GrabbedFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let phase = frame_number.wrapping_mul(3);

    for y in 0..height {
        for x in 0..width {
            let r = ((x.wrapping_add(phase)) % 256) as u8;
            let g = ((y.wrapping_add(phase)) % 256) as u8;
            let b = ((x ^ y) % 256) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }

    GrabbedFrame::from_rgba(data, width, height, timestamp_us)
}

/// Generate interleaved f32 PCM of a sine tone.
pub fn synthetic_pcm_tone(
    frequency_hz: f32,
    samples_per_channel: usize,
    channels: u16,
    sample_rate: u32,
) -> Vec<f32> {
    let mut samples = Vec::with_capacity(samples_per_channel * channels as usize);
    for n in 0..samples_per_channel {
        let t = n as f32 / sample_rate as f32;
        let value = (2.0 * std::f32::consts::PI * frequency_hz * t).sin() * 0.3;
        for _ in 0..channels {
            samples.push(value);
        }
    }
    samples
}

/// Generate interleaved silence.
pub fn silent_pcm(samples_per_channel: usize, channels: u16) -> Vec<f32> {
    vec![0.0; samples_per_channel * channels as usize]
}
