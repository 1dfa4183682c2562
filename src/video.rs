//! H.264 video encoding via openh264.
//!
//! Converts captured RGBA frames to YUV 4:2:0 and encodes them to Annex B
//! NAL units. Timestamps are assigned from a monotonically increasing frame
//! counter in the video time base (1/fps) and reported in seconds for the
//! muxer. A key frame is forced every GOP interval.

use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use crate::error::RecorderError;
use crate::settings::EncoderSettings;
use crate::types::GrabbedFrame;

/// One encoded video frame ready for muxing.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    /// H.264 data in Annex B format (with start codes).
    pub data: Vec<u8>,
    pub is_keyframe: bool,
    /// Presentation timestamp in seconds (frame index rescaled by 1/fps).
    pub pts_secs: f64,
}

pub struct H264Encoder {
    encoder: Encoder,
    width: u32,
    height: u32,
    fps: u32,
    gop: u32,
    frame_index: u64,
}

impl H264Encoder {
    /// Resolve the configured video codec and open an encoder.
    ///
    /// An unresolvable video codec is fatal to session initialization.
    pub fn new(settings: &EncoderSettings) -> Result<Self, RecorderError> {
        let v = &settings.video;

        if !codec_resolves(&v.codec) {
            return Err(RecorderError::Init(format!(
                "video codec not found: {}",
                v.codec
            )));
        }

        if v.max_b_frames > 0 {
            log::warn!(
                "encoder emits no B-frames; max_b_frames={} ignored",
                v.max_b_frames
            );
        }

        // openh264 infers dimensions from the YUV source at encode time;
        // crf/preset act as rate-control hints only.
        let encoder = Encoder::new()
            .map_err(|e| RecorderError::Init(format!("Failed to create encoder: {}", e)))?;

        Ok(Self {
            encoder,
            width: v.width,
            height: v.height,
            fps: v.fps,
            gop: settings.gop_size(),
            frame_index: 0,
        })
    }

    /// Encode one captured RGBA frame.
    ///
    /// Returns `Ok(None)` when the codec accepted the input but emitted no
    /// output for it; one input does not imply one output.
    pub fn encode_rgba(&mut self, frame: &GrabbedFrame) -> Result<Option<EncodedFrame>, RecorderError> {
        if frame.width != self.width || frame.height != self.height {
            return Err(RecorderError::Encode(format!(
                "frame dimensions {}x{} don't match session {}x{}",
                frame.width, frame.height, self.width, self.height
            )));
        }
        if frame.data.len() != frame.expected_len() {
            return Err(RecorderError::Encode(format!(
                "invalid frame size: expected {} bytes, got {}",
                frame.expected_len(),
                frame.data.len()
            )));
        }

        if self.frame_index > 0 && self.frame_index % self.gop as u64 == 0 {
            self.encoder.force_intra_frame();
        }

        let yuv = rgba_to_yuv420(&frame.data, self.width, self.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, self.width as usize, self.height as usize);

        let bitstream = self
            .encoder
            .encode(&yuv_buffer)
            .map_err(|e| RecorderError::Encode(format!("Encoding failed: {}", e)))?;

        let pts_secs = frame_pts_secs(self.frame_index, self.fps);
        self.frame_index += 1;

        let is_keyframe = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        let data = bitstream.to_vec();

        if data.is_empty() {
            return Ok(None);
        }

        Ok(Some(EncodedFrame {
            data,
            is_keyframe,
            pts_secs,
        }))
    }

    /// Frames submitted to the codec so far.
    pub fn frames_encoded(&self) -> u64 {
        self.frame_index
    }
}

/// Whether a codec identifier resolves to the H.264 encoder.
pub fn codec_resolves(codec: &str) -> bool {
    matches!(
        codec.to_ascii_lowercase().as_str(),
        "h264" | "x264" | "libx264" | "openh264"
    )
}

/// Rescale a frame index from the video time base (1/fps) to seconds.
pub fn frame_pts_secs(frame_index: u64, fps: u32) -> f64 {
    frame_index as f64 / fps as f64
}

/// Convert packed RGBA to planar YUV 4:2:0 (BT.601).
fn rgba_to_yuv420(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let idx = (y * w + x) * 4;
            let r = rgba[idx] as i32;
            let g = rgba[idx + 1] as i32;
            let b = rgba[idx + 2] as i32;
            // Alpha is discarded.

            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // Subsample U and V over 2x2 blocks.
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(width: u32, height: u32, level: u8, n: i64) -> GrabbedFrame {
        let mut data = vec![level; (width * height * 4) as usize];
        // Opaque alpha.
        for px in data.chunks_exact_mut(4) {
            px[3] = 255;
        }
        GrabbedFrame::from_rgba(data, width, height, n)
    }

    #[test]
    fn test_rgba_to_yuv420_size() {
        let rgba = vec![128u8; 640 * 480 * 4];
        let yuv = rgba_to_yuv420(&rgba, 640, 480);
        assert_eq!(yuv.len(), 640 * 480 * 3 / 2);
    }

    #[test]
    fn test_codec_resolution() {
        assert!(codec_resolves("h264"));
        assert!(codec_resolves("libx264"));
        assert!(!codec_resolves("av1"));
        assert!(!codec_resolves(""));
    }

    #[test]
    fn test_unknown_codec_is_init_error() {
        let mut settings = EncoderSettings::new("out.mp4");
        settings.video.codec = "av1".to_string();
        let result = H264Encoder::new(&settings);
        assert!(matches!(result, Err(RecorderError::Init(_))));
    }

    #[test]
    fn test_first_frame_is_keyframe() {
        let mut settings = EncoderSettings::new("out.mp4");
        settings.video.width = 320;
        settings.video.height = 240;
        settings.video.fps = 30;

        let mut encoder = H264Encoder::new(&settings).expect("encoder creation");
        let encoded = encoder
            .encode_rgba(&gray_frame(320, 240, 128, 0))
            .expect("encode")
            .expect("first frame should emit output");

        assert!(encoded.is_keyframe);
        assert!(
            encoded.data.starts_with(&[0, 0, 0, 1]) || encoded.data.starts_with(&[0, 0, 1]),
            "should start with Annex B start code"
        );
    }

    #[test]
    fn test_pts_monotonically_non_decreasing() {
        let mut settings = EncoderSettings::new("out.mp4");
        settings.video.width = 320;
        settings.video.height = 240;
        settings.video.fps = 30;

        let mut encoder = H264Encoder::new(&settings).expect("encoder creation");
        let mut last_pts = -1.0f64;
        for n in 0..10 {
            let level = (n * 20) as u8;
            if let Some(encoded) = encoder
                .encode_rgba(&gray_frame(320, 240, level, n))
                .expect("encode")
            {
                assert!(encoded.pts_secs >= last_pts);
                last_pts = encoded.pts_secs;
            }
        }
        assert_eq!(encoder.frames_encoded(), 10);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let mut settings = EncoderSettings::new("out.mp4");
        settings.video.width = 320;
        settings.video.height = 240;

        let mut encoder = H264Encoder::new(&settings).expect("encoder creation");
        let result = encoder.encode_rgba(&gray_frame(640, 480, 0, 0));
        assert!(matches!(result, Err(RecorderError::Encode(_))));
    }

    #[test]
    fn test_frame_pts_rescale() {
        assert_eq!(frame_pts_secs(0, 30), 0.0);
        assert!((frame_pts_secs(90, 30) - 3.0).abs() < 1e-9);
        assert!((frame_pts_secs(1, 60) - 1.0 / 60.0).abs() < 1e-9);
    }
}
