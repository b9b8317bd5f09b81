//! Capture surface.
//!
//! Owns the live stream for one session and turns the current video frame
//! into an encoded still on demand:
//! - `attach_and_play` binds a stream and starts playback
//! - `capture_frame` scales the current frame to a fixed 320x240 buffer and
//!   encodes it as a PNG data URI
//!
//! Every `capture_frame` call grabs a fresh frame; nothing is cached between
//! calls. Encoded frames are zeroized on drop.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbImage};
use zeroize::Zeroize;

use crate::camera::CameraStream;
use crate::error::RelayError;
use crate::now_millis;

pub const CAPTURE_WIDTH: u32 = 320;
pub const CAPTURE_HEIGHT: u32 = 240;

/// One encoded still. Immutable after creation.
pub struct CapturedFrame {
    /// `data:image/png;base64,...`
    pub encoded_image: String,
    pub captured_at_ms: u64,
}

impl Drop for CapturedFrame {
    fn drop(&mut self) {
        self.encoded_image.zeroize();
    }
}

#[derive(Default)]
pub struct CaptureSurface {
    stream: Option<Box<dyn CameraStream>>,
}

impl CaptureSurface {
    pub fn new() -> Self {
        Self { stream: None }
    }

    /// Bind a stream and start playback. On playback failure the stream is
    /// dropped and the surface keeps whatever it had before.
    pub fn attach_and_play(&mut self, mut stream: Box<dyn CameraStream>) -> Result<(), RelayError> {
        stream.play()?;
        self.detach();
        self.stream = Some(stream);
        Ok(())
    }

    /// Grab the current frame, scale it to 320x240 and encode it as a PNG
    /// data URI.
    pub fn capture_frame(&mut self) -> Result<CapturedFrame, RelayError> {
        let stream = self.stream.as_mut().ok_or(RelayError::SurfaceUnavailable)?;
        let frame = stream.grab()?;

        let (width, height) = (frame.width, frame.height);
        let pixels = frame.take_pixels();
        let rgb = RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            RelayError::Encoding("pixel buffer does not match reported dimensions".to_string())
        })?;
        let scaled =
            image::imageops::resize(&rgb, CAPTURE_WIDTH, CAPTURE_HEIGHT, FilterType::Triangle);

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(scaled)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| RelayError::Encoding(e.to_string()))?;

        let captured_at_ms = now_millis().map_err(|e| RelayError::Encoding(e.to_string()))?;
        Ok(CapturedFrame {
            encoded_image: format!("data:image/png;base64,{}", BASE64.encode(&png)),
            captured_at_ms,
        })
    }

    /// Stop and release the attached stream, if any.
    pub fn detach(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }
}
