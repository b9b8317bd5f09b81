//! Camera sources.
//!
//! A `CameraSource` represents a device the operator controls. Acquiring it is
//! an explicit permission step: the device (or the platform in front of it)
//! may refuse, and refusal is surfaced as `RelayError::PermissionDenied`
//! rather than retried here.
//!
//! Sources:
//! - HTTP snapshot cameras (JPEG over http(s), e.g. IP cameras)
//! - Stub source (testing and `stub://` deployments)
//!
//! A source hands out at most one `CameraStream` per acquisition. The stream
//! must be stopped when the owning session unmounts.

mod http;
mod stub;

pub use http::HttpCamera;
pub use stub::{StubCamera, StubCameraState};

use std::str::FromStr;

use anyhow::anyhow;
use zeroize::Zeroize;

use crate::error::RelayError;

/// Which camera to prefer when a device exposes more than one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Facing {
    User,
    Environment,
}

impl Facing {
    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::User => "user",
            Facing::Environment => "environment",
        }
    }
}

impl FromStr for Facing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(Facing::User),
            "environment" => Ok(Facing::Environment),
            other => Err(anyhow!(
                "unknown facing '{}'; expected 'user' or 'environment'",
                other
            )),
        }
    }
}

/// One decoded video frame, RGB8. Pixel data is zeroized on drop.
pub struct VideoFrame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Take ownership of the pixel buffer, leaving nothing behind to zeroize.
    pub fn take_pixels(mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}

impl Drop for VideoFrame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}

/// A live stream handed out by a `CameraSource`.
pub trait CameraStream {
    /// Start playback. Frames are not observable until this resolves.
    fn play(&mut self) -> Result<(), RelayError>;

    /// Grab the current frame. Each call reflects current camera state; no
    /// caching.
    fn grab(&mut self) -> Result<VideoFrame, RelayError>;

    /// Stop the stream and release the device.
    fn stop(&mut self);
}

pub trait CameraSource {
    /// Request camera access. Blocks until the device grants or refuses.
    fn acquire(&mut self, facing: Facing) -> Result<Box<dyn CameraStream>, RelayError>;
}

impl CameraSource for Box<dyn CameraSource> {
    fn acquire(&mut self, facing: Facing) -> Result<Box<dyn CameraStream>, RelayError> {
        (**self).acquire(facing)
    }
}
