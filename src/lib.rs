//! snapshot-relay
//!
//! Periodic camera snapshot capture and upload relay. One mounted session
//! acquires a camera the operator controls, waits for the sensor to settle,
//! captures a 320x240 still as a PNG data URI, uploads it to a blob store
//! under a unique key, and appends an upload record to a metadata collection.
//! A constant-interval timer repeats the cycle; failures are recorded and
//! retried, never fatal. A companion listing resolves previously uploaded
//! frames for review.
//!
//! Camera acquisition is an explicit permission step against devices the
//! operator owns; a refusing or unreachable device ends the attempt until
//! retried, and restricted host environments are never asked at all.
//!
//! # Module Structure
//!
//! - `camera`: camera sources (HTTP snapshot, stub) and the stream contract
//! - `capture`: the capture surface producing encoded frames
//! - `store`: blob/metadata store clients (HTTP and in-memory)
//! - `upload`: the per-frame upload chain and key generation
//! - `session`: the permission/retry state machine and timers
//! - `listing`: read-only gallery fan-out
//! - `config`: relayd configuration (file + environment)

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};

pub mod camera;
pub mod capture;
pub mod config;
pub mod error;
pub mod listing;
pub mod session;
pub mod store;
pub mod upload;

pub use camera::{CameraSource, CameraStream, Facing, HttpCamera, StubCamera, VideoFrame};
pub use capture::{CaptureSurface, CapturedFrame, CAPTURE_HEIGHT, CAPTURE_WIDTH};
pub use error::{RelayError, UploadStage};
pub use listing::{resolve_gallery, GalleryEntry, GalleryListing};
pub use session::{CycleOutcome, EnvironmentPolicy, Session, SessionConfig, SessionState};
pub use store::{
    BlobStore, HttpBlobStore, HttpMetadataStore, InMemoryBlobStore, InMemoryMetadataStore,
    MetadataStore, StoredRecord, UploadRecord,
};
pub use upload::{KeyGenerator, UploadClient};

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|_| anyhow!("system clock is before the unix epoch"))
}
