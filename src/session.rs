//! Permission/retry state machine.
//!
//! One `Session` covers one mounted page view of the device: it decides when
//! to request the camera, when to capture, and when to retry. States:
//!
//! ```text
//! Uninitialized -> Detecting -> { Blocked, Acquiring }
//! Acquiring     -> { Active, Denied }
//! Active        -> Active        (steady state, one cycle per timer tick)
//! Denied        -> Acquiring     (manual retry or timer tick)
//! ```
//!
//! `Blocked` is terminal for the session: once the host environment is known
//! to restrict camera access, no camera request is ever made. Camera and
//! upload failures never leave `Active`; they are recorded as `last_error`
//! and retried on the next tick with a constant interval, no backoff.
//!
//! At most one capture cycle runs at a time: an in-flight guard drops any
//! trigger that arrives while a cycle is still running.

use std::time::{Duration, Instant};

use crate::camera::{CameraSource, Facing};
use crate::capture::CaptureSurface;
use crate::error::RelayError;
use crate::store::{BlobStore, MetadataStore, UploadRecord};
use crate::upload::UploadClient;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Detecting,
    Blocked,
    Acquiring,
    Active,
    Denied,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    Failed,
    SkippedInFlight,
}

/// Decides whether a host environment is known to restrict camera access.
/// Kept injectable so the heuristic can evolve without touching the machine.
#[derive(Clone, Debug)]
pub struct EnvironmentPolicy {
    markers: Vec<String>,
}

impl EnvironmentPolicy {
    pub fn new(markers: Vec<String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    pub fn is_restricted(&self, user_agent: &str) -> bool {
        let ua = user_agent.to_lowercase();
        self.markers.iter().any(|marker| ua.contains(marker))
    }
}

impl Default for EnvironmentPolicy {
    fn default() -> Self {
        Self::new(vec!["webview".to_string(), "embedded".to_string()])
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Pause after playback starts before the first capture, so the sensor
    /// settles instead of yielding a black frame.
    pub settle_delay: Duration,
    /// Constant interval between capture cycles.
    pub capture_interval: Duration,
    pub facing: Facing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
            capture_interval: Duration::from_secs(30),
            facing: Facing::User,
        }
    }
}

pub struct Session<C, B, M> {
    camera: C,
    surface: CaptureSurface,
    uploader: UploadClient<B, M>,
    policy: EnvironmentPolicy,
    cfg: SessionConfig,

    state: SessionState,
    has_permission: bool,
    last_error: Option<RelayError>,
    pending_capture_at: Option<Instant>,
    next_cycle_at: Option<Instant>,
    cycle_in_flight: bool,
    mounted: bool,
    cycles_completed: u64,
}

impl<C: CameraSource, B: BlobStore, M: MetadataStore> Session<C, B, M> {
    pub fn new(
        camera: C,
        uploader: UploadClient<B, M>,
        policy: EnvironmentPolicy,
        cfg: SessionConfig,
    ) -> Self {
        Self {
            camera,
            surface: CaptureSurface::new(),
            uploader,
            policy,
            cfg,
            state: SessionState::Uninitialized,
            has_permission: false,
            last_error: None,
            pending_capture_at: None,
            next_cycle_at: None,
            cycle_in_flight: false,
            mounted: false,
            cycles_completed: 0,
        }
    }

    /// Start the session: detect the environment, then acquire the camera
    /// unless the environment is restricted.
    pub fn mount(&mut self, user_agent: &str, now: Instant) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.state = SessionState::Detecting;

        if self.policy.is_restricted(user_agent) {
            self.state = SessionState::Blocked;
            log::info!(
                "host environment '{}' restricts camera access; not requesting the camera",
                user_agent
            );
            return;
        }

        self.next_cycle_at = Some(now + self.cfg.capture_interval);
        self.acquire(now);
    }

    fn acquire(&mut self, now: Instant) {
        self.state = SessionState::Acquiring;
        match self.camera.acquire(self.cfg.facing) {
            Ok(stream) => {
                self.has_permission = true;
                self.state = SessionState::Active;
                match self.surface.attach_and_play(stream) {
                    Ok(()) => {
                        self.pending_capture_at = Some(now + self.cfg.settle_delay);
                    }
                    Err(e) => {
                        log::warn!("playback failed: {}", e);
                        self.last_error = Some(e);
                    }
                }
            }
            Err(e) => {
                self.has_permission = false;
                self.state = SessionState::Denied;
                log::warn!("camera acquisition denied: {}", e);
                self.last_error = Some(e);
            }
        }
    }

    /// Manual retry affordance. Only meaningful from `Denied`.
    pub fn retry(&mut self, now: Instant) {
        if self.mounted && self.state == SessionState::Denied {
            self.acquire(now);
        }
    }

    /// Advance timers. Fires the post-settle first capture and the recurring
    /// capture cycle when due; re-acquires the camera when permission or the
    /// stream has been lost.
    pub fn tick(&mut self, now: Instant) {
        if !self.mounted || self.state == SessionState::Blocked {
            return;
        }

        if let Some(at) = self.pending_capture_at {
            if now >= at {
                self.pending_capture_at = None;
                self.run_cycle();
            }
        }

        if let Some(at) = self.next_cycle_at {
            if now >= at {
                self.next_cycle_at = Some(now + self.cfg.capture_interval);
                if self.has_permission && self.surface.has_stream() {
                    self.run_cycle();
                } else {
                    self.acquire(now);
                }
            }
        }
    }

    /// Trigger one capture cycle outside the timer.
    pub fn trigger_capture(&mut self) -> CycleOutcome {
        self.run_cycle()
    }

    fn run_cycle(&mut self) -> CycleOutcome {
        if self.cycle_in_flight {
            log::debug!("capture cycle already in flight; dropping trigger");
            return CycleOutcome::SkippedInFlight;
        }
        self.cycle_in_flight = true;
        let outcome = match self.capture_and_upload() {
            Ok(record) => {
                self.cycles_completed += 1;
                self.last_error = None;
                log::info!("uploaded frame: {}", record.photo_url);
                CycleOutcome::Completed
            }
            Err(e) => {
                log::warn!("capture cycle failed: {}", e);
                self.last_error = Some(e);
                CycleOutcome::Failed
            }
        };
        self.cycle_in_flight = false;
        outcome
    }

    fn capture_and_upload(&mut self) -> Result<UploadRecord, RelayError> {
        let frame = self.surface.capture_frame()?;
        self.uploader.upload_frame(&frame)
    }

    /// End the session: release the stream and cancel all timers. No further
    /// cycles fire after this.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.surface.detach();
        self.has_permission = false;
        self.pending_capture_at = None;
        self.next_cycle_at = None;
        self.mounted = false;
        self.state = SessionState::Uninitialized;
        log::info!("session unmounted; camera stream released");
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_permission(&self) -> bool {
        self.has_permission
    }

    pub fn last_error(&self) -> Option<&RelayError> {
        self.last_error.as_ref()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }
}
