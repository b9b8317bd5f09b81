//! Stub camera source.
//!
//! Serves synthetic frames without touching hardware. Used by `stub://`
//! deployments and by tests. The shared state records every call the session
//! makes, so tests can assert call ordering and counts.

use std::cell::RefCell;
use std::rc::Rc;

use super::{CameraSource, CameraStream, Facing, VideoFrame};
use crate::error::RelayError;

pub struct StubCameraState {
    pub deny_acquire: bool,
    pub fail_play: bool,
    pub fail_grab: bool,
    /// Fill byte for synthetic frames. Change it between grabs to make
    /// consecutive frames differ.
    pub fill: u8,
    pub width: u32,
    pub height: u32,
    /// Call log: "acquire", "play", "grab", "stop".
    pub events: Vec<&'static str>,
}

impl Default for StubCameraState {
    fn default() -> Self {
        Self {
            deny_acquire: false,
            fail_play: false,
            fail_grab: false,
            fill: 0x80,
            width: 640,
            height: 480,
            events: Vec::new(),
        }
    }
}

impl StubCameraState {
    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }
}

pub struct StubCamera {
    state: Rc<RefCell<StubCameraState>>,
}

impl StubCamera {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StubCameraState::default())),
        }
    }

    /// Shared handle to the call log and failure knobs.
    pub fn state(&self) -> Rc<RefCell<StubCameraState>> {
        self.state.clone()
    }
}

impl Default for StubCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSource for StubCamera {
    fn acquire(&mut self, _facing: Facing) -> Result<Box<dyn CameraStream>, RelayError> {
        let mut state = self.state.borrow_mut();
        state.events.push("acquire");
        if state.deny_acquire {
            return Err(RelayError::PermissionDenied(
                "camera access refused by stub device".to_string(),
            ));
        }
        drop(state);
        Ok(Box::new(StubStream {
            state: self.state.clone(),
        }))
    }
}

struct StubStream {
    state: Rc<RefCell<StubCameraState>>,
}

impl CameraStream for StubStream {
    fn play(&mut self) -> Result<(), RelayError> {
        let mut state = self.state.borrow_mut();
        state.events.push("play");
        if state.fail_play {
            return Err(RelayError::Playback(
                "stub playback failure".to_string(),
            ));
        }
        Ok(())
    }

    fn grab(&mut self) -> Result<VideoFrame, RelayError> {
        let mut state = self.state.borrow_mut();
        state.events.push("grab");
        if state.fail_grab {
            return Err(RelayError::Playback("stub grab failure".to_string()));
        }
        let len = (state.width * state.height * 3) as usize;
        Ok(VideoFrame::new(
            vec![state.fill; len],
            state.width,
            state.height,
        ))
    }

    fn stop(&mut self) {
        self.state.borrow_mut().events.push("stop");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denial_is_permission_error() {
        let mut camera = StubCamera::new();
        camera.state().borrow_mut().deny_acquire = true;
        let err = camera.acquire(Facing::User).err().expect("denied");
        assert!(matches!(err, RelayError::PermissionDenied(_)));
        assert_eq!(camera.state().borrow().count("acquire"), 1);
    }

    #[test]
    fn grab_reflects_current_fill() {
        let mut camera = StubCamera::new();
        let state = camera.state();
        let mut stream = camera.acquire(Facing::User).expect("stream");
        stream.play().expect("play");

        let first = stream.grab().expect("frame");
        state.borrow_mut().fill = 0x20;
        let second = stream.grab().expect("frame");
        assert_ne!(first.take_pixels()[0], second.take_pixels()[0]);
    }
}
