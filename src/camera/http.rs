//! HTTP snapshot camera source.
//!
//! Talks to cameras that serve a single JPEG per request (the common
//! `/snapshot` endpoint on IP cameras). Acquisition probes the endpoint once;
//! an unreachable or refusing device maps to `PermissionDenied`.

use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::{CameraSource, CameraStream, Facing, VideoFrame};
use crate::error::RelayError;

const MAX_SNAPSHOT_BYTES: usize = 5 * 1024 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpCamera {
    url: Url,
    agent: ureq::Agent,
}

impl HttpCamera {
    pub fn new(url: &str) -> Result<Self> {
        let url = Url::parse(url).context("parse camera url")?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(anyhow!(
                    "unsupported camera scheme '{}'; expected http(s)",
                    other
                ))
            }
        }
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Ok(Self { url, agent })
    }
}

impl CameraSource for HttpCamera {
    fn acquire(&mut self, facing: Facing) -> Result<Box<dyn CameraStream>, RelayError> {
        let mut probe = self.url.clone();
        probe
            .query_pairs_mut()
            .append_pair("facing", facing.as_str());

        match self.agent.get(probe.as_str()).call() {
            Ok(_) => Ok(Box::new(HttpSnapshotStream {
                url: self.url.clone(),
                agent: self.agent.clone(),
                playing: false,
            })),
            Err(e) => Err(RelayError::PermissionDenied(e.to_string())),
        }
    }
}

struct HttpSnapshotStream {
    url: Url,
    agent: ureq::Agent,
    playing: bool,
}

impl CameraStream for HttpSnapshotStream {
    fn play(&mut self) -> Result<(), RelayError> {
        // Warm-up fetch: the first frame after power-on is often truncated.
        fetch_snapshot(&self.agent, self.url.as_str())
            .map_err(|e| RelayError::Playback(e.to_string()))?;
        self.playing = true;
        Ok(())
    }

    fn grab(&mut self) -> Result<VideoFrame, RelayError> {
        if !self.playing {
            return Err(RelayError::Playback(
                "stream has not started playback".to_string(),
            ));
        }
        let bytes = fetch_snapshot(&self.agent, self.url.as_str())
            .map_err(|e| RelayError::Playback(e.to_string()))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| RelayError::Playback(format!("decode snapshot: {}", e)))?;
        let rgb = image.into_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(VideoFrame::new(rgb.into_raw(), width, height))
    }

    fn stop(&mut self) {
        self.playing = false;
    }
}

fn fetch_snapshot(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("fetch snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_SNAPSHOT_BYTES as u64 + 1)
        .read_to_end(&mut bytes)
        .context("read snapshot body")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty snapshot"));
    }
    if bytes.len() > MAX_SNAPSHOT_BYTES {
        return Err(anyhow!("snapshot exceeded {} bytes", MAX_SNAPSHOT_BYTES));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_scheme() {
        assert!(HttpCamera::new("rtsp://camera-1/snapshot").is_err());
        assert!(HttpCamera::new("http://camera-1/snapshot").is_ok());
    }
}
