//! relayd - camera snapshot relay daemon
//!
//! This daemon:
//! 1. Loads configuration (file + environment overrides)
//! 2. Mounts one capture session against the configured camera
//! 3. Captures a 320x240 still after the settle delay, then on a fixed
//!    interval, uploading each frame plus an upload record
//! 4. Retries acquisition and uploads on the same interval; nothing is fatal
//! 5. Releases the camera stream on shutdown

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use url::Url;

use snapshot_relay::{
    config::RelaydConfig, BlobStore, CameraSource, EnvironmentPolicy, HttpBlobStore, HttpCamera,
    HttpMetadataStore, InMemoryBlobStore, InMemoryMetadataStore, MetadataStore, Session,
    SessionConfig, SessionState, StubCamera, UploadClient,
};

const TICK_PERIOD: Duration = Duration::from_millis(200);
const HEALTH_LOG_PERIOD: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = RelaydConfig::load()?;
    let camera = build_camera(&cfg)?;
    let (blob, meta) = build_stores(&cfg)?;
    let uploader = UploadClient::new(blob, meta, &cfg.collection, &cfg.key_prefix);
    let policy = EnvironmentPolicy::new(cfg.restricted_markers.clone());
    let session_cfg = SessionConfig {
        settle_delay: cfg.settle,
        capture_interval: cfg.interval,
        facing: cfg.facing,
    };
    let mut session = Session::new(camera, uploader, policy, session_cfg);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .map_err(|e| anyhow!("install signal handler: {}", e))?;
    }

    log::info!(
        "relayd starting: camera={} store={} collection={} interval={}s",
        cfg.camera_url,
        cfg.store_url,
        cfg.collection,
        cfg.interval.as_secs()
    );

    session.mount(&cfg.user_agent, Instant::now());
    match session.state() {
        SessionState::Blocked => log::warn!(
            "host environment '{}' is restricted; run from an unrestricted host to capture",
            cfg.user_agent
        ),
        SessionState::Denied => log::warn!(
            "camera access denied; retrying every {}s",
            cfg.interval.as_secs()
        ),
        state => log::info!("session mounted, state {:?}", state),
    }

    let mut last_health = Instant::now();
    while running.load(Ordering::SeqCst) {
        session.tick(Instant::now());

        if last_health.elapsed() >= HEALTH_LOG_PERIOD {
            log::info!(
                "state={:?} cycles={} last_error={}",
                session.state(),
                session.cycles_completed(),
                session
                    .last_error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );
            last_health = Instant::now();
        }

        std::thread::sleep(TICK_PERIOD);
    }

    session.unmount();
    log::info!("relayd stopped after {} capture cycles", session.cycles_completed());
    Ok(())
}

fn build_camera(cfg: &RelaydConfig) -> Result<Box<dyn CameraSource>> {
    let url = Url::parse(&cfg.camera_url).context("parse camera url")?;
    match url.scheme() {
        "stub" => Ok(Box::new(StubCamera::new())),
        "http" | "https" => Ok(Box::new(HttpCamera::new(&cfg.camera_url)?)),
        other => Err(anyhow!(
            "unsupported camera scheme '{}'; expected stub or http(s)",
            other
        )),
    }
}

fn build_stores(cfg: &RelaydConfig) -> Result<(Box<dyn BlobStore>, Box<dyn MetadataStore>)> {
    let url = Url::parse(&cfg.store_url).context("parse store url")?;
    match url.scheme() {
        "stub" => Ok((
            Box::new(InMemoryBlobStore::new()),
            Box::new(InMemoryMetadataStore::new()),
        )),
        "http" | "https" => Ok((
            Box::new(HttpBlobStore::new(&cfg.store_url)),
            Box::new(HttpMetadataStore::new(&cfg.store_url)),
        )),
        other => Err(anyhow!(
            "unsupported store scheme '{}'; expected stub or http(s)",
            other
        )),
    }
}
