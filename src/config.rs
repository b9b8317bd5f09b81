use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::camera::Facing;

const DEFAULT_STORE_URL: &str = "stub://local";
const DEFAULT_CAMERA_URL: &str = "stub://front_camera";
const DEFAULT_COLLECTION: &str = "captured_photos";
const DEFAULT_KEY_PREFIX: &str = "captures";
const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_SETTLE_MS: u64 = 1000;
const DEFAULT_USER_AGENT: &str = "relayd";
const DEFAULT_RESTRICTED_MARKERS: &[&str] = &["webview", "embedded"];

#[derive(Debug, Deserialize, Default)]
struct RelaydConfigFile {
    store_url: Option<String>,
    camera_url: Option<String>,
    collection: Option<String>,
    key_prefix: Option<String>,
    facing: Option<String>,
    capture: Option<CaptureConfigFile>,
    environment: Option<EnvironmentConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptureConfigFile {
    interval_secs: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct EnvironmentConfigFile {
    user_agent: Option<String>,
    restricted_markers: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct RelaydConfig {
    pub store_url: String,
    pub camera_url: String,
    pub collection: String,
    pub key_prefix: String,
    pub facing: Facing,
    pub interval: Duration,
    pub settle: Duration,
    pub user_agent: String,
    pub restricted_markers: Vec<String>,
}

impl RelaydConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("RELAY_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: RelaydConfigFile) -> Result<Self> {
        let facing = match file.facing {
            Some(raw) => Facing::from_str(&raw)?,
            None => Facing::User,
        };
        let interval_secs = file
            .capture
            .as_ref()
            .and_then(|capture| capture.interval_secs)
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let settle_ms = file
            .capture
            .as_ref()
            .and_then(|capture| capture.settle_ms)
            .unwrap_or(DEFAULT_SETTLE_MS);
        Ok(Self {
            store_url: file
                .store_url
                .unwrap_or_else(|| DEFAULT_STORE_URL.to_string()),
            camera_url: file
                .camera_url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            collection: file
                .collection
                .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
            key_prefix: file
                .key_prefix
                .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string()),
            facing,
            interval: Duration::from_secs(interval_secs),
            settle: Duration::from_millis(settle_ms),
            user_agent: file
                .environment
                .as_ref()
                .and_then(|env| env.user_agent.clone())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            restricted_markers: file
                .environment
                .and_then(|env| env.restricted_markers)
                .unwrap_or_else(|| {
                    DEFAULT_RESTRICTED_MARKERS
                        .iter()
                        .map(|m| m.to_string())
                        .collect()
                }),
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("RELAY_STORE_URL") {
            if !url.trim().is_empty() {
                self.store_url = url;
            }
        }
        if let Ok(url) = std::env::var("RELAY_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera_url = url;
            }
        }
        if let Ok(collection) = std::env::var("RELAY_COLLECTION") {
            if !collection.trim().is_empty() {
                self.collection = collection;
            }
        }
        if let Ok(facing) = std::env::var("RELAY_FACING") {
            if !facing.trim().is_empty() {
                self.facing = Facing::from_str(&facing)?;
            }
        }
        if let Ok(interval) = std::env::var("RELAY_INTERVAL_SECS") {
            let seconds: u64 = interval
                .parse()
                .map_err(|_| anyhow!("RELAY_INTERVAL_SECS must be an integer number of seconds"))?;
            self.interval = Duration::from_secs(seconds);
        }
        if let Ok(settle) = std::env::var("RELAY_SETTLE_MS") {
            let millis: u64 = settle
                .parse()
                .map_err(|_| anyhow!("RELAY_SETTLE_MS must be an integer number of milliseconds"))?;
            self.settle = Duration::from_millis(millis);
        }
        if let Ok(user_agent) = std::env::var("RELAY_USER_AGENT") {
            if !user_agent.trim().is_empty() {
                self.user_agent = user_agent;
            }
        }
        if let Ok(markers) = std::env::var("RELAY_RESTRICTED_MARKERS") {
            let parsed = split_csv(&markers);
            if !parsed.is_empty() {
                self.restricted_markers = parsed;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.collection.trim().is_empty() {
            return Err(anyhow!("collection name must not be empty"));
        }
        self.key_prefix = self.key_prefix.trim_matches('/').to_string();
        if self.key_prefix.is_empty() {
            return Err(anyhow!("key prefix must not be empty"));
        }
        if self.interval.as_secs() == 0 {
            return Err(anyhow!("capture interval must be greater than zero"));
        }
        if self.settle >= self.interval {
            return Err(anyhow!(
                "settle delay must be shorter than the capture interval"
            ));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<RelaydConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
