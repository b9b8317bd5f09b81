use std::sync::Mutex;

use tempfile::NamedTempFile;

use snapshot_relay::config::RelaydConfig;
use snapshot_relay::Facing;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "RELAY_CONFIG",
        "RELAY_STORE_URL",
        "RELAY_CAMERA_URL",
        "RELAY_COLLECTION",
        "RELAY_FACING",
        "RELAY_INTERVAL_SECS",
        "RELAY_SETTLE_MS",
        "RELAY_USER_AGENT",
        "RELAY_RESTRICTED_MARKERS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "store_url": "https://store.example.com/api",
        "camera_url": "http://camera-1/snapshot",
        "collection": "front_door_photos",
        "key_prefix": "/front_door/",
        "facing": "environment",
        "capture": {
            "interval_secs": 60,
            "settle_ms": 1500
        },
        "environment": {
            "user_agent": "relayd-front",
            "restricted_markers": ["kiosk"]
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("RELAY_CONFIG", file.path());
    std::env::set_var("RELAY_CAMERA_URL", "http://camera-2/snapshot");
    std::env::set_var("RELAY_INTERVAL_SECS", "120");
    std::env::set_var("RELAY_RESTRICTED_MARKERS", "kiosk, embedded ");

    let cfg = RelaydConfig::load().expect("load config");

    assert_eq!(cfg.store_url, "https://store.example.com/api");
    assert_eq!(cfg.camera_url, "http://camera-2/snapshot");
    assert_eq!(cfg.collection, "front_door_photos");
    assert_eq!(cfg.key_prefix, "front_door");
    assert_eq!(cfg.facing, Facing::Environment);
    assert_eq!(cfg.interval.as_secs(), 120);
    assert_eq!(cfg.settle.as_millis(), 1500);
    assert_eq!(cfg.user_agent, "relayd-front");
    assert_eq!(cfg.restricted_markers, vec!["kiosk", "embedded"]);

    clear_env();
}

#[test]
fn defaults_apply_without_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = RelaydConfig::load().expect("load config");

    assert_eq!(cfg.store_url, "stub://local");
    assert_eq!(cfg.camera_url, "stub://front_camera");
    assert_eq!(cfg.collection, "captured_photos");
    assert_eq!(cfg.key_prefix, "captures");
    assert_eq!(cfg.facing, Facing::User);
    assert_eq!(cfg.interval.as_secs(), 30);
    assert_eq!(cfg.settle.as_millis(), 1000);

    clear_env();
}

#[test]
fn settle_delay_must_stay_below_interval() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RELAY_INTERVAL_SECS", "2");
    std::env::set_var("RELAY_SETTLE_MS", "2000");
    assert!(RelaydConfig::load().is_err());

    std::env::set_var("RELAY_SETTLE_MS", "500");
    assert!(RelaydConfig::load().is_ok());

    clear_env();
}

#[test]
fn zero_interval_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("RELAY_INTERVAL_SECS", "0");
    assert!(RelaydConfig::load().is_err());

    clear_env();
}
