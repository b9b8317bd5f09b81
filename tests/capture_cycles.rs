use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use snapshot_relay::{
    resolve_gallery, EnvironmentPolicy, Facing, MetadataStore, Session, SessionConfig,
    SessionState, StubCamera, UploadClient,
};
use snapshot_relay::{InMemoryBlobStore, InMemoryMetadataStore};

fn build_session(
    camera: StubCamera,
) -> (
    Session<StubCamera, Rc<RefCell<InMemoryBlobStore>>, Rc<RefCell<InMemoryMetadataStore>>>,
    Rc<RefCell<InMemoryBlobStore>>,
    Rc<RefCell<InMemoryMetadataStore>>,
) {
    let blob = Rc::new(RefCell::new(InMemoryBlobStore::new()));
    let meta = Rc::new(RefCell::new(InMemoryMetadataStore::new()));
    let uploader = UploadClient::new(blob.clone(), meta.clone(), "captured_photos", "captures");
    let cfg = SessionConfig {
        settle_delay: Duration::from_secs(1),
        capture_interval: Duration::from_secs(30),
        facing: Facing::User,
    };
    let session = Session::new(camera, uploader, EnvironmentPolicy::default(), cfg);
    (session, blob, meta)
}

#[test]
fn full_cycle_from_mount_to_upload_record() {
    let camera = StubCamera::new();
    let camera_state = camera.state();
    let (mut session, blob, meta) = build_session(camera);

    let t0 = Instant::now();
    session.mount("Mozilla/5.0 (X11; Linux x86_64)", t0);
    assert_eq!(session.state(), SessionState::Active);
    assert!(session.has_permission());

    // Nothing captured before the settle delay elapses.
    session.tick(t0 + Duration::from_millis(400));
    assert_eq!(meta.borrow().list_all("captured_photos").unwrap().len(), 0);

    // First capture after the settle delay.
    session.tick(t0 + Duration::from_secs(1));
    let records = meta.borrow().list_all("captured_photos").unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].photo_url.starts_with("memory://captures/"));
    assert!(records[0].photo_url.ends_with(".png"));
    assert!(records[0].timestamp > 0);
    assert_eq!(blob.borrow().blob_count(), 1);
    assert!(session.last_error().is_none());
    assert_eq!(session.state(), SessionState::Active);

    // Playback resolved before the first grab.
    let events = camera_state.borrow().events.clone();
    let play_at = events.iter().position(|e| *e == "play").unwrap();
    let grab_at = events.iter().position(|e| *e == "grab").unwrap();
    assert!(play_at < grab_at);
}

#[test]
fn recurring_timer_appends_one_record_per_interval() {
    let (mut session, _blob, meta) = build_session(StubCamera::new());

    let t0 = Instant::now();
    session.mount("Mozilla/5.0", t0);
    session.tick(t0 + Duration::from_secs(1));
    session.tick(t0 + Duration::from_secs(30));
    session.tick(t0 + Duration::from_secs(60));

    let records = meta.borrow().list_all("captured_photos").unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(session.cycles_completed(), 3);

    // Uploaded blobs all got distinct keys.
    let mut urls: Vec<_> = records.iter().map(|r| r.photo_url.clone()).collect();
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 3);
}

#[test]
fn no_cycles_fire_after_unmount() {
    let camera = StubCamera::new();
    let camera_state = camera.state();
    let (mut session, _blob, meta) = build_session(camera);

    let t0 = Instant::now();
    session.mount("Mozilla/5.0", t0);
    session.tick(t0 + Duration::from_secs(1));
    session.unmount();

    for minutes in 1..=5 {
        session.tick(t0 + Duration::from_secs(60 * minutes));
    }
    assert_eq!(meta.borrow().list_all("captured_photos").unwrap().len(), 1);
    assert_eq!(camera_state.borrow().count("stop"), 1);
    assert_eq!(camera_state.borrow().count("acquire"), 1);
}

#[test]
fn uploaded_frames_are_listable_in_the_gallery() {
    let (mut session, blob, meta) = build_session(StubCamera::new());

    let t0 = Instant::now();
    session.mount("Mozilla/5.0", t0);
    session.tick(t0 + Duration::from_secs(1));
    session.tick(t0 + Duration::from_secs(30));

    let listing = resolve_gallery(&*meta.borrow(), &*blob.borrow(), "captured_photos").unwrap();
    assert_eq!(listing.entries.len(), 2);
    assert_eq!(listing.failed, 0);
    assert!(listing.partial_failure().is_none());
}
