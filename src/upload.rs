//! Upload client.
//!
//! Persists one encoded frame per call, in three strictly sequential steps:
//! blob write, download-URL resolution, metadata record insert. The metadata
//! record is only written after the first two steps succeed, so a failed
//! upload never leaves a partial record behind. Retries are the session's
//! responsibility, not this client's.

use rand::Rng;

use crate::capture::CapturedFrame;
use crate::error::{RelayError, UploadStage};
use crate::now_millis;
use crate::store::{BlobStore, MetadataStore, UploadRecord};

/// Generates storage keys that are unique across the process lifetime even
/// under rapid repeated calls: millisecond timestamp, monotonic sequence
/// number, random salt.
#[derive(Default)]
pub struct KeyGenerator {
    seq: u64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self, prefix: &str) -> anyhow::Result<String> {
        let ms = now_millis()?;
        self.seq += 1;
        let salt: u32 = rand::thread_rng().gen();
        Ok(format!("{}/{}-{:06}-{:08x}.png", prefix, ms, self.seq, salt))
    }
}

pub struct UploadClient<B, M> {
    blob: B,
    meta: M,
    collection: String,
    key_prefix: String,
    keys: KeyGenerator,
}

impl<B: BlobStore, M: MetadataStore> UploadClient<B, M> {
    pub fn new(blob: B, meta: M, collection: &str, key_prefix: &str) -> Self {
        Self {
            blob,
            meta,
            collection: collection.to_string(),
            key_prefix: key_prefix.to_string(),
            keys: KeyGenerator::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Upload one frame under a fresh key and record the upload event.
    pub fn upload_frame(&mut self, frame: &CapturedFrame) -> Result<UploadRecord, RelayError> {
        let key = self
            .keys
            .next_key(&self.key_prefix)
            .map_err(|e| upload_error(UploadStage::Blob, e))?;

        self.blob
            .put(&key, &frame.encoded_image)
            .map_err(|e| upload_error(UploadStage::Blob, e))?;

        let photo_url = self
            .blob
            .download_url(&key)
            .map_err(|e| upload_error(UploadStage::Url, e))?;

        let record = UploadRecord {
            photo_url,
            timestamp: frame.captured_at_ms,
        };
        self.meta
            .insert(&self.collection, &record)
            .map_err(|e| upload_error(UploadStage::Metadata, e))?;

        log::debug!("recorded upload of {} at {}", record.photo_url, record.timestamp);
        Ok(record)
    }
}

fn upload_error(stage: UploadStage, source: anyhow::Error) -> RelayError {
    RelayError::Upload {
        stage,
        reason: source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;
    use crate::store::{InMemoryBlobStore, InMemoryMetadataStore};

    fn test_frame() -> CapturedFrame {
        CapturedFrame {
            encoded_image: "data:image/png;base64,AAAA".to_string(),
            captured_at_ms: 1_700_000_000_000,
        }
    }

    fn client() -> (
        UploadClient<Rc<RefCell<InMemoryBlobStore>>, Rc<RefCell<InMemoryMetadataStore>>>,
        Rc<RefCell<InMemoryBlobStore>>,
        Rc<RefCell<InMemoryMetadataStore>>,
    ) {
        let blob = Rc::new(RefCell::new(InMemoryBlobStore::new()));
        let meta = Rc::new(RefCell::new(InMemoryMetadataStore::new()));
        let client = UploadClient::new(blob.clone(), meta.clone(), "captured_photos", "captures");
        (client, blob, meta)
    }

    #[test]
    fn keys_are_distinct_under_rapid_generation() {
        let mut keys = KeyGenerator::new();
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(keys.next_key("captures").unwrap()));
        }
    }

    #[test]
    fn successful_upload_writes_exactly_one_record() {
        let (mut client, blob, meta) = client();

        let record = client.upload_frame(&test_frame()).expect("upload");
        assert!(record.photo_url.starts_with("memory://captures/"));
        assert_eq!(record.timestamp, 1_700_000_000_000);
        assert_eq!(blob.borrow().blob_count(), 1);

        let records = meta.borrow().list_all("captured_photos").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].photo_url, record.photo_url);
    }

    #[test]
    fn blob_failure_writes_no_metadata() {
        let (mut client, blob, meta) = client();
        blob.borrow_mut().fail_puts = true;

        let err = client.upload_frame(&test_frame()).err().expect("failure");
        assert!(matches!(
            err,
            RelayError::Upload {
                stage: UploadStage::Blob,
                ..
            }
        ));
        assert_eq!(meta.borrow().insert_calls, 0);
        assert!(meta.borrow().list_all("captured_photos").unwrap().is_empty());
    }

    #[test]
    fn url_failure_writes_no_metadata() {
        struct UrlFailBlob {
            inner: Rc<RefCell<InMemoryBlobStore>>,
        }
        impl BlobStore for UrlFailBlob {
            fn put(&mut self, key: &str, content: &str) -> anyhow::Result<()> {
                self.inner.borrow_mut().put(key, content)
            }
            fn download_url(&self, _reference: &str) -> anyhow::Result<String> {
                Err(anyhow::anyhow!("resolution outage"))
            }
        }

        let blob = Rc::new(RefCell::new(InMemoryBlobStore::new()));
        let meta = Rc::new(RefCell::new(InMemoryMetadataStore::new()));
        let mut client = UploadClient::new(
            UrlFailBlob { inner: blob.clone() },
            meta.clone(),
            "captured_photos",
            "captures",
        );

        let err = client.upload_frame(&test_frame()).err().expect("failure");
        assert!(matches!(
            err,
            RelayError::Upload {
                stage: UploadStage::Url,
                ..
            }
        ));
        // Blob write happened, record write did not.
        assert_eq!(blob.borrow().blob_count(), 1);
        assert_eq!(meta.borrow().insert_calls, 0);
    }

    #[test]
    fn metadata_failure_is_reported_as_metadata_stage() {
        let (mut client, _blob, meta) = client();
        meta.borrow_mut().fail_inserts = true;

        let err = client.upload_frame(&test_frame()).err().expect("failure");
        assert!(matches!(
            err,
            RelayError::Upload {
                stage: UploadStage::Metadata,
                ..
            }
        ));
    }
}
