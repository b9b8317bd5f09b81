//! Remote store clients.
//!
//! Two stores back the pipeline:
//! - a blob store (key-addressed image bytes, `put` + `download_url`)
//! - a metadata store (append-only record collections, `insert` + `list_all`)
//!
//! Both come in an HTTP flavour for real deployments and an in-memory flavour
//! for tests and `stub://` deployments. Store clients are injected into the
//! upload client and the gallery listing; nothing in the crate reaches a
//! global handle.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MEMORY_URL_PREFIX: &str = "memory://";

/// One upload event. Written once per successful upload, never updated.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadRecord {
    #[serde(rename = "photoUrl")]
    pub photo_url: String,
    pub timestamp: u64,
}

/// A record as returned by the metadata store, with its assigned id.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: String,
    #[serde(rename = "photoUrl")]
    pub photo_url: String,
    pub timestamp: u64,
}

pub trait BlobStore {
    /// Write `content` under `key`. Overwrites are never expected; the upload
    /// client guarantees fresh keys.
    fn put(&mut self, key: &str, content: &str) -> Result<()>;

    /// Resolve a fetchable URL for a key or a previously issued URL.
    fn download_url(&self, reference: &str) -> Result<String>;
}

pub trait MetadataStore {
    fn insert(&mut self, collection: &str, record: &UploadRecord) -> Result<String>;

    fn list_all(&self, collection: &str) -> Result<Vec<StoredRecord>>;
}

impl BlobStore for Box<dyn BlobStore> {
    fn put(&mut self, key: &str, content: &str) -> Result<()> {
        (**self).put(key, content)
    }

    fn download_url(&self, reference: &str) -> Result<String> {
        (**self).download_url(reference)
    }
}

impl MetadataStore for Box<dyn MetadataStore> {
    fn insert(&mut self, collection: &str, record: &UploadRecord) -> Result<String> {
        (**self).insert(collection, record)
    }

    fn list_all(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        (**self).list_all(collection)
    }
}

impl<S: BlobStore> BlobStore for Rc<RefCell<S>> {
    fn put(&mut self, key: &str, content: &str) -> Result<()> {
        self.borrow_mut().put(key, content)
    }

    fn download_url(&self, reference: &str) -> Result<String> {
        self.borrow().download_url(reference)
    }
}

impl<S: MetadataStore> MetadataStore for Rc<RefCell<S>> {
    fn insert(&mut self, collection: &str, record: &UploadRecord) -> Result<String> {
        self.borrow_mut().insert(collection, record)
    }

    fn list_all(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        self.borrow().list_all(collection)
    }
}

// ----------------------------------------------------------------------------
// HTTP stores
// ----------------------------------------------------------------------------

pub struct HttpBlobStore {
    base: String,
    agent: ureq::Agent,
}

impl HttpBlobStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn blob_endpoint(&self, key: &str) -> String {
        format!("{}/blobs/{}", self.base, key)
    }

    fn key_of(&self, reference: &str) -> String {
        let prefix = format!("{}/blobs/", self.base);
        reference
            .strip_prefix(prefix.as_str())
            .unwrap_or(reference)
            .to_string()
    }
}

impl BlobStore for HttpBlobStore {
    fn put(&mut self, key: &str, content: &str) -> Result<()> {
        self.agent
            .put(&self.blob_endpoint(key))
            .set("Content-Type", "text/plain")
            .send_string(content)
            .with_context(|| format!("put blob {}", key))?;
        Ok(())
    }

    fn download_url(&self, reference: &str) -> Result<String> {
        let key = self.key_of(reference);
        let url = self
            .agent
            .get(&format!("{}/url", self.blob_endpoint(&key)))
            .call()
            .with_context(|| format!("resolve download url for {}", key))?
            .into_string()
            .context("read download url body")?;
        let url = url.trim().to_string();
        if url.is_empty() {
            return Err(anyhow!("store returned empty download url for {}", key));
        }
        Ok(url)
    }
}

#[derive(Deserialize)]
struct InsertResponse {
    id: String,
}

pub struct HttpMetadataStore {
    base: String,
    agent: ureq::Agent,
}

impl HttpMetadataStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    fn collection_endpoint(&self, collection: &str) -> String {
        format!("{}/collections/{}", self.base, collection)
    }
}

impl MetadataStore for HttpMetadataStore {
    fn insert(&mut self, collection: &str, record: &UploadRecord) -> Result<String> {
        let response: InsertResponse = self
            .agent
            .post(&self.collection_endpoint(collection))
            .send_json(record)
            .with_context(|| format!("insert record into {}", collection))?
            .into_json()
            .context("parse insert response")?;
        Ok(response.id)
    }

    fn list_all(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        let records: Vec<StoredRecord> = self
            .agent
            .get(&self.collection_endpoint(collection))
            .call()
            .with_context(|| format!("list records in {}", collection))?
            .into_json()
            .context("parse record listing")?;
        Ok(records)
    }
}

// ----------------------------------------------------------------------------
// In-memory stores
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: HashMap<String, String>,
    pub put_calls: u64,
    pub fail_puts: bool,
    pub fail_url_keys: HashSet<String>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    pub fn blob(&self, key: &str) -> Option<&String> {
        self.blobs.get(key)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&mut self, key: &str, content: &str) -> Result<()> {
        self.put_calls += 1;
        if self.fail_puts {
            return Err(anyhow!("blob store unavailable"));
        }
        self.blobs.insert(key.to_string(), content.to_string());
        Ok(())
    }

    fn download_url(&self, reference: &str) -> Result<String> {
        let key = reference.strip_prefix(MEMORY_URL_PREFIX).unwrap_or(reference);
        if self.fail_url_keys.contains(key) {
            return Err(anyhow!("download url resolution failed for {}", key));
        }
        if !self.blobs.contains_key(key) {
            return Err(anyhow!("no blob stored under {}", key));
        }
        Ok(format!("{}{}", MEMORY_URL_PREFIX, key))
    }
}

#[derive(Default)]
pub struct InMemoryMetadataStore {
    collections: HashMap<String, Vec<StoredRecord>>,
    next_id: u64,
    pub insert_calls: u64,
    pub fail_inserts: bool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn insert(&mut self, collection: &str, record: &UploadRecord) -> Result<String> {
        self.insert_calls += 1;
        if self.fail_inserts {
            return Err(anyhow!("metadata store unavailable"));
        }
        let id = format!("rec-{:06}", self.next_id);
        self.next_id += 1;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(StoredRecord {
                id: id.clone(),
                photo_url: record.photo_url.clone(),
                timestamp: record.timestamp,
            });
        Ok(id)
    }

    fn list_all(&self, collection: &str) -> Result<Vec<StoredRecord>> {
        Ok(self
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}
