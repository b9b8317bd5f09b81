//! Gallery listing.
//!
//! Read-only fan-out for the review page: list every upload record in the
//! collection, then resolve a fetchable URL for each one independently. One
//! record failing to resolve never aborts the batch; the failure is logged
//! and counted, and the rest of the listing is returned.

use anyhow::Result;

use crate::error::RelayError;
use crate::store::{BlobStore, MetadataStore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GalleryEntry {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Default)]
pub struct GalleryListing {
    pub entries: Vec<GalleryEntry>,
    pub failed: usize,
}

impl GalleryListing {
    pub fn partial_failure(&self) -> Option<RelayError> {
        if self.failed > 0 {
            Some(RelayError::ListingPartialFailure(self.failed))
        } else {
            None
        }
    }
}

/// List all upload records and resolve each one's download URL, skipping
/// records that fail to resolve.
pub fn resolve_gallery<B: BlobStore, M: MetadataStore>(
    meta: &M,
    blob: &B,
    collection: &str,
) -> Result<GalleryListing> {
    let records = meta.list_all(collection)?;
    let mut listing = GalleryListing::default();

    for record in records {
        if record.photo_url.is_empty() {
            log::warn!("record {} has no photo reference; skipping", record.id);
            listing.failed += 1;
            continue;
        }
        match blob.download_url(&record.photo_url) {
            Ok(url) => listing.entries.push(GalleryEntry {
                id: record.id,
                url,
            }),
            Err(e) => {
                log::warn!("failed to resolve {} for record {}: {}", record.photo_url, record.id, e);
                listing.failed += 1;
            }
        }
    }

    Ok(listing)
}
