//! Content-Addressed Blob Store
//!
//! The graph sink does not store image bytes in the graph itself; it
//! uploads them to a content-addressed store and keeps only the returned
//! hash on the image node. The store abstraction is a single operation:
//! `add(path) -> hash`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::constants::{BLOB_HASH_BYTES_MAX, BLOB_SIZE_BYTES_MAX};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// BlobStore trait
// =============================================================================

/// External content-addressed blob store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload the file at `path`, returning its content hash.
    async fn add(&self, path: &Path) -> StoreResult<String>;
}

// =============================================================================
// SimBlobStore
// =============================================================================

/// In-memory blob store for testing.
///
/// `TigerStyle`: Deterministic; the hash is the SHA-256 hex of the file
/// contents, so equal content yields equal hashes across runs.
#[derive(Debug, Clone, Default)]
pub struct SimBlobStore {
    blobs: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_add: bool,
}

impl SimBlobStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `add` fail (fault injection).
    #[must_use]
    pub fn with_failing_adds(mut self) -> Self {
        self.fail_add = true;
        self
    }

    /// Whether a blob with this hash was stored.
    #[must_use]
    pub fn contains(&self, hash: &str) -> bool {
        self.blobs.read().unwrap().contains_key(hash)
    }

    /// Stored blob contents, `None` when absent.
    #[must_use]
    pub fn blob(&self, hash: &str) -> Option<Vec<u8>> {
        self.blobs.read().unwrap().get(hash).cloned()
    }

    /// Number of stored blobs (deduplicated by content).
    #[must_use]
    pub fn blob_count(&self) -> usize {
        self.blobs.read().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for SimBlobStore {
    async fn add(&self, path: &Path) -> StoreResult<String> {
        if self.fail_add {
            return Err(StoreError::write("simulated blob store failure"));
        }

        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::write(format!("failed to read staged blob: {e}")))?;

        // Precondition
        assert!(
            contents.len() as u64 <= BLOB_SIZE_BYTES_MAX,
            "staged blob too large"
        );

        let hash = hex::encode(Sha256::digest(&contents));
        assert!(hash.len() <= BLOB_HASH_BYTES_MAX, "hash too long");

        self.blobs.write().unwrap().insert(hash.clone(), contents);

        Ok(hash)
    }
}

// =============================================================================
// IpfsBlobStore
// =============================================================================

/// IPFS HTTP-API blob store (`POST /api/v0/add`).
#[cfg(feature = "neo4j")]
#[derive(Debug, Clone)]
pub struct IpfsBlobStore {
    api_url: String,
    client: reqwest::Client,
}

#[cfg(feature = "neo4j")]
impl IpfsBlobStore {
    /// Create a store against an IPFS API endpoint,
    /// e.g. `http://127.0.0.1:5001`.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into();
        assert!(!api_url.is_empty(), "api url cannot be empty");

        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "neo4j")]
#[async_trait]
impl BlobStore for IpfsBlobStore {
    async fn add(&self, path: &Path) -> StoreResult<String> {
        #[derive(serde::Deserialize)]
        struct AddResponse {
            #[serde(rename = "Hash")]
            hash: String,
        }

        let contents = tokio::fs::read(path)
            .await
            .map_err(|e| StoreError::write(format!("failed to read staged blob: {e}")))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "blob.png".to_string());

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(contents).file_name(file_name));

        let response = self
            .client
            .post(format!("{}/api/v0/add", self.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| StoreError::connection(format!("ipfs add failed: {e}")))?
            .error_for_status()
            .map_err(|e| StoreError::write(format!("ipfs add rejected: {e}")))?;

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| StoreError::write(format!("ipfs add: bad response: {e}")))?;

        Ok(added.hash)
    }
}

// =============================================================================
// Tests
// =============================================================================
