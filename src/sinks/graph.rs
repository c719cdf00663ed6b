//! Neo4j Sink
//!
//! Graph upsert with content-addressed blob storage. Image bytes never
//! enter the graph: each image is staged to a temp file, uploaded to the
//! configured [`BlobStore`], and the graph keeps only the returned hash.
//!
//! Per image:
//! 1. stage PNG -> blob store -> content hash (temp file removed either way)
//! 2. `MERGE` the prompt node on content equality
//! 3. `CREATE` an image node with metadata JSON and the hash
//! 4. `MERGE` a `RELATED_TO` relationship from prompt to image
//!
//! Images sharing a prompt therefore attach to one prompt node.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{query, Graph};

use crate::blobstore::BlobStore;
use crate::config::BackendOptions;
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;
use crate::serialize::serialize;
use crate::sink::StorageSink;

const UPSERT_CYPHER: &str = "MERGE (p:Prompt {content: $prompt_content}) \
     CREATE (image:Image {metadata: $metadata, blob_hash: $blob_hash}) \
     MERGE (p)-[:RELATED_TO]->(image)";

/// Neo4j storage sink backed by an external blob store.
#[derive(Clone)]
pub struct Neo4jSink {
    blob_store: Arc<dyn BlobStore>,
}

impl Neo4jSink {
    /// Create the sink around a blob store.
    #[must_use]
    pub fn new(blob_store: Arc<dyn BlobStore>) -> Self {
        Self { blob_store }
    }

    async fn connect(options: &BackendOptions) -> StoreResult<Graph> {
        let connection_string = options.connection_string()?;

        Graph::new(connection_string, options.user_name(), options.password())
            .await
            .map_err(|e| StoreError::connection(format!("neo4j: failed to connect: {e}")))
    }

    /// Stage the PNG bytes and upload them, removing the temp file whether
    /// or not the upload succeeds.
    async fn store_blob(&self, png: &[u8]) -> StoreResult<String> {
        let staged = tempfile::Builder::new()
            .prefix("nexstore-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| StoreError::write(format!("neo4j: failed to stage blob: {e}")))?;

        tokio::fs::write(staged.path(), png)
            .await
            .map_err(|e| StoreError::write(format!("neo4j: failed to stage blob: {e}")))?;

        let added = self.blob_store.add(staged.path()).await;

        if let Err(e) = staged.close() {
            // Cleanup failures are logged, never fatal.
            tracing::warn!(
                backend = "neo4j",
                error = %StoreError::cleanup(format!("staged blob not removed: {e}")),
                "cleanup failed"
            );
        }

        added
    }

    async fn write_all(&self, graph: &Graph, event: &GenerationEvent) -> StoreResult<usize> {
        let mut written = 0;
        for (index, generated) in event.images.iter().enumerate() {
            let record = match serialize(&generated.image, &generated.info_text) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(backend = "neo4j", image_index = index, error = %e, "serialization failed");
                    return Err(e);
                }
            };

            let blob_hash = self.store_blob(&record.image_png).await?;

            let upsert = query(UPSERT_CYPHER)
                .param("prompt_content", event.prompt.as_str())
                .param("metadata", record.metadata_json.as_str())
                .param("blob_hash", blob_hash.as_str());

            if let Err(e) = graph.run(upsert).await {
                tracing::error!(backend = "neo4j", image_index = index, error = %e, "upsert failed");
                return Err(StoreError::write(format!(
                    "neo4j: upsert of image {index} failed: {e}"
                )));
            }
            written += 1;
        }

        Ok(written)
    }
}

#[async_trait]
impl StorageSink for Neo4jSink {
    fn name(&self) -> &'static str {
        "neo4j"
    }

    #[tracing::instrument(skip(self, event, options), fields(backend = "neo4j"))]
    async fn persist(
        &self,
        event: &GenerationEvent,
        options: &BackendOptions,
    ) -> StoreResult<usize> {
        let graph = Self::connect(options).await?;
        // The driver has no explicit close; dropping the graph releases
        // its connections.
        self.write_all(&graph, event).await
    }

    async fn test_connectivity(&self, options: &BackendOptions) -> String {
        let graph = match Self::connect(options).await {
            Ok(graph) => graph,
            Err(e) => return format!("Error connecting to Neo4j: {e}"),
        };

        let probe = async {
            let mut rows = graph
                .execute(query("RETURN 1 AS connectivity_test"))
                .await?;
            rows.next().await.map(|_| ())
        }
        .await;

        match probe {
            Ok(()) => "Connected successfully to Neo4j!".to_string(),
            Err(e) => format!("Error connecting to Neo4j: {e}"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobstore::SimBlobStore;
    use crate::config::{SettingsSnapshot, FIELD_CONNECTION_STRING};
    use std::env;

    macro_rules! require_db {
        () => {
            match env::var("TEST_NEO4J_URL").ok() {
                Some(url) => url,
                None => {
                    eprintln!("Skipping test: TEST_NEO4J_URL not set");
                    return;
                }
            }
        };
    }

    const INFOTEXT: &str = "prompt\nSteps: 10, Sampler: Euler a, CFG scale: 7, Seed: 1, \
                            Size: 64x64, Model hash: h, Model: m";

    #[tokio::test]
    async fn test_store_blob_stages_and_cleans_up() {
        let blob_store = SimBlobStore::new();
        let sink = Neo4jSink::new(Arc::new(blob_store.clone()));

        let hash = sink.store_blob(b"fake-png").await.unwrap();
        assert!(blob_store.contains(&hash));
        assert_eq!(blob_store.blob(&hash).unwrap(), b"fake-png");
    }

    #[tokio::test]
    async fn test_store_blob_failure_propagates_as_write_error() {
        let blob_store = SimBlobStore::new().with_failing_adds();
        let sink = Neo4jSink::new(Arc::new(blob_store.clone()));

        let err = sink.store_blob(b"fake-png").await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(blob_store.blob_count(), 0);
    }

    #[tokio::test]
    async fn test_neo4j_persist_roundtrip() {
        let url = require_db!();
        let user = env::var("TEST_NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
        let password = env::var("TEST_NEO4J_PASSWORD").unwrap_or_default();

        let snapshot = SettingsSnapshot::new()
            .with_setting("neo4j", FIELD_CONNECTION_STRING, &url)
            .with_setting("neo4j", crate::config::FIELD_USER_NAME, &user)
            .with_setting("neo4j", crate::config::FIELD_PASSWORD, &password);
        let options = BackendOptions::for_backend(&snapshot, "neo4j");

        let blob_store = SimBlobStore::new();
        let sink = Neo4jSink::new(Arc::new(blob_store.clone()));

        let event = crate::event::GenerationEvent::builder()
            .with_image(image::DynamicImage::new_rgba8(2, 2), INFOTEXT)
            .with_image(image::DynamicImage::new_rgba8(2, 2), INFOTEXT)
            .with_prompt("shared prompt")
            .build();

        let written = sink.persist(&event, &options).await.unwrap();
        assert_eq!(written, 2);
        // Identical PNG bytes deduplicate to one blob.
        assert_eq!(blob_store.blob_count(), 1);
    }
}
