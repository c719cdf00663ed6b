//! `SimSink` - In-Memory Sink for Testing
//!
//! `TigerStyle`: Deterministic testing with fault injection.
//!
//! Dispatch semantics are tested entirely against this sink: it follows
//! the same per-image write loop as the real sinks (serialize, append,
//! stop on first failure) and counts live connections so tests can assert
//! that nothing leaks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::BackendOptions;
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;
use crate::serialize::serialize;
use crate::sink::StorageSink;

// =============================================================================
// SimRecord
// =============================================================================

/// One record as a simulated backend would have stored it.
#[derive(Debug, Clone)]
pub struct SimRecord {
    /// Synthetic row id
    pub id: String,
    /// JSON-encoded metadata
    pub metadata_json: String,
    /// PNG bytes
    pub image_png: Bytes,
    /// Wall-clock store time
    pub stored_at: DateTime<Utc>,
}

// =============================================================================
// SimSink
// =============================================================================

/// In-memory storage sink for testing.
///
/// `TigerStyle`:
/// - Thread-safe with `RwLock`
/// - Failure knobs instead of real network faults
/// - Connection counter proves the open/close discipline
#[derive(Debug, Clone)]
pub struct SimSink {
    name: &'static str,
    records: Arc<RwLock<Vec<SimRecord>>>,
    open_connections: Arc<AtomicUsize>,
    persist_calls: Arc<AtomicUsize>,
    fail_connect: bool,
    fail_on_image: Option<usize>,
}

/// Decrements the live-connection counter on drop, so every return path
/// releases the simulated connection.
struct ConnectionGuard<'a>(&'a AtomicUsize);

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SimSink {
    /// Create a sink registered under `name`.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        assert!(!name.is_empty(), "sink name cannot be empty");

        Self {
            name,
            records: Arc::new(RwLock::new(Vec::new())),
            open_connections: Arc::new(AtomicUsize::new(0)),
            persist_calls: Arc::new(AtomicUsize::new(0)),
            fail_connect: false,
            fail_on_image: None,
        }
    }

    /// Make connection attempts fail.
    #[must_use]
    pub fn with_failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Make the write of image `index` fail (earlier images still commit).
    #[must_use]
    pub fn with_failing_image(mut self, index: usize) -> Self {
        self.fail_on_image = Some(index);
        self
    }

    fn connect(&self) -> StoreResult<ConnectionGuard<'_>> {
        self.open_connections.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard(&self.open_connections);

        if self.fail_connect {
            // Guard drop releases the half-open connection.
            return Err(StoreError::connection(format!(
                "{}: simulated connection refused",
                self.name
            )));
        }

        Ok(guard)
    }

    /// Records stored so far, in write order.
    #[must_use]
    pub fn records(&self) -> Vec<SimRecord> {
        self.records.read().unwrap().clone()
    }

    /// Number of stored records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Currently open simulated connections.
    #[must_use]
    pub fn open_connection_count(&self) -> usize {
        self.open_connections.load(Ordering::SeqCst)
    }

    /// How many times `persist` was invoked.
    #[must_use]
    pub fn persist_call_count(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageSink for SimSink {
    fn name(&self) -> &'static str {
        self.name
    }

    #[tracing::instrument(skip(self, event, _options), fields(backend = self.name))]
    async fn persist(
        &self,
        event: &GenerationEvent,
        _options: &BackendOptions,
    ) -> StoreResult<usize> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        let _connection = self.connect()?;

        let mut written = 0;
        for (index, generated) in event.images.iter().enumerate() {
            if self.fail_on_image == Some(index) {
                tracing::error!(
                    backend = self.name,
                    image_index = index,
                    "simulated write failure"
                );
                return Err(StoreError::write(format!(
                    "{}: simulated write failure on image {index}",
                    self.name
                )));
            }

            let record = match serialize(&generated.image, &generated.info_text) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(
                        backend = self.name,
                        image_index = index,
                        error = %e,
                        "serialization failed"
                    );
                    return Err(e);
                }
            };

            self.records.write().unwrap().push(SimRecord {
                id: uuid::Uuid::new_v4().to_string(),
                metadata_json: record.metadata_json,
                image_png: record.image_png,
                stored_at: Utc::now(),
            });
            written += 1;
        }

        Ok(written)
    }

    async fn test_connectivity(&self, _options: &BackendOptions) -> String {
        match self.connect() {
            Ok(_guard) => format!("Connected successfully to {}!", self.name),
            Err(e) => format!("Error connecting to {}: {e}", self.name),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsSnapshot;
    use crate::event::GenerationEvent;

    const INFOTEXT: &str = "prompt\nSteps: 10, Sampler: Euler a, CFG scale: 7, Seed: 1, \
                            Size: 64x64, Model hash: h, Model: m";

    fn options() -> BackendOptions {
        BackendOptions::for_backend(&SettingsSnapshot::new(), "sim")
    }

    fn event(image_count: usize) -> GenerationEvent {
        let mut builder = GenerationEvent::builder().with_prompt("prompt");
        for _ in 0..image_count {
            builder = builder.with_image(image::DynamicImage::new_rgba8(2, 2), INFOTEXT);
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_persist_stores_in_order() {
        let sink = SimSink::new("sim");
        let written = sink.persist(&event(3), &options()).await.unwrap();

        assert_eq!(written, 3);
        assert_eq!(sink.record_count(), 3);
        assert_eq!(sink.open_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_earlier_writes() {
        let sink = SimSink::new("sim").with_failing_image(1);
        let err = sink.persist(&event(3), &options()).await.unwrap_err();

        assert!(matches!(err, StoreError::Write { .. }));
        assert_eq!(sink.record_count(), 1);
        assert_eq!(sink.open_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_failure_releases_connection() {
        let sink = SimSink::new("sim").with_failing_connect();
        let err = sink.persist(&event(1), &options()).await.unwrap_err();

        assert!(matches!(err, StoreError::Connection { .. }));
        assert_eq!(sink.record_count(), 0);
        assert_eq!(sink.open_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connectivity_probe_never_leaks() {
        let healthy = SimSink::new("sim");
        let message = healthy.test_connectivity(&options()).await;
        assert_eq!(message, "Connected successfully to sim!");
        assert_eq!(healthy.open_connection_count(), 0);

        let broken = SimSink::new("sim").with_failing_connect();
        let message = broken.test_connectivity(&options()).await;
        assert!(message.starts_with("Error connecting to sim:"));
        assert_eq!(broken.open_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_infotext_stops_at_bad_image() {
        let sink = SimSink::new("sim");
        let event = GenerationEvent::builder()
            .with_image(image::DynamicImage::new_rgba8(2, 2), INFOTEXT)
            .with_image(image::DynamicImage::new_rgba8(2, 2), "not parameters")
            .build();

        let err = sink.persist(&event, &options()).await.unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
        assert_eq!(sink.record_count(), 1);
    }
}
