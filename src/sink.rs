//! Storage Sink Trait
//!
//! `TigerStyle`: Abstract interface, simulation-first.
//!
//! Every backend implements the same persistence contract. The dispatcher
//! knows nothing about connection or schema details; those live entirely
//! behind this trait. All implementations must satisfy:
//!
//! - `persist` opens a fresh connection, writes the event's images in
//!   order, and releases the connection before returning, success or not.
//! - `test_connectivity` opens, probes, and always closes; it reports a
//!   human-readable message and never an error.

use async_trait::async_trait;

use crate::config::BackendOptions;
use crate::error::StoreResult;
use crate::event::GenerationEvent;

/// Abstract storage sink for generation events.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Unique backend name, also the settings-key suffix.
    fn name(&self) -> &'static str;

    /// Write every image of the event to this backend.
    ///
    /// Returns the number of images written. A per-image failure stops the
    /// remaining images for this sink and propagates; the dispatcher
    /// absorbs it so other sinks still run.
    async fn persist(
        &self,
        event: &GenerationEvent,
        options: &BackendOptions,
    ) -> StoreResult<usize>;

    /// Open, probe, close; report the outcome as a message.
    ///
    /// Must never leak a connection, even on success.
    async fn test_connectivity(&self, options: &BackendOptions) -> String;
}
