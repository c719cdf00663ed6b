//! # Nexstore
//!
//! Pluggable persistence fan-out for image-generation pipelines.
//!
//! ## Features
//!
//! - **🗄️ Pluggable Backends**: MySQL, SQLite, MongoDB, and Neo4j sinks behind one trait
//! - **📸 One Event, Many Stores**: A single generation event fans out to every enabled backend
//! - **✅ Best-Effort Dispatch**: A broken database never takes the generation pipeline down
//! - **🔐 Per-Image Transactions**: Each image commits or rolls back on its own
//! - **🧩 Content-Addressed Blobs**: The graph sink keeps only a content hash, bytes live in a blob store
//! - **🎯 Deterministic Testing**: `SimSink` and `SimBlobStore` for reproducible fault injection
//!
//! ## Quick Start
//!
//! ```rust
//! use nexstore::{GenerationEvent, SettingsSnapshot, SinkRegistry, SimSink, FIELD_ENABLE};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut registry = SinkRegistry::new();
//! registry.register(Box::new(SimSink::new("sim")));
//!
//! let settings = SettingsSnapshot::new().with_setting("sim", FIELD_ENABLE, "true");
//!
//! let event = GenerationEvent::builder()
//!     .with_image(
//!         image::DynamicImage::new_rgba8(64, 64),
//!         "a castle\nSteps: 20, Sampler: Euler a, CFG scale: 7, Seed: 42, \
//!          Size: 64x64, Model hash: abc123, Model: dream-v1",
//!     )
//!     .with_prompt("a castle")
//!     .build();
//!
//! let report = registry.dispatch_event(&event, &settings).await;
//! assert_eq!(report.persisted_count(), 1);
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     SinkRegistry                        │
//! │        dispatch_event(event, settings) → report         │
//! ├────────────┬────────────┬────────────┬──────────────────┤
//! │ MySqlSink  │ SqliteSink │ MongoSink  │ Neo4jSink        │
//! │ VARCHAR +  │ TEXT +     │ document + │ graph nodes +    │
//! │ LONGBLOB   │ BLOB       │ binary     │ BlobStore hash   │
//! ├────────────┴────────────┴────────────┴──────────────────┤
//! │   serialize: infotext → metadata JSON, image → PNG      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! - [`SinkRegistry`] - Ordered sink collection with best-effort dispatch
//! - [`StorageSink`] - The per-backend persistence protocol
//! - [`SettingsSnapshot`] / [`BackendOptions`] - Flat host settings, read fresh per event
//! - [`ParsedMetadata`](metadata::ParsedMetadata) - Typed view of a generation infotext
//! - [`BlobStore`] - Content-addressed storage for the graph sink's image bytes
//!
//! ## Feature Flags
//!
//! - `mysql` - MySQL relational sink (sqlx)
//! - `sqlite` - SQLite relational sink (sqlx)
//! - `mongo` - MongoDB document sink
//! - `neo4j` - Neo4j graph sink + IPFS blob store
//! - `all-backends` - Everything above

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod blobstore;
pub mod config;
pub mod constants;
pub mod error;
pub mod event;
pub mod metadata;
pub mod registry;
pub mod serialize;
pub mod sink;
pub mod sinks;

// Re-export common types
pub use blobstore::{BlobStore, SimBlobStore};
pub use config::{
    BackendOptions, SettingsSnapshot, FIELD_COLLECTION_NAME, FIELD_CONNECTION_STRING,
    FIELD_DATABASE_NAME, FIELD_ENABLE, FIELD_IMAGE_COLUMN, FIELD_METADATA_COLUMN, FIELD_PASSWORD,
    FIELD_TABLE_NAME, FIELD_USER_NAME,
};
pub use constants::*;
pub use error::{StoreError, StoreResult};
pub use event::{GeneratedImage, GenerationEvent, GenerationEventBuilder};
pub use metadata::{MetadataValue, ParsedMetadata};
pub use registry::{DispatchReport, SinkOutcome, SinkRegistry, SinkReport};
pub use serialize::{encode_png, serialize, StorageRecord};
pub use sink::StorageSink;
pub use sinks::{SimRecord, SimSink};

#[cfg(feature = "mysql")]
pub use sinks::MySqlSink;

#[cfg(feature = "sqlite")]
pub use sinks::SqliteSink;

#[cfg(feature = "mongo")]
pub use sinks::MongoSink;

#[cfg(feature = "neo4j")]
pub use blobstore::IpfsBlobStore;
#[cfg(feature = "neo4j")]
pub use sinks::Neo4jSink;
