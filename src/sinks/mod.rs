//! Storage Sink Implementations
//!
//! One module per backend. The simulation sink is always compiled; the
//! real backends are feature-gated so a host only pays for the drivers it
//! enables.

mod schema;
mod sim;

#[cfg(feature = "mysql")]
mod mysql;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "mongo")]
mod mongo;

#[cfg(feature = "neo4j")]
mod graph;

pub use schema::{validate_identifier, TableBinding, TableNames};
pub use sim::{SimRecord, SimSink};

#[cfg(feature = "mysql")]
pub use mysql::MySqlSink;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSink;

#[cfg(feature = "mongo")]
pub use mongo::MongoSink;

#[cfg(feature = "neo4j")]
pub use graph::Neo4jSink;
