//! SQLite Sink
//!
//! Relational variant with auto-growing columns: `TEXT` metadata + `BLOB`
//! image bytes, auto-increment id. Metadata is the per-image structured
//! parse of the infotext (preferred path).

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::config::BackendOptions;
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;
use crate::serialize::serialize;
use crate::sink::StorageSink;

use super::schema::{TableBinding, TableNames};

/// SQLite storage sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteSink;

impl SqliteSink {
    /// Create the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn connect(options: &BackendOptions) -> StoreResult<SqlitePool> {
        let connection_string = options.connection_string()?;

        let connect_options = SqliteConnectOptions::from_str(connection_string)
            .map_err(|e| StoreError::connection(format!("sqlite: invalid path: {e}")))?
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| StoreError::connection(format!("sqlite: failed to connect: {e}")))
    }

    /// Bind to the target table, creating it when absent.
    pub(crate) async fn resolve_table(
        pool: &SqlitePool,
        names: &TableNames,
    ) -> StoreResult<TableBinding> {
        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
                .fetch_all(pool)
                .await
                .map_err(|e| StoreError::schema(format!("sqlite: failed to list tables: {e}")))?;

        if tables.iter().any(|t| t == &names.table) {
            let columns: Vec<String> =
                sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
                    .bind(&names.table)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| {
                        StoreError::schema(format!("sqlite: failed to list columns: {e}"))
                    })?;

            for required in [&names.metadata_column, &names.image_column] {
                if !columns.iter().any(|c| c == required) {
                    return Err(StoreError::schema(format!(
                        "sqlite: table '{}' has no column '{required}'",
                        names.table
                    )));
                }
            }

            return Ok(TableBinding {
                names: names.clone(),
                created: false,
            });
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
                 id INTEGER PRIMARY KEY AUTOINCREMENT, \
                 \"{metadata}\" TEXT, \
                 \"{image}\" BLOB\
             )",
            table = names.table,
            metadata = names.metadata_column,
            image = names.image_column,
        );

        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| StoreError::schema(format!("sqlite: failed to create table: {e}")))?;

        Ok(TableBinding {
            names: names.clone(),
            created: true,
        })
    }

    async fn write_all(
        &self,
        pool: &SqlitePool,
        event: &GenerationEvent,
        names: &TableNames,
    ) -> StoreResult<usize> {
        let binding = Self::resolve_table(pool, names).await?;

        let insert = format!(
            "INSERT INTO \"{}\" (\"{}\", \"{}\") VALUES (?, ?)",
            binding.names.table, binding.names.metadata_column, binding.names.image_column,
        );

        let mut written = 0;
        for (index, generated) in event.images.iter().enumerate() {
            let record = match serialize(&generated.image, &generated.info_text) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(backend = "sqlite", image_index = index, error = %e, "serialization failed");
                    return Err(e);
                }
            };

            // One transaction per image; a failure rolls back only this row.
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| StoreError::write(format!("sqlite: begin failed: {e}")))?;

            let inserted = sqlx::query(&insert)
                .bind(&record.metadata_json)
                .bind(record.image_png.as_ref())
                .execute(&mut *tx)
                .await;

            if let Err(e) = inserted {
                tracing::error!(backend = "sqlite", image_index = index, error = %e, "insert failed");
                return Err(StoreError::write(format!(
                    "sqlite: insert of image {index} failed: {e}"
                )));
            }

            tx.commit()
                .await
                .map_err(|e| StoreError::write(format!("sqlite: commit failed: {e}")))?;
            written += 1;
        }

        Ok(written)
    }
}

#[async_trait]
impl StorageSink for SqliteSink {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    #[tracing::instrument(skip(self, event, options), fields(backend = "sqlite"))]
    async fn persist(
        &self,
        event: &GenerationEvent,
        options: &BackendOptions,
    ) -> StoreResult<usize> {
        let names = TableNames::from_options(options)?;
        let pool = Self::connect(options).await?;

        let result = self.write_all(&pool, event, &names).await;
        pool.close().await;
        result
    }

    async fn test_connectivity(&self, options: &BackendOptions) -> String {
        let pool = match Self::connect(options).await {
            Ok(pool) => pool,
            Err(e) => return format!("Error connecting to SQLite: {e}"),
        };

        let probe: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT 1").fetch_one(&pool).await;
        pool.close().await;

        match probe {
            Ok(_) => "Connected successfully to SQLite!".to_string(),
            Err(e) => format!("Error connecting to SQLite: {e}"),
        }
    }
}

// =============================================================================
// Tests (in-memory / temp-file databases, no server needed)
// =============================================================================
