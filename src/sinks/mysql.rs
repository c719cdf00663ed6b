//! MySQL Sink
//!
//! Relational variant with a fixed-capacity metadata column:
//! `VARCHAR(255)` metadata + `LONGBLOB` image bytes, auto-increment id.
//!
//! Metadata comes from the legacy event-level detail map (event prompt
//! fields plus the coerced `Steps:` line of the event infotext), one
//! identical JSON blob per row.

use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

use crate::config::BackendOptions;
use crate::constants::{RELATIONAL_METADATA_BYTES_MAX, RELATIONAL_POOL_CONNECTIONS_MAX};
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;
use crate::metadata::event_details;
use crate::serialize::encode_png;
use crate::sink::StorageSink;

use super::schema::{TableBinding, TableNames};

/// MySQL storage sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlSink;

impl MySqlSink {
    /// Create the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn connect(options: &BackendOptions) -> StoreResult<MySqlPool> {
        let connection_string = options.connection_string()?;

        MySqlPoolOptions::new()
            .max_connections(RELATIONAL_POOL_CONNECTIONS_MAX)
            .connect(connection_string)
            .await
            .map_err(|e| StoreError::connection(format!("mysql: failed to connect: {e}")))
    }

    /// Bind to the target table, creating it when absent.
    pub(crate) async fn resolve_table(
        pool: &MySqlPool,
        names: &TableNames,
    ) -> StoreResult<TableBinding> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()",
        )
        .fetch_all(pool)
        .await
        .map_err(|e| StoreError::schema(format!("mysql: failed to list tables: {e}")))?;

        if tables.iter().any(|t| t == &names.table) {
            // Bind to the existing shape; the configured columns must exist.
            let columns: Vec<String> = sqlx::query_scalar(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = DATABASE() AND table_name = ?",
            )
            .bind(&names.table)
            .fetch_all(pool)
            .await
            .map_err(|e| StoreError::schema(format!("mysql: failed to list columns: {e}")))?;

            for required in [&names.metadata_column, &names.image_column] {
                if !columns.iter().any(|c| c == required) {
                    return Err(StoreError::schema(format!(
                        "mysql: table '{}' has no column '{required}'",
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
            "CREATE TABLE IF NOT EXISTS `{table}` (\
                 id BIGINT AUTO_INCREMENT PRIMARY KEY, \
                 `{metadata}` VARCHAR({metadata_max}), \
                 `{image}` LONGBLOB\
             )",
            table = names.table,
            metadata = names.metadata_column,
            metadata_max = RELATIONAL_METADATA_BYTES_MAX,
            image = names.image_column,
        );

        sqlx::query(&ddl)
            .execute(pool)
            .await
            .map_err(|e| StoreError::schema(format!("mysql: failed to create table: {e}")))?;

        Ok(TableBinding {
            names: names.clone(),
            created: true,
        })
    }

    async fn write_all(
        &self,
        pool: &MySqlPool,
        event: &GenerationEvent,
        names: &TableNames,
    ) -> StoreResult<usize> {
        let binding = Self::resolve_table(pool, names).await?;
        let metadata_json = event_details(event)?.to_json()?;

        let insert = format!(
            "INSERT INTO `{}` (`{}`, `{}`) VALUES (?, ?)",
            binding.names.table, binding.names.metadata_column, binding.names.image_column,
        );

        let mut written = 0;
        for (index, generated) in event.images.iter().enumerate() {
            let png = encode_png(&generated.image)?;

            // One transaction per image; a failure rolls back only this row.
            let mut tx = pool
                .begin()
                .await
                .map_err(|e| StoreError::write(format!("mysql: begin failed: {e}")))?;

            let inserted = sqlx::query(&insert)
                .bind(&metadata_json)
                .bind(png.as_ref())
                .execute(&mut *tx)
                .await;

            if let Err(e) = inserted {
                tracing::error!(backend = "mysql", image_index = index, error = %e, "insert failed");
                return Err(StoreError::write(format!(
                    "mysql: insert of image {index} failed: {e}"
                )));
            }

            tx.commit()
                .await
                .map_err(|e| StoreError::write(format!("mysql: commit failed: {e}")))?;
            written += 1;
        }

        Ok(written)
    }
}

#[async_trait]
impl StorageSink for MySqlSink {
    fn name(&self) -> &'static str {
        "mysql"
    }

    #[tracing::instrument(skip(self, event, options), fields(backend = "mysql"))]
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
            Err(e) => return format!("Error connecting to MySQL: {e}"),
        };

        let probe: Result<i64, sqlx::Error> =
            sqlx::query_scalar("SELECT 1").fetch_one(&pool).await;
        pool.close().await;

        match probe {
            Ok(_) => "Connected successfully to MySQL!".to_string(),
            Err(e) => format!("Error connecting to MySQL: {e}"),
        }
    }
}

// =============================================================================
// Tests (require a running MySQL)
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        SettingsSnapshot, FIELD_CONNECTION_STRING, FIELD_IMAGE_COLUMN, FIELD_METADATA_COLUMN,
        FIELD_TABLE_NAME,
    };
    use std::env;

    /// Skip test if no database available.
    macro_rules! require_db {
        () => {
            match env::var("TEST_MYSQL_URL").ok() {
                Some(url) => url,
                None => {
                    eprintln!("Skipping test: TEST_MYSQL_URL not set");
                    return;
                }
            }
        };
    }

    const INFOTEXT: &str = "prompt\nSteps: 10, Sampler: Euler a, CFG scale: 7, Seed: 1, \
                            Size: 64x64, Model hash: h, Model: m";

    fn options(url: &str) -> BackendOptions {
        let snapshot = SettingsSnapshot::new()
            .with_setting("mysql", FIELD_CONNECTION_STRING, url)
            .with_setting("mysql", FIELD_TABLE_NAME, "nexstore_test_images")
            .with_setting("mysql", FIELD_METADATA_COLUMN, "meta")
            .with_setting("mysql", FIELD_IMAGE_COLUMN, "img");
        BackendOptions::for_backend(&snapshot, "mysql")
    }

    #[tokio::test]
    async fn test_mysql_connectivity_probe() {
        let url = require_db!();
        let message = MySqlSink::new().test_connectivity(&options(&url)).await;
        assert_eq!(message, "Connected successfully to MySQL!");
    }

    #[tokio::test]
    async fn test_mysql_persist_roundtrip() {
        let url = require_db!();
        let sink = MySqlSink::new();
        let options = options(&url);

        let event = crate::event::GenerationEvent::builder()
            .with_image(image::DynamicImage::new_rgba8(2, 2), INFOTEXT)
            .with_prompt("prompt")
            .with_info_text(INFOTEXT)
            .build();

        let written = sink.persist(&event, &options).await.unwrap();
        assert_eq!(written, 1);

        let pool = MySqlSink::connect(&options).await.unwrap();
        let (meta, img): (String, Vec<u8>) = sqlx::query_as(
            "SELECT meta, img FROM nexstore_test_images ORDER BY id DESC LIMIT 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        sqlx::query("DROP TABLE nexstore_test_images")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let json: serde_json::Value = serde_json::from_str(&meta).unwrap();
        assert_eq!(json["seed"], 1);
        assert!(img.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
