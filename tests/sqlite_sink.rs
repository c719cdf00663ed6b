//! SQLite end-to-end tests through the public API.
//!
//! These run against temp-file databases, so they need no external server.

#![cfg(feature = "sqlite")]

use image::DynamicImage;
use nexstore::{
    GenerationEvent, SettingsSnapshot, SinkOutcome, SinkRegistry, SqliteSink,
    FIELD_CONNECTION_STRING, FIELD_ENABLE, FIELD_IMAGE_COLUMN, FIELD_METADATA_COLUMN,
    FIELD_TABLE_NAME,
};
use sqlx::sqlite::SqlitePoolOptions;

const INFOTEXT: &str = "a harbor at dawn\nSteps: 30, Sampler: DPM++ 2M, CFG scale: 6.5, \
                        Seed: 77, Size: 64x64, Model hash: fff000, Model: dream-v2";

fn settings(connection_string: &str) -> SettingsSnapshot {
    SettingsSnapshot::new()
        .with_setting("sqlite", FIELD_ENABLE, "true")
        .with_setting("sqlite", FIELD_CONNECTION_STRING, connection_string)
        .with_setting("sqlite", FIELD_TABLE_NAME, "generated_images")
        .with_setting("sqlite", FIELD_METADATA_COLUMN, "metadata")
        .with_setting("sqlite", FIELD_IMAGE_COLUMN, "image")
}

#[tokio::test]
async fn dispatch_persists_rows_into_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let connection_string = format!("sqlite://{}/events.db", dir.path().display());

    let mut registry = SinkRegistry::new();
    registry.register(Box::new(SqliteSink::new()));

    let event = GenerationEvent::builder()
        .with_image(DynamicImage::new_rgba8(4, 4), INFOTEXT)
        .with_image(DynamicImage::new_rgba8(4, 4), INFOTEXT)
        .with_prompt("a harbor at dawn")
        .build();

    let report = registry
        .dispatch_event(&event, &settings(&connection_string))
        .await;

    assert!(matches!(
        report.sink("sqlite").unwrap().outcome,
        SinkOutcome::Persisted { images: 2 }
    ));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&connection_string)
        .await
        .unwrap();

    let rows: Vec<(String, Vec<u8>)> =
        sqlx::query_as("SELECT metadata, image FROM generated_images ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    pool.close().await;

    assert_eq!(rows.len(), 2);
    for (metadata, image_bytes) in rows {
        let json: serde_json::Value = serde_json::from_str(&metadata).unwrap();
        assert_eq!(json["prompt"], "a harbor at dawn");
        assert_eq!(json["seed"], 77);
        assert_eq!(json["sampler"], "DPM++ 2M");
        assert!(image_bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}

#[tokio::test]
async fn malformed_image_commits_earlier_rows_only() {
    let dir = tempfile::tempdir().unwrap();
    let connection_string = format!("sqlite://{}/partial.db", dir.path().display());

    let mut registry = SinkRegistry::new();
    registry.register(Box::new(SqliteSink::new()));

    let event = GenerationEvent::builder()
        .with_image(DynamicImage::new_rgba8(4, 4), INFOTEXT)
        .with_image(DynamicImage::new_rgba8(4, 4), "no parameter line here")
        .build();

    let report = registry
        .dispatch_event(&event, &settings(&connection_string))
        .await;

    assert_eq!(report.failed_count(), 1);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&connection_string)
        .await
        .unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM generated_images")
        .fetch_one(&pool)
        .await
        .unwrap();
    pool.close().await;

    // The first image committed on its own transaction before the second
    // failed to serialize.
    assert_eq!(count, 1);
}

#[tokio::test]
async fn probe_reports_connectivity() {
    let mut registry = SinkRegistry::new();
    registry.register(Box::new(SqliteSink::new()));

    let message = registry
        .test_connectivity("sqlite", &settings("sqlite::memory:"))
        .await
        .unwrap();
    assert_eq!(message, "Connected successfully to SQLite!");
}
