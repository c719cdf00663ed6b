//! MongoDB Sink
//!
//! Schemaless document insert: one document per image, carrying the
//! structured metadata map and the PNG bytes as a binary field. There is
//! no schema-resolution step; the collection springs into existence on
//! first insert.

use async_trait::async_trait;
use mongodb::bson::spec::BinarySubtype;
use mongodb::bson::{doc, Binary, Bson, Document};
use mongodb::Client;

use crate::config::BackendOptions;
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;
use crate::metadata::{parse_infotext, MetadataValue, ParsedMetadata};
use crate::serialize::encode_png;
use crate::sink::StorageSink;

/// MongoDB storage sink.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoSink;

impl MongoSink {
    /// Create the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn connect(options: &BackendOptions) -> StoreResult<Client> {
        let connection_string = options.connection_string()?;

        Client::with_uri_str(connection_string)
            .await
            .map_err(|e| StoreError::connection(format!("mongodb: failed to connect: {e}")))
    }

    async fn write_all(
        &self,
        client: &Client,
        event: &GenerationEvent,
        options: &BackendOptions,
    ) -> StoreResult<usize> {
        let database = client.database(options.database_name()?);
        let collection = database.collection::<Document>(options.collection_name()?);

        let mut written = 0;
        for (index, generated) in event.images.iter().enumerate() {
            let metadata = match parse_infotext(&generated.info_text) {
                Ok(metadata) => metadata,
                Err(e) => {
                    tracing::error!(backend = "mongodb", image_index = index, error = %e, "serialization failed");
                    return Err(e);
                }
            };

            let png = encode_png(&generated.image)?;
            let document = doc! {
                "metadata": metadata_to_bson(&metadata),
                "image": Bson::Binary(Binary {
                    subtype: BinarySubtype::Generic,
                    bytes: png.to_vec(),
                }),
            };

            if let Err(e) = collection.insert_one(document).await {
                tracing::error!(backend = "mongodb", image_index = index, error = %e, "insert failed");
                return Err(StoreError::write(format!(
                    "mongodb: insert of image {index} failed: {e}"
                )));
            }
            written += 1;
        }

        Ok(written)
    }
}

/// Convert a parsed metadata map to a BSON document.
fn metadata_to_bson(metadata: &ParsedMetadata) -> Document {
    let mut document = Document::new();
    for (key, value) in metadata.iter() {
        let bson = match value {
            MetadataValue::Int(v) => Bson::Int64(*v),
            MetadataValue::Float(v) => Bson::Double(*v),
            MetadataValue::Size(w, h) => {
                Bson::Array(vec![Bson::Int64(i64::from(*w)), Bson::Int64(i64::from(*h))])
            }
            MetadataValue::Text(v) => Bson::String(v.clone()),
        };
        document.insert(key, bson);
    }
    document
}

#[async_trait]
impl StorageSink for MongoSink {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    #[tracing::instrument(skip(self, event, options), fields(backend = "mongodb"))]
    async fn persist(
        &self,
        event: &GenerationEvent,
        options: &BackendOptions,
    ) -> StoreResult<usize> {
        let client = Self::connect(options).await?;

        let result = self.write_all(&client, event, options).await;
        client.clone().shutdown().await;
        result
    }

    async fn test_connectivity(&self, options: &BackendOptions) -> String {
        let client = match Self::connect(options).await {
            Ok(client) => client,
            Err(e) => return format!("Error connecting to MongoDB: {e}"),
        };

        let probe = client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await;
        client.shutdown().await;

        match probe {
            Ok(_) => "Connected successfully to MongoDB!".to_string(),
            Err(e) => format!("Error connecting to MongoDB: {e}"),
        }
    }
}

// =============================================================================
// Tests (require a running MongoDB)
// =============================================================================
