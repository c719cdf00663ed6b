//! Settings Snapshot and Backend Options
//!
//! `TigerStyle`: Explicit snapshot argument, no configuration singleton.
//!
//! The host application owns a flat key-value settings namespace. Keys
//! follow `<prefix>_<field>_<backend>`, e.g.
//! `nexstore_connection_string_mysql`. The dispatcher takes a
//! [`SettingsSnapshot`] on every call and derives a per-backend
//! [`BackendOptions`] view from it; nothing is cached across events.

use std::collections::HashMap;

use crate::constants::{SETTINGS_KEY_BYTES_MAX, SETTINGS_PREFIX_DEFAULT, SETTINGS_VALUE_BYTES_MAX};
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Field names
// =============================================================================

/// Enabled flag field.
pub const FIELD_ENABLE: &str = "enable";
/// Connection string field.
pub const FIELD_CONNECTION_STRING: &str = "connection_string";
/// Relational table name field.
pub const FIELD_TABLE_NAME: &str = "table_name";
/// Relational metadata column name field.
pub const FIELD_METADATA_COLUMN: &str = "metadata_column";
/// Relational image-bytes column name field.
pub const FIELD_IMAGE_COLUMN: &str = "image_column";
/// Document-store database name field.
pub const FIELD_DATABASE_NAME: &str = "database_name";
/// Document-store collection name field.
pub const FIELD_COLLECTION_NAME: &str = "collection_name";
/// Username field (graph sink).
pub const FIELD_USER_NAME: &str = "user_name";
/// Password field (graph sink).
pub const FIELD_PASSWORD: &str = "password";

// =============================================================================
// SettingsSnapshot
// =============================================================================

/// A point-in-time copy of the host's flat settings namespace.
///
/// `TigerStyle`:
/// - Owned data, no references into the host's store
/// - Builder-style setters for tests and embedding hosts
#[derive(Debug, Clone, Default)]
pub struct SettingsSnapshot {
    prefix: String,
    values: HashMap<String, String>,
}

impl SettingsSnapshot {
    /// Create an empty snapshot with the default prefix.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: SETTINGS_PREFIX_DEFAULT.to_string(),
            values: HashMap::new(),
        }
    }

    /// Create an empty snapshot with a custom prefix.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        assert!(!prefix.is_empty(), "prefix cannot be empty");

        Self {
            prefix,
            values: HashMap::new(),
        }
    }

    /// The key prefix this snapshot was built with.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Set a raw key-value pair (key must already carry the prefix).
    pub fn set_raw(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        // Preconditions
        assert!(key.len() <= SETTINGS_KEY_BYTES_MAX, "settings key too long");
        assert!(
            value.len() <= SETTINGS_VALUE_BYTES_MAX,
            "settings value too long"
        );

        self.values.insert(key, value);
    }

    /// Set one backend field, composing the key from the prefix.
    pub fn set(&mut self, backend: &str, field: &str, value: impl Into<String>) {
        let key = self.key(field, backend);
        self.set_raw(key, value);
    }

    /// Builder-style variant of [`set`](Self::set).
    #[must_use]
    pub fn with_setting(mut self, backend: &str, field: &str, value: impl Into<String>) -> Self {
        self.set(backend, field, value);
        self
    }

    /// Compose the full key for a backend field.
    #[must_use]
    pub fn key(&self, field: &str, backend: &str) -> String {
        format!("{}_{}_{}", self.prefix, field, backend)
    }

    /// Raw lookup by full key.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Lookup one backend field.
    #[must_use]
    pub fn get(&self, field: &str, backend: &str) -> Option<&str> {
        self.get_raw(&self.key(field, backend))
    }

    /// Number of stored settings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot holds no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// =============================================================================
// BackendOptions
// =============================================================================

/// Typed per-backend view over a [`SettingsSnapshot`].
///
/// Owned copy of the backend's fields, extracted fresh at dispatch time so
/// a sink never reads stale or foreign configuration.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    backend: String,
    fields: HashMap<String, String>,
}

impl BackendOptions {
    /// Extract the options for one backend from a snapshot.
    #[must_use]
    pub fn for_backend(snapshot: &SettingsSnapshot, backend: &str) -> Self {
        assert!(!backend.is_empty(), "backend name cannot be empty");

        let head = format!("{}_", snapshot.prefix());
        let tail = format!("_{backend}");

        let fields = snapshot
            .values
            .iter()
            .filter_map(|(key, value)| {
                let middle = key.strip_prefix(head.as_str())?.strip_suffix(tail.as_str())?;
                if middle.is_empty() {
                    None
                } else {
                    Some((middle.to_string(), value.clone()))
                }
            })
            .collect();

        Self {
            backend: backend.to_string(),
            fields,
        }
    }

    /// Name of the backend these options were extracted for.
    #[must_use]
    pub fn backend(&self) -> &str {
        &self.backend
    }

    /// Whether the backend is enabled ("true"/"1"/"yes", case-insensitive).
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.fields
            .get(FIELD_ENABLE)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// An optional field, `None` when unset.
    #[must_use]
    pub fn optional(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// A required field; missing or empty is a config error naming the field.
    pub fn required(&self, field: &str) -> StoreResult<&str> {
        self.optional(field).ok_or_else(|| {
            StoreError::config(format!("{}: missing setting '{}'", self.backend, field))
        })
    }

    /// Required connection string.
    pub fn connection_string(&self) -> StoreResult<&str> {
        self.required(FIELD_CONNECTION_STRING)
    }

    /// Required table name (relational sinks).
    pub fn table_name(&self) -> StoreResult<&str> {
        self.required(FIELD_TABLE_NAME)
    }

    /// Required metadata column name (relational sinks).
    pub fn metadata_column(&self) -> StoreResult<&str> {
        self.required(FIELD_METADATA_COLUMN)
    }

    /// Required image-bytes column name (relational sinks).
    pub fn image_column(&self) -> StoreResult<&str> {
        self.required(FIELD_IMAGE_COLUMN)
    }

    /// Required database name (document sink).
    pub fn database_name(&self) -> StoreResult<&str> {
        self.required(FIELD_DATABASE_NAME)
    }

    /// Required collection name (document sink).
    pub fn collection_name(&self) -> StoreResult<&str> {
        self.required(FIELD_COLLECTION_NAME)
    }

    /// Username, empty string when unset.
    #[must_use]
    pub fn user_name(&self) -> &str {
        self.optional(FIELD_USER_NAME).unwrap_or("")
    }

    /// Password, empty string when unset.
    #[must_use]
    pub fn password(&self) -> &str {
        self.optional(FIELD_PASSWORD).unwrap_or("")
    }
}

// =============================================================================
// Tests
// =============================================================================
