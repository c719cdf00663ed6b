//! Relational Schema Binding
//!
//! Table and column names are caller-supplied so users can map onto
//! pre-existing schemas. Because they end up inside DDL and DML text, they
//! are validated against a strict identifier grammar up front and rejected
//! with a config error instead of being passed through to the dialect.

use crate::config::BackendOptions;
use crate::constants::RELATIONAL_IDENTIFIER_BYTES_MAX;
use crate::error::{StoreError, StoreResult};

// =============================================================================
// Identifier validation
// =============================================================================

/// Validate a SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, length-limited.
///
/// # Errors
/// `StoreError::Config` naming the offending identifier.
pub fn validate_identifier(name: &str) -> StoreResult<&str> {
    if name.is_empty() {
        return Err(StoreError::config("identifier cannot be empty"));
    }
    if name.len() > RELATIONAL_IDENTIFIER_BYTES_MAX {
        return Err(StoreError::config(format!("identifier too long: {name:?}")));
    }

    let mut chars = name.chars();
    let first = chars.next().expect("non-empty checked above");
    let head_ok = first.is_ascii_alphabetic() || first == '_';
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if head_ok && tail_ok {
        Ok(name)
    } else {
        Err(StoreError::config(format!("invalid identifier: {name:?}")))
    }
}

// =============================================================================
// TableNames / TableBinding
// =============================================================================

/// Validated table and column names for one relational sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableNames {
    /// Target table
    pub table: String,
    /// Text-like metadata column
    pub metadata_column: String,
    /// Binary image column
    pub image_column: String,
}

impl TableNames {
    /// Pull and validate the three names from backend options.
    ///
    /// # Errors
    /// `StoreError::Config` when a field is missing or not a valid
    /// identifier.
    pub fn from_options(options: &BackendOptions) -> StoreResult<Self> {
        let table = validate_identifier(options.table_name()?)?.to_string();
        let metadata_column = validate_identifier(options.metadata_column()?)?.to_string();
        let image_column = validate_identifier(options.image_column()?)?.to_string();

        if metadata_column == image_column {
            return Err(StoreError::config(
                "metadata and image columns must differ",
            ));
        }

        Ok(Self {
            table,
            metadata_column,
            image_column,
        })
    }
}

/// A resolved table: bound to an existing layout or freshly created.
///
/// Invariant: created at most once per (sink, table) per connection
/// lifetime; a second resolution binds instead of recreating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    /// The names this binding resolved
    pub names: TableNames,
    /// Whether this resolution issued the create
    pub created: bool,
}

// =============================================================================
// Tests
// =============================================================================
