//! `TigerStyle` Constants
//!
//! All limits use big-endian naming: `CATEGORY_SPECIFICS_UNIT_LIMIT`
//! Example: `RELATIONAL_METADATA_BYTES_MAX` (not `MAX_METADATA_SIZE`)
//!
//! Every constant includes units in the name:
//! - `_BYTES_MAX/MIN` for size limits
//! - `_COUNT_MAX` for quantity limits

// =============================================================================
// Settings
// =============================================================================

/// Default prefix for settings keys (`<prefix>_<field>_<backend>`)
pub const SETTINGS_PREFIX_DEFAULT: &str = "nexstore";

/// Maximum length of a settings key
pub const SETTINGS_KEY_BYTES_MAX: usize = 256;

/// Maximum length of a settings value
pub const SETTINGS_VALUE_BYTES_MAX: usize = 4096;

// =============================================================================
// Event Limits
// =============================================================================

/// Maximum number of images in a single generation event
pub const EVENT_IMAGES_COUNT_MAX: usize = 1000;

/// Maximum size of a single infotext string
pub const EVENT_INFOTEXT_BYTES_MAX: usize = 100_000; // 100KB

/// Maximum length of a prompt
pub const EVENT_PROMPT_BYTES_MAX: usize = 100_000; // 100KB

// =============================================================================
// Registry Limits
// =============================================================================

/// Maximum number of sinks a registry will hold
pub const REGISTRY_SINKS_COUNT_MAX: usize = 64;

// =============================================================================
// Metadata Limits
// =============================================================================

/// Maximum number of keys in a parsed metadata map
pub const METADATA_KEYS_COUNT_MAX: usize = 256;

/// Maximum length of a metadata key
pub const METADATA_KEY_BYTES_MAX: usize = 256;

// =============================================================================
// Relational Sink Limits
// =============================================================================

/// Maximum length of a table or column identifier
pub const RELATIONAL_IDENTIFIER_BYTES_MAX: usize = 64;

/// Capacity of the fixed-width metadata column (MySQL variant)
pub const RELATIONAL_METADATA_BYTES_MAX: usize = 255;

/// Practical maximum of the relational blob column (LONGBLOB)
pub const RELATIONAL_BLOB_BYTES_MAX: u64 = 4_294_967_295;

/// Connections per event-scoped pool
pub const RELATIONAL_POOL_CONNECTIONS_MAX: u32 = 2;

// =============================================================================
// Blob Store Limits
// =============================================================================

/// Maximum length of a content hash returned by a blob store
pub const BLOB_HASH_BYTES_MAX: usize = 128;

/// Maximum size of a staged blob upload
pub const BLOB_SIZE_BYTES_MAX: u64 = 256 * 1024 * 1024; // 256MB

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relational_limits_valid() {
        assert!(RELATIONAL_IDENTIFIER_BYTES_MAX > 0);
        assert!(RELATIONAL_METADATA_BYTES_MAX <= u16::MAX as usize);
        assert_eq!(RELATIONAL_BLOB_BYTES_MAX, u32::MAX as u64);
    }

    #[test]
    fn test_settings_limits_valid() {
        assert!(SETTINGS_PREFIX_DEFAULT.len() < SETTINGS_KEY_BYTES_MAX);
        assert!(!SETTINGS_PREFIX_DEFAULT.contains('_'));
    }
}
