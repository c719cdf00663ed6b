//! Infotext Parsing -> `ParsedMetadata`
//!
//! `TigerStyle`: Parse, don't validate twice; fail fast on malformed input.
//!
//! The host attaches a free-text parameter block to every image:
//!
//! ```text
//! a lighthouse at dusk
//! Negative prompt: blurry, low quality
//! Steps: 20, Sampler: Euler a, CFG scale: 7, Seed: 1234, Size: 512x512, Model hash: abc123, Model: dream-v1
//! ```
//!
//! Two parse paths exist, matching the two generations of the source
//! behavior:
//! - [`parse_infotext`] (preferred): full block, prompt + negative prompt +
//!   the `Steps:` key-value line.
//! - [`parse_steps_line`] (legacy): only the `Steps:` line, used with the
//!   event-level detail map by the MySQL sink.
//!
//! Known numeric fields are coerced; unknown fields pass through as text.
//! Any malformed pair is a [`StoreError::Serialization`]: persistence of
//! that image fails rather than silently defaulting.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::constants::{METADATA_KEYS_COUNT_MAX, METADATA_KEY_BYTES_MAX};
use crate::error::{StoreError, StoreResult};
use crate::event::GenerationEvent;

/// Marker that starts the key-value parameter line.
const STEPS_LINE_PREFIX: &str = "Steps:";

/// Marker that starts the negative-prompt block.
const NEGATIVE_PROMPT_PREFIX: &str = "Negative prompt:";

// =============================================================================
// MetadataValue
// =============================================================================

/// A typed metadata value.
///
/// Serializes untagged: ints as numbers, sizes as `[width, height]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// Integer field (steps, seed)
    Int(i64),
    /// Float field (cfg scale)
    Float(f64),
    /// Width-height pair
    Size(u32, u32),
    /// Everything else
    Text(String),
}

impl MetadataValue {
    /// Integer view, `None` for other variants.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Float view, `None` for other variants.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text view, `None` for other variants.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Size view, `None` for other variants.
    #[must_use]
    pub fn as_size(&self) -> Option<(u32, u32)> {
        match self {
            Self::Size(w, h) => Some((*w, *h)),
            _ => None,
        }
    }
}

// =============================================================================
// ParsedMetadata
// =============================================================================

/// Ordered metadata map derived from one infotext.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ParsedMetadata {
    entries: BTreeMap<String, MetadataValue>,
}

impl ParsedMetadata {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entry.
    pub fn insert(&mut self, key: impl Into<String>, value: MetadataValue) {
        let key = key.into();

        // Preconditions
        assert!(!key.is_empty(), "metadata key cannot be empty");
        assert!(key.len() <= METADATA_KEY_BYTES_MAX, "metadata key too long");
        assert!(
            self.entries.len() < METADATA_KEYS_COUNT_MAX,
            "too many metadata keys"
        );

        self.entries.insert(key, value);
    }

    /// Lookup by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries.get(key)
    }

    /// Typed integer lookup.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetadataValue::as_int)
    }

    /// Typed float lookup.
    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(MetadataValue::as_float)
    }

    /// Typed text lookup.
    #[must_use]
    pub fn get_text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(MetadataValue::as_text)
    }

    /// Typed size lookup.
    #[must_use]
    pub fn get_size(&self, key: &str) -> Option<(u32, u32)> {
        self.get(key).and_then(MetadataValue::as_size)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Encode as a JSON object string.
    pub fn to_json(&self) -> StoreResult<String> {
        serde_json::to_string(self)
            .map_err(|e| StoreError::serialization(format!("failed to encode metadata: {e}")))
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a full infotext block: prompt, negative prompt, `Steps:` line.
///
/// # Errors
/// `StoreError::Serialization` when the `Steps:` line is missing or any
/// pair on it is malformed.
pub fn parse_infotext(text: &str) -> StoreResult<ParsedMetadata> {
    let lines: Vec<&str> = text.lines().collect();

    let steps_index = lines
        .iter()
        .position(|line| line.trim_start().starts_with(STEPS_LINE_PREFIX))
        .ok_or_else(|| StoreError::serialization("infotext has no 'Steps:' line"))?;

    let negative_index = lines[..steps_index]
        .iter()
        .position(|line| line.starts_with(NEGATIVE_PROMPT_PREFIX));

    let prompt_end = negative_index.unwrap_or(steps_index);
    let prompt = lines[..prompt_end].join("\n");

    let negative_prompt = match negative_index {
        Some(index) => {
            let mut parts: Vec<&str> = Vec::with_capacity(steps_index - index);
            parts.push(lines[index][NEGATIVE_PROMPT_PREFIX.len()..].trim_start());
            parts.extend(&lines[index + 1..steps_index]);
            parts.join("\n")
        }
        None => String::new(),
    };

    let mut metadata = ParsedMetadata::new();
    metadata.insert("prompt", MetadataValue::Text(prompt));
    metadata.insert("negative_prompt", MetadataValue::Text(negative_prompt));

    parse_pairs_into(lines[steps_index].trim_start(), &mut metadata)?;

    Ok(metadata)
}

/// Parse only the `Steps:` line of an infotext (legacy path).
///
/// # Errors
/// `StoreError::Serialization` when no line starts with `Steps:` or a pair
/// is malformed.
pub fn parse_steps_line(text: &str) -> StoreResult<ParsedMetadata> {
    let line = text
        .lines()
        .map(str::trim_start)
        .find(|line| line.starts_with(STEPS_LINE_PREFIX))
        .ok_or_else(|| StoreError::serialization("infotext has no 'Steps:' line"))?;

    let mut metadata = ParsedMetadata::new();
    parse_pairs_into(line, &mut metadata)?;

    Ok(metadata)
}

/// Legacy event-level detail map used by the MySQL sink.
///
/// Mirrors the source's positional detail dict: event prompt fields plus
/// the coerced pairs of the event infotext's `Steps:` line. The seed comes
/// from the parsed line, not the event field.
///
/// # Errors
/// `StoreError::Serialization` when the line is missing, malformed, or any
/// expected generation key is absent.
pub fn event_details(event: &GenerationEvent) -> StoreResult<ParsedMetadata> {
    let mut metadata = parse_steps_line(&event.info_text)?;

    for key in [
        "steps",
        "seed",
        "sampler",
        "cfg_scale",
        "size",
        "model_hash",
        "model",
    ] {
        if metadata.get(key).is_none() {
            return Err(StoreError::serialization(format!(
                "infotext missing expected key '{key}'"
            )));
        }
    }

    metadata.insert("prompt", MetadataValue::Text(event.prompt.clone()));
    metadata.insert(
        "neg_prompt",
        MetadataValue::Text(event.negative_prompt.clone()),
    );

    Ok(metadata)
}

/// Split a `Key: Value, Key: Value` line into coerced entries.
///
/// The line is untrusted input, so the key limits are enforced here as
/// serialization errors; the asserts in [`ParsedMetadata::insert`] only
/// guard programmatic construction.
fn parse_pairs_into(line: &str, metadata: &mut ParsedMetadata) -> StoreResult<()> {
    for item in line.split(", ") {
        let (key, value) = item.split_once(": ").ok_or_else(|| {
            StoreError::serialization(format!("malformed metadata pair: {item:?}"))
        })?;

        let (key, value) = coerce(key.trim(), value.trim())?;

        if key.is_empty() {
            return Err(StoreError::serialization(format!(
                "malformed metadata pair: {item:?}"
            )));
        }
        if key.len() > METADATA_KEY_BYTES_MAX {
            return Err(StoreError::serialization(format!(
                "metadata key too long: {} bytes",
                key.len()
            )));
        }
        if metadata.len() >= METADATA_KEYS_COUNT_MAX {
            return Err(StoreError::serialization("too many metadata pairs"));
        }

        metadata.insert(key, value);
    }

    Ok(())
}

/// Coerce a raw pair into its typed form.
///
/// Known generation keys get snake-case names and typed values; anything
/// else passes through as text under its original key.
fn coerce(key: &str, value: &str) -> StoreResult<(String, MetadataValue)> {
    let entry = match key {
        "Steps" => ("steps".to_string(), MetadataValue::Int(parse_int(key, value)?)),
        "Seed" => ("seed".to_string(), MetadataValue::Int(parse_int(key, value)?)),
        "CFG scale" => (
            "cfg_scale".to_string(),
            MetadataValue::Float(parse_float(key, value)?),
        ),
        "Size" => ("size".to_string(), parse_size(value)?),
        "Sampler" => ("sampler".to_string(), MetadataValue::Text(value.to_string())),
        "Model hash" => (
            "model_hash".to_string(),
            MetadataValue::Text(value.to_string()),
        ),
        "Model" => ("model".to_string(), MetadataValue::Text(value.to_string())),
        other => (other.to_string(), MetadataValue::Text(value.to_string())),
    };

    Ok(entry)
}

fn parse_int(key: &str, value: &str) -> StoreResult<i64> {
    value
        .parse::<i64>()
        .map_err(|_| StoreError::serialization(format!("{key}: not an integer: {value:?}")))
}

fn parse_float(key: &str, value: &str) -> StoreResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| StoreError::serialization(format!("{key}: not a number: {value:?}")))
}

fn parse_size(value: &str) -> StoreResult<MetadataValue> {
    let (width, height) = value
        .split_once('x')
        .ok_or_else(|| StoreError::serialization(format!("Size: not WxH: {value:?}")))?;

    let width = width
        .parse::<u32>()
        .map_err(|_| StoreError::serialization(format!("Size: bad width: {value:?}")))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| StoreError::serialization(format!("Size: bad height: {value:?}")))?;

    Ok(MetadataValue::Size(width, height))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS_LINE: &str = "Steps: 20, Sampler: Euler a, CFG scale: 7.5, Seed: 1234, \
                              Size: 512x768, Model hash: abc123, Model: dream-v1";

    fn full_infotext() -> String {
        format!("a lighthouse at dusk\nNegative prompt: blurry, low quality\n{STEPS_LINE}")
    }

    #[test]
    fn test_steps_line_typed_coercions() {
        let metadata = parse_steps_line(STEPS_LINE).unwrap();

        assert_eq!(metadata.get_int("steps"), Some(20));
        assert_eq!(metadata.get_int("seed"), Some(1234));
        assert_eq!(metadata.get_float("cfg_scale"), Some(7.5));
        assert_eq!(metadata.get_size("size"), Some((512, 768)));
        assert_eq!(metadata.get_text("sampler"), Some("Euler a"));
        assert_eq!(metadata.get_text("model_hash"), Some("abc123"));
        assert_eq!(metadata.get_text("model"), Some("dream-v1"));
    }

    #[test]
    fn test_unknown_keys_pass_through_as_text() {
        let metadata =
            parse_steps_line("Steps: 8, Seed: 1, Clip skip: 2, Hires upscale: 2.0").unwrap();

        assert_eq!(metadata.get_text("Clip skip"), Some("2"));
        assert_eq!(metadata.get_text("Hires upscale"), Some("2.0"));
    }

    #[test]
    fn test_full_infotext_prompts() {
        let metadata = parse_infotext(&full_infotext()).unwrap();

        assert_eq!(metadata.get_text("prompt"), Some("a lighthouse at dusk"));
        assert_eq!(
            metadata.get_text("negative_prompt"),
            Some("blurry, low quality")
        );
        assert_eq!(metadata.get_int("steps"), Some(20));
    }

    #[test]
    fn test_multiline_prompt_without_negative() {
        let text = format!("line one\nline two\n{STEPS_LINE}");
        let metadata = parse_infotext(&text).unwrap();

        assert_eq!(metadata.get_text("prompt"), Some("line one\nline two"));
        assert_eq!(metadata.get_text("negative_prompt"), Some(""));
    }

    #[test]
    fn test_missing_steps_line_is_serialization_error() {
        let err = parse_infotext("just a prompt, no parameters").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));

        let err = parse_steps_line("Sampler: Euler a").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_malformed_pair_is_serialization_error() {
        let err = parse_steps_line("Steps: 20, garbage-without-separator").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_overlong_key_is_serialization_error() {
        let line = format!("Steps: 20, {}: 1", "k".repeat(METADATA_KEY_BYTES_MAX + 1));
        let err = parse_steps_line(&line).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn test_empty_key_is_serialization_error() {
        let err = parse_steps_line("Steps: 20, : orphan value").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_too_many_pairs_is_serialization_error() {
        let mut line = String::from("Steps: 20");
        for i in 0..METADATA_KEYS_COUNT_MAX {
            line.push_str(&format!(", Extra{i}: v"));
        }
        let err = parse_steps_line(&line).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
        assert!(err.to_string().contains("too many"));
    }

    #[test]
    fn test_non_numeric_known_field_is_serialization_error() {
        let err = parse_steps_line("Steps: twenty, Seed: 1").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));

        let err = parse_steps_line("Steps: 20, Size: 512by512").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }

    #[test]
    fn test_json_encoding_shapes() {
        let metadata = parse_steps_line(STEPS_LINE).unwrap();
        let json: serde_json::Value = serde_json::from_str(&metadata.to_json().unwrap()).unwrap();

        assert_eq!(json["steps"], 20);
        assert_eq!(json["cfg_scale"], 7.5);
        assert_eq!(json["size"], serde_json::json!([512, 768]));
        assert_eq!(json["model"], "dream-v1");
    }

    #[test]
    fn test_event_details_overlays_event_prompts() {
        let event = crate::event::GenerationEvent::builder()
            .with_prompt("a lighthouse at dusk")
            .with_negative_prompt("blurry")
            .with_info_text(full_infotext())
            .build();

        let details = event_details(&event).unwrap();
        assert_eq!(details.get_text("prompt"), Some("a lighthouse at dusk"));
        assert_eq!(details.get_text("neg_prompt"), Some("blurry"));
        assert_eq!(details.get_int("seed"), Some(1234));
        assert_eq!(details.get_int("steps"), Some(20));
    }

    #[test]
    fn test_event_details_requires_generation_keys() {
        let event = crate::event::GenerationEvent::builder()
            .with_info_text("Steps: 20, Sampler: Euler a")
            .build();

        let err = event_details(&event).unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
        assert!(err.to_string().contains("seed"));
    }
}
