//! Generation Event - Processed Result Bundle
//!
//! `TigerStyle`: Explicit types, validation, builder pattern.
//!
//! A [`GenerationEvent`] is the read-only bundle the host pipeline hands
//! over after producing a batch of images: the images themselves, a
//! per-image infotext, and the event-level generation parameters. The crate
//! never mutates it.

use image::DynamicImage;

use crate::constants::{EVENT_IMAGES_COUNT_MAX, EVENT_INFOTEXT_BYTES_MAX, EVENT_PROMPT_BYTES_MAX};

// =============================================================================
// GeneratedImage
// =============================================================================

/// One generated image plus the infotext the host attached to it.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    /// Decoded image, encoded to PNG at serialization time
    pub image: DynamicImage,
    /// Free-text generation parameters for this image
    pub info_text: String,
}

impl GeneratedImage {
    /// Create a new generated image.
    #[must_use]
    pub fn new(image: DynamicImage, info_text: impl Into<String>) -> Self {
        let info_text = info_text.into();
        assert!(
            info_text.len() <= EVENT_INFOTEXT_BYTES_MAX,
            "infotext too large"
        );

        Self { image, info_text }
    }
}

// =============================================================================
// GenerationEvent
// =============================================================================

/// One batch of produced images plus event-level generation parameters.
///
/// Immutable once built; consumed read-only by every sink.
#[derive(Debug, Clone)]
pub struct GenerationEvent {
    /// Images in generation order
    pub images: Vec<GeneratedImage>,
    /// Positive prompt shared by the batch
    pub prompt: String,
    /// Negative prompt shared by the batch
    pub negative_prompt: String,
    /// Generation seed
    pub seed: i64,
    /// Sampler name
    pub sampler: String,
    /// Classifier-free guidance scale
    pub cfg_scale: f32,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Model name
    pub model: String,
    /// Model hash
    pub model_hash: String,
    /// Event-level infotext (legacy `Steps:` line source)
    pub info_text: String,
}

impl GenerationEvent {
    /// Start building an event.
    #[must_use]
    pub fn builder() -> GenerationEventBuilder {
        GenerationEventBuilder::new()
    }

    /// Number of images in the event.
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

// =============================================================================
// GenerationEventBuilder
// =============================================================================

/// Builder for [`GenerationEvent`].
///
/// `TigerStyle`: Fluent API, fail fast on limit violations at `build()`.
#[derive(Debug, Default)]
pub struct GenerationEventBuilder {
    images: Vec<GeneratedImage>,
    prompt: String,
    negative_prompt: String,
    seed: i64,
    sampler: String,
    cfg_scale: f32,
    width: u32,
    height: u32,
    model: String,
    model_hash: String,
    info_text: String,
}

impl GenerationEventBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one image with its infotext.
    #[must_use]
    pub fn with_image(mut self, image: DynamicImage, info_text: impl Into<String>) -> Self {
        self.images.push(GeneratedImage::new(image, info_text));
        self
    }

    /// Set the positive prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Set the negative prompt.
    #[must_use]
    pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
        self.negative_prompt = negative_prompt.into();
        self
    }

    /// Set the seed.
    #[must_use]
    pub fn with_seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the sampler name.
    #[must_use]
    pub fn with_sampler(mut self, sampler: impl Into<String>) -> Self {
        self.sampler = sampler.into();
        self
    }

    /// Set the cfg scale.
    #[must_use]
    pub fn with_cfg_scale(mut self, cfg_scale: f32) -> Self {
        self.cfg_scale = cfg_scale;
        self
    }

    /// Set the output size.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the model name and hash.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, model_hash: impl Into<String>) -> Self {
        self.model = model.into();
        self.model_hash = model_hash.into();
        self
    }

    /// Set the event-level infotext.
    #[must_use]
    pub fn with_info_text(mut self, info_text: impl Into<String>) -> Self {
        self.info_text = info_text.into();
        self
    }

    /// Build the event.
    ///
    /// # Panics
    /// Panics if the image count or prompt length exceeds its limit.
    #[must_use]
    pub fn build(self) -> GenerationEvent {
        // Preconditions
        assert!(
            self.images.len() <= EVENT_IMAGES_COUNT_MAX,
            "too many images in one event"
        );
        assert!(
            self.prompt.len() <= EVENT_PROMPT_BYTES_MAX,
            "prompt too large"
        );

        GenerationEvent {
            images: self.images,
            prompt: self.prompt,
            negative_prompt: self.negative_prompt,
            seed: self.seed,
            sampler: self.sampler,
            cfg_scale: self.cfg_scale,
            width: self.width,
            height: self.height,
            model: self.model,
            model_hash: self.model_hash,
            info_text: self.info_text,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_image() -> DynamicImage {
        DynamicImage::new_rgba8(2, 2)
    }

    #[test]
    fn test_builder_roundtrip() {
        let event = GenerationEvent::builder()
            .with_image(tiny_image(), "Steps: 20, Sampler: Euler a")
            .with_prompt("a lighthouse at dusk")
            .with_negative_prompt("blurry")
            .with_seed(1234)
            .with_sampler("Euler a")
            .with_cfg_scale(7.0)
            .with_size(512, 512)
            .with_model("model-v1", "abc123")
            .with_info_text("Steps: 20")
            .build();

        assert_eq!(event.image_count(), 1);
        assert_eq!(event.prompt, "a lighthouse at dusk");
        assert_eq!(event.seed, 1234);
        assert_eq!((event.width, event.height), (512, 512));
        assert_eq!(event.model_hash, "abc123");
    }

    #[test]
    fn test_image_order_preserved() {
        let event = GenerationEvent::builder()
            .with_image(tiny_image(), "first")
            .with_image(tiny_image(), "second")
            .with_image(tiny_image(), "third")
            .build();

        let infos: Vec<&str> = event
            .images
            .iter()
            .map(|img| img.info_text.as_str())
            .collect();
        assert_eq!(infos, vec!["first", "second", "third"]);
    }
}
