//! Built-in file processors and the startup assembly step.

pub mod document;
pub mod image;

use crate::config::ProcessorConfig;
use crate::pipeline::registry::ProcessorRegistry;

/// Register the built-in processors. Order here is lookup priority.
pub fn register_defaults(registry: &mut ProcessorRegistry, config: &ProcessorConfig) {
    image::register(registry, config.image_max_width);
    document::register(registry, config.text_preview_chars);
    tracing::info!(count = registry.count(), "Processors registered");
}

/// A registry holding just the built-in processors.
pub fn default_registry(config: &ProcessorConfig) -> ProcessorRegistry {
    let mut registry = ProcessorRegistry::new();
    register_defaults(&mut registry, config);
    registry
}
