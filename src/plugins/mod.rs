// ABOUTME: Plugins shipped with the bot and the default registry assembling them
// ABOUTME: Registration order is openai then sayhi; openai needs a completion backend

pub mod openai;
pub mod sayhi;

use crate::config::Config;
use athenais_ai::Completion;
use athenais_core::{DuplicatePluginError, PluginRegistry};
use std::sync::Arc;

pub use openai::{OpenAiPlugin, ResponsePolicy};
pub use sayhi::SayHi;

/// Build the registry for a normal run.
///
/// `completion` is `None` when no API key is configured, in which case the
/// openai plugin is left out.
pub fn default_registry(
    config: &Config,
    completion: Option<Arc<dyn Completion>>,
) -> Result<PluginRegistry, DuplicatePluginError> {
    let mut registry = PluginRegistry::new();

    match completion {
        Some(completion) => {
            registry.register(OpenAiPlugin::new(completion, config.response_policy()))?;
        }
        None => tracing::info!("No OpenAI API key configured, openai plugin disabled"),
    }
    registry.register(SayHi)?;

    Ok(registry)
}
