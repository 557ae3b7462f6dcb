// ABOUTME: Plugin capability set and the construction-time plugin registry
// ABOUTME: Duplicate plugin names are rejected with a recoverable error

use crate::bot::Bot;
use crate::error::DuplicatePluginError;
use std::collections::HashSet;
use std::fmt;

/// An independently developed feature that registers routes on the bot.
///
/// `init` consumes the plugin: the bot keeps nothing but the routes, so any
/// state a handler needs must be captured by the handler itself.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    /// Register routes. Runs on the bot's construction path and must not block.
    fn init(self: Box<Self>, bot: &mut Bot, span: tracing::Span);
}

/// Ordered, name-unique set of plugins handed to [`Bot::new`].
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Box<dyn Plugin>>,
    names: HashSet<String>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin; its `init` runs after every earlier registration.
    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) -> Result<(), DuplicatePluginError> {
        self.register_boxed(Box::new(plugin))
    }

    pub fn register_boxed(&mut self, plugin: Box<dyn Plugin>) -> Result<(), DuplicatePluginError> {
        let name = plugin.name().to_string();
        if !self.names.insert(name.clone()) {
            return Err(DuplicatePluginError { name });
        }
        self.plugins.push(plugin);
        Ok(())
    }

    /// Builder-style registration.
    pub fn with<P: Plugin + 'static>(mut self, plugin: P) -> Result<Self, DuplicatePluginError> {
        self.register(plugin)?;
        Ok(self)
    }

    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub(crate) fn into_plugins(self) -> Vec<Box<dyn Plugin>> {
        self.plugins
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
