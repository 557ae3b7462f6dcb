// ABOUTME: Root library module exposing the Matrix transport, configuration and shipped plugins
// ABOUTME: The transport-agnostic core lives in athenais-core, completion backends in athenais-ai

pub mod config;
pub mod logging;
pub mod matrix_client;
pub mod metrics;
pub mod paths;
pub mod plugins;
pub mod transport;

// Re-export core types for convenience
pub use athenais_core::{Bot, BotError, BotHandle, Event, EventType, Plugin, PluginRegistry, Route};
