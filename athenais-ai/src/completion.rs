// ABOUTME: Completion trait that every text-generation backend implements.
// ABOUTME: AiError separates moderation refusals from transport and API failures.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    /// The moderation check rejected the input. Not a transport failure.
    #[error("moderation flagged input")]
    Flagged { categories: Vec<String> },
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("completion returned no choices")]
    EmptyResponse,
}

impl AiError {
    pub fn is_flagged(&self) -> bool {
        matches!(self, Self::Flagged { .. })
    }
}

/// Turns a user prompt into a single reply.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Screen `input`, then generate a reply to it.
    async fn prompt(&self, input: &str) -> Result<String, AiError>;
}
