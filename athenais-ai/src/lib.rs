// ABOUTME: Text completion abstraction used by the athenais AI plugin.
// ABOUTME: Provides the Completion trait plus OpenAI and mock backends.

pub mod backends;
pub mod completion;

pub use backends::mock::MockCompletion;
pub use backends::openai::{OpenAiClient, OpenAiConfig, DEFAULT_PROMPT};
pub use completion::{AiError, Completion};
