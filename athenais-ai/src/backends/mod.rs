// ABOUTME: Completion backend implementations (OpenAI HTTP API, mock).
// ABOUTME: Each backend implements the Completion trait.

pub mod mock;
pub mod openai;
