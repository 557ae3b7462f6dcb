// ABOUTME: Mock completion backend for testing - returns pre-configured replies.
// ABOUTME: Allows deterministic plugin tests without calling a real API.
//!
//! # Example
//!
//! ```no_run
//! use athenais_ai::{Completion, MockCompletion};
//!
//! # async fn example() {
//! let mock = MockCompletion::new()
//!     .on_prompt("hello").respond_text("Hi there!")
//!     .on_prompt("forbidden").respond_flagged(&["hate"]);
//!
//! assert_eq!(mock.prompt("hello world").await.unwrap(), "Hi there!");
//! assert!(mock.prompt("forbidden words").await.unwrap_err().is_flagged());
//! # }
//! ```

use crate::completion::{AiError, Completion};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

enum Reply {
    Text(String),
    Flagged(Vec<String>),
    Api(u16, String),
    Empty,
}

impl Reply {
    fn into_result(self) -> Result<String, AiError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Flagged(categories) => Err(AiError::Flagged { categories }),
            Self::Api(status, body) => Err(AiError::Api { status, body }),
            Self::Empty => Err(AiError::EmptyResponse),
        }
    }
}

struct Expectation {
    pattern: String,
    reply: Reply,
}

/// Mock backend for testing
///
/// Clones share expectations and the prompt log, so a test can keep one
/// clone for inspection while a plugin owns another.
#[derive(Clone, Default)]
pub struct MockCompletion {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up an expectation for a prompt containing `pattern`
    pub fn on_prompt(self, pattern: &str) -> ExpectationBuilder {
        ExpectationBuilder {
            backend: self,
            pattern: pattern.to_string(),
        }
    }

    /// Every prompt received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, pattern: String, reply: Reply) {
        self.expectations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Expectation { pattern, reply });
    }
}

#[async_trait]
impl Completion for MockCompletion {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn prompt(&self, input: &str) -> Result<String, AiError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(input.to_string());

        // Oldest matching expectation wins and is consumed
        let reply = {
            let mut exp = self.expectations.lock().unwrap_or_else(|e| e.into_inner());
            exp.iter()
                .position(|e| input.contains(&e.pattern))
                .and_then(|i| exp.remove(i))
                .map(|e| e.reply)
        };

        match reply {
            Some(reply) => reply.into_result(),
            None => Ok(format!("Mock: no expectation for '{}'", input)),
        }
    }
}

/// Builder for setting up mock expectations with a fluent API
pub struct ExpectationBuilder {
    backend: MockCompletion,
    pattern: String,
}

impl ExpectationBuilder {
    pub fn respond_text(self, text: &str) -> MockCompletion {
        self.finish(Reply::Text(text.to_string()))
    }

    /// Fail as if moderation rejected the prompt
    pub fn respond_flagged(self, categories: &[&str]) -> MockCompletion {
        self.finish(Reply::Flagged(
            categories.iter().map(|c| c.to_string()).collect(),
        ))
    }

    pub fn respond_api_error(self, status: u16, body: &str) -> MockCompletion {
        self.finish(Reply::Api(status, body.to_string()))
    }

    pub fn respond_empty(self) -> MockCompletion {
        self.finish(Reply::Empty)
    }

    fn finish(self, reply: Reply) -> MockCompletion {
        self.backend.push(self.pattern, reply);
        self.backend
    }
}
