// ABOUTME: AI responder plugin: answers a share of text messages through a Completion backend
// ABOUTME: Moderation refusals are logged and swallowed; other failures fail the handler

use anyhow::Context;
use athenais_ai::{AiError, Completion};
use athenais_core::{Bot, BotHandle, Event, EventType, HandlerError, HandlerResult, Plugin, Route};
use rand::Rng;
use std::sync::Arc;
use tracing::Instrument;

/// Default percent chance of answering a message.
pub const DEFAULT_CHANCE: u8 = 50;

/// Decides whether a given message gets an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsePolicy {
    Always,
    Never,
    /// Answer with the given probability, in percent (0..=100).
    Chance(u8),
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self::Chance(DEFAULT_CHANCE)
    }
}

impl ResponsePolicy {
    /// Map a percentage to a policy; values above 100 answer always.
    pub fn from_percent(percent: u8) -> Self {
        match percent {
            0 => Self::Never,
            p if p >= 100 => Self::Always,
            p => Self::Chance(p),
        }
    }

    pub fn should_respond(&self) -> bool {
        self.should_respond_with(&mut rand::thread_rng())
    }

    pub fn should_respond_with<R: Rng>(&self, rng: &mut R) -> bool {
        match *self {
            Self::Always => true,
            Self::Never => false,
            Self::Chance(percent) => {
                let roll: u8 = rng.gen_range(0..100);
                tracing::trace!(roll, percent, "Rolled response chance");
                roll < percent
            }
        }
    }
}

pub struct OpenAiPlugin {
    completion: Arc<dyn Completion>,
    policy: ResponsePolicy,
}

impl OpenAiPlugin {
    pub fn new(completion: Arc<dyn Completion>, policy: ResponsePolicy) -> Self {
        Self { completion, policy }
    }
}

impl Plugin for OpenAiPlugin {
    fn name(&self) -> &str {
        "openai"
    }

    fn init(self: Box<Self>, bot: &mut Bot, span: tracing::Span) {
        span.in_scope(|| {
            tracing::info!(
                backend = self.completion.name(),
                policy = ?self.policy,
                "Initializing OpenAI plugin"
            )
        });

        let handle = bot.handle();
        let Self { completion, policy } = *self;
        bot.route(Route::new(EventType::ROOM_MESSAGE, move |evt: Arc<Event>| {
            respond(handle.clone(), Arc::clone(&completion), policy, evt).instrument(span.clone())
        }));
    }
}

async fn respond(
    handle: BotHandle,
    completion: Arc<dyn Completion>,
    policy: ResponsePolicy,
    evt: Arc<Event>,
) -> HandlerResult {
    let Some(message) = evt.as_message().filter(|m| m.is_text()) else {
        return Ok(());
    };

    if !policy.should_respond() {
        tracing::debug!(event_id = %evt.id, "Not responding to this message");
        return Ok(());
    }

    tracing::debug!(event_id = %evt.id, body = %message.body, "Responding to message");
    let reply = match completion.prompt(&message.body).await {
        Ok(reply) => reply,
        Err(AiError::Flagged { categories }) => {
            tracing::warn!(
                event_id = %evt.id,
                sender = %evt.sender,
                categories = ?categories,
                "Prompt flagged by moderation, not responding"
            );
            return Ok(());
        }
        Err(e) => {
            return Err(HandlerError::Other(
                anyhow::Error::new(e).context("failed to generate response"),
            ))
        }
    };

    handle
        .send_text(&evt.room_id, &reply)
        .await
        .context("failed to send message")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_from_percent() {
        assert_eq!(ResponsePolicy::from_percent(0), ResponsePolicy::Never);
        assert_eq!(ResponsePolicy::from_percent(100), ResponsePolicy::Always);
        assert_eq!(ResponsePolicy::from_percent(200), ResponsePolicy::Always);
        assert_eq!(ResponsePolicy::from_percent(30), ResponsePolicy::Chance(30));
        assert_eq!(ResponsePolicy::default(), ResponsePolicy::Chance(50));
    }

    #[test]
    fn test_always_and_never() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert!(ResponsePolicy::Always.should_respond_with(&mut rng));
            assert!(!ResponsePolicy::Never.should_respond_with(&mut rng));
        }
    }

    #[test]
    fn test_chance_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            assert!(!ResponsePolicy::Chance(0).should_respond_with(&mut rng));
            assert!(ResponsePolicy::Chance(100).should_respond_with(&mut rng));
        }
    }

    #[test]
    fn test_chance_is_roughly_proportional() {
        let mut rng = StdRng::seed_from_u64(1234);
        let policy = ResponsePolicy::Chance(50);
        let hits = (0..10_000)
            .filter(|_| policy.should_respond_with(&mut rng))
            .count();
        assert!((4_500..5_500).contains(&hits), "hits = {}", hits);
    }
}
