// ABOUTME: Greeting plugin: answers the "!say" command with "Hello!"
// ABOUTME: Smallest example of a plugin registering one message route

use athenais_core::{Bot, Event, EventType, HandlerResult, Plugin, Route};
use std::sync::Arc;
use tracing::Instrument;

pub const COMMAND: &str = "!say";
pub const REPLY: &str = "Hello!";

pub struct SayHi;

impl Plugin for SayHi {
    fn name(&self) -> &str {
        "sayhi"
    }

    fn init(self: Box<Self>, bot: &mut Bot, span: tracing::Span) {
        let handle = bot.handle();
        span.in_scope(|| tracing::info!("Initializing sayhi plugin"));

        bot.route(Route::new(EventType::ROOM_MESSAGE, move |evt: Arc<Event>| {
            let handle = handle.clone();
            async move {
                let is_command = evt
                    .as_message()
                    .is_some_and(|m| m.is_text() && m.body == COMMAND);
                if !is_command {
                    return HandlerResult::Ok(());
                }

                tracing::debug!(room_id = %evt.room_id, sender = %evt.sender, "Saying hi");
                handle.send_text(&evt.room_id, REPLY).await?;
                Ok(())
            }
            .instrument(span.clone())
        }));
    }
}
