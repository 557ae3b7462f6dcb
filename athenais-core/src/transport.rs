// ABOUTME: Contract for the chat-protocol client the bot drives
// ABOUTME: Sync, room membership, sending, read receipts and the single event callback

use crate::event::Event;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Room identifiers. Ordered so reconciliation passes are deterministic.
pub type RoomSet = BTreeSet<String>;

/// Callback the transport awaits once per received event. The next event is
/// not delivered until the returned future completes.
pub type EventCallback = Arc<dyn Fn(Event) -> BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync {
    /// The logged-in account this transport acts as.
    fn user_id(&self) -> &str;

    /// Authoritative snapshot of currently joined rooms.
    async fn joined_rooms(&self) -> Result<RoomSet>;

    async fn join_room(&self, room_id: &str) -> Result<()>;

    async fn leave_room(&self, room_id: &str) -> Result<()>;

    /// Send a plain-text message, returning the new event id.
    async fn send_text(&self, room_id: &str, text: &str) -> Result<String>;

    async fn mark_read(&self, room_id: &str, event_id: &str) -> Result<()>;

    /// Register the single dispatch callback. A later call replaces it.
    fn on_event(&self, callback: EventCallback);

    /// Run the sync stream until it ends, fails, or `shutdown` fires.
    async fn sync(&self, shutdown: CancellationToken) -> Result<()>;
}
