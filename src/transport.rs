// ABOUTME: Matrix implementation of the core Transport contract on top of matrix-sdk
// ABOUTME: Persists the sync cursor and filter id, converts raw timeline JSON into core events

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use athenais_core::{Event, EventCallback, RoomSet, SyncStore, Transport};
use matrix_sdk::{
    config::SyncSettings,
    ruma::{
        api::client::{
            filter::FilterDefinition, receipt::create_receipt::v3::ReceiptType,
            sync::sync_events::v3::Filter,
        },
        events::{receipt::ReceiptThread, room::message::RoomMessageEventContent, AnySyncTimelineEvent},
        serde::Raw,
        EventId, RoomId,
    },
    Client, LoopCtrl, Room,
};
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Upper bound for the startup sync.
const INITIAL_SYNC_TIMEOUT: Duration = Duration::from_secs(60);

/// Name under which the sync filter is registered with the homeserver.
const FILTER_NAME: &str = "athenais";

type SharedCallback = Arc<RwLock<Option<EventCallback>>>;

/// The subset of a timeline event the core cares about.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: String,
    sender: String,
    event_id: String,
    #[serde(default)]
    content: serde_json::Value,
}

/// Convert one raw timeline event from `room_id` into a core [`Event`].
pub fn event_from_json(room_id: &str, json: &str) -> serde_json::Result<Event> {
    let wire: WireEvent = serde_json::from_str(json)?;
    Ok(Event::new(
        wire.event_type,
        wire.sender,
        room_id,
        wire.event_id,
        wire.content,
    ))
}

/// How `connect` prepares client state before the event loop.
#[derive(Debug, PartialEq, Eq)]
enum Startup {
    /// No saved cursor: sync once and start the event loop after it.
    InitialSync,
    /// Room state comes from the store; the event loop replays from this token.
    Resume(String),
}

impl Startup {
    fn plan(saved_token: Option<String>) -> Self {
        match saved_token {
            Some(token) if !token.is_empty() => Self::Resume(token),
            _ => Self::InitialSync,
        }
    }
}

pub struct MatrixTransport {
    client: Client,
    user_id: String,
    store: Arc<dyn SyncStore>,
    filter_id: String,
    callback: SharedCallback,
}

impl MatrixTransport {
    /// Bring client state up to date and hook the timeline into the dispatch callback.
    ///
    /// On a first run the initial sync's events are history and are not
    /// dispatched. When a sync token was persisted by an earlier run, the
    /// startup sync is skipped so that `sync` resumes from that token and the
    /// backlog missed while offline reaches the handlers.
    pub async fn connect(client: Client, store: Arc<dyn SyncStore>) -> Result<Self> {
        let user_id = client
            .user_id()
            .context("Matrix client is not logged in")?
            .to_string();

        let filter_id = match store.load_filter_id(&user_id)? {
            Some(id) => {
                tracing::debug!(filter_id = %id, "Reusing persisted sync filter");
                id
            }
            None => {
                let id = client
                    .get_or_upload_filter(FILTER_NAME, FilterDefinition::with_lazy_loading())
                    .await
                    .context("Failed to upload sync filter")?;
                store.save_filter_id(&user_id, &id)?;
                tracing::info!(filter_id = %id, "Registered sync filter");
                id
            }
        };

        match Startup::plan(store.load_next_batch(&user_id)?) {
            Startup::Resume(token) => {
                tracing::info!(
                    since = %token,
                    joined_rooms = client.joined_rooms().len(),
                    "Resuming from persisted sync token; missed events will be dispatched"
                );
            }
            Startup::InitialSync => {
                let settings =
                    SyncSettings::default().filter(Filter::FilterId(filter_id.clone()));
                tracing::info!("Performing initial sync...");
                let response =
                    tokio::time::timeout(INITIAL_SYNC_TIMEOUT, client.sync_once(settings))
                        .await
                        .context("Initial sync timed out")?
                        .context("Initial sync failed")?;
                store.save_next_batch(&user_id, &response.next_batch)?;
                tracing::info!(
                    joined_rooms = client.joined_rooms().len(),
                    "Initial sync complete"
                );
            }
        }

        let callback: SharedCallback = Arc::new(RwLock::new(None));
        let handler_callback = Arc::clone(&callback);
        client.add_event_handler(move |raw: Raw<AnySyncTimelineEvent>, room: Room| {
            let callback = Arc::clone(&handler_callback);
            async move {
                let event = match event_from_json(room.room_id().as_str(), raw.json().get()) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(error = %e, room_id = %room.room_id(), "Skipping undecodable event");
                        return;
                    }
                };
                let callback = callback.read().unwrap_or_else(|e| e.into_inner()).clone();
                if let Some(callback) = callback {
                    callback(event).await;
                }
            }
        });

        Ok(Self {
            client,
            user_id,
            store,
            filter_id,
            callback,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn room(&self, room_id: &str) -> Result<Room> {
        let room_id = RoomId::parse(room_id).with_context(|| format!("Invalid room ID: {}", room_id))?;
        self.client
            .get_room(&room_id)
            .ok_or_else(|| anyhow!("Unknown room: {}", room_id))
    }
}

#[async_trait]
impl Transport for MatrixTransport {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn joined_rooms(&self) -> Result<RoomSet> {
        Ok(self
            .client
            .joined_rooms()
            .iter()
            .map(|room| room.room_id().to_string())
            .collect())
    }

    async fn join_room(&self, room_id: &str) -> Result<()> {
        let parsed = RoomId::parse(room_id).with_context(|| format!("Invalid room ID: {}", room_id))?;
        self.client
            .join_room_by_id(&parsed)
            .await
            .with_context(|| format!("Failed to join {}", room_id))?;
        Ok(())
    }

    async fn leave_room(&self, room_id: &str) -> Result<()> {
        self.room(room_id)?
            .leave()
            .await
            .with_context(|| format!("Failed to leave {}", room_id))?;
        Ok(())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String> {
        let result = self
            .room(room_id)?
            .send(RoomMessageEventContent::text_plain(text))
            .await
            .context("Failed to send message")?;
        Ok(result.event_id.to_string())
    }

    async fn mark_read(&self, room_id: &str, event_id: &str) -> Result<()> {
        let event_id =
            EventId::parse(event_id).with_context(|| format!("Invalid event ID: {}", event_id))?;
        self.room(room_id)?
            .send_single_receipt(ReceiptType::Read, ReceiptThread::Unthreaded, event_id)
            .await
            .context("Failed to send read receipt")?;
        Ok(())
    }

    fn on_event(&self, callback: EventCallback) {
        *self.callback.write().unwrap_or_else(|e| e.into_inner()) = Some(callback);
    }

    async fn sync(&self, shutdown: CancellationToken) -> Result<()> {
        let mut settings = SyncSettings::default().filter(Filter::FilterId(self.filter_id.clone()));
        if let Some(token) = self.store.load_next_batch(&self.user_id)? {
            settings = settings.token(token);
        }

        let store = Arc::clone(&self.store);
        let user_id = self.user_id.clone();
        let sync_loop = self.client.sync_with_result_callback(settings, move |result| {
            let store = Arc::clone(&store);
            let user_id = user_id.clone();
            async move {
                let response = result?;
                if let Err(e) = store.save_next_batch(&user_id, &response.next_batch) {
                    tracing::warn!(error = %e, "Failed to persist sync token");
                }
                Ok(LoopCtrl::Continue)
            }
        });

        tracing::info!("Starting continuous sync loop");
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => Err(anyhow!("sync cancelled")),
            result = sync_loop => {
                result.context("Sync loop failed")?;
                Ok(())
            }
        }
    }
}
