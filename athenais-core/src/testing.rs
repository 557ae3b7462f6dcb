// ABOUTME: Scriptable in-memory Transport for tests of routing, reconciliation and the bot lifecycle
// ABOUTME: Records every call, injects failures, and streams pushed events through the callback
//!
//! # Example
//!
//! ```no_run
//! use athenais_core::testing::MockTransport;
//! use athenais_core::Event;
//!
//! let transport = MockTransport::new("@bot:example.org").with_joined(&["!a:example.org"]);
//! transport.push_event(Event::text_message("@alice:example.org", "!a:example.org", "$1", "hi"));
//! transport.end_stream();
//! ```

use crate::event::Event;
use crate::transport::{EventCallback, RoomSet, Transport};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One observed call against the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    JoinedRooms,
    Join(String),
    Leave(String),
    SendText { room_id: String, text: String },
    MarkRead { room_id: String, event_id: String },
    Sync,
}

impl TransportCall {
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Self::Join(room_id) | Self::Leave(room_id) => Some(room_id),
            Self::SendText { room_id, .. } | Self::MarkRead { room_id, .. } => Some(room_id),
            Self::JoinedRooms | Self::Sync => None,
        }
    }
}

#[derive(Default)]
struct MockState {
    joined: RoomSet,
    calls: Vec<TransportCall>,
    fail_joined_rooms: Option<String>,
    fail_join: HashMap<String, String>,
    fail_leave: HashMap<String, String>,
    fail_send: Option<String>,
    fail_mark_read: Option<String>,
    sync_error: Option<String>,
    next_event_id: u64,
}

pub struct MockTransport {
    user_id: String,
    state: Mutex<MockState>,
    callback: Mutex<Option<EventCallback>>,
    events_tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockTransport {
    pub fn new(user_id: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(MockState::default()),
            callback: Mutex::new(None),
            events_tx: Mutex::new(Some(tx)),
            events_rx: Mutex::new(Some(rx)),
        }
    }

    pub fn with_joined(self, rooms: &[&str]) -> Self {
        lock(&self.state).joined = rooms.iter().map(|r| r.to_string()).collect();
        self
    }

    pub fn fail_joined_rooms(self, reason: &str) -> Self {
        lock(&self.state).fail_joined_rooms = Some(reason.to_string());
        self
    }

    pub fn fail_join(self, room_id: &str, reason: &str) -> Self {
        lock(&self.state)
            .fail_join
            .insert(room_id.to_string(), reason.to_string());
        self
    }

    pub fn fail_leave(self, room_id: &str, reason: &str) -> Self {
        lock(&self.state)
            .fail_leave
            .insert(room_id.to_string(), reason.to_string());
        self
    }

    pub fn fail_send(self, reason: &str) -> Self {
        lock(&self.state).fail_send = Some(reason.to_string());
        self
    }

    pub fn fail_mark_read(self, reason: &str) -> Self {
        lock(&self.state).fail_mark_read = Some(reason.to_string());
        self
    }

    /// Queue an event for delivery by `sync`. Ignored once the stream ended.
    pub fn push_event(&self, event: Event) {
        if let Some(tx) = lock(&self.events_tx).as_ref() {
            let _ = tx.send(event);
        }
    }

    /// Close the stream; `sync` returns `Ok` after draining queued events.
    pub fn end_stream(&self) {
        lock(&self.events_tx).take();
    }

    /// Close the stream; `sync` fails with `reason` after draining queued events.
    pub fn fail_sync(&self, reason: &str) {
        lock(&self.state).sync_error = Some(reason.to_string());
        self.end_stream();
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        lock(&self.state).calls.clone()
    }

    pub fn joined(&self) -> RoomSet {
        lock(&self.state).joined.clone()
    }

    /// `(room_id, text)` of every successfully sent message.
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::SendText { room_id, text } => Some((room_id.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// `(room_id, event_id)` of every read marker call.
    pub fn read_markers(&self) -> Vec<(String, String)> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|c| match c {
                TransportCall::MarkRead { room_id, event_id } => {
                    Some((room_id.clone(), event_id.clone()))
                }
                _ => None,
            })
            .collect()
    }

    pub fn has_callback(&self) -> bool {
        lock(&self.callback).is_some()
    }

    fn record(&self, call: TransportCall) {
        lock(&self.state).calls.push(call);
    }

    /// Invoke the registered callback directly, bypassing the sync stream.
    pub async fn emit(&self, event: Event) {
        let callback = lock(&self.callback).clone();
        if let Some(callback) = callback {
            callback(event).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn joined_rooms(&self) -> Result<RoomSet> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::JoinedRooms);
        if let Some(reason) = &state.fail_joined_rooms {
            return Err(anyhow!("{}", reason));
        }
        Ok(state.joined.clone())
    }

    async fn join_room(&self, room_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::Join(room_id.to_string()));
        if let Some(reason) = state.fail_join.get(room_id) {
            return Err(anyhow!("{}", reason));
        }
        state.joined.insert(room_id.to_string());
        Ok(())
    }

    async fn leave_room(&self, room_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::Leave(room_id.to_string()));
        if let Some(reason) = state.fail_leave.get(room_id) {
            return Err(anyhow!("{}", reason));
        }
        state.joined.remove(room_id);
        Ok(())
    }

    async fn send_text(&self, room_id: &str, text: &str) -> Result<String> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.fail_send {
            return Err(anyhow!("{}", reason));
        }
        state.calls.push(TransportCall::SendText {
            room_id: room_id.to_string(),
            text: text.to_string(),
        });
        state.next_event_id += 1;
        Ok(format!("$sent{}", state.next_event_id))
    }

    async fn mark_read(&self, room_id: &str, event_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(TransportCall::MarkRead {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
        });
        match &state.fail_mark_read {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }

    fn on_event(&self, callback: EventCallback) {
        *lock(&self.callback) = Some(callback);
    }

    async fn sync(&self, shutdown: CancellationToken) -> Result<()> {
        self.record(TransportCall::Sync);
        let mut rx = lock(&self.events_rx)
            .take()
            .ok_or_else(|| anyhow!("sync already started"))?;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(anyhow!("sync cancelled")),
                next = rx.recv() => match next {
                    Some(event) => self.emit(event).await,
                    None => break,
                },
            }
        }

        let sync_error = lock(&self.state).sync_error.clone();
        match sync_error {
            Some(reason) => Err(anyhow!("{}", reason)),
            None => Ok(()),
        }
    }
}
