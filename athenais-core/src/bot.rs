// ABOUTME: Bot lifecycle: plugin init, room reconciliation, supervised sync task, dispatch
// ABOUTME: Suppresses self-authored events and marks dispatched room events as read

use crate::error::BotError;
use crate::event::Event;
use crate::metrics;
use crate::plugin::PluginRegistry;
use crate::reconcile::reconcile;
use crate::route::{Route, RouteTable};
use crate::router::EventRouter;
use crate::transport::{EventCallback, RoomSet, Transport};
use anyhow::Result;
use futures_util::FutureExt;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// How long a cancelled sync task gets to wind down before it is aborted.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotState {
    Constructed,
    Reconciling,
    EventLoop,
    Terminated,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constructed => write!(f, "constructed"),
            Self::Reconciling => write!(f, "reconciling"),
            Self::EventLoop => write!(f, "event_loop"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// Cloneable handle that route handlers use to call back into the bot.
#[derive(Clone)]
pub struct BotHandle {
    transport: Arc<dyn Transport>,
}

impl BotHandle {
    pub fn id(&self) -> &str {
        self.transport.user_id()
    }

    /// Send a text message, returning the new event id. One attempt only.
    pub async fn send_text(&self, room_id: &str, text: &str) -> Result<String> {
        self.transport.send_text(room_id, text).await
    }

    pub async fn mark_read(&self, room_id: &str, event_id: &str) -> Result<()> {
        self.transport.mark_read(room_id, event_id).await
    }
}

impl fmt::Debug for BotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotHandle").field("id", &self.id()).finish()
    }
}

/// The bot host.
///
/// Constructed with a transport, the desired room set and the plugins to
/// initialize. [`Bot::run`] consumes it and returns only when the sync
/// stream terminates; there is no restart in place.
pub struct Bot {
    transport: Arc<dyn Transport>,
    router: EventRouter,
    rooms: RoomSet,
    state: watch::Sender<BotState>,
}

impl Bot {
    /// Build the bot and run every plugin's `init`, in registry order.
    pub fn new(transport: Arc<dyn Transport>, rooms: RoomSet, plugins: PluginRegistry) -> Self {
        let (state, _) = watch::channel(BotState::Constructed);
        let mut bot = Self {
            transport,
            router: EventRouter::new(),
            rooms,
            state,
        };

        for plugin in plugins.into_plugins() {
            let name = plugin.name().to_string();
            let span = tracing::info_span!("plugin", plugin = %name);
            tracing::info!(plugin = %name, "Initializing plugin");
            plugin.init(&mut bot, span);
        }

        tracing::info!(
            user_id = %bot.id(),
            routes = bot.router.table().len(),
            rooms = bot.rooms.len(),
            "Bot constructed"
        );
        bot
    }

    pub fn id(&self) -> &str {
        self.transport.user_id()
    }

    /// Register a route. Routes cannot be removed.
    pub fn route(&mut self, route: Route) {
        tracing::debug!(event_type = %route.event_type(), "Registering route");
        self.router.add_route(route);
    }

    pub fn routes(&self) -> &RouteTable {
        self.router.table()
    }

    pub fn handle(&self) -> BotHandle {
        BotHandle {
            transport: Arc::clone(&self.transport),
        }
    }

    pub fn desired_rooms(&self) -> &RoomSet {
        &self.rooms
    }

    pub fn state(&self) -> BotState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BotState> {
        self.state.subscribe()
    }

    pub async fn send_text(&self, room_id: &str, text: &str) -> Result<String> {
        self.transport.send_text(room_id, text).await
    }

    /// Register dispatch, reconcile rooms, then run the sync stream until it
    /// ends, fails, or `shutdown` is cancelled.
    ///
    /// A reconciliation failure aborts before any event is dispatched.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), BotError> {
        let Bot {
            transport,
            router,
            rooms,
            state,
        } = self;

        // Cancelled by `run` itself, after it has decided the terminal result
        let lifecycle = CancellationToken::new();
        let dispatcher = Arc::new(Dispatcher {
            router,
            transport: Arc::clone(&transport),
            lifecycle: lifecycle.clone(),
        });
        transport.on_event(Dispatcher::callback(&dispatcher));

        if let Err(e) = start(transport.as_ref(), &rooms, &state).await {
            lifecycle.cancel();
            state.send_replace(BotState::Terminated);
            tracing::error!(error = %e, "Startup aborted");
            return Err(e);
        }

        state.send_replace(BotState::EventLoop);
        tracing::info!("Entering event loop");

        let sync_transport = Arc::clone(&transport);
        let sync_token = lifecycle.clone();
        let mut sync_task = tokio::spawn(async move { sync_transport.sync(sync_token).await });

        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                if sync_task.is_finished() {
                    sync_outcome((&mut sync_task).await)
                } else {
                    tracing::info!("Shutdown requested, stopping sync");
                    lifecycle.cancel();
                    if tokio::time::timeout(SHUTDOWN_GRACE, &mut sync_task).await.is_err() {
                        tracing::warn!("Sync task did not stop in time, aborting");
                        sync_task.abort();
                    }
                    Err(BotError::Cancelled)
                }
            }
            joined = &mut sync_task => sync_outcome(joined),
        };

        lifecycle.cancel();
        state.send_replace(BotState::Terminated);
        match &result {
            Ok(()) => tracing::info!("Sync stream ended"),
            Err(e) => tracing::error!(error = %e, "Bot terminated"),
        }
        result
    }
}

impl fmt::Debug for Bot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bot")
            .field("id", &self.id())
            .field("routes", &self.router.table().len())
            .field("rooms", &self.rooms)
            .field("state", &self.state())
            .finish()
    }
}

fn sync_outcome(joined: Result<Result<()>, JoinError>) -> Result<(), BotError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BotError::Sync(e.into())),
        Err(e) => Err(BotError::SyncTask(e)),
    }
}

/// Reconcile room membership ahead of the event loop.
async fn start(
    transport: &dyn Transport,
    rooms: &RoomSet,
    state: &watch::Sender<BotState>,
) -> Result<(), BotError> {
    state.send_replace(BotState::Reconciling);
    let report = reconcile(transport, rooms).await?;
    tracing::info!(
        left = report.left.len(),
        joined = report.joined.len(),
        "Room membership reconciled"
    );
    Ok(())
}

/// Runs on the sync task: one event at a time.
struct Dispatcher {
    router: EventRouter,
    transport: Arc<dyn Transport>,
    lifecycle: CancellationToken,
}

impl Dispatcher {
    fn callback(this: &Arc<Self>) -> EventCallback {
        let dispatcher = Arc::clone(this);
        Arc::new(move |event: Event| {
            let dispatcher = Arc::clone(&dispatcher);
            async move { dispatcher.dispatch(event).await }.boxed()
        })
    }

    async fn dispatch(&self, event: Event) {
        if self.lifecycle.is_cancelled() {
            tracing::debug!(event_id = %event.id, "Dropping event after termination");
            return;
        }

        metrics::record_event_received(event.event_type.as_str());

        if event.sender == self.transport.user_id() {
            tracing::trace!(event_id = %event.id, "Ignoring event from self");
            metrics::record_event_suppressed();
            return;
        }

        let event = Arc::new(event);
        if let Err(e) = self.router.handle(Arc::clone(&event)).await {
            metrics::record_handler_failure(event.event_type.as_str());
            tracing::error!(
                error = %e,
                event_type = %event.event_type,
                room_id = %event.room_id,
                event_id = %event.id,
                "Route handler failed"
            );
            return;
        }

        if event.is_room_event() && !event.id.is_empty() {
            if let Err(e) = self.transport.mark_read(&event.room_id, &event.id).await {
                metrics::record_read_receipt_failure();
                tracing::warn!(
                    error = %e,
                    room_id = %event.room_id,
                    event_id = %event.id,
                    "Failed to mark event as read"
                );
            }
        }
    }
}
