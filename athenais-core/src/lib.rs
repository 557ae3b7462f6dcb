// ABOUTME: Transport-agnostic bot core: events, routes, plugins, room reconciliation, lifecycle
// ABOUTME: Concrete chat transports implement the Transport trait and feed events through it

pub mod bot;
pub mod error;
pub mod event;
pub mod metrics;
pub mod plugin;
pub mod reconcile;
pub mod route;
pub mod router;
pub mod store;
pub mod testing;
pub mod transport;

pub use bot::{Bot, BotHandle, BotState};
pub use error::{BotError, DuplicatePluginError, HandlerError, HandlerResult, ReconcileError};
pub use event::{Event, EventType, MessageContent, MessageKind};
pub use plugin::{Plugin, PluginRegistry};
pub use reconcile::{reconcile, ReconcileReport};
pub use route::{Route, RouteTable};
pub use router::EventRouter;
pub use store::{MemorySyncStore, SqliteSyncStore, StorageBackend, SyncStore};
pub use transport::{EventCallback, RoomSet, Transport};
