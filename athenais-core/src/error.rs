// ABOUTME: Error taxonomy for routing, reconciliation, plugin registration and the bot run
// ABOUTME: Startup-fatal, run-fatal and per-event errors are distinct types

use thiserror::Error;

/// Boxed error used where a collaborator's `anyhow::Error` must sit in a
/// `#[source]` chain.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure returned by a single route handler. Recoverable per event.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Room membership could not be aligned with the desired set.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to query joined rooms")]
    JoinedRooms(#[source] BoxError),
    #[error("failed to join room {room_id}")]
    Join {
        room_id: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to leave room {room_id}")]
    Leave {
        room_id: String,
        #[source]
        source: BoxError,
    },
}

/// Two plugins were registered under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("plugin already registered: {name}")]
pub struct DuplicatePluginError {
    pub name: String,
}

/// Terminal result of a bot run.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("room reconciliation failed")]
    Reconcile(#[from] ReconcileError),
    #[error("sync stream failed")]
    Sync(#[source] BoxError),
    #[error("sync task aborted")]
    SyncTask(#[from] tokio::task::JoinError),
    #[error("bot run cancelled")]
    Cancelled,
}
