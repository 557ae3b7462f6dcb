// ABOUTME: Route bindings (event type -> handler) and the ordered route table
// ABOUTME: Per-type index keeps registration order; lookups never fail

use crate::error::HandlerResult;
use crate::event::{Event, EventType};
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Async handler invoked with each matching event.
pub type RouteHandler = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// Binds one event type to one handler. The type is fixed at construction.
#[derive(Clone)]
pub struct Route {
    event_type: EventType,
    handler: RouteHandler,
}

impl Route {
    pub fn new<F, Fut>(event_type: impl Into<EventType>, handler: F) -> Self
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            event_type: event_type.into(),
            handler: Arc::new(move |evt| Box::pin(handler(evt))),
        }
    }

    pub fn event_type(&self) -> &EventType {
        &self.event_type
    }

    pub async fn call(&self, event: Arc<Event>) -> HandlerResult {
        (self.handler)(event).await
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("event_type", &self.event_type.as_str())
            .finish()
    }
}

/// All routes registered for the bot's lifetime.
///
/// Duplicate registrations for one type are legal and all of them fire.
/// There is no removal.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    by_type: HashMap<EventType, Vec<Route>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) {
        self.by_type
            .entry(route.event_type.clone())
            .or_default()
            .push(route.clone());
        self.routes.push(route);
    }

    /// Routes for `event_type` in registration order; empty when none exist.
    pub fn routes_for(&self, event_type: &EventType) -> &[Route] {
        self.by_type
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
