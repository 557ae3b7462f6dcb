// ABOUTME: Event router that fans one event out to every route bound to its type
// ABOUTME: Handlers run sequentially in registration order; the first failure stops the rest

use crate::error::HandlerResult;
use crate::event::Event;
use crate::route::{Route, RouteTable};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct EventRouter {
    table: RouteTable,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_route(&mut self, route: Route) {
        self.table.add_route(route);
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Dispatch `event` to its routes.
    ///
    /// If handler *k* fails, handlers after it are skipped and its error is
    /// returned. An event with no routes is a no-op.
    pub async fn handle(&self, event: Arc<Event>) -> HandlerResult {
        for route in self.table.routes_for(&event.event_type) {
            route.call(Arc::clone(&event)).await?;
        }
        Ok(())
    }
}
