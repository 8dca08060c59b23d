//! # Visible-Lines Store
//!
//! Keyed map `line id -> LineRoute` of the routes currently drawn on the map.
//! It is mutated only by events from the [`LineSelectionBus`], which it listens
//! to from creation until it is dropped.
//!
//! The renderer contract is full-snapshot replace: on every publish the
//! renderer removes all drawn paths and draws exactly the current map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::line_bus::{LineSelectionBus, LineViewEvent};
use crate::core::store_view::StoreView;
use crate::model::LineRoute;

/// line id -> route
pub type RouteMap = HashMap<String, LineRoute>;

/// Applies one bus event to the map. Returns whether the map changed.
///
/// Every key equals its route's `line_id`.
pub fn reconcile(routes: &mut RouteMap, event: &LineViewEvent) -> bool {
    match event {
        LineViewEvent::Activated(route) => {
            let previous = routes.insert(route.line_id.clone(), route.clone());
            previous.as_ref() != Some(route)
        }
        LineViewEvent::Deactivated(line) => routes.remove(&line.id).is_some(),
    }
}

pub struct VisibleLinesStore {
    routes: Arc<watch::Sender<RouteMap>>,
    cancel: CancellationToken,
    listener: JoinHandle<()>,
}

impl VisibleLinesStore {
    /// Creates the store and registers its bus listener. Must be called inside
    /// a tokio runtime.
    pub fn new(bus: &LineSelectionBus) -> Self {
        let (tx, _) = watch::channel(RouteMap::new());
        let routes = Arc::new(tx);
        let cancel = CancellationToken::new();

        let mut events = bus.subscribe("visible-lines");
        let task_routes = Arc::clone(&routes);
        let task_cancel = cancel.clone();

        let listener = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    event = events.recv() => {
                        let Some(event) = event else {
                            log::debug!("Line selection bus closed, visible-lines listener stops");
                            break;
                        };
                        let changed = task_routes.send_if_modified(|routes| reconcile(routes, &event));
                        if changed {
                            log::debug!("Visible lines changed by event on '{}'", event.line_id());
                        }
                    }
                }
            }
        });

        Self {
            routes,
            cancel,
            listener,
        }
    }

    pub fn view(&self) -> StoreView<RouteMap> {
        StoreView::new(self.routes.subscribe())
    }

    pub fn is_visible(&self, line_id: &str) -> bool {
        self.routes.borrow().contains_key(line_id)
    }

    /// Stops listening to the bus. The last published map stays readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.listener.abort();
    }
}

impl Drop for VisibleLinesStore {
    fn drop(&mut self) {
        self.shutdown();
    }
}
