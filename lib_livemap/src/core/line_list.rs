//! # Line List Store
//!
//! Holds the catalog's line list and decides which lines the user wants drawn.
//! It never touches the visible-lines map directly; it talks to it through the
//! [`LineSelectionBus`].
//!
//! ## Logic:
//! 1.  `view_line` marks the line as requested with a fresh request token,
//!     fetches its route and publishes `Activated` once it arrives.
//! 2.  `remove_line` forgets the request, aborts its fetch and publishes
//!     `Deactivated`.
//! 3.  A route that arrives after its request was withdrawn or replaced is
//!     discarded, so a line hidden during its fetch stays hidden.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::line_bus::LineSelectionBus;
use crate::core::store_view::StoreView;
use crate::model::Line;
use crate::retrieve::catalog::{CatalogError, LineCatalog};

/// An outstanding "show this line" request.
struct Request {
    token: u64,
    fetch: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Requests {
    next_token: u64,
    by_line: HashMap<String, Request>,
}

pub struct LineListStore<C: LineCatalog> {
    catalog: Arc<C>,
    bus: LineSelectionBus,
    lines: watch::Sender<Vec<Line>>,
    requests: Arc<Mutex<Requests>>,
}

impl<C: LineCatalog> LineListStore<C> {
    pub fn new(catalog: Arc<C>, bus: LineSelectionBus) -> Self {
        let (lines, _) = watch::channel(Vec::new());
        Self {
            catalog,
            bus,
            lines,
            requests: Arc::new(Mutex::new(Requests::default())),
        }
    }

    /// The catalog's line list as of the last successful `load_lines`.
    pub fn view(&self) -> StoreView<Vec<Line>> {
        StoreView::new(self.lines.subscribe())
    }

    /// # Load Lines
    ///
    /// Replaces the line list with the catalog's. On failure the previous list
    /// stays.
    pub async fn load_lines(&self) -> Result<usize, CatalogError> {
        match self.catalog.lines().await {
            Ok(lines) => {
                let count = lines.len();
                self.lines.send_replace(lines);
                log::info!("Loaded {} line(s) from the catalog", count);
                Ok(count)
            }
            Err(e) => {
                log::warn!("Failed to load lines: {}", e);
                Err(e)
            }
        }
    }

    /// Whether `line_id` is requested, whether or not its route arrived yet.
    pub fn is_requested(&self, line_id: &str) -> bool {
        self.lock_requests().by_line.contains_key(line_id)
    }

    pub fn requested_lines(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock_requests().by_line.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// # View Line
    ///
    /// Requests `line` to be drawn. The route is fetched in the background and
    /// published on the bus when it arrives. Requesting a line again replaces
    /// the previous request. Must be called inside a tokio runtime.
    pub fn view_line(&self, line: &Line) {
        let mut requests = self.lock_requests();
        requests.next_token += 1;
        let token = requests.next_token;

        let catalog = Arc::clone(&self.catalog);
        let bus = self.bus.clone();
        let shared = Arc::clone(&self.requests);
        let line_id = line.id.clone();

        let fetch = tokio::spawn(async move {
            let result = catalog.line_route(&line_id).await;

            let mut requests = shared.lock().unwrap_or_else(PoisonError::into_inner);
            let current = requests.by_line.get(&line_id).map(|request| request.token);
            if current != Some(token) {
                log::debug!("Route for line '{}' arrived after it was hidden, discarded", line_id);
                return;
            }

            match result {
                Ok(route) => {
                    if let Some(request) = requests.by_line.get_mut(&line_id) {
                        request.fetch = None;
                    }
                    bus.activate_line(route);
                }
                Err(e) => {
                    log::warn!("Route lookup for line '{}' failed: {}", line_id, e);
                    requests.by_line.remove(&line_id);
                }
            }
        });

        let previous = requests.by_line.insert(
            line.id.clone(),
            Request {
                token,
                fetch: Some(fetch),
            },
        );
        drop(requests);

        if let Some(fetch) = previous.and_then(|request| request.fetch) {
            fetch.abort();
        }
    }

    /// # Remove Line
    ///
    /// Withdraws the request for `line` and tells the bus to stop drawing it.
    pub fn remove_line(&self, line: &Line) {
        let previous = self.lock_requests().by_line.remove(&line.id);
        if let Some(fetch) = previous.and_then(|request| request.fetch) {
            fetch.abort();
        }
        self.bus.deactivate_line(line.clone());
    }

    /// Flips `line` between requested and removed. Returns `true` when the
    /// line is now requested.
    pub fn toggle(&self, line: &Line) -> bool {
        if self.is_requested(&line.id) {
            self.remove_line(line);
            false
        } else {
            self.view_line(line);
            true
        }
    }

    /// Aborts every route fetch still in flight.
    pub fn shutdown(&self) {
        let mut requests = self.lock_requests();
        for request in requests.by_line.values_mut() {
            if let Some(fetch) = request.fetch.take() {
                fetch.abort();
            }
        }
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: LineCatalog> Drop for LineListStore<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
