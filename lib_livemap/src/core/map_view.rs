//! # Map View
//!
//! The renderer-facing surface. Owns every store, wires them to one line
//! selection bus and hands out read-only views plus the few user actions the
//! map supports.
//!
//! ```text
//! ConnectionManager ──► VehicleTracker ──────────► markers()
//! LineListStore ──► LineSelectionBus ──► VisibleLinesStore ──► visible_routes()
//! select_vehicle() ──► SelectionStore ──────────► current_bus()
//! ```

use std::sync::Arc;

use crate::core::line_bus::LineSelectionBus;
use crate::core::line_list::LineListStore;
use crate::core::selection::SelectionStore;
use crate::core::store_view::StoreView;
use crate::core::vehicle_tracker::{TrackerConfig, VehicleTracker};
use crate::core::visible_lines::{RouteMap, VisibleLinesStore};
use crate::ingestors::location_feed::{ConnectionManager, FeedError, FeedSubscription};
use crate::ingestors::transport::FeedTransport;
use crate::model::{BusInfo, Line, MarkerMap};
use crate::retrieve::catalog::{BusDirectory, CatalogError, LineCatalog};

pub struct MapView<S: LineCatalog + BusDirectory> {
    bus: LineSelectionBus,
    tracker: VehicleTracker,
    visible: VisibleLinesStore,
    selection: SelectionStore<S>,
    line_list: LineListStore<S>,
}

impl<S: LineCatalog + BusDirectory> MapView<S> {
    /// Builds every store. The visible-lines store registers on the bus here,
    /// before anything can publish. Must be called inside a tokio runtime.
    pub fn new(catalog: Arc<S>, tracker_config: TrackerConfig) -> Self {
        let bus = LineSelectionBus::new();
        let visible = VisibleLinesStore::new(&bus);
        let line_list = LineListStore::new(Arc::clone(&catalog), bus.clone());
        let selection = SelectionStore::new(catalog);

        Self {
            bus,
            tracker: VehicleTracker::new(tracker_config),
            visible,
            selection,
            line_list,
        }
    }

    /// Feeds the vehicle tracker from `subscription`.
    pub fn attach_feed(&self, subscription: FeedSubscription) {
        self.tracker.attach(subscription);
    }

    /// Subscribes to `manager`'s feed and attaches it.
    pub fn connect<T: FeedTransport>(&self, manager: &ConnectionManager<T>) -> Result<(), FeedError> {
        self.attach_feed(manager.connect()?);
        Ok(())
    }

    // --- Read-only views ---

    pub fn markers(&self) -> StoreView<MarkerMap> {
        self.tracker.view()
    }

    pub fn visible_routes(&self) -> StoreView<RouteMap> {
        self.visible.view()
    }

    pub fn current_bus(&self) -> StoreView<Option<BusInfo>> {
        self.selection.view()
    }

    pub fn lines(&self) -> StoreView<Vec<Line>> {
        self.line_list.view()
    }

    pub fn selected_vehicle(&self) -> Option<String> {
        self.selection.selected()
    }

    pub fn line_bus(&self) -> &LineSelectionBus {
        &self.bus
    }

    // --- User actions ---

    /// The selection changed to vehicle `bus_id`.
    pub fn select_vehicle(&self, bus_id: &str) -> u64 {
        self.selection.select_vehicle(bus_id)
    }

    pub fn clear_selection(&self) {
        self.selection.clear();
    }

    pub fn activate_line(&self, line: &Line) {
        self.line_list.view_line(line);
    }

    pub fn deactivate_line(&self, line: &Line) {
        self.line_list.remove_line(line);
    }

    /// Returns `true` when the line is now shown (or on its way).
    pub fn toggle_line(&self, line: &Line) -> bool {
        self.line_list.toggle(line)
    }

    pub async fn load_lines(&self) -> Result<usize, CatalogError> {
        self.line_list.load_lines().await
    }

    /// Stops every background task. Views keep their last state.
    pub fn shutdown(&self) {
        self.tracker.shutdown();
        self.line_list.shutdown();
        self.selection.shutdown();
        self.visible.shutdown();
        log::info!("Map view shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatcher::Dispatcher;
    use crate::core::test_support::{bus_info, line, FakeCatalog};
    use crate::ingestors::location_feed::FeedEvent;
    use crate::model::{Position, VehicleLocation, VehicleStatus};

    fn catalog() -> Arc<FakeCatalog> {
        Arc::new(
            FakeCatalog::default()
                .with_line(line("L1"), vec![Position::new(0.0, 0.0)])
                .with_line(line("L2"), vec![Position::new(1.0, 1.0)])
                .with_bus(bus_info("bus1", "Tour 1")),
        )
    }

    #[tokio::test]
    async fn test_line_actions_reach_visible_routes() {
        let view = MapView::new(catalog(), TrackerConfig::default());
        let mut routes = view.visible_routes();

        view.activate_line(&line("L1"));
        view.activate_line(&line("L2"));
        assert!(routes.wait_until(|map| map.len() == 2).await);

        view.deactivate_line(&line("L1"));
        assert!(routes.wait_until(|map| map.len() == 1).await);
        assert!(routes.borrow().contains_key("L2"));

        assert!(!view.toggle_line(&line("L2")));
        assert!(routes.wait_until(|map| map.is_empty()).await);
    }

    #[tokio::test]
    async fn test_feed_and_selection_views() {
        let view = MapView::new(catalog(), TrackerConfig::default());
        let feed = Dispatcher::<FeedEvent>::new();
        view.attach_feed(feed.subscribe("map"));

        feed.broadcast(Ok(VehicleLocation {
            id: "bus1".into(),
            position: Position::new(49.8, 9.9),
            stop_id: Some("S1".into()),
            departure: None,
        }));
        let mut markers = view.markers();
        assert!(markers.wait_until(|map| map.contains_key("bus1")).await);
        assert_eq!(markers.borrow()["bus1"].status, VehicleStatus::Waiting);

        view.select_vehicle("bus1");
        let mut detail = view.current_bus();
        assert!(detail.wait_until(|info| info.is_some()).await);
        assert_eq!(view.selected_vehicle().as_deref(), Some("bus1"));

        view.clear_selection();
        assert!(detail.borrow().is_none());
    }

    #[tokio::test]
    async fn test_load_lines_and_shutdown() {
        let view = MapView::new(catalog(), TrackerConfig::default());
        assert_eq!(view.load_lines().await.unwrap(), 2);
        assert_eq!(view.lines().borrow().len(), 2);
        assert_eq!(view.line_bus().listener_count(), 1);

        view.shutdown();
        tokio::task::yield_now().await;
        view.line_bus().deactivate_line(line("L1"));
        assert_eq!(view.line_bus().listener_count(), 0);
    }
}
