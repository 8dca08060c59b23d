//! # Selection Enrichment Store
//!
//! Resolves the detail record of the vehicle the user selected on the map.
//!
//! ## Logic:
//! 1.  `select_vehicle(id)` bumps the **generation** and aborts the previous
//!     in-flight lookup, then starts a lookup tagged with the new generation.
//! 2.  A resolved lookup is applied only while its generation is still the
//!     current one. Checking and publishing happen under the same lock as the
//!     bump, so a superseded result can never overwrite a newer selection.
//! 3.  Only non-empty details are published. An empty detail (blank id) or a
//!     failed lookup leaves the view on whatever it showed before.
//!
//! The view starts at `None` ("no detail yet").

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::core::store_view::StoreView;
use crate::model::BusInfo;
use crate::retrieve::catalog::{BusDirectory, CatalogError};

#[derive(Debug, Default)]
struct Selection {
    generation: u64,
    bus_id: Option<String>,
}

pub struct SelectionStore<D: BusDirectory> {
    directory: Arc<D>,
    detail: Arc<watch::Sender<Option<BusInfo>>>,
    selection: Arc<Mutex<Selection>>,
    in_flight: Mutex<Option<JoinHandle<()>>>,
}

impl<D: BusDirectory> SelectionStore<D> {
    pub fn new(directory: Arc<D>) -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            directory,
            detail: Arc::new(tx),
            selection: Arc::new(Mutex::new(Selection::default())),
            in_flight: Mutex::new(None),
        }
    }

    /// The most recently resolved, non-empty detail.
    pub fn view(&self) -> StoreView<Option<BusInfo>> {
        StoreView::new(self.detail.subscribe())
    }

    /// Id of the vehicle currently selected, resolved or not.
    pub fn selected(&self) -> Option<String> {
        self.lock_selection().bus_id.clone()
    }

    pub fn generation(&self) -> u64 {
        self.lock_selection().generation
    }

    /// # Select Vehicle
    ///
    /// Makes `bus_id` the current selection and looks up its detail. Returns
    /// the generation of this selection. Must be called inside a tokio runtime.
    pub fn select_vehicle(&self, bus_id: &str) -> u64 {
        let generation = {
            let mut selection = self.lock_selection();
            selection.generation += 1;
            selection.bus_id = Some(bus_id.to_string());
            selection.generation
        };
        log::debug!("Vehicle '{}' selected (generation {})", bus_id, generation);

        let directory = Arc::clone(&self.directory);
        let detail = Arc::clone(&self.detail);
        let selection = Arc::clone(&self.selection);
        let bus_id = bus_id.to_string();

        let task = tokio::spawn(async move {
            let result = directory.bus_info(&bus_id).await;
            apply_detail(&selection, &detail, generation, &bus_id, result);
        });

        self.replace_in_flight(Some(task));
        generation
    }

    /// Drops the selection and invalidates any lookup still in flight. The
    /// view goes back to `None`.
    pub fn clear(&self) {
        {
            let mut selection = self.lock_selection();
            selection.generation += 1;
            selection.bus_id = None;
            self.detail.send_replace(None);
        }
        self.replace_in_flight(None);
    }

    /// Aborts the in-flight lookup, if any. The last detail stays readable.
    pub fn shutdown(&self) {
        self.replace_in_flight(None);
    }

    fn lock_selection(&self) -> std::sync::MutexGuard<'_, Selection> {
        self.selection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace_in_flight(&self, task: Option<JoinHandle<()>>) {
        let previous = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *in_flight, task)
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl<D: BusDirectory> Drop for SelectionStore<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Publishes a lookup result if it still belongs to the current selection.
/// Returns whether the view was updated.
fn apply_detail(
    selection: &Mutex<Selection>,
    detail: &watch::Sender<Option<BusInfo>>,
    generation: u64,
    bus_id: &str,
    result: Result<BusInfo, CatalogError>,
) -> bool {
    let current = selection.lock().unwrap_or_else(PoisonError::into_inner);
    if current.generation != generation {
        log::debug!(
            "Discarding detail for '{}': generation {} superseded by {}",
            bus_id,
            generation,
            current.generation
        );
        return false;
    }

    match result {
        Ok(info) if info.is_empty() => {
            log::debug!("Detail for '{}' is empty, keeping the previous one", bus_id);
            false
        }
        Ok(info) => {
            detail.send_replace(Some(info));
            true
        }
        Err(e) => {
            log::warn!("Detail lookup for '{}' failed: {}", bus_id, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::{bus_info, FakeCatalog};
    use std::time::Duration;

    #[tokio::test]
    async fn test_select_publishes_resolved_detail() {
        let catalog = Arc::new(FakeCatalog::default().with_bus(bus_info("bus1", "Tour 1")));
        let store = SelectionStore::new(Arc::clone(&catalog));
        let mut view = store.view();
        assert!(view.borrow().is_none());

        store.select_vehicle("bus1");

        assert!(view.wait_until(|detail| detail.is_some()).await);
        assert_eq!(view.borrow().as_ref().unwrap().assignment, "Tour 1");
        assert_eq!(store.selected().as_deref(), Some("bus1"));
        assert_eq!(catalog.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reselect_before_first_resolves_ends_on_second() {
        let catalog = Arc::new(
            FakeCatalog::default()
                .with_bus(bus_info("bus1", "Tour 1"))
                .with_bus(bus_info("bus2", "Tour 2")),
        );
        let gate_first = catalog.gate("bus:bus1");
        let gate_second = catalog.gate("bus:bus2");
        let store = SelectionStore::new(Arc::clone(&catalog));
        let mut view = store.view();

        store.select_vehicle("bus1");
        tokio::task::yield_now().await;
        store.select_vehicle("bus2");

        // Second resolves first, then the first one tries to come in late.
        let _ = gate_second.send(());
        assert!(view.wait_until(|detail| detail.is_some()).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The superseded lookup was aborted, its gate is gone.
        assert!(gate_first.send(()).is_err());
        assert_eq!(view.borrow().as_ref().unwrap().id, "bus2");
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let (tx, _) = watch::channel(None);
        let selection = Mutex::new(Selection {
            generation: 2,
            bus_id: Some("bus2".into()),
        });

        assert!(!apply_detail(&selection, &tx, 1, "bus1", Ok(bus_info("bus1", "Tour 1"))));
        assert!(tx.borrow().is_none());

        assert!(apply_detail(&selection, &tx, 2, "bus2", Ok(bus_info("bus2", "Tour 2"))));
        assert_eq!(tx.borrow().as_ref().unwrap().id, "bus2");
    }

    #[test]
    fn test_empty_and_failed_results_leave_view_unchanged() {
        let (tx, _) = watch::channel(Some(bus_info("bus1", "Tour 1")));
        let selection = Mutex::new(Selection {
            generation: 5,
            bus_id: Some("bus3".into()),
        });

        assert!(!apply_detail(&selection, &tx, 5, "bus3", Ok(bus_info("", ""))));
        assert!(!apply_detail(
            &selection,
            &tx,
            5,
            "bus3",
            Err(CatalogError::Empty {
                path: "api/buses/bus3/info".into()
            })
        ));
        assert_eq!(tx.borrow().as_ref().unwrap().id, "bus1");
    }

    #[tokio::test]
    async fn test_failed_lookup_keeps_previous_detail() {
        let catalog = Arc::new(FakeCatalog::default().with_bus(bus_info("bus1", "Tour 1")));
        let store = SelectionStore::new(Arc::clone(&catalog));
        let mut view = store.view();

        store.select_vehicle("bus1");
        assert!(view.wait_until(|detail| detail.is_some()).await);

        // Unknown to the directory.
        store.select_vehicle("ghost");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(view.borrow().as_ref().unwrap().id, "bus1");
        assert_eq!(store.selected().as_deref(), Some("ghost"));
    }

    #[tokio::test]
    async fn test_clear_resets_view_and_invalidates_lookup() {
        let catalog = Arc::new(FakeCatalog::default().with_bus(bus_info("bus1", "Tour 1")));
        let gate = catalog.gate("bus:bus1");
        let store = SelectionStore::new(Arc::clone(&catalog));

        let first = store.select_vehicle("bus1");
        store.clear();
        let _ = gate.send(());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(store.view().borrow().is_none());
        assert!(store.selected().is_none());
        assert!(store.generation() > first);
    }
}
