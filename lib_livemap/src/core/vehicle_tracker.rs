//! # Vehicle Tracking Store
//!
//! Reconciles the location feed into one marker per vehicle.
//!
//! ## Logic:
//! 1.  Each [`VehicleLocation`] is an **upsert by id**: an unknown id creates a
//!     marker, a known id overwrites position, stop and departure in place.
//! 2.  Status is derived on every upsert: a stop id means `waiting`, no stop id
//!     means `driving`.
//! 3.  Last write wins per id. Ordering is the feed's ordering; nothing here
//!     reorders late messages.
//! 4.  Markers are kept for every vehicle ever seen, unless a marker TTL is
//!     configured, in which case markers that stopped reporting are pruned.
//!
//! Decode failures from the feed are logged and skipped; they never stop the
//! tracker.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::core::store_view::StoreView;
use crate::ingestors::location_feed::FeedSubscription;
use crate::model::{MarkerMap, VehicleLocation, VehicleMarker};

/// Configuration for the [`VehicleTracker`].
#[derive(Debug, Clone, Default)]
pub struct TrackerConfig {
    /// Drop markers that have not been updated for this long. `None` keeps
    /// every marker for the lifetime of the tracker.
    pub marker_ttl: Option<Duration>,
}

pub struct VehicleTracker {
    markers: Arc<watch::Sender<MarkerMap>>,
    config: TrackerConfig,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl VehicleTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let (tx, _) = watch::channel(MarkerMap::new());
        Self {
            markers: Arc::new(tx),
            config,
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn view(&self) -> StoreView<MarkerMap> {
        StoreView::new(self.markers.subscribe())
    }

    /// Upserts one location. Returns `true` when a new marker was created.
    pub fn apply(&self, location: VehicleLocation) -> bool {
        upsert(&self.markers, location, Instant::now())
    }

    /// Removes markers older than the configured TTL. Returns how many went.
    pub fn prune_stale(&self) -> usize {
        match self.config.marker_ttl {
            Some(ttl) => prune(&self.markers, ttl, Instant::now()),
            None => 0,
        }
    }

    /// # Attach
    ///
    /// Starts consuming `subscription` on a background task. Attaching again
    /// replaces the previous subscription.
    ///
    /// The task ends when the feed closes the subscription or the tracker is
    /// shut down.
    pub fn attach(&self, mut subscription: FeedSubscription) {
        let markers = Arc::clone(&self.markers);
        let cancel = self.cancel.clone();
        let ttl = self.config.marker_ttl.filter(|ttl| !ttl.is_zero());

        let task = tokio::spawn(async move {
            // Only polled when a TTL is configured.
            let mut prune_tick = tokio::time::interval(ttl.unwrap_or(Duration::from_secs(60)));

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = prune_tick.tick(), if ttl.is_some() => {
                        if let Some(ttl) = ttl {
                            let removed = prune(&markers, ttl, Instant::now());
                            if removed > 0 {
                                log::info!("Pruned {} stale vehicle marker(s)", removed);
                            }
                        }
                    }
                    event = subscription.recv() => {
                        let Some(event) = event else {
                            log::info!("Location feed closed, vehicle tracker stops");
                            break;
                        };
                        match event.as_ref() {
                            Ok(location) => {
                                if upsert(&markers, location.clone(), Instant::now()) {
                                    log::debug!("New vehicle marker '{}'", location.id);
                                }
                            }
                            Err(e) => log::warn!("Skipping feed message: {}", e),
                        }
                    }
                }
            }
        });

        let previous = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stops the feed consumer. The last published markers stay readable.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

impl Drop for VehicleTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn upsert(markers: &watch::Sender<MarkerMap>, location: VehicleLocation, now: Instant) -> bool {
    let mut created = false;
    markers.send_modify(|map| match map.get_mut(&location.id) {
        Some(marker) => marker.update(location, now),
        None => {
            created = true;
            map.insert(location.id.clone(), VehicleMarker::new(location, now));
        }
    });
    created
}

fn prune(markers: &watch::Sender<MarkerMap>, ttl: Duration, now: Instant) -> usize {
    let mut removed = 0;
    markers.send_if_modified(|map| {
        let before = map.len();
        map.retain(|_, marker| now.saturating_duration_since(marker.last_seen) < ttl);
        removed = before - map.len();
        removed > 0
    });
    removed
}
