//! In-memory catalog used by the store tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::model::{BusInfo, Line, Position};
use crate::retrieve::catalog::{BusDirectory, CatalogError, LineCatalog};

pub(crate) fn line(id: &str) -> Line {
    Line {
        id: id.into(),
        name: format!("Line {id}"),
        color: format!("#{id}"),
    }
}

pub(crate) fn bus_info(id: &str, assignment: &str) -> BusInfo {
    BusInfo {
        id: id.into(),
        assignment: assignment.into(),
        line: None,
    }
}

/// Serves lines, polylines and bus details from memory. A lookup can be held
/// back with [`FakeCatalog::gate`] until the returned sender fires; dropping the
/// sender makes the lookup fail.
#[derive(Default)]
pub(crate) struct FakeCatalog {
    lines: Vec<Line>,
    polylines: HashMap<String, Vec<Position>>,
    buses: HashMap<String, BusInfo>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    calls: AtomicUsize,
}

impl FakeCatalog {
    pub(crate) fn with_line(mut self, line: Line, polyline: Vec<Position>) -> Self {
        self.polylines.insert(line.id.clone(), polyline);
        self.lines.push(line);
        self
    }

    pub(crate) fn with_bus(mut self, info: BusInfo) -> Self {
        self.buses.insert(info.id.clone(), info);
        self
    }

    /// Holds back the next lookup of `key` (`line:{id}` or `bus:{id}`).
    pub(crate) fn gate(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pass_gate(&self, key: String) -> Result<(), CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gates.lock().unwrap().remove(&key);
        match gate {
            Some(gate) => gate.await.map_err(|_| CatalogError::Status {
                path: key,
                status: 503,
                body: "gate dropped".into(),
            }),
            None => Ok(()),
        }
    }

    fn not_found(path: String) -> CatalogError {
        CatalogError::Status {
            path,
            status: 404,
            body: String::new(),
        }
    }
}

impl LineCatalog for FakeCatalog {
    async fn lines(&self) -> Result<Vec<Line>, CatalogError> {
        self.pass_gate("lines".into()).await?;
        Ok(self.lines.clone())
    }

    async fn line(&self, line_id: &str) -> Result<Line, CatalogError> {
        self.lines
            .iter()
            .find(|line| line.id == line_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("api/lines/{line_id}")))
    }

    async fn line_polyline(&self, line_id: &str) -> Result<Vec<Position>, CatalogError> {
        self.pass_gate(format!("line:{line_id}")).await?;
        self.polylines
            .get(line_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("api/lines/{line_id}/route")))
    }
}

impl BusDirectory for FakeCatalog {
    async fn bus_info(&self, bus_id: &str) -> Result<BusInfo, CatalogError> {
        self.pass_gate(format!("bus:{bus_id}")).await?;
        self.buses
            .get(bus_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("api/buses/{bus_id}/info")))
    }

    async fn bus_route(&self, bus_id: &str) -> Result<Vec<Position>, CatalogError> {
        Ok(self.buses.get(bus_id).map(|_| Vec::new()).unwrap_or_default())
    }
}
