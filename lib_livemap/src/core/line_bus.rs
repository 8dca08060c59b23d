//! # Line Selection Bus
//!
//! In-process pub/sub between the line list (which decides what the user wants
//! to see) and the visible-lines store (which holds what is drawn). Neither side
//! holds a reference to the other; both only hold a clone of the bus.

use std::sync::Arc;

use crate::core::dispatcher::{Dispatcher, Subscription};
use crate::model::{Line, LineRoute};

/// Message kinds carried by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum LineViewEvent {
    /// A line's route should become visible.
    Activated(LineRoute),
    /// A line should no longer be drawn.
    Deactivated(Line),
}

impl LineViewEvent {
    /// The line this event is about.
    pub fn line_id(&self) -> &str {
        match self {
            LineViewEvent::Activated(route) => &route.line_id,
            LineViewEvent::Deactivated(line) => &line.id,
        }
    }
}

pub type BusSubscription = Subscription<LineViewEvent>;

/// # Line Selection Bus
///
/// Cloneable handle over a shared [`Dispatcher`]. Publishing never blocks and a
/// publish without listeners is dropped.
#[derive(Clone, Default)]
pub struct LineSelectionBus {
    dispatcher: Arc<Dispatcher<LineViewEvent>>,
}

impl LineSelectionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, label: &str) -> BusSubscription {
        self.dispatcher.subscribe(label)
    }

    /// Publishes `event` to every current listener and returns how many got it.
    pub fn publish(&self, event: LineViewEvent) -> usize {
        let line_id = event.line_id().to_string();
        let delivered = self.dispatcher.broadcast(event);
        if delivered == 0 {
            log::debug!("No listener for line event on '{}', dropped", line_id);
        }
        delivered
    }

    pub fn activate_line(&self, route: LineRoute) -> usize {
        self.publish(LineViewEvent::Activated(route))
    }

    pub fn deactivate_line(&self, line: Line) -> usize {
        self.publish(LineViewEvent::Deactivated(line))
    }

    pub fn listener_count(&self) -> usize {
        self.dispatcher.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;

    fn line(id: &str) -> Line {
        Line {
            id: id.into(),
            name: format!("Line {id}"),
            color: "#00f".into(),
        }
    }

    #[test]
    fn test_listeners_see_both_kinds_in_publish_order() {
        let bus = LineSelectionBus::new();
        let mut listener = bus.subscribe("listener");

        let route = LineRoute::join(&line("L1"), vec![Position::new(0.0, 0.0)]);
        assert_eq!(bus.activate_line(route.clone()), 1);
        assert_eq!(bus.deactivate_line(line("L1")), 1);

        assert_eq!(*listener.try_recv().unwrap(), LineViewEvent::Activated(route));
        assert_eq!(*listener.try_recv().unwrap(), LineViewEvent::Deactivated(line("L1")));
        assert!(listener.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_listener_is_not_buffered() {
        let bus = LineSelectionBus::new();
        assert_eq!(bus.deactivate_line(line("L2")), 0);

        let mut listener = bus.subscribe("late");
        assert!(listener.try_recv().is_none());
    }

    #[test]
    fn test_clones_share_listeners() {
        let bus = LineSelectionBus::new();
        let publisher = bus.clone();
        let mut listener = bus.subscribe("listener");

        publisher.deactivate_line(line("L3"));
        assert_eq!(listener.try_recv().unwrap().line_id(), "L3");
    }
}
