//! Read-only reactive view over a store's state.

use tokio::sync::watch;

/// # Store View
///
/// Handed out by every store to its renderer. The store keeps the only
/// `watch::Sender`, so a view can read and await changes but never mutate.
/// Views are cheap to clone; each clone tracks "seen" separately.
#[derive(Debug, Clone)]
pub struct StoreView<T> {
    receiver: watch::Receiver<T>,
}

impl<T> StoreView<T> {
    pub(crate) fn new(receiver: watch::Receiver<T>) -> Self {
        Self { receiver }
    }

    /// Borrows the current state. Keep the guard short, the store cannot
    /// publish while it is held.
    pub fn borrow(&self) -> watch::Ref<'_, T> {
        self.receiver.borrow()
    }

    /// Borrows the current state and marks it as seen.
    pub fn borrow_and_update(&mut self) -> watch::Ref<'_, T> {
        self.receiver.borrow_and_update()
    }

    /// True when the store published since this view last looked.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Waits for the next publish. Returns `false` once the store is gone.
    pub async fn changed(&mut self) -> bool {
        self.receiver.changed().await.is_ok()
    }

    /// Waits until the state satisfies `predicate` (checked immediately first).
    /// Returns `false` if the store went away before that happened.
    pub async fn wait_until(&mut self, predicate: impl FnMut(&T) -> bool) -> bool {
        self.receiver.wait_for(predicate).await.is_ok()
    }
}

impl<T: Clone> StoreView<T> {
    /// Clones out the current state.
    pub fn snapshot(&self) -> T {
        self.receiver.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_view_follows_store_updates() {
        let (tx, rx) = watch::channel(0u32);
        let mut view = StoreView::new(rx);
        assert!(!view.has_changed());

        tx.send_replace(3);
        assert!(view.has_changed());
        assert!(view.changed().await);
        assert_eq!(view.snapshot(), 3);
        assert!(!view.has_changed());
    }

    #[tokio::test]
    async fn test_view_reports_store_gone() {
        let (tx, rx) = watch::channel(0u32);
        let mut view = StoreView::new(rx);
        drop(tx);
        assert!(!view.changed().await);
        assert!(!view.wait_until(|value| *value == 1).await);
    }
}
