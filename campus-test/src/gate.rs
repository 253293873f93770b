use std::sync::Arc;

use tokio::sync::watch;

/// One-way latch holding fake replies back until a test opens it.
///
/// A gate that is never opened models a service that never answers.
#[derive(Clone)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Gate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { open: Arc::new(tx) }
    }

    pub fn open(&self) {
        self.open.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.open.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.open.subscribe();
        // The sender lives in `self`, so this only ends once opened.
        let _ = rx.wait_for(|open| *open).await;
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
