//! Per-run cancellation token.
//!
//! One token is created per run. The orchestrator polls it at the top of each
//! page iteration and races it against the backend request so the in-flight
//! HTTP call is dropped as soon as the user cancels.

use tokio::sync::watch;

/// Cloneable cancellation flag backed by a watch channel.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any token clone, so this cannot fail
        // while `self` is alive.
        let _ = rx.wait_for(|c| *c).await;
    }
}
