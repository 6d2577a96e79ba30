use std::future;

use tokio::sync::watch;

/// Owner side of a cancellation scope. Every token handed out observes the
/// same flag; dropping the scope cancels it.
#[derive(Debug)]
pub struct CancelScope {
    tx: watch::Sender<bool>,
}

impl CancelScope {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Clone, Debug)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the owning scope is cancelled (or dropped).
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return future::pending().await;
        };

        let mut rx = rx.clone();
        // An error means the sender is gone, which only happens after the
        // scope's drop already cancelled it.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}
