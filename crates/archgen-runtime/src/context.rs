//! Shared cancellation.
//!
//! One [`CancelSignal`] belongs to a container; every supervised task gets a
//! [`Context`] subscribed to it. Cancelling is one-way and fans out to all
//! contexts.

use std::sync::Arc;

use tokio::sync::watch;

/// The sending half, owned by the container.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        CancelSignal { tx: Arc::new(tx) }
    }

    /// Cancels every context. Returns `true` the first time.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn context(&self) -> Context {
        Context {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        CancelSignal::new()
    }
}

/// A task's view of the shared cancellation.
#[derive(Debug, Clone)]
pub struct Context {
    rx: watch::Receiver<bool>,
}

impl Context {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Signal dropped without cancelling.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_reaches_every_context() {
        let signal = CancelSignal::new();
        let a = signal.context();
        let b = signal.context();
        assert!(!a.is_cancelled());

        let waiter = tokio::spawn(async move { b.cancelled().await });
        assert!(signal.cancel());
        assert!(!signal.cancel());

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(a.is_cancelled());
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn context_taken_after_cancel_is_cancelled() {
        let signal = CancelSignal::new();
        signal.cancel();
        let ctx = signal.context();
        assert!(ctx.is_cancelled());
        tokio::time::timeout(Duration::from_millis(100), ctx.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_signal_never_cancels() {
        let ctx = CancelSignal::new().context();
        let res = tokio::time::timeout(Duration::from_millis(50), ctx.cancelled()).await;
        assert!(res.is_err());
    }
}
