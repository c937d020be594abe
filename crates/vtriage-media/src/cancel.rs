//! Cooperative cancellation for analysis runs.
//!
//! Wraps a `tokio::sync::watch` channel carrying `true` once the run should
//! stop. Long-running stages poll [`CancelSignal::check`] at frame
//! boundaries; child processes race against [`CancelSignal::cancelled`].
//! A run derives its own [`CancelSignal::child`] so it can stop its
//! background work without touching the caller's flag.

use std::future::Future;
use std::pin::Pin;
use tokio::sync::watch;

use crate::error::{MediaError, MediaResult};

/// Read side of a cancellation flag. Cheap to clone.
///
/// Fires when any of its channels carries `true`.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    receivers: Vec<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    /// Wrap an existing receiver.
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self {
            receivers: vec![rx],
        }
    }

    /// Create a sender/signal pair. Send `true` to cancel.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    /// A signal that fires when either `self` or the returned sender does.
    pub fn child(&self) -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        let mut receivers = self.receivers.clone();
        receivers.push(rx);
        (tx, Self { receivers })
    }

    pub fn is_cancelled(&self) -> bool {
        self.receivers.iter().any(|rx| *rx.borrow())
    }

    /// Return `Err(MediaError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> MediaResult<()> {
        if self.is_cancelled() {
            Err(MediaError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve when cancellation is requested. Never resolves for
    /// [`CancelSignal::never`] or once every sender is gone without cancelling.
    pub async fn cancelled(&self) {
        wait_any(self.receivers.clone()).await
    }
}

fn wait_any(mut receivers: Vec<watch::Receiver<bool>>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        let Some(last) = receivers.pop() else {
            return std::future::pending().await;
        };

        tokio::select! {
            _ = wait_for(last) => {}
            _ = wait_any(receivers) => {}
        }
    })
}

async fn wait_for(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_never_is_not_cancelled() {
        let signal = CancelSignal::never();
        assert!(!signal.is_cancelled());
        assert!(signal.check().is_ok());
    }

    #[test]
    fn test_check_after_send() {
        let (tx, signal) = CancelSignal::channel();
        assert!(signal.check().is_ok());

        tx.send(true).unwrap();
        assert!(matches!(signal.check(), Err(MediaError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancelled_resolves() {
        let (tx, signal) = CancelSignal::channel();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation should be observed")
            .unwrap();
    }

    #[tokio::test]
    async fn test_child_fires_on_its_own_sender() {
        let (_parent_tx, parent) = CancelSignal::channel();
        let (child_tx, child) = parent.child();

        child_tx.send(true).unwrap();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child cancellation should be observed");
    }

    #[tokio::test]
    async fn test_child_follows_parent() {
        let (parent_tx, parent) = CancelSignal::channel();
        let (_child_tx, child) = parent.child();
        let waiter = {
            let child = child.clone();
            tokio::spawn(async move { child.cancelled().await })
        };

        parent_tx.send(true).unwrap();
        assert!(matches!(child.check(), Err(MediaError::Cancelled)));
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("parent cancellation should reach the child")
            .unwrap();
    }

    #[tokio::test]
    async fn test_never_stays_pending() {
        let signal = CancelSignal::never();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
