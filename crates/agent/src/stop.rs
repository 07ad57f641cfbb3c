use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::error::PlanError;

/// Cooperative cancellation flag shared between an intention and the
/// plans and sub-intentions it runs.
///
/// Stopping a token stops every child derived from it.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<StopToken>>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is stopped together with this one.
    pub fn child(&self) -> StopToken {
        let child = StopToken::new();
        let mut children = self.inner.children.lock();
        if self.is_stopped() {
            child.stop();
        } else {
            children.retain(|c| !c.is_stopped());
            children.push(child.clone());
        }
        child
    }

    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.notify.notify_waiters();
        let children = std::mem::take(&mut *self.inner.children.lock());
        for child in children {
            child.stop();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Checkpoint: fail with [`PlanError::Stopped`] once stopped.
    pub fn check(&self) -> Result<(), PlanError> {
        if self.is_stopped() {
            Err(PlanError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Resolves once the token is stopped.
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stopped() {
                return;
            }
            notified.await;
        }
    }

    /// Sleep that wakes early with [`PlanError::Stopped`].
    pub async fn sleep(&self, duration: Duration) -> Result<(), PlanError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.check(),
            _ = self.stopped() => Err(PlanError::Stopped),
        }
    }
}
