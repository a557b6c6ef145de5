// Cancellation and timeout guard for remote calls

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use super::error::{HumanizeError, HumanizeResult};

/// Cloneable cancellation flag. Cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    pub fn check(&self) -> HumanizeResult<()> {
        if self.is_cancelled() {
            Err(HumanizeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Run a remote call under a timeout and the caller's cancel token.
/// A zero timeout means no deadline.
pub async fn guard_remote<T, F>(fut: F, timeout: Duration, cancel: &CancelToken) -> HumanizeResult<T>
where
    F: Future<Output = HumanizeResult<T>>,
{
    cancel.check()?;

    if timeout.is_zero() {
        return tokio::select! {
            _ = cancel.cancelled() => Err(HumanizeError::Cancelled),
            res = fut => res,
        };
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(HumanizeError::Cancelled),
        res = tokio::time::timeout(timeout, fut) => match res {
            Ok(inner) => inner,
            Err(_) => Err(HumanizeError::Timeout(timeout)),
        },
    }
}
