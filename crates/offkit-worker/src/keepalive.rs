//! Keep-alive accounting for in-flight handler work.
//!
//! The host may only consider the worker terminable once every asynchronous
//! chain started by a handler has resolved. Each handler holds an
//! [`ExtendGuard`] for the duration of its work; the host awaits
//! [`KeepAlive::wait_idle`] before tearing the worker down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    pending: AtomicUsize,
    notify: Notify,
}

/// Counter of in-flight handler extensions.
#[derive(Debug, Clone, Default)]
pub struct KeepAlive {
    inner: Arc<Inner>,
}

impl KeepAlive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit of in-flight work. The worker stays alive until the
    /// returned guard is dropped.
    pub fn extend(&self) -> ExtendGuard {
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        ExtendGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Number of extensions currently held.
    pub fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Wait until no extensions are held.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Guard representing one unit of in-flight handler work.
#[derive(Debug)]
pub struct ExtendGuard {
    inner: Arc<Inner>,
}

impl Drop for ExtendGuard {
    fn drop(&mut self) {
        if self.inner.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.notify.notify_waiters();
        }
    }
}
