//! Cooperative abort signal
//!
//! Tasks check the signal when they start; nothing is interrupted
//! mid-flight. Child signals abort with their parent but can also be
//! aborted on their own, which is how a batch stops its remaining items
//! without touching the caller's signal.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::debug;

struct SignalInner {
    aborted: AtomicBool,
    notify: Notify,
    children: Mutex<Vec<Weak<SignalInner>>>,
}

impl SignalInner {
    fn new(aborted: bool) -> Self {
        Self {
            aborted: AtomicBool::new(aborted),
            notify: Notify::new(),
            children: Mutex::new(Vec::new()),
        }
    }

    fn abort(&self) -> bool {
        if self.aborted.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.abort();
        }
        true
    }
}

/// Shared abort flag
#[derive(Clone)]
pub struct AbortSignal {
    inner: Arc<SignalInner>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner::new(false)),
        }
    }

    /// Signal that aborts when `self` does
    pub fn child(&self) -> AbortSignal {
        let mut children = self.inner.children.lock();
        let child = Arc::new(SignalInner::new(self.is_aborted()));
        children.retain(|weak| weak.strong_count() > 0);
        children.push(Arc::downgrade(&child));
        AbortSignal { inner: child }
    }

    /// Set the flag
    ///
    /// Returns `true` only for the call that flipped it.
    pub fn abort(&self) -> bool {
        let flipped = self.inner.abort();
        if flipped {
            debug!("Abort signaled");
        }
        flipped
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.aborted.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is aborted
    pub async fn aborted(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_aborted() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
