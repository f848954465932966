//! Transient success and error notices shown alongside a task view.

use futures_signals::signal::{Mutable, Signal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A single visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

struct NotificationsInner {
    success: Mutable<Option<Notice>>,
    error: Mutable<Option<Notice>>,
    ttl: Duration,
    next_id: AtomicU64,
}

impl NotificationsInner {
    fn slot(&self, kind: NoticeKind) -> &Mutable<Option<Notice>> {
        match kind {
            NoticeKind::Success => &self.success,
            NoticeKind::Error => &self.error,
        }
    }

    fn clear_if_current(&self, kind: NoticeKind, id: u64) {
        let mut slot = self.slot(kind).lock_mut();
        if slot.as_ref().map(|notice| notice.id) == Some(id) {
            *slot = None;
        }
    }
}

/// Independent success and error slots with auto-dismiss
///
/// Posting replaces whatever the slot showed and starts a fresh timer. A
/// timer only dismisses the notice it was started for.
#[derive(Clone)]
pub struct Notifications {
    inner: Arc<NotificationsInner>,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(NotificationsInner {
                success: Mutable::new(None),
                error: Mutable::new(None),
                ttl,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn success(&self, message: impl Into<String>) -> u64 {
        self.post(NoticeKind::Success, message.into())
    }

    pub fn error(&self, message: impl Into<String>) -> u64 {
        self.post(NoticeKind::Error, message.into())
    }

    pub fn current_success(&self) -> Option<Notice> {
        self.inner.success.get_cloned()
    }

    pub fn current_error(&self) -> Option<Notice> {
        self.inner.error.get_cloned()
    }

    pub fn success_signal(&self) -> impl Signal<Item = Option<Notice>> + use<> {
        self.inner.success.signal_cloned()
    }

    pub fn error_signal(&self) -> impl Signal<Item = Option<Notice>> + use<> {
        self.inner.error.signal_cloned()
    }

    pub fn dismiss_success(&self) {
        self.inner.success.set(None);
    }

    pub fn dismiss_error(&self) {
        self.inner.error.set(None);
    }

    fn post(&self, kind: NoticeKind, message: String) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        debug!("Notice {} ({:?}): {}", id, kind, message);

        self.inner.slot(kind).set(Some(Notice { id, kind, message }));

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak: Weak<NotificationsInner> = Arc::downgrade(&self.inner);
                let ttl = self.inner.ttl;
                handle.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if let Some(inner) = weak.upgrade() {
                        inner.clear_if_current(kind, id);
                    }
                });
            }
            Err(_) => debug!("No runtime, notice {} will not auto-dismiss", id),
        }

        id
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new(Duration::from_secs(6))
    }
}
