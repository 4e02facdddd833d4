//! Short-lived "collection updated" notices.
//!
//! The store is decoupled from any render cycle: consumers either pull a
//! [`snapshot`](NoticeStore::snapshot) or register a listener that fires on
//! every change, so notice churn never forces unrelated consumers to
//! re-evaluate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use uuid::Uuid;

use crate::types::EntityKind;

/// How long a notice stays visible.
const NOTICE_TTL: Duration = Duration::from_millis(2000);

/// A single transient notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Unique id, used to remove exactly this entry on expiry.
    pub id: String,
    /// Display label for the changed collection.
    pub text: &'static str,
}

/// Fixed label table for notices.
fn label(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Expense => "↻ Expenses updated",
        EntityKind::Budget => "↻ Budget updated",
        EntityKind::People => "↻ People updated",
        EntityKind::PaymentMethod => "↻ Payment methods updated",
        EntityKind::Loan => "↻ Loans updated",
        EntityKind::Income => "↻ Income updated",
        EntityKind::Investment => "↻ Investments updated",
        EntityKind::FixedExpense => "↻ Fixed expenses updated",
    }
}

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct NoticeState {
    notices: Vec<Notice>,
    listeners: HashMap<u64, Listener>,
    next_listener_id: u64,
}

/// Store of currently-visible notices.
#[derive(Clone, Default)]
pub struct NoticeStore {
    state: Arc<Mutex<NoticeState>>,
}

/// Subscription guard returned by [`NoticeStore::subscribe`]. Dropping it
/// unsubscribes the listener.
pub struct NoticeSubscription {
    state: Weak<Mutex<NoticeState>>,
    id: u64,
}

impl Drop for NoticeSubscription {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            state.lock().unwrap().listeners.remove(&self.id);
        }
    }
}

impl NoticeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener invoked after every notice addition or removal.
    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> NoticeSubscription {
        let mut state = self.state.lock().unwrap();
        let id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(id, Arc::new(listener));

        NoticeSubscription {
            state: Arc::downgrade(&self.state),
            id,
        }
    }

    /// Current notices, oldest first.
    pub fn snapshot(&self) -> Vec<Notice> {
        self.state.lock().unwrap().notices.clone()
    }

    /// Appends the notice for `kind` and schedules its removal after
    /// [`NOTICE_TTL`].
    pub(crate) fn push(&self, kind: EntityKind) {
        let id = Uuid::new_v4().to_string();
        {
            let mut state = self.state.lock().unwrap();
            state.notices.push(Notice {
                id: id.clone(),
                text: label(kind),
            });
        }
        self.notify();
        self.schedule_expiry(id);
    }

    /// Invokes listeners outside the state lock; a listener may call back
    /// into `snapshot()`.
    fn notify(&self) {
        let listeners: Vec<Listener> = {
            let state = self.state.lock().unwrap();
            state.listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener();
        }
    }

    /// Removes the entry with `id` once its TTL elapses. The task holds only
    /// a weak reference, so an expiry outliving the store is a no-op.
    fn schedule_expiry(&self, id: String) {
        let state = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(NOTICE_TTL).await;

            let Some(state) = state.upgrade() else {
                return;
            };
            let listeners: Vec<Listener> = {
                let mut state = state.lock().unwrap();
                let before = state.notices.len();
                state.notices.retain(|notice| notice.id != id);
                if state.notices.len() == before {
                    return;
                }
                state.listeners.values().cloned().collect()
            };
            for listener in listeners {
                listener();
            }
        });
    }
}
