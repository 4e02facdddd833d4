//! Broadcast fan-out for entity kinds not owned by a named refresh handler.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::types::EntityKind;

/// Payload announced for a broadcast-kind change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotice {
    pub entity_type: EntityKind,
}

/// Lightweight broadcast bus that fans out change notices to any interested
/// listeners.
#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeNotice>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.sender.subscribe()
    }

    pub fn publish(&self, notice: ChangeNotice) {
        // Absent or lagging listeners are ignored to avoid blocking the router.
        let _ = self.sender.send(notice);
    }
}
