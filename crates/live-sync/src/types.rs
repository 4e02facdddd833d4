//! Core types for the live sync client.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

/// A change notification as delivered on the server event stream.
///
/// The server publishes one notification per write. `entity_type` is an
/// open-ended tag; only values recognized by [`EntityKind`] are acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeNotification {
    /// Which domain collection changed (e.g. "expense", "budget").
    pub entity_type: String,
    /// Opaque id of the tab/client instance that caused the change.
    pub origin_tab_id: String,
    /// Informational server-side timestamp. Not used for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChangeNotification {
    /// Parses the data payload of one stream message.
    pub fn parse(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Generates a stable per-tab client identity.
///
/// Call once per tab before spawning the client and reuse the value for the
/// life of the tab. Notifications carrying this id back are self-echoes.
pub fn generate_tab_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ─────────────────────────────────────────────────────────────────────────────
// Entity Vocabulary & Routing Table
// ─────────────────────────────────────────────────────────────────────────────

/// The fixed vocabulary of entity tags the router acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Expense,
    Budget,
    People,
    PaymentMethod,
    Loan,
    Income,
    Investment,
    FixedExpense,
}

/// Dispatch target for a recognized entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Owned by one of the four named refresh handlers.
    Context(ContextSlot),
    /// Announced generically on the change bus.
    Broadcast,
}

/// The four named refresh handler slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSlot {
    Expenses,
    Budgets,
    People,
    PaymentMethods,
}

impl ContextSlot {
    /// Every handler slot, in routing-table order.
    pub const ALL: [ContextSlot; 4] = [
        ContextSlot::Expenses,
        ContextSlot::Budgets,
        ContextSlot::People,
        ContextSlot::PaymentMethods,
    ];
}

impl EntityKind {
    /// Every recognized entity kind, in routing-table order.
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Expense,
        EntityKind::Budget,
        EntityKind::People,
        EntityKind::PaymentMethod,
        EntityKind::Loan,
        EntityKind::Income,
        EntityKind::Investment,
        EntityKind::FixedExpense,
    ];

    /// The kinds announced on the change bus rather than a named handler.
    pub const BROADCAST: [EntityKind; 4] = [
        EntityKind::Loan,
        EntityKind::Income,
        EntityKind::Investment,
        EntityKind::FixedExpense,
    ];

    /// Parses a wire tag. Unrecognized tags yield `None` and are dropped by
    /// the router.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "expense" => Some(EntityKind::Expense),
            "budget" => Some(EntityKind::Budget),
            "people" => Some(EntityKind::People),
            "payment_method" => Some(EntityKind::PaymentMethod),
            "loan" => Some(EntityKind::Loan),
            "income" => Some(EntityKind::Income),
            "investment" => Some(EntityKind::Investment),
            "fixed_expense" => Some(EntityKind::FixedExpense),
            _ => None,
        }
    }

    /// The wire tag for this kind.
    pub fn tag(self) -> &'static str {
        match self {
            EntityKind::Expense => "expense",
            EntityKind::Budget => "budget",
            EntityKind::People => "people",
            EntityKind::PaymentMethod => "payment_method",
            EntityKind::Loan => "loan",
            EntityKind::Income => "income",
            EntityKind::Investment => "investment",
            EntityKind::FixedExpense => "fixed_expense",
        }
    }

    /// Where this kind is dispatched. Every kind maps to exactly one route.
    pub fn route(self) -> Route {
        match self {
            EntityKind::Expense => Route::Context(ContextSlot::Expenses),
            EntityKind::Budget => Route::Context(ContextSlot::Budgets),
            EntityKind::People => Route::Context(ContextSlot::People),
            EntityKind::PaymentMethod => Route::Context(ContextSlot::PaymentMethods),
            EntityKind::Loan
            | EntityKind::Income
            | EntityKind::Investment
            | EntityKind::FixedExpense => Route::Broadcast,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connection & Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of the event stream connection.
///
/// Exactly one value holds at any instant; transitions are driven only by
/// the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// A caller-supplied refresh action, invoked with no arguments.
pub type RefreshFn = Arc<dyn Fn() + Send + Sync>;

/// Optional per-collection refresh actions supplied by the embedding app.
///
/// An absent handler is a no-op at dispatch time, not an error. The set can
/// be swapped at any point through [`SyncClient::set_handlers`] and dispatch
/// always sees the latest closures.
///
/// [`SyncClient::set_handlers`]: crate::SyncClient::set_handlers
#[derive(Clone, Default)]
pub struct RefreshHandlers {
    pub expenses: Option<RefreshFn>,
    pub budgets: Option<RefreshFn>,
    pub people: Option<RefreshFn>,
    pub payment_methods: Option<RefreshFn>,
}

impl RefreshHandlers {
    /// The handler registered for `slot`, if any.
    pub(crate) fn slot(&self, slot: ContextSlot) -> Option<&RefreshFn> {
        match slot {
            ContextSlot::Expenses => self.expenses.as_ref(),
            ContextSlot::Budgets => self.budgets.as_ref(),
            ContextSlot::People => self.people.as_ref(),
            ContextSlot::PaymentMethods => self.payment_methods.as_ref(),
        }
    }
}

impl fmt::Debug for RefreshHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshHandlers")
            .field("expenses", &self.expenses.is_some())
            .field("budgets", &self.budgets.is_some())
            .field("people", &self.people.is_some())
            .field("payment_methods", &self.payment_methods.is_some())
            .finish()
    }
}
