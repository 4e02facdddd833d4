//! Dispatch of debounced change events to their refresh targets.

use std::sync::RwLock;

use log::debug;

use crate::bus::{ChangeBus, ChangeNotice};
use crate::types::{EntityKind, RefreshHandlers, Route};

/// Invokes the single dispatch target for `kind`.
///
/// Context kinds call the matching refresh handler, if one is currently
/// registered; broadcast kinds publish one notice on the bus. The handler
/// set is read at call time, so closures swapped in after spawn take effect.
pub(crate) fn dispatch(kind: EntityKind, handlers: &RwLock<RefreshHandlers>, bus: &ChangeBus) {
    match kind.route() {
        Route::Context(slot) => {
            // Clone out of the lock; a handler may itself swap the set.
            let handler = handlers.read().unwrap().slot(slot).cloned();
            match handler {
                Some(refresh) => refresh(),
                None => debug!("no refresh handler registered for {kind}"),
            }
        }
        Route::Broadcast => bus.publish(ChangeNotice { entity_type: kind }),
    }
}
