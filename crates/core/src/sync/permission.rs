//! Single-slot register for "sync once permission is granted".
//!
//! Only one permission request can be pending at a time. Registering a new
//! request while one is pending does not queue it: the displaced request is
//! completed immediately with [`PermissionOutcome::Superseded`] and the new
//! one takes the slot. Callers that fire concurrent permission requests must
//! be prepared for that outcome.

use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, warn};

/// How a pending permission request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    /// At least one read permission is now granted; the caller should retry
    /// its sync.
    Granted,
    /// The user declined every permission.
    Denied,
    /// A newer request replaced this one before it resolved.
    Superseded,
}

/// Holds at most one pending permission request.
#[derive(Debug, Default)]
pub struct PermissionRequestSlot {
    pending: Mutex<Option<oneshot::Sender<PermissionOutcome>>>,
}

impl PermissionRequestSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the slot, superseding any request already waiting in it.
    pub fn register(&self) -> oneshot::Receiver<PermissionOutcome> {
        let (tx, rx) = oneshot::channel();
        let displaced = self.lock().replace(tx);
        if let Some(previous) = displaced {
            warn!("permission request superseded by a newer request");
            // The displaced receiver may already be gone; nothing to do then.
            let _ = previous.send(PermissionOutcome::Superseded);
        }
        rx
    }

    /// Complete the pending request, if any. Returns whether one was waiting.
    pub fn resolve(&self, any_granted: bool) -> bool {
        let Some(pending) = self.lock().take() else {
            debug!("permission result arrived with no pending request");
            return false;
        };
        let outcome =
            if any_granted { PermissionOutcome::Granted } else { PermissionOutcome::Denied };
        let _ = pending.send(outcome);
        true
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<oneshot::Sender<PermissionOutcome>>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("permission slot mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
