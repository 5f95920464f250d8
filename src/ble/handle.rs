//! Single-owner slot for the transport handle.
//!
//! The slot is the only shared resource between the caller side and the
//! event side of a connection. It exposes identity comparison, swap and
//! clear, plus a bounded wait for "cleared" used by `disconnect`. Clearing
//! the slot is what wakes that wait.

use std::time::Duration;
use tokio::sync::watch;

use crate::ble::radio::TransportHandle;

/// Result of checking an event's handle against the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleCheck {
    /// The slot already holds this handle.
    Owned,
    /// The slot was empty and now holds this handle.
    Adopted,
    /// The slot holds a different handle, or adoption was refused.
    Foreign,
}

impl HandleCheck {
    /// Whether the event may be processed.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Foreign)
    }
}

/// Holder of the current transport handle.
pub struct HandleSlot {
    tx: watch::Sender<Option<TransportHandle>>,
}

impl HandleSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// The current handle.
    pub fn current(&self) -> Option<TransportHandle> {
        self.tx.borrow().clone()
    }

    /// Check if no handle is held.
    pub fn is_empty(&self) -> bool {
        self.tx.borrow().is_none()
    }

    /// Compare `handle` with the held one by identity.
    ///
    /// An empty slot adopts `handle` when `adopt` is true.
    pub fn check(&self, handle: &TransportHandle, adopt: bool) -> HandleCheck {
        let mut verdict = HandleCheck::Foreign;

        self.tx.send_if_modified(|slot| match slot {
            Some(current) if current == handle => {
                verdict = HandleCheck::Owned;
                false
            }
            Some(_) => false,
            None if adopt => {
                *slot = Some(handle.clone());
                verdict = HandleCheck::Adopted;
                true
            }
            None => false,
        });

        verdict
    }

    /// Install a new handle, returning the previous one.
    pub fn replace(&self, handle: TransportHandle) -> Option<TransportHandle> {
        self.tx.send_replace(Some(handle))
    }

    /// Clear the slot, returning what it held.
    pub fn take(&self) -> Option<TransportHandle> {
        self.tx.send_replace(None)
    }

    /// Clear the slot only if it holds `handle`.
    pub fn take_if(&self, handle: &TransportHandle) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.as_ref() == Some(handle) {
                *slot = None;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the slot is empty, for at most `timeout`.
    ///
    /// Returns whether the slot was cleared in time.
    pub async fn wait_cleared(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();

        let cleared = match tokio::time::timeout(timeout, rx.wait_for(|slot| slot.is_none())).await {
            Ok(result) => result.is_ok(),
            Err(_) => false,
        };
        cleared
    }
}

impl Default for HandleSlot {
    fn default() -> Self {
        Self::new()
    }
}
