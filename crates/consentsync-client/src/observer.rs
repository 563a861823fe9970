//! Host observer and the slot the host binds it to
//!
//! The host may bind its observer at any time: before the client starts,
//! while the first fetch is in flight, long after, or never. `ObserverSlot`
//! is a resolved-once cell: the first `bind` wins and wakes every
//! `SlotWatch`; later binds are rejected. Nothing polls.

use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Capability set the host exposes to receive the authorization outcome.
pub trait Observer: Send + Sync {
    /// Testbed access granted until `expiry` (the server's ISO-8601 string, verbatim).
    fn approve(&self, expiry: &str);

    /// Testbed access not granted.
    fn decline(&self);
}

/// Non-owning reference to the host's observer. The host keeps ownership;
/// once it drops the observer every delivery becomes a no-op.
#[derive(Clone)]
pub struct ObserverHandle(Weak<dyn Observer>);

impl ObserverHandle {
    pub fn new<O: Observer + 'static>(observer: &Arc<O>) -> Self {
        let strong: Arc<dyn Observer> = observer.clone();
        Self(Arc::downgrade(&strong))
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Observer>> {
        self.0.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl std::fmt::Debug for ObserverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SlotError {
    #[error("observer slot already bound")]
    AlreadyBound,
}

/// The well-known place the host binds its observer to.
#[derive(Clone)]
pub struct ObserverSlot {
    tx: Arc<watch::Sender<Option<ObserverHandle>>>,
}

impl Default for ObserverSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Bind the host's observer. Only the first binding counts.
    pub fn bind<O: Observer + 'static>(&self, observer: &Arc<O>) -> Result<(), SlotError> {
        let handle = ObserverHandle::new(observer);
        let bound = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(handle);
            true
        });
        if bound {
            tracing::debug!("Observer bound to slot");
            Ok(())
        } else {
            Err(SlotError::AlreadyBound)
        }
    }

    pub fn is_bound(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn current(&self) -> Option<ObserverHandle> {
        self.tx.borrow().clone()
    }

    /// Subscribe to the first binding. The subscription does not keep the slot alive.
    pub fn subscribe(&self) -> SlotWatch {
        SlotWatch {
            rx: self.tx.subscribe(),
        }
    }
}

/// One subscription to an `ObserverSlot`.
pub struct SlotWatch {
    rx: watch::Receiver<Option<ObserverHandle>>,
}

impl SlotWatch {
    /// Wait for the slot to be bound. Returns immediately if it already is,
    /// and `None` once every `ObserverSlot` clone is gone without a binding.
    pub async fn resolved(&mut self) -> Option<ObserverHandle> {
        match self.rx.wait_for(|slot| slot.is_some()).await {
            Ok(slot) => slot.clone(),
            Err(_) => None,
        }
    }
}
