//! Observer bridge
//!
//! Forwards each settled consent record to the host observer. The observer
//! may attach before, during, or after the first fetch. Records notified
//! before attachment are held as pending (latest wins) and replayed exactly
//! once on attachment.
//!
//! Every record carries a `Ticket` taken when it was notified. Deliveries
//! run outside the state lock, so a replay and a fresh notify can race;
//! the delivery lock drops any record older than the last one delivered.

use crate::observer::{ObserverHandle, ObserverSlot, SlotWatch};
use consentsync_core::ConsentRecord;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Position of a record in notification order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

#[derive(Default)]
struct BridgeState {
    observer: Option<ObserverHandle>,
    pending: Option<(Ticket, ConsentRecord)>,
    /// Last ticket handed out.
    issued: u64,
    /// `notify` calls received.
    notified: u64,
    /// approve/decline calls made on the observer.
    delivered: u64,
}

struct BridgeInner {
    state: Mutex<BridgeState>,
    /// Held across each observer call. Holds the last ticket delivered.
    delivery: Mutex<Option<Ticket>>,
    /// Taken by the first `arm()`.
    watch: Mutex<Option<SlotWatch>>,
}

#[derive(Clone)]
pub struct ObserverBridge {
    inner: Arc<BridgeInner>,
}

impl ObserverBridge {
    /// A bridge watching `slot` for the host's observer.
    pub fn new(slot: &ObserverSlot) -> Self {
        Self::with_watch(Some(slot.subscribe()))
    }

    /// A bridge with no slot to watch. Records stay pending forever.
    pub fn detached() -> Self {
        Self::with_watch(None)
    }

    fn with_watch(watch: Option<SlotWatch>) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                state: Mutex::new(BridgeState::default()),
                delivery: Mutex::new(None),
                watch: Mutex::new(watch),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BridgeState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start watching the slot. Spawns one task that waits for the binding
    /// and exits after attaching, or when the slot is dropped unbound.
    /// Returns `None` if already armed or detached.
    pub fn arm(&self) -> Option<JoinHandle<()>> {
        let mut watch = self
            .inner
            .watch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()?;
        let bridge = self.clone();
        Some(tokio::spawn(async move {
            match watch.resolved().await {
                Some(handle) => bridge.attach(handle),
                None => debug!("Observer slot dropped without a binding"),
            }
        }))
    }

    /// Attach the observer and replay the pending record, if any.
    pub fn attach(&self, handle: ObserverHandle) {
        let pending = {
            let mut state = self.state();
            if state.observer.is_some() {
                debug!("Observer already attached, ignoring");
                return;
            }
            info!("Observer attached");
            state.observer = Some(handle.clone());
            state.pending.take()
        };
        if let Some((ticket, record)) = pending {
            self.deliver(&handle, ticket, &record);
        }
    }

    /// Reserve the next position in notification order. Callers that settle
    /// state under their own lock take the ticket there, then `notify_at`
    /// once the lock is released.
    pub fn ticket(&self) -> Ticket {
        let mut state = self.state();
        state.issued += 1;
        Ticket(state.issued)
    }

    /// Forward a settled record. Delivered now if the observer is attached,
    /// otherwise held for replay on attachment.
    pub fn notify(&self, record: &ConsentRecord) {
        let ticket = self.ticket();
        self.notify_at(ticket, record);
    }

    /// `notify` with a ticket taken earlier. A record older than one
    /// already pending or delivered is dropped.
    pub fn notify_at(&self, ticket: Ticket, record: &ConsentRecord) {
        let handle = {
            let mut state = self.state();
            state.notified += 1;
            match &state.observer {
                Some(handle) => handle.clone(),
                None => {
                    if state.pending.as_ref().map_or(true, |(held, _)| *held < ticket) {
                        debug!("No observer yet, holding record as pending");
                        state.pending = Some((ticket, record.clone()));
                    }
                    return;
                }
            }
        };
        self.deliver(&handle, ticket, record);
    }

    fn deliver(&self, handle: &ObserverHandle, ticket: Ticket, record: &ConsentRecord) {
        let mut last = self.inner.delivery.lock().unwrap_or_else(|e| e.into_inner());
        if (*last).is_some_and(|delivered| delivered >= ticket) {
            debug!("Skipping stale record {:?}, already delivered {:?}", ticket, *last);
            return;
        }
        *last = Some(ticket);
        let Some(observer) = handle.upgrade() else {
            debug!("Observer dropped by host, skipping delivery");
            return;
        };
        self.state().delivered += 1;
        if record.testbed_access {
            debug!("Observer approve until {}", record.valid_until);
            observer.approve(&record.valid_until);
        } else {
            debug!("Observer decline");
            observer.decline();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.state().observer.is_some()
    }

    pub fn pending(&self) -> Option<ConsentRecord> {
        self.state().pending.as_ref().map(|(_, record)| record.clone())
    }

    pub fn notified(&self) -> u64 {
        self.state().notified
    }

    pub fn delivered(&self) -> u64 {
        self.state().delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Observer;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Observer for Calls {
        fn approve(&self, expiry: &str) {
            self.0.lock().unwrap().push(format!("approve:{}", expiry));
        }
        fn decline(&self) {
            self.0.lock().unwrap().push("decline".into());
        }
    }

    fn record(access: bool) -> ConsentRecord {
        ConsentRecord {
            user_urn: "urn:x".into(),
            accept_main: access,
            accept_userdata: access,
            testbed_access: access,
            valid_until: if access { "2030-01-01".into() } else { String::new() },
        }
    }

    #[test]
    fn test_pending_replayed_once_on_attach() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());

        bridge.notify(&record(true));
        assert_eq!(bridge.delivered(), 0);
        assert!(bridge.pending().is_some());

        bridge.attach(ObserverHandle::new(&calls));
        assert_eq!(*calls.0.lock().unwrap(), vec!["approve:2030-01-01"]);
        assert!(bridge.pending().is_none());

        // A second attach must not replay again
        bridge.attach(ObserverHandle::new(&calls));
        assert_eq!(calls.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_pending_keeps_latest_record() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());

        bridge.notify(&record(true));
        bridge.notify(&record(false));
        bridge.attach(ObserverHandle::new(&calls));

        assert_eq!(*calls.0.lock().unwrap(), vec!["decline"]);
        assert_eq!(bridge.notified(), 2);
        assert_eq!(bridge.delivered(), 1);
    }

    #[test]
    fn test_attached_notify_delivers_immediately() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());
        bridge.attach(ObserverHandle::new(&calls));
        assert!(calls.0.lock().unwrap().is_empty());

        bridge.notify(&record(false));
        bridge.notify(&record(true));
        assert_eq!(*calls.0.lock().unwrap(), vec!["decline", "approve:2030-01-01"]);
        assert!(bridge.pending().is_none());
    }

    #[test]
    fn test_dropped_observer_is_a_no_op() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());
        bridge.attach(ObserverHandle::new(&calls));
        drop(calls);

        bridge.notify(&record(true));
        assert_eq!(bridge.delivered(), 0);
        assert!(bridge.is_attached());
    }

    #[test]
    fn test_detached_bridge_cannot_arm() {
        let bridge = ObserverBridge::detached();
        assert!(bridge.arm().is_none());
    }

    #[test]
    fn test_older_ticket_is_not_delivered_after_newer() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());
        bridge.attach(ObserverHandle::new(&calls));

        let older = bridge.ticket();
        let newer = bridge.ticket();
        bridge.notify_at(newer, &record(false));
        bridge.notify_at(older, &record(true));

        assert_eq!(*calls.0.lock().unwrap(), vec!["decline"]);
        assert_eq!(bridge.delivered(), 1);
    }

    #[test]
    fn test_older_ticket_does_not_replace_pending() {
        let bridge = ObserverBridge::detached();
        let calls = Arc::new(Calls::default());

        let older = bridge.ticket();
        let newer = bridge.ticket();
        bridge.notify_at(newer, &record(false));
        bridge.notify_at(older, &record(true));
        bridge.attach(ObserverHandle::new(&calls));

        assert_eq!(*calls.0.lock().unwrap(), vec!["decline"]);
    }

    #[test]
    fn test_replay_racing_notify_ends_on_latest_record() {
        for _ in 0..2_000 {
            let bridge = ObserverBridge::detached();
            let calls = Arc::new(Calls::default());
            bridge.notify(&record(true));

            let barrier = Arc::new(std::sync::Barrier::new(2));
            let attacher = {
                let (bridge, calls, barrier) = (bridge.clone(), calls.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    bridge.attach(ObserverHandle::new(&calls));
                })
            };
            let notifier = {
                let (bridge, barrier) = (bridge.clone(), barrier.clone());
                std::thread::spawn(move || {
                    barrier.wait();
                    bridge.notify(&record(false));
                })
            };
            attacher.join().unwrap();
            notifier.join().unwrap();

            let calls = calls.0.lock().unwrap();
            assert_eq!(calls.last().map(String::as_str), Some("decline"), "got {:?}", calls);
        }
    }
}
