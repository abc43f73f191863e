//! Fan-out of snapshots to connected clients.
//!
//! [`BroadcastHub`] owns the set of live clients. Each client gets a bounded
//! queue; its WebSocket task drains the queue onto the socket. A broadcast
//! serializes the snapshot once and offers the same frame to every queue
//! without waiting on any of them, so a slow socket can never hold up the
//! tick loop or the other clients.
//!
//! A client is dropped from the hub when:
//!
//! - its queue is closed (the socket task ended), or
//! - its queue is full (the client fell `capacity` frames behind).
//!
//! Dropping the hub's sender closes the queue, which tells the socket task
//! to hang up once it has flushed what is already queued.
//!
//! Broadcast works on a copy of the client list taken under a short read
//! lock, so registration and removal can interleave freely with delivery.
//! A client registered after that copy is taken sees the next frame, never
//! an earlier one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use habitat_types::{ClientId, Snapshot};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

/// A serialized snapshot, shared by every client queue.
pub type Frame = Arc<str>;

/// Errors from the broadcast hub.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The snapshot could not be serialized.
    #[error("failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-broadcast delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Clients the frame was queued for.
    pub delivered: usize,
    /// Clients removed because their connection had closed.
    pub closed: usize,
    /// Clients removed because their queue was full.
    pub lagged: usize,
}

/// The receiving end of one client's queue.
#[derive(Debug)]
pub struct ClientSubscription {
    id: ClientId,
    rx: mpsc::Receiver<Frame>,
}

impl ClientSubscription {
    /// The client this subscription belongs to.
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next frame.
    ///
    /// Returns `None` once the hub has dropped this client and the queue
    /// is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }

    /// Take a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.rx.try_recv().ok()
    }
}

#[derive(Debug)]
struct ClientSlot {
    tx: mpsc::Sender<Frame>,
    connected_at: DateTime<Utc>,
}

/// Live client set plus the most recent snapshot.
#[derive(Debug)]
pub struct BroadcastHub {
    clients: RwLock<BTreeMap<ClientId, ClientSlot>>,
    queue_capacity: usize,
    latest: RwLock<Option<Arc<Snapshot>>>,
    broadcasts: AtomicU64,
}

impl BroadcastHub {
    /// Create a hub whose clients may fall at most `queue_capacity` frames
    /// behind.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            clients: RwLock::new(BTreeMap::new()),
            queue_capacity: queue_capacity.max(1),
            latest: RwLock::new(None),
            broadcasts: AtomicU64::new(0),
        }
    }

    /// Add a client. It receives every frame broadcast from now on.
    pub fn register(&self) -> ClientSubscription {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = ClientId::new();
        let slot = ClientSlot {
            tx,
            connected_at: Utc::now(),
        };
        let count = {
            let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
            clients.insert(id, slot);
            clients.len()
        };
        info!(client_id = %id, clients = count, "Client registered");
        ClientSubscription { id, rx }
    }

    /// Remove a client. Returns whether it was still registered.
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if let Some(slot) = &removed {
            let connected_for = Utc::now()
                .signed_duration_since(slot.connected_at)
                .num_seconds();
            info!(client_id = %id, connected_for_s = connected_for, "Client unregistered");
        }
        removed.is_some()
    }

    /// Number of registered clients.
    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The most recently broadcast snapshot, if any.
    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of snapshots broadcast so far.
    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::Relaxed)
    }

    /// Serialize `snapshot` once and queue it for every registered client.
    ///
    /// Never waits on a client. Clients whose queue is closed or full are
    /// unregistered; that does not fail the call.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::Serialization`] if the snapshot cannot be
    /// encoded. Nothing is delivered in that case.
    pub fn broadcast(&self, snapshot: &Snapshot) -> Result<BroadcastReport, HubError> {
        let frame: Frame = Arc::from(serde_json::to_string(snapshot)?);

        let targets: Vec<(ClientId, mpsc::Sender<Frame>)> = self
            .clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, slot)| (*id, slot.tx.clone()))
            .collect();

        let mut report = BroadcastReport::default();
        for (id, tx) in targets {
            match tx.try_send(Arc::clone(&frame)) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(TrySendError::Closed(_)) => {
                    debug!(client_id = %id, "Client queue closed, dropping client");
                    self.unregister(id);
                    report.closed = report.closed.saturating_add(1);
                }
                Err(TrySendError::Full(_)) => {
                    warn!(
                        client_id = %id,
                        capacity = self.queue_capacity,
                        "Client fell too far behind, disconnecting"
                    );
                    self.unregister(id);
                    report.lagged = report.lagged.saturating_add(1);
                }
            }
        }

        *self.latest.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::new(snapshot.clone()));
        self.broadcasts.fetch_add(1, Ordering::Relaxed);

        Ok(report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habitat_types::{EnvironmentReading, Position, RobotId, RobotReading};

    use super::*;

    fn snapshot(battery: u8) -> Snapshot {
        Snapshot {
            robots: vec![RobotReading {
                id: RobotId::new("SCOUT-1"),
                status: String::from("active"),
                battery_percent: battery,
                position: Position { x: 200.0, y: 200.0 },
                task: String::from("Mapping Sector A"),
            }],
            environment: EnvironmentReading {
                o2: 21.0,
                pressure: 101.3,
                temperature: 22.0,
                radiation: 0.1,
            },
            alerts: Vec::new(),
        }
    }

    fn battery_of(frame: &Frame) -> u64 {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["robots"][0]["battery"].as_u64().unwrap()
    }

    #[test]
    fn delivers_same_frame_to_every_client() {
        let hub = BroadcastHub::new(4);
        let mut a = hub.register();
        let mut b = hub.register();

        let report = hub.broadcast(&snapshot(90)).unwrap();
        assert_eq!(report.delivered, 2);

        let frame_a = a.try_recv().unwrap();
        let frame_b = b.try_recv().unwrap();
        assert!(Arc::ptr_eq(&frame_a, &frame_b));
        assert_eq!(battery_of(&frame_a), 90);
    }

    #[test]
    fn broken_client_does_not_affect_others() {
        let hub = BroadcastHub::new(4);
        let mut healthy = hub.register();
        let broken = hub.register();
        let broken_id = broken.id();
        drop(broken);

        let report = hub.broadcast(&snapshot(75)).unwrap();
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                closed: 1,
                lagged: 0
            }
        );
        assert_eq!(hub.client_count(), 1);
        assert!(!hub.unregister(broken_id));
        assert_eq!(battery_of(&healthy.try_recv().unwrap()), 75);
    }

    #[test]
    fn slow_client_is_disconnected_on_overflow() {
        let hub = BroadcastHub::new(2);
        let mut fast = hub.register();
        let mut slow = hub.register();

        for battery in [10, 20, 30] {
            hub.broadcast(&snapshot(battery)).unwrap();
            assert_eq!(battery_of(&fast.try_recv().unwrap()), u64::from(battery));
        }

        assert_eq!(hub.client_count(), 1);
        // The slow client still drains what was queued, then sees the close.
        assert_eq!(battery_of(&slow.try_recv().unwrap()), 10);
        assert_eq!(battery_of(&slow.try_recv().unwrap()), 20);
        assert!(slow.try_recv().is_none());
    }

    #[test]
    fn late_registration_sees_only_later_frames() {
        let hub = BroadcastHub::new(4);
        let mut early = hub.register();
        hub.broadcast(&snapshot(50)).unwrap();

        let mut late = hub.register();
        assert!(late.try_recv().is_none());

        hub.broadcast(&snapshot(49)).unwrap();
        assert_eq!(battery_of(&late.try_recv().unwrap()), 49);
        assert!(late.try_recv().is_none());

        assert_eq!(battery_of(&early.try_recv().unwrap()), 50);
        assert_eq!(battery_of(&early.try_recv().unwrap()), 49);
    }

    #[test]
    fn unregister_is_idempotent() {
        let hub = BroadcastHub::new(4);
        let client = hub.register();
        assert!(hub.unregister(client.id()));
        assert!(!hub.unregister(client.id()));
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn broadcast_without_clients_still_records_latest() {
        let hub = BroadcastHub::new(4);
        assert!(hub.latest().is_none());

        let report = hub.broadcast(&snapshot(64)).unwrap();
        assert_eq!(report, BroadcastReport::default());
        assert_eq!(hub.broadcast_count(), 1);
        assert_eq!(
            hub.latest().map(|s| s.robots.first().map(|r| r.battery_percent)),
            Some(Some(64))
        );
    }

    #[tokio::test]
    async fn registration_interleaves_with_broadcast() {
        let hub = Arc::new(BroadcastHub::new(64));
        let mut subscriptions = Vec::new();

        let broadcaster = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move {
                for battery in 0..50 {
                    hub.broadcast(&snapshot(battery)).unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };
        for _ in 0..20 {
            subscriptions.push(hub.register());
            tokio::task::yield_now().await;
        }
        broadcaster.await.unwrap();

        // Each client sees a gap-free, in-order suffix of the stream.
        for mut subscription in subscriptions {
            let mut seen = Vec::new();
            while let Some(frame) = subscription.try_recv() {
                seen.push(battery_of(&frame));
            }
            assert!(seen.windows(2).all(|w| w[1] == w[0] + 1));
            assert_eq!(seen.last().copied().unwrap_or(49), 49);
        }
    }
}
