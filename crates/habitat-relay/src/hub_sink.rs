//! Snapshot sink that feeds the broadcast hub.
//!
//! Bridges the tick loop in `habitat-core` to the client fan-out in
//! `habitat-hub`.

use std::sync::Arc;

use habitat_core::scheduler::SnapshotSink;
use habitat_hub::BroadcastHub;
use habitat_types::Snapshot;
use tracing::{debug, error};

/// Sink that broadcasts every published snapshot.
pub struct HubSink {
    hub: Arc<BroadcastHub>,
}

impl HubSink {
    /// Create a sink backed by the given hub.
    pub const fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }
}

impl SnapshotSink for HubSink {
    fn publish(&mut self, snapshot: &Snapshot) {
        match self.hub.broadcast(snapshot) {
            Ok(report) => debug!(
                delivered = report.delivered,
                closed = report.closed,
                lagged = report.lagged,
                "Snapshot broadcast"
            ),
            Err(e) => error!(error = %e, "Snapshot broadcast failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use habitat_core::assembler::{SnapshotAssembler, resolve_tracked_robots};
    use habitat_core::config::EnvironmentSignals;
    use habitat_core::scripted::ScriptedGateway;

    use super::*;

    #[tokio::test]
    async fn assembled_snapshot_reaches_registered_clients() {
        let mut gateway = ScriptedGateway::new()
            .with_robot("SCOUT-1", 1, [0.0, 0.0, 0.0])
            .with_float("O2_level", 21.0456);
        let tracked = resolve_tracked_robots(&mut gateway, &[String::from("SCOUT-1")])
            .await
            .unwrap();
        let assembler = SnapshotAssembler::new(tracked, EnvironmentSignals::default());

        let hub = Arc::new(BroadcastHub::new(4));
        let mut client = hub.register();
        let mut sink = HubSink::new(Arc::clone(&hub));

        let snapshot = assembler.assemble(&mut gateway).await.unwrap();
        sink.publish(&snapshot);

        let frame = client.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["robots"][0]["name"], "SCOUT-1");
        assert_eq!(value["robots"][0]["position"]["x"], 200.0);
        assert_eq!(value["environment"]["O2"], 21.05);
        assert_eq!(value["environment"]["Pressure"], 101.3);
        assert_eq!(hub.latest().map(|s| s.robots.len()), Some(1));
    }
}
