//! Fixed-cadence tick loop.
//!
//! [`run_relay`] drives one tick per configured interval: assemble a
//! snapshot from the simulator, then hand it to a [`SnapshotSink`]. It runs
//! until the shared [`RelayControl`] is told to stop.
//!
//! - A failed assembly skips that tick. The error is logged and the loop
//!   carries on at the next scheduled tick; nothing is published for the
//!   skipped interval.
//! - Ticks never overlap. If assembly overruns the interval the next tick
//!   starts as soon as the slow one finishes, and the schedule shifts rather
//!   than bursting to catch up.
//! - The stop signal is honored between ticks, never in the middle of a
//!   gateway round-trip.

use std::sync::Arc;
use std::time::Duration;

use habitat_types::Snapshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::assembler::SnapshotAssembler;
use crate::control::RelayControl;
use crate::gateway::SimulationGateway;
use crate::provider::{AlertProvider, TaskProvider};

/// Receives each successfully assembled snapshot.
///
/// Implementations must not block: the tick loop calls this inline.
pub trait SnapshotSink: Send {
    /// Called once per published tick.
    fn publish(&mut self, snapshot: &Snapshot);
}

/// A sink that discards snapshots.
pub struct NoOpSink;

impl SnapshotSink for NoOpSink {
    fn publish(&mut self, _snapshot: &Snapshot) {}
}

/// Outcome of a relay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Ticks started.
    pub ticks_attempted: u64,
    /// Ticks that produced a snapshot.
    pub snapshots_published: u64,
    /// Ticks abandoned because assembly failed.
    pub ticks_skipped: u64,
}

/// Run the tick loop until `control` requests a stop.
///
/// The first tick fires immediately.
pub async fn run_relay<G, T, A>(
    gateway: &mut G,
    assembler: &SnapshotAssembler<T, A>,
    sink: &mut dyn SnapshotSink,
    control: &Arc<RelayControl>,
) -> RelaySummary
where
    G: SimulationGateway,
    T: TaskProvider,
    A: AlertProvider,
{
    let mut summary = RelaySummary::default();
    let period = Duration::from_millis(control.tick_interval_ms().max(1));
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        tick_interval_ms = control.tick_interval_ms(),
        robots = assembler.tracked().len(),
        "Relay loop starting"
    );

    loop {
        tokio::select! {
            biased;
            () = control.stopped() => break,
            _ = interval.tick() => {}
        }

        summary.ticks_attempted = summary.ticks_attempted.saturating_add(1);
        let tick = summary.ticks_attempted;

        match assembler.assemble(gateway).await {
            Ok(snapshot) => {
                sink.publish(&snapshot);
                summary.snapshots_published = summary.snapshots_published.saturating_add(1);
                control.record_published();
                debug!(tick, robots = snapshot.robots.len(), "Snapshot published");
            }
            Err(e) => {
                summary.ticks_skipped = summary.ticks_skipped.saturating_add(1);
                control.record_skipped();
                warn!(tick, error = %e, "Snapshot assembly failed, tick skipped");
            }
        }
    }

    info!(
        ticks_attempted = summary.ticks_attempted,
        snapshots_published = summary.snapshots_published,
        ticks_skipped = summary.ticks_skipped,
        "Relay loop stopped"
    );
    summary
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use habitat_types::RobotHandle;
    use tokio::time::Instant;

    use super::*;
    use crate::assembler::{TrackedRobot, resolve_tracked_robots};
    use crate::config::EnvironmentSignals;
    use crate::gateway::{ReadError, SimPosition};
    use crate::scripted::ScriptedGateway;

    #[derive(Default)]
    struct RecordingSink {
        snapshots: Vec<Snapshot>,
    }

    impl SnapshotSink for RecordingSink {
        fn publish(&mut self, snapshot: &Snapshot) {
            self.snapshots.push(snapshot.clone());
        }
    }

    /// Wraps a scripted scene; fails or slows down selected ticks.
    ///
    /// With one tracked robot there is one position read per tick, so the
    /// read count doubles as the tick number.
    struct FlakyGateway {
        inner: ScriptedGateway,
        position_reads: u32,
        fail_on: BTreeSet<u32>,
        read_delay: Duration,
        tick_starts: Vec<Instant>,
    }

    impl FlakyGateway {
        fn new(fail_on: &[u32]) -> Self {
            Self {
                inner: ScriptedGateway::new().with_robot("SCOUT-1", 1, [0.5, 0.5, 0.0]),
                position_reads: 0,
                fail_on: fail_on.iter().copied().collect(),
                read_delay: Duration::ZERO,
                tick_starts: Vec::new(),
            }
        }
    }

    impl SimulationGateway for FlakyGateway {
        async fn resolve_handle(&mut self, name: &str) -> Result<Option<RobotHandle>, ReadError> {
            self.inner.resolve_handle(name).await
        }

        async fn read_position(&mut self, handle: RobotHandle) -> Result<SimPosition, ReadError> {
            self.position_reads = self.position_reads.saturating_add(1);
            self.tick_starts.push(Instant::now());
            if !self.read_delay.is_zero() {
                tokio::time::sleep(self.read_delay).await;
            }
            if self.fail_on.contains(&self.position_reads) {
                return Err(ReadError::Timeout {
                    op: "get_object_position",
                    timeout_ms: 5_000,
                });
            }
            self.inner.read_position(handle).await
        }

        async fn read_float_signal(&mut self, name: &str) -> Result<Option<f64>, ReadError> {
            self.inner.read_float_signal(name).await
        }

        async fn read_string_signal(&mut self, name: &str) -> Result<Option<String>, ReadError> {
            self.inner.read_string_signal(name).await
        }
    }

    async fn tracked(gateway: &mut FlakyGateway) -> Vec<TrackedRobot> {
        resolve_tracked_robots(gateway, &[String::from("SCOUT-1")])
            .await
            .unwrap()
    }

    async fn stop_after(control: Arc<RelayControl>, after: Duration) {
        tokio::time::sleep(after).await;
        control.request_stop();
    }

    #[tokio::test(start_paused = true)]
    async fn publishes_once_per_interval() {
        let mut gateway = FlakyGateway::new(&[]);
        let assembler = SnapshotAssembler::new(tracked(&mut gateway).await, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        let mut sink = RecordingSink::default();

        let (summary, ()) = tokio::join!(
            run_relay(&mut gateway, &assembler, &mut sink, &control),
            stop_after(Arc::clone(&control), Duration::from_millis(3_500)),
        );

        // Ticks at 0, 1000, 2000 and 3000 ms.
        assert_eq!(summary.ticks_attempted, 4);
        assert_eq!(summary.snapshots_published, 4);
        assert_eq!(sink.snapshots.len(), 4);
        assert_eq!(control.ticks_published(), 4);
        assert!(sink.snapshots.iter().all(|s| s.robots.len() == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_tick_is_skipped_and_loop_continues() {
        let mut gateway = FlakyGateway::new(&[2]);
        let assembler = SnapshotAssembler::new(tracked(&mut gateway).await, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        let mut sink = RecordingSink::default();

        let (summary, ()) = tokio::join!(
            run_relay(&mut gateway, &assembler, &mut sink, &control),
            stop_after(Arc::clone(&control), Duration::from_millis(3_500)),
        );

        assert_eq!(summary.ticks_attempted, 4);
        assert_eq!(summary.ticks_skipped, 1);
        assert_eq!(summary.snapshots_published, 3);
        assert_eq!(sink.snapshots.len(), 3);
        assert_eq!(control.ticks_skipped(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_tick_failing_never_ends_the_loop() {
        let mut gateway = FlakyGateway::new(&[1, 2, 3, 4, 5, 6]);
        let assembler = SnapshotAssembler::new(tracked(&mut gateway).await, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        let mut sink = RecordingSink::default();

        let (summary, ()) = tokio::join!(
            run_relay(&mut gateway, &assembler, &mut sink, &control),
            stop_after(Arc::clone(&control), Duration::from_millis(5_500)),
        );

        assert_eq!(summary.ticks_attempted, 6);
        assert_eq!(summary.ticks_skipped, 6);
        assert!(sink.snapshots.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn overrunning_ticks_are_delayed_not_overlapped() {
        let mut gateway = FlakyGateway::new(&[]);
        gateway.read_delay = Duration::from_millis(1_500);
        let assembler = SnapshotAssembler::new(tracked(&mut gateway).await, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        let mut sink = NoOpSink;
        let start = Instant::now();

        let (summary, ()) = tokio::join!(
            run_relay(&mut gateway, &assembler, &mut sink, &control),
            stop_after(Arc::clone(&control), Duration::from_millis(4_000)),
        );

        // Ticks start at 0, 1500 and 3000 ms; the stop lands mid-tick and
        // is honored once that tick finishes.
        assert_eq!(summary.ticks_attempted, 3);
        let offsets: Vec<u128> = gateway
            .tick_starts
            .iter()
            .map(|t| t.duration_since(start).as_millis())
            .collect();
        assert_eq!(offsets, [0, 1_500, 3_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_start_runs_no_ticks() {
        let mut gateway = FlakyGateway::new(&[]);
        let assembler = SnapshotAssembler::new(tracked(&mut gateway).await, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        control.request_stop();

        let summary = run_relay(&mut gateway, &assembler, &mut NoOpSink, &control).await;
        assert_eq!(summary, RelaySummary::default());
    }

    #[tokio::test(start_paused = true)]
    async fn unresolved_robot_is_absent_from_every_tick() {
        let mut gateway = FlakyGateway::new(&[]);
        let tracked = resolve_tracked_robots(
            &mut gateway,
            &[String::from("SCOUT-1"), String::from("SCOUT-2")],
        )
        .await
        .unwrap();
        let assembler = SnapshotAssembler::new(tracked, EnvironmentSignals::default());
        let control = Arc::new(RelayControl::new(1_000));
        let mut sink = RecordingSink::default();

        let (_summary, ()) = tokio::join!(
            run_relay(&mut gateway, &assembler, &mut sink, &control),
            stop_after(Arc::clone(&control), Duration::from_millis(2_500)),
        );

        assert_eq!(sink.snapshots.len(), 3);
        for snapshot in &sink.snapshots {
            let names: Vec<&str> = snapshot.robots.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(names, ["SCOUT-1"]);
        }
    }
}
