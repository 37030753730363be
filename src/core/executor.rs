//! The driving loop.
//!
//! Once per cycle the `Executor` samples the sensor, makes sure the collector
//! link is usable and emits the reading. Cycles start on a fixed cadence:
//! the time spent sampling and connecting is subtracted from the pause that
//! follows. Failures at any step only cost the current cycle.

use std::fmt;

use thermonode_socket::{ConnectionManager, Connector, TransferError};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::sensor::{Reading, Sampler, SensorError};

/// What a single cycle achieved.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The reading reached the collector.
    Emitted(Reading),
    /// Sampling failed; nothing was sent.
    SensorFault(SensorError),
    /// The link could not be brought up within the connect deadline.
    Offline,
    /// The link was up but the emit failed.
    EmitFailed(TransferError),
}

impl CycleOutcome {
    pub fn is_emitted(&self) -> bool {
        matches!(self, CycleOutcome::Emitted(_))
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::Emitted(_) => f.write_str("emitted"),
            CycleOutcome::SensorFault(_) => f.write_str("sensor fault"),
            CycleOutcome::Offline => f.write_str("offline"),
            CycleOutcome::EmitFailed(_) => f.write_str("emit failed"),
        }
    }
}

/// Running totals, logged on shutdown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleStats {
    pub cycles: u64,
    pub emitted: u64,
    pub sensor_faults: u64,
    pub offline: u64,
    pub emit_failures: u64,
}

impl CycleStats {
    fn record(&mut self, outcome: &CycleOutcome) {
        self.cycles += 1;
        match outcome {
            CycleOutcome::Emitted(_) => self.emitted += 1,
            CycleOutcome::SensorFault(_) => self.sensor_faults += 1,
            CycleOutcome::Offline => self.offline += 1,
            CycleOutcome::EmitFailed(_) => self.emit_failures += 1,
        }
    }
}

/// Drives sampling and delivery on a fixed cadence until cancelled.
pub struct Executor<S, C: Connector> {
    sampler: S,
    connection: ConnectionManager<C>,
    interval: Duration,
    cancel: CancellationToken,
    stats: CycleStats,
}

impl<S, C> Executor<S, C>
where
    S: Sampler,
    C: Connector,
{
    /// Creates an executor that starts a cycle every `interval`.
    pub fn new(
        sampler: S,
        connection: ConnectionManager<C>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sampler,
            connection,
            interval,
            cancel,
            stats: CycleStats::default(),
        }
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.connection
    }

    /// Runs cycles until the cancellation token fires, then closes the link.
    ///
    /// Cancellation interrupts both an in-flight cycle and the pause between
    /// cycles. Returns the accumulated statistics.
    pub async fn run(mut self) -> CycleStats {
        let cancel = self.cancel.clone();
        info!(
            "Telemetry loop started (interval: {}s)",
            self.interval.as_secs_f64()
        );

        loop {
            let start = Instant::now();

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.run_cycle() => {
                    debug!("Cycle finished: {}", outcome);
                }
            }

            let elapsed = start.elapsed();
            if elapsed < self.interval {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.interval - elapsed) => {}
                }
            } else {
                warn!(
                    "Cycle took {:?}, longer than the {:?} interval",
                    elapsed, self.interval
                );
            }
        }

        info!("Telemetry loop stopping, closing collector link");
        self.connection.disconnect().await;
        info!(
            "Cycles: {}, emitted: {}, sensor faults: {}, offline: {}, emit failures: {}",
            self.stats.cycles,
            self.stats.emitted,
            self.stats.sensor_faults,
            self.stats.offline,
            self.stats.emit_failures
        );
        self.stats
    }

    /// Runs exactly one sample, connect and emit cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let outcome = self.cycle().await;
        self.stats.record(&outcome);
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        let reading = match self.sampler.sample().await {
            Ok(reading) => reading,
            Err(e) => {
                error!("Sensor read failed, skipping cycle: {}", e);
                return CycleOutcome::SensorFault(e);
            }
        };

        let deadline = self.connection.config().connect_timeout();
        let state = self.connection.ensure_connected(deadline).await;
        if !state.is_connected() {
            warn!("Collector unreachable ({}), reading dropped", state);
            return CycleOutcome::Offline;
        }

        match self.connection.emit(&reading).await {
            Ok(()) => {
                debug!("Reading {} sent", reading.id());
                CycleOutcome::Emitted(reading)
            }
            Err(e) => {
                error!("Failed to send reading: {}", e);
                CycleOutcome::EmitFailed(e)
            }
        }
    }
}
