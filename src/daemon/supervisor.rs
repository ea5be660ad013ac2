use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    daemon::{
        storage::record_writer::{RotatingRecordWriter, WriteError},
        tracker::{Sample, SessionTracker},
    },
    utils::clock::Clock,
    window_api::WindowProbe,
};

/// Owns the poll cadence and the outer fault-containment loop. Probe, tracker and writer are
/// driven strictly in sequence, one tick at a time, so none of their state is ever shared.
pub struct ActivityDaemon {
    probe: Box<dyn WindowProbe>,
    tracker: SessionTracker,
    writer: RotatingRecordWriter,
    shutdown: CancellationToken,
    poll_interval: Duration,
    fault_cooldown: Duration,
    clock: Box<dyn Clock>,
}

impl ActivityDaemon {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        probe: Box<dyn WindowProbe>,
        tracker: SessionTracker,
        writer: RotatingRecordWriter,
        shutdown: CancellationToken,
        poll_interval: Duration,
        fault_cooldown: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            probe,
            tracker,
            writer,
            shutdown,
            poll_interval,
            fault_cooldown,
            clock,
        }
    }

    /// Executes the daemon event loop. The loop runs until cancelled; a failed tick only earns a
    /// longer sleep before the next one, the daemon is meant to outlive transient platform
    /// errors.
    ///
    /// Cancellation is observed between ticks. A session that is still open at that point is
    /// lost, nothing is force-closed on the way out.
    pub async fn run(mut self) -> Result<()> {
        info!("Started tracking foreground activity");
        let mut next_tick = self.clock.instant() + self.poll_interval;
        loop {
            match self.tick().await {
                Ok(()) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.clock.sleep_until(next_tick) => (),
                    }
                    next_tick += self.poll_interval;
                }
                Err(e) => {
                    error!(
                        "Tick failed, backing off for {:?}: {e:?}",
                        self.fault_cooldown
                    );
                    tokio::select! {
                        _ = self.shutdown.cancelled() => break,
                        _ = self.clock.sleep(self.fault_cooldown) => (),
                    }
                    next_tick = self.clock.instant() + self.poll_interval;
                }
            }
        }
        warn!("Activity tracking was interrupted, shutting down");
        Ok(())
    }

    /// One poll-sample-track-write cycle.
    async fn tick(&mut self) -> Result<()> {
        let snapshot = self.probe.current();
        let sample = Sample {
            window: snapshot.window,
            program: snapshot.program,
            timestamp: self.clock.time(),
        };

        let Some(session) = self.tracker.observe(&sample) else {
            return Ok(());
        };

        info!(
            "Recording {} s session of {}",
            session.duration_seconds(),
            session.window
        );
        match self.writer.append(&session).await {
            Err(WriteError::Contended(e)) => {
                // Best-effort telemetry: the record is dropped, not retried or buffered.
                error!("Record file is held by another writer, dropping record: {e}");
                Ok(())
            }
            other => Ok(other?),
        }
    }
}
