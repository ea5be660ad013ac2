use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use storage::record_writer::RotatingRecordWriter;
use supervisor::ActivityDaemon;
use tokio_util::sync::CancellationToken;
use tracker::SessionTracker;
use tracing::error;

use crate::{
    utils::clock::{Clock, DefaultClock},
    window_api::{GenericUrlProbe, GenericWindowProbe, UrlProbe, WindowProbe},
};

pub mod args;
pub mod shutdown;
pub mod storage;
pub mod supervisor;
pub mod tracker;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How long the loop backs off after a failed tick before resuming.
pub const FAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Construction inputs of the daemon core. Everything else (probe selection, logging, shutdown
/// signals) is wired up internally.
pub struct DaemonConfig {
    pub base_name: String,
    pub rotate_size: u64,
    pub poll_interval: Duration,
}

/// Represents the starting point for the daemon.
pub async fn start_daemon(dir: PathBuf, config: DaemonConfig) -> Result<()> {
    std::env::set_current_dir("/")?;

    let shutdown_token = CancellationToken::new();

    let daemon = create_daemon(
        dir.join("activities"),
        config,
        GenericWindowProbe::new(),
        GenericUrlProbe::new(),
        &shutdown_token,
        DefaultClock,
    )
    .await?;

    let (_, run_result) = tokio::join!(shutdown::detect_shutdown(shutdown_token), daemon.run());

    if let Err(run_result) = run_result {
        error!("Daemon loop got an error {:?}", run_result);
    }

    Ok(())
}

async fn create_daemon(
    record_dir: PathBuf,
    config: DaemonConfig,
    probe: impl WindowProbe + 'static,
    url_probe: impl UrlProbe + 'static,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> Result<ActivityDaemon> {
    let writer =
        RotatingRecordWriter::open(record_dir, &config.base_name, config.rotate_size).await?;
    let tracker = SessionTracker::new(Box::new(url_probe));
    Ok(ActivityDaemon::new(
        Box::new(probe),
        tracker,
        writer,
        shutdown_token.clone(),
        config.poll_interval,
        FAULT_COOLDOWN,
        Box::new(clock),
    ))
}

#[cfg(test)]
mod daemon_tests {
    use std::{fs, time::Duration};

    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Local, TimeZone};
    use tempfile::tempdir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        daemon::{
            create_daemon,
            storage::{
                record_writer::DEFAULT_ROTATE_SIZE,
                session::{Session, RECORD_DELIMITER, RECORD_HEADER},
            },
            DaemonConfig,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
        window_api::{ForegroundSnapshot, MockUrlProbe, MockWindowProbe},
    };

    fn test_items() -> Vec<ForegroundSnapshot> {
        vec![
            ForegroundSnapshot {
                window: Some("alpha".into()),
                program: Some("alpha process".into()),
            },
            ForegroundSnapshot {
                window: Some("alpha".into()),
                program: Some("alpha process".into()),
            },
            ForegroundSnapshot {
                window: Some("beta".into()),
                program: Some("beta process".into()),
            },
        ]
    }

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Local>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Local> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: tokio::time::Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    /// Very simple smoke test to check if the whole pipeline works together. Runs the real loop
    /// against mocked probes for a few seconds of wall-clock time.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let mut probe = MockWindowProbe::new();
        let mut items = test_items().into_iter().cycle();
        probe
            .expect_current()
            .returning(move || items.next().unwrap())
            .times(..8);

        let mut url_probe = MockUrlProbe::new();
        url_probe.expect_current().returning(|_| (None, None));

        let shutdown_token = CancellationToken::new();
        let dir = tempdir()?;

        let daemon = create_daemon(
            dir.path().to_path_buf(),
            DaemonConfig {
                base_name: "test".into(),
                rotate_size: DEFAULT_ROTATE_SIZE,
                poll_interval: Duration::from_secs(1),
            },
            probe,
            url_probe,
            &shutdown_token,
            TestClock {
                start_time: Local.with_ymd_and_hms(2018, 7, 4, 0, 0, 0).unwrap(),
                reference: Instant::now(),
            },
        )
        .await?;

        let (_, run_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(5500)).await;
                shutdown_token.cancel()
            },
            daemon.run(),
        );

        run_result?;

        // Ticks at seconds 0..=5 over windows cycling [alpha, alpha, beta] produce transitions
        // at seconds 2, 3 and 5. The beta run open at shutdown is lost.
        let content = fs::read_to_string(dir.path().join("test-001.csv"))?;
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), RECORD_HEADER.join(RECORD_DELIMITER));

        let sessions: Vec<_> = lines
            .map(|line| Session::parse_record_line(line).unwrap())
            .collect();
        assert_eq!(
            sessions
                .iter()
                .map(|s| (s.window.as_ref(), s.duration_seconds()))
                .collect::<Vec<_>>(),
            vec![("alpha", 2), ("beta", 1), ("alpha", 2)]
        );
        Ok(())
    }
}
