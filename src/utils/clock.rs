use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::utils::time::truncate_to_seconds;

/// Represents an entity responsible for providing time across the application. This allows it to
/// be swapped out for testing.
///
/// Record timestamps are local wall-clock time, so [Clock::time] hands out [Local] dates.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Local>;

    fn instant(&self) -> Instant;

    async fn sleep(&self, duration: Duration);

    async fn sleep_until(&self, instant: tokio::time::Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Local> {
        truncate_to_seconds(Local::now())
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
