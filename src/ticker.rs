use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Interval, MissedTickBehavior};

pub const RECENCY_TICK: Duration = Duration::from_secs(1);

/// Periodic pulse that makes the view re-evaluate recency even when no ticks
/// arrive. Missed pulses are skipped rather than replayed in a burst.
pub struct RecencyTicker {
    interval: Interval,
}

impl RecencyTicker {
    pub fn new(period: Duration) -> Self {
        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    /// Wait for the next pulse and return the wall-clock time it fired at.
    pub async fn tick(&mut self) -> DateTime<Utc> {
        self.interval.tick().await;
        Utc::now()
    }
}

impl Default for RecencyTicker {
    fn default() -> Self {
        Self::new(RECENCY_TICK)
    }
}
