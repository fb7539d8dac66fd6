use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// One feed update for a symbol.
///
/// `received_at` is stamped locally when the frame is decoded and is what the
/// view uses for recency; `time` is the feed's own bar timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub time: DateTime<FixedOffset>,
    pub price: f64,
    pub day_open: f64,
    pub pct_vs_day_open: f64,
    pub pct_vs_last_close: f64,
    pub direction: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl Tick {
    /// Move of `price` against the day open, in price units.
    pub fn change_vs_day_open(&self) -> f64 {
        self.price - self.day_open
    }

    /// Up/down signal relative to the previous bar close.
    pub fn direction_signal(&self) -> Direction {
        if self.pct_vs_last_close > 0.0 {
            Direction::Up
        } else if self.pct_vs_last_close < 0.0 {
            Direction::Down
        } else {
            Direction::Flat
        }
    }
}
