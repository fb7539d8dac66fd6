//! Derived presentation model over the tick buffer.
//!
//! [`project`] is pure: the same `(ticks, now, config)` always yields the same
//! rows, so it can be re-run on every buffer mutation and every ticker pulse.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::model::tick::Tick;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingPolicy {
    /// Groups with the largest `pct_vs_day_open` first; ties keep arrival order.
    #[default]
    MaxPctVsDayOpenDesc,
    SymbolAlphaAsc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightScheme {
    /// Stale rows alternate shading per symbol group.
    #[default]
    Banded,
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub per_symbol_cap: usize,
    pub recency_window: Duration,
    pub ranking: RankingPolicy,
    pub highlight: HighlightScheme,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            per_symbol_cap: 5,
            recency_window: Duration::from_secs(60),
            ranking: RankingPolicy::default(),
            highlight: HighlightScheme::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
    Zero,
}

impl Sign {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Sign::Positive
        } else if value < 0.0 {
            Sign::Negative
        } else {
            Sign::Zero
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    /// Recent and up against the last bar close.
    Gain,
    /// Recent and down against the last bar close.
    Loss,
    Band { shaded: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewRow {
    pub tick: Tick,
    pub group_index: usize,
    pub index_in_group: usize,
    pub is_recent: bool,
    pub highlight: Highlight,
    pub change_sign: Sign,
    pub pct_vs_day_open_sign: Sign,
    pub pct_vs_last_close_sign: Sign,
}

struct Group<'a> {
    symbol: &'a str,
    ticks: Vec<&'a Tick>,
}

impl Group<'_> {
    fn max_pct_vs_day_open(&self) -> f64 {
        self.ticks
            .iter()
            .map(|t| t.pct_vs_day_open)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

/// Recent means strictly younger than the window; a tick exactly `window` old
/// is stale. Ticks stamped in the future count as recent.
pub fn is_recent(received_at: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    let age_ms = now.signed_duration_since(received_at).num_milliseconds();
    age_ms < i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

/// Group newest-first `ticks` by symbol, cap each group, rank the groups and
/// flatten them into annotated display rows.
pub fn project(ticks: &[Tick], now: DateTime<Utc>, config: &ViewConfig) -> Vec<ViewRow> {
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut index_by_symbol: HashMap<&str, usize> = HashMap::new();

    for tick in ticks {
        let idx = *index_by_symbol
            .entry(tick.symbol.as_str())
            .or_insert_with(|| {
                groups.push(Group {
                    symbol: tick.symbol.as_str(),
                    ticks: Vec::new(),
                });
                groups.len() - 1
            });
        let group = &mut groups[idx];
        if group.ticks.len() < config.per_symbol_cap {
            group.ticks.push(tick);
        }
    }

    match config.ranking {
        RankingPolicy::MaxPctVsDayOpenDesc => groups.sort_by(|a, b| {
            b.max_pct_vs_day_open()
                .total_cmp(&a.max_pct_vs_day_open())
        }),
        RankingPolicy::SymbolAlphaAsc => groups.sort_by(|a, b| a.symbol.cmp(b.symbol)),
    }

    let mut rows = Vec::with_capacity(groups.iter().map(|g| g.ticks.len()).sum());
    for (group_index, group) in groups.iter().enumerate() {
        for (index_in_group, tick) in group.ticks.iter().enumerate() {
            let recent = is_recent(tick.received_at, now, config.recency_window);
            rows.push(ViewRow {
                tick: (*tick).clone(),
                group_index,
                index_in_group,
                is_recent: recent,
                highlight: highlight_for(tick, recent, group_index, config.highlight),
                change_sign: Sign::of(tick.change_vs_day_open()),
                pct_vs_day_open_sign: Sign::of(tick.pct_vs_day_open),
                pct_vs_last_close_sign: Sign::of(tick.pct_vs_last_close),
            });
        }
    }
    rows
}

fn highlight_for(tick: &Tick, recent: bool, group_index: usize, scheme: HighlightScheme) -> Highlight {
    if recent {
        match Sign::of(tick.pct_vs_last_close) {
            Sign::Positive => return Highlight::Gain,
            Sign::Negative => return Highlight::Loss,
            Sign::Zero => {}
        }
    }
    let shaded = match scheme {
        HighlightScheme::Banded => group_index % 2 == 1,
        HighlightScheme::Plain => false,
    };
    Highlight::Band { shaded }
}

/// Display formatting for the feed table and header.
pub mod format {
    use chrono::{DateTime, FixedOffset, Local, TimeZone};

    /// Bar time in the viewer's local clock, `HH:MM`.
    pub fn tick_time(time: &DateTime<FixedOffset>) -> String {
        tick_time_in(time, &Local)
    }

    pub fn tick_time_in<Tz: TimeZone>(time: &DateTime<FixedOffset>, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        time.with_timezone(tz).format("%H:%M").to_string()
    }

    pub fn price(value: f64) -> String {
        format!("{:.3}", value)
    }

    pub fn pct(value: f64) -> String {
        format!("{:.5}", value)
    }

    pub fn clock<Tz: TimeZone>(now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format("%H:%M:%S").to_string()
    }

    pub fn date<Tz: TimeZone>(now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        now.format("%Y-%m-%d").to_string()
    }
}
