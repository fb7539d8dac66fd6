use chrono::{DateTime, Duration, Utc};
use stockfeed::buffer::TickBuffer;
use stockfeed::event::{AppEvent, WsConnectionStatus};
use stockfeed::model::tick::Tick;
use stockfeed::sound::Cue;
use stockfeed::storage::MemoryStore;
use stockfeed::ui::AppState;
use stockfeed::view::{Highlight, ViewConfig};

fn tick(symbol: &str, pct_vs_last_close: f64, received_at: DateTime<Utc>) -> Tick {
    Tick {
        symbol: symbol.to_string(),
        time: DateTime::parse_from_rfc3339("2025-03-03T14:30:00+00:00").unwrap(),
        price: 50.0,
        day_open: 49.0,
        pct_vs_day_open: 2.04082,
        pct_vs_last_close,
        direction: if pct_vs_last_close < 0.0 { "🔴" } else { "🟢" }.to_string(),
        received_at,
    }
}

fn app_state(now: DateTime<Utc>) -> AppState<MemoryStore> {
    AppState::new(
        TickBuffer::load(MemoryStore::new(), 20),
        ViewConfig::default(),
        now,
    )
}

#[test]
/// Verifies accepted ticks land in the buffer and the projected rows at once.
fn market_tick_updates_buffer_and_rows() {
    let now = Utc::now();
    let mut s = app_state(now);
    s.apply(AppEvent::MarketTick(tick("AAPL", 0.2, now)));
    s.apply(AppEvent::MarketTick(tick("MSFT", -0.1, now)));

    assert_eq!(s.tick_count, 2);
    assert_eq!(s.buffer.len(), 2);
    assert_eq!(s.rows().len(), 2);
    assert_eq!(s.rows()[0].highlight, Highlight::Loss);
}

#[test]
/// Verifies the recency pulse alone expires highlights.
fn pulse_reprojects_without_new_ticks() {
    let now = Utc::now();
    let mut s = app_state(now);
    s.apply(AppEvent::MarketTick(tick("AAPL", 0.2, now)));
    assert_eq!(s.rows()[0].highlight, Highlight::Gain);

    s.on_pulse(now + Duration::seconds(61));
    assert_eq!(s.rows()[0].highlight, Highlight::Band { shaded: false });
    assert_eq!(s.now(), now + Duration::seconds(61));
}

#[test]
/// Verifies sound cues stay silent until the user unlocks them.
fn sounds_require_unlock() {
    let now = Utc::now();
    let mut s = app_state(now);
    assert_eq!(s.apply(AppEvent::MarketTick(tick("AAPL", 0.2, now))), None);

    s.enable_sounds();
    s.enable_sounds();
    assert_eq!(
        s.apply(AppEvent::MarketTick(tick("AAPL", 0.2, now))),
        Some(Cue::Ding)
    );
    assert_eq!(
        s.apply(AppEvent::MarketTick(tick("AAPL", -0.2, now))),
        Some(Cue::Dong)
    );
    assert_eq!(s.apply(AppEvent::MarketTick(tick("AAPL", 0.0, now))), None);
    assert_eq!(
        s.log_messages.iter().filter(|m| *m == "Sounds enabled").count(),
        1
    );
}

#[test]
/// Verifies clear empties buffer and view and persists the erase.
fn clear_empties_buffer_and_rows() {
    let now = Utc::now();
    let mut s = app_state(now);
    s.apply(AppEvent::MarketTick(tick("AAPL", 0.2, now)));
    s.clear();
    assert!(s.buffer.is_empty());
    assert!(s.rows().is_empty());
    assert_eq!(s.tick_count, 1);
}

#[test]
/// Verifies connection status is tracked for the status bar indicator.
fn ws_status_events_are_tracked() {
    let mut s = app_state(Utc::now());
    assert_eq!(s.ws_status, WsConnectionStatus::Disconnected);

    s.apply(AppEvent::WsStatus(WsConnectionStatus::Connecting {
        attempt: 1,
        url: "ws://localhost:9001".to_string(),
    }));
    s.apply(AppEvent::WsStatus(WsConnectionStatus::Connected));
    assert_eq!(s.ws_status, WsConnectionStatus::Connected);

    s.apply(AppEvent::WsStatus(WsConnectionStatus::Reconnecting {
        attempt: 2,
        delay_ms: 3_000,
    }));
    assert!(matches!(
        s.ws_status,
        WsConnectionStatus::Reconnecting { attempt: 2, .. }
    ));
    assert!(s
        .log_messages
        .last()
        .is_some_and(|m| m.contains("attempt 2, wait 3000ms")));
}

#[test]
/// Verifies rejected frames are counted and logged but never touch the buffer.
fn rejected_frames_are_counted() {
    let mut s = app_state(Utc::now());
    s.apply(AppEvent::FrameRejected("missing field `price`".to_string()));
    assert_eq!(s.rejected_count, 1);
    assert!(s.buffer.is_empty());
    assert!(s.log_messages[0].starts_with("[WARN] Dropped frame"));
}

#[test]
fn log_panel_is_bounded() {
    let mut s = app_state(Utc::now());
    for i in 0..250 {
        s.apply(AppEvent::LogMessage(format!("line {}", i)));
    }
    assert_eq!(s.log_messages.len(), 200);
    assert_eq!(s.log_messages[0], "line 50");
}
