pub mod dashboard;

use chrono::{DateTime, Local, Utc};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::Frame;

use crate::buffer::TickBuffer;
use crate::event::{AppEvent, WsConnectionStatus};
use crate::sound::{Cue, SoundGate};
use crate::storage::KeyValueStore;
use crate::view::{self, ViewConfig, ViewRow};

use dashboard::{FeedTable, KeybindBar, LogPanel, StatusBar};

const MAX_LOG_MESSAGES: usize = 200;

pub struct AppState<S: KeyValueStore> {
    pub buffer: TickBuffer<S>,
    pub view_config: ViewConfig,
    pub ws_status: WsConnectionStatus,
    pub sounds: SoundGate,
    pub tick_count: u64,
    pub rejected_count: u64,
    pub log_messages: Vec<String>,
    now: DateTime<Utc>,
    rows: Vec<ViewRow>,
}

impl<S: KeyValueStore> AppState<S> {
    pub fn new(buffer: TickBuffer<S>, view_config: ViewConfig, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            buffer,
            view_config,
            ws_status: WsConnectionStatus::Disconnected,
            sounds: SoundGate::new(),
            tick_count: 0,
            rejected_count: 0,
            log_messages: Vec::new(),
            now,
            rows: Vec::new(),
        };
        state.refresh_view();
        state
    }

    pub fn rows(&self) -> &[ViewRow] {
        &self.rows
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn push_log(&mut self, msg: String) {
        self.log_messages.push(msg);
        if self.log_messages.len() > MAX_LOG_MESSAGES {
            self.log_messages.remove(0);
        }
    }

    /// Recency pulse: move the clock and re-project so highlights expire.
    pub fn on_pulse(&mut self, now: DateTime<Utc>) {
        self.now = now;
        self.refresh_view();
    }

    pub fn clear(&mut self) {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.refresh_view();
        self.push_log(format!("Cleared {} ticks", dropped));
    }

    pub fn enable_sounds(&mut self) {
        if self.sounds.enable() {
            self.push_log("Sounds enabled".to_string());
        }
    }

    /// Apply one event; returns the sound cue an accepted tick should trigger.
    pub fn apply(&mut self, event: AppEvent) -> Option<Cue> {
        match event {
            AppEvent::MarketTick(tick) => {
                let cue = self.sounds.cue_for(&tick);
                self.tick_count += 1;
                self.buffer.push(tick);
                self.refresh_view();
                return cue;
            }
            AppEvent::WsStatus(status) => {
                match &status {
                    WsConnectionStatus::Connecting { attempt, url } => {
                        self.push_log(format!("Connecting to {} (attempt {})", url, attempt));
                    }
                    WsConnectionStatus::Connected => {
                        self.push_log("WebSocket Connected".to_string());
                    }
                    WsConnectionStatus::Reconnecting { attempt, delay_ms } => {
                        self.push_log(format!(
                            "[WARN] Reconnecting (attempt {}, wait {}ms)",
                            attempt, delay_ms
                        ));
                    }
                    WsConnectionStatus::Disconnected => {
                        self.push_log("[WARN] WebSocket Disconnected".to_string());
                    }
                }
                self.ws_status = status;
            }
            AppEvent::FrameRejected(reason) => {
                self.rejected_count += 1;
                self.push_log(format!("[WARN] Dropped frame: {}", reason));
            }
            AppEvent::LogMessage(msg) => {
                self.push_log(msg);
            }
        }
        None
    }

    fn refresh_view(&mut self) {
        self.rows = view::project(self.buffer.snapshot(), self.now, &self.view_config);
    }
}

pub fn render<S: KeyValueStore>(frame: &mut Frame, state: &AppState<S>) {
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Min(6),    // feed table
            Constraint::Length(6), // system log
            Constraint::Length(1), // keybinds
        ])
        .split(frame.area());

    let local_now = state.now().with_timezone(&Local);
    frame.render_widget(
        StatusBar {
            date: view::format::date(&local_now),
            clock: view::format::clock(&local_now),
            ws_status: &state.ws_status,
            tick_count: state.tick_count,
            buffered: state.buffer.len(),
            capacity: state.buffer.capacity(),
            rejected: state.rejected_count,
            persist_failures: state.buffer.persist_failures(),
        },
        outer[0],
    );

    frame.render_widget(FeedTable::new(state.rows()), outer[1]);
    frame.render_widget(LogPanel::new(&state.log_messages), outer[2]);
    frame.render_widget(
        KeybindBar {
            sounds_enabled: state.sounds.is_enabled(),
        },
        outer[3],
    );
}
