use std::io::Write;

use crate::model::tick::{Direction, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Ding,
    Dong,
}

pub trait AudioSink {
    fn play(&mut self, cue: Cue);
}

/// Rings the terminal bell; the TUI has no richer audio channel.
#[derive(Debug, Default)]
pub struct TerminalBell;

impl AudioSink for TerminalBell {
    fn play(&mut self, cue: Cue) {
        let mut out = std::io::stdout();
        let bell: &[u8] = match cue {
            Cue::Ding => b"\x07",
            Cue::Dong => b"\x07\x07",
        };
        if let Err(e) = out.write_all(bell).and_then(|_| out.flush()) {
            tracing::debug!(error = %e, ?cue, "Failed to ring terminal bell");
        }
    }
}

/// Sounds stay silent until the user unlocks them once.
#[derive(Debug, Default)]
pub struct SoundGate {
    enabled: bool,
}

impl SoundGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns `true` only on the call that actually unlocked sounds.
    pub fn enable(&mut self) -> bool {
        let changed = !self.enabled;
        self.enabled = true;
        changed
    }

    pub fn cue_for(&self, tick: &Tick) -> Option<Cue> {
        if !self.enabled {
            return None;
        }
        match tick.direction_signal() {
            Direction::Up => Some(Cue::Ding),
            Direction::Down => Some(Cue::Dong),
            Direction::Flat => None,
        }
    }
}
