use crate::model::tick::Tick;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsConnectionStatus {
    Connecting { attempt: u32, url: String },
    Connected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    MarketTick(Tick),
    WsStatus(WsConnectionStatus),
    FrameRejected(String),
    LogMessage(String),
}
