use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::codec;
use super::connection::{Action, ConnectionEvent, ConnectionMachine, ConnectionState};
use super::endpoint::EndpointResolver;
use crate::error::AppError;
use crate::event::{AppEvent, WsConnectionStatus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_LOGGED_PAYLOAD: usize = 160;

enum Wake {
    Frame(Option<Result<Message, tungstenite::Error>>),
    RetryElapsed,
    Shutdown,
}

/// Drives one feed session: owns the socket, the retry timer and the
/// [`ConnectionMachine`], and forwards decoded ticks in arrival order.
pub struct FeedConnection {
    resolver: Arc<dyn EndpointResolver>,
    machine: ConnectionMachine,
    events: mpsc::Sender<AppEvent>,
    socket: Option<WsStream>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl FeedConnection {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        retry_delay: Duration,
        events: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            resolver,
            machine: ConnectionMachine::new(retry_delay),
            events,
            socket: None,
            retry: None,
        }
    }

    /// Run until `shutdown` flips (or its sender is dropped). Connection
    /// failures are retried forever with a constant delay and never returned.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut queue = VecDeque::from([ConnectionEvent::Start]);

        loop {
            while let Some(event) = queue.pop_front() {
                let before = self.machine.state();
                let actions = self.machine.handle(event);
                if self.machine.state() != before {
                    self.publish_status(&mut shutdown).await;
                }
                for action in actions {
                    if let Some(follow_up) = self.execute(action, &mut shutdown).await {
                        queue.push_back(follow_up);
                    }
                }
            }

            if self.machine.state() == ConnectionState::Stopped {
                break;
            }
            if *shutdown.borrow() {
                queue.push_back(ConnectionEvent::Stop);
                continue;
            }

            let wake = tokio::select! {
                frame = next_frame(&mut self.socket) => Wake::Frame(frame),
                _ = wait_retry(&mut self.retry) => Wake::RetryElapsed,
                _ = shutdown.changed() => Wake::Shutdown,
            };

            let event = match wake {
                Wake::Frame(frame) => self.on_frame(frame, &mut shutdown).await,
                Wake::RetryElapsed => {
                    self.retry = None;
                    Some(ConnectionEvent::RetryElapsed)
                }
                Wake::Shutdown => Some(ConnectionEvent::Stop),
            };
            queue.extend(event);
        }

        tracing::info!(attempts = self.machine.attempt(), "Feed connection stopped");
    }

    async fn execute(
        &mut self,
        action: Action,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<ConnectionEvent> {
        match action {
            Action::Open => {
                let url = self.resolver.resolve();
                let attempt = self.machine.attempt();
                tracing::info!(url = %url, attempt, "Connecting to feed");
                let connecting = WsConnectionStatus::Connecting {
                    attempt,
                    url: url.clone(),
                };
                if !self.emit(AppEvent::WsStatus(connecting), shutdown).await {
                    return Some(ConnectionEvent::Stop);
                }
                let connected = tokio::select! {
                    res = tokio_tungstenite::connect_async(url.as_str()) => res,
                    _ = shutdown.changed() => return Some(ConnectionEvent::Stop),
                };
                match connected {
                    Ok((stream, _resp)) => {
                        self.socket = Some(stream);
                        self.log(format!("Connected to {}", url), shutdown).await;
                        Some(ConnectionEvent::Opened)
                    }
                    Err(e) => {
                        let err = AppError::WebSocket(format!("connect failed: {}", e));
                        tracing::warn!(url = %url, error = %err, "Feed connect failed");
                        self.log(err.to_string(), shutdown).await;
                        Some(ConnectionEvent::Errored(err.to_string()))
                    }
                }
            }
            Action::CloseSocket => {
                if let Some(mut socket) = self.socket.take() {
                    match tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await {
                        Ok(Err(e)) => tracing::debug!(error = %e, "WebSocket close failed"),
                        Err(_) => tracing::debug!("WebSocket close timed out"),
                        Ok(Ok(())) => {}
                    }
                }
                None
            }
            Action::ScheduleRetry(delay) => {
                debug_assert!(self.retry.is_none(), "reconnect timer already pending");
                self.retry = Some(Box::pin(tokio::time::sleep(delay)));
                None
            }
            Action::CancelRetry => {
                self.retry = None;
                None
            }
        }
    }

    async fn on_frame(
        &mut self,
        frame: Option<Result<Message, tungstenite::Error>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<ConnectionEvent> {
        match frame {
            Some(Ok(Message::Text(text))) => self.dispatch(&text, shutdown).await,
            Some(Ok(Message::Close(close))) => {
                tracing::info!(frame = ?close, "Feed server closed the connection");
                self.socket = None;
                Some(ConnectionEvent::Closed)
            }
            // Pings are answered by tungstenite; binary frames are not part of the feed.
            Some(Ok(_)) => None,
            Some(Err(e)) => {
                let err = AppError::WebSocket(format!("read error: {}", e));
                tracing::warn!(error = %err, "Feed socket error");
                self.log(err.to_string(), shutdown).await;
                Some(ConnectionEvent::Errored(err.to_string()))
            }
            None => {
                tracing::info!("Feed stream ended");
                self.socket = None;
                Some(ConnectionEvent::Closed)
            }
        }
    }

    async fn dispatch(
        &mut self,
        payload: &str,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<ConnectionEvent> {
        match codec::decode(payload, Utc::now()) {
            Ok(tick) => {
                if !self.emit(AppEvent::MarketTick(tick), shutdown).await {
                    tracing::info!("Tick not delivered, stopping feed");
                    return Some(ConnectionEvent::Stop);
                }
            }
            Err(e) => {
                let err = AppError::from(e);
                tracing::warn!(
                    error = %err,
                    payload = %truncate(payload, MAX_LOGGED_PAYLOAD),
                    "Dropping malformed feed frame"
                );
                self.emit(AppEvent::FrameRejected(err.to_string()), shutdown).await;
            }
        }
        None
    }

    async fn publish_status(&self, shutdown: &mut watch::Receiver<bool>) {
        let status = match self.machine.state() {
            // Announced by the `Open` action, which knows the resolved URL.
            ConnectionState::Connecting => return,
            ConnectionState::Connected => WsConnectionStatus::Connected,
            ConnectionState::RetryPending => WsConnectionStatus::Reconnecting {
                attempt: self.machine.attempt() + 1,
                delay_ms: self.machine.retry_delay().as_millis() as u64,
            },
            ConnectionState::Disconnected | ConnectionState::Stopped => {
                WsConnectionStatus::Disconnected
            }
        };
        self.emit(AppEvent::WsStatus(status), shutdown).await;
    }

    async fn log(&self, msg: String, shutdown: &mut watch::Receiver<bool>) {
        self.emit(AppEvent::LogMessage(msg), shutdown).await;
    }

    /// Deliver `event` in order, unless shutdown is signalled first. Once
    /// shutting down, events are only sent if the channel has room.
    /// Returns whether the event was delivered.
    async fn emit(&self, event: AppEvent, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return self.events.try_send(event).is_ok();
        }
        tokio::select! {
            res = self.events.send(event) => res.is_ok(),
            _ = shutdown.changed() => false,
        }
    }
}

async fn next_frame(socket: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match socket {
        Some(stream) => stream.next().await,
        None => pending().await,
    }
}

async fn wait_retry(retry: &mut Option<Pin<Box<Sleep>>>) {
    match retry {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Owned handle over a background [`FeedConnection`] task.
///
/// `start` spawns at most one session; `stop` signals shutdown and waits for
/// the task to exit, so no socket or timer can fire afterwards.
pub struct FeedClient {
    resolver: Arc<dyn EndpointResolver>,
    retry_delay: Duration,
    events: mpsc::Sender<AppEvent>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl FeedClient {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        retry_delay: Duration,
        events: mpsc::Sender<AppEvent>,
    ) -> Self {
        Self {
            resolver,
            retry_delay,
            events,
            shutdown_tx: None,
            task: None,
        }
    }

    /// Returns `false` when a session is already running.
    pub fn start(&mut self) -> bool {
        if self.task.is_some() {
            return false;
        }
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection = FeedConnection::new(
            Arc::clone(&self.resolver),
            self.retry_delay,
            self.events.clone(),
        );
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(tokio::spawn(connection.run(shutdown_rx)));
        true
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
                tracing::warn!("Feed task did not stop in time, aborting");
                task.abort();
            }
        }
    }
}
