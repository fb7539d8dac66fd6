use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use crossterm::event::{Event, KeyEvent, KeyEventKind};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use stockfeed::buffer::TickBuffer;
use stockfeed::config::Config;
use stockfeed::event::AppEvent;
use stockfeed::feed::ws::FeedClient;
use stockfeed::input::{parse_main_command, UiCommand};
use stockfeed::sound::{AudioSink, TerminalBell};
use stockfeed::storage::{KeyValueStore, MemoryStore, SqliteStore};
use stockfeed::ticker::RecencyTicker;
use stockfeed::ui::{self, AppState};

type Store = Box<dyn KeyValueStore + Send>;

fn open_store(config: &Config) -> (Store, Option<String>) {
    match SqliteStore::open(&config.storage.path) {
        Ok(store) => {
            let store: Store = Box::new(store);
            (store, None)
        }
        Err(e) => {
            tracing::warn!(
                path = %config.storage.path.display(),
                error = %e,
                "Falling back to in-memory tick storage"
            );
            let store: Store = Box::new(MemoryStore::new());
            (
                store,
                Some(format!(
                    "[WARN] Storage unavailable ({}), history will not survive restart",
                    e
                )),
            )
        }
    }
}

fn spawn_input_reader(
    key_tx: mpsc::Sender<KeyEvent>,
    shutdown: watch::Receiver<bool>,
    poll_every: Duration,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || loop {
        if *shutdown.borrow() {
            break;
        }
        match crossterm::event::poll(poll_every) {
            Ok(true) => match crossterm::event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    if key_tx.blocking_send(key).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Terminal input read failed");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Terminal input poll failed");
                break;
            }
        }
    })
}

async fn run_ui(
    terminal: &mut ratatui::DefaultTerminal,
    app_state: &mut AppState<Store>,
    app_rx: &mut mpsc::Receiver<AppEvent>,
    key_rx: &mut mpsc::Receiver<KeyEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let mut ticker = RecencyTicker::default();
    let mut bell = TerminalBell;

    loop {
        terminal.draw(|frame| ui::render(frame, app_state))?;

        tokio::select! {
            Some(evt) = app_rx.recv() => {
                if let Some(cue) = app_state.apply(evt) {
                    bell.play(cue);
                }
                while let Ok(evt) = app_rx.try_recv() {
                    if let Some(cue) = app_state.apply(evt) {
                        bell.play(cue);
                    }
                }
            }
            now = ticker.tick() => app_state.on_pulse(now),
            Some(key) = key_rx.recv() => match parse_main_command(&key.code, key.modifiers) {
                Some(UiCommand::Quit) => {
                    tracing::info!("User quit");
                    return Ok(());
                }
                Some(UiCommand::ClearAll) => app_state.clear(),
                Some(UiCommand::EnableSounds) => app_state.enable_sounds(),
                None => {}
            },
            _ = shutdown.changed() => return Ok(()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set STOCKFEED_CONFIG or create config/default.toml");
            std::process::exit(1);
        }
    };

    // Init tracing (log to file so it doesn't interfere with TUI)
    let log_file = std::fs::File::create("stockfeed.log")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.logging.level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .json()
        .init();

    let resolver = config.feed.resolver();
    tracing::info!(
        endpoint = %resolver.resolve(),
        history_capacity = config.buffer.history_capacity,
        storage = %config.storage.path.display(),
        "Starting stockfeed"
    );

    let (store, store_warning) = open_store(&config);
    let buffer = TickBuffer::load(store, config.buffer.history_capacity);
    let mut app_state = AppState::new(buffer, config.view.view_config(), Utc::now());
    app_state.push_log(format!(
        "stockfeed started | {} ticks restored",
        app_state.buffer.len()
    ));
    if let Some(warning) = store_warning {
        app_state.push_log(warning);
    }

    // Channels
    let (app_tx, mut app_rx) = mpsc::channel::<AppEvent>(256);
    let (key_tx, mut key_rx) = mpsc::channel::<KeyEvent>(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut feed = FeedClient::new(resolver, config.feed.reconnect_delay(), app_tx);
    feed.start();

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let input_task = spawn_input_reader(
        key_tx,
        shutdown_rx.clone(),
        Duration::from_millis(config.ui.refresh_rate_ms),
    );

    let mut terminal = ratatui::init();
    let result = run_ui(
        &mut terminal,
        &mut app_state,
        &mut app_rx,
        &mut key_rx,
        shutdown_rx,
    )
    .await;

    let _ = shutdown_tx.send(true);
    feed.stop().await;
    drop(key_rx);
    if let Err(e) = input_task.await {
        tracing::warn!(error = %e, "Input reader task failed");
    }

    ratatui::restore();
    if let Err(e) = &result {
        tracing::error!(error = %e, "UI loop failed");
    }
    tracing::info!(buffered = app_state.buffer.len(), "Shutdown complete");
    println!("Goodbye! Check stockfeed.log for details.");
    result
}
