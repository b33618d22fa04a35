mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use aac_stream_player::net::HttpConnector;
use aac_stream_player::{playlist, AacPlayer, EventChannel, PlayerConfig, PlayerEvent};
use anyhow::Result;
use app::AppController;
use clap::Parser;
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::info;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::sleep;

/// Play an AAC stream from an HTTP URL.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Stream URL, or a .pls/.m3u playlist pointing at one
    url: String,

    /// JSON file with player settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Network read timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Capacity of the encoded-byte buffer
    #[arg(long)]
    buffer_bytes: Option<usize>,

    /// Log events instead of drawing the terminal UI
    #[arg(long)]
    headless: bool,
}

impl Args {
    fn player_config(&self) -> Result<PlayerConfig> {
        let mut config = match &self.config {
            Some(path) => PlayerConfig::load(path)?,
            None => PlayerConfig::default(),
        };
        if let Some(timeout_ms) = self.timeout_ms {
            config.read_timeout_ms = timeout_ms;
        }
        if let Some(buffer_bytes) = self.buffer_bytes {
            config.buffer_capacity = buffer_bytes;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let config = args.player_config()?;

    let client = reqwest::Client::new();
    let url = playlist::resolve_stream_url(&client, &args.url).await?;
    info!("Streaming from {}", url);

    let (events, receiver) = EventChannel::new();
    let player = AacPlayer::builder(url.clone())
        .config(config)
        .connector(HttpConnector::with_handle(Handle::current()))
        .listener(events)
        .build()?;

    if args.headless {
        return run_headless(player, receiver).await;
    }

    // Set up panic handler to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app_controller = AppController::new(url, player, receiver);
    let res = match app_controller.initialize() {
        Ok(()) => run_app(&mut terminal, &mut app_controller).await,
        Err(e) => Err(e),
    };

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app_controller.shutdown();
    res
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_controller: &mut AppController,
) -> Result<()> {
    loop {
        app_controller.sync_events();

        // Render UI
        if let Err(_e) = terminal.draw(|f| ui::render_ui(f, &app_controller.ui_app)) {
            break;
        }

        // Handle input with shorter timeout for better responsiveness
        if event::poll(Duration::from_millis(50))? {
            match event::read() {
                Ok(Event::Key(key)) => {
                    if app_controller.handle_key_event(key.code).await? {
                        break; // Quit was requested
                    }
                }
                Ok(_) => {}  // Resize redraws on the next pass
                Err(_) => {} // Ignore read errors
            }
        }

        // Small delay to prevent high CPU usage but keep responsive
        sleep(Duration::from_millis(16)).await;

        if app_controller.should_quit() {
            break;
        }
    }

    Ok(())
}

async fn run_headless(player: AacPlayer, mut events: watch::Receiver<PlayerEvent>) -> Result<()> {
    player.start()?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping playback");
                break;
            }
            changed = events.changed() => {
                if changed.is_err() {
                    break;
                }
                let event = events.borrow_and_update().clone();
                info!("Player event: {:?}", event);
                if event.is_final() {
                    break;
                }
            }
        }
    }

    tokio::task::block_in_place(|| {
        player.request_stop();
        player.join();
    });
    Ok(())
}
