use aac_stream_player::{AacPlayer, PlayerEvent};
use anyhow::Result;
use crossterm::event::KeyCode;
use log::debug;
use tokio::sync::watch;

use crate::ui::UIState as UIApp;

const VOLUME_STEP: f32 = 0.1;
const BALANCE_STEP: f32 = 0.1;

/// Left and right gains for a master volume and a balance position.
/// Panning toward one side attenuates the other.
pub fn stereo_gains(volume: f32, balance: f32) -> (f32, f32) {
    let volume = volume.clamp(0.0, 1.0);
    let balance = balance.clamp(-1.0, 1.0);
    let left = volume * (1.0 - balance.max(0.0));
    let right = volume * (1.0 + balance.min(0.0));
    (left, right)
}

pub struct AppController {
    pub ui_app: UIApp,
    player: AacPlayer,
    events: watch::Receiver<PlayerEvent>,
}

impl AppController {
    pub fn new(url: String, player: AacPlayer, events: watch::Receiver<PlayerEvent>) -> Self {
        Self {
            ui_app: UIApp::new(url),
            player,
            events,
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.player.start()?;
        self.apply_volume();
        Ok(())
    }

    pub async fn handle_key_event(&mut self, key_code: KeyCode) -> Result<bool> {
        match key_code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('Q') => {
                self.stop();
                self.ui_app.quit();
                return Ok(true);
            }
            KeyCode::Char('s') | KeyCode::Char('S') => {
                self.stop();
            }
            KeyCode::Up => {
                self.ui_app.volume = (self.ui_app.volume + VOLUME_STEP).min(1.0);
                self.apply_volume();
            }
            KeyCode::Down => {
                self.ui_app.volume = (self.ui_app.volume - VOLUME_STEP).max(0.0);
                self.apply_volume();
            }
            KeyCode::Left => {
                self.ui_app.balance = (self.ui_app.balance - BALANCE_STEP).max(-1.0);
                self.apply_volume();
            }
            KeyCode::Right => {
                self.ui_app.balance = (self.ui_app.balance + BALANCE_STEP).min(1.0);
                self.apply_volume();
            }
            _ => {}
        }
        Ok(false)
    }

    /// Pull the latest player event into the UI state.
    pub fn sync_events(&mut self) {
        if self.events.has_changed().unwrap_or(false) {
            let event = self.events.borrow_and_update().clone();
            debug!("Updating player status in ui_app: {:?}", event);
            self.ui_app.event = event;
        }
    }

    pub fn should_quit(&self) -> bool {
        self.ui_app.should_quit
    }

    /// Stop playback and wait for the decoding thread.
    pub fn shutdown(&self) {
        tokio::task::block_in_place(|| {
            self.player.request_stop();
            self.player.join();
        });
    }

    fn stop(&mut self) {
        if !self.player.is_playing() {
            return;
        }
        self.ui_app.status_message = "Stopping…".to_string();
        // Waits on the session lock while a decode round finishes.
        tokio::task::block_in_place(|| self.player.request_stop());
        self.ui_app.status_message.clear();
    }

    fn apply_volume(&self) {
        let (left, right) = stereo_gains(self.ui_app.volume, self.ui_app.balance);
        self.player.set_volume(left, right);
    }
}
