//! Session notifications.

use std::sync::Arc;

use log::{error, info};
use tokio::sync::watch;

use crate::error::PlayerError;

/// Receives session notifications in the order start, streaming once audio
/// is flowing, then at most one error, then stop. A session that fails
/// reports the error and ends without a stop notification.
pub trait PlayerListener: Send + Sync {
    fn on_start(&self) {}

    /// The decoder and the audio output are ready and playback has begun.
    fn on_streaming(&self) {}

    fn on_error(&self, _error: &PlayerError) {}

    fn on_stop(&self) {}
}

impl<L: PlayerListener + ?Sized> PlayerListener for Arc<L> {
    fn on_start(&self) {
        (**self).on_start()
    }

    fn on_streaming(&self) {
        (**self).on_streaming()
    }

    fn on_error(&self, error: &PlayerError) {
        (**self).on_error(error)
    }

    fn on_stop(&self) {
        (**self).on_stop()
    }
}

/// Writes every notification to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl PlayerListener for LogListener {
    fn on_start(&self) {
        info!("Playback started");
    }

    fn on_streaming(&self) {
        info!("Audio is streaming");
    }

    fn on_error(&self, error: &PlayerError) {
        error!("Playback failed: {}", error);
    }

    fn on_stop(&self) {
        info!("Playback stopped");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    Idle,
    Started,
    Streaming,
    Error(String),
    Stopped,
}

impl PlayerEvent {
    /// True once the session can no longer produce audio.
    pub fn is_final(&self) -> bool {
        matches!(self, PlayerEvent::Error(_) | PlayerEvent::Stopped)
    }
}

/// Publishes notifications as the latest [`PlayerEvent`] on a watch channel,
/// for front ends that poll.
pub struct EventChannel {
    sender: watch::Sender<PlayerEvent>,
}

impl EventChannel {
    pub fn new() -> (Self, watch::Receiver<PlayerEvent>) {
        let (sender, receiver) = watch::channel(PlayerEvent::Idle);
        (Self { sender }, receiver)
    }

    fn publish(&self, event: PlayerEvent) {
        // No receivers left is fine; nobody is watching anymore.
        let _ = self.sender.send(event);
    }
}

impl PlayerListener for EventChannel {
    fn on_start(&self) {
        self.publish(PlayerEvent::Started);
    }

    fn on_streaming(&self) {
        self.publish(PlayerEvent::Streaming);
    }

    fn on_error(&self, error: &PlayerError) {
        self.publish(PlayerEvent::Error(error.to_string()));
    }

    fn on_stop(&self) {
        self.publish(PlayerEvent::Stopped);
    }
}
