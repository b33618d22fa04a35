//! Streams AAC audio over HTTP, decodes it as it arrives and plays it on the
//! default output device.
//!
//! ```no_run
//! use aac_stream_player::AacPlayer;
//!
//! let player = AacPlayer::builder("http://example.com/live.aac").build()?;
//! player.start()?;
//! std::thread::sleep(std::time::Duration::from_secs(10));
//! player.request_stop();
//! # Ok::<(), aac_stream_player::PlayerError>(())
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod events;
pub mod net;
pub mod output;
pub mod player;
pub mod playlist;

#[cfg(test)]
mod testing;

pub use config::PlayerConfig;
pub use error::{ErrorKind, PlayerError, Result};
pub use events::{EventChannel, LogListener, PlayerEvent, PlayerListener};
pub use player::{AacPlayer, AacPlayerBuilder, SessionState};
