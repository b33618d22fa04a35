//! Error taxonomy shared by the player, its collaborators and listeners.

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// Non-success HTTP status or connection failure while opening the stream.
    #[error("cannot connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("cannot get data from streaming server at {0}")]
    EmptyStream(String),

    /// The buffered prefix did not contain a usable stream header.
    #[error("cannot initialize decoder: {0}")]
    CodecInit(String),

    /// No buffer size produced a usable output device.
    #[error("cannot initialize audio output: {0}")]
    AudioInit(String),

    #[error("error while decoding: {0}")]
    Decode(String),

    #[error("stream i/o failed: {0}")]
    Io(#[from] io::Error),

    #[error("cannot restart player, please create a new instance")]
    AlreadyStopped,

    #[error("player is already running")]
    AlreadyStarted,

    #[error("cannot spawn decoding thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Field-less view of [`PlayerError`] for matching without ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Connect,
    EmptyStream,
    CodecInit,
    AudioInit,
    Decode,
    Io,
    AlreadyStopped,
    AlreadyStarted,
    Spawn,
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::Connect { .. } => ErrorKind::Connect,
            PlayerError::EmptyStream(_) => ErrorKind::EmptyStream,
            PlayerError::CodecInit(_) => ErrorKind::CodecInit,
            PlayerError::AudioInit(_) => ErrorKind::AudioInit,
            PlayerError::Decode(_) => ErrorKind::Decode,
            PlayerError::Io(_) => ErrorKind::Io,
            PlayerError::AlreadyStopped => ErrorKind::AlreadyStopped,
            PlayerError::AlreadyStarted => ErrorKind::AlreadyStarted,
            PlayerError::Spawn(_) => ErrorKind::Spawn,
        }
    }

    pub(crate) fn connect(url: &str, reason: impl ToString) -> Self {
        PlayerError::Connect {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = PlayerError> = std::result::Result<T, E>;
