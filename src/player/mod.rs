//! Lifecycle of one streaming session.
//!
//! [`AacPlayer::start`] spawns a `stream-decoding` thread that connects,
//! sets up the decoder and the sink, then loops read, decode and write. Each
//! loop round and the whole teardown run under one session lock, so
//! [`AacPlayer::request_stop`] never sees a half-finished round and the loop
//! never writes to a released sink.

mod session;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};
use tokio_util::sync::CancellationToken;

use crate::codec::{CodecBackend, SymphoniaBackend};
use crate::config::PlayerConfig;
use crate::error::{PlayerError, Result};
use crate::events::{LogListener, PlayerListener};
use crate::net::{Connector, HttpConnector};
use crate::output::{AudioOutput, AudioSink, RodioOutput};

pub use session::SessionState;
use session::Session;

/// State shared between the controller and the decoding thread.
pub(crate) struct Shared {
    session: Mutex<Session>,
    /// Second handle on the sink so volume changes never wait on a running
    /// decode round.
    sink: Mutex<Option<Arc<dyn AudioSink>>>,
    stop_requested: AtomicBool,
    /// Only changed under the session lock, so `start` and `stop` agree on
    /// whether the listener has seen `on_start`.
    started: AtomicBool,
    cancel: CancellationToken,
    url: String,
    config: PlayerConfig,
    connector: Arc<dyn Connector>,
    output: Arc<dyn AudioOutput>,
    codec: Arc<dyn CodecBackend>,
    listener: Box<dyn PlayerListener>,
}

impl Shared {
    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn publish_sink(&self, sink: Option<Arc<dyn AudioSink>>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = sink;
    }

    /// Stop path for both caller requests and end of stream. Runs once.
    fn stop(&self) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            debug!("Stop already requested for {}", self.url);
            return;
        }
        info!("Stopping playback of {}", self.url);
        self.cancel.cancel();

        let mut session = self.lock_session();
        if self.started.load(Ordering::SeqCst) {
            self.listener.on_stop();
        }
        self.publish_sink(None);
        session.teardown();
    }

    /// Report a failure from the decoding thread, unless it is fallout from
    /// a stop that already happened.
    fn fail(&self, error: PlayerError) {
        if self.stop_requested.swap(true, Ordering::SeqCst) {
            debug!("Ignoring error after stop request: {}", error);
            return;
        }
        error!("Playback of {} failed: {}", self.url, error);
        self.cancel.cancel();

        let mut session = self.lock_session();
        session.set_state(SessionState::Error);
        self.listener.on_error(&error);
        self.publish_sink(None);
        session.teardown();
    }
}

/// Streams, decodes and plays one AAC URL. Single use: once stopped, build a
/// new player.
pub struct AacPlayer {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AacPlayer {
    pub fn builder(url: impl Into<String>) -> AacPlayerBuilder {
        AacPlayerBuilder::new(url)
    }

    /// Notify the listener and launch the decoding thread. Runs under the
    /// session lock, so a concurrent `request_stop` either comes first and
    /// makes this fail, or comes after `on_start`.
    pub fn start(&self) -> Result<()> {
        let _session = self.shared.lock_session();
        if self.shared.stop_requested() {
            return Err(PlayerError::AlreadyStopped);
        }
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(PlayerError::AlreadyStarted);
        }

        self.shared.listener.on_start();
        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("stream-decoding".to_string())
            .spawn(move || session::run(&shared))
            .map_err(PlayerError::Spawn)?;
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Abort network waits, then tear the session down under the session
    /// lock. Later calls do nothing.
    pub fn request_stop(&self) {
        self.shared.stop();
    }

    pub fn is_playing(&self) -> bool {
        !self.shared.stop_requested()
    }

    /// Takes the session lock, so it waits for a running decode round.
    pub fn state(&self) -> SessionState {
        self.shared.lock_session().state()
    }

    /// Per-channel gains in `0.0..=1.0`. Ignored until the sink is open and
    /// after it is released.
    pub fn set_volume(&self, left: f32, right: f32) {
        let sink = self.shared.sink.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sink) = sink.as_ref() {
            sink.set_volume(left, right);
        }
    }

    /// Wait for the decoding thread to finish. Must not be called from a
    /// listener callback.
    pub fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Decoding thread for {} panicked", self.shared.url);
            }
        }
    }
}

impl Drop for AacPlayer {
    fn drop(&mut self) {
        if self.shared.started.load(Ordering::SeqCst) {
            self.request_stop();
        }
    }
}

pub struct AacPlayerBuilder {
    url: String,
    config: PlayerConfig,
    connector: Option<Arc<dyn Connector>>,
    output: Option<Arc<dyn AudioOutput>>,
    codec: Option<Arc<dyn CodecBackend>>,
    listener: Option<Box<dyn PlayerListener>>,
}

impl AacPlayerBuilder {
    fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            config: PlayerConfig::default(),
            connector: None,
            output: None,
            codec: None,
            listener: None,
        }
    }

    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    pub fn output(mut self, output: impl AudioOutput + 'static) -> Self {
        self.output = Some(Arc::new(output));
        self
    }

    pub fn codec(mut self, codec: impl CodecBackend + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    pub fn listener(mut self, listener: impl PlayerListener + 'static) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Fills unset collaborators with reqwest, rodio, symphonia and a
    /// logging listener.
    pub fn build(self) -> Result<AacPlayer> {
        let connector = match self.connector {
            Some(connector) => connector,
            None => Arc::new(HttpConnector::new()?),
        };
        let shared = Shared {
            session: Mutex::new(Session::new(self.config.buffer_capacity)),
            sink: Mutex::new(None),
            stop_requested: AtomicBool::new(false),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            url: self.url,
            config: self.config,
            connector,
            output: self.output.unwrap_or_else(|| Arc::new(RodioOutput)),
            codec: self.codec.unwrap_or_else(|| Arc::new(SymphoniaBackend)),
            listener: self.listener.unwrap_or_else(|| Box::new(LogListener)),
        };
        Ok(AacPlayer {
            shared: Arc::new(shared),
            worker: Mutex::new(None),
        })
    }
}
