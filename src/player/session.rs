//! Per-session state and the decoding thread's playback loop.

use std::sync::Arc;

use log::{debug, warn};

use super::Shared;
use crate::buffer::ByteBuffer;
use crate::codec::CodecAdapter;
use crate::error::{PlayerError, Result};
use crate::net::{Fill, NetworkReader};
use crate::output::{self, AudioSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Initializing,
    Streaming,
    Error,
    /// Terminal; a stopped session is never restarted.
    Stopped,
}

/// Everything the playback loop and the stop path share. Only touched under
/// the session lock.
pub(crate) struct Session {
    state: SessionState,
    buffer: ByteBuffer,
    reader: Option<NetworkReader>,
    codec: Option<CodecAdapter>,
    sink: Option<Arc<dyn AudioSink>>,
}

impl Session {
    pub(crate) fn new(buffer_capacity: usize) -> Self {
        Self {
            state: SessionState::Idle,
            buffer: ByteBuffer::with_capacity(buffer_capacity),
            reader: None,
            codec: None,
            sink: None,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        if self.state == SessionState::Stopped {
            debug!("Session already stopped, ignoring change to {:?}", state);
            return;
        }
        debug!("Session state changing from {:?} to {:?}", self.state, state);
        self.state = state;
    }

    /// Release the sink, the connection and the decoder, in that order.
    /// Missing resources are skipped, failures are logged.
    pub(crate) fn teardown(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            sink.release();
        }
        if let Some(reader) = self.reader.take() {
            if let Err(e) = reader.close() {
                warn!("Failed to close stream connection: {}", e);
            }
        }
        if let Some(mut codec) = self.codec.take() {
            codec.release();
        }
        self.set_state(SessionState::Stopped);
    }
}

enum Cycle {
    Continue,
    EndOfStream,
    Stopped,
}

/// Body of the decoding thread.
pub(super) fn run(shared: &Shared) {
    if let Err(e) = drive(shared) {
        shared.fail(e);
    }
    debug!("Decoding thread for {} exiting", shared.url);
}

fn drive(shared: &Shared) -> Result<()> {
    {
        let mut session = shared.lock_session();
        if shared.stop_requested() {
            return Ok(());
        }
        connect(shared, &mut session)?;
        if shared.stop_requested() {
            return Ok(());
        }
        initialize(shared, &mut session)?;
    }

    loop {
        match cycle(shared)? {
            Cycle::Continue => {}
            Cycle::Stopped => return Ok(()),
            Cycle::EndOfStream => {
                debug!("End of stream reached for {}", shared.url);
                shared.stop();
                return Ok(());
            }
        }
    }
}

fn connect(shared: &Shared, session: &mut Session) -> Result<()> {
    session.set_state(SessionState::Connecting);
    let stream = shared
        .connector
        .connect(&shared.url, shared.config.read_timeout(), &shared.cancel)?;
    session.reader = Some(NetworkReader::new(stream));
    Ok(())
}

/// First fill, decoder setup from the buffered prefix, then the sink.
fn initialize(shared: &Shared, session: &mut Session) -> Result<()> {
    session.set_state(SessionState::Initializing);

    let Some(reader) = session.reader.as_mut() else {
        return Err(PlayerError::EmptyStream(shared.url.clone()));
    };
    match reader.fill_buffer(&mut session.buffer)? {
        Fill::Bytes(n) if n > 0 => debug!("Received {} bytes of stream prefix", n),
        _ => return Err(PlayerError::EmptyStream(shared.url.clone())),
    }

    let codec = CodecAdapter::initialize(shared.codec.as_ref(), session.buffer.filled())?;
    let info = codec.info();
    session.codec = Some(codec);

    let sink = output::open_sink(shared.output.as_ref(), &info, shared.config.scale_factors())?;
    session.sink = Some(sink.clone());
    shared.publish_sink(Some(sink.clone()));
    sink.play()?;

    session.set_state(SessionState::Streaming);
    shared.listener.on_streaming();
    Ok(())
}

/// One read, decode, write round, entirely under the session lock.
fn cycle(shared: &Shared) -> Result<Cycle> {
    let mut guard = shared.lock_session();
    if shared.stop_requested() {
        return Ok(Cycle::Stopped);
    }

    let session = &mut *guard;
    let (Some(reader), Some(codec), Some(sink)) = (
        session.reader.as_mut(),
        session.codec.as_mut(),
        session.sink.as_ref(),
    ) else {
        return Ok(Cycle::Stopped);
    };

    let fill = reader.fill_buffer(&mut session.buffer)?;
    if fill == Fill::EndOfStream && session.buffer.is_empty() {
        return Ok(Cycle::EndOfStream);
    }

    // At end of stream whatever complete frames are still buffered get
    // played before stopping.
    let decoded = codec.decode(session.buffer.filled())?;
    if decoded.consumed == 0 && session.buffer.is_full() {
        return Err(PlayerError::Decode(format!(
            "frame does not fit in a {} byte buffer",
            session.buffer.capacity()
        )));
    }
    session.buffer.compact(decoded.consumed);

    if !decoded.samples.is_empty() {
        sink.write(&decoded.samples)?;
    }
    Ok(match fill {
        Fill::EndOfStream => Cycle::EndOfStream,
        Fill::Bytes(_) => Cycle::Continue,
    })
}
