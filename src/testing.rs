//! Fakes for the player's collaborators.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::buffer::ByteBuffer;
use crate::codec::{CodecAdapter, CodecBackend, FrameDecoder, StreamInfo};
use crate::error::{ErrorKind, PlayerError, Result};
use crate::events::PlayerListener;
use crate::net::{ByteStream, Connector};
use crate::output::{AudioOutput, AudioSink};

/// First payload byte that makes [`FakeBackend`] decoders fail.
pub const CORRUPT_MARKER: u8 = 0xfb;

/// 7-byte ADTS header, AAC-LC, no CRC.
pub fn adts_header(sample_rate_index: u8, channel_config: u8, frame_len: usize) -> Vec<u8> {
    vec![
        0xff,
        0xf1,
        (1 << 6) | (sample_rate_index << 2) | (channel_config >> 2),
        ((channel_config & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8,
        ((frame_len >> 3) & 0xff) as u8,
        (((frame_len & 0x07) << 5) | 0x1f) as u8,
        0xfc,
    ]
}

/// A 44.1 kHz stereo ADTS frame around `payload`.
pub fn adts_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = adts_header(4, 2, 7 + payload.len());
    frame.extend_from_slice(payload);
    frame
}

/// Feed `stream` to the adapter `chunk_size` bytes at a time through a
/// buffer of `capacity` bytes, the way the playback loop does.
pub fn decode_in_chunks(
    adapter: &mut CodecAdapter,
    stream: &[u8],
    chunk_size: usize,
    capacity: usize,
) -> Vec<i16> {
    let mut buffer = ByteBuffer::with_capacity(capacity);
    let mut output = Vec::new();
    let mut source = stream.iter().copied();
    loop {
        let mut appended = 0;
        while !buffer.is_full() && appended < chunk_size {
            match source.next() {
                Some(byte) => {
                    buffer.append(&[byte]);
                    appended += 1;
                }
                None => break,
            }
        }
        if appended == 0 && !buffer.is_full() {
            break;
        }
        let decoded = adapter.decode(buffer.filled()).unwrap();
        buffer.compact(decoded.consumed);
        output.extend(decoded.samples);
    }
    output
}

/// One-shot HTTP server on localhost. Sends `status_line` and `body`, then
/// keeps the connection open until the client hangs up.
pub fn http_stub(status_line: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: audio/aac\r\nConnection: close\r\n\r\n",
        status_line
    );
    thread::spawn(move || {
        let Ok((mut socket, _)) = listener.accept() else {
            return;
        };
        let mut request = Vec::new();
        let mut byte = [0u8; 1];
        while !request.ends_with(b"\r\n\r\n") {
            match socket.read(&mut byte) {
                Ok(1) => request.push(byte[0]),
                _ => return,
            }
        }
        if socket.write_all(head.as_bytes()).is_err() || socket.write_all(&body).is_err() {
            return;
        }
        let _ = socket.flush();
        let mut scratch = [0u8; 256];
        while matches!(socket.read(&mut scratch), Ok(n) if n > 0) {}
    });
    format!("http://{}/live.aac", addr)
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[derive(Default)]
struct BackendCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
    decoded: AtomicUsize,
}

/// Codec whose decoders turn each payload byte into one sample.
#[derive(Clone, Default)]
pub struct FakeBackend {
    counters: Arc<BackendCounters>,
}

impl FakeBackend {
    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.counters.released.load(Ordering::SeqCst)
    }

    pub fn decode_calls(&self) -> usize {
        self.counters.decoded.load(Ordering::SeqCst)
    }
}

impl CodecBackend for FakeBackend {
    fn open(&self, _info: &StreamInfo) -> Result<Box<dyn FrameDecoder>> {
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDecoder {
            counters: self.counters.clone(),
        }))
    }
}

struct FakeDecoder {
    counters: Arc<BackendCounters>,
}

impl FrameDecoder for FakeDecoder {
    fn decode_frame(&mut self, payload: &[u8], out: &mut Vec<i16>) -> Result<()> {
        self.counters.decoded.fetch_add(1, Ordering::SeqCst);
        if payload.first() == Some(&CORRUPT_MARKER) {
            return Err(PlayerError::Decode("corrupt frame".to_string()));
        }
        out.extend(payload.iter().map(|b| i16::from(*b)));
        Ok(())
    }
}

impl Drop for FakeDecoder {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Serves fixed chunks, then ends.
pub struct ScriptedStream {
    chunks: VecDeque<Vec<u8>>,
    offset: usize,
    chunk_boundary: bool,
    pausing: bool,
    failing: bool,
    closed: Arc<AtomicBool>,
}

impl ScriptedStream {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: chunks.into(),
            offset: 0,
            chunk_boundary: false,
            pausing: false,
            failing: false,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Non-blocking reads report `WouldBlock` whenever a chunk has just
    /// been used up, as if the next one had not arrived yet.
    pub fn pausing_after_each_chunk(mut self) -> Self {
        self.pausing = true;
        self
    }

    /// Fail instead of reporting end-of-stream.
    pub fn failing_at_end(mut self) -> Self {
        self.failing = true;
        self
    }

    fn closed_flag(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }

    fn serve(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.chunks.front() else {
            return if self.failing {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset"))
            } else {
                Ok(0)
            };
        };
        let n = buf.len().min(chunk.len() - self.offset);
        buf[..n].copy_from_slice(&chunk[self.offset..self.offset + n]);
        self.offset += n;
        if self.offset == chunk.len() {
            self.chunks.pop_front();
            self.offset = 0;
            self.chunk_boundary = true;
        }
        Ok(n)
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.chunk_boundary = false;
        self.serve(buf)
    }
}

impl ByteStream for ScriptedStream {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pausing && self.chunk_boundary {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.serve(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Repeats one frame forever, one frame per blocking read, until cancelled.
struct EndlessStream {
    frame: Vec<u8>,
    offset: usize,
    cancel: CancellationToken,
    closed: Arc<AtomicBool>,
}

impl Read for EndlessStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(1));
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::ConnectionAborted, "read aborted"));
        }
        let n = buf.len().min(self.frame.len() - self.offset);
        buf[..n].copy_from_slice(&self.frame[self.offset..self.offset + n]);
        self.offset = (self.offset + n) % self.frame.len();
        Ok(n)
    }
}

impl ByteStream for EndlessStream {
    fn read_available(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::WouldBlock.into())
    }

    fn close(&mut self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

enum Script {
    Refuse(u16),
    Chunks { chunks: Vec<Vec<u8>>, failing: bool },
    Endless(Vec<u8>),
}

#[derive(Clone)]
pub struct FakeConnector {
    script: Arc<Script>,
    closed: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

impl FakeConnector {
    fn with(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            closed: Arc::new(Mutex::new(None)),
        }
    }

    pub fn refusing(status: u16) -> Self {
        Self::with(Script::Refuse(status))
    }

    pub fn serving(chunks: Vec<Vec<u8>>) -> Self {
        Self::with(Script::Chunks {
            chunks,
            failing: false,
        })
    }

    /// Serves `chunks` one per read, then the connection drops.
    pub fn serving_then_failing(chunks: Vec<Vec<u8>>) -> Self {
        Self::with(Script::Chunks {
            chunks,
            failing: true,
        })
    }

    pub fn endless(frame: Vec<u8>) -> Self {
        Self::with(Script::Endless(frame))
    }

    /// Whether the last stream handed out has been closed.
    pub fn closed(&self) -> bool {
        self.closed
            .lock()
            .unwrap()
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }
}

impl Connector for FakeConnector {
    fn connect(
        &self,
        url: &str,
        _read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ByteStream>> {
        let (stream, closed): (Box<dyn ByteStream>, _) = match &*self.script {
            Script::Refuse(status) => {
                return Err(PlayerError::connect(
                    url,
                    format!("received {} status code", status),
                ))
            }
            Script::Chunks { chunks, failing } => {
                let mut stream = ScriptedStream::new(chunks.clone());
                if *failing {
                    stream = stream.pausing_after_each_chunk().failing_at_end();
                }
                let closed = stream.closed_flag();
                (Box::new(stream), closed)
            }
            Script::Endless(frame) => {
                let closed = Arc::new(AtomicBool::new(false));
                let stream = EndlessStream {
                    frame: frame.clone(),
                    offset: 0,
                    cancel: cancel.clone(),
                    closed: closed.clone(),
                };
                (Box::new(stream), closed)
            }
        };
        *self.closed.lock().unwrap() = Some(closed);
        Ok(stream)
    }
}

/// Sink that records what it is given and never blocks.
#[derive(Default)]
pub struct RecordingSink {
    written: Mutex<Vec<i16>>,
    playing: AtomicBool,
    released: AtomicBool,
    volume: Mutex<Option<(f32, f32)>>,
}

impl RecordingSink {
    pub fn written(&self) -> Vec<i16> {
        self.written.lock().unwrap().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn volume(&self) -> Option<(f32, f32)> {
        *self.volume.lock().unwrap()
    }
}

impl AudioSink for RecordingSink {
    fn play(&self) -> Result<()> {
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write(&self, samples: &[i16]) -> Result<()> {
        assert!(!self.is_released(), "write after release");
        self.written.lock().unwrap().extend_from_slice(samples);
        Ok(())
    }

    fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    fn set_volume(&self, left: f32, right: f32) {
        *self.volume.lock().unwrap() = Some((left, right));
    }
}

/// Output that opens [`RecordingSink`]s for buffer sizes up to a limit.
#[derive(Clone)]
pub struct FakeOutput {
    min_size: Option<usize>,
    max_size: usize,
    attempts: Arc<Mutex<Vec<usize>>>,
    sink: Arc<Mutex<Option<Arc<RecordingSink>>>>,
}

impl FakeOutput {
    pub fn accepting_at_most(min_size: usize, max_size: usize) -> Self {
        Self {
            min_size: Some(min_size),
            max_size,
            attempts: Arc::new(Mutex::new(Vec::new())),
            sink: Arc::new(Mutex::new(None)),
        }
    }

    pub fn accepting(min_size: usize) -> Self {
        Self::accepting_at_most(min_size, usize::MAX)
    }

    pub fn rejecting_all(min_size: usize) -> Self {
        Self::accepting_at_most(min_size, 0)
    }

    pub fn without_device() -> Self {
        Self {
            min_size: None,
            ..Self::accepting(0)
        }
    }

    pub fn attempts(&self) -> Vec<usize> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn sink(&self) -> Option<Arc<RecordingSink>> {
        self.sink.lock().unwrap().clone()
    }
}

impl AudioOutput for FakeOutput {
    fn min_buffer_size(&self, _format: &StreamInfo) -> Result<usize> {
        self.min_size
            .ok_or_else(|| PlayerError::AudioInit("no output device".to_string()))
    }

    fn open(&self, _format: &StreamInfo, buffer_size: usize) -> Result<Arc<dyn AudioSink>> {
        self.attempts.lock().unwrap().push(buffer_size);
        if buffer_size > self.max_size {
            return Err(PlayerError::AudioInit(format!(
                "buffer size {} not supported",
                buffer_size
            )));
        }
        let sink = Arc::new(RecordingSink::default());
        *self.sink.lock().unwrap() = Some(sink.clone());
        Ok(sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Start,
    Streaming,
    Error(ErrorKind),
    Stop,
}

#[derive(Clone, Default)]
pub struct RecordingListener {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingListener {
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl PlayerListener for RecordingListener {
    fn on_start(&self) {
        self.seen.lock().unwrap().push(Notification::Start);
    }

    fn on_streaming(&self) {
        self.seen.lock().unwrap().push(Notification::Streaming);
    }

    fn on_error(&self, error: &PlayerError) {
        self.seen
            .lock()
            .unwrap()
            .push(Notification::Error(error.kind()));
    }

    fn on_stop(&self) {
        self.seen.lock().unwrap().push(Notification::Stop);
    }
}
