//! Network side of the pipeline: opening the HTTP stream and pulling its
//! bytes into the decode buffer.

use std::io::{self, Read};
use std::time::Duration;

use bytes::{Buf, Bytes};
use futures_util::future::FutureExt;
use futures_util::stream::{BoxStream, StreamExt};
use log::{debug, info};
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::buffer::ByteBuffer;
use crate::error::{PlayerError, Result};

/// A readable response body. `read` blocks until data, end-of-stream (0) or
/// an error; `read_available` only returns what has already arrived and
/// reports `WouldBlock` otherwise.
pub trait ByteStream: Read + Send {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }

    fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens the stream for a URL. `cancel` is the abort signal: once it fires,
/// pending and future reads on the returned stream fail promptly.
pub trait Connector: Send + Sync {
    fn connect(
        &self,
        url: &str,
        read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ByteStream>>;
}

/// Result of one [`NetworkReader::fill_buffer`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// Bytes appended. Zero when the buffer was already full.
    Bytes(usize),
    EndOfStream,
}

pub struct NetworkReader {
    stream: Box<dyn ByteStream>,
    eof: bool,
}

impl NetworkReader {
    pub fn new(stream: Box<dyn ByteStream>) -> Self {
        Self { stream, eof: false }
    }

    /// Read into the buffer's free space until it is full or the stream has
    /// nothing more to give right now. Only the first read may block.
    pub fn fill_buffer(&mut self, buffer: &mut ByteBuffer) -> io::Result<Fill> {
        let mut total = 0;
        while !buffer.is_full() {
            let result = if total == 0 {
                self.stream.read(buffer.spare_mut())
            } else {
                self.stream.read_available(buffer.spare_mut())
            };
            match result {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => {
                    buffer.commit(n);
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }

        if total == 0 && self.eof {
            Ok(Fill::EndOfStream)
        } else {
            Ok(Fill::Bytes(total))
        }
    }

    pub fn close(mut self) -> io::Result<()> {
        self.stream.close()
    }
}

/// [`Connector`] over reqwest. Async I/O runs on a tokio runtime, either one
/// owned by the connector or one supplied by the caller.
pub struct HttpConnector {
    client: reqwest::Client,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl HttpConnector {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("http-io")
            .enable_all()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            client: reqwest::Client::new(),
            handle,
            runtime: Some(runtime),
        })
    }

    /// Drive requests on an existing multi-threaded runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            client: reqwest::Client::new(),
            handle,
            runtime: None,
        }
    }
}

impl Drop for HttpConnector {
    fn drop(&mut self) {
        // May be dropped from async code, where a blocking shutdown panics.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Connector for HttpConnector {
    fn connect(
        &self,
        url: &str,
        read_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn ByteStream>> {
        info!("Opening a connection to: {}", url);

        let response = self.handle.block_on(async {
            let request = self.client.get(url).send();
            tokio::select! {
                _ = cancel.cancelled() => Err(PlayerError::connect(url, "request aborted")),
                result = tokio::time::timeout(read_timeout, request) => match result {
                    Err(_) => Err(PlayerError::connect(url, "timed out waiting for response")),
                    Ok(Err(e)) => Err(PlayerError::connect(url, e)),
                    Ok(Ok(response)) => Ok(response),
                },
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::connect(
                url,
                format!("received {} status code", status.as_u16()),
            ));
        }
        debug!("Connected to {} ({})", url, status);

        Ok(Box::new(HttpStream {
            body: response.bytes_stream().boxed(),
            pending: Bytes::new(),
            handle: self.handle.clone(),
            read_timeout,
            cancel: cancel.clone(),
        }))
    }
}

struct HttpStream {
    body: BoxStream<'static, reqwest::Result<Bytes>>,
    pending: Bytes,
    handle: Handle,
    read_timeout: Duration,
    cancel: CancellationToken,
}

impl HttpStream {
    fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        let body = &mut self.body;
        let cancel = &self.cancel;
        let read_timeout = self.read_timeout;
        self.handle.block_on(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(aborted()),
                next = tokio::time::timeout(read_timeout, body.next()) => match next {
                    Err(_) => Err(io::Error::new(
                        io::ErrorKind::TimedOut,
                        "timed out waiting for stream data",
                    )),
                    Ok(None) => Ok(None),
                    Ok(Some(Ok(chunk))) => Ok(Some(chunk)),
                    Ok(Some(Err(e))) => Err(io::Error::other(e)),
                },
            }
        })
    }

    fn take_pending(&mut self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        n
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(aborted());
            }
            match self.next_chunk()? {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        Ok(self.take_pending(buf))
    }
}

impl ByteStream for HttpStream {
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(aborted());
            }
            let _runtime = self.handle.enter();
            match self.body.next().now_or_never() {
                None => return Err(io::ErrorKind::WouldBlock.into()),
                Some(None) => return Ok(0),
                Some(Some(Err(e))) => return Err(io::Error::other(e)),
                Some(Some(Ok(chunk))) => self.pending = chunk,
            }
            if self.pending.is_empty() {
                return Err(io::ErrorKind::WouldBlock.into());
            }
        }
        Ok(self.take_pending(buf))
    }

    fn close(&mut self) -> io::Result<()> {
        self.pending.clear();
        // Dropping the body releases the connection.
        self.body = futures_util::stream::empty().boxed();
        Ok(())
    }
}

fn aborted() -> io::Error {
    io::Error::new(io::ErrorKind::ConnectionAborted, "read aborted")
}
