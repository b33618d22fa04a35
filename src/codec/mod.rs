//! AAC codec adapter.
//!
//! [`CodecAdapter`] splits buffered ADTS bytes into frames and hands complete
//! frames to a [`FrameDecoder`] produced by a [`CodecBackend`]. Every call
//! into a backend or decoder happens under one process-wide lock: the codec
//! is treated as non-reentrant across all sessions.

pub mod adts;
pub mod symphonia_aac;

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::error::{PlayerError, Result};
use adts::AdtsHeader;

pub use symphonia_aac::SymphoniaBackend;

static CODEC_LOCK: Mutex<()> = Mutex::new(());

fn codec_guard() -> MutexGuard<'static, ()> {
    CODEC_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Stream parameters discovered from the first frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Output of one [`CodecAdapter::decode`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Decoded {
    /// Bytes taken from the front of the input; the caller keeps the rest.
    pub consumed: usize,
    /// Interleaved 16-bit PCM.
    pub samples: Vec<i16>,
}

/// Decodes one raw AAC frame (ADTS header already stripped).
pub trait FrameDecoder: Send {
    fn decode_frame(&mut self, payload: &[u8], out: &mut Vec<i16>) -> Result<()>;
}

/// Creates frame decoders for a stream.
pub trait CodecBackend: Send + Sync {
    fn open(&self, info: &StreamInfo) -> Result<Box<dyn FrameDecoder>>;
}

pub struct CodecAdapter {
    info: StreamInfo,
    decoder: Option<Box<dyn FrameDecoder>>,
}

impl CodecAdapter {
    /// Build the decoder from the first buffered bytes of a stream. Nothing
    /// is consumed; the same bytes are decoded by the first `decode` call.
    pub fn initialize(backend: &dyn CodecBackend, prefix: &[u8]) -> Result<Self> {
        let header = first_header(prefix).ok_or_else(|| {
            PlayerError::CodecInit(format!(
                "no ADTS frame header in the first {} bytes",
                prefix.len()
            ))
        })?;
        let info = StreamInfo {
            sample_rate: header.sample_rate,
            channels: header.channels,
        };
        if header.object_type != 2 {
            warn!(
                "Stream signals audio object type {}, decoding as AAC-LC",
                header.object_type
            );
        }

        let decoder = {
            let _guard = codec_guard();
            backend.open(&info)?
        };
        debug!(
            "Decoder ready, sample rate: {}, channels: {}",
            info.sample_rate, info.channels
        );

        Ok(Self {
            info,
            decoder: Some(decoder),
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Decode every complete frame in `data`. A trailing partial frame is
    /// left unconsumed; bytes before a sync word are consumed and dropped.
    pub fn decode(&mut self, data: &[u8]) -> Result<Decoded> {
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| PlayerError::Decode("decoder already released".to_string()))?;
        let _guard = codec_guard();

        let mut out = Decoded::default();
        loop {
            let skipped = adts::find_sync(&data[out.consumed..]);
            if skipped > 0 {
                debug!("Skipped {} bytes looking for frame sync", skipped);
                out.consumed += skipped;
            }

            let rest = &data[out.consumed..];
            if rest.len() < adts::HEADER_LEN {
                break;
            }
            let Some(header) = AdtsHeader::parse(rest) else {
                // False sync: step past it and search again.
                out.consumed += 1;
                continue;
            };
            if header.frame_len > rest.len() {
                break;
            }

            decoder.decode_frame(header.payload(rest), &mut out.samples)?;
            out.consumed += header.frame_len;
        }
        Ok(out)
    }

    /// Drop the decoder state. Later calls are no-ops.
    pub fn release(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            let _guard = codec_guard();
            drop(decoder);
            debug!("Decoder released");
        }
    }
}

impl Drop for CodecAdapter {
    fn drop(&mut self) {
        self.release();
    }
}

fn first_header(bytes: &[u8]) -> Option<AdtsHeader> {
    let mut offset = 0;
    while offset < bytes.len() {
        offset += adts::find_sync(&bytes[offset..]);
        if let Some(header) = AdtsHeader::parse(&bytes[offset..]) {
            return Some(header);
        }
        offset += 1;
    }
    None
}
