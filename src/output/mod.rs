//! Audio output device seam and the sink buffer-size search.

pub mod rodio_sink;

use std::sync::Arc;

use log::{debug, info, warn};

use crate::codec::StreamInfo;
use crate::error::{PlayerError, Result};

pub use rodio_sink::RodioOutput;

/// Bytes per PCM sample written to the sink.
pub const BYTES_PER_SAMPLE: usize = 2;

/// An opened output device. Methods take `&self` so the handle can be shared
/// with volume control while the playback loop writes.
pub trait AudioSink: Send + Sync {
    fn play(&self) -> Result<()>;

    /// Queue interleaved samples, blocking while the device queue is full.
    fn write(&self, samples: &[i16]) -> Result<()>;

    fn stop(&self);

    /// Give the device back. Must tolerate repeated calls.
    fn release(&self);

    fn set_volume(&self, left: f32, right: f32);
}

pub trait AudioOutput: Send + Sync {
    /// Smallest buffer, in bytes, the platform accepts for this format.
    fn min_buffer_size(&self, format: &StreamInfo) -> Result<usize>;

    fn open(&self, format: &StreamInfo, buffer_size: usize) -> Result<Arc<dyn AudioSink>>;
}

/// Try `min_buffer_size * factor` for each factor in order and keep the first
/// device that opens.
pub fn open_sink(
    output: &dyn AudioOutput,
    format: &StreamInfo,
    scale_factors: impl IntoIterator<Item = u32>,
) -> Result<Arc<dyn AudioSink>> {
    info!(
        "Sample rate: {}, channels: {}",
        format.sample_rate, format.channels
    );
    let min_size = output.min_buffer_size(format)?;

    let mut last_error = None;
    for factor in scale_factors {
        let buffer_size = min_size.saturating_mul(factor as usize);
        debug!("Using buffer size {} (scale factor {})", buffer_size, factor);
        match output.open(format, buffer_size) {
            Ok(sink) => {
                info!("Audio output opened with a {} byte buffer", buffer_size);
                return Ok(sink);
            }
            Err(e) => {
                warn!("Cannot open audio output with buffer size {}: {}", buffer_size, e);
                last_error = Some(e);
            }
        }
    }

    let reason = match last_error {
        Some(e) => format!("no buffer size accepted by the device, last error: {}", e),
        None => "no buffer size candidates to try".to_string(),
    };
    Err(PlayerError::AudioInit(reason))
}
