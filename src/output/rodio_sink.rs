use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use log::debug;
use rodio::cpal::traits::{DeviceTrait, HostTrait};
use rodio::cpal::SupportedBufferSize;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use tokio::sync::oneshot;

use super::{AudioOutput, AudioSink, BYTES_PER_SAMPLE};
use crate::codec::StreamInfo;
use crate::error::{PlayerError, Result};

/// Floor for the device-reported minimum buffer, in frames.
const MIN_BUFFER_FRAMES: usize = 1024;

const WRITE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Default output device through rodio.
#[derive(Debug, Default, Clone, Copy)]
pub struct RodioOutput;

impl AudioOutput for RodioOutput {
    fn min_buffer_size(&self, format: &StreamInfo) -> Result<usize> {
        let device = rodio::cpal::default_host()
            .default_output_device()
            .ok_or_else(|| PlayerError::AudioInit("no output device available".to_string()))?;
        let config = device
            .default_output_config()
            .map_err(|e| PlayerError::AudioInit(e.to_string()))?;

        let frames = match config.buffer_size() {
            SupportedBufferSize::Range { min, .. } => (*min as usize).max(MIN_BUFFER_FRAMES),
            SupportedBufferSize::Unknown => MIN_BUFFER_FRAMES,
        };
        Ok(frames * usize::from(format.channels) * BYTES_PER_SAMPLE)
    }

    fn open(&self, format: &StreamInfo, buffer_size: usize) -> Result<Arc<dyn AudioSink>> {
        let capacity = buffer_size / BYTES_PER_SAMPLE;
        if capacity < usize::from(format.channels) {
            return Err(PlayerError::AudioInit(format!(
                "buffer of {} bytes cannot hold a single frame",
                buffer_size
            )));
        }

        // cpal streams are not Send everywhere, so the device lives on its own
        // thread until the sink is released.
        let (ready_tx, ready_rx) =
            oneshot::channel::<std::result::Result<OutputStreamHandle, String>>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || match OutputStream::try_default() {
                Ok((_stream, handle)) => {
                    if ready_tx.send(Ok(handle)).is_ok() {
                        let _ = release_rx.blocking_recv();
                    }
                    debug!("Audio output device closed");
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                }
            })
            .map_err(|e| PlayerError::AudioInit(format!("cannot spawn audio thread: {}", e)))?;

        let handle = ready_rx
            .blocking_recv()
            .map_err(|_| PlayerError::AudioInit("audio thread exited during setup".to_string()))?
            .map_err(PlayerError::AudioInit)?;
        let sink = Sink::try_new(&handle).map_err(|e| PlayerError::AudioInit(e.to_string()))?;
        sink.pause();

        Ok(Arc::new(RodioSink {
            sink,
            format: *format,
            capacity,
            queued: Arc::new(AtomicUsize::new(0)),
            gains: Arc::new(StereoGains::default()),
            released: AtomicBool::new(false),
            device: Mutex::new(Some(release_tx)),
        }))
    }
}

struct RodioSink {
    sink: Sink,
    format: StreamInfo,
    /// Queue limit in samples.
    capacity: usize,
    queued: Arc<AtomicUsize>,
    gains: Arc<StereoGains>,
    released: AtomicBool,
    /// Dropping the sender lets the device thread close the stream.
    device: Mutex<Option<oneshot::Sender<()>>>,
}

impl AudioSink for RodioSink {
    fn play(&self) -> Result<()> {
        self.sink.play();
        Ok(())
    }

    fn write(&self, samples: &[i16]) -> Result<()> {
        // An oversized write still goes through once the queue has drained.
        while self.queued.load(Ordering::Acquire) > 0
            && self.queued.load(Ordering::Acquire) + samples.len() > self.capacity
        {
            if self.released.load(Ordering::Acquire) {
                break;
            }
            thread::sleep(WRITE_POLL_INTERVAL);
        }
        if self.released.load(Ordering::Acquire) {
            return Err(PlayerError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "audio output already released",
            )));
        }

        self.queued.fetch_add(samples.len(), Ordering::AcqRel);
        self.sink.append(QueuedSamples {
            samples: samples.to_vec().into_iter(),
            format: self.format,
            position: 0,
            queued: self.queued.clone(),
            gains: self.gains.clone(),
        });
        Ok(())
    }

    fn stop(&self) {
        self.sink.stop();
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.sink.stop();
        self.device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("Audio sink released");
    }

    fn set_volume(&self, left: f32, right: f32) {
        self.gains.set(left, right);
    }
}

/// Per-channel gains, readable from the audio callback without locking.
struct StereoGains {
    left: AtomicU32,
    right: AtomicU32,
}

impl Default for StereoGains {
    fn default() -> Self {
        Self {
            left: AtomicU32::new(1.0f32.to_bits()),
            right: AtomicU32::new(1.0f32.to_bits()),
        }
    }
}

impl StereoGains {
    fn set(&self, left: f32, right: f32) {
        self.left
            .store(left.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        self.right
            .store(right.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn for_channel(&self, channel: usize, channels: u16) -> f32 {
        let left = f32::from_bits(self.left.load(Ordering::Relaxed));
        let right = f32::from_bits(self.right.load(Ordering::Relaxed));
        match (channels, channel % 2) {
            (1, _) => (left + right) / 2.0,
            (_, 0) => left,
            _ => right,
        }
    }
}

/// One decoded chunk on its way to the device. Keeps the sink's queued-sample
/// count in step as samples are played or discarded.
struct QueuedSamples {
    samples: std::vec::IntoIter<i16>,
    format: StreamInfo,
    position: usize,
    queued: Arc<AtomicUsize>,
    gains: Arc<StereoGains>,
}

impl Iterator for QueuedSamples {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        let sample = self.samples.next()?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        let channel = self.position % usize::from(self.format.channels.max(1));
        self.position += 1;
        let gain = self.gains.for_channel(channel, self.format.channels);
        Some(f32::from(sample) / 32768.0 * gain)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}

impl Source for QueuedSamples {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.samples.len())
    }

    fn channels(&self) -> u16 {
        self.format.channels
    }

    fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

impl Drop for QueuedSamples {
    fn drop(&mut self) {
        let unplayed = self.samples.len();
        if unplayed > 0 {
            self.queued.fetch_sub(unplayed, Ordering::AcqRel);
        }
    }
}
