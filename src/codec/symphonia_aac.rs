//! AAC-LC decoding through symphonia.

use symphonia::core::audio::{Channels, SampleBuffer};
use symphonia::core::codecs::{CodecParameters, Decoder, DecoderOptions, CODEC_TYPE_AAC};
use symphonia::core::formats::Packet;
use symphonia::core::units::TimeBase;
use symphonia::default::get_codecs;

use super::{CodecBackend, FrameDecoder, StreamInfo};
use crate::error::{PlayerError, Result};

/// Samples per channel in one AAC-LC frame.
const FRAME_SAMPLES: u64 = 1024;

/// Backend used by default: symphonia's native AAC decoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaBackend;

impl CodecBackend for SymphoniaBackend {
    fn open(&self, info: &StreamInfo) -> Result<Box<dyn FrameDecoder>> {
        let channels = channel_layout(info.channels).ok_or_else(|| {
            PlayerError::CodecInit(format!("unsupported channel count {}", info.channels))
        })?;

        // Same parameters symphonia's own ADTS reader hands to the decoder.
        let mut params = CodecParameters::new();
        params
            .for_codec(CODEC_TYPE_AAC)
            .with_sample_rate(info.sample_rate)
            .with_time_base(TimeBase::new(1, info.sample_rate))
            .with_channels(channels);

        let decoder = get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| PlayerError::CodecInit(e.to_string()))?;

        Ok(Box::new(SymphoniaFrameDecoder {
            decoder,
            sample_buf: None,
            ts: 0,
        }))
    }
}

struct SymphoniaFrameDecoder {
    decoder: Box<dyn Decoder>,
    sample_buf: Option<SampleBuffer<i16>>,
    ts: u64,
}

impl FrameDecoder for SymphoniaFrameDecoder {
    fn decode_frame(&mut self, payload: &[u8], out: &mut Vec<i16>) -> Result<()> {
        let packet = Packet::new_from_slice(0, self.ts, FRAME_SAMPLES, payload);
        self.ts += FRAME_SAMPLES;

        let decoded = self
            .decoder
            .decode(&packet)
            .map_err(|e| PlayerError::Decode(e.to_string()))?;
        if decoded.frames() == 0 {
            return Ok(());
        }

        let spec = *decoded.spec();
        let capacity = decoded.capacity() as u64;
        let needed = decoded.capacity() * spec.channels.count();
        if self
            .sample_buf
            .as_ref()
            .map_or(true, |buf| buf.capacity() < needed)
        {
            self.sample_buf = Some(SampleBuffer::<i16>::new(capacity, spec));
        }
        if let Some(sample_buf) = self.sample_buf.as_mut() {
            sample_buf.copy_interleaved_ref(decoded);
            out.extend_from_slice(sample_buf.samples());
        }
        Ok(())
    }
}

/// Channel positions for an ADTS channel configuration count.
fn channel_layout(count: u16) -> Option<Channels> {
    let layout = match count {
        1 => Channels::FRONT_CENTRE,
        2 => Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        3 => Channels::FRONT_CENTRE | Channels::FRONT_LEFT | Channels::FRONT_RIGHT,
        4 => {
            Channels::FRONT_CENTRE
                | Channels::FRONT_LEFT
                | Channels::FRONT_RIGHT
                | Channels::REAR_CENTRE
        }
        5 => {
            Channels::FRONT_CENTRE
                | Channels::FRONT_LEFT
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
        }
        6 => {
            Channels::FRONT_CENTRE
                | Channels::FRONT_LEFT
                | Channels::FRONT_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
                | Channels::LFE1
        }
        8 => {
            Channels::FRONT_CENTRE
                | Channels::FRONT_LEFT
                | Channels::FRONT_RIGHT
                | Channels::SIDE_LEFT
                | Channels::SIDE_RIGHT
                | Channels::REAR_LEFT
                | Channels::REAR_RIGHT
                | Channels::LFE1
        }
        _ => return None,
    };
    Some(layout)
}
