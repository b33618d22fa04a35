//! ADTS (Audio Data Transport Stream) framing for AAC.

pub const HEADER_LEN: usize = 7;
const CRC_LEN: usize = 2;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    /// MPEG-4 audio object type (2 = AAC-LC).
    pub object_type: u8,
    pub sample_rate: u32,
    pub channels: u16,
    /// Header size, including the CRC when present.
    pub header_len: usize,
    /// Whole frame size, header included.
    pub frame_len: usize,
}

impl AdtsHeader {
    /// Parse the header at the start of `bytes`. Returns `None` if the bytes
    /// do not start with a well-formed header this decoder can use.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN || !is_sync(bytes) {
            return None;
        }

        let layer = (bytes[1] >> 1) & 0x03;
        if layer != 0 {
            return None;
        }
        let protection_absent = bytes[1] & 0x01 == 1;

        let object_type = (bytes[2] >> 6) + 1;
        let sample_rate = *SAMPLE_RATES.get(usize::from((bytes[2] >> 2) & 0x0f))?;
        let channel_config = ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6);
        let channels = match channel_config {
            // Layout carried in-band; not supported.
            0 => return None,
            7 => 8,
            n => u16::from(n),
        };

        let frame_len = (usize::from(bytes[3] & 0x03) << 11)
            | (usize::from(bytes[4]) << 3)
            | usize::from(bytes[5] >> 5);
        let header_len = if protection_absent {
            HEADER_LEN
        } else {
            HEADER_LEN + CRC_LEN
        };
        if frame_len <= header_len {
            return None;
        }

        Some(Self {
            object_type,
            sample_rate,
            channels,
            header_len,
            frame_len,
        })
    }

    /// The raw AAC payload of a complete frame starting at `frame[0]`.
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.header_len..self.frame_len]
    }
}

fn is_sync(bytes: &[u8]) -> bool {
    bytes[0] == 0xff && bytes[1] & 0xf0 == 0xf0
}

/// Offset of the first sync word in `bytes`. When none is found the last
/// byte is kept back, since it may be the first half of a sync word.
pub fn find_sync(bytes: &[u8]) -> usize {
    bytes
        .windows(2)
        .position(is_sync)
        .unwrap_or_else(|| bytes.len().saturating_sub(1))
}
