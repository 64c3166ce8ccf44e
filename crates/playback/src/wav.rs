//! RIFF/WAVE header parsing.
//!
//! Only the canonical 44-byte layout is accepted: `RIFF` descriptor, `fmt `
//! sub-chunk with 16-bit integer PCM, then the `data` sub-chunk. The
//! playable length is rounded down so every chunk the pipeline reads stays a
//! whole number of frames and machine words.

use platform::config::WORD_SIZE;
use platform::FsNode;

use crate::decoder::{TrackFormat, TrackInfo};
use crate::pipeline::{read_exact, Scratch};

/// Size of the canonical WAV header.
pub const HEADER_LENGTH: usize = 44;

const RIFF: [u8; 4] = *b"RIFF";
const WAVE: [u8; 4] = *b"WAVE";
const FMT: [u8; 4] = *b"fmt ";
const DATA: [u8; 4] = *b"data";
const FORMAT_PCM: u16 = 1;

/// Fields of a validated WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavHeader {
    /// Channel count (at least 1).
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Declared size of the `data` sub-chunk.
    pub data_length: u32,
}

impl WavHeader {
    /// Validate and decode a 44-byte header.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let raw: &[u8; HEADER_LENGTH] = raw.get(..HEADER_LENGTH)?.try_into().ok()?;

        if tag(raw, 0)? != RIFF || tag(raw, 8)? != WAVE {
            return None;
        }
        if tag(raw, 12)? != FMT || tag(raw, 36)? != DATA {
            return None;
        }
        if le16(raw, 20)? != FORMAT_PCM || le16(raw, 34)? != 16 {
            return None;
        }

        let channels = le16(raw, 22)?;
        if channels == 0 {
            return None;
        }

        Some(Self {
            channels,
            sample_rate: le32(raw, 24)?,
            data_length: le32(raw, 40)?,
        })
    }

    /// Bytes of one sample frame across all channels.
    pub fn block_align(&self) -> u32 {
        u32::from(self.channels).saturating_mul(2)
    }

    /// Declared data length rounded down to a whole number of frames and words.
    pub fn aligned_length(&self) -> u32 {
        let alignment = lcm(self.block_align(), WORD_SIZE as u32);
        let whole = self.data_length.checked_div(alignment).unwrap_or(0);
        whole.saturating_mul(alignment)
    }

    /// Playable region of a file carrying this header.
    pub fn track_info(&self) -> TrackInfo {
        let offset = HEADER_LENGTH as u64;
        TrackInfo {
            format: TrackFormat::Wav,
            offset,
            end: offset.saturating_add(u64::from(self.aligned_length())),
            position: offset,
            sample_rate: self.sample_rate,
            channels: u8::try_from(self.channels).unwrap_or(u8::MAX),
        }
    }
}

/// Read and validate the header of `node`.
///
/// Returns `None` when the node is not a 16-bit PCM WAV file or its header
/// cannot be read.
pub fn parse_header<N: FsNode>(node: &mut N, scratch: &mut Scratch) -> Option<TrackInfo> {
    let buf = scratch.header_mut().get_mut(..HEADER_LENGTH)?;
    read_exact(node, 0, buf).ok()?;
    WavHeader::parse(buf).map(|header| header.track_info())
}

fn tag(raw: &[u8; HEADER_LENGTH], at: usize) -> Option<[u8; 4]> {
    raw.get(at..at.checked_add(4)?)?.try_into().ok()
}

fn le16(raw: &[u8; HEADER_LENGTH], at: usize) -> Option<u16> {
    let bytes: [u8; 2] = raw.get(at..at.checked_add(2)?)?.try_into().ok()?;
    Some(u16::from_le_bytes(bytes))
}

fn le32(raw: &[u8; HEADER_LENGTH], at: usize) -> Option<u32> {
    tag(raw, at).map(u32::from_le_bytes)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let r = a.checked_rem(b).unwrap_or(0);
        a = b;
        b = r;
    }
    a
}

fn lcm(a: u32, b: u32) -> u32 {
    match gcd(a, b) {
        0 => 1,
        g => a.checked_div(g).unwrap_or(1).saturating_mul(b),
    }
}

#[cfg(test)]
pub(crate) fn encode_header(channels: u16, sample_rate: u32, data_length: u32) -> [u8; HEADER_LENGTH] {
    let block_align = channels.saturating_mul(2);
    let byte_rate = sample_rate.saturating_mul(u32::from(block_align));
    let mut raw = [0u8; HEADER_LENGTH];
    let fields: [(usize, &[u8]); 13] = [
        (0, &RIFF),
        (4, &data_length.saturating_add(36).to_le_bytes()),
        (8, &WAVE),
        (12, &FMT),
        (16, &16u32.to_le_bytes()),
        (20, &FORMAT_PCM.to_le_bytes()),
        (22, &channels.to_le_bytes()),
        (24, &sample_rate.to_le_bytes()),
        (28, &byte_rate.to_le_bytes()),
        (32, &block_align.to_le_bytes()),
        (34, &16u16.to_le_bytes()),
        (36, &DATA),
        (40, &data_length.to_le_bytes()),
    ];
    for (at, bytes) in fields {
        if let Some(dst) = raw.get_mut(at..at.saturating_add(bytes.len())) {
            dst.copy_from_slice(bytes);
        }
    }
    raw
}
