//! MPEG audio frame headers and MP3 stream detection.
//!
//! Only Layer III frames are recognised. The header parser is enough to find
//! the first frame of a file, size the PCM output of a frame before handing
//! it to the decoder, and report the stream's rate and channel count.

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2 (low sample rates)
    Mpeg2,
    /// MPEG-2.5 (unofficial extension)
    Mpeg25,
}

/// Decoded fields of a Layer III frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameHeader {
    /// MPEG version.
    pub version: MpegVersion,
    /// Bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// 1 for mono, 2 otherwise.
    pub channels: u8,
    /// Padding slot present.
    pub padding: bool,
}

const BITRATES_V1: [u32; 15] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const BITRATES_V2: [u32; 15] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];
const SAMPLE_RATES_V1: [u32; 3] = [44_100, 48_000, 32_000];

/// PCM bytes of the largest frame: 1152 stereo 16-bit samples.
pub const MAX_FRAME_PCM_LENGTH: usize = 4608;

impl FrameHeader {
    /// Size of the fixed frame header.
    pub const LENGTH: usize = 4;

    /// Parse the header at the start of `raw`.
    ///
    /// Free-format and reserved bitrates, reserved sample rates and
    /// non-Layer-III frames are rejected.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let [b0, b1, b2, b3] = *raw.get(..Self::LENGTH)? else {
            return None;
        };
        if b0 != 0xFF || (b1 & 0xE0) != 0xE0 {
            return None;
        }

        let version = match (b1 >> 3) & 0x03 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return None,
        };
        // Layer bits 01 are Layer III.
        if (b1 >> 1) & 0x03 != 0x01 {
            return None;
        }

        let bitrate_index = usize::from(b2 >> 4);
        let bitrate_kbps = match version {
            MpegVersion::Mpeg1 => BITRATES_V1.get(bitrate_index),
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => BITRATES_V2.get(bitrate_index),
        }
        .copied()
        .filter(|&kbps| kbps != 0)?;

        let base_rate = *SAMPLE_RATES_V1.get(usize::from((b2 >> 2) & 0x03))?;
        let sample_rate = match version {
            MpegVersion::Mpeg1 => base_rate,
            MpegVersion::Mpeg2 => base_rate / 2,
            MpegVersion::Mpeg25 => base_rate / 4,
        };

        Some(Self {
            version,
            bitrate_kbps,
            sample_rate,
            channels: if (b3 >> 6) == 0x03 { 1 } else { 2 },
            padding: (b2 >> 1) & 0x01 != 0,
        })
    }

    /// PCM samples per channel produced by one frame.
    pub fn samples_per_frame(&self) -> usize {
        match self.version {
            MpegVersion::Mpeg1 => 1152,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 576,
        }
    }

    /// Encoded frame length in bytes, header included.
    pub fn frame_length(&self) -> usize {
        let slots: u32 = match self.version {
            MpegVersion::Mpeg1 => 144,
            MpegVersion::Mpeg2 | MpegVersion::Mpeg25 => 72,
        };
        let bytes = slots
            .saturating_mul(self.bitrate_kbps)
            .saturating_mul(1000)
            .checked_div(self.sample_rate)
            .unwrap_or(0)
            .saturating_add(u32::from(self.padding));
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Bytes of 16-bit interleaved PCM produced by one frame.
    pub fn pcm_length(&self) -> usize {
        self.samples_per_frame()
            .saturating_mul(usize::from(self.channels))
            .saturating_mul(2)
    }
}

/// Offset of the first frame sync word in `data`.
pub fn find_sync(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|pair| matches!(pair, [0xFF, b] if (b & 0xE0) == 0xE0))
}

/// Scan the start of `node` for the first Layer III frame.
///
/// Up to `MP3_SCAN_LENGTH` bytes are searched one scratch window at a time.
/// The returned region starts at the frame offset rounded down to a machine
/// word and ends at the end of the file.
#[cfg(feature = "mp3")]
pub fn probe<N: platform::FsNode>(
    node: &mut N,
    scratch: &mut crate::pipeline::Scratch,
) -> Option<crate::decoder::TrackInfo> {
    use crate::decoder::{TrackFormat, TrackInfo};
    use crate::pipeline::read_some;
    use platform::config::{MP3_SCAN_LENGTH, SCRATCH_LENGTH};

    let length = with_length(node)?;
    let limit = MP3_SCAN_LENGTH.min(length);
    let raw = scratch.header_mut();
    let mut window_start = 0u64;

    while window_start < limit {
        let want = usize::try_from(length.saturating_sub(window_start))
            .map_or(SCRATCH_LENGTH, |left| left.min(SCRATCH_LENGTH));
        let buf = raw.get_mut(..want)?;
        let count = read_some(node, window_start, buf).ok()?;
        if count == 0 {
            return None;
        }
        let data = buf.get(..count)?;

        let mut cursor = 0usize;
        while let Some(found) = data.get(cursor..).and_then(find_sync) {
            let at = cursor.saturating_add(found);
            if let Some(header) = data.get(at..).and_then(FrameHeader::parse) {
                let start = align_to_word(window_start.saturating_add(at as u64));
                return Some(TrackInfo {
                    format: TrackFormat::Mp3,
                    offset: start,
                    end: length,
                    position: start,
                    sample_rate: header.sample_rate,
                    channels: header.channels,
                });
            }
            cursor = at.saturating_add(1);
        }

        // Overlap full windows so a header split across them is still seen.
        let advance = if count == SCRATCH_LENGTH {
            count.saturating_sub(FrameHeader::LENGTH.saturating_sub(1))
        } else {
            count
        };
        window_start = window_start.saturating_add(advance as u64);
    }

    None
}

/// Round `offset` down to a machine word.
pub fn align_to_word(offset: u64) -> u64 {
    let word = platform::config::WORD_SIZE as u64;
    offset & !word.wrapping_sub(1)
}

#[cfg(feature = "mp3")]
fn with_length<N: platform::FsNode>(node: &mut N) -> Option<u64> {
    match platform::with_retries(|| node.length()) {
        Ok(0) | Err(_) => None,
        Ok(length) => Some(length),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, joint stereo, no CRC.
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x40];

    #[test]
    fn mpeg1_header_parses() {
        let header = FrameHeader::parse(&HEADER).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg1);
        assert_eq!(header.bitrate_kbps, 128);
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.channels, 2);
        assert_eq!(header.frame_length(), 417);
        assert_eq!(header.pcm_length(), 1152 * 2 * 2);
        assert_eq!(header.pcm_length(), MAX_FRAME_PCM_LENGTH);
    }

    #[test]
    fn mpeg2_mono_header_parses() {
        // MPEG-2, Layer III, 64 kbit/s, 22.05 kHz, mono, padded.
        let header = FrameHeader::parse(&[0xFF, 0xF3, 0x82, 0xC0]).unwrap();
        assert_eq!(header.version, MpegVersion::Mpeg2);
        assert_eq!(header.bitrate_kbps, 64);
        assert_eq!(header.sample_rate, 22_050);
        assert_eq!(header.channels, 1);
        assert!(header.padding);
        assert_eq!(header.samples_per_frame(), 576);
        assert_eq!(header.frame_length(), 209);
    }

    #[test]
    fn invalid_headers_are_rejected() {
        // Layer II
        assert_eq!(FrameHeader::parse(&[0xFF, 0xFD, 0x90, 0x40]), None);
        // Reserved version
        assert_eq!(FrameHeader::parse(&[0xFF, 0xEB, 0x90, 0x40]), None);
        // Free-format bitrate
        assert_eq!(FrameHeader::parse(&[0xFF, 0xFB, 0x00, 0x40]), None);
        // Bad bitrate
        assert_eq!(FrameHeader::parse(&[0xFF, 0xFB, 0xF0, 0x40]), None);
        // Reserved sample rate
        assert_eq!(FrameHeader::parse(&[0xFF, 0xFB, 0x9C, 0x40]), None);
        // No sync
        assert_eq!(FrameHeader::parse(&[0xFE, 0xFB, 0x90, 0x40]), None);
        // Truncated
        assert_eq!(FrameHeader::parse(&HEADER[..3]), None);
    }

    #[test]
    fn offsets_align_down_to_words() {
        let word = platform::config::WORD_SIZE as u64;
        assert_eq!(align_to_word(0), 0);
        assert_eq!(align_to_word(word - 1), 0);
        assert_eq!(align_to_word(word * 3 + 1), word * 3);
    }

    #[test]
    fn sync_search_skips_noise() {
        assert_eq!(find_sync(&[0x00, 0x12, 0xFF, 0x00, 0xFF, 0xFB]), Some(4));
        assert_eq!(find_sync(&[0xFF]), None);
        assert_eq!(find_sync(&[]), None);
    }

    #[cfg(feature = "mp3")]
    mod probing {
        use super::*;
        use crate::decoder::TrackFormat;
        use crate::pipeline::Scratch;
        use platform::config::WORD_SIZE;
        use platform::mocks::MemoryFs;
        use platform::FileSystem;

        #[test]
        fn first_frame_offset_is_word_aligned() {
            let mut file = vec![0u8; 5000];
            file[4099..4103].copy_from_slice(&HEADER);
            let mut fs = MemoryFs::new();
            fs.add_file("/a.mp3", file);

            let mut node = fs.open("/a.mp3").unwrap();
            let info = probe(&mut node, &mut Scratch::new()).unwrap();
            assert_eq!(info.format, TrackFormat::Mp3);
            assert_eq!(info.offset, 4099 - 4099 % WORD_SIZE as u64);
            assert_eq!(info.position, info.offset);
            assert_eq!(info.end, 5000);
            assert_eq!(info.sample_rate, 44_100);
        }

        #[test]
        fn header_split_across_windows_is_found() {
            let mut file = vec![0u8; 6000];
            file[4094..4098].copy_from_slice(&HEADER);
            let mut fs = MemoryFs::new();
            fs.add_file("/a.mp3", file);

            let mut node = fs.open("/a.mp3").unwrap();
            let info = probe(&mut node, &mut Scratch::new()).unwrap();
            assert_eq!(info.offset, 4094 - 4094 % WORD_SIZE as u64);
        }

        #[test]
        fn files_without_frames_are_rejected() {
            let mut fs = MemoryFs::new();
            fs.add_file("/noise.mp3", vec![0x55u8; 9000]);
            fs.add_file("/empty.mp3", Vec::new());

            let mut noise = fs.open("/noise.mp3").unwrap();
            assert_eq!(probe(&mut noise, &mut Scratch::new()), None);
            let mut empty = fs.open("/empty.mp3").unwrap();
            assert_eq!(probe(&mut empty, &mut Scratch::new()), None);
        }
    }
}
