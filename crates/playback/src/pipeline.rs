//! Streaming pipeline — fills one output slot from the open track.
//!
//! WAV data is copied straight from the file in chunks that end on slot-size
//! boundaries of the file offset, so after the first chunk every read is
//! aligned. MP3 data goes through the [`Scratch`] window: the unread tail is
//! compacted to the front (keeping word alignment) whenever half the window
//! has been consumed, and frames are decoded from it until the slot is full.
//!
//! Both paths advance [`TrackInfo::position`] by exactly the number of file
//! bytes consumed and never past [`TrackInfo::end`].

use platform::config::{MAX_READ_RETRIES, SCRATCH_LENGTH};
use platform::FsNode;

use crate::decoder::{DecodeError, TrackInfo};

/// What the scratch buffer currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScratchView {
    /// Nothing worth keeping.
    Empty,
    /// A header or probe window read while detecting a format.
    Header,
    /// Buffered MP3 bitstream: `raw[position..size]` is still unread.
    Bitstream {
        /// First unread byte.
        position: usize,
        /// Number of valid bytes.
        size: usize,
    },
}

/// Fixed decode buffer reused across tracks.
pub struct Scratch {
    raw: [u8; SCRATCH_LENGTH],
    view: ScratchView,
}

impl Scratch {
    /// Create an empty scratch buffer.
    pub const fn new() -> Self {
        Self {
            raw: [0; SCRATCH_LENGTH],
            view: ScratchView::Empty,
        }
    }

    /// Current contents.
    pub fn view(&self) -> ScratchView {
        self.view
    }

    /// Drop whatever is buffered.
    pub fn reset(&mut self) {
        self.view = ScratchView::Empty;
    }

    /// Borrow the whole buffer for a header read.
    pub(crate) fn header_mut(&mut self) -> &mut [u8; SCRATCH_LENGTH] {
        self.view = ScratchView::Header;
        &mut self.raw
    }

    /// Unread bitstream window as `(position, size)`, `(0, 0)` when empty.
    #[cfg(feature = "mp3")]
    fn bitstream(&self) -> (usize, usize) {
        match self.view {
            ScratchView::Bitstream { position, size } => (position, size),
            ScratchView::Empty | ScratchView::Header => (0, 0),
        }
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Self::new()
    }
}

/// Read exactly `buf.len()` bytes at `offset`.
///
/// A failed or short read is retried up to [`MAX_READ_RETRIES`] times; the
/// last failure is returned once the attempts run out.
pub(crate) fn read_exact<N: FsNode>(
    node: &mut N,
    offset: u64,
    buf: &mut [u8],
) -> Result<(), DecodeError> {
    let mut last = DecodeError::ShortRead;
    for _ in 0..MAX_READ_RETRIES {
        match node.read(offset, buf) {
            Ok(count) if count == buf.len() => return Ok(()),
            Ok(_) => last = DecodeError::ShortRead,
            Err(e) => last = DecodeError::Read(e),
        }
    }
    Err(last)
}

/// Read up to `buf.len()` bytes at `offset`, retrying failed reads.
#[cfg(feature = "mp3")]
pub(crate) fn read_some<N: FsNode>(
    node: &mut N,
    offset: u64,
    buf: &mut [u8],
) -> Result<usize, DecodeError> {
    let mut last = DecodeError::ShortRead;
    for _ in 0..MAX_READ_RETRIES {
        match node.read(offset, buf) {
            Ok(count) => return Ok(count.min(buf.len())),
            Err(e) => last = DecodeError::Read(e),
        }
    }
    Err(last)
}

/// Copy the next WAV chunk into `out` and return its length.
///
/// The chunk ends on the next multiple of `out.len()` in file offsets and is
/// clipped to the bytes left in the playable region.
pub fn fetch_wav_chunk<N: FsNode>(
    node: &mut N,
    info: &mut TrackInfo,
    out: &mut [u8],
) -> Result<usize, DecodeError> {
    let capacity = out.len() as u64;
    let misalignment = info.position.checked_rem(capacity).unwrap_or(0);
    let chunk = capacity
        .saturating_sub(misalignment)
        .min(info.remaining());
    let chunk = usize::try_from(chunk).unwrap_or(out.len()).min(out.len());

    let buf = out.get_mut(..chunk).ok_or(DecodeError::ShortRead)?;
    read_exact(node, info.position, buf)?;
    info.position = info.position.saturating_add(chunk as u64);
    Ok(chunk)
}

/// Decode MP3 frames from the scratch window into `out`.
///
/// Returns the number of PCM bytes written. The result may be zero when the
/// remaining bitstream holds no decodable frame.
#[cfg(feature = "mp3")]
pub fn fetch_mp3_chunk<N: FsNode>(
    node: &mut N,
    info: &mut TrackInfo,
    scratch: &mut Scratch,
    decoder: &mut crate::mp3_decoder::Mp3Decoder,
    out: &mut [u8],
) -> Result<usize, DecodeError> {
    use crate::mp3::find_sync;
    use crate::mp3_decoder::FrameOutcome;
    use platform::config::WORD_SIZE;

    const HALF: usize = SCRATCH_LENGTH / 2;

    let (mut position, mut size) = scratch.bitstream();
    let mut processed = 0usize;

    while processed < out.len() {
        if size == 0 {
            // Initial fill, sized so the next read starts on a window boundary.
            let misalignment = info
                .position
                .checked_rem(SCRATCH_LENGTH as u64)
                .and_then(|rem| usize::try_from(rem).ok())
                .unwrap_or(0);
            let chunk = clip(SCRATCH_LENGTH.saturating_sub(misalignment), info.remaining());
            let buf = scratch.raw.get_mut(..chunk).ok_or(DecodeError::ShortRead)?;
            size = read_some(node, info.position, buf)?;
            position = 0;
            info.position = info.position.saturating_add(size as u64);
        }

        let mut left = size.saturating_sub(position);
        if !info.is_exhausted() && left <= HALF {
            // Compact the unread tail to the front and top the window up.
            let mut alignment = left.checked_rem(WORD_SIZE).unwrap_or(0);
            if alignment != 0 {
                alignment = WORD_SIZE.saturating_sub(alignment);
            }
            if alignment > position {
                alignment = 0;
            }
            position = position.saturating_sub(alignment);
            left = left.saturating_add(alignment);

            if position > 0 {
                scratch
                    .raw
                    .copy_within(position..position.saturating_add(left), 0);
            }

            let top_up = clip(HALF.min(SCRATCH_LENGTH.saturating_sub(left)), info.remaining());
            let end = left.saturating_add(top_up);
            let buf = scratch.raw.get_mut(left..end).ok_or(DecodeError::ShortRead)?;
            let read = read_some(node, info.position, buf)?;

            position = alignment;
            size = left.saturating_add(read);
            info.position = info.position.saturating_add(read as u64);
        }

        if position >= size {
            break;
        }

        let window = scratch.raw.get(position..size).unwrap_or_default();
        let Some(offset) = find_sync(window) else {
            // No sync word in the window: discard it and read more.
            position = size;
            continue;
        };
        position = position.saturating_add(offset);

        let input = scratch.raw.get(position..size).unwrap_or_default();
        let output = out.get_mut(processed..).unwrap_or_default();
        match decoder.decode_frame(input, output) {
            FrameOutcome::Decoded { consumed, written } => {
                processed = processed.saturating_add(written);
                position = position.saturating_add(consumed.max(1));
            }
            FrameOutcome::Skipped { consumed } => {
                position = position.saturating_add(consumed.max(1));
            }
            FrameOutcome::InvalidHeader => position = position.saturating_add(1),
            FrameOutcome::OutputFull => break,
        }
    }

    scratch.view = ScratchView::Bitstream {
        position: position.min(size),
        size,
    };
    Ok(processed)
}

#[cfg(feature = "mp3")]
fn clip(length: usize, remaining: u64) -> usize {
    usize::try_from(remaining).map_or(length, |remaining| length.min(remaining))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::decoder::TrackFormat;
    use platform::mocks::MemoryFs;
    use platform::{FileSystem, FsError};

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn wav_info(offset: u64, end: u64) -> TrackInfo {
        TrackInfo {
            format: TrackFormat::Wav,
            offset,
            end,
            position: offset,
            sample_rate: 8_000,
            channels: 1,
        }
    }

    #[test]
    fn first_chunk_realigns_to_slot_boundaries() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", pattern(1024));
        let mut node = fs.open("/a.wav").unwrap();
        let mut info = wav_info(44, 1024);
        let mut out = [0u8; 256];

        assert_eq!(fetch_wav_chunk(&mut node, &mut info, &mut out), Ok(212));
        assert_eq!(info.position, 256);
        assert_eq!(&out[..212], &pattern(1024)[44..256]);

        assert_eq!(fetch_wav_chunk(&mut node, &mut info, &mut out), Ok(256));
        assert_eq!(info.position, 512);
    }

    #[test]
    fn last_chunk_is_clipped_to_the_region() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", pattern(2048));
        let mut node = fs.open("/a.wav").unwrap();
        let mut info = wav_info(44, 600);
        info.position = 512;
        let mut out = [0u8; 256];

        assert_eq!(fetch_wav_chunk(&mut node, &mut info, &mut out), Ok(88));
        assert!(info.is_exhausted());
        assert_eq!(info.position, 600);
    }

    #[test]
    fn busy_reads_are_retried() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", pattern(512));
        let mut node = fs.open("/a.wav").unwrap();
        let mut info = wav_info(0, 512);
        let mut out = [0u8; 128];

        fs.fail_next_reads(MAX_READ_RETRIES - 1);
        assert_eq!(fetch_wav_chunk(&mut node, &mut info, &mut out), Ok(128));
    }

    #[test]
    fn short_reads_are_retried() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", pattern(512));
        let mut node = fs.open("/a.wav").unwrap();
        let mut info = wav_info(0, 512);
        let mut out = [0u8; 128];

        fs.shorten_next_reads(2);
        assert_eq!(fetch_wav_chunk(&mut node, &mut info, &mut out), Ok(128));
        assert_eq!(info.position, 128);
    }

    #[test]
    fn exhausted_retries_leave_the_cursor_alone() {
        let mut fs = MemoryFs::new();
        fs.add_file("/a.wav", pattern(512));
        let mut node = fs.open("/a.wav").unwrap();
        let mut info = wav_info(0, 512);
        let mut out = [0u8; 128];

        fs.fail_next_reads(MAX_READ_RETRIES);
        assert_eq!(
            fetch_wav_chunk(&mut node, &mut info, &mut out),
            Err(DecodeError::Read(FsError::Busy))
        );
        assert_eq!(info.position, 0);

        fs.shorten_next_reads(MAX_READ_RETRIES);
        assert_eq!(
            fetch_wav_chunk(&mut node, &mut info, &mut out),
            Err(DecodeError::ShortRead)
        );
    }

    #[cfg(feature = "mp3")]
    mod mp3 {
        use super::*;
        use crate::mp3::MAX_FRAME_PCM_LENGTH;
        use crate::mp3_decoder::Mp3Decoder;
        use platform::config::WORD_SIZE;

        /// Silent MPEG-1 Layer III frames (128 kbit/s, 44.1 kHz, stereo).
        fn frames(count: usize) -> Vec<u8> {
            let mut stream = Vec::new();
            for _ in 0..count {
                let mut frame = vec![0u8; 417];
                frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
                stream.extend_from_slice(&frame);
            }
            stream
        }

        fn mp3_info(end: u64) -> TrackInfo {
            TrackInfo {
                format: TrackFormat::Mp3,
                offset: 0,
                end,
                position: 0,
                sample_rate: 44_100,
                channels: 2,
            }
        }

        /// Fetch slots until the track is drained, checking after every call
        /// that the window mirrors the file and starts on a word boundary.
        fn drain(file: &[u8]) -> Vec<usize> {
            let mut fs = MemoryFs::new();
            fs.add_file("/a.mp3", file.to_vec());
            let mut node = fs.open("/a.mp3").unwrap();
            fs.clear_reads();

            let mut info = mp3_info(file.len() as u64);
            let mut scratch = Scratch::new();
            let mut decoder = Mp3Decoder::new();
            let mut out = [0u8; MAX_FRAME_PCM_LENGTH];
            let mut outputs = Vec::new();
            let mut last_position = 0;

            for _ in 0..200 {
                let written =
                    fetch_mp3_chunk(&mut node, &mut info, &mut scratch, &mut decoder, &mut out)
                        .unwrap();
                assert!(info.position >= last_position);
                assert!(info.position <= info.end);
                last_position = info.position;

                let ScratchView::Bitstream { position, size } = scratch.view() else {
                    panic!("no bitstream after a fetch");
                };
                assert!(position <= size);
                let start = info.position as usize - size;
                assert_eq!(start % WORD_SIZE, 0, "window starts at {start}");
                assert_eq!(&scratch.raw[..size], &file[start..info.position as usize]);

                if written == 0 && info.is_exhausted() {
                    break;
                }
                outputs.push(written);
            }

            let reads = fs.reads();
            assert!(reads.len() > 1, "window was never topped up");
            let mut expected = 0;
            for read in &reads {
                assert_eq!(read.offset, expected);
                assert_eq!(read.offset % WORD_SIZE as u64, 0);
                expected += read.returned as u64;
            }
            assert_eq!(expected, file.len() as u64);
            assert_eq!(info.position, info.end);
            outputs
        }

        #[test]
        fn stream_longer_than_the_window_fills_whole_slots() {
            let file = frames(30);
            assert!(file.len() > SCRATCH_LENGTH);

            let outputs = drain(&file);
            let full = outputs
                .iter()
                .filter(|&&written| written == MAX_FRAME_PCM_LENGTH)
                .count();
            assert!(full >= 28, "only {full} full slots in {outputs:?}");
            assert!(outputs
                .iter()
                .all(|&written| written == 0 || written == MAX_FRAME_PCM_LENGTH));
        }

        #[test]
        fn junk_between_frames_is_skipped() {
            let mut file = frames(10);
            file.extend_from_slice(&[0x20; 37]);
            file.extend_from_slice(&frames(10));

            let outputs = drain(&file);
            let full = outputs
                .iter()
                .filter(|&&written| written == MAX_FRAME_PCM_LENGTH)
                .count();
            assert!(full >= 17, "only {full} full slots in {outputs:?}");
        }

        #[test]
        fn short_slot_decodes_nothing() {
            let file = frames(4);
            let mut fs = MemoryFs::new();
            fs.add_file("/a.mp3", file.clone());
            let mut node = fs.open("/a.mp3").unwrap();
            let mut info = mp3_info(file.len() as u64);
            let mut scratch = Scratch::new();
            let mut decoder = Mp3Decoder::new();
            let mut out = [0u8; 1024];

            assert_eq!(
                fetch_mp3_chunk(&mut node, &mut info, &mut scratch, &mut decoder, &mut out),
                Ok(0)
            );
            assert!(matches!(
                scratch.view(),
                ScratchView::Bitstream { position: 0, .. }
            ));
        }
    }

    #[test]
    fn scratch_tracks_its_view() {
        let mut scratch = Scratch::new();
        assert_eq!(scratch.view(), ScratchView::Empty);
        scratch.header_mut()[0] = 1;
        assert_eq!(scratch.view(), ScratchView::Header);
        scratch.reset();
        assert_eq!(scratch.view(), ScratchView::Empty);
    }
}
