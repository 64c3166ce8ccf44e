//! nanomp3-based MP3 frame decoder.
//!
//! nanomp3 is a pure-Rust, no_std translation of minimp3. `minimp3` /
//! `minimp3-rs` / `minimp3-sys` are avoided because of their ARM soundness
//! issues; this is the approved replacement.
//!
//! The decoder has no internal bitstream buffering: every call gets the
//! unread part of the scratch window starting at a sync word, and the
//! pipeline advances by the number of bytes consumed.

use crate::mp3::FrameHeader;

/// Result of one [`Mp3Decoder::decode_frame`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameOutcome {
    /// A frame was decoded; `written` PCM bytes were stored.
    Decoded {
        /// Bitstream bytes consumed, including any skipped junk.
        consumed: usize,
        /// PCM bytes written to the output.
        written: usize,
    },
    /// Bytes were consumed without producing a frame.
    Skipped {
        /// Bitstream bytes consumed.
        consumed: usize,
    },
    /// The sync word does not start a valid Layer III header.
    InvalidHeader,
    /// The output cannot hold the PCM of the next frame.
    OutputFull,
}

/// MP3 frame decoder backed by nanomp3.
pub struct Mp3Decoder {
    inner: nanomp3::Decoder,
    // 2304 f32 samples = 9 216 bytes; kept here rather than on the stack.
    pcm: [f32; nanomp3::MAX_SAMPLES_PER_FRAME],
}

impl Mp3Decoder {
    /// Create a decoder with no stream history.
    pub fn new() -> Self {
        Self {
            inner: nanomp3::Decoder::new(),
            pcm: [0.0; nanomp3::MAX_SAMPLES_PER_FRAME],
        }
    }

    /// Forget the previous stream (bit reservoir and sync state).
    pub fn reset(&mut self) {
        self.inner = nanomp3::Decoder::new();
    }

    /// Decode the frame at the start of `input` into 16-bit little-endian
    /// interleaved PCM in `out`.
    ///
    /// Nothing is decoded unless `out` can hold a whole frame, so the
    /// bitstream is never consumed without its audio being kept.
    pub fn decode_frame(&mut self, input: &[u8], out: &mut [u8]) -> FrameOutcome {
        let Some(header) = FrameHeader::parse(input) else {
            return FrameOutcome::InvalidHeader;
        };
        if out.len() < header.pcm_length() {
            return FrameOutcome::OutputFull;
        }

        let (consumed, info) = self.inner.decode(input, &mut self.pcm);
        let Some(info) = info else {
            return if consumed == 0 {
                FrameOutcome::InvalidHeader
            } else {
                FrameOutcome::Skipped { consumed }
            };
        };

        // `samples_produced` counts samples per channel.
        #[allow(clippy::cast_possible_truncation)]
        let channels = info.channels.num() as usize;
        let samples = info
            .samples_produced
            .saturating_mul(channels)
            .min(self.pcm.len());

        let mut written = 0usize;
        for (dst, &sample) in out.chunks_exact_mut(2).zip(self.pcm.iter().take(samples)) {
            dst.copy_from_slice(&to_pcm16(sample).to_le_bytes());
            written = written.saturating_add(2);
        }
        FrameOutcome::Decoded { consumed, written }
    }
}

impl Default for Mp3Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale a float sample in [-1.0, 1.0] to a 16-bit signed sample.
#[allow(clippy::cast_possible_truncation, clippy::arithmetic_side_effects)]
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)] // Test indexing into known-length buffers is safe
#[allow(clippy::arithmetic_side_effects, clippy::panic)]
mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, stereo, no CRC, 417 bytes.
    fn silent_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 417];
        frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
        frame
    }

    #[test]
    fn pcm16_conversion_clamps() {
        assert_eq!(to_pcm16(0.0), 0);
        assert_eq!(to_pcm16(1.0), i16::MAX);
        assert_eq!(to_pcm16(2.0), i16::MAX);
        assert_eq!(to_pcm16(-2.0), -i16::MAX);
    }

    #[test]
    fn garbage_is_an_invalid_header() {
        let mut decoder = Mp3Decoder::new();
        let mut out = [0u8; 8192];
        assert_eq!(
            decoder.decode_frame(&[0u8; 100], &mut out),
            FrameOutcome::InvalidHeader
        );
        assert_eq!(decoder.decode_frame(&[], &mut out), FrameOutcome::InvalidHeader);
    }

    #[test]
    fn small_output_is_reported_full() {
        let mut decoder = Mp3Decoder::new();
        let mut out = [0u8; 1024];
        assert_eq!(
            decoder.decode_frame(&silent_frame(), &mut out),
            FrameOutcome::OutputFull
        );
    }

    #[test]
    fn silent_frames_decode_to_pcm() {
        let stream: Vec<u8> = (0..8).flat_map(|_| silent_frame()).collect();
        let mut decoder = Mp3Decoder::new();
        let mut out = [0u8; 4608];

        let outcome = decoder.decode_frame(&stream, &mut out);
        match outcome {
            FrameOutcome::Decoded { consumed, written } => {
                assert!(consumed >= 417, "consumed {consumed}");
                assert!(written <= out.len());
                assert_eq!(written % 4, 0);
            }
            FrameOutcome::Skipped { consumed } => assert!(consumed > 0),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
