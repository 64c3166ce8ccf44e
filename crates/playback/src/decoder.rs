//! Decode cursor and format detection shared by the parsers and the pipeline.
//!
//! [`TrackInfo`] describes the playable region of the open file and where
//! the pipeline will read next. [`detect`] probes a freshly opened node: WAV
//! first, then MP3 when the `mp3` feature is enabled. A file matching
//! neither comes back as [`TrackFormat::Unknown`] and is skipped by the
//! player; that is not an error.

use platform::{FsError, FsNode};
use thiserror_no_std::Error;

use crate::pipeline::Scratch;

/// Detected container/codec of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackFormat {
    /// Not a playable file.
    #[default]
    Unknown,
    /// 16-bit PCM RIFF/WAVE.
    Wav,
    /// MPEG-1/2 Layer III. Only detected with the `mp3` feature.
    Mp3,
}

impl TrackFormat {
    /// Short name for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Decode cursor of the open track.
///
/// Byte offsets are file offsets. `offset <= position <= end` holds for
/// every value handed out by the parsers and maintained by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrackInfo {
    /// Detected format.
    pub format: TrackFormat,
    /// Start of the playable region.
    pub offset: u64,
    /// End of the playable region (exclusive).
    pub end: u64,
    /// Next byte the pipeline will read.
    pub position: u64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u8,
}

impl TrackInfo {
    /// Bytes between the read cursor and the end of the playable region.
    pub fn remaining(&self) -> u64 {
        self.end.saturating_sub(self.position)
    }

    /// Returns `true` once every byte of the playable region has been read.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.end
    }

    /// Move the read cursor back to the start of the playable region.
    pub fn rewind(&mut self) {
        self.position = self.offset;
    }
}

/// Errors raised while producing PCM for an output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Every read attempt failed.
    #[error("read failed: {0}")]
    Read(FsError),
    /// Every read attempt returned fewer bytes than requested.
    #[error("short read")]
    ShortRead,
    /// The format has no decode path in this build.
    #[error("unsupported format")]
    Unsupported,
}

impl DecodeError {
    /// Short name for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read(_) => "read failed",
            Self::ShortRead => "short read",
            Self::Unsupported => "unsupported format",
        }
    }
}

/// Probe `node` and describe its playable region.
///
/// Read failures during probing make the file unrecognised rather than
/// failing the caller, so a damaged file is skipped like any other
/// unsupported one.
pub fn detect<N: FsNode>(node: &mut N, scratch: &mut Scratch) -> TrackInfo {
    if let Some(info) = crate::wav::parse_header(node, scratch) {
        return info;
    }
    #[cfg(feature = "mp3")]
    if let Some(info) = crate::mp3::probe(node, scratch) {
        return info;
    }
    TrackInfo::default()
}
