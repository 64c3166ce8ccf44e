//! Engine-wide configuration constants
//!
//! Every limit the engine depends on is defined here rather than hardcoded
//! at the point of use. Runtime parameters (slot count and sizes, catalog
//! capacity) are supplied by the board through `playback::PlayerConfig`.

/// Maximum length of a track path in bytes, including every separator.
///
/// Paths that would not fit are skipped during the scan.
pub const PATH_LENGTH: usize = 64;

/// Number of attempts for a filesystem call that reports a transient failure.
pub const MAX_READ_RETRIES: usize = 4;

/// Smallest decoded chunk, in bytes, that is submitted to the output stream.
///
/// A shorter final chunk is treated as the end of the track.
pub const MIN_BUFFER_LEVEL: usize = 64;

/// Directory levels below the root that the catalog scan descends into.
pub const SCAN_MAX_DEPTH: usize = 2;

/// Size of the decode scratch buffer in bytes.
///
/// Holds the WAV header during parsing, the probe window during MP3
/// detection and the compressed bitstream window during MP3 playback.
pub const SCRATCH_LENGTH: usize = 4096;

/// How far into a file the MP3 probe searches for the first frame.
pub const MP3_SCAN_LENGTH: u64 = 64 * 1024;

/// Capacity of the player's deferred task queue.
pub const TASK_QUEUE_DEPTH: usize = 16;

/// Maximum number of request slots per stream direction.
pub const MAX_SLOTS: usize = 8;

/// Width of a machine word; chunk reads and scratch compaction keep to it.
pub const WORD_SIZE: usize = core::mem::size_of::<usize>();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_halves_are_word_aligned() {
        assert_eq!((SCRATCH_LENGTH / 2) % WORD_SIZE, 0);
    }

    #[test]
    fn lookahead_covers_several_scratch_windows() {
        assert!(MP3_SCAN_LENGTH >= SCRATCH_LENGTH as u64);
    }
}
