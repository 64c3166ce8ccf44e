//! Construction parameters for [`Player`](crate::Player).

use platform::config::{MAX_SLOTS, MIN_BUFFER_LEVEL, WORD_SIZE};
use thiserror_no_std::Error;

/// Smallest transmit slot accepted by this build.
///
/// WAV slots only need to reach the submission threshold. With MP3 playback
/// a slot must hold the PCM of one MPEG-1 stereo frame.
pub const MIN_TX_LENGTH: usize = if cfg!(feature = "mp3") {
    crate::mp3::MAX_FRAME_PCM_LENGTH
} else {
    MIN_BUFFER_LEVEL
};

/// Errors returned while constructing or configuring a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `buffers` is zero or larger than [`MAX_SLOTS`].
    #[error("invalid slot count")]
    InvalidSlotCount,
    /// A transmit slot is shorter than [`MIN_TX_LENGTH`] or not a whole
    /// number of machine words, or a receive slot is not a whole number of
    /// 16-bit samples.
    #[error("invalid slot length")]
    InvalidSlotLength,
    /// Receive slots are longer than transmit slots.
    #[error("receive slots longer than transmit slots")]
    ReceiveLongerThanTransmit,
    /// The receive arena cannot hold `buffers * rx_length` bytes.
    #[error("receive arena too small")]
    ReceiveArenaTooSmall,
    /// The transmit arena cannot hold `buffers * tx_length` bytes.
    #[error("transmit arena too small")]
    TransmitArenaTooSmall,
    /// The track arena holds fewer than `track_count` paths.
    #[error("track arena too small")]
    TrackArenaTooSmall,
    /// Shuffle was requested without a random source.
    #[error("no random source")]
    NoRandomSource,
}

/// Slot layout and catalog size of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlayerConfig {
    /// Number of request slots per direction.
    pub buffers: usize,
    /// Length of one receive slot in bytes.
    pub rx_length: usize,
    /// Length of one transmit slot in bytes.
    ///
    /// Must be a whole number of machine words and at least
    /// [`MIN_TX_LENGTH`].
    pub tx_length: usize,
    /// Maximum number of tracks in the catalog.
    pub track_count: usize,
}

impl PlayerConfig {
    /// Check the layout against the arena sizes supplied by the board.
    pub fn validate(
        &self,
        rx_arena: usize,
        tx_arena: usize,
        track_arena: usize,
    ) -> Result<(), ConfigError> {
        if self.buffers == 0 || self.buffers > MAX_SLOTS {
            return Err(ConfigError::InvalidSlotCount);
        }
        // Chunk boundaries fall on multiples of the slot length, so a slot
        // that is not word sized would split sample frames.
        if self.tx_length < MIN_TX_LENGTH
            || self.tx_length.checked_rem(WORD_SIZE) != Some(0)
            || self.rx_length % 2 != 0
        {
            return Err(ConfigError::InvalidSlotLength);
        }
        if self.rx_length > self.tx_length {
            return Err(ConfigError::ReceiveLongerThanTransmit);
        }
        if self.rx_length.checked_mul(self.buffers).map_or(true, |need| need > rx_arena) {
            return Err(ConfigError::ReceiveArenaTooSmall);
        }
        if self.tx_length.checked_mul(self.buffers).map_or(true, |need| need > tx_arena) {
            return Err(ConfigError::TransmitArenaTooSmall);
        }
        if self.track_count > track_arena {
            return Err(ConfigError::TrackArenaTooSmall);
        }
        Ok(())
    }
}
