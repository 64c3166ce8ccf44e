//! Audio stream contract

/// Slot-based audio stream (I2S DMA on hardware).
///
/// The engine owns a fixed pool of request slots and hands one at a time to
/// [`enqueue`](AudioStream::enqueue). The board reports completion back to
/// the engine from task context, never from the interrupt itself.
pub trait AudioStream {
    /// Error type
    type Error: core::fmt::Debug;

    /// Queue `data` as the contents of request slot `slot`.
    ///
    /// The slice lives in an arena owned for the engine's lifetime. The
    /// engine does not write to a slot again until its completion has been
    /// reported, so a DMA implementation may keep reading from `data` until
    /// then.
    fn enqueue(&mut self, slot: usize, data: &[u8]) -> Result<(), Self::Error>;
}

/// Outcome of a request slot reported by the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestStatus {
    /// The slot was transferred completely.
    Completed,
    /// The transfer was cancelled or the device reported an error.
    Failed,
}

/// Output format announced to the codec and I2S configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u8,
    /// Bit depth of the PCM words in each slot
    pub bit_depth: u8,
}

impl AudioConfig {
    /// 16-bit PCM at the given rate and channel count.
    pub const fn pcm16(sample_rate: u32, channels: u8) -> Self {
        Self {
            sample_rate,
            channels,
            bit_depth: 16,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self::pcm16(44_100, 2)
    }
}
