//! Shared fixtures for the player integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::arithmetic_side_effects)]

use library::TrackPath;
use platform::mocks::{MemoryFs, RecordingStream, Submission};
use platform::{AudioConfig, RequestStatus};
use playback::{Player, PlayerConfig, PlayerObserver, PlayerResources, PlayerState, MIN_TX_LENGTH};
use rand_core::RngCore;

pub type TestPlayer<'a> = Player<'a, MemoryFs, RecordingStream, RecordingStream, Recorder>;

/// Transmit slot used by the shared layout: 512 bytes, or one whole MP3
/// frame when the build decodes MP3.
pub const SLOT: usize = if MIN_TX_LENGTH > 512 { MIN_TX_LENGTH } else { 512 };

pub const CONFIG: PlayerConfig = PlayerConfig {
    buffers: 2,
    rx_length: 256,
    tx_length: SLOT,
    track_count: 8,
};

/// Observer that keeps every notification.
#[derive(Default)]
pub struct Recorder {
    pub states: Vec<PlayerState>,
    pub formats: Vec<AudioConfig>,
}

impl PlayerObserver for Recorder {
    fn on_format_change(&mut self, format: AudioConfig) {
        self.formats.push(format);
    }

    fn on_state_change(&mut self, state: PlayerState) {
        self.states.push(state);
    }
}

/// Backing memory for one player.
pub struct Arenas {
    pub rx: Vec<u8>,
    pub tx: Vec<u8>,
    pub tracks: Vec<TrackPath>,
}

impl Arenas {
    pub fn for_config(config: &PlayerConfig) -> Self {
        Self {
            rx: vec![0; config.rx_length * config.buffers],
            tx: vec![0; config.tx_length * config.buffers],
            tracks: vec![TrackPath::new(); config.track_count],
        }
    }
}

pub fn build<'a>(
    arenas: &'a mut Arenas,
    config: PlayerConfig,
    tx: &RecordingStream,
    random: Option<&'a mut dyn RngCore>,
) -> TestPlayer<'a> {
    let resources = PlayerResources {
        rx: RecordingStream::new(),
        tx: tx.clone(),
        observer: Recorder::default(),
        rx_arena: &mut arenas.rx,
        tx_arena: &mut arenas.tx,
        track_arena: &mut arenas.tracks,
        random,
    };
    Player::new(config, resources).unwrap()
}

/// Canonical 44-byte header of a 16-bit PCM WAV file.
pub fn wav_header(channels: u16, sample_rate: u32, data_length: u32) -> Vec<u8> {
    let block_align = channels * 2;
    let mut raw = Vec::with_capacity(44);
    raw.extend_from_slice(b"RIFF");
    raw.extend_from_slice(&(data_length + 36).to_le_bytes());
    raw.extend_from_slice(b"WAVEfmt ");
    raw.extend_from_slice(&16u32.to_le_bytes());
    raw.extend_from_slice(&1u16.to_le_bytes());
    raw.extend_from_slice(&channels.to_le_bytes());
    raw.extend_from_slice(&sample_rate.to_le_bytes());
    raw.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    raw.extend_from_slice(&block_align.to_le_bytes());
    raw.extend_from_slice(&16u16.to_le_bytes());
    raw.extend_from_slice(b"data");
    raw.extend_from_slice(&data_length.to_le_bytes());
    raw
}

/// Recognisable sample bytes; `seed` tells tracks apart.
pub fn samples(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| ((i % 251) as u8).wrapping_add(seed))
        .collect()
}

/// A complete WAV file around `data`.
pub fn wav_file(channels: u16, sample_rate: u32, data: &[u8]) -> Vec<u8> {
    let mut file = wav_header(channels, sample_rate, data.len() as u32);
    file.extend_from_slice(data);
    file
}

/// Run tasks and complete every submission until nothing more is queued or
/// at least `limit` slots have been sent.
///
/// Submissions of the final batch are returned but left in flight.
pub fn pump(player: &mut TestPlayer<'_>, tx: &RecordingStream, limit: usize) -> Vec<Submission> {
    let mut sent = Vec::new();
    loop {
        player.run_pending();
        let batch = tx.take_submissions();
        if batch.is_empty() {
            return sent;
        }
        let done = sent.len() + batch.len() >= limit;
        if !done {
            for submission in &batch {
                player.on_audio_sent(submission.slot, RequestStatus::Completed);
            }
        }
        sent.extend(batch);
        if done {
            return sent;
        }
    }
}

pub fn concat(submissions: &[Submission]) -> Vec<u8> {
    submissions
        .iter()
        .flat_map(|s| s.data.iter().copied())
        .collect()
}
