//! Playback state machine and deferred task executor.
//!
//! `Player` owns the track catalog, the open file, the decode scratch and
//! the output slots. It never blocks: user commands and stream completions
//! only update state and queue [`PlayerTask`]s, and the board drains that
//! queue from its cooperative scheduler with [`Player::poll`] or
//! [`Player::run_pending`].
//!
//! ```text
//!            play_pause / play_next / play_previous
//! [Stopped] ----------------------------------------> [Playing] <--> [Paused]
//!     ^                                                   |
//!     +---- stop_playing (on next completion) ------------+
//!     |                                                   |
//! [Error] <--------- read/decode/stream failure ----------+
//! ```
//!
//! The observer is told about every state change and, before any audio of a
//! newly opened track is queued, about its sample rate and channel count.

use heapless::Deque;
use library::{scan_tree, TrackCatalog, TrackOrder, TrackPath};
use platform::config::{MIN_BUFFER_LEVEL, TASK_QUEUE_DEPTH};
use platform::{with_retries, AudioConfig, AudioStream, FileSystem, FsError, RequestStatus};
use rand_core::RngCore;

use crate::config::{ConfigError, PlayerConfig};
use crate::decoder::{detect, DecodeError, TrackFormat, TrackInfo};
use crate::pipeline::{fetch_wav_chunk, Scratch};
use crate::slots::SlotPool;

#[cfg(feature = "mp3")]
use crate::mp3_decoder::Mp3Decoder;
#[cfg(feature = "mp3")]
use crate::pipeline::fetch_mp3_chunk;

// ── Public types ──────────────────────────────────────────────────────────────

/// Externally visible playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayerState {
    /// A track is being streamed.
    Playing,
    /// Streaming is suspended; the file and position are kept.
    Paused,
    /// Nothing is streaming; an open track is rewound to its start.
    Stopped,
    /// Playback was abandoned after an unrecoverable failure.
    Error,
}

impl PlayerState {
    /// Short name for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }
}

/// Deferred unit of work processed by [`Player::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlayerTask {
    /// Fill and submit every idle output slot.
    Refill,
    /// Advance to the next playable track.
    PlayNext,
    /// Rewind the open track and report `Stopped`.
    Stop,
    /// Drop the session and report `Error`.
    Abort,
}

impl PlayerTask {
    /// Short name for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Refill => "refill",
            Self::PlayNext => "play-next",
            Self::Stop => "stop",
            Self::Abort => "abort",
        }
    }
}

/// Board-side notifications.
pub trait PlayerObserver {
    /// A track was opened; reconfigure the codec before audio flows.
    fn on_format_change(&mut self, _format: AudioConfig) {}

    /// The playback state changed.
    fn on_state_change(&mut self, _state: PlayerState) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PlayerObserver for NoopObserver {}

/// Everything the board hands to [`Player::new`].
///
/// The arenas usually live in statics placed in DMA-capable memory; the
/// player keeps them for its whole lifetime.
pub struct PlayerResources<'a, Rx, Tx, O = NoopObserver> {
    /// Capture stream.
    pub rx: Rx,
    /// Playback stream.
    pub tx: Tx,
    /// Notification sink.
    pub observer: O,
    /// Backing memory of the receive slots.
    pub rx_arena: &'a mut [u8],
    /// Backing memory of the transmit slots.
    pub tx_arena: &'a mut [u8],
    /// Backing memory of the track catalog.
    pub track_arena: &'a mut [TrackPath],
    /// Uniform random source; required only for shuffle.
    pub random: Option<&'a mut dyn RngCore>,
}

// ── Session ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

struct Session<N> {
    file: Option<N>,
    index: usize,
    info: TrackInfo,
    playing: bool,
    stop: bool,
    advance_pending: bool,
}

impl<N> Session<N> {
    fn idle() -> Self {
        Self {
            file: None,
            index: 0,
            info: TrackInfo::default(),
            playing: false,
            stop: false,
            advance_pending: false,
        }
    }
}

// ── Player ────────────────────────────────────────────────────────────────────

/// The playback engine.
pub struct Player<'a, F, Rx, Tx, O = NoopObserver>
where
    F: FileSystem,
    Rx: AudioStream,
    Tx: AudioStream,
    O: PlayerObserver,
{
    fs: Option<F>,
    tracks: TrackCatalog<'a>,
    session: Session<F::Node>,
    scratch: Scratch,
    #[cfg(feature = "mp3")]
    mp3: Mp3Decoder,
    rx: Rx,
    tx: Tx,
    rx_slots: SlotPool<'a>,
    tx_slots: SlotPool<'a>,
    tasks: Deque<PlayerTask, TASK_QUEUE_DEPTH>,
    observer: O,
    random: Option<&'a mut dyn RngCore>,
    shuffle: bool,
    // Track advances since audio was last submitted; bounds skip loops.
    idle_advances: usize,
}

impl<'a, F, Rx, Tx, O> Player<'a, F, Rx, Tx, O>
where
    F: FileSystem,
    Rx: AudioStream,
    Tx: AudioStream,
    O: PlayerObserver,
{
    /// Build a player over the board's streams and arenas.
    ///
    /// The slot layout is validated once here; no allocation happens later.
    pub fn new(
        config: PlayerConfig,
        resources: PlayerResources<'a, Rx, Tx, O>,
    ) -> Result<Self, ConfigError> {
        config.validate(
            resources.rx_arena.len(),
            resources.tx_arena.len(),
            resources.track_arena.len(),
        )?;

        let track_arena = resources
            .track_arena
            .get_mut(..config.track_count)
            .ok_or(ConfigError::TrackArenaTooSmall)?;

        debug!(
            "player: {} slots, rx {} B, tx {} B, {} tracks",
            config.buffers,
            config.rx_length,
            config.tx_length,
            config.track_count
        );

        Ok(Self {
            fs: None,
            tracks: TrackCatalog::new(track_arena),
            session: Session::idle(),
            scratch: Scratch::new(),
            #[cfg(feature = "mp3")]
            mp3: Mp3Decoder::new(),
            rx: resources.rx,
            tx: resources.tx,
            rx_slots: SlotPool::split(resources.rx_arena, config.buffers, config.rx_length),
            tx_slots: SlotPool::split(resources.tx_arena, config.buffers, config.tx_length),
            tasks: Deque::new(),
            observer: resources.observer,
            random: resources.random,
            shuffle: false,
            idle_advances: 0,
        })
    }

    // ── Catalog ──────────────────────────────────────────────────────────────

    /// Take ownership of a freshly mounted filesystem and rebuild the catalog.
    ///
    /// Any open track is closed first. If the root cannot be opened the
    /// filesystem is dropped and the catalog stays empty.
    pub fn scan_files(&mut self, mut fs: F) -> Result<usize, FsError> {
        self.tracks.clear();
        self.reset_playback(None);
        self.fs = None;

        let order = match (self.shuffle, self.random.as_deref_mut()) {
            (true, Some(rng)) => TrackOrder::Shuffled(rng),
            _ => TrackOrder::Lexical,
        };
        let found = scan_tree(&mut fs, &mut self.tracks, order)?;
        self.fs = Some(fs);
        Ok(found)
    }

    /// Scan the mounted filesystem again, e.g. after toggling shuffle.
    ///
    /// Returns [`FsError::NoEntry`] when nothing is mounted.
    pub fn rescan(&mut self) -> Result<usize, FsError> {
        let fs = self.fs.take().ok_or(FsError::NoEntry)?;
        self.scan_files(fs)
    }

    /// Forget the catalog and release the filesystem, e.g. on card removal.
    pub fn reset_files(&mut self) -> Option<F> {
        self.tracks.clear();
        self.reset_playback(None);
        self.fs.take()
    }

    /// Index of the current track in the catalog.
    pub fn current_track(&self) -> usize {
        self.session.index
    }

    /// Number of tracks in the catalog.
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Path of the current track.
    pub fn track_name(&self) -> Option<&str> {
        self.tracks.get(self.session.index)
    }

    /// Read-only view of the catalog.
    pub fn tracks(&self) -> &TrackCatalog<'a> {
        &self.tracks
    }

    /// Whether the next scan shuffles the catalog.
    pub fn shuffle_enabled(&self) -> bool {
        self.shuffle
    }

    /// Choose the order applied by the next scan.
    pub fn set_shuffle(&mut self, enable: bool) -> Result<(), ConfigError> {
        if enable && self.random.is_none() {
            return Err(ConfigError::NoRandomSource);
        }
        self.shuffle = enable;
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Start from the first track, or toggle between playing and paused.
    pub fn play_pause(&mut self) {
        self.idle_advances = 0;
        if self.session.file.is_none() {
            self.play_track(0, Direction::Forward);
            return;
        }

        self.session.playing = !self.session.playing;
        if self.session.playing {
            self.report(PlayerState::Playing);
            self.schedule(PlayerTask::Refill);
        } else {
            self.report(PlayerState::Paused);
        }
    }

    /// Play the track after the current one, wrapping to the first.
    pub fn play_next(&mut self) {
        self.idle_advances = 0;
        self.advance_to_next();
    }

    /// Play the track before the current one, wrapping to the last.
    pub fn play_previous(&mut self) {
        self.idle_advances = 0;
        if let Some(previous) = self.tracks.previous_index(self.session.index) {
            self.play_track(previous, Direction::Backward);
        }
    }

    /// Request a stop.
    ///
    /// The stop takes effect on the next transmit completion, or on the next
    /// poll when no slot is in flight.
    pub fn stop_playing(&mut self) {
        self.session.stop = true;
        if self.tx_slots.in_flight() == 0 {
            self.schedule(PlayerTask::Stop);
        }
    }

    /// Decode cursor of the open track.
    pub fn track_info(&self) -> Option<&TrackInfo> {
        self.session.file.as_ref().map(|_| &self.session.info)
    }

    /// Returns `true` while the open track is being streamed.
    pub fn is_playing(&self) -> bool {
        self.session.playing
    }

    // ── Stream completions ───────────────────────────────────────────────────

    /// A transmit slot has been played out (or dropped) by the stream.
    pub fn on_audio_sent(&mut self, slot: usize, status: RequestStatus) {
        if !self.tx_slots.release(slot) {
            warn!("player: completion for unknown tx slot {}", slot);
            return;
        }

        if status != RequestStatus::Completed || self.session.stop {
            self.schedule(PlayerTask::Stop);
        } else if self.session.playing {
            self.schedule(PlayerTask::Refill);
        }
    }

    /// A receive slot has been filled by the capture stream.
    ///
    /// Captured audio is not processed; the slot is simply returned to idle.
    pub fn on_audio_received(&mut self, slot: usize, status: RequestStatus) {
        if !self.rx_slots.release(slot) {
            warn!("player: completion for unknown rx slot {}", slot);
            return;
        }
        if status != RequestStatus::Completed {
            debug!("player: rx slot {} failed", slot);
        }
    }

    /// Receive stream handed to the player.
    pub fn rx(&mut self) -> &mut Rx {
        &mut self.rx
    }

    /// Board observer.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// Board observer, mutably.
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    // ── Executor ─────────────────────────────────────────────────────────────

    /// Run the oldest pending task. Returns `false` when the queue is empty.
    pub fn poll(&mut self) -> bool {
        let Some(task) = self.tasks.pop_front() else {
            return false;
        };
        trace!("player: task {}", task.as_str());
        match task {
            PlayerTask::Refill => self.refill(),
            PlayerTask::PlayNext => {
                self.session.advance_pending = false;
                self.advance_to_next();
            }
            PlayerTask::Stop => self.finish_stop(),
            PlayerTask::Abort => {
                self.reset_playback(None);
                self.report(PlayerState::Error);
            }
        }
        true
    }

    /// Run tasks until the queue is empty; returns how many ran.
    pub fn run_pending(&mut self) -> usize {
        let mut ran = 0usize;
        while self.poll() {
            ran = ran.saturating_add(1);
        }
        ran
    }

    /// Number of queued tasks.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn schedule(&mut self, task: PlayerTask) {
        // A queued task runs against the state at poll time, so a duplicate
        // would only repeat its work.
        if self.tasks.iter().any(|queued| *queued == task) {
            return;
        }
        if self.tasks.push_back(task).is_err() {
            warn!("player: task queue full, dropping {}", task.as_str());
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn report(&mut self, state: PlayerState) {
        info!("player: {}", state.as_str());
        self.observer.on_state_change(state);
    }

    fn advance_to_next(&mut self) {
        if let Some(next) = self.tracks.next_index(self.session.index) {
            self.play_track(next, Direction::Forward);
        }
    }

    /// Schedule a move to the next track once the current one ran dry.
    fn advance(&mut self) {
        self.idle_advances = self.idle_advances.saturating_add(1);
        if self.idle_advances > self.tracks.len() {
            warn!("player: no track produced audio, stopping");
            self.idle_advances = 0;
            self.reset_playback(None);
            self.report(PlayerState::Stopped);
            return;
        }
        self.session.advance_pending = true;
        self.schedule(PlayerTask::PlayNext);
    }

    /// Open the first playable track at or after `start` in `direction`.
    fn play_track(&mut self, start: usize, direction: Direction) {
        let count = self.tracks.len();
        if self.fs.is_none() || count == 0 || start >= count {
            return;
        }

        self.reset_playback(None);

        let Some(fs) = self.fs.as_mut() else {
            return;
        };
        let mut current = start;
        let mut failed = false;
        let mut opened = None;

        loop {
            let Some(path) = self.tracks.get(current) else {
                break;
            };
            match with_retries(|| fs.open(path)) {
                Ok(mut node) => {
                    let info = detect(&mut node, &mut self.scratch);
                    if info.format != TrackFormat::Unknown {
                        opened = Some((node, info));
                        break;
                    }
                    debug!("player: skipping {}", path);
                }
                Err(e) => {
                    error!("player: cannot open {}: {}", path, e.as_str());
                    failed = true;
                    break;
                }
            }

            current = match direction {
                Direction::Forward => self.tracks.next_index(current),
                Direction::Backward => self.tracks.previous_index(current),
            }
            .unwrap_or(start);
            if current == start {
                break;
            }
        }
        self.scratch.reset();

        if failed {
            self.schedule(PlayerTask::Abort);
        } else if let Some((node, info)) = opened {
            self.reset_playback(Some((node, current, info)));
            self.schedule(PlayerTask::Refill);
            self.report(PlayerState::Playing);
        } else {
            self.report(PlayerState::Stopped);
        }
    }

    /// Close the open track and install `opened`, if any.
    fn reset_playback(&mut self, opened: Option<(F::Node, usize, TrackInfo)>) {
        // Release the old node before anything else touches the filesystem.
        self.session.file = None;
        self.scratch.reset();
        #[cfg(feature = "mp3")]
        self.mp3.reset();

        self.session = match opened {
            Some((node, index, info)) => {
                info!(
                    "player: track {} [{}] {} Hz x{}",
                    index,
                    info.format.as_str(),
                    info.sample_rate,
                    info.channels
                );
                self.observer
                    .on_format_change(AudioConfig::pcm16(info.sample_rate, info.channels));
                Session {
                    file: Some(node),
                    index,
                    info,
                    playing: true,
                    stop: false,
                    advance_pending: false,
                }
            }
            None => Session::idle(),
        };
    }

    fn finish_stop(&mut self) {
        if self.session.file.is_some() {
            self.scratch.reset();
            #[cfg(feature = "mp3")]
            self.mp3.reset();
            self.session.info.rewind();
            self.session.playing = false;
            self.session.stop = false;
            self.session.advance_pending = false;
        } else {
            self.reset_playback(None);
        }
        self.report(PlayerState::Stopped);
    }

    /// Fill every idle transmit slot from the open track.
    fn refill(&mut self) {
        if !self.session.playing || self.session.stop || self.session.advance_pending {
            return;
        }

        for index in 0..self.tx_slots.len() {
            if self.session.info.is_exhausted() {
                self.advance();
                break;
            }

            let Some(file) = self.session.file.as_mut() else {
                return;
            };
            let Some(slot) = self.tx_slots.get_mut(index) else {
                break;
            };
            if !slot.is_idle() {
                continue;
            }

            let info = &mut self.session.info;
            let result = match info.format {
                TrackFormat::Wav => fetch_wav_chunk(file, info, slot.buffer_mut()),
                #[cfg(feature = "mp3")]
                TrackFormat::Mp3 => {
                    fetch_mp3_chunk(file, info, &mut self.scratch, &mut self.mp3, slot.buffer_mut())
                }
                #[cfg(not(feature = "mp3"))]
                TrackFormat::Mp3 => Err(DecodeError::Unsupported),
                TrackFormat::Unknown => Err(DecodeError::Unsupported),
            };

            match result {
                Ok(count) if count >= MIN_BUFFER_LEVEL => {
                    let data = slot.commit(count);
                    if self.tx.enqueue(index, data).is_err() {
                        slot.release();
                        warn!("player: stream rejected tx slot {}", index);
                        self.schedule(PlayerTask::Abort);
                        break;
                    }
                    self.idle_advances = 0;
                }
                Ok(count) => {
                    debug!("player: {} byte tail, advancing", count);
                    self.advance();
                    break;
                }
                Err(e) => {
                    error!("player: decode failed: {}", e.as_str());
                    self.schedule(PlayerTask::Abort);
                    break;
                }
            }
        }
    }
}
