//! Playback engine: format detection, double-buffered streaming and the
//! player state machine.
//!
//! # Modules
//!
//! - [`engine`]: `Player`, the state machine and its deferred task queue
//! - [`config`]: `PlayerConfig`, slot layout validated at construction
//! - [`decoder`]: `TrackInfo` cursor and format detection
//! - [`wav`] / [`mp3`]: container header parsing
//! - [`pipeline`]: chunk reads into output slots
//! - [`slots`]: fixed request slots carved from caller arenas
//!
//! # Features
//!
//! - `mp3`: MPEG Layer III detection and decoding through `nanomp3`
//! - `defmt` / `tracing`: log backend for embedded or host builds

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

pub mod config;
pub mod decoder;
pub mod engine;
pub mod mp3;
#[cfg(feature = "mp3")]
pub mod mp3_decoder;
pub mod pipeline;
pub mod slots;
pub mod wav;

pub use config::{ConfigError, PlayerConfig, MIN_TX_LENGTH};
pub use decoder::{DecodeError, TrackFormat, TrackInfo};
pub use engine::{NoopObserver, Player, PlayerObserver, PlayerResources, PlayerState, PlayerTask};
