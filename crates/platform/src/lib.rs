//! Collaborator contracts for the playback engine.
//!
//! The engine never touches hardware directly. Everything it needs from the
//! board is expressed here as a narrow trait:
//!
//! ```text
//! Board layer (FAT32 driver, I2S DMA, work queue, codec/amp handlers)
//!         ↓ implements
//! Platform contracts (this crate)
//!         ↓ consumed by
//! library (track catalog) + playback (parsers, pipeline, player)
//! ```
//!
//! - [`FileSystem`] / [`FsNode`] - node-based filesystem access
//! - [`AudioStream`] - slot-based audio output (and capture) streams
//! - [`config`] - compile-time limits shared by every engine crate
//!
//! # Features
//!
//! - `std`: in-memory [`mocks`] for host tests
//! - `defmt`: `defmt::Format` derives on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod audio;
pub mod config;
pub mod storage;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use audio::{AudioConfig, AudioStream, RequestStatus};
pub use storage::{with_retries, FileSystem, FsError, FsNode, NodeName};
