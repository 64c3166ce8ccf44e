//! Track catalog for the playback engine: volume scan and track ordering.
//!
//! # Modules
//!
//! - [`track`]: `TrackPath`, extension and name rules
//! - [`catalog`]: `TrackCatalog`, arena-backed ordered path list
//! - [`scanner`]: recursive directory walk feeding the catalog
//!
//! # Features
//!
//! - `mp3`: accept `.mp3` files in addition to `.wav`
//! - `defmt` / `tracing`: log backend for embedded or host builds

#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![warn(missing_docs)]

#[macro_use]
mod fmt;

pub mod catalog;
pub mod scanner;
pub mod track;

pub use catalog::{CatalogError, TrackCatalog};
pub use scanner::{scan_tree, TrackOrder};
pub use track::{is_supported_name, path_arena, TrackPath};
