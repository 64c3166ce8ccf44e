//! Node-based filesystem contract
//!
//! Mirrors the shape of a FAT32 driver: a handle yields nodes, a node is
//! either a directory (iterated with [`FsNode::first_child`] and
//! [`FsNode::advance`]) or a file with a data stream. Calls are synchronous
//! and short; a driver that cannot serve a request right now returns
//! [`FsError::Busy`] and the caller retries a bounded number of times with
//! [`with_retries`]. Dropping a node releases it.

use thiserror_no_std::Error;

use crate::config::{MAX_READ_RETRIES, PATH_LENGTH};

/// Fixed-capacity buffer for a node name or a joined path.
pub type NodeName = heapless::String<PATH_LENGTH>;

/// Errors reported by a filesystem driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// The driver could not serve the request now; retrying may succeed.
    #[error("filesystem busy")]
    Busy,
    /// No such node, or the end of a directory listing was reached.
    #[error("no such entry")]
    NoEntry,
    /// The node has no data stream (it is a directory).
    #[error("node has no data stream")]
    NoData,
    /// A name did not fit into [`NodeName`].
    #[error("name too long")]
    NameTooLong,
    /// Unrecoverable device or media error.
    #[error("I/O error")]
    Io,
}

impl FsError {
    /// Returns `true` for failures that are worth retrying.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Busy)
    }

    /// Short name for log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Busy => "busy",
            Self::NoEntry => "no entry",
            Self::NoData => "no data",
            Self::NameTooLong => "name too long",
            Self::Io => "io",
        }
    }
}

/// A mounted filesystem.
pub trait FileSystem {
    /// Node type handed out by this filesystem.
    type Node: FsNode;

    /// Open the root directory.
    fn root(&mut self) -> Result<Self::Node, FsError>;

    /// Open the node at an absolute `path` such as `/music/a.wav`.
    fn open(&mut self, path: &str) -> Result<Self::Node, FsError>;
}

/// A file or directory on a mounted filesystem.
pub trait FsNode: Sized {
    /// Read data starting at byte `offset` into `buf`.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// at the end of the data stream.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Length of the data stream in bytes.
    fn length(&mut self) -> Result<u64, FsError>;

    /// Returns `true` when the node carries a readable data stream.
    fn has_data(&mut self) -> bool;

    /// Copy the node's own name (not its full path) into `name`.
    fn name(&mut self, name: &mut NodeName) -> Result<(), FsError>;

    /// Open the first entry of this directory.
    fn first_child(&mut self) -> Result<Self, FsError>;

    /// Move this node to its next sibling.
    ///
    /// Returns [`FsError::NoEntry`] once the listing is exhausted.
    fn advance(&mut self) -> Result<(), FsError>;
}

/// Run `op` until it succeeds, fails permanently, or [`MAX_READ_RETRIES`]
/// attempts have been made.
///
/// Only [transient](FsError::is_transient) failures are retried; the last
/// result is returned either way.
pub fn with_retries<T>(mut op: impl FnMut() -> Result<T, FsError>) -> Result<T, FsError> {
    let mut result = op();
    for _ in 1..MAX_READ_RETRIES {
        match result {
            Err(error) if error.is_transient() => result = op(),
            _ => break,
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut calls = 0;
        let result = with_retries(|| {
            calls += 1;
            if calls < 3 {
                Err(FsError::Busy)
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result, Ok(3));
    }

    #[test]
    fn retries_are_bounded() {
        let mut calls = 0;
        let result: Result<(), FsError> = with_retries(|| {
            calls += 1;
            Err(FsError::Busy)
        });
        assert_eq!(result, Err(FsError::Busy));
        assert_eq!(calls, MAX_READ_RETRIES);
    }

    #[test]
    fn permanent_failures_return_immediately() {
        let mut calls = 0;
        let result: Result<(), FsError> = with_retries(|| {
            calls += 1;
            Err(FsError::NoEntry)
        });
        assert_eq!(result, Err(FsError::NoEntry));
        assert_eq!(calls, 1);
    }

    #[test]
    fn only_busy_is_transient() {
        assert!(FsError::Busy.is_transient());
        assert!(!FsError::Io.is_transient());
        assert!(!FsError::NoData.is_transient());
    }
}
