//! Mock implementations for testing
//!
//! [`MemoryFs`] is an in-memory directory tree with fault injection;
//! [`RecordingStream`] captures every submitted slot. Both are cheap to clone
//! handles onto shared state so a test can keep inspecting them after
//! handing a copy to the engine.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::arithmetic_side_effects)] // Host-only test doubles
#![allow(clippy::indexing_slicing)] // Host-only test doubles
#![allow(clippy::cast_possible_truncation)]

use std::cell::RefCell;
use std::rc::Rc;
use std::string::{String, ToString};
use std::vec::Vec;

use crate::audio::AudioStream;
use crate::storage::{FileSystem, FsError, FsNode, NodeName};

struct Entry {
    path: String,
    data: Option<Vec<u8>>,
}

#[derive(Default)]
struct Faults {
    busy_reads: usize,
    short_reads: usize,
    busy_listings: usize,
    broken_reads: bool,
    broken_open: bool,
    broken_root: bool,
}

/// One data read served by [`MemoryFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRecord {
    /// Path of the node that was read.
    pub path: String,
    /// Requested byte offset.
    pub offset: u64,
    /// Requested length.
    pub requested: usize,
    /// Bytes actually returned.
    pub returned: usize,
}

struct Inner {
    entries: Vec<Entry>,
    faults: Faults,
    live_nodes: usize,
    reads: Vec<ReadRecord>,
}

impl Inner {
    fn find(&self, path: &str) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.path == path)
    }

    fn children(&self, dir: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|entry| entry.path != "/" && parent_of(&entry.path) == dir)
            .map(|entry| entry.path.clone())
            .collect()
    }

    fn take_busy_listing(&mut self) -> bool {
        if self.faults.busy_listings > 0 {
            self.faults.busy_listings -= 1;
            true
        } else {
            false
        }
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit_once('/').map_or(path, |(_, name)| name)
}

/// In-memory filesystem.
///
/// Directories are created implicitly for every ancestor of an added file
/// and are listed in insertion order, like an unsorted FAT directory.
#[derive(Clone)]
pub struct MemoryFs {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                entries: vec![Entry {
                    path: "/".to_string(),
                    data: None,
                }],
                faults: Faults::default(),
                live_nodes: 0,
                reads: Vec::new(),
            })),
        }
    }

    /// Add a directory (and its ancestors).
    pub fn add_dir(&self, path: &str) -> &Self {
        let mut inner = self.inner.borrow_mut();
        let mut partial = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            partial.push('/');
            partial.push_str(component);
            if inner.find(&partial).is_none() {
                inner.entries.push(Entry {
                    path: partial.clone(),
                    data: None,
                });
            }
        }
        self
    }

    /// Add a file with the given contents, creating parent directories.
    pub fn add_file(&self, path: &str, data: impl Into<Vec<u8>>) -> &Self {
        self.add_dir(parent_of(path));
        self.inner.borrow_mut().entries.push(Entry {
            path: path.to_string(),
            data: Some(data.into()),
        });
        self
    }

    /// Make the next `count` data reads fail with [`FsError::Busy`].
    pub fn fail_next_reads(&self, count: usize) {
        self.inner.borrow_mut().faults.busy_reads = count;
    }

    /// Make the next `count` data reads return half of the requested bytes.
    pub fn shorten_next_reads(&self, count: usize) {
        self.inner.borrow_mut().faults.short_reads = count;
    }

    /// Make the next `count` listing calls (name, first child, advance) busy.
    pub fn fail_next_listings(&self, count: usize) {
        self.inner.borrow_mut().faults.busy_listings = count;
    }

    /// Make every data read fail with [`FsError::Io`].
    pub fn break_reads(&self, broken: bool) {
        self.inner.borrow_mut().faults.broken_reads = broken;
    }

    /// Make [`FileSystem::open`] fail with [`FsError::Io`].
    pub fn break_open(&self, broken: bool) {
        self.inner.borrow_mut().faults.broken_open = broken;
    }

    /// Make [`FileSystem::root`] fail with [`FsError::Io`].
    pub fn break_root(&self, broken: bool) {
        self.inner.borrow_mut().faults.broken_root = broken;
    }

    /// Number of nodes currently alive.
    pub fn live_nodes(&self) -> usize {
        self.inner.borrow().live_nodes
    }

    /// Every data read served so far.
    pub fn reads(&self) -> Vec<ReadRecord> {
        self.inner.borrow().reads.clone()
    }

    /// Forget the recorded reads.
    pub fn clear_reads(&self) {
        self.inner.borrow_mut().reads.clear();
    }

    fn node(&self, path: String) -> MemNode {
        self.inner.borrow_mut().live_nodes += 1;
        MemNode {
            inner: Rc::clone(&self.inner),
            path,
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    type Node = MemNode;

    fn root(&mut self) -> Result<MemNode, FsError> {
        if self.inner.borrow().faults.broken_root {
            return Err(FsError::Io);
        }
        Ok(self.node("/".to_string()))
    }

    fn open(&mut self, path: &str) -> Result<MemNode, FsError> {
        {
            let inner = self.inner.borrow();
            if inner.faults.broken_open {
                return Err(FsError::Io);
            }
            if inner.find(path).is_none() {
                return Err(FsError::NoEntry);
            }
        }
        Ok(self.node(path.to_string()))
    }
}

/// Node of a [`MemoryFs`].
pub struct MemNode {
    inner: Rc<RefCell<Inner>>,
    path: String,
}

impl MemNode {
    /// Absolute path of the node.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Drop for MemNode {
    fn drop(&mut self) {
        self.inner.borrow_mut().live_nodes -= 1;
    }
}

impl FsNode for MemNode {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, FsError> {
        let mut inner = self.inner.borrow_mut();
        if inner.faults.busy_reads > 0 {
            inner.faults.busy_reads -= 1;
            return Err(FsError::Busy);
        }
        if inner.faults.broken_reads {
            return Err(FsError::Io);
        }
        let shorten = inner.faults.short_reads > 0;
        let data = inner
            .find(&self.path)
            .and_then(|entry| entry.data.as_ref())
            .ok_or(FsError::NoData)?;

        let start = (offset as usize).min(data.len());
        let mut count = buf.len().min(data.len() - start);
        if shorten && count > 1 {
            count /= 2;
        }
        buf[..count].copy_from_slice(&data[start..start + count]);

        if shorten {
            inner.faults.short_reads -= 1;
        }
        inner.reads.push(ReadRecord {
            path: self.path.clone(),
            offset,
            requested: buf.len(),
            returned: count,
        });
        Ok(count)
    }

    fn length(&mut self) -> Result<u64, FsError> {
        let inner = self.inner.borrow();
        inner
            .find(&self.path)
            .and_then(|entry| entry.data.as_ref())
            .map(|data| data.len() as u64)
            .ok_or(FsError::NoData)
    }

    fn has_data(&mut self) -> bool {
        let inner = self.inner.borrow();
        inner
            .find(&self.path)
            .is_some_and(|entry| entry.data.is_some())
    }

    fn name(&mut self, name: &mut NodeName) -> Result<(), FsError> {
        if self.inner.borrow_mut().take_busy_listing() {
            return Err(FsError::Busy);
        }
        name.clear();
        name.push_str(base_name(&self.path))
            .map_err(|_| FsError::NameTooLong)
    }

    fn first_child(&mut self) -> Result<Self, FsError> {
        let child = {
            let mut inner = self.inner.borrow_mut();
            if inner.take_busy_listing() {
                return Err(FsError::Busy);
            }
            inner.children(&self.path).into_iter().next()
        };
        match child {
            Some(path) => {
                self.inner.borrow_mut().live_nodes += 1;
                Ok(MemNode {
                    inner: Rc::clone(&self.inner),
                    path,
                })
            }
            None => Err(FsError::NoEntry),
        }
    }

    fn advance(&mut self) -> Result<(), FsError> {
        let mut inner = self.inner.borrow_mut();
        if inner.take_busy_listing() {
            return Err(FsError::Busy);
        }
        let siblings = inner.children(parent_of(&self.path));
        let next = siblings
            .iter()
            .position(|path| *path == self.path)
            .and_then(|index| siblings.get(index + 1));
        match next {
            Some(path) => {
                self.path = path.clone();
                Ok(())
            }
            None => Err(FsError::NoEntry),
        }
    }
}

/// Error returned by a [`RecordingStream`] set to reject submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRejected;

/// One slot submitted to a [`RecordingStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Slot index.
    pub slot: usize,
    /// Copy of the submitted bytes.
    pub data: Vec<u8>,
}

/// Audio stream that records every submitted slot.
#[derive(Clone, Default)]
pub struct RecordingStream {
    submissions: Rc<RefCell<Vec<Submission>>>,
    rejecting: Rc<RefCell<bool>>,
}

impl RecordingStream {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All submissions so far, oldest first.
    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.borrow().clone()
    }

    /// Remove and return all submissions so far.
    pub fn take_submissions(&self) -> Vec<Submission> {
        std::mem::take(&mut *self.submissions.borrow_mut())
    }

    /// Make subsequent submissions fail.
    pub fn set_rejecting(&self, rejecting: bool) {
        *self.rejecting.borrow_mut() = rejecting;
    }
}

impl AudioStream for RecordingStream {
    type Error = StreamRejected;

    fn enqueue(&mut self, slot: usize, data: &[u8]) -> Result<(), Self::Error> {
        if *self.rejecting.borrow() {
            return Err(StreamRejected);
        }
        self.submissions.borrow_mut().push(Submission {
            slot,
            data: data.to_vec(),
        });
        Ok(())
    }
}
