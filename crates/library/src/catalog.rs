//! TrackCatalog — capacity-bounded, ordered list of playable track paths.
//!
//! The catalog never allocates: it borrows a caller-owned arena of
//! [`TrackPath`] slots (see [`path_arena`](crate::path_arena)) and its
//! capacity is fixed to the arena length at construction. Clearing keeps the
//! arena; only the length is reset.

use rand_core::RngCore;
use thiserror_no_std::Error;

use crate::track::TrackPath;

/// Error type for catalog insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CatalogError {
    /// Every slot of the arena is in use.
    #[error("catalog is full")]
    Full,
    /// The path is longer than a [`TrackPath`] can hold.
    #[error("path too long")]
    PathTooLong,
}

/// Ordered catalog of track paths over a borrowed arena.
pub struct TrackCatalog<'a> {
    slots: &'a mut [TrackPath],
    len: usize,
}

impl<'a> TrackCatalog<'a> {
    /// Create an empty catalog whose capacity is `arena.len()`.
    pub fn new(arena: &'a mut [TrackPath]) -> Self {
        Self {
            slots: arena,
            len: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` when the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` when no further entry can be added.
    pub fn is_full(&self) -> bool {
        self.len >= self.slots.len()
    }

    /// Append `path`.
    pub fn push(&mut self, path: &str) -> Result<(), CatalogError> {
        let slot = self.slots.get_mut(self.len).ok_or(CatalogError::Full)?;
        slot.clear();
        slot.push_str(path).map_err(|_| CatalogError::PathTooLong)?;
        self.len = self.len.saturating_add(1);
        Ok(())
    }

    /// Path at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries().get(index).map(TrackPath::as_str)
    }

    /// Iterate over the entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries().iter().map(TrackPath::as_str)
    }

    /// Remove every entry without releasing the arena.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Order entries lexicographically by their full path (byte order).
    pub fn sort(&mut self) {
        self.entries_mut()
            .sort_unstable_by(|a, b| a.as_str().cmp(b.as_str()));
    }

    /// Shuffle entries in place (Fisher–Yates).
    ///
    /// The permutation depends only on the sequence of values produced by
    /// `rng`, so a seeded source gives a reproducible order.
    pub fn shuffle<R: RngCore + ?Sized>(&mut self, rng: &mut R) {
        let entries = self.entries_mut();
        for i in (1..entries.len()).rev() {
            let j = uniform_index(rng, i);
            entries.swap(i, j);
        }
    }

    /// Index after `index`, wrapping to 0 past the last entry.
    pub fn next_index(&self, index: usize) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let next = index.saturating_add(1);
        Some(if next >= self.len { 0 } else { next })
    }

    /// Index before `index`, wrapping to the last entry before 0.
    pub fn previous_index(&self, index: usize) -> Option<usize> {
        let last = self.len.checked_sub(1)?;
        Some(match index.checked_sub(1) {
            Some(previous) if previous <= last => previous,
            _ => last,
        })
    }

    fn entries(&self) -> &[TrackPath] {
        self.slots.get(..self.len).unwrap_or_default()
    }

    fn entries_mut(&mut self) -> &mut [TrackPath] {
        self.slots.get_mut(..self.len).unwrap_or_default()
    }
}

/// Draw an index in `0..=upper` from `rng`.
fn uniform_index<R: RngCore + ?Sized>(rng: &mut R, upper: usize) -> usize {
    let draw = usize::try_from(rng.next_u32()).unwrap_or(usize::MAX);
    draw.checked_rem(upper.saturating_add(1)).unwrap_or(0)
}
