//! Request slots — fixed output buffers carved out of a caller arena.
//!
//! A slot with `length == 0` is idle and may be refilled. A slot with a
//! nonzero length has been handed to the audio stream and stays untouched
//! until its completion is reported, so a DMA engine may keep reading it.

use heapless::Vec;
use platform::config::MAX_SLOTS;

/// One request slot.
pub struct Slot<'a> {
    buffer: &'a mut [u8],
    length: usize,
}

impl<'a> Slot<'a> {
    /// Byte capacity of the slot.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes submitted to the stream, 0 when idle.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Returns `true` when the slot can be refilled.
    pub fn is_idle(&self) -> bool {
        self.length == 0
    }

    /// Whole buffer for filling; only meaningful while idle.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        self.buffer
    }

    /// Mark the first `length` bytes as submitted and return them.
    pub fn commit(&mut self, length: usize) -> &[u8] {
        self.length = length.min(self.buffer.len());
        self.buffer.get(..self.length).unwrap_or_default()
    }

    /// Return the slot to idle.
    pub fn release(&mut self) {
        self.length = 0;
    }
}

/// Fixed pool of request slots for one stream direction.
pub struct SlotPool<'a> {
    slots: Vec<Slot<'a>, MAX_SLOTS>,
}

impl<'a> SlotPool<'a> {
    /// Split `arena` into `count` slots of `length` bytes each.
    ///
    /// Slots that the arena cannot cover, or that exceed [`MAX_SLOTS`], are
    /// not created; callers validate the layout first.
    pub fn split(arena: &'a mut [u8], count: usize, length: usize) -> Self {
        let mut slots = Vec::new();
        if length == 0 {
            for _ in 0..count.min(MAX_SLOTS) {
                let _ = slots.push(Slot {
                    buffer: &mut [],
                    length: 0,
                });
            }
        } else {
            for buffer in arena.chunks_exact_mut(length).take(count) {
                if slots.push(Slot { buffer, length: 0 }).is_err() {
                    break;
                }
            }
        }
        Self { slots }
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when the pool has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slot at `index`.
    pub fn get(&self, index: usize) -> Option<&Slot<'a>> {
        self.slots.get(index)
    }

    /// Mutable slot at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Slot<'a>> {
        self.slots.get_mut(index)
    }

    /// Release slot `index`; returns `false` for an unknown index.
    pub fn release(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                slot.release();
                true
            }
            None => false,
        }
    }

    /// Number of slots currently owned by the stream.
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| !slot.is_idle()).count()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn arena_is_split_into_equal_slots() {
        let mut arena = [0u8; 100];
        let pool = SlotPool::split(&mut arena, 3, 32);
        assert_eq!(pool.len(), 3);
        assert!((0..3).all(|i| pool.get(i).unwrap().capacity() == 32));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn short_arena_yields_fewer_slots() {
        let mut arena = [0u8; 40];
        let pool = SlotPool::split(&mut arena, 3, 32);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn zero_length_slots_are_empty() {
        let mut arena = [0u8; 0];
        let pool = SlotPool::split(&mut arena, 2, 0);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(1).unwrap().capacity(), 0);
    }

    #[test]
    fn commit_and_release() {
        let mut arena = [0u8; 64];
        let mut pool = SlotPool::split(&mut arena, 2, 32);
        let slot = pool.get_mut(1).unwrap();
        slot.buffer_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(slot.commit(4), &[1, 2, 3, 4]);
        assert!(!slot.is_idle());
        assert_eq!(pool.in_flight(), 1);

        assert!(pool.release(1));
        assert!(!pool.release(5));
        assert_eq!(pool.in_flight(), 0);
    }

    #[test]
    fn commit_is_clamped_to_capacity() {
        let mut arena = [0u8; 16];
        let mut pool = SlotPool::split(&mut arena, 1, 16);
        let slot = pool.get_mut(0).unwrap();
        assert_eq!(slot.commit(100).len(), 16);
        assert_eq!(slot.length(), 16);
    }
}
