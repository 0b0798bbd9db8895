//! Const-generic single-slot byte buffer.
//!
//! `ChunkSlot<N>` holds at most one chunk of up to `N` bytes. The reader
//! copies the chunk out and clears the slot only once it has finished with
//! it, so a new chunk can only go in after the previous one is fully
//! drained. That is what throttles the orchestrator to the decoder's pace.
//!
//! Not synchronised: the stream keeps it behind its own lock.

use thiserror_no_std::Error;

/// Refusal from [`ChunkSlot::fill`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotError {
    /// A chunk is already waiting to be drained.
    #[error("slot already holds a chunk")]
    Occupied,
    /// The chunk does not fit.
    #[error("chunk larger than the slot")]
    TooLarge,
    /// Empty chunks are not stored.
    #[error("empty chunk")]
    Empty,
}

/// A fixed-capacity, one-chunk buffer.
pub struct ChunkSlot<const N: usize> {
    buf: [u8; N],
    /// Occupied bytes; zero means empty.
    len: usize,
}

impl<const N: usize> ChunkSlot<N> {
    /// An empty slot. `const` so it can live in a `static`.
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Copy `data` in.
    ///
    /// # Errors
    ///
    /// Fails without touching the slot if it is occupied, or if `data` is
    /// empty or longer than `N`.
    pub fn fill(&mut self, data: &[u8]) -> Result<(), SlotError> {
        if self.len != 0 {
            return Err(SlotError::Occupied);
        }
        if data.is_empty() {
            return Err(SlotError::Empty);
        }
        let dst = self.buf.get_mut(..data.len()).ok_or(SlotError::TooLarge)?;
        dst.copy_from_slice(data);
        self.len = data.len();
        Ok(())
    }

    /// Copy the chunk into `out`, leaving the slot occupied. Returns the
    /// number of bytes copied, 0 if the slot is empty.
    pub fn copy_out(&self, out: &mut [u8; N]) -> usize {
        out.copy_from_slice(&self.buf);
        self.len
    }

    /// Empty the slot: the chunk is drained, or dropped.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Occupied bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when a new chunk may be filled in.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Largest chunk the slot takes.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> Default for ChunkSlot<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn copy_out_keeps_the_slot_occupied_until_cleared() {
        let mut slot: ChunkSlot<8> = ChunkSlot::new();
        slot.fill(&[1, 2, 3]).unwrap();
        assert_eq!(slot.len(), 3);
        let mut out = [0u8; 8];
        assert_eq!(slot.copy_out(&mut out), 3);
        assert_eq!(out.get(..3), Some(&[1, 2, 3][..]));
        assert_eq!(slot.fill(&[4]), Err(SlotError::Occupied));
        slot.clear();
        assert!(slot.is_empty());
        assert!(slot.fill(&[4]).is_ok());
    }

    #[test]
    fn second_fill_before_drain_is_refused() {
        let mut slot: ChunkSlot<8> = ChunkSlot::new();
        slot.fill(&[9; 8]).unwrap();
        assert_eq!(slot.fill(&[1]), Err(SlotError::Occupied));
        let mut out = [0u8; 8];
        slot.copy_out(&mut out);
        assert_eq!(out, [9; 8]);
        slot.clear();
        assert!(slot.fill(&[1]).is_ok());
    }

    #[test]
    fn oversized_and_empty_chunks_are_refused() {
        let mut slot: ChunkSlot<4> = ChunkSlot::new();
        assert_eq!(slot.fill(&[0; 5]), Err(SlotError::TooLarge));
        assert_eq!(slot.fill(&[]), Err(SlotError::Empty));
        assert!(slot.is_empty());
        assert_eq!(slot.capacity(), 4);
    }

    #[test]
    fn copying_from_empty_slot_moves_nothing() {
        let slot: ChunkSlot<4> = ChunkSlot::new();
        let mut out = [0u8; 4];
        assert_eq!(slot.copy_out(&mut out), 0);
    }
}
