//! Four-entry queue of pending data port writes

use crate::vdp::DataPortLocation;
use bincode::{Decode, Encode};
use std::collections::VecDeque;

pub const FIFO_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct FifoEntry {
    pub location: DataPortLocation,
    pub address: u16,
    pub word: u16,
    // Access slots already spent committing this entry
    slots_spent: u8,
}

impl FifoEntry {
    #[must_use]
    pub fn new(location: DataPortLocation, address: u16, word: u16) -> Self {
        Self { location, address, word, slots_spent: 0 }
    }

    // VRAM is 8 bits wide, so a word takes one slot per byte
    fn slots_needed(&self) -> u8 {
        match self.location {
            DataPortLocation::Vram => 2,
            DataPortLocation::Cram | DataPortLocation::Vsram => 1,
        }
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct VdpFifo {
    entries: VecDeque<FifoEntry>,
}

impl VdpFifo {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: VecDeque::with_capacity(FIFO_LEN) }
    }

    pub fn push(&mut self, entry: FifoEntry) {
        debug_assert!(!self.is_full());
        self.entries.push_back(entry);
    }

    /// Spend one access slot on the front entry, returning it once its last slot is spent.
    pub fn pop(&mut self) -> Option<FifoEntry> {
        let front = self.entries.front_mut()?;
        front.slots_spent += 1;
        if front.slots_spent < front.slots_needed() {
            return None;
        }

        self.entries.pop_front()
    }

    /// Remove the front entry however many slots it has consumed.
    pub fn pop_entry(&mut self) -> Option<FifoEntry> {
        self.entries.pop_front()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= FIFO_LEN
    }

    #[must_use]
    pub fn len(&self) -> u8 {
        self.entries.len() as u8
    }
}
