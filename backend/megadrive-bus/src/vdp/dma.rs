//! DMA transfers and FIFO backpressure, advanced one access slot at a time
//!
//! A scanline is divided into slots of two pixels each. During active display only a handful of
//! slots give the VDP external memory access, while during blanking every slot except the refresh
//! slots is available. FIFO pops and DMA transfers both consume these access slots.


use crate::vdp::fifo::{FifoEntry, VdpFifo};
use crate::vdp::registers::{DmaMode, HorizontalDisplaySize};
use crate::vdp::{DataPortLocation, DmaSource, VdpBusyState, VdpMemory};
use bincode::{Decode, Encode};

// Slot pixel positions are relative to the start of active display
const H32_ACCESS_SLOT_PIXELS: &[u16] =
    &[2, 18, 34, 66, 82, 98, 130, 146, 162, 194, 210, 226, 256, 258, 286, 314];
const H40_ACCESS_SLOT_PIXELS: &[u16] =
    &[2, 18, 34, 66, 82, 98, 130, 146, 162, 194, 210, 226, 258, 274, 290, 320, 322, 370];

// One refresh slot per 64 pixels is never available, even during blanking
const H32_REFRESH_SLOT_PIXELS: &[u16] = &[50, 114, 178, 242, 306];
const H40_REFRESH_SLOT_PIXELS: &[u16] = &[50, 114, 178, 242, 306, 372];

const H32_PIXELS_PER_LINE: u16 = 342;
const H40_PIXELS_PER_LINE: u16 = 420;

const PIXELS_PER_SLOT: u16 = 2;

impl HorizontalDisplaySize {
    fn access_slot_pixels(self) -> &'static [u16] {
        match self {
            Self::ThirtyTwoCell => H32_ACCESS_SLOT_PIXELS,
            Self::FortyCell => H40_ACCESS_SLOT_PIXELS,
        }
    }

    fn refresh_slot_pixels(self) -> &'static [u16] {
        match self {
            Self::ThirtyTwoCell => H32_REFRESH_SLOT_PIXELS,
            Self::FortyCell => H40_REFRESH_SLOT_PIXELS,
        }
    }

    #[must_use]
    pub fn pixels_per_line(self) -> u16 {
        match self {
            Self::ThirtyTwoCell => H32_PIXELS_PER_LINE,
            Self::FortyCell => H40_PIXELS_PER_LINE,
        }
    }

    /// Total slots in one scanline, 171 in H32 and 210 in H40.
    #[must_use]
    pub fn slots_per_line(self) -> u16 {
        self.pixels_per_line() / PIXELS_PER_SLOT
    }

    #[must_use]
    pub fn refresh_slots_per_line(self) -> u32 {
        self.refresh_slot_pixels().len() as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum LineType {
    Active,
    Blanked,
}

/// Whether the given slot of a line gives the VDP an external memory access.
#[must_use]
pub fn is_access_slot(h_size: HorizontalDisplaySize, line_type: LineType, slot: u16) -> bool {
    if slot >= h_size.slots_per_line() {
        return false;
    }

    let pixel = slot * PIXELS_PER_SLOT;
    match line_type {
        LineType::Active => h_size.access_slot_pixels().contains(&pixel),
        LineType::Blanked => !h_size.refresh_slot_pixels().contains(&pixel),
    }
}

/// Number of access slots in one line of the given type.
#[must_use]
pub fn slots_available_this_line(h_size: HorizontalDisplaySize, line_type: LineType) -> u32 {
    match line_type {
        LineType::Active => h_size.access_slot_pixels().len() as u32,
        LineType::Blanked => {
            u32::from(h_size.slots_per_line()) - h_size.refresh_slots_per_line()
        }
    }
}

/// Access slots one transfer unit costs: a word for 68k transfers, a byte for fill and copy.
#[must_use]
pub fn slots_per_unit(mode: DmaMode, location: DataPortLocation) -> u32 {
    match (mode, location) {
        (DmaMode::MemoryToVram, DataPortLocation::Vram) => 2,
        (DmaMode::MemoryToVram, DataPortLocation::Cram | DataPortLocation::Vsram) => 1,
        (DmaMode::VramFill, _) => 1,
        // One read slot plus one write slot per byte
        (DmaMode::VramCopy, _) => 2,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ActiveDma {
    MemoryToVram { source: u32 },
    // Fill data arrives with the next data port write
    VramFill { data: Option<u8> },
    VramCopy { source: u16 },
}

impl ActiveDma {
    #[must_use]
    pub fn mode(self) -> DmaMode {
        match self {
            Self::MemoryToVram { .. } => DmaMode::MemoryToVram,
            Self::VramFill { .. } => DmaMode::VramFill,
            Self::VramCopy { .. } => DmaMode::VramCopy,
        }
    }
}

/// Register state to write back once a transfer ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaCompletion {
    /// Final source address in register form; fills leave the source registers alone
    pub source_register: Option<u32>,
}

/// Destination state the engine advances while transferring.
pub struct DmaTarget<'a> {
    pub memory: &'a mut VdpMemory,
    pub address: &'a mut u16,
    pub auto_increment: u16,
}

impl DmaTarget<'_> {
    fn increment_address(&mut self) {
        *self.address = self.address.wrapping_add(self.auto_increment);
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct DmaFifoEngine {
    fifo: VdpFifo,
    active: Option<ActiveDma>,
    location: DataPortLocation,
    length: u32,
    unit_slots: u32,
}

impl DmaFifoEngine {
    pub fn new() -> Self {
        Self {
            fifo: VdpFifo::new(),
            active: None,
            location: DataPortLocation::Vram,
            length: 0,
            unit_slots: 0,
        }
    }

    #[must_use]
    pub fn active_dma(&self) -> Option<ActiveDma> {
        self.active
    }

    #[must_use]
    pub fn is_dma_busy(&self) -> bool {
        self.active.is_some()
    }

    #[must_use]
    pub fn length_remaining(&self) -> u32 {
        self.length
    }

    #[must_use]
    pub fn fifo_empty(&self) -> bool {
        self.fifo.is_empty()
    }

    #[must_use]
    pub fn fifo_full(&self) -> bool {
        self.fifo.is_full()
    }

    #[must_use]
    pub fn fifo_len(&self) -> u8 {
        self.fifo.len()
    }

    #[must_use]
    pub fn busy_state(&self) -> VdpBusyState {
        if matches!(self.active, Some(ActiveDma::MemoryToVram { .. })) {
            VdpBusyState::MemToVram
        } else if self.fifo.is_full() {
            VdpBusyState::FifoFull
        } else {
            VdpBusyState::NotBusy
        }
    }

    pub fn start_memory_to_vram(&mut self, source: u32, length: u32, location: DataPortLocation) {
        log::trace!("Starting 68k DMA of {length} words from {source:06X} to {location:?}");
        self.start(ActiveDma::MemoryToVram { source }, length, location);
    }

    pub fn arm_fill(&mut self, length: u32) {
        log::trace!("VRAM fill of {length} bytes armed, waiting for data port write");
        self.start(ActiveDma::VramFill { data: None }, length, DataPortLocation::Vram);
    }

    pub fn start_copy(&mut self, source: u16, length: u32) {
        log::trace!("Starting VRAM copy of {length} bytes from {source:04X}");
        self.start(ActiveDma::VramCopy { source }, length, DataPortLocation::Vram);
    }

    fn start(&mut self, dma: ActiveDma, length: u32, location: DataPortLocation) {
        if let Some(previous) = self.active {
            log::warn!(
                "{} DMA started while {} DMA still had {} units left",
                dma.mode(),
                previous.mode(),
                self.length
            );
        }

        self.active = Some(dma);
        self.location = location;
        self.length = length;
        self.unit_slots = 0;
    }

    /// Feed the data port write that starts an armed fill. Returns false if no fill was waiting.
    pub fn supply_fill_data(&mut self, word: u16) -> bool {
        match &mut self.active {
            Some(ActiveDma::VramFill { data: data @ None }) => {
                *data = Some((word >> 8) as u8);
                true
            }
            _ => false,
        }
    }

    /// Queue a data port write. A write into a full FIFO commits the oldest entry immediately.
    pub fn push_write(&mut self, entry: FifoEntry, memory: &mut VdpMemory) {
        if self.fifo.is_full() {
            log::debug!("Data port write with a full FIFO, committing oldest entry early");
            if let Some(front) = self.fifo.pop_entry() {
                memory.write_word(front.location, front.address, front.word);
            }
        }

        self.fifo.push(entry);
    }

    /// Commit every queued write, e.g. before a data port read.
    pub fn flush_fifo(&mut self, memory: &mut VdpMemory) {
        while let Some(entry) = self.fifo.pop_entry() {
            memory.write_word(entry.location, entry.address, entry.word);
        }
    }

    /// Advance one slot, reporting a DMA that finished during it.
    pub fn tick(
        &mut self,
        access_slot: bool,
        target: &mut DmaTarget<'_>,
        source: &dyn DmaSource,
    ) -> Option<DmaCompletion> {
        if !access_slot {
            return None;
        }

        let mut completed = None;

        if let Some(ActiveDma::MemoryToVram { source: source_address }) = &mut self.active {
            if !self.fifo.is_full() {
                let word = source.read_word(*source_address);
                self.fifo.push(FifoEntry::new(self.location, *target.address, word));
                target.increment_address();

                // Source address increments only within a 128KB window
                *source_address = (*source_address & 0xFE_0000)
                    | (source_address.wrapping_add(2) & 0x01_FFFF);

                self.length -= 1;
                if self.length == 0 {
                    completed = Some(self.finish());
                }
            }
        }

        if !self.fifo.is_empty() {
            if let Some(entry) = self.fifo.pop() {
                target.memory.write_word(entry.location, entry.address, entry.word);
            }
            return completed;
        }

        match &mut self.active {
            Some(ActiveDma::VramFill { data: Some(data) }) => {
                let data = *data;
                target.memory.write_vram_byte(*target.address ^ 1, data);
                target.increment_address();
                self.length -= 1;
            }
            Some(ActiveDma::VramCopy { source }) => {
                self.unit_slots += 1;
                if self.unit_slots == slots_per_unit(DmaMode::VramCopy, self.location) {
                    self.unit_slots = 0;

                    let byte = target.memory.read_vram_byte(*source);
                    target.memory.write_vram_byte(*target.address, byte);
                    *source = source.wrapping_add(1);
                    target.increment_address();
                    self.length -= 1;
                }
            }
            Some(ActiveDma::VramFill { data: None } | ActiveDma::MemoryToVram { .. }) | None => {}
        }

        if self.length == 0 && self.active.is_some() {
            completed = Some(self.finish());
        }

        completed
    }

    fn finish(&mut self) -> DmaCompletion {
        let source_register = match self.active {
            Some(ActiveDma::MemoryToVram { source }) => Some(source),
            Some(ActiveDma::VramCopy { source }) => Some(u32::from(source) << 1),
            Some(ActiveDma::VramFill { .. }) | None => None,
        };

        log::trace!("VDP DMA in mode {:?} complete", self.active.map(ActiveDma::mode));
        self.active = None;
        self.unit_slots = 0;

        DmaCompletion { source_register }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for DmaFifoEngine {
    fn default() -> Self {
        Self::new()
    }
}
