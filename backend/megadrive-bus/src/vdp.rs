//! VDP port interface and a non-rendering VDP that models registers, memory, interrupts and DMA
//! timing

pub mod dma;
pub mod fifo;
pub mod registers;

#[cfg(test)]
mod tests;

use crate::vdp::dma::{DmaFifoEngine, DmaTarget, LineType};
use crate::vdp::fifo::FifoEntry;
use crate::vdp::registers::{DmaMode, HorizontalDisplaySize, Registers, VerticalDisplaySize};
use bincode::{Decode, Encode};
use megadrive_common::frontend::TimingMode;
use megadrive_common::num::GetBit;

pub const VRAM_LEN: usize = 64 * 1024;
pub const CRAM_LEN: usize = 128;
pub const VSRAM_LEN: usize = 80;

pub const MCLK_CYCLES_PER_SCANLINE: u32 = 3420;
pub const ACTIVE_MCLK_CYCLES_PER_SCANLINE: u32 = 2560;

// H40 runs most of the line at mclk/8 and slows down to mclk/10 for the last 15 slots (HSYNC) so
// that 210 slots still add up to 3420 mclk cycles
const H40_SLOW_SLOTS_START_MCLK: u32 = 195 * 16;
const H40_SLOW_SLOTS_START: u16 = 195;

const V_INTERRUPT_LEVEL: u8 = 6;
const H_INTERRUPT_LEVEL: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum VdpPort {
    Data,
    Control,
}

/// Why the VDP currently cannot accept a port write without the bus deferring it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VdpBusyState {
    #[default]
    NotBusy,
    FifoFull,
    MemToVram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VdpTickEffect {
    None,
    FrameComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum DataPortLocation {
    Vram,
    Cram,
    Vsram,
}

/// What the data port is currently pointed at, from the low 4 code bits of the last command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortTarget {
    Read(DataPortLocation),
    Write(DataPortLocation),
    Invalid,
}

impl PortTarget {
    fn from_code(code: u8) -> Self {
        use DataPortLocation::{Cram, Vram, Vsram};

        match code & 0x0F {
            0b0000 => Self::Read(Vram),
            0b1000 => Self::Read(Cram),
            0b0100 => Self::Read(Vsram),
            0b0001 => Self::Write(Vram),
            0b0011 => Self::Write(Cram),
            0b0101 => Self::Write(Vsram),
            _ => Self::Invalid,
        }
    }

    fn location(self) -> DataPortLocation {
        match self {
            Self::Read(location) | Self::Write(location) => location,
            Self::Invalid => DataPortLocation::Vram,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControlWrite {
    Register { number: u8, value: u8 },
    FirstHalf,
    Command,
}

/// Control port command latch. Commands are two words long; register writes are one.
#[derive(Debug, Clone, Default, Encode, Decode)]
struct CommandLatch {
    awaiting_second_half: bool,
    code: u8,
    address: u16,
    // A15-A14 from the last second half, reused by first halves that arrive alone
    high_address_bits: u16,
}

impl CommandLatch {
    fn write(&mut self, value: u16) -> ControlWrite {
        if self.awaiting_second_half {
            self.awaiting_second_half = false;
            self.high_address_bits = value << 14;
            self.address = (self.address & 0x3FFF) | self.high_address_bits;
            self.code = (self.code & 0x03) | ((value >> 2) & 0x3C) as u8;
            return ControlWrite::Command;
        }

        // CD1-CD0 are latched even when the word turns out to be a register write
        self.code = (self.code & 0xFC) | (value >> 14) as u8;
        if value & 0xE000 == 0x8000 {
            let number = ((value >> 8) & 0x1F) as u8;
            return ControlWrite::Register { number, value: value as u8 };
        }

        self.address = self.high_address_bits | (value & 0x3FFF);
        self.awaiting_second_half = true;
        ControlWrite::FirstHalf
    }

    fn target(&self) -> PortTarget {
        PortTarget::from_code(self.code)
    }

    fn is_dma_request(&self) -> bool {
        self.code.bit(5)
    }
}

/// Read side of the main CPU address space as seen by 68k-to-VRAM DMA.
pub trait DmaSource {
    fn read_word(&self, address: u32) -> u16;
}

/// Everything the bus and the scheduler need from a VDP.
pub trait VdpProvider {
    fn read_data_port(&mut self) -> u16;

    /// Status register read.
    fn read_control(&mut self) -> u16;

    fn write_port_word(&mut self, port: VdpPort, value: u16);

    fn v_counter(&self) -> u8;

    fn h_counter(&self) -> u8;

    fn busy_state(&self) -> VdpBusyState;

    /// Advance one access slot.
    fn tick(&mut self, source: &dyn DmaSource) -> VdpTickEffect;

    /// Length of the next slot in master clock cycles.
    fn slot_mclk_cycles(&self) -> u32;

    /// Highest pending and enabled 68k interrupt level, 0 if none.
    fn interrupt_level(&self) -> u8;

    fn acknowledge_interrupt(&mut self);

    /// Whether the co-CPU INT line is asserted.
    fn co_cpu_interrupt(&self) -> bool;

    fn reset(&mut self);
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct VdpMemory {
    vram: Box<[u8; VRAM_LEN]>,
    cram: [u8; CRAM_LEN],
    vsram: [u8; VSRAM_LEN],
}

impl VdpMemory {
    #[must_use]
    pub fn new() -> Self {
        Self { vram: Box::new([0; VRAM_LEN]), cram: [0; CRAM_LEN], vsram: [0; VSRAM_LEN] }
    }

    #[inline]
    #[must_use]
    pub fn read_vram_byte(&self, address: u16) -> u8 {
        self.vram[address as usize]
    }

    #[inline]
    pub fn write_vram_byte(&mut self, address: u16, value: u8) {
        self.vram[address as usize] = value;
    }

    #[must_use]
    pub fn read_word(&self, location: DataPortLocation, address: u16) -> u16 {
        match location {
            DataPortLocation::Vram => {
                // VRAM word accesses ignore A0
                let address = address & !0x01;
                u16::from_be_bytes([self.vram[address as usize], self.vram[(address | 1) as usize]])
            }
            DataPortLocation::Cram => {
                let address = (address & 0x7E) as usize;
                u16::from_be_bytes([self.cram[address], self.cram[address + 1]])
            }
            DataPortLocation::Vsram => {
                let address = (address as usize & 0x7E) % VSRAM_LEN;
                u16::from_be_bytes([self.vsram[address], self.vsram[address + 1]])
            }
        }
    }

    pub fn write_word(&mut self, location: DataPortLocation, address: u16, value: u16) {
        let [msb, lsb] = value.to_be_bytes();
        match location {
            DataPortLocation::Vram => {
                self.vram[address as usize] = msb;
                self.vram[(address ^ 0x01) as usize] = lsb;
            }
            DataPortLocation::Cram => {
                let address = (address & 0x7E) as usize;
                self.cram[address] = msb;
                self.cram[address + 1] = lsb;
            }
            DataPortLocation::Vsram => {
                let address = (address as usize & 0x7E) % VSRAM_LEN;
                self.vsram[address] = msb;
                self.vsram[address + 1] = lsb;
            }
        }
    }
}

impl Default for VdpMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
struct TimingState {
    scanline: u16,
    scanline_mclk: u32,
    h_interrupt_counter: u16,
    v_interrupt_pending: bool,
    h_interrupt_pending: bool,
    latched_hv_counter: Option<u16>,
    frame_count: u64,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Vdp {
    timing_mode: TimingMode,
    registers: Registers,
    memory: VdpMemory,
    engine: DmaFifoEngine,
    command: CommandLatch,
    timing: TimingState,
}

impl Vdp {
    #[must_use]
    pub fn new(timing_mode: TimingMode) -> Self {
        Self {
            timing_mode,
            registers: Registers::new(),
            memory: VdpMemory::new(),
            engine: DmaFifoEngine::new(),
            command: CommandLatch::default(),
            timing: TimingState::default(),
        }
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    #[must_use]
    pub fn memory(&self) -> &VdpMemory {
        &self.memory
    }

    #[must_use]
    pub fn engine(&self) -> &DmaFifoEngine {
        &self.engine
    }

    #[must_use]
    pub fn scanline(&self) -> u16 {
        self.timing.scanline
    }

    #[must_use]
    pub fn data_address(&self) -> u16 {
        self.command.address
    }

    /// External access slots the current line offers DMA and FIFO writes.
    #[must_use]
    pub fn slots_available_this_line(&self) -> u32 {
        dma::slots_available_this_line(self.registers.horizontal_display_size, self.line_type())
    }

    pub fn write_control(&mut self, value: u16) {
        match self.command.write(value) {
            ControlWrite::Register { number, value } => {
                self.registers.write_internal_register(number, value);
                self.sync_hv_latch();
            }
            ControlWrite::FirstHalf => {}
            ControlWrite::Command => {
                log::trace!(
                    "VDP command on line {}: target {:?}, address {:04X}",
                    self.timing.scanline,
                    self.command.target(),
                    self.command.address
                );
                if self.command.is_dma_request() && self.registers.dma_enabled {
                    self.start_dma();
                }
            }
        }
    }

    fn sync_hv_latch(&mut self) {
        self.timing.latched_hv_counter = match self.timing.latched_hv_counter {
            None if self.registers.hv_counter_stopped => Some(self.hv_counter()),
            Some(_) if !self.registers.hv_counter_stopped => None,
            latched => latched,
        };
    }

    fn start_dma(&mut self) {
        let length = self.registers.dma_length();
        let location = self.command.target().location();
        log::trace!("Starting {} DMA of {length} units", self.registers.dma_mode);

        match self.registers.dma_mode {
            DmaMode::MemoryToVram => {
                let source = self.registers.dma_source_address;
                self.engine.start_memory_to_vram(source, length, location);
            }
            DmaMode::VramFill => self.engine.arm_fill(length),
            DmaMode::VramCopy => {
                // Copy treats the source registers as A15-A0 instead of A23-A1
                self.engine.start_copy((self.registers.dma_source_address >> 1) as u16, length);
            }
        }
    }

    pub fn read_data(&mut self) -> u16 {
        self.command.awaiting_second_half = false;

        let PortTarget::Read(location) = self.command.target() else {
            log::debug!("VDP data port read with target {:?}", self.command.target());
            return 0xFFFF;
        };

        // Pending writes land before the read sees memory
        self.engine.flush_fifo(&mut self.memory);

        let word = self.memory.read_word(location, self.command.address);
        self.increment_data_address();
        word
    }

    pub fn write_data(&mut self, value: u16) {
        self.command.awaiting_second_half = false;

        let PortTarget::Write(location) = self.command.target() else {
            log::debug!("VDP data port write with target {:?}", self.command.target());
            return;
        };

        let entry = FifoEntry::new(location, self.command.address, value);
        self.engine.push_write(entry, &mut self.memory);
        self.increment_data_address();

        if self.engine.supply_fill_data(value) {
            log::trace!("VRAM fill started with fill data {value:04X}");
        }
    }

    #[must_use]
    pub fn read_status(&mut self) -> u16 {
        self.command.awaiting_second_half = false;

        let odd_frame = self.registers.interlaced && self.timing.frame_count % 2 == 1;
        let blanked = self.in_vblank() || !self.registers.display_enabled;

        [
            (9, self.engine.fifo_empty()),
            (8, self.engine.fifo_full()),
            (7, self.timing.v_interrupt_pending),
            (4, odd_frame),
            (3, blanked),
            (2, self.in_hblank()),
            (1, self.engine.is_dma_busy()),
            (0, self.timing_mode == TimingMode::Pal),
        ]
        .into_iter()
        .fold(0, |status, (bit, set)| status | (u16::from(set) << bit))
    }

    #[must_use]
    pub fn hv_counter(&self) -> u16 {
        self.timing.latched_hv_counter.unwrap_or_else(|| {
            u16::from_be_bytes([self.compute_v_counter(), self.compute_h_counter()])
        })
    }

    // One H counter step per slot, jumping ahead at the start of HSYNC
    fn compute_h_counter(&self) -> u8 {
        let (last_before_jump, jump_to) = match self.registers.horizontal_display_size {
            HorizontalDisplaySize::ThirtyTwoCell => (0x93, 0xE9),
            HorizontalDisplaySize::FortyCell => (0xB6, 0xE4),
        };

        let slot = self.current_slot() as u8;
        if slot <= last_before_jump { slot } else { slot - (last_before_jump + 1) + jump_to }
    }

    fn compute_v_counter(&self) -> u8 {
        // V counter moves to the next line shortly after the start of HBlank
        let line = if self.in_hblank() {
            (self.timing.scanline + 1) % self.timing_mode.scanlines_per_frame()
        } else {
            self.timing.scanline
        };

        // Last line before the counter jumps back, and the value it jumps back to
        let (last_before_jump, jump_to) =
            match (self.timing_mode, self.registers.vertical_display_size) {
                (TimingMode::Ntsc, _) => (0xEA, 0xE5),
                (TimingMode::Pal, VerticalDisplaySize::TwentyEightCell) => (0x102, 0xCA),
                (TimingMode::Pal, VerticalDisplaySize::ThirtyCell) => (0x10A, 0xD2),
            };

        if line <= last_before_jump {
            line as u8
        } else {
            (line - (last_before_jump + 1) + jump_to) as u8
        }
    }

    fn current_slot(&self) -> u16 {
        let mclk = self.timing.scanline_mclk;
        match self.registers.horizontal_display_size {
            HorizontalDisplaySize::ThirtyTwoCell => (mclk / 20) as u16,
            HorizontalDisplaySize::FortyCell if mclk < H40_SLOW_SLOTS_START_MCLK => {
                (mclk / 16) as u16
            }
            HorizontalDisplaySize::FortyCell => {
                H40_SLOW_SLOTS_START + ((mclk - H40_SLOW_SLOTS_START_MCLK) / 20) as u16
            }
        }
    }

    fn line_type(&self) -> LineType {
        if self.registers.display_enabled && !self.in_vblank() {
            LineType::Active
        } else {
            LineType::Blanked
        }
    }

    fn active_scanlines(&self) -> u16 {
        self.registers.vertical_display_size.active_scanlines()
    }

    // The last line of the frame is already preparing the next frame's first line
    fn in_vblank(&self) -> bool {
        (self.active_scanlines()..self.timing_mode.scanlines_per_frame() - 1)
            .contains(&self.timing.scanline)
    }

    fn in_hblank(&self) -> bool {
        self.timing.scanline_mclk >= ACTIVE_MCLK_CYCLES_PER_SCANLINE
    }

    fn increment_data_address(&mut self) {
        self.command.address =
            self.command.address.wrapping_add(self.registers.data_port_auto_increment);
    }

    fn start_next_scanline(&mut self) -> VdpTickEffect {
        let timing = &mut self.timing;
        timing.scanline = (timing.scanline + 1) % self.timing_mode.scanlines_per_frame();

        let line = timing.scanline;
        let active_scanlines = self.registers.vertical_display_size.active_scanlines();

        // The H interrupt counter only counts down through the active area (plus the first
        // VBlank line) and reloads everywhere else
        if line > active_scanlines {
            timing.h_interrupt_counter = self.registers.h_interrupt_interval;
        } else if let Some(remaining) = timing.h_interrupt_counter.checked_sub(1) {
            timing.h_interrupt_counter = remaining;
        } else {
            timing.h_interrupt_counter = self.registers.h_interrupt_interval;
            timing.h_interrupt_pending = true;
        }

        if line == active_scanlines {
            log::trace!("VBlank start on line {line}");
            timing.v_interrupt_pending = true;
        }

        if line != 0 {
            return VdpTickEffect::None;
        }

        timing.frame_count += 1;
        VdpTickEffect::FrameComplete
    }
}

impl VdpProvider for Vdp {
    fn read_data_port(&mut self) -> u16 {
        self.read_data()
    }

    fn read_control(&mut self) -> u16 {
        self.read_status()
    }

    fn write_port_word(&mut self, port: VdpPort, value: u16) {
        match port {
            VdpPort::Data => self.write_data(value),
            VdpPort::Control => self.write_control(value),
        }
    }

    fn v_counter(&self) -> u8 {
        (self.hv_counter() >> 8) as u8
    }

    fn h_counter(&self) -> u8 {
        self.hv_counter() as u8
    }

    fn busy_state(&self) -> VdpBusyState {
        self.engine.busy_state()
    }

    fn tick(&mut self, source: &dyn DmaSource) -> VdpTickEffect {
        let h_size = self.registers.horizontal_display_size;
        let access_slot = dma::is_access_slot(h_size, self.line_type(), self.current_slot());
        let slot_mclk_cycles = self.slot_mclk_cycles();

        let mut target = DmaTarget {
            memory: &mut self.memory,
            address: &mut self.command.address,
            auto_increment: self.registers.data_port_auto_increment,
        };
        if let Some(completion) = self.engine.tick(access_slot, &mut target, source) {
            self.registers.dma_length = 0;
            if let Some(source_register) = completion.source_register {
                self.registers.dma_source_address = source_register;
            }
        }

        self.timing.scanline_mclk += slot_mclk_cycles;
        if self.timing.scanline_mclk >= MCLK_CYCLES_PER_SCANLINE {
            self.timing.scanline_mclk -= MCLK_CYCLES_PER_SCANLINE;
            return self.start_next_scanline();
        }

        VdpTickEffect::None
    }

    fn slot_mclk_cycles(&self) -> u32 {
        match self.registers.horizontal_display_size {
            HorizontalDisplaySize::ThirtyTwoCell => 20,
            HorizontalDisplaySize::FortyCell => {
                if self.timing.scanline_mclk < H40_SLOW_SLOTS_START_MCLK { 16 } else { 20 }
            }
        }
    }

    fn interrupt_level(&self) -> u8 {
        if self.timing.v_interrupt_pending && self.registers.v_interrupt_enabled {
            V_INTERRUPT_LEVEL
        } else if self.timing.h_interrupt_pending && self.registers.h_interrupt_enabled {
            H_INTERRUPT_LEVEL
        } else {
            0
        }
    }

    fn acknowledge_interrupt(&mut self) {
        let interrupt_level = self.interrupt_level();
        log::trace!("Main CPU interrupt acknowledged; level {interrupt_level}");
        match interrupt_level {
            V_INTERRUPT_LEVEL => self.timing.v_interrupt_pending = false,
            H_INTERRUPT_LEVEL => self.timing.h_interrupt_pending = false,
            _ => {}
        }
    }

    fn co_cpu_interrupt(&self) -> bool {
        // Asserted for the first line of VBlank only
        self.timing.scanline == self.active_scanlines()
    }

    fn reset(&mut self) {
        log::info!("Resetting VDP");
        *self = Self::new(self.timing_mode);
    }
}
