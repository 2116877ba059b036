//! VDP internal register file, decoded into the fields the bus-side model needs
//!
//! Rendering registers (plane addresses, scroll modes, colors) are stored raw and never decoded.

use bincode::{Decode, Encode};
use megadrive_common::num::{GetBit, U16Ext};
use std::fmt::{Display, Formatter};

pub const REGISTER_COUNT: usize = 24;

const MODE_1: u8 = 0;
const MODE_2: u8 = 1;
const H_INTERRUPT_INTERVAL: u8 = 10;
const MODE_4: u8 = 12;
const AUTO_INCREMENT: u8 = 15;
const DMA_LENGTH_LOW: u8 = 19;
const DMA_LENGTH_HIGH: u8 = 20;
const DMA_SOURCE_LOW: u8 = 21;
const DMA_SOURCE_MID: u8 = 22;
const DMA_SOURCE_HIGH: u8 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum HorizontalDisplaySize {
    #[default]
    ThirtyTwoCell,
    FortyCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum VerticalDisplaySize {
    #[default]
    TwentyEightCell,
    ThirtyCell,
}

impl VerticalDisplaySize {
    #[must_use]
    pub fn active_scanlines(self) -> u16 {
        match self {
            Self::TwentyEightCell => 224,
            Self::ThirtyCell => 240,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum DmaMode {
    #[default]
    MemoryToVram,
    VramFill,
    VramCopy,
}

impl Display for DmaMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MemoryToVram => "68k to VRAM",
            Self::VramFill => "VRAM fill",
            Self::VramCopy => "VRAM copy",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Registers {
    raw: [u8; REGISTER_COUNT],
    pub h_interrupt_enabled: bool,
    pub hv_counter_stopped: bool,
    pub display_enabled: bool,
    pub v_interrupt_enabled: bool,
    pub dma_enabled: bool,
    pub vertical_display_size: VerticalDisplaySize,
    pub h_interrupt_interval: u16,
    pub horizontal_display_size: HorizontalDisplaySize,
    pub interlaced: bool,
    pub data_port_auto_increment: u16,
    /// Raw length counter; see [`Registers::dma_length`] for the effective length.
    pub dma_length: u16,
    /// Byte address, A23-A1. The VDP advances it as a 68k transfer progresses.
    pub dma_source_address: u32,
    pub dma_mode: DmaMode,
}

impl Registers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn raw(&self, register: usize) -> u8 {
        self.raw.get(register).copied().unwrap_or(0)
    }

    pub fn write_internal_register(&mut self, register: u8, value: u8) {
        let Some(raw) = self.raw.get_mut(register as usize) else {
            log::debug!("Write to nonexistent VDP register {register}: {value:02X}");
            return;
        };
        *raw = value;

        match register {
            MODE_1 => {
                self.h_interrupt_enabled = value.bit(4);
                self.hv_counter_stopped = value.bit(1);
            }
            MODE_2 => {
                self.display_enabled = value.bit(6);
                self.v_interrupt_enabled = value.bit(5);
                self.dma_enabled = value.bit(4);
                self.vertical_display_size = if value.bit(3) {
                    VerticalDisplaySize::ThirtyCell
                } else {
                    VerticalDisplaySize::TwentyEightCell
                };
            }
            H_INTERRUPT_INTERVAL => self.h_interrupt_interval = value.into(),
            MODE_4 => {
                // Either RS bit selects H40
                self.horizontal_display_size = if value & 0x81 != 0 {
                    HorizontalDisplaySize::FortyCell
                } else {
                    HorizontalDisplaySize::ThirtyTwoCell
                };
                self.interlaced = value.bit(1);
            }
            AUTO_INCREMENT => self.data_port_auto_increment = value.into(),
            DMA_LENGTH_LOW => self.dma_length.set_lsb(value),
            DMA_LENGTH_HIGH => self.dma_length.set_msb(value),
            DMA_SOURCE_LOW | DMA_SOURCE_MID | DMA_SOURCE_HIGH => {
                self.decode_dma_source(register, value);
            }
            _ => {}
        }

        log::trace!("VDP register {register} = {value:02X}");
    }

    // Each source register holds 8 address bits starting at A1; the top register also selects
    // the mode
    fn decode_dma_source(&mut self, register: u8, value: u8) {
        let shift = 1 + 8 * u32::from(register - DMA_SOURCE_LOW);
        let (bits, width) = if register == DMA_SOURCE_HIGH {
            self.dma_mode = match value >> 6 {
                0 | 1 => DmaMode::MemoryToVram,
                2 => DmaMode::VramFill,
                _ => DmaMode::VramCopy,
            };
            // DMD0 doubles as A23 in 68k transfers, so keep 7 bits for those
            if self.dma_mode == DmaMode::MemoryToVram {
                (value & 0x7F, 7)
            } else {
                (value & 0x3F, 6)
            }
        } else {
            (value, 8)
        };

        let mask = ((1_u32 << width) - 1) << shift;
        let high_mask = if register == DMA_SOURCE_HIGH { !0 << shift } else { mask };
        self.dma_source_address =
            (self.dma_source_address & !high_mask) | ((u32::from(bits) << shift) & mask);

        log::trace!("DMA source address {:06X}, mode {}", self.dma_source_address, self.dma_mode);
    }

    /// DMA length in transfer units; a length of 0 means 0x10000.
    #[must_use]
    pub fn dma_length(&self) -> u32 {
        if self.dma_length == 0 { 0x10000 } else { self.dma_length.into() }
    }
}
