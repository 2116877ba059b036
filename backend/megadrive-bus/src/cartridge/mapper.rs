//! Cartridge address translation
//!
//! Exactly one [`BankMapper`] variant is active per cartridge. Variants are swapped by value when a
//! control register write calls for a different one; the ROM image and the backup memory are owned
//! elsewhere and passed in on every access, so switching never copies or drops data.


use crate::bus::Size;
use crate::cartridge::eeprom::SerialEeprom;
use crate::memory::Rom;
use bincode::{Decode, Encode};
use megadrive_common::num::{GetBit, U16Ext};

pub const SRAM_CONTROL_ADDRESS: u32 = 0xA130F1;
pub const BANK_SELECT_START: u32 = 0xA130F3;
pub const BANK_SELECT_END: u32 = 0xA130FF;

const PAGE_SHIFT: u32 = 19;
const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;
const PAGE_OFFSET_MASK: u32 = PAGE_SIZE - 1;

pub const SRAM_LEN: usize = 64 * 1024;
pub const DEFAULT_EEPROM_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum SramMode {
    #[default]
    Disabled,
    ReadOnly,
    ReadWrite,
}

/// Which 512KB ROM page is visible in each of the eight cartridge windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct PageRegisters {
    pages: [u8; 8],
}

impl PageRegisters {
    #[must_use]
    pub fn new() -> Self {
        Self { pages: [0, 1, 2, 3, 4, 5, 6, 7] }
    }

    pub fn write(&mut self, address: u32, value: u8) {
        let idx = (address >> 1) & 0x07;
        if idx == 0 {
            // First window always maps the first page, it holds the vector table
            return;
        }

        log::debug!("Bank register {idx} set to {value:02X}");
        self.pages[idx as usize] = value;
    }

    #[must_use]
    pub fn map_address(&self, address: u32, rom: &Rom) -> u32 {
        let page_count = rom.len().div_ceil(PAGE_SIZE).max(1);
        let window = (address >> PAGE_SHIFT) & 0x07;
        let page = u32::from(self.pages[window as usize]) % page_count;
        (page << PAGE_SHIFT) | (address & PAGE_OFFSET_MASK)
    }

    fn read(&self, address: u32, size: Size, rom: &Rom) -> u32 {
        match size {
            Size::Byte => rom.read_byte(self.map_address(address, rom)).into(),
            Size::Word => rom.read_word(self.map_address(address, rom)).into(),
            Size::Long => {
                let high = rom.read_word(self.map_address(address, rom));
                let low = rom.read_word(self.map_address(address.wrapping_add(2), rom));
                (u32::from(high) << 16) | u32::from(low)
            }
        }
    }
}

impl Default for PageRegisters {
    fn default() -> Self {
        Self::new()
    }
}

/// Battery-backed storage overlaid on part of the cartridge address space.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub enum BackupMemory {
    #[default]
    None,
    Sram {
        memory: Vec<u8>,
        start: u32,
        end: u32,
        dirty: bool,
    },
    Eeprom {
        chip: SerialEeprom,
        start: u32,
        end: u32,
    },
}

impl BackupMemory {
    #[must_use]
    pub fn sram(start: u32, end: u32, initial: Option<&[u8]>) -> Self {
        let memory = match initial {
            Some(initial) if initial.len() == SRAM_LEN => initial.to_vec(),
            _ => vec![0; SRAM_LEN],
        };
        Self::Sram { memory, start, end, dirty: false }
    }

    #[must_use]
    pub fn eeprom(start: u32, end: u32, initial: Option<&[u8]>) -> Self {
        let chip = SerialEeprom::new(DEFAULT_EEPROM_LEN, initial);
        // The chip sits on one byte lane; accept either half of the word it lives in
        Self::Eeprom { chip, start: start & !1, end: end | 1 }
    }

    #[must_use]
    pub fn contains(&self, address: u32) -> bool {
        match self {
            Self::None => false,
            Self::Sram { start, end, .. } | Self::Eeprom { start, end, .. } => {
                (*start..=*end).contains(&address)
            }
        }
    }

    /// File extension the host should persist this memory under.
    #[must_use]
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Sram { .. } => Some("sram"),
            Self::Eeprom { .. } => Some("eeprom"),
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::None => &[],
            Self::Sram { memory, .. } => memory,
            Self::Eeprom { chip, .. } => chip.memory(),
        }
    }

    #[must_use]
    pub fn get_and_clear_dirty(&mut self) -> bool {
        match self {
            Self::None => false,
            Self::Sram { dirty, .. } => std::mem::take(dirty),
            Self::Eeprom { chip, .. } => chip.get_and_clear_dirty(),
        }
    }

    fn read(&self, address: u32, size: Size) -> u32 {
        match self {
            Self::None => size.all_ones(),
            Self::Sram { memory, .. } => {
                let read_byte = |address: u32| memory[(address & 0xFFFF) as usize];
                match size {
                    Size::Byte => read_byte(address).into(),
                    Size::Word => {
                        u16::from_be_bytes([read_byte(address), read_byte(address + 1)]).into()
                    }
                    Size::Long => u32::from_be_bytes([
                        read_byte(address),
                        read_byte(address + 1),
                        read_byte(address + 2),
                        read_byte(address + 3),
                    ]),
                }
            }
            Self::Eeprom { chip, .. } => {
                if size != Size::Byte {
                    log::debug!("{size:?} read from serial EEPROM at {address:06X}");
                }
                let byte = u8::from(chip.output());
                match size {
                    Size::Byte => byte.into(),
                    Size::Word => u16::from_mirrored_byte(byte).into(),
                    Size::Long => u32::from_be_bytes([byte; 4]),
                }
            }
        }
    }

    fn write(&mut self, address: u32, value: u32, size: Size) {
        match self {
            Self::None => {}
            Self::Sram { memory, dirty, .. } => {
                let bytes = value.to_be_bytes();
                let bytes = match size {
                    Size::Byte => &bytes[3..],
                    Size::Word => &bytes[2..],
                    Size::Long => &bytes[..],
                };
                for (i, &byte) in bytes.iter().enumerate() {
                    memory[((address + i as u32) & 0xFFFF) as usize] = byte;
                }
                *dirty = true;
            }
            Self::Eeprom { chip, .. } => {
                if size != Size::Byte {
                    log::debug!("{size:?} write to serial EEPROM at {address:06X}: {value:X}");
                }
                // Bit 1 drives the clock line and bit 0 the data line
                chip.write_lines(value as u8 & 0x03);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum BankMapper {
    #[default]
    Linear,
    Paged(PageRegisters),
    Backup {
        pages: Option<PageRegisters>,
        mode: SramMode,
    },
}

impl BankMapper {
    /// Initial mapper for a cartridge: header-declared backup memory is mapped from power-on.
    #[must_use]
    pub fn from_backup(backup: &BackupMemory) -> Self {
        match backup {
            BackupMemory::None => Self::Linear,
            BackupMemory::Sram { .. } | BackupMemory::Eeprom { .. } => {
                Self::Backup { pages: None, mode: SramMode::ReadWrite }
            }
        }
    }

    #[must_use]
    pub fn read_data(&self, address: u32, size: Size, rom: &Rom, backup: &BackupMemory) -> u32 {
        match self {
            Self::Linear => rom.read_linear(address, size),
            Self::Paged(pages) => pages.read(address, size, rom),
            Self::Backup { pages, mode } => {
                if *mode != SramMode::Disabled && backup.contains(address) {
                    return backup.read(address, size);
                }

                match pages {
                    Some(pages) => pages.read(address, size, rom),
                    None => rom.read_linear(address, size),
                }
            }
        }
    }

    pub fn write_data(&self, address: u32, value: u32, size: Size, backup: &mut BackupMemory) {
        match self {
            Self::Backup { mode: SramMode::ReadWrite, .. } if backup.contains(address) => {
                backup.write(address, value, size);
            }
            Self::Backup { mode: SramMode::ReadOnly, .. } if backup.contains(address) => {
                log::debug!("Write to write-protected backup memory at {address:06X}");
            }
            _ => {
                log::warn!("Unexpected write to ROM: {address:06X} {value:X} ({size:?})");
            }
        }
    }

    /// Handle a write to the mapper control range, returning the mapper to use from now on.
    #[must_use]
    pub fn write_bank_select(self, address: u32, value: u8) -> Self {
        match address {
            BANK_SELECT_START..=BANK_SELECT_END => {
                let mut mapper = self.with_pages();
                match &mut mapper {
                    Self::Paged(pages) | Self::Backup { pages: Some(pages), .. } => {
                        pages.write(address, value);
                    }
                    Self::Linear | Self::Backup { pages: None, .. } => {}
                }
                mapper
            }
            SRAM_CONTROL_ADDRESS => {
                let mode = match (value.bit(0), value.bit(1)) {
                    (false, _) => SramMode::Disabled,
                    (true, false) => SramMode::ReadWrite,
                    (true, true) => SramMode::ReadOnly,
                };
                log::info!("Backup memory register set to {value:02X}, mode {mode:?}");
                self.with_backup_mode(mode)
            }
            _ => {
                log::warn!("Unexpected mapper register write: {address:06X} {value:02X}");
                self
            }
        }
    }

    /// Switch to (or stay on) the backup overlay in the given mode, keeping any bank registers.
    #[must_use]
    pub fn with_backup_mode(self, mode: SramMode) -> Self {
        match self {
            Self::Linear if mode == SramMode::Disabled => Self::Linear,
            Self::Linear => {
                log::info!("Switching to backup memory mapper, mode {mode:?}");
                Self::Backup { pages: None, mode }
            }
            Self::Paged(pages) if mode == SramMode::Disabled => Self::Paged(pages),
            Self::Paged(pages) => {
                log::info!("Switching to backup memory mapper over banked ROM, mode {mode:?}");
                Self::Backup { pages: Some(pages), mode }
            }
            Self::Backup { pages, .. } => Self::Backup { pages, mode },
        }
    }

    fn with_pages(self) -> Self {
        match self {
            Self::Linear => {
                log::info!("Bank register written, switching to paged mapper");
                Self::Paged(PageRegisters::new())
            }
            Self::Backup { pages: None, mode } => {
                log::info!("Bank register written, paging ROM under backup memory");
                Self::Backup { pages: Some(PageRegisters::new()), mode }
            }
            Self::Paged(_) | Self::Backup { pages: Some(_), .. } => self,
        }
    }

    /// End of session: returns the backup image to persist, if this mapper exposes dirty backup
    /// memory.
    #[must_use]
    pub fn close_session<'a>(
        &self,
        backup: &'a mut BackupMemory,
    ) -> Option<(&'static str, &'a [u8])> {
        match self {
            Self::Linear | Self::Paged(_) => None,
            Self::Backup { .. } => {
                if !backup.get_and_clear_dirty() {
                    return None;
                }
                let extension = backup.extension()?;
                Some((extension, backup.bytes()))
            }
        }
    }
}
