//! Flat ROM and RAM storage shared by the bus, the cartridge mapper and VDP DMA

use crate::bus::Size;
use bincode::{Decode, Encode};

pub const MAIN_RAM_LEN: usize = 64 * 1024;
pub const AUDIO_RAM_LEN: usize = 8 * 1024;

const MAIN_RAM_MASK: u32 = (MAIN_RAM_LEN - 1) as u32;
const AUDIO_RAM_MASK: u16 = (AUDIO_RAM_LEN - 1) as u16;

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Rom(Vec<u8>);

impl Rom {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> u32 {
        self.0.len() as u32
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    fn get(&self, i: u32) -> Option<u8> {
        self.0.get(i as usize).copied()
    }

    /// Fold an out-of-range address back into the image. Images whose size is not a power of two
    /// first wrap at the next power of two, then fold whatever is still past the end.
    #[must_use]
    pub fn wrap_address(&self, address: u32) -> u32 {
        let Some(last) = self.len().checked_sub(1) else { return address };
        if address <= last {
            return address;
        }

        let mask = self.len().next_power_of_two() - 1;
        let address = address & mask;
        if address > last { address - last } else { address }
    }

    /// Read with linear mapping, wrapping addresses past the end of the image.
    #[must_use]
    pub fn read_linear(&self, address: u32, size: Size) -> u32 {
        match size {
            Size::Byte => self.read_byte(address).into(),
            Size::Word => self.read_word(address).into(),
            Size::Long => {
                (u32::from(self.read_word(address)) << 16)
                    | u32::from(self.read_word(address.wrapping_add(2)))
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn read_byte(&self, address: u32) -> u8 {
        self.get(self.wrap_address(address)).unwrap_or(0xFF)
    }

    #[inline]
    #[must_use]
    pub fn read_word(&self, address: u32) -> u16 {
        u16::from_be_bytes([self.read_byte(address), self.read_byte(address.wrapping_add(1))])
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct Memory {
    rom: Rom,
    main_ram: Box<[u8; MAIN_RAM_LEN]>,
    audio_ram: Box<[u8; AUDIO_RAM_LEN]>,
}

impl Memory {
    #[must_use]
    pub fn new(rom: Rom) -> Self {
        Self { rom, main_ram: Box::new([0; MAIN_RAM_LEN]), audio_ram: Box::new([0; AUDIO_RAM_LEN]) }
    }

    #[inline]
    #[must_use]
    pub fn rom(&self) -> &Rom {
        &self.rom
    }

    #[inline]
    #[must_use]
    pub fn read_ram_byte(&self, address: u32) -> u8 {
        self.main_ram[(address & MAIN_RAM_MASK) as usize]
    }

    #[inline]
    #[must_use]
    pub fn read_ram_word(&self, address: u32) -> u16 {
        let msb = self.read_ram_byte(address);
        let lsb = self.read_ram_byte(address.wrapping_add(1));
        u16::from_be_bytes([msb, lsb])
    }

    #[inline]
    pub fn write_ram_byte(&mut self, address: u32, value: u8) {
        self.main_ram[(address & MAIN_RAM_MASK) as usize] = value;
    }

    #[inline]
    pub fn write_ram_word(&mut self, address: u32, value: u16) {
        let [msb, lsb] = value.to_be_bytes();
        self.write_ram_byte(address, msb);
        self.write_ram_byte(address.wrapping_add(1), lsb);
    }

    #[must_use]
    pub fn read_ram(&self, address: u32, size: Size) -> u32 {
        match size {
            Size::Byte => self.read_ram_byte(address).into(),
            Size::Word => self.read_ram_word(address).into(),
            Size::Long => {
                (u32::from(self.read_ram_word(address)) << 16)
                    | u32::from(self.read_ram_word(address.wrapping_add(2)))
            }
        }
    }

    pub fn write_ram(&mut self, address: u32, value: u32, size: Size) {
        match size {
            Size::Byte => self.write_ram_byte(address, value as u8),
            Size::Word => self.write_ram_word(address, value as u16),
            Size::Long => {
                self.write_ram_word(address, (value >> 16) as u16);
                self.write_ram_word(address.wrapping_add(2), value as u16);
            }
        }
    }

    /// Audio RAM is 8KB and mirrored across the co-CPU's first 16KB.
    #[inline]
    #[must_use]
    pub fn read_audio_ram(&self, address: u16) -> u8 {
        self.audio_ram[(address & AUDIO_RAM_MASK) as usize]
    }

    #[inline]
    pub fn write_audio_ram(&mut self, address: u16, value: u8) {
        self.audio_ram[(address & AUDIO_RAM_MASK) as usize] = value;
    }
}
