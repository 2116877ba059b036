//! Cartridge state: parsed header, active bank mapper and backup memory

pub mod eeprom;
pub mod header;
pub mod mapper;

#[cfg(test)]
mod tests;

use crate::bus::Size;
use crate::cartridge::header::{BackupKind, CartridgeHeader};
use crate::cartridge::mapper::{BackupMemory, BankMapper, SramMode};
use crate::memory::Rom;
use bincode::{Decode, Encode};
use megadrive_common::frontend::SaveWriter;
use megadrive_config::{BusConfig, DEFAULT_SRAM_START};

#[derive(Debug, Clone, Encode, Decode)]
pub struct Cartridge {
    header: CartridgeHeader,
    config: BusConfig,
    mapper: BankMapper,
    backup: BackupMemory,
}

impl Cartridge {
    /// Build the cartridge from a parsed header and the session configuration derived from it.
    /// `initial_backup` restores persisted SRAM or EEPROM contents and is ignored if its size
    /// doesn't match.
    #[must_use]
    pub fn new(header: CartridgeHeader, config: BusConfig, initial_backup: Option<&[u8]>) -> Self {
        let backup = match header.backup {
            None => BackupMemory::None,
            Some(BackupKind::Sram) => {
                BackupMemory::sram(config.sram_start, config.sram_end, initial_backup)
            }
            Some(BackupKind::Eeprom) => {
                BackupMemory::eeprom(config.sram_start, config.sram_end, initial_backup)
            }
        };
        let mapper = BankMapper::from_backup(&backup);
        log::info!("Initial cartridge mapper: {mapper:?}");

        Self { header, config, mapper, backup }
    }

    #[must_use]
    pub fn mapper(&self) -> &BankMapper {
        &self.mapper
    }

    /// Read from cartridge space (`$000000-$3FFFFF`).
    pub fn read(&mut self, address: u32, size: Size, rom: &Rom) -> u32 {
        if self.is_sram_used_with_broken_header(address) {
            self.enable_broken_header_sram();
        }

        self.mapper.read_data(address, size, rom, &self.backup)
    }

    /// Word read on behalf of VDP DMA. Goes through the active mapper but never enables SRAM
    /// detection for broken headers.
    #[must_use]
    pub fn read_for_dma(&self, address: u32, rom: &Rom) -> u16 {
        self.mapper.read_data(address, Size::Word, rom, &self.backup) as u16
    }

    /// Write to cartridge space; only backup memory is writable.
    pub fn write(&mut self, address: u32, value: u32, size: Size) {
        if self.is_sram_used_with_broken_header(address) {
            log::info!("Unexpected SRAM write: {address:06X} {value:X}");
            self.enable_broken_header_sram();
        }

        self.mapper.write_data(address, value, size, &mut self.backup);
    }

    /// Mapper control register write (`$A130F1-$A130FF`).
    pub fn write_bank_select(&mut self, address: u32, value: u8) {
        self.mapper = self.mapper.write_bank_select(address, value);

        if matches!(self.mapper, BankMapper::Backup { .. })
            && matches!(self.backup, BackupMemory::None)
        {
            log::info!("Backup memory enabled without a header declaration, mapping default SRAM");
            self.backup = BackupMemory::sram(self.config.sram_start, self.config.sram_end, None);
        }
    }

    // No backup memory declared, but the address falls in the SRAM window past the end of the ROM
    // image; some games rely on SRAM there anyway
    fn is_sram_used_with_broken_header(&self, address: u32) -> bool {
        self.header.backup.is_none()
            && self.config.rom_end < DEFAULT_SRAM_START
            && self.config.sram_contains(address)
    }

    fn enable_broken_header_sram(&mut self) {
        if matches!(self.backup, BackupMemory::None) {
            self.backup = BackupMemory::sram(self.config.sram_start, self.config.sram_end, None);
        }
        if !matches!(self.mapper, BankMapper::Backup { mode: SramMode::ReadWrite, .. }) {
            self.mapper = self.mapper.with_backup_mode(SramMode::ReadWrite);
        }
    }

    /// Mapper back to its power-on variant; backup memory contents survive.
    pub fn reset(&mut self) {
        self.mapper = BankMapper::from_backup(&self.backup);
    }

    /// Flush dirty backup memory to the host.
    ///
    /// # Errors
    ///
    /// Propagates any error from the save writer.
    pub fn close_session<S: SaveWriter>(&mut self, save_writer: &mut S) -> Result<(), S::Err> {
        if let Some((extension, bytes)) = self.mapper.close_session(&mut self.backup) {
            log::info!("Persisting {} bytes of backup memory as .{extension}", bytes.len());
            save_writer.persist_bytes(extension, bytes)?;
        }

        Ok(())
    }
}
