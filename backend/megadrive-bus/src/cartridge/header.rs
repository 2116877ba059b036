//! ROM header parsing: memory layout, backup memory flags, region and title

use crate::api::{BusError, BusResult};
use bincode::{Decode, Encode};
use crc::Crc;
use megadrive_common::num::GetBit;
use megadrive_config::{
    BusConfig, DEFAULT_RAM_END, DEFAULT_RAM_START, DEFAULT_SRAM_END, DEFAULT_SRAM_START,
    HostOverrides, MegaDriveRegion,
};
use regex::Regex;
use std::sync::LazyLock;

const CRC: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

pub const HEADER_END: usize = 0x200;

const CHECKSUM_ADDRESS: usize = 0x18E;
const ROM_START_ADDRESS: usize = 0x1A0;
const ROM_END_ADDRESS: usize = 0x1A4;
const RAM_START_ADDRESS: usize = 0x1A8;
const RAM_END_ADDRESS: usize = 0x1AC;
const SRAM_FLAG_ADDRESS: usize = 0x1B0;
const SRAM_START_ADDRESS: usize = 0x1B4;
const SRAM_END_ADDRESS: usize = 0x1B8;
const REGION_ADDRESS: usize = 0x1F0;
const DOMESTIC_TITLE_ADDRESS: usize = 0x120;
const OVERSEAS_TITLE_ADDRESS: usize = 0x150;

const MAX_MAIN_RAM_LEN: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum BackupKind {
    Sram,
    Eeprom,
}

impl BackupKind {
    /// File extension the host persists this kind of backup memory under.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Sram => "sram",
            Self::Eeprom => "eeprom",
        }
    }
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct CartridgeHeader {
    pub rom_start: u32,
    pub rom_end: u32,
    pub ram_start: u32,
    pub ram_end: u32,
    pub backup: Option<BackupKind>,
    pub sram_start: u32,
    pub sram_end: u32,
    pub checksum: u16,
    pub computed_checksum: u16,
    pub crc32: u32,
    pub region: Option<MegaDriveRegion>,
    pub domestic_title: String,
    pub overseas_title: String,
}

fn read_u32(rom: &[u8], address: usize) -> u32 {
    u32::from_be_bytes([rom[address], rom[address + 1], rom[address + 2], rom[address + 3]])
}

impl CartridgeHeader {
    /// Parse the header of a ROM image, correcting any layout values that homebrew headers commonly
    /// get wrong.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is too small to contain a header.
    pub fn parse(rom: &[u8]) -> BusResult<Self> {
        if rom.len() < HEADER_END {
            return Err(BusError::RomTooSmall { len: rom.len() });
        }

        let crc32 = CRC.checksum(rom);
        log::info!("ROM CRC32: {crc32:08X}");

        let mut header = Self {
            rom_start: read_u32(rom, ROM_START_ADDRESS),
            rom_end: read_u32(rom, ROM_END_ADDRESS),
            ram_start: read_u32(rom, RAM_START_ADDRESS),
            ram_end: read_u32(rom, RAM_END_ADDRESS),
            backup: None,
            sram_start: DEFAULT_SRAM_START,
            sram_end: DEFAULT_SRAM_END,
            checksum: u16::from_be_bytes([rom[CHECKSUM_ADDRESS], rom[CHECKSUM_ADDRESS + 1]]),
            computed_checksum: compute_checksum(rom),
            crc32,
            region: parse_region(rom),
            domestic_title: parse_title(rom, DOMESTIC_TITLE_ADDRESS),
            overseas_title: parse_title(rom, OVERSEAS_TITLE_ADDRESS),
        };

        header.detect_backup_memory(rom);
        header.fix_layout(rom.len() as u32);

        if header.checksum != header.computed_checksum {
            log::warn!(
                "ROM header checksum {:04X} does not match computed checksum {:04X}",
                header.checksum,
                header.computed_checksum
            );
        }

        log::info!(
            "Cartridge title: '{}'",
            header.title(header.region.unwrap_or_default())
        );
        log::info!(
            "ROM {:06X}-{:06X}, RAM {:06X}-{:06X}, backup memory {:?} at {:06X}-{:06X}",
            header.rom_start,
            header.rom_end,
            header.ram_start,
            header.ram_end,
            header.backup,
            header.sram_start,
            header.sram_end
        );

        Ok(header)
    }

    fn detect_backup_memory(&mut self, rom: &[u8]) {
        if &rom[SRAM_FLAG_ADDRESS..SRAM_FLAG_ADDRESS + 2] != b"RA" {
            return;
        }

        let flags = rom[SRAM_FLAG_ADDRESS + 2];
        let kind = rom[SRAM_FLAG_ADDRESS + 3];
        let is_backup = flags.bit(7);
        let is_sram = kind & 0x20 != 0;

        if !is_backup {
            if is_sram {
                log::warn!("Header declares volatile SRAM, not mapping it");
            }
            return;
        }

        self.backup = Some(if is_sram { BackupKind::Sram } else { BackupKind::Eeprom });

        let sram_start = read_u32(rom, SRAM_START_ADDRESS);
        let sram_end = read_u32(rom, SRAM_END_ADDRESS);
        if sram_end < sram_start {
            log::error!("Invalid SRAM range {sram_start:06X}-{sram_end:06X}, using defaults");
        } else {
            self.sram_start = sram_start;
            self.sram_end = sram_end;
        }
    }

    fn fix_layout(&mut self, rom_len: u32) {
        if self.rom_start > self.rom_end || self.rom_start != 0 {
            log::warn!("Invalid ROM start address {:06X}", self.rom_start);
            self.rom_start = 0;
        }

        let rom_end_from_file = rom_len - 1;
        if self.rom_end != rom_end_from_file {
            log::warn!(
                "ROM end address {:06X} does not match image size, using {rom_end_from_file:06X}",
                self.rom_end
            );
            self.rom_end = rom_end_from_file;
        }

        if self.ram_start == 0 {
            self.ram_start = DEFAULT_RAM_START;
        }
        if self.ram_end == 0 {
            self.ram_end = DEFAULT_RAM_END;
        }
        if self.ram_end.abs_diff(self.ram_start) > MAX_MAIN_RAM_LEN {
            log::warn!("Invalid RAM range {:06X}-{:06X}", self.ram_start, self.ram_end);
            self.ram_start = DEFAULT_RAM_START;
            self.ram_end = DEFAULT_RAM_END;
        }
    }

    /// Session configuration from the header, with host overrides applied.
    #[must_use]
    pub fn bus_config(&self, overrides: HostOverrides) -> BusConfig {
        let region = overrides.forced_region.or(self.region).unwrap_or_else(|| {
            log::warn!("Unable to determine cartridge region from ROM header; using Americas");
            MegaDriveRegion::Americas
        });

        let mut config = BusConfig::new(region);
        if let Some(timing_mode) = overrides.forced_timing_mode {
            config.timing_mode = timing_mode;
        }
        config.tmss_enabled = overrides.tmss_enabled;
        config.rom_end = self.rom_end;
        config.sram_start = self.sram_start;
        config.sram_end = self.sram_end;

        log::info!("Region {region}, timing mode {:?}", config.timing_mode);
        config
    }

    #[must_use]
    pub fn title(&self, region: MegaDriveRegion) -> &str {
        match region {
            MegaDriveRegion::Japan => &self.domestic_title,
            MegaDriveRegion::Americas | MegaDriveRegion::Europe => &self.overseas_title,
        }
    }
}

/// Big-endian word sum of everything after the header.
fn compute_checksum(rom: &[u8]) -> u16 {
    rom[HEADER_END..].chunks(2).fold(0_u16, |sum, chunk| {
        let word = u16::from_be_bytes([chunk[0], chunk.get(1).copied().unwrap_or(0)]);
        sum.wrapping_add(word)
    })
}

fn parse_region(rom: &[u8]) -> Option<MegaDriveRegion> {
    let region_bytes = &rom[REGION_ADDRESS..REGION_ADDRESS + 3];

    if &rom[REGION_ADDRESS..REGION_ADDRESS + 6] == b"EUROPE" {
        return Some(MegaDriveRegion::Europe);
    }

    // Prefer Americas, then Japan, then Europe when several are listed
    if region_bytes.contains(&b'U') {
        return Some(MegaDriveRegion::Americas);
    }
    if region_bytes.contains(&b'J') {
        return Some(MegaDriveRegion::Japan);
    }
    if region_bytes.contains(&b'E') {
        return Some(MegaDriveRegion::Europe);
    }

    // Newer headers use a single hex digit bitmask
    let value = (region_bytes[0] as char).to_digit(16)?;
    if value.bit(2) {
        Some(MegaDriveRegion::Americas)
    } else if value.bit(0) {
        Some(MegaDriveRegion::Japan)
    } else if value.bit(3) {
        Some(MegaDriveRegion::Europe)
    } else {
        None
    }
}

#[allow(clippy::items_after_statements)]
fn parse_title(rom: &[u8], address: usize) -> String {
    let title: String = rom[address..address + 48].iter().map(|&b| b as char).collect();

    static RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r" +").ok());
    match RE.as_ref() {
        Some(re) => re.replace_all(title.trim(), " ").into(),
        None => title.trim().into(),
    }
}
