use bincode::{Decode, Encode};
use megadrive_common::frontend::TimingMode;
use std::fmt::{Display, Formatter};

pub const DEFAULT_ROM_END: u32 = 0x3FFFFF;
pub const RAM_WINDOW_START: u32 = 0xE00000;
pub const RAM_WINDOW_END: u32 = 0xFFFFFF;
pub const CO_CPU_WINDOW_START: u32 = 0xA00000;
pub const CO_CPU_WINDOW_END: u32 = 0xA0FFFF;
pub const IO_START: u32 = 0xA10000;
pub const IO_END: u32 = 0xA1001F;
pub const INTERNAL_REGISTERS_START: u32 = 0xA11000;
pub const INTERNAL_REGISTERS_END: u32 = 0xA130FF;
pub const VDP_START: u32 = 0xC00000;

pub const DEFAULT_SRAM_START: u32 = 0x200000;
pub const DEFAULT_SRAM_END: u32 = 0x20FFFF;
pub const DEFAULT_RAM_START: u32 = 0xFF0000;
pub const DEFAULT_RAM_END: u32 = 0xFFFFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum MegaDriveRegion {
    #[default]
    Americas,
    Japan,
    Europe,
}

impl MegaDriveRegion {
    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Americas => "US",
            Self::Europe => "EU",
            Self::Japan => "JP",
        }
    }

    /// Overseas bit of the version register; only Japanese consoles report a domestic model.
    #[must_use]
    pub fn is_overseas(self) -> bool {
        self != Self::Japan
    }

    #[must_use]
    pub fn default_timing_mode(self) -> TimingMode {
        match self {
            Self::Europe => TimingMode::Pal,
            Self::Americas | Self::Japan => TimingMode::Ntsc,
        }
    }
}

impl Display for MegaDriveRegion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// Per-session bus configuration, built once from the cartridge header and host overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusConfig {
    pub region: MegaDriveRegion,
    pub timing_mode: TimingMode,
    pub tmss_enabled: bool,
    pub rom_end: u32,
    pub sram_start: u32,
    pub sram_end: u32,
}

impl BusConfig {
    #[must_use]
    pub fn new(region: MegaDriveRegion) -> Self {
        Self {
            region,
            timing_mode: region.default_timing_mode(),
            tmss_enabled: false,
            rom_end: DEFAULT_ROM_END,
            sram_start: DEFAULT_SRAM_START,
            sram_end: DEFAULT_SRAM_END,
        }
    }

    /// Version register value (`$A10001`), before the expansion and TMSS bits are applied.
    #[must_use]
    pub fn version_byte(&self) -> u8 {
        (u8::from(self.region.is_overseas()) << 7)
            | (u8::from(self.timing_mode == TimingMode::Pal) << 6)
            | 0x20
            | u8::from(self.tmss_enabled)
    }

    /// Whether the address falls in the cartridge's backup memory window.
    #[must_use]
    pub fn sram_contains(&self, address: u32) -> bool {
        (self.sram_start..=self.sram_end).contains(&address)
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new(MegaDriveRegion::default())
    }
}

/// Host-side options that override what the cartridge header reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct HostOverrides {
    /// Force a console region instead of reading it from the ROM header
    #[cfg_attr(feature = "clap", arg(long))]
    pub forced_region: Option<MegaDriveRegion>,
    /// Force a timing mode instead of deriving it from the region
    #[cfg_attr(feature = "clap", arg(long))]
    pub forced_timing_mode: Option<TimingMode>,
    /// Report a TMSS-equipped console revision in the version register
    #[cfg_attr(feature = "clap", arg(long))]
    pub tmss_enabled: bool,
}
