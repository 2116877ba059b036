use bincode::{Decode, Encode};
use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum TimingMode {
    #[default]
    Ntsc,
    Pal,
}

impl TimingMode {
    /// Master clock frequency in Hz.
    #[inline]
    #[must_use]
    pub fn mclk_frequency(self) -> u64 {
        match self {
            Self::Ntsc => 53_693_175,
            Self::Pal => 53_203_424,
        }
    }

    #[inline]
    #[must_use]
    pub fn scanlines_per_frame(self) -> u16 {
        match self {
            Self::Ntsc => 262,
            Self::Pal => 313,
        }
    }

    /// Wall-clock duration of one frame in nanoseconds.
    #[must_use]
    pub fn frame_interval_nanos(self) -> u64 {
        const MCLK_CYCLES_PER_SCANLINE: u64 = 3420;

        let frame_mclk_cycles = MCLK_CYCLES_PER_SCANLINE * u64::from(self.scanlines_per_frame());
        (frame_mclk_cycles as f64 * 1_000_000_000.0 / self.mclk_frequency() as f64).round() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEffect {
    None,
    FrameRendered,
}

pub type TickResult<Err> = Result<TickEffect, Err>;

/// Host-side persistence for battery-backed cartridge memory.
pub trait SaveWriter {
    type Err: Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the bytes cannot be loaded, including if none were ever persisted.
    fn load_bytes(&mut self, extension: &str) -> Result<Vec<u8>, Self::Err>;

    /// # Errors
    ///
    /// Returns an error if the bytes cannot be persisted.
    fn persist_bytes(&mut self, extension: &str, bytes: &[u8]) -> Result<(), Self::Err>;
}
