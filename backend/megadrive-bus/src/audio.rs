//! FM / PSG sound provider interface

use megadrive_common::frontend::TimingMode;

// FM chip is clocked at mclk/7/6
const FM_MCLK_DIVIDER: f64 = 42.0;

/// Wall-clock microseconds covered by one FM tick.
#[must_use]
pub fn fm_micros_per_tick(timing_mode: TimingMode) -> f64 {
    1_000_000.0 * FM_MCLK_DIVIDER / timing_mode.mclk_frequency() as f64
}

pub trait SoundProvider {
    /// FM status read; `port` is the address within the 4-port FM window.
    fn read_fm(&mut self, port: u8) -> u8;

    fn write_fm(&mut self, port: u8, value: u8);

    fn write_psg(&mut self, value: u8);

    /// Co-CPU reset also resets the FM chip.
    fn reset_fm(&mut self);

    fn tick(&mut self, micros_per_tick: f64);
}

/// Sound provider that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSound;

impl SoundProvider for NullSound {
    fn read_fm(&mut self, _port: u8) -> u8 {
        0
    }

    fn write_fm(&mut self, _port: u8, _value: u8) {}

    fn write_psg(&mut self, _value: u8) {}

    fn reset_fm(&mut self) {}

    fn tick(&mut self, _micros_per_tick: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn micros_per_tick() {
        let ntsc = fm_micros_per_tick(TimingMode::Ntsc);
        assert!((ntsc - 0.782_222).abs() < 1e-5, "{ntsc}");

        let pal = fm_micros_per_tick(TimingMode::Pal);
        assert!((pal - 0.789_423).abs() < 1e-5, "{pal}");
    }
}
