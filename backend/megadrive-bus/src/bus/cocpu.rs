//! Co-CPU memory map and the bus handle the co-CPU executes against

use crate::api::{BusError, BusResult};
use crate::arbiter::CpuKind;
use crate::bus::{Size, SystemBus};
use bincode::{Decode, Encode};
use megadrive_common::num::GetBit;
use megadrive_config::{CO_CPU_WINDOW_END, CO_CPU_WINDOW_START, VDP_START};

// Extra stall for either CPU when the co-CPU reaches through the bank window into main CPU space
const BANK_ACCESS_MAIN_PENALTY: u32 = 11;
const BANK_ACCESS_CO_PENALTY: u32 = 3;

/// 9-bit shift register selecting which 32KB of main CPU space appears at co-CPU `$8000-$FFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub struct CoCpuBankRegister {
    bank: u32,
}

impl CoCpuBankRegister {
    const BITS: u32 = 9;

    #[must_use]
    pub fn bank(self) -> u32 {
        self.bank
    }

    /// Shift one bit in at the top; nine writes load a full bank number, LSB first.
    pub fn write_bit(&mut self, bit: bool) {
        self.bank = (self.bank >> 1) | (u32::from(bit) << (Self::BITS - 1));
    }

    #[must_use]
    pub fn map_to_main_address(self, address: u16) -> u32 {
        (self.bank << 15) | u32::from(address & 0x7FFF)
    }
}

impl SystemBus {
    #[must_use]
    pub fn co_cpu_bank(&self) -> CoCpuBankRegister {
        self.co_cpu_bank
    }

    pub fn co_cpu_bus(&mut self) -> CoCpuBus<'_> {
        CoCpuBus { bus: self, error: None }
    }

    pub(super) fn co_cpu_read(&mut self, address: u16) -> u8 {
        log::trace!("Co-CPU bus read from {address:04X}");

        match address {
            // Audio RAM, mirrored at $2000-$3FFF
            0x0000..=0x3FFF => self.memory.read_audio_ram(address),
            // FM registers, mirrored every 4 addresses
            0x4000..=0x5FFF => self.sound.read_fm((address & 0x03) as u8),
            0x6000..=0x7EFF | 0x7F20..=0x7FFF => 0xFF,
            0x7F00..=0x7F1F => {
                self.read_vdp(VDP_START | u32::from(address & 0x1F), Size::Byte) as u8
            }
            0x8000..=0xFFFF => {
                self.add_bank_access_penalties();

                let main_address = self.co_cpu_bank.map_to_main_address(address);
                if (CO_CPU_WINDOW_START..=CO_CPU_WINDOW_END).contains(&main_address) {
                    log::error!(
                        "Co-CPU read its own memory through the bank window: {address:04X} -> {main_address:06X}"
                    );
                    return 0xFF;
                }

                self.read(main_address, Size::Byte) as u8
            }
        }
    }

    pub(super) fn co_cpu_write(&mut self, address: u16, value: u8) -> BusResult<()> {
        log::trace!("Co-CPU bus write at {address:04X}: {value:02X}");

        match address {
            0x0000..=0x3FFF => self.memory.write_audio_ram(address, value),
            0x4000..=0x5FFF => self.sound.write_fm((address & 0x03) as u8, value),
            0x6000..=0x60FF => {
                self.co_cpu_bank.write_bit(value.bit(0));
                log::trace!("Co-CPU bank register now {:03X}", self.co_cpu_bank.bank());
            }
            0x6100..=0x7EFF | 0x7F20..=0x7FFF => {
                log::debug!("Co-CPU write to unused address {address:04X}: {value:02X}");
            }
            0x7F00..=0x7F1F => {
                let vdp_address = VDP_START | u32::from(address & 0x1F);
                return self.write_vdp(vdp_address, value.into(), Size::Byte);
            }
            0x8000..=0xFFFF => {
                self.add_bank_access_penalties();

                let main_address = self.co_cpu_bank.map_to_main_address(address);
                if (CO_CPU_WINDOW_START..=CO_CPU_WINDOW_END).contains(&main_address) {
                    log::error!(
                        "Co-CPU wrote its own memory through the bank window: {address:04X} -> {main_address:06X}"
                    );
                    return Ok(());
                }

                return self.write(main_address, value.into(), Size::Byte);
            }
        }

        Ok(())
    }

    fn add_bank_access_penalties(&mut self) {
        self.arbiter.add_cycle_penalty(CpuKind::Main, BANK_ACCESS_MAIN_PENALTY);
        self.arbiter.add_cycle_penalty(CpuKind::Co, BANK_ACCESS_CO_PENALTY);
    }
}

/// The co-CPU's view of the system for the duration of one instruction.
///
/// Errors from writes that reach the main CPU address space are held until [`CoCpuBus::finish`],
/// since the co-CPU's memory interface has no way to fail.
pub struct CoCpuBus<'a> {
    bus: &'a mut SystemBus,
    error: Option<BusError>,
}

impl CoCpuBus<'_> {
    pub fn read_memory(&mut self, address: u16) -> u8 {
        self.bus.co_cpu_read(address)
    }

    pub fn write_memory(&mut self, address: u16, value: u8) {
        if let Err(err) = self.bus.co_cpu_write(address, value) {
            log::error!("Co-CPU write to {address:04X} failed: {err}");
            self.error.get_or_insert(err);
        }
    }

    /// The co-CPU's IO ports are not wired to anything.
    pub fn read_io(&mut self, _address: u16) -> u8 {
        0xFF
    }

    pub fn write_io(&mut self, _address: u16, _value: u8) {}

    #[must_use]
    pub fn interrupt_line(&self) -> bool {
        self.bus.co_cpu_interrupt()
    }

    /// # Errors
    ///
    /// Returns the first error raised by a write during this instruction.
    pub fn finish(self) -> BusResult<()> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
