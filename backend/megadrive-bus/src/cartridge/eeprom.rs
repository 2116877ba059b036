//! Two-wire serial EEPROM, driven one line transition at a time through a mapped cartridge
//! register
//!
//! Bit 1 of each written value is the clock line (SCL) and bit 0 is the data line (SDA). Nothing is
//! buffered across writes; every protocol event is detected by comparing the current line levels
//! against the previous write.


use bincode::{Decode, Encode};
use megadrive_common::num::GetBit;

const ACK_CYCLE: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
pub enum EepromState {
    #[default]
    Standby,
    GetWordAddress,
    Write,
    Read,
    WaitStop,
}

#[derive(Debug, Clone, Encode, Decode)]
pub struct SerialEeprom {
    memory: Vec<u8>,
    size_mask: u32,
    state: EepromState,
    clock_line: bool,
    data_line: bool,
    prev_clock_line: bool,
    prev_data_line: bool,
    cycles: u8,
    address: u32,
    write_buffer: u16,
    read_mode: bool,
    dirty: bool,
}

impl SerialEeprom {
    /// Create a chip with `size` bytes of storage. `size` is rounded up to a power of two.
    #[must_use]
    pub fn new(size: usize, initial_memory: Option<&[u8]>) -> Self {
        let size = size.max(1).next_power_of_two();
        let memory = match initial_memory {
            Some(initial_memory) if initial_memory.len() == size => initial_memory.to_vec(),
            _ => vec![0; size],
        };

        log::info!("Serial EEPROM with {size} bytes");

        Self {
            memory,
            size_mask: (size - 1) as u32,
            state: EepromState::default(),
            clock_line: false,
            data_line: false,
            prev_clock_line: false,
            prev_data_line: false,
            cycles: 0,
            address: 0,
            write_buffer: 0,
            read_mode: false,
            dirty: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> EepromState {
        self.state
    }

    #[must_use]
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    #[must_use]
    pub fn get_and_clear_dirty(&mut self) -> bool {
        let dirty = self.dirty;
        self.dirty = false;
        dirty
    }

    /// Drive both lines from a register write: bit 1 = SCL, bit 0 = SDA.
    pub fn write_lines(&mut self, value: u8) {
        self.clock_line = value.bit(1);
        self.data_line = value.bit(0);

        log::trace!(
            "SCL={} SDA={} state={:?}",
            u8::from(self.clock_line),
            u8::from(self.data_line),
            self.state
        );

        match self.state {
            EepromState::Standby => self.check_start(),
            EepromState::GetWordAddress => self.get_word_address(),
            EepromState::Write => self.write_data(),
            EepromState::Read => self.read_data(),
            EepromState::WaitStop => {
                self.check_start();
                self.check_stop();
            }
        }

        self.prev_clock_line = self.clock_line;
        self.prev_data_line = self.data_line;
    }

    /// Current level of the chip's data output.
    #[must_use]
    pub fn output(&self) -> bool {
        if self.state == EepromState::Read {
            if self.cycles < ACK_CYCLE {
                let byte = self.memory[(self.address & self.size_mask) as usize];
                return byte.bit(8 - self.cycles);
            }
        } else if self.cycles == ACK_CYCLE {
            return false;
        }

        self.data_line
    }

    fn clock_rose(&self) -> bool {
        !self.prev_clock_line && self.clock_line
    }

    fn clock_fell(&self) -> bool {
        self.prev_clock_line && !self.clock_line
    }

    fn clock_held_high(&self) -> bool {
        self.prev_clock_line && self.clock_line
    }

    fn check_start(&mut self) {
        if self.clock_held_high() && self.prev_data_line && !self.data_line {
            log::trace!("START");
            self.state = EepromState::GetWordAddress;
            self.cycles = 0;
            self.address = 0;
        }
    }

    fn check_stop(&mut self) {
        if self.clock_held_high() && !self.prev_data_line && self.data_line {
            log::trace!("STOP");
            self.state = EepromState::Standby;
        }
    }

    fn advance_cycle(&mut self) {
        self.cycles = if self.cycles < ACK_CYCLE { self.cycles + 1 } else { 1 };
    }

    fn get_word_address(&mut self) {
        self.check_start();
        self.check_stop();

        if self.clock_fell() {
            if self.cycles < ACK_CYCLE {
                self.cycles += 1;
            } else {
                self.cycles = 1;
                self.state = if self.read_mode { EepromState::Read } else { EepromState::Write };
                self.write_buffer = 0;
                log::trace!("Word address {:02X}, entering {:?}", self.address, self.state);
            }
        } else if self.clock_rose() {
            if self.cycles < 8 {
                self.address |= u32::from(self.data_line) << (7 - self.cycles);
            } else if self.cycles == 8 {
                self.read_mode = self.data_line;
            }
        }
    }

    fn write_data(&mut self) {
        self.check_start();
        self.check_stop();

        if self.clock_fell() {
            self.advance_cycle();
        } else if self.clock_rose() {
            if self.cycles < ACK_CYCLE {
                self.write_buffer |= u16::from(self.data_line) << (8 - self.cycles);
            } else {
                let address = self.address & self.size_mask;
                self.memory[address as usize] = self.write_buffer as u8;
                self.dirty = true;
                log::trace!("Wrote {:02X} to {address:02X}", self.write_buffer);

                self.address = (self.address + 1) & self.size_mask;
                self.write_buffer = 0;
            }
        }
    }

    fn read_data(&mut self) {
        self.check_start();
        self.check_stop();

        if self.clock_fell() {
            self.advance_cycle();
        } else if self.clock_rose() && self.cycles == ACK_CYCLE {
            if self.data_line {
                // No acknowledge from the host, transfer is over
                self.state = EepromState::WaitStop;
            } else {
                self.address = (self.address + 1) & self.size_mask;
            }
        }
    }
}
