//! IO port window, `$A10000-$A1001F`

use crate::bus::{Size, SystemBus};
use crate::input::JoypadPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IoRegister {
    Version,
    Data(JoypadPort),
    Control(JoypadPort),
    TxData(JoypadPort),
    Serial,
}

impl IoRegister {
    fn from_address(address: u32) -> Self {
        if address & 0xFFF <= 1 {
            return Self::Version;
        }

        match address & 0x1E {
            0x02 => Self::Data(JoypadPort::One),
            0x04 => Self::Data(JoypadPort::Two),
            0x06 => Self::Data(JoypadPort::Expansion),
            0x08 => Self::Control(JoypadPort::One),
            0x0A => Self::Control(JoypadPort::Two),
            0x0C => Self::Control(JoypadPort::Expansion),
            0x0E => Self::TxData(JoypadPort::One),
            0x14 => Self::TxData(JoypadPort::Two),
            0x1A => Self::TxData(JoypadPort::Expansion),
            // RxData and serial control for each port
            _ => Self::Serial,
        }
    }
}

impl SystemBus {
    pub(super) fn read_io(&mut self, address: u32, size: Size) -> u32 {
        match size {
            Size::Byte => self.read_io_register(address).into(),
            // IO registers are on the low byte lane; word reads see the same byte on both halves
            Size::Word => {
                let byte: u32 = self.read_io_register(address).into();
                (byte << 8) | byte
            }
            Size::Long => {
                let high = self.read_io(address, Size::Word);
                let low = self.read_io(address.wrapping_add(2), Size::Word);
                (high << 16) | low
            }
        }
    }

    fn read_io_register(&mut self, address: u32) -> u8 {
        match IoRegister::from_address(address) {
            IoRegister::Version => self.config.version_byte(),
            IoRegister::Data(port) => self.joypad.read_data(port),
            IoRegister::Control(port) => self.joypad.read_control(port),
            IoRegister::TxData(_) => 0xFF,
            IoRegister::Serial => {
                log::debug!("Serial IO register read: {address:06X}");
                0x00
            }
        }
    }

    pub(super) fn write_io(&mut self, address: u32, value: u32, size: Size) {
        if size == Size::Long {
            self.write_io(address, value >> 16, Size::Word);
            self.write_io(address.wrapping_add(2), value & 0xFFFF, Size::Word);
            return;
        }

        let value = value as u8;
        match IoRegister::from_address(address) {
            IoRegister::Version => log::warn!("Write to version register: {value:02X}"),
            IoRegister::Data(port) => self.joypad.write_data(port, value),
            IoRegister::Control(port) => self.joypad.write_control(port, value),
            IoRegister::TxData(port) => {
                log::debug!("Serial transmit on {port} ignored: {value:02X}");
            }
            IoRegister::Serial => {
                log::debug!("Serial IO register write: {address:06X} {value:02X}");
            }
        }
    }
}
