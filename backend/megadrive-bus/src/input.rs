//! Controller IO ports and the bundled three/six-button pad


use bincode::{Decode, Encode};
use megadrive_common::num::GetBit;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum JoypadPort {
    One,
    Two,
    Expansion,
}

impl Display for JoypadPort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One => write!(f, "port 1"),
            Self::Two => write!(f, "port 2"),
            Self::Expansion => write!(f, "expansion port"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControllerType {
    ThreeButton,
    #[default]
    SixButton,
}

/// Pressed state of every button on a pad; `true` means pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JoypadState {
    pub up: bool,
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub x: bool,
    pub y: bool,
    pub z: bool,
    pub start: bool,
    pub mode: bool,
}

/// Controller register interface seen by the IO port window.
pub trait JoypadProvider {
    fn read_data(&mut self, port: JoypadPort) -> u8;

    fn write_data(&mut self, port: JoypadPort, value: u8);

    fn read_control(&mut self, port: JoypadPort) -> u8;

    fn write_control(&mut self, port: JoypadPort, value: u8);

    fn set_buttons(&mut self, port: JoypadPort, state: JoypadState);

    fn on_new_frame(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Encode, Decode)]
enum PinDirection {
    #[default]
    Input,
    Output,
}

impl PinDirection {
    fn from_ctrl_bit(bit: bool) -> Self {
        if bit { Self::Output } else { Self::Input }
    }

    fn to_data_bit(self, joypad_bit: bool, data_bit: bool) -> bool {
        match self {
            Self::Input => joypad_bit,
            Self::Output => data_bit,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Encode, Decode)]
struct PortState {
    buttons: JoypadState,
    controller_type: ControllerType,
    last_data_write: u8,
    last_ctrl_write: u8,
    th_flip_count: u8,
}

impl PortState {
    fn pin(&self, bit: u8) -> PinDirection {
        PinDirection::from_ctrl_bit(self.last_ctrl_write.bit(bit))
    }

    fn write_data(&mut self, value: u8) {
        let prev_th = self.last_data_write.bit(6);
        self.last_data_write = value;
        let th = value.bit(6);

        // Six-button pads cycle through 4 phases on every TH rising edge
        if self.controller_type == ControllerType::SixButton && !prev_th && th {
            self.th_flip_count = (self.th_flip_count + 1) & 0x03;
            log::trace!("TH flip count now {}", self.th_flip_count);
        }
    }

    fn read_data(&self) -> u8 {
        let buttons = self.buttons;
        let th = self.last_data_write.bit(6);
        let phase = self.th_flip_count;

        // Buttons are active low
        let tr = if th { !buttons.c } else { !buttons.start };
        let tl = if th { !buttons.b } else { !buttons.a };
        let [d3, d2, d1, d0] = match (phase, th) {
            (3, true) => [!buttons.mode, !buttons.x, !buttons.y, !buttons.z],
            (3, false) => [true; 4],
            (_, true) => [!buttons.right, !buttons.left, !buttons.down, !buttons.up],
            (2, false) => [false; 4],
            (_, false) => [false, false, !buttons.down, !buttons.up],
        };

        let data = self.last_data_write;
        (data & 0x80)
            | (u8::from(th) << 6)
            | (u8::from(self.pin(5).to_data_bit(tr, data.bit(5))) << 5)
            | (u8::from(self.pin(4).to_data_bit(tl, data.bit(4))) << 4)
            | (u8::from(self.pin(3).to_data_bit(d3, data.bit(3))) << 3)
            | (u8::from(self.pin(2).to_data_bit(d2, data.bit(2))) << 2)
            | (u8::from(self.pin(1).to_data_bit(d1, data.bit(1))) << 1)
            | u8::from(self.pin(0).to_data_bit(d0, data.bit(0)))
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct MegaDriveJoypad {
    p1: PortState,
    p2: PortState,
    expansion_ctrl: u8,
}

impl MegaDriveJoypad {
    #[must_use]
    pub fn new(p1_type: ControllerType, p2_type: ControllerType) -> Self {
        Self {
            p1: PortState { controller_type: p1_type, ..PortState::default() },
            p2: PortState { controller_type: p2_type, ..PortState::default() },
            expansion_ctrl: 0,
        }
    }

    fn port_mut(&mut self, port: JoypadPort) -> Option<&mut PortState> {
        match port {
            JoypadPort::One => Some(&mut self.p1),
            JoypadPort::Two => Some(&mut self.p2),
            JoypadPort::Expansion => None,
        }
    }
}

impl JoypadProvider for MegaDriveJoypad {
    fn read_data(&mut self, port: JoypadPort) -> u8 {
        match port {
            JoypadPort::One => self.p1.read_data(),
            JoypadPort::Two => self.p2.read_data(),
            // Nothing connected
            JoypadPort::Expansion => 0x3F,
        }
    }

    fn write_data(&mut self, port: JoypadPort, value: u8) {
        match self.port_mut(port) {
            Some(state) => state.write_data(value),
            None => log::warn!("Data write to {port}: {value:02X}"),
        }
    }

    fn read_control(&mut self, port: JoypadPort) -> u8 {
        match port {
            JoypadPort::One => self.p1.last_ctrl_write,
            JoypadPort::Two => self.p2.last_ctrl_write,
            JoypadPort::Expansion => self.expansion_ctrl,
        }
    }

    fn write_control(&mut self, port: JoypadPort, value: u8) {
        log::debug!("Control write to {port}: {value:02X}");
        match self.port_mut(port) {
            Some(state) => state.last_ctrl_write = value,
            None => self.expansion_ctrl = value,
        }
    }

    fn set_buttons(&mut self, port: JoypadPort, state: JoypadState) {
        if let Some(port_state) = self.port_mut(port) {
            port_state.buttons = state;
        }
    }

    fn on_new_frame(&mut self) {
        self.p1.th_flip_count = 0;
        self.p2.th_flip_count = 0;
    }
}
