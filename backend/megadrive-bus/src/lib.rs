pub mod api;
pub mod arbiter;
pub mod audio;
pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod input;
pub mod memory;
pub mod scheduler;
pub mod vdp;

pub use api::{BusError, BusResult, Device, MegaDrive};
pub use bus::{Size, SystemBus};
pub use input::{ControllerType, JoypadPort, JoypadState};
