//! Public entry point: error types and the [`MegaDrive`] system facade


use crate::audio::SoundProvider;
use crate::bus::{Size, SystemBus};
use crate::cartridge::Cartridge;
use crate::cartridge::header::CartridgeHeader;
use crate::cpu::{CoCpu, EmptySocket, MainCpu};
use crate::input::{JoypadPort, JoypadProvider, JoypadState};
use crate::memory::{Memory, Rom};
use crate::scheduler::Scheduler;
use crate::vdp::VdpProvider;
use megadrive_common::frontend::{SaveWriter, TickResult};
use megadrive_common::timeutils::FramePacer;
use megadrive_config::{BusConfig, HostOverrides};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Invalid VDP write: address={address:06X}, value={value:X}, size={size:?}")]
    InvalidVdpWrite { address: u32, value: u32, size: Size },
    #[error("No cartridge ROM provided")]
    NoCartridge,
    #[error("ROM image is too small to contain a header: {len} bytes")]
    RomTooSmall { len: usize },
}

impl BusError {
    /// Whether the session cannot continue after this error. Construction errors are not fatal
    /// since no session exists yet.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidVdpWrite { .. })
    }
}

pub type BusResult<T> = Result<T, BusError>;

/// A device plugged into the system, tagged by the role it fills.
pub enum Device {
    Cpu(Box<dyn MainCpu>),
    CoCpu(Box<dyn CoCpu>),
    Vdp(Box<dyn VdpProvider>),
    Joypad(Box<dyn JoypadProvider>),
    Sound(Box<dyn SoundProvider>),
    Memory(Memory),
}

impl Device {
    fn name(&self) -> &'static str {
        match self {
            Self::Cpu(_) => "main CPU",
            Self::CoCpu(_) => "co-CPU",
            Self::Vdp(_) => "VDP",
            Self::Joypad(_) => "joypad",
            Self::Sound(_) => "sound",
            Self::Memory(_) => "memory",
        }
    }
}

pub struct MegaDrive {
    bus: SystemBus,
    main_cpu: Box<dyn MainCpu>,
    co_cpu: Box<dyn CoCpu>,
    scheduler: Scheduler,
    frame_pacer: Option<FramePacer>,
}

impl MegaDrive {
    /// Build a system around the given ROM image. Persisted backup memory for the cartridge is
    /// loaded through `save_writer`. Both CPU sockets start empty; attach CPUs with
    /// [`MegaDrive::attach_device`] before ticking.
    ///
    /// # Errors
    ///
    /// Returns an error if the ROM is empty or too small to contain a header.
    pub fn create<S: SaveWriter>(
        rom: Vec<u8>,
        overrides: HostOverrides,
        save_writer: &mut S,
    ) -> BusResult<Self> {
        if rom.is_empty() {
            return Err(BusError::NoCartridge);
        }

        let header = CartridgeHeader::parse(&rom)?;
        let config = header.bus_config(overrides);
        let initial_backup = header.backup.and_then(|kind| {
            match save_writer.load_bytes(kind.extension()) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    log::info!("No persisted .{} loaded: {err}", kind.extension());
                    None
                }
            }
        });
        let cartridge = Cartridge::new(header, config, initial_backup.as_deref());
        let memory = Memory::new(Rom::new(rom));

        Ok(Self {
            bus: SystemBus::new(config, memory, cartridge),
            main_cpu: Box::new(EmptySocket),
            co_cpu: Box::new(EmptySocket),
            scheduler: Scheduler::new(config.timing_mode),
            frame_pacer: None,
        })
    }

    /// Wire a device into the system by role, replacing whatever filled that role before.
    pub fn attach_device(&mut self, device: Device) {
        log::debug!("Attaching {}", device.name());

        match device {
            Device::Cpu(cpu) => self.main_cpu = cpu,
            Device::CoCpu(cpu) => self.co_cpu = cpu,
            Device::Vdp(vdp) => self.bus.attach_vdp(vdp),
            Device::Joypad(joypad) => self.bus.attach_joypad(joypad),
            Device::Sound(sound) => self.bus.attach_sound(sound),
            Device::Memory(memory) => self.bus.attach_memory(memory),
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        self.bus.config()
    }

    #[inline]
    #[must_use]
    pub fn bus(&self) -> &SystemBus {
        &self.bus
    }

    #[inline]
    pub fn bus_mut(&mut self) -> &mut SystemBus {
        &mut self.bus
    }

    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Pace [`MegaDrive::tick`] to the console's frame rate.
    pub fn set_frame_pacing(&mut self, enabled: bool) {
        self.frame_pacer = enabled
            .then(|| FramePacer::new(self.bus.config().timing_mode.frame_interval_nanos()));
    }

    pub fn set_buttons(&mut self, port: JoypadPort, state: JoypadState) {
        self.bus.joypad_mut().set_buttons(port, state);
    }

    /// Run until the VDP completes a frame.
    ///
    /// # Errors
    ///
    /// Returns the fatal bus error if either CPU or a replayed VDP write performs an invalid VDP
    /// write. The session should be halted; the frame was abandoned part-way through.
    pub fn tick(&mut self) -> TickResult<BusError> {
        let effect = self.scheduler.run_frame(
            &mut self.bus,
            self.main_cpu.as_mut(),
            self.co_cpu.as_mut(),
        )?;

        if let Some(frame_pacer) = &mut self.frame_pacer {
            frame_pacer.wait_for_next_frame();
        }

        Ok(effect)
    }

    /// Run a single scheduler tick.
    ///
    /// # Errors
    ///
    /// Same as [`MegaDrive::tick`].
    pub fn step(&mut self) -> TickResult<BusError> {
        self.scheduler.step(&mut self.bus, self.main_cpu.as_mut(), self.co_cpu.as_mut())
    }

    /// Per-frame device hook. The scheduler already runs it at every frame boundary.
    pub fn on_new_frame(&mut self) {
        self.bus.on_new_frame();
    }

    /// Soft reset. RAM and backup memory survive.
    pub fn reset(&mut self) {
        log::info!("Resetting system");

        self.bus.reset();
        self.main_cpu.reset();
        self.co_cpu.reset();
        self.scheduler.reset(self.bus.config().timing_mode);
    }

    /// Persist dirty backup memory. Call at a frame boundary before dropping the system.
    ///
    /// # Errors
    ///
    /// Propagates any error from the save writer.
    pub fn close_session<S: SaveWriter>(&mut self, save_writer: &mut S) -> Result<(), S::Err> {
        self.bus.cartridge_mut().close_session(save_writer)
    }
}
