//! Main CPU address decoding: every 68k-side memory access is routed through [`SystemBus`]

pub mod cocpu;
mod io;

#[cfg(test)]
pub(crate) mod tests;

use crate::api::{BusError, BusResult};
use crate::arbiter::{BusArbiter, CpuKind, DeferredWrite};
use crate::audio::{NullSound, SoundProvider};
use crate::bus::cocpu::CoCpuBankRegister;
use crate::cartridge::Cartridge;
use crate::cartridge::mapper::{BANK_SELECT_END, BANK_SELECT_START, SRAM_CONTROL_ADDRESS};
use crate::input::{JoypadProvider, MegaDriveJoypad};
use crate::memory::Memory;
use crate::vdp::{DmaSource, Vdp, VdpBusyState, VdpPort, VdpProvider, VdpTickEffect};
use bincode::{Decode, Encode};
use megadrive_common::num::U16Ext;
use megadrive_config::{
    BusConfig, CO_CPU_WINDOW_END, CO_CPU_WINDOW_START, DEFAULT_ROM_END, INTERNAL_REGISTERS_END,
    INTERNAL_REGISTERS_START, IO_END, IO_START, RAM_WINDOW_END, RAM_WINDOW_START, VDP_START,
};

// 24-bit address bus
pub const ADDRESS_MASK: u32 = 0xFFFFFF;

// Valid VDP addresses are $C00000-$C0001F; A8-A15, A19 and A20 are not decoded
const VDP_VALID_ADDRESS_MASK: u32 = 0xE700E0;
const VDP_WINDOW_END: u32 = 0xDFFFFF;

const RESERVED_START: u32 = DEFAULT_ROM_END + 1;

const MEMORY_MODE_START: u32 = 0xA11000;
const MEMORY_MODE_END: u32 = 0xA110FF;
const BUSREQ_START: u32 = 0xA11100;
const BUSREQ_END: u32 = 0xA11101;
const CO_CPU_RESET_START: u32 = 0xA11200;
const CO_CPU_RESET_END: u32 = 0xA11201;
const EXPANSION_START: u32 = 0xA12000;
const EXPANSION_END: u32 = 0xA120FF;
const TIME_START: u32 = 0xA13000;
const TIME_END: u32 = 0xA130FF;
const TMSS_LOCK_START: u32 = 0xA14000;
const TMSS_LOCK_END: u32 = 0xA14003;
const TMSS_CARTRIDGE_ENABLE: u32 = 0xA14101;

// Stall charged to the main CPU for every access to the co-CPU window
const CO_CPU_WINDOW_PENALTY: u32 = 3;
// The main CPU sees co-CPU $8000-$FFFF as a mirror of $0000-$7FFF
const CO_CPU_WINDOW_MASK: u32 = 0x7FFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum Size {
    Byte,
    Word,
    Long,
}

impl Size {
    #[inline]
    #[must_use]
    pub fn all_ones(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Long => 0xFFFF_FFFF,
        }
    }
}

struct DmaSourceView<'a> {
    memory: &'a Memory,
    cartridge: &'a Cartridge,
}

impl DmaSource for DmaSourceView<'_> {
    fn read_word(&self, address: u32) -> u16 {
        match address & ADDRESS_MASK {
            0..=DEFAULT_ROM_END => self.cartridge.read_for_dma(address, self.memory.rom()),
            RAM_WINDOW_START..=RAM_WINDOW_END => self.memory.read_ram_word(address),
            _ => {
                log::warn!("VDP DMA from unsupported address {address:06X}");
                0xFFFF
            }
        }
    }
}

pub struct SystemBus {
    config: BusConfig,
    memory: Memory,
    cartridge: Cartridge,
    arbiter: BusArbiter,
    vdp: Box<dyn VdpProvider>,
    sound: Box<dyn SoundProvider>,
    joypad: Box<dyn JoypadProvider>,
    co_cpu_bank: CoCpuBankRegister,
    // Last word-size read; stands in for the prefetch queue in open bus reads
    last_word_read: u16,
}

impl SystemBus {
    /// Bus with the bundled VDP, a silent sound provider and two six-button pads.
    #[must_use]
    pub fn new(config: BusConfig, memory: Memory, cartridge: Cartridge) -> Self {
        Self {
            config,
            memory,
            cartridge,
            arbiter: BusArbiter::new(),
            vdp: Box::new(Vdp::new(config.timing_mode)),
            sound: Box::new(NullSound),
            joypad: Box::new(MegaDriveJoypad::default()),
            co_cpu_bank: CoCpuBankRegister::default(),
            last_word_read: 0,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    #[inline]
    #[must_use]
    pub fn cartridge(&self) -> &Cartridge {
        &self.cartridge
    }

    #[inline]
    pub fn cartridge_mut(&mut self) -> &mut Cartridge {
        &mut self.cartridge
    }

    #[inline]
    #[must_use]
    pub fn arbiter(&self) -> &BusArbiter {
        &self.arbiter
    }

    #[inline]
    pub fn arbiter_mut(&mut self) -> &mut BusArbiter {
        &mut self.arbiter
    }

    #[inline]
    #[must_use]
    pub fn vdp(&self) -> &dyn VdpProvider {
        self.vdp.as_ref()
    }

    #[inline]
    pub fn sound_mut(&mut self) -> &mut dyn SoundProvider {
        self.sound.as_mut()
    }

    #[inline]
    pub fn joypad_mut(&mut self) -> &mut dyn JoypadProvider {
        self.joypad.as_mut()
    }

    pub fn attach_vdp(&mut self, vdp: Box<dyn VdpProvider>) {
        self.vdp = vdp;
        self.arbiter.sync_vdp_busy(self.vdp.busy_state());
    }

    pub fn attach_sound(&mut self, sound: Box<dyn SoundProvider>) {
        self.sound = sound;
    }

    pub fn attach_joypad(&mut self, joypad: Box<dyn JoypadProvider>) {
        self.joypad = joypad;
    }

    /// Swap in a different memory provider. The ROM image comes along with it.
    pub fn attach_memory(&mut self, memory: Memory) {
        self.memory = memory;
    }

    pub fn read(&mut self, address: u32, size: Size) -> u32 {
        let address = address & ADDRESS_MASK;
        let value = match address {
            0..=DEFAULT_ROM_END => self.cartridge.read(address, size, self.memory.rom()),
            RAM_WINDOW_START..=RAM_WINDOW_END => self.memory.read_ram(address, size),
            RESERVED_START..CO_CPU_WINDOW_START => {
                log::warn!("Read from reserved address {address:06X} ({size:?})");
                size.all_ones()
            }
            CO_CPU_WINDOW_START..=CO_CPU_WINDOW_END => self.read_co_cpu_window(address, size),
            IO_START..=IO_END => self.read_io(address, size),
            INTERNAL_REGISTERS_START..=INTERNAL_REGISTERS_END
            | TMSS_LOCK_START..=TMSS_LOCK_END
            | TMSS_CARTRIDGE_ENABLE => self.read_internal_register(address, size),
            VDP_START..=VDP_WINDOW_END => self.read_vdp(address, size),
            _ => {
                log::error!("Unexpected bus read: {address:06X} ({size:?})");
                size.all_ones()
            }
        };

        if size == Size::Word {
            self.last_word_read = value as u16;
        }

        value
    }

    /// # Errors
    ///
    /// Returns [`BusError::InvalidVdpWrite`] for a VDP window address that fails the port validity
    /// check. Every other bad write is logged and dropped.
    pub fn write(&mut self, address: u32, value: u32, size: Size) -> BusResult<()> {
        let address = address & ADDRESS_MASK;
        let value = value & size.all_ones();
        match address {
            RAM_WINDOW_START..=RAM_WINDOW_END => self.memory.write_ram(address, value, size),
            CO_CPU_WINDOW_START..=CO_CPU_WINDOW_END => {
                self.write_co_cpu_window(address, value, size);
            }
            IO_START..=IO_END => self.write_io(address, value, size),
            INTERNAL_REGISTERS_START..=INTERNAL_REGISTERS_END
            | TMSS_LOCK_START..=TMSS_LOCK_END
            | TMSS_CARTRIDGE_ENABLE => self.write_internal_register(address, value, size),
            VDP_START..=VDP_WINDOW_END => return self.write_vdp(address, value, size),
            0..=DEFAULT_ROM_END => self.cartridge.write(address, value, size),
            _ => log::error!("Unexpected bus write: {address:06X} {value:X} ({size:?})"),
        }

        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn interrupt_level(&self) -> u8 {
        self.vdp.interrupt_level()
    }

    /// Main CPU interrupt acknowledge cycle.
    pub fn acknowledge_interrupt(&mut self) {
        self.vdp.acknowledge_interrupt();
    }

    #[inline]
    #[must_use]
    pub fn co_cpu_interrupt(&self) -> bool {
        self.vdp.co_cpu_interrupt()
    }

    /// Run the VDP for one slot, then replay deferred writes if it became ready.
    ///
    /// # Errors
    ///
    /// Propagates errors from replayed writes.
    pub fn tick_vdp(&mut self) -> BusResult<VdpTickEffect> {
        let source = DmaSourceView { memory: &self.memory, cartridge: &self.cartridge };
        let effect = self.vdp.tick(&source);

        self.drain_deferred_writes()?;
        self.arbiter.sync_vdp_busy(self.vdp.busy_state());

        Ok(effect)
    }

    #[inline]
    #[must_use]
    pub fn vdp_slot_mclk_cycles(&self) -> u32 {
        self.vdp.slot_mclk_cycles()
    }

    /// Replay queued VDP writes in order for as long as the VDP accepts them.
    ///
    /// # Errors
    ///
    /// Propagates errors from replayed writes.
    pub fn drain_deferred_writes(&mut self) -> BusResult<()> {
        self.arbiter.set_draining(true);
        let result = self.drain_while_ready();
        self.arbiter.set_draining(false);
        result
    }

    fn drain_while_ready(&mut self) -> BusResult<()> {
        while self.vdp.busy_state() == VdpBusyState::NotBusy {
            let Some(DeferredWrite { address, value, size }) = self.arbiter.next_deferred_write()
            else {
                break;
            };
            self.write(address, value, size)?;
        }

        Ok(())
    }

    pub fn on_new_frame(&mut self) {
        self.joypad.on_new_frame();
    }

    /// Soft reset: bus ownership back to power-on defaults, mapper back to the header-selected
    /// variant. RAM contents survive.
    pub fn reset(&mut self) {
        self.arbiter.reset();
        self.cartridge.reset();
        self.vdp.reset();
        self.sound.reset_fm();
        self.co_cpu_bank = CoCpuBankRegister::default();
        self.last_word_read = 0;
    }

    fn read_co_cpu_window(&mut self, address: u32, size: Size) -> u32 {
        self.arbiter.add_cycle_penalty(CpuKind::Main, CO_CPU_WINDOW_PENALTY);
        if !self.arbiter.co_cpu_window_accessible() {
            log::warn!(
                "Co-CPU memory read at {address:06X} without the bus (busreq = {}, reset = {})",
                self.arbiter.co_cpu_bus_requested(),
                self.arbiter.co_cpu_reset()
            );
            return 0;
        }

        let co_address = (address & CO_CPU_WINDOW_MASK) as u16;
        match size {
            Size::Byte => self.co_cpu_read(co_address).into(),
            Size::Word => self.read_co_cpu_word(co_address).into(),
            Size::Long => {
                self.arbiter.add_cycle_penalty(CpuKind::Main, CO_CPU_WINDOW_PENALTY);
                let high = self.read_co_cpu_word(co_address);
                let low = self.read_co_cpu_word(next_co_cpu_word(co_address));
                (u32::from(high) << 16) | u32::from(low)
            }
        }
    }

    // Co-CPU memory is 8 bits wide; a word read sees the same byte on both halves
    fn read_co_cpu_word(&mut self, address: u16) -> u16 {
        u16::from_mirrored_byte(self.co_cpu_read(address))
    }

    fn write_co_cpu_window(&mut self, address: u32, value: u32, size: Size) {
        self.arbiter.add_cycle_penalty(CpuKind::Main, CO_CPU_WINDOW_PENALTY);
        if !self.arbiter.co_cpu_window_accessible() {
            log::warn!(
                "Co-CPU memory write at {address:06X} without the bus (busreq = {}, reset = {})",
                self.arbiter.co_cpu_bus_requested(),
                self.arbiter.co_cpu_reset()
            );
            return;
        }

        let co_address = (address & CO_CPU_WINDOW_MASK) as u16;
        match size {
            Size::Byte => self.write_co_cpu_memory(co_address, value as u8),
            Size::Word => self.write_co_cpu_word(co_address, value as u16),
            Size::Long => {
                log::debug!("Long write to co-CPU memory: {address:06X} {value:08X}");
                self.arbiter.add_cycle_penalty(CpuKind::Main, CO_CPU_WINDOW_PENALTY);
                self.write_co_cpu_word(co_address, (value >> 16) as u16);
                self.write_co_cpu_word(next_co_cpu_word(co_address), value as u16);
            }
        }
    }

    // Only the high byte of a word write reaches co-CPU memory
    fn write_co_cpu_word(&mut self, address: u16, value: u16) {
        self.write_co_cpu_memory(address, value.msb());
    }

    fn write_co_cpu_memory(&mut self, address: u16, value: u8) {
        // Addresses are masked below $8000, so this never reaches the bank window or the VDP
        // validity check
        if let Err(err) = self.co_cpu_write(address, value) {
            log::error!("Co-CPU window write failed: {err}");
        }
    }

    fn read_internal_register(&mut self, address: u32, size: Size) -> u32 {
        match address {
            BUSREQ_START..=BUSREQ_END => return self.read_busreq(size),
            CO_CPU_RESET_START..=CO_CPU_RESET_END => {
                log::warn!("Unexpected co-CPU reset register read: {address:06X}");
            }
            EXPANSION_START..=EXPANSION_END => {
                log::warn!("Unexpected expansion range read: {address:06X}");
            }
            TIME_START..=TIME_END => log::warn!("Unexpected /TIME or mapper read: {address:06X}"),
            TMSS_LOCK_START..=TMSS_LOCK_END | TMSS_CARTRIDGE_ENABLE => {
                log::warn!("TMSS register read: {address:06X}");
            }
            MEMORY_MODE_START..=MEMORY_MODE_END => {
                log::warn!("Memory mode register read: {address:06X}");
            }
            _ => log::error!("Unexpected internal register read: {address:06X}"),
        }

        size.all_ones()
    }

    // $A11100: 0 when the main CPU holds the co-CPU bus, 1 otherwise
    fn read_busreq(&self, size: Size) -> u32 {
        let busy = self.arbiter.co_cpu_reset() || !self.arbiter.co_cpu_bus_requested();
        let value = u32::from(busy);
        log::trace!("Co-CPU BUSREQ read ({size:?}): {value}");

        match size {
            // Low byte is open bus
            Size::Word => (value << 8) | u32::from(self.last_word_read & 0xFF),
            Size::Byte | Size::Long => value,
        }
    }

    fn write_internal_register(&mut self, address: u32, value: u32, size: Size) {
        match address {
            MEMORY_MODE_START..=MEMORY_MODE_END => {
                // Only D8 is meaningful: 0 = ROM mode, 1 = D-RAM mode
                log::debug!("Memory mode set to {value:X}");
            }
            BUSREQ_START..=BUSREQ_END => self.write_busreq(address, value, size),
            CO_CPU_RESET_START..=CO_CPU_RESET_END => self.write_co_cpu_reset(value),
            TIME_START..=TIME_END => self.write_time_register(address, value),
            TMSS_LOCK_START..=TMSS_LOCK_END => {
                // "SEGA" unlocks the VDP on TMSS consoles; not enforced
                log::debug!("TMSS VDP lock write: {address:06X} {value:X}");
            }
            TMSS_CARTRIDGE_ENABLE => {
                log::debug!("TMSS cartridge enable write: {}", value & 1 != 0);
            }
            _ => log::warn!("Unexpected internal register write: {address:06X} {value:X}"),
        }
    }

    fn write_busreq(&mut self, address: u32, value: u32, size: Size) {
        log::debug!("Co-CPU BUSREQ write ({size:?}): {value:X}");

        // Only bit 8 matters for word writes; some games write $FFFF or $FEFF
        let value = if size == Size::Word { value & 0x0100 } else { value };
        match value {
            0x0100 | 0x0001 => {
                if self.arbiter.co_cpu_bus_requested() {
                    log::debug!("Co-CPU bus already requested");
                } else {
                    self.arbiter.set_co_cpu_bus_requested(true);
                }
            }
            0x0000 => {
                if self.arbiter.co_cpu_bus_requested() {
                    self.arbiter.set_co_cpu_bus_requested(false);
                } else {
                    log::debug!("Co-CPU bus release ignored, bus not requested");
                }
            }
            _ => log::warn!("Unexpected co-CPU BUSREQ write: {address:06X} {value:X}"),
        }
    }

    fn write_co_cpu_reset(&mut self, value: u32) {
        match value {
            0x0000 => {
                // Reset only takes effect while the main CPU holds the co-CPU bus
                if self.arbiter.co_cpu_bus_requested() {
                    log::debug!("Co-CPU reset asserted");
                    self.arbiter.request_co_cpu_reset();
                    self.sound.reset_fm();
                } else {
                    log::debug!("Co-CPU reset ignored, bus not requested");
                }
            }
            0x0100 | 0x0001 => {
                log::debug!(
                    "Co-CPU reset released (busreq = {})",
                    self.arbiter.co_cpu_bus_requested()
                );
                self.arbiter.set_co_cpu_reset(false);
            }
            _ => log::warn!("Unexpected co-CPU reset write: {value:X}"),
        }
    }

    // /TIME range, $A130xx
    fn write_time_register(&mut self, address: u32, value: u32) {
        match address {
            SRAM_CONTROL_ADDRESS | BANK_SELECT_START..=BANK_SELECT_END => {
                self.cartridge.write_bank_select(address, value as u8);
            }
            _ => log::warn!("Unexpected /TIME register write: {address:06X} {value:X}"),
        }
    }

    fn read_vdp(&mut self, address: u32, size: Size) -> u32 {
        if address & VDP_VALID_ADDRESS_MASK != VDP_START {
            log::error!("Invalid VDP read: {address:06X} ({size:?})");
            return size.all_ones();
        }

        let offset = address & 0x1F;
        match offset {
            0x00..=0x07 => {
                let port = if offset < 0x04 { VdpPort::Data } else { VdpPort::Control };
                let word = self.read_vdp_port(port);
                match size {
                    // Even addresses read the high byte
                    Size::Byte => {
                        if offset % 2 == 0 { word.msb().into() } else { word.lsb().into() }
                    }
                    Size::Word => word.into(),
                    Size::Long => (u32::from(word) << 16) | u32::from(self.read_vdp_port(port)),
                }
            }
            0x08..=0x0E => {
                let v = self.vdp.v_counter();
                let h = self.vdp.h_counter();
                log::trace!("HV counter read: v={v:02X} h={h:02X}");
                match size {
                    Size::Word => u16::from_be_bytes([v, h]).into(),
                    Size::Byte => {
                        if offset % 2 == 0 { v.into() } else { h.into() }
                    }
                    Size::Long => {
                        log::warn!("Long read of the HV counter: {address:06X}");
                        0
                    }
                }
            }
            0x1C => {
                log::warn!("Ignoring VDP debug register read: {address:06X}");
                0
            }
            0x18..=0x1F => {
                log::debug!("VDP read of unused address {address:06X}");
                0
            }
            _ => {
                log::warn!("Unexpected VDP read: {address:06X} ({size:?})");
                0
            }
        }
    }

    fn read_vdp_port(&mut self, port: VdpPort) -> u16 {
        match port {
            VdpPort::Data => self.vdp.read_data_port(),
            VdpPort::Control => self.vdp.read_control(),
        }
    }

    fn write_vdp(&mut self, address: u32, value: u32, size: Size) -> BusResult<()> {
        if address & VDP_VALID_ADDRESS_MASK != VDP_START {
            log::error!("Invalid VDP write: {address:06X} {value:X} ({size:?})");
            return Err(BusError::InvalidVdpWrite { address, value, size });
        }

        let offset = address & 0x1F;
        match offset {
            0x00..=0x07 => {
                let port = if offset < 0x04 { VdpPort::Data } else { VdpPort::Control };
                if self.defer_vdp_write_if_busy(address, value, size) {
                    return Ok(());
                }

                match size {
                    // Byte writes are seen by the VDP as the byte on both halves of a word
                    Size::Byte => {
                        self.vdp.write_port_word(port, u16::from_mirrored_byte(value as u8));
                    }
                    Size::Word => self.vdp.write_port_word(port, value as u16),
                    Size::Long => {
                        self.vdp.write_port_word(port, (value >> 16) as u16);
                        if self.defer_vdp_write_if_busy(address, value & 0xFFFF, Size::Word) {
                            return Ok(());
                        }
                        self.vdp.write_port_word(port, value as u16);
                    }
                }
            }
            0x08..=0x0E => log::warn!("HV counter write: {address:06X} {value:X}"),
            0x10..=0x17 => {
                // PSG data is taken from the low byte
                if size == Size::Word {
                    log::warn!("PSG word write: {address:06X} {value:X}");
                }
                self.sound.write_psg(value as u8);
            }
            _ => log::warn!("Unexpected VDP write: {address:06X} {value:X} ({size:?})"),
        }

        Ok(())
    }

    fn defer_vdp_write_if_busy(&mut self, address: u32, value: u32, size: Size) -> bool {
        if !self.arbiter.should_defer_vdp_write(self.vdp.busy_state()) {
            return false;
        }

        self.arbiter.run_later(DeferredWrite { address, value, size });
        true
    }
}

fn next_co_cpu_word(address: u16) -> u16 {
    address.wrapping_add(2) & CO_CPU_WINDOW_MASK as u16
}
