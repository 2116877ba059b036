//! Bus ownership between the two CPUs, contention penalties, interrupt delivery and the queue of
//! VDP port writes deferred while the VDP is busy


use crate::bus::Size;
use crate::cpu::{CoCpu, MainCpu};
use crate::vdp::VdpBusyState;
use bincode::{Decode, Encode};
use std::collections::VecDeque;
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum CpuKind {
    Main,
    Co,
}

/// A VDP port write replayed through the normal write path once the VDP is ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub struct DeferredWrite {
    pub address: u32,
    pub value: u32,
    pub size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
struct BusOwnership {
    co_cpu_bus_requested: bool,
    co_cpu_reset: bool,
}

impl Default for BusOwnership {
    fn default() -> Self {
        Self { co_cpu_bus_requested: false, co_cpu_reset: true }
    }
}

#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct BusArbiter {
    ownership: BusOwnership,
    main_cpu_penalty: u32,
    co_cpu_penalty: u32,
    deferred_writes: VecDeque<DeferredWrite>,
    draining: bool,
    redeferred_writes: u64,
    vdp_busy: VdpBusyState,
    last_main_interrupt_level: u8,
    last_co_cpu_interrupt: bool,
    co_cpu_reset_pending: bool,
}

impl BusArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn co_cpu_bus_requested(&self) -> bool {
        self.ownership.co_cpu_bus_requested
    }

    pub fn set_co_cpu_bus_requested(&mut self, requested: bool) {
        log::trace!(
            "Co-CPU BUSREQ set to {requested} (reset = {})",
            self.ownership.co_cpu_reset
        );
        self.ownership.co_cpu_bus_requested = requested;
    }

    #[inline]
    #[must_use]
    pub fn co_cpu_reset(&self) -> bool {
        self.ownership.co_cpu_reset
    }

    pub fn set_co_cpu_reset(&mut self, reset: bool) {
        log::trace!(
            "Co-CPU RESET set to {reset} (busreq = {})",
            self.ownership.co_cpu_bus_requested
        );
        self.ownership.co_cpu_reset = reset;
    }

    /// Assert co-CPU reset and latch a reset pulse for whoever owns the co-CPU.
    pub fn request_co_cpu_reset(&mut self) {
        self.set_co_cpu_reset(true);
        self.co_cpu_reset_pending = true;
    }

    pub fn take_co_cpu_reset_request(&mut self) -> bool {
        mem::take(&mut self.co_cpu_reset_pending)
    }

    /// The main CPU may only touch co-CPU memory while it holds the bus and the co-CPU is out of
    /// reset.
    #[inline]
    #[must_use]
    pub fn co_cpu_window_accessible(&self) -> bool {
        self.ownership.co_cpu_bus_requested && !self.ownership.co_cpu_reset
    }

    #[inline]
    #[must_use]
    pub fn is_co_cpu_running(&self) -> bool {
        !self.ownership.co_cpu_reset && !self.ownership.co_cpu_bus_requested
    }

    /// False while a 68k-to-VDP DMA holds the main CPU off the bus.
    #[inline]
    #[must_use]
    pub fn is_main_cpu_running(&self) -> bool {
        self.vdp_busy != VdpBusyState::MemToVram
    }

    pub fn add_cycle_penalty(&mut self, cpu: CpuKind, cycles: u32) {
        match cpu {
            CpuKind::Main => self.main_cpu_penalty += cycles,
            CpuKind::Co => self.co_cpu_penalty += cycles,
        }
    }

    pub fn take_cycle_penalty(&mut self, cpu: CpuKind) -> u32 {
        match cpu {
            CpuKind::Main => mem::take(&mut self.main_cpu_penalty),
            CpuKind::Co => mem::take(&mut self.co_cpu_penalty),
        }
    }

    #[inline]
    #[must_use]
    pub fn vdp_busy(&self) -> VdpBusyState {
        self.vdp_busy
    }

    pub fn sync_vdp_busy(&mut self, state: VdpBusyState) {
        if state != self.vdp_busy {
            log::trace!("VDP busy state {:?} -> {state:?}", self.vdp_busy);
        }
        self.vdp_busy = state;
    }

    /// Whether a VDP port write has to wait. Writes issued while older writes are still queued
    /// also wait so that ordering is kept.
    #[must_use]
    pub fn should_defer_vdp_write(&self, vdp_busy: VdpBusyState) -> bool {
        vdp_busy != VdpBusyState::NotBusy || (!self.deferred_writes.is_empty() && !self.draining)
    }

    pub fn run_later(&mut self, write: DeferredWrite) {
        if self.draining {
            // Put it back at the head so it stays ahead of everything queued after it
            self.redeferred_writes += 1;
            log::error!(
                "VDP write re-deferred while draining: {:06X} {:X} {:?} ({} total)",
                write.address,
                write.value,
                write.size,
                self.redeferred_writes
            );
            self.deferred_writes.push_front(write);
        } else {
            log::trace!(
                "Deferring VDP write: {:06X} {:X} {:?}",
                write.address,
                write.value,
                write.size
            );
            self.deferred_writes.push_back(write);
        }
    }

    pub fn next_deferred_write(&mut self) -> Option<DeferredWrite> {
        self.deferred_writes.pop_front()
    }

    #[inline]
    #[must_use]
    pub fn deferred_write_count(&self) -> usize {
        self.deferred_writes.len()
    }

    #[must_use]
    pub fn redeferred_write_count(&self) -> u64 {
        self.redeferred_writes
    }

    pub fn set_draining(&mut self, draining: bool) {
        self.draining = draining;
    }

    /// Latch the VDP interrupt level into the main CPU. Called after an instruction completes,
    /// never in the middle of one.
    pub fn handle_main_interrupts(&mut self, cpu: &mut dyn MainCpu, level: u8) {
        if level != self.last_main_interrupt_level {
            log::trace!("Main CPU interrupt level {} -> {level}", self.last_main_interrupt_level);
            self.last_main_interrupt_level = level;
        }
        cpu.set_interrupt_level(level);
    }

    pub fn handle_co_cpu_interrupts(&mut self, cpu: &mut dyn CoCpu, asserted: bool) {
        if asserted != self.last_co_cpu_interrupt {
            log::trace!("Co-CPU INT line asserted: {asserted}");
            self.last_co_cpu_interrupt = asserted;
        }
        cpu.set_interrupt_line(asserted);
    }

    pub fn reset(&mut self) {
        if !self.deferred_writes.is_empty() {
            log::warn!("Dropping {} deferred VDP writes on reset", self.deferred_writes.len());
        }
        *self = Self::new();
    }
}
