//! Interfaces for the two CPUs the scheduler drives

use crate::api::BusResult;
use crate::bus::SystemBus;
use crate::bus::cocpu::CoCpuBus;

/// 68000-class main CPU.
pub trait MainCpu {
    /// Execute one instruction and return how many CPU cycles it took. Interrupts are acknowledged
    /// through [`SystemBus::acknowledge_interrupt`].
    ///
    /// # Errors
    ///
    /// Propagates the fatal bus error if the instruction performs an invalid VDP write.
    fn execute_instruction(&mut self, bus: &mut SystemBus) -> BusResult<u32>;

    /// Latch the interrupt level presented on the IPL lines. Only called between instructions.
    fn set_interrupt_level(&mut self, level: u8);

    /// Whether the CPU has halted itself (STOP).
    fn is_stopped(&self) -> bool;

    fn reset(&mut self);
}

/// Z80-class co-processor CPU.
pub trait CoCpu {
    /// Execute one instruction and return how many CPU cycles it took.
    fn execute_instruction(&mut self, bus: &mut CoCpuBus<'_>) -> u32;

    fn set_interrupt_line(&mut self, asserted: bool);

    fn reset(&mut self);
}

/// Stand-in for a CPU socket with nothing attached: never executes and never wakes up.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySocket;

impl MainCpu for EmptySocket {
    fn execute_instruction(&mut self, _bus: &mut SystemBus) -> BusResult<u32> {
        Ok(0)
    }

    fn set_interrupt_level(&mut self, _level: u8) {}

    fn is_stopped(&self) -> bool {
        true
    }

    fn reset(&mut self) {}
}

impl CoCpu for EmptySocket {
    fn execute_instruction(&mut self, _bus: &mut CoCpuBus<'_>) -> u32 {
        0
    }

    fn set_interrupt_line(&mut self, _asserted: bool) {}

    fn reset(&mut self) {}
}
