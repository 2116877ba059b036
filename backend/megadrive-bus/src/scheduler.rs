//! Master tick loop driving both CPUs, the VDP and the FM clock at their own rates
//!
//! One scheduler tick is 7 master clocks. The main CPU is due every tick, the co-CPU every 2
//! ticks, the FM clock every 6 ticks. VDP slots are 16 or 20 master clocks depending on the
//! horizontal resolution, which is not a whole number of ticks, so VDP progress is tracked in
//! master clocks directly.


use crate::api::BusResult;
use crate::arbiter::CpuKind;
use crate::audio;
use crate::bus::SystemBus;
use crate::cpu::{CoCpu, MainCpu};
use crate::vdp::VdpTickEffect;
use bincode::{Decode, Encode};
use megadrive_common::frontend::{TickEffect, TimingMode};

pub const MCLK_CYCLES_PER_TICK: u64 = 7;

const CO_CPU_DIVIDER: u64 = 2;
const FM_DIVIDER: u64 = 6;

#[derive(Debug, Clone, Encode, Decode)]
pub struct Scheduler {
    counter: u64,
    next_main_cpu_tick: u64,
    next_co_cpu_tick: u64,
    next_vdp_mclk: u64,
    fm_micros_per_tick: f64,
}

impl Scheduler {
    #[must_use]
    pub fn new(timing_mode: TimingMode) -> Self {
        Self {
            counter: 1,
            next_main_cpu_tick: 1,
            next_co_cpu_tick: 2,
            next_vdp_mclk: 0,
            fm_micros_per_tick: audio::fm_micros_per_tick(timing_mode),
        }
    }

    #[inline]
    #[must_use]
    pub fn counter(&self) -> u64 {
        self.counter
    }

    #[inline]
    #[must_use]
    pub fn next_main_cpu_tick(&self) -> u64 {
        self.next_main_cpu_tick
    }

    #[inline]
    #[must_use]
    pub fn next_co_cpu_tick(&self) -> u64 {
        self.next_co_cpu_tick
    }

    #[inline]
    #[must_use]
    pub fn next_vdp_mclk(&self) -> u64 {
        self.next_vdp_mclk
    }

    /// Run one scheduler tick: every device that is due does one unit of work.
    ///
    /// # Errors
    ///
    /// Propagates the fatal bus error from any CPU or from a replayed VDP write.
    pub fn step(
        &mut self,
        bus: &mut SystemBus,
        main_cpu: &mut dyn MainCpu,
        co_cpu: &mut dyn CoCpu,
    ) -> BusResult<TickEffect> {
        if self.counter >= self.next_main_cpu_tick {
            let cycles = run_main_cpu(bus, main_cpu)?;
            self.next_main_cpu_tick += u64::from(cycles.max(1));
        }

        if self.counter >= self.next_co_cpu_tick {
            let cycles = run_co_cpu(bus, co_cpu)?;
            self.next_co_cpu_tick += CO_CPU_DIVIDER * u64::from(cycles.max(1));
        }

        if self.counter % FM_DIVIDER == 0 {
            bus.sound_mut().tick(self.fm_micros_per_tick);
        }

        let mut frame_complete = false;
        while self.counter * MCLK_CYCLES_PER_TICK >= self.next_vdp_mclk {
            if bus.tick_vdp()? == VdpTickEffect::FrameComplete {
                frame_complete = true;
            }
            self.next_vdp_mclk += u64::from(bus.vdp_slot_mclk_cycles());
        }

        let effect = if frame_complete {
            self.on_new_frame(bus);
            TickEffect::FrameRendered
        } else {
            TickEffect::None
        };

        self.counter += 1;

        Ok(effect)
    }

    /// Step until the VDP finishes a frame.
    ///
    /// # Errors
    ///
    /// Propagates the fatal bus error; the frame is abandoned part-way through.
    pub fn run_frame(
        &mut self,
        bus: &mut SystemBus,
        main_cpu: &mut dyn MainCpu,
        co_cpu: &mut dyn CoCpu,
    ) -> BusResult<TickEffect> {
        loop {
            if self.step(bus, main_cpu, co_cpu)? == TickEffect::FrameRendered {
                return Ok(TickEffect::FrameRendered);
            }
        }
    }

    // Due ticks are relative to the frame's counter; rebase them so the counter never overflows
    fn on_new_frame(&mut self, bus: &mut SystemBus) {
        log::trace!("Frame complete at scheduler tick {}", self.counter);

        self.next_main_cpu_tick = self.next_main_cpu_tick.saturating_sub(self.counter);
        self.next_co_cpu_tick = self.next_co_cpu_tick.saturating_sub(self.counter);
        self.next_vdp_mclk =
            self.next_vdp_mclk.saturating_sub(self.counter * MCLK_CYCLES_PER_TICK);
        self.counter = 0;

        bus.on_new_frame();
    }

    pub fn reset(&mut self, timing_mode: TimingMode) {
        *self = Self::new(timing_mode);
    }
}

fn run_main_cpu(bus: &mut SystemBus, cpu: &mut dyn MainCpu) -> BusResult<u32> {
    let frozen = !bus.arbiter().is_main_cpu_running();

    let mut cycles = 0;
    if !frozen && !cpu.is_stopped() {
        cycles = cpu.execute_instruction(bus)?;
    }
    cycles += bus.arbiter_mut().take_cycle_penalty(CpuKind::Main);

    if !frozen {
        let level = bus.interrupt_level();
        bus.arbiter_mut().handle_main_interrupts(cpu, level);
    }

    Ok(cycles)
}

fn run_co_cpu(bus: &mut SystemBus, cpu: &mut dyn CoCpu) -> BusResult<u32> {
    if bus.arbiter_mut().take_co_cpu_reset_request() {
        log::debug!("Resetting co-CPU");
        cpu.reset();
    }

    if !bus.arbiter().is_co_cpu_running() {
        return Ok(bus.arbiter_mut().take_cycle_penalty(CpuKind::Co));
    }

    let mut co_bus = bus.co_cpu_bus();
    let cycles = cpu.execute_instruction(&mut co_bus);
    co_bus.finish()?;

    let asserted = bus.co_cpu_interrupt();
    bus.arbiter_mut().handle_co_cpu_interrupts(cpu, asserted);

    Ok(cycles + bus.arbiter_mut().take_cycle_penalty(CpuKind::Co))
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(TimingMode::default())
    }
}
