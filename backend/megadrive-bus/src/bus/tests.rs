use super::*;
use crate::cartridge::header::CartridgeHeader;
use crate::cartridge::header::tests::rom_with_header;
use crate::cartridge::mapper::BankMapper;
use crate::memory::Rom;
use megadrive_config::HostOverrides;
use std::cell::RefCell;
use std::rc::Rc;
use test_log::test;

const ROM_LEN: usize = 0x10000;

pub(crate) fn test_rom(len: usize) -> Vec<u8> {
    rom_with_header(len, |rom| rom[0x1000..0x1004].copy_from_slice(&[0x12, 0x34, 0x56, 0x78]))
}

pub(crate) fn bus_with_rom(rom: Vec<u8>) -> SystemBus {
    let header = CartridgeHeader::parse(&rom).unwrap();
    let config = header.bus_config(HostOverrides::default());
    let cartridge = Cartridge::new(header, config, None);
    SystemBus::new(config, Memory::new(Rom::new(rom)), cartridge)
}

pub(crate) fn test_bus() -> SystemBus {
    bus_with_rom(test_rom(ROM_LEN))
}

#[derive(Debug, Default)]
pub(crate) struct FakeVdpState {
    pub busy: VdpBusyState,
    // Report FifoFull once this many port writes have been accepted
    pub busy_after_writes: Option<usize>,
    pub writes: Vec<(VdpPort, u16)>,
    pub data_port: u16,
    pub status: u16,
    pub v_counter: u8,
    pub h_counter: u8,
    pub interrupt_level: u8,
    pub co_cpu_interrupt: bool,
    pub acknowledged: u32,
    pub ticks: u32,
    pub frame_every: Option<u32>,
}

/// VDP double whose state stays visible to the test after the bus takes ownership of it.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeVdp(pub Rc<RefCell<FakeVdpState>>);

impl VdpProvider for FakeVdp {
    fn read_data_port(&mut self) -> u16 {
        self.0.borrow().data_port
    }

    fn read_control(&mut self) -> u16 {
        self.0.borrow().status
    }

    fn write_port_word(&mut self, port: VdpPort, value: u16) {
        let mut state = self.0.borrow_mut();
        state.writes.push((port, value));
        if state.busy_after_writes == Some(state.writes.len()) {
            state.busy = VdpBusyState::FifoFull;
        }
    }

    fn v_counter(&self) -> u8 {
        self.0.borrow().v_counter
    }

    fn h_counter(&self) -> u8 {
        self.0.borrow().h_counter
    }

    fn busy_state(&self) -> VdpBusyState {
        self.0.borrow().busy
    }

    fn tick(&mut self, _source: &dyn DmaSource) -> VdpTickEffect {
        let mut state = self.0.borrow_mut();
        state.ticks += 1;
        match state.frame_every {
            Some(frame_every) if state.ticks % frame_every == 0 => VdpTickEffect::FrameComplete,
            _ => VdpTickEffect::None,
        }
    }

    fn slot_mclk_cycles(&self) -> u32 {
        20
    }

    fn interrupt_level(&self) -> u8 {
        self.0.borrow().interrupt_level
    }

    fn acknowledge_interrupt(&mut self) {
        let mut state = self.0.borrow_mut();
        state.acknowledged += 1;
        state.interrupt_level = 0;
    }

    fn co_cpu_interrupt(&self) -> bool {
        self.0.borrow().co_cpu_interrupt
    }

    fn reset(&mut self) {}
}

#[derive(Debug, Default)]
pub(crate) struct SoundLog {
    pub fm_writes: Vec<(u8, u8)>,
    pub psg_writes: Vec<u8>,
    pub fm_resets: u32,
    pub ticks: u32,
    pub fm_status: u8,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSound(pub Rc<RefCell<SoundLog>>);

impl SoundProvider for RecordingSound {
    fn read_fm(&mut self, _port: u8) -> u8 {
        self.0.borrow().fm_status
    }

    fn write_fm(&mut self, port: u8, value: u8) {
        self.0.borrow_mut().fm_writes.push((port, value));
    }

    fn write_psg(&mut self, value: u8) {
        self.0.borrow_mut().psg_writes.push(value);
    }

    fn reset_fm(&mut self) {
        self.0.borrow_mut().fm_resets += 1;
    }

    fn tick(&mut self, _micros_per_tick: f64) {
        self.0.borrow_mut().ticks += 1;
    }
}

fn bus_with_fakes() -> (SystemBus, FakeVdp, RecordingSound) {
    let mut bus = test_bus();
    let vdp = FakeVdp::default();
    let sound = RecordingSound::default();
    bus.attach_vdp(Box::new(vdp.clone()));
    bus.attach_sound(Box::new(sound.clone()));
    (bus, vdp, sound)
}

fn grant_co_cpu_bus(bus: &mut SystemBus) {
    bus.write(0xA11100, 0x0100, Size::Word).unwrap();
    bus.write(0xA11200, 0x0100, Size::Word).unwrap();
    assert!(bus.arbiter().co_cpu_window_accessible());
}

fn load_co_cpu_bank(bus: &mut SystemBus, bank: u32) {
    let mut co_bus = bus.co_cpu_bus();
    for i in 0..9 {
        co_bus.write_memory(0x6000, ((bank >> i) & 1) as u8);
    }
    co_bus.finish().unwrap();
}

#[test]
fn rom_reads() {
    let mut bus = test_bus();
    assert_eq!(bus.read(0x001000, Size::Byte), 0x12);
    assert_eq!(bus.read(0x001000, Size::Word), 0x1234);
    assert_eq!(bus.read(0x001000, Size::Long), 0x1234_5678);
    // Upper address byte is not decoded
    assert_eq!(bus.read(0xFF001001, Size::Byte), 0x34);
}

#[test]
fn ram_is_mirrored_across_the_window() {
    let mut bus = test_bus();
    bus.write(0xFF1234, 0xBEEF, Size::Word).unwrap();
    bus.write(0xE05678, 0xAB, Size::Byte).unwrap();

    for address in [0xFF1234, 0xFF5678, 0xE01234, 0xE05678, 0xEF1234] {
        assert_eq!(bus.read(address, Size::Word), bus.read(address ^ 0x10000, Size::Word));
    }
    assert_eq!(bus.read(0xE11234, Size::Word), 0xBEEF);
    assert_eq!(bus.read(0xFF5678, Size::Byte), 0xAB);

    bus.write(0xFE0000, 0x0102_0304, Size::Long).unwrap();
    assert_eq!(bus.read(0xFF0002, Size::Word), 0x0304);
}

#[test]
fn co_cpu_window_requires_bus_ownership() {
    let mut bus = test_bus();

    // Power-on: bus not requested, reset asserted
    bus.write(0xA00010, 0x55, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA00010, Size::Byte), 0);

    // Requested but still held in reset
    bus.write(0xA11100, 0x0100, Size::Word).unwrap();
    bus.write(0xA00010, 0x55, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA00010, Size::Byte), 0);

    bus.write(0xA11200, 0x0100, Size::Word).unwrap();
    assert_eq!(bus.read(0xA00010, Size::Byte), 0, "earlier writes must have been dropped");

    bus.write(0xA00010, 0x55, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA00010, Size::Byte), 0x55);
    assert_eq!(bus.memory().read_audio_ram(0x0010), 0x55);
}

#[test]
fn co_cpu_word_read_mirrors_the_byte() {
    let mut bus = test_bus();
    grant_co_cpu_bus(&mut bus);

    bus.write(0xA00100, 0x55, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA00100, Size::Word), 0x5555);

    bus.write(0xA00102, 0x66, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA00100, Size::Long), 0x5555_6666);
}

#[test]
fn co_cpu_word_write_keeps_only_the_high_byte() {
    let mut bus = test_bus();
    grant_co_cpu_bus(&mut bus);

    bus.write(0xA00200, 0xAB12, Size::Word).unwrap();
    assert_eq!(bus.read(0xA00200, Size::Byte), 0xAB);
    assert_eq!(bus.read(0xA00201, Size::Byte), 0x00);

    bus.write(0xA00300, 0x1122_3344, Size::Long).unwrap();
    assert_eq!(bus.read(0xA00300, Size::Byte), 0x11);
    assert_eq!(bus.read(0xA00302, Size::Byte), 0x33);
}

#[test]
fn co_cpu_window_charges_the_main_cpu() {
    let mut bus = test_bus();

    // Charged even when the access is refused
    bus.read(0xA00000, Size::Byte);
    assert_eq!(bus.arbiter_mut().take_cycle_penalty(CpuKind::Main), 3);

    grant_co_cpu_bus(&mut bus);
    bus.read(0xA00000, Size::Word);
    bus.write(0xA00000, 0, Size::Byte).unwrap();
    assert_eq!(bus.arbiter_mut().take_cycle_penalty(CpuKind::Main), 6);

    bus.read(0xA00000, Size::Long);
    assert_eq!(bus.arbiter_mut().take_cycle_penalty(CpuKind::Main), 6);
}

#[test]
fn unmapped_and_reserved_reads_return_sentinels() {
    let mut bus = test_bus();

    assert_eq!(bus.read(0x500000, Size::Word), 0xFFFF);
    assert_eq!(bus.read(0x900000, Size::Byte), 0xFF);
    assert_eq!(bus.read(0xB00000, Size::Byte), 0xFF);
    assert_eq!(bus.read(0xB00000, Size::Word), 0xFFFF);
    assert_eq!(bus.read(0xB00000, Size::Long), 0xFFFF_FFFF);
    assert_eq!(bus.read(0xA14100, Size::Byte), 0xFF);
    assert_eq!(bus.read(0xA14100, Size::Word), 0xFFFF);
    assert_eq!(bus.read(0xA10020, Size::Word), 0xFFFF);
    assert_eq!(bus.read(0xA13000, Size::Long), 0xFFFF_FFFF);

    bus.write(0xB00000, 0x1234, Size::Word).unwrap();
    bus.write(0x500000, 0x1234, Size::Word).unwrap();
}

#[test]
fn invalid_vdp_write_is_fatal() {
    let mut bus = test_bus();

    let result = bus.write(0xC00020, 0x1234, Size::Word);
    assert!(matches!(
        result,
        Err(BusError::InvalidVdpWrite { address: 0xC00020, value: 0x1234, size: Size::Word })
    ));
    assert!(result.unwrap_err().is_fatal());

    // Reads of the same address are only logged
    assert_eq!(bus.read(0xC00020, Size::Byte), 0xFF);
    assert_eq!(bus.read(0xC00020, Size::Word), 0xFFFF);
    assert_eq!(bus.read(0xC00020, Size::Long), 0xFFFF_FFFF);

    // A8-A15, A19 and A20 are not decoded
    assert!(bus.write(0xD80704, 0x8F02, Size::Word).is_ok());
}

#[test]
fn writes_to_rom_are_dropped() {
    let mut bus = test_bus();
    bus.write(0x001000, 0xFFFF, Size::Word).unwrap();
    assert_eq!(bus.read(0x001000, Size::Word), 0x1234);
}

#[test]
fn busreq_register() {
    let mut bus = test_bus();

    assert_eq!(bus.read(0xA11100, Size::Byte), 1);

    // Low byte of a word read is open bus
    assert_eq!(bus.read(0x001000, Size::Word), 0x1234);
    assert_eq!(bus.read(0xA11100, Size::Word), 0x0134);

    // Only bit 8 of a word write matters
    bus.write(0xA11100, 0xFFFF, Size::Word).unwrap();
    assert!(bus.arbiter().co_cpu_bus_requested());
    // Still reads 1 until reset is released
    assert_eq!(bus.read(0xA11100, Size::Byte), 1);

    bus.write(0xA11200, 0x01, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA11100, Size::Byte), 0);

    bus.write(0xA11100, 0xFEFF, Size::Word).unwrap();
    assert!(!bus.arbiter().co_cpu_bus_requested());
    assert_eq!(bus.read(0xA11100, Size::Byte), 1);

    bus.write(0xA11100, 0x01, Size::Byte).unwrap();
    assert!(bus.arbiter().co_cpu_bus_requested());
    bus.write(0xA11100, 0x00, Size::Byte).unwrap();
    assert!(!bus.arbiter().co_cpu_bus_requested());

    // Unexpected values leave the request alone
    bus.write(0xA11100, 0x42, Size::Byte).unwrap();
    assert!(!bus.arbiter().co_cpu_bus_requested());
}

#[test]
fn co_cpu_reset_register() {
    let (mut bus, _vdp, sound) = bus_with_fakes();

    grant_co_cpu_bus(&mut bus);
    assert!(!bus.arbiter().co_cpu_reset());

    bus.write(0xA11200, 0x0000, Size::Word).unwrap();
    assert!(bus.arbiter().co_cpu_reset());
    assert!(bus.arbiter_mut().take_co_cpu_reset_request());
    assert!(!bus.arbiter_mut().take_co_cpu_reset_request());
    assert_eq!(sound.0.borrow().fm_resets, 1);

    // Release reset and the bus; reset is then ignored
    bus.write(0xA11200, 0x0100, Size::Word).unwrap();
    bus.write(0xA11100, 0x0000, Size::Word).unwrap();
    bus.write(0xA11200, 0x0000, Size::Word).unwrap();
    assert!(!bus.arbiter().co_cpu_reset());
    assert!(!bus.arbiter_mut().take_co_cpu_reset_request());
    assert_eq!(sound.0.borrow().fm_resets, 1);
    assert!(bus.arbiter().is_co_cpu_running());
}

#[test]
fn version_register() {
    let mut bus = test_bus();
    assert_eq!(bus.read(0xA10001, Size::Byte), 0xA0);
    assert_eq!(bus.read(0xA10000, Size::Byte), 0xA0);
    assert_eq!(bus.read(0xA10000, Size::Word), 0xA0A0);
    assert_eq!(bus.read(0xA10000, Size::Long) >> 16, 0xA0A0);
}

#[test]
fn joypad_registers() {
    let mut bus = test_bus();

    bus.write(0xA10009, 0x40, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA10009, Size::Byte), 0x40);

    bus.write(0xA10003, 0x40, Size::Byte).unwrap();
    assert_eq!(bus.read(0xA10003, Size::Byte), 0x7F);
    assert_eq!(bus.read(0xA10002, Size::Word), 0x7F7F);

    assert_eq!(bus.read(0xA10007, Size::Byte), 0x3F);
    assert_eq!(bus.read(0xA1000F, Size::Byte), 0xFF);
    assert_eq!(bus.read(0xA10013, Size::Byte), 0x00);
}

#[test]
fn bank_select_applies_to_later_reads() {
    let mut bus = bus_with_rom(test_rom(0x100000));

    let before = bus.read(0x081000, Size::Word);
    bus.write(0xA130F3, 0x00, Size::Byte).unwrap();
    let after = bus.read(0x081000, Size::Word);

    assert_eq!(before, 0x0000);
    assert_eq!(after, 0x1234);
    assert!(matches!(bus.cartridge().mapper(), BankMapper::Paged(_)));
}

#[test]
fn vdp_writes_deferred_while_busy() {
    let (mut bus, vdp, _sound) = bus_with_fakes();
    vdp.0.borrow_mut().busy = VdpBusyState::FifoFull;

    bus.write(0xC00000, 0x1111, Size::Word).unwrap();
    bus.write(0xC00004, 0x22, Size::Byte).unwrap();
    bus.write(0xC00000, 0x3333_4444, Size::Long).unwrap();
    assert!(vdp.0.borrow().writes.is_empty());
    assert_eq!(bus.arbiter().deferred_write_count(), 3);

    // Not busy anymore, but later writes still queue behind the earlier ones
    vdp.0.borrow_mut().busy = VdpBusyState::NotBusy;
    bus.write(0xC00004, 0x5555, Size::Word).unwrap();
    assert!(vdp.0.borrow().writes.is_empty());

    bus.drain_deferred_writes().unwrap();
    assert_eq!(
        vdp.0.borrow().writes,
        vec![
            (VdpPort::Data, 0x1111),
            (VdpPort::Control, 0x2222),
            (VdpPort::Data, 0x3333),
            (VdpPort::Data, 0x4444),
            (VdpPort::Control, 0x5555),
        ]
    );
    assert_eq!(bus.arbiter().deferred_write_count(), 0);
    assert_eq!(bus.arbiter().redeferred_write_count(), 0);
}

#[test]
fn long_vdp_write_defers_its_second_half() {
    let (mut bus, vdp, _sound) = bus_with_fakes();
    vdp.0.borrow_mut().busy_after_writes = Some(1);

    bus.write(0xC00000, 0x3333_4444, Size::Long).unwrap();
    assert_eq!(vdp.0.borrow().writes, vec![(VdpPort::Data, 0x3333)]);
    assert_eq!(
        bus.arbiter_mut().next_deferred_write(),
        Some(DeferredWrite { address: 0xC00000, value: 0x4444, size: Size::Word })
    );
}

#[test]
fn tick_vdp_replays_deferred_writes_once_ready() {
    let (mut bus, vdp, _sound) = bus_with_fakes();
    vdp.0.borrow_mut().busy = VdpBusyState::MemToVram;

    bus.write(0xC00004, 0x8F02, Size::Word).unwrap();
    bus.tick_vdp().unwrap();
    assert!(vdp.0.borrow().writes.is_empty());
    assert!(!bus.arbiter().is_main_cpu_running());

    vdp.0.borrow_mut().busy = VdpBusyState::NotBusy;
    bus.tick_vdp().unwrap();
    assert_eq!(vdp.0.borrow().writes, vec![(VdpPort::Control, 0x8F02)]);
    assert!(bus.arbiter().is_main_cpu_running());
}

#[test]
fn vdp_port_and_hv_counter_reads() {
    let (mut bus, vdp, _sound) = bus_with_fakes();
    {
        let mut state = vdp.0.borrow_mut();
        state.data_port = 0xABCD;
        state.status = 0x3608;
        state.v_counter = 0x12;
        state.h_counter = 0x34;
    }

    assert_eq!(bus.read(0xC00000, Size::Word), 0xABCD);
    assert_eq!(bus.read(0xC00000, Size::Byte), 0xAB);
    assert_eq!(bus.read(0xC00003, Size::Byte), 0xCD);
    assert_eq!(bus.read(0xC00000, Size::Long), 0xABCD_ABCD);
    assert_eq!(bus.read(0xC00004, Size::Word), 0x3608);
    assert_eq!(bus.read(0xC00005, Size::Byte), 0x08);

    assert_eq!(bus.read(0xC00008, Size::Word), 0x1234);
    assert_eq!(bus.read(0xC00008, Size::Byte), 0x12);
    assert_eq!(bus.read(0xC00009, Size::Byte), 0x34);
    assert_eq!(bus.read(0xC0000C, Size::Long), 0);

    assert_eq!(bus.read(0xC0001C, Size::Word), 0);
    assert_eq!(bus.read(0xC00018, Size::Word), 0);
}

#[test]
fn vdp_byte_writes_are_mirrored() {
    let (mut bus, vdp, _sound) = bus_with_fakes();
    bus.write(0xC00001, 0x81, Size::Byte).unwrap();
    assert_eq!(vdp.0.borrow().writes, vec![(VdpPort::Data, 0x8181)]);
}

#[test]
fn psg_writes() {
    let (mut bus, vdp, sound) = bus_with_fakes();
    bus.write(0xC00011, 0x9F, Size::Byte).unwrap();
    bus.write(0xC00010, 0xBF, Size::Word).unwrap();
    bus.write(0xC00008, 0xFFFF, Size::Word).unwrap();

    assert_eq!(sound.0.borrow().psg_writes, vec![0x9F, 0xBF]);
    assert!(vdp.0.borrow().writes.is_empty());
}

#[test]
fn co_cpu_audio_ram_and_fm() {
    let (mut bus, _vdp, sound) = bus_with_fakes();
    sound.0.borrow_mut().fm_status = 0x80;

    let mut co_bus = bus.co_cpu_bus();
    co_bus.write_memory(0x0010, 0x05);
    assert_eq!(co_bus.read_memory(0x2010), 0x05);
    co_bus.write_memory(0x4001, 0x2B);
    co_bus.write_memory(0x5FFE, 0x80);
    assert_eq!(co_bus.read_memory(0x4000), 0x80);
    assert_eq!(co_bus.read_memory(0x6000), 0xFF);
    assert_eq!(co_bus.read_memory(0x7F20), 0xFF);
    assert_eq!(co_bus.read_io(0x00), 0xFF);
    co_bus.finish().unwrap();

    assert_eq!(sound.0.borrow().fm_writes, vec![(1, 0x2B), (2, 0x80)]);
}

#[test]
fn co_cpu_reaches_vdp_ports() {
    let (mut bus, vdp, sound) = bus_with_fakes();
    vdp.0.borrow_mut().status = 0x3488;
    vdp.0.borrow_mut().co_cpu_interrupt = true;

    let mut co_bus = bus.co_cpu_bus();
    co_bus.write_memory(0x7F11, 0x9F);
    co_bus.write_memory(0x7F04, 0x8F);
    assert_eq!(co_bus.read_memory(0x7F04), 0x34);
    assert_eq!(co_bus.read_memory(0x7F05), 0x88);
    assert!(co_bus.interrupt_line());
    co_bus.finish().unwrap();

    assert_eq!(sound.0.borrow().psg_writes, vec![0x9F]);
    assert_eq!(vdp.0.borrow().writes, vec![(VdpPort::Control, 0x8F8F)]);
}

#[test]
fn co_cpu_bank_window() {
    let mut bus = test_bus();

    // Bank 0 maps ROM
    assert_eq!(bus.co_cpu_bus().read_memory(0x9000), 0x12);
    assert_eq!(bus.arbiter_mut().take_cycle_penalty(CpuKind::Main), 11);
    assert_eq!(bus.arbiter_mut().take_cycle_penalty(CpuKind::Co), 3);

    load_co_cpu_bank(&mut bus, 0xFF0000 >> 15);
    assert_eq!(bus.co_cpu_bank().bank(), 0x1FE);

    let mut co_bus = bus.co_cpu_bus();
    co_bus.write_memory(0x8010, 0x77);
    co_bus.finish().unwrap();
    assert_eq!(bus.read(0xFF0010, Size::Byte), 0x77);
}

#[test]
fn co_cpu_bank_cannot_reach_its_own_memory() {
    let mut bus = test_bus();
    bus.memory.write_audio_ram(0x0000, 0x42);

    load_co_cpu_bank(&mut bus, 0xA00000 >> 15);
    let mut co_bus = bus.co_cpu_bus();
    assert_eq!(co_bus.read_memory(0x8000), 0xFF);
    co_bus.write_memory(0x8000, 0x00);
    co_bus.finish().unwrap();

    assert_eq!(bus.memory().read_audio_ram(0x0000), 0x42);
}

#[test]
fn co_cpu_bus_holds_the_first_error() {
    let mut bus = test_bus();
    load_co_cpu_bank(&mut bus, 0xC00000 >> 15);

    let mut co_bus = bus.co_cpu_bus();
    co_bus.write_memory(0x8020, 0x01);
    co_bus.write_memory(0x8040, 0x02);
    assert!(matches!(
        co_bus.finish(),
        Err(BusError::InvalidVdpWrite { address: 0xC00020, value: 0x01, size: Size::Byte })
    ));
}

#[test]
fn memory_to_vram_dma_reads_main_ram() {
    let mut bus = test_bus();
    bus.write(0xFF0000, 0xCAFE_BEEF, Size::Long).unwrap();

    for register in [0x8114, 0x8F02, 0x9302, 0x9400, 0x9500, 0x9680, 0x977F] {
        bus.write(0xC00004, register, Size::Word).unwrap();
    }
    bus.write(0xC00004, 0x4000_0080, Size::Long).unwrap();
    assert_eq!(bus.vdp().busy_state(), VdpBusyState::MemToVram);

    while bus.vdp().busy_state() != VdpBusyState::NotBusy {
        bus.tick_vdp().unwrap();
    }
    assert!(bus.arbiter().is_main_cpu_running());

    bus.write(0xC00004, 0x0000_0000, Size::Long).unwrap();
    assert_eq!(bus.read(0xC00000, Size::Word), 0xCAFE);
    assert_eq!(bus.read(0xC00000, Size::Word), 0xBEEF);
}

#[test]
fn reset_restores_power_on_ownership() {
    let mut bus = test_bus();
    grant_co_cpu_bus(&mut bus);
    load_co_cpu_bank(&mut bus, 0x1FF);
    bus.write(0xFF0000, 0x1234, Size::Word).unwrap();

    bus.reset();

    assert!(!bus.arbiter().co_cpu_bus_requested());
    assert!(bus.arbiter().co_cpu_reset());
    assert_eq!(bus.co_cpu_bank().bank(), 0);
    assert_eq!(bus.read(0xFF0000, Size::Word), 0x1234);
}
