use super::*;
use test_log::test;

const H32_SLOTS_PER_LINE: u32 = 171;

struct AddressEcho;

impl DmaSource for AddressEcho {
    fn read_word(&self, address: u32) -> u16 {
        address as u16
    }
}

fn new_vdp() -> Vdp {
    Vdp::new(TimingMode::Ntsc)
}

fn tick_lines(vdp: &mut Vdp, lines: u32) -> VdpTickEffect {
    let mut effect = VdpTickEffect::None;
    for _ in 0..lines * H32_SLOTS_PER_LINE {
        if vdp.tick(&AddressEcho) == VdpTickEffect::FrameComplete {
            effect = VdpTickEffect::FrameComplete;
        }
    }
    effect
}

fn set_address(vdp: &mut Vdp, code: u8, address: u16) {
    let code = u16::from(code);
    vdp.write_control(((code & 0x03) << 14) | (address & 0x3FFF));
    vdp.write_control(((code & 0x3C) << 2) | (address >> 14));
}

#[test]
fn register_writes() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8F02);
    vdp.write_control(0x8174);
    vdp.write_control(0x8C81);

    assert_eq!(vdp.registers().data_port_auto_increment, 2);
    assert!(vdp.registers().display_enabled);
    assert!(vdp.registers().v_interrupt_enabled);
    assert!(vdp.registers().dma_enabled);
    assert_eq!(vdp.registers().horizontal_display_size, HorizontalDisplaySize::FortyCell);
    assert_eq!(vdp.registers().raw(15), 0x02);
}

#[test]
fn vram_write_then_read() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8F02);

    set_address(&mut vdp, 0x01, 0x0400);
    vdp.write_data(0x1234);
    vdp.write_data(0x5678);
    assert_eq!(vdp.data_address(), 0x0404);

    set_address(&mut vdp, 0x00, 0x0400);
    assert_eq!(vdp.read_data(), 0x1234);
    assert_eq!(vdp.read_data(), 0x5678);
}

#[test]
fn cram_and_vsram_write_then_read() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8F02);

    set_address(&mut vdp, 0x03, 0x0010);
    vdp.write_data(0x0EEE);
    set_address(&mut vdp, 0x05, 0x0004);
    vdp.write_data(0x0123);

    set_address(&mut vdp, 0x08, 0x0010);
    assert_eq!(vdp.read_data(), 0x0EEE);
    set_address(&mut vdp, 0x04, 0x0004);
    assert_eq!(vdp.read_data(), 0x0123);
}

#[test]
fn data_port_read_in_write_mode_returns_all_ones() {
    let mut vdp = new_vdp();
    set_address(&mut vdp, 0x01, 0x0000);
    assert_eq!(vdp.read_data(), 0xFFFF);
}

#[test]
fn status_register_reports_fifo_and_blanking() {
    let mut vdp = new_vdp();

    // Display disabled reads as VBlank
    assert_eq!(vdp.read_status(), 0x0208);

    set_address(&mut vdp, 0x01, 0x0000);
    for _ in 0..4 {
        vdp.write_data(0);
    }
    assert_eq!(vdp.read_status() & 0x0300, 0x0100);
    assert_eq!(vdp.busy_state(), VdpBusyState::FifoFull);

    let pal = Vdp::new(TimingMode::Pal).read_status();
    assert_eq!(pal & 0x0001, 0x0001);
}

#[test]
fn v_interrupt_and_co_cpu_interrupt_at_vblank_start() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8160);

    tick_lines(&mut vdp, 223);
    assert_eq!(vdp.interrupt_level(), 0);
    assert!(!vdp.co_cpu_interrupt());

    tick_lines(&mut vdp, 1);
    assert_eq!(vdp.scanline(), 224);
    assert_eq!(vdp.interrupt_level(), 6);
    assert!(vdp.co_cpu_interrupt());
    assert_eq!(vdp.read_status() & 0x0080, 0x0080);

    vdp.acknowledge_interrupt();
    assert_eq!(vdp.interrupt_level(), 0);

    tick_lines(&mut vdp, 1);
    assert!(!vdp.co_cpu_interrupt());
}

#[test]
fn h_interrupt_follows_line_counter() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8010);
    vdp.write_control(0x8A02);

    tick_lines(&mut vdp, 1);
    assert_eq!(vdp.interrupt_level(), 4);
    vdp.acknowledge_interrupt();

    tick_lines(&mut vdp, 2);
    assert_eq!(vdp.interrupt_level(), 0);

    tick_lines(&mut vdp, 1);
    assert_eq!(vdp.interrupt_level(), 4);
}

#[test]
fn frame_completes_after_all_scanlines() {
    let mut vdp = new_vdp();
    assert_eq!(tick_lines(&mut vdp, 261), VdpTickEffect::None);
    assert_eq!(tick_lines(&mut vdp, 1), VdpTickEffect::FrameComplete);
    assert_eq!(vdp.scanline(), 0);

    let mut pal = Vdp::new(TimingMode::Pal);
    assert_eq!(tick_lines(&mut pal, 312), VdpTickEffect::None);
    assert_eq!(tick_lines(&mut pal, 1), VdpTickEffect::FrameComplete);
}

#[test]
fn h40_slots_add_up_to_one_line() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8C81);

    let mut mclk = 0;
    for _ in 0..210 {
        mclk += vdp.slot_mclk_cycles();
        vdp.tick(&AddressEcho);
    }
    assert_eq!(mclk, MCLK_CYCLES_PER_SCANLINE);
    assert_eq!(vdp.scanline(), 1);
}

#[test]
fn hv_counter() {
    let mut vdp = new_vdp();
    for _ in 0..10 {
        vdp.tick(&AddressEcho);
    }
    assert_eq!(vdp.hv_counter(), 0x000A);
    assert_eq!(vdp.h_counter(), 0x0A);
    assert_eq!(vdp.v_counter(), 0x00);

    // H32 counter jumps from $93 to $E9
    for _ in 10..0x94 {
        vdp.tick(&AddressEcho);
    }
    assert_eq!(vdp.h_counter(), 0xE9);
    // V counter already reads the next line during HBlank
    assert_eq!(vdp.v_counter(), 0x01);

    // Latched while the HV counter is stopped
    vdp.write_control(0x8002);
    let latched = vdp.hv_counter();
    vdp.tick(&AddressEcho);
    assert_eq!(vdp.hv_counter(), latched);
    vdp.write_control(0x8000);
    assert_ne!(vdp.hv_counter(), latched);
}

#[test]
fn fill_dma_through_ports() {
    let mut vdp = new_vdp();
    // DMA enabled, display disabled
    vdp.write_control(0x8114);
    vdp.write_control(0x8F01);
    vdp.write_control(0x9304);
    vdp.write_control(0x9400);
    vdp.write_control(0x9780);

    set_address(&mut vdp, 0x21, 0x0100);
    assert!(vdp.engine().is_dma_busy());
    assert_eq!(vdp.read_status() & 0x0002, 0x0002);

    vdp.write_data(0xAB12);
    while vdp.engine().is_dma_busy() {
        vdp.tick(&AddressEcho);
    }

    let vram: Vec<u8> = (0x100..0x106).map(|a| vdp.memory().read_vram_byte(a)).collect();
    assert_eq!(vram, vec![0xAB, 0x12, 0xAB, 0xAB, 0x00, 0xAB]);
    assert_eq!(vdp.registers().dma_length, 0);
}

// Slots from the fill-starting data port write until the fill completes, starting at the top of
// the frame in H32
fn fill_slots(display_enabled: bool, length: u16) -> u32 {
    let mut vdp = new_vdp();
    vdp.write_control(if display_enabled { 0x8154 } else { 0x8114 });
    vdp.write_control(0x8F01);
    vdp.write_control(0x9300 | (length & 0xFF));
    vdp.write_control(0x9400 | (length >> 8));
    vdp.write_control(0x9780);
    set_address(&mut vdp, 0x21, 0x0000);
    vdp.write_data(0xAB00);

    let mut slots = 0;
    while vdp.engine().is_dma_busy() {
        vdp.tick(&AddressEcho);
        slots += 1;
    }
    slots
}

#[test]
fn blanked_fill_costs_length_plus_refresh_slots() {
    // Every count includes the two slots that commit the data port write into VRAM. Refresh slots
    // sit at 25, 57, 89, 121 and 153 in each H32 line
    assert_eq!(fill_slots(false, 100), 102 + 3);
    assert_eq!(fill_slots(false, 166), 168 + 5);
    assert_eq!(fill_slots(false, 300), 302 + 9);
}

#[test]
fn active_display_fill_is_slower_than_blanked_fill() {
    // 16 access slots per active H32 line; the 16th is slot 157
    assert_eq!(fill_slots(true, 14), 158);
    assert!(fill_slots(true, 15) > H32_SLOTS_PER_LINE);

    // Six full lines of 16, then six more slots ending on slot 49 of the seventh line
    assert_eq!(fill_slots(true, 100), 6 * H32_SLOTS_PER_LINE + 50);
    assert!(fill_slots(true, 100) > fill_slots(false, 100));
}

#[test]
fn slots_available_follow_display_and_resolution() {
    let mut vdp = new_vdp();
    assert_eq!(vdp.slots_available_this_line(), 166);

    vdp.write_control(0x8140);
    assert_eq!(vdp.slots_available_this_line(), 16);
    vdp.write_control(0x8C81);
    assert_eq!(vdp.slots_available_this_line(), 18);
    vdp.write_control(0x8C00);

    // VBlank lines are blanked even with the display on
    tick_lines(&mut vdp, 224);
    assert_eq!(vdp.scanline(), 224);
    assert_eq!(vdp.slots_available_this_line(), 166);

    vdp.write_control(0x8C81);
    assert_eq!(vdp.slots_available_this_line(), 204);
}

#[test]
fn memory_to_vram_dma_through_ports() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8114);
    vdp.write_control(0x8F02);
    vdp.write_control(0x9302);
    vdp.write_control(0x9400);
    vdp.write_control(0x9500);
    vdp.write_control(0x9608);
    vdp.write_control(0x9700);
    assert_eq!(vdp.registers().dma_source_address, 0x1000);

    set_address(&mut vdp, 0x21, 0x0000);
    assert_eq!(vdp.busy_state(), VdpBusyState::MemToVram);

    while vdp.busy_state() != VdpBusyState::NotBusy {
        vdp.tick(&AddressEcho);
    }
    assert_eq!(vdp.registers().dma_source_address, 0x1004);

    set_address(&mut vdp, 0x00, 0x0000);
    assert_eq!(vdp.read_data(), 0x1000);
    assert_eq!(vdp.read_data(), 0x1002);
}

#[test]
fn dma_ignored_while_disabled() {
    let mut vdp = new_vdp();
    vdp.write_control(0x9304);
    vdp.write_control(0x9780);

    set_address(&mut vdp, 0x21, 0x0000);
    assert!(!vdp.engine().is_dma_busy());
}

#[test]
fn status_read_cancels_pending_command_half() {
    let mut vdp = new_vdp();
    vdp.write_control(0x8F02);

    // First half only, then a status read; the next word is a register write again
    vdp.write_control(0x4400);
    let _ = vdp.read_status();
    vdp.write_control(0x8F04);
    assert_eq!(vdp.registers().data_port_auto_increment, 4);

    // Without the status read the register-shaped word completes the command instead
    vdp.write_control(0x4400);
    vdp.write_control(0x8F06);
    assert_eq!(vdp.registers().data_port_auto_increment, 4);
    assert_eq!(vdp.data_address() & 0x3FFF, 0x0400);
}
