use super::*;
use crate::cartridge::header::tests::rom_with_header;
use megadrive_config::HostOverrides;
use std::convert::Infallible;
use test_log::test;

#[derive(Debug, Default)]
struct LastSave(Option<(String, Vec<u8>)>);

impl SaveWriter for LastSave {
    type Err = Infallible;

    fn load_bytes(&mut self, _extension: &str) -> Result<Vec<u8>, Self::Err> {
        Ok(vec![])
    }

    fn persist_bytes(&mut self, extension: &str, bytes: &[u8]) -> Result<(), Self::Err> {
        self.0 = Some((extension.into(), bytes.to_vec()));
        Ok(())
    }
}

fn rom_with_sram(start: u32, end: u32) -> Vec<u8> {
    rom_with_header(0x1000, |rom| {
        rom[0x1B0..0x1B4].copy_from_slice(&[b'R', b'A', 0xF8, 0x20]);
        rom[0x1B4..0x1B8].copy_from_slice(&start.to_be_bytes());
        rom[0x1B8..0x1BC].copy_from_slice(&end.to_be_bytes());
    })
}

fn load(bytes: Vec<u8>) -> (Cartridge, Rom) {
    let header = CartridgeHeader::parse(&bytes).unwrap();
    let config = header.bus_config(HostOverrides::default());
    (Cartridge::new(header, config, None), Rom::new(bytes))
}

#[test]
fn backup_window_follows_session_config() {
    let (mut cartridge, rom) = load(rom_with_sram(0x200001, 0x203FFF));

    cartridge.write(0x200001, 0x42, Size::Byte);
    assert_eq!(cartridge.read(0x200001, Size::Byte, &rom), 0x42);

    // Outside the declared window the write goes to ROM and is dropped
    cartridge.write(0x204001, 0x99, Size::Byte);
    assert_eq!(cartridge.read(0x204001, Size::Byte, &rom), 0x00);
}

#[test]
fn config_window_overrides_header_window() {
    let bytes = rom_with_sram(0x200001, 0x203FFF);
    let header = CartridgeHeader::parse(&bytes).unwrap();
    let config = BusConfig { sram_end: 0x20FFFF, ..header.bus_config(HostOverrides::default()) };
    let mut cartridge = Cartridge::new(header, config, None);
    let rom = Rom::new(bytes);

    cartridge.write(0x204001, 0x99, Size::Byte);
    assert_eq!(cartridge.read(0x204001, Size::Byte, &rom), 0x99);
}

#[test]
fn broken_header_enables_sram_past_rom_end() {
    let (mut cartridge, rom) = load(rom_with_header(0x1000, |_| {}));
    assert_eq!(cartridge.mapper, BankMapper::Linear);

    // Inside the ROM mirror range nothing changes
    cartridge.read(0x100000, Size::Byte, &rom);
    assert_eq!(cartridge.mapper, BankMapper::Linear);

    cartridge.write(0x200001, 0x5A, Size::Byte);
    assert_eq!(
        cartridge.mapper,
        BankMapper::Backup { pages: None, mode: SramMode::ReadWrite }
    );
    assert_eq!(cartridge.read(0x200001, Size::Byte, &rom), 0x5A);

    let mut save = LastSave::default();
    cartridge.close_session(&mut save).unwrap();
    let (extension, bytes) = save.0.unwrap();
    assert_eq!(extension, "sram");
    assert_eq!(bytes[1], 0x5A);
}

#[test]
fn reset_keeps_backup_contents() {
    let (mut cartridge, rom) = load(rom_with_sram(0x200001, 0x20FFFF));

    cartridge.write(0x200003, 0x77, Size::Byte);
    cartridge.write_bank_select(0xA130F1, 0x00);
    assert_eq!(cartridge.read(0x200003, Size::Byte, &rom), 0x00);

    cartridge.reset();
    assert_eq!(cartridge.read(0x200003, Size::Byte, &rom), 0x77);
}
