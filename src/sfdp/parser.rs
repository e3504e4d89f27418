//! Discovery-table reading and decoding
//!
//! The parser walks the SFDP header and parameter headers to locate the
//! Basic Parameters and Sector Map sub-tables, then decodes the Basic
//! Parameters bytes into the negotiated capabilities: density, page size,
//! erase palette, best read mode, quad-enable procedure, QPI entry
//! sequence, 4-byte addressing protocol and soft-reset protocol.

use crate::error::{Error, Result};
use crate::geometry::{EraseType, EraseTypes};
use crate::spi::{opcodes, AddressSize, BusFormat, BusWidth, QspiBus};

use super::types::*;

/// The discovery read instruction always uses 8 dummy cycles
pub const RSFDP_DUMMY_CYCLES: u8 = 8;

// Byte offsets within the Basic Parameters table
const FAST_READ_SUPPORT_BYTE: usize = 2;
const QPI_READ_SUPPORT_BYTE: usize = 16;
const READ_INST_444_BYTE: usize = 27;
const READ_INST_144_BYTE: usize = 9;
const READ_INST_114_BYTE: usize = 11;
const READ_INST_222_BYTE: usize = 23;
const READ_INST_122_BYTE: usize = 15;
const READ_INST_112_BYTE: usize = 13;
const PAGE_SIZE_BYTE: usize = 40;
const QER_BYTE: usize = 58;
const QPI_EN_SEQ_BYTE: usize = 56;
const ERASE_TYPE_1_SIZE_BYTE: usize = 28;
const LEGACY_4K_ERASE_BYTE: usize = 1;
const SOFT_RESET_BYTE: usize = 61;
const FOUR_BYTE_ADDR_BYTE: usize = 63;

/// Default program page size when the table does not specify one
const DEFAULT_PAGE_SIZE: u32 = 256;

/// Read from the discovery address space
///
/// The discovery read instruction is fixed by the standard: 1-1-1 bus,
/// 3-byte address, 8 dummy cycles, regardless of the negotiated mode. The
/// transport is restored to `restore` afterwards.
pub fn read_sfdp<B: QspiBus + ?Sized>(
    bus: &mut B,
    addr: u32,
    buf: &mut [u8],
    restore: &BusFormat,
) -> Result<()> {
    let format = BusFormat {
        dummy_and_mode_cycles: RSFDP_DUMMY_CYCLES,
        ..BusFormat::single(AddressSize::ThreeByte)
    };
    bus.configure_format(&format)
        .map_err(|_| Error::ParsingFailed)?;
    let result = bus.read(opcodes::RDSFDP, addr, buf);
    bus.configure_format(restore)
        .map_err(|_| Error::ParsingFailed)?;

    match result {
        Ok(n) if n == buf.len() => Ok(()),
        Ok(n) => {
            log::error!("Short discovery read: {} of {} bytes", n, buf.len());
            Err(Error::ParsingFailed)
        }
        Err(_) => {
            log::error!("Discovery read at 0x{:x} failed", addr);
            Err(Error::ParsingFailed)
        }
    }
}

/// Locations of the sub-tables the driver understands
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLocations {
    /// Basic Parameters sub-table: (address, length clamped to 64 bytes)
    pub basic: Option<(u32, usize)>,
    /// Sector Map sub-table: (address, length)
    pub sector_map: Option<(u32, usize)>,
}

/// Walk the SFDP header and parameter headers
pub fn parse_headers<B: QspiBus + ?Sized>(
    bus: &mut B,
    restore: &BusFormat,
) -> Result<TableLocations> {
    let mut bytes = [0u8; SFDP_HEADER_SIZE];
    read_sfdp(bus, 0, &mut bytes, restore)?;

    let header = SfdpHeader::parse(&bytes);
    if !header.is_valid() || header.major != 1 {
        log::error!("Invalid discovery table signature or major version");
        return Err(Error::ParsingFailed);
    }
    log::debug!(
        "SFDP revision {}.{}, {} parameter header(s)",
        header.major,
        header.minor,
        header.num_param_headers()
    );

    let mut locations = TableLocations::default();
    for i in 0..header.num_param_headers() {
        let addr = (SFDP_HEADER_SIZE + i * PARAM_HEADER_SIZE) as u32;
        let mut bytes = [0u8; PARAM_HEADER_SIZE];
        read_sfdp(bus, addr, &mut bytes, restore)?;
        let param = ParameterHeader::parse(&bytes);

        if param.major != 1 {
            log::error!("Parameter header {} has major version {}", i, param.major);
            return Err(Error::ParsingFailed);
        }

        if param.is_basic() {
            log::debug!("Basic Parameters table at 0x{:x}", param.table_pointer);
            locations.basic = Some((
                param.table_pointer,
                param.length_bytes().min(BASIC_TABLE_MAX_SIZE),
            ));
        } else if param.is_sector_map() {
            log::debug!("Sector Map table at 0x{:x}", param.table_pointer);
            locations.sector_map = Some((param.table_pointer, param.length_bytes()));
        } else {
            log::debug!("Skipping parameter table ID 0x{:04X}", param.id);
        }
    }

    Ok(locations)
}

/// Decode the device density from DWORD 2
///
/// The field stores `density_bits - 1`; bit 31 set means the part exceeds
/// 4 Gbit and is not supported.
pub fn decode_density(table: &[u8]) -> Result<u32> {
    if table.len() < 8 {
        return Err(Error::ParsingFailed);
    }
    if table[7] & 0x80 != 0 {
        log::error!("Device density beyond 4 Gbit is not supported");
        return Err(Error::ParsingFailed);
    }
    let density_bits = u32::from_le_bytes([table[4], table[5], table[6], table[7]]);
    let bytes = ((density_bits as u64) + 1) / 8;
    if bytes == 0 {
        log::error!("Device reports zero density");
        return Err(Error::ParsingFailed);
    }
    Ok(bytes as u32)
}

/// Decode the program page size (upper nibble of byte 40, as a power of
/// two); defaults to 256 on short tables
pub fn decode_page_size(table: &[u8]) -> u32 {
    if table.len() > PAGE_SIZE_BYTE {
        let exponent = table[PAGE_SIZE_BYTE] >> 4;
        let page_size = 1u32 << exponent;
        log::debug!("Detected page size: {}", page_size);
        page_size
    } else {
        log::debug!("Using default page size: {}", DEFAULT_PAGE_SIZE);
        DEFAULT_PAGE_SIZE
    }
}

/// Decode the soft-reset protocol from byte 61
pub fn decode_soft_reset(table: &[u8]) -> Result<SoftReset> {
    if table.len() <= SOFT_RESET_BYTE {
        return Err(Error::ParsingFailed);
    }
    let byte = table[SOFT_RESET_BYTE];
    // The bit requiring exit from 0-4-4 mode is ignored: the driver never
    // enters continuous read mode.
    if byte & 0x08 != 0 {
        Ok(SoftReset::ResetF0)
    } else if byte & 0x10 != 0 {
        Ok(SoftReset::EnableAndReset)
    } else {
        log::error!("No supported soft reset protocol");
        Err(Error::ParsingFailed)
    }
}

/// Decoded erase palette
#[derive(Debug, Clone, Copy, Default)]
pub struct EraseDecode {
    /// The up-to-four erase types, in table slot order
    pub types: [EraseType; 4],
    /// The 4 KiB erase instruction used as the single-region default
    pub erase_4k_instruction: u8,
    /// Bitmap of the valid slots
    pub supported: EraseTypes,
    /// Smallest valid erase granularity
    pub min_erase_size: u32,
}

/// Decode the erase types from DWORDs 8-9
///
/// Each slot is a `{size-exponent, instruction}` pair; a slot is valid iff
/// its size exceeds 2 bytes. When a 4096-byte type exists its instruction
/// supersedes the legacy 4 KiB instruction in byte 1.
pub fn decode_erase_types(table: &[u8]) -> EraseDecode {
    if table.len() <= LEGACY_4K_ERASE_BYTE {
        return EraseDecode::default();
    }
    let mut decode = EraseDecode {
        erase_4k_instruction: table[LEGACY_4K_ERASE_BYTE],
        ..Default::default()
    };
    let mut found_4k = false;

    if table.len() > ERASE_TYPE_1_SIZE_BYTE + 6 {
        for i in 0..4 {
            let erase_type = EraseType::from_raw(
                table[ERASE_TYPE_1_SIZE_BYTE + 2 * i],
                table[ERASE_TYPE_1_SIZE_BYTE + 2 * i + 1],
            );
            if erase_type.is_valid() {
                decode.supported |= EraseTypes::nth(i);
                if decode.min_erase_size == 0 || erase_type.size < decode.min_erase_size {
                    decode.min_erase_size = erase_type.size;
                }
                if erase_type.size == 4096 {
                    found_4k = true;
                    if erase_type.instruction != decode.erase_4k_instruction {
                        log::warn!(
                            "4K erase type instruction 0x{:02X} differs from legacy byte 0x{:02X}",
                            erase_type.instruction,
                            decode.erase_4k_instruction
                        );
                        decode.erase_4k_instruction = erase_type.instruction;
                    }
                }
                log::debug!(
                    "Erase type {}: inst 0x{:02X}, size {}",
                    i + 1,
                    erase_type.instruction,
                    erase_type.size
                );
            }
            decode.types[i] = erase_type;
        }
    }

    if !found_4k {
        log::warn!("No erase type of 4 KiB size");
    }
    decode
}

fn dummy_and_mode_cycles(byte: u8) -> u8 {
    // Upper 3 bits are mode clocks, lower 5 bits are dummy clocks
    (byte >> 5) + (byte & 0x1F)
}

/// Select the fastest read mode the part advertises
///
/// Preference order: 4-4-4, 1-4-4, 1-1-4, 2-2-2, 1-2-2, 1-1-2, then the
/// 1-1-1 legacy read. The 4-4-4 choice is terminal and configures all
/// three phases for quad lanes.
pub fn decode_read_mode(table: &[u8]) -> ReadMode {
    if table.len() <= READ_INST_122_BYTE {
        return ReadMode::default();
    }
    if table.len() > READ_INST_444_BYTE && table[QPI_READ_SUPPORT_BYTE] & 0x10 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_444_BYTE],
            instruction_width: BusWidth::Quad,
            address_width: BusWidth::Quad,
            data_width: BusWidth::Quad,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_444_BYTE - 1]),
            requires_quad_enable: true,
            enters_qpi: true,
        };
        log::debug!("Read bus mode 4-4-4, instruction 0x{:02X}", mode.instruction);
        return mode;
    }

    let support = table[FAST_READ_SUPPORT_BYTE];
    if support & 0x20 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_144_BYTE],
            instruction_width: BusWidth::Single,
            address_width: BusWidth::Quad,
            data_width: BusWidth::Quad,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_144_BYTE - 1]),
            requires_quad_enable: true,
            enters_qpi: false,
        };
        log::debug!("Read bus mode 1-4-4, instruction 0x{:02X}", mode.instruction);
        return mode;
    }
    if support & 0x40 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_114_BYTE],
            instruction_width: BusWidth::Single,
            address_width: BusWidth::Single,
            data_width: BusWidth::Quad,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_114_BYTE - 1]),
            requires_quad_enable: true,
            enters_qpi: false,
        };
        log::debug!("Read bus mode 1-1-4, instruction 0x{:02X}", mode.instruction);
        return mode;
    }
    if table.len() > READ_INST_222_BYTE && table[QPI_READ_SUPPORT_BYTE] & 0x01 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_222_BYTE],
            instruction_width: BusWidth::Dual,
            address_width: BusWidth::Dual,
            data_width: BusWidth::Dual,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_222_BYTE - 1]),
            requires_quad_enable: false,
            enters_qpi: false,
        };
        log::debug!("Read bus mode 2-2-2, instruction 0x{:02X}", mode.instruction);
        return mode;
    }
    if support & 0x10 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_122_BYTE],
            instruction_width: BusWidth::Single,
            address_width: BusWidth::Dual,
            data_width: BusWidth::Dual,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_122_BYTE - 1]),
            requires_quad_enable: false,
            enters_qpi: false,
        };
        log::debug!("Read bus mode 1-2-2, instruction 0x{:02X}", mode.instruction);
        return mode;
    }
    if support & 0x01 != 0 {
        let mode = ReadMode {
            instruction: table[READ_INST_112_BYTE],
            instruction_width: BusWidth::Single,
            address_width: BusWidth::Single,
            data_width: BusWidth::Dual,
            dummy_and_mode_cycles: dummy_and_mode_cycles(table[READ_INST_112_BYTE - 1]),
            requires_quad_enable: false,
            enters_qpi: false,
        };
        log::debug!("Read bus mode 1-1-2, instruction 0x{:02X}", mode.instruction);
        return mode;
    }

    log::debug!("Read bus mode 1-1-1");
    ReadMode::default()
}

/// Decode the quad-enable procedure (QER, byte 58 bits 4..6)
pub fn decode_quad_enable(table: &[u8]) -> QuadEnable {
    if table.len() > QER_BYTE {
        QuadEnable::from_qer((table[QER_BYTE] & 0x70) >> 4)
    } else {
        QuadEnable::None
    }
}

/// Decode the 4-4-4 enable sequence
///
/// The 5-bit field spans DWORD 15 bits 8:4: the upper nibble of byte 56
/// plus bit 0 of byte 57.
pub fn decode_qpi_enable(table: &[u8]) -> QpiEnable {
    if table.len() > QPI_EN_SEQ_BYTE + 1 {
        let value = ((table[QPI_EN_SEQ_BYTE] & 0xF0) >> 4) | ((table[QPI_EN_SEQ_BYTE + 1] & 0x01) << 4);
        QpiEnable::from_sequence(value)
    } else {
        QpiEnable::Unsupported(0)
    }
}

/// Decode the 4-byte addressing protocol (byte 63)
pub fn decode_four_byte_addressing(table: &[u8]) -> FourByteAddressing {
    if table.len() > FOUR_BYTE_ADDR_BYTE {
        FourByteAddressing::from_support_byte(table[FOUR_BYTE_ADDR_BYTE])
    } else {
        FourByteAddressing::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 16-DWORD basic table for an 8 MiB part: 1-1-4 read at 0x6B with
    /// 8 dummy cycles, erase types 4K/32K/64K, QER 1, 66/99 soft reset.
    fn canned_basic_table() -> [u8; 64] {
        let mut table = [0u8; 64];
        table[0] = 0xE5;
        table[1] = 0x20; // legacy 4K erase
        table[2] = 0x40; // 1-1-4 fast read supported
        // density: 64 Mbit, stored as bits - 1
        table[4..8].copy_from_slice(&0x03FF_FFFFu32.to_le_bytes());
        table[10] = 0x08; // 1-1-4: 8 dummy cycles, 0 mode clocks
        table[11] = 0x6B; // 1-1-4 read instruction
        // erase types
        table[28] = 0x0C;
        table[29] = 0x20;
        table[30] = 0x0F;
        table[31] = 0x52;
        table[32] = 0x10;
        table[33] = 0xD8;
        table[40] = 0x80; // page size 2^8 = 256
        table[58] = 0x10; // QER 1
        table[61] = 0x10; // soft reset via 66/99
        table
    }

    /// Mock bus serving a canned discovery address space
    struct MockSfdpBus {
        image: Vec<u8>,
        format: BusFormat,
    }

    impl MockSfdpBus {
        fn new(image: Vec<u8>) -> Self {
            Self {
                image,
                format: BusFormat::single(AddressSize::ThreeByte),
            }
        }
    }

    impl QspiBus for MockSfdpBus {
        fn configure_format(&mut self, format: &BusFormat) -> crate::Result<()> {
            self.format = *format;
            Ok(())
        }

        fn set_frequency(&mut self, _hz: u32) -> crate::Result<()> {
            Ok(())
        }

        fn command_transfer(
            &mut self,
            _instruction: u8,
            _address: Option<u32>,
            _tx: &[u8],
            rx: &mut [u8],
        ) -> crate::Result<()> {
            rx.fill(0);
            Ok(())
        }

        fn read(&mut self, instruction: u8, address: u32, buf: &mut [u8]) -> crate::Result<usize> {
            assert_eq!(instruction, opcodes::RDSFDP);
            assert_eq!(self.format.dummy_and_mode_cycles, RSFDP_DUMMY_CYCLES);
            assert_eq!(self.format.address_size, AddressSize::ThreeByte);
            let addr = address as usize;
            for (i, byte) in buf.iter_mut().enumerate() {
                *byte = self.image.get(addr + i).copied().unwrap_or(0xFF);
            }
            Ok(buf.len())
        }

        fn write(&mut self, _instruction: u8, _address: u32, _data: &[u8]) -> crate::Result<usize> {
            unreachable!("discovery parsing never writes");
        }

        fn delay_us(&mut self, _us: u32) {}
    }

    fn sfdp_image_with_sector_map() -> Vec<u8> {
        let mut image = vec![0xFFu8; 0x100];
        // SFDP header: two parameter headers
        image[0..4].copy_from_slice(b"SFDP");
        image[4] = 0x06;
        image[5] = 0x01;
        image[6] = 1;
        image[7] = 0xFF;
        // Basic Parameters header: 16 DWORDs at 0x30
        image[8..16].copy_from_slice(&[0x00, 0x06, 0x01, 0x10, 0x30, 0x00, 0x00, 0xFF]);
        // Sector Map header: 3 DWORDs at 0x80
        image[16..24].copy_from_slice(&[0x81, 0x00, 0x01, 0x03, 0x80, 0x00, 0x00, 0xFF]);
        image[0x30..0x70].copy_from_slice(&canned_basic_table());
        image
    }

    #[test]
    fn header_walk_finds_both_tables() {
        let mut bus = MockSfdpBus::new(sfdp_image_with_sector_map());
        let restore = BusFormat::single(AddressSize::ThreeByte);
        let locations = parse_headers(&mut bus, &restore).unwrap();

        assert_eq!(locations.basic, Some((0x30, 64)));
        assert_eq!(locations.sector_map, Some((0x80, 12)));
    }

    #[test]
    fn header_walk_rejects_bad_signature() {
        let mut image = sfdp_image_with_sector_map();
        image[0] = b'X';
        let mut bus = MockSfdpBus::new(image);
        let restore = BusFormat::single(AddressSize::ThreeByte);
        assert!(matches!(
            parse_headers(&mut bus, &restore),
            Err(Error::ParsingFailed)
        ));
    }

    #[test]
    fn header_walk_rejects_wrong_major_version() {
        let mut image = sfdp_image_with_sector_map();
        image[5] = 2;
        let mut bus = MockSfdpBus::new(image);
        let restore = BusFormat::single(AddressSize::ThreeByte);
        assert!(parse_headers(&mut bus, &restore).is_err());
    }

    #[test]
    fn basic_table_length_is_clamped() {
        let mut image = sfdp_image_with_sector_map();
        image[11] = 0x20; // 32 DWORDs = 128 bytes
        let mut bus = MockSfdpBus::new(image);
        let restore = BusFormat::single(AddressSize::ThreeByte);
        let locations = parse_headers(&mut bus, &restore).unwrap();
        assert_eq!(locations.basic, Some((0x30, 64)));
    }

    #[test]
    fn density_decoding() {
        let table = canned_basic_table();
        assert_eq!(decode_density(&table).unwrap(), 8 * 1024 * 1024);

        let mut dense = canned_basic_table();
        dense[7] |= 0x80; // > 4 Gbit
        assert_eq!(decode_density(&dense), Err(Error::ParsingFailed));
    }

    #[test]
    fn page_size_decoding() {
        let table = canned_basic_table();
        assert_eq!(decode_page_size(&table), 256);
        // Short tables fall back to the default
        assert_eq!(decode_page_size(&table[..36]), 256);

        let mut big_pages = canned_basic_table();
        big_pages[40] = 0x90;
        assert_eq!(decode_page_size(&big_pages), 512);
    }

    #[test]
    fn erase_type_decoding() {
        let decode = decode_erase_types(&canned_basic_table());
        assert_eq!(decode.types[0].size, 4096);
        assert_eq!(decode.types[0].instruction, 0x20);
        assert_eq!(decode.types[1].size, 32768);
        assert_eq!(decode.types[1].instruction, 0x52);
        assert_eq!(decode.types[2].size, 65536);
        assert_eq!(decode.types[2].instruction, 0xD8);
        assert!(!decode.types[3].is_valid());
        assert_eq!(
            decode.supported,
            EraseTypes::TYPE_1 | EraseTypes::TYPE_2 | EraseTypes::TYPE_3
        );
        assert_eq!(decode.min_erase_size, 4096);
        assert_eq!(decode.erase_4k_instruction, 0x20);
    }

    #[test]
    fn erase_type_supersedes_legacy_4k_instruction() {
        let mut table = canned_basic_table();
        table[1] = 0xAA; // legacy byte disagrees with the 4K erase type
        let decode = decode_erase_types(&table);
        assert_eq!(decode.erase_4k_instruction, 0x20);
    }

    #[test]
    fn read_mode_selection_1_1_4() {
        let mode = decode_read_mode(&canned_basic_table());
        assert_eq!(mode.instruction, 0x6B);
        assert_eq!(mode.instruction_width, BusWidth::Single);
        assert_eq!(mode.address_width, BusWidth::Single);
        assert_eq!(mode.data_width, BusWidth::Quad);
        assert_eq!(mode.dummy_and_mode_cycles, 8);
        assert!(mode.requires_quad_enable);
        assert!(!mode.enters_qpi);
    }

    #[test]
    fn read_mode_444_is_terminal_and_all_quad() {
        let mut table = canned_basic_table();
        table[16] = 0x10; // 4-4-4 supported
        table[26] = 0x46; // 2 mode clocks + 6 dummy cycles
        table[27] = 0xEB;
        let mode = decode_read_mode(&table);
        assert_eq!(mode.instruction, 0xEB);
        assert_eq!(mode.instruction_width, BusWidth::Quad);
        assert_eq!(mode.address_width, BusWidth::Quad);
        assert_eq!(mode.data_width, BusWidth::Quad);
        assert_eq!(mode.dummy_and_mode_cycles, 8);
        assert!(mode.requires_quad_enable);
        assert!(mode.enters_qpi);
    }

    #[test]
    fn read_mode_falls_back_to_legacy() {
        let mut table = canned_basic_table();
        table[2] = 0x00;
        let mode = decode_read_mode(&table);
        assert_eq!(mode.instruction, opcodes::READ);
        assert_eq!(mode.data_width, BusWidth::Single);
        assert_eq!(mode.dummy_and_mode_cycles, 0);
        assert!(!mode.requires_quad_enable);
    }

    #[test]
    fn read_mode_prefers_144_over_114() {
        let mut table = canned_basic_table();
        table[2] = 0x60; // both 1-4-4 and 1-1-4
        table[8] = 0x44; // 2 mode clocks + 4 dummy cycles
        table[9] = 0xEB;
        let mode = decode_read_mode(&table);
        assert_eq!(mode.instruction, 0xEB);
        assert_eq!(mode.address_width, BusWidth::Quad);
        assert_eq!(mode.dummy_and_mode_cycles, 6);
    }

    #[test]
    fn quad_enable_decoding() {
        assert_eq!(decode_quad_enable(&canned_basic_table()), QuadEnable::Sr2Bit1);

        let mut table = canned_basic_table();
        table[58] = 0x00;
        assert_eq!(decode_quad_enable(&table), QuadEnable::None);
        table[58] = 0x20;
        assert_eq!(decode_quad_enable(&table), QuadEnable::Sr1Bit6);
        table[58] = 0x30;
        assert_eq!(decode_quad_enable(&table), QuadEnable::Sr1Bit7);
        table[58] = 0x60;
        assert_eq!(decode_quad_enable(&table), QuadEnable::Unsupported(6));
    }

    #[test]
    fn qpi_enable_decoding() {
        let mut table = canned_basic_table();
        table[56] = 0x10;
        assert_eq!(decode_qpi_enable(&table), QpiEnable::Cmd38);
        table[56] = 0x40;
        assert_eq!(decode_qpi_enable(&table), QpiEnable::Cmd35);
        table[56] = 0x80;
        assert_eq!(decode_qpi_enable(&table), QpiEnable::SetConfigBit6);
        table[56] = 0x00;
        table[57] = 0x01;
        assert_eq!(decode_qpi_enable(&table), QpiEnable::ClearConfigBit7);
    }

    #[test]
    fn four_byte_addressing_decoding() {
        let mut table = canned_basic_table();
        assert_eq!(decode_four_byte_addressing(&table), FourByteAddressing::None);
        table[63] = 0x40;
        assert_eq!(decode_four_byte_addressing(&table), FourByteAddressing::Always);
        table[63] = 0x01;
        assert_eq!(
            decode_four_byte_addressing(&table),
            FourByteAddressing::InstructionB7
        );
        table[63] = 0x02;
        assert_eq!(
            decode_four_byte_addressing(&table),
            FourByteAddressing::WrenInstructionB7
        );
        table[63] = 0x10;
        assert_eq!(
            decode_four_byte_addressing(&table),
            FourByteAddressing::ConfigRegister
        );
        table[63] = 0x08;
        assert_eq!(
            decode_four_byte_addressing(&table),
            FourByteAddressing::BankRegister
        );
        table[63] = 0x04;
        assert_eq!(
            decode_four_byte_addressing(&table),
            FourByteAddressing::ExtendedAddressRegister
        );
        // The always-enabled bit wins over everything else
        table[63] = 0x44;
        assert_eq!(decode_four_byte_addressing(&table), FourByteAddressing::Always);
    }

    #[test]
    fn soft_reset_decoding() {
        assert_eq!(
            decode_soft_reset(&canned_basic_table()),
            Ok(SoftReset::EnableAndReset)
        );

        let mut table = canned_basic_table();
        table[61] = 0x08;
        assert_eq!(decode_soft_reset(&table), Ok(SoftReset::ResetF0));
        table[61] = 0x00;
        assert_eq!(decode_soft_reset(&table), Err(Error::ParsingFailed));
    }
}
