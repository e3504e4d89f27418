//! QSPI NOR flash block device
//!
//! One `QspifBlockDevice` owns one chip behind one chip-select. At `init`
//! the driver interrogates the part through its discovery table, negotiates
//! the fastest interoperable bus mode, enables quad / QPI / 4-byte
//! addressing as the table dictates, clears power-on block protection and
//! builds the erase geometry. Steady-state `read` / `program` / `erase`
//! then run through the negotiated command set, interleaved with the
//! write-enable and busy-poll protocol the part requires.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::geometry::Geometry;
use crate::protocol;
use crate::registry::{self, ChipSelect};
use crate::sfdp;
use crate::sfdp::types::{FourByteAddressing, QuadEnable, ReadMode};
use crate::spi::{opcodes, AddressSize, BusFormat, QspiBus};

/// SFDP-discovered QSPI NOR flash block device
///
/// All operations serialize on an internal per-device mutex; `init` and
/// `deinit` are reference counted, so nested init/deinit pairs are cheap.
pub struct QspifBlockDevice<B: QspiBus> {
    csel: ChipSelect,
    state: Mutex<DeviceState<B>>,
}

struct DeviceState<B> {
    bus: B,
    freq_hz: u32,
    init_ref_count: u32,
    is_initialized: bool,
    read_mode: ReadMode,
    program_instruction: u8,
    address_size: AddressSize,
    read_status2_instruction: u8,
    write_status2_instruction: Option<u8>,
    ext_addr_write_instruction: Option<u8>,
    geometry: Geometry,
}

impl<B: QspiBus> QspifBlockDevice<B> {
    /// Create a block device on the given transport and chip-select
    ///
    /// Reserves the chip-select in the process-wide registry; fails with
    /// [`Error::DeviceNotUnique`] or [`Error::DeviceMaxExceeded`] if another
    /// driver instance already claims it or the registry is full.
    pub fn new(bus: B, csel: ChipSelect, freq_hz: u32) -> Result<Self> {
        registry::add(csel)?;
        log::debug!("Adding a new QSPIF block device for {}", csel);
        Ok(Self {
            csel,
            state: Mutex::new(DeviceState {
                bus,
                freq_hz,
                init_ref_count: 0,
                is_initialized: false,
                read_mode: ReadMode::default(),
                program_instruction: opcodes::PP,
                address_size: AddressSize::ThreeByte,
                read_status2_instruction: opcodes::RDSR2,
                write_status2_instruction: None,
                ext_addr_write_instruction: None,
                geometry: Geometry::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState<B>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bring the device up
    ///
    /// Only the first of nested `init` calls does the work: soft reset,
    /// discovery-table parsing, bus-mode negotiation, 4-byte addressing and
    /// block-protection clearing. On failure the device stays
    /// uninitialized.
    pub fn init(&self) -> Result<()> {
        let mut state = self.lock();

        if !state.is_initialized {
            state.init_ref_count = 0;
        }
        state.init_ref_count += 1;
        if state.init_ref_count != 1 {
            return Ok(());
        }

        match state.init_device() {
            Ok(()) => {
                state.is_initialized = true;
                Ok(())
            }
            Err(e) => {
                state.init_ref_count = 0;
                Err(e)
            }
        }
    }

    /// Tear the device down
    ///
    /// Only the last of nested `deinit` calls disables writes and marks the
    /// device uninitialized; extra calls are no-ops.
    pub fn deinit(&self) -> Result<()> {
        let mut state = self.lock();

        if !state.is_initialized {
            state.init_ref_count = 0;
            return Ok(());
        }
        state.init_ref_count -= 1;
        if state.init_ref_count > 0 {
            return Ok(());
        }

        let result = protocol::write_disable(&mut state.bus);
        if result.is_err() {
            log::error!("Write disable failed");
        }
        state.is_initialized = false;
        result
    }

    /// Read `buf.len()` bytes starting at `addr`
    ///
    /// Uses the negotiated read bus profile and restores the transport to
    /// its 1-1-1 defaults afterwards. Reads do not alter device state, so
    /// no busy polling is involved.
    pub fn read(&self, buf: &mut [u8], addr: u32) -> Result<()> {
        let mut state = self.lock();
        state.check_initialized()?;
        log::debug!("Read inst: 0x{:02X}", state.read_mode.instruction);

        state.update_ext_addr_reg(addr)?;
        state.send_read_command(buf, addr)
    }

    /// Program `buf` starting at `addr`
    ///
    /// The request is split at page boundaries; each page is preceded by a
    /// write-enable and followed by a busy wait, as the part requires. A
    /// failed program must be treated as partially applied.
    pub fn program(&self, buf: &[u8], addr: u32) -> Result<()> {
        let mut state = self.lock();
        state.check_initialized()?;
        log::debug!("Program - addr: 0x{:x}, size: {}", addr, buf.len());

        let page_size = state.geometry.page_size() as usize;
        let mut offset = 0usize;
        let mut addr = addr;
        while offset < buf.len() {
            let in_page = addr as usize % page_size;
            let chunk = (page_size - in_page).min(buf.len() - offset);

            state.update_ext_addr_reg(addr)?;
            protocol::set_write_enable(&mut state.bus)?;
            state.send_program_command(&buf[offset..offset + chunk], addr)?;
            protocol::wait_ready(&mut state.bus)?;

            offset += chunk;
            addr += chunk as u32;
        }
        Ok(())
    }

    /// Erase `len` bytes starting at `addr`
    ///
    /// `addr` and `addr + len` must align to the erase granularity of the
    /// region they fall in. The range is decomposed into the largest erase
    /// types that divide the current address, fit the remainder and stay
    /// inside their region.
    pub fn erase(&self, addr: u32, len: u32) -> Result<()> {
        let mut state = self.lock();
        state.check_initialized()?;
        log::debug!("Erase - addr: 0x{:x}, size: 0x{:x}", addr, len);

        if len == 0 {
            return Ok(());
        }
        if (addr as u64) + (len as u64) > state.geometry.device_size() as u64 {
            log::error!("Erase exceeds flash device size");
            return Err(Error::InvalidEraseParams);
        }
        let start_granularity = state.geometry.erase_size_at(addr);
        let end_granularity = state.geometry.erase_size_at(addr + len - 1);
        if start_granularity == 0
            || end_granularity == 0
            || addr % start_granularity != 0
            || ((addr as u64) + (len as u64)) % end_granularity as u64 != 0
        {
            log::error!("Invalid erase - unaligned address or size");
            return Err(Error::InvalidEraseParams);
        }

        let mut region = match state.geometry.region_of(addr) {
            Some(region) => region,
            None => return Err(Error::InvalidEraseParams),
        };
        let mut bitmap = state.geometry.region(region).erase_types;
        let mut addr = addr;
        let mut remaining = len;

        while remaining > 0 {
            let boundary = state.geometry.region(region).high_boundary;
            let slot = match state
                .geometry
                .select_erase_type(&mut bitmap, addr, remaining, boundary)
            {
                Some(slot) => slot,
                None => {
                    log::error!("No erase type fits at 0x{:x}", addr);
                    return Err(Error::InvalidEraseParams);
                }
            };
            let erase_type = state.geometry.erase_type(slot);
            log::debug!(
                "Erase - addr: 0x{:x}, remaining: 0x{:x}, inst: 0x{:02X}, chunk: 0x{:x}",
                addr,
                remaining,
                erase_type.instruction,
                erase_type.size
            );

            state.update_ext_addr_reg(addr)?;
            protocol::set_write_enable(&mut state.bus)?;
            state.send_erase_command(erase_type.instruction, addr)?;

            addr += erase_type.size;
            remaining -= erase_type.size;
            if remaining > 0 && addr > state.geometry.region(region).high_boundary {
                region += 1;
                bitmap = state.geometry.region(region).erase_types;
            }

            protocol::wait_ready(&mut state.bus)?;
        }
        Ok(())
    }

    /// Device size in bytes
    pub fn size(&self) -> u32 {
        self.lock().geometry.device_size()
    }

    /// Minimum read size in bytes
    pub fn read_size(&self) -> usize {
        1
    }

    /// Minimum program size in bytes
    pub fn program_size(&self) -> usize {
        1
    }

    /// Smallest erase granularity supported by every region (0 if the
    /// regions share no erase type)
    pub fn erase_size(&self) -> u32 {
        self.lock().geometry.min_common_erase_size()
    }

    /// Erase granularity of the region containing `addr`
    pub fn erase_size_at(&self, addr: u32) -> u32 {
        self.lock().geometry.erase_size_at(addr)
    }

    /// The value erased memory reads back as
    pub fn erase_value(&self) -> u8 {
        0xFF
    }

    /// Block device type tag
    pub fn device_type(&self) -> &'static str {
        "QSPIF"
    }

    /// The chip-select identity this device is bound to
    pub fn chip_select(&self) -> ChipSelect {
        self.csel
    }
}

impl<B: QspiBus> Drop for QspifBlockDevice<B> {
    fn drop(&mut self) {
        registry::remove(self.csel);
    }
}

impl<B: QspiBus> DeviceState<B> {
    fn default_format(&self) -> BusFormat {
        BusFormat::single(self.address_size)
    }

    fn check_initialized(&self) -> Result<()> {
        if self.is_initialized {
            Ok(())
        } else {
            log::error!("Device not initialized");
            Err(Error::DeviceError)
        }
    }

    fn init_device(&mut self) -> Result<()> {
        // Negotiated state back to the 1-1-1 power-on defaults
        self.read_mode = ReadMode::default();
        self.program_instruction = opcodes::PP;
        self.address_size = AddressSize::ThreeByte;
        self.read_status2_instruction = opcodes::RDSR2;
        self.write_status2_instruction = None;
        self.ext_addr_write_instruction = None;

        let restore = self.default_format();
        self.bus.configure_format(&restore)?;
        self.bus.set_frequency(self.freq_hz)?;
        protocol::wait_ready(&mut self.bus)?;

        let locations = sfdp::parse_headers(&mut self.bus, &restore)?;
        let (basic_addr, basic_len) = match locations.basic {
            Some(basic) => basic,
            None => {
                log::error!("No Basic Parameters table found");
                return Err(Error::ParsingFailed);
            }
        };

        let mut table_buf = [0u8; sfdp::BASIC_TABLE_MAX_SIZE];
        let table = &mut table_buf[..basic_len];
        sfdp::read_sfdp(&mut self.bus, basic_addr, table, &restore)?;
        let table: &[u8] = table;

        let device_size = sfdp::decode_density(table)?;
        let page_size = sfdp::decode_page_size(table);

        let reset = sfdp::decode_soft_reset(table)?;
        protocol::soft_reset(&mut self.bus, reset)?;
        protocol::wait_ready(&mut self.bus)?;

        let erase = sfdp::decode_erase_types(table);

        let read_mode = sfdp::decode_read_mode(table);
        if read_mode.requires_quad_enable {
            self.apply_quad_enable(sfdp::decode_quad_enable(table))?;
            if read_mode.enters_qpi {
                log::debug!("Init - entering QPI mode");
                protocol::enter_qpi_mode(&mut self.bus, sfdp::decode_qpi_enable(table))?;
            }
        }
        self.read_mode = read_mode;

        self.apply_four_byte_addressing(sfdp::decode_four_byte_addressing(table))?;
        protocol::wait_ready(&mut self.bus)?;

        // Without a sector map the whole device is one region supporting
        // every discovered erase type
        let mut geometry = Geometry::uniform(
            device_size,
            page_size,
            erase.types,
            erase.supported,
            erase.min_erase_size,
        );
        if let Some((map_addr, map_len)) = locations.sector_map {
            log::debug!(
                "Init - parsing sector map table - addr: 0x{:x}, size: {}",
                map_addr,
                map_len
            );
            let restore = self.default_format();
            let mut map_buf = [0u8; sfdp::BASIC_TABLE_MAX_SIZE];
            let map_len = map_len.min(map_buf.len());
            let map = &mut map_buf[..map_len];
            sfdp::read_sfdp(&mut self.bus, map_addr, map, &restore)?;
            geometry.apply_sector_map(map)?;
        }
        self.geometry = geometry;

        self.clear_block_protection()?;
        Ok(())
    }

    fn apply_quad_enable(&mut self, quad_enable: QuadEnable) -> Result<()> {
        let setup: [u8; 2] = match quad_enable {
            QuadEnable::None => {
                log::debug!("Device has no QE bit, continuing on the read instruction");
                return Ok(());
            }
            QuadEnable::Sr2Bit1 => {
                log::debug!("Setting QE bit, bit 1 of status register 2");
                [0x00, 0x02]
            }
            QuadEnable::Sr1Bit6 => {
                log::debug!("Setting QE bit, bit 6 of status register 1");
                [0x40, 0x00]
            }
            QuadEnable::Sr1Bit7 => {
                log::debug!("Setting QE bit, bit 7 of status register 1");
                self.write_status2_instruction = Some(0x3E);
                self.read_status2_instruction = 0x3F;
                [0x80, 0x00]
            }
            QuadEnable::Unsupported(value) => {
                log::warn!("Unsupported QER configuration: {}", value);
                return Ok(());
            }
        };

        let mut registers =
            protocol::read_status_registers(&mut self.bus, self.read_status2_instruction)?;
        registers[0] |= setup[0];
        registers[1] |= setup[1];
        protocol::write_status_registers(&mut self.bus, self.write_status2_instruction, registers)?;
        protocol::wait_ready(&mut self.bus)?;

        let registers =
            protocol::read_status_registers(&mut self.bus, self.read_status2_instruction)?;
        if (registers[0] & setup[0]) | (registers[1] & setup[1]) == 0 {
            log::error!("Quad enable bit did not set");
            return Err(Error::DeviceError);
        }
        Ok(())
    }

    fn apply_four_byte_addressing(&mut self, mode: FourByteAddressing) -> Result<()> {
        match mode {
            FourByteAddressing::None => {
                log::debug!("4-byte addressing not supported, using 3-byte addresses");
            }
            FourByteAddressing::Always => {
                self.address_size = AddressSize::FourByte;
            }
            FourByteAddressing::InstructionB7 => {
                self.bus.command_transfer(opcodes::EN4B, None, &[], &mut [])?;
                self.address_size = AddressSize::FourByte;
            }
            FourByteAddressing::WrenInstructionB7 => {
                protocol::set_write_enable(&mut self.bus)?;
                self.bus.command_transfer(opcodes::EN4B, None, &[], &mut [])?;
                self.address_size = AddressSize::FourByte;
            }
            FourByteAddressing::ConfigRegister => {
                let mut config = [0u8; 1];
                self.bus
                    .command_transfer(opcodes::RDCR_B5, None, &[], &mut config)?;
                config[0] |= 0x01;
                protocol::set_write_enable(&mut self.bus)?;
                self.bus
                    .command_transfer(opcodes::WRCR_B1, None, &config, &mut [])?;
                self.address_size = AddressSize::FourByte;
            }
            FourByteAddressing::BankRegister => {
                self.bus
                    .command_transfer(opcodes::BRWR, None, &[0x80], &mut [])?;
                self.address_size = AddressSize::FourByte;
            }
            FourByteAddressing::ExtendedAddressRegister => {
                // Addresses stay 3 bytes; the top byte goes out through
                // the extended address register before each operation
                self.ext_addr_write_instruction = Some(opcodes::WREAR);
            }
        }
        let format = self.default_format();
        self.bus.configure_format(&format)?;
        Ok(())
    }

    fn clear_block_protection(&mut self) -> Result<()> {
        protocol::wait_ready(&mut self.bus)?;

        let id = protocol::read_jedec_id(&mut self.bus)?;
        log::debug!("Vendor device ID: {:02X} {:02X} {:02X}", id[0], id[1], id[2]);

        if id[0] == 0xBF {
            // SST parts power up with block protection enabled; issue a
            // global protection unlock instead of rewriting status bits
            protocol::set_write_enable(&mut self.bus)?;
            self.bus.command_transfer(opcodes::ULBPR, None, &[], &mut [])?;
        } else {
            let mut registers =
                protocol::read_status_registers(&mut self.bus, self.read_status2_instruction)?;
            registers[0] &= opcodes::SR1_WIP | opcodes::SR1_WEL;
            protocol::write_status_registers(
                &mut self.bus,
                self.write_status2_instruction,
                registers,
            )?;
        }

        protocol::wait_ready(&mut self.bus)
    }

    /// Extended-address preamble for parts reaching beyond 16 MiB with
    /// 3-byte addresses
    fn update_ext_addr_reg(&mut self, addr: u32) -> Result<()> {
        if let Some(instruction) = self.ext_addr_write_instruction {
            protocol::set_write_enable(&mut self.bus)?;
            self.bus
                .command_transfer(instruction, None, &[(addr >> 24) as u8], &mut [])?;
        } else if self.address_size == AddressSize::ThreeByte && addr >= (1 << 24) {
            log::error!("Address 0x{:x} needs 4-byte addressing", addr);
            return Err(Error::DeviceError);
        }
        Ok(())
    }

    fn send_read_command(&mut self, buf: &mut [u8], addr: u32) -> Result<()> {
        // Reads use the best bus mode the part supports; everything else
        // stays on the 1-1-1 default (program and erase are limited by the
        // flash array, not the bus)
        let format = BusFormat {
            instruction_width: self.read_mode.instruction_width,
            address_width: self.read_mode.address_width,
            address_size: self.address_size,
            // The alt phase rides the address lanes
            alt_width: self.read_mode.address_width,
            alt_size: 8,
            data_width: self.read_mode.data_width,
            dummy_and_mode_cycles: self.read_mode.dummy_and_mode_cycles,
        };
        self.bus.configure_format(&format)?;
        let result = self.bus.read(self.read_mode.instruction, addr, buf);
        let restore = self.default_format();
        self.bus.configure_format(&restore)?;

        match result {
            Ok(n) if n == buf.len() => Ok(()),
            Ok(n) => {
                log::error!("Short read: {} of {} bytes", n, buf.len());
                Err(Error::DeviceError)
            }
            Err(e) => {
                log::error!("Read command failed");
                Err(e)
            }
        }
    }

    fn send_program_command(&mut self, data: &[u8], addr: u32) -> Result<()> {
        let written = self.bus.write(self.program_instruction, addr, data)?;
        if written != data.len() {
            log::error!("Program wrote {} of {} bytes", written, data.len());
            return Err(Error::DeviceError);
        }
        Ok(())
    }

    fn send_erase_command(&mut self, instruction: u8, addr: u32) -> Result<()> {
        // Bits below 4 KiB carry no block information
        self.bus
            .command_transfer(instruction, Some(addr & !0xFFF), &[], &mut [])
    }
}
