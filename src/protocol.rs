//! SPI flash command sequences
//!
//! The common state-protocol sequences every mutating operation interleaves
//! with: write-enable latching, busy polling, status register access, JEDEC
//! identification, soft reset and QPI entry. All of them run on the 1-1-1
//! default bus profile.

use crate::error::{Error, Result};
use crate::sfdp::types::{QpiEnable, SoftReset};
use crate::spi::{opcodes, QspiBus};

/// Delay between busy polls
pub const READY_POLL_INTERVAL_US: u32 = 1_000;

/// Busy poll retry cap (roughly ten seconds at the 1 ms interval)
pub const READY_MAX_POLLS: u32 = 10_000;

/// Read status register 1
pub fn read_status1<B: QspiBus + ?Sized>(bus: &mut B) -> Result<u8> {
    let mut value = [0u8; 1];
    bus.command_transfer(opcodes::RDSR, None, &[], &mut value)?;
    Ok(value[0])
}

/// Read a status register through the given instruction
pub fn read_status<B: QspiBus + ?Sized>(bus: &mut B, instruction: u8) -> Result<u8> {
    let mut value = [0u8; 1];
    bus.command_transfer(instruction, None, &[], &mut value)?;
    Ok(value[0])
}

/// Send the Write Enable command
pub fn write_enable<B: QspiBus + ?Sized>(bus: &mut B) -> Result<()> {
    bus.command_transfer(opcodes::WREN, None, &[], &mut [])
}

/// Send the Write Disable command
pub fn write_disable<B: QspiBus + ?Sized>(bus: &mut B) -> Result<()> {
    bus.command_transfer(opcodes::WRDI, None, &[], &mut [])
}

/// Wait for the Write In Progress bit to clear
///
/// Sleeps 1 ms between status reads, up to [`READY_MAX_POLLS`] iterations.
pub fn wait_ready<B: QspiBus + ?Sized>(bus: &mut B) -> Result<()> {
    for _ in 0..READY_MAX_POLLS {
        bus.delay_us(READY_POLL_INTERVAL_US);
        let status = read_status1(bus)?;
        if status & opcodes::SR1_WIP == 0 {
            return Ok(());
        }
    }
    log::error!("Device stayed busy past the poll retry limit");
    Err(Error::ReadyFailed)
}

/// Latch the write-enable bit and verify it took
///
/// Sends WREN, waits for the device to be ready, then reads status
/// register 1 back and checks the WEL bit.
pub fn set_write_enable<B: QspiBus + ?Sized>(bus: &mut B) -> Result<()> {
    write_enable(bus)?;
    wait_ready(bus)?;
    let status = read_status1(bus)?;
    if status & opcodes::SR1_WEL == 0 {
        log::error!("Write enable latch did not set, status: 0x{:02X}", status);
        return Err(Error::WriteEnableFailed);
    }
    Ok(())
}

/// Read the JEDEC ID: manufacturer byte plus two device bytes
pub fn read_jedec_id<B: QspiBus + ?Sized>(bus: &mut B) -> Result<[u8; 3]> {
    let mut id = [0u8; 3];
    bus.command_transfer(opcodes::RDID, None, &[], &mut id)?;
    Ok(id)
}

/// Read status registers 1 and 2
///
/// Register 2 is read through `read_sr2_instruction`, which QER 3 parts
/// replace with 0x3F.
pub fn read_status_registers<B: QspiBus + ?Sized>(
    bus: &mut B,
    read_sr2_instruction: u8,
) -> Result<[u8; 2]> {
    let sr1 = read_status1(bus)?;
    let sr2 = read_status(bus, read_sr2_instruction)?;
    log::debug!("Status registers: 0x{:02X} 0x{:02X}", sr1, sr2);
    Ok([sr1, sr2])
}

/// Write status registers 1 and 2
///
/// Without a dedicated status-2 write instruction both registers go out as
/// the two data bytes of a single 0x01 write; otherwise each register is
/// written with its own instruction, write-enabled separately.
pub fn write_status_registers<B: QspiBus + ?Sized>(
    bus: &mut B,
    write_sr2_instruction: Option<u8>,
    registers: [u8; 2],
) -> Result<()> {
    match write_sr2_instruction {
        None => {
            set_write_enable(bus)?;
            bus.command_transfer(opcodes::WRSR, None, &registers, &mut [])?;
        }
        Some(instruction) => {
            set_write_enable(bus)?;
            bus.command_transfer(opcodes::WRSR, None, &registers[..1], &mut [])?;
            set_write_enable(bus)?;
            bus.command_transfer(instruction, None, &registers[1..], &mut [])?;
        }
    }
    log::debug!(
        "Wrote status registers: 0x{:02X} 0x{:02X}",
        registers[0],
        registers[1]
    );
    Ok(())
}

/// Issue the soft-reset sequence the part advertises
pub fn soft_reset<B: QspiBus + ?Sized>(bus: &mut B, protocol: SoftReset) -> Result<()> {
    match protocol {
        SoftReset::ResetF0 => bus.command_transfer(opcodes::RST_F0, None, &[], &mut [])?,
        SoftReset::EnableAndReset => {
            bus.command_transfer(opcodes::RSTEN, None, &[], &mut [])?;
            bus.command_transfer(opcodes::RST, None, &[], &mut [])?;
        }
    }
    Ok(())
}

/// Switch the part into device-wide 4-4-4 operation
pub fn enter_qpi_mode<B: QspiBus + ?Sized>(bus: &mut B, sequence: QpiEnable) -> Result<()> {
    match sequence {
        QpiEnable::Cmd38 => bus.command_transfer(opcodes::EQIO_38, None, &[], &mut [])?,
        QpiEnable::Cmd35 => bus.command_transfer(opcodes::EQIO_35, None, &[], &mut [])?,
        QpiEnable::SetConfigBit6 => {
            let mut config = [0u8; 1];
            bus.command_transfer(opcodes::RDCR_65, None, &[], &mut config)?;
            config[0] |= 0x40;
            bus.command_transfer(opcodes::WRCR_71, None, &config, &mut [])?;
        }
        QpiEnable::ClearConfigBit7 => {
            let mut config = [0u8; 1];
            bus.command_transfer(opcodes::RDCR_65, None, &[], &mut config)?;
            config[0] &= 0x7F;
            bus.command_transfer(opcodes::WRCR_61, None, &config, &mut [])?;
        }
        QpiEnable::Unsupported(value) => {
            log::warn!("Unsupported 4-4-4 enable sequence: {}", value);
        }
    }
    Ok(())
}
