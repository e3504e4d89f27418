//! QSPI bus types and the transport capability trait

use crate::error::Result;

/// Lane width of one bus phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BusWidth {
    /// Single lane
    #[default]
    Single,
    /// Two lanes
    Dual,
    /// Four lanes
    Quad,
}

impl BusWidth {
    /// Returns the number of data lines used by this width
    pub const fn lanes(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Dual => 2,
            Self::Quad => 4,
        }
    }
}

/// Address size for addressed transactions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressSize {
    /// 3-byte (24-bit) address - supports up to 16 MiB
    #[default]
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressSize {
    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }
}

/// A sticky bus profile for `read`/`write` transactions
///
/// `configure_format` applies this profile to the transport; it stays in
/// effect until reconfigured. The driver always restores the single-lane
/// zero-dummy default between operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BusFormat {
    /// Lane width of the instruction phase
    pub instruction_width: BusWidth,
    /// Lane width of the address phase
    pub address_width: BusWidth,
    /// Address size in bytes
    pub address_size: AddressSize,
    /// Lane width of the alt (mode) phase
    pub alt_width: BusWidth,
    /// Alt phase size in bits
    pub alt_size: u8,
    /// Lane width of the data phase
    pub data_width: BusWidth,
    /// Combined dummy + mode clock cycles between address and data
    pub dummy_and_mode_cycles: u8,
}

impl BusFormat {
    /// The 1-1-1, zero-dummy default every non-read command uses
    pub const fn single(address_size: AddressSize) -> Self {
        Self {
            instruction_width: BusWidth::Single,
            address_width: BusWidth::Single,
            address_size,
            alt_width: BusWidth::Single,
            alt_size: 8,
            data_width: BusWidth::Single,
            dummy_and_mode_cycles: 0,
        }
    }
}

/// QSPI transport capability
///
/// One implementation drives one chip-select. The driver owns the
/// capability exclusively for the lifetime of its block device and issues
/// one transaction per call.
///
/// `command_transfer` always runs 1-1-1 with no dummy cycles (the address,
/// when present, uses the configured address size). `read` and `write` use
/// the full profile last applied with `configure_format`.
pub trait QspiBus {
    /// Apply a sticky bus profile for subsequent `read`/`write` calls
    fn configure_format(&mut self, format: &BusFormat) -> Result<()>;

    /// Set the bus clock frequency in Hz
    fn set_frequency(&mut self, hz: u32) -> Result<()>;

    /// Issue a single instruction transaction with optional address,
    /// optional TX data and optional RX data
    fn command_transfer(
        &mut self,
        instruction: u8,
        address: Option<u32>,
        tx: &[u8],
        rx: &mut [u8],
    ) -> Result<()>;

    /// Read `buf.len()` bytes starting at `address` using the configured
    /// bus profile; returns the number of bytes actually read
    fn read(&mut self, instruction: u8, address: u32, buf: &mut [u8]) -> Result<usize>;

    /// Write `data` starting at `address` using the configured bus
    /// profile; returns the number of bytes actually written
    fn write(&mut self, instruction: u8, address: u32, data: &[u8]) -> Result<usize>;

    /// Block for the specified number of microseconds
    fn delay_us(&mut self, us: u32);
}
