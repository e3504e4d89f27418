//! Error types for qspif
//!
//! This module provides the error type shared by every driver operation.

use core::fmt;

/// Driver error type - Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An underlying transport transaction failed, or the device misbehaved
    DeviceError,
    /// The discovery table could not be read or decoded
    ParsingFailed,
    /// The write-enable latch did not set after a Write Enable command
    WriteEnableFailed,
    /// Erase address/size out of bounds or not aligned to the region granularity
    InvalidEraseParams,
    /// A driver instance already exists for this chip-select
    DeviceNotUnique,
    /// The fixed device registry capacity is exhausted
    DeviceMaxExceeded,
    /// The device stayed busy past the poll retry limit
    ReadyFailed,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceError => write!(f, "device error"),
            Self::ParsingFailed => write!(f, "discovery table parsing failed"),
            Self::WriteEnableFailed => write!(f, "write enable failed"),
            Self::InvalidEraseParams => write!(f, "invalid erase parameters"),
            Self::DeviceNotUnique => write!(f, "device with the same chip-select already exists"),
            Self::DeviceMaxExceeded => write!(f, "too many active devices"),
            Self::ReadyFailed => write!(f, "device not ready"),
        }
    }
}

impl std::error::Error for Error {}

/// Result type alias using the driver Error type
pub type Result<T> = core::result::Result<T, Error>;
