//! qspif - SFDP-driven QSPI NOR flash block device driver
//!
//! This crate drives NOR flash parts attached to a quad-capable serial
//! peripheral. At bring-up it interrogates the part through its discovery
//! table (JEDEC JESD216, "Serial Flash Discoverable Parameters"),
//! negotiates the fastest interoperable bus mode, enables quad / QPI /
//! 4-byte addressing as the table dictates, and builds the - possibly
//! non-uniform - erase geometry. It then exposes a block-device interface:
//! `read`, `program`, `erase` and the geometry accessors, with page
//! splitting, mixed-erase-size decomposition and the write-enable /
//! busy-poll protocol handled internally.
//!
//! The raw transport is consumed as a capability: anything implementing
//! [`QspiBus`] (one instruction transaction at a time, with configurable
//! lane widths and dummy cycles) can back a device.
//!
//! # Example
//!
//! ```ignore
//! use qspif::{ChipSelect, QspifBlockDevice};
//!
//! let device = QspifBlockDevice::new(bus, ChipSelect(0), 40_000_000)?;
//! device.init()?;
//! println!("{} bytes, {} byte erase blocks", device.size(), device.erase_size());
//!
//! let mut buf = vec![0u8; 256];
//! device.read(&mut buf, 0)?;
//! device.erase(0, device.erase_size())?;
//! device.program(&buf, 0)?;
//! device.deinit()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod device;
pub mod error;
pub mod geometry;
pub mod protocol;
pub mod registry;
pub mod sfdp;
pub mod spi;

pub use device::QspifBlockDevice;
pub use error::{Error, Result};
pub use registry::{ChipSelect, MAX_DEVICES};
pub use spi::{AddressSize, BusFormat, BusWidth, QspiBus};
