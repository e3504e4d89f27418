//! QSPI bus types, the transport capability trait, and standard opcodes

mod bus;
pub mod opcodes;

pub use bus::{AddressSize, BusFormat, BusWidth, QspiBus};
