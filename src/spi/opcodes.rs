//! Standard JEDEC SPI flash opcodes
//!
//! The instruction set negotiated by the driver. Defaults follow JEDEC
//! JESD216 (SFDP) and common manufacturer conventions; several of these are
//! superseded at init time by instructions discovered in the parameter
//! tables.

// ============================================================================
// Write control
// ============================================================================

/// Write Enable - required before any write/erase operation
pub const WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const WRDI: u8 = 0x04;

// ============================================================================
// Status register operations
// ============================================================================

/// Read Status Register 1
pub const RDSR: u8 = 0x05;
/// Read Status Register 2 (default; QER 3 parts use 0x3F instead)
pub const RDSR2: u8 = 0x35;
/// Write Status Register 1 (carries status register 2 as a second data
/// byte on parts without a dedicated status-2 write instruction)
pub const WRSR: u8 = 0x01;

// ============================================================================
// Identification
// ============================================================================

/// Read JEDEC ID (manufacturer + device ID)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Read / Program / Erase defaults (3-byte address, single lane)
// ============================================================================

/// Read Data - the 1-1-1 fallback read instruction
pub const READ: u8 = 0x03;
/// Page Program
pub const PP: u8 = 0x02;
/// Sector Erase 4KB - legacy default, superseded by the discovered erase types
pub const SE: u8 = 0x20;

// ============================================================================
// 4-byte address mode control
// ============================================================================

/// Enter 4-Byte Address Mode
pub const EN4B: u8 = 0xB7;
/// Write Extended Address Register (top address byte on 3-byte parts)
pub const WREAR: u8 = 0xC5;
/// Write Bank Register (bit 7 enables 4-byte addressing)
pub const BRWR: u8 = 0x17;
/// Read Configuration Register (4-byte addressing variant)
pub const RDCR_B5: u8 = 0xB5;
/// Write Configuration Register (4-byte addressing variant)
pub const WRCR_B1: u8 = 0xB1;

// ============================================================================
// QPI mode control
// ============================================================================

/// Enter QPI Mode (Winbond-style)
pub const EQIO_38: u8 = 0x38;
/// Enter QPI Mode (alternate)
pub const EQIO_35: u8 = 0x35;
/// Read Configuration Register (QPI enable sequences)
pub const RDCR_65: u8 = 0x65;
/// Write Configuration Register (QPI entry via CR bit 6)
pub const WRCR_71: u8 = 0x71;
/// Write Configuration Register (QPI entry via CR bit 7)
pub const WRCR_61: u8 = 0x61;

// ============================================================================
// Software Reset
// ============================================================================

/// Reset Enable
pub const RSTEN: u8 = 0x66;
/// Reset Device (after RSTEN)
pub const RST: u8 = 0x99;
/// Reset Device (single-instruction variant)
pub const RST_F0: u8 = 0xF0;

// ============================================================================
// SFDP (Serial Flash Discoverable Parameters)
// ============================================================================

/// Read SFDP (JEDEC JESD216)
pub const RDSFDP: u8 = 0x5A;

// ============================================================================
// Vendor specific
// ============================================================================

/// Global Block-Protection Unlock (SST parts power up protected)
pub const ULBPR: u8 = 0x98;

// ============================================================================
// Status register bit definitions
// ============================================================================

/// Status Register 1: Write In Progress / Busy
pub const SR1_WIP: u8 = 0x01;
/// Status Register 1: Write Enable Latch
pub const SR1_WEL: u8 = 0x02;
