//! Erase geometry model
//!
//! A part advertises up to four erase types (instruction + power-of-two
//! granularity) and, through the optional Sector Map sub-table, may split
//! its address space into regions that each support only a subset of them.
//! This module keeps the decoded geometry and answers the address-to-region
//! and granularity queries the I/O engine needs.

use bitflags::bitflags;

use crate::error::{Error, Result};

/// Maximum number of erase regions the driver supports
pub const MAX_REGIONS: usize = 4;

/// One erase type: an instruction paired with its granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EraseType {
    /// Erase instruction
    pub instruction: u8,
    /// Erase granularity in bytes (0 if the slot is unused)
    pub size: u32,
}

impl EraseType {
    /// Build from the size exponent / instruction pair of the Basic
    /// Parameters table. Slots with an exponent of 0 or 1 are unused.
    pub fn from_raw(size_exponent: u8, instruction: u8) -> Self {
        if size_exponent > 1 {
            Self {
                instruction,
                size: 1u32 << size_exponent,
            }
        } else {
            Self::default()
        }
    }

    /// Check if this erase type slot is populated
    pub fn is_valid(&self) -> bool {
        self.size != 0
    }
}

bitflags! {
    /// Bitmap of erase types supported within one region
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EraseTypes: u8 {
        /// Erase type 1
        const TYPE_1 = 0x01;
        /// Erase type 2
        const TYPE_2 = 0x02;
        /// Erase type 3
        const TYPE_3 = 0x04;
        /// Erase type 4
        const TYPE_4 = 0x08;
    }
}

impl EraseTypes {
    /// The bit for erase type slot `index` (0..4)
    pub fn nth(index: usize) -> Self {
        Self::from_bits_truncate(1u8 << index)
    }
}

/// A contiguous address range sharing one erase-type palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// Region size in bytes
    pub size: u32,
    /// Last address inside the region
    pub high_boundary: u32,
    /// Erase types usable within the region
    pub erase_types: EraseTypes,
}

/// Decoded device geometry: size, page, erase palette and regions
///
/// Regions are contiguous from address 0 and cover the whole device.
#[derive(Debug, Clone, Copy, Default)]
pub struct Geometry {
    device_size: u32,
    page_size: u32,
    min_common_erase_size: u32,
    erase_types: [EraseType; 4],
    regions: [Region; MAX_REGIONS],
    region_count: usize,
}

impl Geometry {
    /// Geometry for a part without a Sector Map: one region spanning the
    /// whole device, supporting every valid erase type
    pub fn uniform(
        device_size: u32,
        page_size: u32,
        erase_types: [EraseType; 4],
        supported: EraseTypes,
        min_erase_size: u32,
    ) -> Self {
        let mut regions = [Region::default(); MAX_REGIONS];
        regions[0] = Region {
            size: device_size,
            high_boundary: device_size - 1,
            erase_types: supported,
        };
        Self {
            device_size,
            page_size,
            min_common_erase_size: min_erase_size,
            erase_types,
            regions,
            region_count: 1,
        }
    }

    /// Replace the uniform layout with the regions of a Sector Map sub-table
    ///
    /// Only the single-map-descriptor form is supported: the first
    /// configuration word must carry descriptor type 0x3 in its low bits and
    /// a zero second byte. Each following word describes one region: the low
    /// nibble is the erase-type bitmap, the upper 24 bits hold
    /// `(size / 256) - 1`.
    pub fn apply_sector_map(&mut self, table: &[u8]) -> Result<()> {
        if table.len() < 8 {
            log::error!("Sector map table too short: {} bytes", table.len());
            return Err(Error::ParsingFailed);
        }

        if (table[0] & 0x03) != 0x03 || table[1] != 0x00 {
            log::error!("Sector map: only single map descriptor tables are supported");
            return Err(Error::ParsingFailed);
        }

        let region_count = (table[2] as usize) + 1;
        if region_count > MAX_REGIONS {
            log::error!(
                "Sector map describes {} regions, supporting up to {}",
                region_count,
                MAX_REGIONS
            );
            return Err(Error::ParsingFailed);
        }
        if table.len() < (region_count + 1) * 4 {
            log::error!("Sector map table shorter than its region descriptors");
            return Err(Error::ParsingFailed);
        }

        let mut common = EraseTypes::all();
        let mut boundary: u32 = 0;
        for i in 0..region_count {
            let offset = (i + 1) * 4;
            let word = u32::from_le_bytes([
                table[offset],
                table[offset + 1],
                table[offset + 2],
                table[offset + 3],
            ]);
            // Region size is a 0-based multiple of 256 bytes
            let size = ((word >> 8) + 1) * 256;
            let erase_types = EraseTypes::from_bits_truncate((word & 0x0F) as u8);
            common &= erase_types;
            boundary += size;
            self.regions[i] = Region {
                size,
                high_boundary: boundary - 1,
                erase_types,
            };
            log::debug!(
                "Sector map region {}: size 0x{:x}, boundary 0x{:x}, erase types {:#06b}",
                i,
                size,
                boundary - 1,
                word & 0x0F
            );
        }
        self.region_count = region_count;
        self.min_common_erase_size = self.smallest_of(common);
        Ok(())
    }

    /// Device size in bytes
    pub fn device_size(&self) -> u32 {
        self.device_size
    }

    /// Program page size in bytes
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Smallest erase granularity supported by every region (0 if the
    /// regions have no erase type in common)
    pub fn min_common_erase_size(&self) -> u32 {
        self.min_common_erase_size
    }

    /// The erase type in slot `index`
    pub fn erase_type(&self, index: usize) -> EraseType {
        self.erase_types[index]
    }

    /// Region descriptor by index
    pub fn region(&self, index: usize) -> &Region {
        &self.regions[index]
    }

    /// Number of regions
    pub fn region_count(&self) -> usize {
        self.region_count
    }

    /// Find the region containing `addr`, scanning boundaries from the top
    pub fn region_of(&self, addr: u32) -> Option<usize> {
        if addr >= self.device_size || self.region_count == 0 {
            return None;
        }
        for i in (0..self.region_count - 1).rev() {
            if addr > self.regions[i].high_boundary {
                return Some(i + 1);
            }
        }
        Some(0)
    }

    /// Smallest erase granularity usable at `addr` (0 if the region
    /// supports no erase type, or `addr` is out of range)
    pub fn erase_size_at(&self, addr: u32) -> u32 {
        match self.region_of(addr) {
            Some(region) => self.smallest_of(self.regions[region].erase_types),
            None => 0,
        }
    }

    /// Pick the erase type for the next step of an erase decomposition
    ///
    /// Scans from the largest slot down for a type whose bit is set in
    /// `bitmap`, whose size divides `addr`, fits `remaining`, and stays
    /// within the region's `high_boundary`. Types too large for the
    /// remainder are dropped from `bitmap` - the remainder only shrinks, so
    /// they can never fit again. Types that merely fail the divisibility
    /// check are skipped; a later, larger-aligned address can make them
    /// eligible.
    pub fn select_erase_type(
        &self,
        bitmap: &mut EraseTypes,
        addr: u32,
        remaining: u32,
        high_boundary: u32,
    ) -> Option<usize> {
        for i in (0..4).rev() {
            let bit = EraseTypes::nth(i);
            if !bitmap.contains(bit) {
                continue;
            }
            // A region bitmap may name a slot the part never populated
            if !self.erase_types[i].is_valid() {
                bitmap.remove(bit);
                continue;
            }
            let size = self.erase_types[i].size;
            if size > remaining || (addr as u64) + (size as u64) > (high_boundary as u64) + 1 {
                bitmap.remove(bit);
                continue;
            }
            if addr % size != 0 {
                continue;
            }
            return Some(i);
        }
        None
    }

    /// Size of the lowest-indexed erase type present in `set`
    fn smallest_of(&self, set: EraseTypes) -> u32 {
        for i in 0..4 {
            if set.contains(EraseTypes::nth(i)) && self.erase_types[i].is_valid() {
                return self.erase_types[i].size;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_erase_types() -> [EraseType; 4] {
        [
            EraseType {
                instruction: 0x20,
                size: 4096,
            },
            EraseType {
                instruction: 0x52,
                size: 32768,
            },
            EraseType {
                instruction: 0xD8,
                size: 65536,
            },
            EraseType::default(),
        ]
    }

    fn uniform_geometry() -> Geometry {
        Geometry::uniform(
            8 * 1024 * 1024,
            256,
            three_erase_types(),
            EraseTypes::TYPE_1 | EraseTypes::TYPE_2 | EraseTypes::TYPE_3,
            4096,
        )
    }

    /// Two regions: 64 KiB with only 4K erase, then 0x7F0000 with all types
    fn two_region_map() -> [u8; 12] {
        let mut table = [0u8; 12];
        table[0] = 0x03; // single map descriptor
        table[1] = 0x00;
        table[2] = 1; // 2 regions
        let r0: u32 = ((0x10000 / 256 - 1) << 8) | 0x01;
        let r1: u32 = ((0x7F0000u32 / 256 - 1) << 8) | 0x0F;
        table[4..8].copy_from_slice(&r0.to_le_bytes());
        table[8..12].copy_from_slice(&r1.to_le_bytes());
        table
    }

    #[test]
    fn uniform_region_lookup() {
        let geo = uniform_geometry();
        assert_eq!(geo.region_count(), 1);
        assert_eq!(geo.region_of(0), Some(0));
        assert_eq!(geo.region_of(8 * 1024 * 1024 - 1), Some(0));
        assert_eq!(geo.region_of(8 * 1024 * 1024), None);
        assert_eq!(geo.erase_size_at(0x1234), 4096);
    }

    #[test]
    fn sector_map_regions() {
        let mut geo = uniform_geometry();
        geo.apply_sector_map(&two_region_map()).unwrap();

        assert_eq!(geo.region_count(), 2);
        assert_eq!(geo.region(0).size, 0x10000);
        assert_eq!(geo.region(0).high_boundary, 0xFFFF);
        assert_eq!(geo.region(1).high_boundary, 0x7FFFFF);

        assert_eq!(geo.region_of(0x0), Some(0));
        assert_eq!(geo.region_of(0xFFFF), Some(0));
        assert_eq!(geo.region_of(0x10000), Some(1));
        assert_eq!(geo.region_of(0x7FFFFF), Some(1));

        // First region only supports type 1, so the common granularity is 4K
        assert_eq!(geo.min_common_erase_size(), 4096);
        assert_eq!(geo.erase_size_at(0x0), 4096);
        assert_eq!(geo.erase_size_at(0x20000), 4096);
    }

    #[test]
    fn sector_map_rejects_map_commands() {
        let mut geo = uniform_geometry();
        let mut table = two_region_map();
        table[0] = 0x02; // not a map descriptor
        assert_eq!(geo.apply_sector_map(&table), Err(Error::ParsingFailed));
    }

    #[test]
    fn empty_intersection_has_no_common_erase() {
        let mut geo = uniform_geometry();
        let mut table = two_region_map();
        // First region supports only type 2, second only type 1
        let r0: u32 = ((0x10000 / 256 - 1) << 8) | 0x02;
        let r1: u32 = ((0x7F0000u32 / 256 - 1) << 8) | 0x01;
        table[4..8].copy_from_slice(&r0.to_le_bytes());
        table[8..12].copy_from_slice(&r1.to_le_bytes());
        geo.apply_sector_map(&table).unwrap();
        assert_eq!(geo.min_common_erase_size(), 0);
        assert_eq!(geo.erase_size_at(0x0), 32768);
        assert_eq!(geo.erase_size_at(0x10000), 4096);
    }

    #[test]
    fn erase_type_selection_prefers_largest_aligned() {
        let geo = uniform_geometry();
        let mut bitmap = geo.region(0).erase_types;
        let boundary = geo.region(0).high_boundary;

        // 0x8000 is 32K-aligned but not 64K-aligned
        assert_eq!(
            geo.select_erase_type(&mut bitmap, 0x8000, 0x19000, boundary),
            Some(1)
        );
        // 0x10000 is 64K-aligned and 64K fits the remainder
        assert_eq!(
            geo.select_erase_type(&mut bitmap, 0x10000, 0x11000, boundary),
            Some(2)
        );
        // Only 4K fits a 0x1000 remainder; larger types drop out
        assert_eq!(
            geo.select_erase_type(&mut bitmap, 0x20000, 0x1000, boundary),
            Some(0)
        );
        assert_eq!(bitmap, EraseTypes::TYPE_1);
    }

    #[test]
    fn erase_type_selection_respects_region_boundary() {
        let geo = uniform_geometry();
        let mut bitmap = EraseTypes::TYPE_1 | EraseTypes::TYPE_3;
        // 64K would cross a boundary at 0x18000 - 1
        assert_eq!(
            geo.select_erase_type(&mut bitmap, 0x10000, 0x10000, 0x17FFF),
            Some(0)
        );
        assert!(!bitmap.contains(EraseTypes::TYPE_3));
    }
}
