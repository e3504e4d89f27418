//! Process-wide chip-select registry
//!
//! Enforces the one-driver-per-chip-select rule: constructing a block
//! device reserves its chip-select identity here, dropping it releases the
//! reservation. The capacity is a compile-time bound.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use crate::error::{Error, Result};

/// Maximum number of simultaneously active devices
pub const MAX_DEVICES: usize = 4;

/// Opaque chip-select identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChipSelect(
    /// Raw chip-select identity value
    pub u32,
);

impl fmt::Display for ChipSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cs{}", self.0)
    }
}

static ACTIVE_DEVICES: Mutex<[Option<ChipSelect>; MAX_DEVICES]> = Mutex::new([None; MAX_DEVICES]);

/// Reserve a chip-select identity
pub(crate) fn add(csel: ChipSelect) -> Result<()> {
    let mut slots = ACTIVE_DEVICES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    if slots.iter().any(|slot| *slot == Some(csel)) {
        log::error!("A device for {} already exists", csel);
        return Err(Error::DeviceNotUnique);
    }
    match slots.iter_mut().find(|slot| slot.is_none()) {
        Some(slot) => {
            *slot = Some(csel);
            Ok(())
        }
        None => {
            log::error!("Too many active devices - max allowed: {}", MAX_DEVICES);
            Err(Error::DeviceMaxExceeded)
        }
    }
}

/// Release a chip-select identity; releasing an unknown one is a no-op
pub(crate) fn remove(csel: ChipSelect) {
    let mut slots = ACTIVE_DEVICES
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    for slot in slots.iter_mut() {
        if *slot == Some(csel) {
            *slot = None;
            return;
        }
    }
}

/// Serializes tests that exercise the process-wide registry, so parallel
/// tests cannot trip the capacity bound or collide on identities.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static TEST_LOCK: Mutex<()> = Mutex::new(());
    TEST_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_chip_select_is_rejected() {
        let _guard = test_guard();
        add(ChipSelect(9100)).unwrap();
        assert_eq!(add(ChipSelect(9100)), Err(Error::DeviceNotUnique));
        remove(ChipSelect(9100));
    }

    #[test]
    fn capacity_is_bounded() {
        let _guard = test_guard();
        for i in 0..MAX_DEVICES as u32 {
            add(ChipSelect(9200 + i)).unwrap();
        }
        assert_eq!(add(ChipSelect(9299)), Err(Error::DeviceMaxExceeded));
        for i in 0..MAX_DEVICES as u32 {
            remove(ChipSelect(9200 + i));
        }
        // Slots are reusable after removal
        add(ChipSelect(9299)).unwrap();
        remove(ChipSelect(9299));
    }

    #[test]
    fn remove_is_idempotent() {
        let _guard = test_guard();
        add(ChipSelect(9300)).unwrap();
        remove(ChipSelect(9300));
        remove(ChipSelect(9300));
        add(ChipSelect(9300)).unwrap();
        remove(ChipSelect(9300));
    }
}
