//! Programming-error faults.
//!
//! A fault means a caller broke the driver contract: a bogus handle, use of
//! a device before start-up, a failed initializer, or a bus-lock protocol
//! violation. Shared hardware state can no longer be trusted, so the only
//! response is to stop. On hardware the panic lands in `panic-probe`; on the
//! host it unwinds into the test harness.

use crate::error::DriverError;

/// Unrecoverable contract violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Fault {
    /// Handle outside `[1, device count]`.
    InvalidHandle(i8),
    /// Device addressed before `init_all` ran.
    DeviceNotInitialized(&'static str),
    /// A device initializer failed during start-up.
    InitFailed(&'static str, DriverError),
    /// `RELEASE_LOCK` while the bus lock was free.
    BusNotLocked,
    /// Bus transfer attempted while nobody held the bus lock.
    TransferOutsideLock,
    /// Storage chip-select asserted or data moved without the storage lock.
    CardLockProtocol,
    /// Storage read without its chip-select asserted.
    CardNotSelected,
}

impl core::fmt::Display for Fault {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidHandle(raw) => write!(f, "invalid handle {raw}"),
            Self::DeviceNotInitialized(id) => write!(f, "device {id} not initialized"),
            Self::InitFailed(id, e) => write!(f, "init of {id} failed: {e}"),
            Self::BusNotLocked => f.write_str("bus lock released while free"),
            Self::TransferOutsideLock => f.write_str("bus transfer outside the bus lock"),
            Self::CardLockProtocol => f.write_str("card used without holding the bus"),
            Self::CardNotSelected => f.write_str("card read without chip-select"),
        }
    }
}

/// Log `fault` and stop.
#[cold]
#[allow(clippy::panic)] // the single intentional panic site of the framework
pub fn halt(fault: Fault) -> ! {
    error!("fatal driver fault: {}", fault);
    panic!("{}", fault)
}
