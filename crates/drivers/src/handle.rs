//! Device handles and open flags.

use core::num::NonZeroU8;

use crate::error::DriverError;

/// Capability returned by a successful open.
///
/// Wraps the 1-based slot number of the device in the registry table. Zero
/// and negative raw values are status codes and never valid handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(NonZeroU8);

impl Handle {
    /// Handle for a 0-based table slot.
    pub(crate) const fn for_slot(slot: u8) -> Self {
        Self(NonZeroU8::MIN.saturating_add(slot))
    }

    /// Interpret a raw handle value. Zero and negative values are refused.
    pub fn from_raw(raw: i8) -> Option<Self> {
        u8::try_from(raw).ok().and_then(NonZeroU8::new).map(Self)
    }

    /// Raw positive handle value.
    #[allow(clippy::cast_possible_wrap)] // construction keeps the value <= i8::MAX
    pub fn raw(self) -> i8 {
        self.0.get() as i8
    }

    /// 0-based table slot this handle names. Not range checked.
    pub(crate) fn slot(self) -> usize {
        usize::from(self.0.get()).saturating_sub(1)
    }

    /// Argument encoding used by `SET_BUS_HANDLE` requests.
    pub fn to_arg(self) -> [u8; 1] {
        self.raw().to_le_bytes()
    }

    /// Decode a `SET_BUS_HANDLE` argument buffer.
    ///
    /// Empty buffers are a bad argument; zero or negative values are an
    /// invalid handle.
    pub fn from_arg(args: &[u8]) -> Result<Self, DriverError> {
        let byte = *args.first().ok_or(DriverError::BadArgument)?;
        Self::from_raw(i8::from_le_bytes([byte])).ok_or(DriverError::InvalidHandle)
    }
}

impl core::fmt::Display for Handle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Handle {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "#{=u8}", self.0.get());
    }
}

bitflags::bitflags! {
    /// Flags passed to `open`. Adapters receive them but none acts on them yet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OpenFlags: u8 {
        /// Caller intends to read.
        const READ = 0x01;
        /// Caller intends to write.
        const WRITE = 0x02;
        /// Caller prefers failure over blocking.
        const NONBLOCKING = 0x04;
    }
}
