//! Serial link seams
//!
//! The board has two links: SPI1, shared by the audio decoder, the display
//! and the SD card, and I2C1 to the touch panel. Select and data/command
//! lines are `embedded-hal` output pins owned by the driver adapters; these
//! traits only move bytes and retune the clock.

use core::future::Future;

/// The shared SPI bus.
///
/// Every device on it speaks mode 0, MSB first, so the clock rate is the
/// only setting that changes between transactions.
pub trait SpiPeripheral {
    /// Error type
    type Error: core::fmt::Debug;

    /// Full-duplex transfer: clocks `buf` out and overwrites it with the
    /// bytes clocked in.
    fn transfer_in_place(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Clock `data` out, discarding whatever comes back.
    fn write(&mut self, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Set the SCK rate in Hz. Only called between transactions, with the
    /// bus lock held.
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;
}

/// Register-addressed I2C link with 7-bit addresses.
pub trait I2cPeripheral {
    /// Error type
    type Error: core::fmt::Debug;

    /// Write `data` to `address`. Register targets take the register number
    /// as the first byte.
    fn write(&mut self, address: u8, data: &[u8]) -> impl Future<Output = Result<(), Self::Error>>;

    /// Write `write`, then read into `read` after a repeated start.
    fn write_read(
        &mut self,
        address: u8,
        write: &[u8],
        read: &mut [u8],
    ) -> impl Future<Output = Result<(), Self::Error>>;

    /// Set the SCL rate in Hz.
    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error>;
}
