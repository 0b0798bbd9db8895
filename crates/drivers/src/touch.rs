//! FT6206 capacitive touch controller adapter.
//!
//! The only device off the shared SPI bus: it sits on its own I2C link, so it
//! needs no bus handle and ignores the port it is given.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use platform::config::TOUCH_I2C_HZ;
use platform::I2cPeripheral;

use crate::driver::Driver;
use crate::error::DriverError;
use crate::handle::OpenFlags;

/// 7-bit I2C address.
pub const FT6206_ADDR: u8 = 0x38;

const REG_VENDOR_ID: u8 = 0xA8;
const REG_CHIP_ID: u8 = 0xA3;
const REG_THRESHOLD: u8 = 0x80;

const FOCALTECH_VENDOR_ID: u8 = 0x11;
const FT6206_CHIP_ID: u8 = 0x06;

/// Touch sensitivity written on open.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Adapter for `/dev/ft6206`.
pub struct Ft6206<M: RawMutex, I> {
    i2c: Mutex<M, I>,
}

impl<M: RawMutex, I: I2cPeripheral> Ft6206<M, I> {
    /// Single opener.
    pub const MAX_REFS: u8 = 1;

    /// Wrap the I2C link.
    pub fn new(i2c: I) -> Self {
        Self { i2c: Mutex::new(i2c) }
    }

    pub(crate) fn init(&mut self) -> Result<(), DriverError> {
        self.i2c
            .get_mut()
            .set_frequency(TOUCH_I2C_HZ)
            .map_err(|_| DriverError::Bus)
    }

    async fn register(&self, reg: u8) -> Result<u8, DriverError> {
        let mut value = [0u8; 1];
        self.i2c
            .lock()
            .await
            .write_read(FT6206_ADDR, &[reg], &mut value)
            .await
            .map_err(|_| DriverError::Bus)?;
        let [value] = value;
        Ok(value)
    }
}

impl<P: ?Sized, M: RawMutex, I: I2cPeripheral> Driver<P> for Ft6206<M, I> {
    async fn open(&self, _port: &P, _flags: OpenFlags) -> Result<(), DriverError> {
        let vendor = self.register(REG_VENDOR_ID).await?;
        let chip = self.register(REG_CHIP_ID).await?;
        if vendor != FOCALTECH_VENDOR_ID || chip != FT6206_CHIP_ID {
            warn!("ft6206: vendor {} chip {} not recognised", vendor, chip);
            return Err(DriverError::UnexpectedDevice);
        }
        self.i2c
            .lock()
            .await
            .write(FT6206_ADDR, &[REG_THRESHOLD, DEFAULT_THRESHOLD])
            .await
            .map_err(|_| DriverError::Bus)
    }

    async fn close(&self, _port: &P) -> Result<(), DriverError> {
        Ok(())
    }

    async fn read(&self, _port: &P, buf: &mut [u8]) -> Result<(), DriverError> {
        let reg = *buf.first().ok_or(DriverError::BadArgument)?;
        self.i2c
            .lock()
            .await
            .write_read(FT6206_ADDR, &[reg], buf)
            .await
            .map_err(|_| DriverError::Bus)
    }

    async fn write(&self, _port: &P, buf: &[u8]) -> Result<(), DriverError> {
        if buf.len() != 2 {
            return Err(DriverError::BadArgument);
        }
        self.i2c
            .lock()
            .await
            .write(FT6206_ADDR, buf)
            .await
            .map_err(|_| DriverError::Bus)
    }

    async fn configure(&self, _port: &P, _request: u8, _args: &[u8]) -> Result<(), DriverError> {
        Err(DriverError::UnknownRequest)
    }
}
