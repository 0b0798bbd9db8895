//! SPI bus transport and the bus lock.
//!
//! The transport is the only device that touches the SPI peripheral. Every
//! other bus adapter reaches it through a [`BusPort`] by handle, and brackets
//! each transaction with `WAIT_FOR_LOCK` / `RELEASE_LOCK`. The lock is a
//! [`BinarySemaphore`] rather than a guard-based mutex because the SD card
//! protocol holds it across several separate registry calls.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use platform::config::BUS_DEFAULT_HZ;
use platform::{BinarySemaphore, SpiPeripheral};

use crate::ctrl::{decode_rate, BusRequest};
use crate::driver::{DeviceRecord, Driver};
use crate::error::DriverError;
use crate::fault::{halt, Fault};
use crate::handle::{Handle, OpenFlags};
use crate::registry::{BUS_SLOT, DEVICE_COUNT};

/// Bus lock counters since start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockStats {
    /// Completed `WAIT_FOR_LOCK` requests.
    pub acquired: u32,
    /// Completed `RELEASE_LOCK` requests.
    pub released: u32,
}

/// Adapter for the shared SPI peripheral.
pub struct SpiTransport<M: RawMutex, S> {
    spi: Mutex<M, S>,
    lock: BinarySemaphore<M>,
    rate: BlockingMutex<M, Cell<u32>>,
    stats: BlockingMutex<M, Cell<LockStats>>,
}

impl<M: RawMutex, S: SpiPeripheral> SpiTransport<M, S> {
    /// Several adapters keep a bus handle open at once.
    pub const MAX_REFS: u8 = 10;

    /// Wrap the SPI peripheral.
    pub fn new(spi: S) -> Self {
        Self {
            spi: Mutex::new(spi),
            lock: BinarySemaphore::new(),
            rate: BlockingMutex::new(Cell::new(0)),
            stats: BlockingMutex::new(Cell::new(LockStats::default())),
        }
    }

    pub(crate) fn init(&mut self) -> Result<(), DriverError> {
        self.spi
            .get_mut()
            .set_frequency(BUS_DEFAULT_HZ)
            .map_err(|_| DriverError::Bus)?;
        self.rate.lock(|r| r.set(BUS_DEFAULT_HZ));
        Ok(())
    }

    /// Lock counters.
    pub fn lock_stats(&self) -> LockStats {
        self.stats.lock(Cell::get)
    }

    /// `true` while some adapter holds the bus.
    pub fn is_locked(&self) -> bool {
        self.lock.is_held()
    }

    /// Clock last applied to the peripheral.
    pub fn rate(&self) -> u32 {
        self.rate.lock(Cell::get)
    }

    async fn wait_for_lock(&self) {
        self.lock.acquire().await;
        self.stats.lock(|s| {
            let mut v = s.get();
            v.acquired = v.acquired.wrapping_add(1);
            s.set(v);
        });
        trace!("bus locked");
    }

    fn release_lock(&self) {
        if self.lock.release().is_err() {
            halt(Fault::BusNotLocked);
        }
        self.stats.lock(|s| {
            let mut v = s.get();
            v.released = v.released.wrapping_add(1);
            s.set(v);
        });
        trace!("bus released");
    }

    fn require_lock(&self) {
        if !self.lock.is_held() {
            halt(Fault::TransferOutsideLock);
        }
    }

    async fn set_rate(&self, hz: u32) -> Result<(), DriverError> {
        self.require_lock();
        if self.rate() == hz {
            return Ok(());
        }
        self.spi
            .lock()
            .await
            .set_frequency(hz)
            .map_err(|_| DriverError::Bus)?;
        self.rate.lock(|r| r.set(hz));
        Ok(())
    }
}

impl<P: ?Sized, M: RawMutex, S: SpiPeripheral> Driver<P> for SpiTransport<M, S> {
    async fn open(&self, _port: &P, _flags: OpenFlags) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self, _port: &P) -> Result<(), DriverError> {
        Ok(())
    }

    async fn read(&self, _port: &P, buf: &mut [u8]) -> Result<(), DriverError> {
        self.require_lock();
        let mut spi = self.spi.lock().await;
        spi.transfer_in_place(buf).await.map_err(|_| DriverError::Bus)
    }

    async fn write(&self, _port: &P, buf: &[u8]) -> Result<(), DriverError> {
        self.require_lock();
        let mut spi = self.spi.lock().await;
        spi.write(buf).await.map_err(|_| DriverError::Bus)
    }

    async fn configure(&self, _port: &P, request: u8, args: &[u8]) -> Result<(), DriverError> {
        match BusRequest::try_from(request)? {
            BusRequest::WaitForLock => {
                self.wait_for_lock().await;
                Ok(())
            }
            BusRequest::ReleaseLock => {
                self.release_lock();
                Ok(())
            }
            BusRequest::SetDataRate => self.set_rate(decode_rate(args)?).await,
        }
    }
}

// ---------------------------------------------------------------------------
// BusPort
// ---------------------------------------------------------------------------

/// Data phase of one adapter transaction.
pub(crate) enum Transfer<'b> {
    Read(&'b mut [u8]),
    Write(&'b [u8]),
}

/// Handle-checked access to the bus transport for the other adapters.
///
/// Only reaches the transport row of the table, so adapter code can never
/// recurse back into another adapter.
pub struct BusPort<'a, M: RawMutex, S> {
    bus: &'a DeviceRecord<M, SpiTransport<M, S>>,
}

impl<'a, M: RawMutex, S: SpiPeripheral> BusPort<'a, M, S> {
    pub(crate) fn new(bus: &'a DeviceRecord<M, SpiTransport<M, S>>) -> Self {
        Self { bus }
    }

    fn resolve(&self, handle: Handle) -> Result<&'a SpiTransport<M, S>, DriverError> {
        match handle.slot() {
            BUS_SLOT => {
                self.bus.ensure_initialized();
                Ok(&self.bus.driver)
            }
            slot if slot < DEVICE_COUNT => Err(DriverError::InvalidHandle),
            _ => halt(Fault::InvalidHandle(handle.raw())),
        }
    }

    /// `WAIT_FOR_LOCK` through `bus`.
    pub async fn lock(&self, bus: Handle) -> Result<(), DriverError> {
        self.configure(bus, BusRequest::WaitForLock.code(), &[]).await
    }

    /// `RELEASE_LOCK` through `bus`.
    pub async fn unlock(&self, bus: Handle) -> Result<(), DriverError> {
        self.configure(bus, BusRequest::ReleaseLock.code(), &[]).await
    }

    /// `SET_DATA_RATE` through `bus`.
    pub async fn set_rate(&self, bus: Handle, hz: u32) -> Result<(), DriverError> {
        self.configure(bus, BusRequest::SetDataRate.code(), &hz.to_le_bytes())
            .await
    }

    /// Full-duplex transfer through `bus`.
    pub async fn read(&self, bus: Handle, buf: &mut [u8]) -> Result<(), DriverError> {
        Driver::<()>::read(self.resolve(bus)?, &(), buf).await
    }

    /// Write through `bus`.
    pub async fn write(&self, bus: Handle, buf: &[u8]) -> Result<(), DriverError> {
        Driver::<()>::write(self.resolve(bus)?, &(), buf).await
    }

    pub(crate) async fn transfer(&self, bus: Handle, data: Transfer<'_>) -> Result<(), DriverError> {
        match data {
            Transfer::Read(buf) => self.read(bus, buf).await,
            Transfer::Write(buf) => self.write(bus, buf).await,
        }
    }

    /// Any bus request through `bus`.
    pub async fn configure(&self, bus: Handle, request: u8, args: &[u8]) -> Result<(), DriverError> {
        Driver::<()>::configure(self.resolve(bus)?, &(), request, args).await
    }

    /// Close the dependent bus handle held by an adapter.
    pub async fn close(&self, bus: Handle) -> Result<(), DriverError> {
        self.resolve(bus)?;
        self.bus.close(&()).await
    }

    /// Close the handle an adapter has bound, if any.
    pub(crate) async fn close_bound(&self, bound: Option<Handle>) -> Result<(), DriverError> {
        match bound {
            Some(bus) => self.close(bus).await,
            None => Ok(()),
        }
    }
}
