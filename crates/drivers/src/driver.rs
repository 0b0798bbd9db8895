//! Adapter contract and the per-device record the registry keeps.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;

use crate::error::DriverError;
use crate::fault::{halt, Fault};
use crate::handle::OpenFlags;

/// Device-specific half of the driver contract.
///
/// `P` is whatever the adapter needs to reach other devices; every adapter on
/// the shared bus takes a [`BusPort`](crate::transport::BusPort), the bus
/// transport and the touch controller accept any port and ignore it.
///
/// None of these methods is called under the device's record lock except
/// `open` and `close`; multi-step protocols lock for themselves.
pub trait Driver<P: ?Sized> {
    /// Called with the record lock held, before the refcount is bumped.
    async fn open(&self, port: &P, flags: OpenFlags) -> Result<(), DriverError>;

    /// Called with the record lock held, before the refcount drops.
    async fn close(&self, port: &P) -> Result<(), DriverError>;

    /// Fill `buf` from the device.
    async fn read(&self, port: &P, buf: &mut [u8]) -> Result<(), DriverError>;

    /// Send `buf` to the device.
    async fn write(&self, port: &P, buf: &[u8]) -> Result<(), DriverError>;

    /// Apply a family-specific request.
    async fn configure(&self, port: &P, request: u8, args: &[u8]) -> Result<(), DriverError>;
}

/// One row of the device table.
pub(crate) struct DeviceRecord<M: RawMutex, D> {
    pub(crate) id: &'static str,
    initialized: bool,
    max_refs: u8,
    refs: Mutex<M, u8>,
    pub(crate) driver: D,
}

impl<M: RawMutex, D> DeviceRecord<M, D> {
    pub(crate) const fn new(id: &'static str, max_refs: u8, driver: D) -> Self {
        Self {
            id,
            initialized: false,
            max_refs,
            refs: Mutex::new(0),
            driver,
        }
    }

    /// Run the adapter's initializer once. A failure is fatal.
    pub(crate) fn init_with(&mut self, init: impl FnOnce(&mut D) -> Result<(), DriverError>) {
        if self.initialized {
            warn!("{} already initialized", self.id);
            return;
        }
        if let Err(e) = init(&mut self.driver) {
            halt(Fault::InitFailed(self.id, e));
        }
        self.initialized = true;
        debug!("{} initialized", self.id);
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Halt unless the record has been initialized.
    pub(crate) fn ensure_initialized(&self) {
        if !self.initialized {
            halt(Fault::DeviceNotInitialized(self.id));
        }
    }

    pub(crate) async fn open<P: ?Sized>(&self, port: &P, flags: OpenFlags) -> Result<(), DriverError>
    where
        D: Driver<P>,
    {
        self.ensure_initialized();
        let mut refs = self.refs.lock().await;
        if *refs >= self.max_refs {
            warn!("open {}: already {} of {} refs", self.id, *refs, self.max_refs);
            return Err(DriverError::TooManyRefs);
        }
        if let Err(e) = self.driver.open(port, flags).await {
            warn!("open {} failed: {}", self.id, e);
            return Err(e);
        }
        *refs = refs.saturating_add(1);
        debug!("opened {} ({} refs)", self.id, *refs);
        Ok(())
    }

    pub(crate) async fn close<P: ?Sized>(&self, port: &P) -> Result<(), DriverError>
    where
        D: Driver<P>,
    {
        self.ensure_initialized();
        let mut refs = self.refs.lock().await;
        if *refs == 0 {
            return Err(DriverError::DeviceNotOpen);
        }
        self.driver.close(port).await?;
        *refs = refs.saturating_sub(1);
        debug!("closed {} ({} refs)", self.id, *refs);
        Ok(())
    }

    pub(crate) async fn ref_count(&self) -> u8 {
        *self.refs.lock().await
    }
}
