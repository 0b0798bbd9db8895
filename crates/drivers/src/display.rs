//! ILI9341 display adapter.
//!
//! Only the bus side of the controller: chip-select plus the D/C line that
//! tells the controller whether a byte is a command or its parameter data.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embedded_hal::digital::OutputPin;
use platform::config::DISPLAY_SPI_HZ;
use platform::SpiPeripheral;

use crate::ctrl::DisplayRequest;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::handle::{Handle, OpenFlags};
use crate::transport::{BusPort, Transfer};

/// Pins wired to the display controller.
pub struct DisplayPins<O> {
    /// Chip-select, active low.
    pub cs: O,
    /// Data/command select: high for data, low for commands.
    pub dc: O,
}

/// Adapter for `/dev/ili9341`.
pub struct Ili9341<M: RawMutex, O> {
    pins: BlockingMutex<M, RefCell<DisplayPins<O>>>,
    bus: BlockingMutex<M, Cell<Option<Handle>>>,
}

impl<M: RawMutex, O: OutputPin> Ili9341<M, O> {
    /// Single opener.
    pub const MAX_REFS: u8 = 1;

    /// Wrap the display pins.
    pub fn new(pins: DisplayPins<O>) -> Self {
        Self {
            pins: BlockingMutex::new(RefCell::new(pins)),
            bus: BlockingMutex::new(Cell::new(None)),
        }
    }

    pub(crate) fn init(&mut self) -> Result<(), DriverError> {
        let pins = self.pins.get_mut().get_mut();
        pins.cs.set_high().map_err(|_| DriverError::ChipSelect)?;
        pins.dc.set_low().map_err(|_| DriverError::ChipSelect)
    }

    fn with_pins<T>(&self, f: impl FnOnce(&mut DisplayPins<O>) -> T) -> T {
        self.pins.lock(|pins| f(&mut pins.borrow_mut()))
    }

    async fn transaction<S: SpiPeripheral>(
        &self,
        port: &BusPort<'_, M, S>,
        data: Transfer<'_>,
    ) -> Result<(), DriverError> {
        let bus = self.bus.lock(Cell::get).ok_or(DriverError::InvalidHandle)?;
        port.lock(bus).await?;
        let result = async {
            port.set_rate(bus, DISPLAY_SPI_HZ).await?;
            self.with_pins(|p| p.cs.set_low()).map_err(|_| DriverError::ChipSelect)?;
            let moved = port.transfer(bus, data).await;
            let deselect = self.with_pins(|p| p.cs.set_high()).map_err(|_| DriverError::ChipSelect);
            moved.and(deselect)
        }
        .await;
        port.unlock(bus).await?;
        result
    }
}

impl<M: RawMutex, O: OutputPin, S: SpiPeripheral> Driver<BusPort<'_, M, S>> for Ili9341<M, O> {
    async fn open(&self, _port: &BusPort<'_, M, S>, _flags: OpenFlags) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self, port: &BusPort<'_, M, S>) -> Result<(), DriverError> {
        port.close_bound(self.bus.lock(Cell::get)).await?;
        self.bus.lock(|b| b.set(None));
        Ok(())
    }

    async fn read(&self, port: &BusPort<'_, M, S>, buf: &mut [u8]) -> Result<(), DriverError> {
        self.transaction(port, Transfer::Read(buf)).await
    }

    async fn write(&self, port: &BusPort<'_, M, S>, buf: &[u8]) -> Result<(), DriverError> {
        self.transaction(port, Transfer::Write(buf)).await
    }

    async fn configure(
        &self,
        port: &BusPort<'_, M, S>,
        request: u8,
        args: &[u8],
    ) -> Result<(), DriverError> {
        match DisplayRequest::try_from(request)? {
            DisplayRequest::SelectData => {
                self.with_pins(|p| p.dc.set_high()).map_err(|_| DriverError::ChipSelect)
            }
            DisplayRequest::SelectCommand => {
                self.with_pins(|p| p.dc.set_low()).map_err(|_| DriverError::ChipSelect)
            }
            DisplayRequest::SetBusHandle => {
                let bus = Handle::from_arg(args)?;
                port.close_bound(self.bus.lock(Cell::get)).await?;
                self.bus.lock(|b| b.set(Some(bus)));
                Ok(())
            }
        }
    }
}
