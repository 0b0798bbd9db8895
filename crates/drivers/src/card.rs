//! SD card adapter (SPI mode).
//!
//! Unlike the other bus adapters the card does not wrap each call in its own
//! lock-scoped transaction. The block protocol needs the bus held across a
//! command, its response poll and the data phase, so the lock and the
//! chip-select are separate configure requests:
//!
//! ```text
//! LOCK_BUS -> ASSERT_CS -> write/read ... -> DEASSERT_CS -> RELEASE_BUS
//! ```
//!
//! Stepping outside that order is a caller bug and halts.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embedded_hal::digital::OutputPin;
use platform::config::CARD_SPI_HZ;
use platform::SpiPeripheral;

use crate::ctrl::CardRequest;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::fault::{halt, Fault};
use crate::handle::{Handle, OpenFlags};
use crate::transport::BusPort;

#[derive(Clone, Copy, Default)]
struct CardState {
    bus: Option<Handle>,
    locked: bool,
    selected: bool,
}

/// Adapter for `/dev/sdcard`.
pub struct SdAdapter<M: RawMutex, O> {
    cs: BlockingMutex<M, RefCell<O>>,
    state: BlockingMutex<M, Cell<CardState>>,
}

impl<M: RawMutex, O: OutputPin> SdAdapter<M, O> {
    /// Single opener.
    pub const MAX_REFS: u8 = 1;

    /// Wrap the card's chip-select.
    pub fn new(cs: O) -> Self {
        Self {
            cs: BlockingMutex::new(RefCell::new(cs)),
            state: BlockingMutex::new(Cell::new(CardState::default())),
        }
    }

    pub(crate) fn init(&mut self) -> Result<(), DriverError> {
        self.cs.get_mut().get_mut().set_high().map_err(|_| DriverError::ChipSelect)
    }

    fn state(&self) -> CardState {
        self.state.lock(Cell::get)
    }

    fn update(&self, f: impl FnOnce(&mut CardState)) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            f(&mut state);
            cell.set(state);
        });
    }

    fn bus(&self) -> Result<Handle, DriverError> {
        self.state().bus.ok_or(DriverError::InvalidHandle)
    }

    fn drive_cs(&self, selected: bool) -> Result<(), DriverError> {
        let level = self.cs.lock(|cs| {
            let mut cs = cs.borrow_mut();
            if selected { cs.set_low() } else { cs.set_high() }
        });
        level.map_err(|_| DriverError::ChipSelect)?;
        self.update(|s| s.selected = selected);
        Ok(())
    }

    async fn lock_bus<S: SpiPeripheral>(&self, port: &BusPort<'_, M, S>) -> Result<(), DriverError> {
        if self.state().locked {
            return Ok(());
        }
        port.lock(self.bus()?).await?;
        self.update(|s| s.locked = true);
        Ok(())
    }

    async fn release_bus<S: SpiPeripheral>(&self, port: &BusPort<'_, M, S>) -> Result<(), DriverError> {
        let state = self.state();
        if !state.locked || state.selected {
            halt(Fault::CardLockProtocol);
        }
        port.unlock(self.bus()?).await?;
        self.update(|s| s.locked = false);
        Ok(())
    }

    fn require_lock(&self) {
        if !self.state().locked {
            halt(Fault::CardLockProtocol);
        }
    }
}

impl<M: RawMutex, O: OutputPin, S: SpiPeripheral> Driver<BusPort<'_, M, S>> for SdAdapter<M, O> {
    async fn open(&self, _port: &BusPort<'_, M, S>, _flags: OpenFlags) -> Result<(), DriverError> {
        Ok(())
    }

    async fn close(&self, port: &BusPort<'_, M, S>) -> Result<(), DriverError> {
        let state = self.state();
        if state.selected {
            self.drive_cs(false)?;
        }
        if let (Some(bus), true) = (state.bus, state.locked) {
            port.unlock(bus).await?;
            self.update(|s| s.locked = false);
        }
        port.close_bound(state.bus).await?;
        self.update(|s| *s = CardState::default());
        Ok(())
    }

    async fn read(&self, port: &BusPort<'_, M, S>, buf: &mut [u8]) -> Result<(), DriverError> {
        self.require_lock();
        if !self.state().selected {
            halt(Fault::CardNotSelected);
        }
        let bus = self.bus()?;
        port.set_rate(bus, CARD_SPI_HZ).await?;
        port.read(bus, buf).await
    }

    async fn write(&self, port: &BusPort<'_, M, S>, buf: &[u8]) -> Result<(), DriverError> {
        self.require_lock();
        let bus = self.bus()?;
        port.set_rate(bus, CARD_SPI_HZ).await?;
        port.write(bus, buf).await
    }

    async fn configure(
        &self,
        port: &BusPort<'_, M, S>,
        request: u8,
        args: &[u8],
    ) -> Result<(), DriverError> {
        match CardRequest::try_from(request)? {
            CardRequest::AssertCs => {
                self.require_lock();
                self.drive_cs(true)
            }
            CardRequest::DeassertCs => self.drive_cs(false),
            CardRequest::LockBus => self.lock_bus(port).await,
            CardRequest::ReleaseBus => self.release_bus(port).await,
            CardRequest::SetBusHandle => {
                let bus = Handle::from_arg(args)?;
                let state = self.state();
                if state.locked {
                    warn!("sdcard: bus handle change while holding the bus");
                    return Err(DriverError::BadArgument);
                }
                port.close_bound(state.bus).await?;
                self.update(|s| s.bus = Some(bus));
                Ok(())
            }
        }
    }
}
