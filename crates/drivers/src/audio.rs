//! VS1053 audio decoder adapter.
//!
//! The decoder has two chip-selects on the shared bus: XCS for the serial
//! command interface (register reads and writes) and XDCS for the serial data
//! interface (compressed audio). `SELECT_COMMAND` / `SELECT_DATA` pick which
//! one the following transactions use. Every transaction waits for DREQ high
//! inside the bus lock before asserting either line.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use platform::config::{AUDIO_SPI_HZ, MAX_READY_POLLS, READY_POLL_INTERVAL_US};
use platform::SpiPeripheral;

use crate::ctrl::AudioRequest;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::handle::{Handle, OpenFlags};
use crate::transport::{BusPort, Transfer};

/// Pins wired to the decoder.
pub struct AudioPins<O, I> {
    /// Command chip-select, active low.
    pub xcs: O,
    /// Data chip-select, active low.
    pub xdcs: O,
    /// Data request line, high when the decoder can take 32 bytes.
    pub dreq: I,
}

/// Which decoder interface the next transaction addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Interface {
    /// SCI, selected by XCS.
    Command,
    /// SDI, selected by XDCS.
    Data,
}

#[derive(Clone, Copy)]
struct AudioState {
    bus: Option<Handle>,
    interface: Interface,
}

/// Adapter for `/dev/vs1053`.
pub struct Vs1053<M: RawMutex, O, I, D> {
    pins: BlockingMutex<M, RefCell<AudioPins<O, I>>>,
    state: BlockingMutex<M, Cell<AudioState>>,
    delay: D,
}

impl<M, O, I, D> Vs1053<M, O, I, D>
where
    M: RawMutex,
    O: OutputPin,
    I: InputPin,
    D: DelayNs + Clone,
{
    /// Single opener.
    pub const MAX_REFS: u8 = 1;

    /// Wrap the decoder pins. `delay` paces the DREQ poll.
    pub fn new(pins: AudioPins<O, I>, delay: D) -> Self {
        Self {
            pins: BlockingMutex::new(RefCell::new(pins)),
            state: BlockingMutex::new(Cell::new(AudioState {
                bus: None,
                interface: Interface::Command,
            })),
            delay,
        }
    }

    pub(crate) fn init(&mut self) -> Result<(), DriverError> {
        let pins = self.pins.get_mut().get_mut();
        pins.xcs.set_high().map_err(|_| DriverError::ChipSelect)?;
        pins.xdcs.set_high().map_err(|_| DriverError::ChipSelect)?;
        Ok(())
    }

    /// Interface the next transaction will use.
    pub fn interface(&self) -> Interface {
        self.state.lock(Cell::get).interface
    }

    fn bound(&self) -> Option<Handle> {
        self.state.lock(Cell::get).bus
    }

    fn update(&self, f: impl FnOnce(&mut AudioState)) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            f(&mut state);
            cell.set(state);
        });
    }

    fn bus(&self) -> Result<Handle, DriverError> {
        self.state.lock(Cell::get).bus.ok_or(DriverError::InvalidHandle)
    }

    fn chip_select(&self, interface: Interface, active: bool) -> Result<(), DriverError> {
        self.pins.lock(|pins| {
            let mut pins = pins.borrow_mut();
            let pin = match interface {
                Interface::Command => &mut pins.xcs,
                Interface::Data => &mut pins.xdcs,
            };
            let level = if active { pin.set_low() } else { pin.set_high() };
            level.map_err(|_| DriverError::ChipSelect)
        })
    }

    fn ready(&self) -> bool {
        self.pins
            .lock(|pins| pins.borrow_mut().dreq.is_high())
            .unwrap_or(false)
    }

    async fn wait_ready(&self) -> Result<(), DriverError> {
        let mut delay = self.delay.clone();
        for _ in 0..MAX_READY_POLLS {
            if self.ready() {
                return Ok(());
            }
            delay.delay_us(READY_POLL_INTERVAL_US).await;
        }
        warn!("vs1053: DREQ low after {} polls", MAX_READY_POLLS);
        Err(DriverError::NotReady)
    }

    async fn transaction<S: SpiPeripheral>(
        &self,
        port: &BusPort<'_, M, S>,
        data: Transfer<'_>,
    ) -> Result<(), DriverError> {
        let bus = self.bus()?;
        let interface = self.interface();
        port.lock(bus).await?;
        let result = self.locked_transfer(port, bus, interface, data).await;
        port.unlock(bus).await?;
        result
    }

    async fn locked_transfer<S: SpiPeripheral>(
        &self,
        port: &BusPort<'_, M, S>,
        bus: Handle,
        interface: Interface,
        data: Transfer<'_>,
    ) -> Result<(), DriverError> {
        port.set_rate(bus, AUDIO_SPI_HZ).await?;
        self.wait_ready().await?;
        self.chip_select(interface, true)?;
        let result = port.transfer(bus, data).await;
        let deselect = self.chip_select(interface, false);
        result.and(deselect)
    }
}

impl<M, O, I, D, S> Driver<BusPort<'_, M, S>> for Vs1053<M, O, I, D>
where
    M: RawMutex,
    O: OutputPin,
    I: InputPin,
    D: DelayNs + Clone,
    S: SpiPeripheral,
{
    async fn open(&self, _port: &BusPort<'_, M, S>, _flags: OpenFlags) -> Result<(), DriverError> {
        self.update(|s| s.interface = Interface::Command);
        Ok(())
    }

    async fn close(&self, port: &BusPort<'_, M, S>) -> Result<(), DriverError> {
        port.close_bound(self.bound()).await?;
        self.update(|s| s.bus = None);
        Ok(())
    }

    async fn read(&self, port: &BusPort<'_, M, S>, buf: &mut [u8]) -> Result<(), DriverError> {
        if self.interface() != Interface::Command {
            return Err(DriverError::ChipSelect);
        }
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
        match AudioRequest::try_from(request)? {
            AudioRequest::SelectData => self.update(|s| s.interface = Interface::Data),
            AudioRequest::SelectCommand => self.update(|s| s.interface = Interface::Command),
            AudioRequest::SetBusHandle => {
                let bus = Handle::from_arg(args)?;
                port.close_bound(self.bound()).await?;
                self.update(|s| s.bus = Some(bus));
            }
        }
        Ok(())
    }
}
