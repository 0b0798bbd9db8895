//! Driver registry: the fixed device table and the handle-based surface.
//!
//! The table is built once from a board's [`Peripherals`] and initialized
//! with [`DeviceRegistry::init_all`] before the registry is shared. After
//! that every access goes through `&self`:
//!
//! - `open` / `close` serialize on the device record's lock and keep its
//!   reference count.
//! - `read` / `write` / `configure` dispatch straight to the adapter without
//!   taking the record lock; bus adapters take the bus lock for themselves.
//!
//! A handle outside the table, or a device used before `init_all`, halts.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::audio::Vs1053;
use crate::board::{Board, Peripherals};
use crate::card::SdAdapter;
use crate::display::Ili9341;
use crate::driver::{DeviceRecord, Driver};
use crate::error::DriverError;
use crate::fault::{halt, Fault};
use crate::handle::{Handle, OpenFlags};
use crate::touch::Ft6206;
use crate::transport::{BusPort, LockStats, SpiTransport};

/// Device identifiers, in table order.
pub mod ids {
    /// SPI bus transport.
    pub const SPI1: &str = "/dev/spi1";
    /// VS1053 audio decoder.
    pub const VS1053: &str = "/dev/vs1053";
    /// ILI9341 display controller.
    pub const ILI9341: &str = "/dev/ili9341";
    /// SD card.
    pub const SDCARD: &str = "/dev/sdcard";
    /// FT6206 touch controller.
    pub const FT6206: &str = "/dev/ft6206";
}

/// Number of rows in the device table.
pub const DEVICE_COUNT: usize = 5;

pub(crate) const BUS_SLOT: usize = 0;

/// Identifiers indexed by table slot.
pub const DEVICE_IDS: [&str; DEVICE_COUNT] =
    [ids::SPI1, ids::VS1053, ids::ILI9341, ids::SDCARD, ids::FT6206];

type Bus<M, B> = SpiTransport<M, <B as Board>::Spi>;
type Audio<M, B> = Vs1053<M, <B as Board>::Pin, <B as Board>::Ready, <B as Board>::Delay>;
type Display<M, B> = Ili9341<M, <B as Board>::Pin>;
type Card<M, B> = SdAdapter<M, <B as Board>::Pin>;
type Touch<M, B> = Ft6206<M, <B as Board>::I2c>;

/// Runs `$body` with `$rec` bound to the record `$handle` names and `$port`
/// bound to the bus port. Slots past the table halt.
macro_rules! with_record {
    ($reg:expr, $handle:expr, |$rec:ident, $port:ident| $body:expr) => {{
        let reg = $reg;
        let handle: Handle = $handle;
        let $port = BusPort::new(&reg.bus);
        match handle.slot() {
            0 => {
                let $rec = &reg.bus;
                $body
            }
            1 => {
                let $rec = &reg.audio;
                $body
            }
            2 => {
                let $rec = &reg.display;
                $body
            }
            3 => {
                let $rec = &reg.card;
                $body
            }
            4 => {
                let $rec = &reg.touch;
                $body
            }
            _ => halt(Fault::InvalidHandle(handle.raw())),
        }
    }};
}

/// The device table.
pub struct DeviceRegistry<M: RawMutex, B: Board> {
    bus: DeviceRecord<M, Bus<M, B>>,
    audio: DeviceRecord<M, Audio<M, B>>,
    display: DeviceRecord<M, Display<M, B>>,
    card: DeviceRecord<M, Card<M, B>>,
    touch: DeviceRecord<M, Touch<M, B>>,
}

impl<M: RawMutex, B: Board> DeviceRegistry<M, B> {
    /// Build the table. Nothing touches hardware until [`Self::init_all`].
    pub fn new(p: Peripherals<B>) -> Self {
        Self {
            bus: DeviceRecord::new(ids::SPI1, <Bus<M, B>>::MAX_REFS, SpiTransport::new(p.spi)),
            audio: DeviceRecord::new(
                ids::VS1053,
                <Audio<M, B>>::MAX_REFS,
                Vs1053::new(p.audio, p.delay),
            ),
            display: DeviceRecord::new(
                ids::ILI9341,
                <Display<M, B>>::MAX_REFS,
                Ili9341::new(p.display),
            ),
            card: DeviceRecord::new(ids::SDCARD, <Card<M, B>>::MAX_REFS, SdAdapter::new(p.card_cs)),
            touch: DeviceRecord::new(ids::FT6206, <Touch<M, B>>::MAX_REFS, Ft6206::new(p.touch)),
        }
    }

    /// Run every adapter initializer in table order. Any failure halts.
    pub fn init_all(&mut self) {
        self.bus.init_with(SpiTransport::init);
        self.audio.init_with(Vs1053::init);
        self.display.init_with(Ili9341::init);
        self.card.init_with(SdAdapter::init);
        self.touch.init_with(Ft6206::init);
        info!("driver registry ready: {} devices", DEVICE_COUNT);
    }

    /// `true` once [`Self::init_all`] has run.
    pub fn is_initialized(&self) -> bool {
        self.bus.is_initialized()
            && self.audio.is_initialized()
            && self.display.is_initialized()
            && self.card.is_initialized()
            && self.touch.is_initialized()
    }

    /// Open the device registered under `id`.
    pub async fn open(&self, id: &str, flags: OpenFlags) -> Result<Handle, DriverError> {
        let Some(slot) = DEVICE_IDS.iter().position(|known| *known == id) else {
            warn!("open {}: no such device", id);
            return Err(DriverError::DeviceNotFound);
        };
        #[allow(clippy::cast_possible_truncation)] // slot < DEVICE_COUNT
        let handle = Handle::for_slot(slot as u8);
        with_record!(self, handle, |rec, port| rec.open(&port, flags).await)?;
        Ok(handle)
    }

    /// Close `handle`. The reference count drops only if the adapter's close
    /// succeeded.
    pub async fn close(&self, handle: Handle) -> Result<(), DriverError> {
        with_record!(self, handle, |rec, port| rec.close(&port).await)
    }

    /// Read into `buf`; the buffer is overwritten.
    pub async fn read(&self, handle: Handle, buf: &mut [u8]) -> Result<(), DriverError> {
        with_record!(self, handle, |rec, port| {
            rec.ensure_initialized();
            rec.driver.read(&port, buf).await
        })
    }

    /// Write `buf`.
    pub async fn write(&self, handle: Handle, buf: &[u8]) -> Result<(), DriverError> {
        with_record!(self, handle, |rec, port| {
            rec.ensure_initialized();
            rec.driver.write(&port, buf).await
        })
    }

    /// Apply a family-specific request; see [`crate::ctrl`].
    pub async fn configure(&self, handle: Handle, request: u8, args: &[u8]) -> Result<(), DriverError> {
        with_record!(self, handle, |rec, port| {
            rec.ensure_initialized();
            rec.driver.configure(&port, request, args).await
        })
    }

    /// Open handles on `handle`'s device.
    pub async fn ref_count(&self, handle: Handle) -> u8 {
        with_record!(self, handle, |rec, _port| rec.ref_count().await)
    }

    /// Bus lock counters.
    pub fn bus_lock_stats(&self) -> LockStats {
        self.bus.driver.lock_stats()
    }

    /// `true` while an adapter holds the bus lock.
    pub fn bus_is_locked(&self) -> bool {
        self.bus.driver.is_locked()
    }
}

/// Open `/dev/spi1` and bind it to `device` with `request`, the device
/// family's `SET_BUS_HANDLE` code. On failure the bus handle is closed again.
pub async fn bind_bus<M: RawMutex, B: Board>(
    registry: &DeviceRegistry<M, B>,
    device: Handle,
    request: u8,
) -> Result<(), DriverError> {
    let bus = registry.open(ids::SPI1, OpenFlags::READ | OpenFlags::WRITE).await?;
    if let Err(e) = registry.configure(device, request, &bus.to_arg()).await {
        registry.close(bus).await?;
        return Err(e);
    }
    Ok(())
}
