//! Board description: the concrete peripheral types behind the device table.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use platform::{I2cPeripheral, SpiPeripheral};

use crate::audio::AudioPins;
use crate::display::DisplayPins;

/// Peripheral types of one board.
///
/// Implemented by a zero-sized marker per target: the STM32 board in the
/// firmware crate, the mock board in [`sim`](crate::sim) for host builds.
pub trait Board {
    /// The shared SPI bus.
    type Spi: SpiPeripheral;
    /// Chip-select and control outputs.
    type Pin: OutputPin;
    /// Decoder DREQ input.
    type Ready: InputPin;
    /// Touch controller link.
    type I2c: I2cPeripheral;
    /// Delay used to pace ready-line polls.
    type Delay: DelayNs + Clone;
}

/// Everything the registry takes ownership of at construction.
pub struct Peripherals<B: Board> {
    /// Shared SPI bus.
    pub spi: B::Spi,
    /// VS1053 pins.
    pub audio: AudioPins<B::Pin, B::Ready>,
    /// ILI9341 pins.
    pub display: DisplayPins<B::Pin>,
    /// SD card chip-select.
    pub card_cs: B::Pin,
    /// I2C link to the FT6206.
    pub touch: B::I2c,
    /// Delay source.
    pub delay: B::Delay,
}
