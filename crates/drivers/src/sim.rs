//! Host-side board built from `platform::mocks`.
//!
//! [`SimRig`] keeps the handles a test needs for assertions (bus trace,
//! decoder ready line, touch register file, card model) and hands out the
//! matching [`Peripherals`] for a registry.

use embassy_sync::blocking_mutex::raw::RawMutex;
use platform::mocks::{
    BusTrace, FloatingBus, MockI2c, MockPin, MockSpi, ReadyLine, Responder, SdCardSim, YieldDelay,
};

use crate::audio::AudioPins;
use crate::board::{Board, Peripherals};
use crate::display::DisplayPins;
use crate::registry::DeviceRegistry;

/// Pin names as they appear in the bus trace.
pub mod pins {
    /// VS1053 command chip-select.
    pub const VS1053_XCS: &str = "vs1053.xcs";
    /// VS1053 data chip-select.
    pub const VS1053_XDCS: &str = "vs1053.xdcs";
    /// ILI9341 chip-select.
    pub const ILI9341_CS: &str = "ili9341.cs";
    /// ILI9341 data/command line.
    pub const ILI9341_DC: &str = "ili9341.dc";
    /// SD card chip-select.
    pub const SD_CS: &str = "sd.cs";
}

/// Mock board.
pub struct SimBoard;

impl Board for SimBoard {
    type Spi = MockSpi;
    type Pin = MockPin;
    type Ready = ReadyLine;
    type I2c = MockI2c;
    type Delay = YieldDelay;
}

/// Routes MISO to the card model only while the card (or nothing) is
/// selected, so decoder and display traffic never reaches it.
struct CardOnBus {
    card: SdCardSim,
    trace: BusTrace,
}

impl Responder for CardOnBus {
    fn exchange(&mut self, out: u8) -> u8 {
        let selected = self.trace.selected();
        if selected.is_empty() || selected.contains(&pins::SD_CS) {
            self.card.exchange(out)
        } else {
            FloatingBus.exchange(out)
        }
    }
}

/// Mock peripherals plus the handles to inspect them.
#[derive(Clone)]
pub struct SimRig {
    /// Shared bus trace.
    pub trace: BusTrace,
    /// Decoder DREQ.
    pub ready: ReadyLine,
    /// Touch controller registers.
    pub touch: MockI2c,
    /// Card model answering on the bus, if any.
    pub card: Option<SdCardSim>,
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRig {
    /// Rig with a floating MISO and a healthy FT6206.
    pub fn new() -> Self {
        Self {
            trace: BusTrace::new(),
            ready: ReadyLine::new(),
            touch: MockI2c::ft6206(),
            card: None,
        }
    }

    /// Rig with `card` answering on the bus.
    pub fn with_card(card: SdCardSim) -> Self {
        Self {
            card: Some(card),
            ..Self::new()
        }
    }

    /// Fresh peripherals wired to this rig's mocks.
    pub fn peripherals(&self) -> Peripherals<SimBoard> {
        let spi = match &self.card {
            Some(card) => MockSpi::with_responder(
                &self.trace,
                CardOnBus {
                    card: card.clone(),
                    trace: self.trace.clone(),
                },
            ),
            None => MockSpi::new(&self.trace),
        };
        Peripherals {
            spi,
            audio: AudioPins {
                xcs: MockPin::chip_select(pins::VS1053_XCS, &self.trace),
                xdcs: MockPin::chip_select(pins::VS1053_XDCS, &self.trace),
                dreq: self.ready.clone(),
            },
            display: DisplayPins {
                cs: MockPin::chip_select(pins::ILI9341_CS, &self.trace),
                dc: MockPin::line(pins::ILI9341_DC, &self.trace),
            },
            card_cs: MockPin::chip_select(pins::SD_CS, &self.trace),
            touch: self.touch.clone(),
            delay: YieldDelay,
        }
    }

    /// Registry over this rig, already through `init_all`.
    pub fn registry<M: RawMutex>(&self) -> DeviceRegistry<M, SimBoard> {
        let mut registry = DeviceRegistry::new(self.peripherals());
        registry.init_all();
        registry
    }
}
