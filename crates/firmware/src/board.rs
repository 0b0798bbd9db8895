//! Nucleo-F401RE with the Adafruit music maker and 2.8" TFT shields.
//!
//! | Signal | Pin |
//! |---|---|
//! | SPI1 SCK / MISO / MOSI | PA5 / PA6 / PA7 |
//! | VS1053 XCS | PA8 |
//! | VS1053 XDCS | PB10 |
//! | VS1053 DREQ | PB3 |
//! | ILI9341 CS | PB6 |
//! | ILI9341 D/C | PC7 |
//! | SD card CS | PB5 |
//! | I2C1 SCL / SDA (FT6206) | PB8 / PB9 |

use drivers::audio::AudioPins;
use drivers::display::DisplayPins;
use drivers::{Board, Peripherals};
use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Input, Level, Output, Pin, Pull, Speed};
use embassy_stm32::i2c::{self, I2c};
use embassy_stm32::peripherals::{DMA2_CH2, DMA2_CH3, I2C1, SPI1};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::bind_interrupts;
use embassy_time::Delay;
use platform::config::{BUS_DEFAULT_HZ, TOUCH_I2C_HZ};
use platform::{I2cPeripheral, SpiPeripheral};

bind_interrupts!(struct Irqs {
    I2C1_EV => i2c::EventInterruptHandler<I2C1>;
    I2C1_ER => i2c::ErrorInterruptHandler<I2C1>;
});

/// The board marker.
pub struct F401Board;

impl Board for F401Board {
    type Spi = BusSpi;
    type Pin = Output<'static, AnyPin>;
    type Ready = Input<'static, AnyPin>;
    type I2c = TouchI2c;
    type Delay = Delay;
}

/// SPI1 with DMA in both directions.
pub struct BusSpi(Spi<'static, SPI1, DMA2_CH3, DMA2_CH2>);

impl SpiPeripheral for BusSpi {
    type Error = spi::Error;

    async fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.0.transfer_in_place(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.0.write(data).await
    }

    fn set_frequency(&mut self, hz: u32) -> Result<(), Self::Error> {
        let mut hal = spi::Config::default();
        hal.frequency = Hertz(hz);
        self.0.set_config(&hal).map_err(|()| spi::Error::ModeFault)
    }
}

/// I2C1 in blocking mode; touch reads are a few bytes.
pub struct TouchI2c(I2c<'static, I2C1, NoDma, NoDma>);

impl I2cPeripheral for TouchI2c {
    type Error = i2c::Error;

    async fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.0.blocking_write(address, data)
    }

    async fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) -> Result<(), Self::Error> {
        self.0.blocking_write_read(address, write, read)
    }

    /// The bus clock is fixed at construction to `TOUCH_I2C_HZ`.
    fn set_frequency(&mut self, _hz: u32) -> Result<(), Self::Error> {
        Ok(())
    }
}

fn chip_select(pin: AnyPin) -> Output<'static, AnyPin> {
    Output::new(pin, Level::High, Speed::VeryHigh)
}

/// Claim the board's pins and buses.
pub fn peripherals(p: embassy_stm32::Peripherals) -> Peripherals<F401Board> {
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(BUS_DEFAULT_HZ);
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, p.DMA2_CH3, p.DMA2_CH2, spi_config);

    let touch = I2c::new(
        p.I2C1,
        p.PB8,
        p.PB9,
        Irqs,
        NoDma,
        NoDma,
        Hertz(TOUCH_I2C_HZ),
        i2c::Config::default(),
    );

    Peripherals {
        spi: BusSpi(spi),
        audio: AudioPins {
            xcs: chip_select(p.PA8.degrade()),
            xdcs: chip_select(p.PB10.degrade()),
            dreq: Input::new(p.PB3.degrade(), Pull::None),
        },
        display: DisplayPins {
            cs: chip_select(p.PB6.degrade()),
            dc: Output::new(p.PC7.degrade(), Level::Low, Speed::VeryHigh),
        },
        card_cs: chip_select(p.PB5.degrade()),
        touch: TouchI2c(touch),
        delay: Delay,
    }
}
