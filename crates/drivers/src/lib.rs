//! Device driver framework for the Muse player
//!
//! A fixed table of five peripherals behind one handle-based surface:
//!
//! | Slot | Identifier | Adapter |
//! |---|---|---|
//! | 1 | `/dev/spi1` | [`transport::SpiTransport`] |
//! | 2 | `/dev/vs1053` | [`audio::Vs1053`] |
//! | 3 | `/dev/ili9341` | [`display::Ili9341`] |
//! | 4 | `/dev/sdcard` | [`card::SdAdapter`] |
//! | 5 | `/dev/ft6206` | [`touch::Ft6206`] |
//!
//! Callers open a device by identifier and get a [`Handle`]; everything after
//! that goes through the handle. The decoder, display and card share one SPI
//! bus and arbitrate it through the transport's lock, each adapter binding
//! its own bus handle with a `SET_BUS_HANDLE` request.
//!
//! # Errors
//!
//! Two tiers. Runtime conditions come back as [`DriverError`] with a fixed
//! negative status code. Contract violations (bad handle, device used before
//! start-up, bus lock misuse) go to [`fault::halt`] and stop the system.
//!
//! # Features
//!
//! - `std`: host build with the mock board in [`sim`]
//! - `defmt`: log through defmt, derive `defmt::Format`
//! - `tracing`: log through tracing
//!
//! # Example
//!
//! ```no_run
//! use drivers::{ids, Board, DeviceRegistry, DriverError, OpenFlags};
//! use embassy_sync::blocking_mutex::raw::RawMutex;
//!
//! async fn touch_vendor<M: RawMutex, B: Board>(
//!     registry: &DeviceRegistry<M, B>,
//! ) -> Result<u8, DriverError> {
//!     let touch = registry.open(ids::FT6206, OpenFlags::READ).await?;
//!     let mut reg = [0xA8];
//!     registry.read(touch, &mut reg).await?;
//!     registry.close(touch).await?;
//!     Ok(reg[0])
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // only fault::halt may panic, with an explicit allow
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::doc_markdown)] // register and pin names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)] // panics are fault::halt, documented there
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

#[macro_use]
mod fmt;

pub mod audio;
pub mod board;
pub mod card;
pub mod ctrl;
pub mod display;
pub mod driver;
pub mod error;
pub mod fault;
pub mod handle;
pub mod registry;
pub mod sd;
pub mod touch;
pub mod transport;

#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use board::{Board, Peripherals};
pub use error::{status, DriverError};
pub use fault::{halt, Fault};
pub use handle::{Handle, OpenFlags};
pub use registry::{bind_bus, ids, DeviceRegistry, DEVICE_COUNT, DEVICE_IDS};
pub use sd::{CardError, CardKind, SdCard};
pub use transport::LockStats;
