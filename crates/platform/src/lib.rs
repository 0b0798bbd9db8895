//! Hardware Abstraction Layer (HAL) for the Muse player
//!
//! This crate provides the trait seams and runtime primitives the driver
//! framework and the playback tasks are written against, so that both can be
//! developed and tested without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Application Layer (firmware crate)
//!         ↓
//! Playback coordination (playback crate)
//!         ↓
//! Driver framework (drivers crate)
//!         ↓
//! Platform HAL (this crate - traits + runtime primitives)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Contents
//!
//! - [`peripheral`] - SPI and I2C peripheral traits
//! - [`storage`] - File system access consumed by the playback orchestrator
//! - [`sync`] - Bus semaphore and event-flag group on top of `embassy-sync`
//! - [`config`] - Compile-time configuration constants
//!
//! # Features
//!
//! - `std`: Enable standard library support (local file storage, mocks)
//! - `defmt`: Enable defmt logging
//!
//! # Example
//!
//! ```no_run
//! use platform::SpiPeripheral;
//!
//! async fn example<S: SpiPeripheral>(spi: &mut S) {
//!     let _ = spi.write(&[0x02, 0x00, 0x08, 0x04]).await;
//! }
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod config;
pub mod peripheral;
pub mod storage;
pub mod sync;

#[cfg(any(test, feature = "std"))]
pub mod storage_local;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use storage::{File, Storage};

// Re-export peripheral types
pub use peripheral::{I2cPeripheral, SpiPeripheral};

// Re-export runtime primitives
pub use sync::{BinarySemaphore, EventFlags, LockNotHeld};
