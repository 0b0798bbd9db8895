//! Muse MP3 player firmware
//!
//! Application glue on top of the driver framework and the playback tasks:
//! the board definition for the Nucleo-F401RE, track storage on the SD card
//! and touch control.
//!
//! # Architecture
//!
//! ```text
//! main.rs (embassy tasks)  /  emulator example (tokio)
//!         ↓
//! playback (orchestrator, streaming task, player)
//!         ↓
//! drivers (device registry, adapters, SD block protocol)
//!         ↓
//! platform (traits, sync primitives, config)
//! ```
//!
//! # Features
//!
//! - `hardware` - Build for the STM32F401RE target (embassy, defmt)
//! - `emulator` - Build the desktop emulator (tokio, tracing, mock board)
//! - `std` - Enable standard library (for emulator and testing)
//!
//! # Examples
//!
//! ## Hardware Target
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! ```
//!
//! ## Emulator Target
//!
//! ```bash
//! MUSIC_PATH=~/music cargo run --example emulator --features emulator -- track001.mp3
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
// Upgrade relevant warns to deny; keep pedantic as warn (too noisy for firmware)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Critical correctness: deny these
#![deny(clippy::await_holding_lock)] // holding a blocking Mutex across .await is a bug
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline (allow println in tests via clippy.toml)
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)] // common in Rust crates; not a real issue
#![allow(clippy::missing_errors_doc)] // most errors are self-explanatory
// Pedantic lints too noisy for firmware application code:
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(async_fn_in_trait)]

#[cfg(feature = "hardware")]
pub mod board;
pub mod card_storage;
pub mod control;
pub mod playlist;

pub use card_storage::{CardFile, CardStorage, CardStorageError};
pub use control::{toggle, TapDetector};
pub use playlist::{Extent, PLAYLIST};

#[cfg(feature = "hardware")]
pub use board::F401Board;
