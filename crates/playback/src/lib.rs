//! Playback coordination for the Muse player
//!
//! Two tasks share a [`Player`]:
//!
//! - the [`Orchestrator`] waits on player events, reads the current track
//!   from [`platform::Storage`] one chunk at a time and opens and closes the
//!   decoder stream;
//! - the [`StreamTask`] drains each chunk into the VS1053 through the driver
//!   registry and asks for the next one.
//!
//! The chunk travels through a single slot, so at most one chunk is ever in
//! flight and file reads are paced by the decoder. The control surface
//! ([`Player::start`], [`Player::stop`], [`Player::pause`],
//! [`Player::resume`]) only posts events and never blocks.
//!
//! # Features
//!
//! - `std`: host build against the mock board
//! - `defmt`: log through defmt, derive `defmt::Format`
//! - `tracing`: log through tracing
//!
//! # Example
//!
//! ```no_run
//! use drivers::{Board, DeviceRegistry};
//! use embassy_sync::blocking_mutex::raw::RawMutex;
//! use playback::{Orchestrator, Player, StreamTask};
//! use platform::Storage;
//!
//! async fn serve<M: RawMutex, B: Board, S: Storage>(
//!     player: &Player<M>,
//!     registry: &DeviceRegistry<M, B>,
//!     storage: S,
//! ) {
//!     let mut orchestrator = Orchestrator::new(player, registry, storage);
//!     let streamer = StreamTask::new(player, registry);
//!     player.start("track001.mp3");
//!     embassy_futures::join::join(orchestrator.run(), streamer.run()).await;
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
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

#[macro_use]
mod fmt;

pub mod chunk;
pub mod codec;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod player;
pub mod status;
pub mod stream;
pub mod track;

pub use error::StreamError;
pub use events::{PlayerEvents, StreamEvents};
pub use orchestrator::Orchestrator;
pub use player::Player;
pub use status::PlaybackStatus;
pub use stream::{Stream, StreamTask};
pub use track::{TrackName, TrackNameError};
