//! Playback-side errors.
//!
//! None of these reach the control surface; they are logged and turned into
//! a state change (usually back to OFF).

use drivers::DriverError;
use thiserror_no_std::Error;

/// Failure while driving the decoder stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// Registry or adapter error.
    #[error("decoder: {0}")]
    Driver(#[from] DriverError),
    /// No decoder handle is open.
    #[error("stream not open")]
    NotOpen,
}
