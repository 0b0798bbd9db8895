//! Application configuration and constants
//!
//! Central configuration values used across the workspace. Driver and
//! playback code reference these constants rather than hardcoding values.

/// The application name
pub const APP_NAME: &str = "Muse";

/// The application type/category
pub const APP_TYPE: &str = "MP3 player";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Development mode banner
pub const fn dev_banner() -> &'static str {
    "Muse - Emulator Mode"
}

// ── Playback ────────────────────────────────────────────────────────────────

/// Bytes moved from storage to the streaming task per buffer-needed event.
pub const STREAM_CHUNK_SIZE: usize = 64;

/// Largest write the VS1053 accepts on SDI while DREQ is high.
pub const DECODER_BURST_SIZE: usize = 32;

/// Longest accepted track name, in bytes.
pub const TRACK_NAME_MAX: usize = 32;

// ── Bus clocks ──────────────────────────────────────────────────────────────
//
// APB2 runs at 84 MHz on the F401: the decoder gets APB2/32, the display and
// the card APB2/4.

/// SPI clock used for every VS1053 transaction.
pub const AUDIO_SPI_HZ: u32 = 2_625_000;

/// SPI clock used for every ILI9341 transaction.
pub const DISPLAY_SPI_HZ: u32 = 21_000_000;

/// SPI clock used for every SD card transaction.
pub const CARD_SPI_HZ: u32 = 21_000_000;

/// Clock the transport is configured with at start-up.
pub const BUS_DEFAULT_HZ: u32 = AUDIO_SPI_HZ;

/// I2C clock of the touch controller link.
pub const TOUCH_I2C_HZ: u32 = 100_000;

// ── Decoder ready line ──────────────────────────────────────────────────────

/// Upper bound on DREQ polls per transaction before giving up.
pub const MAX_READY_POLLS: u32 = 10_000;

/// Delay between DREQ polls, in microseconds.
pub const READY_POLL_INTERVAL_US: u32 = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_is_whole_number_of_bursts() {
        assert_eq!(STREAM_CHUNK_SIZE % DECODER_BURST_SIZE, 0);
    }

    #[test]
    fn app_version_matches_manifest() {
        assert_eq!(APP_VERSION, "0.1.0");
    }
}
