//! Track names.

use heapless::String;
use platform::config::TRACK_NAME_MAX;
use thiserror_no_std::Error;

/// Why a name was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackNameError {
    /// Empty string.
    #[error("empty track name")]
    Empty,
    /// Longer than [`TRACK_NAME_MAX`] bytes.
    #[error("track name too long")]
    TooLong,
}

/// Name of a file in storage, at most [`TRACK_NAME_MAX`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackName(String<TRACK_NAME_MAX>);

impl TrackName {
    /// Validate and copy `name`.
    pub fn new(name: &str) -> Result<Self, TrackNameError> {
        if name.is_empty() {
            return Err(TrackNameError::Empty);
        }
        let mut s = String::new();
        s.push_str(name).map_err(|_| TrackNameError::TooLong)?;
        Ok(Self(s))
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<&str> for TrackName {
    type Error = TrackNameError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}

impl PartialEq<str> for TrackName {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl core::fmt::Display for TrackName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for TrackName {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}
