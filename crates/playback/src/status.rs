//! Playback status machine.
//!
//! - `OFF → INIT` on start, `INIT → IN_PROGRESS` once the stream is open
//! - `INIT | IN_PROGRESS → PAUSE` on pause, `PAUSE → IN_PROGRESS` on resume
//! - `IN_PROGRESS → DONE` at end of file, `DONE → INIT` on start
//! - every state except `OFF` goes to `OFF` on stop
//!
//! [`PlaybackStatus`] only answers which requests a state accepts; the
//! orchestrator owns the transitions and the I/O that goes with them.

/// Current playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackStatus {
    /// Nothing playing. Initial state and the end of every session.
    #[default]
    Off,
    /// A start request was accepted; the stream is being opened.
    Init,
    /// Chunks are flowing to the decoder.
    InProgress,
    /// Draining is suspended; any buffered chunk is kept.
    Pause,
    /// The track reached end of file. The file stays loaded.
    Done,
}

impl PlaybackStatus {
    /// `stop` applies to every state except `Off`.
    pub const fn accepts_stop(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// `pause` applies while starting or playing.
    pub const fn accepts_pause(self) -> bool {
        matches!(self, Self::Init | Self::InProgress)
    }

    /// `resume` applies only while paused.
    pub const fn accepts_resume(self) -> bool {
        matches!(self, Self::Pause)
    }

    /// Starting or playing.
    pub const fn is_in_progress(self) -> bool {
        matches!(self, Self::Init | Self::InProgress)
    }

    /// Only `InProgress` turns buffer-needed events into file reads.
    pub const fn accepts_buffer_needed(self) -> bool {
        matches!(self, Self::InProgress)
    }
}

impl core::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Off => "OFF",
            Self::Init => "INIT",
            Self::InProgress => "IN_PROGRESS",
            Self::Pause => "PAUSE",
            Self::Done => "DONE",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::PlaybackStatus::{self, Done, Init, InProgress, Off, Pause};

    const ALL: [PlaybackStatus; 5] = [Off, Init, InProgress, Pause, Done];

    #[test]
    fn starts_off() {
        assert_eq!(PlaybackStatus::default(), Off);
    }

    #[test]
    fn stop_from_everything_but_off() {
        for s in ALL {
            assert_eq!(s.accepts_stop(), s != Off, "{s}");
        }
    }

    #[test]
    fn resume_only_from_pause() {
        let accepting: Vec<_> = ALL.into_iter().filter(|s| s.accepts_resume()).collect();
        assert_eq!(accepting, [Pause]);
    }

    #[test]
    fn pause_from_init_or_in_progress() {
        let accepting: Vec<_> = ALL.into_iter().filter(|s| s.accepts_pause()).collect();
        assert_eq!(accepting, [Init, InProgress]);
        assert!(ALL.iter().all(|s| s.accepts_pause() == s.is_in_progress()));
    }

    #[test]
    fn display_uses_upper_case_names() {
        assert_eq!(InProgress.to_string(), "IN_PROGRESS");
    }
}
