//! The player service object and its control surface.
//!
//! Control calls never do I/O. They check the current status, record the
//! request and post an event; the orchestrator performs the work. A start for
//! a track that is not the loaded one also places the name in a one-deep
//! mailbox.

use core::cell::RefCell;

use drivers::{Board, DeviceRegistry};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use platform::EventFlags;

use crate::events::PlayerEvents;
use crate::status::PlaybackStatus;
use crate::stream::Stream;
use crate::track::TrackName;

struct Workspace {
    status: PlaybackStatus,
    /// The orchestrator holds an open file for `track`.
    file_loaded: bool,
    track: Option<TrackName>,
}

/// Playback state shared by the control surface, the orchestrator and the
/// streaming task. `const`-constructible so it can live in a `static`.
pub struct Player<M: RawMutex> {
    workspace: BlockingMutex<M, RefCell<Workspace>>,
    events: EventFlags<M, PlayerEvents>,
    mailbox: Channel<M, TrackName, 1>,
    stream: Stream<M>,
}

impl<M: RawMutex> Player<M> {
    /// An idle player: status `OFF`, nothing loaded.
    pub const fn new() -> Self {
        Self {
            workspace: BlockingMutex::new(RefCell::new(Workspace {
                status: PlaybackStatus::Off,
                file_loaded: false,
                track: None,
            })),
            events: EventFlags::new(),
            mailbox: Channel::new(),
            stream: Stream::new(),
        }
    }

    fn with_workspace<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        self.workspace.lock(|w| f(&mut w.borrow_mut()))
    }

    // ── Control surface ──────────────────────────────────────────────────

    /// Request playback of `name` from the beginning.
    ///
    /// Accepted in every state. Returns `false` if the name is not a valid
    /// track name, or if another track is already waiting in the mailbox.
    pub fn start(&self, name: &str) -> bool {
        let track = match TrackName::new(name) {
            Ok(track) => track,
            Err(e) => {
                warn!("start refused: {}", e);
                return false;
            }
        };
        let loaded = self.with_workspace(|w| w.file_loaded && w.track.as_ref() == Some(&track));
        if !loaded {
            if self.mailbox.try_send(track).is_err() {
                warn!("start {} refused: a track is already queued", name);
                return false;
            }
            self.events.post(PlayerEvents::TRACK_QUEUED);
        }
        self.set_status(PlaybackStatus::Init);
        self.events.post(PlayerEvents::START);
        true
    }

    /// Request a stop. Refused while `OFF`.
    pub fn stop(&self) -> bool {
        self.request(PlayerEvents::STOP, "stop", PlaybackStatus::accepts_stop)
    }

    /// Request a pause. Accepted while `INIT` or `IN_PROGRESS`.
    pub fn pause(&self) -> bool {
        self.request(PlayerEvents::PAUSE, "pause", PlaybackStatus::accepts_pause)
    }

    /// Request a resume. Accepted only while `PAUSE`.
    pub fn resume(&self) -> bool {
        self.request(PlayerEvents::RESUME, "resume", PlaybackStatus::accepts_resume)
    }

    fn request(&self, event: PlayerEvents, what: &str, accepts: fn(PlaybackStatus) -> bool) -> bool {
        let status = self.status();
        if !accepts(status) {
            warn!("{} refused in {}", what, status);
            return false;
        }
        debug!("{} requested in {}", what, status);
        self.events.post(event);
        true
    }

    /// Current status.
    pub fn status(&self) -> PlaybackStatus {
        self.with_workspace(|w| w.status)
    }

    /// `true` while `INIT` or `IN_PROGRESS`.
    pub fn is_playback_in_progress(&self) -> bool {
        self.status().is_in_progress()
    }

    /// Seconds played on the current stream, 0 when `OFF` or when the
    /// decoder cannot be queried.
    pub async fn elapsed_seconds<B: Board>(&self, registry: &DeviceRegistry<M, B>) -> u16 {
        if self.status() == PlaybackStatus::Off {
            return 0;
        }
        match self.stream.decode_time(registry).await {
            Ok(seconds) => seconds,
            Err(e) => {
                debug!("elapsed time unavailable: {}", e);
                0
            }
        }
    }

    /// The track whose file is open, if any.
    pub fn loaded_track(&self) -> Option<TrackName> {
        self.with_workspace(|w| if w.file_loaded { w.track.clone() } else { None })
    }

    /// The decoder stream.
    pub fn stream(&self) -> &Stream<M> {
        &self.stream
    }

    // ── Orchestrator side ────────────────────────────────────────────────

    pub(crate) fn events(&self) -> &EventFlags<M, PlayerEvents> {
        &self.events
    }

    pub(crate) fn post(&self, event: PlayerEvents) {
        self.events.post(event);
    }

    pub(crate) fn take_queued(&self) -> Option<TrackName> {
        self.mailbox.try_receive().ok()
    }

    pub(crate) fn track(&self) -> Option<TrackName> {
        self.with_workspace(|w| w.track.clone())
    }

    /// Make `track` current; nothing is loaded for it yet.
    pub(crate) fn set_track(&self, track: TrackName) {
        self.with_workspace(|w| {
            w.track = Some(track);
            w.file_loaded = false;
        });
    }

    pub(crate) fn set_loaded(&self, loaded: bool) {
        self.with_workspace(|w| w.file_loaded = loaded);
    }

    pub(crate) fn set_status(&self, status: PlaybackStatus) {
        let old = self.with_workspace(|w| core::mem::replace(&mut w.status, status));
        if old != status {
            info!("status {} -> {}", old, status);
        }
    }
}

impl<M: RawMutex> Default for Player<M> {
    fn default() -> Self {
        Self::new()
    }
}
