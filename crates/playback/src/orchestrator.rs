//! The orchestrator task.
//!
//! Waits on the player's event group and turns each batch of events into
//! status transitions, file I/O and stream open/close. Within one batch the
//! events are handled in a fixed order: track change, start, stop, pause,
//! resume, then buffer-needed. Stop and pause discard a buffer-needed from the
//! same batch; a successful start or a resume with nothing buffered implies
//! one.

use drivers::{Board, DeviceRegistry};
use embassy_sync::blocking_mutex::raw::RawMutex;
use platform::config::STREAM_CHUNK_SIZE;
use platform::{File, Storage};

use crate::events::PlayerEvents;
use crate::player::Player;
use crate::status::PlaybackStatus;

/// Orchestrator over a storage back end.
pub struct Orchestrator<'a, M: RawMutex, B: Board, S: Storage> {
    player: &'a Player<M>,
    registry: &'a DeviceRegistry<M, B>,
    storage: S,
    file: Option<S::File>,
    /// A chunk read from the file that the stream refused; it goes out
    /// before anything else is read.
    held: Option<Held>,
}

/// Bytes already read from the file but not yet in the stream's slot.
struct Held {
    buf: [u8; STREAM_CHUNK_SIZE],
    len: usize,
}

impl Held {
    fn data(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or_default()
    }
}

impl<'a, M: RawMutex, B: Board, S: Storage> Orchestrator<'a, M, B, S> {
    /// Orchestrator reading tracks from `storage`.
    pub fn new(player: &'a Player<M>, registry: &'a DeviceRegistry<M, B>, storage: S) -> Self {
        Self {
            player,
            registry,
            storage,
            file: None,
            held: None,
        }
    }

    /// Handle events forever.
    pub async fn run(&mut self) -> ! {
        loop {
            self.step().await;
        }
    }

    /// Wait for at least one event, then handle everything pending.
    pub async fn step(&mut self) {
        let events = self.player.events().wait_any().await;
        self.handle(events).await;
    }

    async fn handle(&mut self, mut events: PlayerEvents) {
        trace!("orchestrator: events {}", events.bits());

        if events.contains(PlayerEvents::TRACK_QUEUED) {
            self.switch_track().await;
        }

        if events.contains(PlayerEvents::START) {
            if self.begin().await {
                events.insert(PlayerEvents::BUFFER_NEEDED);
            } else {
                events.remove(PlayerEvents::BUFFER_NEEDED);
            }
        }

        if events.contains(PlayerEvents::STOP) {
            events.remove(PlayerEvents::BUFFER_NEEDED);
            if self.player.status().accepts_stop() {
                self.stop().await;
            }
        }

        if events.contains(PlayerEvents::PAUSE) {
            events.remove(PlayerEvents::BUFFER_NEEDED);
            if self.player.status().accepts_pause() {
                self.player.stream().pause();
                self.player.set_status(PlaybackStatus::Pause);
            }
        }

        if events.contains(PlayerEvents::RESUME) && self.player.status().accepts_resume() {
            self.player.set_status(PlaybackStatus::InProgress);
            if !self.player.stream().resume() {
                events.insert(PlayerEvents::BUFFER_NEEDED);
            }
        }

        if events.contains(PlayerEvents::BUFFER_NEEDED) && self.player.status().accepts_buffer_needed() {
            self.feed().await;
        }
    }

    /// Pick up the queued name. A different track closes whatever is open.
    async fn switch_track(&mut self) {
        let Some(track) = self.player.take_queued() else {
            return;
        };
        if self.file.is_some() && self.player.loaded_track().as_ref() == Some(&track) {
            return;
        }
        self.player.stream().close(self.registry).await;
        self.file = None;
        self.held = None;
        info!("track {}", track);
        self.player.set_track(track);
    }

    /// Open (or rewind) the current track and open the stream. On failure
    /// the session goes back to `OFF`.
    async fn begin(&mut self) -> bool {
        self.held = None;
        let rewound = if let Some(file) = self.file.as_mut() {
            file.rewind().await.is_ok()
        } else {
            self.load().await
        };
        if !rewound {
            self.stop().await;
            return false;
        }
        self.player.set_status(PlaybackStatus::Init);
        match self.player.stream().open(self.registry).await {
            Ok(()) => {
                self.player.set_status(PlaybackStatus::InProgress);
                true
            }
            Err(e) => {
                error!("start: stream open failed: {}", e);
                self.stop().await;
                false
            }
        }
    }

    async fn load(&mut self) -> bool {
        let Some(track) = self.player.track() else {
            warn!("start: no track");
            return false;
        };
        match self.storage.open_file(track.as_str()).await {
            Ok(file) => {
                debug!("opened {} ({} bytes)", track, file.size());
                self.file = Some(file);
                self.player.set_loaded(true);
                true
            }
            Err(_) => {
                error!("start: cannot open {}", track);
                false
            }
        }
    }

    async fn stop(&mut self) {
        self.player.stream().close(self.registry).await;
        self.file = None;
        self.held = None;
        self.player.set_loaded(false);
        self.player.set_status(PlaybackStatus::Off);
    }

    /// Read the next chunk into the stream, or finish the track at end of
    /// file. The file stays open after `DONE` so a restart only rewinds.
    ///
    /// A chunk the stream refuses is held and offered again on the next
    /// buffer-needed; the file is not read past it.
    async fn feed(&mut self) {
        if let Some(held) = self.held.take() {
            if !self.player.stream().submit(held.data()) {
                warn!("feed: slot still occupied, holding {} bytes", held.len);
                self.held = Some(held);
            }
            return;
        }
        let Some(file) = self.file.as_mut() else {
            self.stop().await;
            return;
        };
        let mut buf = [0u8; STREAM_CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => {
                self.player.stream().close(self.registry).await;
                self.player.set_status(PlaybackStatus::Done);
            }
            Ok(len) => {
                let chunk = Held { buf, len };
                if !self.player.stream().submit(chunk.data()) {
                    warn!("feed: slot still occupied, holding {} bytes", len);
                    self.held = Some(chunk);
                }
            }
            Err(_) => {
                error!("feed: read failed");
                self.stop().await;
            }
        }
    }
}
