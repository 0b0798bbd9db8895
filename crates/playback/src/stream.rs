//! Decoder stream and the streaming task.
//!
//! [`Stream`] owns the single chunk slot, the paused flag and the open
//! decoder handle, all behind one blocking lock that is never held across
//! I/O. Decoder I/O itself is serialised by a separate async mutex so the
//! elapsed-time query cannot switch the decoder to command mode in the middle
//! of a data burst.
//!
//! [`StreamTask`] waits for `BUFFER_FULL`, copies the chunk out of the
//! slot, writes it to the decoder in bursts, empties the slot and asks the
//! orchestrator for the next one. The slot counts as occupied for the whole
//! drain.

use core::cell::RefCell;

use drivers::ctrl::AudioRequest;
use drivers::{bind_bus, ids, Board, DeviceRegistry, Handle, OpenFlags};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::mutex::Mutex;
use platform::config::{DECODER_BURST_SIZE, STREAM_CHUNK_SIZE};
use platform::EventFlags;

use crate::chunk::ChunkSlot;
use crate::codec::{decode_time, READ_DECODE_TIME, SOFT_RESET, STREAM_OPEN};
use crate::error::StreamError;
use crate::events::{PlayerEvents, StreamEvents};
use crate::player::Player;

struct StreamState {
    slot: ChunkSlot<STREAM_CHUNK_SIZE>,
    paused: bool,
    /// The chunk in the slot is being written out.
    draining: bool,
    decoder: Option<Handle>,
    /// Bumped on every open so a drain started on an old stream stops
    /// writing once that stream is closed.
    generation: u32,
}

/// A chunk copied out of the slot, with the stream it belongs to.
struct Drained {
    len: usize,
    decoder: Handle,
    generation: u32,
}

/// Single-slot handoff between the orchestrator and the decoder.
pub struct Stream<M: RawMutex> {
    state: BlockingMutex<M, RefCell<StreamState>>,
    events: EventFlags<M, StreamEvents>,
    io: Mutex<M, ()>,
}

impl<M: RawMutex> Stream<M> {
    /// A closed stream with an empty slot.
    pub const fn new() -> Self {
        Self {
            state: BlockingMutex::new(RefCell::new(StreamState {
                slot: ChunkSlot::new(),
                paused: false,
                draining: false,
                decoder: None,
                generation: 0,
            })),
            events: EventFlags::new(),
            io: Mutex::new(()),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StreamState) -> R) -> R {
        self.state.lock(|s| f(&mut s.borrow_mut()))
    }

    /// Put one chunk in the slot and raise `BUFFER_FULL`.
    ///
    /// Returns `false` if a chunk is still waiting; the caller broke the
    /// one-chunk-in-flight rule.
    pub fn submit(&self, data: &[u8]) -> bool {
        match self.with_state(|s| s.slot.fill(data)) {
            Ok(()) => {
                self.events.post(StreamEvents::BUFFER_FULL);
                true
            }
            Err(e) => {
                error!("stream: submit refused: {}", e);
                false
            }
        }
    }

    /// Stop draining. A buffered chunk stays in the slot.
    pub fn pause(&self) {
        self.with_state(|s| s.paused = true);
    }

    /// Continue draining. Returns `true` if the slot still holds a chunk,
    /// waiting or mid-drain, in which case `BUFFER_FULL` has been raised
    /// again here and the streaming task will ask for the next one.
    pub fn resume(&self) -> bool {
        let waiting = self.with_state(|s| {
            s.paused = false;
            !s.slot.is_empty()
        });
        if waiting {
            self.events.post(StreamEvents::BUFFER_FULL);
        }
        waiting
    }

    /// `true` while paused.
    pub fn is_paused(&self) -> bool {
        self.with_state(|s| s.paused)
    }

    /// Bytes in the slot, including a chunk that is mid-drain.
    pub fn buffered(&self) -> usize {
        self.with_state(|s| s.slot.len())
    }

    /// `true` while a decoder handle is open.
    pub fn is_open(&self) -> bool {
        self.with_state(|s| s.decoder.is_some())
    }

    /// Open the decoder, bind its bus and run the start-up sequence. An
    /// already open stream is closed first.
    pub async fn open<B: Board>(&self, registry: &DeviceRegistry<M, B>) -> Result<(), StreamError> {
        self.close(registry).await;
        let _io = self.io.lock().await;
        let vs = registry.open(ids::VS1053, OpenFlags::WRITE).await?;
        if let Err(e) = Self::bring_up(registry, vs).await {
            if let Err(close) = registry.close(vs).await {
                warn!("stream: closing decoder after failed open: {}", close);
            }
            return Err(e);
        }
        self.with_state(|s| {
            s.slot.clear();
            s.paused = false;
            s.draining = false;
            s.decoder = Some(vs);
            s.generation = s.generation.wrapping_add(1);
        });
        let _stale = self.events.take();
        info!("stream open");
        Ok(())
    }

    async fn bring_up<B: Board>(registry: &DeviceRegistry<M, B>, vs: Handle) -> Result<(), StreamError> {
        bind_bus(registry, vs, AudioRequest::SetBusHandle.code()).await?;
        registry
            .configure(vs, AudioRequest::SelectCommand.code(), &[])
            .await?;
        for command in &STREAM_OPEN {
            registry.write(vs, command).await?;
        }
        registry
            .configure(vs, AudioRequest::SelectData.code(), &[])
            .await?;
        Ok(())
    }

    /// Reset the decoder and close its handle. Any buffered chunk is
    /// dropped. Closing a closed stream does nothing.
    pub async fn close<B: Board>(&self, registry: &DeviceRegistry<M, B>) {
        let decoder = self.with_state(|s| {
            s.slot.clear();
            s.paused = false;
            s.draining = false;
            s.decoder.take()
        });
        let Some(vs) = decoder else {
            return;
        };
        let _io = self.io.lock().await;
        let reset = async {
            registry
                .configure(vs, AudioRequest::SelectCommand.code(), &[])
                .await?;
            registry.write(vs, &SOFT_RESET).await
        };
        if let Err(e) = reset.await {
            warn!("stream: decoder reset on close failed: {}", e);
        }
        if let Err(e) = registry.close(vs).await {
            warn!("stream: decoder close failed: {}", e);
        }
        info!("stream closed");
    }

    /// Seconds the decoder has played on the open stream.
    pub async fn decode_time<B: Board>(&self, registry: &DeviceRegistry<M, B>) -> Result<u16, StreamError> {
        let _io = self.io.lock().await;
        let vs = self.with_state(|s| s.decoder).ok_or(StreamError::NotOpen)?;
        registry
            .configure(vs, AudioRequest::SelectCommand.code(), &[])
            .await?;
        let mut frame = READ_DECODE_TIME;
        let read = registry.read(vs, &mut frame).await;
        registry
            .configure(vs, AudioRequest::SelectData.code(), &[])
            .await?;
        read?;
        Ok(decode_time(frame))
    }

    async fn wait_full(&self) {
        let _ = self.events.wait_any().await;
    }

    /// Copy the chunk out unless paused or already draining. The slot stays
    /// occupied until [`Self::finish_drain`]. A chunk left over from a closed
    /// stream is dropped.
    fn take_chunk(&self, out: &mut [u8; STREAM_CHUNK_SIZE]) -> Option<Drained> {
        self.with_state(|s| {
            if s.paused || s.draining || s.slot.is_empty() {
                return None;
            }
            let Some(decoder) = s.decoder else {
                s.slot.clear();
                return None;
            };
            s.draining = true;
            Some(Drained {
                len: s.slot.copy_out(out),
                decoder,
                generation: s.generation,
            })
        })
    }

    /// Empty the slot after `chunk` has been written, unless the stream was
    /// closed or reopened meanwhile.
    fn finish_drain(&self, chunk: &Drained) {
        self.with_state(|s| {
            if s.draining && s.generation == chunk.generation {
                s.draining = false;
                s.slot.clear();
            }
        });
    }

    async fn write_bursts<B: Board>(
        &self,
        registry: &DeviceRegistry<M, B>,
        chunk: &Drained,
        data: &[u8],
    ) -> Result<(), StreamError> {
        for burst in data.chunks(DECODER_BURST_SIZE) {
            {
                let _io = self.io.lock().await;
                let current = self.with_state(|s| {
                    s.decoder == Some(chunk.decoder) && s.generation == chunk.generation
                });
                if !current {
                    return Err(StreamError::NotOpen);
                }
                registry.write(chunk.decoder, burst).await?;
            }
            embassy_futures::yield_now().await;
        }
        Ok(())
    }
}

impl<M: RawMutex> Default for Stream<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// The streaming task.
pub struct StreamTask<'a, M: RawMutex, B: Board> {
    player: &'a Player<M>,
    registry: &'a DeviceRegistry<M, B>,
}

impl<'a, M: RawMutex, B: Board> StreamTask<'a, M, B> {
    /// Task body over `player`'s stream.
    pub fn new(player: &'a Player<M>, registry: &'a DeviceRegistry<M, B>) -> Self {
        Self { player, registry }
    }

    /// Serve the stream forever.
    pub async fn run(&self) -> ! {
        loop {
            self.step().await;
        }
    }

    /// Wait for `BUFFER_FULL` and handle it.
    pub async fn step(&self) {
        self.player.stream().wait_full().await;
        self.drain().await;
    }

    /// Write the buffered chunk to the decoder, then ask for the next one.
    /// Returns `false` if there was nothing to drain (empty slot or paused).
    pub async fn drain(&self) -> bool {
        let stream = self.player.stream();
        let mut buf = [0u8; STREAM_CHUNK_SIZE];
        let Some(chunk) = stream.take_chunk(&mut buf) else {
            return false;
        };
        let data = buf.get(..chunk.len).unwrap_or_default();
        let written = stream.write_bursts(self.registry, &chunk, data).await;
        stream.finish_drain(&chunk);
        match written {
            Ok(()) => trace!("stream: drained {} bytes", chunk.len),
            Err(StreamError::NotOpen) => return true,
            Err(e) => warn!("stream: chunk lost: {}", e),
        }
        if self.player.status().accepts_buffer_needed() {
            self.player.post(PlayerEvents::BUFFER_NEEDED);
        }
        true
    }
}
