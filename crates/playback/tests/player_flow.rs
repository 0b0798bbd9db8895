#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
//! Orchestrator and streaming task against the mock board: status
//! transitions, chunk pacing, pause/resume, track switching.

use core::future::Future;

use drivers::sim::{pins, SimBoard, SimRig};
use drivers::{ids, DeviceRegistry, OpenFlags};
use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::config::{DECODER_BURST_SIZE, STREAM_CHUNK_SIZE};
use platform::mocks::MemoryStorage;
use playback::codec::{SOFT_RESET, STREAM_OPEN};
use playback::{Orchestrator, PlaybackStatus, Player, StreamTask};
use proptest::prelude::*;

type Registry = DeviceRegistry<NoopRawMutex, SimBoard>;
type Orch<'a> = Orchestrator<'a, NoopRawMutex, SimBoard, MemoryStorage>;
type Streamer<'a> = StreamTask<'a, NoopRawMutex, SimBoard>;

fn track(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

fn bench() -> (SimRig, Registry, Player<NoopRawMutex>) {
    let rig = SimRig::new();
    let reg = rig.registry();
    (rig, reg, Player::new())
}

fn decoder_data(rig: &SimRig) -> Vec<u8> {
    rig.trace.bytes_sent_to(pins::VS1053_XDCS)
}

fn decoder_commands(rig: &SimRig) -> Vec<u8> {
    rig.trace.bytes_sent_to(pins::VS1053_XCS)
}

fn open_sequence() -> Vec<u8> {
    STREAM_OPEN.iter().flatten().copied().collect()
}

/// Run both tasks until `script` finishes.
async fn drive<T>(orchestrator: &mut Orch<'_>, streamer: &Streamer<'_>, script: impl Future<Output = T>) -> T {
    match select3(orchestrator.run(), streamer.run(), script).await {
        Either3::First(never) | Either3::Second(never) => never,
        Either3::Third(out) => out,
    }
}

async fn until(mut done: impl FnMut() -> bool) {
    for _ in 0..100_000 {
        if done() {
            return;
        }
        embassy_futures::yield_now().await;
    }
    panic!("condition never reached");
}

// ── Full runs ───────────────────────────────────────────────────────────────

/// A track plays from start to DONE and every byte reaches XDCS in order.
#[tokio::test]
async fn track_plays_to_done() {
    let (rig, reg, player) = bench();
    let song = track(1000, 3);
    let storage = MemoryStorage::new().with_file("song.mp3", song.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    drive(&mut orchestrator, &streamer, async {
        assert!(player.start("song.mp3"));
        assert_eq!(player.status(), PlaybackStatus::Init);
        assert!(player.is_playback_in_progress());
        until(|| player.status() == PlaybackStatus::Done).await;
    })
    .await;

    assert_eq!(decoder_data(&rig), song);
    let mut commands = open_sequence();
    commands.extend_from_slice(&SOFT_RESET);
    assert_eq!(decoder_commands(&rig), commands);
    assert!(!player.stream().is_open());
    assert_eq!(player.loaded_track().unwrap().as_str(), "song.mp3");
    assert_eq!(rig.trace.contention(), 0);
    let stats = reg.bus_lock_stats();
    assert_eq!(stats.acquired, stats.released);
}

/// Stopping mid-track closes the decoder and both of its handles.
#[tokio::test]
async fn stop_mid_track_releases_everything() {
    let (rig, reg, player) = bench();
    let storage = MemoryStorage::new().with_file("long.mp3", track(50_000, 1));
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    drive(&mut orchestrator, &streamer, async {
        player.start("long.mp3");
        until(|| decoder_data(&rig).len() >= 4 * STREAM_CHUNK_SIZE).await;
        assert!(player.stop());
        until(|| player.status() == PlaybackStatus::Off).await;
        for _ in 0..100 {
            embassy_futures::yield_now().await;
        }
    })
    .await;

    assert!(!player.stream().is_open());
    assert!(player.loaded_track().is_none());
    assert!(decoder_commands(&rig).ends_with(&SOFT_RESET));
    assert!(decoder_data(&rig).len() < 50_000);

    let vs = reg.open(ids::VS1053, OpenFlags::WRITE).await.unwrap();
    let bus = reg.open(ids::SPI1, OpenFlags::READ).await.unwrap();
    assert_eq!(reg.ref_count(vs).await, 1);
    assert_eq!(reg.ref_count(bus).await, 1);
}

// ── Stepped runs ────────────────────────────────────────────────────────────

/// Start opens the stream and puts exactly one chunk in the slot; nothing
/// more is read until the streaming task drains it.
#[tokio::test]
async fn one_chunk_in_flight() {
    let (rig, reg, player) = bench();
    let song = track(300, 9);
    let storage = MemoryStorage::new().with_file("a.mp3", song.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    player.start("a.mp3");
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::InProgress);
    assert!(player.stream().is_open());
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
    assert_eq!(decoder_commands(&rig), open_sequence());
    assert!(decoder_data(&rig).is_empty());

    streamer.step().await;
    assert_eq!(decoder_data(&rig), song[..STREAM_CHUNK_SIZE]);
    assert_eq!(player.stream().buffered(), 0);

    orchestrator.step().await;
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
}

/// A chunk buffered at pause time survives the pause and is the first
/// thing drained after resume.
#[tokio::test]
async fn pause_keeps_buffered_chunk() {
    let (rig, reg, player) = bench();
    let song = track(300, 5);
    let storage = MemoryStorage::new().with_file("a.mp3", song.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    player.start("a.mp3");
    orchestrator.step().await;
    assert!(player.pause());
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::Pause);
    assert!(player.stream().is_paused());
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
    assert!(!streamer.drain().await);
    assert!(decoder_data(&rig).is_empty());

    assert!(player.resume());
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::InProgress);
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);

    streamer.step().await;
    assert_eq!(decoder_data(&rig), song[..STREAM_CHUNK_SIZE]);
    orchestrator.step().await;
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
}

/// Pause swallows a pending buffer request; resume with an empty slot
/// issues a fresh one.
#[tokio::test]
async fn resume_with_empty_slot_reads_next_chunk() {
    let (rig, reg, player) = bench();
    let song = track(300, 2);
    let storage = MemoryStorage::new().with_file("a.mp3", song.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    player.start("a.mp3");
    orchestrator.step().await;
    streamer.step().await;
    player.pause();
    orchestrator.step().await;
    assert_eq!(player.stream().buffered(), 0);

    player.resume();
    orchestrator.step().await;
    assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
    streamer.step().await;
    assert_eq!(decoder_data(&rig), song[..2 * STREAM_CHUNK_SIZE]);
}

/// Pause and resume while a chunk is halfway out: the chunk still counts
/// as buffered, nothing is read ahead of it, and the decoder ends up with
/// every byte of the track exactly once.
#[tokio::test]
async fn pause_resume_mid_drain_keeps_every_byte() {
    let (rig, reg, player) = bench();
    let song = track(10 * STREAM_CHUNK_SIZE, 5);
    let storage = MemoryStorage::new().with_file("a.mp3", song.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    player.start("a.mp3");
    orchestrator.step().await;

    let control = async {
        until(|| decoder_data(&rig).len() >= DECODER_BURST_SIZE).await;
        assert!(decoder_data(&rig).len() < STREAM_CHUNK_SIZE);
        assert!(player.pause());
        orchestrator.step().await;
        assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
        assert!(player.resume());
        orchestrator.step().await;
        assert_eq!(player.status(), PlaybackStatus::InProgress);
        assert_eq!(player.stream().buffered(), STREAM_CHUNK_SIZE);
    };
    let (drained, ()) = join(streamer.drain(), control).await;
    assert!(drained);
    assert_eq!(decoder_data(&rig), song[..STREAM_CHUNK_SIZE]);
    assert_eq!(player.stream().buffered(), 0);

    drive(&mut orchestrator, &streamer, until(|| player.status() == PlaybackStatus::Done)).await;
    assert_eq!(decoder_data(&rig), song);
}

/// Stop from OFF is refused every time and changes nothing.
#[tokio::test]
async fn stop_from_off_is_refused() {
    let (rig, _reg, player) = bench();
    assert!(!player.stop());
    assert!(!player.stop());
    assert!(!player.resume());
    assert_eq!(player.status(), PlaybackStatus::Off);
    assert!(decoder_commands(&rig).is_empty());
}

/// Starting a different track closes the first stream and file and opens
/// the new one from its beginning.
#[tokio::test]
async fn switching_tracks_reopens() {
    let (rig, reg, player) = bench();
    let b = track(200, 77);
    let storage = MemoryStorage::new()
        .with_file("a.mp3", track(200, 11))
        .with_file("b.mp3", b.clone());
    let mut orchestrator = Orchestrator::new(&player, &reg, storage.clone());
    let streamer = StreamTask::new(&player, &reg);

    player.start("a.mp3");
    orchestrator.step().await;
    assert!(player.start("b.mp3"));
    orchestrator.step().await;

    assert_eq!(storage.opened(), ["a.mp3", "b.mp3"]);
    assert_eq!(player.loaded_track().unwrap().as_str(), "b.mp3");
    assert_eq!(player.status(), PlaybackStatus::InProgress);
    let mut commands = open_sequence();
    commands.extend_from_slice(&SOFT_RESET);
    commands.extend(open_sequence());
    assert_eq!(decoder_commands(&rig), commands);

    streamer.step().await;
    assert_eq!(decoder_data(&rig), b[..STREAM_CHUNK_SIZE]);
}

/// After DONE the file stays loaded; a restart rewinds it instead of
/// opening it again.
#[tokio::test]
async fn restart_after_done_rewinds() {
    let (_rig, reg, player) = bench();
    let storage = MemoryStorage::new().with_file("short.mp3", track(10, 0));
    let mut orchestrator = Orchestrator::new(&player, &reg, storage.clone());
    let streamer = StreamTask::new(&player, &reg);

    player.start("short.mp3");
    orchestrator.step().await;
    streamer.step().await;
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::Done);
    assert!(!player.is_playback_in_progress());

    assert!(player.start("short.mp3"));
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::InProgress);
    assert_eq!(player.stream().buffered(), 10);
    assert_eq!(storage.opened(), ["short.mp3"]);
}

/// A track that is not in storage sends the session back to OFF.
#[tokio::test]
async fn missing_track_goes_back_to_off() {
    let (rig, reg, player) = bench();
    let mut orchestrator = Orchestrator::new(&player, &reg, MemoryStorage::new());

    assert!(player.start("nope.mp3"));
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::Off);
    assert!(!player.stream().is_open());
    assert!(decoder_commands(&rig).is_empty());
}

/// Elapsed time comes from the decode-time register and is 0 when OFF.
#[tokio::test]
async fn elapsed_seconds_reads_decoder() {
    let (rig, reg, player) = bench();
    let storage = MemoryStorage::new().with_file("a.mp3", track(300, 4));
    let mut orchestrator = Orchestrator::new(&player, &reg, storage);
    let streamer = StreamTask::new(&player, &reg);

    assert_eq!(player.elapsed_seconds(&reg).await, 0);
    player.start("a.mp3");
    orchestrator.step().await;

    rig.trace.script_response(&[0x00, 0x00, 0x01, 0x2C]);
    assert_eq!(player.elapsed_seconds(&reg).await, 300);

    streamer.step().await;
    assert_eq!(decoder_data(&rig).len(), STREAM_CHUNK_SIZE);
}

// ── Control sequences ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Start(&'static str),
    Stop,
    Pause,
    Resume,
    Settle,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start("a.mp3")),
        Just(Op::Start("b.mp3")),
        Just(Op::Stop),
        Just(Op::Pause),
        Just(Op::Resume),
        Just(Op::Settle),
    ]
}

proptest::proptest! {
    /// Every request is accepted exactly when the status it was made in
    /// allows it, and the bus never sees two devices at once.
    #[test]
    fn requests_follow_status(ops in proptest::collection::vec(op(), 1..24)) {
        block_on(async {
            let (rig, reg, player) = bench();
            let storage = MemoryStorage::new()
                .with_file("a.mp3", track(400, 1))
                .with_file("b.mp3", track(150, 2));
            let mut orchestrator = Orchestrator::new(&player, &reg, storage);
            let streamer = StreamTask::new(&player, &reg);

            drive(&mut orchestrator, &streamer, async {
                let mut queued = false;
                for op in &ops {
                    let before = player.status();
                    match op {
                        Op::Start(name) => {
                            let accepted = player.start(name);
                            assert!(accepted || queued);
                            queued = queued || accepted;
                        }
                        Op::Stop => assert_eq!(player.stop(), before.accepts_stop()),
                        Op::Pause => assert_eq!(player.pause(), before.accepts_pause()),
                        Op::Resume => assert_eq!(player.resume(), before.accepts_resume()),
                        Op::Settle => {
                            for _ in 0..200 {
                                embassy_futures::yield_now().await;
                            }
                            queued = false;
                        }
                    }
                }
                for _ in 0..200 {
                    embassy_futures::yield_now().await;
                }
            })
            .await;

            if player.status() == PlaybackStatus::Off {
                assert!(!player.stream().is_open());
            }
            assert_eq!(rig.trace.contention(), 0);
        });
    }
}
