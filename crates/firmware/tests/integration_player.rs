#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
//! End to end on the mock board: tracks stored on the simulated SD card,
//! read through `CardStorage`, streamed to the decoder over the shared bus.

use drivers::sd::SdCard;
use drivers::sim::{pins, SimBoard, SimRig};
use drivers::{ids, DeviceRegistry, OpenFlags};
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use firmware::control::read_touch_points;
use firmware::{toggle, CardStorage, CardStorageError, Extent};
use platform::mocks::SdCardSim;
use platform::{File, Storage};
use playback::{Orchestrator, PlaybackStatus, Player, StreamTask};

type Registry = DeviceRegistry<NoopRawMutex, SimBoard>;

const TABLE: &[Extent] = &[
    Extent {
        name: "intro.mp3",
        first_block: 4,
        len: 1500,
    },
    Extent {
        name: "outro.mp3",
        first_block: 8,
        len: 700,
    },
];

fn payload(extent: &Extent) -> Vec<u8> {
    (0..extent.len).map(|i| (i % 251) as u8 ^ extent.first_block as u8).collect()
}

fn card_image() -> Vec<u8> {
    let mut image = vec![0u8; 16 * 512];
    for extent in TABLE {
        let start = extent.first_block as usize * 512;
        image[start..start + extent.len as usize].copy_from_slice(&payload(extent));
    }
    image
}

fn bench() -> (SimRig, Registry) {
    let rig = SimRig::with_card(SdCardSim::sdhc(card_image()));
    let reg = rig.registry();
    (rig, reg)
}

async fn ready_card(reg: &Registry) -> SdCard<'_, NoopRawMutex, SimBoard> {
    let mut card = SdCard::open(reg).await.unwrap();
    card.init().await.unwrap();
    card
}

async fn read_all(file: &mut impl File) -> Vec<u8> {
    let mut out = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = file.read(&mut chunk).await.unwrap();
        if n == 0 {
            return out;
        }
        out.extend_from_slice(&chunk[..n]);
    }
}

// ── CardStorage ─────────────────────────────────────────────────────────────

/// Chunked reads cross block boundaries and stop at the track length.
#[tokio::test]
async fn card_file_reads_track_extent() {
    let (_rig, reg) = bench();
    let card = ready_card(&reg).await;
    let mut storage = CardStorage::new(&card, TABLE);

    let mut file = storage.open_file("intro.mp3").await.unwrap();
    assert_eq!(file.size(), 1500);
    assert_eq!(read_all(&mut file).await, payload(&TABLE[0]));

    let mut outro = storage.open_file("outro.mp3").await.unwrap();
    assert_eq!(read_all(&mut outro).await, payload(&TABLE[1]));
}

/// Seeking back replays from the new position; seeking past the end
/// clamps to the end.
#[tokio::test]
async fn card_file_seek() {
    let (_rig, reg) = bench();
    let card = ready_card(&reg).await;
    let mut storage = CardStorage::new(&card, TABLE);
    let mut file = storage.open_file("intro.mp3").await.unwrap();

    let _ = read_all(&mut file).await;
    assert_eq!(file.seek(510).await.unwrap(), 510);
    let mut four = [0u8; 4];
    assert_eq!(file.read(&mut four).await.unwrap(), 2);
    assert_eq!(four[..2], payload(&TABLE[0])[510..512]);

    assert_eq!(file.seek(10_000).await.unwrap(), 1500);
    assert_eq!(file.read(&mut four).await.unwrap(), 0);
}

/// Only playlist names exist.
#[tokio::test]
async fn unknown_track_is_not_found() {
    let (_rig, reg) = bench();
    let card = ready_card(&reg).await;
    let mut storage = CardStorage::new(&card, TABLE);
    assert!(storage.exists("outro.mp3").await.unwrap());
    assert!(!storage.exists("bonus.mp3").await.unwrap());
    assert_eq!(
        storage.open_file("bonus.mp3").await.err(),
        Some(CardStorageError::NotFound)
    );
}

// ── Playback from the card ─────────────────────────────────────────────────

/// Card reads and decoder writes share SPI1 without ever overlapping, and
/// the decoder receives the track byte for byte.
#[tokio::test]
async fn plays_track_from_card() {
    let (rig, reg) = bench();
    let card = ready_card(&reg).await;
    let player: Player<NoopRawMutex> = Player::new();
    let mut orchestrator = Orchestrator::new(&player, &reg, CardStorage::new(&card, TABLE));
    let streamer = StreamTask::new(&player, &reg);

    let script = async {
        assert!(player.start("intro.mp3"));
        for _ in 0..200_000 {
            if player.status() == PlaybackStatus::Done {
                return;
            }
            embassy_futures::yield_now().await;
        }
        panic!("track never finished");
    };
    match select3(orchestrator.run(), streamer.run(), script).await {
        Either3::First(never) | Either3::Second(never) => never,
        Either3::Third(()) => {}
    }

    assert_eq!(rig.trace.bytes_sent_to(pins::VS1053_XDCS), payload(&TABLE[0]));
    assert_eq!(rig.trace.contention(), 0);
    assert!(!reg.bus_is_locked());
}

/// A tap pauses, the next tap resumes, and taps while stopped do nothing.
#[tokio::test]
async fn touch_taps_toggle_pause() {
    let (rig, reg) = bench();
    let card = ready_card(&reg).await;
    let player: Player<NoopRawMutex> = Player::new();
    let mut orchestrator = Orchestrator::new(&player, &reg, CardStorage::new(&card, TABLE));

    let touch = reg.open(ids::FT6206, OpenFlags::READ).await.unwrap();
    rig.touch.set_register(firmware::control::TD_STATUS, 0x01);
    assert_eq!(read_touch_points(&reg, touch).await.unwrap(), 1);

    assert!(!toggle(&player));
    player.start("outro.mp3");
    orchestrator.step().await;
    assert!(toggle(&player));
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::Pause);
    assert!(toggle(&player));
    orchestrator.step().await;
    assert_eq!(player.status(), PlaybackStatus::InProgress);
}
