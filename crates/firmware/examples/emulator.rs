//! Muse Player Emulator
//!
//! Plays a track from a local music directory through the full playback
//! stack against the mock board, logging status and decoder traffic.
//!
//! Run with:
//!   MUSIC_PATH=~/music cargo run --example emulator --features emulator -- track001.mp3
//!
//! Without a track argument the first `.mp3` in `MUSIC_PATH` is played.

use std::time::Duration;

use drivers::sim::{pins, SimRig};
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::config;
use platform::storage_local::LocalFileStorage;
use playback::{Orchestrator, PlaybackStatus, Player, StreamTask};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("{}", config::dev_banner());

    let storage = LocalFileStorage::from_env().ok_or("MUSIC_PATH is not set")?;
    let track = match std::env::args().nth(1) {
        Some(track) => track,
        None => storage
            .track_names()?
            .into_iter()
            .next()
            .ok_or("no .mp3 files in MUSIC_PATH")?,
    };

    let rig = SimRig::new();
    let registry = rig.registry::<NoopRawMutex>();
    let player: Player<NoopRawMutex> = Player::new();
    let mut orchestrator = Orchestrator::new(&player, &registry, storage);
    let streamer = StreamTask::new(&player, &registry);

    let control = async {
        if !player.start(&track) {
            return Err(format!("cannot start {track}"));
        }
        loop {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let sent = rig.trace.bytes_sent_to(pins::VS1053_XDCS).len();
            match player.status() {
                PlaybackStatus::Done => {
                    tracing::info!(track = %track, bytes = sent, "playback finished");
                    return Ok(());
                }
                PlaybackStatus::Off => return Err(format!("{track} stopped after {sent} bytes")),
                status => tracing::info!(%status, bytes = sent, "playing"),
            }
        }
    };

    let rt = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
    let outcome = rt.block_on(async {
        match select3(orchestrator.run(), streamer.run(), control).await {
            Either3::First(never) | Either3::Second(never) => never,
            Either3::Third(outcome) => outcome,
        }
    });
    outcome.map_err(Into::into)
}
