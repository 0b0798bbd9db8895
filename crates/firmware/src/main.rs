//! Muse MP3 player - Main Entry Point
//!
//! Hardware-only entry point for the Nucleo-F401RE.

#![no_std]
#![no_main]

use defmt_rtt as _;
use drivers::sd::SdCard;
use drivers::{ids, DeviceRegistry, OpenFlags};
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Timer;
use firmware::control::read_touch_points;
use firmware::{board, toggle, CardStorage, F401Board, TapDetector, PLAYLIST};
use platform::config;
use playback::{Orchestrator, PlaybackStatus, Player, StreamTask};
use static_cell::StaticCell;

// Panic handler
use panic_probe as _;

type Registry = DeviceRegistry<CriticalSectionRawMutex, F401Board>;
type Card = SdCard<'static, CriticalSectionRawMutex, F401Board>;

/// Touch panel poll period.
const TOUCH_POLL_MS: u64 = 50;

static PLAYER: Player<CriticalSectionRawMutex> = Player::new();
static REGISTRY: StaticCell<Registry> = StaticCell::new();
static CARD: StaticCell<Card> = StaticCell::new();

#[embassy_executor::task]
async fn orchestrator_task(registry: &'static Registry, card: &'static Card) -> ! {
    let storage = CardStorage::new(card, PLAYLIST);
    Orchestrator::new(&PLAYER, registry, storage).run().await
}

#[embassy_executor::task]
async fn stream_task(registry: &'static Registry) -> ! {
    StreamTask::new(&PLAYER, registry).run().await
}

#[embassy_executor::task]
async fn touch_task(registry: &'static Registry) {
    let touch = match registry.open(ids::FT6206, OpenFlags::READ).await {
        Ok(handle) => handle,
        Err(e) => {
            defmt::warn!("touch panel unavailable: {}", e);
            return;
        }
    };
    let mut taps = TapDetector::new();
    loop {
        Timer::after_millis(TOUCH_POLL_MS).await;
        match read_touch_points(registry, touch).await {
            Ok(points) => {
                if taps.update(points) {
                    toggle(&PLAYER);
                }
            }
            Err(e) => defmt::warn!("touch read failed: {}", e),
        }
    }
}

async fn idle() -> ! {
    loop {
        Timer::after_secs(1).await;
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    defmt::info!("{=str} {=str} v{=str}", config::APP_NAME, config::APP_TYPE, config::APP_VERSION);

    let p = embassy_stm32::init(embassy_stm32::Config::default());
    let mut registry = DeviceRegistry::new(board::peripherals(p));
    registry.init_all();
    let registry: &'static Registry = REGISTRY.init(registry);

    let mut card = match SdCard::open(registry).await {
        Ok(card) => card,
        Err(e) => {
            defmt::error!("sd card open failed: {}", e);
            idle().await
        }
    };
    match card.init().await {
        Ok(kind) => defmt::info!("sd card ready: {}", kind),
        Err(e) => {
            defmt::error!("sd card init failed: {}", e);
            idle().await
        }
    }
    let card: &'static Card = CARD.init(card);

    let spawned = [
        spawner.spawn(orchestrator_task(registry, card)),
        spawner.spawn(stream_task(registry)),
        spawner.spawn(touch_task(registry)),
    ];
    if spawned.iter().any(Result::is_err) {
        defmt::error!("task spawn failed");
        idle().await;
    }

    // Play the playlist in order, forever.
    for extent in PLAYLIST.iter().cycle() {
        if !PLAYER.start(extent.name) {
            Timer::after_secs(1).await;
            continue;
        }
        loop {
            Timer::after_secs(1).await;
            match PLAYER.status() {
                PlaybackStatus::Done | PlaybackStatus::Off => break,
                status => {
                    let seconds = PLAYER.elapsed_seconds(registry).await;
                    defmt::info!("{=str} {} {=u16}s", extent.name, status, seconds);
                }
            }
        }
    }
}
