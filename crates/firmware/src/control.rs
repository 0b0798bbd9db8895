//! Touch panel control.
//!
//! A tap on the panel toggles between pause and resume. The panel is polled:
//! the FT6206 reports the number of active touch points in `TD_STATUS`, and a
//! tap is the edge from no touch to at least one.

use drivers::{Board, DeviceRegistry, DriverError, Handle};
use embassy_sync::blocking_mutex::raw::RawMutex;
use playback::{PlaybackStatus, Player};

/// FT6206 touch-status register.
pub const TD_STATUS: u8 = 0x02;

/// Touch points encoded in a `TD_STATUS` value. The controller tracks at
/// most two; anything above is a glitch and reads as no touch.
pub const fn touch_points(status: u8) -> u8 {
    match status & 0x0F {
        n @ 0..=2 => n,
        _ => 0,
    }
}

/// Read the number of active touch points.
pub async fn read_touch_points<M: RawMutex, B: Board>(
    registry: &DeviceRegistry<M, B>,
    touch: Handle,
) -> Result<u8, DriverError> {
    let mut reg = [TD_STATUS];
    registry.read(touch, &mut reg).await?;
    let [status] = reg;
    Ok(touch_points(status))
}

/// Press-edge detector over polled touch counts.
#[derive(Debug, Default)]
pub struct TapDetector {
    touching: bool,
}

impl TapDetector {
    /// Detector that starts with the panel released.
    pub const fn new() -> Self {
        Self { touching: false }
    }

    /// Feed one poll; `true` on the poll where a touch begins.
    pub fn update(&mut self, points: u8) -> bool {
        let touching = points > 0;
        let tapped = touching && !self.touching;
        self.touching = touching;
        tapped
    }
}

/// Pause while playing, resume while paused. Returns whether a request was
/// accepted.
pub fn toggle<M: RawMutex>(player: &Player<M>) -> bool {
    match player.status() {
        PlaybackStatus::Init | PlaybackStatus::InProgress => player.pause(),
        PlaybackStatus::Pause => player.resume(),
        PlaybackStatus::Off | PlaybackStatus::Done => false,
    }
}
