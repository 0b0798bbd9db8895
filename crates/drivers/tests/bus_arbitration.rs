#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Shared-bus arbitration between the decoder, display and card adapters.

use drivers::ctrl::{AudioRequest, BusRequest, CardRequest, DisplayRequest};
use drivers::sim::{pins, SimBoard, SimRig};
use drivers::{bind_bus, ids, DeviceRegistry, Handle, OpenFlags};
use embassy_futures::join::join;
use embassy_futures::{block_on, yield_now};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use platform::config::{AUDIO_SPI_HZ, DISPLAY_SPI_HZ};
use platform::mocks::BusEvent;

type Registry = DeviceRegistry<NoopRawMutex, SimBoard>;

struct Bench {
    rig: SimRig,
    reg: Registry,
}

struct Devices {
    audio: Handle,
    display: Handle,
    card: Handle,
}

impl Bench {
    fn new() -> Self {
        let rig = SimRig::new();
        let reg = rig.registry();
        Self { rig, reg }
    }

    async fn open_all(&self) -> Devices {
        let audio = self.reg.open(ids::VS1053, OpenFlags::WRITE).await.unwrap();
        bind_bus(&self.reg, audio, AudioRequest::SetBusHandle.code())
            .await
            .unwrap();
        let display = self.reg.open(ids::ILI9341, OpenFlags::WRITE).await.unwrap();
        bind_bus(&self.reg, display, DisplayRequest::SetBusHandle.code())
            .await
            .unwrap();
        let card = self.reg.open(ids::SDCARD, OpenFlags::READ).await.unwrap();
        bind_bus(&self.reg, card, CardRequest::SetBusHandle.code())
            .await
            .unwrap();
        Devices {
            audio,
            display,
            card,
        }
    }

    async fn card_request(&self, card: Handle, request: CardRequest) {
        self.reg.configure(card, request.code(), &[]).await.unwrap();
    }
}

/// Concurrent transactions from two adapters never overlap their selects.
#[tokio::test]
async fn concurrent_adapters_never_contend() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    let (a, b) = join(
        bench.reg.write(dev.audio, &[0x02, 0x00, 0x08, 0x04]),
        bench.reg.write(dev.display, &[0x2C, 0x00, 0x1F]),
    )
    .await;
    a.unwrap();
    b.unwrap();
    assert_eq!(bench.rig.trace.contention(), 0);
    assert_eq!(bench.rig.trace.bytes_sent_to(pins::VS1053_XCS), [0x02, 0x00, 0x08, 0x04]);
    assert_eq!(bench.rig.trace.bytes_sent_to(pins::ILI9341_CS), [0x2C, 0x00, 0x1F]);
}

/// A second adapter waits for WAIT_FOR_LOCK until the holder releases.
#[tokio::test]
async fn second_locker_waits_for_release() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    bench.card_request(dev.card, CardRequest::LockBus).await;
    bench.card_request(dev.card, CardRequest::AssertCs).await;

    let holder = async {
        for _ in 0..16 {
            yield_now().await;
        }
        assert!(
            !bench
                .rig
                .trace
                .events()
                .contains(&BusEvent::Select(pins::ILI9341_CS)),
            "display selected while the card held the bus"
        );
        bench.card_request(dev.card, CardRequest::DeassertCs).await;
        bench.card_request(dev.card, CardRequest::ReleaseBus).await;
    };
    let (written, ()) = join(bench.reg.write(dev.display, &[0x29]), holder).await;
    written.unwrap();

    let events = bench.rig.trace.events();
    let card_off = events
        .iter()
        .rposition(|e| *e == BusEvent::Deselect(pins::SD_CS))
        .unwrap();
    let display_on = events
        .iter()
        .position(|e| *e == BusEvent::Select(pins::ILI9341_CS))
        .unwrap();
    assert!(card_off < display_on);
    assert_eq!(bench.rig.trace.contention(), 0);
}

/// Each transaction re-establishes its own clock inside the lock.
#[tokio::test]
async fn every_transaction_sets_its_own_rate() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    bench.rig.trace.clear_events();
    bench.reg.write(dev.display, &[0x2C]).await.unwrap();
    bench.reg.write(dev.audio, &[0x02, 0x0B, 0x10, 0x10]).await.unwrap();
    bench.reg.write(dev.display, &[0x2C]).await.unwrap();
    assert_eq!(
        bench.rig.trace.clocks(),
        [DISPLAY_SPI_HZ, AUDIO_SPI_HZ, DISPLAY_SPI_HZ]
    );
}

/// Lock statistics balance after every adapter has finished.
#[tokio::test]
async fn lock_and_release_are_paired() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    bench.reg.write(dev.audio, &[0; 4]).await.unwrap();
    bench.reg.write(dev.display, &[0; 4]).await.unwrap();
    bench.card_request(dev.card, CardRequest::LockBus).await;
    bench.card_request(dev.card, CardRequest::LockBus).await;
    bench.card_request(dev.card, CardRequest::ReleaseBus).await;

    let stats = bench.reg.bus_lock_stats();
    assert_eq!(stats.acquired, 3);
    assert_eq!(stats.released, 3);
    assert!(!bench.reg.bus_is_locked());
}

/// RELEASE_LOCK on a free bus is a protocol violation.
#[tokio::test]
#[should_panic(expected = "bus lock released while free")]
async fn releasing_free_bus_halts() {
    let bench = Bench::new();
    let bus = bench.reg.open(ids::SPI1, OpenFlags::empty()).await.unwrap();
    let _ = bench
        .reg
        .configure(bus, BusRequest::ReleaseLock.code(), &[])
        .await;
}

/// Raw transport writes must happen under the lock.
#[tokio::test]
#[should_panic(expected = "bus transfer outside the bus lock")]
async fn transfer_outside_lock_halts() {
    let bench = Bench::new();
    let bus = bench.reg.open(ids::SPI1, OpenFlags::empty()).await.unwrap();
    let _ = bench.reg.write(bus, &[0xFF]).await;
}

/// The card may not assert its select before taking the bus.
#[tokio::test]
#[should_panic(expected = "card used without holding the bus")]
async fn card_select_without_lock_halts() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    bench.card_request(dev.card, CardRequest::AssertCs).await;
}

/// Releasing the bus with the card still selected would leave two selects
/// able to overlap.
#[tokio::test]
#[should_panic(expected = "card used without holding the bus")]
async fn card_release_while_selected_halts() {
    let bench = Bench::new();
    let dev = bench.open_all().await;
    bench.card_request(dev.card, CardRequest::LockBus).await;
    bench.card_request(dev.card, CardRequest::AssertCs).await;
    bench.card_request(dev.card, CardRequest::ReleaseBus).await;
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Audio,
    Display,
    CardBlock,
}

fn op() -> impl proptest::strategy::Strategy<Value = Op> {
    proptest::prop_oneof![
        proptest::strategy::Just(Op::Audio),
        proptest::strategy::Just(Op::Display),
        proptest::strategy::Just(Op::CardBlock),
    ]
}

proptest::proptest! {
    /// Any mix of adapter operations leaves acquire and release counts equal
    /// and the bus free.
    #[test]
    fn lock_pairing_holds_for_any_sequence(ops in proptest::collection::vec(op(), 0..24)) {
        block_on(async {
            let bench = Bench::new();
            let dev = bench.open_all().await;
            for op in &ops {
                match op {
                    Op::Audio => bench.reg.write(dev.audio, &[0x02, 0, 0, 0]).await.unwrap(),
                    Op::Display => bench.reg.write(dev.display, &[0x2C]).await.unwrap(),
                    Op::CardBlock => {
                        bench.card_request(dev.card, CardRequest::LockBus).await;
                        bench.card_request(dev.card, CardRequest::AssertCs).await;
                        let mut buf = [0xFF; 2];
                        bench.reg.read(dev.card, &mut buf).await.unwrap();
                        bench.card_request(dev.card, CardRequest::DeassertCs).await;
                        bench.card_request(dev.card, CardRequest::ReleaseBus).await;
                    }
                }
            }
            let stats = bench.reg.bus_lock_stats();
            assert_eq!(stats.acquired, stats.released);
            assert_eq!(usize::try_from(stats.acquired).unwrap(), ops.len());
            assert!(!bench.reg.bus_is_locked());
            assert_eq!(bench.rig.trace.contention(), 0);
        });
    }
}
