#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! The mock board the driver and playback tests stand on: bus traffic is
//! attributed to whichever chip-select was active, and in-memory storage
//! serves files the way the orchestrator reads them.

use embedded_hal::digital::OutputPin;
use platform::mocks::{BusEvent, BusTrace, MemoryStorage, MemoryStorageError, MockPin, MockSpi};
use platform::{File, SpiPeripheral, Storage};

#[tokio::test]
async fn writes_are_attributed_to_selected_device() {
    let trace = BusTrace::new();
    let mut spi = MockSpi::new(&trace);
    let mut decoder = MockPin::chip_select("decoder", &trace);
    let mut card = MockPin::chip_select("card", &trace);

    decoder.set_low().unwrap();
    spi.write(&[1, 2, 3]).await.unwrap();
    decoder.set_high().unwrap();

    card.set_low().unwrap();
    spi.write(&[9]).await.unwrap();
    card.set_high().unwrap();

    spi.write(&[0xFF]).await.unwrap();

    assert_eq!(trace.bytes_sent_to("decoder"), [1, 2, 3]);
    assert_eq!(trace.bytes_sent_to("card"), [9]);
    assert_eq!(trace.contention(), 0);
    assert!(trace.selected().is_empty());
}

#[tokio::test]
async fn scripted_bytes_come_back_first() {
    let trace = BusTrace::new();
    let mut spi = MockSpi::new(&trace);
    trace.script_response(&[0xAA, 0x55]);

    let mut buf = [0u8; 3];
    spi.transfer_in_place(&mut buf).await.unwrap();

    assert_eq!(buf[..2], [0xAA, 0x55]);
    assert!(matches!(
        trace.events().last(),
        Some(BusEvent::Transfer { selected: None, .. })
    ));
}

#[test]
fn clock_changes_are_recorded_in_order() {
    let trace = BusTrace::new();
    let mut spi = MockSpi::new(&trace);
    for hz in [400_000, 8_000_000, 400_000] {
        spi.set_frequency(hz).unwrap();
    }
    assert_eq!(trace.clocks(), [400_000, 8_000_000, 400_000]);
}

#[tokio::test]
async fn memory_storage_serves_chunks_and_rewinds() {
    let mut storage = MemoryStorage::new().with_file("a.mp3", (0u8..100).collect());
    let mut file = storage.open_file("a.mp3").await.unwrap();
    assert_eq!(file.size(), 100);

    let mut chunk = [0u8; 64];
    assert_eq!(file.read(&mut chunk).await.unwrap(), 64);
    assert_eq!(file.read(&mut chunk).await.unwrap(), 36);
    assert_eq!(chunk[0], 64);
    assert_eq!(file.read(&mut chunk).await.unwrap(), 0);

    assert_eq!(file.seek(0).await.unwrap(), 0);
    assert_eq!(file.read(&mut chunk).await.unwrap(), 64);
    assert_eq!(chunk[0], 0);

    assert!(matches!(
        storage.open_file("b.mp3").await,
        Err(MemoryStorageError::NotFound)
    ));
    assert_eq!(storage.opened(), ["a.mp3", "b.mp3"]);
}
