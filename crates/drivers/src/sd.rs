//! SD card block access over the card adapter's lock protocol.
//!
//! Every public operation is one bracketed exchange with the card:
//! `LOCK_BUS`, `ASSERT_CS`, command and data phases, `DEASSERT_CS`,
//! `RELEASE_BUS`. A multi-block read keeps the bus for every block, so no
//! other adapter can slip a transaction in between.

use embassy_sync::blocking_mutex::raw::RawMutex;
use thiserror_no_std::Error;

use crate::board::Board;
use crate::ctrl::CardRequest;
use crate::error::DriverError;
use crate::handle::{Handle, OpenFlags};
use crate::registry::{bind_bus, ids, DeviceRegistry};

/// Bytes per card block.
pub const BLOCK_SIZE: usize = 512;

const BLOCK_BYTES: u32 = 512;

/// One card block.
pub type Block = [u8; BLOCK_SIZE];

const CMD_GO_IDLE: u8 = 0;
const CMD_SEND_IF_COND: u8 = 8;
const CMD_STOP_TRANSMISSION: u8 = 12;
const CMD_READ_SINGLE: u8 = 17;
const CMD_READ_MULTIPLE: u8 = 18;
const CMD_APP: u8 = 55;
const CMD_READ_OCR: u8 = 58;
const ACMD_SEND_OP_COND: u8 = 41;

const R1_READY: u8 = 0x00;
const R1_IDLE: u8 = 0x01;
const R1_ILLEGAL: u8 = 0x04;
const DATA_TOKEN: u8 = 0xFE;
const IF_COND_PATTERN: u32 = 0x1AA;
const HCS: u32 = 0x4000_0000;
const OCR_CCS: u8 = 0x40;

const RESPONSE_POLLS: usize = 8;
const TOKEN_POLLS: usize = 4096;
const BUSY_POLLS: usize = 4096;
const INIT_ATTEMPTS: usize = 2000;

/// Card failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardError {
    /// Registry or adapter error.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),
    /// No R1 within the response window.
    #[error("no response to CMD{0}")]
    NoResponse(u8),
    /// Card answered with an error R1.
    #[error("CMD{0} rejected, R1 {1}")]
    Rejected(u8, u8),
    /// CMD8 echoed a different check pattern.
    #[error("voltage check failed")]
    VoltageMismatch,
    /// ACMD41 never left the idle state.
    #[error("card stayed idle")]
    InitTimeout,
    /// No data token before the poll bound.
    #[error("no data token")]
    DataTimeout,
    /// Card busy after a stop command.
    #[error("card busy")]
    Busy,
}

/// Card generation, decided during [`SdCard::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardKind {
    /// Version 1 standard capacity (no CMD8).
    Sd1,
    /// Version 2 standard capacity, byte addressed.
    Sd2,
    /// High capacity, block addressed.
    Sdhc,
}

impl core::fmt::Display for CardKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Sd1 => "SDv1",
            Self::Sd2 => "SDv2",
            Self::Sdhc => "SDHC",
        })
    }
}

/// Block reader on top of an open `/dev/sdcard` handle.
pub struct SdCard<'r, M: RawMutex, B: Board> {
    registry: &'r DeviceRegistry<M, B>,
    card: Handle,
    kind: Option<CardKind>,
}

impl<'r, M: RawMutex, B: Board> SdCard<'r, M, B> {
    /// Open the card and bind a bus handle to it.
    pub async fn open(registry: &'r DeviceRegistry<M, B>) -> Result<Self, CardError> {
        let card = registry.open(ids::SDCARD, OpenFlags::READ).await?;
        if let Err(e) = bind_bus(registry, card, CardRequest::SetBusHandle.code()).await {
            registry.close(card).await?;
            return Err(e.into());
        }
        Ok(Self {
            registry,
            card,
            kind: None,
        })
    }

    /// Close the card handle, which also closes its bus handle.
    pub async fn close(self) -> Result<(), CardError> {
        Ok(self.registry.close(self.card).await?)
    }

    /// Card generation, once initialized.
    pub fn kind(&self) -> Option<CardKind> {
        self.kind
    }

    /// Power-up sequence: 80 idle clocks, CMD0, CMD8, ACMD41 until ready,
    /// then CMD58 to learn the addressing mode.
    pub async fn init(&mut self) -> Result<CardKind, CardError> {
        self.request(CardRequest::LockBus).await?;
        // The card needs >= 74 clocks with chip-select high.
        let clocked = self.registry.write(self.card, &[0xFF; 10]).await;
        let result = match clocked {
            Ok(()) => self.selected(Self::power_up).await,
            Err(e) => Err(e.into()),
        };
        self.request(CardRequest::ReleaseBus).await?;
        let kind = result?;
        self.kind = Some(kind);
        info!("sd: card ready ({})", kind);
        Ok(kind)
    }

    /// Read one block.
    pub async fn read_block(&self, block: u32, buf: &mut Block) -> Result<(), CardError> {
        let address = self.address(block);
        self.bracketed(|card| async move {
            card.command(CMD_READ_SINGLE, address).await?;
            card.read_data(buf).await
        })
        .await
    }

    /// Read `bufs.len()` consecutive blocks starting at `start` with one
    /// CMD18 / CMD12 pair.
    pub async fn read_blocks(&self, start: u32, bufs: &mut [Block]) -> Result<(), CardError> {
        if bufs.is_empty() {
            return Ok(());
        }
        let address = self.address(start);
        self.bracketed(|card| async move {
            card.command(CMD_READ_MULTIPLE, address).await?;
            for buf in bufs.iter_mut() {
                card.read_data(buf).await?;
            }
            card.stop_transmission().await
        })
        .await
    }

    fn address(&self, block: u32) -> u32 {
        match self.kind {
            Some(CardKind::Sdhc) => block,
            _ => block.saturating_mul(BLOCK_BYTES),
        }
    }

    async fn request(&self, request: CardRequest) -> Result<(), DriverError> {
        self.registry.configure(self.card, request.code(), &[]).await
    }

    /// Lock, select, run `op`, then always deselect and unlock.
    async fn bracketed<'s, F, Fut, T>(&'s self, op: F) -> Result<T, CardError>
    where
        F: FnOnce(&'s Self) -> Fut,
        Fut: core::future::Future<Output = Result<T, CardError>>,
    {
        self.request(CardRequest::LockBus).await?;
        let result = self.selected(op).await;
        self.request(CardRequest::ReleaseBus).await?;
        result
    }

    /// Assert chip-select around `op`. Requires the bus lock.
    async fn selected<'s, F, Fut, T>(&'s self, op: F) -> Result<T, CardError>
    where
        F: FnOnce(&'s Self) -> Fut,
        Fut: core::future::Future<Output = Result<T, CardError>>,
    {
        self.request(CardRequest::AssertCs).await?;
        let result = op(self).await;
        self.request(CardRequest::DeassertCs).await?;
        result
    }

    async fn power_up(&self) -> Result<CardKind, CardError> {
        let r1 = self.command(CMD_GO_IDLE, 0).await?;
        if r1 != R1_IDLE {
            return Err(CardError::Rejected(CMD_GO_IDLE, r1));
        }

        let r1 = self.command(CMD_SEND_IF_COND, IF_COND_PATTERN).await?;
        let v2 = r1 & R1_ILLEGAL == 0;
        if v2 {
            let mut r7 = [0xFF; 4];
            self.registry.read(self.card, &mut r7).await?;
            let [_, _, voltage, pattern] = r7;
            if u32::from_be_bytes([0, 0, voltage & 0x0F, pattern]) != IF_COND_PATTERN {
                return Err(CardError::VoltageMismatch);
            }
        }

        let arg = if v2 { HCS } else { 0 };
        let mut ready = false;
        for _ in 0..INIT_ATTEMPTS {
            self.command(CMD_APP, 0).await?;
            if self.command(ACMD_SEND_OP_COND, arg).await? == R1_READY {
                ready = true;
                break;
            }
            embassy_futures::yield_now().await;
        }
        if !ready {
            return Err(CardError::InitTimeout);
        }

        if !v2 {
            return Ok(CardKind::Sd1);
        }
        let r1 = self.command(CMD_READ_OCR, 0).await?;
        if r1 != R1_READY {
            return Err(CardError::Rejected(CMD_READ_OCR, r1));
        }
        let mut ocr = [0xFF; 4];
        self.registry.read(self.card, &mut ocr).await?;
        let [high, ..] = ocr;
        Ok(if high & OCR_CCS != 0 { CardKind::Sdhc } else { CardKind::Sd2 })
    }

    /// Send a command frame and return its R1.
    async fn command(&self, index: u8, arg: u32) -> Result<u8, CardError> {
        let [a3, a2, a1, a0] = arg.to_be_bytes();
        // Only CMD0 and CMD8 are checked before the card leaves native mode.
        let crc = match index {
            CMD_GO_IDLE => 0x95,
            CMD_SEND_IF_COND => 0x87,
            _ => 0x01,
        };
        self.registry
            .write(self.card, &[0x40 | index, a3, a2, a1, a0, crc])
            .await?;
        let r1 = self.poll(RESPONSE_POLLS, |b| b != 0xFF).await?;
        let r1 = r1.ok_or(CardError::NoResponse(index))?;
        if r1 & !R1_IDLE != 0 && index != CMD_SEND_IF_COND {
            return Err(CardError::Rejected(index, r1));
        }
        Ok(r1)
    }

    async fn read_data(&self, buf: &mut Block) -> Result<(), CardError> {
        match self.poll(TOKEN_POLLS, |b| b != 0xFF).await? {
            Some(DATA_TOKEN) => {}
            Some(_) | None => return Err(CardError::DataTimeout),
        }
        buf.fill(0xFF);
        self.registry.read(self.card, buf).await?;
        let mut crc = [0xFF; 2];
        self.registry.read(self.card, &mut crc).await?;
        Ok(())
    }

    async fn stop_transmission(&self) -> Result<(), CardError> {
        let [a3, a2, a1, a0] = 0u32.to_be_bytes();
        self.registry
            .write(self.card, &[0x40 | CMD_STOP_TRANSMISSION, a3, a2, a1, a0, 0x01])
            .await?;
        // Skip the stuff byte, then wait for R1.
        let mut stuff = [0xFF; 1];
        self.registry.read(self.card, &mut stuff).await?;
        let r1 = self
            .poll(RESPONSE_POLLS, |b| b != 0xFF)
            .await?
            .ok_or(CardError::NoResponse(CMD_STOP_TRANSMISSION))?;
        if r1 != R1_READY {
            return Err(CardError::Rejected(CMD_STOP_TRANSMISSION, r1));
        }
        match self.poll(BUSY_POLLS, |b| b == 0xFF).await? {
            Some(_) => Ok(()),
            None => Err(CardError::Busy),
        }
    }

    /// Clock single bytes until `done` accepts one, at most `limit` times.
    async fn poll(&self, limit: usize, done: impl Fn(u8) -> bool) -> Result<Option<u8>, CardError> {
        for _ in 0..limit {
            let mut byte = [0xFF; 1];
            self.registry.read(self.card, &mut byte).await?;
            let [byte] = byte;
            if done(byte) {
                return Ok(Some(byte));
            }
        }
        Ok(None)
    }
}
