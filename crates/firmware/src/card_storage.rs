//! `platform::Storage` over raw SD card blocks.
//!
//! Each track is a contiguous block extent listed in a [`playlist`] table.
//! A file keeps one block cached, so the orchestrator's 64-byte reads cost
//! one card read per 512 bytes.
//!
//! [`playlist`]: crate::playlist

use drivers::sd::{Block, CardError, SdCard, BLOCK_SIZE};
use drivers::Board;
use embassy_sync::blocking_mutex::raw::RawMutex;
use platform::{File, Storage};
use thiserror_no_std::Error;

use crate::playlist::{self, Extent};

const BLOCK_BYTES: u32 = 512;

/// Storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CardStorageError {
    /// The name is not in the playlist.
    #[error("track not on the card")]
    NotFound,
    /// The card read failed.
    #[error("card: {0}")]
    Card(#[from] CardError),
}

/// Playlist-backed storage on an initialized card.
pub struct CardStorage<'c, 'r, M: RawMutex, B: Board> {
    card: &'c SdCard<'r, M, B>,
    table: &'c [Extent],
}

impl<'c, 'r, M: RawMutex, B: Board> CardStorage<'c, 'r, M, B> {
    /// Storage serving the tracks in `table` from `card`.
    pub fn new(card: &'c SdCard<'r, M, B>, table: &'c [Extent]) -> Self {
        Self { card, table }
    }
}

impl<'c, 'r, M: RawMutex, B: Board> Storage for CardStorage<'c, 'r, M, B> {
    type Error = CardStorageError;
    type File = CardFile<'c, 'r, M, B>;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let extent = *playlist::find(self.table, path).ok_or(CardStorageError::NotFound)?;
        Ok(CardFile {
            card: self.card,
            extent,
            pos: 0,
            cached: None,
            buf: [0; BLOCK_SIZE],
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(playlist::find(self.table, path).is_some())
    }
}

/// One open track.
pub struct CardFile<'c, 'r, M: RawMutex, B: Board> {
    card: &'c SdCard<'r, M, B>,
    extent: Extent,
    pos: u32,
    /// Absolute block number held in `buf`.
    cached: Option<u32>,
    buf: Block,
}

impl<M: RawMutex, B: Board> CardFile<'_, '_, M, B> {
    async fn load(&mut self, block: u32) -> Result<&Block, CardError> {
        if self.cached != Some(block) {
            self.cached = None;
            self.card.read_block(block, &mut self.buf).await?;
            self.cached = Some(block);
        }
        Ok(&self.buf)
    }
}

impl<M: RawMutex, B: Board> File for CardFile<'_, '_, M, B> {
    type Error = CardStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = self.extent.len.saturating_sub(self.pos);
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let block = self.extent.first_block.saturating_add(self.pos / BLOCK_BYTES);
        let offset = (self.pos % BLOCK_BYTES) as usize;
        let data = self.load(block).await?;
        let available = data.get(offset..).unwrap_or_default();
        let n = available
            .len()
            .min(buf.len())
            .min(usize::try_from(remaining).unwrap_or(usize::MAX));
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), available.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n as u32);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = u32::try_from(pos).unwrap_or(u32::MAX).min(self.extent.len);
        Ok(u64::from(self.pos))
    }

    fn size(&self) -> u64 {
        u64::from(self.extent.len)
    }
}
