//! Build-time playlist.
//!
//! The card carries no file system. Tracks are written to fixed block
//! extents when the card is imaged, and this table maps each track name to
//! its extent.

use drivers::sd::BLOCK_SIZE;

/// One track's location on the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Extent {
    /// Name the control surface starts the track by.
    pub name: &'static str,
    /// First block of the track.
    pub first_block: u32,
    /// Track length in bytes.
    pub len: u32,
}

impl Extent {
    /// Blocks the track occupies, the last one possibly partial.
    pub const fn blocks(&self) -> u32 {
        self.len.div_ceil(BLOCK_SIZE as u32)
    }

    /// First block after the track.
    pub const fn end_block(&self) -> u32 {
        self.first_block.saturating_add(self.blocks())
    }
}

/// Tracks on the reference card image, in play order.
pub const PLAYLIST: &[Extent] = &[
    Extent {
        name: "track001.mp3",
        first_block: 2048,
        len: 3_145_728,
    },
    Extent {
        name: "track002.mp3",
        first_block: 8192,
        len: 4_718_592,
    },
    Extent {
        name: "track003.mp3",
        first_block: 18_432,
        len: 2_621_440,
    },
];

/// Look `name` up in `table`.
pub fn find<'t>(table: &'t [Extent], name: &str) -> Option<&'t Extent> {
    table.iter().find(|extent| extent.name == name)
}
