//! Track storage seam
//!
//! The orchestrator pulls track bytes through [`Storage`] and [`File`] and
//! never sees what sits behind them: a music directory in the emulator,
//! block extents on the SD card on hardware, a byte map in tests.

use core::future::Future;

/// Named tracks, opened for sequential reading.
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// Open track type. Dropping it closes the track.
    type File: File;

    /// Open `name` positioned at byte 0.
    fn open_file(&mut self, name: &str) -> impl Future<Output = Result<Self::File, Self::Error>>;

    /// `true` if `name` can be opened.
    fn exists(&mut self, name: &str) -> impl Future<Output = Result<bool, Self::Error>>;
}

/// An open track.
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Fill as much of `buf` as the track has left. `Ok(0)` means end of
    /// track; a short read before that is allowed.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, Self::Error>>;

    /// Move to byte `pos`, clamped to [`File::size`]. Returns the new position.
    fn seek(&mut self, pos: u64) -> impl Future<Output = Result<u64, Self::Error>>;

    /// Track length in bytes.
    fn size(&self) -> u64;

    /// Back to the first byte, for replaying a finished track.
    async fn rewind(&mut self) -> Result<(), Self::Error> {
        self.seek(0).await?;
        Ok(())
    }
}
