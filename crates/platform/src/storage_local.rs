//! Local filesystem Storage implementation for the desktop emulator.
//!
//! Tracks are plain files in one music directory; names passed to
//! [`Storage::open_file`] are resolved relative to it. The hardware build
//! never compiles this module.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::storage::{File, Storage};

/// Error type for local filesystem operations.
#[derive(Debug)]
pub struct LocalStorageError(pub std::io::Error);

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "local storage error: {}", self.0)
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// A track opened from the music directory.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Read::read(&mut self.inner, buf).map_err(LocalStorageError)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Seek::seek(&mut self.inner, SeekFrom::Start(pos.min(self.size))).map_err(LocalStorageError)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// `platform::Storage` backed by one directory of MP3 files.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalFileStorage;
/// use platform::Storage;
/// let mut storage = LocalFileStorage::new("/home/user/music");
/// let file = storage.open_file("track1.mp3").await.unwrap();
/// # }
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Serve tracks from `music_root`.
    #[must_use]
    pub fn new(music_root: impl Into<PathBuf>) -> Self {
        Self {
            root: music_root.into(),
        }
    }

    /// Serve tracks from `$MUSIC_PATH`, if set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var_os("MUSIC_PATH").map(Self::new)
    }

    /// Names of the `.mp3` files in the music directory, sorted.
    pub fn track_names(&self) -> Result<Vec<String>, LocalStorageError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(LocalStorageError)? {
            let path = entry.map_err(LocalStorageError)?.path();
            let is_mp3 = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mp3"));
            if let (true, Some(name)) = (is_mp3, path.file_name().and_then(|n| n.to_str())) {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    async fn open_file(&mut self, name: &str) -> Result<Self::File, Self::Error> {
        let file = fs::File::open(self.resolve(name)).map_err(LocalStorageError)?;
        let size = file.metadata().map_err(LocalStorageError)?.len();
        Ok(LocalFile { inner: file, size })
    }

    async fn exists(&mut self, name: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(name).is_file())
    }
}
