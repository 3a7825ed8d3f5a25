//! FileIdentity - stable key for a file across opens and renames
//!
//! Derived from device id + inode number. A file that is truncated and
//! recreated on a filesystem that reuses the inode keeps the same identity;
//! that is an accepted limitation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, Metadata};
use std::io;
use std::path::Path;

/// Device + inode pair identifying a file.
///
/// Renders as `"{dev:x}g{ino:x}"`, the key stored in the sincedb.
///
/// # Examples
/// ```
/// use contracts::FileIdentity;
///
/// let id = FileIdentity::new(0x801, 0x2a);
/// assert_eq!(id.to_string(), "801g2a");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    /// Create from raw device and inode values
    pub fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Create from file metadata
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Create from file metadata
    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> io::Result<Self> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file identity requires device/inode metadata",
        ))
    }

    /// Create from an open file handle
    pub fn from_file(file: &File) -> io::Result<Self> {
        Self::from_metadata(&file.metadata()?)
    }

    /// Create from the live file currently at `path`
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::from_metadata(&std::fs::metadata(path)?)
    }

    /// Device id
    pub fn dev(&self) -> u64 {
        self.dev
    }

    /// Inode number
    pub fn ino(&self) -> u64 {
        self.ino
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}g{:x}", self.dev, self.ino)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_deterministic() {
        let a = FileIdentity::new(2049, 131_072);
        let b = FileIdentity::new(2049, 131_072);
        assert_eq!(a.to_string(), b.to_string());
        assert_eq!(a.to_string(), "801g20000");
    }

    #[test]
    fn test_distinct_inodes_do_not_collide() {
        let a = FileIdentity::new(1, 0x12);
        let b = FileIdentity::new(1, 0x21);
        assert_ne!(a.to_string(), b.to_string());
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_survives_rename() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("app.log");
        std::fs::write(&original, b"line\n").unwrap();
        let before = FileIdentity::from_path(&original).unwrap();

        let renamed = dir.path().join("app.log.1");
        std::fs::rename(&original, &renamed).unwrap();
        let after = FileIdentity::from_path(&renamed).unwrap();

        assert_eq!(before, after);
    }

    #[cfg(unix)]
    #[test]
    fn test_identity_from_file_matches_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.log");
        std::fs::write(&path, b"").unwrap();
        let file = File::open(&path).unwrap();
        assert_eq!(
            FileIdentity::from_file(&file).unwrap(),
            FileIdentity::from_path(&path).unwrap()
        );
    }
}
