//! # Boot Medium Capability
//!
//! The loader's only view of storage: read one regular file, whole, by path.
//! The medium handle itself stays owned by firmware; implementations borrow
//! it for the duration of a read.

use alloc::vec::Vec;

/// Why a file could not be read off the medium.
///
/// All three collapse to `ImageNotFound` at the boot outcome level; the
/// distinction exists for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MediumError {
    /// No file exists at the given path.
    #[error("no file exists at the given path")]
    NotFound,
    /// The path resolves to a directory or other non-file object.
    #[error("the path names something other than a regular file")]
    NotRegularFile,
    /// The volume could not be opened or the read failed partway.
    #[error("the medium failed while reading")]
    Unreadable,
}

/// Read access to the volume the firmware booted from.
///
/// A lookup must be side-effect free: reading the same path twice with
/// unchanged medium state yields identical bytes.
pub trait BootMedium {
    /// Read the regular file at `path` in its entirety.
    ///
    /// # Errors
    /// Returns a [`MediumError`] if the path is absent, is not a regular
    /// file, or the medium fails mid-read. The returned buffer's length is
    /// exactly the size the medium reported for the file.
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, MediumError>;
}
