//! # ESP-backed Boot Medium
//!
//! [`BootMedium`] over the simple filesystem of the partition this loader
//! was started from. The volume handle stays firmware-owned; each read
//! opens and drops the protocol, so the capability holds nothing across
//! calls and can be dropped at the commit point without ceremony.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use boot_core::{BootMedium, MediumError};
use log::warn;
use uefi::proto::media::file::{File, FileAttribute, FileMode, RegularFile};
use uefi::{CString16, Status, boot};

/// The EFI System Partition the loader image came from.
pub struct EspVolume;

impl EspVolume {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BootMedium for EspVolume {
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, MediumError> {
        let Ok(path) = CString16::try_from(path) else {
            warn!("path is not representable as UCS-2: {path}");
            return Err(MediumError::NotFound);
        };

        let image_handle = boot::image_handle();
        let mut sfs = boot::get_image_file_system(image_handle).map_err(|e| {
            warn!("failed to get file system: {e:?}");
            MediumError::Unreadable
        })?;

        let mut volume = sfs.open_volume().map_err(|e| {
            warn!("failed to open root directory: {e:?}");
            MediumError::Unreadable
        })?;

        let handle = volume
            .open(&path, FileMode::Read, FileAttribute::empty())
            .map_err(|e| {
                if e.status() == Status::NOT_FOUND {
                    MediumError::NotFound
                } else {
                    warn!("failed to open {path}: {e:?}");
                    MediumError::Unreadable
                }
            })?;

        let Some(mut file) = handle.into_regular_file() else {
            return Err(MediumError::NotRegularFile);
        };

        // Get file size
        file.set_position(RegularFile::END_OF_FILE)
            .map_err(|_| MediumError::Unreadable)?;
        let size = file.get_position().map_err(|_| MediumError::Unreadable)?;

        // Seek back for actual reading
        file.set_position(0).map_err(|_| MediumError::Unreadable)?;

        let Ok(size) = usize::try_from(size) else {
            warn!("file size does not fit the address space: {size}");
            return Err(MediumError::Unreadable);
        };

        let mut buf = vec![0u8; size];
        let read = file.read(&mut buf).map_err(|e| {
            warn!("failed to read {path}: {e:?}");
            MediumError::Unreadable
        })?;

        if read != size {
            warn!("short read on {path}: got {read} bytes, expected {size}");
            return Err(MediumError::Unreadable);
        }

        Ok(buf)
    }
}
