//! # Kernel Image Staging
//!
//! The image moves through three staged types, one per loader phase:
//! [`ImageDescriptor`] (read off the medium), [`ValidatedImage`] (a
//! registered format vouched for the header and measured the layout), and
//! [`PlacedImage`] (resident in allocated memory). Each stage can only be
//! produced by the corresponding [`StageLoader`](crate::StageLoader)
//! operation, so "validated" and "placed" are facts carried by the type, not
//! flags to keep in sync.

use alloc::string::String;
use alloc::vec::Vec;
use boot_image::{ImageFormat, ImageLayout};

/// A kernel image as read from the boot medium, not yet trusted.
pub struct ImageDescriptor {
    path: String,
    bytes: Vec<u8>,
}

impl ImageDescriptor {
    pub(crate) const fn new(path: String, bytes: Vec<u8>) -> Self {
        Self { path, bytes }
    }

    /// The medium path the image was read from.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw image bytes, exactly as long as the medium reported.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// An image a registered format has validated and measured.
pub struct ValidatedImage {
    descriptor: ImageDescriptor,
    format: &'static dyn ImageFormat,
    layout: ImageLayout,
}

impl ValidatedImage {
    pub(crate) const fn new(
        descriptor: ImageDescriptor,
        format: &'static dyn ImageFormat,
        layout: ImageLayout,
    ) -> Self {
        Self {
            descriptor,
            format,
            layout,
        }
    }

    /// The underlying descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ImageDescriptor {
        &self.descriptor
    }

    /// The format that recognized the image.
    #[must_use]
    pub const fn format(&self) -> &'static dyn ImageFormat {
        self.format
    }

    /// The measured memory layout.
    #[must_use]
    pub const fn layout(&self) -> ImageLayout {
        self.layout
    }
}

/// An image resident in memory, ready for the control transfer.
///
/// The region backing it belongs to the image from here on; the loader never
/// reuses or frees it.
#[derive(Debug, Clone, Copy)]
pub struct PlacedImage {
    /// Base address of the allocated region.
    pub base: u64,
    /// Size of the allocated region in bytes (allocator-granularity rounded,
    /// so at least the measured load size).
    pub size: u64,
    /// Absolute entry address: `base` plus the image's entry offset.
    pub entry: u64,
}
