//! # Kernel Image Formats
//!
//! The stage loader treats the on-disk kernel format as a pluggable
//! capability: a format knows how to recognize its header, how to measure
//! the memory span the image needs, and how to lay the image out into an
//! allocated region. The loader's control flow never inspects image bytes
//! itself, so alternate formats slot in without touching it.
//!
//! Two formats ship by default:
//! * [`Elf64Format`] — 64-bit little-endian x86-64 ELF, `PT_LOAD` based.
//! * [`FlatImageFormat`] — a fixed-header flat payload for hand-packed
//!   kernels.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod elf64;
mod flat;

pub use elf64::Elf64Format;
pub use flat::{FLAT_IMAGE_MAGIC, FlatImageFormat, FlatImageHeader};

/// Memory requirements of a validated image, as measured from its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLayout {
    /// Offset of the entry point relative to the start of the placed region.
    pub entry_offset: u64,

    /// Bytes of memory the placed image occupies, including zero-initialized
    /// tails that have no on-disk backing.
    pub load_size: u64,

    /// Load address the image was linked for, if it is position-dependent.
    pub preferred_base: Option<u64>,
}

/// Why an image that looked like a known format could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ImageFormatError {
    /// The buffer ends before a structure the header declares.
    #[error("image is truncated relative to its header")]
    Truncated,
    /// A size or offset computation overflowed.
    #[error("image header arithmetic overflowed")]
    Arithmetic,
    /// The header parses but violates the format's own rules.
    #[error("image header is internally inconsistent")]
    Malformed,
    /// The declared entry point does not fall inside the loadable span.
    #[error("entry point lies outside the loadable span")]
    EntryOutOfBounds,
    /// The region handed to [`ImageFormat::place`] is smaller than the
    /// measured load size.
    #[error("target region is smaller than the measured load size")]
    RegionTooSmall,
}

/// A bootable image format the loader can be taught.
///
/// Contract: [`measure`](Self::measure) and [`place`](Self::place) are only
/// called on buffers for which [`is_valid_header`](Self::is_valid_header)
/// returned `true`, and `place` is only handed regions at least
/// [`ImageLayout::load_size`] bytes long. Both re-check what they rely on;
/// the contract exists so violations are bugs, not memory errors.
pub trait ImageFormat: Sync {
    /// Short human-readable format name for diagnostics.
    fn name(&self) -> &'static str;

    /// Cheap structural sniff: does this buffer start with this format's
    /// header? Must not panic on arbitrary input.
    fn is_valid_header(&self, bytes: &[u8]) -> bool;

    /// Fully validate the header and derive the image's memory layout.
    ///
    /// # Errors
    /// Returns an [`ImageFormatError`] if the image is truncated, internally
    /// inconsistent, or declares an entry point outside its loadable span.
    fn measure(&self, bytes: &[u8]) -> Result<ImageLayout, ImageFormatError>;

    /// Lay the image out into `region`: copy file-backed content, zero the
    /// rest. `region` must be at least [`ImageLayout::load_size`] bytes.
    ///
    /// # Errors
    /// Returns an [`ImageFormatError`] if the region is too small or the
    /// image turns out inconsistent with its measured layout.
    fn place(&self, bytes: &[u8], region: &mut [u8]) -> Result<(), ImageFormatError>;
}

/// The built-in format registry, in sniffing order.
#[must_use]
pub fn default_formats() -> &'static [&'static dyn ImageFormat] {
    static ELF64: Elf64Format = Elf64Format;
    static FLAT: FlatImageFormat = FlatImageFormat;
    static FORMATS: [&'static dyn ImageFormat; 2] = [&ELF64, &FLAT];
    &FORMATS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_contains_both_formats() {
        let names: Vec<_> = default_formats().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["ELF64", "flat"]);
    }
}
