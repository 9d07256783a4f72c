//! # Flat Boot Image Format
//!
//! A hand-packable alternative to ELF: a fixed `#[repr(C)]` header followed
//! by the raw payload. Useful for kernels produced by `objcopy -O binary`
//! plus a small packing step, and for exercising the loader without a full
//! toolchain in the loop.

use crate::{ImageFormat, ImageFormatError, ImageLayout};
use core::ptr::read_unaligned;

/// Magic signature identifying a flat boot image.
///
/// The ASCII bytes correspond to `"BOOTIMG1"` (in little-endian). The marker
/// lets the loader tell a packed kernel from arbitrary file content before
/// trusting any offset in the header.
pub const FLAT_IMAGE_MAGIC: u64 = 0x3147_4D49_544F_4F42; // "BOOTIMG1"

/// Header version this loader understands.
const FLAT_IMAGE_VERSION: u32 = 1;

/// Fixed-size header preceding the payload of a flat boot image.
///
/// All sizes and offsets are in bytes. The payload follows the header
/// immediately and runs for exactly `payload_size` bytes.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct FlatImageHeader {
    /// Constant [`FLAT_IMAGE_MAGIC`] value identifying the image.
    pub magic: u64,

    /// Header format version; currently always 1.
    pub version: u32,

    /// Reserved for alignment; must be zero.
    pub reserved: u32,

    /// Payload length in bytes. Must match the bytes actually present after
    /// the header.
    pub payload_size: u64,

    /// Entry point offset relative to the start of the payload.
    pub entry_offset: u64,

    /// Load address the payload was linked for, or 0 if it is position-
    /// independent.
    pub preferred_base: u64,
}

const _: () = assert!(size_of::<FlatImageHeader>() == 40);

/// Flat payload images with a [`FlatImageHeader`].
pub struct FlatImageFormat;

impl FlatImageFormat {
    fn header(bytes: &[u8]) -> Result<FlatImageHeader, ImageFormatError> {
        if bytes.len() < size_of::<FlatImageHeader>() {
            return Err(ImageFormatError::Truncated);
        }
        // SAFETY: bounds checked above; the file buffer has no alignment
        // guarantee, hence read_unaligned.
        let header = unsafe { read_unaligned(bytes.as_ptr().cast::<FlatImageHeader>()) };
        if header.magic != FLAT_IMAGE_MAGIC {
            return Err(ImageFormatError::Malformed);
        }
        if header.version != FLAT_IMAGE_VERSION || header.reserved != 0 {
            return Err(ImageFormatError::Malformed);
        }
        Ok(header)
    }

    fn payload(bytes: &[u8]) -> Result<(FlatImageHeader, &[u8]), ImageFormatError> {
        let header = Self::header(bytes)?;
        let declared =
            usize::try_from(header.payload_size).map_err(|_| ImageFormatError::Arithmetic)?;
        let actual = bytes.len() - size_of::<FlatImageHeader>();
        if declared != actual {
            return Err(ImageFormatError::Truncated);
        }
        Ok((header, &bytes[size_of::<FlatImageHeader>()..]))
    }
}

impl ImageFormat for FlatImageFormat {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn is_valid_header(&self, bytes: &[u8]) -> bool {
        bytes.len() >= size_of::<u64>()
            && bytes[..size_of::<u64>()] == FLAT_IMAGE_MAGIC.to_le_bytes()
    }

    fn measure(&self, bytes: &[u8]) -> Result<ImageLayout, ImageFormatError> {
        let (header, payload) = Self::payload(bytes)?;
        if payload.is_empty() {
            return Err(ImageFormatError::Malformed);
        }
        if header.entry_offset >= header.payload_size {
            return Err(ImageFormatError::EntryOutOfBounds);
        }
        Ok(ImageLayout {
            entry_offset: header.entry_offset,
            load_size: header.payload_size,
            preferred_base: (header.preferred_base != 0).then_some(header.preferred_base),
        })
    }

    fn place(&self, bytes: &[u8], region: &mut [u8]) -> Result<(), ImageFormatError> {
        let (_, payload) = Self::payload(bytes)?;
        if region.len() < payload.len() {
            return Err(ImageFormatError::RegionTooSmall);
        }
        region[..payload.len()].copy_from_slice(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packed(entry_offset: u64, preferred_base: u64, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&FLAT_IMAGE_MAGIC.to_le_bytes());
        out.extend_from_slice(&FLAT_IMAGE_VERSION.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        out.extend_from_slice(&entry_offset.to_le_bytes());
        out.extend_from_slice(&preferred_base.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn magic_spells_bootimg1() {
        assert_eq!(&FLAT_IMAGE_MAGIC.to_le_bytes(), b"BOOTIMG1");
    }

    #[test]
    fn sniff_accepts_only_the_magic() {
        assert!(FlatImageFormat.is_valid_header(&packed(0, 0, b"\x90")));
        assert!(!FlatImageFormat.is_valid_header(b"BOOTIMG"));
        assert!(!FlatImageFormat.is_valid_header(b"ARBITRARY"));
    }

    #[test]
    fn measure_reads_the_header_fields() {
        let image = packed(0x10, 0x0020_0000, &[0x90; 0x40]);
        let layout = FlatImageFormat.measure(&image).unwrap();
        assert_eq!(layout.entry_offset, 0x10);
        assert_eq!(layout.load_size, 0x40);
        assert_eq!(layout.preferred_base, Some(0x0020_0000));
    }

    #[test]
    fn measure_treats_zero_base_as_relocatable() {
        let image = packed(0, 0, &[0x90; 4]);
        let layout = FlatImageFormat.measure(&image).unwrap();
        assert_eq!(layout.preferred_base, None);
    }

    #[test]
    fn measure_rejects_size_mismatch() {
        let mut image = packed(0, 0, &[0x90; 8]);
        image.truncate(image.len() - 2);
        assert_eq!(
            FlatImageFormat.measure(&image),
            Err(ImageFormatError::Truncated)
        );
    }

    #[test]
    fn measure_rejects_empty_payload_and_bad_entry() {
        let empty = packed(0, 0, b"");
        assert_eq!(
            FlatImageFormat.measure(&empty),
            Err(ImageFormatError::Malformed)
        );
        let bad_entry = packed(8, 0, &[0x90; 8]);
        assert_eq!(
            FlatImageFormat.measure(&bad_entry),
            Err(ImageFormatError::EntryOutOfBounds)
        );
    }

    #[test]
    fn measure_rejects_unknown_version() {
        let mut image = packed(0, 0, &[0x90; 4]);
        image[8..12].copy_from_slice(&2u32.to_le_bytes());
        assert_eq!(
            FlatImageFormat.measure(&image),
            Err(ImageFormatError::Malformed)
        );
    }

    #[test]
    fn place_copies_the_payload_verbatim() {
        let payload: Vec<u8> = (0..64u8).collect();
        let image = packed(0, 0, &payload);
        let mut region = vec![0u8; 128];
        FlatImageFormat.place(&image, &mut region).unwrap();
        assert_eq!(&region[..64], payload.as_slice());
    }
}
