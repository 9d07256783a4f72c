//! # Stage Loader State Machine
//!
//! `PreBoot → ImageLoaded → (Validated | Rejected) → HandoffBuilt`, driven
//! by one method per transition. `Rejected` is a returned [`BootError`];
//! `HandoffBuilt` consumes the loader, which is what makes the commit point
//! irrevocable at the type level.

use crate::image::{ImageDescriptor, PlacedImage, ValidatedImage};
use crate::medium::BootMedium;
use crate::outcome::{BootError, ExitRefused};
use crate::placement::ImagePlacer;
use alloc::string::ToString;
use boot_image::ImageFormat;
use boot_info::handoff::{
    ConfigInfo, HANDOFF_MAGIC, HandoffRecord, LoadedImageInfo, MemoryMapInfo,
};
use log::{debug, info, warn};

/// Discovers, validates and places exactly one kernel image, then builds
/// the handoff record.
///
/// Owns the boot medium and the image placer for the duration of the
/// attempt. Both die with the loader at [`into_handoff`](Self::into_handoff)
/// — the last moment firmware services may be touched.
pub struct StageLoader<M, P> {
    medium: M,
    placer: P,
    formats: &'static [&'static dyn ImageFormat],
}

impl<M: BootMedium, P: ImagePlacer> StageLoader<M, P> {
    /// A loader over the given capabilities and format registry.
    #[must_use]
    pub const fn new(medium: M, placer: P, formats: &'static [&'static dyn ImageFormat]) -> Self {
        Self {
            medium,
            placer,
            formats,
        }
    }

    /// Read the kernel image at `path` off the boot medium.
    ///
    /// Read-only and idempotent: no allocation beyond the returned buffer,
    /// no medium state change.
    ///
    /// # Errors
    /// [`BootError::ImageNotFound`] if the path is absent, is not a regular
    /// file, or the medium is unreadable.
    pub fn locate_image(&mut self, path: &str) -> Result<ImageDescriptor, BootError> {
        let bytes = self.medium.read_file(path).map_err(|e| {
            warn!("no kernel image at {path}: {e}");
            BootError::ImageNotFound
        })?;
        debug!("read {} bytes from {path}", bytes.len());
        Ok(ImageDescriptor::new(path.to_string(), bytes))
    }

    /// Check the image against the format registry and measure its layout.
    ///
    /// The loader itself only enforces what the boot protocol mandates:
    /// non-empty content, a header some registered format vouches for, and
    /// an entry offset inside the loadable span. Everything format-specific
    /// lives behind [`ImageFormat`].
    ///
    /// # Errors
    /// [`BootError::UnsupportedFormat`] if no registered format recognizes
    /// the header; [`BootError::ImageCorrupt`] for empty content, a
    /// malformed body, or an out-of-bounds entry point.
    pub fn validate_image(&self, image: ImageDescriptor) -> Result<ValidatedImage, BootError> {
        if image.bytes().is_empty() {
            warn!("kernel image {} is empty", image.path());
            return Err(BootError::ImageCorrupt);
        }

        let format = self
            .formats
            .iter()
            .copied()
            .find(|f| f.is_valid_header(image.bytes()))
            .ok_or_else(|| {
                warn!("no registered format recognizes {}", image.path());
                BootError::UnsupportedFormat
            })?;

        let layout = format.measure(image.bytes()).map_err(|e| {
            warn!("{} rejected {}: {e}", format.name(), image.path());
            BootError::ImageCorrupt
        })?;
        if layout.load_size == 0 || layout.entry_offset >= layout.load_size {
            return Err(BootError::ImageCorrupt);
        }

        info!(
            "{}: {} image, load size {} bytes, entry offset {:#x}",
            image.path(),
            format.name(),
            layout.load_size,
            layout.entry_offset
        );
        Ok(ValidatedImage::new(image, format, layout))
    }

    /// Allocate memory for the image and lay it out there.
    ///
    /// On success the returned region belongs to the placed image; the
    /// loader will not reuse or free it. On any failure the allocation is
    /// released before returning, leaving the system in its pre-boot state.
    ///
    /// # Errors
    /// [`BootError::InsufficientMemory`] if the allocator cannot back the
    /// region; [`BootError::ImageCorrupt`] if the image turns out
    /// inconsistent while being placed.
    pub fn allocate_and_place(&mut self, image: &ValidatedImage) -> Result<PlacedImage, BootError> {
        let layout = image.layout();
        let size = usize::try_from(layout.load_size).map_err(|_| BootError::ImageCorrupt)?;

        let mut region = self
            .placer
            .allocate(size, layout.preferred_base)
            .map_err(|e| {
                warn!("cannot back {size} byte image region: {e}");
                BootError::InsufficientMemory
            })?;

        if let Err(e) = image
            .format()
            .place(image.descriptor().bytes(), region.bytes_mut())
        {
            warn!("placing {} failed: {e}", image.descriptor().path());
            self.placer.release(region);
            return Err(BootError::ImageCorrupt);
        }

        let Some(entry) = region.base().checked_add(layout.entry_offset) else {
            self.placer.release(region);
            return Err(BootError::ImageCorrupt);
        };
        let placed = PlacedImage {
            base: region.base(),
            size: region.len() as u64,
            entry,
        };
        info!(
            "kernel image resident at {:#x}..{:#x}, entry {:#x}",
            placed.base,
            placed.base + placed.size,
            placed.entry
        );
        Ok(placed)
    }

    /// Build the handoff record. **This is the commit point.**
    ///
    /// Consumes the loader: the medium and placer are dropped (releasing
    /// their firmware handles) *before* `exit` runs, and neither they nor
    /// any other boot-services-backed resource exist once this returns. The
    /// `exit` closure leaves firmware boot services and returns the final
    /// memory map snapshot; on real firmware this is `ExitBootServices`.
    ///
    /// Nothing here allocates — every buffer referenced by the record was
    /// set up by the caller strictly beforehand.
    ///
    /// # Errors
    /// [`BootError::ServicesUnavailable`] if `exit` fails. In that case
    /// boot services are still active and the outcome is reportable like
    /// any other pre-commit failure.
    pub fn into_handoff(
        self,
        image: &PlacedImage,
        config: ConfigInfo,
        exit: impl FnOnce() -> Result<MemoryMapInfo, ExitRefused>,
    ) -> Result<HandoffRecord, BootError> {
        let Self {
            medium,
            placer,
            formats: _,
        } = self;
        drop(medium);
        drop(placer);

        let mmap = exit().map_err(|_| BootError::ServicesUnavailable)?;

        Ok(HandoffRecord {
            magic: HANDOFF_MAGIC,
            boot_services_exited: 1,
            reserved: 0,
            mmap,
            image: LoadedImageInfo {
                base: image.base,
                size: image.size,
                entry: image.entry,
            },
            config,
        })
    }
}
