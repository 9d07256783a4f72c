//! # Firmware-backed Image Placement
//!
//! [`ImagePlacer`] over the boot-services page allocator. Regions are
//! page-granular `LOADER_CODE` memory; on real firmware the region's base
//! address and its backing bytes are the same thing, since boot services
//! identity-map physical memory.

use boot_core::{ImagePlacer, OutOfMemory, Region};
use core::ptr::NonNull;
use core::slice;
use log::warn;
use uefi::boot::{self, AllocateType, MemoryType, PAGE_SIZE};

/// The boot-services page allocator.
pub struct FirmwarePlacer;

impl ImagePlacer for FirmwarePlacer {
    fn allocate(&mut self, size: usize, preferred_base: Option<u64>) -> Result<Region, OutOfMemory> {
        let pages = size.div_ceil(PAGE_SIZE);

        // A position-dependent image is only correct at its linked base;
        // refusing beats relocating it somewhere it cannot run.
        let allocate_type = match preferred_base {
            Some(base) => AllocateType::Address(base),
            None => AllocateType::AnyPages,
        };

        let ptr = boot::allocate_pages(allocate_type, MemoryType::LOADER_CODE, pages).map_err(
            |e| {
                warn!("allocate_pages({pages} pages, {preferred_base:?}) failed: {e:?}");
                OutOfMemory
            },
        )?;

        let base = ptr.as_ptr() as u64;
        // SAFETY: the firmware just handed us `pages` whole pages at `ptr`;
        // nothing else references them, and they live until free_pages.
        let bytes = unsafe { slice::from_raw_parts_mut(ptr.as_ptr(), pages * PAGE_SIZE) };
        Ok(Region::new(base, bytes))
    }

    fn release(&mut self, region: Region) {
        let pages = region.len() / PAGE_SIZE;
        let Some(ptr) = NonNull::new(region.base() as *mut u8) else {
            return;
        };
        // SAFETY: `region` came from allocate() above: `pages` whole pages
        // at `base`, and the caller has given up its view of the bytes.
        if let Err(e) = unsafe { boot::free_pages(ptr, pages) } {
            warn!("free_pages failed: {e:?}");
        }
    }
}
