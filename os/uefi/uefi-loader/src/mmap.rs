//! # Memory Map Capture at the Commit Point
//!
//! Exiting boot services and keeping a usable copy of the final memory map
//! around for the kernel.

use alloc::vec;
use alloc::vec::Vec;
use boot_core::ExitRefused;
use boot_info::handoff::MemoryMapInfo;
use log::info;
use uefi::boot::MemoryType;
use uefi::mem::memory_map::MemoryMap;
use uefi::{Status, boot};

/// Exit the UEFI boot services and retain a copy of the final memory map.
///
/// # Errors
/// [`ExitRefused`] if the copy buffer cannot be prepared (boot services are
/// then still active and the failure is reportable), or if the final map
/// unexpectedly outgrows the buffer.
pub fn exit_boot_services() -> Result<MemoryMapInfo, ExitRefused> {
    info!("exiting boot services ...");

    // Pre-allocate a buffer while the UEFI allocator is still alive.
    let mut mmap_copy = allocate_mmap_buffer().map_err(|_| ExitRefused)?;
    let mmap_copy_ptr = mmap_copy.as_mut_ptr();

    // Exit boot services — after this, the UEFI allocator must not be used
    // anymore.
    let owned_map = unsafe { boot::exit_boot_services(None) };

    // Copy the returned descriptors into our preallocated buffer.
    let src = owned_map.buffer().as_ptr();
    let mmap_length = owned_map.buffer().len();

    if mmap_length > mmap_copy.len() {
        debugcon::debugcon!(
            "memory map outgrew its copy buffer: {mmap_length} > {}\n",
            mmap_copy.len()
        );
        return Err(ExitRefused);
    }
    unsafe {
        core::ptr::copy_nonoverlapping(src, mmap_copy_ptr, mmap_length);
    }

    let mmap = MemoryMapInfo {
        mmap_ptr: mmap_copy_ptr as u64,
        mmap_len: mmap_length as u64,
        mmap_desc_size: owned_map.meta().desc_size as u64,
        mmap_desc_version: owned_map.meta().desc_version,
        reserved: 0,
    };

    // Ensure the memory map copy continues to exist.
    core::mem::forget(mmap_copy);

    debugcon::debugcon!("boot services exited, flying by instruments now\n");
    Ok(mmap)
}

/// Allocate a buffer to hold a copy of the memory map returned from
/// `ExitBootServices`.
///
/// This seems to be the opposite of an exact science:
/// * After boot services were exited, allocation is impossible.
/// * The number of descriptors changes over time.
///
/// As a result, we overallocate to hopefully have enough headroom to
/// contain the memory map _after_ exiting.
fn allocate_mmap_buffer() -> Result<Vec<u8>, Status> {
    const EXTRA_DESCS: usize = 32;

    // Introspect the memory map.
    let probe = boot::memory_map(MemoryType::LOADER_DATA).map_err(|e| {
        log::warn!("failed to get memory map: {e:?}");
        Status::UNSUPPORTED
    })?;

    let desc_size = probe.meta().desc_size;
    let mut needed_size = probe.meta().map_size;

    // We won't use `probe`'s buffer; drop it now to reduce churn.
    drop(probe);

    // Pre-allocate our own buffer with slack for extra descriptors.
    // Rule of thumb: + N * desc_size; N=16..64 is usually plenty in
    // QEMU/OVMF.
    needed_size += EXTRA_DESCS * desc_size;

    Ok(vec![0u8; needed_size])
}
