//! # UEFI Stage Loader
//!
//! The UEFI application driving the boot handoff: locate the kernel image
//! on the ESP, validate and place it via [`boot_core`], then exit boot
//! services and jump. All decision logic lives in `boot-core` behind the
//! medium/placer capabilities; this binary contributes the firmware-backed
//! implementations and the two irreversible steps (`ExitBootServices`, the
//! entry jump).
//!
//! ## Failure policy
//!
//! Every failure up to the commit point returns a status to firmware, which
//! may fall back to another boot entry; nothing allocated for the attempt
//! survives such a return except the placed image region itself on success.
//! Past the commit point there is no failure channel — by then the only
//! observable output is the jump.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![no_main]
#![allow(unsafe_code)]
extern crate alloc;

mod config;
mod logger;
mod medium;
mod memory;
mod mmap;
mod placement;
mod tracing;
mod transfer;

use crate::logger::UefiLogger;
use crate::medium::EspVolume;
use crate::placement::FirmwarePlacer;
use alloc::boxed::Box;
use alloc::vec::Vec;
use boot_core::{BootError, BootMedium, StageLoader};
use boot_image::default_formats;
use boot_info::handoff::{ConfigInfo, HandoffRecord};
use core::mem::MaybeUninit;
use log::{LevelFilter, info, warn};
use uefi::prelude::*;

#[entry]
fn efi_main() -> Status {
    // Initialize logging and allocator helpers
    if uefi::helpers::init().is_err() {
        return Status::UNSUPPORTED;
    }

    let logger = UefiLogger::new(LevelFilter::Debug);
    let Ok(logger) = logger.init() else {
        return Status::UNSUPPORTED;
    };

    info!("stage loader starting");

    // The command line travels through the same medium capability as the
    // kernel image; its absence is not an error.
    let mut volume = EspVolume::new();
    let cmdline = read_command_line(&mut volume);

    let mut loader = StageLoader::new(volume, FirmwarePlacer, default_formats());

    let image = match loader.locate_image(config::KERNEL_IMAGE_PATH) {
        Ok(image) => image,
        Err(e) => return boot_status(e),
    };
    let image = match loader.validate_image(image) {
        Ok(image) => image,
        Err(e) => return boot_status(e),
    };
    let placed = match loader.allocate_and_place(&image) {
        Ok(placed) => placed,
        Err(e) => return boot_status(e),
    };

    // The descriptor buffer is spent once the image is resident.
    drop(image);

    // Everything that must survive the commit point is allocated now, while
    // the firmware allocator still exists: the record slot, the config
    // blob, and the kernel's first stack.
    let config = leak_command_line(cmdline);
    let record_slot: &'static mut MaybeUninit<HandoffRecord> =
        Box::leak(Box::new(MaybeUninit::uninit()));
    let Ok((_stack_base, stack_top)) = memory::alloc_handoff_stack(config::HANDOFF_STACK_SIZE, true)
    else {
        return boot_status(BootError::InsufficientMemory);
    };

    // Commit point. The loader (and with it the volume and placer) is gone
    // after this; so are boot services.
    logger.exit_boot_services();
    let record = match loader.into_handoff(&placed, config, mmap::exit_boot_services) {
        Ok(record) => record,
        Err(e) => return boot_status(e),
    };
    let record: &'static HandoffRecord = record_slot.write(record);

    tracing::trace_handoff(record, stack_top);

    // Off we pop.
    unsafe { transfer::enter_kernel(placed.entry, record, stack_top) }
}

/// Read the optional kernel command line off the ESP.
fn read_command_line(volume: &mut EspVolume) -> Option<Vec<u8>> {
    match volume.read_file(config::COMMAND_LINE_PATH) {
        Ok(bytes) if bytes.len() > config::MAX_COMMAND_LINE => {
            warn!(
                "command line exceeds {} bytes, ignoring it",
                config::MAX_COMMAND_LINE
            );
            None
        }
        Ok(bytes) if bytes.is_empty() => None,
        Ok(bytes) => Some(bytes),
        Err(e) => {
            info!("no command line ({e})");
            None
        }
    }
}

/// Move the command line out of the allocator's reach so it survives the
/// commit point.
fn leak_command_line(cmdline: Option<Vec<u8>>) -> ConfigInfo {
    cmdline.map_or(ConfigInfo::NONE, |bytes| {
        let leaked: &'static mut [u8] = bytes.leak();
        ConfigInfo {
            ptr: leaked.as_ptr() as u64,
            len: leaked.len() as u64,
        }
    })
}

/// Map the pre-commit error taxonomy onto firmware status codes.
const fn boot_status(err: BootError) -> Status {
    match err {
        BootError::ImageNotFound => Status::NOT_FOUND,
        BootError::ImageCorrupt => Status::LOAD_ERROR,
        BootError::UnsupportedFormat => Status::UNSUPPORTED,
        BootError::InsufficientMemory => Status::OUT_OF_RESOURCES,
        BootError::ServicesUnavailable => Status::ABORTED,
    }
}
