//! # Loader → Kernel Handoff ABI
//!
//! The single shared vocabulary between the stage loader and the kernel it
//! starts. Everything in here crosses the boot-services commit point by
//! reference, so the types are `#[repr(C)]`, use fixed-size integers only,
//! and carry compile-time layout assertions.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod handoff;
pub mod memory;

pub use handoff::{
    ConfigInfo, HANDOFF_MAGIC, HandoffRecord, KernelEntryFn, LoadedImageInfo, MemoryMapInfo,
};
