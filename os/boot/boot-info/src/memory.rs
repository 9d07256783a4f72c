//! # Physical Memory Layout
//!
//! The few layout constants loader and kernel must agree on.

/// Physical address the kernel image is linked to run at.
///
/// The loader places a position-dependent image at exactly this address
/// (firmware identity-maps physical memory, so no translation is set up for
/// the jump).
pub const KERNEL_LINK_BASE: u64 = 0x0020_0000;

/// Allocation granularity assumed on both sides of the handoff.
pub const PAGE_SIZE: usize = 4096;

const _: () = assert!(KERNEL_LINK_BASE % (PAGE_SIZE as u64) == 0);
