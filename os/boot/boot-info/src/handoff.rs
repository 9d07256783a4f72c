//! # Handoff Record
//!
//! The one data structure the stage loader passes to the kernel across the
//! commit point. The loader builds it exactly once, immediately after
//! `ExitBootServices`; from the kernel's perspective it is read-only. The
//! kernel may copy fields out, but the record's backing memory is ordinary
//! RAM by then — there is no firmware left to keep it stable on the kernel's
//! behalf.

/// Kernel entry function pointer.
///
/// # ABI
/// The ABI is defined as `win64` since the kernel is entered from a UEFI
/// (PE/COFF) application: the record pointer travels in `RCX`.
pub type KernelEntryFn = extern "win64" fn(*const HandoffRecord) -> !;

/// Magic value identifying a well-formed [`HandoffRecord`].
///
/// The ASCII bytes correspond to `"HANDOFF1"` (in little-endian). The kernel
/// entry shim checks this before trusting any other field — it has no other
/// source of truth about what the loader left behind.
pub const HANDOFF_MAGIC: u64 = 0x3146_464F_444E_4148; // "HANDOFF1"

/// Everything the kernel needs right after `ExitBootServices`.
///
/// Built by the loader's commit step and never mutated afterwards. Keep this
/// `#[repr(C)]` and prefer fixed-size integers at the ABI boundary.
#[repr(C)]
#[derive(Clone)]
pub struct HandoffRecord {
    /// Constant [`HANDOFF_MAGIC`] value identifying the record.
    pub magic: u64,

    /// Non-zero once firmware boot services have been exited.
    ///
    /// The loader sets this as part of building the record; a record with
    /// this flag clear must be rejected by the kernel, since the machine is
    /// then in a state the handoff contract does not describe.
    pub boot_services_exited: u32,

    /// Reserved; must be zero.
    pub reserved: u32,

    /// Snapshot of the final firmware memory map.
    pub mmap: MemoryMapInfo,

    /// Where the kernel image ended up in physical memory.
    pub image: LoadedImageInfo,

    /// Boot configuration blob (command line), if any.
    pub config: ConfigInfo,
}

impl HandoffRecord {
    /// Whether the loader marked boot services as exited.
    #[must_use]
    pub const fn services_are_exited(&self) -> bool {
        self.boot_services_exited != 0
    }
}

/// The firmware memory map as captured at the commit point.
#[repr(C)]
#[derive(Clone)]
pub struct MemoryMapInfo {
    /// Pointer to the raw memory map buffer (array of `EFI_MEMORY_DESCRIPTOR`
    /// bytes), owned by the loader's pre-commit copy.
    pub mmap_ptr: u64,

    /// Length of the memory map buffer in **bytes**.
    pub mmap_len: u64,

    /// Size of a single memory descriptor in bytes.
    pub mmap_desc_size: u64,

    /// Descriptor version (from firmware). The kernel can check it matches
    /// expectations.
    pub mmap_desc_version: u32,

    /// Reserved; must be zero.
    pub reserved: u32,
}

/// Where and how large the placed kernel image is.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LoadedImageInfo {
    /// Physical base address of the placed image region.
    pub base: u64,

    /// Size of the placed region in bytes. At least the image's declared
    /// load size; page-rounded by the loader's allocator.
    pub size: u64,

    /// Absolute entry address. Invariant: `base <= entry < base + size`.
    pub entry: u64,
}

/// An opaque configuration blob (e.g. a kernel command line).
///
/// `ptr == 0` means no configuration was supplied; `len` is then zero too.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ConfigInfo {
    /// Pointer to the blob, or 0.
    pub ptr: u64,

    /// Length of the blob in bytes.
    pub len: u64,
}

impl ConfigInfo {
    /// The empty configuration.
    pub const NONE: Self = Self { ptr: 0, len: 0 };
}

// The record crosses a compilation boundary; pin its layout so a loader and
// a kernel built from different checkouts fail loudly rather than subtly.
const _: () = assert!(size_of::<HandoffRecord>() == 88);
const _: () = assert!(size_of::<MemoryMapInfo>() == 32);
const _: () = assert!(size_of::<LoadedImageInfo>() == 24);
const _: () = assert!(size_of::<ConfigInfo>() == 16);
const _: () = assert!(align_of::<HandoffRecord>() == 8);

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::offset_of;

    #[test]
    fn field_offsets_are_stable() {
        assert_eq!(offset_of!(HandoffRecord, magic), 0);
        assert_eq!(offset_of!(HandoffRecord, boot_services_exited), 8);
        assert_eq!(offset_of!(HandoffRecord, mmap), 16);
        assert_eq!(offset_of!(HandoffRecord, image), 48);
        assert_eq!(offset_of!(HandoffRecord, config), 72);
    }

    #[test]
    fn magic_spells_handoff1() {
        assert_eq!(&HANDOFF_MAGIC.to_le_bytes(), b"HANDOFF1");
    }

    #[test]
    fn services_flag_round_trips() {
        let mut record = HandoffRecord {
            magic: HANDOFF_MAGIC,
            boot_services_exited: 1,
            reserved: 0,
            mmap: MemoryMapInfo {
                mmap_ptr: 0x1000,
                mmap_len: 0x100,
                mmap_desc_size: 0x40,
                mmap_desc_version: 1,
                reserved: 0,
            },
            image: LoadedImageInfo {
                base: 0x0010_0000,
                size: 0x2000,
                entry: 0x0010_0040,
            },
            config: ConfigInfo::NONE,
        };
        assert!(record.services_are_exited());
        record.boot_services_exited = 0;
        assert!(!record.services_are_exited());
    }
}
