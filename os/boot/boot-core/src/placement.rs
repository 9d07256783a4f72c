//! # Image Placement Capability
//!
//! The loader's only view of the firmware allocator: carve out one writable
//! region for the kernel image. Regions are identified by the base address
//! they will have when the kernel runs, which on real firmware is also where
//! the backing bytes live; test doubles may separate the two.

/// The allocator could not back the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the firmware allocator is exhausted")]
pub struct OutOfMemory;

/// A region of memory obtained from an [`ImagePlacer`].
///
/// Holds the runtime base address and the writable backing bytes. There is
/// no `Drop` glue: a region is either handed back via
/// [`ImagePlacer::release`] (failure paths) or intentionally left in place
/// forever (ownership transferred to the placed image).
pub struct Region {
    base: u64,
    bytes: &'static mut [u8],
}

impl Region {
    /// Wrap an allocation. `base` is the address the region's contents will
    /// be visible at once the kernel owns the machine.
    #[must_use]
    pub fn new(base: u64, bytes: &'static mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Runtime base address of the region.
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    /// Region length in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the region is zero-sized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Writable view of the backing bytes.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut *self.bytes
    }
}

/// Memory allocation for kernel image placement.
pub trait ImagePlacer {
    /// Allocate a region of at least `size` bytes, preferably at
    /// `preferred_base` if the image is position-dependent. Implementations
    /// may round the region up to their allocation granularity.
    ///
    /// # Errors
    /// Returns [`OutOfMemory`] if the request cannot be backed; nothing is
    /// retained in that case.
    fn allocate(&mut self, size: usize, preferred_base: Option<u64>) -> Result<Region, OutOfMemory>;

    /// Return a region obtained from [`allocate`](Self::allocate). Only
    /// called on failure paths — a successfully placed image keeps its
    /// region forever.
    fn release(&mut self, region: Region);
}
