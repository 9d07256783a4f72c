#![allow(unsafe_code)]

//! # Loader-side Memory Helpers
//!
//! A pool-backed global allocator for the loader's own `alloc` needs, and
//! the stack the kernel entry stub runs on. Both are boot-services
//! constructs: the allocator dies at the commit point, the stack is
//! deliberately left behind for the kernel.

use core::alloc::{GlobalAlloc, Layout};
use core::ptr;
use core::ptr::NonNull;
use core::ptr::null_mut;
use uefi::boot;
use uefi::boot::{AllocateType, MemoryType, PAGE_SIZE};

/// A UEFI Boot Services pool allocation to back Rust's global allocator.
///
/// # Notes
/// - Valid only while Boot Services are active (before `ExitBootServices`).
/// - We always over-allocate to satisfy alignment and store the original
///   pointer just before the returned aligned block for correct
///   deallocation.
pub struct BootPoolAllocator;

#[global_allocator]
static GLOBAL_ALLOC: BootPoolAllocator = BootPoolAllocator;

unsafe impl GlobalAlloc for BootPoolAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Minimum size of 1; header for the original pointer plus padding
        // for alignment.
        let align = layout.align().max(size_of::<usize>());
        let size = layout.size().max(1);
        let Some(total) = size
            .checked_add(align)
            .and_then(|v| v.checked_add(size_of::<usize>()))
        else {
            return null_mut();
        };

        // Boot services must be active; if not, return null to signal OOM.
        // Allocate from the LOADER_DATA pool; align is handled manually.
        let Ok(raw) = boot::allocate_pool(MemoryType::LOADER_DATA, total) else {
            return null_mut();
        };

        let raw_ptr = raw.as_ptr();
        let addr = raw_ptr as usize + size_of::<usize>();
        let aligned = (addr + (align - 1)) & !(align - 1);
        let header_ptr = (aligned - size_of::<usize>()) as *mut usize;

        // Store the original allocation pointer just before the aligned
        // region.
        unsafe {
            ptr::write(header_ptr, raw_ptr as usize);
        }
        aligned as *mut u8
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        if ptr.is_null() {
            return;
        }

        // Recover the original pool pointer from the header stored in
        // alloc().
        let header_ptr = (ptr as usize - size_of::<usize>()) as *mut usize;
        let orig_ptr = unsafe { ptr::read(header_ptr) as *mut u8 };

        // SAFETY: `orig_ptr` was returned by `allocate_pool` and stored by
        // us.
        let _ = unsafe { boot::free_pool(NonNull::new_unchecked(orig_ptr)) };
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let p = unsafe { self.alloc(layout) };
        if !p.is_null() {
            unsafe { ptr::write_bytes(p, 0, layout.size()) };
        }

        p
    }
}

/// Allocate the stack the kernel entry stub runs on (optionally with a
/// guard page below it). Returns:
/// - `base`: physical base address of the usable stack
/// - `top`: top-of-stack value for `RSP`
///
/// The pages are `LOADER_DATA` and are never freed — ownership passes to
/// the kernel with the jump.
///
/// # Errors
/// Returns the firmware error if the pages cannot be allocated; this is a
/// pre-commit failure and reportable like any other.
pub fn alloc_handoff_stack(
    stack_size_bytes: usize,
    with_guard: bool,
) -> Result<(u64, u64), uefi::Error> {
    let pages_for_stack = stack_size_bytes.div_ceil(PAGE_SIZE);
    let guard_pages = usize::from(with_guard);
    let total_pages = pages_for_stack + guard_pages;

    // AllocateAnyPages returns a physical base
    let base = boot::allocate_pages(AllocateType::AnyPages, MemoryType::LOADER_DATA, total_pages)?;

    // If a guard page was requested, make the **first** page the guard and
    // use the rest as the actual stack.
    let base = base.as_ptr() as u64;
    let stack_base = if with_guard {
        base + PAGE_SIZE as u64
    } else {
        base
    };
    let top = stack_base + (pages_for_stack * PAGE_SIZE) as u64;

    // The transfer stub aligns RSP and pushes the dummy return address
    // itself, so the top goes out untouched.
    Ok((stack_base, top))
}
