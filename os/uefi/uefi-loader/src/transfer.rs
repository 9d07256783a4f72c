//! # Control Transfer
//!
//! The last loader instruction sequence: point `RSP` at the handoff stack
//! and jump to the kernel entry. Non-returning by construction — the `!`
//! return type and the `noreturn` asm option make the irrevocability a
//! compiler-checked fact rather than a convention.

use boot_info::handoff::HandoffRecord;
use debugcon::debugcon;

/// Jump into the placed kernel image.
/// - `entry`: absolute entry address inside the placed region
/// - `record`: the handoff record (`extern "win64"`, so it travels in `RCX`)
/// - `stack_top`: top of the handoff stack to load into `RSP`
///
/// # Safety
/// `entry` must point at the entry of a placed image that follows the
/// handoff ABI, `record` must outlive the kernel, and boot services must
/// already be exited — there is nothing to return to from here.
#[inline(never)]
pub unsafe fn enter_kernel(entry: u64, record: &'static HandoffRecord, stack_top: u64) -> ! {
    debugcon!("loader is done, jumping to the kernel. Ciao!\n");
    unsafe {
        core::arch::asm!(
            "cli",
            // Set up the kernel's first stack
            "mov    rsp, rdx",
            // Align RSP down to a 16-byte boundary
            "and    rsp, -16",
            // Emulate a CALL by pushing a dummy return address (the kernel
            // entry never returns)
            "push   0",
            "jmp    rax",
            in("rax") entry,
            in("rcx") core::ptr::from_ref::<HandoffRecord>(record) as u64,
            in("rdx") stack_top,
            options(noreturn)
        )
    }
}
