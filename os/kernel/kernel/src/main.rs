//! # Kernel Entry
//!
//! First code out of the stage loader's jump. The entry stub takes
//! ownership of the machine from exactly one input — the handoff record —
//! and nothing else: interrupts are masked before any Rust runs, a private
//! stack replaces whatever the loader left in `RSP`, and the record is
//! validated by [`kernel_shim::accept`] before any of its fields are
//! believed.
//!
//! Past this point there is no firmware to report to. A rejected record is
//! traced over the debug console and the CPU is parked; an accepted one
//! flows into the kernel body.

#![no_std]
#![no_main]
#![allow(unsafe_code)]

use boot_info::handoff::HandoffRecord;
use core::hint::spin_loop;
use debugcon::{DebugconLogger, debugcon};
use kernel_shim::{BootContext, accept};
use log::{LevelFilter, info};

#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    park()
}

/// Boot stack size.
const BOOT_STACK_SIZE: usize = 64 * 1024;

/// 16-byte aligned stack backing store.
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

/// The kernel entry point.
///
/// # Loader Interaction
/// The stage loader jumps here after `ExitBootServices`, with the handoff
/// record pointer in `RCX` per the `win64` entry ABI (the caller is a UEFI
/// PE/COFF application).
///
/// # Naked function & Stack
/// Naked so the stack swap happens under our control: the loader's handoff
/// stack is scratch space we immediately abandon for [`BOOT_STACK`]. The
/// stub emulates a `CALL` by pushing a dummy return address so `RSP % 16 ==
/// 8` holds at the Rust entry, then never returns.
#[unsafe(no_mangle)]
#[unsafe(naked)]
pub extern "win64" fn _start(_record: *const HandoffRecord) {
    core::arch::naked_asm!(
        // Interrupts stay off until the kernel owns an IDT.
        "cli",

        // save RCX (handoff record per win64)
        "mov r12, rcx",

        // Build our own kernel stack and establish a valid call frame
        "lea rax, [rip + {stack_sym}]",
        "add rax, {stack_size}",
        // Align down to 16
        "and rax, -16",
        "mov rsp, rax",
        // Emulate a CALL by pushing a dummy return address
        "push 0",
        "xor rbp, rbp",

        // Record pointer into the C ABI arg register for the Rust entry
        "mov rdi, r12",

        // Jump to Rust entry and never return
        "jmp {rust_entry}",
        stack_sym = sym BOOT_STACK,
        stack_size = const BOOT_STACK_SIZE,
        rust_entry = sym kernel_entry,
    );
}

/// Kernel entry running on the private boot stack.
///
/// # Notes
/// * `no_mangle` so [`_start`] can jump to it by name.
/// * C ABI for a defined convention when entered from the stub's asm; the
///   stub leaves the record pointer in `RDI` accordingly.
#[unsafe(no_mangle)]
extern "C" fn kernel_entry(record: *const HandoffRecord) -> ! {
    debugcon!("Kernel reporting on the debug console\n");

    if record.is_null() {
        debugcon!("handoff record pointer is null, parking\n");
        park();
    }
    // SAFETY: non-null, and the loader contract hands us a record that
    // outlives the kernel (its backing was leaked pre-commit).
    let record = unsafe { &*record };

    match accept(record) {
        Ok(context) => enter_kernel_proper(&context),
        Err(e) => {
            // No firmware left to report to; trace and park.
            debugcon!("handoff rejected: {e}\n");
            park()
        }
    }
}

/// The out-of-scope kernel body: greet, show what we were handed, halt.
fn enter_kernel_proper(context: &BootContext) -> ! {
    let logger = DebugconLogger::new(LevelFilter::Debug);
    if logger.init().is_err() {
        debugcon!("logger already initialized?\n");
    }

    info!("Hello from the kernel!");
    info!(
        "memory map: {} descriptors ({} bytes each, version {})",
        context.mmap_descriptor_count(),
        context.mmap_desc_size,
        context.mmap_desc_version
    );
    info!(
        "image at {:#x}..{:#x}, entered at {:#x}",
        context.image.base,
        context.image.base + context.image.size,
        context.image.entry
    );
    if context.config.ptr != 0 {
        info!(
            "command line: {} bytes at {:#x}",
            context.config.len, context.config.ptr
        );
    }

    info!("nothing more to do, parking the CPU");
    park()
}

/// Low-power forever-loop; the end of every post-commit path.
fn park() -> ! {
    loop {
        spin_loop();
    }
}
