//! # Boot Configuration
//!
//! The loader's few tunables, centralized. Paths are ESP-absolute.

/// Kernel image location on the ESP. Either format the registry knows
/// (ELF64 or a flat boot image) may live here.
pub const KERNEL_IMAGE_PATH: &str = "\\EFI\\Boot\\kernel.img";

/// Optional kernel command line, passed through the handoff record verbatim.
pub const COMMAND_LINE_PATH: &str = "\\EFI\\Boot\\cmdline.txt";

/// Longest command line the loader will forward.
pub const MAX_COMMAND_LINE: usize = 4096;

/// Size of the stack handed to the kernel for its first instructions. The
/// kernel swaps to its own stack immediately, so this only needs to cover
/// the entry stub.
pub const HANDOFF_STACK_SIZE: usize = 64 * 1024;
