use boot_info::memory;
use std::{env, path::PathBuf};

fn main() {
    // Point to the linker script
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");

    // Sanity check (fail fast during build)
    let link_base = memory::KERNEL_LINK_BASE;
    assert_eq!(
        link_base & 0xfff,
        0,
        "KERNEL_LINK_BASE must be 4 KiB aligned (got {link_base:#x})"
    );

    // Rebuild when inputs change
    println!("cargo:rerun-if-changed={}", ld.display());

    // Linker script
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());

    // Provide symbols to the linker script
    // (cargo:rustc-link-arg-bins passes args directly to the linker)
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_LINK_BASE={link_base:#x}");
}
