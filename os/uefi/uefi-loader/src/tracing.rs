//! # Trace output
//!
//! Post-commit diagnostics go straight to the debug console; the UEFI
//! console is gone by the time these run.

use boot_info::handoff::HandoffRecord;
use debugcon::debugcon;

pub fn trace_handoff(record: &HandoffRecord, stack_top: u64) {
    debugcon!("Handoff record before the jump:\n");
    debugcon!(
        "   record = {:#018x}",
        core::ptr::from_ref(record) as usize
    );
    debugcon!(", services_exited = {}", record.boot_services_exited);
    debugcon!("\n");
    debugcon!(" mmap ptr = {:#018x}", record.mmap.mmap_ptr);
    debugcon!(", len = {}", record.mmap.mmap_len);
    debugcon!(", desc size = {}", record.mmap.mmap_desc_size);
    debugcon!(", desc version = {}", record.mmap.mmap_desc_version);
    debugcon!("\n");
    debugcon!("   image base = {:#018x}", record.image.base);
    debugcon!(", size = {}", record.image.size);
    debugcon!(", entry = {:#018x}", record.image.entry);
    debugcon!("\n");
    debugcon!("   config ptr = {:#018x}", record.config.ptr);
    debugcon!(", len = {}", record.config.len);
    debugcon!(", stack top = {stack_top:#018x}");
    debugcon!("\n");
}
