//! # Boot Outcomes
//!
//! The loader-side error taxonomy. Every variant is detected strictly
//! before the commit point and is recoverable by the firmware (which may
//! fall back to another boot entry). Success has no value here: a
//! successful boot never returns through the loader.

/// Why the boot attempt was abandoned before the commit point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BootError {
    /// The configured path does not name a readable regular file.
    #[error("no kernel image exists at the configured path")]
    ImageNotFound,
    /// The image failed structural validation against its own format.
    #[error("the kernel image failed structural validation")]
    ImageCorrupt,
    /// No registered image format recognizes the image header.
    #[error("no registered image format recognizes the kernel image")]
    UnsupportedFormat,
    /// The firmware allocator could not back the image region.
    #[error("the firmware allocator could not back the kernel image")]
    InsufficientMemory,
    /// Firmware services failed at the point of handing over the platform.
    #[error("firmware services were unavailable at the commit point")]
    ServicesUnavailable,
}

/// The firmware's exit call itself failed, leaving boot services active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("the firmware refused to release the platform")]
pub struct ExitRefused;
