use debugcon::debugcon;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Loader-side `log` backend.
///
/// Writes every record to the debug console, and mirrors it to the UEFI
/// text console for as long as boot services exist. The console half is
/// turned off at the commit point via
/// [`exit_boot_services`](Self::exit_boot_services).
pub struct UefiLogger {
    max_level: LevelFilter,
    boot_services_available: bool,
}

impl UefiLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self {
            max_level,
            boot_services_available: true,
        }
    }

    /// Call this once during early init.
    #[allow(
        static_mut_refs,
        clippy::missing_errors_doc,
        clippy::missing_panics_doc
    )]
    pub fn init(self) -> Result<&'static mut Self, SetLoggerError> {
        // log::set_logger wants &'static dyn Log; park the instance in a
        // static rather than allocating.
        static mut LOGGER: Option<UefiLogger> = None;

        unsafe {
            LOGGER = Some(self);
            log::set_logger(LOGGER.as_ref().unwrap() as &'static dyn Log)?;
        }
        log::set_max_level(LevelFilter::Trace);
        unsafe { Ok(LOGGER.as_mut().expect("initialized")) }
    }

    /// The console is firmware-owned; stop touching it from here on.
    pub const fn exit_boot_services(&mut self) {
        self.boot_services_available = false;
    }
}

impl Log for UefiLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message\n", no allocation.
        debugcon!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );

        // Mirror to the UEFI console as long as possible.
        if self.boot_services_available {
            uefi::println!(
                "[{}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        // no-op for the debug port
    }
}
