use crate::debugcon;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// A `log` backend that writes to the debug console only.
///
/// Usable on either side of the commit point, since it depends on no
/// firmware service.
pub struct DebugconLogger {
    max_level: LevelFilter,
}

impl DebugconLogger {
    #[must_use]
    pub const fn new(max_level: LevelFilter) -> Self {
        Self { max_level }
    }

    /// Call this once during early init.
    #[allow(
        static_mut_refs,
        clippy::missing_errors_doc,
        clippy::missing_panics_doc
    )]
    pub fn init(self) -> Result<(), SetLoggerError> {
        // log::set_logger wants &'static dyn Log; park the instance in a
        // static rather than allocating.
        static mut LOGGER: Option<DebugconLogger> = None;

        unsafe {
            LOGGER = Some(self);
            log::set_logger(LOGGER.as_ref().unwrap() as &'static dyn Log)?;
        }
        log::set_max_level(LevelFilter::Trace);
        Ok(())
    }
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        // Format: "[LEVEL] target: message\n", straight into the sink.
        debugcon!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {
        // no-op for the debug port
    }
}
