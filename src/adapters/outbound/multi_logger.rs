use crate::domains::logger::DomainLogger;
use std::sync::Arc;

/// Forwards every record to a primary and an optional secondary logger.
pub struct MultiLogger {
    primary: Arc<dyn DomainLogger>,
    secondary: Option<Arc<dyn DomainLogger>>,
}

impl MultiLogger {
    pub fn new(primary: Arc<dyn DomainLogger>, secondary: Option<Arc<dyn DomainLogger>>) -> Self {
        Self { primary, secondary }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.primary.info(msg);
        if let Some(sec) = &self.secondary {
            sec.info(msg);
        }
    }

    fn warn(&self, msg: &str) {
        self.primary.warn(msg);
        if let Some(sec) = &self.secondary {
            sec.warn(msg);
        }
    }

    fn error(&self, msg: &str) {
        self.primary.error(msg);
        if let Some(sec) = &self.secondary {
            sec.error(msg);
        }
    }

    fn debug(&self, msg: &str) {
        self.primary.debug(msg);
        if let Some(sec) = &self.secondary {
            sec.debug(msg);
        }
    }
}

/// Log file plus console when `path` is given, otherwise just the console.
/// A log file that cannot be opened falls back to the console with a warning.
/// The console prints debug records only at `Debug` or finer.
pub fn init_combined_logger(path: Option<&str>, level: log::LevelFilter) -> Arc<dyn DomainLogger> {
    let console = if level >= log::LevelFilter::Debug {
        crate::adapters::outbound::init_verbose_console_logger()
    } else {
        crate::adapters::outbound::init_console_logger()
    };
    let Some(path) = path else {
        return console;
    };
    match crate::adapters::outbound::file_logger::init_file_logger(path, level) {
        Ok(file_logger) => Arc::new(MultiLogger::new(file_logger, Some(console))),
        Err(e) => {
            console.warn(&format!("{}; logging to console only", e));
            console
        }
    }
}
