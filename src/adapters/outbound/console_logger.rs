use crate::domains::logger::DomainLogger;
use std::sync::Arc;

struct ConsoleBridge {
    verbose: bool,
}

impl DomainLogger for ConsoleBridge {
    fn info(&self, msg: &str) { println!("{}", msg); }
    fn warn(&self, msg: &str) { println!("WARN: {}", msg); }
    fn error(&self, msg: &str) { eprintln!("ERROR: {}", msg); }
    fn debug(&self, msg: &str) {
        if self.verbose {
            println!("DEBUG: {}", msg);
        }
    }
}

/// Console-backed DomainLogger; the fallback when no log file is configured.
pub fn init_console_logger() -> Arc<dyn DomainLogger> {
    Arc::new(ConsoleBridge { verbose: false })
}

/// Console logger that also prints per-step debug lines.
pub fn init_verbose_console_logger() -> Arc<dyn DomainLogger> {
    Arc::new(ConsoleBridge { verbose: true })
}
