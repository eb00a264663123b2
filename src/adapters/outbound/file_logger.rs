use crate::domains::logger::{DomainLogger, FileLogger};
use std::sync::Arc;

/// Install `fast_log` on `path` and return the logger to inject.
pub fn init_file_logger(path: &str, level: log::LevelFilter) -> Result<Arc<dyn DomainLogger>, String> {
    FileLogger::init(path, level).map_err(|e| format!("Failed to initialize fast_log on {}: {}", path, e))?;
    Ok(Arc::new(FileLogger))
}
