use crate::domains::logger::DomainLogger;
use std::sync::Arc;

/// Tags every record with the worker rank so interleaved group output stays readable.
pub struct RankLogger {
    rank: usize,
    inner: Arc<dyn DomainLogger>,
}

impl RankLogger {
    pub fn new(rank: usize, inner: Arc<dyn DomainLogger>) -> Self {
        Self { rank, inner }
    }

    fn tag(&self, msg: &str) -> String {
        format!("[proc {}] {}", self.rank, msg)
    }
}

impl DomainLogger for RankLogger {
    fn info(&self, msg: &str) { self.inner.info(&self.tag(msg)); }
    fn warn(&self, msg: &str) { self.inner.warn(&self.tag(msg)); }
    fn error(&self, msg: &str) { self.inner.error(&self.tag(msg)); }
    fn debug(&self, msg: &str) { self.inner.debug(&self.tag(msg)); }
}

pub fn init_rank_logger(rank: usize, inner: Arc<dyn DomainLogger>) -> Arc<dyn DomainLogger> {
    Arc::new(RankLogger::new(rank, inner))
}
