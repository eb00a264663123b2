pub mod console_logger;
pub mod file_logger;
pub mod local_group;
pub mod multi_logger;
pub mod noop_logger;
pub mod rank_logger;

pub use console_logger::*;
pub use file_logger::*;
pub use local_group::*;
pub use multi_logger::*;
pub use noop_logger::*;
pub use rank_logger::*;
