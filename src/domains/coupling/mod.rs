pub mod identity;
pub mod payload;
pub mod ports;

pub use identity::*;
pub use payload::*;
pub use ports::*;
