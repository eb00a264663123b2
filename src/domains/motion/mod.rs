pub mod decoder;
mod ports;
pub mod pose;
pub mod transform;

pub use decoder::*;
pub use ports::*;
pub use pose::*;
pub use transform::*;
