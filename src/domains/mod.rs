pub mod coupling;
pub mod logger;
pub mod motion;

pub use coupling::*;
pub use logger::*;
pub use motion::*;
