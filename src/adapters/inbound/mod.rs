pub mod coupling_channel;

pub use coupling_channel::*;
