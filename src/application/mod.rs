pub mod step_synchronizer;

pub use step_synchronizer::*;
